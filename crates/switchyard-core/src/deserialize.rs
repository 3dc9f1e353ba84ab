//! Body deserialization strategies.
//!
//! Two strategies compose per registration: an optional consumer-supplied
//! [`MessageBodyDeserializer`], tried first, and the default
//! [`JsonBodyDeserializer`], used when there is no custom strategy or it
//! missed.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::body::MessageBodyResult;
use crate::context::TypeDescriptor;
use crate::error::BodyError;

/// What the default deserializer does with fields the target type does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Unknown fields fail deserialization.
    #[default]
    Error,
    /// Unknown fields are dropped.
    Ignore,
}

/// A consumer-supplied strategy for turning a body into a message.
///
/// Returning a failure, a success holding a value of another type than
/// `target`, or panicking all count as a miss: the router then falls back to
/// the default JSON deserialization.
///
/// Plain closures work too:
///
/// ```rust,ignore
/// let csv = |body: &str, _target: TypeDescriptor| match parse_order_csv(body) {
///     Some(order) => MessageBodyResult::success(order),
///     None => MessageBodyResult::failure("not an order line"),
/// };
/// ```
#[async_trait]
pub trait MessageBodyDeserializer: Send + Sync {
    /// Deserializes `body` into a value of the `target` type.
    async fn deserialize(
        &self,
        body: &str,
        target: TypeDescriptor,
        cancellation: &CancellationToken,
    ) -> MessageBodyResult;
}

#[async_trait]
impl<F> MessageBodyDeserializer for F
where
    F: Fn(&str, TypeDescriptor) -> MessageBodyResult + Send + Sync,
{
    async fn deserialize(
        &self,
        body: &str,
        target: TypeDescriptor,
        _cancellation: &CancellationToken,
    ) -> MessageBodyResult {
        (self)(body, target)
    }
}

/// The default structured-text strategy, backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyDeserializer {
    policy: UnknownFieldPolicy,
}

impl JsonBodyDeserializer {
    /// Creates a deserializer applying `policy` to unknown fields.
    pub fn new(policy: UnknownFieldPolicy) -> Self {
        Self { policy }
    }

    /// Returns the unknown-field policy.
    pub fn policy(&self) -> UnknownFieldPolicy {
        self.policy
    }

    /// Deserializes `body` into `T`.
    ///
    /// `null` counts as an empty result and fails. Under
    /// [`UnknownFieldPolicy::Error`] every body field the target type's
    /// deserializer skipped is reported by path.
    pub fn deserialize<T>(&self, body: &str) -> Result<T, BodyError>
    where
        T: DeserializeOwned,
    {
        let target = std::any::type_name::<T>();
        let raw: Value = serde_json::from_str(body)
            .map_err(|source| BodyError::Malformed { target, source })?;
        if raw.is_null() {
            return Err(BodyError::Empty { target });
        }

        if self.policy == UnknownFieldPolicy::Ignore {
            return T::deserialize(&raw).map_err(|source| BodyError::Malformed { target, source });
        }

        let mut fields = Vec::new();
        let typed = serde_ignored::deserialize(&raw, |path| {
            let mut rendered = String::new();
            render_path(&path, &mut rendered);
            fields.push(rendered);
        })
        .map_err(|source| BodyError::Malformed { target, source })?;

        if !fields.is_empty() {
            return Err(BodyError::UnknownFields { target, fields });
        }
        Ok(typed)
    }

    /// Deserializes `body` into `T`, folding errors into a [`MessageBodyResult`].
    pub fn deserialize_body<T>(&self, body: &str) -> MessageBodyResult
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        match self.deserialize::<T>(body) {
            Ok(message) => MessageBodyResult::success(message),
            Err(err) => MessageBodyResult::failure_with(err.reason(), err),
        }
    }
}

/// Renders `lines[0].note` style paths; `Option` and newtype layers are transparent.
fn render_path(path: &serde_ignored::Path<'_>, out: &mut String) {
    use serde_ignored::Path;

    match path {
        Path::Root => {}
        Path::Seq { parent, index } => {
            render_path(parent, out);
            out.push_str(&format!("[{index}]"));
        }
        Path::Map { parent, key } => {
            render_path(parent, out);
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(key);
        }
        Path::Some { parent }
        | Path::NewtypeStruct { parent }
        | Path::NewtypeVariant { parent } => render_path(parent, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Customer {
        name: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        sku: String,
        quantity: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
        #[serde(default)]
        lines: Vec<Line>,
    }

    fn strict() -> JsonBodyDeserializer {
        JsonBodyDeserializer::new(UnknownFieldPolicy::Error)
    }

    fn lenient() -> JsonBodyDeserializer {
        JsonBodyDeserializer::new(UnknownFieldPolicy::Ignore)
    }

    #[test]
    fn test_default_policy_is_error() {
        assert_eq!(JsonBodyDeserializer::default().policy(), UnknownFieldPolicy::Error);
        assert_eq!(UnknownFieldPolicy::default(), UnknownFieldPolicy::Error);
    }

    #[test]
    fn test_exact_body_succeeds_under_both_policies() {
        let body = r#"{"name":"Jane"}"#;
        let expected = Customer { name: "Jane".into() };
        assert_eq!(strict().deserialize::<Customer>(body).unwrap(), expected);
        assert_eq!(lenient().deserialize::<Customer>(body).unwrap(), expected);
    }

    #[test]
    fn test_unknown_field_rejected_under_error_policy() {
        let err = strict()
            .deserialize::<Customer>(r#"{"name":"Jane","age":41}"#)
            .unwrap_err();
        match err {
            BodyError::UnknownFields { fields, .. } => assert_eq!(fields, vec!["age".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_field_dropped_under_ignore_policy() {
        let customer = lenient()
            .deserialize::<Customer>(r#"{"name":"Jane","age":41}"#)
            .unwrap();
        assert_eq!(customer, Customer { name: "Jane".into() });
    }

    #[test]
    fn test_nested_unknown_fields_reported_by_path() {
        let body = r#"{"id":1,"lines":[{"sku":"a","quantity":2,"note":"gift"}],"channel":"web"}"#;
        match strict().deserialize::<Order>(body).unwrap_err() {
            BodyError::UnknownFields { fields, .. } => {
                assert_eq!(fields, vec!["channel".to_string(), "lines[0].note".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Renamed {
        #[serde(alias = "customerName")]
        name: String,
    }

    #[test]
    fn test_declared_null_option_is_not_unknown() {
        let profile = strict()
            .deserialize::<Profile>(r#"{"name":"Jane","nickname":null}"#)
            .unwrap();
        assert_eq!(profile, Profile { name: "Jane".into(), nickname: None });
    }

    #[test]
    fn test_aliased_field_is_not_unknown() {
        let renamed = strict()
            .deserialize::<Renamed>(r#"{"customerName":"Jane"}"#)
            .unwrap();
        assert_eq!(renamed, Renamed { name: "Jane".into() });

        match strict()
            .deserialize::<Renamed>(r#"{"customerName":"Jane","age":41}"#)
            .unwrap_err()
        {
            BodyError::UnknownFields { fields, .. } => assert_eq!(fields, vec!["age".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_body_is_empty_failure() {
        assert!(matches!(
            strict().deserialize::<Option<Customer>>("null"),
            Err(BodyError::Empty { .. })
        ));
    }

    #[test]
    fn test_empty_body_is_malformed_not_special_cased() {
        assert!(matches!(
            strict().deserialize::<Customer>(""),
            Err(BodyError::Malformed { .. })
        ));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        assert!(matches!(
            strict().deserialize::<Order>(r#"{"name":"Jane"}"#),
            Err(BodyError::Malformed { .. })
        ));
    }

    #[test]
    fn test_deserialize_body_keeps_cause_out_of_reason() {
        let result = strict().deserialize_body::<Customer>("{not json");
        assert_eq!(result.failure_reason(), "body is not valid JSON for the target type");
        assert!(result.failure_cause().is_some());

        let result = strict().deserialize_body::<Customer>(r#"{"name":"Jane","age":1}"#);
        assert_eq!(result.failure_reason(), "unknown fields: age");
    }

    #[tokio::test]
    async fn test_closure_deserializer() {
        let deserializer = |body: &str, _target: TypeDescriptor| {
            MessageBodyResult::success(Customer { name: body.to_string() })
        };
        let result = deserializer
            .deserialize("Jane", TypeDescriptor::of::<Customer>(), &CancellationToken::new())
            .await;
        assert_eq!(
            result.into_message::<Customer>().unwrap(),
            Customer { name: "Jane".into() }
        );
    }
}
