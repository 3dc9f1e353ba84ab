//! Handler registrations and the gate chain.
//!
//! A [`Registration`] pairs a handler with everything the router needs to
//! decide whether a message belongs to it: the message and context types,
//! an optional job scope, ordered context and body filters, and an optional
//! custom deserializer.
//!
//! # Gate order
//!
//! Every attempt runs the gates below in order and stops at the first one
//! that fails. Each gate writes one line into the attempt's
//! [`HandlerSummary`], so skipped registrations leave an audit trail too.
//!
//! 1. job scope
//! 2. context type
//! 3. context filters
//! 4. deserialization (custom strategy first, then default JSON)
//! 5. message type
//! 6. body filters
//!
//! # Example
//!
//! ```rust,ignore
//! let registration = Registration::for_message::<Order, _>(OrderHandler)
//!     .name("orders")
//!     .job_id("pump-1")
//!     .context_filter(|ctx| ctx.property_str("Topic") == Some("Orders"))
//!     .body_filter(|order| !order.lines.is_empty())
//!     .build();
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use switchyard_core::{
    CancellationToken, HandlerResult, HandlerSummary, JsonBodyDeserializer, MessageBodyDeserializer,
    MessageBodyResult, MessageContext, MessageCorrelation, RoutingContext, SharedError,
    TypeDescriptor,
};

use crate::error::{GateError, panic_message};
use crate::filter::{FilterAxis, FilterChain, FilterOutcome};
use crate::handler::{HandlerContext, MessageHandler, invoke_handler};

/// Types a registration can deserialize bodies into.
pub trait RoutableMessage: DeserializeOwned + Send + Sync + 'static {}

impl<T> RoutableMessage for T where T: DeserializeOwned + Send + Sync + 'static {}

// ============================================================================
// RegistrationInfo
// ============================================================================

/// Read-only description of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    name: String,
    message_type: TypeDescriptor,
    context_type: TypeDescriptor,
    job_id: Option<String>,
    context_filters: usize,
    body_filters: usize,
    custom_deserializer: bool,
}

impl RegistrationInfo {
    /// Returns the registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the message type the handler accepts.
    pub fn message_type(&self) -> TypeDescriptor {
        self.message_type
    }

    /// Returns the context type the handler accepts.
    pub fn context_type(&self) -> TypeDescriptor {
        self.context_type
    }

    /// Returns the job scope, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Returns the number of context filters.
    pub fn context_filters(&self) -> usize {
        self.context_filters
    }

    /// Returns the number of body filters.
    pub fn body_filters(&self) -> usize {
        self.body_filters
    }

    /// Returns `true` if a custom deserializer is configured.
    pub fn has_custom_deserializer(&self) -> bool {
        self.custom_deserializer
    }
}

impl fmt::Display for RegistrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} in {})",
            self.name, self.message_type, self.context_type
        )?;
        if let Some(job_id) = &self.job_id {
            write!(f, " for job '{job_id}'")?;
        }
        Ok(())
    }
}

// ============================================================================
// Registration
// ============================================================================

/// An immutable, type-erased handler registration.
///
/// Cloning is cheap; clones share the same handler.
#[derive(Clone)]
pub struct Registration {
    inner: Arc<dyn ErasedRegistration>,
}

impl Registration {
    /// Starts a registration of `handler` for message type `M` under
    /// context type `C`.
    pub fn new<M, C, H>(handler: H) -> RegistrationBuilder<M, C, H>
    where
        M: RoutableMessage,
        C: RoutingContext + Clone,
        H: MessageHandler<M, C>,
    {
        RegistrationBuilder {
            handler,
            name: None,
            job_id: None,
            context_filters: FilterChain::new(),
            body_filters: FilterChain::new(),
            deserializer: None,
        }
    }

    /// Starts a registration of `handler` for message type `M` under the
    /// plain [`MessageContext`].
    pub fn for_message<M, H>(handler: H) -> RegistrationBuilder<M, MessageContext, H>
    where
        M: RoutableMessage,
        H: MessageHandler<M, MessageContext>,
    {
        Self::new(handler)
    }

    /// Returns the registration description.
    pub fn info(&self) -> &RegistrationInfo {
        self.inner.info()
    }

    /// Runs the gate chain and, if every gate passes, the handler.
    pub(crate) async fn attempt(
        &self,
        delivery: &Delivery<'_>,
        summary: &mut HandlerSummary,
    ) -> Attempt {
        self.inner.attempt(delivery, summary).await
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Registration").field(self.info()).finish()
    }
}

/// Builder for a [`Registration`].
pub struct RegistrationBuilder<M, C, H> {
    handler: H,
    name: Option<String>,
    job_id: Option<String>,
    context_filters: FilterChain<C>,
    body_filters: FilterChain<M>,
    deserializer: Option<Arc<dyn MessageBodyDeserializer>>,
}

impl<M, C, H> RegistrationBuilder<M, C, H>
where
    M: RoutableMessage,
    C: RoutingContext + Clone,
    H: MessageHandler<M, C>,
{
    /// Sets the name used in logs and diagnostics.
    ///
    /// Defaults to the message type name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the registration to messages consumed by job `job_id`.
    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Adds a predicate over the message context.
    ///
    /// Multiple context filters must all pass; they run in the order added.
    pub fn context_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.context_filters.push(filter);
        self
    }

    /// Adds a predicate over the deserialized message.
    ///
    /// Multiple body filters must all pass; they run in the order added.
    pub fn body_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.body_filters.push(filter);
        self
    }

    /// Sets a custom deserializer, tried before the default one.
    pub fn deserializer<D>(mut self, deserializer: D) -> Self
    where
        D: MessageBodyDeserializer + 'static,
    {
        self.deserializer = Some(Arc::new(deserializer));
        self
    }

    /// Finishes the registration.
    pub fn build(self) -> Registration {
        let message_type = TypeDescriptor::of::<M>();
        let info = RegistrationInfo {
            name: self
                .name
                .unwrap_or_else(|| message_type.short_name().to_string()),
            message_type,
            context_type: TypeDescriptor::of::<C>(),
            job_id: self.job_id,
            context_filters: self.context_filters.len(),
            body_filters: self.body_filters.len(),
            custom_deserializer: self.deserializer.is_some(),
        };

        Registration {
            inner: Arc::new(TypedRegistration {
                info,
                handler: self.handler,
                context_filters: self.context_filters,
                body_filters: self.body_filters,
                deserializer: self.deserializer,
                _marker: PhantomData,
            }),
        }
    }
}

impl<M, C, H> From<RegistrationBuilder<M, C, H>> for Registration
where
    M: RoutableMessage,
    C: RoutingContext + Clone,
    H: MessageHandler<M, C>,
{
    fn from(builder: RegistrationBuilder<M, C, H>) -> Self {
        builder.build()
    }
}

// ============================================================================
// Type erasure
// ============================================================================

/// One message as the gate chain sees it.
pub(crate) struct Delivery<'a> {
    pub(crate) body: &'a str,
    pub(crate) context: &'a dyn RoutingContext,
    pub(crate) correlation: &'a MessageCorrelation,
    pub(crate) cancellation: &'a CancellationToken,
    pub(crate) json: JsonBodyDeserializer,
}

/// Result of one match attempt.
pub(crate) enum Attempt {
    /// A gate failed; the registration does not own the message.
    Skipped,
    /// Every gate passed and the handler ran.
    Invoked(HandlerResult),
}

#[async_trait]
pub(crate) trait ErasedRegistration: Send + Sync {
    fn info(&self) -> &RegistrationInfo;

    async fn attempt(&self, delivery: &Delivery<'_>, summary: &mut HandlerSummary) -> Attempt;
}

struct TypedRegistration<M, C, H> {
    info: RegistrationInfo,
    handler: H,
    context_filters: FilterChain<C>,
    body_filters: FilterChain<M>,
    deserializer: Option<Arc<dyn MessageBodyDeserializer>>,
    _marker: PhantomData<fn() -> (M, C)>,
}

/// Why a custom deserializer did not produce a message.
struct Miss {
    reason: String,
    cause: Option<SharedError>,
}

impl<M, C, H> TypedRegistration<M, C, H>
where
    M: RoutableMessage,
    C: RoutingContext + Clone,
    H: MessageHandler<M, C>,
{
    fn check_job_scope(&self, context: &dyn RoutingContext, summary: &mut HandlerSummary) -> bool {
        match &self.info.job_id {
            None => {
                summary.add_passed("no job scope configured");
                true
            }
            Some(expected) if expected == context.job_id() => {
                summary
                    .add_passed("job scope matched")
                    .member("job_id", expected);
                true
            }
            Some(expected) => {
                summary
                    .add_failed("job scope mismatch")
                    .member("expected", expected)
                    .member("actual", context.job_id());
                false
            }
        }
    }

    fn check_context_type<'a>(
        &self,
        context: &'a dyn RoutingContext,
        summary: &mut HandlerSummary,
    ) -> Option<&'a C> {
        match context.downcast_ref::<C>() {
            Some(typed) => {
                summary
                    .add_passed("context type matched")
                    .member("context_type", self.info.context_type);
                Some(typed)
            }
            None => {
                summary
                    .add_failed("context type mismatch")
                    .member("expected", self.info.context_type);
                None
            }
        }
    }

    async fn deserialize(
        &self,
        delivery: &Delivery<'_>,
        summary: &mut HandlerSummary,
    ) -> Option<M> {
        if let Some(custom) = &self.deserializer {
            match self.run_custom(custom.as_ref(), delivery).await {
                Ok(message) => {
                    summary
                        .add_passed("custom deserializer succeeded")
                        .member("message_type", self.info.message_type);
                    return Some(message);
                }
                Err(miss) => {
                    let line = match miss.cause {
                        Some(cause) => summary.add_failed_with(cause, "custom deserializer missed"),
                        None => summary.add_failed("custom deserializer missed"),
                    };
                    line.member("message_type", self.info.message_type)
                        .reason(miss.reason);
                }
            }
        }

        match delivery.json.deserialize::<M>(delivery.body) {
            Ok(message) => {
                summary
                    .add_passed("default deserialization succeeded")
                    .member("message_type", self.info.message_type);
                Some(message)
            }
            Err(err) => {
                let reason = err.reason();
                summary
                    .add_failed_with(Arc::new(err), "default deserialization failed")
                    .member("message_type", self.info.message_type)
                    .reason(reason);
                None
            }
        }
    }

    async fn run_custom(
        &self,
        custom: &dyn MessageBodyDeserializer,
        delivery: &Delivery<'_>,
    ) -> Result<M, Miss> {
        let target = TypeDescriptor::of::<M>();
        let outcome = AssertUnwindSafe(custom.deserialize(
            delivery.body,
            target,
            delivery.cancellation,
        ))
        .catch_unwind()
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                return Err(Miss {
                    reason: "deserializer panicked".to_string(),
                    cause: Some(shared(GateError::DeserializerPanicked(panic_message(
                        payload.as_ref(),
                    )))),
                });
            }
        };

        match result.into_message::<M>() {
            Ok(message) => Ok(message),
            Err(MessageBodyResult::Failure { reason, cause }) => Err(Miss { reason, cause }),
            Err(MessageBodyResult::Success(_)) => Err(Miss {
                reason: "returned a different message type".to_string(),
                cause: Some(shared(GateError::UnexpectedMessageType {
                    expected: target.name(),
                })),
            }),
        }
    }
}

fn check_filters<T: ?Sized>(
    axis: FilterAxis,
    chain: &FilterChain<T>,
    value: &T,
    summary: &mut HandlerSummary,
) -> bool {
    let gate = axis.gate();

    match chain.evaluate(value) {
        FilterOutcome::Unfiltered | FilterOutcome::Passed => {
            summary
                .add_passed(format!("{gate} passed"))
                .member("filters", chain.len());
            true
        }
        FilterOutcome::Rejected { index } => {
            summary
                .add_failed(format!("{gate} failed"))
                .member("filters", chain.len())
                .member("rejected_by", index);
            false
        }
        FilterOutcome::Panicked { index, message } => {
            summary
                .add_failed_with(
                    shared(GateError::PredicatePanicked {
                        axis,
                        index,
                        message,
                    }),
                    format!("{gate} failed"),
                )
                .member("filters", chain.len())
                .member("rejected_by", index)
                .reason("predicate panicked");
            false
        }
    }
}

fn shared(err: GateError) -> SharedError {
    Arc::new(err)
}

#[async_trait]
impl<M, C, H> ErasedRegistration for TypedRegistration<M, C, H>
where
    M: RoutableMessage,
    C: RoutingContext + Clone,
    H: MessageHandler<M, C>,
{
    fn info(&self) -> &RegistrationInfo {
        &self.info
    }

    async fn attempt(&self, delivery: &Delivery<'_>, summary: &mut HandlerSummary) -> Attempt {
        if !self.check_job_scope(delivery.context, summary) {
            return Attempt::Skipped;
        }

        let Some(context) = self.check_context_type(delivery.context, summary) else {
            return Attempt::Skipped;
        };

        if !check_filters(FilterAxis::Context, &self.context_filters, context, summary) {
            return Attempt::Skipped;
        }

        let Some(message) = self.deserialize(delivery, summary).await else {
            return Attempt::Skipped;
        };

        // The value is an `M` by construction once deserialization returns.
        summary
            .add_passed("message type matched")
            .member("message_type", self.info.message_type);

        if !check_filters(FilterAxis::Body, &self.body_filters, &message, summary) {
            return Attempt::Skipped;
        }

        let ctx = HandlerContext::new(
            context.clone(),
            delivery.correlation.clone(),
            delivery.cancellation.clone(),
        );
        Attempt::Invoked(invoke_handler(&self.handler, message, ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use serde::{Deserialize, Serialize};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_core::{HandlerError, UnknownFieldPolicy};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        name: String,
    }

    #[derive(Debug, Clone)]
    struct QueueContext {
        base: MessageContext,
    }

    impl RoutingContext for QueueContext {
        fn base(&self) -> &MessageContext {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn ok_handler(calls: Arc<AtomicUsize>) -> impl MessageHandler<Order> {
        handler_fn(move |_order: Order, _ctx: HandlerContext| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                HandlerResult::Ok(())
            }
        })
    }

    async fn run(
        registration: &Registration,
        body: &str,
        context: &dyn RoutingContext,
    ) -> (Attempt, HandlerSummary) {
        let correlation = MessageCorrelation::new("op", "tx");
        let cancellation = CancellationToken::new();
        let delivery = Delivery {
            body,
            context,
            correlation: &correlation,
            cancellation: &cancellation,
            json: JsonBodyDeserializer::new(UnknownFieldPolicy::Error),
        };
        let mut summary = HandlerSummary::new();
        let attempt = registration.attempt(&delivery, &mut summary).await;
        (attempt, summary)
    }

    fn ctx(job_id: &str) -> MessageContext {
        MessageContext::new("msg-1", job_id).unwrap()
    }

    #[test]
    fn test_info_defaults() {
        let registration =
            Registration::for_message::<Order, _>(ok_handler(Default::default())).build();
        let info = registration.info();
        assert_eq!(info.name(), "Order");
        assert!(info.message_type().is::<Order>());
        assert!(info.context_type().is::<MessageContext>());
        assert_eq!(info.job_id(), None);
        assert_eq!(info.context_filters(), 0);
        assert!(!info.has_custom_deserializer());
        assert_eq!(info.to_string(), "Order (Order in MessageContext)");
    }

    #[test]
    fn test_info_reflects_builder() {
        let registration: Registration =
            Registration::for_message::<Order, _>(ok_handler(Default::default()))
                .name("orders")
                .job_id("pump-1")
                .context_filter(|_| true)
                .context_filter(|_| true)
                .body_filter(|order| order.id > 0)
                .deserializer(|_: &str, _: TypeDescriptor| MessageBodyResult::failure("never"))
                .into();
        let info = registration.info();
        assert_eq!(info.job_id(), Some("pump-1"));
        assert_eq!(info.context_filters(), 2);
        assert_eq!(info.body_filters(), 1);
        assert!(info.has_custom_deserializer());
        assert_eq!(
            info.to_string(),
            "orders (Order in MessageContext) for job 'pump-1'"
        );
    }

    #[tokio::test]
    async fn test_all_gates_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registration =
            Registration::for_message::<Order, _>(ok_handler(Arc::clone(&calls))).build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Invoked(Ok(()))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(summary.all_passed());
        assert_eq!(
            summary.to_string(),
            "✓ no job scope configured\n\
             ✓ context type matched (context_type=MessageContext)\n\
             ✓ custom context filter passed (filters=0)\n\
             ✓ default deserialization succeeded (message_type=Order)\n\
             ✓ message type matched (message_type=Order)\n\
             ✓ custom body filter passed (filters=0)"
        );
    }

    #[tokio::test]
    async fn test_job_scope_mismatch_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registration = Registration::for_message::<Order, _>(ok_handler(Arc::clone(&calls)))
            .job_id("pump-1")
            .build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-2")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            summary.to_string(),
            "✗ job scope mismatch (expected=pump-1, actual=pump-2)"
        );
    }

    #[tokio::test]
    async fn test_derived_context_accepted_for_base_registration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registration =
            Registration::for_message::<Order, _>(ok_handler(Arc::clone(&calls))).build();
        let queue = QueueContext { base: ctx("pump-1") };

        let (attempt, _) = run(&registration, r#"{"id":7}"#, &queue).await;
        assert!(matches!(attempt, Attempt::Invoked(Ok(()))));
    }

    #[tokio::test]
    async fn test_context_type_mismatch() {
        let registration = Registration::new::<Order, QueueContext, _>(handler_fn(
            |_: Order, _: HandlerContext<QueueContext>| async move { HandlerResult::Ok(()) },
        ))
        .build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert!(summary.to_string().ends_with("✗ context type mismatch (expected=QueueContext)"));
    }

    #[tokio::test]
    async fn test_context_filters_and_fold_in_order() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&second_calls);
        let registration = Registration::for_message::<Order, _>(ok_handler(Default::default()))
            .context_filter(|ctx| ctx.property_str("Topic") == Some("Orders"))
            .context_filter(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .build();

        let context = ctx("pump-1").property_set("Topic", "Customers");
        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &context).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert!(
            summary
                .to_string()
                .ends_with("✗ custom context filter failed (filters=2, rejected_by=0)")
        );
    }

    #[tokio::test]
    async fn test_panicking_filter_is_a_failed_gate() {
        let registration = Registration::for_message::<Order, _>(ok_handler(Default::default()))
            .body_filter(|_| panic!("filter bug"))
            .build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        let error = summary.captured_error().unwrap();
        assert_eq!(error.to_string(), "body filter #0 panicked: filter bug");
    }

    #[tokio::test]
    async fn test_default_deserialization_failure_is_skip() {
        let registration =
            Registration::for_message::<Order, _>(ok_handler(Default::default())).build();

        let (attempt, summary) =
            run(&registration, r#"{"id":7,"extra":true}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert!(summary.to_string().ends_with(
            "✗ default deserialization failed (message_type=Order): unknown fields: extra"
        ));
        assert!(summary.captured_error().is_some());
    }

    #[tokio::test]
    async fn test_custom_deserializer_used_first() {
        let seen = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&seen);
        let registration = Registration::for_message::<Order, _>(handler_fn(
            move |order: Order, _: HandlerContext| {
                let observed = Arc::clone(&observed);
                async move {
                    observed.store(order.id as usize, Ordering::SeqCst);
                    HandlerResult::Ok(())
                }
            },
        ))
        .deserializer(|body: &str, _: TypeDescriptor| match body.strip_prefix("order:") {
            Some(id) => match id.parse() {
                Ok(id) => MessageBodyResult::success(Order { id }),
                Err(_) => MessageBodyResult::failure("bad id"),
            },
            None => MessageBodyResult::failure("not an order line"),
        })
        .build();

        let (attempt, summary) = run(&registration, "order:42", &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Invoked(Ok(()))));
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert!(summary.to_string().contains("✓ custom deserializer succeeded"));
    }

    #[tokio::test]
    async fn test_custom_deserializer_wrong_type_falls_through() {
        let seen = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&seen);
        let registration = Registration::for_message::<Order, _>(handler_fn(
            move |order: Order, _: HandlerContext| {
                let observed = Arc::clone(&observed);
                async move {
                    observed.store(order.id as usize, Ordering::SeqCst);
                    HandlerResult::Ok(())
                }
            },
        ))
        .deserializer(|_: &str, _: TypeDescriptor| {
            MessageBodyResult::success(Customer { name: "Jane".into() })
        })
        .build();

        let (attempt, summary) = run(&registration, r#"{"id":9}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Invoked(Ok(()))));
        assert_eq!(seen.load(Ordering::SeqCst), 9);

        let rendered = summary.to_string();
        assert!(rendered.contains(
            "✗ custom deserializer missed (message_type=Order): returned a different message type"
        ));
        assert!(rendered.contains("✓ default deserialization succeeded"));
    }

    #[tokio::test]
    async fn test_panicking_custom_deserializer_is_a_miss() {
        let registration = Registration::for_message::<Order, _>(ok_handler(Default::default()))
            .deserializer(|_: &str, _: TypeDescriptor| -> MessageBodyResult {
                panic!("deserializer bug")
            })
            .build();

        let (attempt, summary) = run(&registration, r#"{"id":1}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Invoked(Ok(()))));
        assert_eq!(
            summary.captured_error().unwrap().to_string(),
            "custom deserializer panicked: deserializer bug"
        );
    }

    #[tokio::test]
    async fn test_custom_and_default_failures_aggregate() {
        let registration = Registration::for_message::<Order, _>(ok_handler(Default::default()))
            .deserializer(|_: &str, _: TypeDescriptor| {
                MessageBodyResult::failure_with("no luck", HandlerError::failed("custom cause"))
            })
            .build();

        let (attempt, summary) = run(&registration, "not json", &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert_eq!(summary.errors().len(), 2);
        assert!(
            summary
                .captured_error()
                .unwrap()
                .to_string()
                .starts_with("2 errors occurred; [0] custom cause; [1] body is not valid JSON")
        );
    }

    #[tokio::test]
    async fn test_body_filter_rejects() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registration = Registration::for_message::<Order, _>(ok_handler(Arc::clone(&calls)))
            .body_filter(|order| order.id > 10)
            .build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-1")).await;
        assert!(matches!(attempt, Attempt::Skipped));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(
            summary
                .to_string()
                .ends_with("✗ custom body filter failed (filters=1, rejected_by=0)")
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_reported() {
        let registration = Registration::for_message::<Order, _>(handler_fn(
            |_: Order, _: HandlerContext| async move {
                HandlerResult::Err(HandlerError::failed("out of stock"))
            },
        ))
        .build();

        let (attempt, summary) = run(&registration, r#"{"id":7}"#, &ctx("pump-1")).await;
        assert!(summary.all_passed());
        match attempt {
            Attempt::Invoked(Err(err)) => assert_eq!(err.to_string(), "out of stock"),
            _ => panic!("expected an invoked, failed attempt"),
        }
    }
}
