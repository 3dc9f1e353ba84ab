//! Message bodies: deserialization results and character decoding.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::context::MessageContext;
use crate::error::SharedError;

// =============================================================================
// MessageBodyResult
// =============================================================================

/// The outcome of turning a raw body into a typed message.
///
/// Exactly one branch is populated. The accessors that assume a branch
/// ([`deserialized_message`](Self::deserialized_message),
/// [`failure_reason`](Self::failure_reason)) panic when called on the other
/// one; use [`is_success`](Self::is_success) or pattern matching first.
pub enum MessageBodyResult {
    /// The body was deserialized into a message.
    Success(Box<dyn Any + Send + Sync>),
    /// The body could not be deserialized.
    Failure {
        /// Why deserialization failed.
        reason: String,
        /// The error that caused the failure, if any.
        cause: Option<SharedError>,
    },
}

impl MessageBodyResult {
    /// Creates a successful result holding `message`.
    pub fn success<T: Any + Send + Sync>(message: T) -> Self {
        Self::Success(Box::new(message))
    }

    /// Creates a failed result.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            cause: None,
        }
    }

    /// Creates a failed result caused by `cause`.
    pub fn failure_with<E>(reason: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Failure {
            reason: reason.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Returns `true` for the success branch.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the deserialized message.
    ///
    /// # Panics
    ///
    /// Panics if this is a failure.
    pub fn deserialized_message(&self) -> &(dyn Any + Send + Sync) {
        match self {
            Self::Success(message) => &**message,
            Self::Failure { reason, .. } => {
                panic!("cannot access the deserialized message of a failed body result: {reason}")
            }
        }
    }

    /// Returns the failure reason.
    ///
    /// # Panics
    ///
    /// Panics if this is a success.
    pub fn failure_reason(&self) -> &str {
        match self {
            Self::Failure { reason, .. } => reason,
            Self::Success(_) => {
                panic!("cannot access the failure reason of a successful body result")
            }
        }
    }

    /// Returns the failure cause, if this is a failure that has one.
    pub fn failure_cause(&self) -> Option<&SharedError> {
        match self {
            Self::Failure { cause, .. } => cause.as_ref(),
            Self::Success(_) => None,
        }
    }

    /// Takes the message out as `T`.
    ///
    /// Returns `Err(self)` unchanged if this is a failure or the message is
    /// of a different type.
    pub fn into_message<T: Any>(self) -> Result<T, Self> {
        match self {
            Self::Success(message) => match message.downcast::<T>() {
                Ok(typed) => Ok(*typed),
                Err(other) => Err(Self::Success(other)),
            },
            failure => Err(failure),
        }
    }
}

impl fmt::Debug for MessageBodyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.debug_tuple("Success").finish_non_exhaustive(),
            Self::Failure { reason, cause } => f
                .debug_struct("Failure")
                .field("reason", reason)
                .field("cause", &cause.as_ref().map(|c| c.to_string()))
                .finish(),
        }
    }
}

// =============================================================================
// Body Decoding
// =============================================================================

/// Character encodings the router recognises in the `Encoding` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// UTF-8 (the fallback).
    #[default]
    Utf8,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-16, big endian.
    Utf16Be,
    /// 7-bit ASCII; other bytes become `?`.
    Ascii,
    /// ISO-8859-1.
    Latin1,
}

impl BodyEncoding {
    /// Resolves an encoding name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Self::Utf8,
            "utf-16" | "utf16" | "utf-16le" | "unicode" => Self::Utf16Le,
            "utf-16be" | "bigendianunicode" => Self::Utf16Be,
            "us-ascii" | "ascii" => Self::Ascii,
            "iso-8859-1" | "latin1" => Self::Latin1,
            _ => return None,
        })
    }

    /// Decodes `bytes`, replacing invalid sequences.
    pub fn decode(self, bytes: &[u8]) -> String {
        let text = match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Self::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        };

        if text.starts_with('\u{feff}') {
            text['\u{feff}'.len_utf8()..].to_string()
        } else {
            text
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let mut chunks = bytes.chunks_exact(2);
    let units = chunks.by_ref().map(|pair| unit([pair[0], pair[1]]));
    let mut text: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if !chunks.remainder().is_empty() {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Decodes a raw body using the encoding declared by the context.
///
/// An absent or unrecognised `Encoding` property falls back to UTF-8.
pub fn decode_body(body: &[u8], context: &MessageContext) -> String {
    let encoding = match context.encoding() {
        Some(name) => BodyEncoding::from_name(name).unwrap_or_else(|| {
            trace!(
                message_id = %context.message_id(),
                encoding = %name,
                "Unrecognised body encoding, falling back to UTF-8"
            );
            BodyEncoding::Utf8
        }),
        None => BodyEncoding::Utf8,
    };
    encoding.decode(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    #[derive(Debug, PartialEq)]
    struct Order {
        id: u32,
    }

    fn ctx_with_encoding(encoding: Option<&str>) -> MessageContext {
        let ctx = MessageContext::new("msg-1", "job").unwrap();
        match encoding {
            Some(e) => ctx.property_set("Encoding", e),
            None => ctx,
        }
    }

    #[test]
    fn test_success_accessors() {
        let result = MessageBodyResult::success(Order { id: 7 });
        assert!(result.is_success());
        assert!(result.failure_cause().is_none());
        assert_eq!(
            result.deserialized_message().downcast_ref::<Order>(),
            Some(&Order { id: 7 })
        );
        assert_eq!(result.into_message::<Order>().unwrap(), Order { id: 7 });
    }

    #[test]
    fn test_into_message_wrong_type_keeps_value() {
        let result = MessageBodyResult::success(Order { id: 7 });
        let back = result.into_message::<String>().unwrap_err();
        assert_eq!(back.into_message::<Order>().unwrap(), Order { id: 7 });
    }

    #[test]
    fn test_failure_accessors() {
        let result = MessageBodyResult::failure_with("bad body", HandlerError::failed("cause"));
        assert!(!result.is_success());
        assert_eq!(result.failure_reason(), "bad body");
        assert_eq!(result.failure_cause().unwrap().to_string(), "cause");
    }

    #[test]
    #[should_panic(expected = "failed body result")]
    fn test_message_of_failure_panics() {
        MessageBodyResult::failure("nope").deserialized_message();
    }

    #[test]
    #[should_panic(expected = "successful body result")]
    fn test_reason_of_success_panics() {
        MessageBodyResult::success(1u8).failure_reason();
    }

    #[test]
    fn test_decode_defaults_to_utf8() {
        let ctx = ctx_with_encoding(None);
        assert_eq!(decode_body("{\"name\":\"Jané\"}".as_bytes(), &ctx), "{\"name\":\"Jané\"}");
    }

    #[test]
    fn test_decode_unknown_encoding_falls_back() {
        let ctx = ctx_with_encoding(Some("ebcdic"));
        assert_eq!(decode_body(b"{}", &ctx), "{}");
    }

    #[test]
    fn test_decode_utf16() {
        let le: Vec<u8> = "{}".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let be: Vec<u8> = "{}".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(decode_body(&le, &ctx_with_encoding(Some("UTF-16"))), "{}");
        assert_eq!(decode_body(&be, &ctx_with_encoding(Some("utf-16BE"))), "{}");
    }

    #[test]
    fn test_decode_latin1_and_ascii() {
        assert_eq!(BodyEncoding::Latin1.decode(&[0x63, 0x61, 0x66, 0xe9]), "café");
        assert_eq!(BodyEncoding::Ascii.decode(&[0x63, 0xe9]), "c?");
    }

    #[test]
    fn test_decode_strips_bom_and_replaces_invalid() {
        assert_eq!(BodyEncoding::Utf8.decode(b"\xef\xbb\xbf{}"), "{}");
        assert_eq!(BodyEncoding::Utf8.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn test_empty_body_decodes_to_empty_string() {
        assert_eq!(decode_body(b"", &ctx_with_encoding(None)), "");
    }
}
