//! # Switchyard Core
//!
//! Foundation types for the Switchyard message router.
//!
//! This crate holds everything the routing engine and the transports agree
//! on, without any routing logic of its own:
//!
//! - **Context**: [`MessageContext`], the [`RoutingContext`] trait for
//!   transport-specific contexts, and [`TypeDescriptor`]
//! - **Correlation**: [`MessageCorrelation`], passed through untouched
//! - **Bodies**: [`MessageBodyResult`] and character decoding ([`decode_body`])
//! - **Deserialization**: the [`MessageBodyDeserializer`] extension point and
//!   the default [`JsonBodyDeserializer`] with its [`UnknownFieldPolicy`]
//! - **Results**: [`ProcessingResult`] and [`MessageProcessingError`]
//! - **Diagnostics**: [`HandlerSummary`]
//!
//! ```text
//! ┌───────────┐  body, context, correlation  ┌──────────┐     ┌─────────┐
//! │ Transport │─────────────────────────────▶│  Router  │────▶│ Handler │
//! │  (pump)   │◀─────────────────────────────│          │     └─────────┘
//! └───────────┘       ProcessingResult       └──────────┘
//! ```

pub mod body;
pub mod context;
pub mod correlation;
pub mod deserialize;
pub mod error;
pub mod result;
pub mod summary;

pub use body::{BodyEncoding, MessageBodyResult, decode_body};
pub use context::{ENCODING_PROPERTY, MessageContext, RoutingContext, TypeDescriptor};
pub use correlation::MessageCorrelation;
pub use deserialize::{JsonBodyDeserializer, MessageBodyDeserializer, UnknownFieldPolicy};
pub use error::{
    AggregateError, BodyError, BoxError, ContextError, HandlerError, HandlerResult, SharedError,
};
pub use result::{MessageProcessingError, ProcessingResult};
pub use summary::{CheckLine, HandlerSummary};

// Cancellation is part of every handler signature.
pub use tokio_util::sync::CancellationToken;
