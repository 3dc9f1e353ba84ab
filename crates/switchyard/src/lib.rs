//! # Switchyard
//!
//! Type-safe matching and routing of received messages to handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌───────────────┐    ┌─────────────────────────────┐
//! │ Transport │───▶│ MessageRouter │───▶│ Registration #1 gates ─▶ H1 │
//! │ (body +   │    │ first match   │───▶│ Registration #2 gates ─▶ H2 │
//! │  context) │    │ wins          │───▶│ ... then fallback handler   │
//! └───────────┘    └───────────────┘    └─────────────────────────────┘
//! ```
//!
//! Each registration checks, in order: job scope, context type, context
//! filters, deserialization (custom first, then JSON) and body filters.
//! Every check is recorded in a [`HandlerSummary`](core::HandlerSummary), so a
//! message nobody took can be explained.
//!
//! - **Core**: contexts, body decoding, results and diagnostics
//! - **Router**: handlers, registrations, the router and its Tower service
//! - **Runtime**: configuration and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Order { id: u32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = SwitchyardRuntime::load()?;
//!     let router = runtime
//!         .router_builder()
//!         .register(
//!             Registration::for_message::<Order, _>(handler_fn(
//!                 |order: Order, _ctx: HandlerContext| async move {
//!                     tracing::info!(order = order.id, "Order received");
//!                     Ok(())
//!                 },
//!             ))
//!             .context_filter(|ctx| ctx.property_str("Topic") == Some("Orders")),
//!         )
//!         .build();
//!
//!     let context = MessageContext::new("msg-1", "pump-1")?.property_set("Topic", "Orders");
//!     let result = router
//!         .route(
//!             br#"{"id": 1}"#,
//!             &context,
//!             &MessageCorrelation::new("op", "tx"),
//!             &CancellationToken::new(),
//!         )
//!         .await;
//!     assert!(result.is_successful());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: `switchyard.toml` configuration files (default)
//! - `yaml-config`: `switchyard.yaml` configuration files
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_router as router;
pub use switchyard_runtime as runtime;

/// Commonly used types.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use switchyard_runtime::{ConfigLoader, SwitchyardConfig, SwitchyardRuntime};

    // Routing
    pub use switchyard_router::{
        HandlerContext, MessageHandler, MessageRouter, Registration, RoutedMessage, RouterOptions,
        handler_fn,
    };

    // Messages, contexts and results
    pub use switchyard_core::{
        CancellationToken, HandlerError, HandlerResult, HandlerSummary, MessageContext,
        MessageCorrelation, MessageProcessingError, ProcessingResult, RoutingContext,
        UnknownFieldPolicy,
    };
}
