//! # Switchyard Router
//!
//! Handler matching and routing for Switchyard.
//!
//! - **Handlers**: [`MessageHandler`] and the [`handler_fn`] closure adapter
//! - **Registrations**: [`Registration`] with job scope, context and body
//!   filters, and an optional custom deserializer
//! - **Routing**: [`MessageRouter`], first match wins, with an optional
//!   fallback handler
//! - **Tower**: `MessageRouter` is a `Service<RoutedMessage>`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard_router::{HandlerContext, MessageRouter, Registration, handler_fn};
//!
//! let router = MessageRouter::builder()
//!     .register(
//!         Registration::for_message::<Order, _>(handler_fn(
//!             |order: Order, ctx: HandlerContext| async move {
//!                 let message_id = ctx.message_id();
//!                 tracing::info!(order = order.id, message_id, "Order received");
//!                 Ok(())
//!             },
//!         ))
//!         .context_filter(|ctx| ctx.property_str("Topic") == Some("Orders")),
//!     )
//!     .build();
//!
//! let result = router.route(body, &context, &correlation, &cancellation).await;
//! ```

pub mod error;
pub mod filter;
pub mod handler;
pub mod registration;
pub mod router;
pub mod service;

pub use error::GateError;
pub use filter::{FilterAxis, FilterChain, FilterOutcome, PredicateFn};
pub use handler::{BoxedMessageHandler, HandlerContext, HandlerFn, MessageHandler, handler_fn};
pub use registration::{Registration, RegistrationBuilder, RegistrationInfo, RoutableMessage};
pub use router::{
    AttemptRecord, FALLBACK_HANDLER_NAME, FallbackHandler, MessageRouter, RouterBuilder,
    RouterOptions, RoutingTrace,
};
pub use service::RoutedMessage;
