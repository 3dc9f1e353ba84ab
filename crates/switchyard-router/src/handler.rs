//! Message handlers.
//!
//! A handler receives one typed message together with a [`HandlerContext`]
//! holding the typed message context, the correlation information and the
//! caller's cancellation token.
//!
//! # Example
//!
//! ```rust,ignore
//! use switchyard_router::{HandlerContext, MessageHandler, handler_fn};
//!
//! struct OrderHandler;
//!
//! #[async_trait]
//! impl MessageHandler<Order> for OrderHandler {
//!     async fn handle(&self, order: Order, ctx: HandlerContext) -> HandlerResult {
//!         println!("order {} for {}", order.id, ctx.message_id());
//!         Ok(())
//!     }
//! }
//!
//! // Or from an async closure
//! let handler = handler_fn(|customer: Customer, _ctx: HandlerContext| async move {
//!     println!("customer {}", customer.name);
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use switchyard_core::{
    CancellationToken, HandlerError, HandlerResult, MessageContext, MessageCorrelation,
    RoutingContext,
};

use crate::error::panic_message;

/// Everything a handler gets besides the message itself.
#[derive(Debug, Clone)]
pub struct HandlerContext<C = MessageContext> {
    context: C,
    correlation: MessageCorrelation,
    cancellation: CancellationToken,
}

impl<C> HandlerContext<C> {
    /// Creates a handler context.
    pub fn new(
        context: C,
        correlation: MessageCorrelation,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            context,
            correlation,
            cancellation,
        }
    }

    /// Returns the typed message context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Returns the correlation information.
    pub fn correlation(&self) -> &MessageCorrelation {
        &self.correlation
    }

    /// Returns the caller's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the caller asked processing to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Splits the handler context into its parts.
    pub fn into_parts(self) -> (C, MessageCorrelation, CancellationToken) {
        (self.context, self.correlation, self.cancellation)
    }
}

impl<C: RoutingContext> HandlerContext<C> {
    /// Returns the identifier of the message being handled.
    pub fn message_id(&self) -> &str {
        self.context.base().message_id()
    }

    /// Returns the identifier of the job consuming the message.
    pub fn job_id(&self) -> &str {
        self.context.base().job_id()
    }
}

/// Business logic for one message type `M` under context type `C`.
///
/// Return [`HandlerError::Failed`](switchyard_core::HandlerError::Failed)
/// to signal an expected failure; the router reports it as
/// `MatchedHandlerFailed`. Cancellation, interruptions and panics are
/// reported as `ProcessingInterrupted`.
#[async_trait]
pub trait MessageHandler<M, C = MessageContext>: Send + Sync + 'static
where
    M: Send + 'static,
    C: Send + 'static,
{
    /// Processes one message.
    async fn handle(&self, message: M, ctx: HandlerContext<C>) -> HandlerResult;
}

#[async_trait]
impl<M, C, H> MessageHandler<M, C> for Arc<H>
where
    M: Send + 'static,
    C: Send + 'static,
    H: MessageHandler<M, C> + ?Sized,
{
    async fn handle(&self, message: M, ctx: HandlerContext<C>) -> HandlerResult {
        (**self).handle(message, ctx).await
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedMessageHandler<M, C = MessageContext> = Arc<dyn MessageHandler<M, C>>;

// ============================================================================
// HandlerFn - async closures as handlers
// ============================================================================

/// Adapts an async closure into a [`MessageHandler`].
///
/// Created by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Converts an async closure into a [`MessageHandler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut, M, C> MessageHandler<M, C> for HandlerFn<F>
where
    F: Fn(M, HandlerContext<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
    M: Send + 'static,
    C: Send + 'static,
{
    async fn handle(&self, message: M, ctx: HandlerContext<C>) -> HandlerResult {
        (self.f)(message, ctx).await
    }
}

/// Invokes `handler`, turning a panic into [`HandlerError::Panicked`].
pub(crate) async fn invoke_handler<M, C, H>(
    handler: &H,
    message: M,
    ctx: HandlerContext<C>,
) -> HandlerResult
where
    M: Send + 'static,
    C: Send + 'static,
    H: MessageHandler<M, C> + ?Sized,
{
    AssertUnwindSafe(handler.handle(message, ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}
