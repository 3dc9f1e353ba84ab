//! Tower integration.
//!
//! `MessageRouter` implements `tower::Service<RoutedMessage>`, so transports
//! can stack tower middleware in front of routing:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(16)
//!     .service(router);
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use switchyard_core::{CancellationToken, MessageCorrelation, ProcessingResult, RoutingContext};
use tower::Service;

use crate::router::MessageRouter;

/// One received message, owned, as handed to the router service.
#[derive(Clone)]
pub struct RoutedMessage {
    /// The raw message body.
    pub body: Vec<u8>,
    /// The message context.
    pub context: Arc<dyn RoutingContext>,
    /// The correlation information.
    pub correlation: MessageCorrelation,
    /// The caller's cancellation token.
    pub cancellation: CancellationToken,
}

impl RoutedMessage {
    /// Creates a routed message with a fresh cancellation token.
    pub fn new(
        body: impl Into<Vec<u8>>,
        context: impl RoutingContext,
        correlation: MessageCorrelation,
    ) -> Self {
        Self {
            body: body.into(),
            context: Arc::new(context),
            correlation,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

impl std::fmt::Debug for RoutedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedMessage")
            .field("message_id", &self.context.message_id())
            .field("job_id", &self.context.job_id())
            .field("body_len", &self.body.len())
            .field("correlation", &self.correlation)
            .finish()
    }
}

impl Service<RoutedMessage> for MessageRouter {
    type Response = ProcessingResult;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: RoutedMessage) -> Self::Future {
        let router = self.clone();

        Box::pin(async move {
            let result = router
                .route(
                    &message.body,
                    message.context.as_ref(),
                    &message.correlation,
                    &message.cancellation,
                )
                .await;
            Ok(result)
        })
    }
}
