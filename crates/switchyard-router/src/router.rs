//! The routing engine.
//!
//! [`MessageRouter`] holds the ordered registrations and routes each
//! incoming message to the first one whose gates all pass:
//!
//! 1. Registrations are tried in registration order; there is no priority.
//! 2. The first registration whose gates pass owns the message. Its handler
//!    runs once and its outcome is the routing outcome, success or failure.
//!    No later registration is tried, not even after a failure.
//! 3. When no registration matched, the fallback handler (if any) receives
//!    the decoded body; otherwise the result is `CannotFindMatchedHandler`.
//!
//! ```rust,ignore
//! let router = MessageRouter::builder()
//!     .register(Registration::for_message::<Order, _>(OrderHandler))
//!     .register(Registration::for_message::<Customer, _>(CustomerHandler))
//!     .fallback(handler_fn(|body: String, _ctx: HandlerContext| async move {
//!         tracing::warn!(%body, "Unrouted message");
//!         Ok(())
//!     }))
//!     .build();
//!
//! let result = router.route(body, &context, &correlation, &cancellation).await;
//! if result.is_successful() {
//!     receiver.complete(message).await?;
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use switchyard_core::{
    CancellationToken, HandlerError, HandlerResult, HandlerSummary, JsonBodyDeserializer,
    MessageContext, MessageCorrelation, MessageProcessingError, ProcessingResult, RoutingContext,
    UnknownFieldPolicy, decode_body,
};
use tracing::{Instrument, debug, debug_span, error, info, trace, warn};

use crate::handler::{HandlerContext, MessageHandler, invoke_handler};
use crate::registration::{Attempt, Delivery, Registration, RegistrationInfo};

/// Name under which the fallback handler appears in logs and traces.
pub const FALLBACK_HANDLER_NAME: &str = "fallback";

/// The catch-all handler, receiving the decoded body as text.
pub type FallbackHandler = Arc<dyn MessageHandler<String, MessageContext>>;

// ============================================================================
// Options
// ============================================================================

/// Router-wide settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// What the default deserializer does with undeclared fields.
    pub unknown_fields: UnknownFieldPolicy,
}

impl RouterOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unknown-field policy.
    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Returns the default deserializer these options configure.
    pub fn json_deserializer(&self) -> JsonBodyDeserializer {
        JsonBodyDeserializer::new(self.unknown_fields)
    }
}

// ============================================================================
// Routing trace
// ============================================================================

/// The gate record of one registration tried for a message.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    handler: String,
    matched: bool,
    summary: HandlerSummary,
}

impl AttemptRecord {
    /// Returns the registration name.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Returns `true` if every gate passed and the handler ran.
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Returns the gate summary.
    pub fn summary(&self) -> &HandlerSummary {
        &self.summary
    }
}

/// A routing result together with the record of every attempt.
#[derive(Debug, Clone)]
pub struct RoutingTrace {
    result: ProcessingResult,
    attempts: Vec<AttemptRecord>,
}

impl RoutingTrace {
    /// Returns the routing result.
    pub fn result(&self) -> &ProcessingResult {
        &self.result
    }

    /// Returns the attempts in the order they were made.
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Returns the name of the handler that ran, if any.
    pub fn matched_handler(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|attempt| attempt.matched)
            .map(AttemptRecord::handler)
    }

    /// Consumes the trace, returning the routing result.
    pub fn into_result(self) -> ProcessingResult {
        self.result
    }
}

// ============================================================================
// MessageRouter
// ============================================================================

struct RouterInner {
    options: RouterOptions,
    registrations: RwLock<Arc<Vec<Registration>>>,
    fallback: Option<FallbackHandler>,
}

/// Routes messages to the first matching registration.
///
/// # Cheap Cloning
///
/// Clones share the registrations and the fallback. Each routing call works
/// on a snapshot of the registrations, so [`add`](Self::add) never blocks
/// or disturbs messages already being routed.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

impl MessageRouter {
    /// Creates a router without registrations or fallback.
    pub fn new(options: RouterOptions) -> Self {
        Self::from_parts(options, Vec::new(), None)
    }

    /// Starts building a router.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    fn from_parts(
        options: RouterOptions,
        registrations: Vec<Registration>,
        fallback: Option<FallbackHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                options,
                registrations: RwLock::new(Arc::new(registrations)),
                fallback,
            }),
        }
    }

    /// Appends a registration; it is tried after all existing ones.
    pub fn add(&self, registration: impl Into<Registration>) {
        let registration = registration.into();
        debug!(handler = %registration.info(), "Registering message handler");

        let mut registrations = self.inner.registrations.write();
        Arc::make_mut(&mut *registrations).push(registration);
    }

    /// Returns the number of registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.registrations.read().len()
    }

    /// Describes the registrations in routing order.
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        self.snapshot()
            .iter()
            .map(|registration| registration.info().clone())
            .collect()
    }

    /// Returns `true` if a fallback handler is configured.
    pub fn has_fallback(&self) -> bool {
        self.inner.fallback.is_some()
    }

    /// Returns the router options.
    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    fn snapshot(&self) -> Arc<Vec<Registration>> {
        Arc::clone(&self.inner.registrations.read())
    }

    /// Routes a raw message body.
    ///
    /// The body is decoded using the context's `Encoding` property. Routing
    /// never fails with an error; every outcome is a [`ProcessingResult`].
    pub async fn route(
        &self,
        body: &[u8],
        context: &dyn RoutingContext,
        correlation: &MessageCorrelation,
        cancellation: &CancellationToken,
    ) -> ProcessingResult {
        self.route_traced(body, context, correlation, cancellation)
            .await
            .into_result()
    }

    /// Routes an already-decoded message body.
    pub async fn route_text(
        &self,
        body: &str,
        context: &dyn RoutingContext,
        correlation: &MessageCorrelation,
        cancellation: &CancellationToken,
    ) -> ProcessingResult {
        self.route_text_traced(body, context, correlation, cancellation)
            .await
            .into_result()
    }

    /// Routes a raw message body and returns the gate record of every attempt.
    pub async fn route_traced(
        &self,
        body: &[u8],
        context: &dyn RoutingContext,
        correlation: &MessageCorrelation,
        cancellation: &CancellationToken,
    ) -> RoutingTrace {
        let text = decode_body(body, context.base());
        self.route_text_traced(&text, context, correlation, cancellation)
            .await
    }

    /// Routes an already-decoded body and returns the gate record of every attempt.
    pub async fn route_text_traced(
        &self,
        body: &str,
        context: &dyn RoutingContext,
        correlation: &MessageCorrelation,
        cancellation: &CancellationToken,
    ) -> RoutingTrace {
        let span = debug_span!(
            "route",
            message_id = %context.message_id(),
            job_id = %context.job_id()
        );

        let trace = self
            .dispatch(body, context, correlation, cancellation)
            .instrument(span)
            .await;
        log_result(context.job_id(), &trace);
        trace
    }

    async fn dispatch(
        &self,
        body: &str,
        context: &dyn RoutingContext,
        correlation: &MessageCorrelation,
        cancellation: &CancellationToken,
    ) -> RoutingTrace {
        let message_id = context.message_id();
        let job_id = context.job_id();
        let registrations = self.snapshot();
        let delivery = Delivery {
            body,
            context,
            correlation,
            cancellation,
            json: self.inner.options.json_deserializer(),
        };
        let mut attempts = Vec::with_capacity(registrations.len() + 1);

        for registration in registrations.iter() {
            if cancellation.is_cancelled() {
                return RoutingTrace {
                    result: cancelled(message_id),
                    attempts,
                };
            }

            let name = registration.info().name();
            let mut summary = HandlerSummary::new();
            let attempt = registration.attempt(&delivery, &mut summary).await;
            let matched = matches!(attempt, Attempt::Invoked(_));
            log_attempt(job_id, message_id, name, matched, &summary);
            attempts.push(AttemptRecord {
                handler: name.to_string(),
                matched,
                summary,
            });

            if let Attempt::Invoked(outcome) = attempt {
                return RoutingTrace {
                    result: classify(message_id, name, outcome, cancellation, false),
                    attempts,
                };
            }
        }

        let reason = if registrations.is_empty() {
            "no handlers registered"
        } else {
            "no matched handler found for the message"
        };

        let Some(fallback) = &self.inner.fallback else {
            return RoutingTrace {
                result: ProcessingResult::failure(
                    message_id,
                    MessageProcessingError::CannotFindMatchedHandler,
                    reason,
                ),
                attempts,
            };
        };

        if cancellation.is_cancelled() {
            return RoutingTrace {
                result: cancelled(message_id),
                attempts,
            };
        }

        let mut summary = HandlerSummary::new();
        summary
            .add_passed("fallback handler invoked")
            .member("skipped_registrations", registrations.len());
        log_attempt(job_id, message_id, FALLBACK_HANDLER_NAME, true, &summary);
        attempts.push(AttemptRecord {
            handler: FALLBACK_HANDLER_NAME.to_string(),
            matched: true,
            summary,
        });

        let ctx = HandlerContext::new(
            context.base().clone(),
            correlation.clone(),
            cancellation.clone(),
        );
        let outcome = invoke_handler(fallback.as_ref(), body.to_string(), ctx).await;

        RoutingTrace {
            result: classify(message_id, FALLBACK_HANDLER_NAME, outcome, cancellation, true),
            attempts,
        }
    }
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("options", &self.inner.options)
            .field("registration_count", &self.registration_count())
            .field("has_fallback", &self.has_fallback())
            .finish()
    }
}

fn cancelled(message_id: &str) -> ProcessingResult {
    ProcessingResult::failure_with(
        message_id,
        MessageProcessingError::ProcessingInterrupted,
        "routing was cancelled before a handler took the message",
        Arc::new(HandlerError::Cancelled),
    )
}

/// Maps a handler outcome onto the processing result taxonomy.
fn classify(
    message_id: &str,
    handler: &str,
    outcome: HandlerResult,
    cancellation: &CancellationToken,
    fallback: bool,
) -> ProcessingResult {
    let err = match outcome {
        Ok(()) => return ProcessingResult::success(message_id),
        Err(err) => err,
    };

    let (kind, message) = if err.is_interruption() || cancellation.is_cancelled() {
        (
            MessageProcessingError::ProcessingInterrupted,
            format!("handler '{handler}' was interrupted while processing the message"),
        )
    } else if fallback && matches!(err, HandlerError::Declined) {
        (
            MessageProcessingError::CannotFindMatchedHandler,
            "no matched handler found and the fallback handler declined the message".to_string(),
        )
    } else {
        (
            MessageProcessingError::MatchedHandlerFailed,
            format!("handler '{handler}' failed to process the message"),
        )
    };

    ProcessingResult::failure_with(message_id, kind, message, Arc::new(err))
}

fn log_attempt(
    job_id: &str,
    message_id: &str,
    handler: &str,
    matched: bool,
    summary: &HandlerSummary,
) {
    let error = summary.captured_error().map(|err| err.to_string());
    if matched {
        debug!(
            job_id,
            message_id,
            handler,
            matched,
            error = error.as_deref(),
            summary = %summary,
            "Handler matched message"
        );
    } else {
        trace!(
            job_id,
            message_id,
            handler,
            matched,
            error = error.as_deref(),
            summary = %summary,
            "Handler skipped message"
        );
    }
}

fn log_result(job_id: &str, trace: &RoutingTrace) {
    let result = &trace.result;
    let message_id = result.message_id();
    let handler = trace.matched_handler();
    let cause = result.cause().map(|cause| cause.to_string());

    match result.error() {
        None => info!(job_id, message_id, handler, "Message processed"),
        Some(MessageProcessingError::CannotFindMatchedHandler) => warn!(
            job_id,
            message_id,
            attempts = trace.attempts.len(),
            reason = result.error_message(),
            "No handler matched message"
        ),
        Some(kind) => error!(
            job_id,
            message_id,
            handler,
            error_kind = %kind,
            reason = result.error_message(),
            error = cause.as_deref(),
            "Message processing failed"
        ),
    }
}

// ============================================================================
// RouterBuilder
// ============================================================================

/// Builder for a [`MessageRouter`].
#[derive(Default)]
pub struct RouterBuilder {
    options: RouterOptions,
    registrations: Vec<Registration>,
    fallback: Option<FallbackHandler>,
}

impl RouterBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the router options.
    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the unknown-field policy of the default deserializer.
    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.options.unknown_fields = policy;
        self
    }

    /// Appends a registration.
    pub fn register(mut self, registration: impl Into<Registration>) -> Self {
        self.registrations.push(registration.into());
        self
    }

    /// Sets the fallback handler, replacing any previous one.
    pub fn fallback<H>(mut self, handler: H) -> Self
    where
        H: MessageHandler<String, MessageContext>,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Builds the router.
    pub fn build(self) -> MessageRouter {
        info!(
            registrations = self.registrations.len(),
            fallback = self.fallback.is_some(),
            unknown_fields = ?self.options.unknown_fields,
            "Message router built"
        );
        for (index, registration) in self.registrations.iter().enumerate() {
            debug!(index, handler = %registration.info(), "Registered message handler");
        }

        MessageRouter::from_parts(self.options, self.registrations, self.fallback)
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("options", &self.options)
            .field("registrations", &self.registrations)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
