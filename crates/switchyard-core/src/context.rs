//! Message context and type descriptors.
//!
//! The router sees every incoming message through the [`RoutingContext`]
//! trait. Transports either use [`MessageContext`] directly or wrap it in a
//! richer type of their own:
//!
//! ```rust,ignore
//! #[derive(Clone)]
//! struct QueueContext {
//!     base: MessageContext,
//!     delivery_count: u32,
//! }
//!
//! impl RoutingContext for QueueContext {
//!     fn base(&self) -> &MessageContext {
//!         &self.base
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//! ```
//!
//! A handler registered for `MessageContext` accepts a `QueueContext` too,
//! because the default [`RoutingContext::view`] exposes the base context.
//! Handlers registered for `QueueContext` only see messages whose context
//! really is a `QueueContext`.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::ContextError;

/// Property key carrying the body's character encoding.
pub const ENCODING_PROPERTY: &str = "Encoding";

// =============================================================================
// TypeDescriptor
// =============================================================================

/// Runtime description of a message or context type.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Describes the type `T`.
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type identifier.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully-qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }

    /// Returns `true` if this descriptor describes `T`.
    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// =============================================================================
// RoutingContext
// =============================================================================

/// The router-visible view of a message context.
///
/// Implementors must return themselves from [`as_any`](Self::as_any). The
/// default [`view`](Self::view) answers for the concrete type and for
/// [`MessageContext`]; override it to expose further context types a
/// handler may register for.
pub trait RoutingContext: Any + Send + Sync {
    /// Returns the transport-independent part of the context.
    fn base(&self) -> &MessageContext;

    /// Returns `self` as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns this context viewed as the type identified by `type_id`, or
    /// `None` if the context is not that type (or a subtype of it).
    fn view(&self, type_id: TypeId) -> Option<&dyn Any> {
        let own = self.as_any();
        if Any::type_id(own) == type_id {
            Some(own)
        } else if type_id == TypeId::of::<MessageContext>() {
            Some(self.base() as &dyn Any)
        } else {
            None
        }
    }
}

impl dyn RoutingContext {
    /// Downcasts the context to `C`, honouring [`RoutingContext::view`].
    pub fn downcast_ref<C: Any>(&self) -> Option<&C> {
        self.view(TypeId::of::<C>())
            .and_then(|any| any.downcast_ref::<C>())
    }

    /// Returns the message identifier.
    pub fn message_id(&self) -> &str {
        self.base().message_id()
    }

    /// Returns the job identifier.
    pub fn job_id(&self) -> &str {
        self.base().job_id()
    }
}

// =============================================================================
// MessageContext
// =============================================================================

/// Per-message metadata built by the transport for one received message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageContext {
    message_id: String,
    job_id: String,
    properties: BTreeMap<String, Value>,
}

impl MessageContext {
    /// Creates a context with no properties.
    pub fn new(
        message_id: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Result<Self, ContextError> {
        Self::with_properties(message_id, job_id, BTreeMap::new())
    }

    /// Creates a context carrying the given transport/user properties.
    pub fn with_properties(
        message_id: impl Into<String>,
        job_id: impl Into<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<Self, ContextError> {
        let message_id = message_id.into();
        if message_id.is_empty() {
            return Err(ContextError::EmptyMessageId);
        }
        Ok(Self {
            message_id,
            job_id: job_id.into(),
            properties,
        })
    }

    /// Adds a property (builder pattern).
    pub fn property_set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the message identifier.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the identifier of the consuming job.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Returns all properties.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Looks up a property by key.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Looks up a string property by key.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }

    /// Returns the declared body encoding, if any.
    pub fn encoding(&self) -> Option<&str> {
        self.property_str(ENCODING_PROPERTY)
    }
}

impl RoutingContext for MessageContext {
    fn base(&self) -> &MessageContext {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
