//! Action handler registration and dispatch.
//!
//! Action kinds are an open set: the engine ships no handler for any kind.
//! External collaborators register an [`ActionHandler`] per kind at
//! engine-construction time; dispatching an unregistered kind fails the
//! execution that attempted it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uniflow_types::error::ActionError;
use uniflow_types::workflow::ActionSpec;

/// The capability interface behind every action kind.
///
/// Implementations receive the action's configuration and a read-only view
/// of the execution context, and return a result value that the runtime
/// merges back into the context under `action_<step id>`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(
        &self,
        config: &HashMap<String, Value>,
        context: &HashMap<String, Value>,
    ) -> Result<Value, ActionError>;
}

/// Adapter that lets plain async closures act as handlers.
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(HashMap<String, Value>, HashMap<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    async fn call(
        &self,
        config: &HashMap<String, Value>,
        context: &HashMap<String, Value>,
    ) -> Result<Value, ActionError> {
        (self.0)(config.clone(), context.clone()).await
    }
}

/// Registry mapping action kinds to their handlers.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: DashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler for an action kind, replacing any previous one.
    pub fn register(&self, kind: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let kind = kind.into();
        tracing::debug!(kind = kind.as_str(), "action handler registered");
        self.handlers.insert(kind, handler);
    }

    /// Register an async closure as the handler for an action kind.
    pub fn register_fn<F, Fut>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(HashMap<String, Value>, HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.register(kind, Arc::new(FnHandler(handler)));
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Look up the handler for `action.kind` and invoke it with
    /// `(action.config, context)`.
    ///
    /// # Errors
    /// [`ActionError::NoHandler`] when no handler is registered for the kind;
    /// whatever the handler itself returns otherwise.
    pub async fn dispatch(
        &self,
        action: &ActionSpec,
        context: &HashMap<String, Value>,
    ) -> Result<Value, ActionError> {
        // Clone the Arc out before awaiting so no map guard is held across
        // the handler's await point.
        let handler = self
            .handlers
            .get(action.kind.as_str())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ActionError::NoHandler(action.kind.clone()))?;

        handler.call(&action.config, context).await
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.handlers.len())
            .finish()
    }
}
