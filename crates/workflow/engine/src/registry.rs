//! Handler registry: maps operation names to their handler implementations.
//!
//! Handlers are dynamically loadable plugins, so registration may happen at
//! any time and must be visible to in-flight lookups. Reads share the lock;
//! only registration and removal take it exclusively.

use crate::handler::OperationHandler;
use alder_workflow_types::{WorkflowError, WorkflowResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe registry of operation handlers, cheap to clone and share.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn OperationHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an operation name, replacing any previous
    /// registration for that name.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn OperationHandler>) {
        let name = name.into();
        self.write().insert(name.clone(), handler);
        tracing::info!(handler = %name, "operation handler registered");
    }

    /// Remove a handler. Returns false if the name was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            tracing::info!(handler = %name, "operation handler unregistered");
        }
        removed
    }

    /// Look up the handler for an operation name.
    ///
    /// A miss is a configuration error: the engine records it as a fatal
    /// operation failure, there is no retry.
    pub fn lookup(&self, name: &str) -> WorkflowResult<Arc<dyn OperationHandler>> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::HandlerNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    // A poisoned lock only means a writer panicked; the map is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn OperationHandler>>> {
        self.handlers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn OperationHandler>>> {
        self.handlers.write().unwrap_or_else(|e| e.into_inner())
    }
}
