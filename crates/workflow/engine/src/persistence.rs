//! Persistence collaborator.
//!
//! The engine saves every instance at every transition boundary so a process
//! restart can resume any paused instance. The storage format is the
//! adapter's concern; the in-memory adapter here is the deterministic,
//! test-friendly reference implementation.

use alder_workflow_types::{WorkflowError, WorkflowInstance, WorkflowInstanceId, WorkflowResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage interface for workflow instances.
pub trait PersistenceStore: Send + Sync {
    /// Persist the instance, replacing any previous snapshot.
    fn save(&self, instance: &WorkflowInstance) -> WorkflowResult<()>;

    /// Load an instance snapshot by id.
    fn load(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowInstance>;

    /// All stored instances, in no particular order.
    fn list(&self) -> WorkflowResult<Vec<WorkflowInstance>>;
}

/// In-memory persistence adapter.
#[derive(Default)]
pub struct InMemoryStore {
    instances: RwLock<HashMap<WorkflowInstanceId, WorkflowInstance>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl PersistenceStore for InMemoryStore {
    fn save(&self, instance: &WorkflowInstance) -> WorkflowResult<()> {
        self.instances
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    fn load(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowInstance> {
        self.instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::InstanceNotFound(id.clone()))
    }

    fn list(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self
            .instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }
}
