//! Definition registry: stores and retrieves workflow definitions.
//!
//! Definitions are immutable once registered; to change one, register a new
//! definition under a new id.

use alder_workflow_types::{WorkflowDefinition, WorkflowDefinitionId, WorkflowError, WorkflowResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of workflow definitions, shared across engine workers.
#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<WorkflowDefinitionId, Arc<WorkflowDefinition>>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition. Returns its id.
    pub fn register(&self, definition: WorkflowDefinition) -> WorkflowResult<WorkflowDefinitionId> {
        definition.validate()?;
        let id = definition.id.clone();
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), Arc::new(definition));
        tracing::info!(definition_id = %id, "workflow definition registered");
        Ok(id)
    }

    pub fn get(&self, id: &WorkflowDefinitionId) -> WorkflowResult<Arc<WorkflowDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))
    }

    pub fn contains(&self, id: &WorkflowDefinitionId) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    pub fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn remove(&self, id: &WorkflowDefinitionId) -> WorkflowResult<Arc<WorkflowDefinition>> {
        let removed = self
            .definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))?;
        tracing::info!(definition_id = %id, "workflow definition removed");
        Ok(removed)
    }
}
