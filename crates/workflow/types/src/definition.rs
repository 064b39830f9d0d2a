//! Workflow definitions: reusable ordered templates of operations.
//!
//! A definition is immutable once registered; instances snapshot its
//! operation specs at instantiation time and never write back.

use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowDefinitionId(pub String);

impl WorkflowDefinitionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowDefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Failure Policy ───────────────────────────────────────────────────

/// What the engine does when an operation fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// The failure propagates to the instance (routing to the
    /// exception-handler workflow if one is configured).
    #[default]
    Fail,
    /// The operation is marked failed for audit, execution proceeds.
    Continue,
}

// ── Operation Spec ───────────────────────────────────────────────────

/// One step template within a workflow definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Name of the handler that executes this operation
    pub handler: String,
    /// What this step accomplishes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Static configuration; values may reference `${variable}`s, resolved
    /// at the moment the operation becomes current
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub configuration: HashMap<String, String>,
    /// Boolean expression over instance variables; false skips the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_condition: Option<String>,
    /// Failure policy override ("fail-on-error")
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Fallback workflow to run when this operation fails under `Fail`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_handler_workflow: Option<WorkflowDefinitionId>,
}

impl OperationSpec {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            description: String::new(),
            configuration: HashMap::new(),
            execute_condition: None,
            failure_policy: FailurePolicy::Fail,
            exception_handler_workflow: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, expression: impl Into<String>) -> Self {
        self.execute_condition = Some(expression.into());
        self
    }

    /// Mark this step non-fatal: a failure is recorded and execution proceeds.
    pub fn continue_on_error(mut self) -> Self {
        self.failure_policy = FailurePolicy::Continue;
        self
    }

    pub fn with_exception_handler(mut self, definition_id: WorkflowDefinitionId) -> Self {
        self.exception_handler_workflow = Some(definition_id);
        self
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// An ordered template of operation specs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier
    pub id: WorkflowDefinitionId,
    /// Human-readable title
    pub title: String,
    /// Description of what this workflow accomplishes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The ordered operation templates
    pub operations: Vec<OperationSpec>,
    /// When this definition was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create a new definition with a generated id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: WorkflowDefinitionId::generate(),
            title: title.into(),
            description: String::new(),
            operations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = WorkflowDefinitionId::new(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_operation(mut self, spec: OperationSpec) -> Self {
        self.operations.push(spec);
        self
    }

    pub fn add_operation(&mut self, spec: OperationSpec) {
        self.operations.push(spec);
    }

    /// Get an operation spec by position
    pub fn operation(&self, position: usize) -> Option<&OperationSpec> {
        self.operations.get(position)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Validate the definition for structural correctness
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.operations.is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "definition '{}' has no operations",
                self.id
            )));
        }
        for (position, spec) in self.operations.iter().enumerate() {
            if spec.handler.trim().is_empty() {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "definition '{}' operation {} has a blank handler name",
                    self.id, position
                )));
            }
        }
        Ok(())
    }
}
