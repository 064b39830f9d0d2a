//! Error taxonomy for the workflow engine.
//!
//! Operation-level failures are absorbed by the executor and recorded on the
//! failing operation instance; callers of the engine never see a raw handler
//! error. `kind()` provides the stable machine-readable label surfaced by
//! status queries and mapped to CLI exit codes.

use crate::{WorkflowDefinitionId, WorkflowInstanceId};
use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised by the workflow engine and its collaborators.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed or empty workflow definition; no instance is created.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("workflow definition '{0}' not found")]
    DefinitionNotFound(WorkflowDefinitionId),

    #[error("workflow instance '{0}' not found")]
    InstanceNotFound(WorkflowInstanceId),

    /// A configuration template references a variable that is not set.
    #[error("configuration key '{key}' references undefined variable '{name}'")]
    UnresolvedVariable { key: String, name: String },

    /// An execute-if expression could not be evaluated.
    #[error("malformed condition expression '{0}'")]
    InvalidCondition(String),

    #[error("malformed flavor '{0}'")]
    InvalidFlavor(String),

    /// The operation names a handler absent from the registry.
    #[error("no handler registered for operation '{0}'")]
    HandlerNotFound(String),

    /// The handler itself raised an error while processing.
    #[error("operation handler '{handler}' failed: {message}")]
    HandlerExecution { handler: String, message: String },

    /// A control call raced an active dispatch (or targeted an instance in a
    /// state that cannot accept it). The caller must retry.
    #[error("concurrent modification rejected for workflow instance '{0}'")]
    ConcurrentModification(WorkflowInstanceId),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WorkflowError {
    /// Stable label for status surfaces and exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDefinition(_) => "invalid-definition",
            Self::DefinitionNotFound(_) => "definition-not-found",
            Self::InstanceNotFound(_) => "instance-not-found",
            Self::UnresolvedVariable { .. } => "unresolved-variable",
            Self::InvalidCondition(_) => "invalid-condition",
            Self::InvalidFlavor(_) => "invalid-flavor",
            Self::HandlerNotFound(_) => "handler-not-found",
            Self::HandlerExecution { .. } => "handler-execution",
            Self::ConcurrentModification(_) => "concurrent-modification",
            Self::Persistence(_) => "persistence",
        }
    }
}
