//! State-transition notification.
//!
//! The engine emits an event for every instance state change. Delivery is
//! at-least-once and a failing subscriber never affects engine state: the
//! error is logged and the remaining listeners still run.

use alder_workflow_types::{WorkflowInstanceId, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One instance state change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateTransition {
    pub instance_id: WorkflowInstanceId,
    pub old_state: WorkflowState,
    pub new_state: WorkflowState,
    /// Index of the next operation to dispatch at the time of the change
    pub position: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Error a listener may report; logged by the engine and otherwise ignored.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotifyError(String);

impl NotifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External subscriber interface for state-transition events.
pub trait TransitionListener: Send + Sync {
    fn on_transition(&self, transition: &StateTransition) -> Result<(), NotifyError>;
}
