//! Workflow instances: running executions of workflow definitions.
//!
//! An instance owns a snapshot copy of its definition's operation specs,
//! the media item being processed, and the variable mapping shared by all
//! operations. It is mutated only by the engine holding its dispatch claim
//! and is persisted at every transition boundary so a process restart can
//! resume any paused instance.

use crate::definition::{FailurePolicy, OperationSpec, WorkflowDefinition, WorkflowDefinitionId};
use crate::media::MediaItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Instance Identifier ──────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

impl WorkflowInstanceId {
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

impl std::fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── States ───────────────────────────────────────────────────────────

/// The lifecycle state of a workflow instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Created by the instantiator, not yet dispatched
    #[default]
    Instantiated,
    /// Under active dispatch
    Running,
    /// Suspended between operations, awaiting an external resume
    Paused,
    /// All operations finished (or a handler reported Stop)
    Succeeded,
    /// An operation failed under the Fail policy with no working fallback
    Failed,
    /// Abandoned by an operator stop
    Stopped,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Instantiated => "instantiated",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// The state of one operation within an instance.
///
/// Operations move forward monotonically; a finished operation is never
/// re-entered except by an explicit retry directive resetting it to Pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Skipped,
    Failed,
}

impl OperationState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped | Self::Failed)
    }
}

// ── Continuation Action ──────────────────────────────────────────────

/// The continuation directive a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Proceed to the next operation
    Continue,
    /// Suspend after this operation until an external resume
    Pause,
    /// Mark this operation skipped, plus `additional` following ones
    Skip { additional: u32 },
    /// Terminate the whole instance successfully at this point
    Stop,
}

impl Action {
    /// Skip only the current operation.
    pub fn skip() -> Self {
        Self::Skip { additional: 0 }
    }

    /// Skip the current operation and `additional` subsequent ones.
    pub fn skip_ahead(additional: u32) -> Self {
        Self::Skip { additional }
    }
}

// ── Operation Instance ───────────────────────────────────────────────

/// Recorded cause of an operation failure, for audit and status surfaces
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Stable error-kind label (see `WorkflowError::kind`)
    pub kind: String,
    pub message: String,
}

/// One step's runtime record within an instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationInstance {
    /// Index into the instance's operation list
    pub position: usize,
    /// Name of the handler that executes this operation
    pub handler: String,
    /// Spec configuration, re-written with resolved values when the
    /// operation becomes current
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub configuration: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_condition: Option<String>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_handler_workflow: Option<WorkflowDefinitionId>,
    pub state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
    /// Continuation recorded by the last execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OperationInstance {
    /// Snapshot an operation spec into a pending runtime record
    pub fn from_spec(position: usize, spec: &OperationSpec) -> Self {
        Self {
            position,
            handler: spec.handler.clone(),
            configuration: spec.configuration.clone(),
            execute_condition: spec.execute_condition.clone(),
            failure_policy: spec.failure_policy,
            exception_handler_workflow: spec.exception_handler_workflow.clone(),
            state: OperationState::Pending,
            failure: None,
            action: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Reset to Pending for an explicit retry directive
    pub fn reset(&mut self) {
        self.state = OperationState::Pending;
        self.failure = None;
        self.action = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

// ── Workflow Instance ────────────────────────────────────────────────

/// One in-progress or completed run of a definition against a media item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique instance identifier
    pub id: WorkflowInstanceId,
    /// The definition this instance was created from
    pub definition_id: WorkflowDefinitionId,
    /// The media item being processed
    pub media: MediaItem,
    /// Snapshot copies of the definition's operation specs
    pub operations: Vec<OperationInstance>,
    /// Instance variables, readable and writable by any operation while it
    /// executes, frozen between operations
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
    /// Current lifecycle state
    pub state: WorkflowState,
    /// Index of the next operation to dispatch
    pub position: usize,
    /// Fallback instance spawned by exception-handler routing, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_handler_instance: Option<WorkflowInstanceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Bind a definition to a media item, snapshotting every operation spec
    /// into a Pending operation instance.
    pub fn new(
        definition: &WorkflowDefinition,
        media: MediaItem,
        variables: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        let operations = definition
            .operations
            .iter()
            .enumerate()
            .map(|(position, spec)| OperationInstance::from_spec(position, spec))
            .collect();
        Self {
            id: WorkflowInstanceId::generate(),
            definition_id: definition.id.clone(),
            media,
            operations,
            variables,
            state: WorkflowState::Instantiated,
            position: 0,
            exception_handler_instance: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    // ── Instance state transitions ───────────────────────────────────

    /// Enter Running from Instantiated
    pub fn start(&mut self) {
        self.state = WorkflowState::Running;
        self.touch();
    }

    /// Re-enter Running from Paused
    pub fn resume(&mut self) {
        self.state = WorkflowState::Running;
        self.touch();
    }

    /// Suspend with `next_position` as the operation to dispatch on resume
    pub fn pause_at(&mut self, next_position: usize) {
        self.state = WorkflowState::Paused;
        self.position = next_position;
        self.touch();
    }

    pub fn succeed(&mut self) {
        self.state = WorkflowState::Succeeded;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn fail(&mut self) {
        self.state = WorkflowState::Failed;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Abandon remaining operations without invoking their handlers
    pub fn stop(&mut self) {
        self.state = WorkflowState::Stopped;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    // ── Operation transitions ────────────────────────────────────────

    /// Make the operation current: store its resolved configuration and
    /// mark it Running.
    pub fn begin_operation(&mut self, position: usize, resolved: HashMap<String, String>) {
        if let Some(op) = self.operations.get_mut(position) {
            op.configuration = resolved;
            op.state = OperationState::Running;
            op.started_at = Some(Utc::now());
        }
        self.touch();
    }

    pub fn succeed_operation(&mut self, position: usize, action: Action) {
        if let Some(op) = self.operations.get_mut(position) {
            op.state = OperationState::Succeeded;
            op.action = Some(action);
            op.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    pub fn skip_operation(&mut self, position: usize) {
        if let Some(op) = self.operations.get_mut(position) {
            op.state = OperationState::Skipped;
            op.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    pub fn fail_operation(&mut self, position: usize, kind: &str, message: impl Into<String>) {
        if let Some(op) = self.operations.get_mut(position) {
            op.state = OperationState::Failed;
            op.failure = Some(OperationFailure {
                kind: kind.to_string(),
                message: message.into(),
            });
            op.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Explicit retry directive: reset the operation at `position` and every
    /// one after it to Pending.
    pub fn reset_operations_from(&mut self, position: usize) {
        for op in self.operations.iter_mut().skip(position) {
            op.reset();
        }
        self.touch();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn operation(&self, position: usize) -> Option<&OperationInstance> {
        self.operations.get(position)
    }

    /// The operation currently executing, if any
    pub fn current_operation(&self) -> Option<&OperationInstance> {
        self.operations
            .iter()
            .find(|op| op.state == OperationState::Running)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Externally visible snapshot for status queries
    pub fn status(&self) -> WorkflowStatus {
        let failure = self
            .operations
            .iter()
            .find(|op| op.state == OperationState::Failed)
            .and_then(|op| {
                op.failure.as_ref().map(|f| FailureReport {
                    position: op.position,
                    handler: op.handler.clone(),
                    kind: f.kind.clone(),
                    message: f.message.clone(),
                })
            });
        WorkflowStatus {
            instance_id: self.id.clone(),
            definition_id: self.definition_id.clone(),
            state: self.state,
            position: self.position,
            operations: self
                .operations
                .iter()
                .map(|op| OperationStatus {
                    position: op.position,
                    handler: op.handler.clone(),
                    state: op.state,
                })
                .collect(),
            failure,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ── Status Snapshot ──────────────────────────────────────────────────

/// Consistent, externally visible view of an instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub instance_id: WorkflowInstanceId,
    pub definition_id: WorkflowDefinitionId,
    pub state: WorkflowState,
    pub position: usize,
    pub operations: Vec<OperationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationStatus {
    pub position: usize,
    pub handler: String,
    pub state: OperationState,
}

/// Failed-operation details surfaced by `status`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureReport {
    pub position: usize,
    pub handler: String,
    pub kind: String,
    pub message: String,
}
