//! Workflow domain types for the Alder media platform.
//!
//! A [`WorkflowDefinition`] is a reusable, ordered template of
//! [`OperationSpec`]s. The engine binds a definition to a [`MediaItem`] and
//! produces a [`WorkflowInstance`], whose [`OperationInstance`]s are walked
//! in definition order by the dispatch loop. Handlers report back a
//! continuation [`Action`] that tells the engine how to proceed.
//!
//! Definitions are immutable once registered. Instances are mutated only by
//! the engine holding their dispatch claim; everything here is serializable
//! so an instance can be persisted between steps and resumed after a process
//! restart.

pub mod definition;
pub mod error;
pub mod instance;
pub mod media;

pub use definition::{FailurePolicy, OperationSpec, WorkflowDefinition, WorkflowDefinitionId};
pub use error::{WorkflowError, WorkflowResult};
pub use instance::{
    Action, FailureReport, OperationFailure, OperationInstance, OperationState, OperationStatus,
    WorkflowInstance, WorkflowInstanceId, WorkflowState, WorkflowStatus,
};
pub use media::{ElementKind, Flavor, MediaElement, MediaItem, MediaItemId};
