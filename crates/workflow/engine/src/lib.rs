//! Workflow orchestration engine for the Alder media platform.
//!
//! The engine drives a media item through the ordered operations of a
//! workflow definition. Each operation is executed by a pluggable handler
//! looked up by name; the handler reports back a continuation action
//! (continue, pause, skip, stop) that the dispatch loop interprets.
//! Progress is persisted at every transition boundary, so a paused instance
//! survives a process restart and resumes where it left off.
//!
//! # Architecture
//!
//! - [`HandlerRegistry`] — maps operation names to [`OperationHandler`]
//!   plugins, registered at any time
//! - [`DefinitionRegistry`] — validated, immutable workflow definitions
//! - [`Instantiator`] — binds a definition and a media item into a
//!   `WorkflowInstance` of pending operations
//! - [`OperationExecutor`] — runs one operation: configuration resolution,
//!   execute-if evaluation, handler invocation, outcome recording
//! - [`WorkflowEngine`] — the per-instance state machine and dispatch loop,
//!   with pause/resume/stop control and failure routing
//! - [`WorkerPool`] — concurrent dispatch of independent instances
//!
//! # Example
//!
//! ```rust
//! use alder_workflow_engine::{
//!     HandlerContext, HandlerError, OperationHandler, OperationResult, WorkflowEngine,
//! };
//! use alder_workflow_types::{Action, MediaItem, MediaItemId, OperationInstance, OperationSpec,
//!     WorkflowDefinition, WorkflowState};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! struct Inspect;
//!
//! impl OperationHandler for Inspect {
//!     fn start(
//!         &self,
//!         _operation: &OperationInstance,
//!         ctx: &mut HandlerContext<'_>,
//!     ) -> Result<OperationResult, HandlerError> {
//!         ctx.variables.insert("inspected".into(), "true".into());
//!         Ok(OperationResult::new(Action::Continue))
//!     }
//! }
//!
//! let engine = WorkflowEngine::in_memory();
//! engine.handlers().register("inspect", Arc::new(Inspect));
//!
//! let definition = WorkflowDefinition::new("Ingest")
//!     .with_id("ingest")
//!     .with_operation(OperationSpec::new("inspect"));
//! let definition_id = engine.definitions().register(definition).unwrap();
//!
//! let media = MediaItem::new(MediaItemId::new("media-1"));
//! let (instance_id, state) = engine.run(&definition_id, media, HashMap::new()).unwrap();
//! assert_eq!(state, WorkflowState::Succeeded);
//! ```

#![deny(unsafe_code)]

pub mod condition;
pub mod definitions;
pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod handler;
pub mod instantiator;
pub mod notify;
pub mod persistence;
pub mod registry;
pub mod substitution;

pub use definitions::DefinitionRegistry;
pub use dispatcher::WorkerPool;
pub use engine::WorkflowEngine;
pub use executor::{ExecutionOutcome, OperationExecutor};
pub use handler::{HandlerContext, HandlerError, OperationHandler, OperationResult};
pub use instantiator::Instantiator;
pub use notify::{NotifyError, StateTransition, TransitionListener};
pub use persistence::{InMemoryStore, PersistenceStore};
pub use registry::HandlerRegistry;
