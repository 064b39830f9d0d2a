//! Built-in operation handlers for the Alder workflow engine.
//!
//! These cover the structural steps every pipeline needs (element cloning,
//! retagging, variable defaults) and double as realistic fixtures for the
//! engine and the CLI. Codec-specific processing handlers live in their own
//! plugins and register through the same [`HandlerRegistry`].

pub mod clone;
pub mod defaults;
pub mod tag;

pub use clone::CloneOperationHandler;
pub use defaults::DefaultsOperationHandler;
pub use tag::TagOperationHandler;

use alder_workflow_engine::HandlerRegistry;
use std::sync::Arc;

/// Register every built-in handler under its operation name.
pub fn install(registry: &HandlerRegistry) {
    registry.register("clone", Arc::new(CloneOperationHandler));
    registry.register("tag", Arc::new(TagOperationHandler));
    registry.register("defaults", Arc::new(DefaultsOperationHandler));
}
