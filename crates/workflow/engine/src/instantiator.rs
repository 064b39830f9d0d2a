//! Workflow instantiation: binding a definition to a media item.

use crate::registry::HandlerRegistry;
use alder_workflow_types::{
    MediaItem, WorkflowDefinition, WorkflowError, WorkflowInstance, WorkflowResult,
};
use std::collections::HashMap;

/// Builds concrete workflow instances from registered definitions.
pub struct Instantiator {
    handlers: HandlerRegistry,
}

impl Instantiator {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self { handlers }
    }

    /// Deep-copy the definition's operation specs into Pending operation
    /// instances, merging the caller's initial variables.
    ///
    /// Handler names are checked against the registry here, but the check is
    /// advisory: the executor's lookup at dispatch time stays authoritative,
    /// since plugins can be unregistered before their step runs.
    pub fn instantiate(
        &self,
        definition: &WorkflowDefinition,
        media: MediaItem,
        variables: HashMap<String, String>,
    ) -> WorkflowResult<WorkflowInstance> {
        definition.validate()?;
        for spec in &definition.operations {
            if !self.handlers.contains(&spec.handler) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "definition '{}' references unknown handler '{}'",
                    definition.id, spec.handler
                )));
            }
        }

        let instance = WorkflowInstance::new(definition, media, variables);
        tracing::info!(
            instance_id = %instance.id,
            definition_id = %definition.id,
            media_id = %instance.media.id,
            "workflow instance created"
        );
        Ok(instance)
    }
}
