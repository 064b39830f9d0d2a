//! The pluggable operation handler contract.
//!
//! A handler implements the logic for one operation type. The engine holds
//! only the trait: concrete handlers are registered by name through the
//! [`crate::HandlerRegistry`] by an external plugin loader, at startup or at
//! any later point.
//!
//! Invocation is synchronous and may block. A handler that fronts a
//! long-running external job should return [`Action::Pause`] and have the
//! job call `resume` on the engine when it completes, rather than occupy a
//! worker for the duration.

use alder_workflow_types::{Action, MediaItem, OperationInstance, WorkflowInstanceId};
use std::collections::HashMap;
use thiserror::Error;

/// Error raised by a handler while processing an operation.
///
/// Translated by the executor into a recorded operation failure; never
/// surfaced raw to engine callers.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// What a handler hands back to the executor: the continuation directive
/// plus an optional whole-object replacement of the media item.
#[derive(Clone, Debug)]
pub struct OperationResult {
    pub action: Action,
    pub media: Option<MediaItem>,
}

impl OperationResult {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            media: None,
        }
    }

    pub fn with_media(mut self, media: MediaItem) -> Self {
        self.media = Some(media);
        self
    }
}

/// Execution context passed to a handler: the immutable media item and the
/// mutable handle to instance variables. Variables are writable only through
/// this handle, only while the handler runs.
pub struct HandlerContext<'a> {
    pub instance_id: &'a WorkflowInstanceId,
    pub media: &'a MediaItem,
    pub variables: &'a mut HashMap<String, String>,
}

/// A pluggable unit implementing the logic for one operation type.
pub trait OperationHandler: Send + Sync {
    /// Execute the operation from the beginning.
    fn start(
        &self,
        operation: &OperationInstance,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<OperationResult, HandlerError>;

    /// Continue after an external resume carrying resume data. Handlers that
    /// delegate to external jobs override this; the default starts over.
    fn resume(
        &self,
        operation: &OperationInstance,
        ctx: &mut HandlerContext<'_>,
        resume_data: Option<&str>,
    ) -> Result<OperationResult, HandlerError> {
        let _ = resume_data;
        self.start(operation, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alder_workflow_types::{MediaItemId, OperationSpec};

    struct SetVariable;

    impl OperationHandler for SetVariable {
        fn start(
            &self,
            operation: &OperationInstance,
            ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            let value = operation
                .configuration
                .get("value")
                .ok_or_else(|| HandlerError::new("missing 'value' configuration"))?;
            ctx.variables.insert("out".to_string(), value.clone());
            Ok(OperationResult::new(Action::Continue))
        }
    }

    fn make_operation(value: Option<&str>) -> OperationInstance {
        let mut spec = OperationSpec::new("set-variable");
        if let Some(value) = value {
            spec = spec.with_configuration("value", value);
        }
        OperationInstance::from_spec(0, &spec)
    }

    #[test]
    fn test_handler_mutates_variables_through_context() {
        let instance_id = WorkflowInstanceId::new("inst-1");
        let media = MediaItem::new(MediaItemId::new("media-1"));
        let mut variables = HashMap::new();
        let mut ctx = HandlerContext {
            instance_id: &instance_id,
            media: &media,
            variables: &mut variables,
        };

        let result = SetVariable
            .start(&make_operation(Some("42")), &mut ctx)
            .unwrap();
        assert_eq!(result.action, Action::Continue);
        assert!(result.media.is_none());
        assert_eq!(variables.get("out").unwrap(), "42");
    }

    #[test]
    fn test_handler_error_propagates() {
        let instance_id = WorkflowInstanceId::new("inst-1");
        let media = MediaItem::new(MediaItemId::new("media-1"));
        let mut variables = HashMap::new();
        let mut ctx = HandlerContext {
            instance_id: &instance_id,
            media: &media,
            variables: &mut variables,
        };

        let err = SetVariable
            .start(&make_operation(None), &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn test_default_resume_delegates_to_start() {
        let instance_id = WorkflowInstanceId::new("inst-1");
        let media = MediaItem::new(MediaItemId::new("media-1"));
        let mut variables = HashMap::new();
        let mut ctx = HandlerContext {
            instance_id: &instance_id,
            media: &media,
            variables: &mut variables,
        };

        let result = SetVariable
            .resume(&make_operation(Some("7")), &mut ctx, Some("ignored"))
            .unwrap();
        assert_eq!(result.action, Action::Continue);
        assert_eq!(variables.get("out").unwrap(), "7");
    }
}
