//! Operation executor: runs a single operation instance against its handler.
//!
//! The executor owns the per-operation sequence from configuration
//! resolution to the recorded outcome: substitute the configuration,
//! evaluate the execute-if condition, look up the handler, invoke it, apply
//! its result. Failures are absorbed here, recorded on the operation
//! instance for audit, and translated into an outcome the engine maps
//! through the failure policy.

use crate::handler::HandlerContext;
use crate::registry::HandlerRegistry;
use crate::{condition, substitution};
use alder_workflow_types::{Action, WorkflowError, WorkflowInstance};

/// What a single execution step tells the engine to do next.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The operation finished (succeeded or was skipped); the action directs
    /// how the engine proceeds.
    Advance { action: Action },
    /// The operation failed; the engine applies its failure policy.
    Failed { error: WorkflowError },
}

/// Executes one operation instance at a time. No retry: a retry is an
/// explicit external directive through the engine's resume override.
pub struct OperationExecutor {
    handlers: HandlerRegistry,
}

impl OperationExecutor {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self { handlers }
    }

    pub fn execute(
        &self,
        instance: &mut WorkflowInstance,
        position: usize,
        resume_data: Option<&str>,
    ) -> ExecutionOutcome {
        let Some(operation) = instance.operation(position) else {
            return ExecutionOutcome::Failed {
                error: WorkflowError::InvalidDefinition(format!(
                    "operation index {} out of bounds for instance '{}'",
                    position, instance.id
                )),
            };
        };
        let handler_name = operation.handler.clone();
        let template = operation.configuration.clone();
        let expression = operation.execute_condition.clone();

        // Resolve configuration at the moment the operation becomes current,
        // so it sees variables written by earlier operations.
        let resolved = match substitution::resolve(&template, &instance.variables) {
            Ok(resolved) => resolved,
            Err(error) => {
                instance.fail_operation(position, error.kind(), error.to_string());
                return ExecutionOutcome::Failed { error };
            }
        };
        instance.begin_operation(position, resolved);

        if let Some(expression) = expression {
            match condition::evaluate(&expression, &instance.variables) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        instance_id = %instance.id,
                        position,
                        handler = %handler_name,
                        "execute-if condition false; operation skipped"
                    );
                    instance.skip_operation(position);
                    return ExecutionOutcome::Advance {
                        action: Action::Continue,
                    };
                }
                Err(error) => {
                    instance.fail_operation(position, error.kind(), error.to_string());
                    return ExecutionOutcome::Failed { error };
                }
            }
        }

        let handler = match self.handlers.lookup(&handler_name) {
            Ok(handler) => handler,
            Err(error) => {
                instance.fail_operation(position, error.kind(), error.to_string());
                return ExecutionOutcome::Failed { error };
            }
        };

        tracing::debug!(
            instance_id = %instance.id,
            position,
            handler = %handler_name,
            resumed = resume_data.is_some(),
            "invoking operation handler"
        );
        let invocation = {
            let WorkflowInstance {
                id,
                media,
                variables,
                operations,
                ..
            } = &mut *instance;
            let operation = &operations[position];
            let mut ctx = HandlerContext {
                instance_id: id,
                media,
                variables,
            };
            match resume_data {
                Some(data) => handler.resume(operation, &mut ctx, Some(data)),
                None => handler.start(operation, &mut ctx),
            }
        };

        match invocation {
            Ok(result) => {
                if let Some(media) = result.media {
                    instance.media = media;
                }
                match result.action {
                    Action::Skip { .. } => {
                        if let Some(op) = instance.operations.get_mut(position) {
                            op.action = Some(result.action);
                        }
                        instance.skip_operation(position);
                    }
                    action => instance.succeed_operation(position, action),
                }
                ExecutionOutcome::Advance {
                    action: result.action,
                }
            }
            Err(cause) => {
                let error = WorkflowError::HandlerExecution {
                    handler: handler_name,
                    message: cause.to_string(),
                };
                instance.fail_operation(position, error.kind(), cause.to_string());
                ExecutionOutcome::Failed { error }
            }
        }
    }
}
