//! `defaults` operation: seed unset instance variables.

use alder_workflow_engine::{HandlerContext, HandlerError, OperationHandler, OperationResult};
use alder_workflow_types::{Action, OperationInstance};

/// Copies every configuration key into the instance variables unless the
/// variable is already set. Placed at the front of a definition, it lets
/// later execute-if conditions rely on a value being present.
pub struct DefaultsOperationHandler;

impl OperationHandler for DefaultsOperationHandler {
    fn start(
        &self,
        operation: &OperationInstance,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<OperationResult, HandlerError> {
        for (key, value) in &operation.configuration {
            if ctx.variables.contains_key(key) {
                continue;
            }
            tracing::debug!(
                instance_id = %ctx.instance_id,
                variable = %key,
                default = %value,
                "applying default"
            );
            ctx.variables.insert(key.clone(), value.clone());
        }
        Ok(OperationResult::new(Action::Continue))
    }
}
