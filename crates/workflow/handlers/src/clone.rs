//! `clone` operation: copy media elements from one flavor to another.

use alder_workflow_engine::{HandlerContext, HandlerError, OperationHandler, OperationResult};
use alder_workflow_types::{Action, Flavor, MediaElement, OperationInstance};

const OPT_SOURCE_FLAVOR: &str = "source-flavor";
const OPT_TARGET_FLAVOR: &str = "target-flavor";

/// Clones every element matching `source-flavor` under `target-flavor`.
///
/// A target with no `/` is treated as a bare subtype: the clone keeps the
/// matched element's type, so `presentation/source` cloned to `target`
/// yields `presentation/target`. Wildcards are allowed in the source.
pub struct CloneOperationHandler;

impl OperationHandler for CloneOperationHandler {
    fn start(
        &self,
        operation: &OperationInstance,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<OperationResult, HandlerError> {
        let source = operation
            .configuration
            .get(OPT_SOURCE_FLAVOR)
            .ok_or_else(|| HandlerError::new(format!("missing '{OPT_SOURCE_FLAVOR}'")))?;
        let target = operation
            .configuration
            .get(OPT_TARGET_FLAVOR)
            .ok_or_else(|| HandlerError::new(format!("missing '{OPT_TARGET_FLAVOR}'")))?;

        let source_flavor = Flavor::parse(source).map_err(|e| HandlerError::new(e.to_string()))?;

        let mut media = ctx.media.clone();
        let matched: Vec<MediaElement> = media
            .elements_by_flavor(&source_flavor)
            .into_iter()
            .cloned()
            .collect();
        if matched.is_empty() {
            tracing::info!(
                instance_id = %ctx.instance_id,
                flavor = %source_flavor,
                "no elements to clone"
            );
            return Ok(OperationResult::new(Action::Continue));
        }

        for element in matched {
            let element_flavor = element
                .flavor
                .as_ref()
                .ok_or_else(|| HandlerError::new("matched element has no flavor"))?;
            let target_flavor = if target.contains('/') {
                Flavor::parse(target).map_err(|e| HandlerError::new(e.to_string()))?
            } else {
                Flavor::new(element_flavor.kind.clone(), target.clone())
            };
            let mut clone = MediaElement::new(element.kind, element.uri.clone())
                .with_flavor(target_flavor);
            clone.tags = element.tags.clone();
            media.add_element(clone);
        }

        Ok(OperationResult::new(Action::Continue).with_media(media))
    }
}
