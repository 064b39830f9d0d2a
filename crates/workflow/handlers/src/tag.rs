//! `tag` operation: add or remove tags on media elements by flavor.

use alder_workflow_engine::{HandlerContext, HandlerError, OperationHandler, OperationResult};
use alder_workflow_types::{Action, Flavor, OperationInstance};

const OPT_SOURCE_FLAVORS: &str = "source-flavors";
const OPT_TARGET_TAGS: &str = "target-tags";

/// Rewrites tags on every element matching one of `source-flavors`.
///
/// `target-tags` is a comma-separated list where `+tag` (or a bare `tag`)
/// adds and `-tag` removes.
pub struct TagOperationHandler;

impl OperationHandler for TagOperationHandler {
    fn start(
        &self,
        operation: &OperationInstance,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<OperationResult, HandlerError> {
        let flavors = operation
            .configuration
            .get(OPT_SOURCE_FLAVORS)
            .ok_or_else(|| HandlerError::new(format!("missing '{OPT_SOURCE_FLAVORS}'")))?;
        let tags = operation
            .configuration
            .get(OPT_TARGET_TAGS)
            .ok_or_else(|| HandlerError::new(format!("missing '{OPT_TARGET_TAGS}'")))?;

        let flavors = flavors
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Flavor::parse(s).map_err(|e| HandlerError::new(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut additions = Vec::new();
        let mut removals = Vec::new();
        for tag in tags.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(tag) = tag.strip_prefix('-') {
                removals.push(tag.to_string());
            } else {
                additions.push(tag.trim_start_matches('+').to_string());
            }
        }

        let mut media = ctx.media.clone();
        let mut touched = 0usize;
        for element in &mut media.elements {
            let matched = element
                .flavor
                .as_ref()
                .is_some_and(|f| flavors.iter().any(|flavor| f.matches(flavor)));
            if !matched {
                continue;
            }
            element.tags.retain(|tag| !removals.contains(tag));
            for tag in &additions {
                if !element.has_tag(tag) {
                    element.tags.push(tag.clone());
                }
            }
            touched += 1;
        }
        tracing::debug!(instance_id = %ctx.instance_id, touched, "retagged elements");

        Ok(OperationResult::new(Action::Continue).with_media(media))
    }
}
