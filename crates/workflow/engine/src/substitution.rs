//! `${variable}` substitution for operation configuration.

use alder_workflow_types::{WorkflowError, WorkflowResult};
use std::collections::HashMap;

/// Resolve a configuration mapping against the instance variables.
///
/// Every `${name}` reference is replaced by the variable's value; a
/// reference to an undefined variable is an error, never left as literal
/// text.
pub fn resolve(
    configuration: &HashMap<String, String>,
    variables: &HashMap<String, String>,
) -> WorkflowResult<HashMap<String, String>> {
    let mut resolved = HashMap::with_capacity(configuration.len());
    for (key, template) in configuration {
        resolved.insert(key.clone(), substitute(key, template, variables)?);
    }
    Ok(resolved)
}

fn substitute(
    key: &str,
    template: &str,
    variables: &HashMap<String, String>,
) -> WorkflowResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(WorkflowError::UnresolvedVariable {
                key: key.to_string(),
                name: after.to_string(),
            });
        };
        let name = &after[..end];
        match variables.get(name) {
            Some(value) => out.push_str(value),
            None => {
                return Err(WorkflowError::UnresolvedVariable {
                    key: key.to_string(),
                    name: name.to_string(),
                })
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Substitute `${name}` references, replacing undefined variables with the
/// empty string. Used for execute-if conditions, where an unset variable
/// simply evaluates falsy.
pub(crate) fn substitute_lenient(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str("${");
            out.push_str(after);
            return out;
        };
        if let Some(value) = variables.get(&after[..end]) {
            out.push_str(value);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
