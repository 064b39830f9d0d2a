//! Execute-if condition evaluation.
//!
//! Conditions are small boolean expressions over instance variables,
//! evaluated after `${name}` substitution: `==` / `!=` string comparison
//! with optional quoting, a leading `!`, and truthy/falsy literals.
//! An unset variable substitutes to the empty string, which is falsy.

use crate::substitution::substitute_lenient;
use alder_workflow_types::{WorkflowError, WorkflowResult};
use std::collections::HashMap;

/// Evaluate an execute-if expression against the instance variables.
pub fn evaluate(expression: &str, variables: &HashMap<String, String>) -> WorkflowResult<bool> {
    let substituted = substitute_lenient(expression, variables);
    eval(substituted.trim(), expression)
}

fn eval(expr: &str, source: &str) -> WorkflowResult<bool> {
    if let Some((lhs, rhs)) = expr.split_once("!=") {
        return Ok(unquote(lhs) != unquote(rhs));
    }
    if let Some((lhs, rhs)) = expr.split_once("==") {
        return Ok(unquote(lhs) == unquote(rhs));
    }
    if let Some(rest) = expr.strip_prefix('!') {
        return Ok(!eval(rest.trim_start(), source)?);
    }
    match expr.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        _ => Err(WorkflowError::InvalidCondition(source.to_string())),
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    let stripped = s
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')));
    stripped.unwrap_or(s)
}
