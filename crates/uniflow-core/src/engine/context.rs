//! Execution context helpers: result namespacing, size caps, and log
//! summaries.
//!
//! The context itself is the `HashMap<String, Value>` owned by each
//! `Execution`; these functions implement the engine's rules for writing
//! action results into it and reading it back for expressions and logs.

use std::collections::HashMap;

use serde_json::{Value, json};

/// Maximum serialized size of a single action result (1 MB). Larger results
/// are replaced with a truncation marker instead of bloating the context.
pub const MAX_ACTION_RESULT_SIZE: usize = 1_048_576;

/// Maximum total serialized size of all context values (10 MB).
pub const MAX_CONTEXT_SIZE: usize = 10_485_760;

/// Maximum length of a result summary in a log line.
pub const MAX_SUMMARY_LEN: usize = 120;

/// Total context size exceeded [`MAX_CONTEXT_SIZE`].
#[derive(Debug, thiserror::Error)]
#[error("context size {size} bytes exceeds maximum {max} bytes")]
pub struct ContextOverflow {
    pub size: usize,
    pub max: usize,
}

/// The namespaced context key an action's result is stored under.
///
/// Namespacing by step ID lets later conditions reference prior action
/// results without key collisions across actions.
pub fn action_result_key(step_id: &str) -> String {
    format!("action_{step_id}")
}

/// Merge an action's result mapping into the context under
/// `action_<step id>`.
///
/// Results above [`MAX_ACTION_RESULT_SIZE`] are replaced with a truncation
/// marker. Fails if the total context would exceed [`MAX_CONTEXT_SIZE`].
pub fn merge_action_result(
    context: &mut HashMap<String, Value>,
    step_id: &str,
    result: Value,
) -> Result<(), ContextOverflow> {
    let serialized_len = serde_json::to_string(&result).map(|s| s.len()).unwrap_or(0);

    let stored = if serialized_len > MAX_ACTION_RESULT_SIZE {
        tracing::warn!(
            step_id,
            size = serialized_len,
            max = MAX_ACTION_RESULT_SIZE,
            "action result exceeds size limit, truncating"
        );
        json!({
            "_truncated": true,
            "_original_size": serialized_len,
        })
    } else {
        result
    };

    context.insert(action_result_key(step_id), stored);

    let total = total_size(context);
    if total > MAX_CONTEXT_SIZE {
        return Err(ContextOverflow {
            size: total,
            max: MAX_CONTEXT_SIZE,
        });
    }

    Ok(())
}

/// Total serialized size of all context values in bytes.
pub fn total_size(context: &HashMap<String, Value>) -> usize {
    context
        .values()
        .map(|v| serde_json::to_string(v).map(|s| s.len()).unwrap_or(0))
        .sum()
}

/// Compact, length-capped rendering of an action result for log lines.
pub fn result_summary(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    };
    if rendered.chars().count() > MAX_SUMMARY_LEN {
        let mut capped: String = rendered.chars().take(MAX_SUMMARY_LEN).collect();
        capped.push_str("...");
        capped
    } else {
        rendered
    }
}

/// The JSON object custom condition expressions evaluate against: the
/// context map itself, so expressions read fields at the root
/// (`amount > 100`, `action_notify.status == 'success'`).
pub fn expression_context(context: &HashMap<String, Value>) -> Value {
    serde_json::to_value(context).unwrap_or(json!({}))
}
