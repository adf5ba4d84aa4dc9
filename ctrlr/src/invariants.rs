//! Semantic invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::jsonl::TraceLog;

/// Check semantic invariants of a parsed log:
/// - No duplicate span or step ids
/// - No span is its own parent
/// - `parent_span_id` refers to a span recorded earlier in the log
/// - A step's `span_id` refers to a recorded span
///
/// Returns a list of stable error messages (empty on success).
pub fn validate_log_invariants(log: &TraceLog) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen_spans = HashSet::new();

    for span in &log.spans {
        if let Some(parent) = span.parent_span_id.as_deref() {
            if parent == span.span_id {
                errors.push(format!("span '{}' is its own parent", span.span_id));
            } else if !seen_spans.contains(parent) {
                errors.push(format!(
                    "span '{}' references parent '{}' not recorded before it",
                    span.span_id, parent
                ));
            }
        }
        if !seen_spans.insert(span.span_id.as_str()) {
            errors.push(format!("duplicate span id '{}'", span.span_id));
        }
    }

    let mut seen_steps = HashSet::new();
    for step in &log.steps {
        if !seen_steps.insert(step.step_id.as_str()) {
            errors.push(format!("duplicate step id '{}'", step.step_id));
        }
        if let Some(span_id) = step.span_id.as_deref()
            && !seen_spans.contains(span_id)
        {
            errors.push(format!(
                "step '{}' references unknown span '{}'",
                step.step_id, span_id
            ));
        }
    }

    errors
}
