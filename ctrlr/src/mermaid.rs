//! Deterministic Mermaid rendering for spans and steps.
//!
//! Output depends only on the input order and content, so rendered diagrams can
//! be golden-tested and diffed.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::contracts::{Span, Step};
use crate::error::TraceError;

const HEADER: &str = "flowchart TD";
const ROOT_ID: &str = "ROOT";
const SPAN_PREFIX: &str = "SPAN_";
const STEP_PREFIX: &str = "S_";

/// Minimal span shape consumed by [`render_call_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanNode {
    pub span_id: String,
    pub name: String,
    pub parent_span_id: Option<String>,
}

/// Minimal step shape consumed by [`render_flow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
    pub step_id: String,
    pub name: String,
}

/// Conversion from any accepted span shape into a [`SpanNode`].
pub trait ToSpanNode {
    fn to_span_node(&self) -> Result<SpanNode, TraceError>;
}

/// Conversion from any accepted step shape into a [`StepNode`].
pub trait ToStepNode {
    fn to_step_node(&self) -> Result<StepNode, TraceError>;
}

impl ToSpanNode for SpanNode {
    fn to_span_node(&self) -> Result<SpanNode, TraceError> {
        Ok(self.clone())
    }
}

impl ToSpanNode for Span {
    fn to_span_node(&self) -> Result<SpanNode, TraceError> {
        Ok(SpanNode {
            span_id: self.span_id.clone(),
            name: self.name.clone(),
            parent_span_id: self.parent_span_id.clone(),
        })
    }
}

impl ToSpanNode for Value {
    fn to_span_node(&self) -> Result<SpanNode, TraceError> {
        let span_id = required_field(self, "span", "span_id")?;
        let name = required_field(self, "span", "name")?;
        let parent_span_id = self.get("parent_span_id").and_then(scalar_text);
        Ok(SpanNode {
            span_id,
            name,
            parent_span_id,
        })
    }
}

impl ToStepNode for StepNode {
    fn to_step_node(&self) -> Result<StepNode, TraceError> {
        Ok(self.clone())
    }
}

impl ToStepNode for Step {
    fn to_step_node(&self) -> Result<StepNode, TraceError> {
        Ok(StepNode {
            step_id: self.step_id.clone(),
            name: self.name.clone(),
        })
    }
}

impl ToStepNode for Value {
    fn to_step_node(&self) -> Result<StepNode, TraceError> {
        Ok(StepNode {
            step_id: required_field(self, "step", "step_id")?,
            name: required_field(self, "step", "name")?,
        })
    }
}

impl<T: ToSpanNode + ?Sized> ToSpanNode for &T {
    fn to_span_node(&self) -> Result<SpanNode, TraceError> {
        (**self).to_span_node()
    }
}

impl<T: ToStepNode + ?Sized> ToStepNode for &T {
    fn to_step_node(&self) -> Result<StepNode, TraceError> {
        (**self).to_step_node()
    }
}

fn required_field(value: &Value, kind: &'static str, key: &str) -> Result<String, TraceError> {
    if !value.is_object() {
        return Err(TraceError::InvalidNode {
            kind,
            reason: "expected a JSON object".to_string(),
        });
    }
    value
        .get(key)
        .and_then(scalar_text)
        .ok_or_else(|| TraceError::InvalidNode {
            kind,
            reason: format!("missing {key}"),
        })
}

/// Strings are taken verbatim; other scalars are stringified; null is absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Replace every character that is not alphanumeric or `_`, then prefix.
pub fn safe_id(raw_id: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + raw_id.len());
    out.push_str(prefix);
    out.extend(raw_id.chars().map(|ch| {
        if ch.is_alphanumeric() || ch == '_' {
            ch
        } else {
            '_'
        }
    }));
    out
}

/// Escape backslash, double quote, newline and carriage return, in that order.
pub fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Reject any node whose parent chain loops back on itself.
///
/// Self-parenting is checked per node, so a repeated id cannot hide it. Chains
/// are then walked once: a walk stops at the first node already proven acyclic.
fn detect_cycles(nodes: &[SpanNode]) -> Result<(), TraceError> {
    if let Some(node) = nodes
        .iter()
        .find(|node| node.parent_span_id.as_deref() == Some(node.span_id.as_str()))
    {
        return Err(TraceError::ParentCycle {
            span_id: node.span_id.clone(),
        });
    }

    let mut parents: HashMap<&str, Option<&str>> = HashMap::new();
    for node in nodes {
        parents
            .entry(node.span_id.as_str())
            .or_insert(node.parent_span_id.as_deref());
    }

    let mut verified: HashSet<&str> = HashSet::new();
    for node in nodes {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut cursor = Some(node.span_id.as_str());
        while let Some(id) = cursor {
            if verified.contains(id) {
                break;
            }
            if !on_path.insert(id) {
                return Err(TraceError::ParentCycle {
                    span_id: node.span_id.clone(),
                });
            }
            path.push(id);
            cursor = parents.get(id).copied().flatten();
        }
        verified.extend(path);
    }
    Ok(())
}

fn normalize_spans<T: ToSpanNode>(spans: &[T]) -> Result<Vec<SpanNode>, TraceError> {
    spans.iter().map(ToSpanNode::to_span_node).collect()
}

fn normalize_steps<T: ToStepNode>(steps: &[T]) -> Result<Vec<StepNode>, TraceError> {
    steps.iter().map(ToStepNode::to_step_node).collect()
}

/// Render ordered spans as a call tree under a synthetic root.
///
/// Spans whose parent is absent or unknown attach to the root. Parent cycles
/// fail before any output is produced.
pub fn render_call_tree<T: ToSpanNode>(spans: &[T]) -> Result<String, TraceError> {
    let nodes = normalize_spans(spans)?;
    detect_cycles(&nodes)?;
    let known: HashSet<&str> = nodes.iter().map(|node| node.span_id.as_str()).collect();

    let mut lines = vec![HEADER.to_string(), format!("  {ROOT_ID}[\"root\"]")];
    for node in &nodes {
        let label = escape_label(&format!("{}: {}", node.span_id, node.name));
        lines.push(format!(
            "  {}[\"{}\"]",
            safe_id(&node.span_id, SPAN_PREFIX),
            label
        ));
    }
    for node in &nodes {
        let child = safe_id(&node.span_id, SPAN_PREFIX);
        let parent = match node.parent_span_id.as_deref() {
            Some(parent) if known.contains(parent) => safe_id(parent, SPAN_PREFIX),
            _ => ROOT_ID.to_string(),
        };
        lines.push(format!("  {parent} --> {child}"));
    }
    Ok(finish(lines))
}

/// Render ordered steps as a linear chain in input order.
pub fn render_flow<T: ToStepNode>(steps: &[T]) -> Result<String, TraceError> {
    let nodes = normalize_steps(steps)?;
    let ids: Vec<String> = nodes
        .iter()
        .map(|node| safe_id(&node.step_id, STEP_PREFIX))
        .collect();

    let mut lines = vec![HEADER.to_string()];
    for (node, id) in nodes.iter().zip(&ids) {
        let label = escape_label(&format!("{}: {}", node.step_id, node.name));
        lines.push(format!("  {id}[\"{label}\"]"));
    }
    for pair in ids.windows(2) {
        lines.push(format!("  {} --> {}", pair[0], pair[1]));
    }
    Ok(finish(lines))
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{child_span, span, step};
    use serde_json::json;

    #[test]
    fn call_tree_golden() {
        let spans = vec![
            span("s1", "root"),
            child_span("s2", "child \"a\"", "s1"),
            child_span("s3", "leaf\nline", "s2"),
        ];
        let out = render_call_tree(&spans).expect("render");
        let expected = concat!(
            "flowchart TD\n",
            "  ROOT[\"root\"]\n",
            "  SPAN_s1[\"s1: root\"]\n",
            "  SPAN_s2[\"s2: child \\\"a\\\"\"]\n",
            "  SPAN_s3[\"s3: leaf\\nline\"]\n",
            "  ROOT --> SPAN_s1\n",
            "  SPAN_s1 --> SPAN_s2\n",
            "  SPAN_s2 --> SPAN_s3\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn call_tree_missing_parent_attaches_root() {
        let spans = vec![
            json!({"span_id": "a", "name": "A", "parent_span_id": "missing"}),
            json!({"span_id": "b", "name": "B"}),
        ];
        let out = render_call_tree(&spans).expect("render");
        assert!(out.contains("ROOT --> SPAN_a"));
        assert!(out.contains("ROOT --> SPAN_b"));
    }

    #[test]
    fn call_tree_self_parent_is_rejected() {
        let spans = vec![json!({"span_id": "x", "name": "X", "parent_span_id": "x"})];
        let err = render_call_tree(&spans).expect_err("cycle");
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn call_tree_longer_cycle_is_rejected() {
        let spans = vec![child_span("a", "A", "b"), child_span("b", "B", "a")];
        assert!(matches!(
            render_call_tree(&spans),
            Err(TraceError::ParentCycle { .. })
        ));
    }

    #[test]
    fn call_tree_self_parent_behind_duplicate_id_is_rejected() {
        let spans = vec![span("x", "first"), child_span("x", "second", "x")];
        assert!(matches!(
            render_call_tree(&spans),
            Err(TraceError::ParentCycle { span_id }) if span_id == "x"
        ));
    }

    #[test]
    fn call_tree_cycle_behind_acyclic_tail_is_rejected() {
        let spans = vec![
            child_span("tail", "T", "a"),
            child_span("a", "A", "b"),
            child_span("b", "B", "a"),
        ];
        assert!(matches!(
            render_call_tree(&spans),
            Err(TraceError::ParentCycle { .. })
        ));
    }

    #[test]
    fn call_tree_handles_deep_parent_chain() {
        let mut spans = vec![span("n0", "n0")];
        for i in 1..20_000 {
            let id = format!("n{i}");
            spans.push(child_span(&id, &id, &format!("n{}", i - 1)));
        }
        let out = render_call_tree(&spans).expect("render");
        assert!(out.ends_with("  SPAN_n19998 --> SPAN_n19999\n"));
    }

    #[test]
    fn call_tree_rejects_map_without_name() {
        let spans = vec![json!({"span_id": "a"})];
        let err = render_call_tree(&spans).expect_err("invalid");
        assert_eq!(err.to_string(), "invalid span node: missing name");
    }

    #[test]
    fn call_tree_of_empty_input_is_just_root() {
        let spans: Vec<Span> = Vec::new();
        let out = render_call_tree(&spans).expect("render");
        assert_eq!(out, "flowchart TD\n  ROOT[\"root\"]\n");
    }

    #[test]
    fn flow_golden() {
        let steps = vec![
            step("s1", "start"),
            step("s2", "do \"x\""),
            step("s3", "end\nline"),
        ];
        let out = render_flow(&steps).expect("render");
        let expected = concat!(
            "flowchart TD\n",
            "  S_s1[\"s1: start\"]\n",
            "  S_s2[\"s2: do \\\"x\\\"\"]\n",
            "  S_s3[\"s3: end\\nline\"]\n",
            "  S_s1 --> S_s2\n",
            "  S_s2 --> S_s3\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn flow_preserves_input_order() {
        let steps = vec![
            json!({"step_id": "b", "name": "B"}),
            json!({"step_id": "a", "name": "A"}),
        ];
        let out = render_flow(&steps).expect("render");
        assert!(out.contains("S_b --> S_a"));
    }

    #[test]
    fn flow_is_byte_identical_across_calls() {
        let steps = vec![step("x-1", "one"), step("x-2", "two\r\\")];
        let first = render_flow(&steps).expect("render");
        let second = render_flow(&steps).expect("render");
        assert_eq!(first, second);
        assert!(first.contains("S_x_1 --> S_x_2"));
        assert!(first.contains("two\\r\\\\"));
    }

    #[test]
    fn safe_id_replaces_punctuation() {
        assert_eq!(safe_id("a-b.c/d_e", "SPAN_"), "SPAN_a_b_c_d_e");
    }
}
