//! Flatten step spans into ordered, consumer-facing summaries.

use ctrlr::TraceError;
use ctrlr::mermaid::{StepNode, ToStepNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{Attributes, GUARD_EVENT, INVARIANT_EVENT, STEP_SPAN, SpanRecord, keys};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardSummary {
    pub condition: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantSummary {
    pub id: Option<String>,
    pub statement: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub run_id: Option<String>,
    pub step_id: Option<String>,
    pub seq: i64,
    pub variant_id: Option<String>,
    pub run_label: Option<String>,
    pub adapter_family: Option<String>,
    pub adapter_source: Option<String>,
    pub guards: Vec<GuardSummary>,
    pub invariants: Vec<InvariantSummary>,
    /// Only the recognized provenance keys present on the span.
    pub provenance: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterializedSteps {
    pub steps: Vec<StepSummary>,
}

/// [`materialize_steps_with_fallback`] with a fallback sequence of `0`.
pub fn materialize_steps<'a>(spans: impl IntoIterator<Item = &'a SpanRecord>) -> MaterializedSteps {
    materialize_steps_with_fallback(spans, 0)
}

/// Keep `oracle.step` spans, order them by `oracle.seq` (stable on ties) and
/// summarize each. A sequence that cannot be read as an integer becomes
/// `fallback` instead of failing the batch.
pub fn materialize_steps_with_fallback<'a>(
    spans: impl IntoIterator<Item = &'a SpanRecord>,
    fallback: i64,
) -> MaterializedSteps {
    let mut ordered: Vec<(i64, &SpanRecord)> = spans
        .into_iter()
        .filter(|span| span.name == STEP_SPAN)
        .map(|span| (coerce_seq(span.attribute(keys::SEQ), fallback), span))
        .collect();
    ordered.sort_by_key(|(seq, _)| *seq);

    let steps = ordered
        .into_iter()
        .map(|(seq, span)| summarize(span, seq))
        .collect();
    MaterializedSteps { steps }
}

fn summarize(span: &SpanRecord, seq: i64) -> StepSummary {
    let mut guards = Vec::new();
    let mut invariants = Vec::new();
    for event in &span.events {
        let attr = |key: &str| text(event.attributes.get(key));
        if event.name == GUARD_EVENT {
            guards.push(GuardSummary {
                condition: attr(keys::GUARD_CONDITION),
                status: attr(keys::GUARD_STATUS),
            });
        } else if event.name == INVARIANT_EVENT {
            invariants.push(InvariantSummary {
                id: attr(keys::INVARIANT_ID),
                statement: attr(keys::INVARIANT_STATEMENT),
                status: attr(keys::INVARIANT_STATUS),
            });
        }
    }

    let provenance = keys::PROVENANCE
        .iter()
        .filter_map(|key| {
            span.attribute(key)
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect();

    let attr = |key: &str| text(span.attribute(key));
    StepSummary {
        run_id: attr(keys::RUN_ID),
        step_id: attr(keys::STEP_ID),
        seq,
        variant_id: attr(keys::VARIANT_ID),
        run_label: attr(keys::RUN_LABEL),
        adapter_family: attr(keys::ADAPTER_FAMILY),
        adapter_source: attr(keys::ADAPTER_SOURCE),
        guards,
        invariants,
        provenance,
    }
}

/// Integers as-is, floats truncated, booleans as 0/1, integer strings parsed.
pub fn coerce_seq(value: Option<&Value>, fallback: i64) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f.trunc() as i64)
            })
            .unwrap_or(fallback),
        Some(Value::Bool(flag)) => i64::from(*flag),
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or(fallback),
        _ => fallback,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl ToStepNode for StepSummary {
    fn to_step_node(&self) -> Result<StepNode, TraceError> {
        let step_id = self.step_id.clone().ok_or_else(|| TraceError::InvalidNode {
            kind: "step",
            reason: "missing step_id".to_string(),
        })?;
        Ok(StepNode {
            step_id,
            name: format!("seq {}", self.seq),
        })
    }
}
