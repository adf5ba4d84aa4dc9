use serde::Deserialize;
use serde_json::Value;

use super::{AdapterStep, StepTarget};
use crate::error::{Result, RuntimeError};
use crate::records::{Attributes, SpanRecord, Status};
use crate::runtime::Runtime;

const FAMILY: &str = "pytest+hypothesis";
const CASE_EVENT: &str = "oracle.pytest.case";

/// One collected test case outcome.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PytestCase {
    pub nodeid: String,
    pub outcome: Status,
    /// The falsifying or last-run hypothesis example, if any.
    #[serde(default)]
    pub hypothesis_example: Option<Value>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl PytestCase {
    pub fn new(nodeid: impl Into<String>, outcome: Status) -> Self {
        Self {
            nodeid: nodeid.into(),
            outcome,
            hypothesis_example: None,
            failure_message: None,
        }
    }
}

/// Record `case` as one step; the step id defaults to `pytest:<nodeid>`.
pub fn emit_pytest_hypothesis_case(
    runtime: &Runtime,
    target: &StepTarget,
    case: &PytestCase,
) -> Result<SpanRecord> {
    let example = case
        .hypothesis_example
        .as_ref()
        .map(compact_sorted_json)
        .transpose()?;
    let source = if example.is_some() { FAMILY } else { "pytest" };
    let step_id = target.resolved_step_id(|| format!("pytest:{}", case.nodeid));

    let mut extra = Attributes::new();
    extra.insert("oracle.pytest.nodeid".to_string(), case.nodeid.as_str().into());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, source, extra);

    let mut fields = Attributes::new();
    fields.insert("oracle.pytest.nodeid".to_string(), case.nodeid.as_str().into());
    fields.insert("oracle.pytest.outcome".to_string(), case.outcome.as_str().into());
    if let Some(example) = example {
        fields.insert("oracle.hypothesis.example".to_string(), example.into());
    }
    if let Some(message) = case.failure_message.as_deref().filter(|m| !m.is_empty()) {
        fields.insert("oracle.pytest.failure_message".to_string(), message.into());
    }
    step.emit(CASE_EVENT, target.seq, fields)?;

    let named = Status::from_bool(!case.nodeid.trim().is_empty());
    step.finish(
        ("oracle.pytest.outcome == pass", case.outcome),
        ("pytest.case.identity", "pytest case nodeid is non-empty", named),
        &format!("{} outcome: {}", case.nodeid, case.outcome),
    )
}

fn compact_sorted_json(value: &Value) -> Result<String> {
    let mut value = value.clone();
    ctrlr::jsonl::sort_keys(&mut value);
    serde_json::to_string(&value)
        .map_err(|err| RuntimeError::input("hypothesis example", err.to_string()))
}
