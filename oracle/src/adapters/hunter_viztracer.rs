use serde::Deserialize;
use serde_json::Value;

use super::{AdapterStep, StepTarget, presence, text_field};
use crate::error::Result;
use crate::records::{Attributes, SpanRecord, Status, keys};
use crate::runtime::Runtime;

const FAMILY: &str = "hunter+viztracer";

/// A call/line/return event captured by hunter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HunterEvent {
    pub kind: Option<String>,
    pub function: Option<String>,
    pub filepath: Option<String>,
    pub lineno: Option<i64>,
}

/// A complete-duration record from a viztracer dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VizTracerRecord {
    pub name: Option<String>,
    pub duration_us: i64,
    pub start_us: i64,
}

pub fn emit_hunter_events(
    runtime: &Runtime,
    target: &StepTarget,
    events: &[HunterEvent],
) -> Result<SpanRecord> {
    let mut extra = Attributes::new();
    extra.insert("oracle.hunter.count".to_string(), events.len().into());
    let step_id = target.resolved_step_id(|| "hunter.trace".to_string());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, "hunter", extra);

    for (index, event) in (1i64..).zip(events) {
        let mut fields = Attributes::new();
        fields.insert("oracle.hunter.kind".to_string(), text_field(event.kind.as_deref()));
        fields.insert(
            "oracle.hunter.function".to_string(),
            text_field(event.function.as_deref()),
        );
        fields.insert(
            keys::CODE_FILEPATH.to_string(),
            text_field(event.filepath.as_deref()),
        );
        fields.insert(
            keys::CODE_LINENO.to_string(),
            Value::from(event.lineno.unwrap_or(0)),
        );
        step.emit("oracle.hunter.event", index, fields)?;
    }

    let identified = events
        .iter()
        .all(|event| event.function.as_deref().is_some_and(|f| !f.is_empty()));
    step.finish(
        ("hunter.events > 0", presence(events.len())),
        (
            "hunter.call.identity",
            "hunter events include function identity",
            Status::from_bool(identified),
        ),
        &format!("hunter events materialized: {}", events.len()),
    )
}

pub fn emit_viztracer_trace(
    runtime: &Runtime,
    target: &StepTarget,
    records: &[VizTracerRecord],
) -> Result<SpanRecord> {
    let mut extra = Attributes::new();
    extra.insert("oracle.viztracer.count".to_string(), records.len().into());
    let step_id = target.resolved_step_id(|| "viztracer.trace".to_string());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, "viztracer", extra);

    for (index, record) in (1i64..).zip(records) {
        let mut fields = Attributes::new();
        fields.insert(
            "oracle.viztracer.name".to_string(),
            text_field(record.name.as_deref()),
        );
        fields.insert(
            "oracle.viztracer.duration_us".to_string(),
            record.duration_us.into(),
        );
        fields.insert("oracle.viztracer.start_us".to_string(), record.start_us.into());
        step.emit("oracle.viztracer.event", index, fields)?;
    }

    let non_negative = records.iter().all(|record| record.duration_us >= 0);
    step.finish(
        ("viztracer.records > 0", presence(records.len())),
        (
            "viztracer.duration.non_negative",
            "viztracer durations are non-negative",
            Status::from_bool(non_negative),
        ),
        &format!("viztracer records materialized: {}", records.len()),
    )
}
