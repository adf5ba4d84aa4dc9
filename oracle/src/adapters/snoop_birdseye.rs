use serde::Deserialize;
use serde_json::Value;

use super::{AdapterStep, StepTarget, presence, text_field};
use crate::error::Result;
use crate::records::{Attributes, SpanRecord, Status, keys};
use crate::runtime::Runtime;

const FAMILY: &str = "snoop+birdseye";

/// A line-level record from a snoop trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnoopRecord {
    /// Position in the trace; the 1-based index is used when absent.
    pub seq: Option<i64>,
    pub message: Option<String>,
    pub filepath: Option<String>,
    pub lineno: Option<i64>,
}

/// A captured birdseye frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BirdseyeFrame {
    pub module: Option<String>,
    pub function: Option<String>,
    pub filepath: Option<String>,
    pub lineno: Option<i64>,
}

fn location(fields: &mut Attributes, filepath: Option<&str>, lineno: Option<i64>) {
    fields.insert(keys::CODE_FILEPATH.to_string(), text_field(filepath));
    fields.insert(keys::CODE_LINENO.to_string(), Value::from(lineno.unwrap_or(0)));
}

pub fn emit_snoop_trace(
    runtime: &Runtime,
    target: &StepTarget,
    records: &[SnoopRecord],
) -> Result<SpanRecord> {
    let mut extra = Attributes::new();
    extra.insert("oracle.snoop.count".to_string(), records.len().into());
    let step_id = target.resolved_step_id(|| "snoop.trace".to_string());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, "snoop", extra);

    let mut seqs = Vec::with_capacity(records.len());
    for (index, record) in (1i64..).zip(records) {
        let record_seq = record.seq.unwrap_or(index);
        seqs.push(record_seq);
        let mut fields = Attributes::new();
        fields.insert(
            "oracle.snoop.message".to_string(),
            text_field(record.message.as_deref()),
        );
        location(&mut fields, record.filepath.as_deref(), record.lineno);
        step.emit("oracle.snoop.event", record_seq, fields)?;
    }

    let monotonic = seqs.windows(2).all(|pair| pair[0] <= pair[1]);
    step.finish(
        ("snoop.records > 0", presence(records.len())),
        (
            "snoop.seq.monotonic",
            "snoop sequence is monotonic",
            Status::from_bool(monotonic),
        ),
        &format!("snoop records materialized: {}", records.len()),
    )
}

pub fn emit_birdseye_trace(
    runtime: &Runtime,
    target: &StepTarget,
    frames: &[BirdseyeFrame],
) -> Result<SpanRecord> {
    let mut extra = Attributes::new();
    extra.insert("oracle.birdseye.count".to_string(), frames.len().into());
    let step_id = target.resolved_step_id(|| "birdseye.trace".to_string());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, "birdseye", extra);

    for (index, frame) in (1i64..).zip(frames) {
        let mut fields = Attributes::new();
        fields.insert(
            "oracle.birdseye.module".to_string(),
            text_field(frame.module.as_deref()),
        );
        fields.insert(
            "oracle.birdseye.function".to_string(),
            text_field(frame.function.as_deref()),
        );
        location(&mut fields, frame.filepath.as_deref(), frame.lineno);
        step.emit("oracle.birdseye.frame", index, fields)?;
    }

    let identified = frames
        .iter()
        .all(|frame| frame.function.as_deref().is_some_and(|f| !f.is_empty()));
    step.finish(
        ("birdseye.frames > 0", presence(frames.len())),
        (
            "birdseye.frame.identity",
            "birdseye frames include module+function identity",
            Status::from_bool(identified),
        ),
        &format!("birdseye frames materialized: {}", frames.len()),
    )
}
