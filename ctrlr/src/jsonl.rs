//! JSONL trace log persistence.
//!
//! One `{"data": ..., "type": ...}` object per line. The first record is always
//! the run capsule; span and step records follow in emission order. Unknown
//! record types are skipped on read.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::contracts::{RunCapsule, Span, Step};
use crate::error::TraceError;

/// A single log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Record {
    Run(RunCapsule),
    Span(Span),
    Step(Step),
}

/// Untyped envelope used on read so unknown record types can be skipped.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    record_type: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Fully parsed contents of a trace log.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLog {
    pub capsule: RunCapsule,
    pub spans: Vec<Span>,
    pub steps: Vec<Step>,
}

/// Render a record as one compact line with sorted object keys.
pub fn encode_record(record: &Record) -> Result<String> {
    let mut value = serde_json::to_value(record).context("serialize trace record")?;
    sort_keys(&mut value);
    let mut line = serde_json::to_string(&value).context("encode trace record")?;
    line.push('\n');
    Ok(line)
}

/// Sort object keys recursively so lines are byte-stable regardless of how
/// `serde_json` orders maps.
pub fn sort_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.sort_keys();
            for child in map.values_mut() {
                sort_keys(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

/// Truncate `path` and write `record` as its only line.
pub fn create_log(path: &Path, record: &Record) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let line = encode_record(record)?;
    fs::write(path, line).with_context(|| format!("write trace log {}", path.display()))
}

/// Append `record` to an existing log.
pub fn append_record(path: &Path, record: &Record) -> Result<()> {
    let line = encode_record(record)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open trace log {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append trace log {}", path.display()))
}

/// Rewrite a log from in-memory collections: capsule, then spans, then steps.
pub fn write_jsonl(
    path: &Path,
    capsule: &RunCapsule,
    spans: &[Span],
    steps: &[Step],
) -> Result<()> {
    let mut buf = encode_record(&Record::Run(capsule.clone()))?;
    for span in spans {
        buf.push_str(&encode_record(&Record::Span(span.clone()))?);
    }
    for step in steps {
        buf.push_str(&encode_record(&Record::Step(step.clone()))?);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    debug!(path = %path.display(), spans = spans.len(), steps = steps.len(), "writing trace log");
    fs::write(path, buf).with_context(|| format!("write trace log {}", path.display()))
}

/// Parse a log written by [`write_jsonl`] or by the scoped recorder.
pub fn read_jsonl(path: &Path) -> Result<TraceLog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read trace log {}", path.display()))?;

    let mut capsule: Option<RunCapsule> = None;
    let mut spans = Vec::new();
    let mut steps = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let lineno = index + 1;
        let envelope: Envelope = serde_json::from_str(line)
            .with_context(|| format!("parse {}:{}", path.display(), lineno))?;
        match envelope.record_type.as_deref() {
            Some("run") => {
                let parsed: RunCapsule = serde_json::from_value(envelope.data)
                    .with_context(|| format!("parse run record {}:{}", path.display(), lineno))?;
                if capsule.is_some() {
                    warn!(path = %path.display(), line = lineno, "duplicate run record; last wins");
                }
                capsule = Some(parsed);
            }
            Some("span") => spans.push(
                serde_json::from_value(envelope.data)
                    .with_context(|| format!("parse span record {}:{}", path.display(), lineno))?,
            ),
            Some("step") => steps.push(
                serde_json::from_value(envelope.data)
                    .with_context(|| format!("parse step record {}:{}", path.display(), lineno))?,
            ),
            other => debug!(record_type = ?other, line = lineno, "skipping unknown record"),
        }
    }

    let capsule = capsule.ok_or_else(|| TraceError::MissingCapsule {
        path: path.to_path_buf(),
    })?;
    Ok(TraceLog {
        capsule,
        spans,
        steps,
    })
}
