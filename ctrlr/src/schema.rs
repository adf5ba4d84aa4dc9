//! Trace log validation: per-line JSON Schema plus semantic invariants.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::debug;

use crate::invariants::validate_log_invariants;
use crate::jsonl::read_jsonl;

pub const RECORD_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/trace_record/v1.schema.json"
));

/// Compiled validator for trace log records.
pub struct LogValidator {
    record_schema: Validator,
}

impl LogValidator {
    /// Compile the bundled record schema.
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(RECORD_SCHEMA).context("parse record schema")?;
        Self::from_schema(&schema)
    }

    pub fn from_schema(schema: &Value) -> Result<Self> {
        let record_schema =
            validator_for(schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
        Ok(Self { record_schema })
    }

    /// Validate the log at `path`.
    ///
    /// Returns stable violation messages (empty when the log is valid). I/O
    /// failures are errors, not violations.
    pub fn validate_file(&self, path: &Path) -> Result<Vec<String>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read trace log {}", path.display()))?;
        let mut errors = self.validate_lines(&contents);
        if errors.is_empty() {
            let log = read_jsonl(path)?;
            errors.extend(validate_log_invariants(&log));
        }
        debug!(path = %path.display(), violations = errors.len(), "trace log validated");
        Ok(errors)
    }

    fn validate_lines(&self, contents: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let mut first_record = true;
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let lineno = index + 1;
            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(err) => {
                    errors.push(format!("line {lineno}: invalid json: {err}"));
                    continue;
                }
            };
            if first_record {
                first_record = false;
                if value.get("type").and_then(Value::as_str) != Some("run") {
                    errors.push(format!("line {lineno}: first record must be type=run"));
                }
            }
            errors.extend(
                self.record_schema
                    .iter_errors(&value)
                    .map(|err| format!("line {lineno}: {err}")),
            );
        }
        if first_record {
            errors.push("log is empty".to_string());
        }
        errors
    }
}
