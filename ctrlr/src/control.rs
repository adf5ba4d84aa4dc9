//! Control gates for instrumented code.
//!
//! A failed gate records a failure step in the active run (when there is one)
//! and returns [`GateError`] to the caller.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::trace::{StepOptions, current_lens, step};

/// A failed `require`, `ensure` or `invariant` gate.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", render(.message, .data.as_ref()))]
pub struct GateError {
    pub kind: GateKind,
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Require,
    Ensure,
    Invariant,
}

impl GateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Require => "require",
            Self::Ensure => "ensure",
            Self::Invariant => "invariant",
        }
    }
}

fn render(message: &str, data: Option<&Value>) -> String {
    match data {
        Some(data) => format!("{message} | data={data}"),
        None => message.to_string(),
    }
}

/// Precondition gate.
pub fn require(cond: bool, message: &str, data: Option<Value>) -> Result<(), GateError> {
    check(GateKind::Require, cond, message, data)
}

/// Postcondition gate.
pub fn ensure(cond: bool, message: &str, data: Option<Value>) -> Result<(), GateError> {
    check(GateKind::Ensure, cond, message, data)
}

/// Invariant gate.
pub fn invariant(cond: bool, message: &str, data: Option<Value>) -> Result<(), GateError> {
    check(GateKind::Invariant, cond, message, data)
}

fn check(kind: GateKind, cond: bool, message: &str, data: Option<Value>) -> Result<(), GateError> {
    if cond {
        return Ok(());
    }
    record_failure(kind, message, data.as_ref());
    Err(GateError {
        kind,
        message: message.to_string(),
        data,
    })
}

/// Record a failure step when a run is active. Recording errors are logged.
fn record_failure(kind: GateKind, message: &str, data: Option<&Value>) {
    if current_lens().is_none() {
        return;
    }
    let mut payload = Map::new();
    payload.insert("message".to_string(), Value::String(message.to_string()));
    payload.insert("data".to_string(), data.cloned().unwrap_or(Value::Null));
    if let Err(err) = step(kind.as_str(), StepOptions::failed(payload)) {
        debug!(error = %err, gate = kind.as_str(), "failed to record gate failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonl::read_jsonl;
    use crate::test_support::gen_lens;
    use crate::trace::run;
    use serde_json::json;

    #[test]
    fn passing_gates_are_silent() {
        assert_eq!(require(true, "ok", None), Ok(()));
        assert_eq!(ensure(true, "ok", None), Ok(()));
        assert_eq!(invariant(true, "ok", None), Ok(()));
    }

    #[test]
    fn failure_message_includes_data() {
        let err = require(false, "nope", Some(json!({"key": "value"}))).expect_err("fails");
        let message = err.to_string();
        assert!(message.contains("nope"));
        assert!(message.contains("key"));
        assert!(message.contains("value"));
        assert_eq!(err.kind, GateKind::Require);
    }

    #[test]
    fn failure_without_data_is_just_the_message() {
        let err = ensure(false, "post failed", None).expect_err("fails");
        assert_eq!(err.to_string(), "post failed");
    }

    #[test]
    fn failure_inside_a_run_records_a_failed_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trace.jsonl");
        {
            let _run = run(gen_lens(), &path).expect("run");
            assert!(invariant(false, "size mismatch", Some(json!(3))).is_err());
        }

        let log = read_jsonl(&path).expect("read");
        assert_eq!(log.steps.len(), 1);
        let recorded = &log.steps[0];
        assert_eq!(recorded.name, "invariant");
        assert!(!recorded.ok);
        let data = recorded.data.as_ref().expect("data");
        assert_eq!(data["message"], json!("size mismatch"));
        assert_eq!(data["data"], json!(3));
    }
}
