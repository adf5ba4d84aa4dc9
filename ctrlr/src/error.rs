//! Contract violations raised by the recorder and renderer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TraceError {
    #[error("run capsule missing from jsonl {}", path.display())]
    MissingCapsule { path: PathBuf },

    #[error("span parent cycle detected at '{span_id}'")]
    ParentCycle { span_id: String },

    #[error("invalid {kind} node: {reason}")]
    InvalidNode { kind: &'static str, reason: String },

    #[error("invalid budget: {0}")]
    InvalidBudget(&'static str),
}
