//! Contract violations raised by the runtime and adapters.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unsupported OTEL_TRACES_EXPORTER: {0}")]
    UnsupportedExporter(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no active span")]
    NoActiveSpan,

    #[error("invalid {kind} status: {status}")]
    InvalidStatus { kind: &'static str, status: String },

    #[error("invalid {what}: {reason}")]
    InvalidInput { what: &'static str, reason: String },
}

impl RuntimeError {
    pub(crate) fn input(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            what,
            reason: reason.into(),
        }
    }
}
