//! Span and event records produced by the runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed attribute map; ordered so serialized output is stable.
pub type Attributes = BTreeMap<String, Value>;

/// Version stamped on every span by the runtime.
pub const SCHEMA_VERSION: &str = "1.0.0";

pub const RUN_SPAN: &str = "oracle.run";
pub const STEP_SPAN: &str = "oracle.step";

pub const GUARD_EVENT: &str = "oracle.guard";
pub const INVARIANT_EVENT: &str = "oracle.invariant";
pub const EXPLANATION_EVENT: &str = "oracle.explanation";

/// Attribute keys shared by the runtime, adapters and materializer.
pub mod keys {
    pub const SCHEMA_VERSION: &str = "oracle.evidence.schema_version";
    pub const RUN_ID: &str = "oracle.run_id";
    pub const STEP_ID: &str = "oracle.step_id";
    pub const SEQ: &str = "oracle.seq";
    pub const VARIANT_ID: &str = "oracle.variant_id";
    pub const RUN_LABEL: &str = "oracle.run_label";
    pub const ADAPTER_FAMILY: &str = "oracle.adapter.family";
    pub const ADAPTER_SOURCE: &str = "oracle.adapter.source";
    pub const ADAPTER_SEQ: &str = "oracle.adapter.seq";

    pub const CODE_FILEPATH: &str = "code.filepath";
    pub const CODE_LINENO: &str = "code.lineno";
    pub const NOTEBOOK_ID: &str = "oracle.notebook_id";
    pub const CELL_ID: &str = "oracle.cell_id";

    pub const GUARD_CONDITION: &str = "oracle.guard.condition";
    pub const GUARD_STATUS: &str = "oracle.guard.status";
    pub const INVARIANT_ID: &str = "oracle.invariant.id";
    pub const INVARIANT_STATEMENT: &str = "oracle.invariant.statement";
    pub const INVARIANT_STATUS: &str = "oracle.invariant.status";
    pub const EXPLANATION_TEXT: &str = "oracle.explanation.text";

    /// Keys that make up a span's provenance, in reporting order.
    pub const PROVENANCE: [&str; 4] = [CODE_FILEPATH, CODE_LINENO, NOTEBOOK_ID, CELL_ID];
}

/// Closed status vocabulary for guard and invariant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }

    /// `Pass` when `ok`, otherwise `Fail`.
    pub fn from_bool(ok: bool) -> Self {
        if ok { Self::Pass } else { Self::Fail }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rejected input of a status parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A named fact attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A span as recorded by the runtime. Sealed once its scope exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl SpanRecord {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            events: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// First event with `name`, if any.
    pub fn event(&self, name: &str) -> Option<&EventRecord> {
        self.events.iter().find(|event| event.name == name)
    }

    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EventRecord> {
        self.events.iter().filter(move |event| event.name == name)
    }
}
