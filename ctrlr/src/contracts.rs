//! Entity types shared by the recorder, the log and the renderer.
//!
//! Values are created once and never mutated afterwards. Field names and the
//! serialized shape are part of the JSONL contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form payload attached to spans and steps.
pub type Data = Map<String, Value>;

/// Which pillar of the system a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pillar {
    P1,
    P2,
    P3,
}

/// Execution phase within a pillar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Gen,
    Struct,
    Verify,
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gen => write!(f, "GEN"),
            Self::Struct => write!(f, "STRUCT"),
            Self::Verify => write!(f, "VERIFY"),
        }
    }
}

/// Classification tag (pillar + phase) for a run or span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lens {
    pub lens_id: String,
    pub pillar: Pillar,
    pub phase: Phase,
}

impl Lens {
    pub fn new(lens_id: impl Into<String>, pillar: Pillar, phase: Phase) -> Self {
        Self {
            lens_id: lens_id.into(),
            pillar,
            phase,
        }
    }
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pillar, self.phase)
    }
}

/// One per logical run; always the first record of a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCapsule {
    pub run_id: String,
    pub lens: Lens,
    /// UNIX epoch seconds.
    pub started_at: f64,
}

/// A scoped unit of recorded work.
///
/// `parent_span_id` is a back-reference only; children are discovered by
/// scanning for spans that name this span as their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub name: String,
    #[serde(default)]
    pub lens: Option<Lens>,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub data: Option<Data>,
}

impl Span {
    pub fn new(span_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            span_id: span_id.into(),
            name: name.into(),
            lens: None,
            parent_span_id: None,
            data: None,
        }
    }

    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }
}

/// A leaf fact recorded at a point in time. Never has children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub name: String,
    #[serde(default)]
    pub lens: Option<Lens>,
    #[serde(default)]
    pub span_id: Option<String>,
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default)]
    pub data: Option<Data>,
}

impl Step {
    pub fn new(step_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            lens: None,
            span_id: None,
            ok: true,
            data: None,
        }
    }
}

fn default_ok() -> bool {
    true
}
