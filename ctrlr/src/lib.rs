//! Structured execution-trace recorder.
//!
//! This crate records hierarchical spans and point-in-time steps emitted during
//! test or algorithm runs and persists them as an ordered JSONL log. The
//! architecture keeps a strict separation:
//!
//! - **[`contracts`]**: Immutable entity types (lens, run capsule, span, step).
//! - **[`trace`]**: Context-scoped recorder. The current lens, span and log path
//!   are private to the calling thread; scopes restore them on exit.
//! - **[`jsonl`]**: Log persistence and exact round-trip deserialization.
//! - **[`mermaid`]**: Pure, deterministic diagram rendering.
//!
//! [`invariants`] and [`schema`] validate persisted logs; [`control`],
//! [`budget`] and [`seeded`] are small helpers for instrumented code.

pub mod budget;
pub mod contracts;
pub mod control;
pub mod error;
pub mod exit_codes;
pub mod invariants;
pub mod jsonl;
pub mod logging;
pub mod mermaid;
pub mod schema;
pub mod seeded;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod trace;

pub use contracts::{Data, Lens, Phase, Pillar, RunCapsule, Span, Step};
pub use error::TraceError;
pub use jsonl::{TraceLog, read_jsonl, write_jsonl};
pub use mermaid::{render_call_tree, render_flow};
pub use trace::{SpanOptions, StepOptions, current_lens, current_span_id, run, span, step};
