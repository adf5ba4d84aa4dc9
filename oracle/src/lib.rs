//! Schema-validated span runtime for cross-tool step evidence.
//!
//! - **[`runtime`]**: Span recorder with provenance inheritance, status
//!   enforcement and optional mirroring to a [`backend`].
//! - **[`adapters`]**: Producers for test runners, tracers and coverage tools,
//!   all emitting the same `oracle.step` shape.
//! - **[`materialize`]**: Ordered step summaries for downstream consumers.
//! - **[`contract`]**: Attribute contract checks for recorded spans.
//!
//! [`config`] resolves the exporter settings; [`snapshot`] persists sealed
//! spans.

pub mod adapters;
pub mod backend;
pub mod config;
pub mod contract;
pub mod error;
pub mod materialize;
pub mod records;
pub mod runtime;
pub mod snapshot;

pub use config::{EnvSource, ExporterMode, OracleConfig, ProcessEnv, load_config};
pub use error::RuntimeError;
pub use materialize::{MaterializedSteps, StepSummary, materialize_steps};
pub use records::{Attributes, EventRecord, SpanRecord, Status};
pub use runtime::{Runtime, SpanOptions, SpanScope};
