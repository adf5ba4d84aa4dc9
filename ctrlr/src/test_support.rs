//! Test-only helpers for constructing trace entities.

use crate::contracts::{Lens, Phase, Pillar, RunCapsule, Span, Step};

/// Create a root span with no lens or data.
pub fn span(id: &str, name: &str) -> Span {
    Span::new(id, name)
}

/// Create a span with an explicit parent reference.
pub fn child_span(id: &str, name: &str, parent: &str) -> Span {
    Span::new(id, name).with_parent(parent)
}

/// Create a successful step with no lens, span or data.
pub fn step(id: &str, name: &str) -> Step {
    Step::new(id, name)
}

/// Create a capsule with a fixed start time.
pub fn capsule(run_id: &str, lens: Lens) -> RunCapsule {
    RunCapsule {
        run_id: run_id.to_string(),
        lens,
        started_at: 1_700_000_000.25,
    }
}

/// The lens used by most scenario tests (`P1/GEN`).
pub fn gen_lens() -> Lens {
    Lens::new("lens-gen", Pillar::P1, Phase::Gen)
}

/// A scratch directory that is removed on drop.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}
