//! Context-scoped trace recorder.
//!
//! The current lens, the stack of open span ids and the active log path are
//! private to the calling thread. [`run`] and [`span`] return guards; dropping a
//! guard restores the state that was current when it was created, on every exit
//! path (normal return, `?`, or unwinding). A span guard dropped before the spans
//! nested inside it only removes its own id, so the innermost remaining span
//! stays current.
//!
//! ```no_run
//! use ctrlr::{Lens, Phase, Pillar, SpanOptions, StepOptions, run, span, step};
//!
//! # fn main() -> anyhow::Result<()> {
//! let _run = run(Lens::new("lens-1", Pillar::P1, Phase::Gen), "trace.jsonl")?;
//! let root = span("root", SpanOptions::default())?;
//! step("step-1", StepOptions::default())?;
//! drop(root);
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::contracts::{Data, Lens, RunCapsule, Span, Step};
use crate::jsonl::{Record, append_record, create_log};

#[derive(Debug, Clone, Default)]
struct TraceContext {
    lens: Option<Lens>,
    open_spans: Vec<String>,
    log_path: Option<PathBuf>,
}

thread_local! {
    static CONTEXT: RefCell<TraceContext> = RefCell::new(TraceContext::default());
}

/// Lens of the innermost active run on this thread.
pub fn current_lens() -> Option<Lens> {
    CONTEXT.with(|ctx| ctx.borrow().lens.clone())
}

/// Id of the innermost open span on this thread.
pub fn current_span_id() -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow().open_spans.last().cloned())
}

fn current_log_path() -> Option<PathBuf> {
    CONTEXT.with(|ctx| ctx.borrow().log_path.clone())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn append_to_current(record: &Record) -> Result<()> {
    match current_log_path() {
        Some(path) => append_record(&path, record),
        None => {
            trace!("no active run; record not persisted");
            Ok(())
        }
    }
}

/// Guard for an active run. Derefs to the run's capsule.
#[must_use = "the run ends when this guard is dropped"]
#[derive(Debug)]
pub struct RunScope {
    capsule: RunCapsule,
    previous: TraceContext,
    // Context is thread-local, so the guard must be dropped on its own thread.
    _not_send: PhantomData<*const ()>,
}

impl RunScope {
    pub fn capsule(&self) -> &RunCapsule {
        &self.capsule
    }
}

impl Deref for RunScope {
    type Target = RunCapsule;

    fn deref(&self) -> &RunCapsule {
        &self.capsule
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        // `try_with` tolerates drops during thread teardown.
        let _ = CONTEXT.try_with(|ctx| *ctx.borrow_mut() = previous);
        debug!(run_id = %self.capsule.run_id, "run closed");
    }
}

/// Start a run: truncate `log_path`, write the capsule and make `lens` current.
///
/// The current span is cleared for the duration of the run.
pub fn run(lens: Lens, log_path: impl AsRef<Path>) -> Result<RunScope> {
    let path = log_path.as_ref().to_path_buf();
    let capsule = RunCapsule {
        run_id: new_id(),
        lens: lens.clone(),
        started_at: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
    };
    create_log(&path, &Record::Run(capsule.clone()))?;
    debug!(run_id = %capsule.run_id, lens = %lens, path = %path.display(), "run opened");

    let previous = CONTEXT.with(|ctx| {
        std::mem::replace(
            &mut *ctx.borrow_mut(),
            TraceContext {
                lens: Some(lens),
                open_spans: Vec::new(),
                log_path: Some(path),
            },
        )
    });
    Ok(RunScope {
        capsule,
        previous,
        _not_send: PhantomData,
    })
}

/// Optional arguments for [`span`].
#[derive(Debug, Clone, Default)]
pub struct SpanOptions {
    /// Overrides the current lens.
    pub lens: Option<Lens>,
    pub data: Option<Data>,
}

/// Guard for an open span. Derefs to the recorded span.
#[must_use = "the span closes when this guard is dropped"]
#[derive(Debug)]
pub struct SpanScope {
    span: Span,
    _not_send: PhantomData<*const ()>,
}

impl SpanScope {
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Deref for SpanScope {
    type Target = Span;

    fn deref(&self) -> &Span {
        &self.span
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        let span_id = self.span.span_id.as_str();
        let _ = CONTEXT.try_with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            let open = &mut ctx.open_spans;
            match open.iter().rposition(|id| id == span_id) {
                Some(index) => {
                    if index + 1 != open.len() {
                        warn!(span_id, "span closed before spans nested inside it");
                    }
                    open.remove(index);
                }
                None => warn!(span_id, "closed span is not open in this context"),
            }
        });
    }
}

/// Open a span under the current span and make it current until the guard drops.
pub fn span(name: impl Into<String>, options: SpanOptions) -> Result<SpanScope> {
    let span = Span {
        span_id: new_id(),
        name: name.into(),
        lens: options.lens.or_else(current_lens),
        parent_span_id: current_span_id(),
        data: options.data,
    };
    append_to_current(&Record::Span(span.clone()))?;

    CONTEXT.with(|ctx| ctx.borrow_mut().open_spans.push(span.span_id.clone()));
    Ok(SpanScope {
        span,
        _not_send: PhantomData,
    })
}

/// Optional arguments for [`step`].
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Overrides the current lens.
    pub lens: Option<Lens>,
    /// Overrides the current span.
    pub span_id: Option<String>,
    pub ok: bool,
    pub data: Option<Data>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            lens: None,
            span_id: None,
            ok: true,
            data: None,
        }
    }
}

impl StepOptions {
    pub fn failed(data: Data) -> Self {
        Self {
            ok: false,
            data: Some(data),
            ..Self::default()
        }
    }
}

/// Record an immediate step fact. Does not open a scope.
pub fn step(name: impl Into<String>, options: StepOptions) -> Result<Step> {
    let step = Step {
        step_id: new_id(),
        name: name.into(),
        lens: options.lens.or_else(current_lens),
        span_id: options.span_id.or_else(current_span_id),
        ok: options.ok,
        data: options.data,
    };
    append_to_current(&Record::Step(step.clone()))?;
    Ok(step)
}
