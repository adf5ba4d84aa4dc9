//! Span recorder with provenance inheritance and status enforcement.
//!
//! A [`Runtime`] owns the sealed span list and the backend mirror, and can be
//! shared across threads. The stack of open spans and the provenance map are
//! kept per logical task: each thread sees only the spans it opened and the
//! provenance it set on that runtime. Sealed spans from every task land in the
//! one shared list, in seal order.
//!
//! Span lifecycle: opened (pushed onto the task's stack, mirrored to the
//! backend), accepting events while innermost, sealed when its [`SpanScope`]
//! closes or drops (removed from the stack, appended to the span list). A
//! sealed span accepts nothing further.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{BackendSpanId, TelemetryBackend, backend_for};
use crate::config::{EnvSource, OracleConfig, load_config};
use crate::error::{Result, RuntimeError};
use crate::records::{
    Attributes, EXPLANATION_EVENT, EventRecord, GUARD_EVENT, INVARIANT_EVENT, RUN_SPAN,
    SCHEMA_VERSION, STEP_SPAN, SpanRecord, Status, keys,
};

/// Optional identifying fields and extra attributes for a new span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanOptions {
    pub variant_id: Option<String>,
    pub run_label: Option<String>,
    pub attributes: Attributes,
}

impl SpanOptions {
    pub fn variant_id(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn run_label(mut self, run_label: impl Into<String>) -> Self {
        self.run_label = Some(run_label.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

struct OpenSpan {
    id: BackendSpanId,
    record: SpanRecord,
    mirrored: bool,
}

/// Open spans and provenance of one task on one runtime.
#[derive(Default)]
struct TaskState {
    open: Vec<OpenSpan>,
    provenance: Attributes,
}

impl TaskState {
    /// `attributes` plus every provenance key they do not already set.
    fn with_provenance(&self, mut attributes: Attributes) -> Attributes {
        for (key, value) in &self.provenance {
            attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        attributes
    }

    fn is_empty(&self) -> bool {
        self.open.is_empty() && self.provenance.is_empty()
    }
}

thread_local! {
    static TASKS: RefCell<HashMap<u64, TaskState>> = RefCell::new(HashMap::new());
}

struct Shared {
    sealed: Vec<SpanRecord>,
    backend: Option<Box<dyn TelemetryBackend>>,
    backend_error: Option<String>,
}

impl Shared {
    fn mirror(
        &mut self,
        op: &str,
        call: impl FnOnce(&mut dyn TelemetryBackend) -> anyhow::Result<()>,
    ) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        if let Err(err) = call(backend) {
            let message = format!("{err:#}");
            warn!(op, error = %message, "telemetry backend failed");
            self.backend_error = Some(format!("{op}: {message}"));
        }
    }
}

pub struct Runtime {
    id: u64,
    config: OracleConfig,
    next_span_id: AtomicU64,
    shared: Mutex<Shared>,
}

impl Runtime {
    /// A runtime mirroring to whichever backend `config` selects. A backend
    /// that cannot be built leaves a diagnostic in [`Runtime::backend_error`].
    pub fn new(config: OracleConfig) -> Self {
        let (backend, backend_error) = backend_for(&config);
        if let Some(reason) = &backend_error {
            warn!(
                mode = %config.traces_exporter,
                reason = %reason,
                "recording spans locally only"
            );
        }
        Self::build(config, backend, backend_error)
    }

    /// Resolve configuration from `env`. Unsupported exporter modes fail here.
    pub fn from_env(env: &impl EnvSource) -> Result<Self> {
        Ok(Self::new(load_config(env)?))
    }

    pub fn with_backend(config: OracleConfig, backend: Box<dyn TelemetryBackend>) -> Self {
        Self::build(config, Some(backend), None)
    }

    fn build(
        config: OracleConfig,
        backend: Option<Box<dyn TelemetryBackend>>,
        backend_error: Option<String>,
    ) -> Self {
        Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            config,
            next_span_id: AtomicU64::new(1),
            shared: Mutex::new(Shared {
                sealed: Vec::new(),
                backend,
                backend_error,
            }),
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the calling task's state for this runtime.
    fn with_task<R>(&self, f: impl FnOnce(&mut TaskState) -> R) -> R {
        TASKS.with(|tasks| {
            let mut tasks = tasks.borrow_mut();
            let task = tasks.entry(self.id).or_default();
            let out = f(task);
            if task.is_empty() {
                tasks.remove(&self.id);
            }
            out
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn backend_enabled(&self) -> bool {
        self.shared().backend.is_some()
    }

    /// Latest reason the backend was unavailable or failed.
    pub fn backend_error(&self) -> Option<String> {
        self.shared().backend_error.clone()
    }

    /// Sealed spans from every task, in seal order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.shared().sealed.clone()
    }

    pub fn into_spans(self) -> Vec<SpanRecord> {
        std::mem::take(&mut self.shared().sealed)
    }

    /// Spans the calling task has open on this runtime.
    pub fn open_span_count(&self) -> usize {
        self.with_task(|task| task.open.len())
    }

    /// Open an `oracle.run` span.
    pub fn run_span(&self, run_id: &str, seq: i64, options: SpanOptions) -> SpanScope<'_> {
        let mut attributes = Attributes::new();
        attributes.insert(keys::SCHEMA_VERSION.to_string(), SCHEMA_VERSION.into());
        attributes.insert(keys::RUN_ID.to_string(), run_id.into());
        attributes.insert(keys::SEQ.to_string(), seq.into());
        self.open_span(RUN_SPAN, attributes, options)
    }

    /// Open an `oracle.step` span.
    pub fn step_span(
        &self,
        run_id: &str,
        step_id: &str,
        seq: i64,
        options: SpanOptions,
    ) -> SpanScope<'_> {
        let mut attributes = Attributes::new();
        attributes.insert(keys::SCHEMA_VERSION.to_string(), SCHEMA_VERSION.into());
        attributes.insert(keys::RUN_ID.to_string(), run_id.into());
        attributes.insert(keys::STEP_ID.to_string(), step_id.into());
        attributes.insert(keys::SEQ.to_string(), seq.into());
        self.open_span(STEP_SPAN, attributes, options)
    }

    fn open_span(
        &self,
        name: &str,
        mut attributes: Attributes,
        options: SpanOptions,
    ) -> SpanScope<'_> {
        if let Some(variant_id) = options.variant_id.filter(|v| !v.is_empty()) {
            attributes.insert(keys::VARIANT_ID.to_string(), variant_id.into());
        }
        if let Some(run_label) = options.run_label.filter(|v| !v.is_empty()) {
            attributes.insert(keys::RUN_LABEL.to_string(), run_label.into());
        }
        attributes.extend(options.attributes);

        let id = self.next_span_id.fetch_add(1, Ordering::Relaxed);
        let attributes = self.with_task(|task| task.with_provenance(attributes));

        let mirrored = {
            let mut shared = self.shared();
            let mirrored = shared.backend.is_some();
            if mirrored {
                shared.mirror("start_span", |backend| {
                    backend.start_span(id, name, &attributes)
                });
            }
            mirrored
        };
        self.with_task(|task| {
            debug!(span_name = name, id, depth = task.open.len(), "open span");
            task.open.push(OpenSpan {
                id,
                record: SpanRecord::new(name, attributes),
                mirrored,
            });
        });
        SpanScope {
            runtime: self,
            id,
            sealed: false,
            _not_send: PhantomData,
        }
    }

    fn seal(&self, id: BackendSpanId) -> Option<SpanRecord> {
        let open = self.with_task(|task| {
            let index = task.open.iter().rposition(|open| open.id == id)?;
            if index + 1 != task.open.len() {
                warn!(id, depth = index, "span closed before spans nested inside it");
            }
            Some(task.open.remove(index))
        })?;
        let mut shared = self.shared();
        if open.mirrored {
            shared.mirror("end_span", |backend| backend.end_span(id));
        }
        debug!(span_name = %open.record.name, id, "seal span");
        shared.sealed.push(open.record.clone());
        Some(open.record)
    }

    /// Source location inherited by spans and events this task opens or
    /// emits from now on.
    pub fn set_provenance_file(&self, filepath: impl Into<String>, lineno: u32) {
        let filepath = Value::String(filepath.into());
        self.with_task(|task| {
            task.provenance
                .insert(keys::CODE_FILEPATH.to_string(), filepath);
            task.provenance
                .insert(keys::CODE_LINENO.to_string(), Value::from(lineno));
        });
    }

    pub fn set_provenance_cell(&self, notebook_id: impl Into<String>, cell_id: impl Into<String>) {
        let (notebook_id, cell_id) = (notebook_id.into(), cell_id.into());
        self.with_task(|task| {
            task.provenance
                .insert(keys::NOTEBOOK_ID.to_string(), Value::String(notebook_id));
            task.provenance
                .insert(keys::CELL_ID.to_string(), Value::String(cell_id));
        });
    }

    pub fn clear_provenance(&self) {
        self.with_task(|task| task.provenance.clear());
    }

    /// Provenance the calling task has set on this runtime.
    pub fn provenance(&self) -> Attributes {
        self.with_task(|task| task.provenance.clone())
    }

    /// Attach an event to the calling task's innermost open span.
    pub fn emit_event(&self, name: &str, attributes: Attributes) -> Result<()> {
        let (id, mirrored, attributes) = self.with_task(|task| {
            let attributes = task.with_provenance(attributes);
            let open = task.open.last_mut().ok_or(RuntimeError::NoActiveSpan)?;
            open.record.events.push(EventRecord {
                name: name.to_string(),
                attributes: attributes.clone(),
            });
            Ok::<_, RuntimeError>((open.id, open.mirrored, attributes))
        })?;
        if mirrored {
            self.shared()
                .mirror("add_event", |backend| backend.add_event(id, name, &attributes));
        }
        Ok(())
    }

    pub fn emit_guard(&self, condition: &str, status: &str) -> Result<()> {
        let status = parse_status("guard", status)?;
        let mut attributes = Attributes::new();
        attributes.insert(keys::GUARD_CONDITION.to_string(), condition.into());
        attributes.insert(keys::GUARD_STATUS.to_string(), status.as_str().into());
        self.emit_event(GUARD_EVENT, attributes)
    }

    pub fn emit_invariant(&self, invariant_id: &str, statement: &str, status: &str) -> Result<()> {
        let status = parse_status("invariant", status)?;
        let mut attributes = Attributes::new();
        attributes.insert(keys::INVARIANT_ID.to_string(), invariant_id.into());
        attributes.insert(keys::INVARIANT_STATEMENT.to_string(), statement.into());
        attributes.insert(keys::INVARIANT_STATUS.to_string(), status.as_str().into());
        self.emit_event(INVARIANT_EVENT, attributes)
    }

    pub fn emit_explanation(&self, text: &str) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(keys::EXPLANATION_TEXT.to_string(), text.into());
        self.emit_event(EXPLANATION_EVENT, attributes)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let _ = TASKS.try_with(|tasks| tasks.borrow_mut().remove(&self.id));
    }
}

fn parse_status(kind: &'static str, status: &str) -> Result<Status> {
    status.parse::<Status>().map_err(|_| RuntimeError::InvalidStatus {
        kind,
        status: status.to_string(),
    })
}

/// An open span. Sealed by [`SpanScope::close`] or on drop.
///
/// The span lives on the opening task's stack, so the scope stays on that
/// thread.
#[must_use = "the span is sealed as soon as the scope is dropped"]
pub struct SpanScope<'rt> {
    runtime: &'rt Runtime,
    id: BackendSpanId,
    sealed: bool,
    _not_send: PhantomData<*const ()>,
}

impl SpanScope<'_> {
    /// Current contents of the open span.
    pub fn record(&self) -> Option<SpanRecord> {
        self.runtime.with_task(|task| {
            task.open
                .iter()
                .find(|open| open.id == self.id)
                .map(|open| open.record.clone())
        })
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        let mirrored = self.runtime.with_task(|task| {
            let open = task.open.iter_mut().find(|open| open.id == self.id)?;
            open.record.attributes.insert(key.clone(), value.clone());
            Some(open.mirrored)
        });
        if mirrored == Some(true) {
            let id = self.id;
            self.runtime
                .shared()
                .mirror("set_attribute", |backend| backend.set_attribute(id, &key, &value));
        }
    }

    /// Seal the span and return the record appended to the span list.
    pub fn close(mut self) -> Option<SpanRecord> {
        self.sealed = true;
        self.runtime.seal(self.id)
    }
}

impl Drop for SpanScope<'_> {
    fn drop(&mut self) {
        if !self.sealed {
            self.runtime.seal(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBackend;
    use serde_json::json;
    use std::sync::{Arc, Barrier, Mutex};

    fn runtime() -> Runtime {
        Runtime::new(OracleConfig::default())
    }

    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<String>>>);

    impl Calls {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().expect("lock"))
        }
    }

    struct RecordingBackend {
        calls: Calls,
        fail_events: bool,
    }

    impl TelemetryBackend for RecordingBackend {
        fn start_span(
            &mut self,
            id: BackendSpanId,
            name: &str,
            _attributes: &Attributes,
        ) -> anyhow::Result<()> {
            self.calls.0.lock().expect("lock").push(format!("start {id} {name}"));
            Ok(())
        }

        fn add_event(
            &mut self,
            id: BackendSpanId,
            name: &str,
            _attributes: &Attributes,
        ) -> anyhow::Result<()> {
            if self.fail_events {
                anyhow::bail!("collector down");
            }
            self.calls.0.lock().expect("lock").push(format!("event {id} {name}"));
            Ok(())
        }

        fn end_span(&mut self, id: BackendSpanId) -> anyhow::Result<()> {
            self.calls.0.lock().expect("lock").push(format!("end {id}"));
            Ok(())
        }
    }

    #[test]
    fn step_span_stamps_identifying_attributes() {
        let rt = runtime();
        let scope = rt.step_span(
            "run-1",
            "step-1",
            3,
            SpanOptions::default().variant_id("v1").run_label(""),
        );
        let record = scope.close().expect("sealed");
        assert_eq!(record.name, "oracle.step");
        assert_eq!(record.attribute(keys::SCHEMA_VERSION), Some(&json!("1.0.0")));
        assert_eq!(record.attribute(keys::RUN_ID), Some(&json!("run-1")));
        assert_eq!(record.attribute(keys::STEP_ID), Some(&json!("step-1")));
        assert_eq!(record.attribute(keys::SEQ), Some(&json!(3)));
        assert_eq!(record.attribute(keys::VARIANT_ID), Some(&json!("v1")));
        assert_eq!(record.attribute(keys::RUN_LABEL), None);
        assert_eq!(rt.spans(), vec![record]);
    }

    #[test]
    fn explicit_attributes_override_builtins() {
        let rt = runtime();
        let record = rt
            .run_span("run-1", 0, SpanOptions::default().attribute(keys::SEQ, 9))
            .close()
            .expect("sealed");
        assert_eq!(record.name, "oracle.run");
        assert_eq!(record.attribute(keys::SEQ), Some(&json!(9)));
        assert_eq!(record.attribute(keys::STEP_ID), None);
    }

    #[test]
    fn provenance_is_inherited_unless_explicit() {
        let rt = runtime();
        rt.set_provenance_file("src/lib.rs", 42);
        rt.set_provenance_cell("nb-1", "cell-7");

        let inherited = rt.run_span("run-1", 0, SpanOptions::default()).close().expect("sealed");
        assert_eq!(inherited.attribute(keys::CODE_FILEPATH), Some(&json!("src/lib.rs")));
        assert_eq!(inherited.attribute(keys::CODE_LINENO), Some(&json!(42)));
        assert_eq!(inherited.attribute(keys::NOTEBOOK_ID), Some(&json!("nb-1")));
        assert_eq!(inherited.attribute(keys::CELL_ID), Some(&json!("cell-7")));

        let explicit = rt
            .run_span(
                "run-1",
                1,
                SpanOptions::default().attribute(keys::CODE_FILEPATH, "override.rs"),
            )
            .close()
            .expect("sealed");
        assert_eq!(explicit.attribute(keys::CODE_FILEPATH), Some(&json!("override.rs")));
        assert_eq!(explicit.attribute(keys::CODE_LINENO), Some(&json!(42)));
    }

    #[test]
    fn provenance_does_not_touch_sealed_spans() {
        let rt = runtime();
        let _ = rt.run_span("run-1", 0, SpanOptions::default()).close();
        rt.set_provenance_file("late.rs", 1);
        assert_eq!(rt.spans()[0].attribute(keys::CODE_FILEPATH), None);
    }

    #[test]
    fn cleared_provenance_is_no_longer_inherited() {
        let rt = runtime();
        rt.set_provenance_file("a.rs", 3);
        assert_eq!(rt.provenance().get(keys::CODE_LINENO), Some(&json!(3)));
        rt.clear_provenance();
        assert!(rt.provenance().is_empty());
        let record = rt.run_span("r", 0, SpanOptions::default()).close().expect("sealed");
        assert_eq!(record.attribute(keys::CODE_FILEPATH), None);
        assert_eq!(record.attribute(keys::CODE_LINENO), None);
    }

    #[test]
    fn threads_keep_their_own_span_stack_and_provenance() {
        let rt = runtime();
        rt.set_provenance_file("main.rs", 1);
        let outer = rt.run_span("r", 0, SpanOptions::default());
        let barrier = Barrier::new(2);

        let worker = std::thread::scope(|s| {
            let worker = s.spawn(|| {
                assert_eq!(rt.open_span_count(), 0);
                assert!(rt.provenance().is_empty());
                assert_eq!(
                    rt.emit_explanation("nothing open here"),
                    Err(RuntimeError::NoActiveSpan)
                );
                rt.set_provenance_cell("nb-1", "cell-2");
                let scope = rt.step_span("r", "worker", 1, SpanOptions::default());
                barrier.wait();
                rt.emit_explanation("worker").expect("emit");
                barrier.wait();
                scope.close().expect("sealed")
            });
            barrier.wait();
            rt.emit_explanation("main").expect("emit");
            barrier.wait();
            worker.join().expect("worker thread")
        });

        assert_eq!(worker.attribute(keys::CELL_ID), Some(&json!("cell-2")));
        assert_eq!(worker.attribute(keys::CODE_FILEPATH), None);
        assert_eq!(worker.events.len(), 1);
        assert_eq!(
            worker.events[0].attributes.get(keys::EXPLANATION_TEXT),
            Some(&json!("worker"))
        );

        assert_eq!(rt.open_span_count(), 1);
        assert_eq!(rt.provenance().get(keys::CELL_ID), None);
        let outer = outer.close().expect("sealed");
        assert_eq!(outer.attribute(keys::CODE_FILEPATH), Some(&json!("main.rs")));
        assert_eq!(outer.events.len(), 1);
        assert_eq!(
            outer.events[0].attributes.get(keys::EXPLANATION_TEXT),
            Some(&json!("main"))
        );

        let names: Vec<String> = rt.spans().into_iter().map(|span| span.name).collect();
        assert_eq!(names, ["oracle.step", "oracle.run"]);
    }

    #[test]
    fn events_inherit_provenance_with_explicit_keys_winning() {
        let rt = runtime();
        rt.set_provenance_file("a.rs", 1);
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        let mut attrs = Attributes::new();
        attrs.insert(keys::CODE_LINENO.to_string(), json!(99));
        rt.emit_event("custom", attrs).expect("emit");
        let record = scope.close().expect("sealed");
        let event = record.event("custom").expect("event");
        assert_eq!(event.attributes.get(keys::CODE_FILEPATH), Some(&json!("a.rs")));
        assert_eq!(event.attributes.get(keys::CODE_LINENO), Some(&json!(99)));
    }

    #[test]
    fn emit_without_span_fails() {
        let rt = runtime();
        assert_eq!(
            rt.emit_explanation("nothing open"),
            Err(RuntimeError::NoActiveSpan)
        );
        assert_eq!(
            rt.emit_event("x", Attributes::new()).unwrap_err().to_string(),
            "no active span"
        );
    }

    #[test]
    fn invalid_status_emits_nothing() {
        let rt = runtime();
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        let err = rt.emit_guard("x > 0", "maybe").unwrap_err();
        assert_eq!(err.to_string(), "invalid guard status: maybe");
        let err = rt.emit_invariant("inv-1", "holds", "unknown").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidStatus {
                kind: "invariant",
                status: "unknown".to_string()
            }
        );
        let record = scope.close().expect("sealed");
        assert!(record.events.is_empty());
    }

    #[test]
    fn typed_events_carry_their_attributes() {
        let rt = runtime();
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        rt.emit_guard("x > 0", "pass").expect("guard");
        rt.emit_invariant("inv-1", "sorted", "skip").expect("invariant");
        rt.emit_explanation("because").expect("explanation");
        let record = scope.close().expect("sealed");
        let names: Vec<&str> = record.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["oracle.guard", "oracle.invariant", "oracle.explanation"]);
        let guard = record.event(GUARD_EVENT).expect("guard");
        assert_eq!(guard.attributes.get(keys::GUARD_CONDITION), Some(&json!("x > 0")));
        assert_eq!(guard.attributes.get(keys::GUARD_STATUS), Some(&json!("pass")));
        let invariant = record.event(INVARIANT_EVENT).expect("invariant");
        assert_eq!(invariant.attributes.get(keys::INVARIANT_STATUS), Some(&json!("skip")));
    }

    #[test]
    fn events_target_innermost_span_and_seal_order_is_inner_first() {
        let rt = runtime();
        let outer = rt.run_span("r", 0, SpanOptions::default());
        {
            let _inner = rt.step_span("r", "s", 1, SpanOptions::default());
            rt.emit_explanation("inner").expect("emit");
        }
        rt.emit_explanation("outer").expect("emit");
        drop(outer);

        let spans = rt.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "oracle.step");
        assert_eq!(spans[0].events.len(), 1);
        assert_eq!(spans[1].name, "oracle.run");
        assert_eq!(
            spans[1].events[0].attributes.get(keys::EXPLANATION_TEXT),
            Some(&json!("outer"))
        );
        assert_eq!(rt.open_span_count(), 0);
    }

    #[test]
    fn span_is_sealed_when_scope_unwinds() {
        let rt = runtime();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = rt.step_span("r", "s", 1, SpanOptions::default());
            rt.emit_explanation("before panic").expect("emit");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(rt.open_span_count(), 0);
        assert_eq!(rt.spans().len(), 1);
        assert_eq!(rt.spans()[0].events.len(), 1);
    }

    #[test]
    fn out_of_order_close_seals_the_right_span() {
        let rt = runtime();
        let outer = rt.run_span("r", 0, SpanOptions::default());
        let inner = rt.step_span("r", "s", 1, SpanOptions::default());
        let sealed = outer.close().expect("sealed");
        assert_eq!(sealed.name, "oracle.run");
        rt.emit_explanation("still inner").expect("emit");
        let inner = inner.close().expect("sealed");
        assert_eq!(inner.events.len(), 1);
    }

    #[test]
    fn set_attribute_updates_open_span() {
        let rt = runtime();
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        scope.set_attribute("extra", "value");
        assert_eq!(
            scope.record().expect("open").attribute("extra"),
            Some(&json!("value"))
        );
        let record = scope.close().expect("sealed");
        assert_eq!(record.attribute("extra"), Some(&json!("value")));
    }

    #[test]
    fn backend_receives_mirror() {
        let calls = Calls::default();
        let rt = Runtime::with_backend(
            OracleConfig::default(),
            Box::new(RecordingBackend {
                calls: calls.clone(),
                fail_events: false,
            }),
        );
        assert!(rt.backend_enabled());
        {
            let _scope = rt.step_span("r", "s", 1, SpanOptions::default());
            rt.emit_explanation("x").expect("emit");
        }
        assert_eq!(
            calls.take(),
            ["start 1 oracle.step", "event 1 oracle.explanation", "end 1"]
        );
        assert_eq!(rt.backend_error(), None);
    }

    #[test]
    fn noop_backend_leaves_records_unchanged() {
        let rt = Runtime::with_backend(OracleConfig::default(), Box::new(NoopBackend));
        assert!(rt.backend_enabled());
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        scope.set_attribute("extra", 1);
        rt.emit_guard("x > 0", "pass").expect("guard");
        let record = scope.close().expect("sealed");
        assert_eq!(record.attribute("extra"), Some(&json!(1)));
        assert_eq!(record.events.len(), 1);
        assert_eq!(rt.backend_error(), None);
        assert_eq!(rt.into_spans(), vec![record]);
    }

    #[test]
    fn backend_failure_does_not_alter_local_record() {
        let calls = Calls::default();
        let rt = Runtime::with_backend(
            OracleConfig::default(),
            Box::new(RecordingBackend {
                calls: calls.clone(),
                fail_events: true,
            }),
        );
        let scope = rt.step_span("r", "s", 1, SpanOptions::default());
        rt.emit_explanation("kept").expect("emit never fails on backend errors");
        let record = scope.close().expect("sealed");
        assert_eq!(record.events.len(), 1);
        assert_eq!(calls.take(), ["start 1 oracle.step", "end 1"]);
        let error = rt.backend_error().expect("diagnostic");
        assert!(error.contains("collector down"));
    }

    #[test]
    fn from_env_modes() {
        let env = |mode: &str| -> std::collections::HashMap<String, String> {
            [("OTEL_TRACES_EXPORTER".to_string(), mode.to_string())]
                .into_iter()
                .collect()
        };

        let rt = Runtime::from_env(&env("none")).expect("none");
        assert!(!rt.backend_enabled());
        assert_eq!(rt.backend_error(), None);

        let rt = Runtime::from_env(&env("otlp")).expect("otlp");
        assert!(!rt.backend_enabled());
        assert!(
            rt.backend_error()
                .expect("diagnostic")
                .starts_with("otlp exporter unavailable")
        );
        let record = rt.run_span("r", 0, SpanOptions::default()).close();
        assert!(record.is_some());

        let err = Runtime::from_env(&env("carrier-pigeon")).err().expect("unsupported");
        assert_eq!(err, RuntimeError::UnsupportedExporter("carrier-pigeon".to_string()));
    }
}
