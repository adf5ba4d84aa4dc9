//! End-to-end recorder scenarios.
//!
//! These tests drive `run`/`span`/`step` against a real log file and read it
//! back, verifying persisted shape and context restoration together.

use ctrlr::jsonl::{read_jsonl, write_jsonl};
use ctrlr::test_support::{gen_lens, scratch_dir};
use ctrlr::trace::{SpanOptions, StepOptions, current_lens, current_span_id, run, span, step};
use ctrlr::{Lens, Phase, Pillar};
use serde_json::{Map, Value, json};

/// run P1/GEN → span `root` → step `step-1` → close span → close run.
///
/// Reading back yields one capsule, one span and one step attached to the span.
#[test]
fn single_span_single_step_scenario() {
    let dir = scratch_dir();
    let path = dir.path().join("trace.jsonl");

    let (capsule, root, recorded) = {
        let run_scope = run(gen_lens(), &path).expect("run");
        let root = span("root", SpanOptions::default()).expect("span");
        let recorded = step("step-1", StepOptions::default()).expect("step");
        let root_span = root.span().clone();
        drop(root);
        (run_scope.capsule().clone(), root_span, recorded)
    };

    let log = read_jsonl(&path).expect("read");
    assert_eq!(log.capsule, capsule);
    assert_eq!(log.capsule.lens.to_string(), "P1/GEN");
    assert_eq!(log.spans, vec![root.clone()]);
    assert_eq!(log.spans[0].name, "root");
    assert_eq!(log.spans[0].lens, Some(gen_lens()));
    assert_eq!(log.steps, vec![recorded]);
    assert_eq!(log.steps[0].name, "step-1");
    assert_eq!(log.steps[0].span_id.as_deref(), Some(root.span_id.as_str()));

    assert_eq!(current_lens(), None);
    assert_eq!(current_span_id(), None);
}

/// An untouched log re-read after rewriting reproduces identical values.
#[test]
fn rewrite_of_recorded_log_round_trips() {
    let dir = scratch_dir();
    let path = dir.path().join("trace.jsonl");
    {
        let _run = run(Lens::new("lens-2", Pillar::P2, Phase::Struct), &path).expect("run");
        let mut data = Map::new();
        data.insert("attempt".to_string(), json!(2));
        data.insert("tags".to_string(), json!(["a", "b"]));
        let outer = span(
            "outer",
            SpanOptions {
                data: Some(data),
                ..SpanOptions::default()
            },
        )
        .expect("outer");
        let _inner = span("inner", SpanOptions::default()).expect("inner");
        let mut failure = Map::new();
        failure.insert("reason".to_string(), Value::String("timeout".to_string()));
        step("probe", StepOptions::failed(failure)).expect("step");
        assert!(outer.data.is_some());
    }

    let first = read_jsonl(&path).expect("read");
    let copy = dir.path().join("copy.jsonl");
    write_jsonl(&copy, &first.capsule, &first.spans, &first.steps).expect("write");
    let second = read_jsonl(&copy).expect("read copy");
    assert_eq!(first, second);

    assert_eq!(second.spans.len(), 2);
    assert_eq!(
        second.spans[1].parent_span_id.as_deref(),
        Some(second.spans[0].span_id.as_str())
    );
    assert!(!second.steps[0].ok);
}

/// A second run on the same path truncates the previous log.
#[test]
fn new_run_truncates_existing_log() {
    let dir = scratch_dir();
    let path = dir.path().join("trace.jsonl");
    {
        let _run = run(gen_lens(), &path).expect("run");
        step("old", StepOptions::default()).expect("step");
    }
    let capsule = {
        let run_scope = run(gen_lens(), &path).expect("run");
        run_scope.capsule().clone()
    };

    let log = read_jsonl(&path).expect("read");
    assert_eq!(log.capsule, capsule);
    assert!(log.steps.is_empty());
}

/// Span and step ids are unique within a run.
#[test]
fn generated_ids_are_unique() {
    let dir = scratch_dir();
    let _run = run(gen_lens(), dir.path().join("trace.jsonl")).expect("run");
    let mut ids = std::collections::HashSet::new();
    for _ in 0..50 {
        let scope = span("s", SpanOptions::default()).expect("span");
        assert!(ids.insert(scope.span_id.clone()));
        let recorded = step("t", StepOptions::default()).expect("step");
        assert!(ids.insert(recorded.step_id));
    }
}
