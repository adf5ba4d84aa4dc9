//! Producers that translate tool output into `oracle.step` spans.
//!
//! Every adapter opens one step span tagged with its family and source,
//! emits its own correlated events, then closes with exactly one guard, one
//! invariant and one explanation.

mod coverage;
mod hunter_viztracer;
mod pytest;
mod snoop_birdseye;

pub use coverage::{CoverageSource, CoverageSummary, emit_coverage_summary};
pub use hunter_viztracer::{HunterEvent, VizTracerRecord, emit_hunter_events, emit_viztracer_trace};
pub use pytest::{PytestCase, emit_pytest_hypothesis_case};
pub use snoop_birdseye::{BirdseyeFrame, SnoopRecord, emit_birdseye_trace, emit_snoop_trace};

use serde_json::Value;

use crate::error::{Result, RuntimeError};
use crate::records::{Attributes, SpanRecord, Status, keys};
use crate::runtime::{Runtime, SpanOptions, SpanScope};

/// Which step span an adapter records into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTarget {
    pub run_id: String,
    pub seq: i64,
    /// Overrides the adapter's default step id.
    pub step_id: Option<String>,
    pub variant_id: Option<String>,
    pub run_label: Option<String>,
}

impl StepTarget {
    pub fn new(run_id: impl Into<String>, seq: i64) -> Self {
        Self {
            run_id: run_id.into(),
            seq,
            ..Self::default()
        }
    }

    pub fn step_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn variant_id(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn run_label(mut self, run_label: impl Into<String>) -> Self {
        self.run_label = Some(run_label.into());
        self
    }

    fn resolved_step_id(&self, default: impl FnOnce() -> String) -> String {
        self.step_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(default)
    }
}

/// An open adapter step with its resolved identity.
struct AdapterStep<'rt> {
    runtime: &'rt Runtime,
    scope: SpanScope<'rt>,
    run_id: String,
    step_id: String,
}

impl<'rt> AdapterStep<'rt> {
    fn open(
        runtime: &'rt Runtime,
        target: &StepTarget,
        step_id: String,
        family: &str,
        source: &str,
        extra: Attributes,
    ) -> Self {
        let mut options = SpanOptions {
            variant_id: target.variant_id.clone(),
            run_label: target.run_label.clone(),
            attributes: extra,
        };
        options
            .attributes
            .insert(keys::ADAPTER_FAMILY.to_string(), family.into());
        options
            .attributes
            .insert(keys::ADAPTER_SOURCE.to_string(), source.into());
        let scope = runtime.step_span(&target.run_id, &step_id, target.seq, options);
        Self {
            runtime,
            scope,
            run_id: target.run_id.clone(),
            step_id,
        }
    }

    /// Emit `name` carrying the step's run/step ids and `adapter_seq`.
    fn emit(&self, name: &str, adapter_seq: i64, fields: Attributes) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(keys::RUN_ID.to_string(), self.run_id.as_str().into());
        attributes.insert(keys::STEP_ID.to_string(), self.step_id.as_str().into());
        attributes.insert(keys::ADAPTER_SEQ.to_string(), adapter_seq.into());
        attributes.extend(fields);
        self.runtime.emit_event(name, attributes)
    }

    fn finish(
        self,
        guard: (&str, Status),
        invariant: (&str, &str, Status),
        explanation: &str,
    ) -> Result<SpanRecord> {
        self.runtime.emit_guard(guard.0, guard.1.as_str())?;
        self.runtime
            .emit_invariant(invariant.0, invariant.1, invariant.2.as_str())?;
        self.runtime.emit_explanation(explanation)?;
        self.scope.close().ok_or(RuntimeError::NoActiveSpan)
    }
}

/// `pass` when there is anything to report, `skip` otherwise.
fn presence(count: usize) -> Status {
    if count > 0 { Status::Pass } else { Status::Skip }
}

fn text_field(value: Option<&str>) -> Value {
    Value::String(value.unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use serde_json::json;

    #[test]
    fn step_target_falls_back_to_default_id() {
        let target = StepTarget::new("r", 1);
        assert_eq!(target.resolved_step_id(|| "x".to_string()), "x");
        let target = target.step_id("");
        assert_eq!(target.resolved_step_id(|| "x".to_string()), "x");
        let target = target.step_id("custom");
        assert_eq!(target.resolved_step_id(|| "x".to_string()), "custom");
    }

    #[test]
    fn adapter_step_tags_and_correlates() {
        let rt = Runtime::new(OracleConfig::default());
        let target = StepTarget::new("run-1", 4).run_label("baseline");
        let step = AdapterStep::open(
            &rt,
            &target,
            "s-1".to_string(),
            "fam",
            "src",
            Attributes::new(),
        );
        step.emit("custom.event", 2, Attributes::new()).expect("emit");
        let record = step
            .finish(("c", Status::Pass), ("i", "stmt", Status::Fail), "done")
            .expect("finish");

        assert_eq!(record.attribute(keys::ADAPTER_FAMILY), Some(&json!("fam")));
        assert_eq!(record.attribute(keys::ADAPTER_SOURCE), Some(&json!("src")));
        assert_eq!(record.attribute(keys::RUN_LABEL), Some(&json!("baseline")));
        let event = record.event("custom.event").expect("event");
        assert_eq!(event.attributes.get(keys::RUN_ID), Some(&json!("run-1")));
        assert_eq!(event.attributes.get(keys::STEP_ID), Some(&json!("s-1")));
        assert_eq!(event.attributes.get(keys::ADAPTER_SEQ), Some(&json!(2)));
        let names: Vec<&str> = record.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["custom.event", "oracle.guard", "oracle.invariant", "oracle.explanation"]
        );
        assert_eq!(rt.spans(), vec![record]);
    }
}
