use std::fmt;

use serde::Deserialize;

use super::{AdapterStep, StepTarget};
use crate::error::{Result, RuntimeError};
use crate::records::{Attributes, SpanRecord, Status};
use crate::runtime::Runtime;

const FAMILY: &str = "coverage+pytest-cov";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CoverageSource {
    #[default]
    #[serde(rename = "coverage")]
    Coverage,
    #[serde(rename = "pytest-cov")]
    PytestCov,
}

impl CoverageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coverage => "coverage",
            Self::PytestCov => "pytest-cov",
        }
    }
}

impl fmt::Display for CoverageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line totals from a coverage report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoverageSummary {
    pub covered_lines: u64,
    pub total_lines: u64,
    #[serde(default)]
    pub source: CoverageSource,
    /// Minimum percent for the guard to pass.
    #[serde(default)]
    pub threshold_percent: Option<f64>,
}

impl CoverageSummary {
    /// Covered share in percent, rounded to 4 decimals; `0` for no lines.
    pub fn percent(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        let raw = self.covered_lines as f64 / self.total_lines as f64 * 100.0;
        (raw * 10_000.0).round() / 10_000.0
    }

    fn guard_status(&self, percent: f64) -> Status {
        if self.total_lines == 0 {
            return Status::Skip;
        }
        match self.threshold_percent {
            Some(threshold) if percent < threshold => Status::Fail,
            _ => Status::Pass,
        }
    }
}

pub fn emit_coverage_summary(
    runtime: &Runtime,
    target: &StepTarget,
    summary: &CoverageSummary,
) -> Result<SpanRecord> {
    if summary.covered_lines > summary.total_lines {
        return Err(RuntimeError::input(
            "coverage summary",
            "covered_lines cannot exceed total_lines",
        ));
    }
    let percent = summary.percent();
    let source = summary.source.as_str();
    let step_id = target.resolved_step_id(|| "coverage.summary".to_string());
    let step = AdapterStep::open(runtime, target, step_id, FAMILY, source, Attributes::new());

    let mut fields = Attributes::new();
    fields.insert(
        "oracle.coverage.covered_lines".to_string(),
        summary.covered_lines.into(),
    );
    fields.insert(
        "oracle.coverage.total_lines".to_string(),
        summary.total_lines.into(),
    );
    fields.insert("oracle.coverage.percent".to_string(), percent.into());
    step.emit("oracle.coverage.summary", target.seq, fields)?;

    step.finish(
        ("coverage.percent >= threshold", summary.guard_status(percent)),
        (
            "coverage.percent.range",
            "0 <= coverage.percent <= 100",
            Status::from_bool((0.0..=100.0).contains(&percent)),
        ),
        &format!("{source} coverage: {percent:.2}%"),
    )
}
