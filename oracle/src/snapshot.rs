//! Sealed span snapshots stored as pretty JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::records::SpanRecord;

/// Atomically write `spans` (temp file + rename).
pub fn write_spans(path: &Path, spans: &[SpanRecord]) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(spans).context("serialize spans")?;
    buf.push('\n');
    write_atomic(path, &buf)?;
    debug!(path = %path.display(), count = spans.len(), "wrote span snapshot");
    Ok(())
}

pub fn read_spans(path: &Path) -> Result<Vec<SpanRecord>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("span snapshot path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp span snapshot {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace span snapshot {}", path.display()))?;
    Ok(())
}
