//! Optional telemetry mirroring.
//!
//! The runtime's local span list is authoritative. A backend only receives a
//! copy of each span as it opens, gains events and closes; its failures are
//! kept as diagnostics and never reach the caller.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ExporterMode, OracleConfig};
use crate::records::{Attributes, EventRecord, SpanRecord};

/// Runtime-assigned handle for a mirrored span.
pub type BackendSpanId = u64;

/// Receives a 1:1 mirror of the runtime's spans and events.
pub trait TelemetryBackend: Send {
    fn start_span(&mut self, id: BackendSpanId, name: &str, attributes: &Attributes) -> Result<()>;

    fn set_attribute(&mut self, id: BackendSpanId, key: &str, value: &Value) -> Result<()> {
        let _ = (id, key, value);
        Ok(())
    }

    fn add_event(&mut self, id: BackendSpanId, name: &str, attributes: &Attributes) -> Result<()>;

    fn end_span(&mut self, id: BackendSpanId) -> Result<()>;
}

/// Accepts everything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl TelemetryBackend for NoopBackend {
    fn start_span(&mut self, _: BackendSpanId, _: &str, _: &Attributes) -> Result<()> {
        Ok(())
    }

    fn add_event(&mut self, _: BackendSpanId, _: &str, _: &Attributes) -> Result<()> {
        Ok(())
    }

    fn end_span(&mut self, _id: BackendSpanId) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON line per ended span.
pub struct ConsoleBackend<W> {
    writer: W,
    resource: BTreeMap<String, String>,
    open: BTreeMap<BackendSpanId, SpanRecord>,
}

#[derive(Serialize)]
struct ConsoleLine<'a> {
    name: &'a str,
    attributes: &'a Attributes,
    events: &'a [EventRecord],
    resource: &'a BTreeMap<String, String>,
}

impl<W: Write + Send> ConsoleBackend<W> {
    pub fn new(writer: W, resource: BTreeMap<String, String>) -> Self {
        Self {
            writer,
            resource,
            open: BTreeMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn open_span(&mut self, id: BackendSpanId) -> Result<&mut SpanRecord> {
        self.open
            .get_mut(&id)
            .ok_or_else(|| anyhow!("console span {id} is not open"))
    }
}

impl ConsoleBackend<io::Stderr> {
    pub fn stderr(resource: BTreeMap<String, String>) -> Self {
        Self::new(io::stderr(), resource)
    }
}

impl<W: Write + Send> TelemetryBackend for ConsoleBackend<W> {
    fn start_span(&mut self, id: BackendSpanId, name: &str, attributes: &Attributes) -> Result<()> {
        self.open.insert(id, SpanRecord::new(name, attributes.clone()));
        Ok(())
    }

    fn set_attribute(&mut self, id: BackendSpanId, key: &str, value: &Value) -> Result<()> {
        self.open_span(id)?
            .attributes
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn add_event(&mut self, id: BackendSpanId, name: &str, attributes: &Attributes) -> Result<()> {
        self.open_span(id)?.events.push(EventRecord {
            name: name.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn end_span(&mut self, id: BackendSpanId) -> Result<()> {
        let span = self
            .open
            .remove(&id)
            .ok_or_else(|| anyhow!("console span {id} is not open"))?;
        let line = ConsoleLine {
            name: &span.name,
            attributes: &span.attributes,
            events: &span.events,
            resource: &self.resource,
        };
        serde_json::to_writer(&mut self.writer, &line).context("serialize console span")?;
        self.writer.write_all(b"\n").context("write console span")?;
        self.writer.flush().context("flush console span")?;
        Ok(())
    }
}

/// The backend selected by `config`, or the reason none is active.
pub fn backend_for(
    config: &OracleConfig,
) -> (Option<Box<dyn TelemetryBackend>>, Option<String>) {
    match config.traces_exporter {
        ExporterMode::None => (None, None),
        ExporterMode::Console => {
            let backend: Box<dyn TelemetryBackend> =
                Box::new(ConsoleBackend::stderr(config.resource_attributes.clone()));
            (Some(backend), None)
        }
        ExporterMode::Otlp => {
            let endpoint = config.otlp_endpoint.as_deref().unwrap_or("default endpoint");
            (
                None,
                Some(format!(
                    "otlp exporter unavailable: no collector transport linked for {endpoint}"
                )),
            )
        }
    }
}
