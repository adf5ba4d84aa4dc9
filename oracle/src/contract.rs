//! Attribute contract for recorded spans and events.
//!
//! The runtime enforces only status enums at emission time. This checker is
//! what consumers run against recorded spans to confirm the full attribute
//! contract.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::records::{Attributes, EventRecord, SpanRecord};

const BUNDLED_CONTRACT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/oracle/schema_contract.json"
));

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpanContract {
    #[serde(default)]
    pub required_attributes: Vec<String>,
    /// Each group needs at least one of its keys.
    #[serde(default)]
    pub required_one_of: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventContract {
    #[serde(default)]
    pub required_attributes: Vec<String>,
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaContract {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub span: SpanContract,
    #[serde(default)]
    pub events: BTreeMap<String, EventContract>,
}

impl SchemaContract {
    /// The contract shipped with this crate.
    pub fn bundled() -> Result<Self> {
        serde_json::from_str(BUNDLED_CONTRACT).context("parse bundled schema contract")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read schema contract {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse schema contract {}", path.display()))
    }

    pub fn check_span(&self, span: &SpanRecord) -> Vec<String> {
        let mut errors = missing_keys(&self.span.required_attributes, &span.attributes, "span");
        for group in &self.span.required_one_of {
            if !group.iter().any(|key| span.attributes.contains_key(key)) {
                errors.push(format!("missing one_of keys: [{}]", group.join(", ")));
            }
        }
        errors
    }

    /// Violations for `event`; events the contract does not name pass.
    pub fn check_event(&self, event: &EventRecord) -> Vec<String> {
        let Some(contract) = self.events.get(&event.name) else {
            return Vec::new();
        };
        let mut errors = missing_keys(&contract.required_attributes, &event.attributes, "event");
        for (key, allowed) in &contract.enums {
            let Some(value) = event.attributes.get(key) else {
                continue;
            };
            let ok = matches!(value, Value::String(s) if allowed.iter().any(|a| a == s));
            if !ok {
                errors.push(format!("invalid enum for {key}: {value}"));
            }
        }
        errors
    }

    /// Span violations followed by each event's, prefixed with the event name.
    pub fn check_record(&self, span: &SpanRecord) -> Vec<String> {
        let mut errors = self.check_span(span);
        for event in &span.events {
            errors.extend(
                self.check_event(event)
                    .into_iter()
                    .map(|err| format!("{}: {err}", event.name)),
            );
        }
        errors
    }
}

fn missing_keys(required: &[String], attributes: &Attributes, kind: &str) -> Vec<String> {
    required
        .iter()
        .filter(|key| !attributes.contains_key(*key))
        .map(|key| format!("missing {kind} key {key}"))
        .collect()
}
