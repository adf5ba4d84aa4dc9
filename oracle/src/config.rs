//! Exporter configuration, read from `OTEL_*` environment variables or a
//! TOML file.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

pub const ENV_TRACES_EXPORTER: &str = "OTEL_TRACES_EXPORTER";
pub const ENV_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ENV_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";

pub const DEFAULT_SERVICE_NAME: &str = "oracle";
const SERVICE_NAME_KEY: &str = "service.name";

/// Where spans are mirrored besides the local record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExporterMode {
    #[default]
    None,
    Console,
    Otlp,
}

impl ExporterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Console => "console",
            Self::Otlp => "otlp",
        }
    }
}

impl fmt::Display for ExporterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExporterMode {
    type Err = RuntimeError;

    /// Trimmed and case-insensitive; blank means `none`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "none" => Ok(Self::None),
            "console" => Ok(Self::Console),
            "otlp" => Ok(Self::Otlp),
            _ => Err(RuntimeError::UnsupportedExporter(normalized)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub service_name: String,
    pub traces_exporter: ExporterMode,
    pub otlp_endpoint: Option<String>,
    pub resource_attributes: BTreeMap<String, String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let mut cfg = Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            traces_exporter: ExporterMode::None,
            otlp_endpoint: None,
            resource_attributes: BTreeMap::new(),
        };
        cfg.fill_service_name();
        cfg
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.service_name.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "service_name must be non-empty".to_string(),
            ));
        }
        if let Some(endpoint) = &self.otlp_endpoint
            && endpoint.trim().is_empty()
        {
            return Err(RuntimeError::InvalidConfig(
                "otlp_endpoint must be non-empty when set".to_string(),
            ));
        }
        Ok(())
    }

    fn fill_service_name(&mut self) {
        if !self.resource_attributes.contains_key(SERVICE_NAME_KEY) {
            self.resource_attributes
                .insert(SERVICE_NAME_KEY.to_string(), self.service_name.clone());
        }
    }
}

/// A read-only view of environment-like variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Parse `k1=v1, k2=v2`. Items without `=` and blank items are skipped.
pub fn parse_resource_attributes(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| item.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Resolve configuration from `env`, failing on unsupported exporter modes.
pub fn load_config(env: &impl EnvSource) -> Result<OracleConfig, RuntimeError> {
    let traces_exporter = env
        .var(ENV_TRACES_EXPORTER)
        .as_deref()
        .unwrap_or("none")
        .parse::<ExporterMode>()?;

    let service_name = env
        .var(ENV_SERVICE_NAME)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

    let otlp_endpoint = env
        .var(ENV_OTLP_ENDPOINT)
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty());

    let resource_attributes = env
        .var(ENV_RESOURCE_ATTRIBUTES)
        .map(|raw| parse_resource_attributes(&raw))
        .unwrap_or_default();

    let mut cfg = OracleConfig {
        service_name,
        traces_exporter,
        otlp_endpoint,
        resource_attributes,
    };
    cfg.fill_service_name();
    Ok(cfg)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OracleConfig::default()`.
pub fn load_config_file(path: &Path) -> Result<OracleConfig> {
    if !path.exists() {
        return Ok(OracleConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut cfg: OracleConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    cfg.fill_service_name();
    Ok(cfg)
}
