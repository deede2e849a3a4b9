use std::{
    collections::BTreeMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    arbitration::types::{ResourceCeiling, Strategy},
    observability::metrics::MetricsRuntime,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub arbitration: ArbitrationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            arbitration: ArbitrationConfig::default(),
            solver: SolverConfig::default(),
            evaluator: EvaluatorConfig::default(),
            filters: FiltersConfig::default(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("arbiter.sock")
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/arbiter")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_metrics_listen_addr() -> SocketAddr {
    MetricsRuntime::default_listen_addr()
}

fn default_desire_queue_capacity() -> usize {
    32
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_evaluator_timeout_ms() -> u64 {
    2_000
}

fn default_service_wait_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
    /// Per-subsystem levels layered over `filter`, e.g. `{"sequencer": "debug"}`.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
            targets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    #[serde(default = "default_desire_queue_capacity")]
    pub desire_queue_capacity: usize,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Applied before any strategy is registered.
    #[serde(default)]
    pub resource_ceilings: Vec<ResourceCeiling>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            desire_queue_capacity: default_desire_queue_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            resource_ceilings: Vec::new(),
            strategies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverConfig {
    #[default]
    Greedy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatorConfig {
    Tracing {
        #[serde(default)]
        strict_identifiers: bool,
    },
    UnixSocket {
        socket_path: PathBuf,
        #[serde(default = "default_evaluator_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig::Tracing {
            strict_identifiers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_service_wait_timeout_ms")]
    pub service_wait_timeout_ms: u64,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            service_wait_timeout_ms: default_service_wait_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize arbiter config")?;

        if !config.socket_path.is_absolute() {
            config.socket_path = config_base.join(&config.socket_path);
        }
        if !config.logging.dir.is_absolute() {
            config.logging.dir = config_base.join(&config.logging.dir);
        }
        if let EvaluatorConfig::UnixSocket { socket_path, .. } = &mut config.evaluator
            && !socket_path.is_absolute()
        {
            *socket_path = config_base.join(&*socket_path);
        }

        Ok(config)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join("arbiter.schema.json");
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or arbiter.schema.json next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
