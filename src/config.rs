use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{decision_service::types::DecisionServiceConfig, router::ExperimentMode};

const EMBEDDED_SCHEMA: &str = include_str!("../amped.schema.json");

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project_key: String,
    #[serde(default)]
    pub decision_service: DecisionServiceConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub identity: IdentityMode,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which entry route serves `/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Visitor identity travels in the `AmpToken` cookie.
    #[default]
    Token,
    /// Visitor identity comes from the `user_id` query parameter.
    UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub mode: ExperimentMode,
    #[serde(default)]
    pub decoy_context: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_template_path() -> PathBuf {
    PathBuf::from("./index.html")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            template_path: default_template_path(),
        }
    }
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
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
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub project_key: Option<String>,
    pub ab_test: Option<bool>,
    pub decoy_context: Option<bool>,
    pub template_path: Option<PathBuf>,
    pub use_tokens: Option<bool>,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema = resolve_schema(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize amped config")?;

        if !config.server.template_path.is_absolute() {
            config.server.template_path = config_base.join(&config.server.template_path);
        }

        Ok(config)
    }

    /// Loads `config_path`, or falls back to defaults when the file was not
    /// named explicitly and does not exist.
    pub fn load_or_default(config_path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !config_path.exists() {
            return Ok(Config::default());
        }
        Config::load(config_path)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(project_key) = &overrides.project_key {
            self.project_key = project_key.clone();
        }
        if let Some(ab_test) = overrides.ab_test {
            self.experiment.mode = if ab_test {
                ExperimentMode::ControlTrial
            } else {
                ExperimentMode::Adaptive
            };
        }
        if let Some(decoy_context) = overrides.decoy_context {
            self.experiment.decoy_context = decoy_context;
        }
        if let Some(template_path) = &overrides.template_path {
            self.server.template_path = template_path.clone();
        }
        if let Some(use_tokens) = overrides.use_tokens {
            self.identity = if use_tokens {
                IdentityMode::Token
            } else {
                IdentityMode::UserId
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_key.trim().is_empty() {
            return Err(anyhow!(
                "missing project key: set project_key in the config or pass --key"
            ));
        }
        if self.server.listen_addr.trim().is_empty() {
            return Err(anyhow!("server.listen_addr cannot be empty"));
        }
        Ok(())
    }
}

fn resolve_schema(config_base: &Path, config_value: &Value) -> Result<Value> {
    let schema_path = match config_value.get("$schema").and_then(|value| value.as_str()) {
        Some(path_text) => {
            let configured = PathBuf::from(path_text);
            Some(if configured.is_absolute() {
                configured
            } else {
                config_base.join(&configured)
            })
        }
        None => {
            let local_default = config_base.join("amped.schema.json");
            local_default.exists().then_some(local_default)
        }
    };

    let schema_content = match &schema_path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?,
        None => EMBEDDED_SCHEMA.to_string(),
    };

    serde_json::from_str(&schema_content).with_context(|| match &schema_path {
        Some(path) => format!("failed to parse schema {}", path.display()),
        None => "failed to parse embedded schema".to_string(),
    })
}

fn validate_against_schema(config_value: &Value, schema: &Value) -> Result<()> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

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
