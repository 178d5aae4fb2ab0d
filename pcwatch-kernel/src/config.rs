//! Dashboard configuration
//!
//! Loaded once at startup from a JSON document and shared read-only afterwards.
//! The file is the same one the external monitor reads, so unknown keys are
//! ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Placeholder substituted with the target computer name in the remediation command.
pub const TARGET_PLACEHOLDER: &str = "{target}";

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const CONFIG_PATH_ENV: &str = "PCWATCH_CONFIG";

const DEFAULT_REMEDIATION_COMMAND: &str =
    "pwsh.exe -ExecutionPolicy Bypass -File scripts/restart-rdp-remote.ps1 -ComputerName {target}";
const DEFAULT_REMEDIATION_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub dashboard_settings: DashboardSettings,
    /// Seconds between external monitor runs. Informational only.
    pub monitoring_interval: u64,
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    #[serde(default)]
    pub remediation: RemediationConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    pub host: String,
    pub port: u16,
    /// Polling cadence advertised to front-ends.
    pub refresh_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemediationConf {
    pub command: String, // ex: "pwsh.exe -File restart.ps1 -ComputerName {target}"
    pub timeout_seconds: u64,
}

impl Default for RemediationConf {
    fn default() -> Self {
        Self {
            command: DEFAULT_REMEDIATION_COMMAND.into(),
            timeout_seconds: DEFAULT_REMEDIATION_TIMEOUT_SECS,
        }
    }
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("data")
}

/// Fixed program and arguments of the remediation command.
///
/// The target name only ever replaces [`TARGET_PLACEHOLDER`] inside an
/// argument, so it always stays a single argv element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(command: &str) -> Result<Self, ConfigError> {
        let mut words = shell_words::split(command)
            .map_err(|e| ConfigError::Invalid(format!("remediation command: {e}")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| ConfigError::Invalid("remediation command is empty".into()))?;
        let args: Vec<String> = words.collect();
        if !args.iter().any(|a| a.contains(TARGET_PLACEHOLDER)) {
            return Err(ConfigError::Invalid(format!(
                "remediation command must pass {TARGET_PLACEHOLDER} as an argument"
            )));
        }
        Ok(Self { program, args })
    }

    pub fn render(&self, target: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(TARGET_PLACEHOLDER, target))
            .collect()
    }
}

impl DashboardConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.dashboard_settings.host, self.dashboard_settings.port)
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_directory.join("status.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_directory.join("history.json")
    }

    pub fn remediation_timeout(&self) -> Duration {
        Duration::from_secs(self.remediation.timeout_seconds)
    }

    pub fn remediation_command(&self) -> Result<CommandTemplate, ConfigError> {
        CommandTemplate::parse(&self.remediation.command)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.remediation.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("remediation.timeoutSeconds must be > 0".into()));
        }
        self.remediation_command().map(|_| ())
    }
}

/// Resolves the config path from `PCWATCH_CONFIG`, falling back to `config.json`.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub async fn load_config(path: impl AsRef<Path>) -> Result<DashboardConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: DashboardConfig = serde_json::from_str(&txt).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}
