//! Configuration management for localdocs.
//!
//! Configuration is assembled from, in increasing order of precedence:
//! 1. Default configuration (embedded in the binary)
//! 2. System-wide configuration file (`/etc/localdocs/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables (`LOCALDOCS_<SECTION>__<KEY>`)
//! 5. Command-line arguments
//!
//! # Environment Variables
//!
//! - `LOCALDOCS_CONFIG` - Path of the user configuration file
//! - `LOCALDOCS_LOCALDOCS__EMBEDDING_MODEL` - Embedding model name
//! - `LOCALDOCS_MODELS__DEFAULT` - Id of the default chat model
//! - `LOCALDOCS_WAIT__LOAD__ATTEMPTS` - Number of load polls before giving up

use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::{ModelDescriptor, SamplingParams};
use crate::error::{Error, Result};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const SYSTEM_CONFIG: &str = "/etc/localdocs/config.toml";

/// Command-line overrides shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, env = "LOCALDOCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding model files
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Id or name of the default chat model
    #[arg(long)]
    pub default_model: Option<String>,

    /// Embedding model used for indexing
    #[arg(long)]
    pub embedding_model: Option<String>,
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub localdocs: LocalDocsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub wait: WaitPolicy,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Indexing settings forwarded to the database worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDocsConfig {
    /// Embedding model; folders cannot be indexed without one
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub file_extensions: Vec<String>,
}

impl Default for LocalDocsConfig {
    fn default() -> Self {
        Self {
            embedding_model: None,
            chunk_size: default_chunk_size(),
            file_extensions: Vec::new(),
        }
    }
}

/// Known models and the default one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub dir: PathBuf,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub entries: Vec<ModelDescriptor>,
}

/// Sampling defaults plus per-model overrides keyed by model id or name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default)]
    pub defaults: SamplingParams,
    #[serde(default)]
    pub models: HashMap<String, SamplingParams>,
}

/// A bounded poll: check, sleep `interval_ms`, repeat up to `attempts` times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWindow {
    pub interval_ms: u64,
    pub attempts: u32,
}

impl PollWindow {
    pub const fn new(interval_ms: u64, attempts: u32) -> Self {
        Self { interval_ms, attempts }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest time the window can take
    pub fn total(&self) -> Duration {
        self.interval() * self.attempts
    }
}

/// Poll windows used while borrowing the session's model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Waiting for the session to finish loading (about 30s)
    pub load: PollWindow,
    /// Waiting for the unloaded model to reach the store (about 5s)
    pub unload: PollWindow,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            load: PollWindow::new(500, 60),
            unload: PollWindow::new(500, 10),
        }
    }
}

/// HTTP settings for remote models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_remote_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Logging settings; CLI flags take precedence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub filter: Option<String>,
    /// Also write logs to `<dir>/localdocs.log`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: None,
            dir: None,
        }
    }
}

fn default_chunk_size() -> usize {
    512
}

fn default_remote_timeout() -> u64 {
    600
}

fn default_user_agent() -> String {
    format!("localdocs/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration from all sources
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name(SYSTEM_CONFIG).required(false));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LOCALDOCS")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML document; no files or environment.
    pub fn from_toml(overlay: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(overlay, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<ServiceConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.localdocs.chunk_size == 0 {
            return Err(Error::config("localdocs.chunk_size must be positive"));
        }
        for (name, window) in [("wait.load", self.wait.load), ("wait.unload", self.wait.unload)] {
            if window.interval_ms == 0 {
                return Err(Error::config(format!("{}.interval_ms must be positive", name)));
            }
        }
        if self.remote.timeout_secs == 0 {
            return Err(Error::config("remote.timeout_secs must be positive"));
        }
        if let Some(entry) = self.models.entries.iter().find(|m| m.id.is_empty()) {
            return Err(Error::config(format!(
                "model entry '{}' has no id",
                entry.filename
            )));
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &ConfigArgs) {
        if let Some(dir) = &args.models_dir {
            self.models.dir = dir.clone();
        }
        if let Some(model) = &args.default_model {
            self.models.default = Some(model.clone());
        }
        if let Some(model) = &args.embedding_model {
            self.localdocs.embedding_model = Some(model.clone());
        }
    }
}
