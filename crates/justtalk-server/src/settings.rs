//! Runtime server configuration.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use justtalk_core::voting::VotingConfig;
use serde::Deserialize;

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `JUSTTALK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// How often a vote that lost a write race is retried.
  #[serde(default = "default_max_conflict_retries")]
  pub max_conflict_retries: u32,
  /// Base pause between conflict retries, scaled by the attempt number.
  #[serde(default = "default_retry_backoff_ms")]
  pub retry_backoff_ms:     u64,
  /// How long a write waits on a locked database before reporting a conflict.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:      u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/justtalk/justtalk.db") }

fn default_max_conflict_retries() -> u32 { VotingConfig::default().max_conflict_retries }

fn default_retry_backoff_ms() -> u64 { VotingConfig::default().retry_backoff_ms }

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  /// Load from an optional TOML file, then let `JUSTTALK_*` env vars
  /// override it.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("JUSTTALK"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn voting(&self) -> VotingConfig {
    VotingConfig {
      max_conflict_retries: self.max_conflict_retries,
      retry_backoff_ms:     self.retry_backoff_ms,
    }
  }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
