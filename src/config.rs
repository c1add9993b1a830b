use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{NewService, NewTeam};
use crate::service::ExitCodes;
use crate::utils::Seconds;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
  pub url: String,
  #[serde(default = "DatabaseConfig::default_max_connections")]
  pub max_connections: u32,
}

impl DatabaseConfig {
  fn default_max_connections() -> u32 {
    16
  }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckerConfig {
  /// Wall-clock budget of a single checker run
  pub timeout: Seconds,
  /// Program that enforces `timeout`; called as `<wrapper> <secs>s <checker> ...`
  #[serde(default = "CheckerConfig::default_wrapper")]
  pub wrapper: PathBuf,
  #[serde(default)]
  pub exit_codes: ExitCodes,
}

impl CheckerConfig {
  fn default_wrapper() -> PathBuf {
    PathBuf::from("timeout")
  }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PulseConfig {
  pub start: DateTime<Utc>,
  pub half: Seconds,
  pub lunch: Seconds,
  pub round_len: Seconds,
  /// Base pause between two checks of the same round
  pub check_interval: Seconds,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReceiverConfig {
  pub addr: SocketAddr,
  /// Minimum time between two connections from one address
  pub rate_limit: Seconds,
  pub socket_timeout: Seconds,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScoreboardConfig {
  pub addr: SocketAddr,
  pub update_interval: Seconds,
  #[serde(default = "ScoreboardConfig::default_advisory_enabled")]
  pub advisory_enabled: bool,
}

impl ScoreboardConfig {
  fn default_advisory_enabled() -> bool {
    true
  }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
  pub log_file: Option<PathBuf>,
  pub database: DatabaseConfig,
  pub checker: CheckerConfig,
  pub pulse: PulseConfig,
  pub receiver: ReceiverConfig,
  pub scoreboard: ScoreboardConfig,
  #[serde(default)]
  pub teams: Vec<NewTeam>,
  #[serde(default)]
  pub services: Vec<NewService>,
}

impl Config {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
      .with_context(|| format!("config file {} couldn't be read", path.display()))?;
    Config::parse(&contents)
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = toml::from_str(contents).context("couldn't parse config")?;
    config.checker.exit_codes.validate()?;
    Ok(config)
  }
}
