//! Configuration for the `clubhouse` binary.
//!
//! Values come from an optional TOML file layered under `CLUBHOUSE_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `CLUBHOUSE_LEDGER__MAX_CONFLICT_RETRIES=5`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clubhouse_engine::{EngineConfig, LedgerConfig, MissionConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub ledger:     LedgerConfig,
  #[serde(default)]
  pub missions:   MissionConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("clubhouse.db") }

impl CliConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CLUBHOUSE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise configuration")
  }

  pub fn engine(&self) -> EngineConfig {
    EngineConfig {
      ledger:   self.ledger.clone(),
      missions: self.missions.clone(),
    }
  }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = CliConfig::load(Path::new("does-not-exist.toml")).unwrap();
    let engine = cfg.engine();
    assert_eq!(engine.ledger.max_conflict_retries, 3);
    assert_eq!(engine.missions.one_time_span_days, 3650);
  }

  #[test]
  fn tilde_is_expanded() {
    let cfg = CliConfig {
      store_path: PathBuf::from("~/clubhouse.db"),
      ledger:     LedgerConfig::default(),
      missions:   MissionConfig::default(),
    };
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(cfg.store_path(), PathBuf::from(home).join("clubhouse.db"));
    }
  }
}
