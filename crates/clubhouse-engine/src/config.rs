//! Engine configuration.
//!
//! Every field has a default, so an empty configuration source is valid.

use chrono::Duration;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub ledger:   LedgerConfig,
  pub missions: MissionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
  /// How many times a ledger entry is re-attempted after losing an
  /// optimistic-concurrency race on the wallet version.
  pub max_conflict_retries: u32,
}

impl Default for LedgerConfig {
  fn default() -> Self { Self { max_conflict_retries: 3 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
  /// Length of the default window for one-time missions.
  pub one_time_span_days: i64,
}

impl MissionConfig {
  pub fn one_time_span(&self) -> Duration {
    Duration::try_days(self.one_time_span_days).unwrap_or(Duration::MAX)
  }
}

impl Default for MissionConfig {
  fn default() -> Self { Self { one_time_span_days: 3650 } }
}
