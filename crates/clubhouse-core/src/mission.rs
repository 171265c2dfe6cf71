//! Mission definitions and the per-user, per-period instances that track
//! progress towards them.

use chrono::{DateTime, Duration, Months, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// How often a mission resets.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissionPeriod {
  #[default]
  OneTime,
  Daily,
  Weekly,
  Monthly,
}

impl MissionPeriod {
  /// Default window for an instance assigned at `now`.
  ///
  /// Periodic windows are anchored on the start of the current UTC day, so
  /// two default assignments on the same day share a period key. One-time
  /// missions run for `one_time_span` from `now`.
  pub fn window(
    self,
    now: DateTime<Utc>,
    one_time_span: Duration,
  ) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
    match self {
      Self::Daily => (midnight, midnight + Duration::days(1)),
      Self::Weekly => (midnight, midnight + Duration::days(7)),
      Self::Monthly => (
        midnight,
        midnight
          .checked_add_months(Months::new(1))
          .unwrap_or(DateTime::<Utc>::MAX_UTC),
      ),
      Self::OneTime => (
        now,
        now
          .checked_add_signed(one_time_span)
          .unwrap_or(DateTime::<Utc>::MAX_UTC),
      ),
    }
  }
}

/// A reusable recurring-goal template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionDefinition {
  pub definition_id:      Uuid,
  pub name:               String,
  pub code:               Option<String>,
  pub description:        Option<String>,
  pub period:             MissionPeriod,
  /// Always positive.
  pub target_value:       i64,
  pub reward_amount:      Option<Decimal>,
  pub reward_description: Option<String>,
  /// Raw condition document; see [`crate::condition::Condition`].
  pub condition:          Option<String>,
  pub is_active:          bool,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         Option<DateTime<Utc>>,
}

/// Input to `create_mission_definition` and `update_mission_definition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMissionDefinition {
  pub name:               String,
  pub code:               Option<String>,
  pub description:        Option<String>,
  pub period:             MissionPeriod,
  pub target_value:       i64,
  pub reward_amount:      Option<Decimal>,
  pub reward_description: Option<String>,
  pub condition:          Option<String>,
  pub is_active:          bool,
}

impl NewMissionDefinition {
  /// An active definition with no reward and no condition.
  pub fn new(name: impl Into<String>, period: MissionPeriod, target_value: i64) -> Self {
    Self {
      name: name.into(),
      code: None,
      description: None,
      period,
      target_value,
      reward_amount: None,
      reward_description: None,
      condition: None,
      is_active: true,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.target_value <= 0 {
      return Err(Error::NonPositiveTarget(self.target_value));
    }
    Ok(())
  }
}

/// A user's attempt at a mission within one period.
///
/// `current_value` never decreases. Once `is_completed` is set,
/// `current_value` and `completed_at` never change again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMission {
  pub user_mission_id:  Uuid,
  pub user_id:          Uuid,
  pub definition_id:    Uuid,
  pub period_start:     DateTime<Utc>,
  pub period_end:       DateTime<Utc>,
  pub current_value:    i64,
  pub is_completed:     bool,
  pub completed_at:     Option<DateTime<Utc>>,
  pub last_progress_at: Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
}

impl UserMission {
  pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
    !self.is_completed && self.period_start <= now && now <= self.period_end
  }
}

/// An instance bundled with its definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedMission {
  pub mission:    UserMission,
  pub definition: MissionDefinition,
}

/// Result of a successful progress increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionAdvance {
  pub mission:       UserMission,
  pub definition:    MissionDefinition,
  /// `true` only for the increment that crossed the target.
  pub completed_now: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
  }

  #[test]
  fn daily_window_ends_next_midnight() {
    let now = at(2026, 3, 14, 18);
    let (start, end) = MissionPeriod::Daily.window(now, Duration::days(3650));
    assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
  }

  #[test]
  fn weekly_and_monthly_windows() {
    let now = at(2026, 1, 31, 9);
    let (_, weekly) = MissionPeriod::Weekly.window(now, Duration::days(1));
    assert_eq!(weekly, Utc.with_ymd_and_hms(2026, 2, 7, 0, 0, 0).unwrap());

    let (_, monthly) = MissionPeriod::Monthly.window(now, Duration::days(1));
    assert_eq!(monthly, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());
  }

  #[test]
  fn one_time_window_uses_span() {
    let now = at(2026, 5, 1, 12);
    let (start, end) = MissionPeriod::OneTime.window(now, Duration::days(10));
    assert_eq!(start, now);
    assert_eq!(end, now + Duration::days(10));
  }

  #[test]
  fn non_positive_target_is_rejected() {
    let def = NewMissionDefinition::new("Play", MissionPeriod::Daily, 0);
    assert_eq!(def.validate(), Err(Error::NonPositiveTarget(0)));
    assert!(NewMissionDefinition::new("Play", MissionPeriod::Daily, 1).validate().is_ok());
  }
}
