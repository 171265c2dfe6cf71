//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! UUIDs are hyphenated lowercase strings, timestamps fixed-width RFC 3339,
//! money decimal text, enums their snake_case names and notification payloads
//! compact JSON. Each `Raw*` row type knows its column list and width, so
//! joined queries can read several of them out of one row.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use clubhouse_core::{
  badge::{Badge, BadgeGrant, HeldBadge},
  mission::{AssignedMission, MissionDefinition, UserMission},
  notification::Notification,
  session::{Session, SessionParticipant},
  wallet::{Wallet, WalletTransaction},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Decimal ──────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

fn decode_opt_decimal(s: Option<String>) -> Result<Option<Decimal>> {
  s.as_deref().map(decode_decimal).transpose()
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_enum<T: AsRef<str>>(value: T) -> String { value.as_ref().to_owned() }

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownValue { column, value: s.to_owned() })
}

// ─── Row types ────────────────────────────────────────────────────────────────

pub const SESSION_COLUMNS: &str = "s.session_id, s.branch_id, s.room_id, s.game_id, \
                                   s.scenario_id, s.manager_id, s.tier, s.status, \
                                   s.starts_at, s.ends_at";

pub struct RawSession {
  pub session_id:  String,
  pub branch_id:   String,
  pub room_id:     String,
  pub game_id:     String,
  pub scenario_id: Option<String>,
  pub manager_id:  Option<String>,
  pub tier:        String,
  pub status:      String,
  pub starts_at:   String,
  pub ends_at:     String,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:  row.get(0)?,
      branch_id:   row.get(1)?,
      room_id:     row.get(2)?,
      game_id:     row.get(3)?,
      scenario_id: row.get(4)?,
      manager_id:  row.get(5)?,
      tier:        row.get(6)?,
      status:      row.get(7)?,
      starts_at:   row.get(8)?,
      ends_at:     row.get(9)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:  decode_uuid(&self.session_id)?,
      branch_id:   decode_uuid(&self.branch_id)?,
      room_id:     decode_uuid(&self.room_id)?,
      game_id:     decode_uuid(&self.game_id)?,
      scenario_id: decode_opt_uuid(self.scenario_id)?,
      manager_id:  decode_opt_uuid(self.manager_id)?,
      tier:        decode_enum("sessions.tier", &self.tier)?,
      status:      decode_enum("sessions.status", &self.status)?,
      starts_at:   decode_dt(&self.starts_at)?,
      ends_at:     decode_dt(&self.ends_at)?,
    })
  }
}

pub const PARTICIPANT_COLUMNS: &str = "p.session_id, p.player_id, p.status, p.reserved_at";

pub struct RawParticipant {
  pub session_id:  String,
  pub player_id:   String,
  pub status:      String,
  pub reserved_at: String,
}

impl RawParticipant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:  row.get(0)?,
      player_id:   row.get(1)?,
      status:      row.get(2)?,
      reserved_at: row.get(3)?,
    })
  }

  pub fn into_participant(self) -> Result<SessionParticipant> {
    Ok(SessionParticipant {
      session_id:  decode_uuid(&self.session_id)?,
      player_id:   decode_uuid(&self.player_id)?,
      status:      decode_enum("session_participants.status", &self.status)?,
      reserved_at: decode_dt(&self.reserved_at)?,
    })
  }
}

pub const DEFINITION_COLUMNS: &str = "d.definition_id, d.name, d.code, d.description, \
                                      d.period, d.target_value, d.reward_amount, \
                                      d.reward_description, d.condition, d.is_active, \
                                      d.created_at, d.updated_at";

pub struct RawMissionDefinition {
  pub definition_id:      String,
  pub name:               String,
  pub code:               Option<String>,
  pub description:        Option<String>,
  pub period:             String,
  pub target_value:       i64,
  pub reward_amount:      Option<String>,
  pub reward_description: Option<String>,
  pub condition:          Option<String>,
  pub is_active:          bool,
  pub created_at:         String,
  pub updated_at:         Option<String>,
}

impl RawMissionDefinition {
  pub fn from_row_at(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      definition_id:      row.get(base)?,
      name:               row.get(base + 1)?,
      code:               row.get(base + 2)?,
      description:        row.get(base + 3)?,
      period:             row.get(base + 4)?,
      target_value:       row.get(base + 5)?,
      reward_amount:      row.get(base + 6)?,
      reward_description: row.get(base + 7)?,
      condition:          row.get(base + 8)?,
      is_active:          row.get(base + 9)?,
      created_at:         row.get(base + 10)?,
      updated_at:         row.get(base + 11)?,
    })
  }

  pub fn into_definition(self) -> Result<MissionDefinition> {
    Ok(MissionDefinition {
      definition_id:      decode_uuid(&self.definition_id)?,
      name:               self.name,
      code:               self.code,
      description:        self.description,
      period:             decode_enum("mission_definitions.period", &self.period)?,
      target_value:       self.target_value,
      reward_amount:      decode_opt_decimal(self.reward_amount)?,
      reward_description: self.reward_description,
      condition:          self.condition,
      is_active:          self.is_active,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_opt_dt(self.updated_at)?,
    })
  }
}

pub const USER_MISSION_COLUMNS: &str = "m.user_mission_id, m.user_id, m.definition_id, \
                                        m.period_start, m.period_end, m.current_value, \
                                        m.is_completed, m.completed_at, \
                                        m.last_progress_at, m.created_at";

pub struct RawUserMission {
  pub user_mission_id:  String,
  pub user_id:          String,
  pub definition_id:    String,
  pub period_start:     String,
  pub period_end:       String,
  pub current_value:    i64,
  pub is_completed:     bool,
  pub completed_at:     Option<String>,
  pub last_progress_at: Option<String>,
  pub created_at:       String,
}

impl RawUserMission {
  pub const WIDTH: usize = 10;

  pub fn from_row_at(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_mission_id:  row.get(base)?,
      user_id:          row.get(base + 1)?,
      definition_id:    row.get(base + 2)?,
      period_start:     row.get(base + 3)?,
      period_end:       row.get(base + 4)?,
      current_value:    row.get(base + 5)?,
      is_completed:     row.get(base + 6)?,
      completed_at:     row.get(base + 7)?,
      last_progress_at: row.get(base + 8)?,
      created_at:       row.get(base + 9)?,
    })
  }

  pub fn into_user_mission(self) -> Result<UserMission> {
    Ok(UserMission {
      user_mission_id:  decode_uuid(&self.user_mission_id)?,
      user_id:          decode_uuid(&self.user_id)?,
      definition_id:    decode_uuid(&self.definition_id)?,
      period_start:     decode_dt(&self.period_start)?,
      period_end:       decode_dt(&self.period_end)?,
      current_value:    self.current_value,
      is_completed:     self.is_completed,
      completed_at:     decode_opt_dt(self.completed_at)?,
      last_progress_at: decode_opt_dt(self.last_progress_at)?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// An instance row joined with its definition:
/// `SELECT {USER_MISSION_COLUMNS}, {DEFINITION_COLUMNS}`.
pub struct RawAssignedMission {
  pub mission:    RawUserMission,
  pub definition: RawMissionDefinition,
}

impl RawAssignedMission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mission:    RawUserMission::from_row_at(row, 0)?,
      definition: RawMissionDefinition::from_row_at(row, RawUserMission::WIDTH)?,
    })
  }

  pub fn into_assigned(self) -> Result<AssignedMission> {
    Ok(AssignedMission {
      mission:    self.mission.into_user_mission()?,
      definition: self.definition.into_definition()?,
    })
  }
}

pub const BADGE_COLUMNS: &str = "b.badge_id, b.name, b.code, b.description, b.icon_url, \
                                 b.reward_amount, b.condition, b.is_active, \
                                 b.created_at, b.updated_at";

pub struct RawBadge {
  pub badge_id:      String,
  pub name:          String,
  pub code:          Option<String>,
  pub description:   Option<String>,
  pub icon_url:      Option<String>,
  pub reward_amount: Option<String>,
  pub condition:     Option<String>,
  pub is_active:     bool,
  pub created_at:    String,
  pub updated_at:    Option<String>,
}

impl RawBadge {
  pub fn from_row_at(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      badge_id:      row.get(base)?,
      name:          row.get(base + 1)?,
      code:          row.get(base + 2)?,
      description:   row.get(base + 3)?,
      icon_url:      row.get(base + 4)?,
      reward_amount: row.get(base + 5)?,
      condition:     row.get(base + 6)?,
      is_active:     row.get(base + 7)?,
      created_at:    row.get(base + 8)?,
      updated_at:    row.get(base + 9)?,
    })
  }

  pub fn into_badge(self) -> Result<Badge> {
    Ok(Badge {
      badge_id:      decode_uuid(&self.badge_id)?,
      name:          self.name,
      code:          self.code,
      description:   self.description,
      icon_url:      self.icon_url,
      reward_amount: decode_opt_decimal(self.reward_amount)?,
      condition:     self.condition,
      is_active:     self.is_active,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_opt_dt(self.updated_at)?,
    })
  }
}

pub const GRANT_COLUMNS: &str = "g.grant_id, g.user_id, g.badge_id, g.earned_at, \
                                 g.granted_by, g.reason, g.is_revoked, g.revoked_at";

pub struct RawBadgeGrant {
  pub grant_id:   String,
  pub user_id:    String,
  pub badge_id:   String,
  pub earned_at:  String,
  pub granted_by: Option<String>,
  pub reason:     Option<String>,
  pub is_revoked: bool,
  pub revoked_at: Option<String>,
}

impl RawBadgeGrant {
  pub const WIDTH: usize = 8;

  pub fn from_row_at(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      grant_id:   row.get(base)?,
      user_id:    row.get(base + 1)?,
      badge_id:   row.get(base + 2)?,
      earned_at:  row.get(base + 3)?,
      granted_by: row.get(base + 4)?,
      reason:     row.get(base + 5)?,
      is_revoked: row.get(base + 6)?,
      revoked_at: row.get(base + 7)?,
    })
  }

  pub fn into_grant(self) -> Result<BadgeGrant> {
    Ok(BadgeGrant {
      grant_id:   decode_uuid(&self.grant_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      badge_id:   decode_uuid(&self.badge_id)?,
      earned_at:  decode_dt(&self.earned_at)?,
      granted_by: decode_opt_uuid(self.granted_by)?,
      reason:     self.reason,
      is_revoked: self.is_revoked,
      revoked_at: decode_opt_dt(self.revoked_at)?,
    })
  }
}

/// `SELECT {GRANT_COLUMNS}, {BADGE_COLUMNS}`.
pub struct RawHeldBadge {
  pub grant: RawBadgeGrant,
  pub badge: RawBadge,
}

impl RawHeldBadge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      grant: RawBadgeGrant::from_row_at(row, 0)?,
      badge: RawBadge::from_row_at(row, RawBadgeGrant::WIDTH)?,
    })
  }

  pub fn into_held(self) -> Result<HeldBadge> {
    Ok(HeldBadge {
      grant: self.grant.into_grant()?,
      badge: self.badge.into_badge()?,
    })
  }
}

pub const WALLET_COLUMNS: &str = "w.wallet_id, w.user_id, w.balance, w.is_locked, \
                                  w.version, w.created_at, w.updated_at";

pub struct RawWallet {
  pub wallet_id:  String,
  pub user_id:    String,
  pub balance:    String,
  pub is_locked:  bool,
  pub version:    i64,
  pub created_at: String,
  pub updated_at: Option<String>,
}

impl RawWallet {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      wallet_id:  row.get(0)?,
      user_id:    row.get(1)?,
      balance:    row.get(2)?,
      is_locked:  row.get(3)?,
      version:    row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  pub fn into_wallet(self) -> Result<Wallet> {
    Ok(Wallet {
      wallet_id:  decode_uuid(&self.wallet_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      balance:    decode_decimal(&self.balance)?,
      is_locked:  self.is_locked,
      version:    self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_opt_dt(self.updated_at)?,
    })
  }
}

pub const TRANSACTION_COLUMNS: &str = "t.transaction_id, t.wallet_id, t.amount, \
                                       t.balance_after, t.kind, t.direction, \
                                       t.description, t.related_session_id, \
                                       t.related_user_id, t.reward_ref, t.created_at";

pub struct RawTransaction {
  pub transaction_id:     String,
  pub wallet_id:          String,
  pub amount:             String,
  pub balance_after:      String,
  pub kind:               String,
  pub direction:          String,
  pub description:        Option<String>,
  pub related_session_id: Option<String>,
  pub related_user_id:    Option<String>,
  pub reward_ref:         Option<String>,
  pub created_at:         String,
}

impl RawTransaction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transaction_id:     row.get(0)?,
      wallet_id:          row.get(1)?,
      amount:             row.get(2)?,
      balance_after:      row.get(3)?,
      kind:               row.get(4)?,
      direction:          row.get(5)?,
      description:        row.get(6)?,
      related_session_id: row.get(7)?,
      related_user_id:    row.get(8)?,
      reward_ref:         row.get(9)?,
      created_at:         row.get(10)?,
    })
  }

  pub fn into_transaction(self) -> Result<WalletTransaction> {
    Ok(WalletTransaction {
      transaction_id:     decode_uuid(&self.transaction_id)?,
      wallet_id:          decode_uuid(&self.wallet_id)?,
      amount:             decode_decimal(&self.amount)?,
      balance_after:      decode_decimal(&self.balance_after)?,
      kind:               decode_enum("wallet_transactions.kind", &self.kind)?,
      direction:          decode_enum("wallet_transactions.direction", &self.direction)?,
      description:        self.description,
      related_session_id: decode_opt_uuid(self.related_session_id)?,
      related_user_id:    decode_opt_uuid(self.related_user_id)?,
      reward_ref:         self.reward_ref,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str = "n.notification_id, n.user_id, n.title, n.message, \
                                        n.kind, n.data, n.is_read, n.read_at, n.created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub user_id:         String,
  pub title:           String,
  pub message:         String,
  pub kind:            String,
  pub data:            Option<String>,
  pub is_read:         bool,
  pub read_at:         Option<String>,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      user_id:         row.get(1)?,
      title:           row.get(2)?,
      message:         row.get(3)?,
      kind:            row.get(4)?,
      data:            row.get(5)?,
      is_read:         row.get(6)?,
      read_at:         row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    let data = self
      .data
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      user_id: decode_uuid(&self.user_id)?,
      title: self.title,
      message: self.message,
      kind: decode_enum("notifications.kind", &self.kind)?,
      data,
      is_read: self.is_read,
      read_at: decode_opt_dt(self.read_at)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use clubhouse_core::wallet::TransactionType;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let late = early + chrono::Duration::microseconds(1);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(decode_dt(&encode_dt(late)).unwrap(), late);
  }

  #[test]
  fn unknown_enum_value_is_reported() {
    let err = decode_enum::<TransactionType>("wallet_transactions.kind", "bonus").unwrap_err();
    assert!(matches!(err, Error::UnknownValue { value, .. } if value == "bonus"));
    assert_eq!(
      decode_enum::<TransactionType>("wallet_transactions.kind", "game_fee").unwrap(),
      TransactionType::GameFee
    );
  }
}
