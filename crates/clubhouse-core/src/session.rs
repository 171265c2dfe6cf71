//! Sessions and their participants.
//!
//! Sessions are owned by the venue-operations side of the system. The engine
//! only reads them, plus the small set of writes the session-status
//! collaborator needs to hand a finished session over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

/// Lifecycle of a session: Planned → Live → Paused → Ended / Canceled.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
  #[default]
  Planned,
  Live,
  Paused,
  Ended,
  Canceled,
}

/// Pricing tier of a session.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionTier {
  #[default]
  Normal,
  Vip,
  Cip,
}

/// A scheduled game occurrence in a room of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub session_id:  Uuid,
  pub branch_id:   Uuid,
  pub room_id:     Uuid,
  pub game_id:     Uuid,
  pub scenario_id: Option<Uuid>,
  pub manager_id:  Option<Uuid>,
  pub tier:        SessionTier,
  pub status:      SessionStatus,
  pub starts_at:   DateTime<Utc>,
  pub ends_at:     DateTime<Utc>,
}

impl Session {
  pub fn is_ended(&self) -> bool { self.status == SessionStatus::Ended }
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTransition {
  pub previous: SessionStatus,
  pub session:  Session,
}

impl SessionTransition {
  /// Whether this write moved the session into `Ended`.
  pub fn ended_now(&self) -> bool {
    self.previous != SessionStatus::Ended && self.session.is_ended()
  }
}

/// Attendance state of a registered player.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantStatus {
  #[default]
  Registered,
  CheckedIn,
  NoShow,
  Canceled,
}

/// A player registered in a session. Unique per `(session_id, player_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParticipant {
  pub session_id:  Uuid,
  pub player_id:   Uuid,
  pub status:      ParticipantStatus,
  pub reserved_at: DateTime<Utc>,
}

/// The role a user played in a session; condition documents are scoped to it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Role {
  Manager,
  Player,
}

/// A registered user. The directory itself lives elsewhere; this is the
/// minimum the engine needs for existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  pub display_name: String,
  pub created_at:   DateTime<Utc>,
}
