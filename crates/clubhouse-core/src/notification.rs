//! User-facing notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
  #[default]
  General,
  MissionCompleted,
  BadgeGranted,
  WalletCredited,
  WalletDebited,
  IncidentCreated,
  IncidentResolved,
  SessionUpdated,
  SessionCanceled,
}

/// A persisted notification. Only the read state ever changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub title:           String,
  pub message:         String,
  pub kind:            NotificationType,
  pub data:            Option<serde_json::Value>,
  pub is_read:         bool,
  pub read_at:         Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

/// Input to `create_notification`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
  pub user_id: Uuid,
  pub title:   String,
  pub message: String,
  pub kind:    NotificationType,
  pub data:    Option<serde_json::Value>,
}
