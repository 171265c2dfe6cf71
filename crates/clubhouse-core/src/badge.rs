//! Badges and the grants that award them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A one-time achievement definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
  pub badge_id:      Uuid,
  pub name:          String,
  /// Unique when present, e.g. `"FIRST_WIN"`.
  pub code:          Option<String>,
  pub description:   Option<String>,
  pub icon_url:      Option<String>,
  pub reward_amount: Option<Decimal>,
  /// Raw condition document; see [`crate::condition::Condition`].
  pub condition:     Option<String>,
  pub is_active:     bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    Option<DateTime<Utc>>,
}

/// Input to `create_badge` and `update_badge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBadge {
  pub name:          String,
  pub code:          Option<String>,
  pub description:   Option<String>,
  pub icon_url:      Option<String>,
  pub reward_amount: Option<Decimal>,
  pub condition:     Option<String>,
  pub is_active:     bool,
}

impl NewBadge {
  /// An active badge with no reward and no condition.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:          name.into(),
      code:          None,
      description:   None,
      icon_url:      None,
      reward_amount: None,
      condition:     None,
      is_active:     true,
    }
  }
}

/// Record of a badge awarded to a user.
///
/// At most one non-revoked grant exists per `(user_id, badge_id)`. A revoked
/// grant stays in place as history and does not block a later grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeGrant {
  pub grant_id:   Uuid,
  pub user_id:    Uuid,
  pub badge_id:   Uuid,
  pub earned_at:  DateTime<Utc>,
  /// The admin or manager who granted it by hand; `None` for automatic grants.
  pub granted_by: Option<Uuid>,
  pub reason:     Option<String>,
  pub is_revoked: bool,
  pub revoked_at: Option<DateTime<Utc>>,
}

/// Input to `insert_badge_grant`.
#[derive(Debug, Clone)]
pub struct NewBadgeGrant {
  pub user_id:    Uuid,
  pub badge_id:   Uuid,
  pub granted_by: Option<Uuid>,
  pub reason:     Option<String>,
}

/// A grant bundled with its badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeldBadge {
  pub grant: BadgeGrant,
  pub badge: Badge,
}
