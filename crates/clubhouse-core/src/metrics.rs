//! Activity metrics consumed by the condition evaluator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionTier;

/// Counts of ended sessions for one user, scoped by role and anchored on the
/// triggering session. Every count includes the triggering session itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
  pub total_sessions:    u32,
  pub vip_sessions:      u32,
  pub cip_sessions:      u32,
  /// Sessions of the same game as the triggering session.
  pub game_sessions:     u32,
  /// Sessions of the same scenario; zero when the trigger has no scenario.
  pub scenario_sessions: u32,
  pub branch_sessions:   u32,
  pub room_sessions:     u32,
}

/// Narrowing applied on top of "ended sessions of this user in this role".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
  All,
  Tier(SessionTier),
  Game(Uuid),
  Scenario(Uuid),
  Branch(Uuid),
  Room(Uuid),
}
