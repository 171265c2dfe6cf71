//! Metrics aggregation: scoped counts of a user's ended sessions.

use clubhouse_core::{
  metrics::{SessionMetrics, SessionScope},
  session::{Role, Session, SessionTier},
  store::LoyaltyStore,
};
use uuid::Uuid;

use crate::{Engine, Error, Result};

impl<S: LoyaltyStore> Engine<S> {
  /// Counts for `user_id` acting as `role`, anchored on `session`.
  ///
  /// Managers are counted over sessions they managed, players over sessions
  /// they are registered in. Only ended sessions count, and the triggering
  /// session is included once it has ended.
  pub async fn session_metrics(
    &self,
    user_id: Uuid,
    role: Role,
    session: &Session,
  ) -> Result<SessionMetrics> {
    let count = move |scope: SessionScope| async move {
      self
        .store
        .count_ended_sessions(user_id, role, scope)
        .await
        .map_err(Error::store)
    };

    let scenario_sessions = match session.scenario_id {
      Some(scenario_id) => count(SessionScope::Scenario(scenario_id)).await?,
      None => 0,
    };

    Ok(SessionMetrics {
      total_sessions: count(SessionScope::All).await?,
      vip_sessions: count(SessionScope::Tier(SessionTier::Vip)).await?,
      cip_sessions: count(SessionScope::Tier(SessionTier::Cip)).await?,
      game_sessions: count(SessionScope::Game(session.game_id)).await?,
      scenario_sessions,
      branch_sessions: count(SessionScope::Branch(session.branch_id)).await?,
      room_sessions: count(SessionScope::Room(session.room_id)).await?,
    })
  }
}
