//! Mission progress tracker and mission administration.

use chrono::{DateTime, Utc};
use clubhouse_core::{
  condition,
  metrics::SessionMetrics,
  mission::{AssignedMission, MissionAdvance, MissionDefinition, NewMissionDefinition, UserMission},
  session::{Role, Session},
  store::LoyaltyStore,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Engine, Error, Result, SessionReport,
  rewards::{RewardRequest, Settlement},
};

impl<S: LoyaltyStore> Engine<S> {
  // ── Definitions ───────────────────────────────────────────────────────────

  pub async fn create_mission_definition(
    &self,
    input: NewMissionDefinition,
  ) -> Result<MissionDefinition> {
    input.validate()?;
    self
      .store
      .create_mission_definition(input)
      .await
      .map_err(Error::store)
  }

  pub async fn update_mission_definition(
    &self,
    definition_id: Uuid,
    input: NewMissionDefinition,
  ) -> Result<MissionDefinition> {
    input.validate()?;
    self
      .store
      .update_mission_definition(definition_id, input)
      .await
      .map_err(Error::store)
  }

  pub async fn get_mission_definition(&self, definition_id: Uuid) -> Result<MissionDefinition> {
    self
      .store
      .get_mission_definition(definition_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::MissionDefinitionNotFound(definition_id).into())
  }

  pub async fn list_mission_definitions(
    &self,
    is_active: Option<bool>,
  ) -> Result<Vec<MissionDefinition>> {
    self
      .store
      .list_mission_definitions(is_active)
      .await
      .map_err(Error::store)
  }

  // ── Instances ─────────────────────────────────────────────────────────────

  /// Create an instance of `definition_id` for `user_id`.
  ///
  /// A missing bound is taken from the definition's default window for the
  /// current time.
  pub async fn assign_mission(
    &self,
    definition_id: Uuid,
    user_id: Uuid,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
  ) -> Result<UserMission> {
    let definition = self.get_mission_definition(definition_id).await?;
    if !definition.is_active {
      return Err(clubhouse_core::Error::MissionDefinitionInactive(definition_id).into());
    }

    let (default_start, default_end) = definition
      .period
      .window(Utc::now(), self.config.missions.one_time_span());
    let start = period_start.unwrap_or(default_start);
    let end = period_end.unwrap_or(default_end);

    let mission = self
      .store
      .assign_mission(user_id, definition_id, start, end)
      .await
      .map_err(Error::store)?;
    debug!(
      %user_id,
      %definition_id,
      user_mission_id = %mission.user_mission_id,
      "mission assigned"
    );
    Ok(mission)
  }

  pub async fn get_user_mission(&self, user_mission_id: Uuid) -> Result<AssignedMission> {
    self
      .store
      .get_user_mission(user_mission_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::UserMissionNotFound(user_mission_id).into())
  }

  /// A user's instances ordered by period end.
  pub async fn list_user_missions(
    &self,
    user_id: Uuid,
    only_active: bool,
  ) -> Result<Vec<AssignedMission>> {
    self
      .store
      .list_user_missions(user_id, only_active, Utc::now())
      .await
      .map_err(Error::store)
  }

  /// Add an explicit positive amount to an instance. Completing it settles
  /// the reward and announces it, like event-driven progress does.
  pub async fn progress_mission(
    &self,
    user_mission_id: Uuid,
    amount: i64,
  ) -> Result<MissionAdvance> {
    let advance = self
      .store
      .advance_mission(user_mission_id, amount, Utc::now())
      .await
      .map_err(Error::store)?;
    if advance.completed_now {
      self
        .settle_mission(&advance.mission, &advance.definition)
        .await;
    }
    Ok(advance)
  }

  // ── Event-driven progress ─────────────────────────────────────────────────

  /// Advance every open instance of `user_id` whose condition matches the
  /// completed session by one step.
  ///
  /// Fails only when the open instances cannot be loaded. A failure on one
  /// instance is logged and the rest still run.
  pub(crate) async fn advance_missions_for_event(
    &self,
    user_id: Uuid,
    role: Role,
    metrics: &SessionMetrics,
    session: &Session,
    now: DateTime<Utc>,
    report: &mut SessionReport,
  ) -> Result<()> {
    let open = self
      .store
      .open_missions(user_id, now)
      .await
      .map_err(Error::store)?;

    for AssignedMission { mission, definition } in open {
      let user_mission_id = mission.user_mission_id;
      if !condition::evaluate(definition.condition.as_deref(), role, metrics, session) {
        debug!(%user_id, %user_mission_id, role = role.as_ref(), "mission condition not met");
        continue;
      }

      match self
        .store
        .advance_mission(user_mission_id, 1, now)
        .await
        .map_err(Error::store)
      {
        Ok(advance) => {
          report.missions_advanced += 1;
          if advance.completed_now {
            report.missions_completed += 1;
            let settlement = self
              .settle_mission(&advance.mission, &advance.definition)
              .await;
            report.record(settlement);
          }
        }
        // Completed or expired by a concurrent writer since it was listed.
        Err(Error::Domain(
          e @ (clubhouse_core::Error::MissionAlreadyCompleted(_)
          | clubhouse_core::Error::MissionPeriodEnded(_)),
        )) => {
          debug!(%user_id, %user_mission_id, reason = %e, "mission no longer open");
        }
        Err(e) => {
          warn!(%user_id, %user_mission_id, error = %e, "failed to advance mission");
        }
      }
    }
    Ok(())
  }

  async fn settle_mission(&self, mission: &UserMission, definition: &MissionDefinition) -> Settlement {
    let mut settlement = Settlement::default();
    self
      .settle_reward(RewardRequest::for_mission(definition, mission), &mut settlement)
      .await;
    settlement.notified = self.notify_mission_completed(mission, definition).await;
    settlement
  }
}
