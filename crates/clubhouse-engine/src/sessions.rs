//! The session-completed pipeline and the session-status hand-over.
//!
//! Processing a session runs sequentially: the manager first, then every
//! registered player in registration order, missions before badges for each
//! user. Every step commits on its own; a failing user or candidate is
//! logged and skipped, and the reconciliation pass repairs missing rewards.

use chrono::Utc;
use clubhouse_core::{
  session::{Role, Session, SessionStatus},
  store::LoyaltyStore,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Engine, Error, Result, rewards::Settlement};

/// Summary of one `process_session_completed` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
  pub session_id:            Uuid,
  /// `false` when the session was not ended and nothing ran.
  pub processed:             bool,
  pub users_processed:       usize,
  pub users_failed:          usize,
  pub missions_advanced:     usize,
  pub missions_completed:    usize,
  pub badges_granted:        usize,
  pub rewards_credited:      usize,
  pub reward_failures:       usize,
  pub notification_failures: usize,
}

impl SessionReport {
  pub(crate) fn record(&mut self, settlement: Settlement) {
    if settlement.rewarded {
      self.rewards_credited += 1;
    }
    if settlement.reward_failed {
      self.reward_failures += 1;
    }
    if !settlement.notified {
      self.notification_failures += 1;
    }
  }
}

/// Result of a status change. `report` is present when the change ended the
/// session and the pipeline ran.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
  pub session: Session,
  pub report:  Option<SessionReport>,
}

impl<S: LoyaltyStore> Engine<S> {
  /// Run missions, badges, rewards and notifications for everyone in an
  /// ended session.
  ///
  /// Fails only when the session cannot be loaded. A session that is not
  /// ended yields an unprocessed report.
  pub async fn process_session_completed(&self, session_id: Uuid) -> Result<SessionReport> {
    let session = self
      .store
      .get_session(session_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::SessionNotFound(session_id))?;

    let mut report = SessionReport {
      session_id,
      ..Default::default()
    };
    if !session.is_ended() {
      info!(%session_id, status = session.status.as_ref(), "session not ended, skipping");
      return Ok(report);
    }
    report.processed = true;

    let mut users: Vec<(Uuid, Role)> = Vec::new();
    if let Some(manager_id) = session.manager_id {
      users.push((manager_id, Role::Manager));
    }
    match self.store.list_participants(session_id).await {
      Ok(participants) => {
        users.extend(participants.into_iter().map(|p| (p.player_id, Role::Player)));
      }
      Err(e) => {
        warn!(%session_id, error = %e, "failed to load participants");
      }
    }

    for (user_id, role) in users {
      match self.process_user(user_id, role, &session, &mut report).await {
        Ok(()) => report.users_processed += 1,
        Err(e) => {
          report.users_failed += 1;
          warn!(%session_id, %user_id, role = role.as_ref(), error = %e, "failed to process user");
        }
      }
    }

    info!(
      %session_id,
      users = report.users_processed,
      failed = report.users_failed,
      missions_completed = report.missions_completed,
      badges_granted = report.badges_granted,
      rewards_credited = report.rewards_credited,
      "session processed"
    );
    Ok(report)
  }

  async fn process_user(
    &self,
    user_id: Uuid,
    role: Role,
    session: &Session,
    report: &mut SessionReport,
  ) -> Result<()> {
    let metrics = self.session_metrics(user_id, role, session).await?;
    let now = Utc::now();

    let missions = self
      .advance_missions_for_event(user_id, role, &metrics, session, now, report)
      .await;
    let badges = self
      .grant_badges_for_event(user_id, role, &metrics, session, report)
      .await;
    missions.and(badges)
  }

  // ── Status hand-over ──────────────────────────────────────────────────────

  /// Set a session's status. Moving it into `Ended` runs the pipeline;
  /// writing `Ended` over an ended session does not run it again.
  pub async fn change_session_status(
    &self,
    session_id: Uuid,
    status: SessionStatus,
  ) -> Result<StatusChange> {
    let transition = self
      .store
      .set_session_status(session_id, status)
      .await
      .map_err(Error::store)?;
    let report = if transition.ended_now() {
      Some(self.process_session_completed(session_id).await?)
    } else {
      None
    };
    Ok(StatusChange {
      session: transition.session,
      report,
    })
  }

  /// Cancel a session and tell everyone involved. Canceling twice is a
  /// no-op.
  pub async fn cancel_session(&self, session_id: Uuid) -> Result<Session> {
    let session = self
      .store
      .get_session(session_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::SessionNotFound(session_id))?;
    if session.status == SessionStatus::Canceled {
      return Ok(session);
    }

    let session = self
      .store
      .set_session_status(session_id, SessionStatus::Canceled)
      .await
      .map_err(Error::store)?
      .session;
    let sent = self.notify_session_canceled(&session).await;
    info!(%session_id, notified = sent, "session canceled");
    Ok(session)
  }

  /// Replace a stored session and tell everyone involved. The status must
  /// match the stored one; status changes go through
  /// [`Engine::change_session_status`].
  pub async fn update_session(&self, session: Session) -> Result<Session> {
    let session_id = session.session_id;
    let stored = self
      .store
      .get_session(session_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::SessionNotFound(session_id))?;
    if stored.status != session.status {
      return Err(clubhouse_core::Error::SessionStatusChange(session_id).into());
    }

    self
      .store
      .put_session(session.clone())
      .await
      .map_err(Error::store)?;
    let sent = self.notify_session_updated(&session).await;
    info!(%session_id, notified = sent, "session updated");
    Ok(session)
  }
}
