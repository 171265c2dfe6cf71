//! Notification emitter.
//!
//! Emission is best-effort: a failed insert is logged and reported as
//! `false`, never as an error, so it cannot abort the operation that
//! triggered it or any sibling notification.

use clubhouse_core::{
  badge::{Badge, BadgeGrant},
  mission::{MissionDefinition, UserMission},
  notification::{NewNotification, Notification, NotificationType},
  session::Session,
  store::LoyaltyStore,
  wallet::{Direction, TransactionType, WalletTransaction},
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{Engine, Error, Result};

impl<S: LoyaltyStore> Engine<S> {
  async fn emit(
    &self,
    user_id: Uuid,
    kind: NotificationType,
    title: &str,
    message: String,
    data: serde_json::Value,
  ) -> bool {
    let input = NewNotification {
      user_id,
      title: title.to_owned(),
      message,
      kind,
      data: Some(data),
    };
    match self.store.create_notification(input).await {
      Ok(_) => true,
      Err(e) => {
        warn!(%user_id, kind = kind.as_ref(), error = %e, "failed to emit notification");
        false
      }
    }
  }

  // ── Achievements ──────────────────────────────────────────────────────────

  pub async fn notify_mission_completed(
    &self,
    mission: &UserMission,
    definition: &MissionDefinition,
  ) -> bool {
    self
      .emit(
        mission.user_id,
        NotificationType::MissionCompleted,
        "Mission completed",
        format!("You completed the mission '{}'.", definition.name),
        json!({
          "userMissionId": mission.user_mission_id,
          "missionDefinitionId": definition.definition_id,
          "rewardAmount": definition.reward_amount,
        }),
      )
      .await
  }

  pub async fn notify_badge_granted(&self, grant: &BadgeGrant, badge: &Badge) -> bool {
    self
      .emit(
        grant.user_id,
        NotificationType::BadgeGranted,
        "Badge earned",
        format!("You earned the badge '{}'.", badge.name),
        json!({
          "grantId": grant.grant_id,
          "badgeId": badge.badge_id,
          "rewardAmount": badge.reward_amount,
        }),
      )
      .await
  }

  // ── Wallet ────────────────────────────────────────────────────────────────

  /// Announce a balance change. Reward credits are announced by the mission
  /// or badge that earned them, so they are skipped here.
  pub async fn notify_wallet_transaction(
    &self,
    user_id: Uuid,
    transaction: &WalletTransaction,
  ) -> bool {
    if transaction.kind == TransactionType::Reward {
      return false;
    }
    let (kind, title, verb) = match transaction.direction {
      Direction::Credit => (NotificationType::WalletCredited, "Wallet credited", "credited to"),
      Direction::Debit => (NotificationType::WalletDebited, "Wallet debited", "debited from"),
    };
    self
      .emit(
        user_id,
        kind,
        title,
        format!(
          "{} was {verb} your wallet. New balance: {}.",
          transaction.amount, transaction.balance_after
        ),
        json!({
          "transactionId": transaction.transaction_id,
          "amount": transaction.amount,
          "balanceAfter": transaction.balance_after,
          "type": transaction.kind.as_ref(),
        }),
      )
      .await
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  /// Tell the manager and every registered player that `session` changed.
  /// Returns how many notifications were stored.
  pub async fn notify_session_updated(&self, session: &Session) -> usize {
    self
      .notify_session_audience(
        session,
        NotificationType::SessionUpdated,
        "Session schedule changed",
        format!("Session {} was updated.", session.session_id),
      )
      .await
  }

  pub async fn notify_session_canceled(&self, session: &Session) -> usize {
    self
      .notify_session_audience(
        session,
        NotificationType::SessionCanceled,
        "Session canceled",
        format!("Session {} was canceled.", session.session_id),
      )
      .await
  }

  async fn notify_session_audience(
    &self,
    session: &Session,
    kind: NotificationType,
    title: &str,
    message: String,
  ) -> usize {
    let players: Vec<Uuid> = match self.store.list_participants(session.session_id).await {
      Ok(participants) => participants.into_iter().map(|p| p.player_id).collect(),
      Err(e) => {
        warn!(session_id = %session.session_id, error = %e, "failed to load session audience");
        Vec::new()
      }
    };
    let payload = json!({
      "sessionId": session.session_id,
      "branchId": session.branch_id,
      "roomId": session.room_id,
      "startsAt": session.starts_at,
      "endsAt": session.ends_at,
    });

    let mut sent = 0;
    for user_id in session.manager_id.into_iter().chain(players) {
      if self
        .emit(user_id, kind, title, message.clone(), payload.clone())
        .await
      {
        sent += 1;
      }
    }
    sent
  }

  // ── Incidents ─────────────────────────────────────────────────────────────

  pub async fn notify_incident_created(&self, user_id: Uuid, incident_id: Uuid, title: &str) -> bool {
    self
      .emit(
        user_id,
        NotificationType::IncidentCreated,
        "Incident reported",
        format!("Incident '{title}' was reported."),
        json!({ "incidentId": incident_id }),
      )
      .await
  }

  pub async fn notify_incident_resolved(&self, user_id: Uuid, incident_id: Uuid, title: &str) -> bool {
    self
      .emit(
        user_id,
        NotificationType::IncidentResolved,
        "Incident resolved",
        format!("Incident '{title}' was resolved."),
        json!({ "incidentId": incident_id }),
      )
      .await
  }

  // ── Inbox ─────────────────────────────────────────────────────────────────

  pub async fn list_notifications(&self, user_id: Uuid, only_unread: bool) -> Result<Vec<Notification>> {
    self
      .store
      .list_notifications(user_id, only_unread)
      .await
      .map_err(Error::store)
  }

  pub async fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
    self
      .store
      .mark_notification_read(notification_id, user_id)
      .await
      .map_err(Error::store)
  }

  pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
    self
      .store
      .mark_all_notifications_read(user_id)
      .await
      .map_err(Error::store)
  }
}
