//! Badge grantor and badge administration.

use std::collections::HashSet;

use clubhouse_core::{
  badge::{Badge, BadgeGrant, HeldBadge, NewBadge, NewBadgeGrant},
  condition::{self, SESSION_COMPLETED},
  metrics::SessionMetrics,
  session::{Role, Session},
  store::LoyaltyStore,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Engine, Error, Result, SessionReport,
  rewards::{RewardRequest, Settlement},
};

impl<S: LoyaltyStore> Engine<S> {
  // ── Definitions ───────────────────────────────────────────────────────────

  pub async fn create_badge(&self, input: NewBadge) -> Result<Badge> {
    self.store.create_badge(input).await.map_err(Error::store)
  }

  pub async fn update_badge(&self, badge_id: Uuid, input: NewBadge) -> Result<Badge> {
    self
      .store
      .update_badge(badge_id, input)
      .await
      .map_err(Error::store)
  }

  pub async fn get_badge(&self, badge_id: Uuid) -> Result<Badge> {
    self
      .store
      .get_badge(badge_id)
      .await
      .map_err(Error::store)?
      .ok_or(clubhouse_core::Error::BadgeNotFound(badge_id).into())
  }

  pub async fn list_badges(&self, is_active: Option<bool>) -> Result<Vec<Badge>> {
    self.store.list_badges(is_active).await.map_err(Error::store)
  }

  // ── Grants ────────────────────────────────────────────────────────────────

  /// Grant a badge by hand. The reward and notification follow exactly as
  /// for an automatic grant.
  pub async fn grant_badge(
    &self,
    badge_id: Uuid,
    user_id: Uuid,
    reason: Option<String>,
    granted_by: Option<Uuid>,
  ) -> Result<BadgeGrant> {
    let badge = self.get_badge(badge_id).await?;
    if !badge.is_active {
      return Err(clubhouse_core::Error::BadgeInactive(badge_id).into());
    }
    if !self.store.user_exists(user_id).await.map_err(Error::store)? {
      return Err(clubhouse_core::Error::UserNotFound(user_id).into());
    }
    if self.holds_badge(user_id, badge_id).await? {
      return Err(clubhouse_core::Error::BadgeAlreadyGranted { user_id, badge_id }.into());
    }

    let grant = self
      .store
      .insert_badge_grant(NewBadgeGrant {
        user_id,
        badge_id,
        granted_by,
        reason,
      })
      .await
      .map_err(Error::store)?;
    info!(%user_id, %badge_id, grant_id = %grant.grant_id, "badge granted");
    self.settle_badge(&grant, &badge).await;
    Ok(grant)
  }

  /// Revoke a grant. Revoking an already revoked grant changes nothing.
  pub async fn revoke_badge(&self, grant_id: Uuid, reason: Option<String>) -> Result<BadgeGrant> {
    let grant = self
      .store
      .revoke_badge_grant(grant_id, reason)
      .await
      .map_err(Error::store)?;
    info!(%grant_id, user_id = %grant.user_id, "badge revoked");
    Ok(grant)
  }

  /// A user's grants, newest first.
  pub async fn list_user_badges(
    &self,
    user_id: Uuid,
    include_revoked: bool,
  ) -> Result<Vec<HeldBadge>> {
    self
      .store
      .list_user_badges(user_id, include_revoked)
      .await
      .map_err(Error::store)
  }

  async fn holds_badge(&self, user_id: Uuid, badge_id: Uuid) -> Result<bool> {
    let held = self.list_user_badges(user_id, false).await?;
    Ok(held.iter().any(|h| h.badge.badge_id == badge_id))
  }

  // ── Event-driven grants ───────────────────────────────────────────────────

  /// Grant every active badge whose condition matches the completed session
  /// and that the user does not already hold.
  ///
  /// The pre-filter on held badges only saves work; the store's uniqueness
  /// constraint decides, so losing a race to a concurrent grant is skipped.
  pub(crate) async fn grant_badges_for_event(
    &self,
    user_id: Uuid,
    role: Role,
    metrics: &SessionMetrics,
    session: &Session,
    report: &mut SessionReport,
  ) -> Result<()> {
    let badges = self.list_badges(Some(true)).await?;
    let held: HashSet<Uuid> = self
      .list_user_badges(user_id, false)
      .await?
      .into_iter()
      .map(|h| h.badge.badge_id)
      .collect();

    for badge in badges {
      let badge_id = badge.badge_id;
      if held.contains(&badge_id) {
        continue;
      }
      if !condition::evaluate(badge.condition.as_deref(), role, metrics, session) {
        debug!(%user_id, %badge_id, role = role.as_ref(), "badge condition not met");
        continue;
      }

      let input = NewBadgeGrant {
        user_id,
        badge_id,
        granted_by: None,
        reason: Some(format!("Auto granted by {SESSION_COMPLETED} event.")),
      };
      match self.store.insert_badge_grant(input).await.map_err(Error::store) {
        Ok(grant) => {
          report.badges_granted += 1;
          debug!(%user_id, %badge_id, grant_id = %grant.grant_id, "badge granted");
          let settlement = self.settle_badge(&grant, &badge).await;
          report.record(settlement);
        }
        Err(Error::Domain(clubhouse_core::Error::BadgeAlreadyGranted { .. })) => {
          debug!(%user_id, %badge_id, "badge granted concurrently");
        }
        Err(e) => {
          warn!(%user_id, %badge_id, error = %e, "failed to grant badge");
        }
      }
    }
    Ok(())
  }

  async fn settle_badge(&self, grant: &BadgeGrant, badge: &Badge) -> Settlement {
    let mut settlement = Settlement::default();
    self
      .settle_reward(RewardRequest::for_badge(badge, grant), &mut settlement)
      .await;
    settlement.notified = self.notify_badge_granted(grant, badge).await;
    settlement
  }
}
