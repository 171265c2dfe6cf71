//! Reward reconciliation.
//!
//! Rewards are credited in their own store transaction after the completion
//! or grant that earned them has committed. When that credit fails (a locked
//! wallet, a crash in between), this pass finds the gap through the reward
//! reference and credits it.

use clubhouse_core::{badge::HeldBadge, mission::AssignedMission, store::LoyaltyStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Engine, Error, Result, rewards::RewardRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
  pub missions_credited: usize,
  pub badges_credited:   usize,
  pub failures:          usize,
}

enum Outcome {
  Credited,
  Skipped,
  Failed,
}

impl<S: LoyaltyStore> Engine<S> {
  /// Credit every completed mission and live grant whose reward is missing
  /// from the ledger.
  pub async fn reconcile_rewards(&self) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let missions = self.store.unrewarded_missions().await.map_err(Error::store)?;
    for AssignedMission { mission, definition } in missions {
      match self
        .reconcile_one(RewardRequest::for_mission(&definition, &mission))
        .await
      {
        Outcome::Credited => report.missions_credited += 1,
        Outcome::Skipped => {}
        Outcome::Failed => report.failures += 1,
      }
    }

    let grants = self.store.unrewarded_grants().await.map_err(Error::store)?;
    for HeldBadge { grant, badge } in grants {
      match self.reconcile_one(RewardRequest::for_badge(&badge, &grant)).await {
        Outcome::Credited => report.badges_credited += 1,
        Outcome::Skipped => {}
        Outcome::Failed => report.failures += 1,
      }
    }

    info!(
      missions = report.missions_credited,
      badges = report.badges_credited,
      failures = report.failures,
      "rewards reconciled"
    );
    Ok(report)
  }

  async fn reconcile_one(&self, request: Option<RewardRequest>) -> Outcome {
    let Some(request) = request else {
      return Outcome::Skipped;
    };
    let user_id = request.user_id;
    let source = request.source;
    match self.dispatch_reward(request).await {
      Ok(Some(_)) => Outcome::Credited,
      Ok(None) => Outcome::Skipped,
      Err(Error::Domain(clubhouse_core::Error::RewardAlreadyCredited(reward_ref))) => {
        debug!(%user_id, %reward_ref, "reward credited concurrently");
        Outcome::Skipped
      }
      Err(e) => {
        warn!(%user_id, ?source, error = %e, "failed to reconcile reward");
        Outcome::Failed
      }
    }
  }
}
