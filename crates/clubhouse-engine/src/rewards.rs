//! Reward dispatcher: turns a completed mission or a badge grant into a
//! wallet credit.
//!
//! Every dispatched credit carries a reward reference naming what earned it.
//! The store keeps those references unique, so a reward can be credited at
//! most once no matter how often dispatch is retried.

use clubhouse_core::{
  badge::{Badge, BadgeGrant},
  mission::{MissionDefinition, UserMission},
  store::LoyaltyStore,
  wallet::{LedgerEntry, LedgerReceipt, TransactionType, badge_reward_ref, mission_reward_ref},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Engine, Result};

/// What earned a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RewardSource {
  Mission(Uuid),
  Badge(Uuid),
}

impl RewardSource {
  pub fn reward_ref(&self) -> String {
    match self {
      Self::Mission(user_mission_id) => mission_reward_ref(*user_mission_id),
      Self::Badge(grant_id) => badge_reward_ref(*grant_id),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardRequest {
  pub user_id:     Uuid,
  pub amount:      Decimal,
  pub description: Option<String>,
  pub source:      Option<RewardSource>,
}

impl RewardRequest {
  pub fn new(user_id: Uuid, amount: Decimal) -> Self {
    Self {
      user_id,
      amount,
      description: None,
      source: None,
    }
  }

  /// The reward for completing `mission`, if its definition pays one.
  pub fn for_mission(definition: &MissionDefinition, mission: &UserMission) -> Option<Self> {
    let amount = definition.reward_amount.filter(|a| *a > Decimal::ZERO)?;
    let description = definition
      .reward_description
      .clone()
      .unwrap_or_else(|| format!("Mission '{}' completed.", definition.name));
    Some(Self {
      user_id: mission.user_id,
      amount,
      description: Some(description),
      source: Some(RewardSource::Mission(mission.user_mission_id)),
    })
  }

  /// The reward for `grant`, if the badge pays one.
  pub fn for_badge(badge: &Badge, grant: &BadgeGrant) -> Option<Self> {
    let amount = badge.reward_amount.filter(|a| *a > Decimal::ZERO)?;
    Some(Self {
      user_id: grant.user_id,
      amount,
      description: Some(format!("Badge '{}' granted.", badge.name)),
      source: Some(RewardSource::Badge(grant.grant_id)),
    })
  }
}

impl<S: LoyaltyStore> Engine<S> {
  /// Credit a reward to the user's wallet as a `Reward` transaction.
  ///
  /// A non-positive amount is a no-op and returns `None`. Reward credits do
  /// not produce a wallet notification; the achievement announces itself.
  pub async fn dispatch_reward(&self, request: RewardRequest) -> Result<Option<LedgerReceipt>> {
    if request.amount <= Decimal::ZERO {
      debug!(user_id = %request.user_id, amount = %request.amount, "skipping empty reward");
      return Ok(None);
    }

    let reward_ref = request.source.map(|source| source.reward_ref());
    let mut entry = LedgerEntry::credit(request.amount, TransactionType::Reward);
    entry.description = request.description;
    entry.reward_ref = reward_ref.clone();

    let receipt = self.apply_with_retry(request.user_id, entry).await?;
    info!(
      user_id = %request.user_id,
      amount = %request.amount,
      reward_ref = reward_ref.as_deref().unwrap_or("-"),
      "reward credited"
    );
    Ok(Some(receipt))
  }
}

/// What happened when a completion or grant was settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Settlement {
  pub rewarded:      bool,
  pub reward_failed: bool,
  pub notified:      bool,
}

impl<S: LoyaltyStore> Engine<S> {
  /// Dispatch an optional reward, logging instead of failing.
  pub(crate) async fn settle_reward(
    &self,
    request: Option<RewardRequest>,
    settlement: &mut Settlement,
  ) {
    let Some(request) = request else { return };
    let user_id = request.user_id;
    let source = request.source;
    match self.dispatch_reward(request).await {
      Ok(receipt) => settlement.rewarded = receipt.is_some(),
      Err(e) => {
        warn!(%user_id, ?source, error = %e, "failed to credit reward");
        settlement.reward_failed = true;
      }
    }
  }
}
