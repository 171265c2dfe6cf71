//! Wallets and their append-only ledger.
//!
//! A wallet's balance is a cached projection of its ledger: it always equals
//! the `balance_after` of the newest transaction and the signed sum of every
//! transaction ever appended.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// A user's monetary balance. Unique per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
  pub wallet_id:  Uuid,
  pub user_id:    Uuid,
  pub balance:    Decimal,
  pub is_locked:  bool,
  /// Bumped on every balance change; writers compare-and-swap on it.
  pub version:    i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
  #[default]
  Unknown,
  GameFee,
  Reward,
  ManagerCommission,
  Penalty,
  Refund,
  ManualAdjustment,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
  Credit,
  Debit,
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
  pub transaction_id:     Uuid,
  pub wallet_id:          Uuid,
  /// Always positive; the sign comes from `direction`.
  pub amount:             Decimal,
  pub balance_after:      Decimal,
  pub kind:               TransactionType,
  pub direction:          Direction,
  pub description:        Option<String>,
  pub related_session_id: Option<Uuid>,
  pub related_user_id:    Option<Uuid>,
  /// Unique tag linking a reward credit to what earned it.
  pub reward_ref:         Option<String>,
  pub created_at:         DateTime<Utc>,
}

impl WalletTransaction {
  pub fn signed_amount(&self) -> Decimal {
    match self.direction {
      Direction::Credit => self.amount,
      Direction::Debit => -self.amount,
    }
  }
}

/// Reward reference for the credit earned by completing a mission instance.
pub fn mission_reward_ref(user_mission_id: Uuid) -> String {
  format!("mission:{user_mission_id}")
}

/// Reward reference for the credit earned by a badge grant.
pub fn badge_reward_ref(grant_id: Uuid) -> String { format!("badge:{grant_id}") }

/// A requested balance change, validated by [`LedgerEntry::validate`] and
/// applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
  pub direction:          Direction,
  pub amount:             Decimal,
  pub kind:               TransactionType,
  pub description:        Option<String>,
  pub related_session_id: Option<Uuid>,
  pub related_user_id:    Option<Uuid>,
  pub reward_ref:         Option<String>,
}

impl LedgerEntry {
  pub fn credit(amount: Decimal, kind: TransactionType) -> Self {
    Self::new(Direction::Credit, amount, kind)
  }

  pub fn debit(amount: Decimal, kind: TransactionType) -> Self {
    Self::new(Direction::Debit, amount, kind)
  }

  fn new(direction: Direction, amount: Decimal, kind: TransactionType) -> Self {
    Self {
      direction,
      amount,
      kind,
      description: None,
      related_session_id: None,
      related_user_id: None,
      reward_ref: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.amount <= Decimal::ZERO {
      return Err(Error::NonPositiveAmount(self.amount));
    }
    Ok(())
  }

  /// Check the entry against the wallet it would be applied to and return
  /// the resulting balance.
  pub fn apply_to(&self, wallet: &Wallet) -> Result<Decimal> {
    self.validate()?;
    if wallet.is_locked {
      return Err(Error::WalletLocked(wallet.user_id));
    }
    let overflow = || Error::BalanceOverflow {
      balance: wallet.balance,
      amount:  self.amount,
    };
    match self.direction {
      Direction::Credit => wallet.balance.checked_add(self.amount).ok_or_else(overflow),
      Direction::Debit if wallet.balance < self.amount => Err(Error::InsufficientBalance {
        requested: self.amount,
        available: wallet.balance,
      }),
      Direction::Debit => wallet.balance.checked_sub(self.amount).ok_or_else(overflow),
    }
  }
}

/// Outcome of an applied [`LedgerEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
  pub wallet:      Wallet,
  pub transaction: WalletTransaction,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  fn wallet(balance: &str) -> Wallet {
    Wallet {
      wallet_id:  Uuid::new_v4(),
      user_id:    Uuid::new_v4(),
      balance:    Decimal::from_str(balance).unwrap(),
      is_locked:  false,
      version:    0,
      created_at: Utc::now(),
      updated_at: None,
    }
  }

  #[test]
  fn credit_adds_to_balance() {
    let entry = LedgerEntry::credit(Decimal::new(2550, 2), TransactionType::Refund);
    assert_eq!(entry.apply_to(&wallet("10")).unwrap(), Decimal::new(3550, 2));
  }

  #[test]
  fn non_positive_amounts_are_rejected() {
    let w = wallet("10");
    let zero = LedgerEntry::credit(Decimal::ZERO, TransactionType::Reward);
    assert_eq!(zero.apply_to(&w), Err(Error::NonPositiveAmount(Decimal::ZERO)));
    let negative = LedgerEntry::debit(Decimal::NEGATIVE_ONE, TransactionType::GameFee);
    assert!(matches!(negative.apply_to(&w), Err(Error::NonPositiveAmount(_))));
  }

  #[test]
  fn debit_beyond_balance_is_rejected() {
    let entry = LedgerEntry::debit(Decimal::from(50), TransactionType::GameFee);
    assert_eq!(
      entry.apply_to(&wallet("30")),
      Err(Error::InsufficientBalance {
        requested: Decimal::from(50),
        available: Decimal::from(30),
      })
    );
  }

  #[test]
  fn locked_wallet_rejects_both_directions() {
    let mut w = wallet("30");
    w.is_locked = true;
    let credit = LedgerEntry::credit(Decimal::ONE, TransactionType::Reward);
    let debit = LedgerEntry::debit(Decimal::ONE, TransactionType::GameFee);
    assert_eq!(credit.apply_to(&w), Err(Error::WalletLocked(w.user_id)));
    assert_eq!(debit.apply_to(&w), Err(Error::WalletLocked(w.user_id)));
  }

  #[test]
  fn credit_past_the_representable_maximum_is_rejected() {
    let entry = LedgerEntry::credit(Decimal::ONE, TransactionType::Refund);
    let mut w = wallet("0");
    w.balance = Decimal::MAX;
    assert_eq!(
      entry.apply_to(&w),
      Err(Error::BalanceOverflow {
        balance: Decimal::MAX,
        amount:  Decimal::ONE,
      })
    );
  }

  #[test]
  fn exact_balance_debit_reaches_zero() {
    let entry = LedgerEntry::debit(Decimal::from(30), TransactionType::GameFee);
    assert_eq!(entry.apply_to(&wallet("30")).unwrap(), Decimal::ZERO);
  }
}
