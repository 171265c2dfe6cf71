//! Error types for `clubhouse-core`.
//!
//! These are the business-rule and lookup failures shared by every layer.
//! Storage backends wrap them; the engine surfaces them unchanged.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification used by callers to map an error to an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  InvalidOperation,
  Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("session {0} status can only change through a status transition")]
  SessionStatusChange(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("mission definition not found: {0}")]
  MissionDefinitionNotFound(Uuid),

  #[error("mission definition {0} is inactive")]
  MissionDefinitionInactive(Uuid),

  #[error("user mission not found: {0}")]
  UserMissionNotFound(Uuid),

  #[error("badge not found: {0}")]
  BadgeNotFound(Uuid),

  #[error("badge {0} is inactive")]
  BadgeInactive(Uuid),

  #[error("badge grant not found: {0}")]
  BadgeGrantNotFound(Uuid),

  #[error("wallet not found for user {0}")]
  WalletNotFound(Uuid),

  #[error("amount must be positive, got {0}")]
  NonPositiveAmount(Decimal),

  #[error("progress amount must be positive, got {0}")]
  NonPositiveProgress(i64),

  #[error("target value must be positive, got {0}")]
  NonPositiveTarget(i64),

  #[error("wallet for user {0} is locked")]
  WalletLocked(Uuid),

  #[error("insufficient balance: requested {requested}, available {available}")]
  InsufficientBalance {
    requested: Decimal,
    available: Decimal,
  },

  #[error("applying {amount} to balance {balance} exceeds the representable range")]
  BalanceOverflow {
    balance: Decimal,
    amount:  Decimal,
  },

  #[error("wallet {0} was modified concurrently")]
  WalletConflict(Uuid),

  #[error("reward {0} has already been credited")]
  RewardAlreadyCredited(String),

  #[error("user mission {0} is already completed")]
  MissionAlreadyCompleted(Uuid),

  #[error("user mission {0} period has ended")]
  MissionPeriodEnded(Uuid),

  #[error("user {user_id} already has mission {definition_id} for this period")]
  DuplicateMissionPeriod {
    user_id:       Uuid,
    definition_id: Uuid,
  },

  #[error("user {user_id} already holds badge {badge_id}")]
  BadgeAlreadyGranted {
    user_id:  Uuid,
    badge_id: Uuid,
  },

  #[error("badge code {0:?} is already in use")]
  DuplicateBadgeCode(String),

  #[error("mission period start {start} is not before end {end}")]
  InvalidPeriod {
    start: chrono::DateTime<chrono::Utc>,
    end:   chrono::DateTime<chrono::Utc>,
  },
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::SessionNotFound(_)
      | Self::UserNotFound(_)
      | Self::MissionDefinitionNotFound(_)
      | Self::UserMissionNotFound(_)
      | Self::BadgeNotFound(_)
      | Self::BadgeGrantNotFound(_)
      | Self::WalletNotFound(_) => ErrorKind::NotFound,
      Self::WalletConflict(_) => ErrorKind::Storage,
      _ => ErrorKind::InvalidOperation,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
