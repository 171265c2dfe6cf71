//! The `LoyaltyStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `clubhouse-store-sqlite`). The engine depends on this abstraction, not on
//! any concrete backend.
//!
//! Every method is one independently-committed unit of work. Methods that
//! enforce a business rule (ledger entries, mission progress, badge grants)
//! check and write inside a single backend transaction, so a rejected call
//! leaves no trace.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  badge::{Badge, BadgeGrant, HeldBadge, NewBadge, NewBadgeGrant},
  metrics::SessionScope,
  mission::{AssignedMission, MissionAdvance, MissionDefinition, NewMissionDefinition, UserMission},
  notification::{NewNotification, Notification},
  session::{Role, Session, SessionParticipant, SessionStatus, SessionTransition, User},
  wallet::{LedgerEntry, LedgerReceipt, Wallet, WalletTransaction},
};

/// Backend errors must be able to expose the domain error they carry, so
/// callers can tell a rejected request from a storage failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

/// Abstraction over the persistence layer of the reward engine.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait LoyaltyStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    display_name: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn user_exists(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Insert a session, or replace the stored copy with the same id.
  fn put_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Set the status and report the one it replaced, read in the same
  /// transaction so concurrent callers see distinct transitions.
  fn set_session_status(
    &self,
    session_id: Uuid,
    status: SessionStatus,
  ) -> impl Future<Output = Result<SessionTransition, Self::Error>> + Send + '_;

  /// Register a player. Registering twice returns the existing row.
  fn add_participant(
    &self,
    session_id: Uuid,
    player_id: Uuid,
  ) -> impl Future<Output = Result<SessionParticipant, Self::Error>> + Send + '_;

  /// Participants in registration order.
  fn list_participants(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SessionParticipant>, Self::Error>> + Send + '_;

  /// Count ended sessions of `user_id` in `role`, narrowed by `scope`.
  fn count_ended_sessions(
    &self,
    user_id: Uuid,
    role: Role,
    scope: SessionScope,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  // ── Missions ──────────────────────────────────────────────────────────

  fn create_mission_definition(
    &self,
    input: NewMissionDefinition,
  ) -> impl Future<Output = Result<MissionDefinition, Self::Error>> + Send + '_;

  fn update_mission_definition(
    &self,
    definition_id: Uuid,
    input: NewMissionDefinition,
  ) -> impl Future<Output = Result<MissionDefinition, Self::Error>> + Send + '_;

  fn get_mission_definition(
    &self,
    definition_id: Uuid,
  ) -> impl Future<Output = Result<Option<MissionDefinition>, Self::Error>> + Send + '_;

  /// Definitions ordered by name, optionally filtered by `is_active`.
  fn list_mission_definitions(
    &self,
    is_active: Option<bool>,
  ) -> impl Future<Output = Result<Vec<MissionDefinition>, Self::Error>> + Send + '_;

  /// Create a fresh instance with `current_value = 0`.
  ///
  /// Rejects an inactive definition, an unknown user, and a second instance
  /// with the same `(user, definition, start, end)` key.
  fn assign_mission(
    &self,
    user_id: Uuid,
    definition_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
  ) -> impl Future<Output = Result<UserMission, Self::Error>> + Send + '_;

  fn get_user_mission(
    &self,
    user_mission_id: Uuid,
  ) -> impl Future<Output = Result<Option<AssignedMission>, Self::Error>> + Send + '_;

  /// A user's instances ordered by period end. With `only_active`, only
  /// unexpired, uncompleted instances of active definitions are returned.
  fn list_user_missions(
    &self,
    user_id: Uuid,
    only_active: bool,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<AssignedMission>, Self::Error>> + Send + '_;

  /// Uncompleted instances whose period contains `now` and whose definition
  /// is active.
  fn open_missions(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<AssignedMission>, Self::Error>> + Send + '_;

  /// Add `amount` to an instance and complete it when the target is
  /// reached. Rejects non-positive amounts, completed instances, and
  /// instances whose period ended before `now`.
  fn advance_mission(
    &self,
    user_mission_id: Uuid,
    amount: i64,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<MissionAdvance, Self::Error>> + Send + '_;

  /// Completed instances with a positive reward configured but no ledger
  /// row carrying their reward reference.
  fn unrewarded_missions(
    &self,
  ) -> impl Future<Output = Result<Vec<AssignedMission>, Self::Error>> + Send + '_;

  // ── Badges ────────────────────────────────────────────────────────────

  fn create_badge(
    &self,
    input: NewBadge,
  ) -> impl Future<Output = Result<Badge, Self::Error>> + Send + '_;

  fn update_badge(
    &self,
    badge_id: Uuid,
    input: NewBadge,
  ) -> impl Future<Output = Result<Badge, Self::Error>> + Send + '_;

  fn get_badge(
    &self,
    badge_id: Uuid,
  ) -> impl Future<Output = Result<Option<Badge>, Self::Error>> + Send + '_;

  /// Badges ordered by name, optionally filtered by `is_active`.
  fn list_badges(
    &self,
    is_active: Option<bool>,
  ) -> impl Future<Output = Result<Vec<Badge>, Self::Error>> + Send + '_;

  /// Persist a grant. A second non-revoked grant of the same badge to the
  /// same user is rejected by the backend's uniqueness constraint.
  fn insert_badge_grant(
    &self,
    input: NewBadgeGrant,
  ) -> impl Future<Output = Result<BadgeGrant, Self::Error>> + Send + '_;

  /// Mark a grant revoked. Revoking twice returns the grant unchanged.
  fn revoke_badge_grant(
    &self,
    grant_id: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<BadgeGrant, Self::Error>> + Send + '_;

  /// A user's grants, newest first.
  fn list_user_badges(
    &self,
    user_id: Uuid,
    include_revoked: bool,
  ) -> impl Future<Output = Result<Vec<HeldBadge>, Self::Error>> + Send + '_;

  /// Non-revoked grants of badges with a positive reward but no ledger row
  /// carrying their reward reference.
  fn unrewarded_grants(
    &self,
  ) -> impl Future<Output = Result<Vec<HeldBadge>, Self::Error>> + Send + '_;

  // ── Wallets ───────────────────────────────────────────────────────────

  fn get_wallet(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Wallet>, Self::Error>> + Send + '_;

  fn get_or_create_wallet(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Wallet, Self::Error>> + Send + '_;

  /// Apply a credit or debit and append its ledger row in one transaction.
  ///
  /// Credits create the wallet when missing; debits require it. The balance
  /// update is conditional on the wallet version read in the same
  /// transaction and fails with `WalletConflict` when it moved.
  fn apply_ledger_entry(
    &self,
    user_id: Uuid,
    entry: LedgerEntry,
  ) -> impl Future<Output = Result<LedgerReceipt, Self::Error>> + Send + '_;

  fn set_wallet_locked(
    &self,
    user_id: Uuid,
    locked: bool,
  ) -> impl Future<Output = Result<Wallet, Self::Error>> + Send + '_;

  /// Ledger rows newest first. Empty when the user has no wallet.
  fn list_transactions(
    &self,
    user_id: Uuid,
    skip: usize,
    take: usize,
  ) -> impl Future<Output = Result<Vec<WalletTransaction>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn create_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    user_id: Uuid,
    only_unread: bool,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Returns `false` when the notification is missing, belongs to someone
  /// else, or was already read.
  fn mark_notification_read(
    &self,
    notification_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns the number of notifications that changed state.
  fn mark_all_notifications_read(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
