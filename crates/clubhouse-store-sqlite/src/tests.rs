//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use clubhouse_core::{
  Error as CoreError,
  badge::{NewBadge, NewBadgeGrant},
  metrics::SessionScope,
  mission::{MissionPeriod, NewMissionDefinition},
  notification::{NewNotification, NotificationType},
  session::{Role, Session, SessionStatus, SessionTier},
  store::LoyaltyStore,
  wallet::{Direction, LedgerEntry, TransactionType, mission_reward_ref},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore) -> Uuid {
  s.add_user("someone".into()).await.unwrap().user_id
}

fn domain<T: std::fmt::Debug>(result: crate::Result<T>) -> CoreError {
  match result {
    Err(Error::Core(e)) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

fn session(manager_id: Option<Uuid>, tier: SessionTier, status: SessionStatus) -> Session {
  let starts_at = Utc::now() - Duration::hours(2);
  Session {
    session_id: Uuid::new_v4(),
    branch_id: Uuid::new_v4(),
    room_id: Uuid::new_v4(),
    game_id: Uuid::new_v4(),
    scenario_id: None,
    manager_id,
    tier,
    status,
    starts_at,
    ends_at: starts_at + Duration::hours(1),
  }
}

fn credit(amount: i64) -> LedgerEntry {
  LedgerEntry::credit(Decimal::from(amount), TransactionType::ManualAdjustment)
}

fn debit(amount: i64) -> LedgerEntry {
  LedgerEntry::debit(Decimal::from(amount), TransactionType::GameFee)
}

// ─── Users and sessions ──────────────────────────────────────────────────────

#[tokio::test]
async fn add_user_and_check_existence() {
  let s = store().await;
  let id = user(&s).await;
  assert!(s.user_exists(id).await.unwrap());
  assert!(!s.user_exists(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn put_session_upserts() {
  let s = store().await;
  let manager = user(&s).await;
  let mut sess = session(Some(manager), SessionTier::Vip, SessionStatus::Live);
  s.put_session(sess.clone()).await.unwrap();

  sess.scenario_id = Some(Uuid::new_v4());
  s.put_session(sess.clone()).await.unwrap();

  let fetched = s.get_session(sess.session_id).await.unwrap().unwrap();
  assert_eq!(fetched, sess);
}

#[tokio::test]
async fn set_status_of_missing_session_is_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();
  let err = domain(s.set_session_status(id, SessionStatus::Ended).await);
  assert_eq!(err, CoreError::SessionNotFound(id));
}

#[tokio::test]
async fn status_change_reports_previous_status() {
  let s = store().await;
  let sess = session(None, SessionTier::Normal, SessionStatus::Live);
  s.put_session(sess.clone()).await.unwrap();

  let first = s.set_session_status(sess.session_id, SessionStatus::Ended).await.unwrap();
  assert_eq!(first.previous, SessionStatus::Live);
  assert_eq!(first.session.status, SessionStatus::Ended);
  assert!(first.ended_now());

  let again = s.set_session_status(sess.session_id, SessionStatus::Ended).await.unwrap();
  assert_eq!(again.previous, SessionStatus::Ended);
  assert!(!again.ended_now());
}

#[tokio::test]
async fn participants_are_unique_and_ordered() {
  let s = store().await;
  let sess = session(None, SessionTier::Normal, SessionStatus::Planned);
  s.put_session(sess.clone()).await.unwrap();
  let first = user(&s).await;
  let second = user(&s).await;

  s.add_participant(sess.session_id, first).await.unwrap();
  s.add_participant(sess.session_id, second).await.unwrap();
  s.add_participant(sess.session_id, first).await.unwrap();

  let players: Vec<Uuid> = s
    .list_participants(sess.session_id)
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.player_id)
    .collect();
  assert_eq!(players, vec![first, second]);
}

#[tokio::test]
async fn unknown_participant_is_rejected() {
  let s = store().await;
  let sess = session(None, SessionTier::Normal, SessionStatus::Planned);
  s.put_session(sess.clone()).await.unwrap();
  let stranger = Uuid::new_v4();
  let err = domain(s.add_participant(sess.session_id, stranger).await);
  assert_eq!(err, CoreError::UserNotFound(stranger));
}

#[tokio::test]
async fn ended_session_counts_follow_role_and_scope() {
  let s = store().await;
  let manager = user(&s).await;
  let player = user(&s).await;

  let vip = session(Some(manager), SessionTier::Vip, SessionStatus::Ended);
  let mut same_game = session(Some(manager), SessionTier::Normal, SessionStatus::Ended);
  same_game.game_id = vip.game_id;
  let live = session(Some(manager), SessionTier::Vip, SessionStatus::Live);

  for sess in [&vip, &same_game, &live] {
    s.put_session(sess.clone()).await.unwrap();
    s.add_participant(sess.session_id, player).await.unwrap();
  }

  let as_manager = |scope| s.count_ended_sessions(manager, Role::Manager, scope);
  let as_player = |scope| s.count_ended_sessions(player, Role::Player, scope);
  assert_eq!(as_manager(SessionScope::All).await.unwrap(), 2);
  assert_eq!(as_player(SessionScope::All).await.unwrap(), 2);
  assert_eq!(as_player(SessionScope::Tier(SessionTier::Vip)).await.unwrap(), 1);
  assert_eq!(as_player(SessionScope::Tier(SessionTier::Cip)).await.unwrap(), 0);
  assert_eq!(as_manager(SessionScope::Game(vip.game_id)).await.unwrap(), 2);
  assert_eq!(as_manager(SessionScope::Room(vip.room_id)).await.unwrap(), 1);

  // The player never managed anything.
  let managed = s
    .count_ended_sessions(player, Role::Manager, SessionScope::All)
    .await
    .unwrap();
  assert_eq!(managed, 0);
}

// ─── Wallet ledger ───────────────────────────────────────────────────────────

#[tokio::test]
async fn first_credit_creates_wallet() {
  let s = store().await;
  let u = user(&s).await;
  assert!(s.get_wallet(u).await.unwrap().is_none());

  let receipt = s.apply_ledger_entry(u, credit(100)).await.unwrap();
  assert_eq!(receipt.wallet.balance, Decimal::from(100));
  assert_eq!(receipt.transaction.balance_after, Decimal::from(100));
  assert_eq!(receipt.transaction.direction, Direction::Credit);

  let history = s.list_transactions(u, 0, 10).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].balance_after, Decimal::from(100));
  assert_eq!(s.get_wallet(u).await.unwrap().unwrap(), receipt.wallet);
}

#[tokio::test]
async fn overdraft_leaves_no_trace() {
  let s = store().await;
  let u = user(&s).await;
  s.apply_ledger_entry(u, credit(30)).await.unwrap();

  let err = domain(s.apply_ledger_entry(u, debit(50)).await);
  assert_eq!(
    err,
    CoreError::InsufficientBalance {
      requested: Decimal::from(50),
      available: Decimal::from(30),
    }
  );

  let wallet = s.get_wallet(u).await.unwrap().unwrap();
  assert_eq!(wallet.balance, Decimal::from(30));
  assert_eq!(s.list_transactions(u, 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn overflowing_credit_is_rejected_and_store_stays_usable() {
  let s = store().await;
  let u = user(&s).await;
  let max = LedgerEntry::credit(Decimal::MAX, TransactionType::ManualAdjustment);
  s.apply_ledger_entry(u, max).await.unwrap();

  let err = domain(s.apply_ledger_entry(u, credit(1)).await);
  assert_eq!(
    err,
    CoreError::BalanceOverflow {
      balance: Decimal::MAX,
      amount:  Decimal::ONE,
    }
  );

  let wallet = s.get_wallet(u).await.unwrap().unwrap();
  assert_eq!(wallet.balance, Decimal::MAX);
  assert_eq!(wallet.version, 1);
  assert_eq!(s.list_transactions(u, 0, 10).await.unwrap().len(), 1);

  // Other wallets are unaffected.
  let other = user(&s).await;
  s.apply_ledger_entry(other, credit(5)).await.unwrap();
}

#[tokio::test]
async fn debit_without_wallet_is_not_found() {
  let s = store().await;
  let u = user(&s).await;
  let err = domain(s.apply_ledger_entry(u, debit(1)).await);
  assert_eq!(err, CoreError::WalletNotFound(u));
}

#[tokio::test]
async fn credit_for_unknown_user_is_rejected() {
  let s = store().await;
  let stranger = Uuid::new_v4();
  let err = domain(s.apply_ledger_entry(stranger, credit(5)).await);
  assert_eq!(err, CoreError::UserNotFound(stranger));
  assert!(s.get_wallet(stranger).await.unwrap().is_none());
}

#[tokio::test]
async fn locked_wallet_rejects_entries() {
  let s = store().await;
  let u = user(&s).await;
  s.apply_ledger_entry(u, credit(10)).await.unwrap();
  assert!(s.set_wallet_locked(u, true).await.unwrap().is_locked);

  assert_eq!(domain(s.apply_ledger_entry(u, credit(1)).await), CoreError::WalletLocked(u));
  assert_eq!(domain(s.apply_ledger_entry(u, debit(1)).await), CoreError::WalletLocked(u));

  s.set_wallet_locked(u, false).await.unwrap();
  let receipt = s.apply_ledger_entry(u, debit(4)).await.unwrap();
  assert_eq!(receipt.wallet.balance, Decimal::from(6));
}

#[tokio::test]
async fn locking_missing_wallet_is_not_found() {
  let s = store().await;
  let u = user(&s).await;
  assert_eq!(domain(s.set_wallet_locked(u, true).await), CoreError::WalletNotFound(u));
}

#[tokio::test]
async fn reward_reference_credits_once() {
  let s = store().await;
  let u = user(&s).await;
  let reward_ref = mission_reward_ref(Uuid::new_v4());
  let entry = LedgerEntry {
    reward_ref: Some(reward_ref.clone()),
    ..LedgerEntry::credit(Decimal::from(25), TransactionType::Reward)
  };

  s.apply_ledger_entry(u, entry.clone()).await.unwrap();
  let err = domain(s.apply_ledger_entry(u, entry).await);
  assert_eq!(err, CoreError::RewardAlreadyCredited(reward_ref));
  assert_eq!(s.get_wallet(u).await.unwrap().unwrap().balance, Decimal::from(25));
}

#[tokio::test]
async fn version_advances_with_every_entry() {
  let s = store().await;
  let u = user(&s).await;
  let created = s.get_or_create_wallet(u).await.unwrap();
  assert_eq!(created.version, 0);
  assert_eq!(created.balance, Decimal::ZERO);

  s.apply_ledger_entry(u, credit(3)).await.unwrap();
  let receipt = s.apply_ledger_entry(u, debit(1)).await.unwrap();
  assert_eq!(receipt.wallet.version, 2);
  assert_eq!(s.get_or_create_wallet(u).await.unwrap().wallet_id, created.wallet_id);
}

#[tokio::test]
async fn history_is_newest_first_and_paged() {
  let s = store().await;
  let u = user(&s).await;
  for amount in 1..=5 {
    s.apply_ledger_entry(u, credit(amount)).await.unwrap();
  }

  let page = s.list_transactions(u, 1, 2).await.unwrap();
  let amounts: Vec<Decimal> = page.iter().map(|t| t.amount).collect();
  assert_eq!(amounts, vec![Decimal::from(4), Decimal::from(3)]);
}

#[tokio::test]
async fn concurrent_credits_are_all_applied() {
  let s = store().await;
  let u = user(&s).await;

  let tasks: Vec<_> = (1..=20)
    .map(|amount| {
      let s = s.clone();
      tokio::spawn(async move { s.apply_ledger_entry(u, credit(amount)).await })
    })
    .collect();
  for task in tasks {
    task.await.unwrap().unwrap();
  }

  let wallet = s.get_wallet(u).await.unwrap().unwrap();
  assert_eq!(wallet.balance, Decimal::from(210));
  assert_eq!(s.list_transactions(u, 0, 100).await.unwrap().len(), 20);
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(24))]

  #[test]
  fn balance_equals_signed_sum_of_ledger(ops in prop::collection::vec((any::<bool>(), 1i64..500), 1..30)) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
      let s = store().await;
      let u = user(&s).await;

      for (is_credit, amount) in ops {
        let entry = if is_credit { credit(amount) } else { debit(amount) };
        // Rejected debits must leave the ledger untouched.
        let _ = s.apply_ledger_entry(u, entry).await;
      }

      let Some(wallet) = s.get_wallet(u).await.unwrap() else {
        return;
      };
      let history = s.list_transactions(u, 0, 1000).await.unwrap();
      let sum: Decimal = history.iter().map(|t| t.signed_amount()).sum();
      assert_eq!(wallet.balance, sum);
      assert!(wallet.balance >= Decimal::ZERO);
      if let Some(latest) = history.first() {
        assert_eq!(latest.balance_after, wallet.balance);
      }
    });
  }
}

// ─── Missions ────────────────────────────────────────────────────────────────

async fn definition(s: &SqliteStore, target: i64, reward: Option<i64>) -> Uuid {
  let mut input = NewMissionDefinition::new("Play three games", MissionPeriod::Daily, target);
  input.reward_amount = reward.map(Decimal::from);
  s.create_mission_definition(input).await.unwrap().definition_id
}

#[tokio::test]
async fn create_rejects_non_positive_target() {
  let s = store().await;
  let input = NewMissionDefinition::new("Nothing", MissionPeriod::Weekly, 0);
  assert_eq!(domain(s.create_mission_definition(input).await), CoreError::NonPositiveTarget(0));
}

#[tokio::test]
async fn update_and_filter_definitions() {
  let s = store().await;
  let id = definition(&s, 3, Some(10)).await;
  definition(&s, 1, None).await;

  let mut input = NewMissionDefinition::new("Renamed", MissionPeriod::Weekly, 5);
  input.is_active = false;
  let updated = s.update_mission_definition(id, input).await.unwrap();
  assert_eq!(updated.name, "Renamed");
  assert_eq!(updated.reward_amount, None);
  assert!(updated.updated_at.is_some());

  assert_eq!(s.list_mission_definitions(Some(false)).await.unwrap().len(), 1);
  assert_eq!(s.list_mission_definitions(Some(true)).await.unwrap().len(), 1);
  assert_eq!(s.list_mission_definitions(None).await.unwrap().len(), 2);

  let missing = Uuid::new_v4();
  let input = NewMissionDefinition::new("Ghost", MissionPeriod::Daily, 1);
  assert_eq!(
    domain(s.update_mission_definition(missing, input).await),
    CoreError::MissionDefinitionNotFound(missing)
  );
}

#[tokio::test]
async fn one_instance_per_period() {
  let s = store().await;
  let u = user(&s).await;
  let d = definition(&s, 3, None).await;
  let start = Utc::now();
  let end = start + Duration::days(1);

  s.assign_mission(u, d, start, end).await.unwrap();
  let err = domain(s.assign_mission(u, d, start, end).await);
  assert_eq!(err, CoreError::DuplicateMissionPeriod { user_id: u, definition_id: d });

  // A different window is a different period.
  s.assign_mission(u, d, end, end + Duration::days(1)).await.unwrap();
  assert_eq!(s.list_user_missions(u, false, start).await.unwrap().len(), 2);
}

#[tokio::test]
async fn assignment_requires_active_definition() {
  let s = store().await;
  let u = user(&s).await;
  let mut input = NewMissionDefinition::new("Dormant", MissionPeriod::Daily, 1);
  input.is_active = false;
  let d = s.create_mission_definition(input).await.unwrap().definition_id;
  let now = Utc::now();

  let err = domain(s.assign_mission(u, d, now, now + Duration::days(1)).await);
  assert_eq!(err, CoreError::MissionDefinitionInactive(d));

  let err = domain(s.assign_mission(u, d, now, now).await);
  assert!(matches!(err, CoreError::InvalidPeriod { .. }));
}

#[tokio::test]
async fn progress_completes_once_then_freezes() {
  let s = store().await;
  let u = user(&s).await;
  let d = definition(&s, 3, Some(10)).await;
  let now = Utc::now();
  let m = s
    .assign_mission(u, d, now - Duration::hours(1), now + Duration::hours(1))
    .await
    .unwrap();

  let step = s.advance_mission(m.user_mission_id, 2, now).await.unwrap();
  assert_eq!(step.mission.current_value, 2);
  assert!(!step.completed_now);

  let done = s.advance_mission(m.user_mission_id, 5, now).await.unwrap();
  assert!(done.completed_now);
  assert_eq!(done.mission.current_value, 7);
  assert_eq!(done.mission.completed_at, Some(now));

  let err = domain(s.advance_mission(m.user_mission_id, 1, now).await);
  assert_eq!(err, CoreError::MissionAlreadyCompleted(m.user_mission_id));

  let stored = s.get_user_mission(m.user_mission_id).await.unwrap().unwrap();
  assert_eq!(stored.mission.current_value, 7);
  assert!(stored.mission.is_completed);
  assert!(s.open_missions(u, now).await.unwrap().is_empty());
}

#[tokio::test]
async fn progress_rejects_bad_input_and_expired_periods() {
  let s = store().await;
  let u = user(&s).await;
  let d = definition(&s, 3, None).await;
  let now = Utc::now();
  let m = s
    .assign_mission(u, d, now - Duration::days(2), now - Duration::days(1))
    .await
    .unwrap();

  assert_eq!(
    domain(s.advance_mission(m.user_mission_id, 0, now).await),
    CoreError::NonPositiveProgress(0)
  );
  assert_eq!(
    domain(s.advance_mission(m.user_mission_id, 1, now).await),
    CoreError::MissionPeriodEnded(m.user_mission_id)
  );
  let missing = Uuid::new_v4();
  assert_eq!(
    domain(s.advance_mission(missing, 1, now).await),
    CoreError::UserMissionNotFound(missing)
  );
}

#[tokio::test]
async fn open_missions_exclude_expired_and_inactive() {
  let s = store().await;
  let u = user(&s).await;
  let now = Utc::now();
  let live = definition(&s, 3, None).await;
  let stale = definition(&s, 3, None).await;

  s.assign_mission(u, live, now - Duration::hours(1), now + Duration::hours(1))
    .await
    .unwrap();
  s.assign_mission(u, stale, now - Duration::days(2), now - Duration::days(1))
    .await
    .unwrap();
  let mut input = NewMissionDefinition::new("Paused", MissionPeriod::Daily, 1);
  input.is_active = false;
  s.update_mission_definition(stale, input).await.unwrap();

  let open = s.open_missions(u, now).await.unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].definition.definition_id, live);
  assert_eq!(s.list_user_missions(u, true, now).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unrewarded_missions_disappear_once_credited() {
  let s = store().await;
  let u = user(&s).await;
  let rewarded = definition(&s, 1, Some(10)).await;
  let unpaid = definition(&s, 1, None).await;
  let now = Utc::now();

  let m = s
    .assign_mission(u, rewarded, now - Duration::hours(1), now + Duration::hours(1))
    .await
    .unwrap();
  let other = s
    .assign_mission(u, unpaid, now - Duration::hours(1), now + Duration::hours(1))
    .await
    .unwrap();
  s.advance_mission(m.user_mission_id, 1, now).await.unwrap();
  s.advance_mission(other.user_mission_id, 1, now).await.unwrap();

  let pending = s.unrewarded_missions().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].mission.user_mission_id, m.user_mission_id);

  let entry = LedgerEntry {
    reward_ref: Some(mission_reward_ref(m.user_mission_id)),
    ..LedgerEntry::credit(Decimal::from(10), TransactionType::Reward)
  };
  s.apply_ledger_entry(u, entry).await.unwrap();
  assert!(s.unrewarded_missions().await.unwrap().is_empty());
}

// ─── Badges ──────────────────────────────────────────────────────────────────

fn grant(user_id: Uuid, badge_id: Uuid) -> NewBadgeGrant {
  NewBadgeGrant { user_id, badge_id, granted_by: None, reason: None }
}

#[tokio::test]
async fn badge_codes_are_unique() {
  let s = store().await;
  let mut input = NewBadge::new("First win");
  input.code = Some("FIRST_WIN".into());
  s.create_badge(input.clone()).await.unwrap();

  let err = domain(s.create_badge(input).await);
  assert_eq!(err, CoreError::DuplicateBadgeCode("FIRST_WIN".into()));

  // Badges without a code never collide.
  s.create_badge(NewBadge::new("a")).await.unwrap();
  s.create_badge(NewBadge::new("b")).await.unwrap();
  assert_eq!(s.list_badges(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn second_live_grant_is_rejected() {
  let s = store().await;
  let u = user(&s).await;
  let b = s.create_badge(NewBadge::new("Regular")).await.unwrap().badge_id;

  s.insert_badge_grant(grant(u, b)).await.unwrap();
  let err = domain(s.insert_badge_grant(grant(u, b)).await);
  assert_eq!(err, CoreError::BadgeAlreadyGranted { user_id: u, badge_id: b });
  assert_eq!(s.list_user_badges(u, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn revoked_badge_can_be_granted_again() {
  let s = store().await;
  let u = user(&s).await;
  let b = s.create_badge(NewBadge::new("Regular")).await.unwrap().badge_id;

  let first = s.insert_badge_grant(grant(u, b)).await.unwrap();
  let revoked = s
    .revoke_badge_grant(first.grant_id, Some("abuse".into()))
    .await
    .unwrap();
  assert!(revoked.is_revoked);
  assert_eq!(revoked.reason.as_deref(), Some("abuse"));

  // Revoking twice changes nothing.
  let again = s.revoke_badge_grant(first.grant_id, None).await.unwrap();
  assert_eq!(again, revoked);

  s.insert_badge_grant(grant(u, b)).await.unwrap();
  assert_eq!(s.list_user_badges(u, false).await.unwrap().len(), 1);
  assert_eq!(s.list_user_badges(u, true).await.unwrap().len(), 2);
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(24))]

  /// `true` grants, `false` revokes the newest live grant. A grant succeeds
  /// exactly when nothing is held, and at most one grant is ever live.
  #[test]
  fn at_most_one_live_grant(ops in prop::collection::vec(any::<bool>(), 1..20)) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
      let s = store().await;
      let u = user(&s).await;
      let b = s.create_badge(NewBadge::new("Flip")).await.unwrap().badge_id;
      let mut live = None;

      for op in ops {
        match (op, live) {
          (true, None) => live = Some(s.insert_badge_grant(grant(u, b)).await.unwrap().grant_id),
          (true, Some(_)) => {
            let err = domain(s.insert_badge_grant(grant(u, b)).await);
            assert_eq!(err, CoreError::BadgeAlreadyGranted { user_id: u, badge_id: b });
          }
          (false, Some(grant_id)) => {
            s.revoke_badge_grant(grant_id, None).await.unwrap();
            live = None;
          }
          (false, None) => {}
        }
        let held = s.list_user_badges(u, false).await.unwrap();
        assert_eq!(held.len(), usize::from(live.is_some()));
      }
    });
  }
}

#[tokio::test]
async fn grant_requires_known_badge_and_user() {
  let s = store().await;
  let u = user(&s).await;
  let b = s.create_badge(NewBadge::new("Regular")).await.unwrap().badge_id;
  let ghost = Uuid::new_v4();

  assert_eq!(domain(s.insert_badge_grant(grant(u, ghost)).await), CoreError::BadgeNotFound(ghost));
  assert_eq!(domain(s.insert_badge_grant(grant(ghost, b)).await), CoreError::UserNotFound(ghost));
  assert_eq!(
    domain(s.revoke_badge_grant(ghost, None).await),
    CoreError::BadgeGrantNotFound(ghost)
  );
}

#[tokio::test]
async fn unrewarded_grants_skip_revoked_and_unpaid() {
  let s = store().await;
  let u = user(&s).await;
  let mut paid = NewBadge::new("Paid");
  paid.reward_amount = Some(Decimal::from(5));
  let paid = s.create_badge(paid).await.unwrap().badge_id;
  let mut zero = NewBadge::new("Zero");
  zero.reward_amount = Some(Decimal::ZERO);
  let zero = s.create_badge(zero).await.unwrap().badge_id;
  let mut gone = NewBadge::new("Gone");
  gone.reward_amount = Some(Decimal::from(5));
  let gone = s.create_badge(gone).await.unwrap().badge_id;

  let kept = s.insert_badge_grant(grant(u, paid)).await.unwrap();
  s.insert_badge_grant(grant(u, zero)).await.unwrap();
  let revoked = s.insert_badge_grant(grant(u, gone)).await.unwrap();
  s.revoke_badge_grant(revoked.grant_id, None).await.unwrap();

  let pending = s.unrewarded_grants().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].grant.grant_id, kept.grant_id);
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_read_state() {
  let s = store().await;
  let u = user(&s).await;
  let other = user(&s).await;

  let first = s
    .create_notification(NewNotification {
      user_id: u,
      title:   "Hello".into(),
      message: "First".into(),
      kind:    NotificationType::General,
      data:    Some(serde_json::json!({ "n": 1 })),
    })
    .await
    .unwrap();
  s.create_notification(NewNotification {
    user_id: u,
    title:   "Hello".into(),
    message: "Second".into(),
    kind:    NotificationType::WalletCredited,
    data:    None,
  })
  .await
  .unwrap();

  let listed = s.list_notifications(u, false).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].message, "Second");
  assert_eq!(listed[1].data, Some(serde_json::json!({ "n": 1 })));

  assert!(!s.mark_notification_read(first.notification_id, other).await.unwrap());
  assert!(s.mark_notification_read(first.notification_id, u).await.unwrap());
  assert!(!s.mark_notification_read(first.notification_id, u).await.unwrap());
  assert_eq!(s.list_notifications(u, true).await.unwrap().len(), 1);

  assert_eq!(s.mark_all_notifications_read(u).await.unwrap(), 1);
  assert!(s.list_notifications(u, true).await.unwrap().is_empty());
}
