//! [`SqliteStore`], the SQLite implementation of [`LoyaltyStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use clubhouse_core::{
  Error as CoreError,
  badge::{Badge, BadgeGrant, HeldBadge, NewBadge, NewBadgeGrant},
  metrics::SessionScope,
  mission::{AssignedMission, MissionAdvance, MissionDefinition, NewMissionDefinition, UserMission},
  notification::{NewNotification, Notification},
  session::{
    ParticipantStatus, Role, Session, SessionParticipant, SessionStatus, SessionTransition, User,
  },
  store::LoyaltyStore,
  wallet::{Direction, LedgerEntry, LedgerReceipt, Wallet, WalletTransaction},
};
use rust_decimal::Decimal;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    BADGE_COLUMNS, DEFINITION_COLUMNS, GRANT_COLUMNS, NOTIFICATION_COLUMNS, PARTICIPANT_COLUMNS,
    RawAssignedMission, RawBadge, RawBadgeGrant, RawHeldBadge, RawMissionDefinition,
    RawNotification, RawParticipant, RawSession, RawTransaction, RawWallet,
    SESSION_COLUMNS, TRANSACTION_COLUMNS, USER_MISSION_COLUMNS, WALLET_COLUMNS,
    encode_decimal, encode_dt, encode_enum, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a closure that may reject the request on a business rule. The
/// outer `Result` carries database failures, the inner one domain errors.
type Checked<T> = std::result::Result<T, CoreError>;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// Carry a decode failure out of a connection closure.
fn boxed(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

fn user_exists(conn: &rusqlite::Connection, user_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM users WHERE user_id = ?1", [user_id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn select_assigned(
  conn: &rusqlite::Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawAssignedMission>> {
  let sql = format!(
    "SELECT {USER_MISSION_COLUMNS}, {DEFINITION_COLUMNS}
     FROM user_missions m
     JOIN mission_definitions d ON d.definition_id = m.definition_id
     {filter}"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params, RawAssignedMission::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn select_held(
  conn: &rusqlite::Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawHeldBadge>> {
  let sql = format!(
    "SELECT {GRANT_COLUMNS}, {BADGE_COLUMNS}
     FROM badge_grants g
     JOIN badges b ON b.badge_id = g.badge_id
     {filter}"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params, RawHeldBadge::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn select_wallet(conn: &rusqlite::Connection, user_id: &str) -> rusqlite::Result<Option<RawWallet>> {
  conn
    .query_row(
      &format!("SELECT {WALLET_COLUMNS} FROM wallets w WHERE w.user_id = ?1"),
      [user_id],
      RawWallet::from_row,
    )
    .optional()
}

fn has_positive_reward(reward: Option<Decimal>) -> bool {
  reward.is_some_and(|amount| amount > Decimal::ZERO)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Clubhouse store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mission_definition(&self, definition_id: Uuid) -> Result<Option<RawMissionDefinition>> {
    let id_str = encode_uuid(definition_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DEFINITION_COLUMNS} FROM mission_definitions d WHERE d.definition_id = ?1"
              ),
              [id_str],
              |row| RawMissionDefinition::from_row_at(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }

  async fn badge(&self, badge_id: Uuid) -> Result<Option<RawBadge>> {
    let id_str = encode_uuid(badge_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {BADGE_COLUMNS} FROM badges b WHERE b.badge_id = ?1"),
              [id_str],
              |row| RawBadge::from_row_at(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }
}

// ─── LoyaltyStore impl ───────────────────────────────────────────────────────

impl LoyaltyStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, display_name: String) -> Result<User> {
    let user = User {
      user_id: Uuid::new_v4(),
      display_name,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(user.user_id);
    let name   = user.display_name.clone();
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, display_name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);
    Ok(self.conn.call(move |conn| Ok(user_exists(conn, &id_str)?)).await?)
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn put_session(&self, session: Session) -> Result<()> {
    let params = (
      encode_uuid(session.session_id),
      encode_uuid(session.branch_id),
      encode_uuid(session.room_id),
      encode_uuid(session.game_id),
      session.scenario_id.map(encode_uuid),
      session.manager_id.map(encode_uuid),
      encode_enum(session.tier),
      encode_enum(session.status),
      encode_dt(session.starts_at),
      encode_dt(session.ends_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (
             session_id, branch_id, room_id, game_id, scenario_id,
             manager_id, tier, status, starts_at, ends_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (session_id) DO UPDATE SET
             branch_id   = excluded.branch_id,
             room_id     = excluded.room_id,
             game_id     = excluded.game_id,
             scenario_id = excluded.scenario_id,
             manager_id  = excluded.manager_id,
             tier        = excluded.tier,
             status      = excluded.status,
             starts_at   = excluded.starts_at,
             ends_at     = excluded.ends_at",
          params,
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.session_id = ?1"),
              [id_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn set_session_status(
    &self,
    session_id: Uuid,
    status: SessionStatus,
  ) -> Result<SessionTransition> {
    let id_str     = encode_uuid(session_id);
    let status_str = encode_enum(status);

    let out: Checked<(RawSession, RawSession)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let select = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.session_id = ?1");

        let Some(before) = tx
          .query_row(&select, [&id_str], RawSession::from_row)
          .optional()?
        else {
          return Ok(Err(CoreError::SessionNotFound(session_id)));
        };
        tx.execute(
          "UPDATE sessions SET status = ?1 WHERE session_id = ?2",
          rusqlite::params![status_str, id_str],
        )?;
        let after = tx.query_row(&select, [&id_str], RawSession::from_row)?;
        tx.commit()?;
        Ok(Ok((before, after)))
      })
      .await?;

    let (before, after) = out?;
    Ok(SessionTransition {
      previous: before.into_session()?.status,
      session:  after.into_session()?,
    })
  }

  async fn add_participant(&self, session_id: Uuid, player_id: Uuid) -> Result<SessionParticipant> {
    let session_str = encode_uuid(session_id);
    let player_str  = encode_uuid(player_id);
    let status_str  = encode_enum(ParticipantStatus::Registered);
    let at_str      = encode_dt(Utc::now());

    let out: Checked<RawParticipant> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let session_known = tx
          .query_row("SELECT 1 FROM sessions WHERE session_id = ?1", [&session_str], |_| Ok(()))
          .optional()?
          .is_some();
        if !session_known {
          return Ok(Err(CoreError::SessionNotFound(session_id)));
        }
        if !user_exists(&tx, &player_str)? {
          return Ok(Err(CoreError::UserNotFound(player_id)));
        }
        tx.execute(
          "INSERT INTO session_participants (session_id, player_id, status, reserved_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (session_id, player_id) DO NOTHING",
          rusqlite::params![session_str, player_str, status_str, at_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM session_participants p
             WHERE p.session_id = ?1 AND p.player_id = ?2"
          ),
          [&session_str, &player_str],
          RawParticipant::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    out?.into_participant()
  }

  async fn list_participants(&self, session_id: Uuid) -> Result<Vec<SessionParticipant>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawParticipant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PARTICIPANT_COLUMNS} FROM session_participants p
           WHERE p.session_id = ?1
           ORDER BY p.reserved_at, p.rowid"
        ))?;
        let rows = stmt
          .query_map([id_str], RawParticipant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParticipant::into_participant).collect()
  }

  async fn count_ended_sessions(&self, user_id: Uuid, role: Role, scope: SessionScope) -> Result<u32> {
    let base = match role {
      Role::Manager => {
        "SELECT COUNT(*) FROM sessions s
         WHERE s.manager_id = ?1 AND s.status = ?2"
      }
      Role::Player => {
        "SELECT COUNT(*) FROM session_participants p
         JOIN sessions s ON s.session_id = p.session_id
         WHERE p.player_id = ?1 AND s.status = ?2"
      }
    };
    let (narrowing, value) = match scope {
      SessionScope::All => ("", None),
      SessionScope::Tier(tier) => (" AND s.tier = ?3", Some(encode_enum(tier))),
      SessionScope::Game(id) => (" AND s.game_id = ?3", Some(encode_uuid(id))),
      SessionScope::Scenario(id) => (" AND s.scenario_id = ?3", Some(encode_uuid(id))),
      SessionScope::Branch(id) => (" AND s.branch_id = ?3", Some(encode_uuid(id))),
      SessionScope::Room(id) => (" AND s.room_id = ?3", Some(encode_uuid(id))),
    };
    let sql = format!("{base}{narrowing}");

    let mut args = vec![encode_uuid(user_id), encode_enum(SessionStatus::Ended)];
    args.extend(value);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), |row| row.get(0))?)
      })
      .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
  }

  // ── Missions ──────────────────────────────────────────────────────────────

  async fn create_mission_definition(&self, input: NewMissionDefinition) -> Result<MissionDefinition> {
    input.validate()?;

    let definition = MissionDefinition {
      definition_id:      Uuid::new_v4(),
      name:               input.name,
      code:               input.code,
      description:        input.description,
      period:             input.period,
      target_value:       input.target_value,
      reward_amount:      input.reward_amount,
      reward_description: input.reward_description,
      condition:          input.condition,
      is_active:          input.is_active,
      created_at:         Utc::now(),
      updated_at:         None,
    };

    let d = definition.clone();
    let params = (
      encode_uuid(d.definition_id),
      d.name,
      d.code,
      d.description,
      encode_enum(d.period),
      d.target_value,
      d.reward_amount.map(encode_decimal),
      d.reward_description,
      d.condition,
      d.is_active,
      encode_dt(d.created_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mission_definitions (
             definition_id, name, code, description, period, target_value,
             reward_amount, reward_description, condition, is_active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          params,
        )?;
        Ok(())
      })
      .await?;

    Ok(definition)
  }

  async fn update_mission_definition(
    &self,
    definition_id: Uuid,
    input: NewMissionDefinition,
  ) -> Result<MissionDefinition> {
    input.validate()?;

    let params = (
      input.name,
      input.code,
      input.description,
      encode_enum(input.period),
      input.target_value,
      input.reward_amount.map(encode_decimal),
      input.reward_description,
      input.condition,
      input.is_active,
      encode_dt(Utc::now()),
      encode_uuid(definition_id),
    );

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE mission_definitions SET
             name = ?1, code = ?2, description = ?3, period = ?4,
             target_value = ?5, reward_amount = ?6, reward_description = ?7,
             condition = ?8, is_active = ?9, updated_at = ?10
           WHERE definition_id = ?11",
          params,
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(CoreError::MissionDefinitionNotFound(definition_id).into());
    }

    self
      .mission_definition(definition_id)
      .await?
      .ok_or(CoreError::MissionDefinitionNotFound(definition_id))?
      .into_definition()
  }

  async fn get_mission_definition(&self, definition_id: Uuid) -> Result<Option<MissionDefinition>> {
    self
      .mission_definition(definition_id)
      .await?
      .map(RawMissionDefinition::into_definition)
      .transpose()
  }

  async fn list_mission_definitions(&self, is_active: Option<bool>) -> Result<Vec<MissionDefinition>> {
    let raws: Vec<RawMissionDefinition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEFINITION_COLUMNS} FROM mission_definitions d
           WHERE (?1 IS NULL OR d.is_active = ?1)
           ORDER BY d.name, d.rowid"
        ))?;
        let rows = stmt
          .query_map([is_active], |row| RawMissionDefinition::from_row_at(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMissionDefinition::into_definition).collect()
  }

  async fn assign_mission(
    &self,
    user_id: Uuid,
    definition_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
  ) -> Result<UserMission> {
    if period_start >= period_end {
      return Err(CoreError::InvalidPeriod { start: period_start, end: period_end }.into());
    }

    let mission = UserMission {
      user_mission_id: Uuid::new_v4(),
      user_id,
      definition_id,
      period_start,
      period_end,
      current_value: 0,
      is_completed: false,
      completed_at: None,
      last_progress_at: None,
      created_at: Utc::now(),
    };

    let mission_str    = encode_uuid(mission.user_mission_id);
    let user_str       = encode_uuid(user_id);
    let definition_str = encode_uuid(definition_id);
    let start_str      = encode_dt(period_start);
    let end_str        = encode_dt(period_end);
    let at_str         = encode_dt(mission.created_at);

    let out: Checked<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let is_active: Option<bool> = tx
          .query_row(
            "SELECT is_active FROM mission_definitions WHERE definition_id = ?1",
            [&definition_str],
            |row| row.get(0),
          )
          .optional()?;
        match is_active {
          None => return Ok(Err(CoreError::MissionDefinitionNotFound(definition_id))),
          Some(false) => return Ok(Err(CoreError::MissionDefinitionInactive(definition_id))),
          Some(true) => {}
        }
        if !user_exists(&tx, &user_str)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }

        let inserted = tx.execute(
          "INSERT INTO user_missions (
             user_mission_id, user_id, definition_id, period_start, period_end, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![mission_str, user_str, definition_str, start_str, end_str, at_str],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(CoreError::DuplicateMissionPeriod { user_id, definition_id }));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    out?;

    Ok(mission)
  }

  async fn get_user_mission(&self, user_mission_id: Uuid) -> Result<Option<AssignedMission>> {
    let id_str = encode_uuid(user_mission_id);

    let raws = self
      .conn
      .call(move |conn| Ok(select_assigned(conn, "WHERE m.user_mission_id = ?1", [id_str])?))
      .await?;

    raws.into_iter().next().map(RawAssignedMission::into_assigned).transpose()
  }

  async fn list_user_missions(
    &self,
    user_id: Uuid,
    only_active: bool,
    now: DateTime<Utc>,
  ) -> Result<Vec<AssignedMission>> {
    let user_str = encode_uuid(user_id);
    let now_str  = encode_dt(now);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_assigned(
          conn,
          "WHERE m.user_id = ?1
             AND (?2 = 0 OR (m.is_completed = 0 AND d.is_active = 1 AND m.period_end >= ?3))
           ORDER BY m.period_end, m.rowid",
          rusqlite::params![user_str, only_active, now_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawAssignedMission::into_assigned).collect()
  }

  async fn open_missions(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<AssignedMission>> {
    let user_str = encode_uuid(user_id);
    let now_str  = encode_dt(now);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_assigned(
          conn,
          "WHERE m.user_id = ?1
             AND m.is_completed = 0
             AND d.is_active = 1
             AND m.period_start <= ?2
             AND m.period_end >= ?2
           ORDER BY m.period_end, m.rowid",
          rusqlite::params![user_str, now_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawAssignedMission::into_assigned).collect()
  }

  async fn advance_mission(
    &self,
    user_mission_id: Uuid,
    amount: i64,
    now: DateTime<Utc>,
  ) -> Result<MissionAdvance> {
    if amount <= 0 {
      return Err(CoreError::NonPositiveProgress(amount).into());
    }

    let id_str  = encode_uuid(user_mission_id);
    let now_str = encode_dt(now);

    let out: Checked<MissionAdvance> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(raw) =
          select_assigned(&tx, "WHERE m.user_mission_id = ?1", [&id_str])?.into_iter().next()
        else {
          return Ok(Err(CoreError::UserMissionNotFound(user_mission_id)));
        };
        let AssignedMission { mut mission, definition } = raw.into_assigned().map_err(boxed)?;

        if mission.is_completed {
          return Ok(Err(CoreError::MissionAlreadyCompleted(user_mission_id)));
        }
        if now > mission.period_end {
          return Ok(Err(CoreError::MissionPeriodEnded(user_mission_id)));
        }

        mission.current_value = mission.current_value.saturating_add(amount);
        mission.last_progress_at = Some(now);
        let completed_now = mission.current_value >= definition.target_value;
        if completed_now {
          mission.is_completed = true;
          mission.completed_at = Some(now);
        }

        tx.execute(
          "UPDATE user_missions SET
             current_value = ?1, is_completed = ?2, completed_at = ?3, last_progress_at = ?4
           WHERE user_mission_id = ?5 AND is_completed = 0",
          rusqlite::params![
            mission.current_value,
            mission.is_completed,
            completed_now.then(|| now_str.clone()),
            now_str,
            id_str,
          ],
        )?;
        tx.commit()?;

        Ok(Ok(MissionAdvance { mission, definition, completed_now }))
      })
      .await?;

    Ok(out?)
  }

  async fn unrewarded_missions(&self) -> Result<Vec<AssignedMission>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(select_assigned(
          conn,
          "WHERE m.is_completed = 1
             AND d.reward_amount IS NOT NULL
             AND NOT EXISTS (
               SELECT 1 FROM wallet_transactions t
               WHERE t.reward_ref = 'mission:' || m.user_mission_id
             )
           ORDER BY m.completed_at, m.rowid",
          [],
        )?)
      })
      .await?;

    let missions = raws
      .into_iter()
      .map(RawAssignedMission::into_assigned)
      .collect::<Result<Vec<_>>>()?;
    Ok(
      missions
        .into_iter()
        .filter(|a| has_positive_reward(a.definition.reward_amount))
        .collect(),
    )
  }

  // ── Badges ────────────────────────────────────────────────────────────────

  async fn create_badge(&self, input: NewBadge) -> Result<Badge> {
    let badge = Badge {
      badge_id:      Uuid::new_v4(),
      name:          input.name,
      code:          input.code,
      description:   input.description,
      icon_url:      input.icon_url,
      reward_amount: input.reward_amount,
      condition:     input.condition,
      is_active:     input.is_active,
      created_at:    Utc::now(),
      updated_at:    None,
    };

    let b = badge.clone();
    let code = b.code.clone();
    let params = (
      encode_uuid(b.badge_id),
      b.name,
      b.code,
      b.description,
      b.icon_url,
      b.reward_amount.map(encode_decimal),
      b.condition,
      b.is_active,
      encode_dt(b.created_at),
    );

    let out: Checked<()> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO badges (
             badge_id, name, code, description, icon_url,
             reward_amount, condition, is_active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params,
        );
        match inserted {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(CoreError::DuplicateBadgeCode(code.unwrap_or_default())))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    out?;

    Ok(badge)
  }

  async fn update_badge(&self, badge_id: Uuid, input: NewBadge) -> Result<Badge> {
    let code = input.code.clone();
    let params = (
      input.name,
      input.code,
      input.description,
      input.icon_url,
      input.reward_amount.map(encode_decimal),
      input.condition,
      input.is_active,
      encode_dt(Utc::now()),
      encode_uuid(badge_id),
    );

    let out: Checked<()> = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE badges SET
             name = ?1, code = ?2, description = ?3, icon_url = ?4,
             reward_amount = ?5, condition = ?6, is_active = ?7, updated_at = ?8
           WHERE badge_id = ?9",
          params,
        );
        match updated {
          Ok(0) => Ok(Err(CoreError::BadgeNotFound(badge_id))),
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(CoreError::DuplicateBadgeCode(code.unwrap_or_default())))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    out?;

    self
      .badge(badge_id)
      .await?
      .ok_or(CoreError::BadgeNotFound(badge_id))?
      .into_badge()
  }

  async fn get_badge(&self, badge_id: Uuid) -> Result<Option<Badge>> {
    self.badge(badge_id).await?.map(RawBadge::into_badge).transpose()
  }

  async fn list_badges(&self, is_active: Option<bool>) -> Result<Vec<Badge>> {
    let raws: Vec<RawBadge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BADGE_COLUMNS} FROM badges b
           WHERE (?1 IS NULL OR b.is_active = ?1)
           ORDER BY b.name, b.rowid"
        ))?;
        let rows = stmt
          .query_map([is_active], |row| RawBadge::from_row_at(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBadge::into_badge).collect()
  }

  async fn insert_badge_grant(&self, input: NewBadgeGrant) -> Result<BadgeGrant> {
    let grant = BadgeGrant {
      grant_id:   Uuid::new_v4(),
      user_id:    input.user_id,
      badge_id:   input.badge_id,
      earned_at:  Utc::now(),
      granted_by: input.granted_by,
      reason:     input.reason,
      is_revoked: false,
      revoked_at: None,
    };

    let (user_id, badge_id) = (grant.user_id, grant.badge_id);
    let grant_str = encode_uuid(grant.grant_id);
    let user_str  = encode_uuid(user_id);
    let badge_str = encode_uuid(badge_id);
    let at_str    = encode_dt(grant.earned_at);
    let by_str    = grant.granted_by.map(encode_uuid);
    let reason    = grant.reason.clone();

    let out: Checked<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let badge_known = tx
          .query_row("SELECT 1 FROM badges WHERE badge_id = ?1", [&badge_str], |_| Ok(()))
          .optional()?
          .is_some();
        if !badge_known {
          return Ok(Err(CoreError::BadgeNotFound(badge_id)));
        }
        if !user_exists(&tx, &user_str)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }

        let inserted = tx.execute(
          "INSERT INTO badge_grants (grant_id, user_id, badge_id, earned_at, granted_by, reason)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![grant_str, user_str, badge_str, at_str, by_str, reason],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(CoreError::BadgeAlreadyGranted { user_id, badge_id }));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    out?;

    Ok(grant)
  }

  async fn revoke_badge_grant(&self, grant_id: Uuid, reason: Option<String>) -> Result<BadgeGrant> {
    let id_str = encode_uuid(grant_id);
    let at_str = encode_dt(Utc::now());

    let out: Checked<RawBadgeGrant> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let select = format!("SELECT {GRANT_COLUMNS} FROM badge_grants g WHERE g.grant_id = ?1");

        let Some(existing) = tx
          .query_row(&select, [&id_str], |row| RawBadgeGrant::from_row_at(row, 0))
          .optional()?
        else {
          return Ok(Err(CoreError::BadgeGrantNotFound(grant_id)));
        };
        if existing.is_revoked {
          return Ok(Ok(existing));
        }

        tx.execute(
          "UPDATE badge_grants
           SET is_revoked = 1, revoked_at = ?1, reason = COALESCE(?2, reason)
           WHERE grant_id = ?3",
          rusqlite::params![at_str, reason, id_str],
        )?;
        let updated = tx.query_row(&select, [&id_str], |row| RawBadgeGrant::from_row_at(row, 0))?;
        tx.commit()?;
        Ok(Ok(updated))
      })
      .await?;

    out?.into_grant()
  }

  async fn list_user_badges(&self, user_id: Uuid, include_revoked: bool) -> Result<Vec<HeldBadge>> {
    let user_str = encode_uuid(user_id);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(select_held(
          conn,
          "WHERE g.user_id = ?1 AND (?2 = 1 OR g.is_revoked = 0)
           ORDER BY g.earned_at DESC, g.rowid DESC",
          rusqlite::params![user_str, include_revoked],
        )?)
      })
      .await?;

    raws.into_iter().map(RawHeldBadge::into_held).collect()
  }

  async fn unrewarded_grants(&self) -> Result<Vec<HeldBadge>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(select_held(
          conn,
          "WHERE g.is_revoked = 0
             AND b.reward_amount IS NOT NULL
             AND NOT EXISTS (
               SELECT 1 FROM wallet_transactions t
               WHERE t.reward_ref = 'badge:' || g.grant_id
             )
           ORDER BY g.earned_at, g.rowid",
          [],
        )?)
      })
      .await?;

    let held = raws
      .into_iter()
      .map(RawHeldBadge::into_held)
      .collect::<Result<Vec<_>>>()?;
    Ok(
      held
        .into_iter()
        .filter(|h| has_positive_reward(h.badge.reward_amount))
        .collect(),
    )
  }

  // ── Wallets ───────────────────────────────────────────────────────────────

  async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>> {
    let user_str = encode_uuid(user_id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_wallet(conn, &user_str)?))
      .await?;

    raw.map(RawWallet::into_wallet).transpose()
  }

  async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet> {
    let user_str   = encode_uuid(user_id);
    let wallet_str = encode_uuid(Uuid::new_v4());
    let at_str     = encode_dt(Utc::now());
    let zero       = encode_decimal(Decimal::ZERO);

    let out: Checked<RawWallet> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(raw) = select_wallet(&tx, &user_str)? {
          return Ok(Ok(raw));
        }
        if !user_exists(&tx, &user_str)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }
        tx.execute(
          "INSERT INTO wallets (wallet_id, user_id, balance, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id) DO NOTHING",
          rusqlite::params![wallet_str, user_str, zero, at_str],
        )?;
        let raw = select_wallet(&tx, &user_str)?;
        tx.commit()?;
        Ok(raw.ok_or(CoreError::WalletNotFound(user_id)))
      })
      .await?;

    out?.into_wallet()
  }

  async fn apply_ledger_entry(&self, user_id: Uuid, entry: LedgerEntry) -> Result<LedgerReceipt> {
    entry.validate()?;

    let user_str       = encode_uuid(user_id);
    let new_wallet_str = encode_uuid(Uuid::new_v4());
    let now            = Utc::now();
    let now_str        = encode_dt(now);
    let transaction_id = Uuid::new_v4();

    let out: Checked<LedgerReceipt> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(reward_ref) = &entry.reward_ref {
          let credited = tx
            .query_row(
              "SELECT 1 FROM wallet_transactions WHERE reward_ref = ?1",
              [reward_ref],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if credited {
            return Ok(Err(CoreError::RewardAlreadyCredited(reward_ref.clone())));
          }
        }

        let raw = match select_wallet(&tx, &user_str)? {
          Some(raw) => raw,
          None if entry.direction == Direction::Debit => {
            return Ok(Err(CoreError::WalletNotFound(user_id)));
          }
          None => {
            if !user_exists(&tx, &user_str)? {
              return Ok(Err(CoreError::UserNotFound(user_id)));
            }
            tx.execute(
              "INSERT INTO wallets (wallet_id, user_id, balance, created_at)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![new_wallet_str, user_str, encode_decimal(Decimal::ZERO), now_str],
            )?;
            RawWallet {
              wallet_id:  new_wallet_str,
              user_id:    user_str,
              balance:    encode_decimal(Decimal::ZERO),
              is_locked:  false,
              version:    0,
              created_at: now_str.clone(),
              updated_at: None,
            }
          }
        };
        let mut wallet = raw.into_wallet().map_err(boxed)?;

        let balance_after = match entry.apply_to(&wallet) {
          Ok(balance) => balance,
          Err(e) => return Ok(Err(e)),
        };

        let wallet_str = encode_uuid(wallet.wallet_id);
        let swapped = tx.execute(
          "UPDATE wallets SET balance = ?1, version = version + 1, updated_at = ?2
           WHERE wallet_id = ?3 AND version = ?4",
          rusqlite::params![encode_decimal(balance_after), now_str, wallet_str, wallet.version],
        )?;
        if swapped == 0 {
          return Ok(Err(CoreError::WalletConflict(user_id)));
        }

        let transaction = WalletTransaction {
          transaction_id,
          wallet_id: wallet.wallet_id,
          amount: entry.amount,
          balance_after,
          kind: entry.kind,
          direction: entry.direction,
          description: entry.description,
          related_session_id: entry.related_session_id,
          related_user_id: entry.related_user_id,
          reward_ref: entry.reward_ref,
          created_at: now,
        };

        let inserted = tx.execute(
          "INSERT INTO wallet_transactions (
             transaction_id, wallet_id, amount, balance_after, kind, direction,
             description, related_session_id, related_user_id, reward_ref, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            encode_uuid(transaction.transaction_id),
            wallet_str,
            encode_decimal(transaction.amount),
            encode_decimal(transaction.balance_after),
            encode_enum(transaction.kind),
            encode_enum(transaction.direction),
            transaction.description,
            transaction.related_session_id.map(encode_uuid),
            transaction.related_user_id.map(encode_uuid),
            transaction.reward_ref,
            now_str,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            let reward_ref = transaction.reward_ref.unwrap_or_default();
            return Ok(Err(CoreError::RewardAlreadyCredited(reward_ref)));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;

        wallet.balance = balance_after;
        wallet.version += 1;
        wallet.updated_at = Some(now);
        Ok(Ok(LedgerReceipt { wallet, transaction }))
      })
      .await?;

    Ok(out?)
  }

  async fn set_wallet_locked(&self, user_id: Uuid, locked: bool) -> Result<Wallet> {
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(Utc::now());

    let out: Checked<RawWallet> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE wallets SET is_locked = ?1, updated_at = ?2 WHERE user_id = ?3",
          rusqlite::params![locked, at_str, user_str],
        )?;
        Ok(select_wallet(conn, &user_str)?
          .filter(|_| changed > 0)
          .ok_or(CoreError::WalletNotFound(user_id)))
      })
      .await?;

    out?.into_wallet()
  }

  async fn list_transactions(
    &self,
    user_id: Uuid,
    skip: usize,
    take: usize,
  ) -> Result<Vec<WalletTransaction>> {
    let user_str = encode_uuid(user_id);
    let limit    = i64::try_from(take).unwrap_or(i64::MAX);
    let offset   = i64::try_from(skip).unwrap_or(i64::MAX);

    let raws: Vec<RawTransaction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRANSACTION_COLUMNS}
           FROM wallet_transactions t
           JOIN wallets w ON w.wallet_id = t.wallet_id
           WHERE w.user_id = ?1
           ORDER BY t.created_at DESC, t.rowid DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, limit, offset], RawTransaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransaction::into_transaction).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn create_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      user_id:         input.user_id,
      title:           input.title,
      message:         input.message,
      kind:            input.kind,
      data:            input.data,
      is_read:         false,
      read_at:         None,
      created_at:      Utc::now(),
    };

    let data_str = notification
      .data
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let params = (
      encode_uuid(notification.notification_id),
      encode_uuid(notification.user_id),
      notification.title.clone(),
      notification.message.clone(),
      encode_enum(notification.kind),
      data_str,
      encode_dt(notification.created_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, user_id, title, message, kind, data, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params,
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn list_notifications(&self, user_id: Uuid, only_unread: bool) -> Result<Vec<Notification>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
           WHERE n.user_id = ?1 AND (?2 = 0 OR n.is_read = 0)
           ORDER BY n.created_at DESC, n.rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, only_unread], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
    let id_str   = encode_uuid(notification_id);
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1, read_at = ?1
           WHERE notification_id = ?2 AND user_id = ?3 AND is_read = 0",
          rusqlite::params![at_str, id_str, user_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1, read_at = ?1
           WHERE user_id = ?2 AND is_read = 0",
          rusqlite::params![at_str, user_str],
        )?)
      })
      .await?;

    Ok(changed)
  }
}
