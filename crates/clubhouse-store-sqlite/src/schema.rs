//! SQL schema for the Clubhouse SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Timestamps are fixed-width RFC 3339 strings (nanoseconds, `Z`), so text
//! comparison orders them chronologically. Money is stored as decimal text.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id  TEXT PRIMARY KEY,
    branch_id   TEXT NOT NULL,
    room_id     TEXT NOT NULL,
    game_id     TEXT NOT NULL,
    scenario_id TEXT,
    manager_id  TEXT REFERENCES users(user_id),
    tier        TEXT NOT NULL,   -- 'normal' | 'vip' | 'cip'
    status      TEXT NOT NULL,   -- 'planned' | 'live' | 'paused' | 'ended' | 'canceled'
    starts_at   TEXT NOT NULL,
    ends_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_participants (
    session_id  TEXT NOT NULL REFERENCES sessions(session_id),
    player_id   TEXT NOT NULL REFERENCES users(user_id),
    status      TEXT NOT NULL,
    reserved_at TEXT NOT NULL,
    PRIMARY KEY (session_id, player_id)
);

CREATE TABLE IF NOT EXISTS mission_definitions (
    definition_id      TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    code               TEXT,
    description        TEXT,
    period             TEXT NOT NULL,
    target_value       INTEGER NOT NULL CHECK (target_value > 0),
    reward_amount      TEXT,
    reward_description TEXT,
    condition          TEXT,
    is_active          INTEGER NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT
);

CREATE TABLE IF NOT EXISTS user_missions (
    user_mission_id  TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES users(user_id),
    definition_id    TEXT NOT NULL REFERENCES mission_definitions(definition_id),
    period_start     TEXT NOT NULL,
    period_end       TEXT NOT NULL,
    current_value    INTEGER NOT NULL DEFAULT 0 CHECK (current_value >= 0),
    is_completed     INTEGER NOT NULL DEFAULT 0,
    completed_at     TEXT,
    last_progress_at TEXT,
    created_at       TEXT NOT NULL,
    UNIQUE (user_id, definition_id, period_start, period_end)
);

CREATE TABLE IF NOT EXISTS badges (
    badge_id      TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    code          TEXT UNIQUE,
    description   TEXT,
    icon_url      TEXT,
    reward_amount TEXT,
    condition     TEXT,
    is_active     INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT
);

-- Only the revocation columns are ever updated.
CREATE TABLE IF NOT EXISTS badge_grants (
    grant_id   TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    badge_id   TEXT NOT NULL REFERENCES badges(badge_id),
    earned_at  TEXT NOT NULL,
    granted_by TEXT,
    reason     TEXT,
    is_revoked INTEGER NOT NULL DEFAULT 0,
    revoked_at TEXT
);

-- One live grant per (user, badge); revoked rows are history.
CREATE UNIQUE INDEX IF NOT EXISTS badge_grants_live_idx
    ON badge_grants(user_id, badge_id) WHERE is_revoked = 0;

CREATE TABLE IF NOT EXISTS wallets (
    wallet_id  TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL UNIQUE REFERENCES users(user_id),
    balance    TEXT NOT NULL,
    is_locked  INTEGER NOT NULL DEFAULT 0,
    version    INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS wallet_transactions (
    transaction_id     TEXT PRIMARY KEY,
    wallet_id          TEXT NOT NULL REFERENCES wallets(wallet_id),
    amount             TEXT NOT NULL,
    balance_after      TEXT NOT NULL,
    kind               TEXT NOT NULL,
    direction          TEXT NOT NULL,   -- 'credit' | 'debit'
    description        TEXT,
    related_session_id TEXT,
    related_user_id    TEXT,
    reward_ref         TEXT UNIQUE,     -- 'mission:<id>' | 'badge:<id>'
    created_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    kind            TEXT NOT NULL,
    data            TEXT,            -- JSON payload or NULL
    is_read         INTEGER NOT NULL DEFAULT 0,
    read_at         TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_manager_idx      ON sessions(manager_id, status);
CREATE INDEX IF NOT EXISTS participants_player_idx   ON session_participants(player_id);
CREATE INDEX IF NOT EXISTS user_missions_user_idx    ON user_missions(user_id, is_completed);
CREATE INDEX IF NOT EXISTS badge_grants_user_idx     ON badge_grants(user_id);
CREATE INDEX IF NOT EXISTS transactions_wallet_idx   ON wallet_transactions(wallet_id, created_at);
CREATE INDEX IF NOT EXISTS notifications_user_idx    ON notifications(user_id, is_read);

PRAGMA user_version = 1;
";
