//! `clubhouse`: operator CLI for the Clubhouse reward engine.
//!
//! # Usage
//!
//! ```
//! clubhouse process-session 5f0c...
//! clubhouse wallet credit 5f0c... 25.00 --kind refund --description "table 4"
//! clubhouse --config /etc/clubhouse.toml reconcile
//! ```
//!
//! Every command prints its result as pretty JSON on stdout. Logs go to
//! stderr and follow `RUST_LOG`.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clubhouse_core::{
  badge::NewBadge,
  mission::NewMissionDefinition,
  session::SessionStatus,
  wallet::TransactionType,
};
use clubhouse_engine::Engine;
use clubhouse_store_sqlite::SqliteStore;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use settings::CliConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clubhouse", version, about = "Clubhouse reward engine operator tool")]
struct Args {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run missions, badges and rewards for an ended session.
  ProcessSession { session_id: Uuid },
  /// Change a session's status. Ending it runs the reward pipeline.
  SetSessionStatus {
    session_id: Uuid,
    status:     SessionStatus,
  },
  /// Cancel a session and notify its manager and players.
  CancelSession { session_id: Uuid },
  /// Credit rewards that were earned but never reached the ledger.
  Reconcile,
  #[command(subcommand)]
  Wallet(WalletCommand),
  #[command(subcommand)]
  Mission(MissionCommand),
  #[command(subcommand)]
  Badge(BadgeCommand),
  #[command(subcommand)]
  Notifications(NotificationCommand),
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
  Show {
    user_id: Uuid,
  },
  Credit {
    user_id:     Uuid,
    amount:      Decimal,
    #[arg(long, default_value = "manual_adjustment")]
    kind:        TransactionType,
    #[arg(long)]
    description: Option<String>,
  },
  Debit {
    user_id:     Uuid,
    amount:      Decimal,
    #[arg(long, default_value = "manual_adjustment")]
    kind:        TransactionType,
    #[arg(long)]
    description: Option<String>,
  },
  Lock {
    user_id: Uuid,
  },
  Unlock {
    user_id: Uuid,
  },
  /// Ledger rows, newest first.
  History {
    user_id: Uuid,
    #[arg(long, default_value_t = 0)]
    skip:    usize,
    #[arg(long, default_value_t = 50)]
    take:    usize,
  },
}

#[derive(Subcommand, Debug)]
enum MissionCommand {
  /// Create a mission definition from a JSON file.
  Create { file: PathBuf },
  /// Add an explicit amount of progress to a mission instance.
  Progress { user_mission_id: Uuid, amount: i64 },
  /// Assign a mission to a user. Missing bounds use the default window.
  Assign {
    definition_id: Uuid,
    user_id:       Uuid,
    #[arg(long)]
    start:         Option<DateTime<Utc>>,
    #[arg(long)]
    end:           Option<DateTime<Utc>>,
  },
  /// A user's mission instances ordered by period end.
  List {
    user_id: Uuid,
    #[arg(long)]
    active:  bool,
  },
}

#[derive(Subcommand, Debug)]
enum BadgeCommand {
  /// Create a badge from a JSON file.
  Create { file: PathBuf },
  Grant {
    badge_id:   Uuid,
    user_id:    Uuid,
    #[arg(long)]
    reason:     Option<String>,
    #[arg(long)]
    granted_by: Option<Uuid>,
  },
  Revoke {
    grant_id: Uuid,
    #[arg(long)]
    reason:   Option<String>,
  },
  /// A user's badges, newest first.
  List {
    user_id:         Uuid,
    #[arg(long)]
    include_revoked: bool,
  },
}

#[derive(Subcommand, Debug)]
enum NotificationCommand {
  List {
    user_id: Uuid,
    #[arg(long)]
    unread:  bool,
  },
  ReadAll {
    user_id: Uuid,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let cfg = CliConfig::load(&args.config)?;

  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let engine = Engine::new(Arc::new(store), cfg.engine());

  run(&engine, args.command).await
}

async fn run(engine: &Engine<SqliteStore>, command: Command) -> Result<()> {
  match command {
    Command::ProcessSession { session_id } => print(
      &engine
        .process_session_completed(session_id)
        .await
        .context("failed to process session")?,
    ),
    Command::SetSessionStatus { session_id, status } => print(
      &engine
        .change_session_status(session_id, status)
        .await
        .context("failed to change session status")?,
    ),
    Command::CancelSession { session_id } => print(
      &engine
        .cancel_session(session_id)
        .await
        .context("failed to cancel session")?,
    ),
    Command::Reconcile => print(
      &engine
        .reconcile_rewards()
        .await
        .context("failed to reconcile rewards")?,
    ),
    Command::Wallet(cmd) => run_wallet(engine, cmd).await,
    Command::Mission(cmd) => run_mission(engine, cmd).await,
    Command::Badge(cmd) => run_badge(engine, cmd).await,
    Command::Notifications(cmd) => run_notifications(engine, cmd).await,
  }
}

async fn run_wallet(engine: &Engine<SqliteStore>, command: WalletCommand) -> Result<()> {
  match command {
    WalletCommand::Show { user_id } => print(
      &engine
        .get_wallet(user_id)
        .await
        .context("failed to load wallet")?,
    ),
    WalletCommand::Credit {
      user_id,
      amount,
      kind,
      description,
    } => print(
      &engine
        .credit(user_id, amount, kind, description)
        .await
        .context("credit rejected")?,
    ),
    WalletCommand::Debit {
      user_id,
      amount,
      kind,
      description,
    } => print(
      &engine
        .debit(user_id, amount, kind, description)
        .await
        .context("debit rejected")?,
    ),
    WalletCommand::Lock { user_id } => print(
      &engine
        .set_wallet_locked(user_id, true)
        .await
        .context("failed to lock wallet")?,
    ),
    WalletCommand::Unlock { user_id } => print(
      &engine
        .set_wallet_locked(user_id, false)
        .await
        .context("failed to unlock wallet")?,
    ),
    WalletCommand::History {
      user_id,
      skip,
      take,
    } => print(
      &engine
        .list_transactions(user_id, skip, take)
        .await
        .context("failed to load transactions")?,
    ),
  }
}

async fn run_mission(engine: &Engine<SqliteStore>, command: MissionCommand) -> Result<()> {
  match command {
    MissionCommand::Create { file } => {
      let input: NewMissionDefinition = read_json(&file)?;
      print(
        &engine
          .create_mission_definition(input)
          .await
          .context("failed to create mission definition")?,
      )
    }
    MissionCommand::Progress {
      user_mission_id,
      amount,
    } => print(
      &engine
        .progress_mission(user_mission_id, amount)
        .await
        .context("progress rejected")?,
    ),
    MissionCommand::Assign {
      definition_id,
      user_id,
      start,
      end,
    } => print(
      &engine
        .assign_mission(definition_id, user_id, start, end)
        .await
        .context("assignment rejected")?,
    ),
    MissionCommand::List { user_id, active } => print(
      &engine
        .list_user_missions(user_id, active)
        .await
        .context("failed to list missions")?,
    ),
  }
}

async fn run_badge(engine: &Engine<SqliteStore>, command: BadgeCommand) -> Result<()> {
  match command {
    BadgeCommand::Create { file } => {
      let input: NewBadge = read_json(&file)?;
      print(
        &engine
          .create_badge(input)
          .await
          .context("failed to create badge")?,
      )
    }
    BadgeCommand::Grant {
      badge_id,
      user_id,
      reason,
      granted_by,
    } => print(
      &engine
        .grant_badge(badge_id, user_id, reason, granted_by)
        .await
        .context("grant rejected")?,
    ),
    BadgeCommand::Revoke { grant_id, reason } => print(
      &engine
        .revoke_badge(grant_id, reason)
        .await
        .context("revoke rejected")?,
    ),
    BadgeCommand::List {
      user_id,
      include_revoked,
    } => print(
      &engine
        .list_user_badges(user_id, include_revoked)
        .await
        .context("failed to list badges")?,
    ),
  }
}

async fn run_notifications(
  engine: &Engine<SqliteStore>,
  command: NotificationCommand,
) -> Result<()> {
  match command {
    NotificationCommand::List { user_id, unread } => print(
      &engine
        .list_notifications(user_id, unread)
        .await
        .context("failed to list notifications")?,
    ),
    NotificationCommand::ReadAll { user_id } => {
      let changed = engine
        .mark_all_notifications_read(user_id)
        .await
        .context("failed to mark notifications read")?;
      print(&serde_json::json!({ "marked_read": changed }))
    }
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn print<T: Serialize>(value: &T) -> Result<()> {
  let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
  println!("{json}");
  Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
