//! The Clubhouse achievement and reward engine.
//!
//! [`Engine`] is generic over any [`LoyaltyStore`]. It turns a finished game
//! session into mission progress, badge grants, wallet rewards and
//! notifications, and exposes the administrative operations around them.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let store = Arc::new(SqliteStore::open("clubhouse.db").await?);
//! let engine = Engine::new(store, EngineConfig::default());
//! let report = engine.process_session_completed(session_id).await?;
//! ```

pub mod config;
pub mod error;

mod badges;
mod metrics;
mod missions;
mod notify;
mod reconcile;
mod rewards;
mod sessions;
mod wallet;

use std::sync::Arc;

use clubhouse_core::store::LoyaltyStore;

pub use config::{EngineConfig, LedgerConfig, MissionConfig};
pub use error::{Error, Result};
pub use reconcile::ReconcileReport;
pub use rewards::{RewardRequest, RewardSource};
pub use sessions::{SessionReport, StatusChange};

/// The reward engine. Cloning is cheap; the store is shared.
pub struct Engine<S> {
  store:  Arc<S>,
  config: EngineConfig,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: self.config.clone(),
    }
  }
}

impl<S: LoyaltyStore> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self { Self { store, config } }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }
}
