//! Error type for `clubhouse-engine`.

use clubhouse_core::{ErrorKind, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A business rule rejected the request, or a referenced record is missing.
  #[error(transparent)]
  Domain(#[from] clubhouse_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Lift a backend error, keeping any domain error it carries visible.
  pub fn store<E: StoreError>(e: E) -> Self {
    match e.domain() {
      Some(domain) => Self::Domain(domain.clone()),
      None => Self::Store(Box::new(e)),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Domain(e) => e.kind(),
      Self::Store(_) => ErrorKind::Storage,
    }
  }

  pub fn domain(&self) -> Option<&clubhouse_core::Error> {
    match self {
      Self::Domain(e) => Some(e),
      Self::Store(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
