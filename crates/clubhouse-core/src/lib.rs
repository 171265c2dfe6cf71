//! Core types and trait definitions for the Clubhouse reward engine.
//!
//! This crate is deliberately free of database and runtime dependencies.
//! All other crates depend on it.

pub mod badge;
pub mod condition;
pub mod error;
pub mod metrics;
pub mod mission;
pub mod notification;
pub mod session;
pub mod store;
pub mod wallet;

pub use error::{Error, ErrorKind, Result};
