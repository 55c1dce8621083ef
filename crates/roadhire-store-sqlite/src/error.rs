//! Error type for `roadhire-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] roadhire_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// No transaction slot freed up within the caller's wait budget.
  #[error("timed out after {0:?} waiting for a transaction slot")]
  SlotTimeout(Duration),

  #[error("store is closed")]
  Closed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
