//! Error type for draft persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("draft I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("draft is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
