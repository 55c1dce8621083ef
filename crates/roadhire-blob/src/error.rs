//! Error type for `roadhire-blob`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("media service rejected upload ({status}): {body}")]
  Rejected { status: u16, body: String },

  #[error("invalid blob configuration: {0}")]
  Config(String),

  /// Raised by [`crate::MemoryBlobStore`] for labels it was told to fail.
  #[error("upload of {0} failed")]
  Injected(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
