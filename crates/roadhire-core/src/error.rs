//! Error types for `roadhire-core`.

use thiserror::Error;

use crate::{crypto::CryptoError, dates::DateError, ssn::SsnError};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Date(#[from] DateError),

  #[error(transparent)]
  Ssn(#[from] SsnError),

  #[error(transparent)]
  Crypto(#[from] CryptoError),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
