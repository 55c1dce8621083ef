//! Runtime configuration, deserialised from `config.toml` plus `ROADHIRE__*`
//! environment overrides.

use std::{path::PathBuf, time::Duration};

use roadhire_blob::BlobConfig;
use serde::Deserialize;

/// Bounds on the submission transaction.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
  /// How long to wait for the transaction slot before giving up.
  pub max_wait_ms: u64,
  /// Wall-clock budget for everything between `BEGIN` and `COMMIT`,
  /// uploads included.
  pub timeout_ms:  u64,
}

impl Default for TransactionConfig {
  fn default() -> Self { Self { max_wait_ms: 5_000, timeout_ms: 30_000 } }
}

impl TransactionConfig {
  pub fn max_wait(&self) -> Duration { Duration::from_millis(self.max_wait_ms) }

  pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_max_upload_bytes() -> usize { 25 * 1024 * 1024 }

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Limit on the whole multipart submission body.
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes:    usize,
  /// 64 hex characters; see `--generate-key`.
  pub ssn_key_hex:         String,
  pub admin_username:      String,
  /// PHC string produced by argon2; see `--hash-password`.
  pub admin_password_hash: String,
  #[serde(default)]
  pub transaction:         TransactionConfig,
  #[serde(default)]
  pub blob:                BlobConfig,
}
