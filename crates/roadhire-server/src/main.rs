//! roadhire-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `ROADHIRE__*`
//! environment overrides, opens the SQLite store and blob backend, and
//! serves the submission and admin API over HTTP.
//!
//! # Secrets
//!
//! ```text
//! roadhire-server --hash-password   # argon2 PHC string for admin_password_hash
//! roadhire-server --generate-key    # 64 hex characters for ssn_key_hex
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use roadhire_blob::AnyBlobStore;
use roadhire_core::crypto::{AdminCredentials, SsnCipher};
use roadhire_server::{AppState, ApplicationService, ServerConfig};
use roadhire_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Driver application server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", env = "ROADHIRE_CONFIG")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Print a fresh SSN encryption key and exit.
  #[arg(long, conflicts_with = "hash_password")]
  generate_key: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  if cli.generate_key {
    println!("{}", SsnCipher::generate_key_hex());
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROADHIRE").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let cipher = SsnCipher::from_hex(&server_cfg.ssn_key_hex)
    .context("ssn_key_hex is not a valid 32-byte hex key")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let blobs = AnyBlobStore::from_config(&server_cfg.blob)
    .context("failed to configure blob storage")?;

  let service = ApplicationService::new(
    Arc::new(store),
    Arc::new(blobs),
    Arc::new(cipher),
    server_cfg.transaction,
  );

  let state = AppState {
    service:          Arc::new(service),
    admin:            Arc::new(AdminCredentials {
      username:      server_cfg.admin_username.clone(),
      password_hash: server_cfg.admin_password_hash.clone(),
    }),
    max_upload_bytes: server_cfg.max_upload_bytes,
  };

  let app = roadhire_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
