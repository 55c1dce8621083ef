//! `roadhire-apply`: fill in and submit a driver application from the
//! terminal.
//!
//! # Usage
//!
//! ```text
//! roadhire-apply --answers answers.toml \
//!   --license-front front.jpg --license-back back.jpg \
//!   --sign-as "Dana Reyes" --accept
//! ```
//!
//! Progress is kept in a draft between runs, so a run that stops on a step
//! with problems can be resumed after fixing the answers.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use roadhire_core::application::ConsentType;
use roadhire_form::{
  answers::{Attachment, FormAnswers},
  draft::{DraftStore, FileDraftStore},
  signature::{SignatureMode, SignaturePad},
  submit::ApplicationClient,
  wizard::{AttemptError, Wizard},
};
use serde::Deserialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "roadhire-apply", about = "Submit a driver application")]
struct Args {
  /// Path to a TOML config file (server_url, draft_dir).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the application server (default: http://localhost:8080).
  #[arg(long, env = "ROADHIRE_URL")]
  server_url: Option<String>,

  /// Where the in-progress draft is kept (default: ~/.roadhire).
  #[arg(long, env = "ROADHIRE_DRAFT_DIR")]
  draft_dir: Option<PathBuf>,

  /// TOML file with the applicant's answers. Replaces the stored draft.
  #[arg(short, long, value_name = "FILE")]
  answers: Option<PathBuf>,

  #[arg(long, value_name = "FILE")]
  license_front: Option<PathBuf>,

  #[arg(long, value_name = "FILE")]
  license_back: Option<PathBuf>,

  /// Medical examiner's certificate (optional).
  #[arg(long, value_name = "FILE")]
  medical_card: Option<PathBuf>,

  /// Sign every disclosure with this typed name.
  #[arg(long, value_name = "NAME")]
  sign_as: Option<String>,

  /// Accept all six disclosures.
  #[arg(long)]
  accept: bool,

  /// Throw away any stored draft before starting.
  #[arg(long)]
  discard_draft: bool,
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  server_url: String,
  #[serde(default)]
  draft_dir:  Option<PathBuf>,
}

fn default_draft_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_default()
    .join(".roadhire")
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let server_url = args
    .server_url
    .clone()
    .or_else(|| (!file_cfg.server_url.is_empty()).then(|| file_cfg.server_url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let draft_dir = args
    .draft_dir
    .clone()
    .or(file_cfg.draft_dir)
    .unwrap_or_else(default_draft_dir);

  let store = Arc::new(FileDraftStore::new(&draft_dir));
  if args.discard_draft {
    store.purge().await.context("discarding draft")?;
  }
  let mut wizard = Wizard::restore(store).await;

  if let Some(path) = &args.answers {
    let answers = load_answers(path)?;
    wizard.update(|current| *current = answers);
  }
  if args.accept {
    wizard.update(|answers| {
      for consent in ConsentType::ALL {
        answers.set_accepted(consent, true);
      }
    });
  }
  attach_files(&mut wizard, &args).await?;
  if let Some(name) = &args.sign_as {
    sign_all(&mut wizard, name);
  }

  if let Some(code) = walk(&mut wizard).await {
    return Ok(code);
  }

  let payload = match wizard.submit_attempt() {
    Ok(payload) => payload,
    Err(AttemptError::Incomplete(report)) => {
      eprint!("{report}");
      wizard.flush().await;
      return Ok(ExitCode::FAILURE);
    }
    Err(e) => return Err(e.into()),
  };

  let client = ApplicationClient::new(&server_url).context("failed to build HTTP client")?;
  match client.submit(payload).await {
    Ok(created) => {
      info!(id = %created.id, "submitted");
      println!("Application {} received ({})", created.id, created.status);
      wizard.complete().await;
      Ok(ExitCode::SUCCESS)
    }
    Err(e) => {
      eprintln!("{e}");
      wizard.flush().await;
      Ok(ExitCode::FAILURE)
    }
  }
}

fn load_answers(path: &std::path::Path) -> Result<FormAnswers> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading answers file {}", path.display()))?;
  toml::from_str(&raw).context("parsing answers file")
}

async fn attach_files<D: DraftStore>(wizard: &mut Wizard<D>, args: &Args) -> Result<()> {
  let read = |path: &PathBuf| {
    let path = path.clone();
    async move {
      Attachment::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))
    }
  };

  if let Some(path) = &args.license_front {
    let file = read(path).await?;
    wizard.update_files(|files| files.license_front = Some(file));
  }
  if let Some(path) = &args.license_back {
    let file = read(path).await?;
    wizard.update_files(|files| files.license_back = Some(file));
  }
  if let Some(path) = &args.medical_card {
    let file = read(path).await?;
    wizard.update_files(|files| files.medical_card = Some(file));
  }
  Ok(())
}

fn sign_all<D: DraftStore>(wizard: &mut Wizard<D>, name: &str) {
  for consent in ConsentType::SIGNABLE {
    let mut pad = SignaturePad::new(consent);
    pad.set_mode(SignatureMode::Typed);
    pad.set_typed(name);
    let image = pad.flush().cloned();
    wizard.set_signature(consent, image);
  }
}

/// Advance to the review step. Returns an exit code when a step is rejected.
async fn walk<D: DraftStore>(wizard: &mut Wizard<D>) -> Option<ExitCode> {
  while wizard.step().next().is_some() {
    let step = wizard.step();
    if let Err(errors) = wizard.next() {
      eprintln!("Step {step}:");
      for e in errors.iter() {
        eprintln!("  {}: {}", e.field, e.message);
      }
      wizard.flush().await;
      return Some(ExitCode::FAILURE);
    }
    println!("✓ {step}");
  }
  None
}
