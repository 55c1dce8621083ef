//! Draft persistence: the in-progress answers survive a restart.
//!
//! Only the current step and [`FormAnswers`] are stored. Files and signature
//! images are not. The storage key carries a version so an incompatible
//! layout is simply not found.

use std::{
  future::Future,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{Result, answers::FormAnswers, wizard::Step};

pub const DRAFT_KEY: &str = "driver-application-draft.v1";

/// Quiet period before a change is written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
  pub step:    Step,
  pub answers: FormAnswers,
}

pub trait DraftStore: Send + Sync + 'static {
  fn load(&self) -> impl Future<Output = Result<Option<Draft>>> + Send + '_;

  fn save(&self, draft: Draft) -> impl Future<Output = Result<()>> + Send + '_;

  fn purge(&self) -> impl Future<Output = Result<()>> + Send + '_;
}

// ─── File store ──────────────────────────────────────────────────────────────

/// One JSON file named after [`DRAFT_KEY`] inside a directory.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
  path: PathBuf,
}

impl FileDraftStore {
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self { path: dir.as_ref().join(format!("{DRAFT_KEY}.json")) }
  }

  pub fn path(&self) -> &Path { &self.path }
}

impl DraftStore for FileDraftStore {
  async fn load(&self) -> Result<Option<Draft>> {
    match tokio::fs::read(&self.path).await {
      Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn save(&self, draft: Draft) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      tokio::fs::create_dir_all(dir).await?;
    }
    let raw = serde_json::to_vec_pretty(&draft)?;
    // Readers never see a partially written draft.
    let tmp = self.path.with_extension("json.tmp");
    tokio::fs::write(&tmp, raw).await?;
    tokio::fs::rename(&tmp, &self.path).await?;
    Ok(())
  }

  async fn purge(&self) -> Result<()> {
    match tokio::fs::remove_file(&self.path).await {
      Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
      _ => Ok(()),
    }
  }
}

// ─── Memory store ────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
  raw:   Option<String>,
  saves: usize,
}

/// Keeps the draft as serialized JSON, so a load behaves like a reload.
/// Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryDraftStore {
  inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryDraftStore {
  pub fn new() -> Self { Self::default() }

  /// Number of completed saves.
  pub fn saves(&self) -> usize { self.lock().saves }

  pub fn raw(&self) -> Option<String> { self.lock().raw.clone() }

  fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl DraftStore for MemoryDraftStore {
  async fn load(&self) -> Result<Option<Draft>> {
    let raw = self.lock().raw.clone();
    Ok(raw.map(|raw| serde_json::from_str(&raw)).transpose()?)
  }

  async fn save(&self, draft: Draft) -> Result<()> {
    let raw = serde_json::to_string(&draft)?;
    let mut inner = self.lock();
    inner.raw = Some(raw);
    inner.saves += 1;
    Ok(())
  }

  async fn purge(&self) -> Result<()> {
    self.lock().raw = None;
    Ok(())
  }
}

// ─── Debounced mirror ────────────────────────────────────────────────────────

/// Writes the latest draft once changes stop arriving for
/// [`SAVE_DEBOUNCE`]. Save failures are logged; the form keeps working.
pub struct DraftMirror<D> {
  store:   Arc<D>,
  pending: Option<JoinHandle<()>>,
}

impl<D: DraftStore> DraftMirror<D> {
  pub fn new(store: Arc<D>) -> Self { Self { store, pending: None } }

  pub fn store(&self) -> &Arc<D> { &self.store }

  /// Replace any pending save with `draft`, written after the quiet period.
  pub fn schedule(&mut self, draft: Draft) {
    self.cancel();
    let store = self.store.clone();
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(SAVE_DEBOUNCE).await;
      save_logged(&*store, draft).await;
    }));
  }

  /// Write `draft` now.
  pub async fn flush(&mut self, draft: Draft) {
    self.cancel();
    save_logged(&*self.store, draft).await;
  }

  /// Drop any pending save and delete the stored draft.
  pub async fn purge(&mut self) {
    self.cancel();
    if let Err(e) = self.store.purge().await {
      warn!(error = %e, "failed to purge draft");
    }
  }

  fn cancel(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.abort();
    }
  }
}

impl<D> Drop for DraftMirror<D> {
  fn drop(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.abort();
    }
  }
}

async fn save_logged<D: DraftStore>(store: &D, draft: Draft) {
  let step = draft.step;
  match store.save(draft).await {
    Ok(()) => debug!(step = step.number(), "draft saved"),
    Err(e) => warn!(error = %e, "failed to save draft"),
  }
}
