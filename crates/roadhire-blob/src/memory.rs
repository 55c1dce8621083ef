//! [`MemoryBlobStore`] keeps uploads in memory.
//!
//! Used by tests and local runs without storage. Specific labels can be set
//! to fail so callers' error paths can be exercised.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
};

use bytes::Bytes;
use uuid::Uuid;

use roadhire_core::blob::{BlobStore, ResourceClass, StoredBlob, UploadRequest};

use crate::{Error, Result};

/// One upload the store accepted.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
  pub application_id: Uuid,
  pub label:          String,
  pub class:          ResourceClass,
  pub content_type:   Option<String>,
  pub bytes:          Bytes,
}

#[derive(Default)]
struct Inner {
  uploads: Vec<RecordedUpload>,
  failing: HashSet<String>,
}

/// Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryBlobStore {
  pub fn new() -> Self { Self::default() }

  /// Make every later upload with `label` fail.
  pub fn fail_label(&self, label: impl Into<String>) {
    self.lock().failing.insert(label.into());
  }

  /// Uploads accepted so far, in completion order.
  pub fn uploads(&self) -> Vec<RecordedUpload> { self.lock().uploads.clone() }

  pub fn labels(&self) -> Vec<String> {
    self.lock().uploads.iter().map(|u| u.label.clone()).collect()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl BlobStore for MemoryBlobStore {
  type Error = Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob> {
    let mut inner = self.lock();
    if inner.failing.contains(&request.label) {
      return Err(Error::Injected(request.label));
    }

    let public_id = format!("{}/{}-{}", request.application_id, request.label, inner.uploads.len());
    inner.uploads.push(RecordedUpload {
      application_id: request.application_id,
      label:          request.label,
      class:          request.class,
      content_type:   request.content_type,
      bytes:          request.bytes,
    });

    Ok(StoredBlob { url: format!("memory://{public_id}"), public_id })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(label: &str) -> UploadRequest {
    UploadRequest {
      bytes:          Bytes::from_static(b"img"),
      application_id: Uuid::nil(),
      label:          label.into(),
      class:          ResourceClass::Image,
      content_type:   Some("image/png".into()),
      file_name:      None,
    }
  }

  #[tokio::test]
  async fn records_uploads_and_injects_failures() {
    let store = MemoryBlobStore::new();
    store.fail_label("consent-mvr");

    let ok = store.upload(request("license-front")).await.unwrap();
    assert!(ok.url.starts_with("memory://"));
    assert!(matches!(
      store.upload(request("consent-mvr")).await,
      Err(Error::Injected(label)) if label == "consent-mvr"
    ));
    assert_eq!(store.labels(), vec!["license-front".to_owned()]);
  }
}
