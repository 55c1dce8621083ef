//! [`FsBlobStore`] stores content-addressed files on local disk.
//!
//! Objects land at `{root}/{application_id}/{label}-{digest}.{ext}`, where
//! `digest` is the first 16 hex characters of the SHA-256 of the bytes.
//! Identical content for the same slot therefore maps to the same file.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use roadhire_core::blob::{BlobStore, StoredBlob, UploadRequest};

use crate::{Result, extension_for};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
  root:            PathBuf,
  public_base_url: String,
}

impl FsBlobStore {
  pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
    Self {
      root:            root.into(),
      public_base_url: public_base_url.trim_end_matches('/').to_owned(),
    }
  }
}

/// Keep labels safe to use as a file-name component.
fn sanitize_label(label: &str) -> String {
  let cleaned: String = label
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '-' })
    .collect();
  if cleaned.is_empty() { "file".to_owned() } else { cleaned }
}

impl BlobStore for FsBlobStore {
  type Error = crate::Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob> {
    let digest = hex::encode(Sha256::digest(&request.bytes));
    let file_name = format!(
      "{}-{}.{}",
      sanitize_label(&request.label),
      &digest[..16],
      extension_for(&request)
    );
    let dir_name = request.application_id.hyphenated().to_string();

    let dir = self.root.join(&dir_name);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &request.bytes).await?;

    debug!(
      path = %path.display(),
      bytes = request.bytes.len(),
      class = request.class.as_ref(),
      "stored upload"
    );

    let public_id = format!("{dir_name}/{file_name}");
    Ok(StoredBlob {
      url: format!("{}/{public_id}", self.public_base_url),
      public_id,
    })
  }
}
