//! [`BlobStore`] backends for uploaded documents and signatures.
//!
//! - [`FsBlobStore`] writes content-addressed files under a directory.
//! - [`HttpBlobStore`] forwards files to an HTTP media service.
//! - [`MemoryBlobStore`] keeps uploads in memory and can be told to fail.
//!
//! [`AnyBlobStore`] picks one from configuration.

mod fs;
mod http;
mod memory;

pub mod error;

use serde::Deserialize;

use roadhire_core::blob::{BlobStore, StoredBlob, UploadRequest};

pub use error::{Error, Result};
pub use fs::FsBlobStore;
pub use http::HttpBlobStore;
pub use memory::{MemoryBlobStore, RecordedUpload};

/// Which backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
  #[default]
  Fs,
  Http,
  Memory,
}

/// Blob storage settings, as read from the `[blob]` config table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
  pub kind:            BlobKind,
  /// Directory for the `fs` backend.
  pub root:            String,
  /// URL prefix under which `root` is served.
  pub public_base_url: String,
  /// Upload URL for the `http` backend.
  pub endpoint:        Option<String>,
  pub api_key:         Option<String>,
}

impl Default for BlobConfig {
  fn default() -> Self {
    Self {
      kind:            BlobKind::Fs,
      root:            "uploads".to_owned(),
      public_base_url: "/uploads".to_owned(),
      endpoint:        None,
      api_key:         None,
    }
  }
}

/// One of the concrete backends, chosen at startup.
#[derive(Clone)]
pub enum AnyBlobStore {
  Fs(FsBlobStore),
  Http(HttpBlobStore),
  Memory(MemoryBlobStore),
}

impl AnyBlobStore {
  pub fn from_config(config: &BlobConfig) -> Result<Self> {
    Ok(match config.kind {
      BlobKind::Fs => {
        Self::Fs(FsBlobStore::new(&config.root, &config.public_base_url))
      }
      BlobKind::Http => {
        let endpoint = config
          .endpoint
          .clone()
          .ok_or_else(|| Error::Config("blob.endpoint is required for kind = \"http\"".into()))?;
        Self::Http(HttpBlobStore::new(endpoint, config.api_key.clone())?)
      }
      BlobKind::Memory => Self::Memory(MemoryBlobStore::new()),
    })
  }
}

impl BlobStore for AnyBlobStore {
  type Error = Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob> {
    match self {
      Self::Fs(s) => s.upload(request).await,
      Self::Http(s) => s.upload(request).await,
      Self::Memory(s) => s.upload(request).await,
    }
  }
}

/// File extension for a stored object: declared MIME type first, then the
/// original file name.
pub(crate) fn extension_for(request: &UploadRequest) -> String {
  let from_mime = request
    .content_type
    .as_deref()
    .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
    .and_then(|ct| match ct.as_str() {
      "application/pdf" => Some("pdf"),
      "image/png" => Some("png"),
      "image/jpeg" | "image/jpg" => Some("jpg"),
      "image/svg+xml" => Some("svg"),
      "image/webp" => Some("webp"),
      "image/heic" => Some("heic"),
      _ => None,
    });
  if let Some(ext) = from_mime {
    return ext.to_owned();
  }

  request
    .file_name
    .as_deref()
    .and_then(|name| name.rsplit_once('.'))
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    .unwrap_or_else(|| "bin".to_owned())
}
