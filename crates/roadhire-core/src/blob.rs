//! The `BlobStore` trait: opaque object storage for uploaded documents.
//!
//! Implementations live in `roadhire-blob`. Retry policy, CDN behaviour and
//! how a [`ResourceClass`] maps onto storage tiers are the implementation's
//! business; callers only see a URL and a storage id.

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage class a file is routed to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceClass {
  /// Photos and rendered signatures.
  Image,
  /// Documents (PDF) stored byte-for-byte.
  Raw,
}

impl ResourceClass {
  /// PDFs (by declared MIME type or `.pdf` extension) are raw documents;
  /// everything else is treated as an image.
  pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Self {
    let pdf_mime = content_type
      .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/pdf"))
      .unwrap_or(false);
    let pdf_ext = file_name
      .map(|name| name.trim().to_ascii_lowercase().ends_with(".pdf"))
      .unwrap_or(false);

    if pdf_mime || pdf_ext { Self::Raw } else { Self::Image }
  }
}

/// A file to store on behalf of one application.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub bytes:          Bytes,
  pub application_id: Uuid,
  /// Which slot the file fills, e.g. `license-front` or `consent-psp`.
  pub label:          String,
  pub class:          ResourceClass,
  pub content_type:   Option<String>,
  pub file_name:      Option<String>,
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
  pub url:       String,
  /// Storage-side identifier, needed to delete or re-sign the file later.
  pub public_id: String,
}

pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upload(
    &self,
    request: UploadRequest,
  ) -> impl Future<Output = Result<StoredBlob, Self::Error>> + Send + '_;
}
