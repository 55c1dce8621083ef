//! [`HttpBlobStore`] forwards uploads to an HTTP media service.
//!
//! Each file is POSTed as `multipart/form-data` with the parts `file`,
//! `applicationId`, `label` and `resourceType` (`image` or `raw`). The
//! service answers with `{"url": ..., "publicId": ...}`.

use std::time::Duration;

use reqwest::{
  Client,
  multipart::{Form, Part},
};
use tracing::debug;

use roadhire_core::blob::{BlobStore, StoredBlob, UploadRequest};

use crate::{Error, Result, extension_for};

#[derive(Debug, Clone)]
pub struct HttpBlobStore {
  client:   Client,
  endpoint: String,
  api_key:  Option<String>,
}

impl HttpBlobStore {
  pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
    Ok(Self { client, endpoint, api_key })
  }

  fn form(request: UploadRequest) -> Result<Form> {
    let file_name = request
      .file_name
      .clone()
      .unwrap_or_else(|| format!("{}.{}", request.label, extension_for(&request)));

    let mut part = Part::bytes(request.bytes.to_vec()).file_name(file_name);
    if let Some(ct) = &request.content_type {
      part = part.mime_str(ct)?;
    }

    Ok(
      Form::new()
        .part("file", part)
        .text("applicationId", request.application_id.to_string())
        .text("label", request.label)
        .text("resourceType", request.class.as_ref().to_owned()),
    )
  }
}

impl BlobStore for HttpBlobStore {
  type Error = Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob> {
    let label = request.label.clone();
    let mut req = self.client.post(&self.endpoint).multipart(Self::form(request)?);
    if let Some(key) = &self.api_key {
      req = req.bearer_auth(key);
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Rejected { status: status.as_u16(), body });
    }

    let stored: StoredBlob = resp.json().await?;
    debug!(label = %label, public_id = %stored.public_id, "media service stored upload");
    Ok(stored)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use axum::{
    Json, Router,
    extract::Multipart,
    http::{HeaderMap, StatusCode, header},
    routing::post,
  };
  use bytes::Bytes;
  use roadhire_core::blob::ResourceClass;
  use serde_json::{Value, json};
  use tokio::net::TcpListener;
  use uuid::Uuid;

  use super::*;

  /// Echoes the multipart parts back as a stored location.
  async fn store_upload(
    headers: HeaderMap,
    mut multipart: Multipart,
  ) -> Result<Json<Value>, StatusCode> {
    let authorized = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      == Some("Bearer media-key");
    if !authorized {
      return Err(StatusCode::UNAUTHORIZED);
    }

    let mut parts = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
      let name = field.name().unwrap_or_default().to_owned();
      let file_name = field.file_name().map(str::to_owned);
      let value = match file_name {
        Some(file_name) => file_name,
        None => field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
      };
      parts.insert(name, value);
    }

    Ok(Json(json!({
      "url": format!("https://media.test/{}/{}", parts["resourceType"], parts["file"]),
      "publicId": format!("{}/{}", parts["applicationId"], parts["label"]),
    })))
  }

  async fn busy() -> (StatusCode, &'static str) { (StatusCode::SERVICE_UNAVAILABLE, "busy") }

  async fn serve() -> String {
    let app = Router::new()
      .route("/upload", post(store_upload))
      .route("/busy", post(busy));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }

  fn medical_card(application_id: Uuid) -> UploadRequest {
    UploadRequest {
      bytes: Bytes::from_static(b"%PDF-1.7"),
      application_id,
      label: "medical-card".into(),
      class: ResourceClass::Raw,
      content_type: Some("application/pdf".into()),
      file_name: None,
    }
  }

  #[tokio::test]
  async fn upload_returns_the_service_location() {
    let base = serve().await;
    let store = HttpBlobStore::new(format!("{base}/upload"), Some("media-key".into())).unwrap();
    let id = Uuid::new_v4();

    let stored = store.upload(medical_card(id)).await.unwrap();
    assert_eq!(stored.url, "https://media.test/raw/medical-card.pdf");
    assert_eq!(stored.public_id, format!("{id}/medical-card"));
  }

  #[tokio::test]
  async fn non_success_status_is_rejected() {
    let base = serve().await;

    let store = HttpBlobStore::new(format!("{base}/busy"), None).unwrap();
    let err = store.upload(medical_card(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 503, ref body } if body == "busy"));

    let store = HttpBlobStore::new(format!("{base}/upload"), None).unwrap();
    let err = store.upload(medical_card(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 401, .. }));
  }
}
