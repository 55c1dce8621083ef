//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Infrastructure failures are logged here with their detail and reach the
//! client only as a generic message.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use roadhire_core::validation::ValidationErrors;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::service::ServiceError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden")]
  Forbidden,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("{0}")]
  Validation(ValidationErrors),

  #[error("payload too large")]
  PayloadTooLarge,

  #[error("service unavailable")]
  Unavailable,

  #[error("internal error")]
  Internal,
}

impl ApiError {
  /// Log `source` and hide it behind a 500.
  pub fn internal(context: &str, source: impl std::fmt::Display) -> Self {
    error!(error = %source, "{context}");
    Self::Internal
  }

  pub fn store(source: impl std::fmt::Display) -> Self {
    Self::internal("store error", source)
  }
}

fn is_slot_timeout(source: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
  matches!(
    source.downcast_ref::<roadhire_store_sqlite::Error>(),
    Some(roadhire_store_sqlite::Error::SlotTimeout(_))
  )
}

impl From<ServiceError> for ApiError {
  fn from(e: ServiceError) -> Self {
    let mut fields = ValidationErrors::new();
    match e {
      ServiceError::Validation(errors) => return Self::Validation(errors),
      ServiceError::InvalidSsnFormat => fields.push("ssn", "SSN must be 9 digits"),
      ServiceError::InvalidDateOfBirth(e) => {
        fields.push("dateOfBirth", format!("Invalid date of birth: {e}"));
      }
      ServiceError::InvalidLicenseExpiration(msg) => {
        fields.push("license.expiresAt", format!("Invalid license expiration: {msg}"));
      }
      ServiceError::TransactionTimeout(d) => {
        error!(timeout = ?d, "submission transaction timed out");
        return Self::Unavailable;
      }
      ServiceError::Store(source) if is_slot_timeout(source.as_ref()) => {
        warn!(error = %source, "no transaction slot for submission");
        return Self::Unavailable;
      }
      other => return Self::internal("submission failed", other),
    }
    Self::Validation(fields)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "Authentication required" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"roadhire-admin\""),
        );
        return res;
      }
      ApiError::Forbidden => {
        (StatusCode::FORBIDDEN, json!({ "error": "Re-authentication failed" }))
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Validation(fields) => (
        StatusCode::BAD_REQUEST,
        json!({
          "error": "Some answers need attention",
          "fields": fields,
        }),
      ),
      ApiError::PayloadTooLarge => (
        StatusCode::PAYLOAD_TOO_LARGE,
        json!({ "error": "Uploaded files are too large" }),
      ),
      ApiError::Unavailable => (
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": "The service is busy; please try again" }),
      ),
      ApiError::Internal => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Something went wrong on our side" }),
      ),
    };
    (status, Json(body)).into_response()
  }
}
