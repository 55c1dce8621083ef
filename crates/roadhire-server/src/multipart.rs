//! Decoding a `multipart/form-data` submission into
//! [`SubmissionFields`] and [`SubmissionFiles`].
//!
//! Scalar parts are applicant fields, a handful of text parts carry JSON
//! (`license`, `previousAddresses`, `employmentRecords`, `legalConsents`) and
//! the rest are files. Empty file parts are treated as absent. Unknown parts
//! are ignored.

use axum::{
  extract::{Multipart, multipart::MultipartError},
  http::{HeaderMap, StatusCode, header},
};
use roadhire_core::{
  application::RequestMeta, intake::SubmissionFields, validation::ValidationErrors,
};
use tracing::debug;

use crate::{
  error::ApiError,
  service::{IncomingFile, SubmissionFiles},
};

/// A fully read submission body.
#[derive(Debug, Default)]
pub struct Submission {
  pub fields: SubmissionFields,
  pub files:  SubmissionFiles,
}

fn multipart_error(e: MultipartError) -> ApiError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge
  } else {
    ApiError::BadRequest(e.body_text())
  }
}

/// Read every part. Malformed JSON or boolean parts are reported together as
/// field errors.
pub async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
  let mut submission = Submission::default();
  let mut errors = ValidationErrors::new();

  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    let Some(name) = field.name().map(str::to_owned) else {
      continue;
    };

    if SubmissionFiles::is_file_part(&name) {
      let content_type = field.content_type().map(str::to_owned);
      let file_name = field.file_name().map(str::to_owned);
      let bytes = field.bytes().await.map_err(multipart_error)?;
      if bytes.is_empty() {
        continue;
      }
      submission
        .files
        .insert(&name, IncomingFile { bytes, content_type, file_name });
      continue;
    }

    let value = field.text().await.map_err(multipart_error)?;
    let applied = match submission.fields.apply_json_part(&name, &value) {
      Ok(false) => submission.fields.applicant.apply_part(&name, value),
      other => other,
    };
    match applied {
      Ok(true) => {}
      Ok(false) => debug!(part = %name, "ignoring unknown multipart part"),
      Err(e) => errors.push(e.field, e.message),
    }
  }

  errors.into_result().map_err(ApiError::Validation)?;
  Ok(submission)
}

/// Client address and user agent, as reported by the fronting proxy.
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
  let header_str = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
  };

  let submitter_ip = header_str("x-forwarded-for")
    .and_then(|v| v.split(',').next())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .or_else(|| header_str("x-real-ip"))
    .map(str::to_owned);

  RequestMeta {
    submitter_ip,
    user_agent: header_str(header::USER_AGENT.as_str()).map(str::to_owned),
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  #[test]
  fn forwarded_for_wins_over_real_ip() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
    headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static("roadhire-apply/0.1"));

    let meta = request_meta(&headers);
    assert_eq!(meta.submitter_ip.as_deref(), Some("203.0.113.9"));
    assert_eq!(meta.user_agent.as_deref(), Some("roadhire-apply/0.1"));
  }

  #[test]
  fn real_ip_is_the_fallback() {
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
    assert_eq!(request_meta(&headers).submitter_ip.as_deref(), Some("10.0.0.2"));

    assert_eq!(request_meta(&HeaderMap::new()), RequestMeta::default());
  }
}
