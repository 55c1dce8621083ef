//! Turning the answers into a multipart request and sending it.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use reqwest::{
  Client, StatusCode,
  multipart::{Form, Part},
};
use roadhire_core::{
  application::{ApplicationStatus, ConsentType},
  intake::{LICENSE_BACK_PART, LICENSE_FRONT_PART, MEDICAL_CARD_PART},
  validation::FieldError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::answers::{Attachment, FormAnswers, FormFiles};

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FilePart {
  pub name:       &'static str,
  pub attachment: Attachment,
}

/// Every part of one submission, in wire order.
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
  pub text:  Vec<(&'static str, String)>,
  pub files: Vec<FilePart>,
}

impl SubmissionPayload {
  pub fn assemble(answers: &FormAnswers, files: &FormFiles) -> serde_json::Result<Self> {
    let mut fields = answers.fields.clone();
    if !fields.applicant.keeps_address_history() {
      fields.previous_addresses.clear();
    }
    let mut text = fields.applicant.to_parts();
    text.extend(fields.json_parts()?);

    let mut parts = Vec::new();
    let mut attach = |name: &'static str, file: Option<&Attachment>| {
      if let Some(file) = file.filter(|f| !f.is_empty()) {
        parts.push(FilePart { name, attachment: file.clone() });
      }
    };
    attach(LICENSE_FRONT_PART, files.license_front.as_ref());
    attach(LICENSE_BACK_PART, files.license_back.as_ref());
    attach(MEDICAL_CARD_PART, files.medical_card.as_ref());
    for consent in ConsentType::SIGNABLE {
      attach(consent.signature_part(), files.signatures.get(&consent));
    }

    Ok(Self { text, files: parts })
  }

  pub fn total_bytes(&self) -> usize {
    self.files.iter().map(|f| f.attachment.len()).sum()
  }

  pub fn into_form(self) -> reqwest::Result<Form> {
    let mut form = Form::new();
    for (name, value) in self.text {
      form = form.text(name, value);
    }
    for FilePart { name, attachment } in self.files {
      let part = Part::bytes(attachment.bytes.to_vec())
        .file_name(attachment.file_name)
        .mime_str(&attachment.content_type)?;
      form = form.part(name, part);
    }
    Ok(form)
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// The `201` body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApplication {
  pub id:         Uuid,
  pub status:     ApplicationStatus,
  pub created_at: DateTime<Utc>,
}

/// What the applicant is told when a submission fails. Server text is only
/// surfaced for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
  #[error("One of your files is too large. Upload a smaller photo or PDF and try again.")]
  FileTooLarge,

  #[error("{0}")]
  Invalid(String),

  #[error("We couldn't reach the server. Check your connection and try again.")]
  Retry,

  #[error("Something went wrong on our side. Contact support if this keeps happening.")]
  ContactSupport,

  #[error("Your application is already being submitted.")]
  InFlight,
}

#[derive(Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error:  String,
  #[serde(default)]
  fields: Vec<FieldError>,
}

/// Map a failed response to the category shown to the applicant.
pub fn classify(status: StatusCode, body: &[u8]) -> SubmitError {
  match status.as_u16() {
    413 => SubmitError::FileTooLarge,
    400 | 422 => {
      let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| {
          b.fields
            .into_iter()
            .map(|f| f.message)
            .chain(Some(b.error))
            .find(|m| !m.trim().is_empty())
        })
        .unwrap_or_else(|| "Some answers were not accepted. Review the form and try again.".to_owned());
      SubmitError::Invalid(message)
    }
    502..=504 => SubmitError::Retry,
    _ => SubmitError::ContactSupport,
  }
}

struct Busy<'a>(&'a AtomicBool);

impl Drop for Busy<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

/// Posts applications to the server, one at a time.
///
/// Clones share the in-flight flag.
#[derive(Clone)]
pub struct ApplicationClient {
  client:   Client,
  base_url: String,
  busy:     Arc<AtomicBool>,
}

impl ApplicationClient {
  pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

  pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
    Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
  }

  pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
      busy: Arc::new(AtomicBool::new(false)),
    })
  }

  fn url(&self) -> String {
    format!("{}/api/driver-applications", self.base_url.trim_end_matches('/'))
  }

  fn try_begin(&self) -> Option<Busy<'_>> {
    self
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Busy(&self.busy))
  }

  /// `POST /api/driver-applications`
  pub async fn submit(
    &self,
    payload: SubmissionPayload,
  ) -> Result<CreatedApplication, SubmitError> {
    let Some(_busy) = self.try_begin() else {
      return Err(SubmitError::InFlight);
    };

    let bytes = payload.total_bytes();
    let form = payload.into_form().map_err(|e| {
      warn!(error = %e, "failed to build multipart form");
      SubmitError::ContactSupport
    })?;

    let resp = self
      .client
      .post(self.url())
      .multipart(form)
      .send()
      .await
      .map_err(|e| {
        warn!(error = %e, "submission did not reach the server");
        SubmitError::Retry
      })?;

    let status = resp.status();
    if status == StatusCode::CREATED || status == StatusCode::OK {
      let created: CreatedApplication = resp.json().await.map_err(|e| {
        warn!(error = %e, "unreadable submission response");
        SubmitError::ContactSupport
      })?;
      info!(id = %created.id, bytes, "application submitted");
      return Ok(created);
    }

    let body = resp.bytes().await.unwrap_or_default();
    warn!(%status, "submission rejected");
    Err(classify(status, &body))
  }
}
