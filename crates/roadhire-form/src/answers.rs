//! What the applicant has entered so far.
//!
//! [`FormAnswers`] is everything that survives a reload. [`FormFiles`] holds
//! the attachments and signature images, which are never persisted.

use std::{collections::HashMap, path::Path};

use bytes::Bytes;
use roadhire_core::{
  application::ConsentType,
  intake::{SubmissionFields, blank_consents},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormAnswers {
  pub fields:                        SubmissionFields,
  /// Name printed on the PSP disclosure.
  pub psp_full_name:                 String,
  /// Name printed on the alcohol and drug release.
  pub alcohol_drug_form_name:        String,
  pub psp_full_name_edited:          bool,
  pub alcohol_drug_form_name_edited: bool,
}

impl Default for FormAnswers {
  fn default() -> Self {
    Self {
      fields:                        SubmissionFields {
        legal_consents: blank_consents(),
        ..Default::default()
      },
      psp_full_name:                 String::new(),
      alcohol_drug_form_name:        String::new(),
      psp_full_name_edited:          false,
      alcohol_drug_form_name_edited: false,
    }
  }
}

impl FormAnswers {
  /// `FIRST LAST`, upper-cased.
  pub fn derived_full_name(&self) -> String {
    let applicant = &self.fields.applicant;
    format!("{} {}", applicant.first_name.trim(), applicant.last_name.trim())
      .trim()
      .to_uppercase()
  }

  /// Fill the printed-name fields from the applicant's name unless the
  /// applicant typed their own.
  pub fn fill_printed_names(&mut self) {
    let name = self.derived_full_name();
    if !self.psp_full_name_edited {
      self.psp_full_name = name.clone();
    }
    if !self.alcohol_drug_form_name_edited {
      self.alcohol_drug_form_name = name;
    }
  }

  pub fn set_psp_full_name(&mut self, name: impl Into<String>) {
    self.psp_full_name = name.into();
    self.psp_full_name_edited = true;
  }

  pub fn set_alcohol_drug_form_name(&mut self, name: impl Into<String>) {
    self.alcohol_drug_form_name = name.into();
    self.alcohol_drug_form_name_edited = true;
  }

  /// Mark one consent accepted or declined.
  pub fn set_accepted(&mut self, consent_type: ConsentType, accepted: bool) {
    if let Some(consent) = self
      .fields
      .legal_consents
      .iter_mut()
      .find(|c| c.consent_type == consent_type)
    {
      consent.accepted = accepted;
    }
  }
}

/// A file chosen by the applicant, or a rendered signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
  pub bytes:        Bytes,
  pub content_type: String,
  pub file_name:    String,
}

impl Attachment {
  pub fn new(
    bytes: impl Into<Bytes>,
    content_type: impl Into<String>,
    file_name: impl Into<String>,
  ) -> Self {
    Self {
      bytes:        bytes.into(),
      content_type: content_type.into(),
      file_name:    file_name.into(),
    }
  }

  /// Read a file from disk, guessing its type from the extension.
  pub async fn read(path: &Path) -> std::io::Result<Self> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "upload".to_owned());
    Ok(Self::new(bytes, content_type_for(&file_name), file_name))
  }

  pub fn len(&self) -> usize { self.bytes.len() }

  pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
}

fn content_type_for(file_name: &str) -> &'static str {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "pdf" => "application/pdf",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "heic" => "image/heic",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    _ => "application/octet-stream",
  }
}

/// Attachments and signatures. Lost on reload.
#[derive(Debug, Clone, Default)]
pub struct FormFiles {
  pub license_front: Option<Attachment>,
  pub license_back:  Option<Attachment>,
  pub medical_card:  Option<Attachment>,
  /// Keyed by the signable consents only.
  pub signatures:    HashMap<ConsentType, Attachment>,
}

impl FormFiles {
  pub fn has_signature(&self, consent: ConsentType) -> bool {
    self
      .signatures
      .get(&consent)
      .is_some_and(|image| !image.is_empty())
  }
}
