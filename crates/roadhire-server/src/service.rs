//! `ApplicationService` turns one validated submission into a committed
//! application graph.
//!
//! Two upload groups run inside the transaction with different failure
//! policies: the license images and medical-card document are required and
//! abort the whole submission on failure; consent signatures are best-effort
//! and a failed upload only leaves that consent unsigned.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use roadhire_core::{
  application::{
    ApplicantDetails, ApplicationStatus, ConsentType, NewDriverApplication,
    NewDriverLicense, NewEmploymentRecord, NewLegalConsent, NewMedicalCard,
    NewPreviousAddress, RequestMeta,
  },
  blob::{BlobStore, ResourceClass, StoredBlob, UploadRequest},
  crypto::{CryptoError, Reauthenticated, SsnCipher},
  dates::{
    DateError, FUTURE_HORIZON_YEARS, parse_local_date, parse_optional_local_date,
    today_local, within_future_horizon,
  },
  intake::{
    LICENSE_BACK_PART, LICENSE_FRONT_PART, MEDICAL_CARD_PART, SubmissionFields,
  },
  ssn::{Ssn, SsnFields},
  store::{ApplicationStore, ApplicationTx},
  validation::ValidationErrors,
};

use crate::{config::TransactionConfig, error::BoxError};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("{0}")]
  Validation(ValidationErrors),

  #[error("invalid SSN format")]
  InvalidSsnFormat,

  #[error("invalid date of birth: {0}")]
  InvalidDateOfBirth(#[source] DateError),

  #[error("invalid license expiration: {0}")]
  InvalidLicenseExpiration(String),

  #[error("required upload {label} failed: {source}")]
  RequiredUpload {
    label:  &'static str,
    #[source]
    source: BoxError,
  },

  #[error("SSN encryption failed: {0}")]
  Crypto(#[from] CryptoError),

  #[error("transaction exceeded {0:?}")]
  TransactionTimeout(Duration),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

fn store_err(e: impl std::error::Error + Send + Sync + 'static) -> ServiceError {
  ServiceError::Store(Box::new(e))
}

fn invalid(field: String, e: DateError) -> ServiceError {
  let mut errors = ValidationErrors::new();
  errors.push(field, e.to_string());
  ServiceError::Validation(errors)
}

// ─── Inputs and outputs ──────────────────────────────────────────────────────

/// One uploaded file as received.
#[derive(Debug, Clone)]
pub struct IncomingFile {
  pub bytes:        Bytes,
  pub content_type: Option<String>,
  pub file_name:    Option<String>,
}

/// The binary parts of a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFiles {
  pub license_front: Option<IncomingFile>,
  pub license_back:  Option<IncomingFile>,
  pub medical_card:  Option<IncomingFile>,
  pub signatures:    HashMap<ConsentType, IncomingFile>,
}

impl SubmissionFiles {
  /// Store a file under its multipart part name. Returns `false` for names
  /// that are not file parts.
  pub fn insert(&mut self, part: &str, file: IncomingFile) -> bool {
    match part {
      LICENSE_FRONT_PART => self.license_front = Some(file),
      LICENSE_BACK_PART => self.license_back = Some(file),
      MEDICAL_CARD_PART => self.medical_card = Some(file),
      _ => {
        let Some(consent) = ConsentType::ALL
          .into_iter()
          .find(|c| c.signature_part() == part)
        else {
          return false;
        };
        self.signatures.insert(consent, file);
      }
    }
    true
  }

  pub fn is_file_part(part: &str) -> bool {
    matches!(part, LICENSE_FRONT_PART | LICENSE_BACK_PART | MEDICAL_CARD_PART)
      || ConsentType::ALL.iter().any(|c| c.signature_part() == part)
  }

  /// The consent's own signature, or the one it shares.
  pub fn signature_for(&self, consent: ConsentType) -> Option<&IncomingFile> {
    self
      .signatures
      .get(&consent)
      .or_else(|| self.signatures.get(&consent.signature_source()))
  }
}

/// Response body for a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApplication {
  pub id:         Uuid,
  pub status:     ApplicationStatus,
  pub created_at: DateTime<Utc>,
}

/// Everything derived from the submission before the transaction opens.
struct Normalized {
  application:        NewDriverApplication,
  license:            NewDriverLicense,
  medical_expires_at: Option<NaiveDate>,
  previous_addresses: Vec<NewPreviousAddress>,
  employment_records: Vec<NewEmploymentRecord>,
  consents:           Vec<(ConsentType, bool, NaiveDate, String)>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct ApplicationService<S, B> {
  store:  Arc<S>,
  blobs:  Arc<B>,
  cipher: Arc<SsnCipher>,
  config: TransactionConfig,
}

impl<S, B> ApplicationService<S, B>
where
  S: ApplicationStore,
  B: BlobStore,
{
  pub fn new(
    store: Arc<S>,
    blobs: Arc<B>,
    cipher: Arc<SsnCipher>,
    config: TransactionConfig,
  ) -> Self {
    Self { store, blobs, cipher, config }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Validate, normalize and persist one submission.
  pub async fn create_driver_application(
    &self,
    fields: SubmissionFields,
    files: SubmissionFiles,
    meta: RequestMeta,
  ) -> Result<CreatedApplication, ServiceError> {
    let normalized = self.normalize(fields, &files, meta)?;

    let mut tx = self
      .store
      .begin(self.config.max_wait())
      .await
      .map_err(store_err)?;

    // On timeout the transaction is dropped mid-flight, which rolls it back.
    let outcome = tokio::time::timeout(self.config.timeout(), async {
      match self.write_graph(&mut tx, normalized, &files).await {
        Ok(created) => tx.commit().await.map(|()| created).map_err(store_err),
        Err(e) => {
          error!(error = %e, "driver application rolled back");
          rollback(tx).await;
          Err(e)
        }
      }
    })
    .await;

    match outcome {
      Ok(Ok(created)) => {
        info!(application_id = %created.id, "driver application created");
        Ok(created)
      }
      Ok(Err(e)) => Err(e),
      Err(_) => {
        error!(timeout = ?self.config.timeout(), "driver application timed out; rolling back");
        Err(ServiceError::TransactionTimeout(self.config.timeout()))
      }
    }
  }

  /// Steps that must succeed before anything is written: structural
  /// validation, SSN derivation and the hard-fail dates.
  fn normalize(
    &self,
    fields: SubmissionFields,
    files: &SubmissionFiles,
    meta: RequestMeta,
  ) -> Result<Normalized, ServiceError> {
    let mut errors = fields.check_structure();
    if files.license_front.is_none() {
      errors.push(LICENSE_FRONT_PART, "Upload the front of your license");
    }
    if files.license_back.is_none() {
      errors.push(LICENSE_BACK_PART, "Upload the back of your license");
    }
    errors.into_result().map_err(ServiceError::Validation)?;

    let applicant = &fields.applicant;
    let Some(applicant_type) = applicant.applicant_type else {
      let mut errors = ValidationErrors::new();
      errors.push("applicantType", "Select an applicant type");
      return Err(ServiceError::Validation(errors));
    };

    let ssn = Ssn::parse_optional(&applicant.ssn)
      .map_err(|_| ServiceError::InvalidSsnFormat)?;
    let ssn_fields = SsnFields::derive(ssn.as_ref(), &self.cipher)?;

    let today = today_local();
    let date_of_birth = parse_local_date(&applicant.date_of_birth)
      .map_err(ServiceError::InvalidDateOfBirth)?;
    let license_expires_at = parse_local_date(&fields.license.expires_at)
      .map_err(|e| ServiceError::InvalidLicenseExpiration(e.to_string()))?;
    if !within_future_horizon(license_expires_at, today) {
      return Err(ServiceError::InvalidLicenseExpiration(format!(
        "{license_expires_at} is more than {FUTURE_HORIZON_YEARS} years away"
      )));
    }

    let medical_expires_at =
      soft_medical_expiration(&applicant.medical_card_expires_at, today);

    let lived_3_years = applicant.lived_at_current_more_than_3_years == Some(true);
    let previous_addresses = if applicant.keeps_address_history() {
      fields
        .previous_addresses
        .iter()
        .enumerate()
        .map(|(i, a)| {
          a.normalize()
            .map_err(|e| invalid(format!("previousAddresses[{i}]"), e))
        })
        .collect::<Result<_, _>>()?
    } else {
      Vec::new()
    };

    let employment_records = fields
      .employment_records
      .iter()
      .enumerate()
      .map(|(i, r)| {
        r.normalize()
          .map_err(|e| invalid(format!("employmentRecords[{i}]"), e))
      })
      .collect::<Result<_, _>>()?;

    let mut consents = fields
      .legal_consents
      .iter()
      .map(|c| {
        let signed_at = c.signed_on(today).map_err(|e| {
          invalid(format!("legalConsents.{}.signedAt", c.consent_type), e)
        })?;
        Ok((c.consent_type, c.accepted, signed_at, c.form_version.clone()))
      })
      .collect::<Result<Vec<_>, ServiceError>>()?;
    consents.sort_by_key(|c| c.0);

    let owner_operator = applicant.is_owner_operator();
    let keep_truck = |value: &str| {
      let value = value.trim();
      (owner_operator && !value.is_empty()).then(|| value.to_owned())
    };

    let application = NewDriverApplication {
      applicant: ApplicantDetails {
        first_name: applicant.first_name.trim().to_owned(),
        last_name: applicant.last_name.trim().to_owned(),
        date_of_birth,
        phone: applicant.phone.trim().to_owned(),
        email: applicant.email.trim().to_owned(),
        current_address: applicant.current_address(),
        lived_at_current_more_than_3_years: lived_3_years,
        applicant_type,
        truck_year: keep_truck(&applicant.truck_year),
        truck_make: keep_truck(&applicant.truck_make),
        alcohol_drug_return_to_duty: applicant.alcohol_drug_return_to_duty,
        ssn_last4: ssn_fields.last4,
        ssn_encrypted: ssn_fields.encrypted,
      },
      meta,
    };

    let license = NewDriverLicense {
      number: fields.license.number.trim().to_owned(),
      state: fields.license.state.trim().to_ascii_uppercase(),
      class: fields.license.class.trim().to_owned(),
      expires_at: license_expires_at,
      endorsements: fields.license.endorsements.trim().to_owned(),
      held_other_licenses_last_3_years: fields.license.held_other_licenses_last_3_years
        == Some(true),
      other_licenses: fields.license.other_licenses_json(),
      front: None,
      back: None,
    };

    Ok(Normalized {
      application,
      license,
      medical_expires_at,
      previous_addresses,
      employment_records,
      consents,
    })
  }

  /// Everything between `BEGIN` and `COMMIT`.
  async fn write_graph(
    &self,
    tx: &mut S::Tx,
    normalized: Normalized,
    files: &SubmissionFiles,
  ) -> Result<CreatedApplication, ServiceError> {
    let Normalized {
      application,
      mut license,
      medical_expires_at,
      previous_addresses,
      employment_records,
      consents,
    } = normalized;

    let root = tx.insert_application(application).await.map_err(store_err)?;
    let id = root.id;

    let (front, back, medical_document) = tokio::try_join!(
      self.upload_required(id, "license-front", files.license_front.as_ref()),
      self.upload_required(id, "license-back", files.license_back.as_ref()),
      self.upload_required(id, "medical-card", files.medical_card.as_ref()),
    )?;

    license.front = front;
    license.back = back;
    tx.insert_license(id, license).await.map_err(store_err)?;

    let medical_card = NewMedicalCard {
      expires_at: medical_expires_at,
      document:   medical_document,
    };
    if medical_card.is_worth_recording() {
      tx.insert_medical_card(id, medical_card)
        .await
        .map_err(store_err)?;
    }

    if !previous_addresses.is_empty() {
      tx.insert_previous_addresses(id, previous_addresses)
        .await
        .map_err(store_err)?;
    }

    tx.insert_employment_records(id, employment_records)
      .await
      .map_err(store_err)?;

    let uploads: Vec<_> = consents
      .iter()
      .map(|(consent, ..)| self.upload_signature(id, *consent, files.signature_for(*consent)))
      .collect();
    let signatures = join_all(uploads).await;

    let rows = consents
      .into_iter()
      .zip(signatures)
      .map(|((consent_type, accepted, signed_at, form_version), signature)| {
        NewLegalConsent { consent_type, accepted, signed_at, signature, form_version }
      })
      .collect();
    tx.insert_legal_consents(id, rows).await.map_err(store_err)?;

    Ok(CreatedApplication {
      id,
      status: root.status,
      created_at: root.created_at,
    })
  }

  /// A required upload: absence is fine, failure is not.
  async fn upload_required(
    &self,
    application_id: Uuid,
    label: &'static str,
    file: Option<&IncomingFile>,
  ) -> Result<Option<StoredBlob>, ServiceError> {
    let Some(file) = file else {
      return Ok(None);
    };
    self
      .blobs
      .upload(upload_request(application_id, label.to_owned(), file))
      .await
      .map(Some)
      .map_err(|e| ServiceError::RequiredUpload { label, source: Box::new(e) })
  }

  /// A best-effort upload: failures are logged and yield `None`.
  async fn upload_signature(
    &self,
    application_id: Uuid,
    consent: ConsentType,
    file: Option<&IncomingFile>,
  ) -> Option<StoredBlob> {
    let file = file?;
    match self
      .blobs
      .upload(upload_request(application_id, consent.upload_label(), file))
      .await
    {
      Ok(stored) => Some(stored),
      Err(e) => {
        warn!(
          %application_id,
          consent = %consent,
          error = %e,
          "signature upload failed; storing consent without signature"
        );
        None
      }
    }
  }

  /// Decrypt an applicant's full SSN for a re-authenticated admin.
  ///
  /// `Ok(None)` if the application does not exist or carries no SSN.
  pub async fn reveal_ssn(
    &self,
    id: Uuid,
    proof: &Reauthenticated,
  ) -> Result<Option<Ssn>, ServiceError> {
    let Some(record) = self.store.get_application(id).await.map_err(store_err)?
    else {
      return Ok(None);
    };
    let Some(ciphertext) = record.application.applicant.ssn_encrypted else {
      return Ok(None);
    };
    info!(application_id = %id, admin = proof.username(), "SSN revealed");
    Ok(Some(self.cipher.decrypt(&ciphertext, proof)?))
  }
}

async fn rollback<T: ApplicationTx>(tx: T) {
  if let Err(e) = tx.rollback().await {
    error!(error = %e, "rollback failed");
  }
}

fn upload_request(application_id: Uuid, label: String, file: &IncomingFile) -> UploadRequest {
  UploadRequest {
    bytes: file.bytes.clone(),
    application_id,
    label,
    class: ResourceClass::detect(file.content_type.as_deref(), file.file_name.as_deref()),
    content_type: file.content_type.clone(),
    file_name: file.file_name.clone(),
  }
}

/// The medical-card expiration is optional: anything unparsable or beyond the
/// plausibility horizon is dropped with a warning instead of failing the
/// submission.
fn soft_medical_expiration(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
  match parse_optional_local_date(raw) {
    Ok(Some(date)) if within_future_horizon(date, today) => Some(date),
    Ok(Some(date)) => {
      warn!(expires_at = %date, "dropping implausible medical card expiration");
      None
    }
    Ok(None) => None,
    Err(e) => {
      warn!(error = %e, "dropping unparsable medical card expiration");
      None
    }
  }
}

#[cfg(test)]
mod tests;
