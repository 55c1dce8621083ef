//! The driver-application aggregate and its child records.
//!
//! A [`DriverApplication`] is written once, inside a single transaction,
//! together with its license, optional medical card, previous addresses,
//! employment history and exactly six legal consents. After that only admin
//! review actions touch it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blob::StoredBlob;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Review state of an application.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
  #[default]
  New,
  InReview,
  Approved,
  Rejected,
}

/// Whether the applicant drives company equipment or brings their own truck.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicantType {
  CompanyDriver,
  /// Truck year and make are required for owner-operators.
  OwnerOperator,
}

/// The six regulatory disclosures every application carries.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentType {
  Authorization,
  AlcoholDrug,
  SafetyPerformance,
  Psp,
  Clearinghouse,
  Mvr,
}

impl ConsentType {
  /// Every consent, in the fixed order used on the wire and in storage.
  pub const ALL: [ConsentType; 6] = [
    Self::Authorization,
    Self::AlcoholDrug,
    Self::SafetyPerformance,
    Self::Psp,
    Self::Clearinghouse,
    Self::Mvr,
  ];

  /// The five consents the applicant signs. Safety-performance history is
  /// covered by the PSP signature.
  pub const SIGNABLE: [ConsentType; 5] = [
    Self::Authorization,
    Self::AlcoholDrug,
    Self::Psp,
    Self::Clearinghouse,
    Self::Mvr,
  ];

  /// Name of the multipart file part carrying this consent's signature.
  pub fn signature_part(self) -> &'static str {
    match self {
      Self::Authorization => "consentAuthorization",
      Self::AlcoholDrug => "consentAlcoholDrug",
      Self::SafetyPerformance => "consentSafetyPerformance",
      Self::Psp => "consentPSP",
      Self::Clearinghouse => "consentClearinghouse",
      Self::Mvr => "consentMVR",
    }
  }

  /// The consent whose signature image stands in for this one.
  pub fn signature_source(self) -> ConsentType {
    match self {
      Self::SafetyPerformance => Self::Psp,
      other => other,
    }
  }

  /// Blob-store label, e.g. `consent-alcohol-drug`.
  pub fn upload_label(self) -> String {
    format!("consent-{}", self.as_ref().to_ascii_lowercase().replace('_', "-"))
  }
}

// ─── Value types ─────────────────────────────────────────────────────────────

/// A US mailing address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
  pub line1: String,
  pub city:  String,
  pub state: String,
  pub zip:   String,
}

/// An employer address; the country decides which state/zip rules apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentAddress {
  pub line1:   String,
  pub city:    String,
  pub state:   String,
  pub zip:     String,
  pub country: String,
}

// ─── Aggregate root ──────────────────────────────────────────────────────────

/// Applicant-supplied fields of the root row, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantDetails {
  pub first_name:                  String,
  pub last_name:                   String,
  /// Calendar date; never shifted by timezone conversion.
  pub date_of_birth:               NaiveDate,
  pub phone:                       String,
  pub email:                       String,
  pub current_address:             PostalAddress,
  pub lived_at_current_more_than_3_years: bool,
  pub applicant_type:              ApplicantType,
  pub truck_year:                  Option<String>,
  pub truck_make:                  Option<String>,
  pub alcohol_drug_return_to_duty: Option<bool>,
  pub ssn_last4:                   Option<String>,
  /// AEAD ciphertext of the full SSN; never plaintext.
  pub ssn_encrypted:               Option<String>,
}

/// Who sent the submission; captured once at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
  pub submitter_ip: Option<String>,
  pub user_agent:   Option<String>,
}

/// Input to [`crate::store::ApplicationTx::insert_application`]. The id,
/// creation time and initial status are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDriverApplication {
  pub applicant: ApplicantDetails,
  pub meta:      RequestMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverApplication {
  pub id:             Uuid,
  pub created_at:     DateTime<Utc>,
  pub status:         ApplicationStatus,
  pub internal_notes: Option<String>,
  pub reviewed_by:    Option<String>,
  pub reviewed_at:    Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub applicant:      ApplicantDetails,
  #[serde(flatten)]
  pub meta:           RequestMeta,
}

// ─── Child records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriverLicense {
  pub number:                           String,
  pub state:                            String,
  pub class:                            String,
  pub expires_at:                       NaiveDate,
  pub endorsements:                     String,
  pub held_other_licenses_last_3_years: bool,
  /// The other licenses as submitted, kept verbatim as JSON.
  pub other_licenses:                   serde_json::Value,
  pub front:                            Option<StoredBlob>,
  pub back:                             Option<StoredBlob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLicense {
  pub id:             Uuid,
  pub application_id: Uuid,
  #[serde(flatten)]
  pub details:        NewDriverLicense,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedicalCard {
  pub expires_at: Option<NaiveDate>,
  pub document:   Option<StoredBlob>,
}

impl NewMedicalCard {
  /// A medical-card row is only written when there is something to record.
  pub fn is_worth_recording(&self) -> bool {
    self.expires_at.is_some() || self.document.is_some()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalCard {
  pub id:             Uuid,
  pub application_id: Uuid,
  #[serde(flatten)]
  pub details:        NewMedicalCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreviousAddress {
  #[serde(flatten)]
  pub address:   PostalAddress,
  pub from_date: Option<NaiveDate>,
  pub to_date:   Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousAddress {
  pub id:             Uuid,
  pub application_id: Uuid,
  #[serde(flatten)]
  pub details:        NewPreviousAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmploymentRecord {
  pub employer_name:      String,
  pub employer_phone:     Option<String>,
  pub employer_email:     Option<String>,
  pub address:            EmploymentAddress,
  pub position:           String,
  /// Month granularity; always the first of the month.
  pub from_month:         NaiveDate,
  /// `None` while still employed.
  pub to_month:           Option<NaiveDate>,
  pub reason_for_leaving: String,
  pub equipment_class:    Option<String>,
  pub subject_to_fmcsr:   bool,
  pub safety_sensitive:   bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentRecord {
  pub id:             Uuid,
  pub application_id: Uuid,
  /// Position in the submitted history, starting at 0.
  pub ordinal:        u32,
  #[serde(flatten)]
  pub details:        NewEmploymentRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLegalConsent {
  pub consent_type: ConsentType,
  pub accepted:     bool,
  pub signed_at:    NaiveDate,
  /// `None` when no signature was provided or its upload failed.
  pub signature:    Option<StoredBlob>,
  pub form_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalConsent {
  pub id:             Uuid,
  pub application_id: Uuid,
  #[serde(flatten)]
  pub details:        NewLegalConsent,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// The full application graph, as shown on the admin review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverApplicationRecord {
  #[serde(flatten)]
  pub application:        DriverApplication,
  pub license:            Option<DriverLicense>,
  pub medical_card:       Option<MedicalCard>,
  pub previous_addresses: Vec<PreviousAddress>,
  pub employment_records: Vec<EmploymentRecord>,
  pub legal_consents:     Vec<LegalConsent>,
}

impl DriverApplicationRecord {
  /// Consents the applicant accepted but for which no signature image was
  /// stored. Reviewers follow these up by hand.
  pub fn unsigned_accepted_consents(&self) -> Vec<ConsentType> {
    self
      .legal_consents
      .iter()
      .filter(|c| c.details.accepted && c.details.signature.is_none())
      .map(|c| c.details.consent_type)
      .collect()
  }
}

/// One row of the admin application list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
  pub id:             Uuid,
  pub created_at:     DateTime<Utc>,
  pub status:         ApplicationStatus,
  pub first_name:     String,
  pub last_name:      String,
  pub applicant_type: ApplicantType,
  pub reviewed_at:    Option<DateTime<Utc>>,
}

/// An admin review action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewUpdate {
  pub status:         Option<ApplicationStatus>,
  /// `Some(None)` clears the notes.
  pub internal_notes: Option<Option<String>>,
  pub reviewed_by:    String,
}
