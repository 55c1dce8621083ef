//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. Enums use their SCREAMING_SNAKE_CASE wire names. UUIDs are
//! stored as hyphenated lowercase strings. A stored blob is a nullable
//! `(url, public_id)` column pair.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use roadhire_core::{
  application::{
    ApplicantDetails, ApplicationSummary, DriverApplication, DriverLicense,
    EmploymentAddress, EmploymentRecord, LegalConsent, MedicalCard,
    NewDriverLicense, NewEmploymentRecord, NewLegalConsent, NewMedicalCard,
    NewPreviousAddress, PostalAddress, PreviousAddress, RequestMeta,
  },
  blob::StoredBlob,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

/// Parse a strum-backed enum column.
pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(roadhire_core::Error::UnknownVariant { kind, value: s.to_owned() })
  })
}

pub fn split_blob(blob: Option<&StoredBlob>) -> (Option<String>, Option<String>) {
  match blob {
    Some(b) => (Some(b.url.clone()), Some(b.public_id.clone())),
    None => (None, None),
  }
}

fn join_blob(url: Option<String>, public_id: Option<String>) -> Option<StoredBlob> {
  match (url, public_id) {
    (Some(url), Some(public_id)) => Some(StoredBlob { url, public_id }),
    _ => None,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `driver_applications` row.
pub struct RawApplication {
  pub application_id: String,
  pub created_at:     String,
  pub status:         String,
  pub first_name:     String,
  pub last_name:      String,
  pub date_of_birth:  String,
  pub phone:          String,
  pub email:          String,
  pub address_line1:  String,
  pub address_city:   String,
  pub address_state:  String,
  pub address_zip:    String,
  pub lived_3_years:  bool,
  pub applicant_type: String,
  pub truck_year:     Option<String>,
  pub truck_make:     Option<String>,
  pub return_to_duty: Option<bool>,
  pub ssn_last4:      Option<String>,
  pub ssn_encrypted:  Option<String>,
  pub submitter_ip:   Option<String>,
  pub user_agent:     Option<String>,
  pub internal_notes: Option<String>,
  pub reviewed_by:    Option<String>,
  pub reviewed_at:    Option<String>,
}

impl RawApplication {
  pub const COLUMNS: &'static str = "application_id, created_at, status, \
     first_name, last_name, date_of_birth, phone, email, address_line1, \
     address_city, address_state, address_zip, \
     lived_at_current_more_than_3_years, applicant_type, truck_year, \
     truck_make, alcohol_drug_return_to_duty, ssn_last4, ssn_encrypted, \
     submitter_ip, user_agent, internal_notes, reviewed_by, reviewed_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      application_id: row.get("application_id")?,
      created_at:     row.get("created_at")?,
      status:         row.get("status")?,
      first_name:     row.get("first_name")?,
      last_name:      row.get("last_name")?,
      date_of_birth:  row.get("date_of_birth")?,
      phone:          row.get("phone")?,
      email:          row.get("email")?,
      address_line1:  row.get("address_line1")?,
      address_city:   row.get("address_city")?,
      address_state:  row.get("address_state")?,
      address_zip:    row.get("address_zip")?,
      lived_3_years:  row.get("lived_at_current_more_than_3_years")?,
      applicant_type: row.get("applicant_type")?,
      truck_year:     row.get("truck_year")?,
      truck_make:     row.get("truck_make")?,
      return_to_duty: row.get("alcohol_drug_return_to_duty")?,
      ssn_last4:      row.get("ssn_last4")?,
      ssn_encrypted:  row.get("ssn_encrypted")?,
      submitter_ip:   row.get("submitter_ip")?,
      user_agent:     row.get("user_agent")?,
      internal_notes: row.get("internal_notes")?,
      reviewed_by:    row.get("reviewed_by")?,
      reviewed_at:    row.get("reviewed_at")?,
    })
  }

  pub fn into_application(self) -> Result<DriverApplication> {
    Ok(DriverApplication {
      id:             decode_uuid(&self.application_id)?,
      created_at:     decode_dt(&self.created_at)?,
      status:         decode_enum("application status", &self.status)?,
      internal_notes: self.internal_notes,
      reviewed_by:    self.reviewed_by,
      reviewed_at:    self.reviewed_at.as_deref().map(decode_dt).transpose()?,
      applicant:      ApplicantDetails {
        first_name: self.first_name,
        last_name: self.last_name,
        date_of_birth: decode_date(&self.date_of_birth)?,
        phone: self.phone,
        email: self.email,
        current_address: PostalAddress {
          line1: self.address_line1,
          city:  self.address_city,
          state: self.address_state,
          zip:   self.address_zip,
        },
        lived_at_current_more_than_3_years: self.lived_3_years,
        applicant_type: decode_enum("applicant type", &self.applicant_type)?,
        truck_year: self.truck_year,
        truck_make: self.truck_make,
        alcohol_drug_return_to_duty: self.return_to_duty,
        ssn_last4: self.ssn_last4,
        ssn_encrypted: self.ssn_encrypted,
      },
      meta:           RequestMeta {
        submitter_ip: self.submitter_ip,
        user_agent:   self.user_agent,
      },
    })
  }
}

/// The subset of `driver_applications` shown in the admin list.
pub struct RawSummary {
  pub application_id: String,
  pub created_at:     String,
  pub status:         String,
  pub first_name:     String,
  pub last_name:      String,
  pub applicant_type: String,
  pub reviewed_at:    Option<String>,
}

impl RawSummary {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      application_id: row.get("application_id")?,
      created_at:     row.get("created_at")?,
      status:         row.get("status")?,
      first_name:     row.get("first_name")?,
      last_name:      row.get("last_name")?,
      applicant_type: row.get("applicant_type")?,
      reviewed_at:    row.get("reviewed_at")?,
    })
  }

  pub fn into_summary(self) -> Result<ApplicationSummary> {
    Ok(ApplicationSummary {
      id:             decode_uuid(&self.application_id)?,
      created_at:     decode_dt(&self.created_at)?,
      status:         decode_enum("application status", &self.status)?,
      first_name:     self.first_name,
      last_name:      self.last_name,
      applicant_type: decode_enum("applicant type", &self.applicant_type)?,
      reviewed_at:    self.reviewed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawLicense {
  pub license_id:          String,
  pub application_id:      String,
  pub number:              String,
  pub state:               String,
  pub class:               String,
  pub expires_at:          String,
  pub endorsements:        String,
  pub held_other_licenses: bool,
  pub other_licenses:      String,
  pub front_url:           Option<String>,
  pub front_public_id:     Option<String>,
  pub back_url:            Option<String>,
  pub back_public_id:      Option<String>,
}

impl RawLicense {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      license_id:          row.get("license_id")?,
      application_id:      row.get("application_id")?,
      number:              row.get("number")?,
      state:               row.get("state")?,
      class:               row.get("class")?,
      expires_at:          row.get("expires_at")?,
      endorsements:        row.get("endorsements")?,
      held_other_licenses: row.get("held_other_licenses")?,
      other_licenses:      row.get("other_licenses")?,
      front_url:           row.get("front_url")?,
      front_public_id:     row.get("front_public_id")?,
      back_url:            row.get("back_url")?,
      back_public_id:      row.get("back_public_id")?,
    })
  }

  pub fn into_license(self) -> Result<DriverLicense> {
    Ok(DriverLicense {
      id:             decode_uuid(&self.license_id)?,
      application_id: decode_uuid(&self.application_id)?,
      details:        NewDriverLicense {
        number: self.number,
        state: self.state,
        class: self.class,
        expires_at: decode_date(&self.expires_at)?,
        endorsements: self.endorsements,
        held_other_licenses_last_3_years: self.held_other_licenses,
        other_licenses: serde_json::from_str(&self.other_licenses)?,
        front: join_blob(self.front_url, self.front_public_id),
        back: join_blob(self.back_url, self.back_public_id),
      },
    })
  }
}

pub struct RawMedicalCard {
  pub medical_card_id:    String,
  pub application_id:     String,
  pub expires_at:         Option<String>,
  pub document_url:       Option<String>,
  pub document_public_id: Option<String>,
}

impl RawMedicalCard {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      medical_card_id:    row.get("medical_card_id")?,
      application_id:     row.get("application_id")?,
      expires_at:         row.get("expires_at")?,
      document_url:       row.get("document_url")?,
      document_public_id: row.get("document_public_id")?,
    })
  }

  pub fn into_medical_card(self) -> Result<MedicalCard> {
    Ok(MedicalCard {
      id:             decode_uuid(&self.medical_card_id)?,
      application_id: decode_uuid(&self.application_id)?,
      details:        NewMedicalCard {
        expires_at: decode_opt_date(self.expires_at)?,
        document:   join_blob(self.document_url, self.document_public_id),
      },
    })
  }
}

pub struct RawPreviousAddress {
  pub address_id:     String,
  pub application_id: String,
  pub line1:          String,
  pub city:           String,
  pub state:          String,
  pub zip:            String,
  pub from_date:      Option<String>,
  pub to_date:        Option<String>,
}

impl RawPreviousAddress {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      address_id:     row.get("address_id")?,
      application_id: row.get("application_id")?,
      line1:          row.get("line1")?,
      city:           row.get("city")?,
      state:          row.get("state")?,
      zip:            row.get("zip")?,
      from_date:      row.get("from_date")?,
      to_date:        row.get("to_date")?,
    })
  }

  pub fn into_previous_address(self) -> Result<PreviousAddress> {
    Ok(PreviousAddress {
      id:             decode_uuid(&self.address_id)?,
      application_id: decode_uuid(&self.application_id)?,
      details:        NewPreviousAddress {
        address:   PostalAddress {
          line1: self.line1,
          city:  self.city,
          state: self.state,
          zip:   self.zip,
        },
        from_date: decode_opt_date(self.from_date)?,
        to_date:   decode_opt_date(self.to_date)?,
      },
    })
  }
}

pub struct RawEmploymentRecord {
  pub record_id:          String,
  pub application_id:     String,
  pub ordinal:            u32,
  pub employer_name:      String,
  pub employer_phone:     Option<String>,
  pub employer_email:     Option<String>,
  pub address_line1:      String,
  pub city:               String,
  pub state:              String,
  pub zip:                String,
  pub country:            String,
  pub position:           String,
  pub from_month:         String,
  pub to_month:           Option<String>,
  pub reason_for_leaving: String,
  pub equipment_class:    Option<String>,
  pub subject_to_fmcsr:   bool,
  pub safety_sensitive:   bool,
}

impl RawEmploymentRecord {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:          row.get("record_id")?,
      application_id:     row.get("application_id")?,
      ordinal:            row.get("ordinal")?,
      employer_name:      row.get("employer_name")?,
      employer_phone:     row.get("employer_phone")?,
      employer_email:     row.get("employer_email")?,
      address_line1:      row.get("address_line1")?,
      city:               row.get("city")?,
      state:              row.get("state")?,
      zip:                row.get("zip")?,
      country:            row.get("country")?,
      position:           row.get("position")?,
      from_month:         row.get("from_month")?,
      to_month:           row.get("to_month")?,
      reason_for_leaving: row.get("reason_for_leaving")?,
      equipment_class:    row.get("equipment_class")?,
      subject_to_fmcsr:   row.get("subject_to_fmcsr")?,
      safety_sensitive:   row.get("safety_sensitive")?,
    })
  }

  pub fn into_employment_record(self) -> Result<EmploymentRecord> {
    Ok(EmploymentRecord {
      id:             decode_uuid(&self.record_id)?,
      application_id: decode_uuid(&self.application_id)?,
      ordinal:        self.ordinal,
      details:        NewEmploymentRecord {
        employer_name:      self.employer_name,
        employer_phone:     self.employer_phone,
        employer_email:     self.employer_email,
        address:            EmploymentAddress {
          line1:   self.address_line1,
          city:    self.city,
          state:   self.state,
          zip:     self.zip,
          country: self.country,
        },
        position:           self.position,
        from_month:         decode_date(&self.from_month)?,
        to_month:           decode_opt_date(self.to_month)?,
        reason_for_leaving: self.reason_for_leaving,
        equipment_class:    self.equipment_class,
        subject_to_fmcsr:   self.subject_to_fmcsr,
        safety_sensitive:   self.safety_sensitive,
      },
    })
  }
}

pub struct RawLegalConsent {
  pub consent_id:          String,
  pub application_id:      String,
  pub consent_type:        String,
  pub accepted:            bool,
  pub signed_at:           String,
  pub signature_url:       Option<String>,
  pub signature_public_id: Option<String>,
  pub form_version:        String,
}

impl RawLegalConsent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      consent_id:          row.get("consent_id")?,
      application_id:      row.get("application_id")?,
      consent_type:        row.get("consent_type")?,
      accepted:            row.get("accepted")?,
      signed_at:           row.get("signed_at")?,
      signature_url:       row.get("signature_url")?,
      signature_public_id: row.get("signature_public_id")?,
      form_version:        row.get("form_version")?,
    })
  }

  pub fn into_legal_consent(self) -> Result<LegalConsent> {
    Ok(LegalConsent {
      id:             decode_uuid(&self.consent_id)?,
      application_id: decode_uuid(&self.application_id)?,
      details:        NewLegalConsent {
        consent_type: decode_enum("consent type", &self.consent_type)?,
        accepted:     self.accepted,
        signed_at:    decode_date(&self.signed_at)?,
        signature:    join_blob(self.signature_url, self.signature_public_id),
        form_version: self.form_version,
      },
    })
  }
}
