//! The non-file fields of a driver-application submission.
//!
//! These types are the multipart contract between the form engine and the
//! application service. Scalars travel as individual text parts (see
//! [`ApplicantFields::to_parts`] / [`ApplicantFields::apply_part`]); nested
//! structures travel as JSON-encoded text parts named by the `*_PART`
//! constants. The `check_*` methods are the field rules; the form engine runs
//! them step by step and the service runs them again before writing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  application::{
    ApplicantType, ConsentType, EmploymentAddress, NewEmploymentRecord,
    NewPreviousAddress, PostalAddress,
  },
  dates::{
    DateError, format_local_date, parse_local_date, parse_optional_local_date,
    within_future_horizon,
  },
  ssn::{Ssn, strip_separators},
  validation::{
    FieldError, ValidationErrors, is_email, is_phone, is_truck_year,
    is_us_country, is_us_state, is_us_zip, require,
  },
};

pub const LICENSE_PART: &str = "license";
pub const PREVIOUS_ADDRESSES_PART: &str = "previousAddresses";
pub const EMPLOYMENT_RECORDS_PART: &str = "employmentRecords";
pub const LEGAL_CONSENTS_PART: &str = "legalConsents";

pub const LICENSE_FRONT_PART: &str = "licenseFront";
pub const LICENSE_BACK_PART: &str = "licenseBack";
pub const MEDICAL_CARD_PART: &str = "medicalCard";

/// Version stamp recorded with every consent.
pub const CONSENT_FORM_VERSION: &str = "2024-01";

// ─── Applicant scalars ───────────────────────────────────────────────────────

/// Scalar answers, each sent as its own text part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicantFields {
  pub first_name:                  String,
  pub last_name:                   String,
  pub date_of_birth:               String,
  pub ssn:                         String,
  pub phone:                       String,
  pub email:                       String,
  pub current_address_line1:       String,
  pub current_address_city:        String,
  pub current_address_state:       String,
  pub current_address_zip:         String,
  pub lived_at_current_more_than_3_years: Option<bool>,
  pub applicant_type:              Option<ApplicantType>,
  pub truck_year:                  String,
  pub truck_make:                  String,
  pub medical_card_expires_at:     String,
  pub alcohol_drug_return_to_duty: Option<bool>,
}

impl ApplicantFields {
  /// Text parts in wire order. The SSN is sent digits-only (or empty).
  pub fn to_parts(&self) -> Vec<(&'static str, String)> {
    vec![
      ("firstName", self.first_name.trim().to_owned()),
      ("lastName", self.last_name.trim().to_owned()),
      ("dateOfBirth", self.date_of_birth.trim().to_owned()),
      ("ssn", strip_separators(&self.ssn)),
      ("phone", self.phone.trim().to_owned()),
      ("email", self.email.trim().to_owned()),
      ("currentAddressLine1", self.current_address_line1.trim().to_owned()),
      ("currentAddressCity", self.current_address_city.trim().to_owned()),
      ("currentAddressState", self.current_address_state.trim().to_owned()),
      ("currentAddressZip", self.current_address_zip.trim().to_owned()),
      (
        "livedAtCurrentMoreThan3Years",
        encode_bool(self.lived_at_current_more_than_3_years),
      ),
      (
        "applicantType",
        self
          .applicant_type
          .map(|t| t.to_string())
          .unwrap_or_default(),
      ),
      ("truckYear", self.truck_year.trim().to_owned()),
      ("truckMake", self.truck_make.trim().to_owned()),
      ("medicalCardExpiresAt", self.medical_card_expires_at.trim().to_owned()),
      (
        "alcoholDrugReturnToDuty",
        encode_bool(self.alcohol_drug_return_to_duty),
      ),
    ]
  }

  /// Store one decoded text part. Returns `Ok(false)` for part names that
  /// are not applicant scalars.
  pub fn apply_part(
    &mut self,
    name: &str,
    value: String,
  ) -> Result<bool, FieldError> {
    match name {
      "firstName" => self.first_name = value,
      "lastName" => self.last_name = value,
      "dateOfBirth" => self.date_of_birth = value,
      "ssn" => self.ssn = value,
      "phone" => self.phone = value,
      "email" => self.email = value,
      "currentAddressLine1" => self.current_address_line1 = value,
      "currentAddressCity" => self.current_address_city = value,
      "currentAddressState" => self.current_address_state = value,
      "currentAddressZip" => self.current_address_zip = value,
      "livedAtCurrentMoreThan3Years" => {
        self.lived_at_current_more_than_3_years = decode_bool(name, &value)?;
      }
      "applicantType" => {
        self.applicant_type = if value.trim().is_empty() {
          None
        } else {
          Some(value.trim().parse().map_err(|_| FieldError {
            field:   name.to_owned(),
            message: "Applicant type must be COMPANY_DRIVER or OWNER_OPERATOR"
              .to_owned(),
          })?)
        };
      }
      "truckYear" => self.truck_year = value,
      "truckMake" => self.truck_make = value,
      "medicalCardExpiresAt" => self.medical_card_expires_at = value,
      "alcoholDrugReturnToDuty" => {
        self.alcohol_drug_return_to_duty = decode_bool(name, &value)?;
      }
      _ => return Ok(false),
    }
    Ok(true)
  }

  pub fn is_owner_operator(&self) -> bool {
    self.applicant_type == Some(ApplicantType::OwnerOperator)
  }

  /// Previous addresses only count for applicants who have not lived at the
  /// current one for more than three years.
  pub fn keeps_address_history(&self) -> bool {
    self.lived_at_current_more_than_3_years != Some(true)
  }

  /// Name, contact details, applicant type and the owner-operator truck
  /// fields.
  pub fn check_identity(&self, errors: &mut ValidationErrors) {
    require(errors, "firstName", &self.first_name, "First name");
    require(errors, "lastName", &self.last_name, "Last name");

    if require(errors, "phone", &self.phone, "Phone") && !is_phone(&self.phone)
    {
      errors.push("phone", "Enter a 10-digit phone number");
    }
    if require(errors, "email", &self.email, "Email") && !is_email(&self.email)
    {
      errors.push("email", "Enter a valid email address");
    }

    match self.applicant_type {
      None => errors.push("applicantType", "Select an applicant type"),
      Some(ApplicantType::OwnerOperator) => {
        if require(errors, "truckYear", &self.truck_year, "Truck year")
          && !is_truck_year(&self.truck_year)
        {
          errors.push("truckYear", "Enter a four-digit model year");
        }
        require(errors, "truckMake", &self.truck_make, "Truck make");
      }
      Some(ApplicantType::CompanyDriver) => {}
    }
  }

  pub fn check_date_of_birth(&self, errors: &mut ValidationErrors) {
    if require(errors, "dateOfBirth", &self.date_of_birth, "Date of birth")
      && let Err(e) = parse_local_date(&self.date_of_birth)
    {
      errors.push("dateOfBirth", date_message("Date of birth", &e));
    }
  }

  /// The SSN is optional; when present it must be nine digits.
  pub fn check_ssn(&self, errors: &mut ValidationErrors) {
    if Ssn::parse_optional(&self.ssn).is_err() {
      errors.push("ssn", "SSN must be 9 digits");
    }
  }

  pub fn check_current_address(&self, errors: &mut ValidationErrors) {
    require(errors, "currentAddressLine1", &self.current_address_line1, "Street address");
    require(errors, "currentAddressCity", &self.current_address_city, "City");
    if require(errors, "currentAddressState", &self.current_address_state, "State")
      && !is_us_state(&self.current_address_state)
    {
      errors.push("currentAddressState", "Use the two-letter state code");
    }
    if require(errors, "currentAddressZip", &self.current_address_zip, "ZIP code")
      && !is_us_zip(&self.current_address_zip)
    {
      errors.push("currentAddressZip", "Enter a 5-digit ZIP code");
    }
    if self.lived_at_current_more_than_3_years.is_none() {
      errors.push(
        "livedAtCurrentMoreThan3Years",
        "Tell us whether you have lived here more than 3 years",
      );
    }
  }

  /// Blank is fine; anything typed must parse.
  pub fn check_medical_card_expiration(&self, errors: &mut ValidationErrors) {
    if let Err(e) = parse_optional_local_date(&self.medical_card_expires_at) {
      errors.push(
        "medicalCardExpiresAt",
        date_message("Medical card expiration", &e),
      );
    }
  }

  pub fn current_address(&self) -> PostalAddress {
    PostalAddress {
      line1: self.current_address_line1.trim().to_owned(),
      city:  self.current_address_city.trim().to_owned(),
      state: self.current_address_state.trim().to_ascii_uppercase(),
      zip:   self.current_address_zip.trim().to_owned(),
    }
  }
}

// ─── License ─────────────────────────────────────────────────────────────────

/// Another license held in the last three years.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtherLicense {
  pub number:     String,
  pub state:      String,
  pub class:      String,
  pub expires_at: String,
}

/// The `license` JSON part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseFields {
  pub number:                           String,
  pub state:                            String,
  pub class:                            String,
  pub expires_at:                       String,
  pub endorsements:                     String,
  pub held_other_licenses_last_3_years: Option<bool>,
  pub other_licenses:                   Vec<OtherLicense>,
}

impl LicenseFields {
  pub fn check_details(&self, errors: &mut ValidationErrors) {
    require(errors, "license.number", &self.number, "License number");
    if require(errors, "license.state", &self.state, "Issuing state")
      && !is_us_state(&self.state)
    {
      errors.push("license.state", "Use the two-letter state code");
    }
    require(errors, "license.class", &self.class, "License class");

    match self.held_other_licenses_last_3_years {
      None => errors.push(
        "license.heldOtherLicensesLast3Years",
        "Tell us whether you held other licenses in the last 3 years",
      ),
      Some(true) if self.other_licenses.is_empty() => errors.push(
        "license.otherLicenses",
        "List the other licenses you held",
      ),
      Some(true) => {
        for (i, other) in self.other_licenses.iter().enumerate() {
          let field = format!("license.otherLicenses[{i}].number");
          require(errors, &field, &other.number, "License number");
          let field = format!("license.otherLicenses[{i}].state");
          require(errors, &field, &other.state, "Issuing state");
        }
      }
      Some(false) => {}
    }
  }

  /// The expiration must parse and lie within the plausibility horizon.
  pub fn check_expiration(&self, today: NaiveDate, errors: &mut ValidationErrors) {
    if !require(errors, "license.expiresAt", &self.expires_at, "License expiration") {
      return;
    }
    match parse_local_date(&self.expires_at) {
      Err(e) => errors.push("license.expiresAt", date_message("License expiration", &e)),
      Ok(date) if !within_future_horizon(date, today) => errors.push(
        "license.expiresAt",
        "License expiration is too far in the future",
      ),
      Ok(_) => {}
    }
  }

  /// Other licenses are kept only when the applicant said they held some.
  pub fn other_licenses_json(&self) -> serde_json::Value {
    if self.held_other_licenses_last_3_years == Some(true) {
      serde_json::to_value(&self.other_licenses).unwrap_or_default()
    } else {
      serde_json::Value::Array(Vec::new())
    }
  }
}

// ─── Previous addresses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviousAddressFields {
  pub line1:     String,
  pub city:      String,
  pub state:     String,
  pub zip:       String,
  pub from_date: String,
  pub to_date:   String,
}

impl PreviousAddressFields {
  pub fn normalize(&self) -> Result<NewPreviousAddress, DateError> {
    Ok(NewPreviousAddress {
      address:   PostalAddress {
        line1: self.line1.trim().to_owned(),
        city:  self.city.trim().to_owned(),
        state: self.state.trim().to_ascii_uppercase(),
        zip:   self.zip.trim().to_owned(),
      },
      from_date: parse_optional_local_date(&self.from_date)?,
      to_date:   parse_optional_local_date(&self.to_date)?,
    })
  }
}

/// Previous addresses are optional even when the applicant has lived at the
/// current one for less than three years; every address supplied must be
/// complete.
pub fn check_previous_addresses(
  addresses: &[PreviousAddressFields],
  errors: &mut ValidationErrors,
) {
  for (i, addr) in addresses.iter().enumerate() {
    let field = |name: &str| format!("previousAddresses[{i}].{name}");
    require(errors, &field("line1"), &addr.line1, "Street address");
    require(errors, &field("city"), &addr.city, "City");
    if require(errors, &field("state"), &addr.state, "State")
      && !is_us_state(&addr.state)
    {
      errors.push(field("state"), "Use the two-letter state code");
    }
    if require(errors, &field("zip"), &addr.zip, "ZIP code") && !is_us_zip(&addr.zip)
    {
      errors.push(field("zip"), "Enter a 5-digit ZIP code");
    }

    let from = check_optional_date(errors, &field("fromDate"), &addr.from_date, "From date");
    let to = check_optional_date(errors, &field("toDate"), &addr.to_date, "To date");
    if let (Some(from), Some(to)) = (from, to)
      && to < from
    {
      errors.push(field("toDate"), "To date must be after the from date");
    }
  }
}

// ─── Employment ──────────────────────────────────────────────────────────────

fn default_country() -> String { "US".to_owned() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmploymentRecordFields {
  pub employer_name:      String,
  pub employer_phone:     String,
  pub employer_email:     String,
  pub address_line1:      String,
  pub city:               String,
  pub state:              String,
  pub zip:                String,
  #[serde(default = "default_country")]
  pub country:            String,
  pub position:           String,
  /// `YYYY-MM`.
  pub from_month:         String,
  /// `YYYY-MM`; blank while still employed.
  pub to_month:           String,
  pub reason_for_leaving: String,
  pub equipment_class:    String,
  pub subject_to_fmcsr:   Option<bool>,
  pub safety_sensitive:   Option<bool>,
}

impl Default for EmploymentRecordFields {
  fn default() -> Self {
    Self {
      employer_name:      String::new(),
      employer_phone:     String::new(),
      employer_email:     String::new(),
      address_line1:      String::new(),
      city:               String::new(),
      state:              String::new(),
      zip:                String::new(),
      country:            default_country(),
      position:           String::new(),
      from_month:         String::new(),
      to_month:           String::new(),
      reason_for_leaving: String::new(),
      equipment_class:    String::new(),
      subject_to_fmcsr:   None,
      safety_sensitive:   None,
    }
  }
}

impl EmploymentRecordFields {
  pub fn is_us(&self) -> bool { is_us_country(&self.country) }

  pub fn normalize(&self) -> Result<NewEmploymentRecord, DateError> {
    let country = if self.is_us() {
      default_country()
    } else {
      self.country.trim().to_owned()
    };
    let state = if self.is_us() {
      self.state.trim().to_ascii_uppercase()
    } else {
      self.state.trim().to_owned()
    };

    Ok(NewEmploymentRecord {
      employer_name:      self.employer_name.trim().to_owned(),
      employer_phone:     non_blank(&self.employer_phone),
      employer_email:     non_blank(&self.employer_email),
      address:            EmploymentAddress {
        line1: self.address_line1.trim().to_owned(),
        city: self.city.trim().to_owned(),
        state,
        zip: self.zip.trim().to_owned(),
        country,
      },
      position:           self.position.trim().to_owned(),
      from_month:         parse_local_date(&self.from_month)?,
      to_month:           parse_optional_local_date(&self.to_month)?,
      reason_for_leaving: self.reason_for_leaving.trim().to_owned(),
      equipment_class:    non_blank(&self.equipment_class),
      subject_to_fmcsr:   self.subject_to_fmcsr.unwrap_or(false),
      safety_sensitive:   self.safety_sensitive.unwrap_or(false),
    })
  }
}

/// At least one record; US employers need a state code and ZIP, others a
/// non-empty region and postal code.
pub fn check_employment_records(
  records: &[EmploymentRecordFields],
  errors: &mut ValidationErrors,
) {
  if records.is_empty() {
    errors.push("employmentRecords", "Add at least one employer");
    return;
  }

  for (i, rec) in records.iter().enumerate() {
    let field = |name: &str| format!("employmentRecords[{i}].{name}");
    require(errors, &field("employerName"), &rec.employer_name, "Employer name");
    require(errors, &field("addressLine1"), &rec.address_line1, "Street address");
    require(errors, &field("city"), &rec.city, "City");
    require(errors, &field("position"), &rec.position, "Position");
    require(
      errors,
      &field("reasonForLeaving"),
      &rec.reason_for_leaving,
      "Reason for leaving",
    );

    if rec.is_us() {
      if require(errors, &field("state"), &rec.state, "State") && !is_us_state(&rec.state)
      {
        errors.push(field("state"), "Use the two-letter state code");
      }
      if require(errors, &field("zip"), &rec.zip, "ZIP code") && !is_us_zip(&rec.zip) {
        errors.push(field("zip"), "Enter a 5-digit ZIP code");
      }
    } else {
      require(errors, &field("state"), &rec.state, "State or province");
      require(errors, &field("zip"), &rec.zip, "Postal code");
    }

    if !rec.employer_email.trim().is_empty() && !is_email(&rec.employer_email) {
      errors.push(field("employerEmail"), "Enter a valid email address");
    }
    if !rec.employer_phone.trim().is_empty() && !is_phone(&rec.employer_phone) {
      errors.push(field("employerPhone"), "Enter a 10-digit phone number");
    }

    let from = if require(errors, &field("fromMonth"), &rec.from_month, "Start month") {
      check_optional_date(errors, &field("fromMonth"), &rec.from_month, "Start month")
    } else {
      None
    };
    let to = check_optional_date(errors, &field("toMonth"), &rec.to_month, "End month");
    if let (Some(from), Some(to)) = (from, to)
      && to < from
    {
      errors.push(field("toMonth"), "End month must not be before the start month");
    }

    if rec.subject_to_fmcsr.is_none() {
      errors.push(
        field("subjectToFmcsr"),
        "Tell us whether this job was subject to the FMCSRs",
      );
    }
    if rec.safety_sensitive.is_none() {
      errors.push(
        field("safetySensitive"),
        "Tell us whether this job was safety-sensitive",
      );
    }
  }
}

// ─── Legal consents ──────────────────────────────────────────────────────────

/// One entry of the six-element `legalConsents` JSON part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalConsentFields {
  pub consent_type: ConsentType,
  #[serde(default)]
  pub accepted:     bool,
  /// `YYYY-MM-DD`; blank means "today".
  #[serde(default)]
  pub signed_at:    String,
  #[serde(default = "default_form_version")]
  pub form_version: String,
}

fn default_form_version() -> String { CONSENT_FORM_VERSION.to_owned() }

impl LegalConsentFields {
  pub fn new(consent_type: ConsentType) -> Self {
    Self {
      consent_type,
      accepted: false,
      signed_at: String::new(),
      form_version: default_form_version(),
    }
  }

  /// The signing date, defaulting to `today` when none was sent.
  pub fn signed_on(&self, today: NaiveDate) -> Result<NaiveDate, DateError> {
    Ok(parse_optional_local_date(&self.signed_at)?.unwrap_or(today))
  }
}

/// The fixed six-entry consent array, all unaccepted.
pub fn blank_consents() -> Vec<LegalConsentFields> {
  ConsentType::ALL.into_iter().map(LegalConsentFields::new).collect()
}

/// Exactly one entry per consent type, with parsable dates.
pub fn check_consent_set(
  consents: &[LegalConsentFields],
  errors: &mut ValidationErrors,
) {
  for consent_type in ConsentType::ALL {
    let count = consents
      .iter()
      .filter(|c| c.consent_type == consent_type)
      .count();
    if count != 1 {
      errors.push(
        format!("legalConsents.{consent_type}"),
        format!("Expected exactly one {consent_type} consent, found {count}"),
      );
    }
  }
  for consent in consents {
    let field = format!("legalConsents.{}.signedAt", consent.consent_type);
    check_optional_date(errors, &field, &consent.signed_at, "Signature date");
  }
}

/// Every consent must be accepted before the form can be submitted.
pub fn check_consent_accepted(
  consents: &[LegalConsentFields],
  consent_type: ConsentType,
  errors: &mut ValidationErrors,
) {
  let accepted = consents
    .iter()
    .any(|c| c.consent_type == consent_type && c.accepted);
  if !accepted {
    errors.push(
      format!("legalConsents.{consent_type}.accepted"),
      "You must accept this disclosure to continue",
    );
  }
}

// ─── Whole submission ────────────────────────────────────────────────────────

/// Every non-file field of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionFields {
  pub applicant:          ApplicantFields,
  pub license:            LicenseFields,
  pub previous_addresses: Vec<PreviousAddressFields>,
  pub employment_records: Vec<EmploymentRecordFields>,
  pub legal_consents:     Vec<LegalConsentFields>,
}

impl SubmissionFields {
  /// Structural checks the service repeats before writing anything. The SSN,
  /// date of birth and license expiration are normalized separately, each
  /// with its own error.
  pub fn check_structure(&self) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    self.applicant.check_identity(&mut errors);
    self.applicant.check_current_address(&mut errors);
    if self.applicant.keeps_address_history() {
      check_previous_addresses(&self.previous_addresses, &mut errors);
    }
    self.license.check_details(&mut errors);
    check_employment_records(&self.employment_records, &mut errors);
    check_consent_set(&self.legal_consents, &mut errors);
    errors
  }

  /// JSON text parts in wire order.
  pub fn json_parts(&self) -> serde_json::Result<Vec<(&'static str, String)>> {
    Ok(vec![
      (PREVIOUS_ADDRESSES_PART, serde_json::to_string(&self.previous_addresses)?),
      (EMPLOYMENT_RECORDS_PART, serde_json::to_string(&self.employment_records)?),
      (LEGAL_CONSENTS_PART, serde_json::to_string(&self.legal_consents)?),
      (LICENSE_PART, serde_json::to_string(&self.license)?),
    ])
  }

  /// Decode one JSON text part. Returns `Ok(false)` for unrelated names.
  pub fn apply_json_part(&mut self, name: &str, value: &str) -> Result<bool, FieldError> {
    let invalid = |e: serde_json::Error| FieldError {
      field:   name.to_owned(),
      message: format!("Malformed {name}: {e}"),
    };
    match name {
      PREVIOUS_ADDRESSES_PART => {
        self.previous_addresses = decode_json_list(value).map_err(invalid)?;
      }
      EMPLOYMENT_RECORDS_PART => {
        self.employment_records = decode_json_list(value).map_err(invalid)?;
      }
      LEGAL_CONSENTS_PART => {
        self.legal_consents = decode_json_list(value).map_err(invalid)?;
      }
      LICENSE_PART => {
        self.license = serde_json::from_str(value).map_err(invalid)?;
      }
      _ => return Ok(false),
    }
    Ok(true)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn decode_json_list<T: for<'de> Deserialize<'de>>(
  value: &str,
) -> serde_json::Result<Vec<T>> {
  if value.trim().is_empty() {
    return Ok(Vec::new());
  }
  serde_json::from_str(value)
}

fn encode_bool(value: Option<bool>) -> String {
  value.map(|b| b.to_string()).unwrap_or_default()
}

fn decode_bool(field: &str, value: &str) -> Result<Option<bool>, FieldError> {
  match value.trim() {
    "" => Ok(None),
    "true" => Ok(Some(true)),
    "false" => Ok(Some(false)),
    _ => Err(FieldError {
      field:   field.to_owned(),
      message: "Expected true or false".to_owned(),
    }),
  }
}

fn non_blank(value: &str) -> Option<String> {
  let trimmed = value.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn check_optional_date(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  label: &str,
) -> Option<NaiveDate> {
  match parse_optional_local_date(value) {
    Ok(date) => date,
    Err(e) => {
      errors.push(field, date_message(label, &e));
      None
    }
  }
}

fn date_message(label: &str, error: &DateError) -> String {
  match error {
    DateError::InvalidDateFormat(_) => format!("{label} must be YYYY-MM-DD"),
    DateError::InvalidDate(_) => format!("{label} is not a real calendar date"),
  }
}

/// Render an optional date back into its wire form.
pub fn encode_optional_date(date: Option<NaiveDate>) -> String {
  date.map(format_local_date).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2026, 10, 19).unwrap() }

  fn applicant() -> ApplicantFields {
    ApplicantFields {
      first_name: "Dana".into(),
      last_name: "Reyes".into(),
      date_of_birth: "1988-04-12".into(),
      ssn: "123-45-6789".into(),
      phone: "(555) 201-3344".into(),
      email: "dana@example.com".into(),
      current_address_line1: "12 Depot Rd".into(),
      current_address_city: "Amarillo".into(),
      current_address_state: "TX".into(),
      current_address_zip: "79101".into(),
      lived_at_current_more_than_3_years: Some(true),
      applicant_type: Some(ApplicantType::CompanyDriver),
      ..Default::default()
    }
  }

  fn employer() -> EmploymentRecordFields {
    EmploymentRecordFields {
      employer_name: "Plains Freight".into(),
      address_line1: "1 Yard Way".into(),
      city: "Lubbock".into(),
      state: "TX".into(),
      zip: "79401".into(),
      position: "Driver".into(),
      from_month: "2019-03".into(),
      to_month: "2024-06".into(),
      reason_for_leaving: "Relocated".into(),
      subject_to_fmcsr: Some(true),
      safety_sensitive: Some(true),
      ..Default::default()
    }
  }

  #[test]
  fn owner_operator_needs_truck_fields() {
    let mut fields = applicant();
    fields.applicant_type = Some(ApplicantType::OwnerOperator);

    let mut errors = ValidationErrors::new();
    fields.check_identity(&mut errors);
    assert!(errors.has("truckYear"));
    assert!(errors.has("truckMake"));

    fields.applicant_type = Some(ApplicantType::CompanyDriver);
    let mut errors = ValidationErrors::new();
    fields.check_identity(&mut errors);
    assert!(errors.is_empty(), "{errors:?}");
  }

  #[test]
  fn ssn_is_optional_but_checked() {
    let mut fields = applicant();
    fields.ssn = String::new();
    let mut errors = ValidationErrors::new();
    fields.check_ssn(&mut errors);
    assert!(errors.is_empty());

    fields.ssn = "123-45-678".into();
    fields.check_ssn(&mut errors);
    assert!(errors.has("ssn"));
  }

  #[test]
  fn scalar_parts_round_trip_through_apply_part() {
    let mut original = applicant();
    original.lived_at_current_more_than_3_years = Some(false);
    original.alcohol_drug_return_to_duty = Some(false);

    let mut decoded = ApplicantFields::default();
    for (name, value) in original.to_parts() {
      assert!(decoded.apply_part(name, value).unwrap(), "{name} not recognised");
    }
    assert_eq!(decoded.ssn, "123456789");
    assert_eq!(decoded.applicant_type, original.applicant_type);
    assert_eq!(decoded.lived_at_current_more_than_3_years, Some(false));
    assert_eq!(decoded.alcohol_drug_return_to_duty, Some(false));
  }

  #[test]
  fn unknown_and_malformed_parts() {
    let mut fields = ApplicantFields::default();
    assert!(!fields.apply_part("licenseFront", String::new()).unwrap());
    assert!(fields.apply_part("applicantType", "TRUCKER".into()).is_err());
    assert!(fields.apply_part("livedAtCurrentMoreThan3Years", "maybe".into()).is_err());
  }

  #[test]
  fn employment_rules_depend_on_country() {
    let mut errors = ValidationErrors::new();
    check_employment_records(&[employer()], &mut errors);
    assert!(errors.is_empty(), "{errors:?}");

    let mut bad_zip = employer();
    bad_zip.zip = "K1A 0B1".into();
    let mut errors = ValidationErrors::new();
    check_employment_records(&[bad_zip.clone()], &mut errors);
    assert!(errors.has("employmentRecords[0].zip"));

    let mut canadian = bad_zip;
    canadian.country = "CA".into();
    canadian.state = "Ontario".into();
    let mut errors = ValidationErrors::new();
    check_employment_records(&[canadian.clone()], &mut errors);
    assert!(errors.is_empty(), "{errors:?}");

    canadian.zip = String::new();
    let mut errors = ValidationErrors::new();
    check_employment_records(&[canadian], &mut errors);
    assert_eq!(errors.message("employmentRecords[0].zip"), Some("Postal code is required"));
  }

  #[test]
  fn employment_needs_at_least_one_record_and_ordered_months() {
    let mut errors = ValidationErrors::new();
    check_employment_records(&[], &mut errors);
    assert!(errors.has("employmentRecords"));

    let mut backwards = employer();
    backwards.to_month = "2018-01".into();
    let mut errors = ValidationErrors::new();
    check_employment_records(&[backwards], &mut errors);
    assert!(errors.has("employmentRecords[0].toMonth"));
  }

  #[test]
  fn normalized_employment_defaults_country() {
    let mut rec = employer();
    rec.country = "usa".into();
    rec.state = "tx".into();
    let normalized = rec.normalize().unwrap();
    assert_eq!(normalized.address.country, "US");
    assert_eq!(normalized.address.state, "TX");
    assert_eq!(normalized.from_month, NaiveDate::from_ymd_opt(2019, 3, 1).unwrap());
    assert!(normalized.employer_email.is_none());
  }

  #[test]
  fn employment_country_defaults_when_missing_from_json() {
    let rec: EmploymentRecordFields =
      serde_json::from_str(r#"{"employerName":"X","fromMonth":"2020-01"}"#).unwrap();
    assert_eq!(rec.country, "US");
  }

  #[test]
  fn license_expiration_horizon() {
    let mut license = LicenseFields {
      number: "D123".into(),
      state: "TX".into(),
      class: "A".into(),
      expires_at: "2030-01-31".into(),
      held_other_licenses_last_3_years: Some(false),
      ..Default::default()
    };
    let mut errors = ValidationErrors::new();
    license.check_details(&mut errors);
    license.check_expiration(today(), &mut errors);
    assert!(errors.is_empty(), "{errors:?}");

    license.expires_at = "2099-01-01".into();
    let mut errors = ValidationErrors::new();
    license.check_expiration(today(), &mut errors);
    assert!(errors.has("license.expiresAt"));

    license.expires_at = "2030-02-30".into();
    let mut errors = ValidationErrors::new();
    license.check_expiration(today(), &mut errors);
    assert_eq!(
      errors.message("license.expiresAt"),
      Some("License expiration is not a real calendar date")
    );
  }

  #[test]
  fn other_licenses_required_iff_flagged() {
    let mut license = LicenseFields {
      number: "D123".into(),
      state: "TX".into(),
      class: "A".into(),
      held_other_licenses_last_3_years: Some(true),
      ..Default::default()
    };
    let mut errors = ValidationErrors::new();
    license.check_details(&mut errors);
    assert!(errors.has("license.otherLicenses"));

    license.held_other_licenses_last_3_years = Some(false);
    let mut errors = ValidationErrors::new();
    license.check_details(&mut errors);
    assert!(errors.is_empty());
    assert_eq!(license.other_licenses_json(), serde_json::json!([]));
  }

  #[test]
  fn previous_addresses_optional_but_complete() {
    let mut errors = ValidationErrors::new();
    check_previous_addresses(&[], &mut errors);
    assert!(errors.is_empty());

    let partial = PreviousAddressFields {
      line1: "9 Elm".into(),
      city: "Waco".into(),
      state: "TX".into(),
      zip: "".into(),
      from_date: "2020-01-01".into(),
      to_date: "2019-01-01".into(),
    };
    check_previous_addresses(&[partial], &mut errors);
    assert!(errors.has("previousAddresses[0].zip"));
    assert!(errors.has("previousAddresses[0].toDate"));
  }

  #[test]
  fn long_time_residents_skip_address_history() {
    let mut fields = SubmissionFields {
      applicant: applicant(),
      previous_addresses: vec![PreviousAddressFields {
        line1: "9 Elm St".into(),
        ..Default::default()
      }],
      ..Default::default()
    };
    fields.applicant.lived_at_current_more_than_3_years = Some(true);
    assert!(!fields.check_structure().has("previousAddresses[0].zip"));

    fields.applicant.lived_at_current_more_than_3_years = Some(false);
    assert!(fields.check_structure().has("previousAddresses[0].zip"));
  }

  #[test]
  fn consent_set_must_cover_each_type_once() {
    let mut errors = ValidationErrors::new();
    check_consent_set(&blank_consents(), &mut errors);
    assert!(errors.is_empty());

    let mut consents = blank_consents();
    consents.pop();
    consents.push(LegalConsentFields::new(ConsentType::Psp));
    let mut errors = ValidationErrors::new();
    check_consent_set(&consents, &mut errors);
    assert!(errors.has("legalConsents.PSP"));
    assert!(errors.has("legalConsents.MVR"));
  }

  #[test]
  fn json_parts_decode_back() {
    let fields = SubmissionFields {
      applicant: applicant(),
      employment_records: vec![employer()],
      legal_consents: blank_consents(),
      ..Default::default()
    };
    let mut decoded = SubmissionFields::default();
    for (name, value) in fields.json_parts().unwrap() {
      assert!(decoded.apply_json_part(name, &value).unwrap());
    }
    assert_eq!(decoded.employment_records, fields.employment_records);
    assert_eq!(decoded.legal_consents.len(), 6);
    assert!(decoded.apply_json_part("license", "{not json").is_err());
  }
}
