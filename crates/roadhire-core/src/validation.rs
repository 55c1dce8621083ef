//! Field-level validation primitives.
//!
//! Errors are keyed by the field path the form uses (`email`,
//! `employmentRecords[1].zip`, ...) so the same report can drive both the
//! form's inline messages and a 400 response body.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One failing field and a message suitable for the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

/// An ordered collection of [`FieldError`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.push(FieldError { field: field.into(), message: message.into() });
  }

  pub fn extend(&mut self, other: ValidationErrors) { self.0.extend(other.0); }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(&self) -> impl Iterator<Item = &FieldError> { self.0.iter() }

  /// `true` if any error is reported for `field` exactly.
  pub fn has(&self, field: &str) -> bool {
    self.0.iter().any(|e| e.field == field)
  }

  /// The message for `field`, if any.
  pub fn message(&self, field: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|e| e.field == field)
      .map(|e| e.message.as_str())
  }

  pub fn into_result(self) -> Result<(), ValidationErrors> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }

  pub fn into_vec(self) -> Vec<FieldError> { self.0 }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let fields: Vec<&str> = self.0.iter().map(|e| e.field.as_str()).collect();
    write!(f, "invalid fields: {}", fields.join(", "))
  }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
  type Item = FieldError;
  type IntoIter = std::vec::IntoIter<FieldError>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

// ─── Rules ───────────────────────────────────────────────────────────────────

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
    .expect("email pattern compiles")
});

static US_ZIP: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern compiles"));

static TRUCK_YEAR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(19|20)\d{2}$").expect("year pattern compiles"));

/// USPS codes for the states, DC and the territories.
const US_STATES: [&str; 56] = [
  "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID",
  "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO",
  "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA",
  "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV", "WI", "WY", "PR",
  "GU", "VI", "AS", "MP",
];

/// Push "`label` is required" when `value` is blank. Returns whether the
/// value was present.
pub fn require(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  label: &str,
) -> bool {
  if value.trim().is_empty() {
    errors.push(field, format!("{label} is required"));
    false
  } else {
    true
  }
}

pub fn is_email(value: &str) -> bool {
  value.len() <= 254 && EMAIL.is_match(value.trim())
}

/// Ten-digit North American number, optionally with a leading `1` and any
/// punctuation.
pub fn is_phone(value: &str) -> bool {
  let digits: String = value.chars().filter(char::is_ascii_digit).collect();
  let other_chars_ok = value
    .chars()
    .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.' | '+'));
  other_chars_ok
    && (digits.len() == 10 || (digits.len() == 11 && digits.starts_with('1')))
}

pub fn is_us_state(value: &str) -> bool {
  let upper = value.trim().to_ascii_uppercase();
  US_STATES.contains(&upper.as_str())
}

pub fn is_us_zip(value: &str) -> bool { US_ZIP.is_match(value.trim()) }

pub fn is_truck_year(value: &str) -> bool { TRUCK_YEAR.is_match(value.trim()) }

/// `"US"`, `"USA"` and blank (the default) all mean the United States.
pub fn is_us_country(country: &str) -> bool {
  matches!(
    country.trim().to_ascii_uppercase().as_str(),
    "" | "US" | "USA" | "UNITED STATES"
  )
}
