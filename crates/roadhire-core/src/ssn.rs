//! Social Security Number parsing.
//!
//! The full number only ever lives in memory as an [`Ssn`]; persisted rows
//! carry the last four digits in clear and the rest as AEAD ciphertext (see
//! [`crate::crypto`]).

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{CryptoError, SsnCipher};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsnError {
  #[error("SSN must contain exactly 9 digits")]
  InvalidSsnFormat,
}

/// A validated nine-digit SSN, digits only.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Ssn(String);

impl Ssn {
  /// Parse a non-blank SSN, ignoring `-`, `.` and space separators.
  pub fn parse(input: &str) -> Result<Self, SsnError> {
    let digits = strip_separators(input);
    if digits.len() != 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
      return Err(SsnError::InvalidSsnFormat);
    }
    Ok(Self(digits))
  }

  /// Blank input means the applicant left the field empty.
  pub fn parse_optional(input: &str) -> Result<Option<Self>, SsnError> {
    if input.trim().is_empty() {
      return Ok(None);
    }
    Self::parse(input).map(Some)
  }

  /// The nine digits, without separators.
  pub fn digits(&self) -> &str { &self.0 }

  /// The final four digits; safe to display.
  pub fn last4(&self) -> &str { &self.0[5..] }
}

impl fmt::Debug for Ssn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Ssn(***-**-{})", self.last4())
  }
}

/// Remove the separators applicants commonly type between SSN groups.
///
/// Used by the form engine before transmission and by [`Ssn::parse`], so
/// both sides agree on what "digits only" means.
pub fn strip_separators(input: &str) -> String {
  input
    .chars()
    .filter(|c| !matches!(c, '-' | '.' | ' ' | '\t'))
    .collect()
}

/// The two persisted columns derived from an optional SSN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsnFields {
  pub last4:     Option<String>,
  pub encrypted: Option<String>,
}

impl SsnFields {
  /// Derive `last4` and the ciphertext. An absent SSN yields empty fields
  /// and no encryption is attempted.
  pub fn derive(
    ssn: Option<&Ssn>,
    cipher: &SsnCipher,
  ) -> Result<Self, CryptoError> {
    match ssn {
      None => Ok(Self::default()),
      Some(ssn) => Ok(Self {
        last4:     Some(ssn.last4().to_owned()),
        encrypted: Some(cipher.encrypt(ssn)?),
      }),
    }
  }
}
