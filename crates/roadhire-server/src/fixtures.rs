//! Shared test data: one complete, valid company-driver submission.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use bytes::Bytes;
use rand_core::OsRng;
use roadhire_blob::MemoryBlobStore;
use roadhire_core::{
  application::{ApplicantType, ConsentType},
  blob::BlobStore,
  crypto::{AdminCredentials, SsnCipher},
  intake::{
    ApplicantFields, EmploymentRecordFields, LicenseFields, PreviousAddressFields,
    SubmissionFields, blank_consents,
  },
};
use roadhire_store_sqlite::SqliteStore;

use crate::{
  config::TransactionConfig,
  service::{ApplicationService, IncomingFile, SubmissionFiles},
};

pub const KEY: [u8; 32] = [7u8; 32];

pub fn fields() -> SubmissionFields {
  let mut legal_consents = blank_consents();
  for consent in &mut legal_consents {
    consent.accepted = true;
  }

  SubmissionFields {
    applicant: ApplicantFields {
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
      lived_at_current_more_than_3_years: Some(false),
      applicant_type: Some(ApplicantType::CompanyDriver),
      medical_card_expires_at: "2027-05-01".into(),
      alcohol_drug_return_to_duty: Some(false),
      ..Default::default()
    },
    license: LicenseFields {
      number: "D1234567".into(),
      state: "TX".into(),
      class: "A".into(),
      expires_at: "2030-01-31".into(),
      endorsements: "N".into(),
      held_other_licenses_last_3_years: Some(false),
      other_licenses: Vec::new(),
    },
    previous_addresses: vec![PreviousAddressFields {
      line1: "9 Elm St".into(),
      city: "Waco".into(),
      state: "TX".into(),
      zip: "76701".into(),
      from_date: "2019-02-01".into(),
      to_date: "2024-08-15".into(),
    }],
    employment_records: vec![employer("Plains Freight", "2021-03"), employer("Lone Star Haul", "2016-07")],
    legal_consents,
  }
}

pub fn employer(name: &str, from_month: &str) -> EmploymentRecordFields {
  EmploymentRecordFields {
    employer_name: name.into(),
    employer_phone: "555-300-1000".into(),
    address_line1: "1 Yard Way".into(),
    city: "Lubbock".into(),
    state: "TX".into(),
    zip: "79401".into(),
    position: "Driver".into(),
    from_month: from_month.into(),
    reason_for_leaving: "Better route".into(),
    subject_to_fmcsr: Some(true),
    safety_sensitive: Some(true),
    ..Default::default()
  }
}

pub fn image(name: &str) -> IncomingFile {
  IncomingFile {
    bytes:        Bytes::from(format!("<svg>{name}</svg>")),
    content_type: Some("image/svg+xml".into()),
    file_name:    Some(format!("{name}.svg")),
  }
}

/// License images plus the five drawn signatures.
pub fn files() -> SubmissionFiles {
  let mut files = SubmissionFiles {
    license_front: Some(image("front")),
    license_back: Some(image("back")),
    ..Default::default()
  };
  for consent in ConsentType::SIGNABLE {
    files.signatures.insert(consent, image(consent.signature_part()));
  }
  files
}

pub fn credentials(password: &str) -> AdminCredentials {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string();
  AdminCredentials { username: "admin".into(), password_hash: hash }
}

pub fn service_with<B: BlobStore>(
  store: SqliteStore,
  blobs: B,
  config: TransactionConfig,
) -> ApplicationService<SqliteStore, B> {
  ApplicationService::new(
    Arc::new(store),
    Arc::new(blobs),
    Arc::new(SsnCipher::from_bytes(KEY)),
    config,
  )
}

pub async fn service(
  blobs: MemoryBlobStore,
) -> ApplicationService<SqliteStore, MemoryBlobStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  service_with(store, blobs, TransactionConfig::default())
}
