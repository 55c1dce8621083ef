use std::{
  path::Path,
  sync::Arc,
  time::{Duration, Instant},
};

use roadhire_blob::MemoryBlobStore;
use roadhire_core::{
  application::{
    ApplicantType, ApplicationStatus, ApplicationSummary, ConsentType, DriverApplication,
    DriverApplicationRecord, DriverLicense, EmploymentRecord, LegalConsent, MedicalCard,
    NewDriverApplication, NewDriverLicense, NewEmploymentRecord, NewLegalConsent,
    NewMedicalCard, NewPreviousAddress, PreviousAddress, RequestMeta, ReviewUpdate,
  },
  blob::{BlobStore, ResourceClass, StoredBlob, UploadRequest},
  store::{ApplicationStore, ApplicationTx},
};
use tokio::sync::Barrier;
use roadhire_store_sqlite::SqliteStore;

use super::*;
use crate::fixtures::{credentials, fields, files, image, service, service_with};

fn meta() -> RequestMeta {
  RequestMeta {
    submitter_ip: Some("203.0.113.9".into()),
    user_agent:   Some("test-agent".into()),
  }
}

const TABLES: [&str; 6] = [
  "driver_applications",
  "driver_licenses",
  "medical_cards",
  "previous_addresses",
  "employment_records",
  "legal_consents",
];

fn total_rows(path: &Path) -> i64 {
  let raw = rusqlite::Connection::open(path).unwrap();
  TABLES
    .iter()
    .map(|table| {
      raw
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get::<_, i64>(0))
        .unwrap()
    })
    .sum()
}

/// Sleeps before every upload so the transaction budget can be exceeded.
struct SlowBlobs(Duration);

impl BlobStore for SlowBlobs {
  type Error = roadhire_blob::Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob, Self::Error> {
    tokio::time::sleep(self.0).await;
    Ok(StoredBlob { url: format!("slow://{}", request.label), public_id: request.label })
  }
}

/// Holds each required upload until all three have started.
struct RendezvousBlobs(Arc<Barrier>);

impl BlobStore for RendezvousBlobs {
  type Error = roadhire_blob::Error;

  async fn upload(&self, request: UploadRequest) -> Result<StoredBlob, Self::Error> {
    if !request.label.starts_with("consent-") {
      self.0.wait().await;
    }
    Ok(StoredBlob { url: format!("mem://{}", request.label), public_id: request.label })
  }
}

/// A SQLite store whose commits stall before reaching the database.
struct StallingCommit {
  inner: SqliteStore,
  stall: Duration,
}

struct StallingTx {
  inner: <SqliteStore as ApplicationStore>::Tx,
  stall: Duration,
}

impl ApplicationStore for StallingCommit {
  type Error = roadhire_store_sqlite::Error;
  type Tx = StallingTx;

  async fn begin(&self, max_wait: Duration) -> Result<StallingTx, Self::Error> {
    let inner = self.inner.begin(max_wait).await?;
    Ok(StallingTx { inner, stall: self.stall })
  }

  async fn get_application(&self, id: Uuid) -> Result<Option<DriverApplicationRecord>, Self::Error> {
    self.inner.get_application(id).await
  }

  async fn list_applications(
    &self,
    status: Option<ApplicationStatus>,
  ) -> Result<Vec<ApplicationSummary>, Self::Error> {
    self.inner.list_applications(status).await
  }

  async fn review_application(
    &self,
    id: Uuid,
    update: ReviewUpdate,
  ) -> Result<Option<DriverApplication>, Self::Error> {
    self.inner.review_application(id, update).await
  }

  async fn delete_application(&self, id: Uuid) -> Result<bool, Self::Error> {
    self.inner.delete_application(id).await
  }
}

impl ApplicationTx for StallingTx {
  type Error = roadhire_store_sqlite::Error;

  async fn insert_application(
    &mut self,
    input: NewDriverApplication,
  ) -> Result<DriverApplication, Self::Error> {
    self.inner.insert_application(input).await
  }

  async fn insert_license(
    &mut self,
    application_id: Uuid,
    input: NewDriverLicense,
  ) -> Result<DriverLicense, Self::Error> {
    self.inner.insert_license(application_id, input).await
  }

  async fn insert_medical_card(
    &mut self,
    application_id: Uuid,
    input: NewMedicalCard,
  ) -> Result<MedicalCard, Self::Error> {
    self.inner.insert_medical_card(application_id, input).await
  }

  async fn insert_previous_addresses(
    &mut self,
    application_id: Uuid,
    input: Vec<NewPreviousAddress>,
  ) -> Result<Vec<PreviousAddress>, Self::Error> {
    self.inner.insert_previous_addresses(application_id, input).await
  }

  async fn insert_employment_records(
    &mut self,
    application_id: Uuid,
    input: Vec<NewEmploymentRecord>,
  ) -> Result<Vec<EmploymentRecord>, Self::Error> {
    self.inner.insert_employment_records(application_id, input).await
  }

  async fn insert_legal_consents(
    &mut self,
    application_id: Uuid,
    input: Vec<NewLegalConsent>,
  ) -> Result<Vec<LegalConsent>, Self::Error> {
    self.inner.insert_legal_consents(application_id, input).await
  }

  async fn commit(self) -> Result<(), Self::Error> {
    tokio::time::sleep(self.stall).await;
    self.inner.commit().await
  }

  async fn rollback(self) -> Result<(), Self::Error> { self.inner.rollback().await }
}

fn medical_document() -> IncomingFile {
  IncomingFile {
    bytes:        Bytes::from_static(b"%PDF-1.7"),
    content_type: Some("application/pdf".into()),
    file_name:    Some("card.pdf".into()),
  }
}

fn field_error(err: ServiceError) -> ValidationErrors {
  match err {
    ServiceError::Validation(errors) => errors,
    other => panic!("expected validation error, got {other:?}"),
  }
}

// ─── Happy paths ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn company_driver_application_is_created() {
  let blobs = MemoryBlobStore::new();
  let svc = service(blobs.clone()).await;

  let created = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap();
  assert_eq!(created.status, ApplicationStatus::New);

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  let applicant = &record.application.applicant;
  assert_eq!(applicant.applicant_type, ApplicantType::CompanyDriver);
  assert_eq!(applicant.ssn_last4.as_deref(), Some("6789"));
  assert!(applicant.ssn_encrypted.as_deref().unwrap().starts_with("v1:"));
  assert!(applicant.truck_year.is_none());
  assert_eq!(record.application.meta, meta());

  let license = record.license.as_ref().unwrap();
  assert!(license.details.front.is_some());
  assert!(license.details.back.is_some());

  assert_eq!(record.previous_addresses.len(), 1);
  let employers: Vec<_> = record
    .employment_records
    .iter()
    .map(|r| r.details.employer_name.as_str())
    .collect();
  assert_eq!(employers, ["Plains Freight", "Lone Star Haul"]);

  assert_eq!(record.legal_consents.len(), 6);
  assert!(record.legal_consents.iter().all(|c| c.details.accepted));
  assert!(record.unsigned_accepted_consents().is_empty());

  // Safety-performance reuses the PSP image under its own label.
  let labels = blobs.labels();
  assert!(labels.contains(&"consent-safety-performance".to_owned()));
  assert!(labels.contains(&"consent-psp".to_owned()));
  assert_eq!(labels.len(), 2 + 6);
}

#[tokio::test]
async fn blank_ssn_is_not_encrypted() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut fields = fields();
  fields.applicant.ssn = String::new();

  let created = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap();

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert!(record.application.applicant.ssn_last4.is_none());
  assert!(record.application.applicant.ssn_encrypted.is_none());

  let proof = credentials("hunter2").reauthenticate("hunter2").unwrap();
  assert!(svc.reveal_ssn(created.id, &proof).await.unwrap().is_none());
}

#[tokio::test]
async fn implausible_medical_expiration_is_dropped() {
  let blobs = MemoryBlobStore::new();
  let svc = service(blobs.clone()).await;
  let mut fields = fields();
  fields.applicant.medical_card_expires_at = "2099-01-01".into();
  let mut files = files();
  files.medical_card = Some(IncomingFile {
    bytes:        Bytes::from_static(b"%PDF-1.7"),
    content_type: Some("application/pdf".into()),
    file_name:    Some("card.pdf".into()),
  });

  let created = svc
    .create_driver_application(fields, files, meta())
    .await
    .unwrap();

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  let card = record.medical_card.unwrap();
  assert!(card.details.expires_at.is_none());
  assert!(card.details.document.is_some());

  let upload = blobs
    .uploads()
    .into_iter()
    .find(|u| u.label == "medical-card")
    .unwrap();
  assert_eq!(upload.class, ResourceClass::Raw);
}

#[tokio::test]
async fn medical_card_without_date_or_document_is_skipped() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut fields = fields();
  fields.applicant.medical_card_expires_at = String::new();

  let created = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap();

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert!(record.medical_card.is_none());
}

#[tokio::test]
async fn previous_addresses_follow_residence_answer() {
  let svc = service(MemoryBlobStore::new()).await;

  // Recently moved, but no history given: accepted.
  let mut recent = fields();
  recent.previous_addresses.clear();
  let created = svc
    .create_driver_application(recent, files(), meta())
    .await
    .unwrap();
  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert!(record.previous_addresses.is_empty());

  // Long-time resident: any history sent is ignored, even if unfinished.
  let mut settled = fields();
  settled.applicant.lived_at_current_more_than_3_years = Some(true);
  settled.previous_addresses[0].zip.clear();
  let created = svc
    .create_driver_application(settled, files(), meta())
    .await
    .unwrap();
  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert!(record.previous_addresses.is_empty());
  assert!(record.application.applicant.lived_at_current_more_than_3_years);
}

#[tokio::test]
async fn owner_operator_keeps_truck_details() {
  let svc = service(MemoryBlobStore::new()).await;

  let mut missing = fields();
  missing.applicant.applicant_type = Some(ApplicantType::OwnerOperator);
  let err = svc
    .create_driver_application(missing, files(), meta())
    .await
    .unwrap_err();
  let errors = field_error(err);
  assert!(errors.has("truckYear"));
  assert!(errors.has("truckMake"));

  let mut complete = fields();
  complete.applicant.applicant_type = Some(ApplicantType::OwnerOperator);
  complete.applicant.truck_year = "2019".into();
  complete.applicant.truck_make = " Kenworth ".into();
  let created = svc
    .create_driver_application(complete, files(), meta())
    .await
    .unwrap();
  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert_eq!(record.application.applicant.truck_make.as_deref(), Some("Kenworth"));
}

#[tokio::test]
async fn reveal_ssn_returns_digits() {
  let svc = service(MemoryBlobStore::new()).await;
  let created = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap();

  let proof = credentials("hunter2").reauthenticate("hunter2").unwrap();
  let ssn = svc.reveal_ssn(created.id, &proof).await.unwrap().unwrap();
  assert_eq!(ssn.digits(), "123456789");

  assert!(svc.reveal_ssn(Uuid::new_v4(), &proof).await.unwrap().is_none());
}

// ─── Upload failure policies ─────────────────────────────────────────────────

#[tokio::test]
async fn failed_license_upload_leaves_no_rows() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("applications.db");
  let store = SqliteStore::open(&path).await.unwrap();
  let blobs = MemoryBlobStore::new();
  blobs.fail_label("license-front");
  let svc = service_with(store, blobs, TransactionConfig::default());

  let err = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::RequiredUpload { label: "license-front", .. }));

  assert!(svc.store().list_applications(None).await.unwrap().is_empty());
  assert_eq!(total_rows(&path), 0);
}

#[tokio::test]
async fn any_failed_required_upload_leaves_no_rows() {
  for label in ["license-back", "medical-card"] {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("applications.db");
    let store = SqliteStore::open(&path).await.unwrap();
    let blobs = MemoryBlobStore::new();
    blobs.fail_label(label);
    let svc = service_with(store, blobs, TransactionConfig::default());

    let mut files = files();
    files.medical_card = Some(medical_document());
    let err = svc
      .create_driver_application(fields(), files, meta())
      .await
      .unwrap_err();
    assert!(
      matches!(err, ServiceError::RequiredUpload { label: failed, .. } if failed == label),
      "{label}: {err:?}"
    );
    assert_eq!(total_rows(&path), 0, "{label}");
  }
}

#[tokio::test]
async fn required_uploads_run_together() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let blobs = RendezvousBlobs(Arc::new(Barrier::new(3)));
  let svc = service_with(store, blobs, TransactionConfig { max_wait_ms: 1_000, timeout_ms: 2_000 });

  let mut files = files();
  files.medical_card = Some(medical_document());
  let created = svc
    .create_driver_application(fields(), files, meta())
    .await
    .unwrap();

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert!(record.medical_card.unwrap().details.document.is_some());
}

#[tokio::test]
async fn failed_signature_upload_leaves_consent_unsigned() {
  let blobs = MemoryBlobStore::new();
  blobs.fail_label("consent-mvr");
  let svc = service(blobs).await;

  let created = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap();

  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert_eq!(record.legal_consents.len(), 6);
  assert_eq!(record.unsigned_accepted_consents(), vec![ConsentType::Mvr]);
}

#[tokio::test]
async fn missing_signature_images_are_not_errors() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut files = files();
  files.signatures.clear();
  files.signatures.insert(ConsentType::Authorization, image("auth"));

  let created = svc
    .create_driver_application(fields(), files, meta())
    .await
    .unwrap();
  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  assert_eq!(record.unsigned_accepted_consents().len(), 5);
}

// ─── Hard validation failures ────────────────────────────────────────────────

#[tokio::test]
async fn malformed_ssn_is_rejected_before_writing() {
  let blobs = MemoryBlobStore::new();
  let svc = service(blobs.clone()).await;
  let mut fields = fields();
  fields.applicant.ssn = "12-345".into();

  let err = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::InvalidSsnFormat));
  assert!(blobs.uploads().is_empty());
  assert!(svc.store().list_applications(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn impossible_date_of_birth_is_rejected() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut fields = fields();
  fields.applicant.date_of_birth = "1990-02-30".into();

  let err = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::InvalidDateOfBirth(_)));
}

#[tokio::test]
async fn far_future_license_expiration_is_rejected() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut fields = fields();
  fields.license.expires_at = "2099-01-01".into();

  let err = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::InvalidLicenseExpiration(_)));
}

#[tokio::test]
async fn license_images_are_required() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut files = files();
  files.license_back = None;

  let errors = field_error(
    svc
      .create_driver_application(fields(), files, meta())
      .await
      .unwrap_err(),
  );
  assert!(errors.has("licenseBack"));
  assert!(!errors.has("licenseFront"));
}

#[tokio::test]
async fn declined_consent_is_stored_as_declined() {
  let svc = service(MemoryBlobStore::new()).await;
  let mut fields = fields();
  fields.legal_consents[5].accepted = false;

  let created = svc
    .create_driver_application(fields, files(), meta())
    .await
    .unwrap();
  let record = svc.store().get_application(created.id).await.unwrap().unwrap();
  let declined: Vec<_> = record
    .legal_consents
    .iter()
    .filter(|c| !c.details.accepted)
    .map(|c| c.details.consent_type)
    .collect();
  assert_eq!(declined, vec![ConsentType::Mvr]);
}

// ─── Transaction bounds ──────────────────────────────────────────────────────

#[tokio::test]
async fn slow_uploads_time_out_and_roll_back() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("applications.db");
  let store = SqliteStore::open(&path).await.unwrap();
  let svc = service_with(store, SlowBlobs(Duration::from_secs(5)), TransactionConfig {
    max_wait_ms: 1_000,
    timeout_ms:  50,
  });

  let err = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::TransactionTimeout(_)));
  assert_eq!(total_rows(&path), 0);
}

#[tokio::test]
async fn stalled_commit_counts_against_the_budget() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("applications.db");
  let inner = SqliteStore::open(&path).await.unwrap();
  let store = StallingCommit { inner, stall: Duration::from_secs(10) };
  let svc = ApplicationService::new(
    Arc::new(store),
    Arc::new(MemoryBlobStore::new()),
    Arc::new(SsnCipher::from_bytes(crate::fixtures::KEY)),
    TransactionConfig { max_wait_ms: 1_000, timeout_ms: 1_000 },
  );

  let started = Instant::now();
  let err = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap_err();
  assert!(matches!(err, ServiceError::TransactionTimeout(_)));
  assert!(started.elapsed() < Duration::from_secs(10));
  assert_eq!(total_rows(&path), 0);
}

#[tokio::test]
async fn busy_slot_fails_after_max_wait() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let held = store.begin(Duration::from_secs(1)).await.unwrap();
  let svc = service_with(store.clone(), MemoryBlobStore::new(), TransactionConfig {
    max_wait_ms: 20,
    timeout_ms:  1_000,
  });

  let err = svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap_err();
  let ServiceError::Store(source) = err else {
    panic!("expected store error, got {err:?}");
  };
  assert!(matches!(
    source.downcast_ref::<roadhire_store_sqlite::Error>(),
    Some(roadhire_store_sqlite::Error::SlotTimeout(_))
  ));

  held.rollback().await.unwrap();
  svc
    .create_driver_application(fields(), files(), meta())
    .await
    .unwrap();
}

#[test]
fn multipart_part_names_route_to_slots() {
  let mut files = SubmissionFiles::default();
  assert!(files.insert("licenseFront", image("front")));
  assert!(files.insert("consentPSP", image("psp")));
  assert!(!files.insert("firstName", image("nope")));

  assert!(SubmissionFiles::is_file_part("medicalCard"));
  assert!(SubmissionFiles::is_file_part("consentMVR"));
  assert!(!SubmissionFiles::is_file_part("license"));

  let shared = files.signature_for(ConsentType::SafetyPerformance).unwrap();
  assert_eq!(shared.file_name.as_deref(), Some("psp.svg"));
  assert!(files.signature_for(ConsentType::Mvr).is_none());
}
