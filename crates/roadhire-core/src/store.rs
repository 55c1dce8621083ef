//! The `ApplicationStore` trait and its transaction handle.
//!
//! The trait is implemented by storage backends (e.g. `roadhire-store-sqlite`).
//! The service layer depends on this abstraction, not on any concrete backend.

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::application::{
  ApplicationStatus, ApplicationSummary, DriverApplication,
  DriverApplicationRecord, DriverLicense, EmploymentRecord, LegalConsent,
  MedicalCard, NewDriverApplication, NewDriverLicense, NewEmploymentRecord,
  NewLegalConsent, NewMedicalCard, NewPreviousAddress, PreviousAddress,
  ReviewUpdate,
};

/// Abstraction over a driver-application store backend.
///
/// Writes happen only inside an [`ApplicationTx`]; an application and all of
/// its children become visible together on commit or not at all.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ApplicationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Tx: ApplicationTx<Error = Self::Error>;

  /// Open a write transaction, waiting at most `max_wait` for one to become
  /// available.
  fn begin(
    &self,
    max_wait: Duration,
  ) -> impl Future<Output = Result<Self::Tx, Self::Error>> + Send + '_;

  /// Load the full application graph. Returns `None` if not found.
  fn get_application(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DriverApplicationRecord>, Self::Error>>
  + Send
  + '_;

  /// Newest first, optionally filtered by status.
  fn list_applications(
    &self,
    status: Option<ApplicationStatus>,
  ) -> impl Future<Output = Result<Vec<ApplicationSummary>, Self::Error>> + Send + '_;

  /// Apply an admin review and stamp `reviewed_by` / `reviewed_at`.
  /// Returns `None` if the application does not exist.
  fn review_application(
    &self,
    id: Uuid,
    update: ReviewUpdate,
  ) -> impl Future<Output = Result<Option<DriverApplication>, Self::Error>> + Send + '_;

  /// Delete an application and, by cascade, all of its children. Returns
  /// whether anything was deleted.
  fn delete_application(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

/// An open write transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must roll it back.
pub trait ApplicationTx: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert the root row. The store assigns the id, `created_at` and the
  /// initial `NEW` status.
  fn insert_application(
    &mut self,
    input: NewDriverApplication,
  ) -> impl Future<Output = Result<DriverApplication, Self::Error>> + Send + '_;

  fn insert_license(
    &mut self,
    application_id: Uuid,
    input: NewDriverLicense,
  ) -> impl Future<Output = Result<DriverLicense, Self::Error>> + Send + '_;

  fn insert_medical_card(
    &mut self,
    application_id: Uuid,
    input: NewMedicalCard,
  ) -> impl Future<Output = Result<MedicalCard, Self::Error>> + Send + '_;

  fn insert_previous_addresses(
    &mut self,
    application_id: Uuid,
    input: Vec<NewPreviousAddress>,
  ) -> impl Future<Output = Result<Vec<PreviousAddress>, Self::Error>> + Send + '_;

  /// Records keep their submitted order via an ordinal column.
  fn insert_employment_records(
    &mut self,
    application_id: Uuid,
    input: Vec<NewEmploymentRecord>,
  ) -> impl Future<Output = Result<Vec<EmploymentRecord>, Self::Error>> + Send + '_;

  fn insert_legal_consents(
    &mut self,
    application_id: Uuid,
    input: Vec<NewLegalConsent>,
  ) -> impl Future<Output = Result<Vec<LegalConsent>, Self::Error>> + Send + '_;

  fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn rollback(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
