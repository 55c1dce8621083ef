//! [`SqliteStore`] is the SQLite implementation of [`ApplicationStore`].

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};
use uuid::Uuid;

use roadhire_core::{
  application::{
    ApplicationStatus, ApplicationSummary, DriverApplication,
    DriverApplicationRecord, ReviewUpdate,
  },
  store::ApplicationStore,
};

use crate::{
  Error, Result,
  encode::{
    RawApplication, RawEmploymentRecord, RawLegalConsent, RawLicense,
    RawMedicalCard, RawPreviousAddress, RawSummary, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  tx::SqliteTx,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A driver-application store backed by a single SQLite file.
///
/// The underlying connection is a single serialized handle, so an open
/// transaction would see any statement issued alongside it. Every operation
/// therefore holds the one transaction slot while it runs.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  slot: Arc<Semaphore>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self { conn, slot: Arc::new(Semaphore::new(1)) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Hold the slot for a read.
  async fn read_slot(&self) -> Result<SemaphorePermit<'_>> {
    self.slot.acquire().await.map_err(|_| Error::Closed)
  }

  async fn write_slot(&self, max_wait: Duration) -> Result<OwnedSemaphorePermit> {
    tokio::time::timeout(max_wait, self.slot.clone().acquire_owned())
      .await
      .map_err(|_| Error::SlotTimeout(max_wait))?
      .map_err(|_| Error::Closed)
  }
}

// ─── ApplicationStore impl ───────────────────────────────────────────────────

impl ApplicationStore for SqliteStore {
  type Error = Error;
  type Tx = SqliteTx;

  async fn begin(&self, max_wait: Duration) -> Result<SqliteTx> {
    let permit = self.write_slot(max_wait).await?;

    self
      .conn
      .call(|conn| {
        // A transaction dropped outside a runtime could not be rolled back
        // at the time; finish it now.
        if !conn.is_autocommit() {
          conn.execute_batch("ROLLBACK")?;
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
      })
      .await?;

    Ok(SqliteTx::new(self.conn.clone(), permit))
  }

  async fn get_application(&self, id: Uuid) -> Result<Option<DriverApplicationRecord>> {
    let _slot = self.read_slot().await?;
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM driver_applications WHERE application_id = ?1",
          RawApplication::COLUMNS
        );
        let Some(app) = conn
          .query_row(&sql, rusqlite::params![id_str], RawApplication::from_row)
          .optional()?
        else {
          return Ok(None);
        };

        let license = conn
          .query_row(
            "SELECT * FROM driver_licenses WHERE application_id = ?1",
            rusqlite::params![id_str],
            RawLicense::from_row,
          )
          .optional()?;

        let medical_card = conn
          .query_row(
            "SELECT * FROM medical_cards WHERE application_id = ?1",
            rusqlite::params![id_str],
            RawMedicalCard::from_row,
          )
          .optional()?;

        let addresses = conn
          .prepare(
            "SELECT * FROM previous_addresses WHERE application_id = ?1
             ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], RawPreviousAddress::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let employment = conn
          .prepare(
            "SELECT * FROM employment_records WHERE application_id = ?1
             ORDER BY ordinal",
          )?
          .query_map(rusqlite::params![id_str], RawEmploymentRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let consents = conn
          .prepare(
            "SELECT * FROM legal_consents WHERE application_id = ?1
             ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], RawLegalConsent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((app, license, medical_card, addresses, employment, consents)))
      })
      .await?;

    let Some((app, license, medical_card, addresses, employment, consents)) = raw
    else {
      return Ok(None);
    };

    Ok(Some(DriverApplicationRecord {
      application:        app.into_application()?,
      license:            license.map(RawLicense::into_license).transpose()?,
      medical_card:       medical_card
        .map(RawMedicalCard::into_medical_card)
        .transpose()?,
      previous_addresses: addresses
        .into_iter()
        .map(RawPreviousAddress::into_previous_address)
        .collect::<Result<_>>()?,
      employment_records: employment
        .into_iter()
        .map(RawEmploymentRecord::into_employment_record)
        .collect::<Result<_>>()?,
      legal_consents:     consents
        .into_iter()
        .map(RawLegalConsent::into_legal_consent)
        .collect::<Result<_>>()?,
    }))
  }

  async fn list_applications(
    &self,
    status: Option<ApplicationStatus>,
  ) -> Result<Vec<ApplicationSummary>> {
    let _slot = self.read_slot().await?;
    let status_str = status.map(|s| s.to_string());

    let raws: Vec<RawSummary> = self
      .conn
      .call(move |conn| {
        let rows = conn
          .prepare(
            "SELECT application_id, created_at, status, first_name, last_name,
                    applicant_type, reviewed_at
             FROM driver_applications
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC",
          )?
          .query_map(rusqlite::params![status_str], RawSummary::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSummary::into_summary).collect()
  }

  async fn review_application(
    &self,
    id: Uuid,
    update: ReviewUpdate,
  ) -> Result<Option<DriverApplication>> {
    let _slot = self.read_slot().await?;
    let id_str = encode_uuid(id);
    let status_str = update.status.map(|s| s.to_string());
    let set_notes = update.internal_notes.is_some();
    let notes = update.internal_notes.flatten();
    let reviewed_at = encode_dt(Utc::now());
    let reviewed_by = update.reviewed_by;

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE driver_applications
           SET status         = COALESCE(?2, status),
               internal_notes = CASE WHEN ?3 THEN ?4 ELSE internal_notes END,
               reviewed_by    = ?5,
               reviewed_at    = ?6
           WHERE application_id = ?1",
          rusqlite::params![id_str, status_str, set_notes, notes, reviewed_by, reviewed_at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let sql = format!(
          "SELECT {} FROM driver_applications WHERE application_id = ?1",
          RawApplication::COLUMNS
        );
        Ok(Some(conn.query_row(&sql, rusqlite::params![id_str], RawApplication::from_row)?))
      })
      .await?;

    raw.map(RawApplication::into_application).transpose()
  }

  async fn delete_application(&self, id: Uuid) -> Result<bool> {
    let _slot = self.read_slot().await?;
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM driver_applications WHERE application_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }
}
