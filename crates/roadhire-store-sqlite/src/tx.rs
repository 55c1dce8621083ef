//! [`SqliteTx`] holds one open `BEGIN IMMEDIATE` transaction.

use chrono::Utc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::warn;
use uuid::Uuid;

use roadhire_core::{
  application::{
    ApplicationStatus, DriverApplication, DriverLicense, EmploymentRecord,
    LegalConsent, MedicalCard, NewDriverApplication, NewDriverLicense,
    NewEmploymentRecord, NewLegalConsent, NewMedicalCard, NewPreviousAddress,
    PreviousAddress,
  },
  store::ApplicationTx,
};

use crate::{
  Error, Result,
  encode::{encode_date, encode_dt, encode_uuid, split_blob},
};

/// Holds the store's transaction slot until committed, rolled back or
/// dropped. A dropped transaction is rolled back on the runtime before the
/// slot is released.
pub struct SqliteTx {
  conn:     tokio_rusqlite::Connection,
  permit:   Option<OwnedSemaphorePermit>,
  finished: bool,
}

impl SqliteTx {
  pub(crate) fn new(
    conn: tokio_rusqlite::Connection,
    permit: OwnedSemaphorePermit,
  ) -> Self {
    Self { conn, permit: Some(permit), finished: false }
  }

  async fn finish(&mut self, sql: &'static str) -> Result<()> {
    self.finished = true;
    self
      .conn
      .call(move |conn| match conn.execute_batch(sql) {
        Ok(()) => Ok(()),
        Err(e) => {
          if !conn.is_autocommit() {
            let _ = conn.execute_batch("ROLLBACK");
          }
          Err(e.into())
        }
      })
      .await?;
    Ok(())
  }
}

impl Drop for SqliteTx {
  fn drop(&mut self) {
    if self.finished {
      return;
    }
    let conn = self.conn.clone();
    let permit = self.permit.take();

    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          let result = conn
            .call(|conn| {
              if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
              }
              Ok(())
            })
            .await;
          if let Err(e) = result {
            warn!(error = %e, "rollback of abandoned transaction failed");
          }
          drop(permit);
        });
      }
      Err(_) => {
        warn!("transaction dropped outside a runtime; rollback deferred to next begin");
      }
    }
  }
}

impl ApplicationTx for SqliteTx {
  type Error = Error;

  async fn insert_application(
    &mut self,
    input: NewDriverApplication,
  ) -> Result<DriverApplication> {
    let application = DriverApplication {
      id:             Uuid::new_v4(),
      created_at:     Utc::now(),
      status:         ApplicationStatus::New,
      internal_notes: None,
      reviewed_by:    None,
      reviewed_at:    None,
      applicant:      input.applicant,
      meta:           input.meta,
    };

    let a = &application.applicant;
    let id_str = encode_uuid(application.id);
    let created_at_str = encode_dt(application.created_at);
    let status_str = application.status.to_string();
    let dob_str = encode_date(a.date_of_birth);
    let applicant_type = a.applicant_type.to_string();
    let text = (
      a.first_name.clone(),
      a.last_name.clone(),
      a.phone.clone(),
      a.email.clone(),
    );
    let address = a.current_address.clone();
    let lived_3_years = a.lived_at_current_more_than_3_years;
    let truck = (a.truck_year.clone(), a.truck_make.clone());
    let return_to_duty = a.alcohol_drug_return_to_duty;
    let ssn = (a.ssn_last4.clone(), a.ssn_encrypted.clone());
    let meta = application.meta.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO driver_applications (
             application_id, created_at, status, first_name, last_name,
             date_of_birth, phone, email, address_line1, address_city,
             address_state, address_zip, lived_at_current_more_than_3_years,
             applicant_type, truck_year, truck_make, alcohol_drug_return_to_duty,
             ssn_last4, ssn_encrypted, submitter_ip, user_agent
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
          rusqlite::params![
            id_str,
            created_at_str,
            status_str,
            text.0,
            text.1,
            dob_str,
            text.2,
            text.3,
            address.line1,
            address.city,
            address.state,
            address.zip,
            lived_3_years,
            applicant_type,
            truck.0,
            truck.1,
            return_to_duty,
            ssn.0,
            ssn.1,
            meta.submitter_ip,
            meta.user_agent,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(application)
  }

  async fn insert_license(
    &mut self,
    application_id: Uuid,
    input: NewDriverLicense,
  ) -> Result<DriverLicense> {
    let license = DriverLicense { id: Uuid::new_v4(), application_id, details: input };

    let d = &license.details;
    let id_str = encode_uuid(license.id);
    let app_str = encode_uuid(application_id);
    let expires = encode_date(d.expires_at);
    let others = serde_json::to_string(&d.other_licenses)?;
    let (front_url, front_id) = split_blob(d.front.as_ref());
    let (back_url, back_id) = split_blob(d.back.as_ref());
    let fields = (
      d.number.clone(),
      d.state.clone(),
      d.class.clone(),
      d.endorsements.clone(),
      d.held_other_licenses_last_3_years,
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO driver_licenses (
             license_id, application_id, number, state, class, expires_at,
             endorsements, held_other_licenses, other_licenses,
             front_url, front_public_id, back_url, back_public_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            id_str, app_str, fields.0, fields.1, fields.2, expires, fields.3,
            fields.4, others, front_url, front_id, back_url, back_id,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(license)
  }

  async fn insert_medical_card(
    &mut self,
    application_id: Uuid,
    input: NewMedicalCard,
  ) -> Result<MedicalCard> {
    let card = MedicalCard { id: Uuid::new_v4(), application_id, details: input };

    let id_str = encode_uuid(card.id);
    let app_str = encode_uuid(application_id);
    let expires = card.details.expires_at.map(encode_date);
    let (doc_url, doc_id) = split_blob(card.details.document.as_ref());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO medical_cards (
             medical_card_id, application_id, expires_at,
             document_url, document_public_id
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, app_str, expires, doc_url, doc_id],
        )?;
        Ok(())
      })
      .await?;

    Ok(card)
  }

  async fn insert_previous_addresses(
    &mut self,
    application_id: Uuid,
    input: Vec<NewPreviousAddress>,
  ) -> Result<Vec<PreviousAddress>> {
    let addresses: Vec<PreviousAddress> = input
      .into_iter()
      .map(|details| PreviousAddress { id: Uuid::new_v4(), application_id, details })
      .collect();
    if addresses.is_empty() {
      return Ok(addresses);
    }

    let app_str = encode_uuid(application_id);
    let rows: Vec<_> = addresses
      .iter()
      .map(|a| {
        (
          encode_uuid(a.id),
          a.details.address.clone(),
          a.details.from_date.map(encode_date),
          a.details.to_date.map(encode_date),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "INSERT INTO previous_addresses (
             address_id, application_id, line1, city, state, zip, from_date, to_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (id, addr, from, to) in rows {
          stmt.execute(rusqlite::params![
            id, app_str, addr.line1, addr.city, addr.state, addr.zip, from, to,
          ])?;
        }
        Ok(())
      })
      .await?;

    Ok(addresses)
  }

  async fn insert_employment_records(
    &mut self,
    application_id: Uuid,
    input: Vec<NewEmploymentRecord>,
  ) -> Result<Vec<EmploymentRecord>> {
    let records: Vec<EmploymentRecord> = input
      .into_iter()
      .zip(0u32..)
      .map(|(details, ordinal)| EmploymentRecord {
        id: Uuid::new_v4(),
        application_id,
        ordinal,
        details,
      })
      .collect();
    if records.is_empty() {
      return Ok(records);
    }

    let app_str = encode_uuid(application_id);
    let rows: Vec<_> = records
      .iter()
      .map(|r| (encode_uuid(r.id), r.ordinal, r.details.clone()))
      .collect();

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "INSERT INTO employment_records (
             record_id, application_id, ordinal, employer_name, employer_phone,
             employer_email, address_line1, city, state, zip, country, position,
             from_month, to_month, reason_for_leaving, equipment_class,
             subject_to_fmcsr, safety_sensitive
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18)",
        )?;
        for (id, ordinal, d) in rows {
          stmt.execute(rusqlite::params![
            id,
            app_str,
            ordinal,
            d.employer_name,
            d.employer_phone,
            d.employer_email,
            d.address.line1,
            d.address.city,
            d.address.state,
            d.address.zip,
            d.address.country,
            d.position,
            encode_date(d.from_month),
            d.to_month.map(encode_date),
            d.reason_for_leaving,
            d.equipment_class,
            d.subject_to_fmcsr,
            d.safety_sensitive,
          ])?;
        }
        Ok(())
      })
      .await?;

    Ok(records)
  }

  async fn insert_legal_consents(
    &mut self,
    application_id: Uuid,
    input: Vec<NewLegalConsent>,
  ) -> Result<Vec<LegalConsent>> {
    let consents: Vec<LegalConsent> = input
      .into_iter()
      .map(|details| LegalConsent { id: Uuid::new_v4(), application_id, details })
      .collect();
    if consents.is_empty() {
      return Ok(consents);
    }

    let app_str = encode_uuid(application_id);
    let rows: Vec<_> = consents
      .iter()
      .map(|c| {
        let (url, public_id) = split_blob(c.details.signature.as_ref());
        (
          encode_uuid(c.id),
          c.details.consent_type.to_string(),
          c.details.accepted,
          encode_date(c.details.signed_at),
          url,
          public_id,
          c.details.form_version.clone(),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "INSERT INTO legal_consents (
             consent_id, application_id, consent_type, accepted, signed_at,
             signature_url, signature_public_id, form_version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (id, kind, accepted, signed_at, url, public_id, version) in rows {
          stmt.execute(rusqlite::params![
            id, app_str, kind, accepted, signed_at, url, public_id, version,
          ])?;
        }
        Ok(())
      })
      .await?;

    Ok(consents)
  }

  async fn commit(mut self) -> Result<()> { self.finish("COMMIT").await }

  async fn rollback(mut self) -> Result<()> { self.finish("ROLLBACK").await }
}
