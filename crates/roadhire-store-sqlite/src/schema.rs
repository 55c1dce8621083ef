//! SQL schema for the driver-application store.
//!
//! Executed once at connection startup. Every child table references the
//! root row with `ON DELETE CASCADE`, so deleting an application removes its
//! whole graph.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS driver_applications (
    application_id      TEXT PRIMARY KEY,
    created_at          TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    status              TEXT NOT NULL DEFAULT 'NEW',
    first_name          TEXT NOT NULL,
    last_name           TEXT NOT NULL,
    date_of_birth       TEXT NOT NULL,   -- YYYY-MM-DD, no timezone
    phone               TEXT NOT NULL,
    email               TEXT NOT NULL,
    address_line1       TEXT NOT NULL,
    address_city        TEXT NOT NULL,
    address_state       TEXT NOT NULL,
    address_zip         TEXT NOT NULL,
    lived_at_current_more_than_3_years INTEGER NOT NULL,
    applicant_type      TEXT NOT NULL,   -- 'COMPANY_DRIVER' | 'OWNER_OPERATOR'
    truck_year          TEXT,
    truck_make          TEXT,
    alcohol_drug_return_to_duty INTEGER,
    ssn_last4           TEXT,
    ssn_encrypted       TEXT,            -- AEAD ciphertext, never plaintext
    submitter_ip        TEXT,
    user_agent          TEXT,
    internal_notes      TEXT,
    reviewed_by         TEXT,
    reviewed_at         TEXT
);

CREATE TABLE IF NOT EXISTS driver_licenses (
    license_id          TEXT PRIMARY KEY,
    application_id      TEXT NOT NULL UNIQUE
                        REFERENCES driver_applications(application_id) ON DELETE CASCADE,
    number              TEXT NOT NULL,
    state               TEXT NOT NULL,
    class               TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    endorsements        TEXT NOT NULL DEFAULT '',
    held_other_licenses INTEGER NOT NULL,
    other_licenses      TEXT NOT NULL DEFAULT '[]',
    front_url           TEXT,
    front_public_id     TEXT,
    back_url            TEXT,
    back_public_id      TEXT
);

CREATE TABLE IF NOT EXISTS medical_cards (
    medical_card_id     TEXT PRIMARY KEY,
    application_id      TEXT NOT NULL UNIQUE
                        REFERENCES driver_applications(application_id) ON DELETE CASCADE,
    expires_at          TEXT,
    document_url        TEXT,
    document_public_id  TEXT
);

CREATE TABLE IF NOT EXISTS previous_addresses (
    address_id          TEXT PRIMARY KEY,
    application_id      TEXT NOT NULL
                        REFERENCES driver_applications(application_id) ON DELETE CASCADE,
    line1               TEXT NOT NULL,
    city                TEXT NOT NULL,
    state               TEXT NOT NULL,
    zip                 TEXT NOT NULL,
    from_date           TEXT,
    to_date             TEXT
);

CREATE TABLE IF NOT EXISTS employment_records (
    record_id           TEXT PRIMARY KEY,
    application_id      TEXT NOT NULL
                        REFERENCES driver_applications(application_id) ON DELETE CASCADE,
    ordinal             INTEGER NOT NULL,
    employer_name       TEXT NOT NULL,
    employer_phone      TEXT,
    employer_email      TEXT,
    address_line1       TEXT NOT NULL,
    city                TEXT NOT NULL,
    state               TEXT NOT NULL,
    zip                 TEXT NOT NULL,
    country             TEXT NOT NULL DEFAULT 'US',
    position            TEXT NOT NULL,
    from_month          TEXT NOT NULL,   -- first of the month
    to_month            TEXT,
    reason_for_leaving  TEXT NOT NULL,
    equipment_class     TEXT,
    subject_to_fmcsr    INTEGER NOT NULL,
    safety_sensitive    INTEGER NOT NULL,
    UNIQUE (application_id, ordinal)
);

CREATE TABLE IF NOT EXISTS legal_consents (
    consent_id          TEXT PRIMARY KEY,
    application_id      TEXT NOT NULL
                        REFERENCES driver_applications(application_id) ON DELETE CASCADE,
    consent_type        TEXT NOT NULL,
    accepted            INTEGER NOT NULL,
    signed_at           TEXT NOT NULL,
    signature_url       TEXT,
    signature_public_id TEXT,
    form_version        TEXT NOT NULL,
    UNIQUE (application_id, consent_type)
);

CREATE INDEX IF NOT EXISTS applications_status_idx  ON driver_applications(status);
CREATE INDEX IF NOT EXISTS applications_created_idx ON driver_applications(created_at);
CREATE INDEX IF NOT EXISTS addresses_app_idx        ON previous_addresses(application_id);
CREATE INDEX IF NOT EXISTS employment_app_idx       ON employment_records(application_id);
CREATE INDEX IF NOT EXISTS consents_app_idx         ON legal_consents(application_id);

PRAGMA user_version = 1;
";
