//! Route handlers.
//!
//! | Method   | Path                              | Notes |
//! |----------|-----------------------------------|-------|
//! | `POST`   | `/api/driver-applications`        | multipart; `201` + `{id, status, createdAt}` |
//! | `GET`    | `/api/admin/applications`         | optional `?status=NEW\|IN_REVIEW\|…` |
//! | `GET`    | `/api/admin/applications/{id}`    | full graph; 404 if missing |
//! | `PATCH`  | `/api/admin/applications/{id}`    | `{"status"?, "internalNotes"?}` |
//! | `DELETE` | `/api/admin/applications/{id}`    | `204`; children cascade |
//! | `POST`   | `/api/admin/applications/{id}/ssn`| `{"password"}`; 403 on a bad password |
//! | `GET`    | `/healthz`                        | liveness |
//!
//! Every `/api/admin` route requires an [`AdminUser`].

use axum::{
  Json,
  extract::{Multipart, Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use roadhire_core::{
  application::{
    ApplicationStatus, ApplicationSummary, DriverApplication,
    DriverApplicationRecord, ReviewUpdate,
  },
  blob::BlobStore,
  store::ApplicationStore,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AdminUser,
  error::ApiError,
  multipart::{read_submission, request_meta},
};

fn not_found(id: Uuid) -> ApiError { ApiError::NotFound(format!("application {id} not found")) }

// ─── Submit ──────────────────────────────────────────────────────────────────

/// `POST /api/driver-applications`
pub async fn submit<S, B>(
  State(state): State<AppState<S, B>>,
  headers: HeaderMap,
  multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let submission = read_submission(multipart).await?;
  let created = state
    .service
    .create_driver_application(submission.fields, submission.files, request_meta(&headers))
    .await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<ApplicationStatus>,
}

/// `GET /api/admin/applications[?status=<status>]`
pub async fn list<S, B>(
  _admin: AdminUser,
  State(state): State<AppState<S, B>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApplicationSummary>>, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let summaries = state
    .service
    .store()
    .list_applications(params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summaries))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /api/admin/applications/{id}`
pub async fn get_one<S, B>(
  _admin: AdminUser,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DriverApplicationRecord>, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let record = state
    .service
    .store()
    .get_application(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(record))
}

// ─── Review ──────────────────────────────────────────────────────────────────

/// Distinguishes an absent key (`None`) from an explicit `null`
/// (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
  pub status:         Option<ApplicationStatus>,
  /// `null` clears the notes; omitting the key keeps them.
  #[serde(default, deserialize_with = "present")]
  pub internal_notes: Option<Option<String>>,
}

/// `PATCH /api/admin/applications/{id}`
pub async fn review<S, B>(
  admin: AdminUser,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<DriverApplication>, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let update = ReviewUpdate {
    status:         body.status,
    internal_notes: body.internal_notes,
    reviewed_by:    admin.username,
  };
  let application = state
    .service
    .store()
    .review_application(id, update)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  info!(application_id = %id, status = %application.status, "application reviewed");
  Ok(Json(application))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /api/admin/applications/{id}`
pub async fn delete<S, B>(
  admin: AdminUser,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let deleted = state
    .service
    .store()
    .delete_application(id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(not_found(id));
  }
  info!(application_id = %id, admin = %admin.username, "application deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Reveal SSN ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RevealBody {
  pub password: String,
}

/// `POST /api/admin/applications/{id}/ssn`
pub async fn reveal_ssn<S, B>(
  _admin: AdminUser,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RevealBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let proof = state
    .admin
    .reauthenticate(&body.password)
    .map_err(|_| ApiError::Forbidden)?;
  let ssn = state
    .service
    .reveal_ssn(id, &proof)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no SSN on file for application {id}")))?;
  Ok(Json(json!({ "ssn": ssn.digits() })))
}

/// `GET /healthz`
pub async fn healthz() -> &'static str { "ok" }
