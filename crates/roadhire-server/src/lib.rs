//! HTTP front end for driver applications.
//!
//! Exposes an axum [`Router`] that accepts multipart submissions and serves
//! the admin review endpoints, backed by any [`ApplicationStore`] and
//! [`BlobStore`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod service;

pub use config::ServerConfig;
pub use error::ApiError;
pub use service::ApplicationService;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use roadhire_core::{blob::BlobStore, crypto::AdminCredentials, store::ApplicationStore};
use tower_http::trace::TraceLayer;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, B> {
  pub service:          Arc<ApplicationService<S, B>>,
  pub admin:            Arc<AdminCredentials>,
  /// Limit on the whole submission body.
  pub max_upload_bytes: usize,
}

impl<S, B> Clone for AppState<S, B> {
  fn clone(&self) -> Self {
    Self {
      service:          self.service.clone(),
      admin:            self.admin.clone(),
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full router: public submission, admin API and health check.
pub fn router<S, B>(state: AppState<S, B>) -> Router
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  let submit = post(handlers::submit::<S, B>)
    .layer(DefaultBodyLimit::max(state.max_upload_bytes));

  Router::new()
    .route("/api/driver-applications", submit)
    .route("/api/admin/applications", get(handlers::list::<S, B>))
    .route(
      "/api/admin/applications/{id}",
      get(handlers::get_one::<S, B>)
        .patch(handlers::review::<S, B>)
        .delete(handlers::delete::<S, B>),
    )
    .route("/api/admin/applications/{id}/ssn", post(handlers::reveal_ssn::<S, B>))
    .route("/healthz", get(handlers::healthz))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod fixtures;
