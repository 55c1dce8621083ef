//! HTTP Basic-auth guard for the admin routes.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use roadhire_core::{
  blob::BlobStore,
  crypto::{AdminCredentials, verify_password},
  store::ApplicationStore,
};

use crate::{AppState, error::ApiError};

/// An authenticated admin. Present in a handler means the request carried
/// valid Basic credentials.
#[derive(Debug, Clone)]
pub struct AdminUser {
  pub username: String,
}

/// Check the `Authorization` header against the configured admin.
pub fn verify_basic(
  headers: &HeaderMap,
  admin: &AdminCredentials,
) -> Result<AdminUser, ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != admin.username || !verify_password(&admin.password_hash, password) {
    return Err(ApiError::Unauthorized);
  }

  Ok(AdminUser { username: username.to_owned() })
}

impl<S, B> FromRequestParts<AppState<S, B>> for AdminUser
where
  S: ApplicationStore + 'static,
  B: BlobStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, B>,
  ) -> Result<Self, Self::Rejection> {
    verify_basic(&parts.headers, &state.admin)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;
  use crate::fixtures::credentials;

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = format!("Basic {}", B64.encode(format!("{user}:{pass}")));
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
    headers
  }

  #[test]
  fn correct_credentials() {
    let admin = credentials("secret");
    let user = verify_basic(&basic("admin", "secret"), &admin).unwrap();
    assert_eq!(user.username, "admin");
  }

  #[test]
  fn wrong_password_or_user() {
    let admin = credentials("secret");
    assert!(matches!(
      verify_basic(&basic("admin", "wrong"), &admin),
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      verify_basic(&basic("root", "secret"), &admin),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn missing_or_malformed_header() {
    let admin = credentials("secret");
    assert!(matches!(verify_basic(&HeaderMap::new(), &admin), Err(ApiError::Unauthorized)));

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(verify_basic(&headers, &admin), Err(ApiError::Unauthorized)));

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert!(matches!(verify_basic(&headers, &admin), Err(ApiError::Unauthorized)));
  }
}
