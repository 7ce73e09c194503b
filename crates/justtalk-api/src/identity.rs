//! Caller identity extractor.
//!
//! The upstream identity provider authenticates the request and forwards the
//! neighbor's id in `X-User-Id`. This layer trusts that header as-is.

use axum::{extract::FromRequestParts, http::request::Parts};
use justtalk_core::Error as CoreError;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated neighbor's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's id, or `None` for an anonymous request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<Uuid>);

impl Caller {
  /// The caller's id, or `Unauthenticated`.
  pub fn require(self) -> Result<Uuid, ApiError> {
    self.0.ok_or(ApiError::Core(CoreError::Unauthenticated))
  }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
      return Ok(Caller(None));
    };

    // A header that does not name a user identifies nobody.
    let id = value
      .to_str()
      .ok()
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or(ApiError::Core(CoreError::Unauthenticated))?;
    Ok(Caller(Some(id)))
  }
}
