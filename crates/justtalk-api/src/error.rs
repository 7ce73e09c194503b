//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use justtalk_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),
}

impl ApiError {
  /// On read paths a missing or deleted post is simply not there.
  pub(crate) fn on_read(e: CoreError) -> Self {
    match e {
      CoreError::InvalidTarget(id) => Self::NotFound(format!("post {id} not found")),
      other => Self::Core(other),
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Forbidden(_) => StatusCode::FORBIDDEN,
      Self::Core(e) => match e {
        CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
        CoreError::InvalidTarget(_) | CoreError::NotApplicable(_) => StatusCode::CONFLICT,
        CoreError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        CoreError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Conflict(_) | CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Self::Core(e) => e.code(),
      Self::NotFound(_) => "not_found",
      Self::Forbidden(_) => "forbidden",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let field = match &self {
      Self::Core(e) => e.field(),
      _ => None,
    };
    let body = json!({
      "error": self.to_string(),
      "code":  self.code(),
      "field": field,
    });
    (status, Json(body)).into_response()
  }
}
