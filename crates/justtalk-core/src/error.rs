//! Error types for `justtalk-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A voting action was attempted without a caller identity.
  #[error("authentication required")]
  Unauthenticated,

  /// The post does not exist, is deleted, or is not in fact mode.
  #[error("post {0} cannot be voted on")]
  InvalidTarget(Uuid),

  #[error("invalid {field}: {reason}")]
  InvalidArgument {
    field:  &'static str,
    reason: String,
  },

  /// A fact post is missing a required field.
  #[error("missing required field: {field}")]
  Validation { field: &'static str },

  /// The aggregator was asked to recompute a post that is not in fact mode.
  #[error("consensus does not apply to post {0}")]
  NotApplicable(Uuid),

  /// A concurrent writer got in the way; the operation may be retried.
  #[error("write conflict: {0}")]
  Conflict(String),

  #[error("store unavailable: {0}")]
  Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidArgument { field, reason: reason.into() }
  }

  /// The offending input field, if the error points at one.
  pub fn field(&self) -> Option<&'static str> {
    match self {
      Self::InvalidArgument { field, .. } | Self::Validation { field } => Some(field),
      _ => None,
    }
  }

  /// Stable snake_case name of the error kind.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "unauthenticated",
      Self::InvalidTarget(_) => "invalid_target",
      Self::InvalidArgument { .. } => "invalid_argument",
      Self::Validation { .. } => "validation_error",
      Self::NotApplicable(_) => "not_applicable",
      Self::Conflict(_) => "conflict",
      Self::Unavailable(_) => "unavailable",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
