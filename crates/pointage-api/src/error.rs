//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pointage_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Sort a backend error into a rejected request or a broken store.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.domain() {
      Some(domain) => Self::rejected(domain, err.to_string()),
      None => {
        tracing::error!(error = %err, "store call failed");
        Self::Store(Box::new(err))
      }
    }
  }

  fn rejected(domain: &pointage_core::Error, message: String) -> Self {
    use pointage_core::Error as Domain;

    match domain {
      Domain::AgentNotFound(_) => Self::NotFound(message),
      Domain::CodeAlreadyInUse(_) | Domain::CodeSpaceExhausted => {
        Self::Conflict(message)
      }
      Domain::InvalidCodeFormat(_)
      | Domain::InvalidTokenFormat(_)
      | Domain::InvalidDirection(_) => Self::BadRequest(message),
    }
  }
}

impl From<pointage_core::Error> for ApiError {
  fn from(err: pointage_core::Error) -> Self {
    Self::rejected(&err, err.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
