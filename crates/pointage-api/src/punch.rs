//! `POST /punch`: one code submission for one scanned QR code.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | recorded | `201` |
//! | already punched | `200` |
//! | code rejected, retype | `422` |
//! | bad token or direction | `400` |
//! | body not a punch request | `400` |
//! | store unavailable | `503` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use pointage_core::{
  context::{Geocoder, ReportedLocation},
  punch::PunchEvent,
  workflow::{PunchFailure, PunchState, PunchWorkflow, ScanContext},
};
use serde::{Deserialize, Serialize};

use crate::Backend;

#[derive(Debug, Deserialize)]
pub struct PunchBody {
  pub token:           String,
  #[serde(rename = "type")]
  pub direction:       String,
  pub code:            String,
  #[serde(default)]
  pub latitude:        Option<f64>,
  #[serde(default)]
  pub longitude:       Option<f64>,
  /// The browser refused to share a position.
  #[serde(default)]
  pub location_denied: bool,
}

impl PunchBody {
  fn location(&self) -> ReportedLocation {
    if self.location_denied {
      ReportedLocation::Denied
    } else {
      ReportedLocation::from_parts(self.latitude, self.longitude)
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PunchResponse {
  Recorded { punch: PunchEvent },
  AlreadyPunched { punch: PunchEvent },
  Rejected { error: String, failure: PunchFailure },
  Failed { error: String, failure: PunchFailure },
  /// The body could not be read as a [`PunchBody`].
  #[serde(rename = "failed")]
  Malformed { error: String },
}

impl PunchResponse {
  fn status(&self) -> StatusCode {
    match self {
      Self::Recorded { .. } => StatusCode::CREATED,
      Self::AlreadyPunched { .. } => StatusCode::OK,
      Self::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
      Self::Failed { failure: PunchFailure::PersistenceError, .. } => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      Self::Failed { .. } | Self::Malformed { .. } => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for PunchResponse {
  fn into_response(self) -> Response {
    (self.status(), Json(self)).into_response()
  }
}

/// `POST /punch`
pub async fn submit<S, G>(
  State(workflow): State<PunchWorkflow<S, S, G>>,
  headers: HeaderMap,
  body: Result<Json<PunchBody>, JsonRejection>,
) -> Response
where
  S: Backend,
  G: Geocoder + 'static,
{
  let Json(body) = match body {
    Ok(body) => body,
    Err(rejection) => {
      tracing::debug!(error = %rejection, "malformed punch request");
      return PunchResponse::Malformed { error: rejection.body_text() }
        .into_response();
    }
  };
  let location = body.location();
  let scan = ScanContext {
    token:     body.token,
    direction: body.direction,
    source_ip: client_ip(&headers),
  };

  let response = match workflow.punch(scan, &body.code, &location).await {
    PunchState::Recorded { punch } => PunchResponse::Recorded { punch },
    PunchState::AlreadyPunched { existing } => {
      PunchResponse::AlreadyPunched { punch: existing }
    }
    PunchState::AwaitingCode { rejected: Some(failure) } => {
      PunchResponse::Rejected { error: failure.to_string(), failure }
    }
    PunchState::Failed { failure } => {
      PunchResponse::Failed { error: failure.to_string(), failure }
    }
    other => {
      tracing::error!(state = other.name(), "punch attempt did not settle");
      return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
  };
  response.into_response()
}

/// The first hop of `X-Forwarded-For`, else `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
  };

  header("x-forwarded-for")
    .and_then(|v| v.split(',').next())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .or_else(|| header("x-real-ip"))
    .map(str::to_owned)
}
