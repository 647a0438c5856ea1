//! Handlers for `/admin/agents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/agents` | Sorted by display name |
//! | `POST`   | `/admin/agents` | Body: `{"personal_code":"4821","display_name":"…"}`; 409 if the code is taken |
//! | `GET`    | `/admin/agents/lookup` | `?code=4821` or `?ip=…`; 404 if nobody matches |
//! | `GET`    | `/admin/agents/code-available` | `?code=4821[&excluding=<agent id>]` |
//! | `POST`   | `/admin/agents/generate-code` | `{"code":"…"}`, unused at call time |
//! | `GET`    | `/admin/agents/{id}` | 404 if not found |
//! | `PUT`    | `/admin/agents/{id}` | Same body as `POST` |
//! | `DELETE` | `/admin/agents/{id}` | 204; past punches are kept |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use pointage_core::{
  agent::{AgentInput, AgentRecord},
  code::PersonalCode,
  store::AgentDirectory,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Body ─────────────────────────────────────────────────────────────────────

/// Agent fields as typed by an administrator. The code is kept as a string so
/// a malformed one is reported as a 400 rather than a deserialisation error.
#[derive(Debug, Deserialize)]
pub struct AgentBody {
  pub personal_code: String,
  pub display_name:  String,
  #[serde(default)]
  pub ip_hint:       Option<String>,
}

impl TryFrom<AgentBody> for AgentInput {
  type Error = ApiError;

  fn try_from(body: AgentBody) -> Result<Self, ApiError> {
    let personal_code = PersonalCode::parse(&body.personal_code)?;
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
      return Err(ApiError::BadRequest("display_name must not be empty".into()));
    }
    Ok(AgentInput {
      personal_code,
      display_name: display_name.to_owned(),
      ip_hint: body
        .ip_hint
        .map(|ip| ip.trim().to_owned())
        .filter(|ip| !ip.is_empty()),
    })
  }
}

// ─── List / create ────────────────────────────────────────────────────────────

/// `GET /admin/agents`
pub async fn list<S: AgentDirectory>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<AgentRecord>>, ApiError> {
  let agents = store.list_agents().await.map_err(ApiError::from_store)?;
  Ok(Json(agents))
}

/// `POST /admin/agents`
pub async fn create<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Json(body): Json<AgentBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = AgentInput::try_from(body)?;
  let agent = store.add_agent(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(agent)))
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  pub code: Option<String>,
  pub ip:   Option<String>,
}

/// `GET /admin/agents/lookup?code=<code>` or `?ip=<ip>`
pub async fn lookup<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Query(params): Query<LookupParams>,
) -> Result<Json<AgentRecord>, ApiError> {
  let found = match (params.code, params.ip) {
    (Some(code), _) => {
      let code = PersonalCode::parse(&code)?;
      store.find_by_code(code).await
    }
    (None, Some(ip)) => store.find_by_legacy_ip(ip).await,
    (None, None) => {
      return Err(ApiError::BadRequest("either code or ip is required".into()));
    }
  };
  let agent = found
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound("no matching agent".into()))?;
  Ok(Json(agent))
}

// ─── Code availability ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
  pub code:      String,
  /// The agent being edited, whose own code does not count as taken.
  pub excluding: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CodeAvailability {
  pub code:      PersonalCode,
  pub available: bool,
}

/// `GET /admin/agents/code-available?code=<code>[&excluding=<id>]`
///
/// Lets the agent form flag a taken code while it is being typed.
pub async fn code_available<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Query(params): Query<AvailabilityParams>,
) -> Result<Json<CodeAvailability>, ApiError> {
  let code = PersonalCode::parse(&params.code)?;
  let available = store
    .is_code_unique(code.clone(), params.excluding)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(CodeAvailability { code, available }))
}

// ─── Generate code ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GeneratedCode {
  pub code: PersonalCode,
}

/// `POST /admin/agents/generate-code`
pub async fn generate_code<S: AgentDirectory>(
  State(store): State<Arc<S>>,
) -> Result<Json<GeneratedCode>, ApiError> {
  let code = store
    .generate_unique_code()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(GeneratedCode { code }))
}

// ─── One agent ────────────────────────────────────────────────────────────────

/// `GET /admin/agents/{id}`
pub async fn get_one<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AgentRecord>, ApiError> {
  let agent = store
    .get_agent(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("agent {id} not found")))?;
  Ok(Json(agent))
}

/// `PUT /admin/agents/{id}`
pub async fn update<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AgentBody>,
) -> Result<Json<AgentRecord>, ApiError> {
  let input = AgentInput::try_from(body)?;
  let agent = store
    .update_agent(id, input)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(agent))
}

/// `DELETE /admin/agents/{id}`
pub async fn remove<S: AgentDirectory>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  store.remove_agent(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
