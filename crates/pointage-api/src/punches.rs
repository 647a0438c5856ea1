//! Handlers for punch listings and daily token issuance.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/punches` | `?date=YYYY-MM-DD&code=…&direction=entree\|sortie&limit=…&offset=…` |
//! | `GET`  | `/admin/token` | `?date=YYYY-MM-DD`, defaults to today |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{Local, NaiveDate};
use pointage_core::{
  agent::AgentIndex,
  code::PersonalCode,
  punch::{Direction, PunchEvent},
  store::PunchQuery,
  token,
};
use serde::{Deserialize, Serialize};

use crate::{Backend, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// Listing filters, shared with the CSV export.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub date:      Option<NaiveDate>,
  pub code:      Option<String>,
  pub direction: Option<String>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

impl TryFrom<ListParams> for PunchQuery {
  type Error = ApiError;

  fn try_from(params: ListParams) -> Result<Self, ApiError> {
    Ok(PunchQuery {
      calendar_date: params.date,
      personal_code: params
        .code
        .as_deref()
        .map(PersonalCode::parse)
        .transpose()?,
      direction:     params
        .direction
        .as_deref()
        .map(Direction::parse)
        .transpose()?,
      limit:         params.limit,
      offset:        params.offset,
    })
  }
}

/// A punch as shown to an administrator.
#[derive(Debug, Serialize)]
pub struct ListedPunch {
  #[serde(flatten)]
  pub punch:        PunchEvent,
  pub display_name: String,
}

/// Punches matching `params` together with the agent snapshot used to label
/// them.
pub(crate) async fn fetch<S: Backend>(
  store: &S,
  params: ListParams,
) -> Result<(Vec<PunchEvent>, AgentIndex), ApiError> {
  let query = PunchQuery::try_from(params)?;
  let punches = store
    .list_punches(query)
    .await
    .map_err(ApiError::from_store)?;
  let agents = store.list_agents().await.map_err(ApiError::from_store)?;
  Ok((punches, AgentIndex::new(&agents)))
}

/// `GET /admin/punches`
pub async fn list<S: Backend>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ListedPunch>>, ApiError> {
  let (punches, index) = fetch(store.as_ref(), params).await?;
  let listed = punches
    .into_iter()
    .map(|punch| ListedPunch {
      display_name: index.display_name(&punch),
      punch,
    })
    .collect();
  Ok(Json(listed))
}

// ─── Token ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenParams {
  pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DailyToken {
  pub date:  NaiveDate,
  pub token: String,
}

/// `GET /admin/token[?date=YYYY-MM-DD]`
pub async fn token(Query(params): Query<TokenParams>) -> Json<DailyToken> {
  let date = params.date.unwrap_or_else(|| Local::now().date_naive());
  Json(DailyToken { date, token: token::encode(date) })
}
