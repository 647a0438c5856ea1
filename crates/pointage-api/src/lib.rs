//! JSON REST API for Pointage.
//!
//! Two axum [`Router`]s: a public one carrying the punch endpoint, and an
//! admin one for the agent directory, punch listings and exports. Auth, TLS
//! and transport concerns are the caller's responsibility; the server guards
//! the admin router before mounting it.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let api = pointage_api::public_router(workflow)
//!   .merge(pointage_api::admin_router(store).route_layer(auth));
//! Router::new().nest("/api", api)
//! ```

pub mod agents;
pub mod error;
pub mod export;
pub mod punch;
pub mod punches;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use pointage_core::{
  context::Geocoder,
  store::{AgentDirectory, PunchLedger},
  workflow::PunchWorkflow,
};

pub use error::ApiError;

/// A backend serving both the directory and the ledger.
pub trait Backend: AgentDirectory + PunchLedger + 'static {}

impl<T> Backend for T where T: AgentDirectory + PunchLedger + 'static {}

/// `POST /punch`, open to every agent.
pub fn public_router<S, G>(workflow: PunchWorkflow<S, S, G>) -> Router<()>
where
  S: Backend,
  G: Geocoder + 'static,
{
  Router::new()
    .route("/punch", post(punch::submit::<S, G>))
    .with_state(workflow)
}

/// Everything under `/admin`.
pub fn admin_router<S: Backend>(store: Arc<S>) -> Router<()> {
  Router::new()
    // Agents
    .route(
      "/admin/agents",
      get(agents::list::<S>).post(agents::create::<S>),
    )
    .route("/admin/agents/lookup", get(agents::lookup::<S>))
    .route(
      "/admin/agents/code-available",
      get(agents::code_available::<S>),
    )
    .route("/admin/agents/generate-code", post(agents::generate_code::<S>))
    .route(
      "/admin/agents/{id}",
      get(agents::get_one::<S>)
        .put(agents::update::<S>)
        .delete(agents::remove::<S>),
    )
    // Punches
    .route("/admin/punches", get(punches::list::<S>))
    .route("/admin/export.csv", get(export::csv::<S>))
    .route("/admin/token", get(punches::token))
    .with_state(store)
}

#[cfg(test)]
mod tests;
