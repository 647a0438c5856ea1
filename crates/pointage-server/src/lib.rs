//! HTTP server assembly for Pointage.
//!
//! Mounts the public punch endpoint and the Basic-auth-guarded admin API
//! from `pointage-api` under `/api`, and wires the configured reverse
//! geocoder into the punch workflow.

pub mod auth;
pub mod error;
pub mod geocode;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use pointage_api::Backend;
use pointage_core::{
  context::Geocoder,
  workflow::{PunchWorkflow, WorkflowConfig},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `POINTAGE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub admin_username:         String,
  pub admin_password_hash:    String,
  #[serde(default = "default_geolocation_timeout_ms")]
  pub geolocation_timeout_ms: u64,
  #[serde(default = "default_geocoder_url")]
  pub geocoder_url:           String,
  #[serde(default = "default_geocoder_user_agent")]
  pub geocoder_user_agent:    String,
  #[serde(default = "default_geocoder_enabled")]
  pub geocoder_enabled:       bool,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_geolocation_timeout_ms() -> u64 { 10_000 }

fn default_geocoder_url() -> String {
  "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocoder_user_agent() -> String {
  concat!("pointage-server/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_geocoder_enabled() -> bool { true }

impl ServerConfig {
  pub fn geolocation_timeout(&self) -> Duration {
    Duration::from_millis(self.geolocation_timeout_ms)
  }

  pub fn workflow_config(&self) -> WorkflowConfig {
    WorkflowConfig { geolocation_timeout: self.geolocation_timeout() }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, G>(
  store: Arc<S>,
  workflow: PunchWorkflow<S, S, G>,
  auth: Arc<AuthConfig>,
) -> Router
where
  S: Backend,
  G: Geocoder + 'static,
{
  let admin = pointage_api::admin_router(store)
    .route_layer(middleware::from_fn_with_state(auth, require_admin));
  let api = pointage_api::public_router(workflow).merge(admin);

  Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use pointage_core::{
    agent::AgentInput, code::PersonalCode, context::NoGeocoder,
    store::AgentDirectory,
  };
  use pointage_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt;

  use super::*;

  async fn app(password: &str) -> Router {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    store
      .add_agent(AgentInput {
        personal_code: PersonalCode::parse("4821").unwrap(),
        display_name:  "Dupont".to_string(),
        ip_hint:       None,
      })
      .await
      .unwrap();

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    let auth = Arc::new(AuthConfig {
      username:      "admin".to_string(),
      password_hash: hash,
    });

    let workflow =
      PunchWorkflow::new(store.clone(), store.clone(), Arc::new(NoGeocoder));
    router(store, workflow, auth)
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn get(app: Router, uri: &str, auth: Option<String>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = auth {
      builder = builder.header(header::AUTHORIZATION, value);
    }
    app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
  }

  #[tokio::test]
  async fn admin_requires_credentials() {
    let app = app("secret").await;

    let resp = get(app.clone(), "/api/admin/agents", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      resp.headers()[header::WWW_AUTHENTICATE],
      "Basic realm=\"pointage\""
    );

    let resp = get(
      app.clone(),
      "/api/admin/agents",
      Some(auth_header("admin", "wrong")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = get(
      app,
      "/api/admin/agents",
      Some(auth_header("admin", "secret")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn punch_is_public() {
    let app = app("secret").await;
    let body = r#"{"token":"QR-2024-06-01","type":"entree","code":"4821"}"#;
    let req = Request::builder()
      .method("POST")
      .uri("/api/punch")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body))
      .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  #[tokio::test]
  async fn unknown_route_is_not_found() {
    let app = app("secret").await;
    let resp = get(app, "/api/nope", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn config_defaults_fill_optional_fields() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          store_path = "~/pointage.db"
          admin_username = "admin"
          admin_password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.geolocation_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.geocoder_url, "https://nominatim.openstreetmap.org");
    assert!(cfg.geocoder_enabled);
    assert!(cfg.geocoder_user_agent.starts_with("pointage-server/"));
  }
}
