//! Router-level tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
  response::Response,
};
use pointage_core::{
  agent::AgentInput, code::PersonalCode, context::NoGeocoder,
  store::{AgentDirectory, PunchLedger, PunchQuery},
  workflow::PunchWorkflow,
};
use pointage_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{admin_router, public_router};

async fn app() -> (Router, Arc<SqliteStore>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let workflow =
    PunchWorkflow::new(store.clone(), store.clone(), Arc::new(NoGeocoder));
  let router = public_router(workflow).merge(admin_router(store.clone()));
  (router, store)
}

async fn seed(store: &SqliteStore, code: &str, name: &str) {
  store
    .add_agent(AgentInput {
      personal_code: PersonalCode::parse(code).unwrap(),
      display_name:  name.into(),
      ip_hint:       None,
    })
    .await
    .unwrap();
}

async fn send(
  router: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
  headers: &[(&str, &str)],
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(*k, *v);
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();
  router.clone().oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn punch_body(token: &str, direction: &str, code: &str) -> Value {
  json!({ "token": token, "type": direction, "code": code })
}

// ── Punch ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_punch_records_second_reports_existing() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(json!({
      "token": "QR-2024-06-01",
      "type": "entree",
      "code": "4821",
      "latitude": 48.8897,
      "longitude": 2.4536,
    })),
    &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let first = json_body(resp).await;
  assert_eq!(first["outcome"], "recorded");
  assert_eq!(first["punch"]["direction"], "entree");
  assert_eq!(first["punch"]["calendar_date"], "2024-06-01");
  assert_eq!(first["punch"]["source_ip"], "203.0.113.7");
  assert_eq!(first["punch"]["resolved_address"], "Adresse non disponible");

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-06-01", "entree", "4821")),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let second = json_body(resp).await;
  assert_eq!(second["outcome"], "already_punched");
  assert_eq!(second["punch"]["punch_id"], first["punch"]["punch_id"]);
}

#[tokio::test]
async fn unknown_and_malformed_codes_are_rejected_for_retry() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-06-01", "entree", "9999")),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let body = json_body(resp).await;
  assert_eq!(body["outcome"], "rejected");
  assert_eq!(body["failure"]["kind"], "code_not_recognized");

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-06-01", "entree", "12a4")),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(json_body(resp).await["failure"]["kind"], "invalid_code_format");
}

#[tokio::test]
async fn bad_token_or_direction_fails() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-13-01", "entree", "4821")),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert_eq!(body["outcome"], "failed");
  assert_eq!(body["failure"]["kind"], "invalid_token_format");

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-06-01", "pause", "4821")),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["failure"]["kind"], "invalid_direction");
}

#[tokio::test]
async fn unreadable_body_is_400_not_a_code_rejection() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp = send(
    &router,
    "POST",
    "/punch",
    Some(json!({ "token": "QR-2024-06-01", "type": "entree" })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert_eq!(body["outcome"], "failed");
  assert!(body["error"].as_str().unwrap().contains("code"), "{body}");

  let req = Request::builder()
    .method("POST")
    .uri("/punch")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = router.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["outcome"], "failed");

  let all = store.list_punches(PunchQuery::default()).await.unwrap();
  assert!(all.is_empty());
}

#[test]
fn client_ip_prefers_forwarded_for() {
  use axum::http::HeaderMap;

  use crate::punch::client_ip;

  let mut headers = HeaderMap::new();
  assert_eq!(client_ip(&headers), None);

  headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
  assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));

  headers.insert("x-forwarded-for", " 203.0.113.7 , 10.0.0.1".parse().unwrap());
  assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
}

// ── Agents ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn agent_crud_roundtrip() {
  let (router, _) = app().await;

  let resp = send(
    &router,
    "POST",
    "/admin/agents",
    Some(json!({ "personal_code": "4821", "display_name": "  Dupont  " })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created = json_body(resp).await;
  assert_eq!(created["display_name"], "Dupont");
  let id = created["agent_id"].as_str().unwrap().to_owned();

  let resp = send(
    &router,
    "PUT",
    &format!("/admin/agents/{id}"),
    Some(json!({ "personal_code": "4821", "display_name": "Dupont-Moreau" })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["display_name"], "Dupont-Moreau");

  let resp = send(&router, "GET", "/admin/agents", None, &[]).await;
  let list = json_body(resp).await;
  assert_eq!(list.as_array().unwrap().len(), 1);

  let resp =
    send(&router, "DELETE", &format!("/admin/agents/{id}"), None, &[]).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let resp = send(&router, "GET", &format!("/admin/agents/{id}"), None, &[]).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_code_conflicts_and_format_errors() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp = send(
    &router,
    "POST",
    "/admin/agents",
    Some(json!({ "personal_code": "4821", "display_name": "Martin" })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  let resp = send(
    &router,
    "POST",
    "/admin/agents",
    Some(json!({ "personal_code": "48", "display_name": "Martin" })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = send(
    &router,
    "POST",
    "/admin/agents",
    Some(json!({ "personal_code": "1234", "display_name": "   " })),
    &[],
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generated_code_is_free() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;

  let resp =
    send(&router, "POST", "/admin/agents/generate-code", None, &[]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let code = json_body(resp).await["code"].as_str().unwrap().to_owned();
  assert_eq!(code.len(), 4);
  assert_ne!(code, "4821");

  let code = PersonalCode::parse(&code).unwrap();
  assert!(store.is_code_unique(code, None).await.unwrap());
}

#[tokio::test]
async fn lookup_by_code_or_legacy_ip() {
  let (router, store) = app().await;
  store
    .add_agent(AgentInput {
      personal_code: PersonalCode::parse("4821").unwrap(),
      display_name:  "Dupont".into(),
      ip_hint:       Some("198.51.100.4".into()),
    })
    .await
    .unwrap();

  let resp =
    send(&router, "GET", "/admin/agents/lookup?code=4821", None, &[]).await;
  assert_eq!(json_body(resp).await["display_name"], "Dupont");

  let resp = send(
    &router,
    "GET",
    "/admin/agents/lookup?ip=198.51.100.4",
    None,
    &[],
  )
  .await;
  assert_eq!(json_body(resp).await["personal_code"], "4821");

  let resp =
    send(&router, "GET", "/admin/agents/lookup?code=1111", None, &[]).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = send(&router, "GET", "/admin/agents/lookup", None, &[]).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn code_availability_for_live_form_checks() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;
  let dupont = store
    .find_by_code(PersonalCode::parse("4821").unwrap())
    .await
    .unwrap()
    .unwrap();

  let check = |query: String| {
    let router = router.clone();
    async move {
      let uri = format!("/admin/agents/code-available?{query}");
      send(&router, "GET", &uri, None, &[]).await
    }
  };

  let body = json_body(check("code=1234".into()).await).await;
  assert_eq!(body, json!({ "code": "1234", "available": true }));

  let body = json_body(check("code=4821".into()).await).await;
  assert_eq!(body["available"], false);

  let own = format!("code=4821&excluding={}", dupont.agent_id);
  assert_eq!(json_body(check(own).await).await["available"], true);

  let other = format!("code=4821&excluding={}", Uuid::new_v4());
  assert_eq!(json_body(check(other).await).await["available"], false);

  let resp = check("code=48a1".into()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Listing / export / token ───────────────────────────────────────────────────

#[tokio::test]
async fn punches_list_with_filters_and_names() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;
  seed(&store, "1234", "Martin").await;

  for (token, direction, code) in [
    ("QR-2024-06-01", "entree", "4821"),
    ("QR-2024-06-01", "sortie", "4821"),
    ("QR-2024-06-02", "entree", "1234"),
  ] {
    let resp = send(
      &router,
      "POST",
      "/punch",
      Some(punch_body(token, direction, code)),
      &[],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  let all = json_body(send(&router, "GET", "/admin/punches", None, &[]).await).await;
  let all = all.as_array().unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(all[0]["display_name"], "Martin");

  let resp = send(
    &router,
    "GET",
    "/admin/punches?date=2024-06-01&direction=sortie",
    None,
    &[],
  )
  .await;
  let filtered = json_body(resp).await;
  let filtered = filtered.as_array().unwrap();
  assert_eq!(filtered.len(), 1);
  assert_eq!(filtered[0]["personal_code"], "4821");

  let resp =
    send(&router, "GET", "/admin/punches?direction=pause", None, &[]).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_is_csv_attachment() {
  let (router, store) = app().await;
  seed(&store, "4821", "Dupont").await;
  send(
    &router,
    "POST",
    "/punch",
    Some(punch_body("QR-2024-06-01", "sortie", "4821")),
    &[],
  )
  .await;

  let resp = send(&router, "GET", "/admin/export.csv", None, &[]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(
    resp.headers()[header::CONTENT_TYPE]
      .to_str()
      .unwrap()
      .starts_with("text/csv")
  );
  assert!(
    resp.headers()[header::CONTENT_DISPOSITION]
      .to_str()
      .unwrap()
      .contains("pointages_")
  );

  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let text = String::from_utf8(bytes.to_vec()).unwrap();
  let rows: Vec<_> = text.lines().collect();
  assert_eq!(rows.len(), 2);
  assert!(rows[1].contains(",Sortie,Dupont,4821,"), "{}", rows[1]);
}

#[tokio::test]
async fn token_for_requested_date() {
  let (router, _) = app().await;

  let resp =
    send(&router, "GET", "/admin/token?date=2024-06-01", None, &[]).await;
  let body = json_body(resp).await;
  assert_eq!(body["token"], "QR-2024-06-01");
  assert_eq!(body["date"], "2024-06-01");

  let resp = send(&router, "GET", "/admin/token", None, &[]).await;
  let token = json_body(resp).await["token"].as_str().unwrap().to_owned();
  assert!(pointage_core::token::decode(&token).is_ok());
}
