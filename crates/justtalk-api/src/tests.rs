//! Router tests against an in-memory `SqliteStore`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use justtalk_core::voting::VotingConfig;
use justtalk_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{api_router, identity::USER_ID_HEADER};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(Arc::new(store), VotingConfig::default())
}

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  user: Option<Uuid>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(USER_ID_HEADER, user.to_string());
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

fn fact_body(content: &str) -> Value {
  json!({
    "content": content,
    "is_fact": true,
    "fact_data": {
      "occurred_at": "2024-05-01",
      "location": "Maple St & 3rd",
      "fact_type": "safety_alert"
    }
  })
}

async fn create_fact(app: &Router, author: Uuid) -> String {
  let (status, body) = call(app, "POST", "/posts", Some(author), Some(fact_body("Streetlight out"))).await;
  assert_eq!(status, StatusCode::CREATED);
  body["post_id"].as_str().unwrap().to_owned()
}

// ── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_post_returns_201() {
  let app = app().await;
  let author = Uuid::new_v4();

  let (status, body) = call(&app, "POST", "/posts", Some(author), Some(fact_body("Pothole"))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["author_id"], json!(author.to_string()));
  assert_eq!(body["is_fact"], json!(true));
  assert_eq!(body["consensus"]["level"], json!("pending"));
  assert_eq!(body["fact_data"]["fact_type"], json!("safety_alert"));
}

#[tokio::test]
async fn create_post_requires_caller() {
  let app = app().await;
  let (status, body) = call(&app, "POST", "/posts", None, Some(fact_body("Anon"))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["code"], json!("unauthenticated"));
}

#[tokio::test]
async fn malformed_user_header_is_unauthenticated() {
  let app = app().await;
  let req = Request::builder()
    .method("GET")
    .uri("/posts")
    .header(USER_ID_HEADER, "not-a-uuid")
    .body(Body::empty())
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_fact_post_missing_field_is_422() {
  let app = app().await;
  let mut body = fact_body("No location");
  body["fact_data"]["location"] = json!("");

  let (status, body) = call(&app, "POST", "/posts", Some(Uuid::new_v4()), Some(body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["code"], json!("validation_error"));
  assert_eq!(body["field"], json!("location"));
}

#[tokio::test]
async fn create_fact_post_bad_date_is_400() {
  let app = app().await;
  let mut body = fact_body("Bad date");
  body["fact_data"]["occurred_at"] = json!("yesterday");

  let (status, body) = call(&app, "POST", "/posts", Some(Uuid::new_v4()), Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["field"], json!("occurred_at"));
}

#[tokio::test]
async fn get_missing_post_is_404() {
  let app = app().await;
  let (status, body) = call(&app, "GET", &format!("/posts/{}", Uuid::new_v4()), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], json!("not_found"));
}

#[tokio::test]
async fn patch_by_non_author_is_forbidden() {
  let app = app().await;
  let id = create_fact(&app, Uuid::new_v4()).await;

  let (status, _) = call(
    &app,
    "PATCH",
    &format!("/posts/{id}"),
    Some(Uuid::new_v4()),
    Some(json!({ "content": "hijacked" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patch_and_delete_by_author() {
  let app = app().await;
  let author = Uuid::new_v4();
  let id = create_fact(&app, author).await;

  let (status, body) = call(
    &app,
    "PATCH",
    &format!("/posts/{id}"),
    Some(author),
    Some(json!({ "content": "Streetlight fixed", "is_fact": false })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["content"], json!("Streetlight fixed"));
  assert_eq!(body["is_fact"], json!(false));

  let (status, _) = call(&app, "DELETE", &format!("/posts/{id}"), Some(author), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) = call(&app, "GET", &format!("/posts/{id}"), Some(author), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_lists_newest_first_with_my_vote() {
  let app = app().await;
  let viewer = Uuid::new_v4();
  let older = create_fact(&app, Uuid::new_v4()).await;
  let newer = create_fact(&app, Uuid::new_v4()).await;

  call(
    &app,
    "PUT",
    &format!("/posts/{older}/vote"),
    Some(viewer),
    Some(json!({ "vote": "agree" })),
  )
  .await;

  let (status, body) = call(&app, "GET", "/posts?fact_only=true", Some(viewer), None).await;
  assert_eq!(status, StatusCode::OK);
  let items = body.as_array().unwrap();
  assert_eq!(items.len(), 2);
  assert_eq!(items[0]["post"]["post_id"], json!(newer));
  assert_eq!(items[0]["my_vote"], Value::Null);
  assert_eq!(items[1]["post"]["post_id"], json!(older));
  assert_eq!(items[1]["my_vote"], json!("agree"));
}

#[tokio::test]
async fn feed_clamps_oversized_pages() {
  let app = app().await;
  let viewer = Uuid::new_v4();
  let id = create_fact(&app, Uuid::new_v4()).await;

  let uri = format!("/posts?order=consensus&limit={}", usize::MAX);
  let (status, body) = call(&app, "GET", &uri, Some(viewer), None).await;
  assert_eq!(status, StatusCode::OK);
  let items = body.as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["post"]["post_id"], json!(id));

  let uri = format!("/posts?offset={}", usize::MAX);
  let (status, body) = call(&app, "GET", &uri, Some(viewer), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

// ── Voting ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vote_flow_reaches_high() {
  let app = app().await;
  let id = create_fact(&app, Uuid::new_v4()).await;

  let mut last = Value::Null;
  for _ in 0..3 {
    let (status, body) = call(
      &app,
      "PUT",
      &format!("/posts/{id}/vote"),
      Some(Uuid::new_v4()),
      Some(json!({ "vote": "agree" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    last = body;
  }
  assert_eq!(last["total_votes"], json!(3));
  assert_eq!(last["level"], json!("high"));

  let (status, body) = call(&app, "GET", &format!("/posts/{id}/consensus"), None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, last);
}

#[tokio::test]
async fn vote_requires_caller() {
  let app = app().await;
  let id = create_fact(&app, Uuid::new_v4()).await;

  let (status, _) = call(
    &app,
    "PUT",
    &format!("/posts/{id}/vote"),
    None,
    Some(json!({ "vote": "agree" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_vote_type_is_400() {
  let app = app().await;
  let id = create_fact(&app, Uuid::new_v4()).await;

  let (status, body) = call(
    &app,
    "PUT",
    &format!("/posts/{id}/vote"),
    Some(Uuid::new_v4()),
    Some(json!({ "vote": "maybe" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["field"], json!("vote_type"));
}

#[tokio::test]
async fn vote_on_plain_post_is_409() {
  let app = app().await;
  let (_, post) = call(
    &app,
    "POST",
    "/posts",
    Some(Uuid::new_v4()),
    Some(json!({ "content": "Lost cat" })),
  )
  .await;
  let id = post["post_id"].as_str().unwrap();

  let (status, body) = call(
    &app,
    "PUT",
    &format!("/posts/{id}/vote"),
    Some(Uuid::new_v4()),
    Some(json!({ "vote": "agree" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], json!("invalid_target"));

  let (status, body) = call(&app, "GET", &format!("/posts/{id}/consensus"), None, None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], json!("not_applicable"));
}

#[tokio::test]
async fn malformed_vote_reports_target_before_value() {
  let app = app().await;
  let (_, post) = call(
    &app,
    "POST",
    "/posts",
    Some(Uuid::new_v4()),
    Some(json!({ "content": "Lost cat" })),
  )
  .await;
  let plain = post["post_id"].as_str().unwrap();

  let (status, body) = call(
    &app,
    "PUT",
    &format!("/posts/{plain}/vote"),
    Some(Uuid::new_v4()),
    Some(json!({ "vote": "maybe" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], json!("invalid_target"));

  let (status, body) = call(
    &app,
    "PUT",
    &format!("/posts/{}/vote", Uuid::new_v4()),
    Some(Uuid::new_v4()),
    Some(json!({ "vote": "maybe" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], json!("invalid_target"));
}

#[tokio::test]
async fn my_vote_and_retract() {
  let app = app().await;
  let id = create_fact(&app, Uuid::new_v4()).await;
  let user = Uuid::new_v4();
  let uri = format!("/posts/{id}/vote");

  let (status, body) = call(&app, "GET", &uri, Some(user), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "state": "no_vote" }));

  call(&app, "PUT", &uri, Some(user), Some(json!({ "vote": "partial" }))).await;
  let (_, body) = call(&app, "GET", &uri, Some(user), None).await;
  assert_eq!(body, json!({ "state": "voted", "vote": "partial" }));

  let (status, body) = call(&app, "DELETE", &uri, Some(user), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total_votes"], json!(0));

  // retracting again is a no-op
  let (status, body) = call(&app, "DELETE", &uri, Some(user), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total_votes"], json!(0));
}
