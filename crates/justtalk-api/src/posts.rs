//! Handlers for `/posts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/posts` | Feed; optional `author_id`, `fact_only`, `order`, `limit`, `offset` |
//! | `POST`   | `/posts` | Body: [`NewFactPost`]; returns 201 + stored post |
//! | `GET`    | `/posts/{id}` | Post with consensus and the caller's vote |
//! | `PATCH`  | `/posts/{id}` | Body: [`FactPostPatch`]; author only |
//! | `DELETE` | `/posts/{id}` | Soft delete; author only; 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use justtalk_core::{
  post::{FactPost, FactPostPatch, FeedOrder, NewFactPost, PostQuery, PostView},
  store::FactStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, identity::Caller};

// ─── Feed ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FeedParams {
  pub author_id: Option<Uuid>,
  /// Only posts currently in fact mode. Default `false`.
  #[serde(default)]
  pub fact_only: bool,
  #[serde(default)]
  pub order:     FeedOrder,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// `GET /posts[?author_id=..][&fact_only=true][&order=consensus][&limit=..][&offset=..]`
pub async fn feed<S: FactStore>(
  State(state): State<AppState<S>>,
  Caller(viewer): Caller,
  Query(params): Query<FeedParams>,
) -> Result<Json<Vec<PostView>>, ApiError> {
  let query = PostQuery {
    author_id:       params.author_id,
    fact_only:       params.fact_only,
    include_deleted: false,
    order:           params.order,
    limit:           params.limit,
    offset:          params.offset,
  };
  let views = state.posts.feed(&query, viewer).await?;
  Ok(Json(views))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /posts`: the caller becomes the author.
pub async fn create<S: FactStore>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<NewFactPost>,
) -> Result<impl IntoResponse, ApiError> {
  let author_id = caller.require()?;
  let post = state.posts.create_fact_post(author_id, body).await?;
  Ok((StatusCode::CREATED, Json(post)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /posts/{id}`
pub async fn get_one<S: FactStore>(
  State(state): State<AppState<S>>,
  Caller(viewer): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
  let view = state
    .posts
    .get_with_consensus_and_my_vote(id, viewer)
    .await
    .map_err(ApiError::on_read)?;
  Ok(Json(view))
}

// ─── Update / delete ──────────────────────────────────────────────────────────

/// The active post `id`, provided `caller` wrote it.
async fn authored_by<S: FactStore>(
  state: &AppState<S>,
  caller: Caller,
  id: Uuid,
) -> Result<FactPost, ApiError> {
  let user_id = caller.require()?;
  let post = state.posts.active_post(id).await.map_err(ApiError::on_read)?;
  if post.author_id != user_id {
    return Err(ApiError::Forbidden(format!("post {id} belongs to another user")));
  }
  Ok(post)
}

/// `PATCH /posts/{id}`
pub async fn update_one<S: FactStore>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<FactPostPatch>,
) -> Result<Json<FactPost>, ApiError> {
  authored_by(&state, caller, id).await?;
  let post = state.posts.update_fact_post(id, patch).await?;
  Ok(Json(post))
}

/// `DELETE /posts/{id}`
pub async fn delete_one<S: FactStore>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  authored_by(&state, caller, id).await?;
  state.posts.delete_post(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
