//! Handlers for `/posts/{id}/consensus` and `/posts/{id}/vote`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/posts/{id}/consensus` | Current [`Consensus`] |
//! | `GET`    | `/posts/{id}/vote` | Caller's [`VoteState`] |
//! | `PUT`    | `/posts/{id}/vote` | Body: `{"vote":"agree"}`; returns fresh consensus |
//! | `DELETE` | `/posts/{id}/vote` | Retract; returns fresh consensus |

use axum::{
  Json,
  extract::{Path, State},
};
use justtalk_core::{
  Error,
  consensus::Consensus,
  store::FactStore,
  vote::{VoteState, VoteType},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, identity::Caller};

/// `GET /posts/{id}/consensus`
pub async fn consensus<S: FactStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Consensus>, ApiError> {
  let consensus = state.voting.consensus(id).await.map_err(ApiError::on_read)?;
  Ok(Json(consensus))
}

/// `GET /posts/{id}/vote`
pub async fn my_vote<S: FactStore>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<VoteState>, ApiError> {
  let user_id = caller.require()?;
  state.posts.active_post(id).await.map_err(ApiError::on_read)?;
  let vote = state.voting.my_vote(id, user_id).await?;
  Ok(Json(vote.into()))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub vote: String,
}

/// `PUT /posts/{id}/vote`
///
/// Errors in order: caller, target, then vote value. A malformed vote on a
/// post that could never take one reports the target.
pub async fn cast<S: FactStore>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<VoteBody>,
) -> Result<Json<Consensus>, ApiError> {
  let user_id = caller.require()?;
  let vote = match VoteType::parse(&body.vote) {
    Ok(vote) => vote,
    Err(err) => {
      let post = state.posts.active_post(id).await?;
      if !post.accepts_votes() {
        return Err(Error::InvalidTarget(id).into());
      }
      return Err(err.into());
    }
  };
  let consensus = state.voting.cast_vote(id, Some(user_id), vote).await?;
  Ok(Json(consensus))
}

/// `DELETE /posts/{id}/vote`
pub async fn retract<S: FactStore>(
  State(state): State<AppState<S>>,
  Caller(user_id): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Consensus>, ApiError> {
  let consensus = state.voting.retract_vote(id, user_id).await?;
  Ok(Json(consensus))
}
