//! JSON REST API for JustTalk fact posts and voting.
//!
//! Exposes an axum [`Router`] backed by any [`justtalk_core::store::FactStore`].
//! Authentication happens upstream; the caller's id arrives in the
//! `X-User-Id` header (see [`identity`]). TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", justtalk_api::api_router(store.clone(), VotingConfig::default()))
//! ```

pub mod error;
pub mod identity;
pub mod posts;
pub mod votes;

use std::sync::Arc;

use axum::{Router, routing::get};
use justtalk_core::{
  manager::FactPostManager,
  store::FactStore,
  voting::{VotingConfig, VotingService},
};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub voting: VotingService<S>,
  pub posts:  FactPostManager<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { voting: self.voting.clone(), posts: self.posts.clone() }
  }
}

impl<S: FactStore> AppState<S> {
  pub fn new(store: Arc<S>, config: VotingConfig) -> Self {
    Self {
      voting: VotingService::with_config(Arc::clone(&store), config),
      posts:  FactPostManager::new(store),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, config: VotingConfig) -> Router<()>
where
  S: FactStore + 'static,
{
  Router::new()
    // Posts
    .route("/posts", get(posts::feed::<S>).post(posts::create::<S>))
    .route(
      "/posts/{id}",
      get(posts::get_one::<S>)
        .patch(posts::update_one::<S>)
        .delete(posts::delete_one::<S>),
    )
    // Voting
    .route("/posts/{id}/consensus", get(votes::consensus::<S>))
    .route(
      "/posts/{id}/vote",
      get(votes::my_vote::<S>)
        .put(votes::cast::<S>)
        .delete(votes::retract::<S>),
    )
    .with_state(AppState::new(store, config))
}

#[cfg(test)]
mod tests;
