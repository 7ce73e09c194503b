//! The `FactStore` trait: the persistence boundary for posts and votes.
//!
//! The trait is implemented by storage backends (e.g. `justtalk-store-sqlite`).
//! The services in this crate and the HTTP layer depend on this abstraction,
//! not on any concrete backend.

use std::{collections::HashMap, future::Future};

use uuid::Uuid;

use crate::{
  consensus::Consensus,
  post::{FactPost, PostDraft, PostQuery},
  vote::{FactVoteRecord, LedgerWrite, VoteType},
};

/// Abstraction over a fact-post store backend.
///
/// Backends own two logical tables, `fact_posts` and `fact_votes`, and must
/// keep at most one `fact_votes` row per `(post_id, user_id)`. Every ledger
/// mutation recomputes the post's cached consensus inside the same atomic
/// unit, so the cache never disagrees with the ledger once a write returns.
///
/// Domain failures (`InvalidTarget`, `NotApplicable`) travel inside
/// `Self::Error` and surface through the `Into<Error>` conversion; a backend
/// reports a retryable write race as [`Error::Conflict`](crate::Error::Conflict).
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Persist a validated post. Fact posts start with a zero-vote consensus.
  fn create_post(
    &self,
    author_id: Uuid,
    draft: PostDraft,
  ) -> impl Future<Output = Result<FactPost, Self::Error>> + Send + '_;

  /// Retrieve a post by id, deleted or not. Returns `None` if not found.
  fn get_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Option<FactPost>, Self::Error>> + Send + '_;

  /// Overwrite a post's editable fields. Leaves the cached consensus alone.
  ///
  /// Fails with `InvalidTarget` if the post is missing or deleted.
  fn update_post(
    &self,
    post_id: Uuid,
    draft: PostDraft,
  ) -> impl Future<Output = Result<FactPost, Self::Error>> + Send + '_;

  /// Soft-delete a post. Returns `false` if it was already deleted.
  ///
  /// Fails with `InvalidTarget` if the post does not exist.
  fn delete_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// List one page of posts in `query.order`, ordering before paging so
  /// pages are globally ordered. The page size is capped by
  /// [`PostQuery::page_size`](crate::post::PostQuery::page_size).
  fn list_posts<'a>(
    &'a self,
    query: &'a PostQuery,
  ) -> impl Future<Output = Result<Vec<FactPost>, Self::Error>> + Send + 'a;

  // ── Vote ledger ───────────────────────────────────────────────────────

  /// Insert or replace the caller's vote and recompute the post's consensus
  /// atomically.
  ///
  /// Fails with `InvalidTarget` unless the post exists, is active and is in
  /// fact mode.
  fn upsert_vote(
    &self,
    post_id: Uuid,
    user_id: Uuid,
    vote: VoteType,
  ) -> impl Future<Output = Result<LedgerWrite, Self::Error>> + Send + '_;

  /// Remove the caller's vote, if any, and recompute atomically. Removing a
  /// vote that does not exist is not an error.
  ///
  /// Fails with `InvalidTarget` under the same conditions as
  /// [`upsert_vote`](Self::upsert_vote).
  fn remove_vote(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<LedgerWrite, Self::Error>> + Send + '_;

  fn get_vote(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<VoteType>, Self::Error>> + Send + '_;

  /// All live ledger rows for a post, in no particular order.
  fn get_votes_for_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FactVoteRecord>, Self::Error>> + Send + '_;

  /// The user's votes on a batch of posts, fetched in one round-trip
  /// whatever the batch size. Posts the user has not voted on are absent
  /// from the map.
  fn get_user_votes(
    &self,
    post_ids: Vec<Uuid>,
    user_id: Uuid,
  ) -> impl Future<Output = Result<HashMap<Uuid, VoteType>, Self::Error>> + Send + '_;

  // ── Consensus cache ───────────────────────────────────────────────────

  /// Rebuild the cached consensus from the ledger and return it.
  ///
  /// Fails with `NotApplicable`, leaving any stale cache untouched, if the
  /// post is missing, deleted or not in fact mode.
  fn recompute(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Consensus, Self::Error>> + Send + '_;

  /// The last computed snapshot, without touching the ledger.
  fn get_cached(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Option<Consensus>, Self::Error>> + Send + '_;
}

/// Lift a backend error into the core taxonomy.
pub(crate) fn store_error<E: Into<crate::Error>>(e: E) -> crate::Error { e.into() }
