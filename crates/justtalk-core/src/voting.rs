//! The voting façade: the single entry point for casting, changing and
//! retracting votes on fact posts.

use std::{future::Future, sync::Arc, time::Duration};

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  consensus::Consensus,
  post::PostStatus,
  store::{FactStore, store_error},
  vote::{FactVoteRecord, LedgerWrite, VoteType},
};

/// Tunables for [`VotingService`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VotingConfig {
  /// How many times a write that lost a race is retried before giving up.
  #[serde(default = "default_max_conflict_retries")]
  pub max_conflict_retries: u32,
  /// Pause before the first retry; each further retry waits one step longer.
  #[serde(default = "default_retry_backoff_ms")]
  pub retry_backoff_ms:     u64,
}

fn default_max_conflict_retries() -> u32 { 3 }

fn default_retry_backoff_ms() -> u64 { 10 }

impl Default for VotingConfig {
  fn default() -> Self {
    Self {
      max_conflict_retries: default_max_conflict_retries(),
      retry_backoff_ms:     default_retry_backoff_ms(),
    }
  }
}

/// Orchestrates the vote ledger and the consensus cache.
///
/// Only this layer retries on [`Error::Conflict`]; every other error is
/// surfaced to the caller as-is.
pub struct VotingService<S> {
  store:  Arc<S>,
  config: VotingConfig,
}

impl<S> Clone for VotingService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: self.config }
  }
}

impl<S: FactStore> VotingService<S> {
  pub fn new(store: Arc<S>) -> Self { Self::with_config(store, VotingConfig::default()) }

  pub fn with_config(store: Arc<S>, config: VotingConfig) -> Self { Self { store, config } }

  /// Cast or change the caller's vote and return the fresh consensus.
  ///
  /// Casting the vote the caller already holds changes nothing but still
  /// returns the current consensus.
  pub async fn cast_vote(
    &self,
    post_id: Uuid,
    user_id: Option<Uuid>,
    vote: VoteType,
  ) -> Result<Consensus> {
    let user_id = user_id.ok_or(Error::Unauthenticated)?;
    let store = &self.store;
    let write = self
      .retrying("cast_vote", post_id, move || store.upsert_vote(post_id, user_id, vote))
      .await?;
    log_write(post_id, user_id, &write);
    Ok(write.consensus)
  }

  /// Withdraw the caller's vote. Without a vote this returns the unchanged
  /// consensus.
  pub async fn retract_vote(&self, post_id: Uuid, user_id: Option<Uuid>) -> Result<Consensus> {
    let user_id = user_id.ok_or(Error::Unauthenticated)?;
    let store = &self.store;
    let write = self
      .retrying("retract_vote", post_id, move || store.remove_vote(post_id, user_id))
      .await?;
    log_write(post_id, user_id, &write);
    Ok(write.consensus)
  }

  /// The cached consensus for a fact post, or the zero-vote default if none
  /// has been computed yet.
  pub async fn consensus(&self, post_id: Uuid) -> Result<Consensus> {
    let post = self
      .store
      .get_post(post_id)
      .await
      .map_err(store_error)?
      .filter(|p| p.status == PostStatus::Active)
      .ok_or(Error::InvalidTarget(post_id))?;
    post.display_consensus().ok_or(Error::NotApplicable(post_id))
  }

  pub async fn my_vote(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<VoteType>> {
    self.store.get_vote(post_id, user_id).await.map_err(store_error)
  }

  pub async fn votes_for_post(&self, post_id: Uuid) -> Result<Vec<FactVoteRecord>> {
    self.store.get_votes_for_post(post_id).await.map_err(store_error)
  }

  /// Throw away the cached consensus and rebuild it from the ledger.
  pub async fn recompute(&self, post_id: Uuid) -> Result<Consensus> {
    let store = &self.store;
    let consensus = self
      .retrying("recompute", post_id, move || store.recompute(post_id))
      .await?;
    tracing::debug!(%post_id, consensus = %consensus.level, total = consensus.total_votes, "consensus recomputed");
    Ok(consensus)
  }

  async fn retrying<T, F, Fut>(&self, op: &'static str, post_id: Uuid, mut attempt: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
  {
    let mut retries = 0;
    loop {
      match attempt().await.map_err(store_error) {
        Err(Error::Conflict(reason)) if retries < self.config.max_conflict_retries => {
          retries += 1;
          tracing::warn!(%post_id, retries, %reason, "{op} hit a write conflict, retrying");
          let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(retries));
          tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
        other => return other,
      }
    }
  }
}

fn log_write(post_id: Uuid, user_id: Uuid, write: &LedgerWrite) {
  if write.changed() {
    tracing::debug!(
      %post_id,
      %user_id,
      before = ?write.before(),
      after = ?write.after(),
      consensus = %write.consensus.level,
      total = write.consensus.total_votes,
      "vote changed"
    );
  } else {
    tracing::trace!(%post_id, %user_id, state = ?write.after(), "vote unchanged");
  }
}
