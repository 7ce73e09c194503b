//! [`FactPostManager`]: the validation gate and read paths for fact posts.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  post::{FactPost, FactPostPatch, NewFactPost, PostQuery, PostStatus, PostView},
  store::{FactStore, store_error},
};

/// Owns fact-mode validation and joins posts with their consensus and the
/// viewer's vote. Never writes the consensus cache.
pub struct FactPostManager<S> {
  store: Arc<S>,
}

impl<S> Clone for FactPostManager<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: FactStore> FactPostManager<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Validate and persist a new post. Nothing is written if validation
  /// fails.
  pub async fn create_fact_post(&self, author_id: Uuid, payload: NewFactPost) -> Result<FactPost> {
    let draft = payload.validate()?;
    let post = self.store.create_post(author_id, draft).await.map_err(store_error)?;
    tracing::info!(post_id = %post.post_id, %author_id, is_fact = post.is_fact, "post created");
    Ok(post)
  }

  /// Apply a partial edit. Fact fields are re-validated when touched; the
  /// cached consensus is left alone.
  pub async fn update_fact_post(&self, post_id: Uuid, patch: FactPostPatch) -> Result<FactPost> {
    let current = self.active_post(post_id).await?;
    let draft = patch.apply_to(&current)?;
    let post = self.store.update_post(post_id, draft).await.map_err(store_error)?;
    if current.is_fact != post.is_fact {
      tracing::info!(%post_id, is_fact = post.is_fact, "fact mode toggled");
    }
    Ok(post)
  }

  /// Soft-delete a post; its ledger rows are kept.
  pub async fn delete_post(&self, post_id: Uuid) -> Result<()> {
    if self.store.delete_post(post_id).await.map_err(store_error)? {
      tracing::info!(%post_id, "post deleted");
    }
    Ok(())
  }

  /// The active post, or `InvalidTarget`.
  pub async fn active_post(&self, post_id: Uuid) -> Result<FactPost> {
    self
      .store
      .get_post(post_id)
      .await
      .map_err(store_error)?
      .filter(|p| p.status == PostStatus::Active)
      .ok_or(Error::InvalidTarget(post_id))
  }

  /// Detail read: the post, its consensus (synthesized if never computed)
  /// and the viewer's own vote.
  pub async fn get_with_consensus_and_my_vote(
    &self,
    post_id: Uuid,
    user_id: Option<Uuid>,
  ) -> Result<PostView> {
    let post = self.active_post(post_id).await?;
    let my_vote = match user_id {
      Some(user_id) if post.is_fact => {
        self.store.get_vote(post_id, user_id).await.map_err(store_error)?
      }
      _ => None,
    };
    Ok(PostView::new(post, my_vote))
  }

  /// Feed read in the order `query` asks for. Uses cached consensus only
  /// and fetches the viewer's votes in one batch.
  pub async fn feed(&self, query: &PostQuery, viewer: Option<Uuid>) -> Result<Vec<PostView>> {
    let posts = self.store.list_posts(query).await.map_err(store_error)?;

    let mut my_votes = match viewer {
      Some(user_id) => {
        let fact_ids = posts.iter().filter(|p| p.is_fact).map(|p| p.post_id).collect();
        self.store.get_user_votes(fact_ids, user_id).await.map_err(store_error)?
      }
      None => Default::default(),
    };

    Ok(
      posts
        .into_iter()
        .map(|post| {
          let my_vote = my_votes.remove(&post.post_id);
          PostView::new(post, my_vote)
        })
        .collect(),
    )
  }
}
