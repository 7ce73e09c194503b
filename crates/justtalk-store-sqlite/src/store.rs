//! [`SqliteStore`]: the SQLite implementation of [`FactStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use justtalk_core::{
  consensus::{Consensus, ConsensusLevel},
  post::{FactPost, FeedOrder, PostDraft, PostQuery, PostStatus},
  store::FactStore,
  vote::{FactVoteRecord, LedgerWrite, VoteType},
};

use crate::{
  Error, Result,
  encode::{
    POST_COLUMNS, RawConsensus, RawPost, RawVote, VOTE_COLUMNS, decode_uuid, decode_vote_type,
    encode_consensus, encode_dt, encode_fact_data, encode_uuid, now,
  },
  schema::SCHEMA,
};

/// How long a writer waits on another connection's lock before SQLite
/// reports `SQLITE_BUSY`, unless the caller picks its own.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── In-transaction helpers ──────────────────────────────────────────────────

/// Whether the post exists, is active and is in fact mode.
fn accepts_votes(conn: &rusqlite::Connection, post_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT status = 'active' AND is_fact FROM fact_posts WHERE post_id = ?1",
        rusqlite::params![post_id],
        |r| r.get(0),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn current_vote(
  conn:    &rusqlite::Connection,
  post_id: &str,
  user_id: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT vote_type FROM fact_votes WHERE post_id = ?1 AND user_id = ?2",
      rusqlite::params![post_id, user_id],
      |r| r.get(0),
    )
    .optional()
}

/// Count live ledger rows for the post and overwrite its cached consensus.
fn resync_consensus(conn: &rusqlite::Connection, post_id: &str) -> rusqlite::Result<Consensus> {
  let (agree, partial, disagree): (u32, u32, u32) = conn.query_row(
    "SELECT
       COALESCE(SUM(vote_type = 'agree'), 0),
       COALESCE(SUM(vote_type = 'partial'), 0),
       COALESCE(SUM(vote_type = 'disagree'), 0)
     FROM fact_votes
     WHERE post_id = ?1",
    rusqlite::params![post_id],
    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
  )?;

  let consensus = Consensus::from_counts(agree, partial, disagree);
  let (agree, partial, disagree, level) = encode_consensus(Some(&consensus));

  conn.execute(
    "UPDATE fact_posts
     SET consensus_agree = ?2, consensus_partial = ?3,
         consensus_disagree = ?4, consensus_level = ?5
     WHERE post_id = ?1",
    rusqlite::params![post_id, agree, partial, disagree, level],
  )?;

  Ok(consensus)
}

/// `ORDER BY` body for a feed order. Consensus order ranks fact posts by
/// [`ConsensusLevel::display_rank`] (an uncomputed cache ranks as pending),
/// then by vote count; plain posts sort after every fact post.
fn order_clause(order: FeedOrder) -> String {
  match order {
    FeedOrder::Recent => "created_at DESC, rowid DESC".to_string(),
    FeedOrder::Consensus => {
      let ranks: String = ConsensusLevel::iter()
        .map(|level| format!(" WHEN '{}' THEN {}", level.as_str(), level.display_rank()))
        .collect();
      format!(
        "is_fact DESC,
         CASE consensus_level{ranks} ELSE {pending} END,
         COALESCE(consensus_agree + consensus_partial + consensus_disagree, 0) DESC,
         created_at DESC, rowid DESC",
        pending = ConsensusLevel::Pending.display_rank(),
      )
    }
  }
}

/// Ledger mutation as seen from inside the transaction.
struct RawLedgerWrite {
  previous:  Option<String>,
  record:    Option<RawVote>,
  consensus: Consensus,
}

impl RawLedgerWrite {
  fn into_write(self) -> Result<LedgerWrite> {
    Ok(LedgerWrite {
      previous:  self.previous.as_deref().map(decode_vote_type).transpose()?,
      record:    self.record.map(RawVote::into_record).transpose()?,
      consensus: self.consensus,
    })
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A JustTalk store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// on one store are serialised on its connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT).await
  }

  /// Like [`open`](Self::open), waiting at most `busy_timeout` for another
  /// connection's write lock before a write fails as a conflict.
  pub async fn open_with_busy_timeout(
    path:         impl AsRef<Path>,
    busy_timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema initialised");
    Ok(())
  }

  /// Insert a fully-built [`FactPost`] into the `fact_posts` table.
  async fn insert_post(&self, post: &FactPost) -> Result<()> {
    let post_id_str   = encode_uuid(post.post_id);
    let author_id_str = encode_uuid(post.author_id);
    let content       = post.content.clone();
    let status_str    = post.status.as_str();
    let is_fact       = post.is_fact;
    let fact_data_str = post.fact_data.as_ref().map(encode_fact_data).transpose()?;
    let (agree, partial, disagree, level) = encode_consensus(post.consensus.as_ref());
    let created_str   = encode_dt(post.created_at);
    let updated_str   = encode_dt(post.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO fact_posts (
             post_id, author_id, content, status, is_fact, fact_data,
             consensus_agree, consensus_partial, consensus_disagree, consensus_level,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            post_id_str,
            author_id_str,
            content,
            status_str,
            is_fact,
            fact_data_str,
            agree,
            partial,
            disagree,
            level,
            created_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, author_id: Uuid, draft: PostDraft) -> Result<FactPost> {
    let at = now();
    let post = FactPost {
      post_id:    Uuid::new_v4(),
      author_id,
      content:    draft.content,
      status:     PostStatus::Active,
      is_fact:    draft.is_fact,
      fact_data:  draft.fact_data,
      consensus:  draft.is_fact.then(Consensus::pending),
      created_at: at,
      updated_at: at,
    };

    self.insert_post(&post).await?;
    Ok(post)
  }

  async fn get_post(&self, post_id: Uuid) -> Result<Option<FactPost>> {
    let id_str = encode_uuid(post_id);

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POST_COLUMNS} FROM fact_posts WHERE post_id = ?1"),
              rusqlite::params![id_str],
              RawPost::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn update_post(&self, post_id: Uuid, draft: PostDraft) -> Result<FactPost> {
    let id_str        = encode_uuid(post_id);
    let fact_data_str = draft.fact_data.as_ref().map(encode_fact_data).transpose()?;
    let updated_str   = encode_dt(now());

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE fact_posts
           SET content = ?2, is_fact = ?3, fact_data = ?4, updated_at = ?5
           WHERE post_id = ?1 AND status = 'active'",
          rusqlite::params![id_str, draft.content, draft.is_fact, fact_data_str, updated_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {POST_COLUMNS} FROM fact_posts WHERE post_id = ?1"),
          rusqlite::params![id_str],
          RawPost::from_row,
        )?))
      })
      .await?;

    raw
      .ok_or(justtalk_core::Error::InvalidTarget(post_id))?
      .into_post()
  }

  async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
    let id_str      = encode_uuid(post_id);
    let updated_str = encode_dt(now());

    let deleted: Option<bool> = self
      .conn
      .call(move |conn| {
        let status: Option<String> = conn
          .query_row(
            "SELECT status FROM fact_posts WHERE post_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        match status.as_deref() {
          None => Ok(None),
          Some("deleted") => Ok(Some(false)),
          Some(_) => {
            conn.execute(
              "UPDATE fact_posts SET status = 'deleted', updated_at = ?2 WHERE post_id = ?1",
              rusqlite::params![id_str, updated_str],
            )?;
            Ok(Some(true))
          }
        }
      })
      .await?;

    Ok(deleted.ok_or(justtalk_core::Error::InvalidTarget(post_id))?)
  }

  async fn list_posts(&self, query: &PostQuery) -> Result<Vec<FactPost>> {
    let author_str      = query.author_id.map(encode_uuid);
    let fact_only       = query.fact_only;
    let include_deleted = query.include_deleted;
    let order_by        = order_clause(query.order);
    let limit_val       = i64::try_from(query.page_size()).unwrap_or(i64::MAX);
    let offset_val      = i64::try_from(query.page_offset()).unwrap_or(i64::MAX);

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        // Build WHERE clause dynamically.
        let mut conds: Vec<&'static str> = vec![];
        if author_str.is_some() {
          conds.push("author_id = ?1");
        }
        if fact_only {
          conds.push("is_fact = 1");
        }
        if !include_deleted {
          conds.push("status = 'active'");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {POST_COLUMNS}
           FROM fact_posts
           {where_clause}
           ORDER BY {order_by}
           LIMIT ?2 OFFSET ?3"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![author_str.as_deref(), limit_val, offset_val],
            RawPost::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  // ── Vote ledger ───────────────────────────────────────────────────────────

  async fn upsert_vote(&self, post_id: Uuid, user_id: Uuid, vote: VoteType) -> Result<LedgerWrite> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);
    let vote_id  = encode_uuid(Uuid::new_v4());
    let vote_str = vote.as_str();
    let at_str   = encode_dt(now());

    let raw: Option<RawLedgerWrite> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !accepts_votes(&tx, &post_str)? {
          return Ok(None);
        }

        let previous = current_vote(&tx, &post_str, &user_str)?;
        tx.execute(
          "INSERT INTO fact_votes (vote_id, post_id, user_id, vote_type, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT (post_id, user_id) DO UPDATE SET
             vote_type  = excluded.vote_type,
             updated_at = excluded.updated_at",
          rusqlite::params![vote_id, post_str, user_str, vote_str, at_str],
        )?;
        let record = tx.query_row(
          &format!("SELECT {VOTE_COLUMNS} FROM fact_votes WHERE post_id = ?1 AND user_id = ?2"),
          rusqlite::params![post_str, user_str],
          RawVote::from_row,
        )?;
        let consensus = resync_consensus(&tx, &post_str)?;
        tx.commit()?;

        Ok(Some(RawLedgerWrite { previous, record: Some(record), consensus }))
      })
      .await?;

    raw
      .ok_or(justtalk_core::Error::InvalidTarget(post_id))?
      .into_write()
  }

  async fn remove_vote(&self, post_id: Uuid, user_id: Uuid) -> Result<LedgerWrite> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);

    let raw: Option<RawLedgerWrite> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !accepts_votes(&tx, &post_str)? {
          return Ok(None);
        }

        let previous = current_vote(&tx, &post_str, &user_str)?;
        if previous.is_some() {
          tx.execute(
            "DELETE FROM fact_votes WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
          )?;
        }
        let consensus = resync_consensus(&tx, &post_str)?;
        tx.commit()?;

        Ok(Some(RawLedgerWrite { previous, record: None, consensus }))
      })
      .await?;

    raw
      .ok_or(justtalk_core::Error::InvalidTarget(post_id))?
      .into_write()
  }

  async fn get_vote(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<VoteType>> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| Ok(current_vote(conn, &post_str, &user_str)?))
      .await?;

    raw.as_deref().map(decode_vote_type).transpose()
  }

  async fn get_votes_for_post(&self, post_id: Uuid) -> Result<Vec<FactVoteRecord>> {
    let post_str = encode_uuid(post_id);

    let raws: Vec<RawVote> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {VOTE_COLUMNS} FROM fact_votes WHERE post_id = ?1"))?;
        let rows = stmt
          .query_map(rusqlite::params![post_str], RawVote::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVote::into_record).collect()
  }

  async fn get_user_votes(
    &self,
    post_ids: Vec<Uuid>,
    user_id:  Uuid,
  ) -> Result<HashMap<Uuid, VoteType>> {
    if post_ids.is_empty() {
      return Ok(HashMap::new());
    }

    // The batch travels as one JSON array so its size is not bounded by
    // SQLite's host-parameter limit.
    let user_str = encode_uuid(user_id);
    let ids_json = serde_json::to_string(
      &post_ids.into_iter().map(encode_uuid).collect::<Vec<_>>(),
    )?;

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT post_id, vote_type FROM fact_votes
           WHERE user_id = ?1
             AND post_id IN (SELECT value FROM json_each(?2))",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, ids_json], |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(post_id, vote)| Ok((decode_uuid(&post_id)?, decode_vote_type(&vote)?)))
      .collect()
  }

  // ── Consensus cache ───────────────────────────────────────────────────────

  async fn recompute(&self, post_id: Uuid) -> Result<Consensus> {
    let post_str = encode_uuid(post_id);

    let consensus: Option<Consensus> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !accepts_votes(&tx, &post_str)? {
          return Ok(None);
        }
        let consensus = resync_consensus(&tx, &post_str)?;
        tx.commit()?;
        Ok(Some(consensus))
      })
      .await?;

    let Some(consensus) = consensus else {
      tracing::debug!(%post_id, "recompute skipped, post not in fact mode");
      return Err(justtalk_core::Error::NotApplicable(post_id).into());
    };
    Ok(consensus)
  }

  async fn get_cached(&self, post_id: Uuid) -> Result<Option<Consensus>> {
    let post_str = encode_uuid(post_id);

    let raw: Option<RawConsensus> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT consensus_agree, consensus_partial, consensus_disagree, consensus_level
               FROM fact_posts WHERE post_id = ?1",
              rusqlite::params![post_str],
              |r| {
                Ok(RawConsensus {
                  agree:    r.get(0)?,
                  partial:  r.get(1)?,
                  disagree: r.get(2)?,
                  level:    r.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawConsensus::into_consensus).transpose()?.flatten())
  }
}
