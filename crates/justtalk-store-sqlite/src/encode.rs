//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so they sort lexically. Fact metadata is stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use justtalk_core::{
  consensus::{Consensus, ConsensusLevel},
  post::{FactData, FactPost, PostStatus},
  vote::{FactVoteRecord, VoteType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Closed enumerations ──────────────────────────────────────────────────────

pub fn decode_vote_type(s: &str) -> Result<VoteType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown vote type: {s:?}")))
}

pub fn decode_status(s: &str) -> Result<PostStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown post status: {s:?}")))
}

pub fn decode_level(s: &str) -> Result<ConsensusLevel> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown consensus level: {s:?}")))
}

// ─── FactData ─────────────────────────────────────────────────────────────────

pub fn encode_fact_data(d: &FactData) -> Result<String> {
  Ok(serde_json::to_string(d)?)
}

pub fn decode_fact_data(s: &str) -> Result<FactData> {
  Ok(serde_json::from_str(s)?)
}

// ─── Consensus cache columns ──────────────────────────────────────────────────

/// `(agree, partial, disagree, level)` as bound to the cache columns.
pub type ConsensusColumns = (Option<u32>, Option<u32>, Option<u32>, Option<&'static str>);

pub fn encode_consensus(c: Option<&Consensus>) -> ConsensusColumns {
  match c {
    Some(c) => (
      Some(c.agree),
      Some(c.partial),
      Some(c.disagree),
      Some(c.level.as_str()),
    ),
    None => (None, None, None, None),
  }
}

/// Raw cache columns as read back from `fact_posts`.
pub struct RawConsensus {
  pub agree:    Option<u32>,
  pub partial:  Option<u32>,
  pub disagree: Option<u32>,
  pub level:    Option<String>,
}

impl RawConsensus {
  /// `None` until the aggregator has written the cache at least once.
  pub fn into_consensus(self) -> Result<Option<Consensus>> {
    let (Some(agree), Some(partial), Some(disagree), Some(level)) =
      (self.agree, self.partial, self.disagree, self.level)
    else {
      return Ok(None);
    };
    Ok(Some(Consensus {
      agree,
      partial,
      disagree,
      total_votes: agree + partial + disagree,
      level: decode_level(&level)?,
    }))
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPost::from_row`].
pub const POST_COLUMNS: &str = "post_id, author_id, content, status, is_fact, fact_data,
  consensus_agree, consensus_partial, consensus_disagree, consensus_level,
  created_at, updated_at";

/// Raw values read directly from a `fact_posts` row.
pub struct RawPost {
  pub post_id:    String,
  pub author_id:  String,
  pub content:    String,
  pub status:     String,
  pub is_fact:    bool,
  pub fact_data:  Option<String>,
  pub consensus:  RawConsensus,
  pub created_at: String,
  pub updated_at: String,
}

impl RawPost {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:    row.get(0)?,
      author_id:  row.get(1)?,
      content:    row.get(2)?,
      status:     row.get(3)?,
      is_fact:    row.get(4)?,
      fact_data:  row.get(5)?,
      consensus:  RawConsensus {
        agree:    row.get(6)?,
        partial:  row.get(7)?,
        disagree: row.get(8)?,
        level:    row.get(9)?,
      },
      created_at: row.get(10)?,
      updated_at: row.get(11)?,
    })
  }

  pub fn into_post(self) -> Result<FactPost> {
    Ok(FactPost {
      post_id:    decode_uuid(&self.post_id)?,
      author_id:  decode_uuid(&self.author_id)?,
      content:    self.content,
      status:     decode_status(&self.status)?,
      is_fact:    self.is_fact,
      fact_data:  self.fact_data.as_deref().map(decode_fact_data).transpose()?,
      consensus:  self.consensus.into_consensus()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawVote::from_row`].
pub const VOTE_COLUMNS: &str = "vote_id, post_id, user_id, vote_type, created_at, updated_at";

/// Raw strings read directly from a `fact_votes` row.
pub struct RawVote {
  pub vote_id:    String,
  pub post_id:    String,
  pub user_id:    String,
  pub vote_type:  String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawVote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      vote_id:    row.get(0)?,
      post_id:    row.get(1)?,
      user_id:    row.get(2)?,
      vote_type:  row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<FactVoteRecord> {
    Ok(FactVoteRecord {
      vote_id:    decode_uuid(&self.vote_id)?,
      post_id:    decode_uuid(&self.post_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      vote_type:  decode_vote_type(&self.vote_type)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
