//! Vote ledger types.
//!
//! The ledger keeps exactly one live record per `(post_id, user_id)`: the
//! latest vote that user cast on that post. Revoting overwrites the record in
//! place; retracting removes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, consensus::Consensus};

// ─── VoteType ────────────────────────────────────────────────────────────────

/// A neighbor's verdict on a fact post.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VoteType {
  Agree,
  /// Counts as half an agreement when classifying.
  Partial,
  Disagree,
}

impl VoteType {
  /// The string stored in the `vote_type` column.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse caller input, rejecting anything outside the closed set.
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::invalid_argument("vote_type", format!("unknown vote type {s:?}")))
  }
}

// ─── Ledger record ───────────────────────────────────────────────────────────

/// The live ledger row for one user's vote on one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactVoteRecord {
  pub vote_id:    Uuid,
  pub post_id:    Uuid,
  pub user_id:    Uuid,
  pub vote_type:  VoteType,
  pub created_at: DateTime<Utc>,
  /// Refreshed every time the user re-casts.
  pub updated_at: DateTime<Utc>,
}

// ─── Per-user state ──────────────────────────────────────────────────────────

/// Where a single user stands on a single post.
///
/// ```text
/// NoVote ── cast(t) ──→ Voted(t) ── cast(t') ──→ Voted(t')
///                          │
///                       retract ──→ NoVote
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "vote", rename_all = "snake_case")]
pub enum VoteState {
  NoVote,
  Voted(VoteType),
}

impl VoteState {
  pub fn vote(self) -> Option<VoteType> {
    match self {
      Self::NoVote => None,
      Self::Voted(v) => Some(v),
    }
  }
}

impl From<Option<VoteType>> for VoteState {
  fn from(vote: Option<VoteType>) -> Self {
    vote.map_or(Self::NoVote, Self::Voted)
  }
}

// ─── Write outcome ───────────────────────────────────────────────────────────

/// Result of one atomic ledger mutation: the row change plus the aggregate
/// recomputed in the same transaction.
#[derive(Debug, Clone)]
pub struct LedgerWrite {
  /// The user's vote before the mutation.
  pub previous:  Option<VoteType>,
  /// The live record after the mutation; `None` once retracted.
  pub record:    Option<FactVoteRecord>,
  pub consensus: Consensus,
}

impl LedgerWrite {
  pub fn before(&self) -> VoteState { self.previous.into() }

  pub fn after(&self) -> VoteState {
    self.record.as_ref().map(|r| r.vote_type).into()
  }

  /// Whether the user's vote actually changed.
  pub fn changed(&self) -> bool { self.before() != self.after() }
}
