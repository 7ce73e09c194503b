//! Consensus aggregation: counts and classification derived from the vote
//! ledger.
//!
//! Nothing here touches a store. [`classify`] is a pure function of the three
//! vote counts; the storage backend calls [`Consensus::from_counts`] after
//! counting live ledger rows and caches the result on the post.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::vote::{FactVoteRecord, VoteType};

/// Below this many votes a post stays [`ConsensusLevel::Pending`].
pub const MIN_SAMPLE: u32 = 3;

// Thresholds as exact fractions (numerator, denominator).
const CONTROVERSIAL_DISAGREE: (u64, u64) = (2, 5); // 0.4
const MEDIUM_AGREE: (u64, u64) = (3, 5); // 0.6
const HIGH_AGREE: (u64, u64) = (4, 5); // 0.8

// ─── Level ───────────────────────────────────────────────────────────────────

/// How settled neighborhood opinion is on a fact post.
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
#[strum(serialize_all = "snake_case")]
pub enum ConsensusLevel {
  High,
  Medium,
  Low,
  /// Meaningful disagreement without a clear majority.
  Controversial,
  /// Not enough votes to say anything yet.
  Pending,
}

impl ConsensusLevel {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Position in feed display order; lower sorts first.
  pub fn display_rank(self) -> u8 {
    match self {
      Self::High => 0,
      Self::Medium => 1,
      Self::Controversial => 2,
      Self::Low => 3,
      Self::Pending => 4,
    }
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify a post from its agree / partial / disagree counts.
///
/// `agree_ratio = (agree + partial / 2) / total` and
/// `disagree_ratio = disagree / total`; rules are evaluated in order and the
/// first match wins. Ratios are compared by cross-multiplication so boundary
/// values are exact.
pub fn classify(agree: u32, partial: u32, disagree: u32) -> ConsensusLevel {
  let total = u64::from(agree) + u64::from(partial) + u64::from(disagree);
  if total < u64::from(MIN_SAMPLE) {
    return ConsensusLevel::Pending;
  }

  // agree_ratio = weighted / (2 * total)
  let weighted = 2 * u64::from(agree) + u64::from(partial);
  let agree_at_least = |(num, den): (u64, u64)| weighted * den >= 2 * total * num;
  let disagree_at_least = |(num, den): (u64, u64)| u64::from(disagree) * den >= total * num;

  if disagree_at_least(CONTROVERSIAL_DISAGREE) && !agree_at_least(MEDIUM_AGREE) {
    ConsensusLevel::Controversial
  } else if agree_at_least(HIGH_AGREE) {
    ConsensusLevel::High
  } else if agree_at_least(MEDIUM_AGREE) {
    ConsensusLevel::Medium
  } else {
    ConsensusLevel::Low
  }
}

// ─── Consensus ───────────────────────────────────────────────────────────────

/// The aggregate vote summary for one fact post.
///
/// Always derived from the ledger; the copy cached on a post is a snapshot
/// that may be thrown away and rebuilt at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consensus {
  pub agree:       u32,
  pub partial:     u32,
  pub disagree:    u32,
  pub total_votes: u32,
  pub level:       ConsensusLevel,
}

impl Consensus {
  /// The zero-vote consensus.
  pub fn pending() -> Self { Self::from_counts(0, 0, 0) }

  pub fn from_counts(agree: u32, partial: u32, disagree: u32) -> Self {
    Self {
      agree,
      partial,
      disagree,
      total_votes: agree + partial + disagree,
      level: classify(agree, partial, disagree),
    }
  }

  /// Count a set of live ledger records.
  pub fn tally<'a>(records: impl IntoIterator<Item = &'a FactVoteRecord>) -> Self {
    Self::from_votes(records.into_iter().map(|r| r.vote_type))
  }

  pub fn from_votes(votes: impl IntoIterator<Item = VoteType>) -> Self {
    let (mut agree, mut partial, mut disagree) = (0, 0, 0);
    for vote in votes {
      match vote {
        VoteType::Agree => agree += 1,
        VoteType::Partial => partial += 1,
        VoteType::Disagree => disagree += 1,
      }
    }
    Self::from_counts(agree, partial, disagree)
  }

  /// `(agree + partial / 2) / total`, or `0.0` with no votes.
  pub fn agree_ratio(&self) -> f64 {
    if self.total_votes == 0 {
      return 0.0;
    }
    (f64::from(self.agree) + 0.5 * f64::from(self.partial)) / f64::from(self.total_votes)
  }

  /// `disagree / total`, or `0.0` with no votes.
  pub fn disagree_ratio(&self) -> f64 {
    if self.total_votes == 0 {
      return 0.0;
    }
    f64::from(self.disagree) / f64::from(self.total_votes)
  }

  /// Feed ordering: by level rank, then busier posts first.
  pub fn display_cmp(&self, other: &Self) -> Ordering {
    self
      .level
      .display_rank()
      .cmp(&other.level.display_rank())
      .then_with(|| other.total_votes.cmp(&self.total_votes))
  }
}

impl Default for Consensus {
  fn default() -> Self { Self::pending() }
}
