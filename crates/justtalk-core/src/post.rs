//! Fact posts: community posts that may be flagged as verifiable claims.
//!
//! Caller payloads ([`NewFactPost`], [`FactPostPatch`]) arrive as loosely
//! typed input and only reach the store as a [`PostDraft`] once they have
//! passed validation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, consensus::Consensus, vote::VoteType};

/// A fact post may carry at most this many evidence attachments.
pub const MAX_EVIDENCE: usize = 3;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// What kind of claim a fact post makes.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FactType {
  ServiceExperience,
  PropertyIssue,
  PriceChange,
  SafetyAlert,
  Recommendation,
  NeighborhoodInfo,
  #[default]
  Other,
}

impl FactType {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::invalid_argument("fact_type", format!("unknown fact type {s:?}")))
  }
}

/// Posts are soft-deleted so that ledger rows never dangle.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PostStatus {
  #[default]
  Active,
  Deleted,
}

impl PostStatus {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Fact metadata ───────────────────────────────────────────────────────────

/// Who or what the claim is about, e.g. a shop or a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSubject {
  pub kind: String,
  pub name: String,
}

/// A reference to an uploaded photo or video backing the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
  pub url:        String,
  pub media_type: Option<String>,
}

/// Validated fact metadata attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactData {
  pub occurred_at: NaiveDate,
  pub location:    String,
  pub fact_type:   FactType,
  pub subject:     Option<FactSubject>,
  #[serde(default)]
  pub evidence:    Vec<EvidenceRef>,
}

/// Fact metadata as submitted by a caller, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactDataInput {
  /// `YYYY-MM-DD`.
  pub occurred_at: Option<String>,
  pub location:    Option<String>,
  /// Defaults to [`FactType::Other`] when absent.
  pub fact_type:   Option<String>,
  pub subject:     Option<FactSubject>,
  #[serde(default)]
  pub evidence:    Vec<EvidenceRef>,
}

impl FactDataInput {
  pub fn validate(self) -> Result<FactData> {
    let occurred_at = required(self.occurred_at, "occurred_at")?;
    let location = required(self.location, "location")?;

    let occurred_at = NaiveDate::parse_from_str(&occurred_at, "%Y-%m-%d").map_err(|e| {
      Error::invalid_argument("occurred_at", format!("{occurred_at:?} is not a date: {e}"))
    })?;

    if self.evidence.len() > MAX_EVIDENCE {
      return Err(Error::invalid_argument(
        "evidence",
        format!("at most {MAX_EVIDENCE} items allowed, got {}", self.evidence.len()),
      ));
    }

    let fact_type = match self.fact_type.as_deref() {
      Some(s) => FactType::parse(s)?,
      None => FactType::default(),
    };

    Ok(FactData {
      occurred_at,
      location,
      fact_type,
      subject: self.subject,
      evidence: self.evidence,
    })
  }
}

impl From<FactData> for FactDataInput {
  fn from(d: FactData) -> Self {
    Self {
      occurred_at: Some(d.occurred_at.format("%Y-%m-%d").to_string()),
      location:    Some(d.location),
      fact_type:   Some(d.fact_type.as_str().to_owned()),
      subject:     d.subject,
      evidence:    d.evidence,
    }
  }
}

/// Trimmed, non-blank value or a validation error naming `field`.
fn required(value: Option<String>, field: &'static str) -> Result<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
    .ok_or(Error::Validation { field })
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// A community post, optionally in fact mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactPost {
  pub post_id:    Uuid,
  pub author_id:  Uuid,
  pub content:    String,
  pub status:     PostStatus,
  pub is_fact:    bool,
  /// Kept when fact mode is switched off so it can be switched back on.
  pub fact_data:  Option<FactData>,
  /// Last snapshot written by the aggregator. Never edited by hand.
  pub consensus:  Option<Consensus>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl FactPost {
  /// Whether neighbors may currently vote on this post.
  pub fn accepts_votes(&self) -> bool {
    self.is_fact && self.status == PostStatus::Active
  }

  /// The consensus to show for this post: `None` outside fact mode, otherwise
  /// the cached snapshot or the zero-vote default.
  pub fn display_consensus(&self) -> Option<Consensus> {
    self.is_fact.then(|| self.consensus.unwrap_or_default())
  }
}

/// A post joined with its consensus and the viewer's own vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
  pub post:      FactPost,
  pub consensus: Option<Consensus>,
  pub my_vote:   Option<VoteType>,
}

impl PostView {
  pub fn new(post: FactPost, my_vote: Option<VoteType>) -> Self {
    let consensus = post.display_consensus();
    Self { post, consensus, my_vote }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Payload for creating a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFactPost {
  pub content:   String,
  #[serde(default)]
  pub is_fact:   bool,
  pub fact_data: Option<FactDataInput>,
}

impl NewFactPost {
  pub fn validate(self) -> Result<PostDraft> {
    let content = required(Some(self.content), "content")?;
    let fact_data = if self.is_fact {
      Some(self.fact_data.unwrap_or_default().validate()?)
    } else {
      None
    };
    Ok(PostDraft { content, is_fact: self.is_fact, fact_data })
  }
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactPostPatch {
  pub content:   Option<String>,
  pub is_fact:   Option<bool>,
  pub fact_data: Option<FactDataInput>,
}

impl FactPostPatch {
  pub fn touches_fact_fields(&self) -> bool {
    self.is_fact.is_some() || self.fact_data.is_some()
  }

  /// Merge onto `post`, re-validating fact fields if the patch touches them.
  pub fn apply_to(self, post: &FactPost) -> Result<PostDraft> {
    let touches_fact = self.touches_fact_fields();
    let content = match self.content {
      Some(c) => required(Some(c), "content")?,
      None => post.content.clone(),
    };
    let is_fact = self.is_fact.unwrap_or(post.is_fact);

    let fact_data = match self.fact_data {
      Some(input) => Some(input.validate()?),
      None if touches_fact && is_fact => match &post.fact_data {
        // Re-entering fact mode re-checks the archived metadata.
        Some(existing) => Some(FactDataInput::from(existing.clone()).validate()?),
        None => return Err(Error::Validation { field: "occurred_at" }),
      },
      None => post.fact_data.clone(),
    };

    Ok(PostDraft { content, is_fact, fact_data })
  }
}

/// Validated post fields, ready to be written by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
  pub content:   String,
  pub is_fact:   bool,
  pub fact_data: Option<FactData>,
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// Page size used when a query names none.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a single query may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// Feed sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrder {
  /// Newest first.
  #[default]
  Recent,
  /// Fact posts by consensus display rank, then by vote count, then newest
  /// first; plain posts last.
  Consensus,
}

/// Parameters for [`crate::store::FactStore::list_posts`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
  pub author_id:       Option<Uuid>,
  /// Only posts currently in fact mode.
  #[serde(default)]
  pub fact_only:       bool,
  #[serde(default)]
  pub include_deleted: bool,
  #[serde(default)]
  pub order:           FeedOrder,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

impl PostQuery {
  /// `limit`, defaulted and capped at [`MAX_PAGE_SIZE`].
  pub fn page_size(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
  }

  pub fn page_offset(&self) -> usize { self.offset.unwrap_or(0) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fact_input() -> FactDataInput {
    FactDataInput {
      occurred_at: Some("2024-05-01".into()),
      location:    Some("Maple St & 3rd".into()),
      fact_type:   Some("safety_alert".into()),
      subject:     None,
      evidence:    vec![],
    }
  }

  fn new_fact_post(fact_data: FactDataInput) -> NewFactPost {
    NewFactPost {
      content:   "Streetlight out again".into(),
      is_fact:   true,
      fact_data: Some(fact_data),
    }
  }

  fn stored(draft: PostDraft) -> FactPost {
    FactPost {
      post_id:    Uuid::new_v4(),
      author_id:  Uuid::new_v4(),
      content:    draft.content,
      status:     PostStatus::Active,
      is_fact:    draft.is_fact,
      fact_data:  draft.fact_data,
      consensus:  None,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn valid_fact_post() {
    let draft = new_fact_post(fact_input()).validate().unwrap();
    let data = draft.fact_data.unwrap();
    assert_eq!(data.occurred_at, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(data.fact_type, FactType::SafetyAlert);
  }

  #[test]
  fn missing_location_names_field() {
    let mut input = fact_input();
    input.location = None;
    let err = new_fact_post(input).validate().unwrap_err();
    assert!(matches!(err, Error::Validation { field: "location" }));
  }

  #[test]
  fn blank_occurred_at_names_field() {
    let mut input = fact_input();
    input.occurred_at = Some("   ".into());
    let err = new_fact_post(input).validate().unwrap_err();
    assert!(matches!(err, Error::Validation { field: "occurred_at" }));
  }

  #[test]
  fn fact_post_without_fact_data_fails() {
    let post = NewFactPost {
      content:   "hello".into(),
      is_fact:   true,
      fact_data: None,
    };
    assert!(matches!(post.validate(), Err(Error::Validation { field: "occurred_at" })));
  }

  #[test]
  fn malformed_date_is_invalid_argument() {
    let mut input = fact_input();
    input.occurred_at = Some("yesterday".into());
    let err = new_fact_post(input).validate().unwrap_err();
    assert_eq!(err.field(), Some("occurred_at"));
    assert_eq!(err.code(), "invalid_argument");
  }

  #[test]
  fn too_much_evidence() {
    let mut input = fact_input();
    input.evidence = (0..4)
      .map(|i| EvidenceRef { url: format!("https://img.example/{i}.jpg"), media_type: None })
      .collect();
    let err = new_fact_post(input).validate().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { field: "evidence", .. }));
  }

  #[test]
  fn unknown_fact_type() {
    let mut input = fact_input();
    input.fact_type = Some("gossip".into());
    let err = new_fact_post(input).validate().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { field: "fact_type", .. }));
  }

  #[test]
  fn missing_fact_type_defaults_to_other() {
    let mut input = fact_input();
    input.fact_type = None;
    let draft = new_fact_post(input).validate().unwrap();
    assert_eq!(draft.fact_data.unwrap().fact_type, FactType::Other);
  }

  #[test]
  fn plain_post_drops_fact_data() {
    let draft = NewFactPost {
      content:   "Lost cat near the park".into(),
      is_fact:   false,
      fact_data: Some(FactDataInput::default()),
    }
    .validate()
    .unwrap();
    assert!(!draft.is_fact);
    assert!(draft.fact_data.is_none());
  }

  #[test]
  fn blank_content_rejected() {
    let err = NewFactPost { content: "  ".into(), ..Default::default() }
      .validate()
      .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "content" }));
  }

  #[test]
  fn patch_without_fact_fields_keeps_fact_data() {
    let post = stored(new_fact_post(fact_input()).validate().unwrap());
    let patch = FactPostPatch { content: Some("Fixed now?".into()), ..Default::default() };
    assert!(!patch.touches_fact_fields());
    let draft = patch.apply_to(&post).unwrap();
    assert_eq!(draft.content, "Fixed now?");
    assert_eq!(draft.fact_data, post.fact_data);
  }

  #[test]
  fn patch_turning_fact_mode_off_archives_fact_data() {
    let post = stored(new_fact_post(fact_input()).validate().unwrap());
    let draft = FactPostPatch { is_fact: Some(false), ..Default::default() }
      .apply_to(&post)
      .unwrap();
    assert!(!draft.is_fact);
    assert_eq!(draft.fact_data, post.fact_data);
  }

  #[test]
  fn patch_enabling_fact_mode_requires_fact_data() {
    let post = stored(
      NewFactPost { content: "Plain".into(), ..Default::default() }.validate().unwrap(),
    );
    let err = FactPostPatch { is_fact: Some(true), ..Default::default() }
      .apply_to(&post)
      .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "occurred_at" }));
  }

  #[test]
  fn patch_revalidates_new_fact_data() {
    let post = stored(new_fact_post(fact_input()).validate().unwrap());
    let mut input = fact_input();
    input.location = Some(String::new());
    let err = FactPostPatch { fact_data: Some(input), ..Default::default() }
      .apply_to(&post)
      .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "location" }));
  }

  #[test]
  fn display_consensus_synthesizes_default() {
    let post = stored(new_fact_post(fact_input()).validate().unwrap());
    assert_eq!(post.display_consensus(), Some(Consensus::pending()));

    let plain = stored(
      NewFactPost { content: "Plain".into(), ..Default::default() }.validate().unwrap(),
    );
    assert_eq!(plain.display_consensus(), None);
  }

  #[test]
  fn page_size_is_defaulted_and_capped() {
    assert_eq!(PostQuery::default().page_size(), DEFAULT_PAGE_SIZE);
    let huge = PostQuery { limit: Some(usize::MAX), ..Default::default() };
    assert_eq!(huge.page_size(), MAX_PAGE_SIZE);
    let small = PostQuery { limit: Some(3), offset: Some(6), ..Default::default() };
    assert_eq!((small.page_size(), small.page_offset()), (3, 6));
  }
}
