//! SQL schema for the JustTalk SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Posts are soft-deleted; no DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS fact_posts (
    post_id             TEXT PRIMARY KEY,
    author_id           TEXT NOT NULL,
    content             TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'deleted'
    is_fact             INTEGER NOT NULL DEFAULT 0,
    fact_data           TEXT,            -- JSON-encoded FactData or NULL
    -- Cached consensus; NULL until computed. Only the recompute writes these.
    consensus_agree     INTEGER,
    consensus_partial   INTEGER,
    consensus_disagree  INTEGER,
    consensus_level     TEXT,
    created_at          TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at          TEXT NOT NULL
);

-- The vote ledger: one live row per (post, user).
CREATE TABLE IF NOT EXISTS fact_votes (
    vote_id     TEXT PRIMARY KEY,
    post_id     TEXT NOT NULL REFERENCES fact_posts(post_id),
    user_id     TEXT NOT NULL,
    vote_type   TEXT NOT NULL CHECK (vote_type IN ('agree', 'partial', 'disagree')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (post_id, user_id)
);

CREATE INDEX IF NOT EXISTS fact_votes_user_idx     ON fact_votes(user_id);
CREATE INDEX IF NOT EXISTS fact_posts_author_idx   ON fact_posts(author_id);
CREATE INDEX IF NOT EXISTS fact_posts_created_idx  ON fact_posts(created_at);

PRAGMA user_version = 1;
";
