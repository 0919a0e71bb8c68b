//! SQL migration definitions for the wasmcache cache database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: artifacts, chunks",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Complete assembled artifacts
CREATE TABLE IF NOT EXISTS artifacts (
    name         TEXT PRIMARY KEY,
    payload      BLOB NOT NULL,
    size         INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    stored_at    TEXT NOT NULL
);

-- Transient chunks, live only between fetch and assembly
CREATE TABLE IF NOT EXISTS chunks (
    name         TEXT PRIMARY KEY,
    payload      BLOB NOT NULL,
    size         INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    stored_at    TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
