//! SQL schema for the quality alert SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Each table keeps the whole record as a JSON `doc` plus the columns that
/// queries filter or sort on. Timestamps are fixed-width RFC 3339 strings so
/// they compare correctly as text.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS alert_rules (
    rule_id     TEXT PRIMARY KEY,
    enabled     INTEGER NOT NULL,
    priority    INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    doc         TEXT NOT NULL
);

-- Alerts are never deleted. Only status transitions and assignment
-- creation rewrite `doc`, both appending to its history arrays.
CREATE TABLE IF NOT EXISTS quality_alerts (
    alert_id        TEXT PRIMARY KEY,
    rule_id         TEXT NOT NULL,
    source_issue_id TEXT NOT NULL,
    level           TEXT NOT NULL,   -- 'critical' | 'warning' | 'info'
    category        TEXT NOT NULL,
    current_status  TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT,
    issue_summary   TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    doc             TEXT NOT NULL
);

-- Upstream quality-zeroing records, upserted by zeroing_id.
CREATE TABLE IF NOT EXISTS quality_zeroing (
    zeroing_id  TEXT PRIMARY KEY,
    updated_at  TEXT NOT NULL,
    doc         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rules_order_idx       ON alert_rules(priority, created_at);
CREATE INDEX IF NOT EXISTS alerts_dedup_idx      ON quality_alerts(rule_id, source_issue_id, created_at);
CREATE INDEX IF NOT EXISTS alerts_created_idx    ON quality_alerts(created_at);
CREATE INDEX IF NOT EXISTS alerts_level_idx      ON quality_alerts(level, category);
CREATE INDEX IF NOT EXISTS zeroing_updated_idx   ON quality_zeroing(updated_at);

PRAGMA user_version = 1;
";
