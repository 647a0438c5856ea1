//! SQL schema for the Pointage SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS agents (
    agent_id      TEXT PRIMARY KEY,
    personal_code TEXT NOT NULL UNIQUE
                  CHECK (personal_code GLOB '[0-9][0-9][0-9][0-9]'),
    display_name  TEXT NOT NULL,
    ip_hint       TEXT,            -- legacy identifier, display only
    created_at    TEXT NOT NULL
);

-- Punches are strictly append-only.
-- personal_code and agent_name are copies taken at punch time, not
-- references: editing or deleting an agent leaves its punches untouched.
CREATE TABLE IF NOT EXISTS punches (
    punch_id         TEXT PRIMARY KEY,
    personal_code    TEXT NOT NULL,
    agent_name       TEXT NOT NULL,
    direction        TEXT NOT NULL CHECK (direction IN ('entree', 'sortie')),
    calendar_date    TEXT NOT NULL,   -- YYYY-MM-DD from the scanned token
    captured_at      TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    latitude         REAL,
    longitude        REAL,
    resolved_address TEXT NOT NULL,
    source_ip        TEXT,
    source_token     TEXT NOT NULL,
    UNIQUE (personal_code, calendar_date, direction),
    CHECK  ((latitude IS NULL) = (longitude IS NULL))
);

CREATE TRIGGER IF NOT EXISTS punches_no_update
BEFORE UPDATE ON punches
BEGIN
    SELECT RAISE(ABORT, 'punches are append-only');
END;

CREATE TRIGGER IF NOT EXISTS punches_no_delete
BEFORE DELETE ON punches
BEGIN
    SELECT RAISE(ABORT, 'punches are append-only');
END;

CREATE INDEX IF NOT EXISTS punches_captured_idx ON punches(captured_at);
CREATE INDEX IF NOT EXISTS agents_ip_hint_idx   ON agents(ip_hint);

PRAGMA user_version = 1;
";
