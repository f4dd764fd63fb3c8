//! SQL schema for the roomsync SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS auths (
    auth_id     TEXT PRIMARY KEY,
    server_url  TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (server_url, user_id)
);

-- identifier is NULL until the first sync assigns it, then never changes.
CREATE TABLE IF NOT EXISTS subscriptions (
    local_id        TEXT PRIMARY KEY,
    identifier      TEXT UNIQUE,
    auth_id         TEXT REFERENCES auths(auth_id) ON DELETE SET NULL,
    kind            TEXT NOT NULL DEFAULT 'c',  -- raw wire code
    rid             TEXT NOT NULL DEFAULT '',
    name            TEXT NOT NULL DEFAULT '',
    unread          INTEGER NOT NULL DEFAULT 0 CHECK (unread >= 0),
    open            INTEGER NOT NULL DEFAULT 0,
    alert           INTEGER NOT NULL DEFAULT 0,
    favorite        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT,                       -- RFC 3339 UTC or NULL
    last_seen       TEXT,                       -- RFC 3339 UTC or NULL
    other_user_id   TEXT
);

CREATE TABLE IF NOT EXISTS users (
    identifier  TEXT PRIMARY KEY,
    username    TEXT NOT NULL,
    name        TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    identifier       TEXT PRIMARY KEY,
    subscription_id  TEXT NOT NULL
                     REFERENCES subscriptions(local_id) ON DELETE CASCADE,
    user_id          TEXT,
    text             TEXT NOT NULL DEFAULT '',
    created_at       TEXT
);

CREATE INDEX IF NOT EXISTS subscriptions_auth_idx ON subscriptions(auth_id);
CREATE INDEX IF NOT EXISTS messages_sub_time_idx  ON messages(subscription_id, created_at);

PRAGMA user_version = 1;
";
