//! SQL DDL for the record store.
//!
//! Defines `projects`, `agents`, `sessions`, `turns`, `turn_content`,
//! `checkpoints`, `schema_meta`, and the FTS5 tables `fts_turns` and
//! `fts_sessions` with their sync triggers. All DDL uses `IF NOT EXISTS` for
//! idempotent initialization. Consolidation columns arrive in migration v2.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    repo_path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    parent_agent_id TEXT REFERENCES agents(id),
    agent_type TEXT NOT NULL,
    role TEXT,
    name TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agents_parent ON agents(parent_agent_id);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    agent_id TEXT REFERENCES agents(id),
    session_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    last_activity_at TEXT NOT NULL,
    session_title TEXT,
    session_summary TEXT,
    CHECK (ended_at IS NULL OR ended_at >= started_at)
);

CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent_id);
CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(last_activity_at DESC);

CREATE TABLE IF NOT EXISTS turns (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    turn_number INTEGER NOT NULL,
    user_message TEXT,
    assistant_summary TEXT,
    git_commit_hash TEXT,
    files_touched TEXT,
    timestamp TEXT NOT NULL,
    UNIQUE(session_id, turn_number)
);

CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
CREATE INDEX IF NOT EXISTS idx_turns_timestamp ON turns(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_turns_commit ON turns(git_commit_hash);

CREATE TABLE IF NOT EXISTS turn_content (
    turn_id TEXT PRIMARY KEY REFERENCES turns(id) ON DELETE CASCADE,
    content_path TEXT NOT NULL,
    content_size INTEGER NOT NULL,
    content_hash TEXT
);

CREATE TABLE IF NOT EXISTS checkpoints (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    git_commit_hash TEXT NOT NULL,
    git_branch TEXT,
    parent_checkpoint_id TEXT REFERENCES checkpoints(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON checkpoints(session_id);
CREATE INDEX IF NOT EXISTS idx_checkpoints_commit ON checkpoints(git_commit_hash);

-- Keyword index over turns (BM25)
CREATE VIRTUAL TABLE IF NOT EXISTS fts_turns USING fts5(
    user_message,
    assistant_summary,
    content='turns',
    content_rowid='rowid'
);

-- Keyword index over session titles and summaries
CREATE VIRTUAL TABLE IF NOT EXISTS fts_sessions USING fts5(
    session_title,
    session_summary,
    content='sessions',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS fts_turns_ai AFTER INSERT ON turns BEGIN
    INSERT INTO fts_turns(rowid, user_message, assistant_summary)
    VALUES (new.rowid, new.user_message, new.assistant_summary);
END;

CREATE TRIGGER IF NOT EXISTS fts_turns_ad AFTER DELETE ON turns BEGIN
    INSERT INTO fts_turns(fts_turns, rowid, user_message, assistant_summary)
    VALUES ('delete', old.rowid, old.user_message, old.assistant_summary);
END;

CREATE TRIGGER IF NOT EXISTS fts_turns_au AFTER UPDATE OF user_message, assistant_summary ON turns BEGIN
    INSERT INTO fts_turns(fts_turns, rowid, user_message, assistant_summary)
    VALUES ('delete', old.rowid, old.user_message, old.assistant_summary);
    INSERT INTO fts_turns(rowid, user_message, assistant_summary)
    VALUES (new.rowid, new.user_message, new.assistant_summary);
END;

CREATE TRIGGER IF NOT EXISTS fts_sessions_ai AFTER INSERT ON sessions BEGIN
    INSERT INTO fts_sessions(rowid, session_title, session_summary)
    VALUES (new.rowid, new.session_title, new.session_summary);
END;

CREATE TRIGGER IF NOT EXISTS fts_sessions_ad AFTER DELETE ON sessions BEGIN
    INSERT INTO fts_sessions(fts_sessions, rowid, session_title, session_summary)
    VALUES ('delete', old.rowid, old.session_title, old.session_summary);
END;

CREATE TRIGGER IF NOT EXISTS fts_sessions_au AFTER UPDATE OF session_title, session_summary ON sessions BEGIN
    INSERT INTO fts_sessions(fts_sessions, rowid, session_title, session_summary)
    VALUES ('delete', old.rowid, old.session_title, old.session_summary);
    INSERT INTO fts_sessions(rowid, session_title, session_summary)
    VALUES (new.rowid, new.session_title, new.session_summary);
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
