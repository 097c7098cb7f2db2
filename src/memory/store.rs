//! Record store access: typed inserts for the capture path and typed reads
//! for the engines.
//!
//! The engines never open connections; every function here takes the
//! caller's handle. Ids default to UUID v7 so insertion order is sortable.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RecallError, Result};
use crate::memory::types::{normalize_timestamp, now_timestamp, Agent, Checkpoint, Session, Turn};

#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    pub id: Option<String>,
    pub parent_agent_id: Option<String>,
    pub agent_type: String,
    pub role: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub id: Option<String>,
    pub project_id: String,
    pub agent_id: Option<String>,
    pub session_type: String,
    /// Defaults to now.
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTurn {
    pub id: Option<String>,
    pub session_id: String,
    pub turn_number: i64,
    pub user_message: Option<String>,
    pub assistant_summary: Option<String>,
    pub git_commit_hash: Option<String>,
    pub files_touched: Vec<String>,
    /// Defaults to now.
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCheckpoint {
    pub id: Option<String>,
    pub session_id: String,
    pub git_commit_hash: String,
    pub git_branch: Option<String>,
    pub parent_checkpoint_id: Option<String>,
    pub created_at: Option<String>,
}

/// Supplied timestamps are stored in the same UTC form as normalized bounds.
fn stored_timestamp(ts: &Option<String>) -> Result<String> {
    match ts {
        Some(ts) => normalize_timestamp(ts),
        None => Ok(now_timestamp()),
    }
}

fn new_id(id: &Option<String>) -> String {
    id.clone()
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
}

/// Insert a project row. Returns its id.
pub fn insert_project(conn: &Connection, name: &str, repo_path: &str) -> Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO projects (id, name, repo_path, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, name, repo_path, now_timestamp()],
    )?;
    Ok(id)
}

pub fn insert_agent(conn: &Connection, agent: &NewAgent) -> Result<String> {
    let id = new_id(&agent.id);
    conn.execute(
        "INSERT INTO agents (id, parent_agent_id, agent_type, role, name, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            agent.parent_agent_id,
            agent.agent_type,
            agent.role,
            agent.name,
            now_timestamp()
        ],
    )?;
    Ok(id)
}

pub fn insert_session(conn: &Connection, session: &NewSession) -> Result<String> {
    let id = new_id(&session.id);
    let started_at = stored_timestamp(&session.started_at)?;
    let ended_at = session.ended_at.as_deref().map(normalize_timestamp).transpose()?;
    conn.execute(
        "INSERT INTO sessions (id, project_id, agent_id, session_type, started_at, ended_at, \
         last_activity_at, session_title, session_summary) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?7, ?8)",
        params![
            id,
            session.project_id,
            session.agent_id,
            session.session_type,
            started_at,
            ended_at,
            session.title,
            session.summary,
        ],
    )?;
    Ok(id)
}

/// Insert a turn and advance the owning session's `last_activity_at`.
pub fn insert_turn(conn: &Connection, turn: &NewTurn) -> Result<String> {
    let id = new_id(&turn.id);
    let timestamp = stored_timestamp(&turn.timestamp)?;
    let files_json = if turn.files_touched.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&turn.files_touched)?)
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO turns (id, session_id, turn_number, user_message, assistant_summary, \
         git_commit_hash, files_touched, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            turn.session_id,
            turn.turn_number,
            turn.user_message,
            turn.assistant_summary,
            turn.git_commit_hash,
            files_json,
            timestamp,
        ],
    )?;
    tx.execute(
        "UPDATE sessions SET last_activity_at = MAX(last_activity_at, ?1) WHERE id = ?2",
        params![timestamp, turn.session_id],
    )?;
    tx.commit()?;
    Ok(id)
}

/// Record where a turn's full transcript lives, relative to the content root.
pub fn attach_turn_content(
    conn: &Connection,
    turn_id: &str,
    content_path: &str,
    content_size: i64,
    content_hash: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO turn_content (turn_id, content_path, content_size, content_hash) \
         VALUES (?1, ?2, ?3, ?4)",
        params![turn_id, content_path, content_size, content_hash],
    )?;
    Ok(())
}

pub fn insert_checkpoint(conn: &Connection, checkpoint: &NewCheckpoint) -> Result<String> {
    let id = new_id(&checkpoint.id);
    let created_at = stored_timestamp(&checkpoint.created_at)?;
    conn.execute(
        "INSERT INTO checkpoints (id, session_id, git_commit_hash, git_branch, \
         parent_checkpoint_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            checkpoint.session_id,
            checkpoint.git_commit_hash,
            checkpoint.git_branch,
            checkpoint.parent_checkpoint_id,
            created_at,
        ],
    )?;
    Ok(id)
}

pub fn get_turn(conn: &Connection, turn_id: &str) -> Result<Option<Turn>> {
    let sql = format!("SELECT {} FROM turns t WHERE t.id = ?1", Turn::COLUMNS);
    Ok(conn.query_row(&sql, params![turn_id], Turn::from_row).optional()?)
}

/// Look up a turn by exact id, falling back to a literal prefix match.
pub fn resolve_turn(conn: &Connection, id_or_prefix: &str) -> Result<Turn> {
    if let Some(turn) = get_turn(conn, id_or_prefix)? {
        return Ok(turn);
    }
    if id_or_prefix.is_empty() {
        return Err(RecallError::not_found("turn", id_or_prefix));
    }
    let sql = format!(
        "SELECT {} FROM turns t WHERE t.id LIKE ?1 ESCAPE '\\' ORDER BY t.id LIMIT 1",
        Turn::COLUMNS
    );
    conn.query_row(&sql, params![format!("{}%", escape_like(id_or_prefix))], Turn::from_row)
        .optional()?
        .ok_or_else(|| RecallError::not_found("turn", id_or_prefix))
}

pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions s WHERE s.id = ?1", Session::COLUMNS);
    Ok(conn.query_row(&sql, params![session_id], Session::from_row).optional()?)
}

/// All turns of a session in ordinal order.
pub fn session_turns(conn: &Connection, session_id: &str) -> Result<Vec<Turn>> {
    let sql = format!(
        "SELECT {} FROM turns t WHERE t.session_id = ?1 ORDER BY t.turn_number ASC",
        Turn::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let turns = stmt
        .query_map(params![session_id], Turn::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(turns)
}

pub fn get_checkpoint(conn: &Connection, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
    let sql = format!("SELECT {} FROM checkpoints c WHERE c.id = ?1", Checkpoint::COLUMNS);
    Ok(conn
        .query_row(&sql, params![checkpoint_id], Checkpoint::from_row)
        .optional()?)
}

pub fn get_agent(conn: &Connection, agent_id: &str) -> Result<Option<Agent>> {
    let sql = format!("SELECT {} FROM agents a WHERE a.id = ?1", Agent::COLUMNS);
    Ok(conn.query_row(&sql, params![agent_id], Agent::from_row).optional()?)
}

/// Escape LIKE wildcards so prefix matching is literal.
pub(crate) fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seeded() -> (Connection, String) {
        let conn = db::open_memory_database().unwrap();
        let project = insert_project(&conn, "demo", "/tmp/demo").unwrap();
        let session = insert_session(
            &conn,
            &NewSession {
                project_id: project,
                session_type: "claude".into(),
                started_at: Some("2026-01-01T00:00:00Z".into()),
                ..Default::default()
            },
        )
        .unwrap();
        (conn, session)
    }

    #[test]
    fn insert_and_read_turn_parses_files_once() {
        let (conn, session) = seeded();
        let id = insert_turn(
            &conn,
            &NewTurn {
                session_id: session.clone(),
                turn_number: 1,
                user_message: Some("fix the parser".into()),
                files_touched: vec!["src/b.rs".into(), "src/a.rs".into()],
                timestamp: Some("2026-01-02T00:00:00Z".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let turn = get_turn(&conn, &id).unwrap().unwrap();
        assert_eq!(turn.session_id, session);
        assert_eq!(
            turn.files_touched.iter().collect::<Vec<_>>(),
            vec!["src/a.rs", "src/b.rs"]
        );
        assert!(turn.consolidated_at.is_none());

        let s = get_session(&conn, &session).unwrap().unwrap();
        assert_eq!(s.last_activity_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn offset_timestamps_are_stored_as_utc() {
        let (conn, session) = seeded();
        let id = insert_turn(
            &conn,
            &NewTurn {
                session_id: session.clone(),
                turn_number: 1,
                timestamp: Some("2026-01-02T02:00:00+02:00".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(get_turn(&conn, &id).unwrap().unwrap().timestamp, "2026-01-02T00:00:00Z");

        let cp = insert_checkpoint(
            &conn,
            &NewCheckpoint {
                session_id: session.clone(),
                git_commit_hash: "abc".into(),
                created_at: Some("2026-01-03".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(get_checkpoint(&conn, &cp).unwrap().unwrap().created_at, "2026-01-03T00:00:00Z");
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        let (conn, session) = seeded();
        let err = insert_turn(
            &conn,
            &NewTurn {
                session_id: session.clone(),
                turn_number: 1,
                timestamp: Some("yesterday".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, RecallError::InvalidFilter(_)));
        assert!(session_turns(&conn, &session).unwrap().is_empty());
    }

    #[test]
    fn turn_number_is_unique_per_session() {
        let (conn, session) = seeded();
        let turn = NewTurn {
            session_id: session,
            turn_number: 1,
            ..Default::default()
        };
        insert_turn(&conn, &turn).unwrap();
        assert!(insert_turn(&conn, &turn).is_err());
    }

    #[test]
    fn resolve_turn_by_prefix() {
        let (conn, session) = seeded();
        insert_turn(
            &conn,
            &NewTurn {
                id: Some("turn_abc123".into()),
                session_id: session,
                turn_number: 1,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(resolve_turn(&conn, "turn_abc").unwrap().id, "turn_abc123");
        // `_` must not act as a wildcard
        assert!(matches!(
            resolve_turn(&conn, "turnXabc"),
            Err(RecallError::NotFound { .. })
        ));
        assert!(resolve_turn(&conn, "").is_err());
    }

    #[test]
    fn session_turns_are_ordered() {
        let (conn, session) = seeded();
        for n in [3, 1, 2] {
            insert_turn(
                &conn,
                &NewTurn {
                    session_id: session.clone(),
                    turn_number: n,
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let numbers: Vec<i64> = session_turns(&conn, &session)
            .unwrap()
            .iter()
            .map(|t| t.turn_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
