#![allow(dead_code)]

use recollect::db;
use recollect::memory::store::{self, NewCheckpoint, NewSession, NewTurn};
use rusqlite::Connection;
use std::path::Path;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Insert a project and a session under it. Returns the session id.
pub fn session(conn: &Connection, id: &str, started_at: &str) -> String {
    session_with(conn, id, started_at, "coding", None)
}

pub fn session_with(
    conn: &Connection,
    id: &str,
    started_at: &str,
    session_type: &str,
    title: Option<&str>,
) -> String {
    let project_id =
        store::insert_project(conn, &format!("project-{id}"), &format!("/tmp/{id}")).unwrap();
    store::insert_session(
        conn,
        &NewSession {
            id: Some(id.to_string()),
            project_id,
            session_type: session_type.to_string(),
            started_at: Some(started_at.to_string()),
            title: title.map(String::from),
            ..Default::default()
        },
    )
    .unwrap()
}

/// Insert a turn with the given message, commit, files and timestamp.
pub fn turn(
    conn: &Connection,
    session_id: &str,
    id: &str,
    turn_number: i64,
    message: &str,
    commit: Option<&str>,
    files: &[&str],
    timestamp: &str,
) -> String {
    store::insert_turn(
        conn,
        &NewTurn {
            id: Some(id.to_string()),
            session_id: session_id.to_string(),
            turn_number,
            user_message: Some(message.to_string()),
            git_commit_hash: commit.map(String::from),
            files_touched: files.iter().map(|f| f.to_string()).collect(),
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        },
    )
    .unwrap()
}

/// Write `body` under `root/relative` and attach it to the turn.
pub fn content(conn: &Connection, root: &Path, turn_id: &str, relative: &str, body: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, body).unwrap();
    store::attach_turn_content(conn, turn_id, relative, body.len() as i64, None).unwrap();
}

pub fn checkpoint(
    conn: &Connection,
    session_id: &str,
    id: &str,
    commit: &str,
    parent: Option<&str>,
) -> String {
    store::insert_checkpoint(
        conn,
        &NewCheckpoint {
            id: Some(id.to_string()),
            session_id: session_id.to_string(),
            git_commit_hash: commit.to_string(),
            git_branch: Some("main".to_string()),
            parent_checkpoint_id: parent.map(String::from),
            ..Default::default()
        },
    )
    .unwrap()
}
