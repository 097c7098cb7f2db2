mod helpers;

use recollect::db;
use recollect::db::migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let conn = helpers::test_db();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn v1_db_with_turns_upgrades_without_losing_rows() {
    // A store written before consolidation existed
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);

    conn.execute_batch(
        "INSERT INTO projects (id, name, repo_path, created_at)
             VALUES ('p1', 'demo', '/tmp/demo', '2025-01-01T00:00:00Z');
         INSERT INTO sessions (id, project_id, session_type, started_at, last_activity_at)
             VALUES ('s1', 'p1', 'coding', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z');
         INSERT INTO turns (id, session_id, turn_number, user_message, timestamp)
             VALUES ('t1', 's1', 1, 'old turn', '2025-01-01T00:01:00Z');",
    )
    .unwrap();

    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

    let turn = recollect::memory::store::get_turn(&conn, "t1").unwrap().unwrap();
    assert_eq!(turn.user_message.as_deref(), Some("old turn"));
    assert!(turn.consolidated_at.is_none());
    assert!(turn.consolidated_summary.is_none());
}
