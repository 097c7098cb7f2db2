mod helpers;

use recollect::db;
use recollect::memory::consolidation::{consolidate, find_eligible, ConsolidateOptions, FsContentStore, TurnOutcome};
use recollect::memory::store;
use rusqlite::Connection;
use tempfile::TempDir;

fn opts(before: &str, execute: bool) -> ConsolidateOptions {
    ConsolidateOptions {
        before: before.to_string(),
        session: None,
        limit: 100,
        execute,
        summary_chars: 40,
    }
}

struct Fixture {
    _tmp: TempDir,
    root: std::path::PathBuf,
    conn: Connection,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("content");
    std::fs::create_dir_all(&root).unwrap();
    let conn = db::open_database(tmp.path().join("store.db")).unwrap();

    let s = helpers::session(&conn, "s1", "2025-01-01T00:00:00Z");
    helpers::turn(&conn, &s, "t-old", 1, "old question", None, &[], "2025-01-01T00:01:00Z");
    helpers::turn(&conn, &s, "t-older", 2, "", None, &[], "2024-12-01T00:00:00Z");
    helpers::turn(&conn, &s, "t-new", 3, "new question", None, &[], "2025-06-01T00:00:00Z");
    helpers::turn(&conn, &s, "t-bare", 4, "no content", None, &[], "2024-11-01T00:00:00Z");

    helpers::content(&conn, &root, "t-old", "s1/t-old.jsonl", "full transcript of the old turn");
    helpers::content(&conn, &root, "t-older", "s1/t-older.jsonl", "\n\n  first real line  \nsecond");
    helpers::content(&conn, &root, "t-new", "s1/t-new.jsonl", "recent transcript");

    Fixture {
        _tmp: tmp,
        root,
        conn,
    }
}

#[test]
fn eligibility_needs_content_and_age() {
    let f = fixture();

    let eligible = find_eligible(&f.conn, "2025-03-01", None, 100).unwrap();
    let ids: Vec<&str> = eligible.iter().map(|e| e.turn.id.as_str()).collect();
    // oldest first; t-bare has no stored content, t-new is too recent
    assert_eq!(ids, vec!["t-older", "t-old"]);
}

#[test]
fn dry_run_changes_nothing() {
    let mut f = fixture();

    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", false)).unwrap();
    assert!(!report.execute);
    assert_eq!(report.candidates, 2);
    assert!(report.records.iter().all(|r| r.outcome == TurnOutcome::Eligible));

    assert!(f.root.join("s1/t-old.jsonl").exists());
    let turn = store::get_turn(&f.conn, "t-old").unwrap().unwrap();
    assert!(turn.consolidated_at.is_none());
}

#[test]
fn execute_summarizes_marks_and_removes() {
    let mut f = fixture();

    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", true)).unwrap();
    assert_eq!(report.consolidated(), 2);
    assert_eq!(report.failed(), 0);

    assert!(!f.root.join("s1/t-old.jsonl").exists());
    assert!(!f.root.join("s1/t-older.jsonl").exists());
    assert!(f.root.join("s1/t-new.jsonl").exists());

    let old = store::get_turn(&f.conn, "t-old").unwrap().unwrap();
    assert!(old.consolidated_at.is_some());
    assert_eq!(old.consolidated_summary.as_deref(), Some("old question"));

    // empty message falls back to the first non-empty content line
    let older = store::get_turn(&f.conn, "t-older").unwrap().unwrap();
    assert_eq!(older.consolidated_summary.as_deref(), Some("first real line"));

    let content_rows: i64 = f
        .conn
        .query_row("SELECT COUNT(*) FROM turn_content", [], |row| row.get(0))
        .unwrap();
    assert_eq!(content_rows, 1);
}

#[test]
fn second_run_finds_nothing() {
    let mut f = fixture();

    consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", true)).unwrap();
    let again = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", true)).unwrap();
    assert_eq!(again.candidates, 0);
    assert!(again.records.is_empty());
}

#[test]
fn missing_content_file_still_consolidates() {
    let mut f = fixture();
    std::fs::remove_file(f.root.join("s1/t-old.jsonl")).unwrap();

    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", true)).unwrap();
    let record = report.records.iter().find(|r| r.turn_id == "t-old").unwrap();
    assert_eq!(record.outcome, TurnOutcome::Consolidated);
    assert_eq!(record.summary.as_deref(), Some("old question"));
}

#[test]
fn escaping_content_path_is_skipped_and_left_alone() {
    let mut f = fixture();
    let outside = f.root.parent().unwrap().join("secret.txt");
    std::fs::write(&outside, "do not delete").unwrap();
    store::attach_turn_content(&f.conn, "t-old", "../secret.txt", 13, None).unwrap();

    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", true)).unwrap();
    let record = report.records.iter().find(|r| r.turn_id == "t-old").unwrap();
    assert!(matches!(record.outcome, TurnOutcome::Skipped { .. }));

    assert!(outside.exists());
    let turn = store::get_turn(&f.conn, "t-old").unwrap().unwrap();
    assert!(turn.consolidated_at.is_none());
    // the other candidate is unaffected
    assert_eq!(report.consolidated(), 1);
}

#[test]
fn session_filter_and_limit_bound_the_batch() {
    let mut f = fixture();
    let other = helpers::session(&f.conn, "s2", "2024-01-01T00:00:00Z");
    helpers::turn(&f.conn, &other, "t-other", 1, "elsewhere", None, &[], "2024-01-01T00:01:00Z");
    helpers::content(&f.conn, &f.root, "t-other", "s2/t-other.jsonl", "body");

    let mut scoped = opts("2025-03-01", false);
    scoped.session = Some("s2".into());
    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &scoped).unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.records[0].turn_id, "t-other");

    let mut limited = opts("2025-03-01", false);
    limited.limit = 1;
    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &limited).unwrap();
    assert_eq!(report.records[0].turn_id, "t-other");
    assert_eq!(report.candidates, 1);
}

#[test]
fn report_serializes_status_inline() {
    let mut f = fixture();

    let report = consolidate(&mut f.conn, &FsContentStore, &f.root, &opts("2025-03-01", false)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["records"][0]["status"], "eligible");
    assert_eq!(json["records"][0]["turn_id"], "t-older");
}
