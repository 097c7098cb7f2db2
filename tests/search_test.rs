mod helpers;

use recollect::config::{RedactionConfig, SearchConfig};
use recollect::db;
use recollect::error::RecallError;
use recollect::memory::redact::Redactor;
use recollect::memory::search::{
    search, search_across, RepoHandle, SearchFilters, SearchHit, SearchMode, SearchRequest,
    SearchTarget, SemanticIndex,
};
use tempfile::TempDir;

fn request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        target: SearchTarget::Turn,
        mode: SearchMode::Hybrid,
        filters: SearchFilters::default(),
        limit: 10,
    }
}

fn ids(response: &recollect::memory::search::SearchResponse) -> Vec<&str> {
    response.results.iter().map(|r| r.id.as_str()).collect()
}

fn populated(conn: &rusqlite::Connection) {
    let s1 = helpers::session_with(conn, "s1", "2025-01-01T00:00:00Z", "coding", Some("parser rewrite"));
    let s2 = helpers::session_with(conn, "s2", "2025-03-01T00:00:00Z", "review", Some("release notes"));
    helpers::turn(conn, &s1, "t1", 1, "parser crash on empty input", Some("aaa"), &["src/parser.rs"], "2025-01-01T00:01:00Z");
    helpers::turn(conn, &s1, "t2", 2, "parser tests for unicode", None, &["tests/parser_test.rs"], "2025-01-05T00:00:00Z");
    helpers::turn(conn, &s2, "t3", 1, "review parser changes", Some("bbb"), &["src/parser.rs", "src/lexer.rs"], "2025-03-01T00:01:00Z");
    helpers::turn(conn, &s2, "t4", 2, "write release notes", None, &["CHANGELOG.md"], "2025-03-02T00:00:00Z");
}

#[test]
fn hybrid_search_only_returns_keyword_matches() {
    let conn = helpers::test_db();
    populated(&conn);

    let response = search(&conn, &request("parser"), &SearchConfig::default(), None).unwrap();
    let mut found = ids(&response);
    found.sort();
    assert_eq!(found, vec!["t1", "t2", "t3"]);
    assert!(!response.degraded);
    assert!(response.results.iter().all(|r| r.recency_rank.is_some()));
}

#[test]
fn keyword_mode_has_no_recency_rank() {
    let conn = helpers::test_db();
    populated(&conn);

    let mut req = request("parser");
    req.mode = SearchMode::Keyword;
    let response = search(&conn, &req, &SearchConfig::default(), None).unwrap();
    assert_eq!(response.results.len(), 3);
    assert!(response.results.iter().all(|r| r.recency_rank.is_none()));
    let ranks: Vec<usize> = response.results.iter().map(|r| r.keyword_rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn conflicting_mode_flags_are_rejected() {
    let err = SearchMode::from_flags(true, true).unwrap_err();
    assert!(matches!(err, RecallError::InvalidFilter(_)));
    assert_eq!(SearchMode::from_flags(false, false).unwrap(), SearchMode::Hybrid);
    assert_eq!(SearchMode::from_flags(true, false).unwrap(), SearchMode::Keyword);
}

#[test]
fn filters_narrow_turn_results() {
    let conn = helpers::test_db();
    populated(&conn);
    let settings = SearchConfig::default();

    let mut by_file = request("parser");
    by_file.filters.file = Some("lexer".into());
    assert_eq!(ids(&search(&conn, &by_file, &settings, None).unwrap()), vec!["t3"]);

    let mut by_commit = request("parser");
    by_commit.filters.commit = Some("aaa".into());
    assert_eq!(ids(&search(&conn, &by_commit, &settings, None).unwrap()), vec!["t1"]);

    let mut by_agent = request("parser");
    by_agent.filters.agent = Some("review".into());
    assert_eq!(ids(&search(&conn, &by_agent, &settings, None).unwrap()), vec!["t3"]);

    let mut by_date = request("parser");
    by_date.filters.since = Some("2025-01-02".into());
    let mut found = ids(&search(&conn, &by_date, &settings, None).unwrap())
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    found.sort();
    assert_eq!(found, vec!["t2", "t3"]);
}

#[test]
fn malformed_since_is_invalid_filter() {
    let conn = helpers::test_db();
    populated(&conn);

    let mut req = request("parser");
    req.filters.since = Some("last tuesday".into());
    let err = search(&conn, &req, &SearchConfig::default(), None).unwrap_err();
    assert!(matches!(err, RecallError::InvalidFilter(_)));
}

#[test]
fn session_target_searches_titles() {
    let conn = helpers::test_db();
    populated(&conn);

    let mut req = request("release");
    req.target = SearchTarget::Session;
    let response = search(&conn, &req, &SearchConfig::default(), None).unwrap();
    assert_eq!(ids(&response), vec!["s2"]);
    assert!(matches!(response.results[0].hit, SearchHit::Session { .. }));

    req.filters.file = Some("src".into());
    let err = search(&conn, &req, &SearchConfig::default(), None).unwrap_err();
    assert!(matches!(err, RecallError::InvalidFilter(_)));
}

#[test]
fn quote_only_query_is_empty() {
    let conn = helpers::test_db();
    populated(&conn);

    let response = search(&conn, &request("\"\" \"\""), &SearchConfig::default(), None).unwrap();
    assert!(response.results.is_empty());
}

#[test]
fn redaction_masks_text_without_changing_order() {
    let conn = helpers::test_db();
    populated(&conn);
    let settings = SearchConfig::default();

    let plain = search(&conn, &request("parser"), &settings, None).unwrap();
    let redactor = Redactor::from_config(&RedactionConfig {
        enabled: true,
        patterns: vec!["unicode".into()],
        replacement: "[FILTERED]".into(),
    })
    .unwrap();
    let masked = search(&conn, &request("parser"), &settings, Some(&redactor)).unwrap();

    assert_eq!(ids(&plain), ids(&masked));
    let t2 = masked.results.iter().find(|r| r.id == "t2").unwrap();
    match &t2.hit {
        SearchHit::Turn { user_message, .. } => {
            assert_eq!(user_message.as_deref(), Some("parser tests for [FILTERED]"));
        }
        other => panic!("expected a turn hit, got {other:?}"),
    }
}

struct ReverseIndex;

impl SemanticIndex for ReverseIndex {
    fn rank(&self, _query: &str, keys: &[String]) -> anyhow::Result<Vec<String>> {
        Ok(keys.iter().rev().cloned().collect())
    }
}

struct BrokenIndex;

impl SemanticIndex for BrokenIndex {
    fn rank(&self, _query: &str, _keys: &[String]) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("index offline")
    }
}

#[test]
fn cross_repo_search_tags_results_and_degrades_without_index() {
    let tmp = TempDir::new().unwrap();
    let alpha = db::open_database(tmp.path().join("alpha.db")).unwrap();
    let beta = db::open_database(tmp.path().join("beta.db")).unwrap();
    populated(&alpha);
    let s = helpers::session(&beta, "b1", "2025-02-01T00:00:00Z");
    helpers::turn(&beta, &s, "b-t1", 1, "parser port", None, &[], "2025-02-01T00:01:00Z");

    let repos = [
        RepoHandle { name: "alpha", conn: &alpha },
        RepoHandle { name: "beta", conn: &beta },
    ];
    let settings = SearchConfig::default();

    let response = search_across(&repos, &request("parser"), &settings, None, None).unwrap();
    assert!(response.degraded);
    assert!(response.degraded_reason.is_some());
    assert_eq!(response.results.len(), 4);
    let beta_hit = response.results.iter().find(|r| r.id == "b-t1").unwrap();
    assert_eq!(beta_hit.repo.as_deref(), Some("beta"));

    let broken = search_across(&repos, &request("parser"), &settings, Some(&BrokenIndex), None).unwrap();
    assert!(broken.degraded);
    assert!(broken.degraded_reason.unwrap().contains("index offline"));

    let fused = search_across(&repos, &request("parser"), &settings, Some(&ReverseIndex), None).unwrap();
    assert!(!fused.degraded);
    assert!(fused.results.iter().all(|r| r.semantic_rank.is_some()));
}

#[test]
fn keyword_mode_across_repos_is_not_degraded() {
    let conn = helpers::test_db();
    populated(&conn);

    let repos = [RepoHandle { name: "only", conn: &conn }];
    let mut req = request("parser");
    req.mode = SearchMode::Keyword;
    let response = search_across(&repos, &req, &SearchConfig::default(), None, None).unwrap();
    assert!(!response.degraded);
    assert_eq!(response.results.len(), 3);
}
