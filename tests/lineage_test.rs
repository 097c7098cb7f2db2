mod helpers;

use recollect::error::RecallError;
use recollect::memory::lineage::{agent_chain, agent_tree, checkpoint_lineage};
use recollect::memory::store::{self, NewAgent, NewSession};

fn agent(conn: &rusqlite::Connection, id: &str, parent: Option<&str>) {
    store::insert_agent(
        conn,
        &NewAgent {
            id: Some(id.into()),
            parent_agent_id: parent.map(String::from),
            agent_type: "worker".into(),
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn chain_and_tree_agree() {
    let conn = helpers::test_db();
    agent(&conn, "root", None);
    agent(&conn, "mid", Some("root"));
    agent(&conn, "leaf", Some("mid"));
    let project = store::insert_project(&conn, "demo", "/tmp/demo").unwrap();
    store::insert_session(
        &conn,
        &NewSession {
            id: Some("s1".into()),
            project_id: project,
            agent_id: Some("leaf".into()),
            session_type: "coding".into(),
            ..Default::default()
        },
    )
    .unwrap();

    let chain: Vec<String> = agent_chain(&conn, "s1").unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(chain, vec!["leaf", "mid", "root"]);

    let tree = agent_tree(&conn, "root", 5).unwrap();
    let depths: Vec<(&str, usize)> = tree.nodes.iter().map(|n| (n.agent.id.as_str(), n.depth)).collect();
    assert_eq!(depths, vec![("root", 0), ("mid", 1), ("leaf", 2)]);
    assert_eq!(tree.edges.len(), 2);
    assert_eq!(tree.nodes[2].session_count, 1);

    let shallow = agent_tree(&conn, "root", 1).unwrap();
    assert_eq!(shallow.nodes.len(), 2);
}

#[test]
fn agent_cycle_terminates() {
    let conn = helpers::test_db();
    agent(&conn, "a", None);
    agent(&conn, "b", Some("a"));
    conn.execute("UPDATE agents SET parent_agent_id = 'b' WHERE id = 'a'", [])
        .unwrap();
    let project = store::insert_project(&conn, "demo", "/tmp/demo").unwrap();
    store::insert_session(
        &conn,
        &NewSession {
            id: Some("s1".into()),
            project_id: project,
            agent_id: Some("a".into()),
            session_type: "coding".into(),
            ..Default::default()
        },
    )
    .unwrap();

    let chain = agent_chain(&conn, "s1").unwrap();
    assert_eq!(chain.len(), 2);

    let tree = agent_tree(&conn, "a", 10).unwrap();
    assert_eq!(tree.nodes.len(), 2);
}

#[test]
fn checkpoint_lineage_walks_to_root() {
    let conn = helpers::test_db();
    let s = helpers::session(&conn, "s1", "2025-01-01T00:00:00Z");
    helpers::checkpoint(&conn, &s, "cp1", "c1", None);
    helpers::checkpoint(&conn, &s, "cp2", "c2", Some("cp1"));
    helpers::checkpoint(&conn, &s, "cp3", "c3", Some("cp2"));

    let ids: Vec<String> = checkpoint_lineage(&conn, "cp3")
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["cp3", "cp2", "cp1"]);

    conn.execute("UPDATE checkpoints SET parent_checkpoint_id = 'cp3' WHERE id = 'cp1'", [])
        .unwrap();
    assert_eq!(checkpoint_lineage(&conn, "cp3").unwrap().len(), 3);
}

#[test]
fn unknown_ids_are_not_found() {
    let conn = helpers::test_db();
    assert!(matches!(agent_chain(&conn, "nope"), Err(RecallError::NotFound { .. })));
    assert!(matches!(agent_tree(&conn, "nope", 3), Err(RecallError::NotFound { .. })));
    assert!(matches!(checkpoint_lineage(&conn, "nope"), Err(RecallError::NotFound { .. })));
}
