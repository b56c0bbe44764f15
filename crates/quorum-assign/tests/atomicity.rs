//! Integration test: a failure late in the cascade rolls everything back.

use std::path::Path;

use quorum_assign::ReviewEngine;
use quorum_core::{AssignmentConfig, Team, TeamMember};
use quorum_store::{SqliteStore, Store};

fn team(name: &str, ids: &[&str]) -> Team {
    Team {
        team_name: name.into(),
        members: ids
            .iter()
            .map(|id| TeamMember {
                user_id: id.to_string(),
                username: id.to_uppercase(),
                is_active: true,
            })
            .collect(),
    }
}

/// Make every new reviewer link fail, from a separate connection.
fn block_reviewer_inserts(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_links BEFORE INSERT ON pr_reviewers
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
    )
    .unwrap();
}

fn unblock_reviewer_inserts(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch("DROP TRIGGER block_links;").unwrap();
}

#[test]
fn failed_bulk_insert_rolls_back_deactivation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quorum.db");
    let engine = ReviewEngine::with_seed(
        SqliteStore::open(&path).unwrap(),
        AssignmentConfig::default(),
        8,
    );

    engine.add_team(team("backend", &["u1", "u2", "u3"])).unwrap();
    engine.add_team(team("platform", &["p1", "p2"])).unwrap();
    let before = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
    assert_eq!(before.assigned_reviewers.len(), 2);

    block_reviewer_inserts(&path);
    let err = engine.deactivate_team("backend").unwrap_err();
    assert_eq!(err.api_code(), "INTERNAL_ERROR");
    assert!(err.to_string().contains("injected failure"), "{err}");

    let backend = engine.get_team("backend").unwrap();
    assert!(backend.members.iter().all(|m| m.is_active));
    let after = engine.store().read(|tx| tx.get_pr("pr-1")).unwrap().unwrap();
    assert_eq!(after.assigned_reviewers, before.assigned_reviewers);

    unblock_reviewer_inserts(&path);
    let report = engine.deactivate_team("backend").unwrap();
    assert_eq!(report.deactivated_users_count, 3);
    assert_eq!(report.affected_prs_count, 1);
    let repaired = engine.store().read(|tx| tx.get_pr("pr-1")).unwrap().unwrap();
    let mut reviewers = repaired.assigned_reviewers.clone();
    reviewers.sort();
    assert_eq!(reviewers, ["p1", "p2"]);
}

#[test]
fn failed_individual_deactivation_keeps_user_active() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quorum.db");
    let engine = ReviewEngine::with_seed(
        SqliteStore::open(&path).unwrap(),
        AssignmentConfig::default(),
        2,
    );

    engine
        .add_team(team("backend", &["u1", "u2", "u3", "u4"]))
        .unwrap();
    let pr = engine.create_pr("pr-1", "Add cache", "u1").unwrap();
    let leaving = pr.assigned_reviewers[0].clone();

    block_reviewer_inserts(&path);
    assert!(engine.set_user_active(&leaving, false).is_err());

    let reviews = engine.user_reviews(&leaving).unwrap();
    assert_eq!(reviews.len(), 1);
    let member = engine
        .get_team("backend")
        .unwrap()
        .members
        .into_iter()
        .find(|m| m.user_id == leaving)
        .unwrap();
    assert!(member.is_active);
}
