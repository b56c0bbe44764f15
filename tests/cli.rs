use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn quorum(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quorum"))
        .arg("--db")
        .arg(db)
        .args(["--format", "json", "--seed", "7"])
        .args(args)
        .output()
        .unwrap()
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "quorum failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn add_team(dir: &Path, db: &Path, payload: &str) -> serde_json::Value {
    let file = dir.join("team.json");
    std::fs::write(&file, payload).unwrap();
    json(&quorum(db, &["team", "add", "--file", file.to_str().unwrap()]))
}

#[test]
fn full_workflow_over_json() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("quorum.db");

    let team = add_team(
        dir.path(),
        &db,
        r#"{"team_name": "backend", "members": [
            {"user_id": "u1", "username": "Alice", "is_active": true},
            {"user_id": "u2", "username": "Bob", "is_active": true},
            {"user_id": "u3", "username": "Carol", "is_active": true}
        ]}"#,
    );
    assert_eq!(team["team"]["members"].as_array().unwrap().len(), 3);
    add_team(
        dir.path(),
        &db,
        r#"{"team_name": "platform", "members": [
            {"user_id": "p1", "username": "Pat"},
            {"user_id": "p2", "username": "Quinn"}
        ]}"#,
    );

    let created = json(&quorum(&db, &["pr", "create", "pr-1", "Add cache", "--author", "u1"]));
    let reviewers = created["pr"]["assigned_reviewers"].as_array().unwrap();
    assert_eq!(reviewers.len(), 2);
    assert_eq!(created["pr"]["status"], "OPEN");

    let fetched = json(&quorum(&db, &["team", "get", "backend"]));
    assert_eq!(fetched["team_name"], "backend");
    assert_eq!(fetched["members"][0]["username"], "Alice");

    let reviews = json(&quorum(&db, &["user", "reviews", "u2"]));
    assert_eq!(reviews["user_id"], "u2");
    assert_eq!(reviews["pull_requests"][0]["pull_request_id"], "pr-1");

    let report = json(&quorum(&db, &["team", "deactivate", "backend"]));
    assert_eq!(report["deactivated_users_count"], 3);
    assert_eq!(report["affected_prs_count"], 1);

    let stats = json(&quorum(&db, &["stats"]));
    assert_eq!(stats["open_prs"], 1);
    assert_eq!(stats["pr_stats"][0]["reviewers_count"], 2);

    let merged = json(&quorum(&db, &["pr", "merge", "pr-1"]));
    assert_eq!(merged["pr"]["status"], "MERGED");
    let again = json(&quorum(&db, &["pr", "merge", "pr-1"]));
    assert_eq!(again["pr"]["merged_at"], merged["pr"]["merged_at"]);
}

#[test]
fn reassign_and_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("quorum.db");
    add_team(
        dir.path(),
        &db,
        r#"{"team_name": "backend", "members": [
            {"user_id": "u1", "username": "Alice"},
            {"user_id": "u2", "username": "Bob"},
            {"user_id": "u3", "username": "Carol"},
            {"user_id": "u4", "username": "Dan"}
        ]}"#,
    );

    let created = json(&quorum(&db, &["pr", "create", "pr-1", "Add cache", "--author", "u1"]));
    let old = created["pr"]["assigned_reviewers"][0].as_str().unwrap().to_string();

    let swapped = json(&quorum(&db, &["pr", "reassign", "pr-1", "--old", old.as_str()]));
    let new = swapped["replaced_by"].as_str().unwrap();
    assert_ne!(new, old);
    assert_ne!(new, "u1");
    assert_eq!(swapped["pr"]["assigned_reviewers"][0], new);

    let duplicate = quorum(&db, &["pr", "create", "pr-1", "Again", "--author", "u2"]);
    assert!(!duplicate.status.success());
    let stderr = String::from_utf8_lossy(&duplicate.stderr);
    assert!(stderr.contains("already exists"), "{stderr}");
    assert!(stderr.contains("request rejected"), "{stderr}");

    let not_assigned = quorum(&db, &["pr", "reassign", "pr-1", "--old", "u1"]);
    assert!(!not_assigned.status.success());

    let missing = quorum(&db, &["team", "get", "ghosts"]);
    assert!(!missing.status.success());
    let stderr = String::from_utf8_lossy(&missing.stderr);
    assert!(stderr.contains("not found"), "{stderr}");
}

#[test]
fn team_payload_from_stdin_and_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("quorum.db");

    let mut child = Command::new(env!("CARGO_BIN_EXE_quorum"))
        .arg("--db")
        .arg(&db)
        .args(["team", "add"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"team_name": "ops", "members": [{"user_id": "o1", "username": "Olive"}]}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Team ops (1 members)"), "{stdout}");

    let output = Command::new(env!("CARGO_BIN_EXE_quorum"))
        .arg("--db")
        .arg(&db)
        .args(["user", "set-active", "o1", "false"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("inactive"));
}
