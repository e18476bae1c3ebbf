//! E2E CLI tests covering:
//! - Project setup (`tie init`, `tie user add`) and its error codes
//! - Follow, message, block, and unblock flows with JSON contracts
//! - Permission queries (`tie can`) and their exit status
//! - The event journal (`tie events`)
//!
//! Each test runs the `tie` binary as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the tie binary, rooted in `dir`, with no actor.
fn tie_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tie"));
    cmd.current_dir(dir);
    cmd.env("TIES_LOG", "error");
    cmd.env_remove("TIES_ACTOR");
    cmd.env_remove("FORMAT");
    cmd
}

/// Build a Command acting as `actor`.
fn tie_as(dir: &Path, actor: &str) -> Command {
    let mut cmd = tie_cmd(dir);
    cmd.env("TIES_ACTOR", actor);
    cmd
}

/// Initialize a project with `users` registered.
fn setup(users: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    tie_cmd(dir.path()).arg("init").assert().success();
    if !users.is_empty() {
        tie_cmd(dir.path())
            .args(["user", "add"])
            .args(users)
            .assert()
            .success();
    }
    dir
}

/// Run a command expected to succeed and parse its `--json` stdout.
fn json_ok(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().expect("command should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

/// Run a command expected to fail and return its `--json` error code.
fn json_err_code(cmd: &mut Command) -> String {
    let output = cmd.arg("--json").output().expect("command should not crash");
    assert!(!output.status.success(), "command unexpectedly succeeded");
    let json: Value =
        serde_json::from_slice(&output.stderr).expect("stderr should be valid JSON");
    json["error"]["error_code"]
        .as_str()
        .expect("error should carry a code")
        .to_string()
}

fn permissions(dir: &Path, actor: &str, target: &str) -> Vec<String> {
    let json = json_ok(tie_as(dir, actor).args(["can", target]));
    json["permissions"]
        .as_array()
        .expect("permissions array")
        .iter()
        .map(|p| p.as_str().expect("permission name").to_string())
        .collect()
}

fn event_kinds(dir: &Path) -> Vec<String> {
    let json = json_ok(tie_cmd(dir).args(["events", "-n", "100"]));
    json.as_array()
        .expect("events array")
        .iter()
        .map(|e| e["kind"].as_str().expect("kind").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn init_creates_project_files() {
    let dir = TempDir::new().unwrap();
    let json = json_ok(tie_cmd(dir.path()).args(["init", "--visibility", "mutuals"]));
    assert_eq!(json["visibility"], "mutuals");
    assert_eq!(json["journal"], true);
    assert!(dir.path().join(".ties/config.toml").is_file());
    assert!(dir.path().join(".ties/ties.sqlite3").is_file());

    let config = std::fs::read_to_string(dir.path().join(".ties/config.toml")).unwrap();
    assert!(config.contains("visibility = \"mutuals\""));
}

#[test]
fn init_twice_requires_force() {
    let dir = setup(&[]);
    tie_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    tie_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn user_add_is_idempotent() {
    let dir = setup(&["alice"]);
    let json = json_ok(tie_cmd(dir.path()).args(["user", "add", "alice", "bob"]));
    assert_eq!(json[0]["user"], "alice");
    assert_eq!(json[0]["created"], false);
    assert_eq!(json[1]["user"], "bob");
    assert_eq!(json[1]["created"], true);
}

#[test]
fn commands_outside_a_project_report_not_initialized() {
    let dir = TempDir::new().unwrap();
    let code = json_err_code(tie_as(dir.path(), "alice").args(["follow", "bob"]));
    assert_eq!(code, "E1001");
}

#[test]
fn broken_config_reports_parse_error() {
    let dir = setup(&["alice", "bob"]);
    std::fs::write(dir.path().join(".ties/config.toml"), "[profiles\n").unwrap();
    let code = json_err_code(tie_as(dir.path(), "alice").args(["follow", "bob"]));
    assert_eq!(code, "E1002");
}

#[test]
fn missing_actor_is_reported() {
    let dir = setup(&["alice", "bob"]);
    let code = json_err_code(tie_cmd(dir.path()).args(["follow", "bob"]));
    assert_eq!(code, "missing_actor");
}

#[test]
fn invalid_and_unknown_identities_are_rejected() {
    let dir = setup(&["alice"]);
    assert_eq!(
        json_err_code(tie_as(dir.path(), "alice").args(["follow", "not valid!"])),
        "E2001"
    );
    assert_eq!(
        json_err_code(tie_as(dir.path(), "alice").args(["follow", "ghost"])),
        "E2003"
    );
    assert_eq!(
        json_err_code(tie_as(dir.path(), "alice").args(["follow", "alice"])),
        "E2002"
    );
}

#[test]
fn human_errors_show_code_and_suggestion() {
    let dir = setup(&["alice"]);
    tie_as(dir.path(), "alice")
        .args(["follow", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2003]"))
        .stderr(predicate::str::contains("suggestion: Register the user"));
}

// ---------------------------------------------------------------------------
// Relationship flows
// ---------------------------------------------------------------------------

#[test]
fn follow_reports_applied_then_unchanged() {
    let dir = setup(&["alice", "bob"]);

    let first = json_ok(tie_as(dir.path(), "alice").args(["follow", "bob"]));
    assert_eq!(first["action"], "follow");
    assert_eq!(first["outcome"], "applied");
    assert_eq!(first["events"][0]["kind"], "relationship.followed");
    assert_eq!(first["events"][0]["actor"], "alice");

    let second = json_ok(tie_as(dir.path(), "alice").args(["follow", "bob"]));
    assert_eq!(second["outcome"], "unchanged");
    assert_eq!(second["events"], Value::Array(vec![]));

    assert_eq!(event_kinds(dir.path()), ["relationship.followed"]);
}

#[test]
fn as_flag_overrides_env_actor() {
    let dir = setup(&["alice", "bob"]);
    let json = json_ok(tie_as(dir.path(), "bob").args(["--as", "alice", "follow", "bob"]));
    assert_eq!(json["actor"], "alice");
}

#[test]
fn message_requires_mutual_follow() {
    let dir = setup(&["alice", "bob"]);
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();

    let code = json_err_code(tie_as(dir.path(), "alice").args(["message", "bob"]));
    assert_eq!(code, "E3002");

    tie_as(dir.path(), "bob").args(["follow", "alice"]).assert().success();
    let created = json_ok(tie_as(dir.path(), "alice").args(["message", "bob"]));
    assert_eq!(created["created"], true);

    let again = json_ok(tie_as(dir.path(), "bob").args(["message", "alice"]));
    assert_eq!(again["created"], false);
    assert_eq!(again["conversation"]["id"], created["conversation"]["id"]);
}

#[test]
fn block_severs_follows_and_stops_messaging() {
    let dir = setup(&["alice", "bob"]);
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();
    tie_as(dir.path(), "bob").args(["follow", "alice"]).assert().success();
    tie_as(dir.path(), "alice").args(["message", "bob"]).assert().success();

    let blocked = json_ok(tie_as(dir.path(), "bob").args(["block", "alice"]));
    let kinds: Vec<&str> = blocked["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        [
            "relationship.unfollowed",
            "relationship.unfollowed",
            "relationship.blocked"
        ]
    );

    let show = json_ok(tie_as(dir.path(), "alice").args(["show", "bob"]));
    assert_eq!(show["edges"]["a_follows_b"], false);
    assert_eq!(show["edges"]["b_follows_a"], false);
    assert_eq!(show["edges"]["b_blocks_a"], true);

    assert_eq!(
        json_err_code(tie_as(dir.path(), "alice").args(["message", "bob"])),
        "E3001"
    );
    assert_eq!(
        json_err_code(tie_as(dir.path(), "alice").args(["follow", "bob"])),
        "E3001"
    );
    assert_eq!(permissions(dir.path(), "alice", "bob"), ["can_block"]);
    assert_eq!(permissions(dir.path(), "bob", "alice"), ["can_unblock"]);
}

#[test]
fn unblock_keeps_follows_severed_but_reopens_conversation() {
    let dir = setup(&["alice", "bob"]);
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();
    tie_as(dir.path(), "bob").args(["follow", "alice"]).assert().success();
    tie_as(dir.path(), "alice").args(["message", "bob"]).assert().success();
    tie_as(dir.path(), "bob").args(["block", "alice"]).assert().success();

    // Only the blocker can lift the block; for alice this is a no-op.
    let noop = json_ok(tie_as(dir.path(), "alice").args(["unblock", "bob"]));
    assert_eq!(noop["outcome"], "unchanged");

    let lifted = json_ok(tie_as(dir.path(), "bob").args(["unblock", "alice"]));
    assert_eq!(lifted["outcome"], "applied");
    assert_eq!(lifted["events"][0]["kind"], "relationship.unblocked");

    let perms = permissions(dir.path(), "alice", "bob");
    assert!(perms.contains(&"can_follow".to_string()));
    assert!(!perms.contains(&"can_unfollow".to_string()));
    assert!(perms.contains(&"can_continue_existing_conversation".to_string()));
    assert!(!perms.contains(&"can_send_new_message".to_string()));

    let grant = json_ok(tie_as(dir.path(), "alice").args(["message", "bob"]));
    assert_eq!(grant["created"], false);
}

#[test]
fn private_profiles_leave_only_follow_and_block() {
    let dir = TempDir::new().unwrap();
    tie_cmd(dir.path())
        .args(["init", "--visibility", "private"])
        .assert()
        .success();
    tie_cmd(dir.path())
        .args(["user", "add", "alice", "bob"])
        .assert()
        .success();

    assert_eq!(
        permissions(dir.path(), "alice", "bob"),
        ["can_follow", "can_block"]
    );
}

#[test]
fn can_permission_flag_sets_exit_status() {
    let dir = setup(&["alice", "bob"]);
    tie_as(dir.path(), "alice")
        .args(["can", "bob", "--permission", "can_follow"])
        .assert()
        .success()
        .stdout(predicate::str::contains("can_follow: yes"));
    tie_as(dir.path(), "alice")
        .args(["can", "bob", "--permission", "can_send_new_message"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("can_send_new_message: no"));
}

#[test]
fn show_without_target_lists_relationships() {
    let dir = setup(&["alice", "bob", "carol"]);
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();
    tie_as(dir.path(), "carol").args(["follow", "alice"]).assert().success();
    tie_as(dir.path(), "alice").args(["block", "carol"]).assert().success();

    let json = json_ok(tie_as(dir.path(), "alice").arg("show"));
    assert_eq!(json["user"], "alice");
    assert_eq!(json["following"], serde_json::json!(["bob"]));
    assert_eq!(json["followers"], serde_json::json!([]));
    assert_eq!(json["blocked"], serde_json::json!(["carol"]));
}

// ---------------------------------------------------------------------------
// Events journal
// ---------------------------------------------------------------------------

#[test]
fn events_filter_and_limit() {
    let dir = setup(&["alice", "bob", "carol"]);
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();
    tie_as(dir.path(), "bob").args(["follow", "alice"]).assert().success();
    tie_as(dir.path(), "alice").args(["message", "bob"]).assert().success();
    tie_as(dir.path(), "carol").args(["block", "bob"]).assert().success();

    assert_eq!(
        event_kinds(dir.path()),
        [
            "relationship.followed",
            "relationship.followed",
            "conversation.created",
            "relationship.blocked"
        ]
    );

    let created = json_ok(tie_cmd(dir.path()).args(["events", "--kind", "conversation.created"]));
    assert_eq!(created.as_array().unwrap().len(), 1);
    assert!(created[0]["conversation"].as_str().unwrap().starts_with("cv-"));

    let carol = json_ok(tie_cmd(dir.path()).args(["events", "--user", "carol"]));
    assert_eq!(carol.as_array().unwrap().len(), 1);

    let last = json_ok(tie_cmd(dir.path()).args(["events", "-n", "1"]));
    assert_eq!(last[0]["kind"], "relationship.blocked");
}

#[test]
fn disabled_journal_records_nothing() {
    let dir = TempDir::new().unwrap();
    tie_cmd(dir.path())
        .args(["init", "--no-journal"])
        .assert()
        .success();
    tie_cmd(dir.path())
        .args(["user", "add", "alice", "bob"])
        .assert()
        .success();
    tie_as(dir.path(), "alice").args(["follow", "bob"]).assert().success();

    assert!(!dir.path().join(".ties/events.jsonl").exists());
    assert!(event_kinds(dir.path()).is_empty());
}

#[test]
fn completions_generate_for_bash() {
    let dir = TempDir::new().unwrap();
    tie_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tie"));
}
