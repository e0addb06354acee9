#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

//! CLI smoke tests against a throwaway CMT_HOME.

use assert_cmd::Command;
use cmt_store::Session;
use cmt_store::SessionStatus;
use cmt_store::SessionStore;
use cmt_store::TmuxLocation;
use cmt_store::WorkflowType;
use predicates::prelude::*;
use tempfile::TempDir;

struct CliEnv {
    home: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cmt"));
        cmd.env("CMT_HOME", self.home.path())
            .env("NO_COLOR", "1")
            .env_remove("CMT_DB")
            .env_remove("CMT_LOG")
            .env_remove("CMT_AUTONOMOUS")
            .env_remove("TMUX");
        cmd
    }

    fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert()
    }

    fn store(&self) -> SessionStore {
        SessionStore::open(self.home.path().join("sessions.db")).expect("open store")
    }

    fn seed(&self, id: &str, status: SessionStatus) {
        let store = self.store();
        let session = Session::new(
            id,
            WorkflowType::Plan,
            "/work/repo",
            TmuxLocation {
                session: "dev".into(),
                window: 1,
                pane: 0,
            },
            format!("/tmp/{id}.log"),
        )
        .with_task("plan the migration");
        store.create(&session).unwrap();
        store.update_status(id, status).unwrap();
    }
}

#[test]
fn smoke_help_lists_commands() {
    let env = CliEnv::new();
    env.run(&["--help"])
        .success()
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("look-and-fix"))
        .stdout(predicate::str::contains("prune"));
}

#[test]
fn smoke_sessions_empty() {
    let env = CliEnv::new();
    env.run(&["sessions"])
        .success()
        .stdout(predicate::str::contains("No sessions found."));
    env.run(&["sessions", "--trash"])
        .success()
        .stdout(predicate::str::contains("Trash is empty."));
}

#[test]
fn smoke_sessions_table_and_json() {
    let env = CliEnv::new();
    env.seed("abc12345", SessionStatus::Completed);

    env.run(&["sessions"])
        .success()
        .stdout(predicate::str::contains("ID"))
        .stdout(predicate::str::contains("abc12345"))
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("dev:1.0"));

    let output = env.run(&["sessions", "--json"]).success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON output");
    assert_eq!(json[0]["id"], "abc12345");
    assert_eq!(json[0]["status"], "completed");
    assert_eq!(json[0]["workflow_type"], "plan");

    env.run(&["sessions", "--status", "working"])
        .success()
        .stdout(predicate::str::contains("No sessions found."));
}

#[test]
fn smoke_delete_restore_round_trip() {
    let env = CliEnv::new();
    env.seed("abc12345", SessionStatus::Abandoned);

    env.run(&["delete", "abc12345"])
        .success()
        .stdout(predicate::str::contains("Moved session abc12345 to trash"));
    env.run(&["sessions"])
        .success()
        .stdout(predicate::str::contains("No sessions found."));
    env.run(&["sessions", "--trash"])
        .success()
        .stdout(predicate::str::contains("plan the migration"));

    env.run(&["restore", "last"])
        .success()
        .stdout(predicate::str::contains("Restored session abc12345"));
    let session = env.store().get("abc12345").unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Restored);

    env.run(&["restore", "abc12345"])
        .failure()
        .stderr(predicate::str::contains("not in the trash"));
}

#[test]
fn smoke_prune_reports_count() {
    let env = CliEnv::new();
    env.run(&["prune"])
        .success()
        .stdout(predicate::str::contains("Pruned 0 session(s)"));
}

#[test]
fn smoke_kill_rejects_finished_and_unknown_sessions() {
    let env = CliEnv::new();
    env.seed("abc12345", SessionStatus::Completed);

    env.run(&["kill", "abc12345"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is not running"));
    env.run(&["kill", "nope"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("session not found: nope"));
}

#[test]
fn smoke_jump_last_without_sessions() {
    let env = CliEnv::new();
    env.run(&["jump", "last"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no sessions found"));
}

#[test]
fn smoke_launch_outside_tmux_records_nothing() {
    let env = CliEnv::new();
    env.run(&["new", "hello"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cmt requires tmux"))
        .stderr(predicate::str::contains("Suggestion:"));
    assert!(env.store().list(None).unwrap().is_empty());
}

#[test]
fn smoke_launch_with_missing_file() {
    let env = CliEnv::new();
    env.run(&["plan", "-f", "/nonexistent/plan.md", "x"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("file not found: /nonexistent/plan.md"));
}

#[test]
fn smoke_db_flag_overrides_location() {
    let env = CliEnv::new();
    let db = env.home.path().join("elsewhere").join("custom.db");
    env.run(&["--db", db.to_str().unwrap(), "sessions"])
        .success();
    assert!(db.exists());
}

#[test]
fn smoke_invalid_status_is_usage_error() {
    let env = CliEnv::new();
    env.run(&["sessions", "--status", "bogus"])
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
