use assert_cmd::Command;
use predicates::prelude::*;

fn launch_sync() -> Command {
    let mut cmd = Command::cargo_bin("launch-sync").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("LAUNCH_SYNC_GITHUB__TOKEN")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn help_lists_both_commands() {
    launch_sync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backfill-releases"))
        .stdout(predicate::str::contains("sync-workflows"));
}

#[test]
fn sync_help_documents_overrides() {
    launch_sync()
        .args(["sync-workflows", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--skip-skeleton-check"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("latest release tag"));
}

#[test]
fn repo_or_all_is_required() {
    launch_sync()
        .args(["backfill-releases", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}

#[test]
fn repo_and_all_conflict() {
    launch_sync()
        .args(["sync-workflows", "--repo", "tf-aws-x", "--all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_token_is_fatal_before_any_remote_call() {
    let workdir = tempfile::tempdir().unwrap();
    launch_sync()
        .current_dir(workdir.path())
        .args(["backfill-releases", "--all", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
fn unknown_provider_is_rejected_by_the_parser() {
    launch_sync()
        .args(["sync-workflows", "--all", "--provider", "gcp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("aws"));
}
