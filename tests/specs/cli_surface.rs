//! Black-box smoke checks over the `rj` and `rjd` binaries: argument
//! surface and exit codes only, with config and state isolated to a
//! throwaway home directory so no test touches the invoking user's store.

use assert_cmd::Command;

fn isolated_rj(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("rj").expect("rj binary built");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_STATE_HOME", home.join(".local/state"));
    cmd
}

#[test]
fn help_exits_zero_and_lists_subcommands() {
    let assert = Command::cargo_bin("rj")
        .expect("rj binary built")
        .arg("--help")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for subcommand in ["start", "queue", "kill", "status", "plan", "sync", "logs"] {
        assert!(stdout.contains(subcommand), "help is missing {subcommand}");
    }
}

#[test]
fn status_for_an_unknown_job_exits_three() {
    let home = tempfile::tempdir().expect("tempdir");
    isolated_rj(home.path())
        .args(["status", "999"])
        .assert()
        .code(3);
}

#[test]
fn plan_with_unsupported_version_is_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    let plan = home.path().join("plan.yaml");
    std::fs::write(&plan, "version: 2\nentries: []\n").expect("write plan");
    isolated_rj(home.path())
        .args(["plan", plan.to_str().expect("utf-8 path")])
        .assert()
        .failure();
}

#[test]
fn daemon_version_flag_short_circuits() {
    Command::cargo_bin("rjd")
        .expect("rjd binary built")
        .arg("--version")
        .assert()
        .success();
}
