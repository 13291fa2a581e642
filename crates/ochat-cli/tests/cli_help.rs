use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("ochat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("dialogs"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("--base-url"));
}

#[test]
fn test_dialogs_help_shows_subcommands() {
    cargo_bin_cmd!("ochat")
        .args(["dialogs", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_model_help_shows_subcommands() {
    cargo_bin_cmd!("ochat")
        .args(["model", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("set"));
}
