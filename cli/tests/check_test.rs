//! Integration tests for the `check` command.

mod common;

use common::{EMPTY_PRELUDE, demos, path, scriptvisor, temp_file};
use expect_test::expect;
use predicates::prelude::*;

#[test]
fn check_demo_scripts() {
    let output = scriptvisor()
        .current_dir(demos())
        .args(["--no-color", "check", "--prelude", "prelude.lua"])
        .args(["--modules", "modules", "--query", "query.lua"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();

    expect![[r#"
        prelude.lua: OK
        modules/strings.lua: OK
        query.lua: OK
          on Shout
          on Split
          on Greet
          on Announce
    "#]]
    .assert_eq(&stdout);
}

#[test]
fn check_prelude_only() {
    scriptvisor()
        .current_dir(demos())
        .args(["--no-color", "check", "--prelude", "prelude.lua", "--modules", "modules"])
        .assert()
        .success()
        .stdout("prelude.lua: OK\nmodules/strings.lua: OK\n");
}

#[test]
fn check_does_not_invoke_handlers() {
    let prelude = temp_file(EMPTY_PRELUDE);
    let query = temp_file("on('Boom', function() error('never') end)");

    scriptvisor()
        .args(["--no-color", "check", "--prelude", &path(&prelude), "--query", &path(&query)])
        .assert()
        .success()
        .stdout(predicate::str::contains("on Boom"))
        .stderr(predicate::str::contains("never").not());
}

#[test]
fn check_syntax_error() {
    let prelude = temp_file(EMPTY_PRELUDE);
    let query = temp_file("on('Broken', function(");

    scriptvisor()
        .args(["--no-color", "check", "--prelude", &path(&prelude), "--query", &path(&query)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn check_invalid_registration() {
    let prelude = temp_file(EMPTY_PRELUDE);
    let query = temp_file("on('', function() end)");

    scriptvisor()
        .args(["check", "--prelude", &path(&prelude), "--query", &path(&query)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("event name must be a non-empty string"));
}

#[test]
fn check_reports_prelude_error_through_query() {
    let prelude = temp_file("return function() error('factory broke') end");
    let query = temp_file("");

    scriptvisor()
        .args(["check", "--prelude", &path(&prelude), "--query", &path(&query)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot build global template"))
        .stderr(predicate::str::contains("factory broke"));
}

#[test]
fn check_no_color_flag() {
    let prelude = temp_file("return 1");

    scriptvisor()
        .args(["--no-color", "check", "--prelude", &path(&prelude)])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("prelude script must return a function"))
        .stderr(predicate::str::contains("\x1b[").not());
}

// ============================================================================
// --quiet flag
// ============================================================================

#[test]
fn check_quiet_success() {
    let prelude = temp_file(EMPTY_PRELUDE);
    let query = temp_file("on('Ok', function() end)");

    scriptvisor()
        .args(["check", "--quiet", "--prelude", &path(&prelude), "--query", &path(&query)])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn check_quiet_short_flag() {
    let prelude = temp_file(EMPTY_PRELUDE);

    scriptvisor()
        .args(["check", "-q", "--prelude", &path(&prelude)])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn check_nonexistent_file() {
    scriptvisor()
        .args(["check", "--prelude", "/nonexistent/path/to/prelude.lua"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such file"));
}
