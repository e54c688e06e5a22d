//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use expect_test::Expect;
use std::io::Write;
use std::path::PathBuf;

/// A prelude that exposes nothing and logs nothing.
pub const EMPTY_PRELUDE: &str = "return function(on, notify) return {} end";

/// Create a new command for the scriptvisor binary.
pub fn scriptvisor() -> Command {
    Command::new(env!("CARGO_BIN_EXE_scriptvisor"))
}

/// Directory holding the demo scripts.
pub fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos")
}

/// Path of a demo script as a string argument.
pub fn demo(name: &str) -> String {
    demos().join(name).to_string_lossy().into_owned()
}

/// Create a temporary file with the given content.
pub fn temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".lua")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Path of a temporary file as a string argument.
pub fn path(file: &tempfile::NamedTempFile) -> String {
    file.path().to_str().unwrap().to_string()
}

/// Run a command and check that stdout matches the expected output.
pub fn check_stdout(args: &[&str], stdin: Option<&str>, expected: Expect) {
    let mut cmd = scriptvisor();
    cmd.args(args);
    if let Some(input) = stdin {
        cmd.write_stdin(input);
    }
    let output = cmd.output().expect("failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    expected.assert_eq(&stdout);
}

/// Run a command and check that stderr matches the expected output.
pub fn check_stderr(args: &[&str], stdin: Option<&str>, expected: Expect) {
    let mut cmd = scriptvisor();
    cmd.args(args);
    if let Some(input) = stdin {
        cmd.write_stdin(input);
    }
    let output = cmd.output().expect("failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);
    expected.assert_eq(&stderr);
}
