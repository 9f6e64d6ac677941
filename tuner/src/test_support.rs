//! Test-only helpers for exercising the engine against real processes.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::core::types::{CaptureMode, CommandSpec};

/// Write an executable `/bin/sh` script into `dir` and return its path.
pub fn script_fixture(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script fixture");
    let mut perms = fs::metadata(&path).expect("stat script fixture").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script fixture");
    path
}

/// Argv spec with merged capture, the most common shape in tests.
pub fn captured_argv<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::argv(args).capture(CaptureMode::Merged)
}

/// Shell spec with merged capture.
pub fn captured_shell(line: &str) -> CommandSpec {
    CommandSpec::shell(line).capture(CaptureMode::Merged)
}
