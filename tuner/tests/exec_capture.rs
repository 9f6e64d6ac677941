//! Engine-level capture tests with real processes.
//!
//! The interesting cases are the ones that deadlock a naive single-threaded
//! reader: children that write far more than a pipe buffer to both streams,
//! in either order.

use tuner::core::types::{CaptureMode, CommandSpec, EchoMode, RunMode};
use tuner::io::exec::CommandRunner;
use tuner::test_support::{captured_argv, captured_shell, script_fixture};

fn runner() -> CommandRunner {
    CommandRunner::new(RunMode::Real)
}

#[test]
fn merged_capture_collects_every_byte_of_both_streams() {
    // 200 iterations x 1000 bytes per stream: well past the 64 KiB pipe
    // buffer on both stdout and stderr.
    let line = "i=0; while [ $i -lt 200 ]; do \
                printf '%01000d' 0; printf '%01000d' 0 >&2; i=$((i+1)); done";
    let result = runner().run(&captured_shell(line)).expect("run");
    assert_eq!(result.status, 0);
    assert_eq!(
        result.output.as_deref().map(|payload| payload.len()),
        Some(400_000),
        "payload must hold the sum of both streams"
    );
}

#[test]
fn discard_stderr_still_drains_a_flooding_child() {
    let line = "i=0; while [ $i -lt 200 ]; do printf '%01000d' 0 >&2; i=$((i+1)); done; \
                printf done";
    let spec = CommandSpec::shell(line).capture(CaptureMode::StdoutDiscardStderr);
    let result = runner().run(&spec).expect("run");
    assert_eq!(result.status, 0);
    assert_eq!(result.text().as_deref(), Some("done"));
}

#[test]
fn interleaving_follows_arrival_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    // Alternating writes with a sync point per line: stdout flushes before
    // stderr writes, so arrival order is deterministic.
    let script = script_fixture(
        temp.path(),
        "alternate",
        "printf out1; sleep 0.05; printf err1 >&2; sleep 0.05; printf out2",
    );
    let spec = captured_argv([script.to_str().expect("utf8 path")]);
    let result = runner().run(&spec).expect("run");
    assert_eq!(result.text().as_deref(), Some("out1err1out2"));
}

#[test]
fn echo_without_capture_reports_no_payload() {
    let spec = CommandSpec::shell("printf visible").echo(EchoMode::Both);
    let result = runner().run(&spec).expect("run");
    assert_eq!(result.status, 0);
    assert_eq!(result.output, None);
}

#[test]
fn exit_status_survives_heavy_output() {
    let line = "i=0; while [ $i -lt 100 ]; do printf '%01000d' 0; i=$((i+1)); done; exit 9";
    let result = runner().run(&captured_shell(line)).expect("run");
    assert_eq!(result.status, 9);
    assert_eq!(
        result.output.as_deref().map(|payload| payload.len()),
        Some(100_000)
    );
}
