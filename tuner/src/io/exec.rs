//! Launching external commands, for real or simulated.
//!
//! [`CommandRunner`] is the single fork point of the tool: build steps,
//! measurement runs, and helper invocations all pass through [`run`].
//! Under dry-run nothing is forked; the command line is logged and a
//! deterministic success comes back so exploration logic upstream keeps
//! walking the same path it would walk for real.
//!
//! [`run`]: CommandRunner::run

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use crate::core::types::{
    CaptureMode, CommandSpec, EchoMode, ExecutionResult, Invocation, RunMode,
};
use crate::io::cancel::CancelToken;
use crate::io::drain;
use crate::io::fd;

/// Launches commands described by [`CommandSpec`] and reaps them reliably.
///
/// Holds only the run mode and a cancel token, both read-only, so one
/// runner can serve any number of threads.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    mode: RunMode,
    cancel: CancelToken,
}

impl CommandRunner {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally armed cancel token (the CLI wires SIGINT to it).
    pub fn with_cancel(mode: RunMode, cancel: CancelToken) -> Self {
        Self { mode, cancel }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run (or simulate) one command.
    ///
    /// A command that cannot be spawned (missing executable, permission
    /// denied) folds into the result as status 1, so callers see one
    /// uniform shape; only plumbing failures surface as `Err`. With
    /// `check` set, a non-zero child status terminates the calling
    /// process with that status.
    #[instrument(skip_all)]
    pub fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let printable = spec.printable();
        if self.mode.is_dry_run() {
            info!("{}", printable);
            return Ok(ExecutionResult {
                status: 0,
                output: spec.capture.enabled().then(Vec::new),
            });
        }

        debug!("command [{}]", printable);
        let result = self
            .launch(spec)
            .with_context(|| format!("run command [{printable}]"))?;
        log_captured(&result);
        debug!("command [{}] -> {}", printable, result.status);

        if spec.check && result.status != 0 {
            error!("command [{}] failed with status {}", printable, result.status);
            std::process::exit(result.status);
        }
        Ok(result)
    }

    fn launch(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let mut cmd = command_for(&spec.invocation)?;
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        match &spec.stdin {
            Some(bytes) => {
                cmd.stdin(Stdio::from(spool_stdin(bytes)?));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }
        let (pipe_stdout, pipe_stderr) = pipe_plan(spec.capture, spec.echo);
        cmd.stdout(stream_stdio(pipe_stdout));
        cmd.stderr(stream_stdio(pipe_stderr));

        fd::arm_retention(&mut cmd, &spec.fd_retention)?;

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("{}: {}", spec.program(), err);
                return Ok(ExecutionResult {
                    status: 1,
                    output: spec.capture.enabled().then(Vec::new),
                });
            }
        };

        let (status, captured) = if pipe_stdout || pipe_stderr {
            drain::drain_and_wait(&mut child, spec.capture, spec.echo, &self.cancel)?
        } else {
            (drain::wait_child(&mut child, &self.cancel)?, Vec::new())
        };
        Ok(ExecutionResult {
            status: exit_code(status),
            output: spec.capture.enabled().then_some(captured),
        })
    }
}

/// Which child streams need a pipe: captured streams always, echoed streams
/// too so chunks flow through the drain loop in arrival order.
fn pipe_plan(capture: CaptureMode, echo: EchoMode) -> (bool, bool) {
    let stdout = capture.enabled() || echo.stdout();
    let stderr = capture.pipes_stderr() || echo.stderr();
    (stdout, stderr)
}

/// Unpiped streams go to the null device rather than leaking through to the
/// caller's terminal.
fn stream_stdio(piped: bool) -> Stdio {
    if piped { Stdio::piped() } else { Stdio::null() }
}

fn command_for(invocation: &Invocation) -> Result<Command> {
    match invocation {
        Invocation::Argv(args) => {
            let (program, rest) = args.split_first().context("empty argument vector")?;
            let mut cmd = Command::new(program);
            cmd.args(rest);
            Ok(cmd)
        }
        Invocation::Shell(line) => {
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(line);
            Ok(cmd)
        }
    }
}

/// Spool stdin bytes into an unlinked temporary file the child reads from.
///
/// A real file instead of a pipe: the child can seek, and no writer thread
/// has to stay behind to feed it.
fn spool_stdin(bytes: &[u8]) -> Result<File> {
    let mut file = tempfile::tempfile().context("create stdin spool")?;
    file.write_all(bytes).context("write stdin spool")?;
    file.seek(SeekFrom::Start(0)).context("rewind stdin spool")?;
    Ok(file)
}

fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signo| 128 + signo))
        .unwrap_or(1)
}

/// Dump a non-empty captured payload at debug level, one `  | ` prefixed
/// line per output line.
fn log_captured(result: &ExecutionResult) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let Some(output) = result.output.as_deref() else {
        return;
    };
    if output.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(output);
    let text = text.strip_suffix('\n').unwrap_or(&text);
    debug!("\n  | {}", text.replace('\n', "\n  | "));
}
