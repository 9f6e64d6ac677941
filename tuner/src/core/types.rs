//! Shared contracts between the engine and its callers.
//!
//! These types describe what to launch and how to treat its streams; they
//! carry no I/O of their own and stay deterministic across runs. The
//! side-effecting interpretation lives in [`crate::io`].

use std::os::unix::io::RawFd;
use std::path::PathBuf;

use anyhow::Result;

use crate::core::cmdline;

/// Whether the engine executes for real or simulates.
///
/// Fixed once at bootstrap from config and CLI flags, then passed by value
/// into every component. Nothing reads it back from ambient process state,
/// so the mode a component observes cannot change mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Real,
    DryRun,
}

impl RunMode {
    pub fn from_flag(dry_run: bool) -> Self {
        if dry_run { RunMode::DryRun } else { RunMode::Real }
    }

    pub fn is_dry_run(self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// How a command line is delivered to the OS.
///
/// The two forms are mutually exclusive by construction: an argument vector
/// is passed to `exec` with no shell interpretation, a shell line is handed
/// verbatim to `/bin/sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Argv(Vec<String>),
    Shell(String),
}

impl Invocation {
    /// Single-line rendering suitable for logs and for pasting into a shell.
    pub fn printable(&self) -> String {
        match self {
            Invocation::Argv(args) => cmdline::join(args),
            Invocation::Shell(line) => line.clone(),
        }
    }
}

/// What the runner keeps from the child's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Nothing is captured; the result carries no payload.
    #[default]
    Disabled,
    /// Capture stdout only; stderr is left alone.
    Stdout,
    /// Capture stdout and stderr interleaved in arrival order.
    Merged,
    /// Capture stdout; stderr is drained so the child never blocks on it,
    /// then dropped.
    StdoutDiscardStderr,
}

impl CaptureMode {
    pub fn enabled(self) -> bool {
        self != CaptureMode::Disabled
    }

    /// True when the child's stderr must be piped and drained.
    pub(crate) fn pipes_stderr(self) -> bool {
        matches!(self, CaptureMode::Merged | CaptureMode::StdoutDiscardStderr)
    }

    /// True when drained stderr bytes belong in the captured payload.
    pub(crate) fn keeps_stderr(self) -> bool {
        self == CaptureMode::Merged
    }
}

/// Which child streams are echoed to the caller's own stdout/stderr while
/// the command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    #[default]
    Silent,
    Stdout,
    Stderr,
    Both,
}

impl EchoMode {
    pub(crate) fn stdout(self) -> bool {
        matches!(self, EchoMode::Stdout | EchoMode::Both)
    }

    pub(crate) fn stderr(self) -> bool {
        matches!(self, EchoMode::Stderr | EchoMode::Both)
    }
}

/// Which descriptors survive into the child.
///
/// Everything this crate opens is close-on-exec at creation, so the default
/// policy costs nothing at spawn time. `Keep` clears the flag on the listed
/// descriptors inside the forked child; the parent's descriptor table is
/// never modified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FdRetention {
    /// Children see only stdio plus whatever the caller opened inheritable.
    #[default]
    CloseUntracked,
    /// No retention bookkeeping at all.
    KeepAll,
    /// Keep exactly these descriptors open across exec.
    Keep(Vec<RawFd>),
}

/// One command to launch (or simulate) and how to treat its streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub invocation: Invocation,
    /// Working directory for the child; `None` inherits the caller's.
    pub cwd: Option<PathBuf>,
    /// Bytes fed to the child's stdin through a transient spool file.
    pub stdin: Option<Vec<u8>>,
    pub capture: CaptureMode,
    pub echo: EchoMode,
    pub fd_retention: FdRetention,
    /// Treat a non-zero child status as fatal for the calling process.
    pub check: bool,
}

impl CommandSpec {
    /// Command from an argument vector, executed without a shell.
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Invocation::Argv(args.into_iter().map(Into::into).collect()))
    }

    /// Command handed verbatim to `/bin/sh -c`.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new(Invocation::Shell(line.into()))
    }

    /// Split a shell-like line into an argument vector command. No shell is
    /// involved at execution time.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(Self::argv(cmdline::split(line)?))
    }

    fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            cwd: None,
            stdin: None,
            capture: CaptureMode::default(),
            echo: EchoMode::default(),
            fd_retention: FdRetention::default(),
            check: false,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    pub fn capture(mut self, capture: CaptureMode) -> Self {
        self.capture = capture;
        self
    }

    pub fn echo(mut self, echo: EchoMode) -> Self {
        self.echo = echo;
        self
    }

    pub fn fd_retention(mut self, retention: FdRetention) -> Self {
        self.fd_retention = retention;
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn printable(&self) -> String {
        self.invocation.printable()
    }

    /// Name reported in spawn diagnostics.
    pub fn program(&self) -> &str {
        match &self.invocation {
            Invocation::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
            Invocation::Shell(_) => "/bin/sh",
        }
    }
}

/// Outcome of one launch: exit status plus optional captured bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Child exit status. Signal deaths map to `128 + signo`.
    pub status: i32,
    /// Captured bytes; present exactly when capture was requested.
    pub output: Option<Vec<u8>>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Captured payload decoded lossily for display.
    pub fn text(&self) -> Option<String> {
        self.output
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}
