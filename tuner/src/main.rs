//! Command execution front end for auto-tuning runs.
//!
//! Scripts and the surrounding tooling call `tuner` instead of a raw shell:
//! commands inherit the engine's guarantees (deadlock-free capture, clean
//! reaping, interrupt forwarding) and every action can be rehearsed with
//! `--dry-run` before a long exploration is left to run unattended.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use tuner::core::types::{CaptureMode, CommandSpec, EchoMode, FdRetention, RunMode};
use tuner::exit_codes;
use tuner::io::cancel::CancelToken;
use tuner::io::config::{self, TunerConfig};
use tuner::io::exec::CommandRunner;
use tuner::io::fs::FileOps;
use tuner::io::lock::{LockHandle, LockMode, LockRequest};
use tuner::logging::{self, Verbosity};

#[derive(Parser)]
#[command(
    name = "tuner",
    version,
    about = "Execution engine for compiler-flag auto-tuning"
)]
struct Cli {
    /// Simulate: log commands and writes without performing them.
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Show full diagnostics (shell equivalents, captured output).
    #[arg(long, global = true)]
    debug: bool,

    /// Errors only.
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Configuration file.
    #[arg(long, value_name = "FILE", default_value = "tuner.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one command through the engine; exits with the child's status.
    Exec {
        /// Hand the arguments to `/bin/sh -c` as one line.
        #[arg(long)]
        shell: bool,

        /// What to capture and print once the command finishes.
        #[arg(long, value_enum, default_value_t = CaptureChoice::None)]
        capture: CaptureChoice,

        /// Do not echo child output while it runs.
        #[arg(long)]
        silent: bool,

        /// Working directory for the child.
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// File whose bytes become the child's stdin.
        #[arg(long, value_name = "FILE")]
        stdin_file: Option<PathBuf>,

        /// Keep a descriptor open across exec (repeatable).
        #[arg(long = "keep-fd", value_name = "FD")]
        keep_fds: Vec<i32>,

        /// Treat a non-zero status as fatal for the tuner itself.
        #[arg(long)]
        check: bool,

        /// Command and arguments (prefix with `--`).
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Resolve an executable name against `PATH` and print its full path.
    Which {
        name: String,
    },
    /// Run a command while holding an exclusive lock on a file.
    Lock {
        /// Lock file held for the duration of the command.
        file: PathBuf,

        /// Give up after this many seconds instead of waiting indefinitely.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Command to run under the lock (prefix with `--`).
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Write the effective configuration to the config file.
    InitConfig,
}

/// CLI face of [`CaptureMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CaptureChoice {
    /// Capture nothing.
    None,
    /// Child stdout only.
    Stdout,
    /// stdout and stderr, interleaved in arrival order.
    Merged,
    /// stdout, with stderr drained and dropped.
    DiscardStderr,
}

impl From<CaptureChoice> for CaptureMode {
    fn from(choice: CaptureChoice) -> Self {
        match choice {
            CaptureChoice::None => CaptureMode::Disabled,
            CaptureChoice::Stdout => CaptureMode::Stdout,
            CaptureChoice::Merged => CaptureMode::Merged,
            CaptureChoice::DiscardStderr => CaptureMode::StdoutDiscardStderr,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.quiet, cli.debug));
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let cfg = config::load_config(&cli.config)?;
    let mode = cfg.run_mode(cli.dry_run);
    let cancel = CancelToken::new();
    let runner = CommandRunner::with_cancel(mode, cancel.clone());
    let ops = FileOps::new(mode);

    match cli.command {
        Command::Exec {
            shell,
            capture,
            silent,
            cwd,
            stdin_file,
            keep_fds,
            check,
            args,
        } => {
            arm_sigint(&cancel)?;
            cmd_exec(
                &runner,
                ops,
                &cfg,
                ExecOptions {
                    shell,
                    capture,
                    silent,
                    cwd,
                    stdin_file,
                    keep_fds,
                    check,
                    args,
                },
            )
        }
        Command::Which { name } => cmd_which(ops, &name),
        Command::Lock {
            file,
            timeout,
            args,
        } => {
            arm_sigint(&cancel)?;
            cmd_lock(&runner, &cfg, mode, file, timeout, args)
        }
        Command::InitConfig => cmd_init_config(&cli.config, &cfg, mode),
    }
}

struct ExecOptions {
    shell: bool,
    capture: CaptureChoice,
    silent: bool,
    cwd: Option<PathBuf>,
    stdin_file: Option<PathBuf>,
    keep_fds: Vec<i32>,
    check: bool,
    args: Vec<String>,
}

fn cmd_exec(
    runner: &CommandRunner,
    ops: FileOps,
    cfg: &TunerConfig,
    opts: ExecOptions,
) -> Result<i32> {
    let mut spec = if opts.shell {
        CommandSpec::shell(opts.args.join(" "))
    } else {
        CommandSpec::argv(opts.args)
    };

    let capture = CaptureMode::from(opts.capture);
    // Live echo only when nothing is captured; captured output is printed
    // once at the end instead.
    let echo = if opts.silent || capture.enabled() {
        EchoMode::Silent
    } else {
        EchoMode::Both
    };
    spec = spec.capture(capture).echo(echo).check(opts.check);

    if let Some(dir) = opts.cwd.or_else(|| cfg.default_workdir.clone()) {
        spec = spec.cwd(dir);
    }
    if let Some(path) = &opts.stdin_file {
        let mut bytes = Vec::new();
        ops.open_read(path)?
            .read_to_end(&mut bytes)
            .with_context(|| format!("read {}", path.display()))?;
        spec = spec.stdin_bytes(bytes);
    }
    if !opts.keep_fds.is_empty() {
        spec = spec.fd_retention(FdRetention::Keep(opts.keep_fds));
    } else {
        spec = spec.fd_retention(cfg.fd_retention.into());
    }

    let result = runner.run(&spec)?;
    if let Some(output) = result.output.as_deref() {
        let mut stdout = std::io::stdout();
        stdout.write_all(output).context("write captured output")?;
        stdout.flush().context("flush captured output")?;
    }
    Ok(result.status)
}

fn cmd_which(ops: FileOps, name: &str) -> Result<i32> {
    match ops.which(name) {
        Some(path) => {
            println!("{}", path.display());
            Ok(exit_codes::OK)
        }
        None => Ok(exit_codes::NOT_FOUND),
    }
}

fn cmd_lock(
    runner: &CommandRunner,
    cfg: &TunerConfig,
    mode: RunMode,
    file: PathBuf,
    timeout: Option<u64>,
    args: Vec<String>,
) -> Result<i32> {
    let mut request =
        LockRequest::new(file, LockMode::Write).retry_interval(cfg.lock_retry_interval());
    if let Some(secs) = timeout {
        request = request.timeout(Duration::from_secs(secs));
    }
    match LockHandle::acquire(&request, mode)? {
        Some(handle) => {
            let result = runner.run(&CommandSpec::argv(args).echo(EchoMode::Both))?;
            drop(handle);
            Ok(result.status)
        }
        None => {
            eprintln!("lock busy: {}", request.path.display());
            Ok(exit_codes::LOCK_BUSY)
        }
    }
}

fn cmd_init_config(path: &Path, cfg: &TunerConfig, mode: RunMode) -> Result<i32> {
    if mode.is_dry_run() {
        let mut rendered = toml::to_string_pretty(cfg).context("serialize config toml")?;
        rendered.push('\n');
        print!("{rendered}");
        return Ok(exit_codes::OK);
    }
    config::write_config(path, cfg)?;
    Ok(exit_codes::OK)
}

/// Route SIGINT into the cancel token so an in-flight child is interrupted
/// and reaped; a second SIGINT terminates the tuner itself.
fn arm_sigint(cancel: &CancelToken) -> Result<()> {
    signal_hook::flag::register_conditional_shutdown(
        signal_hook::consts::SIGINT,
        128 + signal_hook::consts::SIGINT,
        cancel.flag(),
    )
    .context("register interrupt shutdown")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.flag())
        .context("register interrupt flag")?;
    Ok(())
}
