//! Concurrent draining of child output pipes.
//!
//! Reading two pipes from one thread invites the classic deadlock: the
//! child blocks writing stderr while the parent blocks reading stdout. Each
//! piped stream therefore gets its own reader thread feeding chunks into a
//! single channel, and the receive loop appends them to the sink in arrival
//! order while echoing per stream policy. A stream that was never piped
//! simply has no reader.
//!
//! The receive and wait loops wake periodically to poll the cancel token;
//! on cancellation one SIGINT is forwarded to the child and waiting
//! resumes, so the child is reaped exactly once in every path.

use std::io::{self, Read, Write};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::core::types::{CaptureMode, EchoMode};
use crate::io::cancel::CancelToken;

/// How often blocked loops wake to poll for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK_BYTES: usize = 8192;

/// Origin of one drained chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stdout,
    Stderr,
}

/// Drain the child's piped streams to end-of-stream, then reap it.
///
/// Returns the exit status and the captured bytes. Chunks land in the sink
/// in the order the reader threads delivered them, which is the order the
/// child actually produced across both streams.
pub(crate) fn drain_and_wait(
    child: &mut Child,
    capture: CaptureMode,
    echo: EchoMode,
    cancel: &CancelToken,
) -> Result<(ExitStatus, Vec<u8>)> {
    let pid = child.id();
    let (tx, rx) = mpsc::channel::<(Source, Vec<u8>)>();

    let mut readers = Vec::new();
    if let Some(pipe) = child.stdout.take() {
        readers.push(spawn_reader(Source::Stdout, pipe, tx.clone()));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(spawn_reader(Source::Stderr, pipe, tx.clone()));
    }
    // The receive loop ends when the last reader hangs up.
    drop(tx);

    let mut sink = Vec::new();
    let mut forwarded = false;
    let mut failure: Option<anyhow::Error> = None;
    loop {
        forward_interrupt(pid, cancel, &mut forwarded);
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((source, chunk)) => {
                // After a failure keep receiving so the readers drain to
                // end-of-stream, but stop absorbing.
                if failure.is_none()
                    && let Err(err) = absorb(&mut sink, source, &chunk, capture, echo)
                {
                    failure = Some(err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for reader in readers {
        match reader.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                failure.get_or_insert(anyhow!(err).context("read child output"));
            }
            Err(_) => {
                failure.get_or_insert(anyhow!("output reader thread panicked"));
            }
        }
    }

    // Reap even when draining failed, or the child would linger as a zombie.
    let status = wait_loop(child, cancel, &mut forwarded)?;
    match failure {
        Some(err) => Err(err),
        None => Ok((status, sink)),
    }
}

/// Wait for a child that has no piped streams.
pub(crate) fn wait_child(child: &mut Child, cancel: &CancelToken) -> Result<ExitStatus> {
    let mut forwarded = false;
    wait_loop(child, cancel, &mut forwarded)
}

fn wait_loop(child: &mut Child, cancel: &CancelToken, forwarded: &mut bool) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL).context("wait for child")? {
            return Ok(status);
        }
        forward_interrupt(child.id(), cancel, forwarded);
    }
}

fn spawn_reader<R>(
    source: Source,
    mut pipe: R,
    tx: mpsc::Sender<(Source, Vec<u8>)>,
) -> thread::JoinHandle<io::Result<()>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    if tx.send((source, buf[..n].to_vec())).is_err() {
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    })
}

fn absorb(
    sink: &mut Vec<u8>,
    source: Source,
    chunk: &[u8],
    capture: CaptureMode,
    echo: EchoMode,
) -> Result<()> {
    match source {
        Source::Stdout => {
            if capture.enabled() {
                sink.extend_from_slice(chunk);
            }
            if echo.stdout() {
                echo_chunk(io::stdout(), chunk).context("echo child stdout")?;
            }
        }
        Source::Stderr => {
            if capture.keeps_stderr() {
                sink.extend_from_slice(chunk);
            }
            if echo.stderr() {
                echo_chunk(io::stderr(), chunk).context("echo child stderr")?;
            }
        }
    }
    Ok(())
}

fn echo_chunk<W: Write>(mut writer: W, chunk: &[u8]) -> io::Result<()> {
    writer.write_all(chunk)?;
    writer.flush()
}

/// Forward one SIGINT to the child after cancellation was requested.
fn forward_interrupt(pid: u32, cancel: &CancelToken, forwarded: &mut bool) {
    if *forwarded || !cancel.is_cancelled() {
        return;
    }
    *forwarded = true;
    debug!(pid, "forwarding interrupt to child");
    if let Err(err) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        warn!(pid, error = %err, "could not forward interrupt");
    }
}
