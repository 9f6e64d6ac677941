//! Advisory file locks with bounded retry.
//!
//! Independent tuner processes sharing a results store serialize through
//! `flock`-style exclusive locks. Contention is expected and quiet: the
//! acquirer retries on an interval until its deadline, and a missed
//! deadline is an ordinary outcome rather than an error.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{debug, instrument, warn};

use crate::core::types::RunMode;
use crate::io::fs::WriteHandle;

/// Pause between attempts while a peer holds the lock.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// How the lock file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Open an existing file read-only.
    Read,
    /// Open read/write, creating if missing. Existing contents are kept;
    /// truncating before the lock is held would clobber a peer's data.
    Write,
    /// Open append-only, creating if missing.
    Append,
}

/// Parameters for one lock acquisition.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub path: PathBuf,
    pub mode: LockMode,
    /// Give up after this long; `None` retries until the lock is granted.
    pub timeout: Option<Duration>,
    pub retry_interval: Duration,
}

impl LockRequest {
    pub fn new(path: impl Into<PathBuf>, mode: LockMode) -> Self {
        Self {
            path: path.into(),
            mode,
            timeout: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// An open file plus the exclusive advisory lock held on it.
///
/// Dropping the handle releases the lock. Under dry-run the handle wraps an
/// in-memory buffer and no real lock exists anywhere.
#[derive(Debug)]
pub struct LockHandle {
    handle: WriteHandle,
    locked: bool,
}

impl LockHandle {
    /// Take the exclusive lock, retrying while a peer holds it.
    ///
    /// Returns `Ok(None)` when the timeout elapses first; the caller
    /// decides what a busy lock means. Open failures and unexpected lock
    /// errors are real errors.
    #[instrument(skip_all, fields(path = %request.path.display()))]
    pub fn acquire(request: &LockRequest, mode: RunMode) -> Result<Option<LockHandle>> {
        if mode.is_dry_run() {
            debug!("# lock {}", request.path.display());
            return Ok(Some(LockHandle {
                handle: WriteHandle::Simulated(Vec::new()),
                locked: false,
            }));
        }
        let started = Instant::now();
        loop {
            let file = open_for(request)
                .with_context(|| format!("open lock file {}", request.path.display()))?;
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("lock acquired");
                    return Ok(Some(LockHandle {
                        handle: WriteHandle::Real(file),
                        locked: true,
                    }));
                }
                Err(err) if is_contended(&err) => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("lock {}", request.path.display()));
                }
            }
            if let Some(timeout) = request.timeout
                && started.elapsed() >= timeout
            {
                debug!("gave up after {:?}", started.elapsed());
                return Ok(None);
            }
            thread::sleep(request.retry_interval);
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.handle.is_simulated()
    }

    /// The locked file (or the in-memory buffer under dry-run).
    pub fn handle_mut(&mut self) -> &mut WriteHandle {
        &mut self.handle
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.locked {
            return;
        }
        if let WriteHandle::Real(file) = &self.handle
            && let Err(err) = FileExt::unlock(file)
        {
            warn!(error = %err, "failed to release lock");
        }
    }
}

fn open_for(request: &LockRequest) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match request.mode {
        LockMode::Read => options.read(true),
        LockMode::Write => options.read(true).write(true).create(true),
        LockMode::Append => options.append(true).create(true),
    };
    options.open(&request.path)
}

fn is_contended(err: &io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
