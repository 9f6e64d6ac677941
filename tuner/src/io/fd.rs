//! Descriptor retention across exec.
//!
//! Files and pipes this crate opens are close-on-exec at creation, so
//! children normally inherit nothing beyond stdio. A caller that needs a
//! descriptor to survive exec lists it in [`FdRetention::Keep`]; the
//! close-on-exec flag is cleared inside the forked child, between fork and
//! exec, so the parent's descriptor table is never modified and concurrent
//! spawns cannot observe each other's retention.

use std::io;
use std::os::unix::io::RawFd;
use std::os::unix::process::CommandExt;
use std::process::Command;

use anyhow::{Context, Result};

use crate::core::types::FdRetention;

/// Arm `cmd` to clear close-on-exec on the retained descriptors after fork.
///
/// The descriptors are validated here in the parent, so a stale entry fails
/// the launch before anything is spawned.
pub(crate) fn arm_retention(cmd: &mut Command, policy: &FdRetention) -> Result<()> {
    let FdRetention::Keep(fds) = policy else {
        return Ok(());
    };
    for &fd in fds {
        descriptor_flags(fd).with_context(|| format!("retain fd {fd} across exec"))?;
    }
    let fds = fds.clone();
    // SAFETY: the hook runs in the child between fork and exec and calls
    // only fcntl, which is async-signal-safe; the descriptor list is
    // captured by value, so the child allocates nothing.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(move || {
            for &fd in &fds {
                clear_cloexec(fd)?;
            }
            Ok(())
        });
    }
    Ok(())
}

#[allow(unsafe_code)]
fn descriptor_flags(fd: RawFd) -> io::Result<i32> {
    // SAFETY: fcntl with F_GETFD only reads descriptor flags; it
    // dereferences no memory and fails cleanly (EBADF) on a stale
    // descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

#[allow(unsafe_code)]
fn clear_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = descriptor_flags(fd)?;
    // SAFETY: F_SETFD updates descriptor flags only.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
