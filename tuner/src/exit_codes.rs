//! Stable exit codes for tuner CLI commands.
//!
//! `tuner exec` is transparent: it exits with the child's own status (with
//! signal deaths mapped to `128 + signo`), so these codes only cover the
//! tool's own outcomes.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid usage or configuration, or an operation failed.
pub const ERROR: i32 = 1;
/// `tuner lock` gave up before the lock became free.
pub const LOCK_BUSY: i32 = 2;
/// `tuner which` found no executable by that name.
pub const NOT_FOUND: i32 = 3;
