//! Pure, deterministic logic: command descriptions and line parsing.
//!
//! Core modules perform no I/O; everything here is safe to call under
//! dry-run and from any thread.

pub mod cmdline;
pub mod types;
