//! tuner: execution engine for compiler-flag auto-tuning runs.
//!
//! Every exploration step the surrounding tooling performs — rebuilding a
//! flag variant, running and timing the result, recording it in a shared
//! store — funnels through this crate when it needs to touch the outside
//! world. Callers decide *what* to run; the engine decides *how*: process
//! launch and reaping, output capture without pipe deadlocks, filesystem
//! primitives, and advisory locking across cooperating processes.
//!
//! The layering is strict:
//!
//! - [`core`]: pure data and parsing (command specs, stream policies,
//!   command-line quoting). Deterministic, no I/O.
//! - [`io`]: the side-effecting engine.
//!
//! One switch, [`core::types::RunMode`], selects simulation: under dry-run
//! nothing is forked and nothing is destructively written anywhere in the
//! process; each operation logs the action it would have taken and reports
//! success, so exploration logic upstream traverses the same path either
//! way.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
