//! Side-effecting subsystems: process launch, output draining, filesystem
//! primitives, advisory locks, and configuration.
//!
//! Everything here takes its [`RunMode`](crate::core::types::RunMode) by
//! value at construction; under dry-run the mutating paths short-circuit
//! into logging.

pub mod cancel;
pub mod config;
mod drain;
pub mod exec;
mod fd;
pub mod fs;
pub mod lock;
