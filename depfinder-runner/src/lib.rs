// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for depfinder, a localizer for order-dependent tests.
//!
//! Given a test that passes in one order (the *original* order) and fails in another (the *new*
//! order), depfinder searches for the individual tests responsible: tests that must run before
//! the target, and tests that must not. Findings are stored as
//! [`DependencyRecord`](depfinder_metadata::DependencyRecord)s.
//!
//! The basic flow is:
//!
//! 1. Implement [`ExecutionOracle`](oracle::ExecutionOracle) to run a list of tests in order.
//! 2. Load a [`FinderProfile`](config::FinderProfile) and build a
//!    [`WorkerPool`](pool::WorkerPool) from it.
//! 3. Call [`WorkerPool::run`](pool::WorkerPool::run) with the targets to explain.

pub mod chains;
pub mod config;
pub mod errors;
pub mod finder;
mod helpers;
pub mod oracle;
pub mod order;
pub mod pool;
mod probe;
pub mod reporter;
pub mod solver;
pub mod store;
#[cfg(test)]
mod test_helpers;
