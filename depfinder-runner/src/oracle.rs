// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary between depfinder and the component that actually runs tests.
//!
//! depfinder never executes tests itself. Instead, every order it wants to observe is handed to
//! an [`ExecutionOracle`] along with the [`WorkerSlot`] the caller owns. Oracles are shared by
//! all workers, so any state they leave behind must live in the slot's scratch namespace.

use crate::errors::OracleError;
use camino::{Utf8Path, Utf8PathBuf};
use depfinder_metadata::{TestName, TestOutcome};
use std::{collections::BTreeMap, fmt, io};
use tracing::trace;

/// Outcomes of every test in one executed order.
pub type OutcomeMap = BTreeMap<TestName, TestOutcome>;

/// Runs a named, ordered list of tests and reports their outcomes.
///
/// Implementations must be deterministic for a given order once the slot has been reset, and
/// must return an outcome for exactly the tests requested.
pub trait ExecutionOracle: Send + Sync {
    /// Executes `order` within the environment owned by `slot`.
    fn execute(&self, order: &[TestName], slot: &WorkerSlot) -> Result<OutcomeMap, OracleError>;
}

impl<T: ExecutionOracle + ?Sized> ExecutionOracle for &T {
    fn execute(&self, order: &[TestName], slot: &WorkerSlot) -> Result<OutcomeMap, OracleError> {
        (**self).execute(order, slot)
    }
}

/// Adapts a closure into an [`ExecutionOracle`].
pub struct FnOracle<F>(F);

impl<F> FnOracle<F>
where
    F: Fn(&[TestName], &WorkerSlot) -> Result<OutcomeMap, OracleError> + Send + Sync,
{
    /// Creates a new `FnOracle`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ExecutionOracle for FnOracle<F>
where
    F: Fn(&[TestName], &WorkerSlot) -> Result<OutcomeMap, OracleError> + Send + Sync,
{
    fn execute(&self, order: &[TestName], slot: &WorkerSlot) -> Result<OutcomeMap, OracleError> {
        (self.0)(order, slot)
    }
}

impl<F> fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOracle").finish_non_exhaustive()
    }
}

/// The execution environment owned by a single worker.
///
/// Each slot has its own scratch namespace: the configured scratch files, suffixed with the
/// slot index. Concurrently running workers therefore never share files.
#[derive(Clone, Debug)]
pub struct WorkerSlot {
    index: usize,
    scratch_dir: Utf8PathBuf,
    scratch_files: Vec<Utf8PathBuf>,
}

impl WorkerSlot {
    /// Creates a new slot.
    ///
    /// `scratch_files` are relative to `scratch_dir`.
    pub fn new(
        index: usize,
        scratch_dir: impl Into<Utf8PathBuf>,
        scratch_files: impl IntoIterator<Item = impl Into<Utf8PathBuf>>,
    ) -> Self {
        Self {
            index,
            scratch_dir: scratch_dir.into(),
            scratch_files: scratch_files.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the index of this slot.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the scratch directory shared by all slots.
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch_dir
    }

    /// Returns the path that `name` maps to within this slot's namespace.
    pub fn scratch_path(&self, name: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.scratch_dir.join(format!("{}.{}", name.as_ref(), self.index))
    }

    /// Returns the paths of all scratch files owned by this slot.
    pub fn scratch_paths(&self) -> impl Iterator<Item = Utf8PathBuf> + '_ {
        self.scratch_files.iter().map(|name| self.scratch_path(name))
    }

    /// Deletes this slot's scratch files. Files that don't exist are skipped.
    pub fn reset(&self) -> Result<(), OracleError> {
        for path in self.scratch_paths() {
            match fs_err::remove_file(&path) {
                Ok(()) => trace!(slot = self.index, %path, "removed scratch file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(OracleError::ScratchCleanup {
                        slot: self.index,
                        path,
                        err,
                    });
                }
            }
        }
        Ok(())
    }
}

/// An oracle bound to one worker slot.
///
/// Every call resets the slot first, and checks that the outcomes returned match the order that
/// was requested. Calls are counted.
pub struct SlotOracle<'a> {
    oracle: &'a dyn ExecutionOracle,
    slot: WorkerSlot,
    calls: usize,
}

impl<'a> SlotOracle<'a> {
    /// Creates a new `SlotOracle`.
    pub fn new(oracle: &'a dyn ExecutionOracle, slot: WorkerSlot) -> Self {
        Self {
            oracle,
            slot,
            calls: 0,
        }
    }

    /// Returns the number of times the inner oracle has been invoked.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Resets the slot and executes `order`.
    pub fn execute(&mut self, order: &[TestName]) -> Result<OutcomeMap, OracleError> {
        self.slot.reset()?;
        self.calls += 1;
        let outcomes = self.oracle.execute(order, &self.slot)?;
        check_consistency(self.slot.index, order, &outcomes)?;
        Ok(outcomes)
    }
}

impl fmt::Debug for SlotOracle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotOracle")
            .field("slot", &self.slot)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

fn check_consistency(
    slot: usize,
    order: &[TestName],
    outcomes: &OutcomeMap,
) -> Result<(), OracleError> {
    let missing: Vec<_> = order
        .iter()
        .filter(|test| !outcomes.contains_key(*test))
        .cloned()
        .collect();
    let unexpected: Vec<_> = outcomes
        .keys()
        .filter(|test| !order.contains(test))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(OracleError::Inconsistent {
            slot,
            missing,
            unexpected,
        })
    }
}
