// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::FinderError,
    oracle::SlotOracle,
    store::{DependencyStore, MergeOutcome},
};
use depfinder_metadata::{DependencyRecord, TestName, TestOutcome};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// One executed order and the outcome the target had in it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Execution {
    pub(crate) order: Vec<TestName>,
    pub(crate) outcome: TestOutcome,
}

/// Runs orders ending in one target test and records what is learned about it.
///
/// Every order is adjusted to honor the target's known dependencies before it is executed.
#[derive(Debug)]
pub(crate) struct Probe<'a> {
    target: TestName,
    intended: TestOutcome,
    store: &'a DependencyStore,
    oracle: SlotOracle<'a>,
    discoveries: Vec<DependencyRecord>,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(
        target: TestName,
        intended: TestOutcome,
        store: &'a DependencyStore,
        oracle: SlotOracle<'a>,
    ) -> Self {
        Self {
            target,
            intended,
            store,
            oracle,
            discoveries: Vec::new(),
        }
    }

    /// Points this probe at a new target, keeping its oracle.
    pub(crate) fn retarget(&mut self, target: TestName, intended: TestOutcome) {
        self.target = target;
        self.intended = intended;
        self.discoveries.clear();
    }

    #[inline]
    pub(crate) fn target(&self) -> &TestName {
        &self.target
    }

    #[inline]
    pub(crate) fn intended(&self) -> TestOutcome {
        self.intended
    }

    pub(crate) fn oracle_mut(&mut self) -> &mut SlotOracle<'a> {
        &mut self.oracle
    }

    pub(crate) fn oracle_calls(&self) -> usize {
        self.oracle.calls()
    }

    pub(crate) fn known_dependencies(&self) -> BTreeSet<TestName> {
        self.store.known_dependencies(self.target.as_str())
    }

    pub(crate) fn records(&self) -> Vec<DependencyRecord> {
        self.store.records_for(self.target.as_str())
    }

    pub(crate) fn discoveries(&self) -> &[DependencyRecord] {
        &self.discoveries
    }

    /// Executes `tests` followed by the target.
    pub(crate) fn run(&mut self, tests: &[TestName]) -> Result<Execution, FinderError> {
        self.run_pinned(tests, &[])
    }

    /// Executes `tests` followed by the target, without moving any test in `pinned` while
    /// honoring known dependencies.
    pub(crate) fn run_pinned(
        &mut self,
        tests: &[TestName],
        pinned: &[TestName],
    ) -> Result<Execution, FinderError> {
        let mut order = Vec::with_capacity(tests.len() + 1);
        order.extend_from_slice(tests);
        order.push(self.target.clone());
        for record in self.store.records_for(self.target.as_str()) {
            order = record.fix_order_except(&order, pinned);
        }

        let outcomes = self
            .oracle
            .execute(&order)
            .map_err(|err| FinderError::Oracle {
                target: self.target.clone(),
                err,
            })?;
        let outcome = *outcomes
            .get(self.target.as_str())
            .expect("slot oracle checks that every requested test has an outcome");

        Ok(Execution { order, outcome })
    }

    /// Records a verified dependency and merges it into the store.
    pub(crate) fn record(
        &mut self,
        before_tests: BTreeSet<TestName>,
        after_tests: BTreeSet<TestName>,
        revealing: Execution,
    ) -> Result<(), FinderError> {
        let record = DependencyRecord::new(
            self.target.clone(),
            self.intended,
            before_tests,
            after_tests,
            revealing.outcome,
            revealing.order,
        )
        .map_err(|err| FinderError::Record {
            target: self.target.clone(),
            err,
        })?;

        info!(
            target_test = %self.target,
            before = ?record.before_tests(),
            after = ?record.after_tests(),
            revealed = %record.revealed(),
            "found dependency"
        );
        self.discoveries.push(record.clone());
        match self.store.merge(record) {
            MergeOutcome::Added | MergeOutcome::Updated => {}
            MergeOutcome::Unchanged => {
                debug!(target_test = %self.target, "dependency was already known");
            }
        }
        Ok(())
    }
}
