// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::OracleError,
    oracle::{ExecutionOracle, OutcomeMap, SlotOracle, WorkerSlot},
    order::TestOrder,
    probe::Probe,
    store::DependencyStore,
};
use depfinder_metadata::{TestName, TestOutcome};
use fixture_data::{models::FixtureSuite, scenarios::Scenario};
use std::sync::Once;

/// Installs a tracing subscriber that writes through the test harness.
pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Runs orders against a [`FixtureSuite`].
#[derive(Debug)]
pub(crate) struct SuiteOracle<'a> {
    suite: &'a FixtureSuite,
}

impl<'a> SuiteOracle<'a> {
    pub(crate) fn new(suite: &'a FixtureSuite) -> Self {
        Self { suite }
    }
}

impl ExecutionOracle for SuiteOracle<'_> {
    fn execute(&self, order: &[TestName], _slot: &WorkerSlot) -> Result<OutcomeMap, OracleError> {
        Ok(self.suite.run(order))
    }
}

pub(crate) fn names(names: &[&str]) -> Vec<TestName> {
    names.iter().copied().map(TestName::from).collect()
}

pub(crate) fn slot_oracle(oracle: &dyn ExecutionOracle) -> SlotOracle<'_> {
    SlotOracle::new(oracle, WorkerSlot::new(0, "scratch", [""; 0]))
}

pub(crate) fn probe_for<'a>(
    store: &'a DependencyStore,
    oracle: &'a dyn ExecutionOracle,
    target: &str,
    intended: TestOutcome,
) -> Probe<'a> {
    Probe::new(target.into(), intended, store, slot_oracle(oracle))
}

pub(crate) fn execute(oracle: &dyn ExecutionOracle, tests: &[&str]) -> TestOrder {
    TestOrder::execute(names(tests), &mut slot_oracle(oracle)).expect("order executed")
}

pub(crate) fn execute_orders(
    oracle: &dyn ExecutionOracle,
    scenario: &Scenario,
) -> (TestOrder, TestOrder) {
    let mut slot_oracle = slot_oracle(oracle);
    let original = TestOrder::execute(scenario.original.clone(), &mut slot_oracle)
        .expect("original order executed");
    let new =
        TestOrder::execute(scenario.new.clone(), &mut slot_oracle).expect("new order executed");
    (original, new)
}
