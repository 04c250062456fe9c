// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use depfinder_metadata::TestName;
use depfinder_runner::{
    errors::OracleError,
    oracle::{ExecutionOracle, OutcomeMap, WorkerSlot},
};
use fixture_data::models::FixtureSuite;
use std::sync::Once;

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        color_eyre::install().unwrap();
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Runs orders against a [`FixtureSuite`], also touching the slot's scratch files so that
/// leaked state between calls is detected.
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
    fn execute(&self, order: &[TestName], slot: &WorkerSlot) -> Result<OutcomeMap, OracleError> {
        for path in slot.scratch_paths() {
            if path.exists() {
                return Err(OracleError::exec(
                    slot.index(),
                    format!("scratch file `{path}` was not reset"),
                ));
            }
            fs_err::create_dir_all(slot.scratch_dir())
                .and_then(|()| fs_err::write(&path, order.len().to_string()))
                .map_err(|err| OracleError::exec(slot.index(), err))?;
        }
        Ok(self.suite.run(order))
    }
}

pub(crate) fn names(names: &[&str]) -> Vec<TestName> {
    names.iter().copied().map(TestName::from).collect()
}
