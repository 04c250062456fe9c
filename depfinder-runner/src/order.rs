// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test orders and the outcomes observed for them.

use crate::{
    errors::{OracleError, OrderError},
    oracle::{OutcomeMap, SlotOracle},
};
use depfinder_metadata::{TestName, TestOutcome};
use std::collections::HashSet;

/// An ordered list of unique tests, along with the outcome of each test when the list was
/// executed once.
///
/// Test orders are immutable. Obtaining one either costs one oracle call
/// ([`execute`](Self::execute)) or reuses outcomes computed elsewhere
/// ([`with_outcomes`](Self::with_outcomes)).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestOrder {
    tests: Vec<TestName>,
    outcomes: OutcomeMap,
}

impl TestOrder {
    /// Executes `tests` through `oracle` and records the outcomes.
    pub fn execute(tests: Vec<TestName>, oracle: &mut SlotOracle<'_>) -> Result<Self, OracleError> {
        let outcomes = oracle.execute(&tests)?;
        // The slot oracle guarantees that the outcomes match the order exactly.
        Ok(Self { tests, outcomes })
    }

    /// Creates a test order from outcomes that were computed elsewhere.
    pub fn with_outcomes(tests: Vec<TestName>, outcomes: OutcomeMap) -> Result<Self, OrderError> {
        check_unique(&tests)?;

        let missing: Vec<_> = tests
            .iter()
            .filter(|test| !outcomes.contains_key(*test))
            .cloned()
            .collect();
        let unexpected: Vec<_> = outcomes
            .keys()
            .filter(|test| !tests.contains(test))
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(OrderError::OutcomeMismatch {
                missing,
                unexpected,
            });
        }

        Ok(Self { tests, outcomes })
    }

    /// Returns the tests in this order.
    pub fn tests(&self) -> &[TestName] {
        &self.tests
    }

    /// Returns the outcomes observed for this order.
    pub fn outcomes(&self) -> &OutcomeMap {
        &self.outcomes
    }

    /// Returns the outcome of `test`, or `None` if it's not part of this order.
    pub fn outcome(&self, test: &str) -> Option<TestOutcome> {
        self.outcomes.get(test).copied()
    }

    /// Returns the position of `test` within this order.
    pub fn position(&self, test: &str) -> Option<usize> {
        self.tests.iter().position(|t| t == test)
    }

    /// Returns the tests that run before `test` in this order.
    pub fn tests_before(&self, test: &str) -> Option<&[TestName]> {
        self.position(test).map(|index| &self.tests[..index])
    }

    /// Builds the prime order for `target` out of an original and a new order.
    ///
    /// The result is the new order's prefix before `target` with every test from the original
    /// prefix moved, in original order, to directly before `target`. Anything after `target` is
    /// dropped. Returns `None` if `target` is missing from either order.
    pub fn prime(original: &TestOrder, new: &TestOrder, target: &str) -> Option<Vec<TestName>> {
        let original_prefix = original.tests_before(target)?;
        let new_position = new.position(target)?;

        let original_set: HashSet<&TestName> = original_prefix.iter().collect();
        let mut prime: Vec<TestName> = new.tests[..new_position]
            .iter()
            .filter(|test| !original_set.contains(test))
            .cloned()
            .collect();
        prime.extend_from_slice(original_prefix);
        prime.push(new.tests[new_position].clone());
        Some(prime)
    }
}

pub(crate) fn check_unique(tests: &[TestName]) -> Result<(), OrderError> {
    let mut seen = HashSet::with_capacity(tests.len());
    for test in tests {
        if !seen.insert(test) {
            return Err(OrderError::DuplicateTest { test: test.clone() });
        }
    }
    Ok(())
}
