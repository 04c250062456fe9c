// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data models for synthetic suites.

use depfinder_metadata::{TestName, TestOutcome};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicUsize, Ordering},
};

/// An order-dependence planted into a [`FixtureSuite`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rule {
    /// `target` produces `otherwise` unless every test in `setup` ran before it.
    RequiresBefore {
        target: TestName,
        setup: BTreeSet<TestName>,
        otherwise: TestOutcome,
    },

    /// `target` produces `outcome` if every test in `polluters` ran before it.
    BrokenBy {
        target: TestName,
        polluters: BTreeSet<TestName>,
        outcome: TestOutcome,
    },
}

impl Rule {
    /// `target` fails unless all of `setup` ran before it.
    pub fn requires_before(
        target: impl Into<TestName>,
        setup: impl IntoIterator<Item = impl Into<TestName>>,
    ) -> Self {
        Self::RequiresBefore {
            target: target.into(),
            setup: setup.into_iter().map(Into::into).collect(),
            otherwise: TestOutcome::Failure,
        }
    }

    /// `target` fails if all of `polluters` ran before it.
    pub fn broken_by(
        target: impl Into<TestName>,
        polluters: impl IntoIterator<Item = impl Into<TestName>>,
    ) -> Self {
        Self::BrokenBy {
            target: target.into(),
            polluters: polluters.into_iter().map(Into::into).collect(),
            outcome: TestOutcome::Failure,
        }
    }

    /// Returns the test whose outcome this rule affects.
    pub fn target(&self) -> &TestName {
        match self {
            Self::RequiresBefore { target, .. } | Self::BrokenBy { target, .. } => target,
        }
    }

    /// Returns the outcome this rule forces on the target in `preceding`, if it applies.
    fn apply(&self, preceding: &BTreeSet<&TestName>) -> Option<TestOutcome> {
        match self {
            Self::RequiresBefore {
                setup, otherwise, ..
            } => (!setup.iter().all(|test| preceding.contains(test))).then_some(*otherwise),
            Self::BrokenBy {
                polluters, outcome, ..
            } => polluters
                .iter()
                .all(|test| preceding.contains(test))
                .then_some(*outcome),
        }
    }
}

/// A deterministic, in-memory test suite with planted order dependencies.
///
/// Every test passes unless a rule for it applies. Rules are checked in the order they were
/// added and the first one that applies decides the outcome.
#[derive(Debug, Default)]
pub struct FixtureSuite {
    tests: Vec<TestName>,
    rules: Vec<Rule>,
    runs: AtomicUsize,
}

impl FixtureSuite {
    /// Creates a suite with the given tests and no rules.
    pub fn new(tests: impl IntoIterator<Item = impl Into<TestName>>) -> Self {
        Self {
            tests: tests.into_iter().map(Into::into).collect(),
            rules: Vec::new(),
            runs: AtomicUsize::new(0),
        }
    }

    /// Adds a rule to this suite.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the tests in this suite, in declaration order.
    pub fn tests(&self) -> &[TestName] {
        &self.tests
    }

    /// Returns the number of times [`Self::run`] has been called.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Runs `order`, returning the outcome of every test in it.
    pub fn run(&self, order: &[TestName]) -> BTreeMap<TestName, TestOutcome> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        let mut preceding = BTreeSet::new();
        let mut outcomes = BTreeMap::new();
        for test in order {
            let outcome = self
                .rules
                .iter()
                .filter(|rule| rule.target() == test)
                .find_map(|rule| rule.apply(&preceding))
                .unwrap_or(TestOutcome::Pass);
            outcomes.insert(test.clone(), outcome);
            preceding.insert(test);
        }
        outcomes
    }

    /// Returns the outcome of `test` when `order` is run.
    pub fn outcome_in(&self, order: &[TestName], test: &str) -> Option<TestOutcome> {
        self.run(order).get(test).copied()
    }
}
