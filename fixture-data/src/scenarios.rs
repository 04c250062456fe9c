// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned suites along with a pair of orders exposing their order dependence.

use crate::models::{FixtureSuite, Rule};
use depfinder_metadata::TestName;

/// A suite plus an original and a new order in which `target` behaves differently.
#[derive(Debug)]
pub struct Scenario {
    pub suite: FixtureSuite,
    pub target: TestName,
    pub original: Vec<TestName>,
    pub new: Vec<TestName>,
}

impl Scenario {
    fn new(suite: FixtureSuite, target: &str, original: &[&str], new: &[&str]) -> Self {
        Self {
            suite,
            target: target.into(),
            original: names(original),
            new: names(new),
        }
    }
}

/// `c` fails unless `b` ran before it. `c` passes in `[a, b, c]` and fails in `[c, a, b]`.
pub fn missing_setup() -> Scenario {
    let suite = FixtureSuite::new(["a", "b", "c"]).with_rule(Rule::requires_before("c", ["b"]));
    Scenario::new(suite, "c", &["a", "b", "c"], &["c", "a", "b"])
}

/// `y` fails if `x` ran before it. `y` passes in `[y, x]` and fails in `[x, y]`.
pub fn polluted_state() -> Scenario {
    let suite = FixtureSuite::new(["x", "y"]).with_rule(Rule::broken_by("y", ["x"]));
    Scenario::new(suite, "y", &["y", "x"], &["x", "y"])
}

/// `victim` is broken independently by `p1` and by `p2`.
pub fn two_polluters() -> Scenario {
    let suite = FixtureSuite::new(["p1", "n1", "n2", "p2", "victim"])
        .with_rule(Rule::broken_by("victim", ["p1"]))
        .with_rule(Rule::broken_by("victim", ["p2"]));
    Scenario::new(
        suite,
        "victim",
        &["victim", "p1", "n1", "n2", "p2"],
        &["p1", "n1", "n2", "p2", "victim"],
    )
}

/// `reader` only passes when both `init_a` and `init_b` ran before it.
pub fn paired_setup() -> Scenario {
    let suite = FixtureSuite::new(["init_a", "n1", "n2", "init_b", "reader"])
        .with_rule(Rule::requires_before("reader", ["init_a", "init_b"]));
    Scenario::new(
        suite,
        "reader",
        &["init_a", "n1", "n2", "init_b", "reader"],
        &["reader", "init_a", "n1", "n2", "init_b"],
    )
}

/// `t` needs `setup` before it and is broken by `polluter`, which the new order puts first.
pub fn setup_and_polluter() -> Scenario {
    let suite = FixtureSuite::new(["setup", "n1", "polluter", "n2", "t"])
        .with_rule(Rule::requires_before("t", ["setup"]))
        .with_rule(Rule::broken_by("t", ["polluter"]));
    Scenario::new(
        suite,
        "t",
        &["setup", "n1", "t", "polluter", "n2"],
        &["polluter", "n2", "t", "setup", "n1"],
    )
}

fn names(names: &[&str]) -> Vec<TestName> {
    names.iter().copied().map(TestName::from).collect()
}
