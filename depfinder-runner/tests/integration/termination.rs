// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use depfinder_metadata::TestName;
use depfinder_runner::{
    pool::{PoolConfig, WorkerPool},
    store::DependencyStore,
};
use fixture_data::models::{FixtureSuite, Rule};
use proptest::{collection::btree_set, collection::vec, prelude::*};
use std::collections::BTreeSet;
use test_strategy::proptest;

type RuleSpec = (bool, usize, BTreeSet<usize>);

fn rules_strategy(count: usize) -> impl Strategy<Value = Vec<RuleSpec>> {
    vec((any::<bool>(), 0..count, btree_set(0..count, 1..3)), 0..5)
}

fn build_suite(tests: &[TestName], rules: &[RuleSpec]) -> FixtureSuite {
    rules.iter().fold(
        FixtureSuite::new(tests.iter().cloned()),
        |suite, (requires, target, deps)| {
            let deps = deps
                .iter()
                .filter(|dep| *dep != target)
                .map(|&dep| tests[dep].clone());
            let target = tests[*target].clone();
            let rule = if *requires {
                Rule::requires_before(target, deps)
            } else {
                Rule::broken_by(target, deps)
            };
            suite.with_rule(rule)
        },
    )
}

// Every pass that doesn't fail must add a dependency, so the number of passes for a target is
// bounded by the number of other tests.
#[proptest(cases = 48)]
fn search_terminates_with_sound_records(
    #[strategy(2usize..8)] count: usize,
    #[strategy(rules_strategy(#count))] rules: Vec<RuleSpec>,
    #[strategy(1usize..4)] workers: usize,
) {
    let tests: Vec<TestName> = (0..count).map(|i| TestName::new(format!("t{i}"))).collect();
    let suite = build_suite(&tests, &rules);
    let oracle = SuiteOracle::new(&suite);

    let pool = WorkerPool::new(PoolConfig::new(workers, "scratch"), &oracle);
    let original = tests.clone();
    let new: Vec<_> = tests.iter().rev().cloned().collect();
    let (original, new) = pool.prepare_orders(original, new).unwrap();

    let store = DependencyStore::new();
    let report = pool.run(tests.clone(), &original, &new, &store).unwrap();
    prop_assert_eq!(report.explained.len() + report.unexplained.len(), count);

    for explanation in &report.explained {
        prop_assert!(explanation.passes < count);
        if !explanation.order_dependent {
            prop_assert_eq!(explanation.passes, 0);
            prop_assert!(explanation.discoveries.is_empty());
        }
    }

    for record in &report.records {
        prop_assert_ne!(record.intended(), record.revealed());
        prop_assert_eq!(
            Some(record.intended()),
            original.outcome(record.target().as_str())
        );
        for dep in record.before_tests().iter().chain(record.after_tests()) {
            prop_assert!(tests.contains(dep));
            prop_assert_ne!(dep, record.target());
        }
    }
}
