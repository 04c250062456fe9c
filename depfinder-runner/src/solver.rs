// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delta debugging over lists of candidate tests.
//!
//! The solver narrows a list of candidates down to the individual tests responsible for a
//! target's behavior. Each step splits the candidates in half and executes each half, together
//! with the current anchors, in front of the target:
//!
//! * If exactly one half reproduces what is being searched for, the other half is dropped.
//! * If both halves do, each contains its own dependency and both are searched, one after the
//!   other.
//! * If neither does, the dependency needs tests from both halves. The top half is searched with
//!   the bottom half held fixed as anchors. The bottom half is then searched with whatever was
//!   found in the top half held fixed, unless that alone already reproduces.
//!
//! A single remaining candidate is only recorded after running the target with and without it.
//! Anchors are pinned: known dependencies are honored around them, but never by moving them.

use crate::{
    errors::FinderError,
    probe::{Execution, Probe},
};
use depfinder_metadata::{TestName, TestOutcome};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// The kind of dependency a search is looking for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchKind {
    /// Tests that must run before the target for it to produce its intended outcome.
    Before,

    /// Tests that must run after the target for it to produce its intended outcome.
    After,
}

impl SearchKind {
    /// Returns true if a list of candidates that produced `outcome` contains a dependency.
    ///
    /// Before-dependencies restore the intended outcome, while after-dependencies disturb it.
    pub fn is_hit(self, outcome: TestOutcome, intended: TestOutcome) -> bool {
        match self {
            Self::Before => outcome == intended,
            Self::After => outcome != intended,
        }
    }
}

/// Tests held in place around the candidates during one search.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Anchors {
    top: Vec<TestName>,
    bottom: Vec<TestName>,
}

impl Anchors {
    /// Returns `tests` placed between the top and bottom anchors.
    pub(crate) fn surround(&self, tests: &[TestName]) -> Vec<TestName> {
        let mut order = Vec::with_capacity(self.top.len() + tests.len() + self.bottom.len());
        order.extend_from_slice(&self.top);
        order.extend_from_slice(tests);
        order.extend_from_slice(&self.bottom);
        order
    }

    /// Returns a copy of these anchors with `tests` held in front of the bottom anchors.
    fn with_bottom(&self, tests: &[TestName]) -> Self {
        let mut bottom = Vec::with_capacity(tests.len() + self.bottom.len());
        bottom.extend_from_slice(tests);
        bottom.extend_from_slice(&self.bottom);
        Self {
            top: self.top.clone(),
            bottom,
        }
    }

    /// Returns a copy of these anchors with `tests` held behind the top anchors.
    fn with_top(&self, tests: &[TestName]) -> Self {
        let mut top = self.top.clone();
        top.extend_from_slice(tests);
        Self {
            top,
            bottom: self.bottom.clone(),
        }
    }

    fn contains(&self, test: &TestName) -> bool {
        self.top.contains(test) || self.bottom.contains(test)
    }

    fn pinned(&self) -> Vec<TestName> {
        self.surround(&[])
    }
}

/// Executes `tests` between the anchors, keeping every anchor where it was placed.
fn run_anchored(
    probe: &mut Probe<'_>,
    anchors: &Anchors,
    tests: &[TestName],
) -> Result<Execution, FinderError> {
    probe.run_pinned(&anchors.surround(tests), &anchors.pinned())
}

/// Searches `candidates` for dependencies of the probe's target, recording each one found.
pub(crate) fn solve(
    probe: &mut Probe<'_>,
    kind: SearchKind,
    candidates: &[TestName],
    anchors: &Anchors,
) -> Result<(), FinderError> {
    let known = probe.known_dependencies();
    let mut candidates: Vec<TestName> = candidates
        .iter()
        .filter(|test| {
            *test != probe.target() && !anchors.contains(test) && !known.contains(*test)
        })
        .cloned()
        .collect();

    loop {
        let n = candidates.len();
        match n {
            0 => return Ok(()),
            1 => return verify(probe, kind, &candidates[0], anchors),
            _ => {}
        }

        let bottom = candidates.split_off(n / 2);
        let top = candidates;
        let intended = probe.intended();
        let top_hit = kind.is_hit(run_anchored(probe, anchors, &top)?.outcome, intended);
        let bottom_hit = kind.is_hit(run_anchored(probe, anchors, &bottom)?.outcome, intended);
        trace!(?kind, n, top_hit, bottom_hit, "split candidates");

        candidates = match (top_hit, bottom_hit) {
            (true, false) => top,
            (false, true) => bottom,
            (true, true) => {
                debug!(?kind, n, "both halves reproduce: searching each independently");
                solve(probe, kind, &top, anchors)?;
                if still_needed(probe, kind, &bottom, anchors)? {
                    solve(probe, kind, &bottom, anchors)?;
                }
                return Ok(());
            }
            (false, false) => {
                debug!(?kind, n, "neither half reproduces: searching for a combination");
                let known_before = probe.known_dependencies();
                solve(probe, kind, &top, &anchors.with_bottom(&bottom))?;

                let known_after = probe.known_dependencies();
                let found: Vec<TestName> = top
                    .iter()
                    .filter(|test| known_after.contains(*test) && !known_before.contains(*test))
                    .cloned()
                    .collect();
                if found.is_empty() {
                    solve(probe, kind, &bottom, &anchors.with_top(&top))?;
                } else {
                    // The rest of the combination is searched for next to the part just found.
                    let held = anchors.with_top(&found);
                    let execution = run_anchored(probe, &held, &[])?;
                    if !kind.is_hit(execution.outcome, intended) {
                        solve(probe, kind, &bottom, &held)?;
                    }
                }
                return Ok(());
            }
        };
    }
}

/// Returns true if `rest` must still be searched after dependencies were found elsewhere.
fn still_needed(
    probe: &mut Probe<'_>,
    kind: SearchKind,
    rest: &[TestName],
    anchors: &Anchors,
) -> Result<bool, FinderError> {
    let intended = probe.intended();
    let execution = match kind {
        // Without `rest`, the known dependencies alone must produce the intended outcome.
        SearchKind::Before => run_anchored(probe, anchors, &[])?,
        // With `rest`, the target must no longer be disturbed.
        SearchKind::After => run_anchored(probe, anchors, rest)?,
    };
    Ok(execution.outcome != intended)
}

/// Runs the target with and without `test`, recording `test` if exactly one of the two
/// produces the intended outcome.
fn verify(
    probe: &mut Probe<'_>,
    kind: SearchKind,
    test: &TestName,
    anchors: &Anchors,
) -> Result<(), FinderError> {
    let intended = probe.intended();
    let with = run_anchored(probe, anchors, std::slice::from_ref(test))?;
    let without = run_anchored(probe, anchors, &[])?;

    let (before_tests, after_tests, revealing): (_, _, Execution) =
        match (with.outcome == intended, without.outcome == intended) {
            (true, false) => (BTreeSet::from([test.clone()]), BTreeSet::new(), without),
            (false, true) => (BTreeSet::new(), BTreeSet::from([test.clone()]), with),
            (with_matches, without_matches) => {
                debug!(
                    ?kind,
                    %test,
                    with_matches,
                    without_matches,
                    "candidate did not verify as a dependency"
                );
                return Ok(());
            }
        };

    probe.record(before_tests, after_tests, revealing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::DependencyStore, test_helpers::*};
    use depfinder_metadata::DependencyRecord;
    use fixture_data::models::{FixtureSuite, Rule};
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use test_strategy::proptest;

    fn candidates(count: usize) -> Vec<TestName> {
        (0..count).map(|i| TestName::new(format!("c{i}"))).collect()
    }

    fn solve_all(
        suite: &FixtureSuite,
        kind: SearchKind,
        candidates: &[TestName],
    ) -> Vec<DependencyRecord> {
        let store = DependencyStore::new();
        let oracle = SuiteOracle::new(suite);
        let mut probe = probe_for(&store, &oracle, "target", TestOutcome::Pass);
        solve(&mut probe, kind, candidates, &Anchors::default()).expect("solve succeeded");
        store.records_for("target")
    }

    #[test]
    fn anchors_surround() {
        let anchors = Anchors {
            top: vec!["t".into()],
            bottom: vec!["b".into()],
        }
        .with_bottom(&["x".into()]);
        assert_eq!(
            anchors.surround(&["c".into()]),
            vec![
                TestName::new("t"),
                TestName::new("c"),
                TestName::new("x"),
                TestName::new("b")
            ],
        );
    }

    #[proptest(cases = 64)]
    fn finds_single_planted_dependency(
        #[strategy(1usize..40)] count: usize,
        #[strategy(0..#count)] planted: usize,
        is_before: bool,
    ) {
        let candidates = candidates(count);
        let planted = candidates[planted].clone();
        let (rule, kind) = if is_before {
            (Rule::requires_before("target", [planted.clone()]), SearchKind::Before)
        } else {
            (Rule::broken_by("target", [planted.clone()]), SearchKind::After)
        };
        let suite = FixtureSuite::new(candidates.iter().cloned()).with_rule(rule);

        let records = solve_all(&suite, kind, &candidates);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        if is_before {
            assert_eq!(record.before_tests(), &btreeset! { planted });
            assert!(record.after_tests().is_empty());
        } else {
            assert!(record.before_tests().is_empty());
            assert_eq!(record.after_tests(), &btreeset! { planted });
        }
    }

    #[test]
    fn finds_independent_dependencies_in_both_halves() {
        let candidates = candidates(8);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::broken_by("target", ["c1"]))
            .with_rule(Rule::broken_by("target", ["c6"]));

        let records = solve_all(&suite, SearchKind::After, &candidates);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].after_tests(),
            &btreeset! { "c1".into(), "c6".into() }
        );
    }

    #[test]
    fn finds_combination_across_halves() {
        let candidates = candidates(8);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::requires_before("target", ["c2", "c5"]));

        let store = DependencyStore::new();
        let oracle = SuiteOracle::new(&suite);
        let mut probe = probe_for(&store, &oracle, "target", TestOutcome::Pass);
        solve(&mut probe, SearchKind::Before, &candidates, &Anchors::default()).unwrap();

        let records = store.records_for("target");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].before_tests(),
            &btreeset! { "c2".into(), "c5".into() }
        );
        // Each half was verified on its own, with the other half held fixed.
        assert_eq!(probe.discoveries().len(), 2);
    }

    #[test]
    fn finds_polluter_combination_across_halves() {
        // The target is only disturbed when both c2 and c5 run before it.
        let candidates = candidates(8);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::broken_by("target", ["c2", "c5"]));

        let store = DependencyStore::new();
        let oracle = SuiteOracle::new(&suite);
        let mut probe = probe_for(&store, &oracle, "target", TestOutcome::Pass);
        solve(&mut probe, SearchKind::After, &candidates, &Anchors::default()).unwrap();

        let records = store.records_for("target");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].after_tests(),
            &btreeset! { "c2".into(), "c5".into() }
        );
        assert!(records[0].before_tests().is_empty());
        assert_eq!(probe.discoveries().len(), 2);
        assert_eq!(probe.known_dependencies().len(), 2);
    }

    #[test]
    fn anchors_are_not_moved_by_known_dependencies() {
        let candidates = candidates(2);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::broken_by("target", ["c0", "c1"]));
        let store = DependencyStore::new();
        store.merge(
            DependencyRecord::new(
                "target".into(),
                TestOutcome::Pass,
                BTreeSet::new(),
                btreeset! { "c0".into() },
                TestOutcome::Failure,
                vec!["c0".into(), "c1".into(), "target".into()],
            )
            .unwrap(),
        );

        let oracle = SuiteOracle::new(&suite);
        let mut probe = probe_for(&store, &oracle, "target", TestOutcome::Pass);
        let anchors = Anchors::default().with_top(&["c0".into()]);
        let execution = run_anchored(&mut probe, &anchors, &["c1".into()]).unwrap();
        assert_eq!(
            execution.order,
            vec![TestName::new("c0"), TestName::new("c1"), TestName::new("target")]
        );
        assert_eq!(execution.outcome, TestOutcome::Failure);

        // Unanchored, the known polluter is moved after the target.
        let execution = probe.run(&["c0".into(), "c1".into()]).unwrap();
        assert_eq!(execution.outcome, TestOutcome::Pass);
    }

    #[test]
    fn separate_setups_in_both_halves() {
        let candidates = candidates(4);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::requires_before("target", ["c0"]))
            .with_rule(Rule::requires_before("target", ["c3"]));

        // Each setup is required on its own, and each half holds one of them.
        let records = solve_all(&suite, SearchKind::Before, &candidates);
        assert_eq!(
            records[0].before_tests(),
            &btreeset! { "c0".into(), "c3".into() }
        );
    }

    #[test]
    fn unverified_candidates_are_not_recorded() {
        // The target always fails, so no single test can be verified.
        let candidates = candidates(5);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::requires_before("target", ["not-a-candidate"]));

        let records = solve_all(&suite, SearchKind::Before, &candidates);
        assert!(records.is_empty());
    }

    #[test]
    fn known_dependencies_are_not_candidates() {
        let candidates = candidates(4);
        let suite = FixtureSuite::new(candidates.iter().cloned())
            .with_rule(Rule::broken_by("target", ["c1"]));
        let store = DependencyStore::new();
        store.merge(
            DependencyRecord::new(
                "target".into(),
                TestOutcome::Pass,
                BTreeSet::new(),
                btreeset! { "c1".into() },
                TestOutcome::Failure,
                vec!["c1".into(), "target".into()],
            )
            .unwrap(),
        );

        let oracle = SuiteOracle::new(&suite);
        let mut probe = probe_for(&store, &oracle, "target", TestOutcome::Pass);
        solve(&mut probe, SearchKind::After, &candidates, &Anchors::default()).unwrap();
        assert!(probe.discoveries().is_empty());
    }
}
