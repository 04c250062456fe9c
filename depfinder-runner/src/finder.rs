// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding the dependencies of a single target test.
//!
//! A [`DependencyFinder`] owns one target along with the original and new orders. Its
//! [`run_dtf`](DependencyFinder::run_dtf) method runs search passes until the target's
//! behavior in the new order is explained, or until a pass finds nothing new.

use crate::{
    chains::ChainDecomposition,
    errors::{FinderError, VerificationError, VerificationErrorKind},
    helpers::plural,
    oracle::SlotOracle,
    order::TestOrder,
    probe::Probe,
    solver::{Anchors, SearchKind, solve},
    store::DependencyStore,
};
use depfinder_metadata::{DependencyRecord, TestName, TestOutcome};
use serde::Serialize;
use tracing::{debug, info};

/// Limits on the search effort spent on a single target.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FinderSettings {
    /// The maximum number of search passes. `None` means passes continue for as long as each
    /// one finds something new.
    pub max_passes: Option<usize>,

    /// The maximum number of chains merged into one chain-search candidate. `None` means all
    /// chains may be merged.
    pub max_chain_combination: Option<usize>,
}

/// Why a target's behavior in the new order is explained.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Explanation {
    /// The target test.
    pub target: TestName,

    /// The outcome of the target in the original order.
    pub intended: TestOutcome,

    /// False if the target had its intended outcome in the new order, so nothing needed
    /// explaining.
    pub order_dependent: bool,

    /// The number of search passes that were run.
    pub passes: usize,

    /// The number of oracle calls issued for this target, including building its prime order.
    pub oracle_calls: usize,

    /// Single-test dependencies in the order they were verified.
    pub discoveries: Vec<DependencyRecord>,

    /// The target's records in the store once the search finished.
    pub records: Vec<DependencyRecord>,
}

/// Searches for the dependencies of one target test.
#[derive(Debug)]
pub struct DependencyFinder<'a> {
    original: &'a TestOrder,
    new: &'a TestOrder,
    prime: TestOrder,
    revealed: TestOutcome,
    probe: Probe<'a>,
    settings: FinderSettings,
    calls_at_start: usize,
}

impl<'a> DependencyFinder<'a> {
    /// Creates a finder for `target`. This executes the prime order once.
    pub fn new(
        target: TestName,
        original: &'a TestOrder,
        new: &'a TestOrder,
        store: &'a DependencyStore,
        oracle: SlotOracle<'a>,
        settings: FinderSettings,
    ) -> Result<Self, FinderError> {
        let (intended, revealed) = outcomes_for(&target, original, new)?;
        let calls_at_start = oracle.calls();
        let mut probe = Probe::new(target, intended, store, oracle);
        let prime = execute_prime(&mut probe, original, new)?;

        Ok(Self {
            original,
            new,
            prime,
            revealed,
            probe,
            settings,
            calls_at_start,
        })
    }

    /// Points this finder at another target, reusing the original and new orders.
    ///
    /// Only the prime order for `target` is executed.
    pub fn retarget(&mut self, target: TestName) -> Result<(), FinderError> {
        let (intended, revealed) = outcomes_for(&target, self.original, self.new)?;
        self.calls_at_start = self.probe.oracle_calls();
        self.probe.retarget(target, intended);
        self.prime = execute_prime(&mut self.probe, self.original, self.new)?;
        self.revealed = revealed;
        Ok(())
    }

    /// Returns the target test.
    pub fn target(&self) -> &TestName {
        self.probe.target()
    }

    /// Returns the outcome of the target in the original order.
    pub fn intended(&self) -> TestOutcome {
        self.probe.intended()
    }

    /// Returns the outcome of the target in the new order.
    pub fn revealed(&self) -> TestOutcome {
        self.revealed
    }

    /// Returns the prime order built for the target.
    pub fn prime_order(&self) -> &TestOrder {
        &self.prime
    }

    /// Runs search passes until the target's behavior in the new order is explained.
    ///
    /// Each pass either extends what is known about the target or ends the search with a
    /// [`VerificationError`]. After a pass that made progress, the new order's prefix is executed
    /// again with all known dependencies honored: once the target no longer reproduces the
    /// outcome it had in the new order, the search is done.
    pub fn run_dtf(&mut self) -> Result<Explanation, FinderError> {
        let target = self.probe.target().clone();
        let intended = self.probe.intended();
        if self.revealed == intended {
            debug!(target_test = %target, outcome = %intended, "target is not order-dependent");
            return Ok(self.explanation(false, 0));
        }

        let (original, new) = (self.original, self.new);
        let original_prefix = original.tests_before(target.as_str()).unwrap_or(&[]);
        let new_prefix = new.tests_before(target.as_str()).unwrap_or(&[]);

        let mut passes = 0;
        loop {
            let known = self.probe.known_dependencies().len();
            if known > 0 {
                let recheck = self.probe.run(new_prefix)?;
                if recheck.outcome != self.revealed {
                    info!(
                        target_test = %target,
                        passes,
                        "explained with {known} {}",
                        plural::tests_str(known),
                    );
                    return Ok(self.explanation(true, passes));
                }
                debug!(
                    target_test = %target,
                    outcome = %recheck.outcome,
                    "target still reproduces its revealed outcome with known dependencies honored"
                );
            }

            if self.settings.max_passes.is_some_and(|max| passes >= max) {
                return Err(VerificationError::new(
                    target,
                    passes,
                    VerificationErrorKind::PassLimitReached,
                )
                .into());
            }
            passes += 1;

            if known > 0 {
                self.chain_search(new_prefix)?;
            } else {
                self.bisect(original_prefix, new_prefix)?;
            }

            if self.probe.known_dependencies().len() == known {
                return Err(
                    VerificationError::new(target, passes, VerificationErrorKind::NoProgress)
                        .into(),
                );
            }
        }
    }

    // ---
    // Helper methods
    // ---

    /// Picks the prefixes to search using the prime order, then bisects them.
    fn bisect(
        &mut self,
        original_prefix: &[TestName],
        new_prefix: &[TestName],
    ) -> Result<(), FinderError> {
        let intended = self.probe.intended();
        let prime_outcome = self.prime.outcome(self.probe.target().as_str());
        let anchors = Anchors::default();

        if prime_outcome == Some(intended) {
            debug!(
                target_test = %self.probe.target(),
                "prime order has the intended outcome: searching original prefix"
            );
            return solve(&mut self.probe, SearchKind::Before, original_prefix, &anchors);
        }

        let isolated = self.probe.run(&[])?;
        if isolated.outcome == intended {
            debug!(
                target_test = %self.probe.target(),
                "isolated target has the intended outcome: searching new prefix"
            );
            return solve(&mut self.probe, SearchKind::After, new_prefix, &anchors);
        }

        // The target is anomalous on its own, so it needs something from the original prefix.
        // Tests from the new prefix may additionally disturb it once that is in place.
        debug!(target_test = %self.probe.target(), "searching both prefixes");
        solve(&mut self.probe, SearchKind::Before, original_prefix, &anchors)?;
        solve(&mut self.probe, SearchKind::After, new_prefix, &anchors)
    }

    /// Searches merged chains of the new prefix, stopping at the first candidate that yields a
    /// dependency.
    fn chain_search(&mut self, new_prefix: &[TestName]) -> Result<(), FinderError> {
        let intended = self.probe.intended();
        let known = self.probe.known_dependencies();
        let decomposition = ChainDecomposition::new(new_prefix, self.probe.target(), &known);
        debug!(
            target_test = %self.probe.target(),
            chains = decomposition.len(),
            "starting chain search"
        );

        let baseline = self.probe.run(&[])?;
        let anchors = Anchors::default();
        for candidate in decomposition.subsequences(self.settings.max_chain_combination) {
            let execution = self.probe.run(&candidate)?;
            let kind = if execution.outcome != intended {
                SearchKind::After
            } else if baseline.outcome != intended {
                SearchKind::Before
            } else {
                continue;
            };

            solve(&mut self.probe, kind, &candidate, &anchors)?;
            if self.probe.known_dependencies().len() > known.len() {
                return Ok(());
            }
        }

        debug!(target_test = %self.probe.target(), "chain search exhausted");
        Ok(())
    }

    fn explanation(&self, order_dependent: bool, passes: usize) -> Explanation {
        Explanation {
            target: self.probe.target().clone(),
            intended: self.probe.intended(),
            order_dependent,
            passes,
            oracle_calls: self.probe.oracle_calls() - self.calls_at_start,
            discoveries: self.probe.discoveries().to_vec(),
            records: self.probe.records(),
        }
    }
}

fn outcomes_for(
    target: &TestName,
    original: &TestOrder,
    new: &TestOrder,
) -> Result<(TestOutcome, TestOutcome), FinderError> {
    let not_in = |which| FinderError::TargetNotInOrder {
        target: target.clone(),
        which,
    };
    let intended = original
        .outcome(target.as_str())
        .ok_or_else(|| not_in("original"))?;
    let revealed = new.outcome(target.as_str()).ok_or_else(|| not_in("new"))?;
    Ok((intended, revealed))
}

fn execute_prime(
    probe: &mut Probe<'_>,
    original: &TestOrder,
    new: &TestOrder,
) -> Result<TestOrder, FinderError> {
    let target = probe.target().clone();
    // Both orders were checked to contain the target.
    let tests = TestOrder::prime(original, new, target.as_str()).unwrap_or_default();
    TestOrder::execute(tests, probe.oracle_mut())
        .map_err(|err| FinderError::Oracle { target, err })
}
