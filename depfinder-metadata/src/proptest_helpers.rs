// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{DependencyRecord, TestName, TestOutcome};
use proptest::{collection::btree_set, prelude::*};

impl TestName {
    /// Returns a strategy that generates portable test names, including names with list
    /// syntax and surrounding spaces.
    #[doc(hidden)]
    pub fn strategy() -> impl Strategy<Value = Self> {
        r"[a-z ][a-z0-9_:, \[\]\\]{0,12}".prop_map(TestName::from)
    }
}

impl Arbitrary for TestOutcome {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        prop_oneof![
            Just(TestOutcome::Pass),
            Just(TestOutcome::Failure),
            Just(TestOutcome::Error),
        ]
        .boxed()
    }
}

impl Arbitrary for DependencyRecord {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        (
            TestName::strategy(),
            any::<TestOutcome>(),
            btree_set(TestName::strategy(), 0..4),
            btree_set(TestName::strategy(), 0..4),
            any::<TestOutcome>(),
            any::<prop::sample::Index>(),
        )
            .prop_filter_map(
                "record invariants",
                |(target, intended, before, after, revealed, split)| {
                    // Drop overlapping and self-referencing names instead of rejecting the
                    // whole case.
                    let after = after
                        .into_iter()
                        .filter(|test| !before.contains(test) && *test != target)
                        .collect();
                    let before: std::collections::BTreeSet<_> =
                        before.into_iter().filter(|test| *test != target).collect();

                    let mut order: Vec<_> = before.iter().cloned().collect();
                    order.insert(split.index(order.len() + 1), target.clone());

                    DependencyRecord::new(target, intended, before, after, revealed, order).ok()
                },
            )
            .boxed()
    }
}
