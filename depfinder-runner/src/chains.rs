// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting an order into chains around known dependencies.
//!
//! Once some dependencies of a target are known, the rest of the order is cut at the positions
//! of those dependencies. Each maximal run of tests between two cuts is a chain. Chains are then
//! merged into candidate lists, fewest chains first, for a fallback search.

use depfinder_metadata::TestName;
use itertools::{Combinations, Itertools};
use std::{collections::BTreeSet, ops::Range};

/// An order split into chains at the positions of known dependencies.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainDecomposition {
    chains: Vec<Vec<TestName>>,
}

impl ChainDecomposition {
    /// Splits `order` into chains. `target` and every test in `known` act as separators and are
    /// not part of any chain.
    pub fn new(order: &[TestName], target: &TestName, known: &BTreeSet<TestName>) -> Self {
        let chains = order
            .split(|test| test == target || known.contains(test))
            .filter(|chain| !chain.is_empty())
            .map(<[TestName]>::to_vec)
            .collect();
        Self { chains }
    }

    /// Returns the chains, in order.
    pub fn chains(&self) -> &[Vec<TestName>] {
        &self.chains
    }

    /// Returns the number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Returns true if there are no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Returns a lazy sequence of candidate lists, each made of up to `max_combination` chains
    /// concatenated in order.
    ///
    /// Single chains come first, then pairs, and so on. `None` allows every chain to be merged.
    pub fn subsequences(&self, max_combination: Option<usize>) -> ChainSubsequences<'_> {
        let n = self.chains.len();
        let max_k = max_combination.map_or(n, |max| max.min(n));
        ChainSubsequences {
            chains: &self.chains,
            k: 1,
            max_k,
            current: (0..n).combinations(1),
        }
    }
}

/// Iterator over merged chain subsequences, returned by [`ChainDecomposition::subsequences`].
///
/// Nothing is computed ahead of time: each candidate list is built when it is requested. Clone
/// the iterator to restart from the current position.
#[derive(Clone, Debug)]
pub struct ChainSubsequences<'a> {
    chains: &'a [Vec<TestName>],
    k: usize,
    max_k: usize,
    current: Combinations<Range<usize>>,
}

impl Iterator for ChainSubsequences<'_> {
    type Item = Vec<TestName>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.k > self.max_k {
                return None;
            }
            if let Some(indexes) = self.current.next() {
                return Some(
                    indexes
                        .into_iter()
                        .flat_map(|index| self.chains[index].iter().cloned())
                        .collect(),
                );
            }
            self.k += 1;
            self.current = (0..self.chains.len()).combinations(self.k);
        }
    }
}
