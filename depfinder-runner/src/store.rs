// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dependency knowledge shared by all workers.

use depfinder_metadata::{DependencyRecord, TestName};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

/// The result of merging a record into a [`DependencyStore`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeOutcome {
    /// The record was added alongside the target's existing records.
    Added,

    /// The record was merged into an existing record, which gained dependencies.
    Updated,

    /// An existing record already covered every dependency in the record.
    Unchanged,
}

type RecordList = Arc<Mutex<Vec<DependencyRecord>>>;

/// A concurrent mapping from target tests to their dependency records.
///
/// Each target has its own lock, so merges for different targets never wait on each other,
/// while merges for the same target are serialized. The outer map lock is only held long
/// enough to look up or insert a target's entry.
#[derive(Debug, Default)]
pub struct DependencyStore {
    targets: RwLock<HashMap<TestName, RecordList>>,
}

impl DependencyStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `record` into the records for its target.
    ///
    /// A record with the same intended and revealed outcomes as an existing record is merged
    /// into it. Otherwise the record is added as-is.
    pub fn merge(&self, record: DependencyRecord) -> MergeOutcome {
        let list = self.entry(record.target());
        let mut records = list.lock();

        for existing in records.iter_mut() {
            if existing.intended() != record.intended() || existing.revealed() != record.revealed()
            {
                continue;
            }
            // Merging fails only if the union would list a test on both sides of the target.
            // Such a record is kept separately.
            if let Ok(merged) = existing.merge(&record) {
                if merged == *existing {
                    return MergeOutcome::Unchanged;
                }
                *existing = merged;
                return MergeOutcome::Updated;
            }
        }

        records.push(record);
        MergeOutcome::Added
    }

    /// Returns a copy of the records for `target`.
    pub fn records_for(&self, target: &str) -> Vec<DependencyRecord> {
        match self.get(target) {
            Some(list) => list.lock().clone(),
            None => Vec::new(),
        }
    }

    /// Returns every test that `target` is known to depend on, before or after.
    pub fn known_dependencies(&self, target: &str) -> BTreeSet<TestName> {
        let Some(list) = self.get(target) else {
            return BTreeSet::new();
        };
        let records = list.lock();
        records
            .iter()
            .flat_map(|record| record.before_tests().iter().chain(record.after_tests()))
            .cloned()
            .collect()
    }

    /// Returns the targets that require `test` to run after them.
    pub fn dependents_after(&self, test: &str) -> BTreeSet<TestName> {
        self.snapshot()
            .into_iter()
            .filter(|(_, records)| {
                records
                    .iter()
                    .any(|record| record.after_tests().contains(test))
            })
            .map(|(target, _)| target)
            .collect()
    }

    /// Returns the number of targets with at least one record.
    pub fn len(&self) -> usize {
        self.targets
            .read()
            .values()
            .filter(|list| !list.lock().is_empty())
            .count()
    }

    /// Returns true if the store doesn't contain any records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a sorted copy of the store's contents.
    pub fn snapshot(&self) -> BTreeMap<TestName, Vec<DependencyRecord>> {
        let targets = self.targets.read();
        targets
            .iter()
            .filter_map(|(target, list)| {
                let records = list.lock().clone();
                (!records.is_empty()).then(|| (target.clone(), records))
            })
            .collect()
    }

    /// Merges every record in `other` into this store.
    pub fn merge_from(&self, other: &DependencyStore) {
        for records in other.snapshot().into_values() {
            for record in records {
                self.merge(record);
            }
        }
    }

    /// Flattens the store into a list of records, sorted by target.
    pub fn flatten(&self) -> Vec<DependencyRecord> {
        self.snapshot().into_values().flatten().collect()
    }

    // ---
    // Helper methods
    // ---

    fn get(&self, target: &str) -> Option<RecordList> {
        self.targets.read().get(target).cloned()
    }

    fn entry(&self, target: &TestName) -> RecordList {
        if let Some(list) = self.get(target.as_str()) {
            return list;
        }
        self.targets
            .write()
            .entry(target.clone())
            .or_default()
            .clone()
    }
}

impl FromIterator<DependencyRecord> for DependencyStore {
    fn from_iter<I: IntoIterator<Item = DependencyRecord>>(iter: I) -> Self {
        let store = Self::new();
        for record in iter {
            store.merge(record);
        }
        store
    }
}
