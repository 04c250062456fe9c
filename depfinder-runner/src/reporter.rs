// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summaries of a batch run over many targets.

use crate::{
    errors::{DisplayErrorChain, FinderError, VerificationErrorKind},
    finder::Explanation,
};
use depfinder_metadata::{DependencyRecord, TestName};
use itertools::Itertools;
use serde::Serialize;

/// The result of running a [`WorkerPool`](crate::pool::WorkerPool) over a set of targets.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchReport {
    /// Targets whose behavior in the new order was explained, sorted by target.
    pub explained: Vec<Explanation>,

    /// Targets whose search failed, sorted by target.
    pub unexplained: Vec<UnexplainedTarget>,

    /// Every record in the store once the batch finished.
    pub records: Vec<DependencyRecord>,
}

impl BatchReport {
    pub(crate) fn finish(&mut self, records: Vec<DependencyRecord>) {
        self.explained.sort_by(|a, b| a.target.cmp(&b.target));
        self.unexplained.sort_by(|a, b| a.target.cmp(&b.target));
        self.records = records;
    }

    /// Returns true if every target was explained.
    pub fn is_success(&self) -> bool {
        self.unexplained.is_empty()
    }

    /// Returns the number of targets that were order-dependent and explained.
    pub fn order_dependent_count(&self) -> usize {
        self.explained.iter().filter(|e| e.order_dependent).count()
    }

    /// Serializes this report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Returns every record in its text form, separated by blank lines.
    pub fn records_text(&self) -> String {
        self.records.iter().join("\n\n")
    }
}

/// A target whose search failed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnexplainedTarget {
    /// The target test.
    pub target: TestName,

    /// Why the search failed.
    pub kind: UnexplainedKind,

    /// The full error message, including its sources.
    pub message: String,
}

impl UnexplainedTarget {
    pub(crate) fn new(target: TestName, err: &FinderError) -> Self {
        let kind = match err {
            FinderError::Verification(err) => match err.kind() {
                VerificationErrorKind::NoProgress => UnexplainedKind::NoProgress,
                VerificationErrorKind::PassLimitReached => UnexplainedKind::PassLimitReached,
            },
            FinderError::TargetNotInOrder { .. } => UnexplainedKind::NotInOrder,
            FinderError::Oracle { .. } => UnexplainedKind::Oracle,
            FinderError::Record { .. } => UnexplainedKind::Record,
        };
        Self {
            target,
            kind,
            message: DisplayErrorChain::new(err).to_string(),
        }
    }
}

/// The category of an [`UnexplainedTarget`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnexplainedKind {
    /// A search pass found no new dependencies.
    NoProgress,

    /// The maximum number of search passes was reached.
    PassLimitReached,

    /// The target is missing from one of the orders.
    NotInOrder,

    /// The oracle failed.
    Oracle,

    /// A discovered dependency couldn't be recorded.
    Record,
}
