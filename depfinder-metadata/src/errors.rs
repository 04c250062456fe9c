// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestName, TestOutcome};
use thiserror::Error;

/// Error returned while parsing a [`TestOutcome`] from a string.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error(
    "unrecognized test outcome: {input}\n(known values: {})",
    TestOutcome::variants().join(", "),
)]
pub struct TestOutcomeParseError {
    input: String,
}

impl TestOutcomeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// A [`DependencyRecord`](crate::DependencyRecord) could not be constructed because it would
/// violate one of its invariants.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidRecordError {
    /// Neither before-tests nor after-tests were provided.
    #[error("dependency record for `{target}` has no before-tests and no after-tests")]
    NoDependencies {
        /// The target test.
        target: TestName,
    },

    /// The target test lists itself as a dependency.
    #[error("dependency record for `{target}` lists the target as its own dependency")]
    SelfDependency {
        /// The target test.
        target: TestName,
    },

    /// A test appears both as a before-test and as an after-test.
    #[error("dependency record for `{target}` lists `{test}` as both a before-test and an after-test")]
    Conflicting {
        /// The target test.
        target: TestName,

        /// The test present in both sets.
        test: TestName,
    },

    /// A test name can't be represented in the textual record format.
    #[error("test name `{name}` can't be represented in a dependency record")]
    InvalidTestName {
        /// The offending name.
        name: TestName,
    },
}

/// An error that occurs while merging two dependency records.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum RecordMergeError {
    /// The records describe different target tests.
    #[error("cannot merge dependency records for different targets `{left}` and `{right}`")]
    TargetMismatch {
        /// The target of the record being merged into.
        left: TestName,

        /// The target of the other record.
        right: TestName,
    },

    /// The records disagree about the intended outcome of the target.
    #[error(
        "cannot merge dependency records for `{target}`: intended outcomes differ \
         ({left} vs {right})"
    )]
    IntendedMismatch {
        /// The target test.
        target: TestName,

        /// The intended outcome of the record being merged into.
        left: TestOutcome,

        /// The intended outcome of the other record.
        right: TestOutcome,
    },

    /// The merged record would be invalid.
    #[error("merged dependency record is invalid")]
    Invalid(#[source] InvalidRecordError),
}

/// An error that occurs while parsing a [`DependencyRecord`](crate::DependencyRecord) from its
/// textual form.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum RecordParseError {
    /// The input didn't have exactly six lines.
    #[error("expected {expected} lines in dependency record, found {actual}")]
    LineCount {
        /// The expected number of lines.
        expected: usize,

        /// The actual number of lines.
        actual: usize,
    },

    /// A line was missing the `": "` separator between its label and its value.
    #[error("line {line} of dependency record is missing the `: ` separator")]
    MissingSeparator {
        /// The line number, starting from 1.
        line: usize,
    },

    /// A line had an unexpected label.
    #[error("line {line} of dependency record: expected label `{expected}`, found `{actual}`")]
    UnexpectedLabel {
        /// The line number, starting from 1.
        line: usize,

        /// The label that was expected on this line.
        expected: &'static str,

        /// The label actually found.
        actual: String,
    },

    /// An outcome couldn't be parsed.
    #[error("line {line} of dependency record has an invalid outcome")]
    Outcome {
        /// The line number, starting from 1.
        line: usize,

        /// The underlying error.
        #[source]
        err: TestOutcomeParseError,
    },

    /// A list of tests wasn't enclosed in `[` and `]`, or contained an empty entry.
    #[error("line {line} of dependency record has a malformed test list: `{value}`")]
    MalformedList {
        /// The line number, starting from 1.
        line: usize,

        /// The value that failed to parse.
        value: String,
    },

    /// The parsed fields don't form a valid record.
    #[error("parsed dependency record is invalid")]
    Invalid(#[source] InvalidRecordError),
}
