// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TestOutcomeParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The outcome of a single test within one execution of an order.
///
/// Outcomes are only ever compared for equality: there is no ranking between them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    /// The test passed.
    Pass,

    /// An assertion in the test failed.
    Failure,

    /// The test raised an unexpected error.
    Error,
}

impl TestOutcome {
    /// Returns the string representations of all known outcomes.
    pub fn variants() -> [&'static str; 3] {
        ["PASS", "FAILURE", "ERROR"]
    }

    /// Returns the textual form used in dependency records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Failure => "FAILURE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestOutcome {
    type Err = TestOutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Self::Pass),
            "FAILURE" => Ok(Self::Failure),
            "ERROR" => Ok(Self::Error),
            other => Err(TestOutcomeParseError::new(other)),
        }
    }
}
