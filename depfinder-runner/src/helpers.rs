// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for depfinder-runner.

use depfinder_metadata::TestName;
use itertools::Itertools;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "target" if `count` is 1, otherwise "targets".
    pub fn targets_str(count: usize) -> &'static str {
        if count == 1 { "target" } else { "targets" }
    }

    /// Returns "worker" if `count` is 1, otherwise "workers".
    pub fn workers_str(count: usize) -> &'static str {
        if count == 1 { "worker" } else { "workers" }
    }

    /// Returns "pass" if `count` is 1, otherwise "passes".
    pub fn passes_str(count: usize) -> &'static str {
        if count == 1 { "pass" } else { "passes" }
    }
}

/// Joins test names with commas for display within error messages.
pub(crate) fn display_names(names: &[TestName]) -> String {
    names.iter().join(", ")
}
