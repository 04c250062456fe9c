// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{borrow::Borrow, fmt};

/// The identifier of a single test within a suite.
///
/// Test names are cheap to clone: the finder copies them into a large number of candidate
/// orders while bisecting.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TestName(SmolStr);

impl TestName {
    /// Creates a new `TestName`.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name.as_ref()))
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if this name can be written out in the textual record format and read
    /// back unchanged.
    ///
    /// Such names are non-empty and don't contain line breaks. Separators and brackets inside
    /// a name are escaped when it is written as part of a list.
    pub fn is_portable(&self) -> bool {
        let name = self.as_str();
        !name.is_empty() && !name.contains(['\n', '\r'])
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Borrow<str> for TestName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for TestName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for TestName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TestName {
    fn from(name: String) -> Self {
        Self(SmolStr::from(name))
    }
}

impl PartialEq<str> for TestName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TestName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
