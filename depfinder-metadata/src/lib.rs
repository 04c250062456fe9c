// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the findings of depfinder.
//!
//! depfinder localizes order-dependent tests: tests whose outcome changes depending on which
//! other tests ran before or after them. This crate contains the data model shared between
//! the finder and its reporting collaborators:
//!
//! * [`TestOutcome`], the result of executing a single test.
//! * [`DependencyRecord`], one discovered dependency of a target test, along with its fixed
//!   six-line textual form.

mod errors;
mod outcome;
#[cfg(any(test, feature = "proptest1"))]
mod proptest_helpers;
mod record;
mod test_name;

pub use errors::*;
pub use outcome::*;
pub use record::*;
pub use test_name::*;
