// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by depfinder.

use crate::helpers::{display_names, plural};
use camino::Utf8PathBuf;
use config::ConfigError;
use depfinder_metadata::{InvalidRecordError, TestName};
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse depfinder config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a profile was requested but not known to depfinder.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurs while parsing a [`WorkerCount`](crate::config::WorkerCount) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for workers: {input}\n(hint: use a non-zero integer or \"num-cpus\")")]
pub struct WorkerCountParseError {
    input: String,
}

impl WorkerCountParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error returned while constructing a [`TestOrder`](crate::order::TestOrder).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum OrderError {
    /// A test appears more than once in the order.
    #[error("test `{test}` appears more than once in the order")]
    DuplicateTest {
        /// The repeated test.
        test: TestName,
    },

    /// Pre-computed outcomes don't match the tests in the order.
    #[error(
        "pre-computed outcomes don't match the order: missing [{}], unexpected [{}]",
        display_names(.missing),
        display_names(.unexpected),
    )]
    OutcomeMismatch {
        /// Tests in the order without an outcome.
        missing: Vec<TestName>,

        /// Outcomes for tests that aren't in the order.
        unexpected: Vec<TestName>,
    },
}

/// An error reported by, or detected around, an
/// [`ExecutionOracle`](crate::oracle::ExecutionOracle) invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    /// The oracle omitted requested tests or reported tests that weren't requested.
    #[error(
        "oracle on worker slot {slot} returned inconsistent outcomes: \
         missing [{}], unexpected [{}]",
        display_names(.missing),
        display_names(.unexpected),
    )]
    Inconsistent {
        /// The worker slot the oracle ran on.
        slot: usize,

        /// Requested tests without an outcome.
        missing: Vec<TestName>,

        /// Outcomes for tests that weren't requested.
        unexpected: Vec<TestName>,
    },

    /// The oracle failed to execute the order.
    #[error("oracle on worker slot {slot} failed to execute order")]
    Exec {
        /// The worker slot the oracle ran on.
        slot: usize,

        /// The underlying error.
        #[source]
        err: Box<dyn error::Error + Send + Sync>,
    },

    /// A scratch file couldn't be removed while resetting a worker slot.
    #[error("error resetting scratch file `{path}` for worker slot {slot}")]
    ScratchCleanup {
        /// The worker slot being reset.
        slot: usize,

        /// The scratch file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

impl OracleError {
    /// Creates an [`OracleError::Exec`] from an oracle's own error.
    pub fn exec(slot: usize, err: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        Self::Exec {
            slot,
            err: err.into(),
        }
    }
}

/// The reason a target's order-dependent behavior couldn't be explained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum VerificationErrorKind {
    /// A search pass added no new dependencies for the target.
    NoProgress,

    /// The configured bound on search passes was reached.
    PassLimitReached,
}

impl fmt::Display for VerificationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProgress => write!(f, "a search pass found no new dependencies"),
            Self::PassLimitReached => write!(f, "the maximum number of search passes was reached"),
        }
    }
}

/// A target's order-dependent behavior couldn't be explained with the available search effort.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error(
    "unable to explain order-dependent behavior of `{target}` after {passes} {}: {kind}",
    plural::passes_str(*.passes),
)]
pub struct VerificationError {
    target: TestName,
    passes: usize,
    kind: VerificationErrorKind,
}

impl VerificationError {
    pub(crate) fn new(target: TestName, passes: usize, kind: VerificationErrorKind) -> Self {
        Self {
            target,
            passes,
            kind,
        }
    }

    /// Returns the target test.
    pub fn target(&self) -> &TestName {
        &self.target
    }

    /// Returns the number of search passes that were run.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Returns the reason the search stopped.
    pub fn kind(&self) -> VerificationErrorKind {
        self.kind
    }
}

/// An error that stops the search for a single target.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FinderError {
    /// The target isn't part of one of the orders.
    #[error("target `{target}` is not part of the {which} order")]
    TargetNotInOrder {
        /// The target test.
        target: TestName,

        /// Which order the target is missing from.
        which: &'static str,
    },

    /// The oracle failed or returned inconsistent outcomes.
    #[error("error executing an order while searching for dependencies of `{target}`")]
    Oracle {
        /// The target test.
        target: TestName,

        /// The underlying error.
        #[source]
        err: OracleError,
    },

    /// A discovered dependency couldn't be recorded.
    #[error("discovered dependency of `{target}` can't be recorded")]
    Record {
        /// The target test.
        target: TestName,

        /// The underlying error.
        #[source]
        err: InvalidRecordError,
    },

    /// The target's behavior couldn't be explained.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// An error that occurs while preparing the original and new orders for a batch run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PrepareError {
    /// The order is malformed.
    #[error("the {which} order is invalid")]
    Order {
        /// Which order was being prepared.
        which: &'static str,

        /// The underlying error.
        #[source]
        err: OrderError,
    },

    /// Executing the order failed.
    #[error("error executing the {which} order")]
    Oracle {
        /// Which order was being prepared.
        which: &'static str,

        /// The underlying error.
        #[source]
        err: OracleError,
    },
}

/// An error that occurs while building the worker pool.
#[derive(Debug, Error)]
#[error("error building worker pool with {workers} {}", plural::workers_str(*.workers))]
pub struct PoolBuildError {
    workers: usize,
    #[source]
    err: rayon::ThreadPoolBuildError,
}

impl PoolBuildError {
    pub(crate) fn new(workers: usize, err: rayon::ThreadPoolBuildError) -> Self {
        Self { workers, err }
    }
}

/// Displays an error along with its chain of sources, separated by `: `.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
