// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::get_num_cpus, errors::WorkerCountParseError};
use serde::{Deserialize, de::Error as _};
use std::{fmt, str::FromStr};

const NUM_CPUS: &str = "num-cpus";

/// The number of workers in a pool, as written in a profile.
///
/// A positive integer is used as is. A negative integer is subtracted from the logical CPU
/// count, leaving at least one worker. Zero is rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerCount {
    /// Run exactly this many workers.
    Count(usize),

    /// Run one worker per logical CPU.
    NumCpus,
}

impl WorkerCount {
    /// Resolves this value to a worker count.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(workers) => workers,
            Self::NumCpus => get_num_cpus(),
        }
    }

    fn from_signed(value: i64) -> Option<Self> {
        match value {
            0 => None,
            1.. => usize::try_from(value).ok().map(Self::Count),
            _ => {
                let reserved = usize::try_from(value.unsigned_abs()).unwrap_or(usize::MAX);
                Some(Self::Count(get_num_cpus().saturating_sub(reserved).max(1)))
            }
        }
    }
}

impl FromStr for WorkerCount {
    type Err = WorkerCountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NUM_CPUS {
            return Ok(Self::NumCpus);
        }
        s.parse::<i64>()
            .ok()
            .and_then(Self::from_signed)
            .ok_or_else(|| WorkerCountParseError::new(s))
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(workers) => write!(f, "{workers}"),
            Self::NumCpus => f.write_str(NUM_CPUS),
        }
    }
}

/// The raw forms accepted for `workers`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawWorkerCount {
    Integer(i64),
    Named(String),
}

impl<'de> Deserialize<'de> for WorkerCount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let parsed = match RawWorkerCount::deserialize(deserializer)? {
            RawWorkerCount::Integer(value) => Self::from_signed(value),
            RawWorkerCount::Named(name) if name == NUM_CPUS => Some(Self::NumCpus),
            RawWorkerCount::Named(_) => None,
        };
        parsed.ok_or_else(|| {
            D::Error::custom(format!(
                "expected a non-zero integer or the string \"{NUM_CPUS}\""
            ))
        })
    }
}
