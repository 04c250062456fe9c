// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for depfinder.
//!
//! Configuration is read from an embedded default, then from `.config/depfinder.toml` in the
//! workspace root (or an explicitly passed file). Settings are grouped into profiles: every
//! profile inherits from `[profile.default]` and may override any of its keys.

mod imp;
mod worker_count;

pub use imp::*;
pub use worker_count::*;
