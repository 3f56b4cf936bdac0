// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Business logic behind the protocol handlers.

pub mod lab;
pub mod user;

use std::time::{SystemTime, UNIX_EPOCH};

pub use lab::LabService;
pub use user::UserService;

/// Seconds since the Unix epoch, used for record timestamps.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or_default()
}
