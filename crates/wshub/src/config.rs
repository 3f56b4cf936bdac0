// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;

use crate::error::ConnectionError;

/// What a connection does when releasing its transport fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CloseErrorPolicy {
    /// Report the failure through on-error and skip the close notification.
    #[default]
    SuppressClose,
    /// Report the failure through on-error, then still fire on-close.
    NotifyClose,
}

/// Per-connection options, applied uniformly to every accepted connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Outbound buffer capacity in frames.
    pub capacity: usize,
    /// Sliding read deadline, reset by every inbound frame.
    pub read_deadline: Duration,
    /// Deadline for flushing a single outbound frame.
    pub write_deadline: Duration,
    /// Largest accepted inbound data frame in bytes.
    pub read_limit: Option<usize>,
    /// Keepalive ping period. `None` or zero disables pings.
    pub keepalive: Option<Duration>,
    pub close_errors: CloseErrorPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            read_deadline: Duration::from_secs(10),
            write_deadline: Duration::from_secs(10),
            read_limit: None,
            keepalive: None,
            close_errors: CloseErrorPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.capacity == 0 {
            return Err(ConnectionError::InvalidConfig("outbound capacity must be positive"));
        }
        if self.read_deadline.is_zero() {
            return Err(ConnectionError::InvalidConfig("read deadline must be positive"));
        }
        if self.write_deadline.is_zero() {
            return Err(ConnectionError::InvalidConfig("write deadline must be positive"));
        }
        Ok(())
    }

    /// Effective keepalive period, if keepalive is enabled.
    ///
    /// Pings must go out before the peer's own read deadline expires, so a
    /// period at or above the read deadline is pulled down to 80% of it.
    pub fn keepalive_period(&self) -> Option<Duration> {
        let period = self.keepalive.filter(|p| !p.is_zero())?;
        if period >= self.read_deadline {
            Some(self.read_deadline * 4 / 5)
        } else {
            Some(period)
        }
    }
}

/// Cross-origin predicate over the upgrade request headers.
pub type OriginCheck = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Accept-side options for the hub.
#[derive(Clone)]
pub struct HubConfig {
    /// Transport read buffer hint. `None` keeps the transport default.
    pub read_buffer_size: Option<usize>,
    /// Transport write buffer hint. `None` keeps the transport default.
    pub write_buffer_size: Option<usize>,
    /// Largest single frame the transport accepts.
    pub max_frame_size: Option<usize>,
    /// Defaults to accepting every origin, which is only suitable for
    /// trusted deployments.
    pub check_origin: OriginCheck,
    pub connection: ConnectionConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: None,
            write_buffer_size: None,
            max_frame_size: None,
            check_origin: Arc::new(|_| true),
            connection: ConnectionConfig::default(),
        }
    }
}

impl HubConfig {
    /// Only accept upgrades whose `Origin` header is in `allowed`.
    /// Requests without an `Origin` header (non-browser clients) pass.
    pub fn allow_origins(mut self, allowed: Vec<String>) -> Self {
        self.check_origin = Arc::new(move |headers: &HeaderMap| {
            match headers.get("origin").and_then(|v| v.to_str().ok()) {
                Some(origin) => allowed.iter().any(|a| a == origin),
                None => true,
            }
        });
        self
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_frame_size", &self.max_frame_size)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
