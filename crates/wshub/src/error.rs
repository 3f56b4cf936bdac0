// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::time::Duration;

/// Transport-level failures. Every variant is terminal for the connection
/// it was raised on, and is delivered through the error callback.
#[derive(Debug)]
pub enum ConnectionError {
    /// The HTTP upgrade was rejected or failed mid-handshake.
    Upgrade(String),
    /// The cross-origin predicate refused the request.
    OriginRejected(Option<String>),
    /// The connection options cannot produce a working connection.
    InvalidConfig(&'static str),
    /// Nothing arrived from the peer before the read deadline.
    ReadTimeout(Duration),
    /// A frame could not be flushed before the write deadline.
    WriteTimeout(Duration),
    /// An inbound data frame exceeded the configured read limit.
    ReadLimit { size: usize, limit: usize },
    Read(axum::Error),
    Write(axum::Error),
    /// Releasing the transport failed.
    Close(axum::Error),
}

impl ConnectionError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upgrade(_) => "UPGRADE",
            Self::OriginRejected(_) => "ORIGIN_REJECTED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ReadTimeout(_) => "READ_TIMEOUT",
            Self::WriteTimeout(_) => "WRITE_TIMEOUT",
            Self::ReadLimit { .. } => "READ_LIMIT",
            Self::Read(_) => "READ",
            Self::Write(_) => "WRITE",
            Self::Close(_) => "CLOSE",
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade(reason) => write!(f, "websocket upgrade failed: {reason}"),
            Self::OriginRejected(Some(origin)) => write!(f, "origin not allowed: {origin}"),
            Self::OriginRejected(None) => f.write_str("origin not allowed: <none>"),
            Self::InvalidConfig(reason) => write!(f, "invalid connection config: {reason}"),
            Self::ReadTimeout(after) => write!(f, "read deadline exceeded after {after:?}"),
            Self::WriteTimeout(after) => write!(f, "write deadline exceeded after {after:?}"),
            Self::ReadLimit { size, limit } => {
                write!(f, "inbound frame of {size} bytes exceeds limit of {limit}")
            }
            Self::Read(e) => write!(f, "read error: {e}"),
            Self::Write(e) => write!(f, "write error: {e}"),
            Self::Close(e) => write!(f, "close error: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) | Self::Write(e) | Self::Close(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejection of a non-blocking send. Reported to the caller only; the
/// connection itself stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The outbound buffer is at capacity.
    Full,
    /// The connection has been torn down.
    Closed,
}

impl SendError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "send buffer is full",
            Self::Closed => "connection is closed",
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for SendError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
