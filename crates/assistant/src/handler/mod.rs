// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-message-type request handlers.

pub mod login;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::proto::ProtocolType;
use crate::session::Session;

pub use login::LoginHandler;

/// Successful handler output: the response type and its encoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub kind: ProtocolType,
    pub data: Bytes,
}

/// A failure reported to the client as an error response of type `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub kind: ProtocolType,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: ProtocolType, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for HandlerError {}

/// Handles the inner payload of one request type.
pub trait Handler: Send + Sync {
    fn handle<'a>(
        &'a self,
        session: &'a Session,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send + 'a>>;
}
