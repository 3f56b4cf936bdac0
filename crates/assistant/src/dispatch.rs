// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routes decoded envelopes to their handlers and answers every well-formed
//! or malformed frame with exactly one response.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use wshub::{Client, ConnectionError, HubHandler};

use crate::envelope;
use crate::handler::Handler;
use crate::proto::{BaseResponse, ProtocolType};
use crate::session::Session;

pub const INVALID_REQUEST: &str = "Invalid request format";
pub const UNKNOWN_PROTOCOL: &str = "Unknown protocol type";

/// Terminal state reached by one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HandlerSucceeded,
    HandlerFailed,
    UnknownType,
    DecodeFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandlerSucceeded => "HANDLER_SUCCEEDED",
            Self::HandlerFailed => "HANDLER_FAILED",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::DecodeFailed => "DECODE_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub outcome: Outcome,
    pub response: BaseResponse,
}

/// Handler table keyed by the envelope's raw type tag.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<i32, Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any earlier registration.
    pub fn register(mut self, kind: ProtocolType, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(kind as i32, Box::new(handler));
        self
    }

    /// Run one frame through decode, routing, and the handler, producing the
    /// response to send.
    pub async fn dispatch(&self, session: &Session, raw: &[u8]) -> Dispatched {
        let request = match envelope::decode_request(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(conn = session.id(), err = %e, "undecodable envelope");
                return Dispatched {
                    outcome: Outcome::DecodeFailed,
                    response: envelope::error(ProtocolType::Unknown as i32, INVALID_REQUEST),
                };
            }
        };

        let Some(handler) = self.handlers.get(&request.r#type) else {
            warn!(conn = session.id(), kind = request.r#type, "unknown protocol type");
            return Dispatched {
                outcome: Outcome::UnknownType,
                response: envelope::error(request.r#type, UNKNOWN_PROTOCOL),
            };
        };

        debug!(conn = session.id(), kind = request.r#type, len = request.data.len(), "routing request");
        match handler.handle(session, request.data).await {
            Ok(reply) => Dispatched {
                outcome: Outcome::HandlerSucceeded,
                response: envelope::success(reply.kind, reply.data),
            },
            Err(e) => Dispatched {
                outcome: Outcome::HandlerFailed,
                response: envelope::error(e.kind as i32, e.message),
            },
        }
    }

    /// Dispatch one frame and queue its response on the session.
    pub async fn handle_message(&self, session: &Session, raw: &[u8]) -> Outcome {
        let Dispatched { outcome, response } = self.dispatch(session, raw).await;
        if let Err(e) = session.send_binary(envelope::encode_response(&response)) {
            warn!(conn = session.id(), err = %e, outcome = outcome.as_str(), "response dropped");
        }
        outcome
    }
}

impl HubHandler<Session> for Dispatcher {
    fn on_open(&self, session: &Arc<Session>) {
        info!(conn = session.id(), "client connected");
    }

    fn on_message<'a>(
        &'a self,
        session: &'a Arc<Session>,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.handle_message(session, &payload).await;
        })
    }

    fn on_close(&self, session: &Arc<Session>) {
        info!(conn = session.id(), user_id = ?session.user_id(), "client disconnected");
    }

    fn on_error(&self, session: Option<&Arc<Session>>, err: &ConnectionError) {
        match session {
            Some(session) => warn!(conn = session.id(), code = err.as_str(), err = %err, "connection error"),
            None => warn!(code = err.as_str(), err = %err, "websocket accept failed"),
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
