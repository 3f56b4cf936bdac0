// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use tracing::{info, warn};
use wshub::Client;

use super::{Handler, HandlerError, Reply};
use crate::proto::{LoginRequest, ProtocolType};
use crate::service::UserService;
use crate::session::Session;

pub const INVALID_LOGIN_REQUEST: &str = "Invalid login request format";

/// Exchanges a mini-program login code for a user and lab assignment.
pub struct LoginHandler {
    users: Arc<UserService>,
}

impl LoginHandler {
    pub fn new(users: Arc<UserService>) -> Self {
        Self { users }
    }

    async fn login(&self, session: &Session, payload: Bytes) -> Result<Reply, HandlerError> {
        let request = LoginRequest::decode(payload).map_err(|e| {
            warn!(conn = session.id(), err = %e, "undecodable login request");
            HandlerError::new(ProtocolType::LoginReq, INVALID_LOGIN_REQUEST)
        })?;

        let response = self.users.login(&request.js_code).await.map_err(|e| {
            warn!(conn = session.id(), err = %format!("{e:#}"), "login failed");
            HandlerError::new(ProtocolType::LoginReq, format!("{e:#}"))
        })?;

        if let Some(user) = &response.user {
            session.authenticate(&user.id, &user.open_id);
            info!(conn = session.id(), user_id = %user.id, "session authenticated");
        }
        Ok(Reply { kind: ProtocolType::LoginResp, data: Bytes::from(response.encode_to_vec()) })
    }
}

impl Handler for LoginHandler {
    fn handle<'a>(
        &'a self,
        session: &'a Session,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send + 'a>> {
        Box::pin(self.login(session, payload))
    }
}
