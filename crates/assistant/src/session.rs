// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection view used by the protocol handlers.

use std::sync::Arc;

use wshub::{Client, Connection};

const USER_ID: &str = "user_id";
const OPEN_ID: &str = "open_id";

/// A connection decorated with the identity established by login.
pub struct Session {
    conn: Arc<Connection>,
}

impl Session {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    pub fn user_id(&self) -> Option<String> {
        self.conn.context().get_str(USER_ID).ok()
    }

    pub fn open_id(&self) -> Option<String> {
        self.conn.context().get_str(OPEN_ID).ok()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id().is_some()
    }

    /// Attach a verified identity. A later login replaces it.
    pub fn authenticate(&self, user_id: &str, open_id: &str) {
        let context = self.conn.context();
        context.set(USER_ID, user_id);
        context.set(OPEN_ID, open_id);
    }
}

impl Client for Session {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn", &self.conn.id())
            .field("user_id", &self.user_id())
            .finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
