// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed WebSocket connections behind a single upgrade endpoint.
//!
//! A [`Hub`] turns upgrade requests into [`Connection`]s, each running an
//! independent read task and write task, and routes lifecycle events
//! (open, message, close, error) to a [`HubHandler`].

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod frame;
pub mod hub;
pub mod test_support;

pub use config::{CloseErrorPolicy, ConnectionConfig, HubConfig, OriginCheck};
pub use connection::{Client, Connection, ConnectionEvents};
pub use context::{ContextError, ContextStore, ContextValue};
pub use error::{ConnectionError, SendError};
pub use frame::Frame;
pub use hub::{ClientFactory, Hub, HubHandler};
