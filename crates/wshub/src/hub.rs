// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upgrade endpoint and lifecycle callback routing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::connection::{Client, Connection, ConnectionEvents};
use crate::error::ConnectionError;

/// Application callbacks, invoked per connection in the order open, then
/// zero or more messages, then close. Errors may arrive at any point, and
/// with no client when the failure happened before a connection existed.
pub trait HubHandler<C: Client>: Send + Sync + 'static {
    fn on_open(&self, _client: &Arc<C>) {}

    fn on_message<'a>(
        &'a self,
        client: &'a Arc<C>,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    fn on_close(&self, _client: &Arc<C>) {}

    fn on_error(&self, _client: Option<&Arc<C>>, _err: &ConnectionError) {}
}

/// Maps each accepted connection to the application's client type.
pub type ClientFactory<C> = Arc<dyn Fn(Arc<Connection>) -> Arc<C> + Send + Sync>;

/// Accept point for every connection in the process. Holds configuration
/// and callbacks only, never per-connection state.
pub struct Hub<C: Client = Connection> {
    config: HubConfig,
    handler: Arc<dyn HubHandler<C>>,
    factory: ClientFactory<C>,
}

impl Hub<Connection> {
    /// A hub whose callbacks see the bare [`Connection`].
    pub fn new(config: HubConfig, handler: Arc<dyn HubHandler<Connection>>) -> Self {
        Self::with_client_factory(config, handler, Arc::new(|conn: Arc<Connection>| conn))
    }
}

impl<C: Client> Hub<C> {
    /// A hub whose callbacks see the client produced by `factory`.
    pub fn with_client_factory(
        config: HubConfig,
        handler: Arc<dyn HubHandler<C>>,
        factory: ClientFactory<C>,
    ) -> Self {
        Self { config, handler, factory }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Router serving the upgrade endpoint at `route`.
    pub fn router(self: Arc<Self>, route: &str) -> Router {
        Router::new()
            .route(route, get(accept::<C>))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        route: &str,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, route, "accepting websocket upgrades");
        }
        let router = self.router(route);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }

    /// Wrap an upgraded socket, wire its callbacks to the decorated client,
    /// announce it, then start its tasks.
    fn attach(&self, socket: WebSocket) {
        let conn = match Connection::new(socket, self.config.connection.clone()) {
            Ok(conn) => conn,
            Err(e) => {
                self.handler.on_error(None, &e);
                return;
            }
        };
        let client = (self.factory)(Arc::clone(&conn));
        conn.set_events(Arc::new(HubEvents {
            handler: Arc::clone(&self.handler),
            client: Arc::clone(&client),
        }));
        self.handler.on_open(&client);
        conn.start();
    }
}

async fn accept<C: Client>(
    State(hub): State<Arc<Hub<C>>>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let mut upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "upgrade rejected");
            hub.handler.on_error(None, &ConnectionError::Upgrade(rejection.body_text()));
            return rejection.into_response();
        }
    };

    if !(hub.config.check_origin)(&headers) {
        let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()).map(str::to_owned);
        debug!(origin = ?origin, "origin rejected");
        hub.handler.on_error(None, &ConnectionError::OriginRejected(origin));
        return StatusCode::FORBIDDEN.into_response();
    }

    if let Some(size) = hub.config.read_buffer_size {
        upgrade = upgrade.read_buffer_size(size);
    }
    if let Some(size) = hub.config.write_buffer_size {
        upgrade = upgrade.write_buffer_size(size);
    }
    if let Some(size) = hub.config.max_frame_size {
        upgrade = upgrade.max_frame_size(size).max_message_size(size);
    }

    upgrade
        .on_failed_upgrade(upgrade_failed(Arc::clone(&hub)))
        .on_upgrade(move |socket| async move { hub.attach(socket) })
}

/// Reports a handshake that was accepted but never completed.
fn upgrade_failed<C: Client>(hub: Arc<Hub<C>>) -> impl FnOnce(axum::Error) + Send + 'static {
    move |e: axum::Error| {
        debug!(err = %e, "upgrade failed");
        hub.handler.on_error(None, &ConnectionError::Upgrade(e.to_string()));
    }
}

/// Routes a connection's events to the hub handler with the decorated
/// client in hand.
struct HubEvents<C: Client> {
    handler: Arc<dyn HubHandler<C>>,
    client: Arc<C>,
}

impl<C: Client> ConnectionEvents for HubEvents<C> {
    fn on_message(&self, payload: Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.handler.on_message(&self.client, payload)
    }

    fn on_error(&self, err: &ConnectionError) {
        self.handler.on_error(Some(&self.client), err);
    }

    fn on_close(&self) {
        self.handler.on_close(&self.client);
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
