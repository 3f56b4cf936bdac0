// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lab assistant backend: protobuf envelopes over managed WebSocket
//! connections.

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod handler;
pub mod identity;
pub mod proto;
pub mod repository;
pub mod service;
pub mod session;
pub mod store;
pub mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wshub::{Connection, Hub};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::handler::LoginHandler;
use crate::identity::{IdentityVerifier, MockVerifier, WechatVerifier};
use crate::proto::ProtocolType;
use crate::repository::LabRepository;
use crate::service::{LabService, UserService};
use crate::session::Session;
use crate::store::{DocumentStore, MemoryStore};

/// Shared business services built once at startup.
pub struct Services {
    pub users: Arc<UserService>,
    pub labs: Arc<LabService>,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            users: Arc::new(UserService::new(Arc::clone(&store), verifier)),
            labs: Arc::new(LabService::new(store)),
        }
    }

    /// Handler table for every supported request type.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new()
            .register(ProtocolType::LoginReq, LoginHandler::new(Arc::clone(&self.users)))
    }
}

/// Open the document store, loading the seed file when one is configured.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store = match &config.seed {
        Some(path) => MemoryStore::from_seed_file(path)
            .with_context(|| format!("failed to load seed {}", path.display()))?,
        None => MemoryStore::new(),
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    let labs = LabRepository::new(Arc::clone(&store)).find_all().await?;
    if labs.is_empty() {
        warn!("no labs configured, logins will fail until one is created");
    } else {
        info!(labs = labs.len(), "store ready");
    }
    Ok(store)
}

pub fn build_verifier(config: &Config) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match config.wechat_credentials() {
        Some((app_id, secret)) => {
            info!(app_id, "verifying logins against wechat");
            let verifier = WechatVerifier::new(
                app_id.to_owned(),
                secret.to_owned(),
                config.wechat_endpoint.clone(),
            )?;
            Ok(Arc::new(verifier))
        }
        None => {
            warn!("no wechat credentials configured, using mock login verification");
            Ok(Arc::new(MockVerifier))
        }
    }
}

/// Assemble the hub: store, verifier, services, dispatcher, and the
/// [`Session`] decoration of every accepted connection.
pub async fn build_hub(config: &Config) -> anyhow::Result<Arc<Hub<Session>>> {
    let store = open_store(config).await?;
    let services = Services::new(store, build_verifier(config)?);
    let hub: Hub<Session> = Hub::with_client_factory(
        config.hub_config(),
        Arc::new(services.dispatcher()),
        Arc::new(|conn: Arc<Connection>| Arc::new(Session::new(conn))),
    );
    Ok(Arc::new(hub))
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    config: &Config,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let hub = build_hub(config).await?;
    hub.serve(listener, &config.route, shutdown).await.context("server error")?;
    info!("server stopped");
    Ok(())
}

/// Bind, serve, and drain gracefully on SIGINT or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    serve(&config, listener, shutdown).await
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    // Registered before returning so a signal racing startup is still caught.
    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    tokio::spawn(async move {
        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}
