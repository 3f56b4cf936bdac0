// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for exercising the server over real sockets.

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::proto::{BaseRequest, BaseResponse, LoginRequest, ProtocolType};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsTx = SplitSink<WsStream, WsMessage>;
pub type WsRx = SplitStream<WsStream>;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Serve `config` on a random loopback port. Cancel the token to stop.
pub async fn spawn_server(config: Config) -> anyhow::Result<(SocketAddr, CancellationToken)> {
    ensure_crypto();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = crate::serve(&config, listener, token).await;
    });
    Ok((addr, shutdown))
}

pub async fn ws_connect(addr: &SocketAddr, route: &str) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}{route}");
    let (stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| anyhow::anyhow!("ws connect: {e}"))?;
    Ok(stream.split())
}

/// Encode a request envelope.
pub fn request(kind: i32, data: impl Into<bytes::Bytes>) -> Vec<u8> {
    BaseRequest { r#type: kind, data: data.into() }.encode_to_vec()
}

/// Encode a login request envelope for `js_code`.
pub fn login_request(js_code: &str) -> Vec<u8> {
    let login = LoginRequest { js_code: js_code.to_owned() };
    request(ProtocolType::LoginReq as i32, login.encode_to_vec())
}

pub async fn ws_send(tx: &mut WsTx, frame: Vec<u8>) -> anyhow::Result<()> {
    tx.send(WsMessage::Binary(frame.into())).await.map_err(|e| anyhow::anyhow!("ws send: {e}"))
}

/// Next response envelope, skipping keepalive control frames.
pub async fn ws_recv(rx: &mut WsRx, timeout: Duration) -> anyhow::Result<BaseResponse> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let msg = tokio::time::timeout_at(deadline, rx.next())
            .await
            .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
            .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
            .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;

        match msg {
            WsMessage::Binary(data) => return Ok(BaseResponse::decode(data)?),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => anyhow::bail!("expected Binary message, got {other:?}"),
        }
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
