// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub tests using real WebSocket clients against an in-process server.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use wshub::{Client, Connection, ConnectionConfig, ConnectionError, Hub, HubConfig, HubHandler};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Records lifecycle events as short strings and echoes text back.
#[derive(Default)]
struct EventLog {
    entries: Mutex<Vec<String>>,
    changed: Notify,
}

impl EventLog {
    fn push(&self, entry: String) {
        self.entries.lock().push(entry);
        self.changed.notify_waiters();
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    async fn wait_for(&self, entry: &str) -> anyhow::Result<()> {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let changed = self.changed.notified();
                if self.entries.lock().iter().any(|e| e == entry) {
                    return;
                }
                changed.await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for {entry:?}: {:?}", self.entries()))
    }
}

impl<C: Client> HubHandler<C> for EventLog {
    fn on_open(&self, _client: &Arc<C>) {
        self.push("open".to_owned());
    }

    fn on_message<'a>(
        &'a self,
        client: &'a Arc<C>,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let text = String::from_utf8_lossy(&payload).into_owned();
            self.push(format!("message:{text}"));
            if text == "bye" {
                client.close();
            } else {
                let _ = client.send_text(text);
            }
        })
    }

    fn on_close(&self, _client: &Arc<C>) {
        self.push("close".to_owned());
    }

    fn on_error(&self, client: Option<&Arc<C>>, err: &ConnectionError) {
        let scope = if client.is_some() { "conn" } else { "accept" };
        self.push(format!("error:{scope}:{}", err.as_str()));
    }
}

async fn spawn_hub<C: Client>(hub: Hub<C>) -> anyhow::Result<(SocketAddr, CancellationToken)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    tokio::spawn(Arc::new(hub).serve(listener, "/ws", shutdown.clone()));
    Ok((addr, shutdown))
}

async fn next_message<S>(rx: &mut S) -> anyhow::Result<WsMessage>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(TIMEOUT, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))
}

#[tokio::test]
async fn lifecycle_events_arrive_in_order() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let (addr, _shutdown) = spawn_hub(Hub::new(HubConfig::default(), log.clone())).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    ws.send(WsMessage::Text("hello".into())).await?;
    assert_eq!(next_message(&mut ws).await?, WsMessage::Text("hello".into()));

    ws.close(None).await?;
    log.wait_for("close").await?;

    assert_eq!(log.entries(), vec!["open", "message:hello", "close"]);
    Ok(())
}

#[tokio::test]
async fn abrupt_client_drop_is_not_an_error() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let (addr, _shutdown) = spawn_hub(Hub::new(HubConfig::default(), log.clone())).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    ws.send(WsMessage::Text("hi".into())).await?;
    assert_eq!(next_message(&mut ws).await?, WsMessage::Text("hi".into()));
    log.wait_for("message:hi").await?;

    // No close handshake: the socket just goes away.
    drop(ws);
    log.wait_for("close").await?;

    assert_eq!(log.entries(), vec!["open", "message:hi", "close"]);
    Ok(())
}

#[tokio::test]
async fn server_close_sends_close_frame() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let (addr, _shutdown) = spawn_hub(Hub::new(HubConfig::default(), log.clone())).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    ws.send(WsMessage::Text("bye".into())).await?;

    assert!(matches!(next_message(&mut ws).await?, WsMessage::Close(_)));
    log.wait_for("close").await?;
    assert!(!log.entries().iter().any(|e| e.starts_with("error")));
    Ok(())
}

#[tokio::test]
async fn rejected_origin_is_forbidden() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let config = HubConfig::default().allow_origins(vec!["https://app.example".to_owned()]);
    let (addr, _shutdown) = spawn_hub(Hub::new(config, log.clone())).await?;

    let mut request = format!("ws://{addr}/ws").into_client_request()?;
    request.headers_mut().insert("origin", HeaderValue::from_static("https://evil.example"));
    let result = tokio_tungstenite::connect_async(request).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 403);
        }
        other => anyhow::bail!("expected 403, got {:?}", other.map(|_| ())),
    }
    log.wait_for("error:accept:ORIGIN_REJECTED").await?;

    let mut request = format!("ws://{addr}/ws").into_client_request()?;
    request.headers_mut().insert("origin", HeaderValue::from_static("https://app.example"));
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await?;
    ws.send(WsMessage::Text("allowed".into())).await?;
    assert_eq!(next_message(&mut ws).await?, WsMessage::Text("allowed".into()));
    Ok(())
}

#[tokio::test]
async fn plain_http_request_is_an_upgrade_error() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let (addr, _shutdown) = spawn_hub(Hub::new(HubConfig::default(), log.clone())).await?;

    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream
        .write_all(b"GET /ws HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let mut response = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut response)).await??;

    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 4"), "response: {response}");
    log.wait_for("error:accept:UPGRADE").await?;
    assert!(!log.entries().iter().any(|e| e == "open"));
    Ok(())
}

#[tokio::test]
async fn keepalive_pings_reach_the_client() -> anyhow::Result<()> {
    let log = Arc::new(EventLog::default());
    let config = HubConfig {
        connection: ConnectionConfig {
            read_deadline: Duration::from_secs(2),
            keepalive: Some(Duration::from_millis(100)),
            ..Default::default()
        },
        ..Default::default()
    };
    let (addr, _shutdown) = spawn_hub(Hub::new(config, log.clone())).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    assert!(matches!(next_message(&mut ws).await?, WsMessage::Ping(_)));
    Ok(())
}

/// Application client that carries a label alongside the connection.
struct Labelled {
    conn: Arc<Connection>,
    label: String,
}

impl Client for Labelled {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

struct LabelEcho;

impl HubHandler<Labelled> for LabelEcho {
    fn on_message<'a>(
        &'a self,
        client: &'a Arc<Labelled>,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let reply = format!("{}:{}", client.label, String::from_utf8_lossy(&payload));
            let _ = client.send_text(reply);
        })
    }
}

#[tokio::test]
async fn factory_decorates_every_connection() -> anyhow::Result<()> {
    let hub = Hub::with_client_factory(
        HubConfig::default(),
        Arc::new(LabelEcho),
        Arc::new(|conn: Arc<Connection>| {
            let label = format!("conn-{}", conn.id());
            Arc::new(Labelled { conn, label })
        }),
    );
    let (addr, _shutdown) = spawn_hub(hub).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await?;
    ws.send(WsMessage::Binary(Bytes::from_static(b"ping"))).await?;
    match next_message(&mut ws).await? {
        WsMessage::Text(text) => {
            assert!(text.starts_with("conn-"), "reply: {text}");
            assert!(text.ends_with(":ping"), "reply: {text}");
        }
        other => anyhow::bail!("expected text reply, got {other:?}"),
    }
    Ok(())
}
