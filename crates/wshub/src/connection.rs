// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A managed WebSocket session with an independent read task and write task.
//!
//! The read task owns the stream half: it enforces the sliding read deadline
//! and hands every data frame to [`ConnectionEvents::on_message`] inline. The
//! write task owns the sink half: it drains the bounded outbound buffer in
//! enqueue order, interleaves keepalive pings while the buffer is idle, and is
//! the only place the transport is ever closed.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{CloseErrorPolicy, ConnectionConfig};
use crate::context::ContextStore;
use crate::error::{ConnectionError, SendError};
use crate::frame::Frame;

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;
/// Inbound half of a transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;

/// Lifecycle callbacks for one connection.
///
/// `on_message` runs on the read task, so a slow handler delays the next read
/// (and the next deadline reset) for that connection only.
pub trait ConnectionEvents: Send + Sync {
    fn on_message(&self, payload: Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn on_error(&self, err: &ConnectionError);
    fn on_close(&self);
}

/// Capabilities shared by a [`Connection`] and any application type that
/// decorates one.
pub trait Client: Send + Sync + 'static {
    fn connection(&self) -> &Connection;

    fn id(&self) -> u64 {
        self.connection().id()
    }

    fn send_text(&self, text: String) -> Result<(), SendError> {
        self.connection().send_text(text)
    }

    fn send_binary(&self, data: Bytes) -> Result<(), SendError> {
        self.connection().send_binary(data)
    }

    fn close(&self) {
        self.connection().close()
    }

    fn context(&self) -> &ContextStore {
        self.connection().context()
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Transport {
    sink: FrameSink,
    stream: FrameStream,
    outbound_rx: mpsc::Receiver<Frame>,
}

pub struct Connection {
    id: u64,
    config: ConnectionConfig,
    /// Taken (and thereby closed) exactly once, by the first `close()`.
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    /// Present until `start()` hands the halves to the two tasks.
    transport: Mutex<Option<Transport>>,
    read_deadline_at: Mutex<Instant>,
    context: ContextStore,
    closing: AtomicBool,
    peer_gone: AtomicBool,
    shutdown: CancellationToken,
    released: CancellationToken,
    /// Taken when the terminal notification fires, which also breaks the
    /// connection -> events -> decorated client -> connection cycle.
    events: Mutex<Option<Arc<dyn ConnectionEvents>>>,
}

impl Connection {
    /// Wrap an upgraded socket. The read deadline is armed immediately.
    pub fn new(socket: WebSocket, config: ConnectionConfig) -> Result<Arc<Self>, ConnectionError> {
        let (sink, stream) = socket.split();
        Self::from_parts(Box::pin(sink), Box::pin(stream), config)
    }

    /// Build a connection over arbitrary transport halves.
    pub fn from_parts(
        sink: FrameSink,
        stream: FrameStream,
        config: ConnectionConfig,
    ) -> Result<Arc<Self>, ConnectionError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.capacity);
        let read_deadline_at = Instant::now() + config.read_deadline;
        Ok(Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            outbound: Mutex::new(Some(tx)),
            transport: Mutex::new(Some(Transport { sink, stream, outbound_rx: rx })),
            read_deadline_at: Mutex::new(read_deadline_at),
            context: ContextStore::new(),
            closing: AtomicBool::new(false),
            peer_gone: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            released: CancellationToken::new(),
            events: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn set_events(&self, events: Arc<dyn ConnectionEvents>) {
        *self.events.lock() = Some(events);
    }

    /// Current absolute read deadline.
    pub fn read_deadline(&self) -> Instant {
        *self.read_deadline_at.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Spawn the read and write tasks. Calling this more than once, or after
    /// `close()`, does nothing.
    pub fn start(self: &Arc<Self>) {
        let Some(transport) = self.transport.lock().take() else {
            return;
        };
        debug!(conn = self.id, keepalive = ?self.config.keepalive_period(), "connection started");
        tokio::spawn(Arc::clone(self).read_loop(transport.stream));
        tokio::spawn(Arc::clone(self).write_loop(transport.sink, transport.outbound_rx));
    }

    /// Enqueue a text frame without blocking.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.enqueue(Frame::Text(text.into()))
    }

    /// Enqueue a binary frame without blocking.
    pub fn send_binary(&self, data: Bytes) -> Result<(), SendError> {
        self.enqueue(Frame::Binary(data))
    }

    fn enqueue(&self, frame: Frame) -> Result<(), SendError> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(SendError::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Begin teardown. Idempotent and safe from any task.
    ///
    /// Closes the outbound buffer and stops the read task. Frames already
    /// buffered are still flushed before the write task releases the
    /// transport. Use [`Connection::closed`] to wait for the release.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(conn = self.id, "closing connection");
        drop(self.outbound.lock().take());
        self.shutdown.cancel();

        // Never started: nothing else will release the transport.
        let unstarted = self.transport.lock().take();
        if let Some(transport) = unstarted {
            drop(transport);
            self.finish(Ok(()));
        }
    }

    /// Resolves once the transport has been released and the terminal
    /// notification has fired.
    pub async fn closed(&self) {
        self.released.cancelled().await;
    }

    // -- Read task ------------------------------------------------------------

    async fn read_loop(self: Arc<Self>, mut stream: FrameStream) {
        loop {
            let deadline = self.read_deadline();
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = tokio::time::timeout_at(deadline, stream.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    self.fail(ConnectionError::ReadTimeout(self.config.read_deadline));
                    break;
                }
                Ok(None) => {
                    self.peer_closed("stream ended");
                    break;
                }
                Ok(Some(Err(e))) if is_disconnect(&e) => {
                    debug!(conn = self.id, err = %e, "transport reset by peer");
                    self.peer_closed("reset");
                    break;
                }
                Ok(Some(Err(e))) => {
                    self.fail(ConnectionError::Read(e));
                    break;
                }
                Ok(Some(Ok(message))) => message,
            };

            self.touch();
            let payload = match message {
                Message::Text(text) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                Message::Binary(data) => data,
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    self.peer_closed("close frame");
                    break;
                }
            };

            if let Some(limit) = self.config.read_limit {
                if payload.len() > limit {
                    self.fail(ConnectionError::ReadLimit { size: payload.len(), limit });
                    break;
                }
            }

            let events = self.events.lock().clone();
            if let Some(events) = events {
                events.on_message(payload).await;
            }
        }
        trace!(conn = self.id, "read task exited");
    }

    fn touch(&self) {
        *self.read_deadline_at.lock() = Instant::now() + self.config.read_deadline;
    }

    fn peer_closed(&self, how: &'static str) {
        debug!(conn = self.id, how, "peer disconnected");
        self.peer_gone.store(true, Ordering::Release);
        self.close();
    }

    // -- Write task -----------------------------------------------------------

    async fn write_loop(self: Arc<Self>, mut sink: FrameSink, mut rx: mpsc::Receiver<Frame>) {
        let mut ticker = self.config.keepalive_period().map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let mut broken = false;
        loop {
            let frame = tokio::select! {
                biased;
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = next_tick(&mut ticker) => Frame::Ping(Bytes::new()),
            };

            if let Err(e) = self.write(&mut sink, frame).await {
                broken = true;
                self.fail(e);
                break;
            }
        }

        let result = self.release(sink, broken).await;
        self.finish(result);
    }

    async fn write(&self, sink: &mut FrameSink, frame: Frame) -> Result<(), ConnectionError> {
        let kind = frame.kind();
        let deadline = self.config.write_deadline;
        match tokio::time::timeout(deadline, sink.send(frame.into())).await {
            Ok(Ok(())) => {
                trace!(conn = self.id, kind, "frame written");
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionError::Write(e)),
            Err(_) => Err(ConnectionError::WriteTimeout(deadline)),
        }
    }

    /// Write a best-effort close frame, then close the sink.
    async fn release(&self, mut sink: FrameSink, broken: bool) -> Result<(), ConnectionError> {
        let deadline = self.config.write_deadline;
        if !broken {
            let frame = Frame::Close;
            let kind = frame.kind();
            match tokio::time::timeout(deadline, sink.send(frame.into())).await {
                Ok(Ok(())) => trace!(conn = self.id, kind, "frame written"),
                Ok(Err(e)) => trace!(conn = self.id, kind, err = %e, "close frame not written"),
                Err(_) => trace!(conn = self.id, kind, "close frame timed out"),
            }
        }

        let result = match tokio::time::timeout(deadline, sink.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Close(e)),
            Err(_) => Err(ConnectionError::WriteTimeout(deadline)),
        };
        match result {
            Err(ConnectionError::Close(ref e))
                if is_disconnect(e) || self.peer_gone.load(Ordering::Acquire) =>
            {
                debug!(conn = self.id, err = %e, "transport already gone at close");
                Ok(())
            }
            Err(e) if broken => {
                debug!(conn = self.id, err = %e, "close of failed transport");
                Ok(())
            }
            other => other,
        }
    }

    // -- Teardown -------------------------------------------------------------

    /// Report a loop failure, then tear down. Failures that surface after
    /// teardown began are expected fallout and only logged.
    fn fail(&self, err: ConnectionError) {
        if self.is_closed() {
            debug!(conn = self.id, err = %err, "error after close");
            return;
        }
        warn!(conn = self.id, code = err.as_str(), err = %err, "connection error");
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.on_error(&err);
        }
        self.close();
    }

    fn finish(&self, result: Result<(), ConnectionError>) {
        let events = self.events.lock().take();
        if let Some(events) = events {
            match result {
                Ok(()) => events.on_close(),
                Err(e) => {
                    warn!(conn = self.id, code = e.as_str(), err = %e, "transport close failed");
                    events.on_error(&e);
                    if self.config.close_errors == CloseErrorPolicy::NotifyClose {
                        events.on_close();
                    }
                }
            }
        }
        debug!(conn = self.id, "connection released");
        self.released.cancel();
    }
}

impl Client for Connection {
    fn connection(&self) -> &Connection {
        self
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Transport error texts that mean the peer went away. Matched on the
/// rendered message because the websocket error type behind `axum::Error`
/// belongs to whichever tungstenite version axum links.
const DISCONNECT_MESSAGES: &[&str] = &[
    "Connection reset without closing handshake",
    "Connection closed normally",
    "Trying to work with closed connection",
];

/// Whether a transport error means the peer went away rather than
/// something going wrong locally.
pub(crate) fn is_disconnect(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        let text = e.to_string();
        if DISCONNECT_MESSAGES.iter().any(|m| text.contains(m)) {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
