// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process transport and recording callbacks for exercising connections
//! without sockets.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::PollSender;

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionEvents};
use crate::error::ConnectionError;

/// Frames the far end of a [`pipe`] can hold before the connection's writes
/// start to block.
pub const PEER_BUFFER: usize = 64;

/// The far end of an in-process transport.
pub struct Peer {
    inbound: Option<mpsc::UnboundedSender<Result<Message, axum::Error>>>,
    outbound: Option<mpsc::Receiver<Message>>,
}

impl Peer {
    /// Deliver a frame to the connection's read task.
    pub fn send(&self, message: Message) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Ok(message)).is_ok(),
            None => false,
        }
    }

    /// Make the connection's next read fail with `err`.
    pub fn fail_read(&self, err: io::Error) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Err(axum::Error::new(err))).is_ok(),
            None => false,
        }
    }

    /// Next frame written by the connection, or `None` once its sink closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.outbound.as_mut()?.recv().await
    }

    /// End the inbound stream, as if the peer's socket went away.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Stop accepting frames so the connection's writes fail.
    pub fn stop_reading(&mut self) {
        self.outbound = None;
    }
}

/// Build an unstarted connection over an in-memory transport.
pub fn pipe(config: ConnectionConfig) -> Result<(Arc<Connection>, Peer), ConnectionError> {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::channel(PEER_BUFFER);

    let sink = PollSender::new(out_tx).sink_map_err(|_| {
        axum::Error::new(io::Error::new(io::ErrorKind::BrokenPipe, "peer stopped reading"))
    });
    let stream = UnboundedReceiverStream::new(in_rx);

    let conn = Connection::from_parts(Box::pin(sink), Box::pin(stream), config)?;
    Ok((conn, Peer { inbound: Some(in_tx), outbound: Some(out_rx) }))
}

/// [`ConnectionEvents`] that records everything it is told.
#[derive(Default)]
pub struct Recorder {
    messages: Mutex<Vec<Bytes>>,
    errors: Mutex<Vec<&'static str>>,
    closes: AtomicUsize,
    changed: Notify,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Bytes> {
        self.messages.lock().clone()
    }

    /// Error codes in the order they were reported.
    pub fn errors(&self) -> Vec<&'static str> {
        self.errors.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` messages have been delivered.
    pub async fn wait_for_messages(&self, n: usize) {
        loop {
            let changed = self.changed.notified();
            if self.messages.lock().len() >= n {
                return;
            }
            changed.await;
        }
    }
}

impl ConnectionEvents for Recorder {
    fn on_message(&self, payload: Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.messages.lock().push(payload);
            self.changed.notify_waiters();
        })
    }

    fn on_error(&self, err: &ConnectionError) {
        self.errors.lock().push(err.as_str());
        self.changed.notify_waiters();
    }

    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }
}
