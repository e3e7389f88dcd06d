//! Async Client
//!
//! Lets many callers share one connection: requests go through a bounded
//! queue to a single task that owns the connection, and each request carries
//! its own reply channel.

use bytes::Bytes;
use tokio::net::ToSocketAddrs;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::client::set_args;
use super::NOT_FOUND_MESSAGE;
use crate::cache::Status;
use crate::error::{CacheError, Result};
use crate::proto::{Client, Command};

/// Default number of requests that may wait in the queue.
pub const DEFAULT_QUEUE_SIZE: usize = 16 * 1024;

#[derive(Debug)]
struct QueuedRequest {
    command: Command,
    args: Vec<Bytes>,
    reply: oneshot::Sender<Result<Bytes>>,
}

/// Pending reply of a queued request.
#[derive(Debug)]
pub struct Reply {
    rx: oneshot::Receiver<Result<Bytes>>,
}

impl Reply {
    /// Waits for the raw reply body.
    pub async fn body(self) -> Result<Bytes> {
        self.rx
            .await
            .map_err(|_| CacheError::Internal("client sender task stopped".to_string()))?
    }

    /// Waits for the reply of a `GET`; `None` when the key is absent or expired.
    pub async fn value(self) -> Result<Option<Bytes>> {
        match self.body().await {
            Ok(body) => Ok(Some(body)),
            Err(CacheError::Remote(msg)) if msg == NOT_FOUND_MESSAGE => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Waits for the reply and decodes it as a status.
    pub async fn status(self) -> Result<Status> {
        let body = self.body().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Queued client over a single protocol connection.
#[derive(Debug)]
pub struct AsyncClient {
    tx: mpsc::Sender<QueuedRequest>,
    sender: JoinHandle<()>,
}

impl AsyncClient {
    pub async fn connect(address: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_queue(address, DEFAULT_QUEUE_SIZE).await
    }

    pub async fn connect_with_queue(address: impl ToSocketAddrs, queue_size: usize) -> Result<Self> {
        let client = Client::connect(address).await?;
        let (tx, rx) = mpsc::channel(queue_size);
        let sender = tokio::spawn(run_sender(client, rx));
        Ok(Self { tx, sender })
    }

    async fn enqueue(&self, command: Command, args: Vec<Bytes>) -> Reply {
        let (reply, rx) = oneshot::channel();
        // A closed queue drops `reply`, which surfaces as an error in `Reply::body`
        let _ = self.tx.send(QueuedRequest { command, args, reply }).await;
        Reply { rx }
    }

    pub async fn get(&self, key: &str) -> Reply {
        self.enqueue(Command::Get, vec![Bytes::copy_from_slice(key.as_bytes())])
            .await
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: u64) -> Reply {
        self.enqueue(Command::Set, set_args(key, value, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> Reply {
        self.enqueue(Command::Delete, vec![Bytes::copy_from_slice(key.as_bytes())])
            .await
    }

    pub async fn status(&self) -> Reply {
        self.enqueue(Command::Status, Vec::new()).await
    }

    /// Stops accepting requests, drains the queue and closes the connection.
    pub async fn close(self) -> Result<()> {
        drop(self.tx);
        self.sender
            .await
            .map_err(|e| CacheError::Internal(format!("client sender task failed: {}", e)))
    }
}

async fn run_sender(mut client: Client, mut rx: mpsc::Receiver<QueuedRequest>) {
    while let Some(request) = rx.recv().await {
        let result = client.call(request.command, request.args).await;
        // The caller may have dropped its reply handle
        let _ = request.reply.send(result);
    }
    if let Err(e) = client.close().await {
        debug!(error = %e, "Failed to close client connection");
    }
}
