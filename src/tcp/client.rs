//! TCP Client
//!
//! Typed wrappers over the protocol client for each cache command.

use bytes::Bytes;
use tokio::net::ToSocketAddrs;

use super::NOT_FOUND_MESSAGE;
use crate::cache::Status;
use crate::error::{CacheError, Result};
use crate::proto::{Client, Command};

/// Arguments of a `SET` request.
pub(crate) fn set_args(key: &str, value: &[u8], ttl: u64) -> Vec<Bytes> {
    vec![
        Bytes::copy_from_slice(&ttl.to_be_bytes()),
        Bytes::copy_from_slice(key.as_bytes()),
        Bytes::copy_from_slice(value),
    ]
}

/// Client for the cache server's binary protocol.
#[derive(Debug)]
pub struct TcpClient {
    client: Client,
}

impl TcpClient {
    pub async fn connect(address: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            client: Client::connect(address).await?,
        })
    }

    /// Fetches a value; `None` when the key is absent or expired.
    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        match self
            .client
            .call(Command::Get, vec![Bytes::copy_from_slice(key.as_bytes())])
            .await
        {
            Ok(body) => Ok(Some(body)),
            Err(CacheError::Remote(msg)) if msg == NOT_FOUND_MESSAGE => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stores a value with a TTL in seconds (0 = never expires).
    pub async fn set(&mut self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        self.client
            .call(Command::Set, set_args(key, value, ttl))
            .await?;
        Ok(())
    }

    pub async fn delete(&mut self, key: &str) -> Result<()> {
        self.client
            .call(Command::Delete, vec![Bytes::copy_from_slice(key.as_bytes())])
            .await?;
        Ok(())
    }

    pub async fn status(&mut self) -> Result<Status> {
        let body = self.client.call(Command::Status, Vec::new()).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await
    }
}
