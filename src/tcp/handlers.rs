//! Command Handlers
//!
//! Translate protocol arguments into cache engine calls.

use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tokio::net::ToSocketAddrs;

use crate::cache::CacheEngine;
use crate::error::{CacheError, Result};
use crate::proto::{Command, Server};

fn needs_arguments(args: &[Bytes], count: usize) -> Result<()> {
    if args.len() < count {
        return Err(CacheError::InvalidRequest(
            "command needs more arguments".to_string(),
        ));
    }
    Ok(())
}

fn key_of(arg: &Bytes) -> Result<&str> {
    std::str::from_utf8(arg)
        .map_err(|_| CacheError::InvalidRequest("key must be valid UTF-8".to_string()))
}

/// Decodes the 8-byte big-endian TTL argument.
pub fn decode_ttl(arg: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = arg
        .try_into()
        .map_err(|_| CacheError::InvalidRequest("ttl must be 8 bytes".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Handler for `GET key`.
pub async fn get(engine: Arc<CacheEngine>, args: Vec<Bytes>) -> Result<Bytes> {
    needs_arguments(&args, 1)?;
    let key = key_of(&args[0])?;
    engine
        .get(key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.to_string()))
}

/// Handler for `SET ttl key value`.
pub async fn set(engine: Arc<CacheEngine>, args: Vec<Bytes>) -> Result<Bytes> {
    needs_arguments(&args, 3)?;
    let ttl = decode_ttl(&args[0])?;
    let key = key_of(&args[1])?;
    engine.set(key, &args[2], ttl).await?;
    Ok(Bytes::new())
}

/// Handler for `DELETE key`.
pub async fn delete(engine: Arc<CacheEngine>, args: Vec<Bytes>) -> Result<Bytes> {
    needs_arguments(&args, 1)?;
    engine.delete(key_of(&args[0])?).await;
    Ok(Bytes::new())
}

/// Handler for `STATUS`.
pub async fn status(engine: Arc<CacheEngine>, _args: Vec<Bytes>) -> Result<Bytes> {
    let status = engine.status().await;
    Ok(Bytes::from(serde_json::to_vec(&status)?))
}

/// Builds a protocol server with every cache command registered.
pub fn command_server(engine: Arc<CacheEngine>) -> Server {
    let (e_get, e_set, e_delete, e_status) = (
        Arc::clone(&engine),
        Arc::clone(&engine),
        Arc::clone(&engine),
        engine,
    );
    Server::builder()
        .handler(Command::Get, move |args| get(Arc::clone(&e_get), args).boxed())
        .handler(Command::Set, move |args| set(Arc::clone(&e_set), args).boxed())
        .handler(Command::Delete, move |args| delete(Arc::clone(&e_delete), args).boxed())
        .handler(Command::Status, move |args| status(Arc::clone(&e_status), args).boxed())
        .build()
}

// == TCP Server ==
/// Cache server speaking the binary protocol.
#[derive(Clone)]
pub struct TcpServer {
    server: Server,
}

impl TcpServer {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self {
            server: command_server(engine),
        }
    }

    /// Serves on `address` until [`TcpServer::close`] is called.
    pub async fn run(&self, address: impl ToSocketAddrs) -> Result<()> {
        self.server.listen_and_serve(address).await
    }

    /// Serves an already bound listener.
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<()> {
        self.server.serve(listener).await
    }

    /// Stops accepting connections and lets open ones wind down.
    pub fn close(&self) {
        self.server.close();
    }
}
