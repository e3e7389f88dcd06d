//! Protocol Server
//!
//! Accepts connections and runs one read/dispatch/write loop per connection.
//! Handlers are looked up in a table that is fixed once the server is built.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::frame::{read_request, write_response, Request, Response};
use super::Command;
use crate::error::{CacheError, Result};

/// A command handler: takes the request arguments, returns the reply body.
pub type Handler = Arc<dyn Fn(Vec<Bytes>) -> BoxFuture<'static, Result<Bytes>> + Send + Sync>;

// == Server Builder ==
/// Collects handlers before the dispatch table is frozen.
#[derive(Default)]
pub struct ServerBuilder {
    handlers: HashMap<u8, Handler>,
}

impl ServerBuilder {
    /// Registers the handler for `command`, replacing any previous one.
    pub fn handler<F>(mut self, command: Command, handler: F) -> Self
    where
        F: Fn(Vec<Bytes>) -> BoxFuture<'static, Result<Bytes>> + Send + Sync + 'static,
    {
        self.handlers.insert(command.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> Server {
        Server {
            handlers: Arc::new(self.handlers),
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }
}

// == Server ==
/// Protocol server. Clones share the same dispatch table and shutdown state.
#[derive(Clone)]
pub struct Server {
    handlers: Arc<HashMap<u8, Handler>>,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Binds `address` and serves until [`Server::close`] is called.
    pub async fn listen_and_serve(&self, address: impl ToSocketAddrs) -> Result<()> {
        let listener = TcpListener::bind(address).await?;
        self.serve(listener).await
    }

    /// Serves connections from `listener` until [`Server::close`] is called.
    ///
    /// Returns once every connection handler has finished.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Protocol server listening on {}", listener.local_addr()?);

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Connection accepted");
                    let handlers = Arc::clone(&self.handlers);
                    let shutdown = self.shutdown.clone();
                    self.connections
                        .spawn(handle_connection(stream, handlers, shutdown));
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            }
        }

        self.connections.close();
        self.connections.wait().await;
        info!("Protocol server stopped");
        Ok(())
    }

    /// Stops accepting connections.
    ///
    /// Open connections finish the frame they are handling and then close.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Returns true once [`Server::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Runs the handler registered for the request's command.
    pub async fn dispatch(&self, request: Request) -> Response {
        dispatch(&self.handlers, request).await
    }
}

async fn dispatch(handlers: &HashMap<u8, Handler>, request: Request) -> Response {
    let Some(handler) = handlers.get(&request.command) else {
        return Response::error(CacheError::HandlerNotFound(request.command).to_string());
    };
    match handler(request.args).await {
        Ok(body) => Response::success(body),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn handle_connection(
    stream: TcpStream,
    handlers: Arc<HashMap<u8, Handler>>,
    shutdown: CancellationToken,
) {
    let peer = stream.peer_addr().ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        // Shutdown is only observed between frames; once a frame has started
        // arriving it is read, dispatched and answered.
        let at_eof = tokio::select! {
            biased;
            ready = reader.fill_buf() => match ready {
                Ok(buf) => buf.is_empty(),
                Err(e) => {
                    debug!(?peer, error = %e, "Connection read failed");
                    break;
                }
            },
            _ = shutdown.cancelled() => break,
        };
        if at_eof {
            break;
        }

        let request = match read_request(&mut reader).await {
            Ok(request) => request,
            Err(CacheError::VersionMismatch { expected, found }) => {
                warn!(?peer, expected, found, "Discarding frame with wrong protocol version");
                continue;
            }
            Err(e) if e.is_disconnect() => break,
            Err(e) => {
                warn!(?peer, error = %e, "Closing connection after read error");
                break;
            }
        };

        let response = dispatch(&handlers, request).await;
        if let Err(e) = write_response(&mut write_half, &response).await {
            debug!(?peer, error = %e, "Failed to write response");
            break;
        }
    }

    debug!(?peer, "Connection closed");
}
