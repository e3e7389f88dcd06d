//! Protocol Client
//!
//! One blocking round trip at a time: write a request frame, then wait for
//! exactly one response frame.

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpStream, ToSocketAddrs};

use super::frame::{read_response, write_request, Request};
use super::ReplyCode;
use crate::error::{CacheError, Result};

/// Connection to a protocol server.
#[derive(Debug)]
pub struct Client {
    stream: BufStream<TcpStream>,
}

impl Client {
    /// Connects to the server at `address`.
    pub async fn connect(address: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: BufStream::new(stream),
        })
    }

    /// Sends one command and waits for its reply body.
    ///
    /// An `ERROR` reply is returned as [`CacheError::Remote`] carrying the
    /// server's message.
    pub async fn call(&mut self, command: impl Into<u8>, args: Vec<Bytes>) -> Result<Bytes> {
        let request = Request::new(command, args);
        write_request(&mut self.stream, &request).await?;

        let response = read_response(&mut self.stream).await?;
        match response.reply {
            ReplyCode::Success => Ok(response.body),
            ReplyCode::Error => Err(CacheError::Remote(
                String::from_utf8_lossy(&response.body).into_owned(),
            )),
        }
    }

    /// Shuts down the write side of the connection.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
