//! Frame Codec
//!
//! Encodes and decodes request and response frames on async byte streams.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    ReplyCode, MAX_FRAME_PART_LENGTH, PROTOCOL_VERSION, REQUEST_HEADER_LENGTH,
    RESPONSE_HEADER_LENGTH,
};
use crate::error::{CacheError, Result};

// == Request ==
/// A decoded request frame.
///
/// The command is kept as a raw byte so unknown commands can still be
/// answered with an error reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: u8,
    pub args: Vec<Bytes>,
}

impl Request {
    pub fn new(command: impl Into<u8>, args: Vec<Bytes>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Encodes the frame with the current protocol version.
    pub fn encode(&self) -> BytesMut {
        encode_request_with_version(PROTOCOL_VERSION, self.command, &self.args)
    }
}

pub(crate) fn encode_request_with_version(version: u8, command: u8, args: &[Bytes]) -> BytesMut {
    let body_len: usize = args.iter().map(|arg| 4 + arg.len()).sum();
    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_LENGTH + body_len);
    buf.put_u8(version);
    buf.put_u8(command);
    buf.put_u32(args.len() as u32);
    for arg in args {
        buf.put_u32(arg.len() as u32);
        buf.put_slice(arg);
    }
    buf
}

// == Response ==
/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: ReplyCode,
    pub body: Bytes,
}

impl Response {
    pub fn success(body: Bytes) -> Self {
        Self {
            reply: ReplyCode::Success,
            body,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            reply: ReplyCode::Error,
            body: Bytes::from(message.into()),
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LENGTH + self.body.len());
        buf.put_u8(self.reply as u8);
        buf.put_u32(self.body.len() as u32);
        buf.put_slice(&self.body);
        buf
    }
}

async fn read_part<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Bytes> {
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_PART_LENGTH {
        return Err(CacheError::MalformedFrame(format!(
            "length {} exceeds limit of {} bytes",
            len, MAX_FRAME_PART_LENGTH
        )));
    }
    let mut part = vec![0u8; len];
    reader.read_exact(&mut part).await?;
    Ok(Bytes::from(part))
}

// == Read / Write ==
/// Reads one request frame.
///
/// A frame with the wrong version byte is consumed completely and then
/// reported as [`CacheError::VersionMismatch`], so the stream stays aligned
/// on the next frame.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Request> {
    let version = reader.read_u8().await?;
    let command = reader.read_u8().await?;
    let arg_count = reader.read_u32().await?;

    let mut args = Vec::with_capacity(arg_count.min(16) as usize);
    for _ in 0..arg_count {
        args.push(read_part(reader).await?);
    }

    if version != PROTOCOL_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            found: version,
        });
    }
    Ok(Request { command, args })
}

/// Writes one request frame and flushes it.
pub async fn write_request<W: AsyncWrite + Unpin>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&request.encode()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one response frame.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Response> {
    let code = reader.read_u8().await?;
    let reply = ReplyCode::try_from(code)
        .map_err(|code| CacheError::MalformedFrame(format!("unknown reply code {}", code)))?;
    let body = read_part(reader).await?;
    Ok(Response { reply, body })
}

/// Writes one response frame and flushes it.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<()> {
    writer.write_all(&response.encode()).await?;
    writer.flush().await?;
    Ok(())
}
