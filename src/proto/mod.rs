//! Wire Protocol Module
//!
//! Compact length-prefixed binary protocol used by the TCP front end.
//!
//! # Frames
//! - Request: `version(1) | command(1) | argCount(4) | {argLength(4) | arg}*`
//! - Response: `reply(1) | bodyLength(4) | body`
//!
//! All integers are big-endian.

pub mod client;
pub mod frame;
pub mod server;

pub use client::Client;
pub use frame::{Request, Response};
pub use server::{Handler, Server, ServerBuilder};

/// Version byte carried by every request frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Request header: version, command and argument count.
pub const REQUEST_HEADER_LENGTH: usize = 6;

/// Response header: reply code and body length.
pub const RESPONSE_HEADER_LENGTH: usize = 5;

/// Largest argument or body accepted from the wire.
pub const MAX_FRAME_PART_LENGTH: usize = 64 * 1024 * 1024;

// == Command ==
/// Commands understood by the cache server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Get = 1,
    Set = 2,
    Delete = 3,
    Status = 4,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Get, Command::Set, Command::Delete, Command::Status];
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Command::Get),
            2 => Ok(Command::Set),
            3 => Ok(Command::Delete),
            4 => Ok(Command::Status),
            other => Err(other),
        }
    }
}

// == Reply Code ==
/// First byte of every response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Success = 0,
    Error = 1,
}

impl TryFrom<u8> for ReplyCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(ReplyCode::Success),
            1 => Ok(ReplyCode::Error),
            other => Err(other),
        }
    }
}
