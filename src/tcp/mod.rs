//! TCP Front End
//!
//! Cache commands served over the binary protocol, plus typed clients.
//!
//! # Commands
//! - `GET key` - Reply body is the raw value; a miss is an error reply
//! - `SET ttl key value` - TTL is an 8-byte big-endian number of seconds
//! - `DELETE key` - Always succeeds
//! - `STATUS` - Reply body is the JSON-encoded status

pub mod async_client;
pub mod client;
pub mod handlers;

pub use async_client::{AsyncClient, Reply};
pub use client::TcpClient;
pub use handlers::{command_server, TcpServer};

/// Error message of a `GET` miss.
pub const NOT_FOUND_MESSAGE: &str = "not found";
