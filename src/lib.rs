//! Decoder for [RFC 5424](https://tools.ietf.org/html/rfc5424) Syslog messages and a TCP
//! listener that feeds it. Not to be confused with the older
//! [RFC 3164](https://tools.ietf.org/html/rfc3164) BSD Syslog protocol, which many systems
//! still emit. Such messages are rejected by the decoder.
//!
//! In particular, supports the Structured Data fields.
//!
//! Usually, you'll just call the (re-exported) `decode` function with a byte slice.
//!
//! # Example
//!
//! A simple syslog server, reporting every message through `tracing`
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use syslog_tcp::{LogSink, Server, ServerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> std::io::Result<()> {
//! let server = Server::bind("127.0.0.1:6601".parse().unwrap(), ServerConfig::default()).await?;
//! server.run(Arc::new(LogSink), CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Unimplemented Features
//!
//!  * Theoretically, you can send arbitrary (non-unicode) bytes for the message part of a syslog
//!    message. Messages that are not valid UTF-8 are rejected as a whole.
//!

mod config;
mod connection;
mod error;
mod facility;
pub mod framing;
mod message;
pub mod rfc5424;
mod server;
mod severity;
mod sink;
mod structured_data;
mod timestamp;

pub use config::{ServerConfig, DEFAULT_BUFFER_SIZE, DEFAULT_PORT};
pub use connection::ConnectionHandler;
pub use error::{
    ConnectionError, DecodeError, FrameError, Reason, StructuredDataError, TimestampError,
};
pub use facility::Facility;
pub use framing::Framing;
pub use message::DecodedMessage;
pub use rfc5424::{decode, Decoder};
pub use server::Server;
pub use severity::Severity;
pub use sink::{ChannelSink, LogSink, Outcome, Report, Sink};
pub use structured_data::{
    parse_structured_data, parse_structured_data_with, DuplicateIds, StructuredElement,
};
pub use timestamp::parse_timestamp;
