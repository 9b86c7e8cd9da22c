//! Where processed messages go.

use std::net::SocketAddr;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::DecodeError;
use crate::message::DecodedMessage;

/// What came of one message read from a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Decoded(DecodedMessage),
    /// Looked like syslog but did not decode. `raw` is the input, lossily
    /// converted to UTF-8.
    Failed { error: DecodeError, raw: String },
    /// Did not start with `<` and was never handed to the decoder.
    Unparsed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub peer: SocketAddr,
    /// When the message was processed, local time.
    pub received_at: DateTime<Local>,
    pub outcome: Outcome,
}

/// Receives one report per processed message.
pub trait Sink: Send + Sync + 'static {
    fn report(&self, report: Report);
}

/// Writes every report as one log line through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn report(&self, report: Report) {
        let received_at = report.received_at.format("%Y-%m-%d %H:%M:%S");
        match report.outcome {
            Outcome::Decoded(msg) => info!(
                peer = %report.peer,
                %received_at,
                facility = msg.facility().as_str(),
                severity = msg.severity().as_str(),
                hostname = msg.hostname.as_deref().unwrap_or("-"),
                app_name = msg.app_name.as_deref().unwrap_or("-"),
                "Parsed RFC5424 message: {}",
                msg
            ),
            Outcome::Failed { error, raw } => warn!(
                peer = %report.peer,
                %received_at,
                %error,
                "Error parsing RFC5424 message: {:?}",
                raw
            ),
            Outcome::Unparsed(line) => info!(
                peer = %report.peer,
                %received_at,
                "Message: {}",
                line
            ),
        }
    }
}

/// Forwards reports over a channel, for embedding the listener in a larger
/// pipeline.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Report>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn report(&self, report: Report) {
        // the receiver went away, nobody is interested anymore
        let _ = self.tx.send(report);
    }
}
