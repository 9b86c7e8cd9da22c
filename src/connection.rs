//! Per-connection read loop: framing, decoding and reporting.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ConnectionError;
use crate::framing::{trim_line_ending, FrameDecoder, Framing};
use crate::rfc5424::Decoder;
use crate::sink::{Outcome, Report, Sink};

/// Reads messages off one connection and reports each of them to the sink.
///
/// The handler itself holds no per-connection state, a single instance can
/// serve any number of connections concurrently. Every call to
/// [`handle`](Self::handle) owns its own read buffer.
#[derive(Clone)]
pub struct ConnectionHandler {
    decoder: Decoder,
    framing: Framing,
    buffer_size: usize,
    max_frame_bytes: usize,
    sink: Arc<dyn Sink>,
}

impl ConnectionHandler {
    pub fn new(config: &ServerConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            decoder: Decoder::new().with_duplicate_ids(config.duplicate_ids),
            framing: config.framing,
            buffer_size: config.buffer_size.max(1),
            max_frame_bytes: config.max_frame_bytes,
            sink,
        }
    }

    /// Process `stream` until the peer closes it.
    ///
    /// Messages that fail to decode are reported and skipped. Only a read or
    /// framing failure ends the loop early.
    pub async fn handle<S>(&self, stream: S, peer: SocketAddr) -> Result<(), ConnectionError>
    where
        S: AsyncRead + Unpin,
    {
        debug!(peer = %peer, framing = %self.framing, "Handling connection");

        let result = match self.framing {
            Framing::PerRead => self.read_per_read(stream, peer).await,
            Framing::Newline => {
                let decoder = FrameDecoder::newline(self.max_frame_bytes);
                self.read_framed(stream, peer, decoder).await
            }
            Framing::OctetCounting => {
                let decoder = FrameDecoder::octet_counting(self.max_frame_bytes);
                self.read_framed(stream, peer, decoder).await
            }
        };

        if result.is_ok() {
            info!(peer = %peer, "Connection closed");
        }
        result
    }

    async fn read_per_read<S>(
        &self,
        mut stream: S,
        peer: SocketAddr,
    ) -> Result<(), ConnectionError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }

            self.dispatch(peer, trim_line_ending(&buf[..n]));
        }
    }

    async fn read_framed<S>(
        &self,
        stream: S,
        peer: SocketAddr,
        decoder: FrameDecoder,
    ) -> Result<(), ConnectionError>
    where
        S: AsyncRead + Unpin,
    {
        let mut framed = FramedRead::with_capacity(stream, decoder, self.buffer_size);

        while let Some(frame) = framed.next().await {
            self.dispatch(peer, &frame?);
        }

        Ok(())
    }

    /// Decode one message and report the outcome.
    ///
    /// Anything not starting with `<` is reported as an unparsed line without
    /// going through the decoder. Empty messages are dropped.
    pub fn dispatch(&self, peer: SocketAddr, message: &[u8]) {
        if message.is_empty() {
            return;
        }

        let outcome = if message.starts_with(b"<") {
            match self.decoder.decode(message) {
                Ok(msg) => Outcome::Decoded(msg),
                Err(error) => Outcome::Failed {
                    error,
                    raw: String::from_utf8_lossy(message).into_owned(),
                },
            }
        } else {
            Outcome::Unparsed(String::from_utf8_lossy(message).into_owned())
        };

        self.sink.report(Report {
            peer,
            received_at: Local::now(),
            outcome,
        });
    }
}
