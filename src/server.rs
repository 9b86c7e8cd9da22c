//! TCP listener: accepts connections and runs one handler task per connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandler;
use crate::sink::Sink;

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
}

impl Server {
    pub async fn bind(endpoint: SocketAddr, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(endpoint).await?;
        Ok(Self::from_listener(listener, config))
    }

    /// Serve an already bound listener.
    pub fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self { config, listener }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `cancel` fires.
    ///
    /// A failed accept is logged and the loop goes on. When
    /// `max_connections` is set, no new connection is accepted while that
    /// many are being served, pending ones wait in the kernel backlog.
    /// Cancellation also stops every open connection before this returns.
    pub async fn run(self, sink: Arc<dyn Sink>, cancel: CancellationToken) {
        let handler = Arc::new(ConnectionHandler::new(&self.config, sink));
        let limiter = self
            .config
            .max_connections
            .map(|max| Arc::new(Semaphore::new(max.min(Semaphore::MAX_PERMITS))));
        let mut connections = JoinSet::new();

        if let Ok(addr) = self.listener.local_addr() {
            info!(endpoint = %addr, framing = %self.config.framing, "Syslog listener started");
        }

        loop {
            let permit = match &limiter {
                Some(limiter) => select! {
                    permit = limiter.clone().acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        // semaphore closed
                        Err(_) => break,
                    },
                    _ = cancel.cancelled() => break,
                },
                None => None,
            };

            select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "New connection");
                        let handler = handler.clone();
                        let cancel = cancel.child_token();
                        connections.spawn(async move {
                            let _permit = permit;
                            select! {
                                result = handler.handle(stream, peer) => {
                                    if let Err(e) = result {
                                        error!(
                                            peer = %peer,
                                            error = %e,
                                            "Error reading from connection"
                                        );
                                    }
                                }
                                _ = cancel.cancelled() => {
                                    debug!(peer = %peer, "Closing connection on shutdown");
                                }
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Error accepting connection"),
                },
                _ = cancel.cancelled() => break,
            }

            // reap finished connection tasks
            while connections.try_join_next().is_some() {}
        }

        info!("Syslog listener shutting down");
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Connection task failed");
            }
        }
    }
}
