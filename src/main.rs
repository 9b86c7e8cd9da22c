use std::error::Error;
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use syslog_tcp::framing::DEFAULT_MAX_FRAME_BYTES;
use syslog_tcp::{DuplicateIds, Framing, LogSink, Server, ServerConfig, DEFAULT_BUFFER_SIZE};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

type LoggerGuard = WorkerGuard;

// tokio semaphores cannot hand out more permits than this
const MAX_CONNECTIONS: usize = tokio::sync::Semaphore::MAX_PERMITS;

#[derive(Debug, Parser)]
#[command(name = "syslog-tcp")]
#[command(bin_name = "syslog-tcp")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[arg(long, env = "SYSLOG_TCP_ENDPOINT", default_value = "0.0.0.0:6601")]
    /// Address to listen on
    endpoint: SocketAddr,

    #[arg(long, env = "SYSLOG_TCP_FRAMING", default_value = "per-read")]
    /// Message framing: per-read, newline or octet-counting
    framing: Framing,

    #[arg(long, env = "SYSLOG_TCP_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    /// Bytes per socket read
    buffer_size: usize,

    #[arg(long, env = "SYSLOG_TCP_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    /// Largest frame accepted by the newline and octet-counting framings
    max_frame_size: usize,

    #[arg(long, env = "SYSLOG_TCP_MAX_CONNECTIONS", default_value_t = 0)]
    /// Connections served at once, 0 for no limit
    max_connections: usize,

    #[arg(long, env = "SYSLOG_TCP_MERGE_DUPLICATE_SD_IDS", default_value_t = false)]
    /// Merge structured data elements sharing an SD-ID
    merge_duplicate_sd_ids: bool,

    #[arg(value_enum, long, env = "SYSLOG_TCP_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl Arguments {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            framing: self.framing,
            buffer_size: self.buffer_size,
            max_frame_bytes: self.max_frame_size,
            max_connections: (self.max_connections > 0)
                .then_some(self.max_connections.min(MAX_CONNECTIONS)),
            duplicate_ids: if self.merge_duplicate_sd_ids {
                DuplicateIds::Merge
            } else {
                DuplicateIds::Preserve
            },
        }
    }
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    // flushes buffered log lines when dropped at the end of main
    let _guard = match setup_logging(opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run syslog listener.");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run(opt: Arguments) -> Result<(), BoxError> {
    let config = opt.server_config();
    let server = Server::bind(opt.endpoint, config).await?;

    let cancel_token = CancellationToken::new();
    let mut server_task = tokio::spawn(server.run(Arc::new(LogSink), cancel_token.clone()));

    select! {
        _ = signal_wait() => {
            info!("Shutdown signal received.");
            cancel_token.cancel();
        },
        res = &mut server_task => {
            res?;
            return Ok(());
        },
    }

    server_task.await?;
    Ok(())
}

#[cfg(unix)]
async fn signal_wait() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig_term = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "Unable to listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    select! {
        _ = sig_term.recv() => {},
        _ = tokio::signal::ctrl_c() => {},
    }
}

#[cfg(not(unix))]
async fn signal_wait() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Log lines are handed to a background writer thread, so a slow stdout
/// reader never blocks the runtime workers serving connections.
fn setup_logging(log_format: LogFormatArg) -> Result<LoggerGuard, BoxError> {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if log_format == LogFormatArg::Json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(non_blocking_writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()?;
    } else {
        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(guard)
}
