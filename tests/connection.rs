use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use syslog_tcp::{ChannelSink, DecodeError, Framing, Outcome, Report, Server, ServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: SocketAddr,
    reports: UnboundedReceiver<Report>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Running {
    async fn start(config: ServerConfig) -> Self {
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), config)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (sink, reports) = ChannelSink::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(Arc::new(sink), cancel.clone()));

        Self {
            addr,
            reports,
            cancel,
            task,
        }
    }

    async fn next(&mut self) -> Report {
        timeout(Duration::from_secs(5), self.reports.recv())
            .await
            .expect("timed out waiting for a report")
            .expect("sink closed")
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

fn framed(framing: Framing) -> ServerConfig {
    ServerConfig {
        framing,
        ..Default::default()
    }
}

#[tokio::test]
async fn decodes_one_message_per_read() {
    let mut server = Running::start(ServerConfig::default()).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client
        .write_all(b"<13>1 2023-10-10T14:48:00Z myhost myapp 1234 ID47 - Test message\n")
        .await
        .unwrap();

    let report = server.next().await;
    assert_eq!(report.peer, client.local_addr().unwrap());
    match report.outcome {
        Outcome::Decoded(msg) => {
            assert_eq!(msg.hostname.as_deref(), Some("myhost"));
            assert_eq!(msg.proc_id.as_deref(), Some("1234"));
            assert_eq!(msg.msg, "Test message");
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn reports_unparsed_and_failed_messages() {
    let mut server = Running::start(framed(Framing::Newline)).await;

    let input = concat!(
        "hello from a script\n",
        "<13>1 2023-10-10T14:48:00Z myhost myapp 1234 ID47 Test message\n",
        "<13>1 - - - - - - still here\n",
    );
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(input.as_bytes()).await.unwrap();

    assert_eq!(
        server.next().await.outcome,
        Outcome::Unparsed("hello from a script".to_string())
    );
    match server.next().await.outcome {
        Outcome::Failed { error, raw } => {
            assert!(matches!(error, DecodeError::IncompleteHeader(_)));
            assert_eq!(
                raw,
                "<13>1 2023-10-10T14:48:00Z myhost myapp 1234 ID47 Test message"
            );
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // a bad message does not end the connection
    assert!(matches!(
        server.next().await.outcome,
        Outcome::Decoded(msg) if msg.msg == "still here"
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_connections_do_not_mix() {
    let mut server = Running::start(framed(Framing::Newline)).await;

    let mut a = TcpStream::connect(server.addr).await.unwrap();
    let mut b = TcpStream::connect(server.addr).await.unwrap();
    let a_addr = a.local_addr().unwrap();
    let b_addr = b.local_addr().unwrap();

    for i in 0..50 {
        a.write_all(format!("<13>1 - host-a - - - - a{i}\n").as_bytes())
            .await
            .unwrap();
        b.write_all(format!("<13>1 - host-b - - - - b{i}\n").as_bytes())
            .await
            .unwrap();
    }

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    for _ in 0..100 {
        let report = server.next().await;
        let msg = match report.outcome {
            Outcome::Decoded(msg) => msg,
            other => panic!("unexpected outcome {other:?}"),
        };

        if report.peer == a_addr {
            assert_eq!(msg.hostname.as_deref(), Some("host-a"));
            from_a.push(msg.msg);
        } else {
            assert_eq!(report.peer, b_addr);
            assert_eq!(msg.hostname.as_deref(), Some("host-b"));
            from_b.push(msg.msg);
        }
    }

    // in order per connection
    assert_eq!(from_a, (0..50).map(|i| format!("a{i}")).collect::<Vec<_>>());
    assert_eq!(from_b, (0..50).map(|i| format!("b{i}")).collect::<Vec<_>>());

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_connections_do_not_mix_per_read() {
    let mut server = Running::start(ServerConfig::default()).await;

    let mut a = TcpStream::connect(server.addr).await.unwrap();
    let mut b = TcpStream::connect(server.addr).await.unwrap();
    let a_addr = a.local_addr().unwrap();
    let b_addr = b.local_addr().unwrap();

    // one message in flight at a time, so no two land in the same read
    for i in 0..20 {
        a.write_all(format!("<13>1 - host-a - - - - a{i}").as_bytes())
            .await
            .unwrap();
        b.write_all(format!("<13>1 - host-b - - - - b{i}").as_bytes())
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let report = server.next().await;
            let msg = match report.outcome {
                Outcome::Decoded(msg) => msg,
                other => panic!("unexpected outcome {other:?}"),
            };
            seen.push((report.peer, msg.hostname, msg.msg));
        }
        seen.sort_by_key(|(_, _, msg)| msg.clone());

        assert_eq!(
            seen,
            vec![
                (a_addr, Some("host-a".to_string()), format!("a{i}")),
                (b_addr, Some("host-b".to_string()), format!("b{i}")),
            ]
        );
    }

    server.shutdown().await;
}

#[tokio::test]
async fn octet_counting_across_writes() {
    let mut server = Running::start(framed(Framing::OctetCounting)).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"27 <13>1 - - - - - - sp").await.unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"lit msg9 <13>1 - -").await.unwrap();

    assert!(matches!(
        server.next().await.outcome,
        Outcome::Decoded(msg) if msg.msg == "split msg"
    ));
    assert!(matches!(
        server.next().await.outcome,
        Outcome::Failed { error: DecodeError::IncompleteHeader(_), .. }
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn connection_limit() {
    let mut server = Running::start(ServerConfig {
        framing: Framing::Newline,
        max_connections: Some(1),
        ..Default::default()
    })
    .await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    first.write_all(b"first\n").await.unwrap();
    assert_eq!(
        server.next().await.outcome,
        Outcome::Unparsed("first".to_string())
    );

    // sits in the backlog until the first connection goes away
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    second.write_all(b"second\n").await.unwrap();
    assert!(
        timeout(Duration::from_millis(200), server.reports.recv())
            .await
            .is_err()
    );

    drop(first);
    assert_eq!(
        server.next().await.outcome,
        Outcome::Unparsed("second".to_string())
    );

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_open_connections() {
    let server = Running::start(ServerConfig::default()).await;

    let _idle = TcpStream::connect(server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    server.shutdown().await;
}

#[tokio::test]
async fn connection_limit_above_semaphore_maximum() {
    let mut server = Running::start(ServerConfig {
        max_connections: Some(usize::MAX),
        ..Default::default()
    })
    .await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"still served").await.unwrap();
    assert_eq!(
        server.next().await.outcome,
        Outcome::Unparsed("still served".to_string())
    );

    server.shutdown().await;
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn connection_lifecycle_is_logged_at_info() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    // the test runtime is single threaded, connection tasks log through it too
    let _default = tracing::subscriber::set_default(subscriber);

    let mut server = Running::start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    let client_addr = client.local_addr().unwrap().to_string();
    client.write_all(b"hello").await.unwrap();
    server.next().await;
    drop(client);

    let mut logs = String::new();
    for _ in 0..100 {
        logs = captured.contents();
        if logs.contains("Connection closed") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(logs.contains("New connection"), "{logs}");
    assert!(logs.contains("Connection closed"), "{logs}");
    assert!(logs.contains(&client_addr), "{logs}");

    server.shutdown().await;
}
