//! End-to-end tests over real TCP sockets.
//!
//! Each test binds a relay on an ephemeral port, connects plain
//! `TcpStream` clients, and asserts on the exact bytes relayed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{sleep, timeout};

use line_relay::{RelayConfig, Server};

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Read one delimited message, failing the test if none arrives in time
    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for relayed message")
            .unwrap();
        line
    }

    /// Assert that no message arrives within a short window
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(
            Duration::from_millis(300),
            self.reader.read_line(&mut line),
        )
        .await;
        match result {
            Err(_) => {}
            Ok(Ok(0)) => {}
            Ok(other) => panic!("expected no message, got {:?}: {:?}", other, line),
        }
    }
}

async fn start_relay(config: RelayConfig) -> (Arc<Server>, SocketAddr) {
    let server = Arc::new(Server::bind(config).await.unwrap());
    let addr = server.local_addr().unwrap();

    let accept = Arc::clone(&server);
    tokio::spawn(async move {
        accept.run().await;
    });

    (server, addr)
}

fn test_config() -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_string(),
        // Port 0 lets the OS pick a free port
        port: 0,
        delimiter: "\n".to_string(),
        write_timeout_secs: 2,
    }
}

/// Poll until the registry reaches the expected size
async fn wait_for_count(server: &Server, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if server.connection_count().await == expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "registry never reached {} connections (at {})",
                expected,
                server.connection_count().await
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn message_fans_out_to_all_clients_including_sender() {
    let (server, addr) = start_relay(test_config()).await;

    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;
    let mut c = Client::connect(addr).await;
    wait_for_count(&server, 3).await;

    a.send(b"hi\n").await;

    assert_eq!(a.recv_line().await, "hi\n");
    assert_eq!(b.recv_line().await, "hi\n");
    assert_eq!(c.recv_line().await, "hi\n");
    assert_eq!(server.connection_count().await, 3);
}

#[tokio::test]
async fn delimiter_framing_preserves_the_delimiter() {
    let (server, addr) = start_relay(test_config()).await;

    let mut sender = Client::connect(addr).await;
    let mut observer = Client::connect(addr).await;
    wait_for_count(&server, 2).await;

    // Two messages in a single TCP write
    sender.send(b"abc\ndef\n").await;

    assert_eq!(observer.recv_line().await, "abc\n");
    assert_eq!(observer.recv_line().await, "def\n");
    assert_eq!(sender.recv_line().await, "abc\n");
    assert_eq!(sender.recv_line().await, "def\n");
}

#[tokio::test]
async fn disconnected_client_stops_receiving() {
    let (server, addr) = start_relay(test_config()).await;

    let mut a = Client::connect(addr).await;
    let b = Client::connect(addr).await;
    let mut c = Client::connect(addr).await;
    wait_for_count(&server, 3).await;

    a.send(b"hi\n").await;
    assert_eq!(a.recv_line().await, "hi\n");
    assert_eq!(c.recv_line().await, "hi\n");
    assert_eq!(server.connection_count().await, 3);

    drop(b);
    wait_for_count(&server, 2).await;

    c.send(b"x\n").await;
    assert_eq!(a.recv_line().await, "x\n");
    assert_eq!(c.recv_line().await, "x\n");
    assert_eq!(server.connection_count().await, 2);
}

#[tokio::test]
async fn unterminated_bytes_are_never_relayed() {
    let (server, addr) = start_relay(test_config()).await;

    let mut sender = Client::connect(addr).await;
    let mut observer = Client::connect(addr).await;
    wait_for_count(&server, 2).await;

    sender.send(b"no delimiter here").await;
    drop(sender);

    observer.expect_silence().await;
    wait_for_count(&server, 1).await;
}

#[tokio::test]
async fn custom_delimiter_is_honored() {
    let config = RelayConfig {
        delimiter: ";".to_string(),
        ..test_config()
    };
    let (server, addr) = start_relay(config).await;

    let mut sender = Client::connect(addr).await;
    let mut observer = Client::connect(addr).await;
    wait_for_count(&server, 2).await;

    sender.send(b"one;two;").await;

    let mut first = Vec::new();
    timeout(
        Duration::from_secs(2),
        observer.reader.read_until(b';', &mut first),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(first, b"one;");

    let mut second = Vec::new();
    timeout(
        Duration::from_secs(2),
        observer.reader.read_until(b';', &mut second),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(second, b"two;");
}

#[tokio::test]
async fn relayed_messages_interleave_from_multiple_senders() {
    let (server, addr) = start_relay(test_config()).await;

    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;
    let mut observer = Client::connect(addr).await;
    wait_for_count(&server, 3).await;

    a.send(b"from-a\n").await;
    assert_eq!(observer.recv_line().await, "from-a\n");

    b.send(b"from-b\n").await;
    assert_eq!(observer.recv_line().await, "from-b\n");

    // Both senders also saw each other's messages
    assert_eq!(a.recv_line().await, "from-a\n");
    assert_eq!(a.recv_line().await, "from-b\n");
    assert_eq!(b.recv_line().await, "from-a\n");
    assert_eq!(b.recv_line().await, "from-b\n");
}
