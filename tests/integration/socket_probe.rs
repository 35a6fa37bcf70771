//! Integration tests for the socket probe
//!
//! One command is written, one read is performed and the expected text is
//! looked for in that read only.

use std::time::Duration;

use assert_matches::assert_matches;
use health_probes::error::{AcquisitionError, CheckError};
use health_probes::runner::CheckRunner;
use health_probes::sources::socket::{SocketProbe, SocketTarget};
use tokio::net::TcpListener;

use crate::helpers::{spawn_reply_server, spawn_silent_server};

fn ping(address: String, timeout: Duration) -> SocketProbe {
    SocketProbe::new(SocketTarget::Tcp(address), "PING", "+PONG", timeout).unwrap()
}

#[tokio::test]
async fn test_socket_matching_reply() {
    let address = spawn_reply_server(b"+PONG\r\n").await;
    let runner = CheckRunner::new(ping(address, Duration::from_secs(3)));

    let outcome = runner.run().await;
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(
        outcome.stdout.as_deref(),
        Some("Returned output: +PONG, Expected output:+PONG")
    );
}

#[tokio::test]
async fn test_socket_non_matching_reply() {
    let address = spawn_reply_server(b"-ERR").await;
    let runner = CheckRunner::new(ping(address, Duration::from_secs(3)));

    let outcome = runner.run().await;
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(
        outcome.stdout.as_deref(),
        Some("Returned output: -ERR, Expected output:+PONG")
    );
}

#[tokio::test]
async fn test_socket_command_is_newline_terminated() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buffer = [0u8; 16];
        let read = stream.read(&mut buffer).await.unwrap();
        stream.write_all(b"+PONG\r\n").await.unwrap();
        buffer[..read].to_vec()
    });

    let runner = CheckRunner::new(ping(address, Duration::from_secs(3)));
    assert_eq!(runner.run().await.exit_code, 0);
    assert_eq!(server.await.unwrap(), b"PING\n".to_vec());
}

#[tokio::test]
async fn test_socket_connection_refused() {
    // bind and drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let runner = CheckRunner::new(ping(address, Duration::from_secs(3)));

    let err = runner.check().await.unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::Connect { .. }));
    assert_eq!(runner.run().await.exit_code, 2);
}

#[tokio::test]
async fn test_socket_read_deadline() {
    let address = spawn_silent_server().await;
    let runner = CheckRunner::new(ping(address, Duration::from_millis(300)));

    let err = runner.check().await.unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::Timeout { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.sock");
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buffer = [0u8; 16];
        let _ = stream.read(&mut buffer).await;
        let _ = stream.write_all(b"+PONG\r\n").await;
    });

    let probe =
        SocketProbe::new(SocketTarget::Unix(path), "PING", "+PONG", Duration::from_secs(3)).unwrap();
    assert_eq!(CheckRunner::new(probe).run().await.exit_code, 0);
}
