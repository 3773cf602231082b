//! Integration tests for the newline-delimited TCP transport.

use foyer_transport::{Connection, TcpTransport, Transport, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Binds on an OS-assigned port and returns the transport with its address.
async fn bind_local(max_frame: Option<usize>) -> (TcpTransport, String) {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    if let Some(max) = max_frame {
        transport = transport.with_max_frame_bytes(max);
    }
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_frames_are_split_on_newlines() {
    let (mut transport, addr) = bind_local(None).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

    let mut client = TcpStream::connect(&addr).await.expect("connect");
    let conn = server.await.expect("task");

    client
        .write_all(b"first\nsecond\r\n\nthird\n")
        .await
        .expect("write");

    assert_eq!(conn.recv().await.unwrap(), Some(b"first".to_vec()));
    assert_eq!(conn.recv().await.unwrap(), Some(b"second".to_vec()));
    // The blank line is skipped.
    assert_eq!(conn.recv().await.unwrap(), Some(b"third".to_vec()));
}

#[tokio::test]
async fn test_tcp_send_appends_newline() {
    let (mut transport, addr) = bind_local(None).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

    let client = TcpStream::connect(&addr).await.expect("connect");
    let conn = server.await.expect("task");

    conn.send(b"{\"hello\":1}").await.expect("send");

    let mut lines = BufReader::new(client).lines();
    let line = lines.next_line().await.unwrap().expect("a line");
    assert_eq!(line, "{\"hello\":1}");
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_eof() {
    let (mut transport, addr) = bind_local(None).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

    let client = TcpStream::connect(&addr).await.expect("connect");
    let conn = server.await.expect("task");
    drop(client);

    assert_eq!(conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_tcp_oversized_frame_is_rejected() {
    let (mut transport, addr) = bind_local(Some(8)).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

    let mut client = TcpStream::connect(&addr).await.expect("connect");
    let conn = server.await.expect("task");

    client.write_all(b"12345678\n").await.expect("write");
    assert_eq!(conn.recv().await.unwrap(), Some(b"12345678".to_vec()));

    client.write_all(b"0123456789abcdef\n").await.expect("write");
    let err = conn.recv().await.expect_err("frame too large");
    assert!(matches!(err, TransportError::FrameTooLarge(8)));
}

#[tokio::test]
async fn test_tcp_send_while_recv_pending() {
    // A reader parked in recv() must not block writes on the same peer.
    let (mut transport, addr) = bind_local(None).await;
    let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

    let client = TcpStream::connect(&addr).await.expect("connect");
    let conn = std::sync::Arc::new(server.await.expect("task"));

    let reader = std::sync::Arc::clone(&conn);
    let pending = tokio::spawn(async move { reader.recv().await });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    tokio::time::timeout(std::time::Duration::from_secs(1), conn.send(b"ping"))
        .await
        .expect("send should not wait for the reader")
        .expect("send");

    let mut lines = BufReader::new(client).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ping"));
    pending.abort();
}

#[tokio::test]
async fn test_tcp_connection_reports_peer_and_unique_ids() {
    let (mut transport, addr) = bind_local(None).await;
    let server = tokio::spawn(async move {
        let a = transport.accept().await.expect("accept a");
        let b = transport.accept().await.expect("accept b");
        (a, b)
    });

    let c1 = TcpStream::connect(&addr).await.expect("connect");
    let c2 = TcpStream::connect(&addr).await.expect("connect");
    let (a, b) = server.await.expect("task");

    assert_ne!(a.id(), b.id());
    let locals = [c1.local_addr().unwrap(), c2.local_addr().unwrap()];
    assert!(locals.contains(&a.peer_addr()));
    assert!(locals.contains(&b.peer_addr()));
}
