//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket server and client to verify that data
//! actually flows over the network.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use foyer_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    /// Connects a tokio-tungstenite client to the given address.
    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        // Client → server, text frames arrive as their UTF-8 bytes.
        client_ws
            .send(Message::Text("hello".into()))
            .await
            .expect("client send");
        let received = server_conn.recv().await.expect("recv");
        assert_eq!(received, Some(b"hello".to_vec()));

        // Server → client.
        server_conn.send(b"world").await.expect("server send");
        let msg = client_ws
            .next()
            .await
            .expect("stream open")
            .expect("frame");
        assert_eq!(msg.into_data().as_ref(), b"world");
    }

    #[tokio::test]
    async fn test_websocket_close_yields_none() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        client_ws.close(None).await.expect("close");
        assert_eq!(server_conn.recv().await.expect("recv"), None);
    }
}
