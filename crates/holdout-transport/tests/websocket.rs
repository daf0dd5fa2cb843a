//! Integration tests for the WebSocket transport.
//!
//! A real listener and a real client on loopback; the server side is
//! driven through the `Transport`/`Connection` traits only.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use holdout_transport::{
        Connection, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an OS-chosen port and returns the transport and its address.
    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");
        (transport, addr.to_string())
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn accept_pair(
        mut transport: WebSocketTransport,
        addr: &str,
    ) -> (WebSocketConnection, ClientWs) {
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client = connect_client(addr).await;
        (server.await.expect("accept task"), client)
    }

    #[tokio::test]
    async fn test_send_and_receive_both_directions() {
        let (transport, addr) = bind().await;
        let (server_conn, mut client) = accept_pair(transport, &addr).await;

        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.peer_addr().is_some());

        server_conn.send(br#"{"type":"Ping"}"#).await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "utf-8 frames should go out as text");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"Ping"}"#);

        client
            .send(Message::Text(r#"{"type":"Hello"}"#.into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, br#"{"type":"Hello"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (transport, addr) = bind().await;
        let (server_conn, mut client) = accept_pair(transport, &addr).await;

        client.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        let (transport, addr) = bind().await;
        let (server_conn, mut client) = accept_pair(transport, &addr).await;
        let server_conn = Arc::new(server_conn);

        let reader = {
            let conn = Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The reader holds the read half; a write must still go through.
        tokio::time::timeout(
            Duration::from_secs(1),
            server_conn.send(b"pushed"),
        )
        .await
        .expect("send must not block on a pending recv")
        .unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"pushed");

        client.send(Message::Text("reply".into())).await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got, b"reply");
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (transport, addr) = bind().await;
        let transport = transport.with_max_frame(8);
        let (server_conn, mut client) = accept_pair(transport, &addr).await;

        client
            .send(Message::Text("this is far too long".into()))
            .await
            .unwrap();

        let err = server_conn.recv().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::FrameTooLarge { limit: 8, .. }
        ));
    }
}
