//! Integration tests: two GoopNode instances exchanging tagged streams on
//! localhost, driven through the LAN discovery path (no relay needed).

use goop_transport::{
    read_framed, write_framed, GoopNode, GoopNodeConfig, TransportError, PROTOCOL_CONTENT,
};

/// Open a stream on `PROTOCOL_CONTENT`, write a framed message, and read
/// it back on the accepting side.
#[tokio::test]
async fn two_nodes_exchange_framed_message() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let node_a = GoopNode::bind(GoopNodeConfig::new()).await.unwrap();
    let node_b = GoopNode::bind(GoopNodeConfig::new()).await.unwrap();

    let id_a = node_a.id();
    node_a.add_peer_addr(node_b.addr()).await;
    node_b.add_peer_addr(node_a.addr()).await;

    let id_b = node_b.id();
    let send_handle = tokio::spawn(async move {
        let (mut send, _recv) = node_a.open_stream(id_b, PROTOCOL_CONTENT).await.unwrap();
        write_framed(&mut send, b"hello from a").await.unwrap();
        node_a
    });

    let incoming = tokio::time::timeout(std::time::Duration::from_secs(30), node_b.accept_stream())
        .await
        .expect("accept_stream timed out")
        .unwrap();
    assert_eq!(incoming.tag, PROTOCOL_CONTENT);
    assert_eq!(incoming.peer, id_a);

    let mut recv = incoming.recv;
    let body = read_framed(&mut recv, node_b.max_message_size()).await.unwrap();
    assert_eq!(body, b"hello from a");

    let node_a = send_handle.await.unwrap();
    node_a.shutdown().await.unwrap();
    node_b.shutdown().await.unwrap();
}

/// A framed message over the configured `max_message_size` is rejected by
/// the reader without reading its body.
#[tokio::test]
async fn reject_oversized_message() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let node_a = GoopNode::bind(GoopNodeConfig::new()).await.unwrap();
    let config_b = GoopNodeConfig::new().max_message_size(64);
    let node_b = GoopNode::bind(config_b).await.unwrap();

    let id_b = node_b.id();
    node_a.add_peer_addr(node_b.addr()).await;
    node_b.add_peer_addr(node_a.addr()).await;

    let big_payload = vec![0u8; 128];
    let send_handle = tokio::spawn(async move {
        let (mut send, _recv) = node_a.open_stream(id_b, PROTOCOL_CONTENT).await.unwrap();
        write_framed(&mut send, &big_payload).await.unwrap();
        node_a
    });

    let incoming = tokio::time::timeout(std::time::Duration::from_secs(30), node_b.accept_stream())
        .await
        .expect("accept_stream timed out")
        .unwrap();

    let mut recv = incoming.recv;
    let result = read_framed(&mut recv, node_b.max_message_size()).await;
    match result.unwrap_err() {
        TransportError::MessageTooLarge { size, max } => {
            assert_eq!(size, 128);
            assert_eq!(max, 64);
        }
        e => panic!("expected MessageTooLarge, got: {e}"),
    }

    let node_a = send_handle.await.unwrap();
    node_a.shutdown().await.unwrap();
    node_b.shutdown().await.unwrap();
}

/// Bidirectional exchange over a single opened stream: A writes, B reads
/// and writes a reply on the same stream's send half.
#[tokio::test]
async fn bidirectional_exchange_on_one_stream() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let node_a = GoopNode::bind(GoopNodeConfig::new()).await.unwrap();
    let node_b = GoopNode::bind(GoopNodeConfig::new()).await.unwrap();

    let id_a = node_a.id();
    let id_b = node_b.id();
    node_a.add_peer_addr(node_b.addr()).await;
    node_b.add_peer_addr(node_a.addr()).await;

    let send_handle = tokio::spawn(async move {
        let (mut send, mut recv) = node_a.open_stream(id_b, PROTOCOL_CONTENT).await.unwrap();
        write_framed(&mut send, b"ping").await.unwrap();
        let reply = read_framed(&mut recv, node_a.max_message_size()).await.unwrap();
        (node_a, reply)
    });

    let incoming = tokio::time::timeout(std::time::Duration::from_secs(30), node_b.accept_stream())
        .await
        .expect("accept_stream timed out")
        .unwrap();
    assert_eq!(incoming.peer, id_a);

    let mut recv = incoming.recv;
    let mut send = incoming.send;
    let request = read_framed(&mut recv, node_b.max_message_size()).await.unwrap();
    assert_eq!(request, b"ping");
    write_framed(&mut send, b"pong").await.unwrap();

    let (node_a, reply) = send_handle.await.unwrap();
    assert_eq!(reply, b"pong");

    node_a.shutdown().await.unwrap();
    node_b.shutdown().await.unwrap();
}
