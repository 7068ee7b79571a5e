mod common;
use common::*;

use ev3_lib::constants::UNLOCK_REQUEST;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Accepts one client, reads its unlock request and answers with `response`.
/// An empty response closes the socket instead.
async fn fake_brick(response: &'static [u8]) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; UNLOCK_REQUEST.len()];
        socket.read_exact(&mut request).await.unwrap();
        assert_eq!(request, UNLOCK_REQUEST);
        if response.is_empty() {
            return Vec::new();
        }
        socket.write_all(response).await.unwrap();

        // Keep the link open and collect whatever the client sends.
        let mut received = Vec::new();
        let _ = socket.read_to_end(&mut received).await;
        received
    });
    (address, task)
}

fn network_config() -> BrickConfig {
    BrickConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_reply_timeout(Duration::from_millis(50))
        .with_unlock_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_unlocked_brick_connects_and_polls() {
    let (address, server) = fake_brick(b"Accept:EV340\r\n\r\n").await;
    let brick = Brick::new(network_config());

    brick.connect(ConnectionType::Network, Some(&address)).await.unwrap();
    assert_eq!(brick.state(), ConnectionState::Connected);
    assert!(brick.is_polling());

    brick.disconnect().await.unwrap();
    assert!(!brick.is_polling());

    let received = server.await.unwrap();
    // First frame after the unlock is the stop-all issued on connect.
    assert!(received.starts_with(&[0x0c, 0x00]));
    assert_eq!(received[4], u8::from(CommandType::DirectNoReply));
    assert_eq!(&received[7..14], &[0xa3, 0x81, 0x00, 0x81, 0x0f, 0x81, 0x00]);
}

#[tokio::test]
async fn test_empty_unlock_response_fails_connect() {
    let (address, _server) = fake_brick(b"").await;
    let brick = Brick::new(network_config());

    let err = brick.connect(ConnectionType::Network, Some(&address)).await.unwrap_err();
    assert!(matches!(
        err,
        Ev3Error::ConnectFailed {
            kind: ConnectionType::Network,
            ..
        }
    ));
    assert_eq!(brick.state(), ConnectionState::Disconnected);
    assert!(!brick.is_polling());
}

#[tokio::test]
async fn test_network_requires_address() {
    let brick = Brick::new(network_config());
    assert!(matches!(
        brick.connect(ConnectionType::Network, None).await,
        Err(Ev3Error::MissingConnectionParameter(ConnectionType::Network))
    ));
    assert!(matches!(
        brick.connect(ConnectionType::Unknown, Some("x")).await,
        Err(Ev3Error::UnsupportedTransport(_))
    ));
    assert_eq!(brick.state(), ConnectionState::Disconnected);
}
