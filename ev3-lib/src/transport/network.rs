//! Wi-Fi link over TCP.
//!
//! The brick only accepts frames after a plaintext unlock request has been
//! answered; from then on the stream carries the same length-prefixed frames
//! as the serial link.

use super::framing::spawn_frame_reader;
use super::{ConnectionType, Transport, connect_failed};
use crate::constants::{NETWORK_PORT, RECEIVE_CHANNEL_CAPACITY, UNLOCK_REQUEST};
use crate::error::{Ev3Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `host:port` to dial for `address`. Bare hosts get the brick's port.
pub fn resolve_target(address: &str) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, NETWORK_PORT).to_string();
    }
    match address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => address.to_string(),
        _ => format!("{address}:{NETWORK_PORT}"),
    }
}

/// Sends the unlock request and waits for the brick's answer.
async fn unlock(stream: &mut TcpStream, wait: Duration) -> Result<String> {
    stream.write_all(UNLOCK_REQUEST).await?;
    let mut buf = [0u8; 256];
    let n = timeout(wait, stream.read(&mut buf))
        .await
        .map_err(|_| connect_failed(ConnectionType::Network, "no response to unlock request"))??;
    if n == 0 {
        return Err(connect_failed(ConnectionType::Network, "empty response to unlock request"));
    }
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

pub struct NetworkTransport {
    address: String,
    unlock_timeout: Duration,
    writer: Option<OwnedWriteHalf>,
    frames: broadcast::Sender<Bytes>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl NetworkTransport {
    pub fn new(address: impl Into<String>, unlock_timeout: Duration) -> Self {
        let (frames, _) = broadcast::channel(RECEIVE_CHANNEL_CAPACITY);
        Self {
            address: address.into(),
            unlock_timeout,
            writer: None,
            frames,
            cancel: CancellationToken::new(),
            reader: None,
        }
    }
}

impl Drop for NetworkTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> ConnectionType {
        ConnectionType::Network
    }

    async fn connect(&mut self) -> Result<()> {
        let target = resolve_target(&self.address);
        info!("Connecting to brick at {target}");
        let mut stream = TcpStream::connect(&target)
            .await
            .map_err(|e| connect_failed(ConnectionType::Network, e))?;

        let response = unlock(&mut stream, self.unlock_timeout)
            .await
            .map_err(|e| match e {
                Ev3Error::ConnectFailed { .. } => e,
                other => connect_failed(ConnectionType::Network, other),
            })?;
        debug!(response = response.trim_end(), "Unlock accepted");

        let (reader, writer) = stream.into_split();
        self.cancel = CancellationToken::new();
        self.reader = Some(spawn_frame_reader(
            reader,
            self.frames.clone(),
            self.cancel.clone(),
            ConnectionType::Network,
        ));
        self.writer = Some(writer);
        info!("Connected to {target}");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
            info!("Network connection closed");
        }
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Ev3Error::NotConnected)?;
        debug!(bytes = hex::encode(frame), "Network Write");
        writer.write_all(frame).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.frames.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_resolves_targets() {
        assert_eq!(resolve_target("10.0.0.5"), "10.0.0.5:5555");
        assert_eq!(resolve_target("10.0.0.5:6000"), "10.0.0.5:6000");
        assert_eq!(resolve_target("::1"), "[::1]:5555");
        assert_eq!(resolve_target("ev3.local"), "ev3.local:5555");
        assert_eq!(resolve_target("ev3.local:7000"), "ev3.local:7000");
    }

    #[tokio::test]
    async fn test_unlock_then_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let brick = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; UNLOCK_REQUEST.len()];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(request, UNLOCK_REQUEST);
            socket.write_all(b"Accept:EV340\r\n\r\n").await.unwrap();
            let mut frame = [0u8; 4];
            socket.read_exact(&mut frame).await.unwrap();
            socket.write_all(&[0x03, 0x00, 0x07, 0x00, 0x02]).await.unwrap();
            frame
        });

        let mut transport = NetworkTransport::new(address, Duration::from_secs(1));
        let mut inbound = transport.subscribe();
        transport.connect().await.unwrap();

        transport.write(&[0x02, 0x00, 0xaa, 0xbb]).await.unwrap();
        assert_eq!(brick.await.unwrap(), [0x02, 0x00, 0xaa, 0xbb]);
        assert_eq!(&inbound.recv().await.unwrap()[..], &[0x07, 0x00, 0x02]);
        transport.disconnect().await;
    }

    #[tokio::test]
    async fn test_closed_without_response_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; UNLOCK_REQUEST.len()];
            let _ = socket.read_exact(&mut request).await;
        });

        let mut transport = NetworkTransport::new(address, Duration::from_secs(1));
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, Ev3Error::ConnectFailed { kind: ConnectionType::Network, .. }));
        assert!(matches!(transport.write(&[0x00]).await, Err(Ev3Error::NotConnected)));
    }
}
