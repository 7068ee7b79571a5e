//! Bluetooth link over an RFCOMM serial port.

use super::framing::spawn_frame_reader;
use super::{ConnectionType, Transport, connect_failed};
use crate::constants::{BLUETOOTH_BAUD_RATE, RECEIVE_CHANNEL_CAPACITY};
use crate::error::{Ev3Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialPortType, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Serial ports the OS currently knows about.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    Ok(tokio_serial::available_ports()?)
}

/// Picks the port for `device`: an exact port name match wins, otherwise
/// the first Bluetooth port whose name contains `device`.
pub fn select_port<'a>(ports: &'a [SerialPortInfo], device: &str) -> Option<&'a SerialPortInfo> {
    let needle = device.to_ascii_lowercase();
    ports.iter().find(|p| p.port_name == device).or_else(|| {
        ports.iter().find(|p| {
            matches!(p.port_type, SerialPortType::BluetoothPort) && p.port_name.to_ascii_lowercase().contains(&needle)
        })
    })
}

pub struct BluetoothTransport {
    device: String,
    writer: Option<WriteHalf<SerialStream>>,
    frames: broadcast::Sender<Bytes>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl BluetoothTransport {
    pub fn new(device: impl Into<String>) -> Self {
        let (frames, _) = broadcast::channel(RECEIVE_CHANNEL_CAPACITY);
        Self {
            device: device.into(),
            writer: None,
            frames,
            cancel: CancellationToken::new(),
            reader: None,
        }
    }
}

impl Drop for BluetoothTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Transport for BluetoothTransport {
    fn kind(&self) -> ConnectionType {
        ConnectionType::Bluetooth
    }

    async fn connect(&mut self) -> Result<()> {
        info!("Looking up Bluetooth port for '{}'", self.device);
        let ports = list_ports().map_err(|e| connect_failed(ConnectionType::Bluetooth, e))?;
        let port = select_port(&ports, &self.device)
            .ok_or_else(|| Ev3Error::DeviceNotFound(format!("no serial port matches '{}'", self.device)))?;

        let stream = tokio_serial::new(&port.port_name, BLUETOOTH_BAUD_RATE)
            .open_native_async()
            .map_err(|e| connect_failed(ConnectionType::Bluetooth, e))?;
        info!("Opened {}", port.port_name);

        let (reader, writer) = tokio::io::split(stream);
        self.cancel = CancellationToken::new();
        self.reader = Some(spawn_frame_reader(
            reader,
            self.frames.clone(),
            self.cancel.clone(),
            ConnectionType::Bluetooth,
        ));
        self.writer = Some(writer);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
            info!("Bluetooth port closed");
        }
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Ev3Error::NotConnected)?;
        debug!(bytes = hex::encode(frame), "Bluetooth Write");
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.frames.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, port_type: SerialPortType) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type,
        }
    }

    #[test]
    fn test_exact_name_wins() {
        let ports = vec![
            port("/dev/rfcomm0", SerialPortType::BluetoothPort),
            port("/dev/ttyUSB0", SerialPortType::Unknown),
        ];
        assert_eq!(select_port(&ports, "/dev/ttyUSB0").unwrap().port_name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_falls_back_to_bluetooth_substring() {
        let ports = vec![
            port("/dev/ttyACM0", SerialPortType::PciPort),
            port("/dev/rfcomm1", SerialPortType::BluetoothPort),
        ];
        assert_eq!(select_port(&ports, "RFCOMM").unwrap().port_name, "/dev/rfcomm1");
        assert!(select_port(&ports, "ttyACM").is_none());
    }
}
