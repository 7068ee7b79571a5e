//! Links to the brick.
//!
//! Every link carries the same length-prefixed frames; only the way bytes
//! reach the brick differs. Inbound frames are published on a broadcast
//! channel with the 2-byte length prefix already removed.

pub mod bluetooth;
mod framing;
pub mod network;
pub mod usb;

pub use bluetooth::BluetoothTransport;
pub use network::NetworkTransport;
pub use usb::UsbTransport;

use crate::constants::{DEFAULT_UNLOCK_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use crate::error::{Ev3Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::broadcast;

/// Kind of link used to reach the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConnectionType {
    #[strum(to_string = "USB")]
    Usb,
    Bluetooth,
    Network,
    Unknown,
}

impl ConnectionType {
    /// Whether the kind needs a device name or address to connect.
    pub fn requires_parameter(&self) -> bool {
        matches!(self, ConnectionType::Bluetooth | ConnectionType::Network)
    }
}

impl FromStr for ConnectionType {
    type Err = Ev3Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "usb" => Ok(ConnectionType::Usb),
            "bluetooth" | "bt" => Ok(ConnectionType::Bluetooth),
            "network" | "wifi" | "tcp" => Ok(ConnectionType::Network),
            other => Err(Ev3Error::UnsupportedTransport(other.to_string())),
        }
    }
}

/// Byte pipe to the brick.
///
/// Frames handed to [`Transport::write`] are complete, including the length
/// prefix. Frames read back are published to every receiver obtained from
/// [`Transport::subscribe`] without their length prefix.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> ConnectionType;

    async fn connect(&mut self) -> Result<()>;

    /// Stops the receive loop and releases the link. Never fails.
    async fn disconnect(&mut self);

    async fn write(&mut self, frame: &[u8]) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<Bytes>;
}

/// Builds a transport for a connection kind and its parameter.
pub trait TransportFactory: Send + Sync {
    fn create(&self, kind: ConnectionType, parameter: Option<&str>) -> Result<Box<dyn Transport>>;
}

/// Factory producing the real USB, Bluetooth and network links.
#[derive(Debug, Clone)]
pub struct DeviceTransportFactory {
    pub write_timeout: Duration,
    pub unlock_timeout: Duration,
}

impl Default for DeviceTransportFactory {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            unlock_timeout: DEFAULT_UNLOCK_TIMEOUT,
        }
    }
}

impl TransportFactory for DeviceTransportFactory {
    fn create(&self, kind: ConnectionType, parameter: Option<&str>) -> Result<Box<dyn Transport>> {
        let parameter = parameter.map(str::trim).filter(|p| !p.is_empty());
        match (kind, parameter) {
            (ConnectionType::Usb, _) => Ok(Box::new(UsbTransport::new(self.write_timeout))),
            (ConnectionType::Bluetooth, Some(device)) => Ok(Box::new(BluetoothTransport::new(device))),
            (ConnectionType::Network, Some(address)) => {
                Ok(Box::new(NetworkTransport::new(address, self.unlock_timeout)))
            }
            (ConnectionType::Bluetooth | ConnectionType::Network, None) => {
                Err(Ev3Error::MissingConnectionParameter(kind))
            }
            (ConnectionType::Unknown, _) => Err(Ev3Error::UnsupportedTransport(kind.to_string())),
        }
    }
}

pub(crate) fn connect_failed(kind: ConnectionType, reason: impl ToString) -> Ev3Error {
    Ev3Error::ConnectFailed {
        kind,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_connection_kinds() {
        assert_eq!("USB".parse::<ConnectionType>().unwrap(), ConnectionType::Usb);
        assert_eq!("bt".parse::<ConnectionType>().unwrap(), ConnectionType::Bluetooth);
        assert_eq!("wifi".parse::<ConnectionType>().unwrap(), ConnectionType::Network);
        assert!(matches!(
            "zigbee".parse::<ConnectionType>(),
            Err(Ev3Error::UnsupportedTransport(kind)) if kind == "zigbee"
        ));
    }

    #[test]
    fn test_factory_checks_parameters() {
        let factory = DeviceTransportFactory::default();
        assert!(matches!(
            factory.create(ConnectionType::Network, None),
            Err(Ev3Error::MissingConnectionParameter(ConnectionType::Network))
        ));
        assert!(matches!(
            factory.create(ConnectionType::Bluetooth, Some("  ")),
            Err(Ev3Error::MissingConnectionParameter(ConnectionType::Bluetooth))
        ));
        assert!(matches!(
            factory.create(ConnectionType::Unknown, Some("x")),
            Err(Ev3Error::UnsupportedTransport(_))
        ));
        let usb = factory.create(ConnectionType::Usb, None).unwrap();
        assert_eq!(usb.kind(), ConnectionType::Usb);
        let network = factory.create(ConnectionType::Network, Some("10.0.0.5")).unwrap();
        assert_eq!(network.kind(), ConnectionType::Network);
    }
}
