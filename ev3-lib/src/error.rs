use crate::opcode::{SystemOpcode, SystemReplyStatus};
use crate::transport::ConnectionType;
use nusb::transfer::TransferError;
use std::array::TryFromSliceError;
use std::io;
use thiserror::Error;

/// The primary error type for the `ev3-lib` library.
#[derive(Error, Debug)]
pub enum Ev3Error {
    #[error("{field} must be between {min} and {max} inclusive, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("EV3 brick not found: {0}")]
    DeviceNotFound(String),

    #[error("{kind} connection failed: {reason}")]
    ConnectFailed { kind: ConnectionType, reason: String },

    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("{0} connections require a connection parameter")]
    MissingConnectionParameter(ConnectionType),

    #[error("Brick still connected, must be disconnected first")]
    AlreadyConnected,

    #[error("Brick is not connected")]
    NotConnected,

    #[error("No reply for sequence {sequence} within the reply window")]
    ReplyTimeout { sequence: u16 },

    #[error("Brick reported an error for direct command with sequence {sequence}")]
    DirectReplyFailed { sequence: u16 },

    #[error("System command {opcode} failed with status {status}")]
    SystemCommandFailed {
        opcode: SystemOpcode,
        status: SystemReplyStatus,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Timeout during transport operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

impl Ev3Error {
    pub(crate) fn out_of_range(field: &'static str, value: impl Into<i64>, min: impl Into<i64>, max: impl Into<i64>) -> Self {
        Ev3Error::OutOfRange {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        }
    }

    /// True for failures that belong to establishing a connection.
    pub fn is_connect_error(&self) -> bool {
        matches!(self, Ev3Error::DeviceNotFound(_) | Ev3Error::ConnectFailed { .. })
    }
}

impl From<TryFromSliceError> for Ev3Error {
    fn from(_: TryFromSliceError) -> Self {
        Ev3Error::Protocol("Failed to convert slice to array".to_string())
    }
}

pub type Result<T> = std::result::Result<T, Ev3Error>;
