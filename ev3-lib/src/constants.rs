// Protocol constants for the EV3 brick

use std::time::Duration;

/// Size of the little-endian length prefix that starts every frame
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Sequence (2) + command type (1)
pub const COMMAND_HEADER_SIZE: usize = 3;

/// Packed global/local buffer sizes, present only on direct commands
pub const BUFFER_SIZES_SIZE: usize = 2;

/// Smallest reply frame that carries a sequence and a reply type
pub const MIN_REPLY_SIZE: usize = 3;

/// Sequence (2) + reply type (1) + echoed system opcode (1) + status (1)
pub const SYSTEM_REPLY_HEADER_SIZE: usize = 5;

/// Largest global (reply) buffer the brick accepts
pub const MAX_GLOBAL_SIZE: u16 = 1024;

/// Largest local scratch buffer the brick accepts
pub const MAX_LOCAL_SIZE: u8 = 64;

/// Sequence number the brick uses for unsolicited frames
pub const UNSOLICITED_SEQUENCE: u16 = 0;

/// Largest payload carried by one "continue download" chunk
pub const FILE_CHUNK_SIZE: usize = 960;

/// Bytes per input port in the batched poll reply
pub const POLL_PORT_STRIDE: usize = 11;

/// Number of button flags appended after the port block
pub const POLL_BUTTON_COUNT: usize = 6;

/// Maximum length requested for the firmware version string
pub const FIRMWARE_VERSION_SIZE: u16 = 0x10;

/// Maximum length requested for device and mode names
pub const NAME_BUFFER_SIZE: u16 = 0x7f;

// Parameter format tags
pub const TAG_BYTE: u8 = 0x81;
pub const TAG_SHORT: u8 = 0x82;
pub const TAG_INT: u8 = 0x83;
pub const TAG_STRING: u8 = 0x84;
pub const TAG_GLOBAL_INDEX: u8 = 0xE1;
pub const TAG_GLOBAL_INDEX_LONG: u8 = 0xE2;

// USB identification
pub const VID: u16 = 0x0694;
pub const PID: u16 = 0x0005;
pub const HID_INTERFACE_CLASS: u8 = 0x03;
pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x81;

/// HID report payload size, excluding the report ID byte
pub const REPORT_SIZE: usize = 1024;

/// EV3 reports are unnumbered, so the ID slot is always zero
pub const REPORT_ID: u8 = 0x00;

/// Baud rate handed to the serial driver for RFCOMM links
pub const BLUETOOTH_BAUD_RATE: u32 = 115_200;

/// TCP port the brick listens on once Wi-Fi is enabled
pub const NETWORK_PORT: u16 = 5555;

/// Plaintext request that unlocks the brick's TCP session
pub const UNLOCK_REQUEST: &[u8] = b"GET /target?sn=\r\nProtocol:EV3\r\n\r\n";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_SI_TOLERANCE: f32 = 0.01;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_UNLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the inbound frame fan-out channel of every transport
pub const RECEIVE_CHANNEL_CAPACITY: usize = 256;
