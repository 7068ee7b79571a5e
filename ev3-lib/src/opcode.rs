//! Command categories, reply categories and opcodes understood by the brick.

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

/// Category byte of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandType {
    /// Direct command, brick answers with the global buffer
    DirectReply = 0x00,
    /// Direct command, brick stays silent
    DirectNoReply = 0x80,
    /// System command, brick answers with a status
    SystemReply = 0x01,
    /// System command, brick stays silent
    SystemNoReply = 0x81,
}

impl CommandType {
    /// Direct commands carry the packed global/local buffer header.
    pub fn is_direct(&self) -> bool {
        matches!(self, CommandType::DirectReply | CommandType::DirectNoReply)
    }

    pub fn expects_reply(&self) -> bool {
        matches!(self, CommandType::DirectReply | CommandType::SystemReply)
    }

    /// The reply category reported when no answer arrives in time.
    pub fn error_reply(&self) -> ReplyType {
        if self.is_direct() {
            ReplyType::DirectReplyError
        } else {
            ReplyType::SystemReplyError
        }
    }
}

/// Category byte of an inbound reply frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum ReplyType {
    DirectReply = 0x02,
    SystemReply = 0x03,
    DirectReplyError = 0x04,
    SystemReplyError = 0x05,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl ReplyType {
    pub fn is_system(&self) -> bool {
        matches!(self, ReplyType::SystemReply | ReplyType::SystemReplyError)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReplyType::DirectReplyError | ReplyType::SystemReplyError)
    }
}

/// Direct command opcodes.
///
/// Values above `0xFF` combine an opcode with its sub-command; the high byte
/// is emitted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive)]
#[repr(u16)]
pub enum Opcode {
    UiReadGetFirmware = 0x810a,
    UiWriteLed = 0x821b,
    UiButtonPressed = 0x8309,

    UiDrawUpdate = 0x8400,
    UiDrawClean = 0x8401,
    UiDrawPixel = 0x8402,
    UiDrawLine = 0x8403,
    UiDrawText = 0x8405,
    UiDrawSelectFont = 0x8411,
    UiDrawTopline = 0x8412,
    UiDrawBmpFile = 0x841c,

    SoundTone = 0x9401,
    SoundPlay = 0x9402,

    InputDeviceGetTypeMode = 0x9905,
    InputDeviceClearAll = 0x990a,
    InputDeviceGetDeviceName = 0x9915,
    InputDeviceGetModeName = 0x9916,
    InputDeviceClearChanges = 0x991a,
    InputDeviceReadyPct = 0x991b,
    InputDeviceReadyRaw = 0x991c,
    InputDeviceReadySi = 0x991d,

    OutputStop = 0xa3,
    OutputPower = 0xa4,
    OutputSpeed = 0xa5,
    OutputStart = 0xa6,
    OutputPolarity = 0xa7,
    OutputReady = 0xaa,
    OutputStepPower = 0xac,
    OutputTimePower = 0xad,
    OutputStepSpeed = 0xae,
    OutputTimeSpeed = 0xaf,
    OutputStepSync = 0xb0,
    OutputTimeSync = 0xb1,
}

impl Opcode {
    /// Wire bytes: one byte for plain opcodes, two for opcode + sub-command.
    pub fn to_bytes(self) -> Vec<u8> {
        let value: u16 = self.into();
        if value > 0xff {
            vec![(value >> 8) as u8, value as u8]
        } else {
            vec![value as u8]
        }
    }
}

/// System command opcodes (filesystem and low-level operations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum SystemOpcode {
    BeginDownload = 0x92,
    ContinueDownload = 0x93,
    BeginUpload = 0x94,
    ContinueUpload = 0x95,
    BeginGetFile = 0x96,
    ContinueGetFile = 0x97,
    CloseFileHandle = 0x98,
    ListFiles = 0x99,
    ContinueListFiles = 0x9a,
    CreateDirectory = 0x9b,
    DeleteFile = 0x9c,
    ListOpenHandles = 0x9d,
    WriteMailbox = 0x9e,
    BluetoothPin = 0x9f,
    EnterFirmwareUpdate = 0xa0,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Status byte of a system reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum SystemReplyStatus {
    Success = 0x00,
    UnknownHandle = 0x01,
    HandleNotReady = 0x02,
    CorruptFile = 0x03,
    NoHandlesAvailable = 0x04,
    NoPermission = 0x05,
    IllegalPath = 0x06,
    FileExists = 0x07,
    EndOfFile = 0x08,
    SizeError = 0x09,
    UnknownError = 0x0a,
    IllegalFilename = 0x0b,
    IllegalConnection = 0x0c,

    #[num_enum(catch_all)]
    Unknown(u8),
}
