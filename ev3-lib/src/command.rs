//! Outbound frame encoding.
//!
//! A frame is laid out as
//!
//! ```text
//! | len:u16le | seq:u16le | type:u8 | [sizes:u16] | opcode(s) + parameters |
//! ```
//!
//! where `len` counts every byte after itself and `sizes` (direct commands
//! only) packs the global buffer size into the low 10 bits and the local
//! buffer size into the high 6 bits.

use crate::constants::{
    BUFFER_SIZES_SIZE, COMMAND_HEADER_SIZE, LENGTH_PREFIX_SIZE, MAX_GLOBAL_SIZE, MAX_LOCAL_SIZE, TAG_BYTE,
    TAG_GLOBAL_INDEX, TAG_GLOBAL_INDEX_LONG, TAG_INT, TAG_SHORT, TAG_STRING,
};
use crate::error::{Ev3Error, Result};
use crate::opcode::{CommandType, Opcode, SystemOpcode};
use crate::params::Index;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;

#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    pub global: B10,
    pub local: B6,
}

/// A command being assembled for the brick.
///
/// Opcodes and parameters are appended in call order; the frame prefix is
/// only written by [`Command::encode`] once the sequence number is known.
#[derive(Debug, Clone)]
pub struct Command {
    command_type: CommandType,
    global_size: u16,
    local_size: u8,
    body: BytesMut,
}

impl Command {
    /// A command without reply buffers.
    pub fn new(command_type: CommandType) -> Self {
        let mut command = Self {
            command_type,
            global_size: 0,
            local_size: 0,
            body: BytesMut::with_capacity(64),
        };
        command.write_buffer_sizes();
        command
    }

    /// A command reserving `global_size` reply bytes and `local_size` scratch
    /// bytes on the brick.
    pub fn with_buffers(command_type: CommandType, global_size: u16, local_size: u8) -> Result<Self> {
        if global_size > MAX_GLOBAL_SIZE {
            return Err(Ev3Error::out_of_range("global buffer size", global_size, 0, MAX_GLOBAL_SIZE));
        }
        if local_size > MAX_LOCAL_SIZE {
            return Err(Ev3Error::out_of_range("local buffer size", local_size, 0, MAX_LOCAL_SIZE));
        }
        let mut command = Self {
            command_type,
            global_size,
            local_size,
            body: BytesMut::with_capacity(64),
        };
        command.write_buffer_sizes();
        Ok(command)
    }

    fn write_buffer_sizes(&mut self) {
        if self.command_type.is_direct() {
            // 10 and 6 bit fields: the maximum sizes wrap to 0 on the wire.
            let sizes = BufferSizes::new()
                .with_global(self.global_size & 0x3ff)
                .with_local(self.local_size & 0x3f);
            self.body.put_slice(&sizes.into_bytes());
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn global_size(&self) -> u16 {
        self.global_size
    }

    pub fn local_size(&self) -> u8 {
        self.local_size
    }

    /// True while no opcode has been appended.
    pub fn is_empty(&self) -> bool {
        let header = if self.command_type.is_direct() { BUFFER_SIZES_SIZE } else { 0 };
        self.body.len() == header
    }

    pub fn add_opcode(&mut self, opcode: Opcode) -> &mut Self {
        self.body.put_slice(&opcode.to_bytes());
        self
    }

    pub fn add_system_opcode(&mut self, opcode: SystemOpcode) -> &mut Self {
        self.body.put_u8(opcode.into());
        self
    }

    /// Global buffer reference. Offsets that fit a byte use the one-byte
    /// form, larger ones the two-byte form.
    pub fn add_global_index(&mut self, index: Index) -> &mut Self {
        let value = index.get();
        if value <= u8::MAX as u16 {
            self.body.put_u8(TAG_GLOBAL_INDEX);
            self.body.put_u8(value as u8);
        } else {
            self.body.put_u8(TAG_GLOBAL_INDEX_LONG);
            self.body.put_u16_le(value);
        }
        self
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.body.put_u8(TAG_BYTE);
        self.body.put_u8(value);
        self
    }

    pub fn add_i8(&mut self, value: i8) -> &mut Self {
        self.body.put_u8(TAG_BYTE);
        self.body.put_i8(value);
        self
    }

    pub fn add_i16(&mut self, value: i16) -> &mut Self {
        self.body.put_u8(TAG_SHORT);
        self.body.put_i16_le(value);
        self
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.body.put_u8(TAG_SHORT);
        self.body.put_u16_le(value);
        self
    }

    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        self.body.put_u8(TAG_INT);
        self.body.put_u32_le(value);
        self
    }

    /// UTF-8 string with a trailing NUL.
    pub fn add_str(&mut self, value: &str) -> &mut Self {
        self.body.put_u8(TAG_STRING);
        self.body.put_slice(value.as_bytes());
        self.body.put_u8(0x00);
        self
    }

    // Raw parameters carry no format tag; system commands use them.

    pub fn add_raw_u8(&mut self, value: u8) -> &mut Self {
        self.body.put_u8(value);
        self
    }

    pub fn add_raw_u16(&mut self, value: u16) -> &mut Self {
        self.body.put_u16_le(value);
        self
    }

    pub fn add_raw_u32(&mut self, value: u32) -> &mut Self {
        self.body.put_u32_le(value);
        self
    }

    pub fn add_raw_str(&mut self, value: &str) -> &mut Self {
        self.body.put_slice(value.as_bytes());
        self.body.put_u8(0x00);
        self
    }

    pub fn add_raw_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.body.put_slice(data);
        self
    }

    /// Final wire bytes for this command tagged with `sequence`.
    pub fn encode(&self, sequence: u16) -> Result<Bytes> {
        let length = COMMAND_HEADER_SIZE + self.body.len();
        let length = u16::try_from(length)
            .map_err(|_| Ev3Error::Protocol(format!("command of {length} bytes does not fit a frame")))?;

        let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + length as usize);
        frame.put_u16_le(length);
        frame.put_u16_le(sequence);
        frame.put_u8(self.command_type.into());
        frame.put_slice(&self.body);
        Ok(frame.freeze())
    }
}

/// Header fields read back from an encoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u16,
    pub sequence: u16,
    pub command_type: CommandType,
    /// `(global, local)` for direct commands.
    pub buffer_sizes: Option<(u16, u8)>,
}

impl FrameHeader {
    pub fn parse(frame: &[u8]) -> Result<Self> {
        let minimum = LENGTH_PREFIX_SIZE + COMMAND_HEADER_SIZE;
        if frame.len() < minimum {
            return Err(Ev3Error::InsufficientData {
                expected: minimum,
                actual: frame.len(),
            });
        }
        let mut buf = frame;
        let length = buf.get_u16_le();
        let sequence = buf.get_u16_le();
        let type_byte = buf.get_u8();
        let command_type = CommandType::try_from(type_byte)
            .map_err(|_| Ev3Error::Protocol(format!("unknown command type {type_byte:#04x}")))?;

        let buffer_sizes = if command_type.is_direct() {
            if buf.remaining() < BUFFER_SIZES_SIZE {
                return Err(Ev3Error::InsufficientData {
                    expected: minimum + BUFFER_SIZES_SIZE,
                    actual: frame.len(),
                });
            }
            let sizes = BufferSizes::from_bytes([buf.get_u8(), buf.get_u8()]);
            Some((sizes.global(), sizes.local()))
        } else {
            None
        };

        Ok(Self {
            length,
            sequence,
            command_type,
            buffer_sizes,
        })
    }

    /// Offset of the first opcode byte.
    pub fn body_offset(&self) -> usize {
        let sizes = if self.buffer_sizes.is_some() { BUFFER_SIZES_SIZE } else { 0 };
        LENGTH_PREFIX_SIZE + COMMAND_HEADER_SIZE + sizes
    }
}
