//! Port and button table refreshed by the polling loop.
//!
//! One poll is a single direct command whose global buffer holds, for every
//! input port in [`InputPort::ALL`] order, an 11-byte reading:
//!
//! ```text
//! | type:u8 | mode:u8 | si:f32le | raw:i32le | percent:u8 |
//! ```
//!
//! followed by six button flags (back, left, up, right, down, enter).

use crate::command::Command;
use crate::constants::{POLL_BUTTON_COUNT, POLL_PORT_STRIDE};
use crate::error::{Ev3Error, Result};
use crate::opcode::CommandType;
use crate::params::Index;
use crate::types::{BrickButton, DeviceType, InputPort};
use serde::Serialize;
use zerocopy::byteorder::little_endian::{F32, I32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the global buffer requested by one poll.
pub const POLL_GLOBAL_SIZE: usize = InputPort::ALL.len() * POLL_PORT_STRIDE + POLL_BUTTON_COUNT;

const BUTTON_ORDER: [BrickButton; POLL_BUTTON_COUNT] = [
    BrickButton::Back,
    BrickButton::Left,
    BrickButton::Up,
    BrickButton::Right,
    BrickButton::Down,
    BrickButton::Enter,
];

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PortReadingRaw {
    pub device_type: u8,
    pub mode: u8,
    pub si_value: F32,
    pub raw_value: I32,
    pub percent_value: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PollReplyRaw {
    pub ports: [PortReadingRaw; 8],
    pub buttons: [u8; POLL_BUTTON_COUNT],
}

impl PollReplyRaw {
    /// Reads the poll layout from the start of a reply payload.
    pub fn parse(data: &[u8]) -> Result<PollReplyRaw> {
        if data.len() < POLL_GLOBAL_SIZE {
            return Err(Ev3Error::InsufficientData {
                expected: POLL_GLOBAL_SIZE,
                actual: data.len(),
            });
        }
        let raw = PollReplyRaw::ref_from_bytes(&data[..POLL_GLOBAL_SIZE])
            .map_err(|_| Ev3Error::Protocol("Failed to parse poll reply".to_string()))?;
        Ok(*raw)
    }
}

/// State of one input port as last seen by the poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    pub input_port: InputPort,
    /// Slot in the poll reply.
    pub index: usize,
    pub device_type: DeviceType,
    /// Mode requested when reading this port.
    pub mode: u8,
    /// Mode the brick reported for the attached device.
    pub reported_mode: u8,
    pub si_value: f32,
    pub raw_value: i32,
    pub percent_value: u8,
}

impl Port {
    pub fn new(input_port: InputPort) -> Self {
        Self {
            input_port,
            index: input_port.poll_slot(),
            device_type: DeviceType::Unknown,
            mode: 0,
            reported_mode: 0,
            si_value: 0.0,
            raw_value: 0,
            percent_value: 0,
        }
    }

    /// Stores `reading` and reports whether any compared field moved.
    /// The reported mode is stored but never compared.
    fn update(&mut self, reading: &PortReadingRaw, si_tolerance: f32) -> bool {
        let device_type = DeviceType::from(reading.device_type);
        let si_value = reading.si_value.get();
        let raw_value = reading.raw_value.get();

        let changed = self.device_type != device_type
            || (self.si_value - si_value).abs() > si_tolerance
            || self.raw_value != raw_value
            || self.percent_value != reading.percent_value;

        self.device_type = device_type;
        self.reported_mode = reading.mode;
        self.si_value = si_value;
        self.raw_value = raw_value;
        self.percent_value = reading.percent_value;
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrickButtons {
    pub back: bool,
    pub left: bool,
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub enter: bool,
}

impl BrickButtons {
    fn from_flags(flags: &[u8; POLL_BUTTON_COUNT]) -> Self {
        Self {
            back: flags[0] == 1,
            left: flags[1] == 1,
            up: flags[2] == 1,
            right: flags[3] == 1,
            down: flags[4] == 1,
            enter: flags[5] == 1,
        }
    }

    pub fn is_pressed(&self, button: BrickButton) -> bool {
        match button {
            BrickButton::Back => self.back,
            BrickButton::Left => self.left,
            BrickButton::Up => self.up,
            BrickButton::Right => self.right,
            BrickButton::Down => self.down,
            BrickButton::Enter => self.enter,
            BrickButton::Any => self.back || self.left || self.up || self.right || self.down || self.enter,
            BrickButton::None => false,
        }
    }
}

/// Copy of the whole table handed to change subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrickSnapshot {
    pub ports: Vec<Port>,
    pub buttons: BrickButtons,
}

impl BrickSnapshot {
    pub fn port(&self, input_port: InputPort) -> Option<&Port> {
        self.ports.iter().find(|p| p.input_port == input_port)
    }
}

/// The live table owned by a brick.
#[derive(Debug, Clone)]
pub(crate) struct BrickState {
    pub ports: Vec<Port>,
    pub buttons: BrickButtons,
}

impl Default for BrickState {
    fn default() -> Self {
        Self {
            ports: InputPort::ALL.iter().copied().map(Port::new).collect(),
            buttons: BrickButtons::default(),
        }
    }
}

impl BrickState {
    pub fn snapshot(&self) -> BrickSnapshot {
        BrickSnapshot {
            ports: self.ports.clone(),
            buttons: self.buttons,
        }
    }

    pub fn port_mut(&mut self, input_port: InputPort) -> &mut Port {
        &mut self.ports[input_port.poll_slot()]
    }

    /// Single direct command reading every port in its selected mode plus
    /// the button flags.
    pub fn poll_command(&self) -> Result<Command> {
        let mut command = Command::with_buffers(CommandType::DirectReply, POLL_GLOBAL_SIZE as u16, 0)?;
        for port in &self.ports {
            let base = Index::new((port.index * POLL_PORT_STRIDE) as u16)?;
            command
                .get_type_mode(port.input_port, base, base.offset(1)?)
                .ready_si(port.input_port, port.mode, base.offset(2)?)
                .ready_raw(port.input_port, port.mode, base.offset(6)?)
                .ready_percent(port.input_port, port.mode, base.offset(10)?);
        }
        let buttons = Index::new((InputPort::ALL.len() * POLL_PORT_STRIDE) as u16)?;
        for (offset, button) in BUTTON_ORDER.iter().enumerate() {
            command.is_brick_button_pressed(*button, buttons.offset(offset as u16)?);
        }
        Ok(command)
    }

    /// Folds one poll reply into the table. Returns true if anything
    /// compared differs from the previous poll.
    pub fn apply(&mut self, reply: &PollReplyRaw, si_tolerance: f32) -> bool {
        let mut changed = false;
        for (port, reading) in self.ports.iter_mut().zip(reply.ports.iter()) {
            changed |= port.update(reading, si_tolerance);
        }
        let buttons = BrickButtons::from_flags(&reply.buttons);
        changed |= buttons != self.buttons;
        self.buttons = buttons;
        changed
    }
}
