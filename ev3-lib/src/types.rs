//! Port, device and UI vocabulary shared by the command builders.

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use strum_macros::Display;

/// Input channel of the brick. Sensor ports are `One`..`Four`; motor ports
/// `A`..`D` can be read back as inputs as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum InputPort {
    One = 0x00,
    Two = 0x01,
    Three = 0x02,
    Four = 0x03,
    A = 0x10,
    B = 0x11,
    C = 0x12,
    D = 0x13,
}

impl InputPort {
    /// Every input port, in the order used for the poll reply layout.
    pub const ALL: [InputPort; 8] = [
        InputPort::One,
        InputPort::Two,
        InputPort::Three,
        InputPort::Four,
        InputPort::A,
        InputPort::B,
        InputPort::C,
        InputPort::D,
    ];

    /// Slot of this port inside the batched poll reply.
    pub fn poll_slot(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or_default()
    }
}

impl FromStr for InputPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "one" => Ok(InputPort::One),
            "2" | "two" => Ok(InputPort::Two),
            "3" | "three" => Ok(InputPort::Three),
            "4" | "four" => Ok(InputPort::Four),
            "a" => Ok(InputPort::A),
            "b" => Ok(InputPort::B),
            "c" => Ok(InputPort::C),
            "d" => Ok(InputPort::D),
            other => Err(format!("unknown input port '{other}'")),
        }
    }
}

/// Bit set of motor outputs. Combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OutputPort(u8);

impl OutputPort {
    pub const A: OutputPort = OutputPort(0x01);
    pub const B: OutputPort = OutputPort(0x02);
    pub const C: OutputPort = OutputPort(0x04);
    pub const D: OutputPort = OutputPort(0x08);
    pub const ALL: OutputPort = OutputPort(0x0f);

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for OutputPort {
    type Output = OutputPort;

    fn bitor(self, rhs: Self) -> Self::Output {
        OutputPort(self.0 | rhs.0)
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: String = [('A', Self::A), ('B', Self::B), ('C', Self::C), ('D', Self::D)]
            .iter()
            .filter(|(_, port)| self.0 & port.0 != 0)
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names)
    }
}

impl FromStr for OutputPort {
    type Err = String;

    /// Parses letter sets such as `"A"`, `"BC"` or `"all"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(OutputPort::ALL);
        }
        let mut bits = 0u8;
        for c in s.chars() {
            bits |= match c.to_ascii_uppercase() {
                'A' => Self::A.0,
                'B' => Self::B.0,
                'C' => Self::C.0,
                'D' => Self::D.0,
                other => return Err(format!("unknown output port '{other}'")),
            };
        }
        if bits == 0 {
            return Err("no output port given".to_string());
        }
        Ok(OutputPort(bits))
    }
}

/// Device type reported by the brick for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DeviceType {
    NxtTouch = 1,
    NxtLight = 2,
    NxtSound = 3,
    NxtColor = 4,
    NxtUltrasonic = 5,
    NxtTemperature = 6,
    LargeMotor = 7,
    MediumMotor = 8,
    Touch = 16,
    Color = 29,
    Ultrasonic = 30,
    Gyroscope = 32,
    Infrared = 33,
    Initializing = 0x7d,
    Empty = 0x7e,
    WrongPort = 0x7f,
    #[default]
    Unknown = 0xff,
}

/// Buttons on the face of the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive)]
#[repr(u8)]
pub enum BrickButton {
    None = 0,
    Up = 1,
    Enter = 2,
    Down = 3,
    Right = 4,
    Left = 5,
    Back = 6,
    Any = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LedPattern {
    Black = 0,
    Green = 1,
    Red = 2,
    Orange = 3,
    GreenFlash = 4,
    RedFlash = 5,
    OrangeFlash = 6,
    GreenPulse = 7,
    RedPulse = 8,
    OrangePulse = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive)]
#[repr(i8)]
pub enum Polarity {
    Backward = -1,
    Opposite = 0,
    Forward = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive)]
#[repr(u8)]
pub enum Color {
    Background = 0,
    Foreground = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive)]
#[repr(u8)]
pub enum FontType {
    Small = 0,
    Medium = 1,
    Large = 2,
}
