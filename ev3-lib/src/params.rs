//! Range-checked parameter values.
//!
//! Every constructor fails with [`Ev3Error::OutOfRange`] naming the field and
//! the violated bound. Values are never clamped.

use crate::error::{Ev3Error, Result};
use std::fmt;

macro_rules! ranged_param {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $field:literal, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($repr);

        impl $name {
            pub const MIN: $repr = $min;
            pub const MAX: $repr = $max;

            pub fn new(value: impl Into<i64>) -> Result<Self> {
                let value = value.into();
                if value < Self::MIN as i64 || value > Self::MAX as i64 {
                    return Err(Ev3Error::out_of_range($field, value, Self::MIN, Self::MAX));
                }
                Ok(Self(value as $repr))
            }

            pub fn get(&self) -> $repr {
                self.0
            }
        }

        impl TryFrom<i32> for $name {
            type Error = Ev3Error;

            fn try_from(value: i32) -> Result<Self> {
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ranged_param!(
    /// Motor power in percent, negative values reverse.
    Power, i8, "power", -100, 100
);
ranged_param!(
    /// Motor speed in percent of the regulated maximum.
    Speed, i8, "speed", -100, 100
);
ranged_param!(
    /// Steering ratio for synchronized motors. 0 drives straight, +/-100 stops
    /// one side, +/-200 spins in place.
    TurnRatio, i16, "turn ratio", -200, 200
);
ranged_param!(
    /// Sound volume in percent.
    Volume, u8, "volume", 0, 100
);
ranged_param!(
    /// Offset into the brick's global reply buffer.
    Index, u16, "index", 0, 1024
);

impl Index {
    pub const ZERO: Index = Index(0);

    /// Index shifted by `offset`, re-checked against the bound.
    pub fn offset(&self, offset: u16) -> Result<Index> {
        Index::new(self.0 as i64 + offset as i64)
    }
}
