//! Client for the LEGO MINDSTORMS EV3 brick's command protocol.
//!
//! A [`Brick`] connects over USB, Bluetooth or Wi-Fi, keeps a polled table of
//! its input ports and buttons, and exposes the command factories:
//!
//! - [`Brick::direct`] for motors, sensors, sound and screen,
//! - [`Brick::system`] for files on the brick,
//! - [`Brick::batch`] for several opcodes in one frame.
//!
//! ```no_run
//! # async fn demo() -> ev3_lib::Result<()> {
//! use ev3_lib::{Brick, BrickConfig, ConnectionType, OutputPort};
//!
//! let brick = Brick::new(BrickConfig::default());
//! brick.connect(ConnectionType::Usb, None).await?;
//! brick.direct().turn_motor_at_power_for_time(OutputPort::A, 50, 1000, true).await?;
//! brick.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod brick;
pub mod command;
pub mod config;
pub mod constants;
pub mod correlator;
pub mod direct;
pub mod error;
pub mod notify;
pub mod opcode;
mod ops;
pub mod params;
pub mod port;
pub mod reply;
pub mod system;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use batch::Batch;
pub use brick::{Brick, ConnectionState};
pub use command::Command;
pub use config::BrickConfig;
pub use correlator::{Correlator, PendingReply, ReplyOutcome};
pub use error::{Ev3Error, Result};
pub use notify::{ContextDispatcher, ContextQueue, Dispatcher, Inline, SubscriptionId, context_queue};
pub use opcode::{CommandType, Opcode, ReplyType, SystemOpcode, SystemReplyStatus};
pub use params::{Index, Power, Speed, TurnRatio, Volume};
pub use port::{BrickButtons, BrickSnapshot, Port};
pub use reply::Reply;
pub use transport::{ConnectionType, DeviceTransportFactory, Transport, TransportFactory};
pub use types::{BrickButton, Color, DeviceType, FontType, InputPort, LedPattern, OutputPort, Polarity};
