use crate::brick::Brick;
use crate::command::Command;
use crate::correlator::ReplyOutcome;
use crate::error::{Ev3Error, Result};
use crate::opcode::{SystemOpcode, SystemReplyStatus};
use bytes::Bytes;
use std::ops::{Deref, DerefMut};

/// Several opcodes sent as one frame.
///
/// Builders from [`Command`] are reachable directly on the batch:
///
/// ```no_run
/// # async fn demo(brick: &ev3_lib::Brick) -> ev3_lib::Result<()> {
/// use ev3_lib::{CommandType, OutputPort, Power};
///
/// let mut batch = brick.batch(CommandType::DirectNoReply);
/// batch
///     .turn_motor_at_power(OutputPort::B | OutputPort::C, Power::new(50)?)
///     .start_motor(OutputPort::B | OutputPort::C);
/// batch.send().await?;
/// # Ok(())
/// # }
/// ```
pub struct Batch<'a> {
    brick: &'a Brick,
    command: Command,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(brick: &'a Brick, command: Command) -> Self {
        Self { brick, command }
    }

    /// Sends the batch. Returns the reply payload for categories that expect
    /// one, `None` otherwise.
    pub async fn send(self) -> Result<Option<Bytes>> {
        match self.brick.execute(&self.command).await? {
            ReplyOutcome::Sent => Ok(None),
            outcome => {
                let reply = outcome.into_reply()?;
                if reply.reply_type.is_system() {
                    let status = reply.system_status();
                    if reply.is_error() || status != SystemReplyStatus::Success {
                        return Err(Ev3Error::SystemCommandFailed {
                            opcode: reply.system_opcode.unwrap_or(SystemOpcode::Unknown(0)),
                            status,
                        });
                    }
                } else if reply.is_error() {
                    return Err(Ev3Error::DirectReplyFailed {
                        sequence: reply.sequence,
                    });
                }
                Ok(Some(reply.data))
            }
        }
    }
}

impl Deref for Batch<'_> {
    type Target = Command;

    fn deref(&self) -> &Command {
        &self.command
    }
}

impl DerefMut for Batch<'_> {
    fn deref_mut(&mut self) -> &mut Command {
        &mut self.command
    }
}
