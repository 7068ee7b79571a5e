//! Matching of inbound replies to outstanding requests by sequence number.

use crate::constants::UNSOLICITED_SEQUENCE;
use crate::error::{Ev3Error, Result};
use crate::opcode::{CommandType, ReplyType};
use crate::reply::Reply;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Result of issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The command expects no reply and was handed to the transport.
    Sent,
    /// The brick answered.
    Received(Reply),
    /// No answer arrived within the reply window.
    TimedOut { sequence: u16, category: CommandType },
}

impl ReplyOutcome {
    /// Reply category of the outcome. Timeouts report the error category of
    /// the request that timed out.
    pub fn reply_type(&self) -> Option<ReplyType> {
        match self {
            ReplyOutcome::Sent => None,
            ReplyOutcome::Received(reply) => Some(reply.reply_type),
            ReplyOutcome::TimedOut { category, .. } => Some(category.error_reply()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReplyOutcome::TimedOut { .. })
    }

    /// The received reply, or the error the caller should escalate.
    pub fn into_reply(self) -> Result<Reply> {
        match self {
            ReplyOutcome::Received(reply) => Ok(reply),
            ReplyOutcome::TimedOut { sequence, .. } => Err(Ev3Error::ReplyTimeout { sequence }),
            ReplyOutcome::Sent => Err(Ev3Error::Protocol("command was sent without a reply slot".to_string())),
        }
    }
}

struct Slot {
    ticket: u64,
    sender: oneshot::Sender<Reply>,
}

struct Inner {
    next_sequence: AtomicU16,
    next_ticket: AtomicU64,
    pending: Mutex<HashMap<u16, Slot>>,
}

/// Sequence allocator and pending-reply table.
///
/// Cloning shares the same table. One instance belongs to one brick.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_sequence: AtomicU16::new(1),
                next_ticket: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Next sequence number. Wraps around and never yields 0.
    pub fn next_sequence(&self) -> u16 {
        loop {
            let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
            if sequence != UNSOLICITED_SEQUENCE {
                return sequence;
            }
        }
    }

    /// Opens a reply slot for `sequence`. Dropping the returned handle closes
    /// the slot again.
    pub fn register(&self, sequence: u16, category: CommandType) -> PendingReply {
        let (sender, receiver) = oneshot::channel();
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let replaced = self.inner.pending.lock().insert(sequence, Slot { ticket, sender });
        if replaced.is_some() {
            debug!(sequence, "Sequence reused while a reply was still pending");
        }
        PendingReply {
            sequence,
            category,
            ticket,
            receiver,
            correlator: self.clone(),
        }
    }

    /// Routes one inbound frame to its waiter.
    ///
    /// Returns false when the frame was discarded: too short, unsolicited,
    /// or for a sequence nobody waits on (anymore).
    pub fn deliver(&self, frame: &[u8]) -> bool {
        let Some(reply) = Reply::parse(frame) else {
            trace!(len = frame.len(), "Discarding short frame");
            return false;
        };
        if reply.sequence == UNSOLICITED_SEQUENCE {
            trace!(bytes = hex::encode(frame), "Discarding unsolicited frame");
            return false;
        }

        let slot = self.inner.pending.lock().remove(&reply.sequence);
        match slot {
            Some(slot) => {
                debug!(sequence = reply.sequence, reply_type = %reply.reply_type, "Reply matched");
                slot.sender.send(reply).is_ok()
            }
            None => {
                trace!(sequence = reply.sequence, "Discarding reply for unregistered sequence");
                false
            }
        }
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    fn release(&self, sequence: u16, ticket: u64) {
        let mut pending = self.inner.pending.lock();
        if pending.get(&sequence).is_some_and(|slot| slot.ticket == ticket) {
            pending.remove(&sequence);
        }
    }
}

/// Handle to one outstanding request.
pub struct PendingReply {
    sequence: u16,
    category: CommandType,
    ticket: u64,
    receiver: oneshot::Receiver<Reply>,
    correlator: Correlator,
}

impl PendingReply {
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn category(&self) -> CommandType {
        self.category
    }

    /// Suspends until the reply arrives or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> ReplyOutcome {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(reply)) => ReplyOutcome::Received(reply),
            Ok(Err(_)) | Err(_) => {
                debug!(sequence = self.sequence, category = %self.category, "Reply timed out");
                ReplyOutcome::TimedOut {
                    sequence: self.sequence,
                    category: self.category,
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.correlator.release(self.sequence, self.ticket);
    }
}
