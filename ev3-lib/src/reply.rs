//! Inbound reply frames.

use crate::constants::{MIN_REPLY_SIZE, SYSTEM_REPLY_HEADER_SIZE};
use crate::opcode::{ReplyType, SystemOpcode, SystemReplyStatus};
use bytes::{Buf, Bytes};
use std::fmt;

/// A decoded reply from the brick.
///
/// `data` is the global buffer contents for direct replies and whatever
/// follows the status byte for system replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub sequence: u16,
    pub reply_type: ReplyType,
    pub system_opcode: Option<SystemOpcode>,
    pub status: Option<SystemReplyStatus>,
    pub data: Bytes,
}

impl Reply {
    /// Decodes a reply frame with its length prefix already stripped.
    ///
    /// Returns `None` for frames too short to carry a header.
    pub fn parse(frame: &[u8]) -> Option<Reply> {
        if frame.len() < MIN_REPLY_SIZE {
            return None;
        }
        let mut buf = frame;
        let sequence = buf.get_u16_le();
        let reply_type = ReplyType::from(buf.get_u8());

        if reply_type.is_system() && frame.len() >= SYSTEM_REPLY_HEADER_SIZE {
            let opcode = SystemOpcode::from(buf.get_u8());
            let status = SystemReplyStatus::from(buf.get_u8());
            return Some(Reply {
                sequence,
                reply_type,
                system_opcode: Some(opcode),
                status: Some(status),
                data: Bytes::copy_from_slice(buf),
            });
        }

        Some(Reply {
            sequence,
            reply_type,
            system_opcode: None,
            status: None,
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub fn is_error(&self) -> bool {
        self.reply_type.is_error()
    }

    /// System status, treating a missing status as an unknown error.
    pub fn system_status(&self) -> SystemReplyStatus {
        self.status.unwrap_or(SystemReplyStatus::UnknownError)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reply #{} {}", self.sequence, self.reply_type)?;
        if let (Some(opcode), Some(status)) = (self.system_opcode, self.status) {
            write!(f, " {opcode}: {status}")?;
        }
        write!(f, " ({} bytes)", self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_frames_are_no_data() {
        assert!(Reply::parse(&[]).is_none());
        assert!(Reply::parse(&[0x01, 0x00]).is_none());
    }

    #[test]
    fn test_parses_direct_reply() {
        let reply = Reply::parse(&[0x2a, 0x00, 0x02, 0xde, 0xad]).unwrap();
        assert_eq!(reply.sequence, 42);
        assert_eq!(reply.reply_type, ReplyType::DirectReply);
        assert_eq!(reply.system_opcode, None);
        assert_eq!(&reply.data[..], &[0xde, 0xad]);
    }

    #[test]
    fn test_parses_system_reply_status() {
        let reply = Reply::parse(&[0x07, 0x01, 0x03, 0x92, 0x00, 0x05]).unwrap();
        assert_eq!(reply.sequence, 0x0107);
        assert_eq!(reply.reply_type, ReplyType::SystemReply);
        assert_eq!(reply.system_opcode, Some(SystemOpcode::BeginDownload));
        assert_eq!(reply.status, Some(SystemReplyStatus::Success));
        assert_eq!(&reply.data[..], &[0x05]);
    }

    #[test]
    fn test_truncated_system_reply_has_no_status() {
        let reply = Reply::parse(&[0x01, 0x00, 0x05, 0x9c]).unwrap();
        assert_eq!(reply.reply_type, ReplyType::SystemReplyError);
        assert_eq!(reply.status, None);
        assert_eq!(reply.system_status(), SystemReplyStatus::UnknownError);
    }
}
