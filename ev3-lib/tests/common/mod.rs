//! Common test utilities and shared imports

// Shared by several test files; not every helper is used by each of them.
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use ev3_lib::command::FrameHeader;
#[allow(unused_imports)]
pub use ev3_lib::port::POLL_GLOBAL_SIZE;
#[allow(unused_imports)]
pub use ev3_lib::{
    Brick, BrickConfig, CommandType, ConnectionState, ConnectionType, DeviceType, Ev3Error, InputPort, OutputPort,
    ReplyType, SystemOpcode, SystemReplyStatus,
};
#[allow(unused_imports)]
pub use std::time::Duration;

use async_trait::async_trait;
use ev3_lib::{Result, Transport, TransportFactory};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Decides the brick's answer to one written frame.
pub type Responder = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// What a fake brick has seen and how it answers. Shared between the test
/// and every transport the factory hands out.
#[derive(Clone)]
pub struct MockBrick {
    pub writes: Arc<Mutex<Vec<Vec<u8>>>>,
    pub responder: Arc<Mutex<Responder>>,
    pub fail_connect: bool,
}

#[allow(dead_code)]
impl MockBrick {
    /// A brick that never answers.
    pub fn silent() -> Self {
        Self::answering(|_| None)
    }

    pub fn answering(responder: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(Mutex::new(Arc::new(responder))),
            fail_connect: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_connect: true,
            ..Self::silent()
        }
    }

    pub fn set_responder(&self, responder: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static) {
        *self.responder.lock() = Arc::new(responder);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    pub fn brick(&self, config: BrickConfig) -> Brick {
        Brick::with_factory(config, MockFactory { brick: self.clone() })
    }
}

pub struct MockFactory {
    brick: MockBrick,
}

impl TransportFactory for MockFactory {
    fn create(&self, kind: ConnectionType, _parameter: Option<&str>) -> Result<Box<dyn Transport>> {
        let (frames, _) = broadcast::channel(64);
        Ok(Box::new(MockTransport {
            kind,
            brick: self.brick.clone(),
            frames,
            connected: false,
        }))
    }
}

pub struct MockTransport {
    kind: ConnectionType,
    brick: MockBrick,
    frames: broadcast::Sender<Bytes>,
    connected: bool,
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> ConnectionType {
        self.kind
    }

    async fn connect(&mut self) -> Result<()> {
        if self.brick.fail_connect {
            return Err(Ev3Error::DeviceNotFound("mock brick switched off".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Ev3Error::NotConnected);
        }
        self.brick.writes.lock().push(frame.to_vec());
        let responder = self.brick.responder.lock().clone();
        if let Some(reply) = responder(frame) {
            let _ = self.frames.send(Bytes::from(reply));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.frames.subscribe()
    }
}

/// Header of a written frame.
#[allow(dead_code)]
pub fn header(frame: &[u8]) -> FrameHeader {
    FrameHeader::parse(frame).expect("Failed to parse written frame")
}

/// Reply frame body as the brick sends it, length prefix stripped.
#[allow(dead_code)]
pub fn reply_frame(sequence: u16, reply_type: ReplyType, payload: &[u8]) -> Vec<u8> {
    let mut frame = sequence.to_le_bytes().to_vec();
    frame.push(reply_type.into());
    frame.extend_from_slice(payload);
    frame
}

/// System reply to `request` carrying `status` and `payload`.
#[allow(dead_code)]
pub fn system_reply(request: &[u8], status: SystemReplyStatus, payload: &[u8]) -> Vec<u8> {
    let reply_type = if status == SystemReplyStatus::Success || status == SystemReplyStatus::EndOfFile {
        ReplyType::SystemReply
    } else {
        ReplyType::SystemReplyError
    };
    let mut body = vec![request[5], status.into()];
    body.extend_from_slice(payload);
    reply_frame(header(request).sequence, reply_type, &body)
}

/// Global buffer of a poll reply with every port empty except `Three`,
/// which reads `si_three` from a color sensor.
#[allow(dead_code)]
pub fn poll_payload(si_three: f32) -> Vec<u8> {
    const STRIDE: usize = 11;
    let mut data = vec![0u8; POLL_GLOBAL_SIZE];
    for slot in 0..InputPort::ALL.len() {
        data[slot * STRIDE] = DeviceType::Empty.into();
    }
    let three = InputPort::Three.poll_slot() * STRIDE;
    data[three] = DeviceType::Color.into();
    data[three + 2..three + 6].copy_from_slice(&si_three.to_le_bytes());
    data
}

/// Responder answering every poll with `payload`.
#[allow(dead_code)]
pub fn poll_responder(payload: Arc<Mutex<Vec<u8>>>) -> impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static {
    move |frame| {
        let header = header(frame);
        match header.buffer_sizes {
            Some((size, _)) if size as usize == POLL_GLOBAL_SIZE => Some(reply_frame(
                header.sequence,
                ReplyType::DirectReply,
                &payload.lock(),
            )),
            _ => None,
        }
    }
}

/// Config with polling off so tests drive polls by hand.
#[allow(dead_code)]
pub fn manual_config() -> BrickConfig {
    BrickConfig::default().with_poll_interval(Duration::ZERO)
}
