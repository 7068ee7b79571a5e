use super::ConnectionType;
use crate::constants::LENGTH_PREFIX_SIZE;
use bytes::Bytes;
use futures_lite::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Codec for the 2-byte little-endian length prefix used on stream links.
pub(crate) fn length_prefixed() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(LENGTH_PREFIX_SIZE)
        .little_endian()
        .max_frame_length(u16::MAX as usize)
        .new_codec()
}

/// Reads length-prefixed frames from `reader` until cancelled or the stream
/// ends, publishing each payload on `frames`.
///
/// Read errors are logged and never propagate.
pub(crate) fn spawn_frame_reader<R>(
    reader: R,
    frames: broadcast::Sender<Bytes>,
    cancel: CancellationToken,
    kind: ConnectionType,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut framed = FramedRead::new(reader, length_prefixed());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = framed.next() => match next {
                    Some(Ok(frame)) => {
                        debug!(%kind, bytes = hex::encode(&frame), "Frame received");
                        // No receivers is fine, the frame is simply dropped.
                        let _ = frames.send(frame.freeze());
                    }
                    Some(Err(e)) => warn!(%kind, "Receive error: {e}"),
                    None => {
                        debug!(%kind, "Stream closed");
                        break;
                    }
                },
            }
        }
    })
}
