//! USB HID link.
//!
//! The brick exposes one HID interface with an interrupt endpoint pair. Each
//! transfer is one fixed-size report whose first two bytes are the frame's
//! own length prefix. Reports are handled here with the HID report ID in
//! front so offsets match the usual HID report layout; the ID byte itself is
//! never put on the bus since EV3 reports are unnumbered.

use super::{ConnectionType, Transport, connect_failed};
use crate::constants::{
    ENDPOINT_IN, ENDPOINT_OUT, HID_INTERFACE_CLASS, LENGTH_PREFIX_SIZE, PID, RECEIVE_CHANNEL_CAPACITY, REPORT_ID,
    REPORT_SIZE, VID,
};
use crate::error::{Ev3Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use nusb::transfer::{RequestBuffer, TransferError};
use nusb::{DeviceInfo, Interface};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lays `frame` out in an output report, report ID first.
pub fn encode_output_report(frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() > REPORT_SIZE {
        return Err(Ev3Error::Protocol(format!(
            "frame of {} bytes exceeds the {REPORT_SIZE} byte report",
            frame.len()
        )));
    }
    let mut report = vec![0u8; REPORT_SIZE + 1];
    report[0] = REPORT_ID;
    report[1..=frame.len()].copy_from_slice(frame);
    Ok(report)
}

/// Extracts the frame payload from an input report, report ID first.
///
/// The payload length sits at bytes 1..3 and the payload starts at byte 3.
pub fn decode_input_report(report: &[u8]) -> Option<Bytes> {
    let start = 1 + LENGTH_PREFIX_SIZE;
    if report.len() < start {
        return None;
    }
    let length = u16::from_le_bytes([report[1], report[2]]) as usize;
    let end = start + length;
    if length == 0 || end > report.len() {
        return None;
    }
    Some(Bytes::copy_from_slice(&report[start..end]))
}

/// EV3 bricks currently attached over USB.
pub fn find_bricks() -> Result<Vec<DeviceInfo>> {
    Ok(nusb::list_devices()?
        .filter(|d| d.vendor_id() == VID && d.product_id() == PID)
        .collect())
}

fn hid_interface_number(device: &DeviceInfo) -> u8 {
    device
        .interfaces()
        .find(|i| i.class() == HID_INTERFACE_CLASS)
        .map(|i| i.interface_number())
        .unwrap_or(0)
}

pub struct UsbTransport {
    write_timeout: Duration,
    interface: Option<Interface>,
    frames: broadcast::Sender<Bytes>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl UsbTransport {
    pub fn new(write_timeout: Duration) -> Self {
        let (frames, _) = broadcast::channel(RECEIVE_CHANNEL_CAPACITY);
        Self {
            write_timeout,
            interface: None,
            frames,
            cancel: CancellationToken::new(),
            reader: None,
        }
    }

    fn spawn_reader(&self, interface: Interface) -> JoinHandle<()> {
        let frames = self.frames.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let transfer = interface.interrupt_in(ENDPOINT_IN, RequestBuffer::new(REPORT_SIZE));
                let completion = tokio::select! {
                    _ = cancel.cancelled() => break,
                    completion = transfer => completion,
                };
                match completion.into_result() {
                    Ok(data) => {
                        let mut report = Vec::with_capacity(data.len() + 1);
                        report.push(REPORT_ID);
                        report.extend_from_slice(&data);
                        if let Some(frame) = decode_input_report(&report) {
                            debug!(bytes = hex::encode(&frame), "USB Read");
                            let _ = frames.send(frame);
                        }
                    }
                    Err(TransferError::Disconnected) => {
                        warn!("USB device disconnected");
                        break;
                    }
                    Err(TransferError::Cancelled) => break,
                    Err(e) => warn!("USB read error: {e}"),
                }
            }
        })
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Transport for UsbTransport {
    fn kind(&self) -> ConnectionType {
        ConnectionType::Usb
    }

    async fn connect(&mut self) -> Result<()> {
        info!("Searching for EV3 brick on USB...");
        let device_info = find_bricks()
            .map_err(|e| connect_failed(ConnectionType::Usb, e))?
            .into_iter()
            .next()
            .ok_or_else(|| Ev3Error::DeviceNotFound(format!("no USB device {VID:04x}:{PID:04x}")))?;

        info!(
            "Found brick on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );

        let number = hid_interface_number(&device_info);
        let device = device_info
            .open()
            .map_err(|e| connect_failed(ConnectionType::Usb, e))?;
        let interface = device
            .detach_and_claim_interface(number)
            .map_err(|e| connect_failed(ConnectionType::Usb, e))?;
        info!("Interface {number} claimed successfully.");

        self.cancel = CancellationToken::new();
        self.reader = Some(self.spawn_reader(interface.clone()));
        self.interface = Some(interface);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        if self.interface.take().is_some() {
            info!("USB interface released");
        }
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let interface = self.interface.as_ref().ok_or(Ev3Error::NotConnected)?;
        let report = encode_output_report(frame)?;
        debug!(bytes = hex::encode(frame), "USB Write");

        let transfer = interface.interrupt_out(ENDPOINT_OUT, report[1..].to_vec());
        let completion = timeout(self.write_timeout, transfer).await?;
        completion.into_result()?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.frames.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_report_places_frame_after_id() {
        let report = encode_output_report(&[0x05, 0x00, 0x01, 0x00, 0x80]).unwrap();
        assert_eq!(report.len(), REPORT_SIZE + 1);
        assert_eq!(report[0], REPORT_ID);
        assert_eq!(&report[1..6], &[0x05, 0x00, 0x01, 0x00, 0x80]);
        assert!(report[6..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        assert!(encode_output_report(&vec![0u8; REPORT_SIZE + 1]).is_err());
    }

    #[test]
    fn test_input_report_payload_follows_length() {
        let mut report = vec![0u8; REPORT_SIZE + 1];
        report[1..8].copy_from_slice(&[0x05, 0x00, 0x2a, 0x00, 0x02, 0x11, 0x22]);
        let frame = decode_input_report(&report).unwrap();
        assert_eq!(&frame[..], &[0x2a, 0x00, 0x02, 0x11, 0x22]);
    }

    #[test]
    fn test_truncated_input_report_is_ignored() {
        assert!(decode_input_report(&[0x00, 0x09, 0x00, 0x01]).is_none());
        assert!(decode_input_report(&[0x00, 0x00, 0x00]).is_none());
        assert!(decode_input_report(&[0x00]).is_none());
    }
}
