//! Connections to the brick
//!
//! Every transport speaks the same framing: `[u16 length LE] [payload]`,
//! where the payload is one direct command or reply body. The transports
//! only move frames; command pairing lives in the device layer.

use crate::config::TransportConfig;
use crate::protocol::{Command, Reply};
use std::io::{Read, Write};
use std::time::Duration;

mod bluetooth;
pub mod mock;
mod serial;
mod tunnel;
mod wifi;

pub use bluetooth::BluetoothConnection;
pub use serial::SerialConnection;
pub use tunnel::TunnelConnection;
pub use wifi::WifiConnection;

/// Connection error types
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Connection could not be established
    #[error("Failed to open connection: {0}")]
    OpenError(String),

    /// Read from the brick failed
    #[error("Read failed: {0}")]
    ReadError(String),

    /// Write to the brick failed
    #[error("Write failed: {0}")]
    WriteError(String),

    /// Brick sent an empty reply frame
    #[error("Brick sent an empty reply frame")]
    NoReply,

    /// Operation on a connection that is not open
    #[error("Connection is not open")]
    NotConnected,
}

/// A framed, bidirectional link to one brick.
pub trait Connection: Send {
    /// Establish the link
    fn open(&mut self) -> Result<(), ConnError>;

    /// Send one command frame
    fn send(&mut self, command: &Command) -> Result<(), ConnError>;

    /// Receive one reply frame
    fn receive(&mut self) -> Result<Reply, ConnError>;

    /// Tear the link down; safe to call when already closed
    fn close(&mut self);

    /// Whether the link is currently established
    fn is_open(&self) -> bool;
}

/// Build the connection named by the configuration. The link is not
/// opened here; callers decide when to connect.
pub fn create_connection(config: &TransportConfig) -> Box<dyn Connection> {
    match config {
        TransportConfig::Serial { device, baud_rate } => {
            Box::new(SerialConnection::new(device, *baud_rate))
        }
        TransportConfig::Bluetooth { device_name } => {
            Box::new(BluetoothConnection::new(device_name))
        }
        TransportConfig::TunnelListen { port } => Box::new(TunnelConnection::listen(*port)),
        TransportConfig::TunnelDial { host, port } => Box::new(TunnelConnection::dial(host, *port)),
        TransportConfig::Wifi { timeout_ms } => {
            Box::new(WifiConnection::new(Duration::from_millis(*timeout_ms)))
        }
    }
}

/// Encode a frame length (little-endian on the wire)
pub fn encode_length(len: u16) -> [u8; 2] {
    len.to_le_bytes()
}

/// Decode a frame length
pub fn decode_length(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

pub(crate) fn write_frame<W: Write + ?Sized>(w: &mut W, payload: &[u8]) -> Result<(), ConnError> {
    let len = payload.len();
    if len > u16::MAX as usize {
        return Err(ConnError::WriteError(format!("frame too large: {} bytes", len)));
    }
    let mut buf = Vec::with_capacity(len + 2);
    buf.extend_from_slice(&encode_length(len as u16));
    buf.extend_from_slice(payload);
    w.write_all(&buf)
        .map_err(|e| ConnError::WriteError(e.to_string()))?;
    w.flush().map_err(|e| ConnError::WriteError(e.to_string()))?;
    Ok(())
}

pub(crate) fn read_frame<R: Read + ?Sized>(r: &mut R) -> Result<Vec<u8>, ConnError> {
    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)
        .map_err(|e| ConnError::ReadError(e.to_string()))?;
    let len = decode_length(len_buf) as usize;
    if len == 0 {
        return Err(ConnError::NoReply);
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .map_err(|e| ConnError::ReadError(e.to_string()))?;
    Ok(payload)
}

pub(crate) fn reply_from_frame(frame: &[u8]) -> Result<Reply, ConnError> {
    Reply::parse(frame).map_err(|e| ConnError::ReadError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_round_trip() {
        for len in [0u16, 1, 5, 255, 256, 1000, u16::MAX] {
            assert_eq!(decode_length(encode_length(len)), len);
        }
    }

    #[test]
    fn test_length_is_little_endian() {
        assert_eq!(encode_length(0x0102), [0x02, 0x01]);
        // lengths above 255 must survive: the high byte goes second
        assert_eq!(encode_length(300), [0x2C, 0x01]);
        assert_eq!(decode_length([0x2C, 0x01]), 300);
    }

    #[test]
    fn test_frame_round_trip() {
        let payload = vec![0xAB; 300];
        let mut wire = Vec::new();
        write_frame(&mut wire, &payload).unwrap();
        assert_eq!(wire.len(), 302);
        assert_eq!(&wire[..2], &encode_length(300));

        let mut cursor = std::io::Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap(), payload);
    }

    #[test]
    fn test_empty_frame_is_no_reply() {
        let mut cursor = std::io::Cursor::new(vec![0x00, 0x00]);
        assert!(matches!(read_frame(&mut cursor), Err(ConnError::NoReply)));
    }

    #[test]
    fn test_short_frame_is_read_error() {
        let mut cursor = std::io::Cursor::new(vec![0x05, 0x00, 0x01, 0x02]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ConnError::ReadError(_))
        ));
    }
}
