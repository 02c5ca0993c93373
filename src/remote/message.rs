//! Control protocol message framing

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Default TCP port of the control server
pub const DEFAULT_PORT: u16 = 5429;

pub(crate) const HEADER_LEN: usize = 12;

/// Command discriminants; the wire carries them as i32 LE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Null = 0,
    Left = 1,
    Right = 2,
    Forward = 3,
    Back = 4,
    Map = 5,
    Info = 6,
    Auto = 7,
    Off = 8,
    Hello = 9,
    Ack = 10,
    Sense = 11,
    RemoteControl = 12,
    Speed = 13,
    Turn = 14,
    CorrectPosition = 15,
}

impl TryFrom<i32> for RemoteCommand {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        use RemoteCommand::*;
        Ok(match value {
            0 => Null,
            1 => Left,
            2 => Right,
            3 => Forward,
            4 => Back,
            5 => Map,
            6 => Info,
            7 => Auto,
            8 => Off,
            9 => Hello,
            10 => Ack,
            11 => Sense,
            12 => RemoteControl,
            13 => Speed,
            14 => Turn,
            15 => CorrectPosition,
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unknown remote command {}",
                    other
                )))
            }
        })
    }
}

/// One control message: a fixed 12-byte header of three i32 LE fields
/// (`command`, `param1`, `param2`) followed by an optional payload.
/// Requests carry no payload; only `Sense` and `Info` responses do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    pub command: RemoteCommand,
    pub param1: i32,
    pub param2: i32,
    pub payload: Vec<u8>,
}

impl RemoteMessage {
    pub fn new(command: RemoteCommand, param1: i32, param2: i32) -> Self {
        RemoteMessage {
            command,
            param1,
            param2,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(command: RemoteCommand, param1: i32, param2: i32, payload: Vec<u8>) -> Self {
        RemoteMessage {
            command,
            param1,
            param2,
            payload,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.command as i32).to_le_bytes());
        buf.extend_from_slice(&self.param1.to_le_bytes());
        buf.extend_from_slice(&self.param2.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a header; the payload, if any, is attached by the caller
    pub fn from_header(data: &[u8; HEADER_LEN]) -> Result<Self> {
        let command = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        Ok(RemoteMessage {
            command: RemoteCommand::try_from(command)?,
            param1: i32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            param2: i32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            payload: Vec::new(),
        })
    }

    /// Read one 12-byte header from the stream
    pub fn read_header<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        Self::from_header(&header)
    }

    /// Write the whole message to the stream
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let msg = RemoteMessage::new(RemoteCommand::Forward, 150, 60);
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &150i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &60i32.to_le_bytes());
    }

    #[test]
    fn test_read_header_round_trip() {
        let msg = RemoteMessage::new(RemoteCommand::CorrectPosition, -5, 12);
        let mut cursor = std::io::Cursor::new(msg.to_bytes());
        assert_eq!(RemoteMessage::read_header(&mut cursor).unwrap(), msg);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut header = [0u8; 12];
        header[0..4].copy_from_slice(&99i32.to_le_bytes());
        assert!(RemoteMessage::from_header(&header).is_err());
    }

    #[test]
    fn test_payload_appends_after_header() {
        let msg = RemoteMessage::with_payload(RemoteCommand::Info, 0, 0, vec![1, 2, 3]);
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), 15);
        assert_eq!(&bytes[12..], &[1, 2, 3]);
    }
}
