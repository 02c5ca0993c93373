//! Direct reply parsing and typed payload access

use super::codes;
use super::ProtocolError;

/// Parsed direct reply: sequence, reply type, and the global buffer
/// contents the command asked to be filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    sequence: u16,
    reply_type: u8,
    payload: Vec<u8>,
}

impl Reply {
    /// Structural parse of a reply frame payload.
    ///
    /// Validates nothing beyond the minimum header; pairing and status are
    /// checked by [`Reply::verify`].
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 3 {
            return Err(ProtocolError::Malformed(format!(
                "reply of {} bytes is shorter than the 3-byte header",
                data.len()
            )));
        }
        Ok(Reply {
            sequence: u16::from_le_bytes([data[0], data[1]]),
            reply_type: data[2],
            payload: data[3..].to_vec(),
        })
    }

    /// Check that this reply pairs with `expected_sequence` and reports
    /// success.
    pub fn verify(&self, expected_sequence: u16) -> Result<(), ProtocolError> {
        if self.sequence != expected_sequence {
            return Err(ProtocolError::SequenceMismatch {
                expected: expected_sequence,
                actual: self.sequence,
            });
        }
        if self.reply_type != codes::DIRECT_REPLY {
            return Err(ProtocolError::StatusError(self.reply_type));
        }
        Ok(())
    }

    /// Sequence number the reply carried
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Raw reply type byte
    pub fn reply_type(&self) -> u8 {
        self.reply_type
    }

    /// Global buffer contents
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8], ProtocolError> {
        self.payload
            .get(offset..offset + len)
            .ok_or(ProtocolError::Truncated {
                offset,
                len: self.payload.len(),
            })
    }

    /// Byte at `offset` in the global buffer
    pub fn byte_at(&self, offset: usize) -> Result<u8, ProtocolError> {
        Ok(self.slice(offset, 1)?[0])
    }

    /// Little-endian i32 at `offset`
    pub fn i32_at(&self, offset: usize) -> Result<i32, ProtocolError> {
        let bytes = self.slice(offset, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Little-endian f32 at `offset`
    pub fn f32_at(&self, offset: usize) -> Result<f32, ProtocolError> {
        let bytes = self.slice(offset, 4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// NUL-terminated string starting at `offset`
    pub fn string_at(&self, offset: usize) -> Result<String, ProtocolError> {
        let tail = self
            .payload
            .get(offset..)
            .ok_or(ProtocolError::Truncated {
                offset,
                len: self.payload.len(),
            })?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }
}

/// Parse a reply frame and validate it against the sequence number the
/// command was sent with.
pub fn decode_reply(data: &[u8], expected_sequence: u16) -> Result<Reply, ProtocolError> {
    let reply = Reply::parse(data)?;
    reply.verify(expected_sequence)?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_verify() {
        let reply = decode_reply(&[0x2A, 0x00, 0x02, 0x64, 0x01, 0x00, 0x00, 0x00], 42).unwrap();
        assert_eq!(reply.sequence(), 42);
        assert_eq!(reply.byte_at(0).unwrap(), 0x64);
        assert_eq!(reply.i32_at(1).unwrap(), 1);
    }

    #[test]
    fn test_sequence_mismatch() {
        assert!(matches!(
            decode_reply(&[0x05, 0x00, 0x02], 6),
            Err(ProtocolError::SequenceMismatch {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_error_reply() {
        assert!(matches!(
            decode_reply(&[0x01, 0x00, 0x04], 1),
            Err(ProtocolError::StatusError(0x04))
        ));
    }

    #[test]
    fn test_malformed_reply() {
        assert!(matches!(
            Reply::parse(&[0x01, 0x00]),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_getters() {
        let reply = Reply::parse(&[0x01, 0x00, 0x02, 0xAA, 0xBB]).unwrap();
        assert_eq!(reply.byte_at(1).unwrap(), 0xBB);
        assert!(matches!(
            reply.i32_at(0),
            Err(ProtocolError::Truncated { offset: 0, len: 2 })
        ));
        assert!(matches!(
            reply.byte_at(2),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_f32_and_string() {
        let mut data = vec![0x09, 0x00, 0x02];
        data.extend_from_slice(&25.5f32.to_le_bytes());
        data.extend_from_slice(b"EV3\0junk");
        let reply = decode_reply(&data, 9).unwrap();
        assert_eq!(reply.f32_at(0).unwrap(), 25.5);
        assert_eq!(reply.string_at(4).unwrap(), "EV3");
    }
}
