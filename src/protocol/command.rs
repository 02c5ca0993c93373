//! Direct command builder

use super::codes;
use super::ProtocolError;

/// Builder for one EV3 direct command.
///
/// The header is laid down at construction; bytecodes and their parameters
/// are appended afterwards. Encoding is deterministic: the same sequence of
/// calls always produces identical bytes.
#[derive(Debug, Clone)]
pub struct Command {
    data: Vec<u8>,
    sequence: u16,
    reply_requested: bool,
}

impl Command {
    /// Largest global (reply) buffer the allocation word can express
    pub const MAX_GLOBALS: u16 = 1023;
    /// Largest local scratch buffer the allocation word can express
    pub const MAX_LOCALS: u8 = 63;

    /// Start a new direct command.
    ///
    /// `globals` bytes of reply buffer and `locals` bytes of scratch are
    /// reserved on the brick for the duration of the command.
    pub fn new(
        globals: u16,
        locals: u8,
        sequence: u16,
        reply_requested: bool,
    ) -> Result<Self, ProtocolError> {
        if globals > Self::MAX_GLOBALS || locals > Self::MAX_LOCALS {
            return Err(ProtocolError::AllocationTooLarge { globals, locals });
        }

        let mut data = Vec::with_capacity(32);
        data.extend_from_slice(&sequence.to_le_bytes());
        data.push(if reply_requested {
            codes::DIRECT_COMMAND_REPLY
        } else {
            codes::DIRECT_COMMAND_NO_REPLY
        });
        let alloc = ((locals as u16 & 0x3F) << 10) | (globals & 0x3FF);
        data.extend_from_slice(&alloc.to_le_bytes());

        Ok(Command {
            data,
            sequence,
            reply_requested,
        })
    }

    /// Sequence number this command was built with
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Whether the brick will answer this command
    pub fn reply_requested(&self) -> bool {
        self.reply_requested
    }

    /// Append an opcode byte verbatim
    pub fn push_opcode(&mut self, opcode: u8) {
        self.data.push(opcode);
    }

    /// Append a one-byte signed constant
    pub fn push_i8(&mut self, value: i8) {
        self.data.push(codes::PAR_I8);
        self.data.push(value as u8);
    }

    /// Append a two-byte signed constant
    pub fn push_i16(&mut self, value: i16) {
        self.data.push(codes::PAR_I16);
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a four-byte signed constant
    pub fn push_i32(&mut self, value: i32) {
        self.data.push(codes::PAR_I32);
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a NUL-terminated string constant
    pub fn push_string(&mut self, value: &str) {
        self.data.push(codes::PAR_STRING);
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }

    /// Append a reference into the global (reply) buffer
    pub fn push_global_index(&mut self, offset: u8) {
        self.data.push(codes::PAR_GLOBAL_INDEX);
        self.data.push(offset);
    }

    /// Append a reference into the local scratch buffer
    pub fn push_local_index(&mut self, offset: u8) {
        self.data.push(codes::PAR_LOCAL_INDEX);
        self.data.push(offset);
    }

    /// Encoded command body, ready for framing
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
