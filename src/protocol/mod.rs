//! EV3 direct-command codec
//!
//! A direct command body is `[sequence u16 LE] [command type] [allocation
//! u16 LE] [bytecodes...]`. The allocation word packs the local scratch
//! size into the top 6 bits and the global (reply) buffer size into the
//! low 10 bits. Replies come back as `[sequence u16 LE] [reply type]
//! [global buffer]`.
//!
//! Bytecode parameters use the firmware's tagged encoding; see
//! [`Command`] for the forms this crate emits.

pub mod codes;
mod command;
mod reply;

pub use command::Command;
pub use reply::{decode_reply, Reply};

/// Codec error types
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Reply sequence does not pair with the command
    #[error("Reply sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Sequence number the command was sent with
        expected: u16,
        /// Sequence number the reply carried
        actual: u16,
    },

    /// Brick answered with an error reply
    #[error("Brick returned error reply: {0:#04x}")]
    StatusError(u8),

    /// Typed getter past the end of the reply payload
    #[error("Reply truncated: offset {offset} past payload of {len} bytes")]
    Truncated {
        /// Requested offset into the global buffer
        offset: usize,
        /// Actual payload length
        len: usize,
    },

    /// Reply too short to carry a header
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// Scratch request exceeds what the allocation word can express
    #[error("Scratch allocation too large: {globals} global / {locals} local bytes")]
    AllocationTooLarge {
        /// Requested global buffer size
        globals: u16,
        /// Requested local buffer size
        locals: u8,
    },
}
