//! LMS2012 bytecode values used by direct commands

/// Command type: direct command, reply expected
pub const DIRECT_COMMAND_REPLY: u8 = 0x00;
/// Command type: direct command, no reply
pub const DIRECT_COMMAND_NO_REPLY: u8 = 0x80;

/// Reply type: direct reply, success
pub const DIRECT_REPLY: u8 = 0x02;
/// Reply type: direct reply, command failed
pub const DIRECT_REPLY_ERROR: u8 = 0x04;

// ===== Parameter tag bytes (PRIMPAR encoding) =====

/// One-byte signed constant follows
pub const PAR_I8: u8 = 0x81;
/// Two-byte signed constant follows (LE)
pub const PAR_I16: u8 = 0x82;
/// Four-byte signed constant follows (LE)
pub const PAR_I32: u8 = 0x83;
/// NUL-terminated string follows
pub const PAR_STRING: u8 = 0x84;
/// Global variable reference, one-byte offset follows
pub const PAR_GLOBAL_INDEX: u8 = 0xE1;
/// Local variable reference, one-byte offset follows
pub const PAR_LOCAL_INDEX: u8 = 0xC1;

// ===== Output (motor) opcodes =====

/// Stop one or more outputs
pub const OP_OUTPUT_STOP: u8 = 0xA3;
/// Set output power without starting
pub const OP_OUTPUT_POWER: u8 = 0xA4;
/// Start outputs at their programmed power
pub const OP_OUTPUT_START: u8 = 0xA6;
/// Query the busy flag of outputs
pub const OP_OUTPUT_TEST: u8 = 0xA9;
/// Ramped power move bounded by a tacho count
pub const OP_OUTPUT_STEP_POWER: u8 = 0xAC;
/// Synchronized two-motor move (step 0 = run until stopped)
pub const OP_OUTPUT_STEP_SYNC: u8 = 0xB0;
/// Clear the tacho counter
pub const OP_OUTPUT_CLR_COUNT: u8 = 0xB2;
/// Read the tacho counter
pub const OP_OUTPUT_GET_COUNT: u8 = 0xB3;

// ===== Input (sensor) opcodes =====

/// Sensor device control, takes a subcode
pub const OP_INPUT_DEVICE: u8 = 0x99;
/// Read a sensor value as a percentage byte
pub const OP_INPUT_READ: u8 = 0x9A;
/// Read a sensor value in SI units (f32)
pub const OP_INPUT_READSI: u8 = 0x9D;

// ===== opINPUT_DEVICE subcodes =====

/// Read device type and current mode
pub const INPUT_GET_TYPEMODE: u8 = 0x05;
/// Read the raw sensor value
pub const INPUT_GET_RAW: u8 = 0x0B;
/// Switch mode and wait for a raw value
pub const INPUT_READY_RAW: u8 = 0x1C;
/// Switch mode and wait for an SI value
pub const INPUT_READY_SI: u8 = 0x1D;

// ===== Sound =====

/// Sound control, takes a subcode
pub const OP_SOUND: u8 = 0x94;
/// Play a tone (volume, frequency, duration)
pub const SOUND_TONE: u8 = 0x01;
