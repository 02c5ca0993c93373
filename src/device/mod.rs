//! Typed command layer over a brick connection

use serde::{Deserialize, Serialize};

mod brick;
mod motor;
mod sensor;
mod vehicle;

pub use brick::Brick;
pub use motor::Motor;
pub use sensor::SensorHandle;
pub use vehicle::Vehicle;

/// Output (motor) port on the brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorPort {
    OutA,
    OutB,
    OutC,
    OutD,
}

impl MotorPort {
    /// Bitfield form, used by the output opcodes that address port sets
    pub fn bitfield(self) -> u8 {
        match self {
            MotorPort::OutA => 0x01,
            MotorPort::OutB => 0x02,
            MotorPort::OutC => 0x04,
            MotorPort::OutD => 0x08,
        }
    }

    /// Index form, used by `opOUTPUT_GET_COUNT`
    pub fn index(self) -> u8 {
        match self {
            MotorPort::OutA => 0,
            MotorPort::OutB => 1,
            MotorPort::OutC => 2,
            MotorPort::OutD => 3,
        }
    }
}

/// Input (sensor) port on the brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPort {
    In1,
    In2,
    In3,
    In4,
}

impl SensorPort {
    /// Zero-based port number on the wire
    pub fn index(self) -> u8 {
        match self {
            SensorPort::In1 => 0,
            SensorPort::In2 => 1,
            SensorPort::In3 => 2,
            SensorPort::In4 => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_forms() {
        assert_eq!(MotorPort::OutA.bitfield(), 0x01);
        assert_eq!(MotorPort::OutD.bitfield(), 0x08);
        assert_eq!(MotorPort::OutC.index(), 2);
        assert_eq!(SensorPort::In4.index(), 3);
    }
}
