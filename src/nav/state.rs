//! Wire layouts for the position estimate and sweep samples

use crate::error::{Error, Result};

/// Dead-reckoned robot pose.
///
/// On the wire this is 28 bytes little-endian: `f32` heading at offset 0,
/// `f64` x at 4, `f64` y at 12, `f64` steering wheel angle at 20.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RobotState {
    /// Heading in degrees, [0, 360)
    pub heading: f32,
    pub pos_x: f64,
    pub pos_y: f64,
    /// Front wheel angle in degrees; always zero for the tank model
    pub wheel_angle: f64,
}

impl RobotState {
    pub const WIRE_LEN: usize = 28;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&self.heading.to_le_bytes());
        buf[4..12].copy_from_slice(&self.pos_x.to_le_bytes());
        buf[12..20].copy_from_slice(&self.pos_y.to_le_bytes());
        buf[20..28].copy_from_slice(&self.wheel_angle.to_le_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::WIRE_LEN {
            return Err(Error::InvalidParameter(format!(
                "robot state needs {} bytes, got {}",
                Self::WIRE_LEN,
                data.len()
            )));
        }
        Ok(RobotState {
            heading: f32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            pos_x: f64::from_le_bytes(data[4..12].try_into().map_err(|_| short())?),
            pos_y: f64::from_le_bytes(data[12..20].try_into().map_err(|_| short())?),
            wheel_angle: f64::from_le_bytes(data[20..28].try_into().map_err(|_| short())?),
        })
    }
}

fn short() -> Error {
    Error::InvalidParameter("robot state truncated".into())
}

/// One sweep sample: a distance reading at a world-frame angle, tagged
/// with the position it was taken from.
///
/// On the wire this is 24 bytes little-endian: `f32` angle at 0, `f32`
/// distance at 4, `f32` x at 8, `f32` y at 16, with 4 reserved zero bytes
/// after each position field. Positions are narrowed to `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensePoint {
    /// World-frame angle of the reading in degrees, [0, 360)
    pub angle: f32,
    /// Distance in sensor SI units
    pub distance: f32,
    pub pos_x: f64,
    pub pos_y: f64,
}

impl SensePoint {
    pub const WIRE_LEN: usize = 24;

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&self.angle.to_le_bytes());
        buf[4..8].copy_from_slice(&self.distance.to_le_bytes());
        buf[8..12].copy_from_slice(&(self.pos_x as f32).to_le_bytes());
        buf[16..20].copy_from_slice(&(self.pos_y as f32).to_le_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::WIRE_LEN {
            return Err(Error::InvalidParameter(format!(
                "sense point needs {} bytes, got {}",
                Self::WIRE_LEN,
                data.len()
            )));
        }
        Ok(SensePoint {
            angle: f32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            distance: f32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            pos_x: f32::from_le_bytes([data[8], data[9], data[10], data[11]]) as f64,
            pos_y: f32::from_le_bytes([data[16], data[17], data[18], data[19]]) as f64,
        })
    }
}

/// Pack sweep samples back to back
pub fn encode_points(points: &[SensePoint]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(points.len() * SensePoint::WIRE_LEN);
    for point in points {
        buf.extend_from_slice(&point.to_bytes());
    }
    buf
}

/// Unpack back-to-back sweep samples; trailing partial records are an error
pub fn decode_points(data: &[u8]) -> Result<Vec<SensePoint>> {
    if data.len() % SensePoint::WIRE_LEN != 0 {
        return Err(Error::InvalidParameter(format!(
            "sense payload of {} bytes is not a whole number of points",
            data.len()
        )));
    }
    data.chunks_exact(SensePoint::WIRE_LEN)
        .map(SensePoint::from_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_layout() {
        let state = RobotState {
            heading: 90.0,
            pos_x: 12.5,
            pos_y: -3.0,
            wheel_angle: 1.5,
        };
        let bytes = state.to_bytes();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[0..4], &90.0f32.to_le_bytes());
        assert_eq!(&bytes[4..12], &12.5f64.to_le_bytes());
        assert_eq!(&bytes[12..20], &(-3.0f64).to_le_bytes());
        assert_eq!(&bytes[20..28], &1.5f64.to_le_bytes());
        assert_eq!(RobotState::from_bytes(&bytes).unwrap(), state);
    }

    #[test]
    fn test_point_layout_keeps_reserved_gaps_zero() {
        let point = SensePoint {
            angle: 45.0,
            distance: 150.0,
            pos_x: 2.0,
            pos_y: 4.0,
        };
        let bytes = point.to_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &45.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &150.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0u8; 4]);
        assert_eq!(&bytes[16..20], &4.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &[0u8; 4]);
    }

    #[test]
    fn test_point_codec() {
        let points = vec![
            SensePoint {
                angle: 0.0,
                distance: 10.0,
                pos_x: 1.0,
                pos_y: 2.0,
            },
            SensePoint {
                angle: 15.0,
                distance: 20.0,
                pos_x: 1.0,
                pos_y: 2.0,
            },
        ];
        let wire = encode_points(&points);
        assert_eq!(wire.len(), 48);
        assert_eq!(decode_points(&wire).unwrap(), points);
    }

    #[test]
    fn test_truncated_inputs_rejected() {
        assert!(RobotState::from_bytes(&[0u8; 27]).is_err());
        assert!(SensePoint::from_bytes(&[0u8; 23]).is_err());
        assert!(decode_points(&[0u8; 25]).is_err());
    }
}
