//! Sensor reads with lazy per-port initialization

use super::{Brick, SensorPort};
use crate::error::Result;
use crate::protocol::codes;

/// View over one input port of a [`Brick`].
///
/// Mode switches go to the firmware once; the active mode is cached on
/// the brick handle and repeated `set_mode` calls with the same mode are
/// free.
pub struct SensorHandle<'a> {
    brick: &'a mut Brick,
    port: SensorPort,
}

impl<'a> SensorHandle<'a> {
    pub(crate) fn new(brick: &'a mut Brick, port: SensorPort) -> Self {
        SensorHandle { brick, port }
    }

    /// Switch the sensor mode, waiting for the device to settle
    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        if self.brick.cached_mode(self.port) == Some(mode) {
            return Ok(());
        }

        let mut cmd = self.brick.command(4, true)?;
        cmd.push_opcode(codes::OP_INPUT_DEVICE);
        cmd.push_i8(codes::INPUT_READY_RAW as i8);
        cmd.push_i8(0); // layer
        cmd.push_i8(self.port.index() as i8);
        cmd.push_i8(0); // keep current type
        cmd.push_i8(mode as i8);
        cmd.push_i8(1); // one value
        cmd.push_global_index(0);
        self.brick.query(cmd)?;

        self.brick.remember_mode(self.port, mode);
        log::debug!("Sensor {:?} now in mode {}", self.port, mode);
        Ok(())
    }

    /// Read the sensor in SI units
    pub fn read_si(&mut self) -> Result<f32> {
        let mode = self.brick.cached_mode(self.port).unwrap_or(0);
        let mut cmd = self.brick.command(4, true)?;
        cmd.push_opcode(codes::OP_INPUT_READSI);
        cmd.push_i8(0);
        cmd.push_i8(self.port.index() as i8);
        cmd.push_i8(0); // type: don't care
        cmd.push_i8(mode as i8);
        cmd.push_global_index(0);
        let reply = self.brick.query(cmd)?;
        Ok(reply.f32_at(0)?)
    }

    /// Read the raw device value
    pub fn read_raw(&mut self) -> Result<i32> {
        let mut cmd = self.brick.command(4, true)?;
        cmd.push_opcode(codes::OP_INPUT_DEVICE);
        cmd.push_i8(codes::INPUT_GET_RAW as i8);
        cmd.push_i8(0);
        cmd.push_i8(self.port.index() as i8);
        cmd.push_global_index(0);
        let reply = self.brick.query(cmd)?;
        Ok(reply.i32_at(0)?)
    }

    /// Read the sensor as a percentage byte
    pub fn read_percent(&mut self) -> Result<i8> {
        let mode = self.brick.cached_mode(self.port).unwrap_or(0);
        let mut cmd = self.brick.command(1, true)?;
        cmd.push_opcode(codes::OP_INPUT_READ);
        cmd.push_i8(0);
        cmd.push_i8(self.port.index() as i8);
        cmd.push_i8(0);
        cmd.push_i8(mode as i8);
        cmd.push_global_index(0);
        let reply = self.brick.query(cmd)?;
        Ok(reply.byte_at(0)? as i8)
    }

    /// Query the connected device type and its current mode
    pub fn type_and_mode(&mut self) -> Result<(u8, u8)> {
        let mut cmd = self.brick.command(2, true)?;
        cmd.push_opcode(codes::OP_INPUT_DEVICE);
        cmd.push_i8(codes::INPUT_GET_TYPEMODE as i8);
        cmd.push_i8(0);
        cmd.push_i8(self.port.index() as i8);
        cmd.push_global_index(0);
        cmd.push_global_index(1);
        let reply = self.brick.query(cmd)?;
        Ok((reply.byte_at(0)?, reply.byte_at(1)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnection;

    #[test]
    fn test_read_si() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        sim.lock().set_default_si(42.5);

        assert_eq!(brick.sensor(SensorPort::In1).read_si().unwrap(), 42.5);
    }

    #[test]
    fn test_scripted_readings_drain_in_order() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        {
            let mut sim = sim.lock();
            sim.push_si_reading(10.0);
            sim.push_si_reading(20.0);
            sim.set_default_si(99.0);
        }

        let mut sensor = brick.sensor(SensorPort::In1);
        assert_eq!(sensor.read_si().unwrap(), 10.0);
        assert_eq!(sensor.read_si().unwrap(), 20.0);
        assert_eq!(sensor.read_si().unwrap(), 99.0);
    }

    #[test]
    fn test_mode_cache() {
        let conn = MockConnection::new();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();

        brick.sensor(SensorPort::In2).set_mode(2).unwrap();
        assert_eq!(brick.cached_mode(SensorPort::In2), Some(2));
        // second switch to the same mode is a no-op
        brick.sensor(SensorPort::In2).set_mode(2).unwrap();
        assert_eq!(brick.cached_mode(SensorPort::In1), None);
    }

    #[test]
    fn test_type_and_mode() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        sim.lock().set_device_type(32); // gyro

        assert_eq!(brick.sensor(SensorPort::In3).type_and_mode().unwrap(), (32, 0));
    }

    #[test]
    fn test_read_raw() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        sim.lock().set_raw_reading(-120);

        assert_eq!(brick.sensor(SensorPort::In1).read_raw().unwrap(), -120);
    }
}
