//! Brick handle: connection ownership, sequencing, and shared state

use super::{Motor, MotorPort, SensorHandle, SensorPort, Vehicle};
use crate::error::Result;
use crate::protocol::{codes, Command, Reply};
use crate::transport::Connection;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SensorState {
    pub(crate) mode: Option<u8>,
}

/// One brick behind one connection.
///
/// All traffic funnels through [`Brick::tell`] and [`Brick::query`], so a
/// `Brick` guarded by a mutex serializes the wire. Sequence numbers wrap
/// and every reply is verified against the command that asked for it.
pub struct Brick {
    conn: Box<dyn Connection>,
    sequence: u16,
    sensors: [SensorState; 4],
}

impl Brick {
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Brick {
            conn,
            sequence: 0,
            sensors: [SensorState::default(); 4],
        }
    }

    /// Open the underlying connection
    pub fn open(&mut self) -> Result<()> {
        self.conn.open()?;
        Ok(())
    }

    /// Close the underlying connection
    pub fn close(&mut self) {
        self.conn.close();
    }

    /// Whether the underlying connection is established
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    /// Start a command with `globals` bytes of reply buffer
    pub(crate) fn command(&mut self, globals: u16, reply_requested: bool) -> Result<Command> {
        let sequence = self.next_sequence();
        Ok(Command::new(globals, 0, sequence, reply_requested)?)
    }

    /// Fire-and-forget send
    pub(crate) fn tell(&mut self, command: Command) -> Result<()> {
        self.conn.send(&command)?;
        Ok(())
    }

    /// Send and wait for the paired reply
    pub(crate) fn query(&mut self, command: Command) -> Result<Reply> {
        self.conn.send(&command)?;
        let reply = self.conn.receive()?;
        reply.verify(command.sequence())?;
        Ok(reply)
    }

    /// Single-motor view
    pub fn motor(&mut self, port: MotorPort) -> Motor<'_> {
        Motor::new(self, port)
    }

    /// Sensor view
    pub fn sensor(&mut self, port: SensorPort) -> SensorHandle<'_> {
        SensorHandle::new(self, port)
    }

    /// Synchronized two-motor drive view
    pub fn vehicle(&mut self, left: MotorPort, right: MotorPort) -> Vehicle<'_> {
        Vehicle::new(self, left, right)
    }

    /// Play a tone on the brick speaker
    pub fn play_tone(&mut self, volume: u8, frequency_hz: u16, duration_ms: u16) -> Result<()> {
        let mut cmd = self.command(0, false)?;
        cmd.push_opcode(codes::OP_SOUND);
        cmd.push_i8(codes::SOUND_TONE as i8);
        cmd.push_i8(volume.min(100) as i8);
        // the upper halves of the u16 ranges do not fit a signed i16
        cmd.push_i32(frequency_hz as i32);
        cmd.push_i32(duration_ms as i32);
        self.tell(cmd)
    }

    pub(crate) fn cached_mode(&self, port: SensorPort) -> Option<u8> {
        self.sensors[port.index() as usize].mode
    }

    pub(crate) fn remember_mode(&mut self, port: SensorPort, mode: u8) {
        self.sensors[port.index() as usize].mode = Some(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnection;

    #[test]
    fn test_sequence_advances() {
        let conn = MockConnection::new();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        let first = brick.command(0, false).unwrap();
        let second = brick.command(0, false).unwrap();
        assert_eq!(second.sequence(), first.sequence().wrapping_add(1));
    }

    #[test]
    fn test_query_round_trip() {
        let conn = MockConnection::new();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        assert_eq!(brick.motor(MotorPort::OutA).tacho_count().unwrap(), 0);
    }

    #[test]
    fn test_play_tone() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        brick.play_tone(20, 880, 150).unwrap();
        assert_eq!(sim.lock().last_tone(), Some((20, 880, 150)));
    }

    #[test]
    fn test_play_tone_wide_values() {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        // both fields past i16::MAX must arrive unmangled
        brick.play_tone(20, 40000, 50000).unwrap();
        assert_eq!(sim.lock().last_tone(), Some((20, 40000, 50000)));
    }

    #[test]
    fn test_unknown_opcode_surfaces() {
        let conn = MockConnection::new();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();

        let mut cmd = brick.command(0, false).unwrap();
        cmd.push_opcode(0xFF);
        assert!(brick.tell(cmd).is_err());
    }
}
