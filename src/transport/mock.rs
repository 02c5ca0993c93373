//! Scripted in-process brick used by tests
//!
//! Decodes the commands it is sent, keeps per-port motor and sensor
//! state, and queues well-formed replies. Fault knobs cover the cases a
//! real brick gets wrong: tacho undershoot on step moves and a busy flag
//! that clears a few polls late.

use super::{ConnError, Connection};
use crate::protocol::{codes, Command, Reply};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// State of one simulated output port
#[derive(Debug, Default, Clone, Copy)]
pub struct SimMotor {
    /// Current tacho count
    pub tacho: i32,
    /// Remaining polls that report the motor as running
    pub busy_polls: u32,
    /// Step commands issued on this port so far
    pub step_commands: u32,
    /// Stop commands issued on this port so far
    pub stop_commands: u32,
}

/// Simulated brick state, shared with the test through [`MockConnection::sim`]
#[derive(Debug)]
pub struct BrickSim {
    motors: [SimMotor; 4],
    si_readings: VecDeque<f32>,
    default_si: f32,
    raw_reading: i32,
    device_type: u8,
    undershoot: i32,
    persistent_undershoot: bool,
    busy_polls_per_move: u32,
    last_tone: Option<(i32, i32, i32)>,
    replies: VecDeque<Vec<u8>>,
}

impl BrickSim {
    fn new() -> Self {
        BrickSim {
            motors: [SimMotor::default(); 4],
            si_readings: VecDeque::new(),
            default_si: 0.0,
            raw_reading: 0,
            device_type: 33, // EV3 IR sensor
            undershoot: 0,
            persistent_undershoot: false,
            busy_polls_per_move: 1,
            last_tone: None,
            replies: VecDeque::new(),
        }
    }

    /// SI value served when the scripted queue is empty
    pub fn set_default_si(&mut self, value: f32) {
        self.default_si = value;
    }

    /// Queue one scripted SI reading
    pub fn push_si_reading(&mut self, value: f32) {
        self.si_readings.push_back(value);
    }

    /// Raw value served for raw reads
    pub fn set_raw_reading(&mut self, value: i32) {
        self.raw_reading = value;
    }

    /// Device type reported for type/mode queries
    pub fn set_device_type(&mut self, value: u8) {
        self.device_type = value;
    }

    /// The next step command falls `ticks` short of its target
    pub fn arm_undershoot(&mut self, ticks: i32) {
        self.undershoot = ticks;
        self.persistent_undershoot = false;
    }

    /// Every step command falls `ticks` short, corrections included
    pub fn set_persistent_undershoot(&mut self, ticks: i32) {
        self.undershoot = ticks;
        self.persistent_undershoot = true;
    }

    /// How many polls the busy flag stays set after a move
    pub fn set_busy_polls_per_move(&mut self, polls: u32) {
        self.busy_polls_per_move = polls;
    }

    /// Snapshot of one simulated motor
    pub fn motor(&self, index: usize) -> SimMotor {
        self.motors[index]
    }

    /// Last tone played, as (volume, frequency, duration)
    pub fn last_tone(&self) -> Option<(i32, i32, i32)> {
        self.last_tone
    }

    fn next_si(&mut self) -> f32 {
        self.si_readings.pop_front().unwrap_or(self.default_si)
    }

    fn apply_step(&mut self, nos: u8, power: i32, steps: i32) {
        let sign = if power < 0 { -1 } else { 1 };
        let shortfall = self.undershoot;
        if !self.persistent_undershoot {
            self.undershoot = 0;
        }
        for (i, motor) in self.motors.iter_mut().enumerate() {
            if nos & (1 << i) != 0 {
                motor.step_commands += 1;
                motor.tacho += sign * (steps - shortfall).max(0);
                motor.busy_polls = self.busy_polls_per_move;
            }
        }
    }

    fn each_port(&mut self, nos: u8, f: impl Fn(&mut SimMotor)) {
        for (i, motor) in self.motors.iter_mut().enumerate() {
            if nos & (1 << i) != 0 {
                f(motor);
            }
        }
    }

    fn process(&mut self, command: &Command) -> Result<(), ConnError> {
        let data = command.as_bytes();
        if data.len() < 5 {
            return Err(ConnError::WriteError(
                "mock: command shorter than header".to_string(),
            ));
        }
        let alloc = u16::from_le_bytes([data[3], data[4]]);
        let mut globals = vec![0u8; (alloc & 0x3FF) as usize];
        let mut reader = ParamReader::new(&data[5..]);

        while !reader.at_end() {
            let op = reader.byte()?;
            match op {
                codes::OP_OUTPUT_STEP_POWER => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    let power = reader.value()?;
                    let _ramp_up = reader.value()?;
                    let steps = reader.value()?;
                    let _ramp_down = reader.value()?;
                    let _brake = reader.value()?;
                    self.apply_step(nos, power, steps);
                }
                codes::OP_OUTPUT_STEP_SYNC => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    let power = reader.value()?;
                    let _turn = reader.value()?;
                    let steps = reader.value()?;
                    let _brake = reader.value()?;
                    self.apply_step(nos, power, steps);
                }
                codes::OP_OUTPUT_POWER => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    let _power = reader.value()?;
                    let busy = self.busy_polls_per_move;
                    self.each_port(nos, |m| m.busy_polls = busy);
                }
                codes::OP_OUTPUT_START => {
                    let _layer = reader.value()?;
                    let _nos = reader.value()?;
                }
                codes::OP_OUTPUT_STOP => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    let _brake = reader.value()?;
                    self.each_port(nos, |m| {
                        m.busy_polls = 0;
                        m.stop_commands += 1;
                    });
                }
                codes::OP_OUTPUT_CLR_COUNT => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    self.each_port(nos, |m| m.tacho = 0);
                }
                codes::OP_OUTPUT_GET_COUNT => {
                    let _layer = reader.value()?;
                    let no = reader.value()? as usize & 0x03;
                    let dest = reader.index()?;
                    let tacho = self.motors[no].tacho;
                    write_global(&mut globals, dest, &tacho.to_le_bytes())?;
                }
                codes::OP_OUTPUT_TEST => {
                    let _layer = reader.value()?;
                    let nos = reader.value()? as u8;
                    let dest = reader.index()?;
                    let mut busy = false;
                    for (i, motor) in self.motors.iter_mut().enumerate() {
                        if nos & (1 << i) != 0 && motor.busy_polls > 0 {
                            motor.busy_polls -= 1;
                            busy = true;
                        }
                    }
                    write_global(&mut globals, dest, &[busy as u8])?;
                }
                codes::OP_INPUT_DEVICE => {
                    let sub = reader.value()? as u8;
                    match sub {
                        codes::INPUT_GET_RAW => {
                            let _layer = reader.value()?;
                            let _no = reader.value()?;
                            let dest = reader.index()?;
                            write_global(&mut globals, dest, &self.raw_reading.to_le_bytes())?;
                        }
                        codes::INPUT_READY_RAW => {
                            let _layer = reader.value()?;
                            let _no = reader.value()?;
                            let _sensor_type = reader.value()?;
                            let _mode = reader.value()?;
                            let _nvalues = reader.value()?;
                            let dest = reader.index()?;
                            write_global(&mut globals, dest, &self.raw_reading.to_le_bytes())?;
                        }
                        codes::INPUT_READY_SI => {
                            let _layer = reader.value()?;
                            let _no = reader.value()?;
                            let _sensor_type = reader.value()?;
                            let _mode = reader.value()?;
                            let _nvalues = reader.value()?;
                            let dest = reader.index()?;
                            let si = self.next_si();
                            write_global(&mut globals, dest, &si.to_le_bytes())?;
                        }
                        codes::INPUT_GET_TYPEMODE => {
                            let _layer = reader.value()?;
                            let _no = reader.value()?;
                            let dest_type = reader.index()?;
                            let dest_mode = reader.index()?;
                            write_global(&mut globals, dest_type, &[self.device_type])?;
                            write_global(&mut globals, dest_mode, &[0])?;
                        }
                        _ => {
                            return Err(ConnError::WriteError(format!(
                                "mock: unhandled input subcode {:#04x}",
                                sub
                            )));
                        }
                    }
                }
                codes::OP_INPUT_READSI => {
                    let _layer = reader.value()?;
                    let _no = reader.value()?;
                    let _sensor_type = reader.value()?;
                    let _mode = reader.value()?;
                    let dest = reader.index()?;
                    let si = self.next_si();
                    write_global(&mut globals, dest, &si.to_le_bytes())?;
                }
                codes::OP_INPUT_READ => {
                    let _layer = reader.value()?;
                    let _no = reader.value()?;
                    let _sensor_type = reader.value()?;
                    let _mode = reader.value()?;
                    let dest = reader.index()?;
                    let pct = self.next_si() as u8;
                    write_global(&mut globals, dest, &[pct])?;
                }
                codes::OP_SOUND => {
                    let sub = reader.value()?;
                    let volume = reader.value()?;
                    let frequency = reader.value()?;
                    let duration = reader.value()?;
                    if sub == codes::SOUND_TONE as i32 {
                        self.last_tone = Some((volume, frequency, duration));
                    }
                }
                _ => {
                    return Err(ConnError::WriteError(format!(
                        "mock: unhandled opcode {:#04x}",
                        op
                    )));
                }
            }
        }

        if command.reply_requested() {
            let mut reply = Vec::with_capacity(3 + globals.len());
            reply.extend_from_slice(&command.sequence().to_le_bytes());
            reply.push(codes::DIRECT_REPLY);
            reply.extend_from_slice(&globals);
            self.replies.push_back(reply);
        }
        Ok(())
    }
}

fn write_global(buf: &mut [u8], offset: u8, bytes: &[u8]) -> Result<(), ConnError> {
    let start = offset as usize;
    buf.get_mut(start..start + bytes.len())
        .ok_or_else(|| ConnError::WriteError("mock: global write out of range".to_string()))?
        .copy_from_slice(bytes);
    Ok(())
}

struct ParamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ParamReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ParamReader { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8, ConnError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| ConnError::WriteError("mock: truncated command".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn value(&mut self) -> Result<i32, ConnError> {
        match self.byte()? {
            codes::PAR_I8 => Ok(self.byte()? as i8 as i32),
            codes::PAR_I16 => {
                let lo = self.byte()?;
                let hi = self.byte()?;
                Ok(i16::from_le_bytes([lo, hi]) as i32)
            }
            codes::PAR_I32 => {
                let bytes = [self.byte()?, self.byte()?, self.byte()?, self.byte()?];
                Ok(i32::from_le_bytes(bytes))
            }
            tag => Err(ConnError::WriteError(format!(
                "mock: unexpected parameter tag {:#04x}",
                tag
            ))),
        }
    }

    fn index(&mut self) -> Result<u8, ConnError> {
        match self.byte()? {
            codes::PAR_GLOBAL_INDEX | codes::PAR_LOCAL_INDEX => self.byte(),
            tag => Err(ConnError::WriteError(format!(
                "mock: expected variable reference, got tag {:#04x}",
                tag
            ))),
        }
    }
}

/// Connection backed by [`BrickSim`]
pub struct MockConnection {
    open: bool,
    sim: Arc<Mutex<BrickSim>>,
}

impl MockConnection {
    pub fn new() -> Self {
        MockConnection {
            open: false,
            sim: Arc::new(Mutex::new(BrickSim::new())),
        }
    }

    /// Handle onto the simulator state, usable after the connection has
    /// been boxed away into a `Brick`.
    pub fn sim(&self) -> Arc<Mutex<BrickSim>> {
        Arc::clone(&self.sim)
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MockConnection {
    fn open(&mut self) -> Result<(), ConnError> {
        self.open = true;
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), ConnError> {
        if !self.open {
            return Err(ConnError::NotConnected);
        }
        self.sim.lock().process(command)
    }

    fn receive(&mut self) -> Result<Reply, ConnError> {
        if !self.open {
            return Err(ConnError::NotConnected);
        }
        let frame = self
            .sim
            .lock()
            .replies
            .pop_front()
            .ok_or_else(|| ConnError::ReadError("mock: no reply queued".to_string()))?;
        super::reply_from_frame(&frame)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_command(sequence: u16, steps: i32) -> Command {
        let mut cmd = Command::new(0, 0, sequence, false).unwrap();
        cmd.push_opcode(codes::OP_OUTPUT_STEP_POWER);
        cmd.push_i8(0);
        cmd.push_i8(0x01);
        cmd.push_i8(50);
        cmd.push_i32(0);
        cmd.push_i32(steps);
        cmd.push_i32(0);
        cmd.push_i8(1);
        cmd
    }

    #[test]
    fn test_step_and_count() {
        let mut conn = MockConnection::new();
        conn.open().unwrap();
        conn.send(&step_command(1, 90)).unwrap();

        let mut count = Command::new(4, 0, 2, true).unwrap();
        count.push_opcode(codes::OP_OUTPUT_GET_COUNT);
        count.push_i8(0);
        count.push_i8(0);
        count.push_global_index(0);
        conn.send(&count).unwrap();

        let reply = conn.receive().unwrap();
        reply.verify(2).unwrap();
        assert_eq!(reply.i32_at(0).unwrap(), 90);
        assert_eq!(conn.sim().lock().motor(0).step_commands, 1);
    }

    #[test]
    fn test_undershoot_consumed_once() {
        let mut conn = MockConnection::new();
        conn.open().unwrap();
        conn.sim().lock().arm_undershoot(5);

        conn.send(&step_command(1, 100)).unwrap();
        assert_eq!(conn.sim().lock().motor(0).tacho, 95);

        conn.send(&step_command(2, 100)).unwrap();
        assert_eq!(conn.sim().lock().motor(0).tacho, 195);
    }

    #[test]
    fn test_send_when_closed() {
        let mut conn = MockConnection::new();
        let cmd = Command::new(0, 0, 1, false).unwrap();
        assert!(matches!(conn.send(&cmd), Err(ConnError::NotConnected)));
    }
}
