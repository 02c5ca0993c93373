//! Synchronized two-motor drive commands

use super::{Brick, MotorPort};
use crate::error::Result;
use crate::protocol::codes;

/// View over a synchronized pair of output ports.
///
/// All moves go through `opOUTPUT_STEP_SYNC`, which keeps the two motors
/// in lockstep; a step count of zero runs until the next command.
pub struct Vehicle<'a> {
    brick: &'a mut Brick,
    nos: u8,
}

impl<'a> Vehicle<'a> {
    pub(crate) fn new(brick: &'a mut Brick, left: MotorPort, right: MotorPort) -> Self {
        Vehicle {
            brick,
            nos: left.bitfield() | right.bitfield(),
        }
    }

    fn step_sync(&mut self, power: i8, turn: i16, steps: i32, brake: bool) -> Result<()> {
        let mut cmd = self.brick.command(0, false)?;
        cmd.push_opcode(codes::OP_OUTPUT_STEP_SYNC);
        cmd.push_i8(0);
        cmd.push_i8(self.nos as i8);
        cmd.push_i8(power.clamp(-100, 100));
        cmd.push_i16(turn.clamp(-200, 200));
        cmd.push_i32(steps);
        cmd.push_i8(brake as i8);
        self.brick.tell(cmd)
    }

    /// Drive straight until the next command
    pub fn forward(&mut self, power: i8) -> Result<()> {
        self.step_sync(power, 0, 0, false)
    }

    /// Drive straight backwards until the next command
    pub fn backward(&mut self, power: i8) -> Result<()> {
        self.step_sync(-power, 0, 0, false)
    }

    /// Drive straight for `ticks` tacho counts
    pub fn forward_steps(&mut self, power: i8, ticks: u32, brake: bool) -> Result<()> {
        self.step_sync(power, 0, ticks as i32, brake)
    }

    /// Arc left while moving forward; turn ratio 0-200
    pub fn turn_left_forward(&mut self, power: i8, turn_ratio: u8, ticks: u32, brake: bool) -> Result<()> {
        self.step_sync(power, -(turn_ratio.min(200) as i16), ticks as i32, brake)
    }

    /// Arc right while moving forward; turn ratio 0-200
    pub fn turn_right_forward(&mut self, power: i8, turn_ratio: u8, ticks: u32, brake: bool) -> Result<()> {
        self.step_sync(power, turn_ratio.min(200) as i16, ticks as i32, brake)
    }

    /// Continuous differential turn
    pub fn steer(&mut self, turn: i16, power: i8) -> Result<()> {
        self.step_sync(power, turn, 0, false)
    }

    /// Stop both motors
    pub fn off(&mut self, brake: bool) -> Result<()> {
        let mut cmd = self.brick.command(0, false)?;
        cmd.push_opcode(codes::OP_OUTPUT_STOP);
        cmd.push_i8(0);
        cmd.push_i8(self.nos as i8);
        cmd.push_i8(brake as i8);
        self.brick.tell(cmd)
    }
}
