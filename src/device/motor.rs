//! Single-motor commands and stop synchronization

use super::{Brick, MotorPort};
use crate::error::{Error, Result};
use crate::protocol::codes;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
// the brick reports the final ticks a beat after the busy flag clears
const LATE_REPORT_GRACE: Duration = Duration::from_millis(50);
const STOP_DEADLINE: Duration = Duration::from_secs(5);
const TACHO_TOLERANCE: i32 = 2;
const CORRECTION_POWER: i8 = 10;
const MAX_CORRECTIONS: u32 = 4;
const MAX_POLL_ERRORS: u32 = 3;

/// View over one output port of a [`Brick`]
pub struct Motor<'a> {
    brick: &'a mut Brick,
    port: MotorPort,
}

impl<'a> Motor<'a> {
    pub(crate) fn new(brick: &'a mut Brick, port: MotorPort) -> Self {
        Motor { brick, port }
    }

    /// Run the motor. A zero `tacho_limit` runs until stopped; otherwise
    /// the firmware brakes after `tacho_limit` ticks.
    pub fn on(&mut self, power: i8, tacho_limit: u32, brake: bool) -> Result<()> {
        let power = power.clamp(-100, 100);
        if tacho_limit == 0 {
            let mut cmd = self.brick.command(0, false)?;
            cmd.push_opcode(codes::OP_OUTPUT_POWER);
            cmd.push_i8(0);
            cmd.push_i8(self.port.bitfield() as i8);
            cmd.push_i8(power);
            cmd.push_opcode(codes::OP_OUTPUT_START);
            cmd.push_i8(0);
            cmd.push_i8(self.port.bitfield() as i8);
            return self.brick.tell(cmd);
        }

        let mut cmd = self.brick.command(0, false)?;
        cmd.push_opcode(codes::OP_OUTPUT_STEP_POWER);
        cmd.push_i8(0);
        cmd.push_i8(self.port.bitfield() as i8);
        cmd.push_i8(power);
        cmd.push_i32(0); // ramp up
        cmd.push_i32(tacho_limit as i32);
        cmd.push_i32(0); // ramp down
        cmd.push_i8(brake as i8);
        self.brick.tell(cmd)
    }

    /// Stop the motor, braking or coasting
    pub fn off(&mut self, brake: bool) -> Result<()> {
        let mut cmd = self.brick.command(0, false)?;
        cmd.push_opcode(codes::OP_OUTPUT_STOP);
        cmd.push_i8(0);
        cmd.push_i8(self.port.bitfield() as i8);
        cmd.push_i8(brake as i8);
        self.brick.tell(cmd)
    }

    /// Zero the tacho counter
    pub fn reset_tacho(&mut self) -> Result<()> {
        let mut cmd = self.brick.command(0, false)?;
        cmd.push_opcode(codes::OP_OUTPUT_CLR_COUNT);
        cmd.push_i8(0);
        cmd.push_i8(self.port.bitfield() as i8);
        self.brick.tell(cmd)
    }

    /// Read the tacho counter
    pub fn tacho_count(&mut self) -> Result<i32> {
        let mut cmd = self.brick.command(4, true)?;
        cmd.push_opcode(codes::OP_OUTPUT_GET_COUNT);
        cmd.push_i8(0);
        cmd.push_i8(self.port.index() as i8);
        cmd.push_global_index(0);
        let reply = self.brick.query(cmd)?;
        Ok(reply.i32_at(0)?)
    }

    /// Whether the firmware still reports the output as busy
    pub fn is_running(&mut self) -> Result<bool> {
        let mut cmd = self.brick.command(1, true)?;
        cmd.push_opcode(codes::OP_OUTPUT_TEST);
        cmd.push_i8(0);
        cmd.push_i8(self.port.bitfield() as i8);
        cmd.push_global_index(0);
        let reply = self.brick.query(cmd)?;
        Ok(reply.byte_at(0)? != 0)
    }

    /// Block until the motor has stopped.
    ///
    /// Without a target this is a plain busy-flag poll. With a target
    /// tacho count it also verifies where the motor actually ended up:
    /// step commands occasionally get lost or cut short, in which case a
    /// small corrective move is reissued for the remainder. The move
    /// itself runs as long as it needs to; once the motor first reports
    /// stopped, the settle-and-correct phase must finish within a few
    /// reissues and a fixed deadline. On failure the motor is stopped
    /// and `Error::Timeout` is returned.
    pub fn wait_for_stop(&mut self, target: Option<i32>) -> Result<()> {
        let mut deadline: Option<Instant> = None;
        let mut corrections = 0u32;
        let mut poll_errors = 0u32;
        let mut waited = false;

        // give a fresh untargeted command a beat to reach the firmware
        if target.is_none() {
            std::thread::sleep(LATE_REPORT_GRACE);
        }

        loop {
            if let Some(at) = deadline {
                if Instant::now() > at {
                    log::warn!("Motor {:?} did not settle before the deadline", self.port);
                    self.off(true)?;
                    return Err(Error::Timeout);
                }
            }

            match self.is_running() {
                Ok(true) => {
                    std::thread::sleep(POLL_INTERVAL);
                    continue;
                }
                Ok(false) => {
                    poll_errors = 0;
                    // a slow move takes as long as it takes; the deadline
                    // starts at the first reported stop
                    deadline.get_or_insert_with(|| Instant::now() + STOP_DEADLINE);
                }
                Err(e) => {
                    poll_errors += 1;
                    if poll_errors > MAX_POLL_ERRORS {
                        return Err(e);
                    }
                    log::warn!("Motor {:?} busy poll failed ({}): {}", self.port, poll_errors, e);
                    std::thread::sleep(POLL_INTERVAL);
                    continue;
                }
            }

            let Some(target) = target else {
                return Ok(());
            };

            let count = self.tacho_count()?;
            let diff = target - count;
            if diff.abs() < TACHO_TOLERANCE {
                return Ok(());
            }

            if !waited {
                std::thread::sleep(LATE_REPORT_GRACE);
                waited = true;
                continue;
            }

            if corrections >= MAX_CORRECTIONS {
                log::warn!(
                    "Motor {:?} still {} ticks from {} after {} corrections",
                    self.port,
                    diff,
                    target,
                    corrections
                );
                self.off(true)?;
                return Err(Error::Timeout);
            }

            log::debug!(
                "Motor {:?} stopped {} ticks short of {}, reissuing",
                self.port,
                diff,
                target
            );
            if count < target {
                self.on(CORRECTION_POWER, (target - count) as u32, true)?;
            } else {
                self.on(-CORRECTION_POWER, (count - target) as u32, true)?;
            }
            corrections += 1;
            waited = false;
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnection;

    fn brick_with_sim() -> (Brick, std::sync::Arc<parking_lot::Mutex<crate::transport::mock::BrickSim>>)
    {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        (brick, sim)
    }

    #[test]
    fn test_on_target_stop_issues_no_correction() {
        let (mut brick, sim) = brick_with_sim();
        let mut motor = brick.motor(MotorPort::OutA);
        motor.on(50, 100, true).unwrap();
        motor.wait_for_stop(Some(100)).unwrap();

        let state = sim.lock().motor(0);
        assert_eq!(state.tacho, 100);
        assert_eq!(state.step_commands, 1);
    }

    #[test]
    fn test_undershoot_triggers_single_correction() {
        let (mut brick, sim) = brick_with_sim();
        sim.lock().arm_undershoot(5);

        let mut motor = brick.motor(MotorPort::OutA);
        motor.on(50, 100, true).unwrap();
        motor.wait_for_stop(Some(100)).unwrap();

        let state = sim.lock().motor(0);
        assert_eq!(state.tacho, 100);
        assert_eq!(state.step_commands, 2, "exactly one corrective reissue");
    }

    #[test]
    fn test_correction_loop_is_bounded() {
        let (mut brick, sim) = brick_with_sim();
        // every move, corrections included, comes up short
        sim.lock().set_persistent_undershoot(1000);

        let mut motor = brick.motor(MotorPort::OutA);
        motor.on(50, 100, true).unwrap();
        let result = motor.wait_for_stop(Some(100));
        assert!(matches!(result, Err(Error::Timeout)));

        let state = sim.lock().motor(0);
        assert_eq!(state.step_commands, 1 + MAX_CORRECTIONS);
        // the failure path leaves the motor stopped, not driving
        assert_eq!(state.stop_commands, 1);
        assert_eq!(state.busy_polls, 0);
    }

    #[test]
    fn test_long_move_outlasts_settle_deadline() {
        let (mut brick, sim) = brick_with_sim();
        // a genuine slow move: the busy flag stays set well past the
        // settle deadline before the motor reaches its target
        sim.lock().set_busy_polls_per_move(280);

        let mut motor = brick.motor(MotorPort::OutA);
        motor.on(20, 1000, true).unwrap();
        motor.wait_for_stop(Some(1000)).unwrap();

        let state = sim.lock().motor(0);
        assert_eq!(state.tacho, 1000);
        assert_eq!(state.step_commands, 1);
    }

    #[test]
    fn test_wait_without_target() {
        let (mut brick, sim) = brick_with_sim();
        sim.lock().set_busy_polls_per_move(2);

        let mut motor = brick.motor(MotorPort::OutB);
        motor.on(50, 360, true).unwrap();
        motor.wait_for_stop(None).unwrap();
        assert_eq!(sim.lock().motor(1).tacho, 360);
    }

    #[test]
    fn test_reverse_correction() {
        let (mut brick, sim) = brick_with_sim();
        // overshoot: arm a negative undershoot
        sim.lock().arm_undershoot(-6);

        let mut motor = brick.motor(MotorPort::OutA);
        motor.on(50, 100, true).unwrap();
        motor.wait_for_stop(Some(100)).unwrap();

        let state = sim.lock().motor(0);
        assert_eq!(state.tacho, 100);
        assert_eq!(state.step_commands, 2);
    }
}
