//! Differential (tracked) drive model
//!
//! Straight moves integrate the measured drive tacho along the sensed
//! heading. In-place turns move each track in opposite directions, so the
//! body center follows a half-wheelbase chord between the old and new
//! heading.

use super::{
    heading_delta_deg, normalize_heading, sweep_scan, DrivePorts, Geometry, HeadingSource,
    NavError, Navigator, RobotState, SensePoint, TurnDirection,
};
use crate::device::Brick;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

const TICKS_PER_ROTATION: f64 = 360.0;
// a straight move that bends more than this is not integrated
const DRIFT_TOLERANCE_DEG: f32 = 5.0;
const TURN_RATIO: u8 = 100;

pub struct TankNavigator {
    brick: Arc<Mutex<Brick>>,
    state: Arc<RwLock<RobotState>>,
    heading: Arc<dyn HeadingSource>,
    geometry: Geometry,
    ports: DrivePorts,
}

impl TankNavigator {
    pub fn new(
        brick: Arc<Mutex<Brick>>,
        heading: Arc<dyn HeadingSource>,
        geometry: Geometry,
        ports: DrivePorts,
    ) -> Self {
        TankNavigator {
            brick,
            state: Arc::new(RwLock::new(RobotState::default())),
            heading,
            geometry,
            ports,
        }
    }

    /// Drive straight for `distance` wheel rotations, signed, and fold the
    /// measured ticks into the estimate.
    fn move_straight(&self, distance: f64, power: i8) -> Result<()> {
        let ticks = (distance.abs() * TICKS_PER_ROTATION).round() as u32;
        if ticks == 0 {
            return Ok(());
        }
        let signed_power = if distance < 0.0 { -power } else { power };
        let target = if distance < 0.0 {
            -(ticks as i32)
        } else {
            ticks as i32
        };

        let mut brick = self.brick.lock();
        let start = self.heading.heading_deg();

        brick.motor(self.ports.left).reset_tacho()?;
        brick
            .vehicle(self.ports.left, self.ports.right)
            .forward_steps(signed_power, ticks, true)?;
        brick.motor(self.ports.left).wait_for_stop(Some(target))?;
        let moved = brick.motor(self.ports.left).tacho_count()?;

        let end = self.heading.heading_deg();
        let drift = heading_delta_deg(start, end);
        if drift.abs() > DRIFT_TOLERANCE_DEG {
            log::warn!(
                "Straight move bent {:.1} deg, dropping {} ticks from the estimate",
                drift,
                moved
            );
            return Err(NavError::UnmappedMotion { drift }.into());
        }

        let angle = (end as f64).to_radians();
        let travelled = moved as f64 * self.geometry.tyre_circumference;
        let mut state = self.state.write();
        state.pos_x += travelled * angle.cos();
        state.pos_y += travelled * angle.sin();
        state.heading = normalize_heading(end);
        log::debug!(
            "Moved {} ticks at {:.1} deg, now at ({:.2}, {:.2})",
            moved,
            end,
            state.pos_x,
            state.pos_y
        );
        Ok(())
    }
}

impl Navigator for TankNavigator {
    fn forward(&self, distance: f64, power: i8) -> Result<()> {
        self.move_straight(distance.abs(), power)
    }

    fn backward(&self, distance: f64, power: i8) -> Result<()> {
        self.move_straight(-distance.abs(), power)
    }

    fn turn(&self, direction: TurnDirection, distance: f64, power: i8) -> Result<f32> {
        let ticks = (distance.abs() * TICKS_PER_ROTATION).round() as u32;
        if ticks == 0 {
            return Ok(0.0);
        }
        let mut brick = self.brick.lock();
        let start = self.heading.heading_deg();

        {
            let mut vehicle = brick.vehicle(self.ports.left, self.ports.right);
            match direction {
                TurnDirection::Left => {
                    vehicle.turn_left_forward(power, TURN_RATIO, ticks, true)?
                }
                TurnDirection::Right => {
                    vehicle.turn_right_forward(power, TURN_RATIO, ticks, true)?
                }
            }
        }
        brick.motor(self.ports.left).wait_for_stop(None)?;

        let end = self.heading.heading_deg();
        let delta = heading_delta_deg(start, end);

        // the body center swings along a half-wheelbase chord
        let half = self.geometry.wheelbase_length / 2.0;
        let t0 = (start as f64).to_radians();
        let t1 = (end as f64).to_radians();
        let (dx, dy) = match direction {
            TurnDirection::Left => (half * (t1.sin() - t0.sin()), half * (t0.cos() - t1.cos())),
            TurnDirection::Right => (half * (t0.sin() - t1.sin()), half * (t1.cos() - t0.cos())),
        };

        let mut state = self.state.write();
        state.pos_x += dx;
        state.pos_y += dy;
        state.heading = normalize_heading(end);
        log::debug!(
            "Turned {:.1} deg {:?}, now at ({:.2}, {:.2}) facing {:.1}",
            delta,
            direction,
            state.pos_x,
            state.pos_y,
            state.heading
        );
        Ok(delta)
    }

    fn sweep(&self, total_angle: u16) -> Result<Vec<SensePoint>> {
        let mut brick = self.brick.lock();
        let (heading, position) = {
            let state = self.state.read();
            (state.heading, (state.pos_x, state.pos_y))
        };
        sweep_scan(&mut brick, self.ports, heading, position, total_angle)
    }

    fn drive(&self, speed: i8) -> Result<()> {
        let mut brick = self.brick.lock();
        if speed == 0 {
            brick.vehicle(self.ports.left, self.ports.right).off(true)
        } else {
            brick.vehicle(self.ports.left, self.ports.right).forward(speed)
        }
    }

    fn steer(&self, turn: i16, speed: i8) -> Result<()> {
        let mut brick = self.brick.lock();
        brick.vehicle(self.ports.left, self.ports.right).steer(turn, speed)
    }

    fn correct_position(&self, dx: f64, dy: f64) {
        let mut state = self.state.write();
        state.pos_x += dx;
        state.pos_y += dy;
    }

    fn snapshot(&self) -> RobotState {
        let mut state = *self.state.read();
        state.heading = normalize_heading(self.heading.heading_deg());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MotorPort, SensorPort};
    use crate::transport::mock::{BrickSim, MockConnection};
    use std::collections::VecDeque;

    struct FixedHeading(f32);
    impl HeadingSource for FixedHeading {
        fn heading_deg(&self) -> f32 {
            self.0
        }
    }

    /// Pops one scripted value per read, then repeats the last
    struct ScriptedHeading(Mutex<(VecDeque<f32>, f32)>);
    impl ScriptedHeading {
        fn new(values: &[f32]) -> Self {
            ScriptedHeading(Mutex::new((values.iter().copied().collect(), 0.0)))
        }
    }
    impl HeadingSource for ScriptedHeading {
        fn heading_deg(&self) -> f32 {
            let mut inner = self.0.lock();
            if let Some(v) = inner.0.pop_front() {
                inner.1 = v;
            }
            inner.1
        }
    }

    fn harness(
        heading: Arc<dyn HeadingSource>,
    ) -> (TankNavigator, Arc<Mutex<BrickSim>>) {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        let nav = TankNavigator::new(
            Arc::new(Mutex::new(brick)),
            heading,
            Geometry {
                wheelbase_length: 16.0,
                tyre_circumference: 0.05,
            },
            DrivePorts {
                left: MotorPort::OutB,
                right: MotorPort::OutC,
                sweep: MotorPort::OutA,
                sensor: SensorPort::In1,
            },
        );
        (nav, sim)
    }

    #[test]
    fn test_forward_integrates_along_heading() {
        let (nav, _sim) = harness(Arc::new(FixedHeading(0.0)));
        nav.forward(1.0, 50).unwrap();

        let state = nav.snapshot();
        assert!((state.pos_x - 18.0).abs() < 1e-9, "pos_x = {}", state.pos_x);
        assert!(state.pos_y.abs() < 1e-9);
        assert_eq!(state.heading, 0.0);
    }

    #[test]
    fn test_backward_integrates_opposite() {
        let (nav, _sim) = harness(Arc::new(FixedHeading(90.0)));
        nav.backward(0.5, 40).unwrap();

        let state = nav.snapshot();
        assert!(state.pos_x.abs() < 1e-9);
        assert!((state.pos_y + 9.0).abs() < 1e-9, "pos_y = {}", state.pos_y);
    }

    #[test]
    fn test_zero_distance_is_a_no_op() {
        let (nav, sim) = harness(Arc::new(FixedHeading(0.0)));
        nav.forward(0.0, 50).unwrap();
        assert_eq!(nav.snapshot().pos_x, 0.0);
        assert_eq!(sim.lock().motor(1).step_commands, 0);
    }

    #[test]
    fn test_drift_drops_the_move() {
        // heading read before the move says 0, after says 10
        let (nav, _sim) = harness(Arc::new(ScriptedHeading::new(&[0.0, 10.0])));
        let err = nav.forward(1.0, 50).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Nav(NavError::UnmappedMotion { .. })
        ));

        let state = *nav.state.read();
        assert_eq!(state.pos_x, 0.0);
        assert_eq!(state.pos_y, 0.0);
    }

    #[test]
    fn test_left_turn_follows_chord() {
        let (nav, _sim) = harness(Arc::new(ScriptedHeading::new(&[0.0, 90.0])));
        let delta = nav.turn(TurnDirection::Left, 0.5, 30).unwrap();
        assert_eq!(delta, 90.0);

        let state = *nav.state.read();
        assert!((state.pos_x - 8.0).abs() < 1e-6, "pos_x = {}", state.pos_x);
        assert!((state.pos_y - 8.0).abs() < 1e-6, "pos_y = {}", state.pos_y);
        assert_eq!(state.heading, 90.0);
    }

    #[test]
    fn test_right_turn_mirrors_chord() {
        let (nav, _sim) = harness(Arc::new(ScriptedHeading::new(&[0.0, 270.0])));
        let delta = nav.turn(TurnDirection::Right, 0.5, 30).unwrap();
        assert_eq!(delta, -90.0);

        let state = *nav.state.read();
        assert!((state.pos_x - 8.0).abs() < 1e-6, "pos_x = {}", state.pos_x);
        assert!((state.pos_y + 8.0).abs() < 1e-6, "pos_y = {}", state.pos_y);
        assert_eq!(state.heading, 270.0);
    }

    #[test]
    fn test_full_sweep_samples_every_fifteen_degrees() {
        let (nav, sim) = harness(Arc::new(FixedHeading(0.0)));
        sim.lock().set_default_si(100.0);

        let points = nav.sweep(360).unwrap();
        assert_eq!(points.len(), 24);
        assert_eq!(points[0].angle, 180.0);
        assert_eq!(points[1].angle, 195.0);
        assert_eq!(points[12].angle, 0.0);
        assert_eq!(points[23].angle, 165.0);
        for pair in points.windows(2) {
            assert_ne!(pair[0].angle, pair[1].angle);
        }
        // head re-centered afterwards
        assert_eq!(sim.lock().motor(0).tacho, 0);
    }

    #[test]
    fn test_correct_position_nudges_estimate() {
        let (nav, _sim) = harness(Arc::new(FixedHeading(0.0)));
        nav.correct_position(1.5, -2.5);
        let state = nav.snapshot();
        assert_eq!(state.pos_x, 1.5);
        assert_eq!(state.pos_y, -2.5);
    }
}
