//! Steered (bicycle) drive model
//!
//! Moves are modelled as arcs of a turning circle. The heading change
//! over a move and the distance travelled give the circle radius; the
//! new position falls on that circle, and the implied front wheel angle
//! is recovered from the same pair.

use super::{
    heading_delta_deg, normalize_heading, sweep_scan, DrivePorts, Geometry, HeadingSource,
    Navigator, RobotState, SensePoint, TurnDirection,
};
use crate::device::Brick;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

const TICKS_PER_ROTATION: f64 = 360.0;
// below this bend, in radians, the arc degenerates to a straight line
const STRAIGHT_BEND_RAD: f64 = 0.01;
const TURN_RATIO: u8 = 100;

pub struct TruckNavigator {
    brick: Arc<Mutex<Brick>>,
    state: Arc<RwLock<RobotState>>,
    heading: Arc<dyn HeadingSource>,
    geometry: Geometry,
    ports: DrivePorts,
}

impl TruckNavigator {
    pub fn new(
        brick: Arc<Mutex<Brick>>,
        heading: Arc<dyn HeadingSource>,
        geometry: Geometry,
        ports: DrivePorts,
    ) -> Self {
        TruckNavigator {
            brick,
            state: Arc::new(RwLock::new(RobotState::default())),
            heading,
            geometry,
            ports,
        }
    }

    /// Drive for `distance` wheel rotations, signed, and fold the measured
    /// arc into the estimate.
    fn move_arc(&self, distance: f64, power: i8) -> Result<()> {
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
        let bend = (heading_delta_deg(start, end) as f64).to_radians();
        let travelled = moved as f64 * self.geometry.tyre_circumference;
        let t0 = (start as f64).to_radians();
        let t1 = (end as f64).to_radians();

        let mut state = self.state.write();
        if travelled != 0.0 {
            state.wheel_angle = (bend * self.geometry.wheelbase_length / travelled)
                .atan()
                .to_degrees();
        }
        if bend.abs() < STRAIGHT_BEND_RAD {
            state.pos_x += travelled * t0.cos();
            state.pos_y += travelled * t0.sin();
        } else {
            let radius = travelled / bend;
            let center_x = state.pos_x - radius * t0.sin();
            let center_y = state.pos_y + radius * t0.cos();
            state.pos_x = center_x + radius * t1.sin();
            state.pos_y = center_y - radius * t1.cos();
        }
        state.heading = normalize_heading(end);
        log::debug!(
            "Arc of {:.3} rad over {:.2}, now at ({:.2}, {:.2}) facing {:.1}",
            bend,
            travelled,
            state.pos_x,
            state.pos_y,
            state.heading
        );
        Ok(())
    }
}

impl Navigator for TruckNavigator {
    fn forward(&self, distance: f64, power: i8) -> Result<()> {
        self.move_arc(distance.abs(), power)
    }

    fn backward(&self, distance: f64, power: i8) -> Result<()> {
        self.move_arc(-distance.abs(), power)
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
                TurnDirection::Left => vehicle.turn_left_forward(power, TURN_RATIO, ticks, true)?,
                TurnDirection::Right => {
                    vehicle.turn_right_forward(power, TURN_RATIO, ticks, true)?
                }
            }
        }
        brick.motor(self.ports.left).wait_for_stop(None)?;

        let end = self.heading.heading_deg();
        let delta = heading_delta_deg(start, end);

        // a steered turn pivots around the rear axle; only the heading moves
        let mut state = self.state.write();
        state.heading = normalize_heading(end);
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

    fn harness(heading: Arc<dyn HeadingSource>) -> (TruckNavigator, Arc<Mutex<BrickSim>>) {
        let conn = MockConnection::new();
        let sim = conn.sim();
        let mut brick = Brick::new(Box::new(conn));
        brick.open().unwrap();
        let nav = TruckNavigator::new(
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
    fn test_straight_move() {
        let (nav, _sim) = harness(Arc::new(FixedHeading(0.0)));
        nav.forward(1.0, 50).unwrap();

        let state = *nav.state.read();
        assert!((state.pos_x - 18.0).abs() < 1e-9, "pos_x = {}", state.pos_x);
        assert!(state.pos_y.abs() < 1e-9);
        assert_eq!(state.wheel_angle, 0.0);
    }

    #[test]
    fn test_quarter_circle_arc() {
        let (nav, _sim) = harness(Arc::new(ScriptedHeading::new(&[0.0, 90.0])));
        nav.forward(1.0, 50).unwrap();

        // same numbers the model works from
        let travelled = 360.0 * 0.05;
        let bend = (90.0f32 as f64).to_radians();
        let radius = travelled / bend;
        let expected_wheel = (bend * 16.0 / travelled).atan().to_degrees();

        let state = *nav.state.read();
        assert!((state.pos_x - radius).abs() < 1e-9, "pos_x = {}", state.pos_x);
        assert!((state.pos_y - radius).abs() < 1e-9, "pos_y = {}", state.pos_y);
        assert!((state.wheel_angle - expected_wheel).abs() < 1e-9);
        assert_eq!(state.heading, 90.0);
    }

    #[test]
    fn test_backward_straight() {
        let (nav, _sim) = harness(Arc::new(FixedHeading(0.0)));
        nav.backward(0.5, 40).unwrap();

        let state = *nav.state.read();
        assert!((state.pos_x + 9.0).abs() < 1e-9, "pos_x = {}", state.pos_x);
    }

    #[test]
    fn test_turn_moves_heading_only() {
        let (nav, _sim) = harness(Arc::new(ScriptedHeading::new(&[0.0, 45.0])));
        let delta = nav.turn(TurnDirection::Left, 0.25, 30).unwrap();
        assert_eq!(delta, 45.0);

        let state = *nav.state.read();
        assert_eq!(state.pos_x, 0.0);
        assert_eq!(state.pos_y, 0.0);
        assert_eq!(state.heading, 45.0);
    }
}
