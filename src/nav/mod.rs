//! Dead-reckoning navigation
//!
//! Two drive models share one contract: the tank model integrates the
//! measured drive tacho along the externally-sensed heading, the bicycle
//! (truck) model integrates along a turning-circle arc. Both produce the
//! same [`RobotState`] estimate and the same sweep samples.

use crate::device::{Brick, MotorPort, SensorPort};
use crate::error::Result;
use std::sync::atomic::{AtomicU32, Ordering};

mod state;
mod tank;
mod truck;

pub use state::{decode_points, encode_points, RobotState, SensePoint};
pub use tank::TankNavigator;
pub use truck::TruckNavigator;

/// Navigation error types
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// A straight move changed heading; the estimate was not updated
    #[error("unmapped motion: heading drifted {drift:.1} deg during a straight move")]
    UnmappedMotion {
        /// Measured heading change in degrees
        drift: f32,
    },
}

/// Source of the robot's absolute heading in degrees
pub trait HeadingSource: Send + Sync {
    fn heading_deg(&self) -> f32;
}

/// Heading cell fed by an external orientation sensor
pub struct SharedHeading(AtomicU32);

impl SharedHeading {
    pub fn new(initial_deg: f32) -> Self {
        SharedHeading(AtomicU32::new(initial_deg.to_bits()))
    }

    pub fn set(&self, deg: f32) {
        self.0.store(normalize_heading(deg).to_bits(), Ordering::Relaxed);
    }
}

impl HeadingSource for SharedHeading {
    fn heading_deg(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Which way to turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

/// Physical constants of the drive train
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    /// Distance between the wheel centers
    pub wheelbase_length: f64,
    /// Distance covered per tacho tick
    pub tyre_circumference: f64,
}

/// Port assignment of the drive train
#[derive(Debug, Clone, Copy)]
pub struct DrivePorts {
    pub left: MotorPort,
    pub right: MotorPort,
    /// Motor carrying the distance sensor sweep head
    pub sweep: MotorPort,
    /// Distance sensor port
    pub sensor: SensorPort,
}

/// The update contract both drive models implement.
///
/// Compound motions hold the brick lock for their whole duration, so
/// concurrent callers queue rather than interleave commands.
pub trait Navigator: Send + Sync {
    /// Drive `distance` wheel rotations forward and update the estimate
    fn forward(&self, distance: f64, power: i8) -> Result<()>;

    /// Drive `distance` wheel rotations backward and update the estimate
    fn backward(&self, distance: f64, power: i8) -> Result<()>;

    /// Turn in place-ish and update the estimate; returns the measured
    /// heading change in degrees
    fn turn(&self, direction: TurnDirection, distance: f64, power: i8) -> Result<f32>;

    /// Sweep the distance sensor across `total_angle` degrees
    fn sweep(&self, total_angle: u16) -> Result<Vec<SensePoint>>;

    /// Continuous drive at `speed`, no estimate update
    fn drive(&self, speed: i8) -> Result<()>;

    /// Continuous differential steer, no estimate update
    fn steer(&self, turn: i16, speed: i8) -> Result<()>;

    /// Nudge the position estimate by an external correction
    fn correct_position(&self, dx: f64, dy: f64);

    /// Current estimate
    fn snapshot(&self) -> RobotState;
}

/// Normalize a heading into [0, 360)
pub fn normalize_heading(deg: f32) -> f32 {
    let d = deg % 360.0;
    if d < 0.0 {
        d + 360.0
    } else {
        d
    }
}

/// Signed shortest heading change from `from` to `to`, in (-180, 180]
pub fn heading_delta_deg(from: f32, to: f32) -> f32 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

const SWEEP_STEP: i32 = 15;
const SWEEP_POWER: i8 = 10;

/// Swing the sweep motor across `total_angle` degrees centered on the
/// current head position, sampling distance at each 15-degree stop, then
/// re-center. Sample angles combine the robot heading with the sweep
/// tacho so they live in the world frame.
pub(crate) fn sweep_scan(
    brick: &mut Brick,
    ports: DrivePorts,
    heading: f32,
    position: (f64, f64),
    total_angle: u16,
) -> Result<Vec<SensePoint>> {
    let total = if total_angle == 0 { 360 } else { total_angle as i32 };
    let steps = total / SWEEP_STEP;
    let half = total / 2;
    let mut samples = Vec::with_capacity(steps as usize);

    brick.motor(ports.sweep).reset_tacho()?;
    brick.motor(ports.sweep).on(-SWEEP_POWER, half as u32, true)?;
    brick.motor(ports.sweep).wait_for_stop(Some(-half))?;

    for i in 0..steps {
        let distance = brick.sensor(ports.sensor).read_si()?;
        let tacho = brick.motor(ports.sweep).tacho_count()?;
        samples.push(SensePoint {
            angle: normalize_heading(heading + tacho as f32),
            distance,
            pos_x: position.0,
            pos_y: position.1,
        });

        brick.motor(ports.sweep).on(SWEEP_POWER, SWEEP_STEP as u32, true)?;
        brick
            .motor(ports.sweep)
            .wait_for_stop(Some(-half + (i + 1) * SWEEP_STEP))?;
    }

    brick.motor(ports.sweep).on(-SWEEP_POWER, half as u32, true)?;
    brick.motor(ports.sweep).wait_for_stop(Some(0))?;

    log::debug!("Sweep of {} deg produced {} samples", total, samples.len());
    Ok(samples)
}
