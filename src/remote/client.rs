//! Blocking control client

use super::message::{RemoteCommand, RemoteMessage};
use crate::error::{Error, Result};
use crate::nav::{decode_points, RobotState, SensePoint};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};

/// One TCP session against a control server.
///
/// Commands that carry a reply block until it arrives; the fire-and-forget
/// commands (`set_speed`, `set_turn`, `correct_position`) return as soon as
/// the request is on the wire.
pub struct BotClient {
    stream: TcpStream,
}

impl BotClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(BotClient { stream })
    }

    fn send(&mut self, msg: RemoteMessage) -> Result<()> {
        msg.write_to(&mut self.stream)
    }

    fn request(&mut self, msg: RemoteMessage) -> Result<RemoteMessage> {
        msg.write_to(&mut self.stream)?;
        let mut reply = RemoteMessage::read_header(&mut self.stream)?;

        // Sense and Null replies carry their payload size in param1
        let payload_len = match reply.command {
            RemoteCommand::Info => RobotState::WIRE_LEN,
            RemoteCommand::Sense => reply.param1.max(0) as usize * SensePoint::WIRE_LEN,
            RemoteCommand::Null => reply.param1.max(0) as usize,
            _ => 0,
        };
        if payload_len > 0 {
            let mut payload = vec![0u8; payload_len];
            self.stream.read_exact(&mut payload)?;
            reply.payload = payload;
        }

        if reply.command == RemoteCommand::Null {
            return Err(Error::Other(format!(
                "server rejected {:?}: {}",
                msg.command,
                String::from_utf8_lossy(&reply.payload)
            )));
        }
        Ok(reply)
    }

    /// Connect handshake
    pub fn hello(&mut self) -> Result<()> {
        self.request(RemoteMessage::new(RemoteCommand::Hello, 0, 0))?;
        Ok(())
    }

    /// Switch the session to its low-power manual defaults
    pub fn remote_control(&mut self) -> Result<()> {
        self.request(RemoteMessage::new(RemoteCommand::RemoteControl, 0, 0))?;
        Ok(())
    }

    /// Drive `distance` wheel rotations forward; zeroes pick server defaults
    pub fn forward(&mut self, distance: f64, power: i8) -> Result<()> {
        self.distance_move(RemoteCommand::Forward, distance, power)
    }

    /// Drive `distance` wheel rotations backward
    pub fn back(&mut self, distance: f64, power: i8) -> Result<()> {
        self.distance_move(RemoteCommand::Back, distance, power)
    }

    /// Turn left over `distance` wheel rotations
    pub fn left(&mut self, distance: f64, power: i8) -> Result<()> {
        self.distance_move(RemoteCommand::Left, distance, power)
    }

    /// Turn right over `distance` wheel rotations
    pub fn right(&mut self, distance: f64, power: i8) -> Result<()> {
        self.distance_move(RemoteCommand::Right, distance, power)
    }

    fn distance_move(&mut self, command: RemoteCommand, distance: f64, power: i8) -> Result<()> {
        let msg = RemoteMessage::new(command, (distance * 100.0).round() as i32, power as i32);
        self.request(msg)?;
        Ok(())
    }

    /// Continuous drive; zero stops
    pub fn set_speed(&mut self, speed: i8) -> Result<()> {
        self.send(RemoteMessage::new(RemoteCommand::Speed, speed as i32, 0))
    }

    /// Continuous differential steer
    pub fn set_turn(&mut self, turn: i16, power: i8) -> Result<()> {
        self.send(RemoteMessage::new(
            RemoteCommand::Turn,
            turn as i32,
            power as i32,
        ))
    }

    /// Sweep the distance sensor over `total_angle` degrees
    pub fn sense(&mut self, total_angle: u16) -> Result<Vec<SensePoint>> {
        let reply = self.request(RemoteMessage::new(
            RemoteCommand::Sense,
            total_angle as i32,
            0,
        ))?;
        decode_points(&reply.payload)
    }

    /// Fetch the server's position estimate
    pub fn info(&mut self) -> Result<RobotState> {
        let reply = self.request(RemoteMessage::new(RemoteCommand::Info, 0, 0))?;
        RobotState::from_bytes(&reply.payload)
    }

    /// Nudge the server's position estimate
    pub fn correct_position(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.send(RemoteMessage::new(RemoteCommand::CorrectPosition, dx, dy))
    }
}
