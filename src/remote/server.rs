//! Control server: one listener, one thread per client

use super::message::{RemoteCommand, RemoteMessage, HEADER_LEN};
use crate::error::Result;
use crate::nav::{encode_points, Navigator, TurnDirection};
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ACCEPT_POLL: Duration = Duration::from_millis(10);
const CLIENT_READ_TIMEOUT: Duration = Duration::from_millis(500);
// distance moves default to full power; a manual session drops to a crawl
const DEFAULT_POWER: i8 = 80;
const REMOTE_POWER: i8 = 20;

/// Per-client session state
struct Session {
    default_power: i8,
}

/// TCP control server driving one [`Navigator`].
///
/// The listener is nonblocking so the accept loop can watch the shutdown
/// flag; each accepted client gets its own named thread and survives its
/// own dispatch errors.
pub struct RemoteServer {
    listener: TcpListener,
    navigator: Arc<dyn Navigator>,
    running: Arc<AtomicBool>,
}

impl RemoteServer {
    pub fn bind(addr: &str, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        log::info!("Control server listening on {}", listener.local_addr()?);
        Ok(RemoteServer {
            listener,
            navigator,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shutdown flag; store `false` to stop the accept loop
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Accept clients until the shutdown flag drops
    pub fn run(&self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("Client connected from {}", peer);
                    let navigator = Arc::clone(&self.navigator);
                    let running = Arc::clone(&self.running);
                    std::thread::Builder::new()
                        .name(format!("remote-client-{}", peer))
                        .spawn(move || {
                            if let Err(e) = serve_client(stream, navigator, running) {
                                log::warn!("Client {} dropped: {}", peer, e);
                            } else {
                                log::info!("Client {} disconnected", peer);
                            }
                        })?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
        log::info!("Control server stopped");
        Ok(())
    }

    /// Run the accept loop on its own named thread
    pub fn spawn(self) -> Result<std::thread::JoinHandle<()>> {
        Ok(std::thread::Builder::new()
            .name("remote-server".to_string())
            .spawn(move || {
                if let Err(e) = self.run() {
                    log::error!("Control server failed: {}", e);
                }
            })?)
    }
}

fn serve_client(
    mut stream: TcpStream,
    navigator: Arc<dyn Navigator>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;
    stream.set_nodelay(true)?;
    let mut session = Session {
        default_power: DEFAULT_POWER,
    };

    // a header split across read timeouts must not lose its first bytes
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while running.load(Ordering::SeqCst) {
        match stream.read(&mut header[filled..]) {
            Ok(0) => return Ok(()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        if filled < HEADER_LEN {
            continue;
        }
        filled = 0;
        let msg = RemoteMessage::from_header(&header)?;

        log::debug!(
            "Request {:?} ({}, {})",
            msg.command,
            msg.param1,
            msg.param2
        );
        match dispatch(&msg, &navigator, &mut session) {
            Ok(Some(reply)) => reply.write_to(&mut stream)?,
            Ok(None) => {}
            Err(e) => {
                log::warn!("Command {:?} failed: {}", msg.command, e);
                if expects_reply(msg.command) {
                    let text = e.to_string().into_bytes();
                    let reply = RemoteMessage::with_payload(
                        RemoteCommand::Null,
                        text.len() as i32,
                        0,
                        text,
                    );
                    reply.write_to(&mut stream)?;
                }
            }
        }
    }
    Ok(())
}

fn expects_reply(command: RemoteCommand) -> bool {
    !matches!(
        command,
        RemoteCommand::Speed | RemoteCommand::Turn | RemoteCommand::CorrectPosition
    )
}

fn dispatch(
    msg: &RemoteMessage,
    navigator: &Arc<dyn Navigator>,
    session: &mut Session,
) -> Result<Option<RemoteMessage>> {
    use RemoteCommand::*;

    // distance moves encode rotations x100; zeroes mean "use defaults"
    let distance = if msg.param1 == 0 {
        1.0
    } else {
        msg.param1 as f64 / 100.0
    };
    let power = if msg.param2 == 0 {
        session.default_power
    } else {
        msg.param2.clamp(-100, 100) as i8
    };

    match msg.command {
        Forward => {
            navigator.forward(distance, power)?;
            Ok(Some(RemoteMessage::new(Ack, msg.param1, msg.param2)))
        }
        Back => {
            navigator.backward(distance, power)?;
            Ok(Some(RemoteMessage::new(Ack, msg.param1, msg.param2)))
        }
        Left => {
            navigator.turn(TurnDirection::Left, distance, power)?;
            Ok(Some(RemoteMessage::new(Ack, msg.param1, msg.param2)))
        }
        Right => {
            navigator.turn(TurnDirection::Right, distance, power)?;
            Ok(Some(RemoteMessage::new(Ack, msg.param1, msg.param2)))
        }
        Speed => {
            navigator.drive(msg.param1.clamp(-100, 100) as i8)?;
            Ok(None)
        }
        Turn => {
            navigator.steer(
                msg.param1.clamp(-200, 200) as i16,
                msg.param2.clamp(-100, 100) as i8,
            )?;
            Ok(None)
        }
        Sense => {
            let points = navigator.sweep(msg.param1.clamp(0, 360) as u16)?;
            Ok(Some(RemoteMessage::with_payload(
                Sense,
                points.len() as i32,
                0,
                encode_points(&points),
            )))
        }
        Info => {
            let state = navigator.snapshot();
            Ok(Some(RemoteMessage::with_payload(
                Info,
                0,
                0,
                state.to_bytes().to_vec(),
            )))
        }
        CorrectPosition => {
            navigator.correct_position(msg.param1 as f64, msg.param2 as f64);
            Ok(None)
        }
        Hello => Ok(Some(RemoteMessage::new(Hello, 0, 0))),
        RemoteControl => {
            session.default_power = REMOTE_POWER;
            log::info!("Session switched to manual power {}", REMOTE_POWER);
            Ok(Some(RemoteMessage::new(Hello, 0, 0)))
        }
        Null | Map | Auto | Off | Ack => {
            Ok(Some(RemoteMessage::new(msg.command, msg.param1, msg.param2)))
        }
    }
}
