//! TCP tunnel connection
//!
//! A tunnel relays brick frames over TCP. In the listen role this side
//! binds and waits for the relay to dial in; in the dial role it connects
//! out to a relay at a known address. Both roles then speak the usual
//! length-prefixed frames.

use super::{read_frame, reply_from_frame, write_frame, ConnError, Connection};
use crate::protocol::{Command, Reply};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(3);

enum Role {
    Listen { port: u16 },
    Dial { host: String, port: u16 },
}

/// Connection through a TCP tunnel relay
pub struct TunnelConnection {
    role: Role,
    stream: Option<TcpStream>,
}

impl TunnelConnection {
    /// Wait for a tunnel to dial in on `port`.
    pub fn listen(port: u16) -> Self {
        TunnelConnection {
            role: Role::Listen { port },
            stream: None,
        }
    }

    /// Dial out to a tunnel at `host:port`.
    pub fn dial(host: &str, port: u16) -> Self {
        TunnelConnection {
            role: Role::Dial {
                host: host.to_string(),
                port,
            },
            stream: None,
        }
    }

    fn configure(stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(())
    }
}

impl Connection for TunnelConnection {
    fn open(&mut self) -> Result<(), ConnError> {
        let stream = match &self.role {
            Role::Listen { port } => {
                let listener = TcpListener::bind(("0.0.0.0", *port))
                    .map_err(|e| ConnError::OpenError(format!("bind port {}: {}", port, e)))?;
                log::info!("Waiting for tunnel on port {}", port);
                let (stream, peer) = listener
                    .accept()
                    .map_err(|e| ConnError::OpenError(format!("accept: {}", e)))?;
                log::info!("Tunnel connected from {}", peer);
                stream
            }
            Role::Dial { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .map_err(|e| ConnError::OpenError(format!("{}:{}: {}", host, port, e)))?;
                log::info!("Tunnel connected to {}:{}", host, port);
                stream
            }
        };
        Self::configure(&stream).map_err(|e| ConnError::OpenError(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), ConnError> {
        let stream = self.stream.as_mut().ok_or(ConnError::NotConnected)?;
        write_frame(stream, command.as_bytes())
    }

    fn receive(&mut self) -> Result<Reply, ConnError> {
        let stream = self.stream.as_mut().ok_or(ConnError::NotConnected)?;
        let frame = read_frame(stream)?;
        reply_from_frame(&frame)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            log::info!("Tunnel closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
