//! WiFi connection with UDP brick discovery
//!
//! A brick with WiFi enabled broadcasts an announcement on UDP port 3015:
//! a CRLF-separated text blob naming its serial number, TCP port, name and
//! protocol. Opening waits for that broadcast, acks it with a single zero
//! byte, connects to the announced TCP port and performs the unlock
//! handshake before any frames flow.

use super::{read_frame, reply_from_frame, write_frame, ConnError, Connection};
use crate::protocol::{Command, Reply};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

/// UDP port the brick announces itself on
pub const DISCOVERY_PORT: u16 = 3015;

const IO_TIMEOUT: Duration = Duration::from_secs(3);
// the brick needs a beat between the discovery ack and accepting TCP
const ACK_SETTLE: Duration = Duration::from_millis(100);

/// Parsed discovery broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Announcement {
    pub serial_number: String,
    pub port: u16,
    pub name: String,
    pub protocol: String,
}

impl Announcement {
    pub(crate) fn parse(text: &str) -> Result<Self, ConnError> {
        let mut serial_number = None;
        let mut port = None;
        let mut name = String::new();
        let mut protocol = String::new();

        for line in text.split(['\r', '\n']) {
            if let Some(v) = line.strip_prefix("Serial-Number:") {
                serial_number = Some(v.trim().to_uppercase());
            } else if let Some(v) = line.strip_prefix("Port:") {
                port = v.trim().parse::<u16>().ok();
            } else if let Some(v) = line.strip_prefix("Name:") {
                name = v.trim().to_string();
            } else if let Some(v) = line.strip_prefix("Protocol:") {
                protocol = v.trim().to_string();
            }
        }

        match (serial_number, port) {
            (Some(serial_number), Some(port)) => Ok(Announcement {
                serial_number,
                port,
                name,
                protocol,
            }),
            _ => Err(ConnError::OpenError(format!(
                "malformed announcement: {:?}",
                text
            ))),
        }
    }

    /// Unlock request the brick expects before serving frames
    pub(crate) fn unlock_request(&self) -> Vec<u8> {
        format!(
            "GET /target?sn={}VMTP1.0\r\nProtocol:{}\r\n\r\n",
            self.serial_number, self.protocol
        )
        .into_bytes()
    }
}

/// Wait for one announcement on `socket`. A zero timeout waits forever.
fn discover(
    socket: &UdpSocket,
    timeout: Duration,
) -> Result<(Announcement, SocketAddr), ConnError> {
    let timeout = if timeout.is_zero() { None } else { Some(timeout) };
    socket
        .set_read_timeout(timeout)
        .map_err(|e| ConnError::OpenError(e.to_string()))?;

    let mut buf = [0u8; 512];
    let (n, peer) = socket.recv_from(&mut buf).map_err(|e| {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                ConnError::OpenError("brick not found".to_string())
            }
            _ => ConnError::OpenError(e.to_string()),
        }
    })?;
    let text = String::from_utf8_lossy(&buf[..n]);
    let announcement = Announcement::parse(&text)?;
    Ok((announcement, peer))
}

/// Connection to a WiFi-enabled brick
pub struct WifiConnection {
    timeout: Duration,
    discovery_port: u16,
    stream: Option<TcpStream>,
}

impl WifiConnection {
    /// Prepare a connection; `timeout` bounds the discovery wait
    /// (zero = wait forever).
    pub fn new(timeout: Duration) -> Self {
        WifiConnection {
            timeout,
            discovery_port: DISCOVERY_PORT,
            stream: None,
        }
    }
}

impl Connection for WifiConnection {
    fn open(&mut self) -> Result<(), ConnError> {
        let socket = UdpSocket::bind(("0.0.0.0", self.discovery_port)).map_err(|e| {
            ConnError::OpenError(format!("bind UDP port {}: {}", self.discovery_port, e))
        })?;
        log::info!(
            "Waiting for brick announcement on UDP port {}",
            self.discovery_port
        );
        let (announcement, peer) = discover(&socket, self.timeout)?;
        log::info!(
            "Discovered brick '{}' (SN {}) at {}",
            announcement.name,
            announcement.serial_number,
            peer.ip()
        );

        socket
            .send_to(&[0x00], peer)
            .map_err(|e| ConnError::OpenError(format!("discovery ack: {}", e)))?;
        std::thread::sleep(ACK_SETTLE);

        let mut stream = TcpStream::connect((peer.ip(), announcement.port))
            .map_err(|e| ConnError::OpenError(format!("{}:{}: {}", peer.ip(), announcement.port, e)))?;
        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_read_timeout(Some(IO_TIMEOUT)))
            .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(|e| ConnError::OpenError(e.to_string()))?;

        stream
            .write_all(&announcement.unlock_request())
            .map_err(|e| ConnError::OpenError(format!("unlock request: {}", e)))?;
        let mut unlock_reply = [0u8; 16];
        stream
            .read_exact(&mut unlock_reply)
            .map_err(|e| ConnError::OpenError(format!("unlock handshake: {}", e)))?;

        log::info!("Brick unlocked, frames can flow");
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
            log::info!("WiFi connection closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const BROADCAST: &str =
        "Serial-Number: 0016533f0c1e\r\nPort: 5555\r\nName: EV3\r\nProtocol: EV3";

    #[test]
    fn test_parse_announcement() {
        let ann = Announcement::parse(BROADCAST).unwrap();
        assert_eq!(ann.serial_number, "0016533F0C1E");
        assert_eq!(ann.port, 5555);
        assert_eq!(ann.name, "EV3");
        assert_eq!(ann.protocol, "EV3");
    }

    #[test]
    fn test_unlock_request_shape() {
        let ann = Announcement::parse(BROADCAST).unwrap();
        assert_eq!(
            ann.unlock_request(),
            b"GET /target?sn=0016533F0C1EVMTP1.0\r\nProtocol:EV3\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_malformed_announcement() {
        assert!(Announcement::parse("Name: EV3").is_err());
    }

    #[test]
    fn test_discovery_timeout() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let started = Instant::now();
        let result = discover(&socket, Duration::from_millis(100));
        assert!(matches!(result, Err(ConnError::OpenError(ref m)) if m == "brick not found"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_discovery_receives_broadcast() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = socket.local_addr().unwrap();

        let announcer = std::thread::spawn(move || {
            let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
            sender.send_to(BROADCAST.as_bytes(), target).unwrap();
        });

        let (ann, _peer) = discover(&socket, Duration::from_secs(2)).unwrap();
        assert_eq!(ann.port, 5555);
        announcer.join().unwrap();
    }
}
