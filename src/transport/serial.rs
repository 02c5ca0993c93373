//! Serial connection for a cabled brick

use super::{read_frame, reply_from_frame, write_frame, ConnError, Connection};
use crate::protocol::{Command, Reply};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection over a serial device node (USB cable)
pub struct SerialConnection {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialConnection {
    /// Prepare a connection for the given device path and baud rate.
    /// Nothing is opened until [`Connection::open`].
    pub fn new(path: &str, baud_rate: u32) -> Self {
        SerialConnection {
            path: path.to_string(),
            baud_rate,
            port: None,
        }
    }
}

pub(crate) fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, ConnError> {
    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(IO_TIMEOUT)
        .open()
        .map_err(|e| ConnError::OpenError(format!("{}: {}", path, e)))?;
    log::info!("Opened serial port {} at {} baud", path, baud_rate);
    Ok(port)
}

impl Connection for SerialConnection {
    fn open(&mut self) -> Result<(), ConnError> {
        self.port = Some(open_port(&self.path, self.baud_rate)?);
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), ConnError> {
        let port = self.port.as_mut().ok_or(ConnError::NotConnected)?;
        write_frame(&mut **port, command.as_bytes())
    }

    fn receive(&mut self) -> Result<Reply, ConnError> {
        let port = self.port.as_mut().ok_or(ConnError::NotConnected)?;
        let frame = read_frame(&mut **port)?;
        reply_from_frame(&frame)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed serial port {}", self.path);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
