//! Bluetooth connection over the bonded RFCOMM link
//!
//! The brick is paired against the serial port profile (UUID
//! [`SPP_UUID`]); once bonded, the link shows up as an RFCOMM tty.
//! Opening enumerates the available serial devices and picks the one
//! matching the configured brick name. A missing device is fatal:
//! retrying a pairing that is not there only hangs the radio.

use super::{read_frame, reply_from_frame, serial::open_port, write_frame, ConnError, Connection};
use crate::protocol::{Command, Reply};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};

/// Serial port profile UUID the brick is bonded under
pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

// RFCOMM ignores the baud rate, but the port layer requires one
const BAUD_RATE: u32 = 115200;

/// Connection over a bonded Bluetooth RFCOMM device
pub struct BluetoothConnection {
    device_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl BluetoothConnection {
    /// Prepare a connection to the brick bonded under `device_name`.
    pub fn new(device_name: &str) -> Self {
        BluetoothConnection {
            device_name: device_name.to_string(),
            port: None,
        }
    }
}

/// Pick the port whose name or USB product string matches the brick name.
fn match_port(ports: &[SerialPortInfo], name: &str) -> Option<String> {
    for info in ports {
        if info.port_name.contains(name) {
            return Some(info.port_name.clone());
        }
        if let SerialPortType::UsbPort(usb) = &info.port_type {
            if usb.product.as_deref() == Some(name) {
                return Some(info.port_name.clone());
            }
        }
    }
    None
}

impl Connection for BluetoothConnection {
    fn open(&mut self) -> Result<(), ConnError> {
        let ports = serialport::available_ports()
            .map_err(|e| ConnError::OpenError(format!("port enumeration failed: {}", e)))?;
        log::debug!(
            "Scanning {} serial devices for bonded brick '{}'",
            ports.len(),
            self.device_name
        );
        let path = match_port(&ports, &self.device_name).ok_or_else(|| {
            ConnError::OpenError(format!("device not found: {}", self.device_name))
        })?;
        self.port = Some(open_port(&path, BAUD_RATE)?);
        log::info!("Bluetooth link to '{}' via {}", self.device_name, path);
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
            log::info!("Closed Bluetooth link to '{}'", self.device_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
