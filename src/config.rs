//! Configuration for the yantra-io daemon
//!
//! Loads configuration from a TOML file: which transport reaches the
//! brick, how the drive train is wired, and where the control server
//! listens.

use crate::device::{MotorPort, SensorPort};
use crate::error::Result;
use crate::nav::{DrivePorts, Geometry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub robot: RobotConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// How to reach the brick
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Direct serial device
    Serial { device: String, baud_rate: u32 },
    /// Bonded RFCOMM device, matched by name against the serial ports
    Bluetooth { device_name: String },
    /// Wait for the brick to dial in over a TCP tunnel
    TunnelListen { port: u16 },
    /// Dial a TCP tunnel endpoint
    TunnelDial { host: String, port: u16 },
    /// UDP discovery plus the unlock handshake; zero timeout waits forever
    Wifi { timeout_ms: u64 },
}

/// Drive model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveModel {
    /// Differential tracks, turns in place
    Tank,
    /// Steered front wheel, turns on arcs
    Truck,
}

/// Drive train wiring and geometry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotConfig {
    pub drive_model: DriveModel,
    pub left_port: MotorPort,
    pub right_port: MotorPort,
    /// Motor carrying the distance sensor sweep head
    pub sweep_port: MotorPort,
    /// Distance sensor input
    pub sensor_port: SensorPort,
    /// Orientation sensor input; omit to hold heading at zero
    pub gyro_port: Option<SensorPort>,
    /// Distance between the wheel centers
    #[serde(default = "default_wheelbase")]
    pub wheelbase_length: f64,
    /// Distance covered per tacho tick
    #[serde(default = "default_circumference")]
    pub tyre_circumference: f64,
}

fn default_wheelbase() -> f64 {
    16.0
}

fn default_circumference() -> f64 {
    std::f64::consts::PI * 3.1
}

/// Control server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// TCP bind address for the control protocol
    ///
    /// Examples:
    /// - `0.0.0.0:5429` - All interfaces on the default port
    /// - `127.0.0.1:5429` - Localhost only
    pub bind_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log output (stdout, stderr, or file path)
    pub output: String,
}

impl RobotConfig {
    pub fn geometry(&self) -> Geometry {
        Geometry {
            wheelbase_length: self.wheelbase_length,
            tyre_circumference: self.tyre_circumference,
        }
    }

    pub fn ports(&self) -> DrivePorts {
        DrivePorts {
            left: self.left_port,
            right: self.right_port,
            sweep: self.sweep_port,
            sensor: self.sensor_port,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for a bonded EV3 brick
    ///
    /// Suitable for testing and development. Production deployments
    /// should use a proper TOML configuration file.
    pub fn ev3_defaults() -> Self {
        Self {
            transport: TransportConfig::Bluetooth {
                device_name: "EV3".to_string(),
            },
            robot: RobotConfig {
                drive_model: DriveModel::Tank,
                left_port: MotorPort::OutB,
                right_port: MotorPort::OutC,
                sweep_port: MotorPort::OutA,
                sensor_port: SensorPort::In1,
                gyro_port: Some(SensorPort::In2),
                wheelbase_length: default_wheelbase(),
                tyre_circumference: default_circumference(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0:5429".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                output: "stdout".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::ev3_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::ev3_defaults();
        assert_eq!(config.robot.drive_model, DriveModel::Tank);
        assert_eq!(config.robot.left_port, MotorPort::OutB);
        assert_eq!(config.robot.right_port, MotorPort::OutC);
        assert_eq!(config.server.bind_address, "0.0.0.0:5429");
        assert!(matches!(config.transport, TransportConfig::Bluetooth { .. }));
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::ev3_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[transport]"));
        assert!(toml_string.contains("kind = \"bluetooth\""));
        assert!(toml_string.contains("[robot]"));
        assert!(toml_string.contains("drive_model = \"tank\""));
        assert!(toml_string.contains("left_port = \"out_b\""));
        assert!(toml_string.contains("[server]"));
        assert!(toml_string.contains("[logging]"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[transport]
kind = "tunnel_dial"
host = "192.168.1.42"
port = 7100

[robot]
drive_model = "truck"
left_port = "out_a"
right_port = "out_d"
sweep_port = "out_b"
sensor_port = "in3"
wheelbase_length = 12.5

[server]
bind_address = "127.0.0.1:5429"

[logging]
level = "debug"
output = "stdout"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(matches!(
            config.transport,
            TransportConfig::TunnelDial { ref host, port: 7100 } if host == "192.168.1.42"
        ));
        assert_eq!(config.robot.drive_model, DriveModel::Truck);
        assert_eq!(config.robot.sensor_port, SensorPort::In3);
        assert_eq!(config.robot.gyro_port, None);
        assert_eq!(config.robot.wheelbase_length, 12.5);
        // omitted geometry falls back to the default tyre
        assert!(config.robot.tyre_circumference > 9.7);
    }
}
