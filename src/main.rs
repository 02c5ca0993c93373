//! yantra-io - remote control daemon for a LEGO EV3 drive base
//!
//! Connects to the brick over the configured transport, keeps a
//! dead-reckoned position estimate, and serves the TCP control protocol
//! on port 5429.

use std::env;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use yantra_io::config::{AppConfig, DriveModel};
use yantra_io::device::Brick;
use yantra_io::error::{Error, Result};
use yantra_io::nav::{HeadingSource, Navigator, SharedHeading, TankNavigator, TruckNavigator};
use yantra_io::remote::RemoteServer;
use yantra_io::transport::create_connection;

const HEADING_POLL: Duration = Duration::from_millis(50);

/// Parse config path from command line arguments.
///
/// Supports:
/// - `yantra-io <path>` (positional)
/// - `yantra-io --config <path>` (flag-based)
/// - `yantra-io -c <path>` (short flag)
///
/// Defaults to `/etc/yantraio.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/yantraio.toml".to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("yantra-io v0.1.0 starting...");

    let config_path = parse_config_path();
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => {
            log::info!("Using config: {}", config_path);
            config
        }
        Err(e) => {
            log::warn!("Could not load {}: {}; using defaults", config_path, e);
            AppConfig::ev3_defaults()
        }
    };

    let mut brick = Brick::new(create_connection(&config.transport));
    brick.open()?;
    log::info!("Brick connected");
    // liveness beep
    brick.play_tone(20, 880, 300)?;

    let brick = Arc::new(Mutex::new(brick));
    let heading = Arc::new(SharedHeading::new(0.0));

    let navigator: Arc<dyn Navigator> = match config.robot.drive_model {
        DriveModel::Tank => Arc::new(TankNavigator::new(
            Arc::clone(&brick),
            heading.clone() as Arc<dyn HeadingSource>,
            config.robot.geometry(),
            config.robot.ports(),
        )),
        DriveModel::Truck => Arc::new(TruckNavigator::new(
            Arc::clone(&brick),
            heading.clone() as Arc<dyn HeadingSource>,
            config.robot.geometry(),
            config.robot.ports(),
        )),
    };

    let server = RemoteServer::bind(&config.server.bind_address, navigator)?;
    let running = server.running();

    // feed the heading cell from the orientation sensor
    if let Some(gyro_port) = config.robot.gyro_port {
        let poll_brick = Arc::clone(&brick);
        let poll_heading = Arc::clone(&heading);
        let poll_running = Arc::clone(&running);
        thread::Builder::new()
            .name("heading-poll".to_string())
            .spawn(move || {
                while poll_running.load(Ordering::SeqCst) {
                    match poll_brick.lock().sensor(gyro_port).read_si() {
                        Ok(angle) => poll_heading.set(angle),
                        Err(e) => log::warn!("Heading read failed: {}", e),
                    }
                    thread::sleep(HEADING_POLL);
                }
            })?;
        log::info!("Heading source: gyro on {:?}", gyro_port);
    } else {
        log::warn!("No gyro configured, heading is pinned at 0");
    }

    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("yantra-io running. Press Ctrl-C to stop.");
    server.run()?;

    log::info!("Shutting down...");
    brick.lock().close();
    log::info!("yantra-io stopped");
    Ok(())
}
