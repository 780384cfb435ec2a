//! # Joycon Bridge
//!
//! Connects to the Joy-Cons that are plugged in, calibrates them and prints
//! their decoded state as JSON lines.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use joycon_bridge::config::{Config, LoggingConfig};
use joycon_bridge::controller::joycon::{discover, Joycon};
use joycon_bridge::protocol::state::{CalibrationOffsets, Side};
use joycon_bridge::transport::hid::HidapiBackend;

/// Log file name prefix inside the configured directory
const LOG_FILE_PREFIX: &str = "joycon-bridge.log";

/// Main entry point for Joycon Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, defaults otherwise)
///    - Set up logging to stdout or daily rolling files
///    - Discover and connect every Joy-Con found
///
/// 2. **Calibration**
///    - Each controller is held still while 30 samples are averaged
///
/// 3. **Main Loop**
///    - Print one status line per controller per tick
///    - Count up the player lights in binary, one step per tick
///    - Stop after the configured iterations or on Ctrl+C
///
/// 4. **Shutdown**
///    - Disconnect every controller
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - hidapi cannot be initialized
/// - No Joy-Con is connected
///
/// # Examples
///
/// ```bash
/// cargo run --release --features hidapi -- config/joycon.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging);
    info!("Joycon Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = HidapiBackend::new().context("Failed to initialize hidapi")?;
    let found = discover(&backend, &config.device)?;
    let settings = config.controller_settings();

    let mut controllers = Vec::new();
    for side in [Side::Left, Side::Right] {
        let Some(identity) = found.get(side) else {
            warn!("Joycon {} not found", side);
            continue;
        };
        let mut joycon = Joycon::new(identity, settings);
        match joycon.connect(&backend, CalibrationOffsets::default()) {
            Ok(()) => controllers.push(joycon),
            Err(e) => error!("{}: {}", joycon.name(), e),
        }
    }

    if controllers.is_empty() {
        bail!("No Joy-Con could be connected");
    }

    info!("Calibrating, keep the controllers still");
    let mut controllers = tokio::task::spawn_blocking(move || {
        for joycon in controllers.iter_mut() {
            if let Err(e) = joycon.calibrate() {
                warn!("{}: calibration failed: {}", joycon.name(), e);
            }
        }
        controllers
    })
    .await
    .context("Calibration task failed")?;

    let mut ticker = interval(Duration::from_millis(config.demo.interval_ms));
    let mut tick: u64 = 0;
    let mut lamp_pattern: u8 = 0;
    info!("Press Ctrl+C to exit");

    while tick < config.demo.iterations {
        tokio::select! {
            _ = ticker.tick() => {
                for joycon in &controllers {
                    println!("{}", status_line(joycon));
                }

                for joycon in controllers.iter_mut() {
                    if let Err(e) = joycon.set_player_lamp_on(lamp_pattern) {
                        warn!("{}: {}", joycon.name(), e);
                    }
                }
                lamp_pattern = next_lamp_pattern(lamp_pattern);
                tick += 1;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    for joycon in controllers.iter_mut() {
        joycon.disconnect();
    }
    info!("Stopped after {} ticks", tick);

    Ok(())
}

/// Install the tracing subscriber
///
/// Logs go to daily rolling files when a directory is configured, stdout
/// otherwise. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Next 4-bit player-light pattern, wrapping from 15 back to 0
fn next_lamp_pattern(pattern: u8) -> u8 {
    pattern.wrapping_add(1) & 0x0F
}

fn status_line(joycon: &Joycon) -> Value {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match joycon.get_status() {
        Ok(state) => json!({
            "timestamp": timestamp,
            "controller": joycon.name(),
            "status": joycon.status(),
            "state": state,
        }),
        Err(e) => json!({
            "timestamp": timestamp,
            "controller": joycon.name(),
            "status": joycon.status(),
            "error": e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joycon_bridge::controller::joycon::ControllerSettings;
    use joycon_bridge::protocol::state::ControllerIdentity;

    #[test]
    fn test_lamp_pattern_counts_every_tick() {
        let patterns: Vec<u8> = std::iter::successors(Some(0u8), |&p| Some(next_lamp_pattern(p)))
            .take(4)
            .collect();
        assert_eq!(patterns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_lamp_pattern_wraps_at_sixteen() {
        assert_eq!(next_lamp_pattern(14), 15);
        assert_eq!(next_lamp_pattern(15), 0);
    }

    #[test]
    fn test_status_line_disconnected() {
        let joycon = Joycon::new(
            ControllerIdentity::new(Side::Left, 1406, 8198),
            ControllerSettings::default(),
        );
        let line = status_line(&joycon);
        assert_eq!(line["controller"], "Joycon Left");
        assert_eq!(line["status"], "Not connected");
        assert!(line.get("state").is_none());
        assert!(line["error"].is_string());
        assert!(line["timestamp"].is_string());
    }
}
