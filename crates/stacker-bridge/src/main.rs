//! Focus stacker operator bridge: entry point.
//!
//! This binary connects to the relay's WebSocket, follows the start-up
//! chain (`get_serial_status`, version, configuration), logs device status
//! as it arrives, and optionally performs one operator action once the
//! device configuration is known.
//!
//! # Usage
//!
//! ```text
//! stacker-bridge [OPTIONS] [COMMAND]
//!
//! Commands:
//!   monitor         Only watch the device (default)
//!   connect-serial  Ask the relay to open a serial port
//!   move            Move the stack motor by a number of steps
//!   move-degrees    Move the stack motor by a rotation in degrees
//!   stack           Start a stacking run
//!   stop            Stop the current run
//!   photo           Take a single photo
//!   set             Edit configuration fields and upload them
//!
//! Options:
//!   --address <HOST:PORT/PATH>       Relay WebSocket address [default: 127.0.0.1:8080/ws]
//!   --reconnect-delay-ms <MS>        Delay before reconnecting [default: 1000]
//!   --settings <FILE>                Optional TOML settings file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                     | Description                        |
//! |------------------------------|------------------------------------|
//! | `STACKER_ADDRESS`            | Relay WebSocket address            |
//! | `STACKER_RECONNECT_DELAY_MS` | Reconnect delay in milliseconds    |
//! | `STACKER_SETTINGS`           | Path of the TOML settings file     |
//! | `RUST_LOG`                   | Log filter, overrides the settings |
//!
//! Precedence: command line, then environment, then settings file, then the
//! built-in defaults.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stacker_core::config::{FlatConfig, Scalar};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stacker_bridge::application::{Controller, DispatchRegistry, Intent};
use stacker_bridge::domain::{BridgeConfig, Settings};
use stacker_bridge::infrastructure::{ConnectionManager, WebSocketTransport};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Operator client for the focus stacker relay.
#[derive(Debug, Parser)]
#[command(
    name = "stacker-bridge",
    about = "WebSocket operator client for the focus stacker relay",
    version
)]
struct Cli {
    /// Relay address as `host:port/path`, without the `ws://` scheme.
    #[arg(long, env = "STACKER_ADDRESS")]
    address: Option<String>,

    /// Fixed delay before reconnecting after the socket closes.
    #[arg(long, env = "STACKER_RECONNECT_DELAY_MS")]
    reconnect_delay_ms: Option<u64>,

    /// Optional TOML settings file.
    #[arg(long, env = "STACKER_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    /// Only watch the device.
    Monitor,
    /// Ask the relay to open a serial port.
    ConnectSerial {
        /// Port name as the relay's host knows it, e.g. `COM3` or `/dev/ttyUSB0`.
        device: String,
    },
    /// Move the stack motor by a signed number of steps.
    Move {
        #[arg(allow_negative_numbers = true)]
        steps: i64,
    },
    /// Move the stack motor by a signed rotation in whole degrees.
    MoveDegrees {
        #[arg(allow_negative_numbers = true)]
        degrees: i64,
    },
    /// Start a stacking run.
    Stack,
    /// Stop the current run.
    Stop,
    /// Take a single photo.
    Photo,
    /// Edit configuration fields (`KEY=VALUE`) and upload them.
    Set {
        #[arg(value_parser = parse_assignment, required = true)]
        assignments: Vec<(String, Scalar)>,
    },
}

/// Parses one `KEY=VALUE` form assignment.
fn parse_assignment(text: &str) -> Result<(String, Scalar), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{text}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{text}`"));
    }
    let value = value.parse::<Scalar>().map_err(|e| e.to_string())?;
    Ok((key.to_string(), value))
}

impl Cli {
    /// Takes the operator intent out of the parsed arguments.  No subcommand
    /// means `monitor`.
    fn take_intent(&mut self) -> Intent {
        self.command.take().map_or(Intent::Monitor, Intent::from)
    }

    /// Resolves the runtime configuration against the settings file.
    fn into_bridge_config(self, settings: &Settings) -> BridgeConfig {
        settings.resolve(self.address, self.reconnect_delay_ms)
    }
}

impl From<Command> for Intent {
    fn from(command: Command) -> Self {
        match command {
            Command::Monitor => Intent::Monitor,
            Command::ConnectSerial { device } => Intent::ConnectSerial(device),
            Command::Move { steps } => Intent::Move(steps),
            Command::MoveDegrees { degrees } => Intent::MoveDegrees(degrees),
            Command::Stack => Intent::Stack,
            Command::Stop => Intent::Stop,
            Command::Photo => Intent::Photo,
            Command::Set { assignments } => {
                Intent::Set(assignments.into_iter().collect::<FlatConfig>())
            }
        }
    }
}

/// Loads the settings file, or the defaults when none was given.
fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed with `clap` and the settings file is loaded.
/// 2. `tracing_subscriber` is initialised from `RUST_LOG`, or from the
///    settings' `[logging] level` when `RUST_LOG` is unset.
/// 3. The [`Controller`] installs its handlers into a [`DispatchRegistry`].
/// 4. The [`ConnectionManager`] opens the relay socket.
/// 5. A Ctrl+C handler cancels the shutdown token; the event loop runs until
///    then, reconnecting after every close.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let intent = cli.take_intent();
    let config = cli.into_bridge_config(&settings);
    info!(
        address = %config.address,
        reconnect_delay = ?config.reconnect_delay,
        ?intent,
        "stacker bridge starting"
    );

    let controller = Controller::new(intent);
    let mut registry = DispatchRegistry::new();
    controller.install(&mut registry);

    let address = config.address.clone();
    let mut manager = ConnectionManager::new(WebSocketTransport::new(), registry, config);
    manager
        .open(&address)
        .with_context(|| format!("cannot connect to relay at {address}"))?;

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                trigger.cancel();
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    manager.run(shutdown).await;

    let last = controller.snapshot();
    info!(
        firmware = last.firmware.as_deref().unwrap_or("unknown"),
        status = %last.status.map(|s| s.to_string()).unwrap_or_default(),
        "stacker bridge stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_defaults_have_no_overrides() {
        // Arrange / Act
        let cli = Cli::parse_from(["stacker-bridge"]);

        // Assert
        assert_eq!(cli.address, None);
        assert_eq!(cli.reconnect_delay_ms, None);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_into_bridge_config_defaults() {
        let cli = Cli::parse_from(["stacker-bridge"]);
        let config = cli.into_bridge_config(&Settings::default());
        assert_eq!(config.address, "127.0.0.1:8080/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_cli_address_beats_settings_file() {
        // Arrange
        let settings =
            Settings::from_toml_str("[bridge]\naddress = \"10.0.0.2:8080/ws\"\n").unwrap();
        let cli = Cli::parse_from(["stacker-bridge", "--address", "10.0.0.9:9000/ws"]);

        // Act
        let config = cli.into_bridge_config(&settings);

        // Assert
        assert_eq!(config.address, "10.0.0.9:9000/ws");
    }

    #[test]
    fn test_reconnect_delay_override() {
        let cli = Cli::parse_from(["stacker-bridge", "--reconnect-delay-ms", "250"]);
        let config = cli.into_bridge_config(&Settings::default());
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_move_accepts_negative_steps() {
        let mut cli = Cli::parse_from(["stacker-bridge", "move", "-200"]);
        assert_eq!(cli.take_intent(), Intent::Move(-200));
    }

    #[test]
    fn test_move_degrees_subcommand() {
        let mut cli = Cli::parse_from(["stacker-bridge", "move-degrees", "90"]);
        assert_eq!(cli.take_intent(), Intent::MoveDegrees(90));
    }

    #[test]
    fn test_connect_serial_subcommand() {
        let mut cli = Cli::parse_from(["stacker-bridge", "connect-serial", "/dev/ttyUSB0"]);
        assert_eq!(
            cli.take_intent(),
            Intent::ConnectSerial("/dev/ttyUSB0".to_string())
        );
    }

    #[test]
    fn test_set_collects_assignments() {
        // Arrange / Act
        let mut cli = Cli::parse_from([
            "stacker-bridge",
            "set",
            "stack_stack_count=40",
            "ui_transmission_ratio=2.5",
        ]);

        // Assert
        let Intent::Set(values) = cli.take_intent() else {
            panic!("expected a set intent");
        };
        assert_eq!(values.get("stack_stack_count"), Some(&Scalar::Int(40)));
        assert_eq!(values.get("ui_transmission_ratio"), Some(&Scalar::Float(2.5)));
    }

    #[test]
    fn test_set_without_assignments_is_rejected() {
        let result = Cli::try_parse_from(["stacker-bridge", "set"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_assignment_rejects_missing_equals() {
        assert!(parse_assignment("stack_stack_count").is_err());
    }

    #[test]
    fn test_parse_assignment_rejects_non_numeric_value() {
        assert!(parse_assignment("stack_stack_count=many").is_err());
    }

    #[test]
    fn test_parse_assignment_rejects_empty_key() {
        assert!(parse_assignment("=5").is_err());
    }

    #[test]
    fn test_no_subcommand_is_monitor() {
        let mut cli = Cli::parse_from(["stacker-bridge"]);
        assert_eq!(cli.take_intent(), Intent::Monitor);
    }

    #[test]
    fn test_take_intent_leaves_no_command_behind() {
        // Arrange
        let mut cli = Cli::parse_from(["stacker-bridge", "photo"]);

        // Act
        let intent = cli.take_intent();

        // Assert
        assert_eq!(intent, Intent::Photo);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_monitor_subcommand_maps_to_monitor() {
        assert_eq!(Intent::from(Command::Monitor), Intent::Monitor);
    }

    #[test]
    fn test_missing_settings_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/stacker-settings.toml");
        assert!(load_settings(Some(&path)).is_err());
    }
}
