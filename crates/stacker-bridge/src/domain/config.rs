//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments, environment variables and the
//! optional settings file; tests build it directly or use the defaults.

use std::time::Duration;

/// Default relay address, without the `ws://` scheme.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080/ws";

/// Default delay between a lost connection and the reconnection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use stacker_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.address, "127.0.0.1:8080/ws");
/// assert_eq!(cfg.reconnect_delay, Duration::from_millis(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// `host:port/path` of the relay's WebSocket endpoint.
    ///
    /// The transport prepends `ws://`; the relay does not speak TLS.
    pub address: String,

    /// Fixed delay before reconnecting after the connection closes.
    ///
    /// There is no backoff growth and no retry limit: the bridge retries
    /// forever at this pace until it is shut down.
    pub reconnect_delay: Duration,
}

impl Default for BridgeConfig {
    /// | Field           | Default             |
    /// |-----------------|---------------------|
    /// | address         | `127.0.0.1:8080/ws` |
    /// | reconnect_delay | 1000 ms             |
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address_is_local_relay() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.address, DEFAULT_ADDRESS);
    }

    #[test]
    fn test_default_reconnect_delay_is_one_second() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_config_custom_values() {
        let cfg = BridgeConfig {
            address: "10.0.0.5:9000/ws".to_string(),
            reconnect_delay: Duration::from_millis(250),
        };
        assert_eq!(cfg.address, "10.0.0.5:9000/ws");
        assert_eq!(cfg.reconnect_delay.as_millis(), 250);
    }
}
