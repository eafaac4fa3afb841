//! Relay configuration
//!
//! Built from defaults and the binary's command line.

use std::time::Duration;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default bound on one `wait`; only used to re-check the stop flag
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime settings for a `RelayServer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the listener binds to
    pub bind_addr: String,
    /// Timeout passed to each `Reactor::wait`
    pub poll_interval: Duration,
    /// Whether to read operator commands from stdin
    pub console: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            console: true,
        }
    }
}

impl RelayConfig {
    /// Parse `[bind_addr] [--no-console]`, program name included
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();

        for arg in args.into_iter().skip(1) {
            match arg.as_str() {
                "--no-console" => config.console = false,
                _ => config.bind_addr = arg,
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_args(args(&["chat_relay"]));
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.bind_addr, DEFAULT_ADDR);
        assert!(config.console);
    }

    #[test]
    fn test_address_and_flag() {
        let config = RelayConfig::from_args(args(&["chat_relay", "--no-console", "0.0.0.0:9000"]));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(!config.console);
    }
}
