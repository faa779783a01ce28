use dotenv::dotenv;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::game::{DEFAULT_CANVAS_HEIGHT, DEFAULT_PADDLE_Y};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be {expected}, got {value}")]
    OutOfRange {
        key: &'static str,
        expected: String,
        value: String,
    },
}

/// Who decides which paddle a connection may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidePolicy {
    /// Only the side assigned by the server at registration.
    Assigned,
    /// Whatever side the client names in the update.
    Client,
}

impl FromStr for SidePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assigned" => Ok(SidePolicy::Assigned),
            "client" => Ok(SidePolicy::Client),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
    pub canvas_height: f64,
    pub initial_paddle_y: f64,
    pub side_policy: SidePolicy,
    pub write_timeout: Duration,
    /// `None` disables server pings.
    pub ping_interval: Option<Duration>,
    pub outbound_buffer: usize,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 42069,
            static_dir: PathBuf::from("/app/src"),
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            initial_paddle_y: DEFAULT_PADDLE_Y,
            side_policy: SidePolicy::Assigned,
            write_timeout: Duration::from_millis(5000),
            ping_interval: Some(Duration::from_secs(30)),
            outbound_buffer: 64,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let canvas_height = parse(&lookup, "CANVAS_HEIGHT", defaults.canvas_height)?;
        if !(canvas_height.is_finite() && canvas_height > 0.0) {
            return Err(ConfigError::OutOfRange {
                key: "CANVAS_HEIGHT",
                expected: "a positive number".to_string(),
                value: canvas_height.to_string(),
            });
        }

        let initial_paddle_y = parse(&lookup, "INITIAL_PADDLE_Y", defaults.initial_paddle_y)?;
        if !(0.0..=canvas_height).contains(&initial_paddle_y) {
            return Err(ConfigError::OutOfRange {
                key: "INITIAL_PADDLE_Y",
                expected: format!("within 0..={canvas_height}"),
                value: initial_paddle_y.to_string(),
            });
        }

        let outbound_buffer = parse(&lookup, "OUTBOUND_BUFFER", defaults.outbound_buffer)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::OutOfRange {
                key: "OUTBOUND_BUFFER",
                expected: "at least 1".to_string(),
                value: outbound_buffer.to_string(),
            });
        }

        let write_timeout_ms: u64 = parse(&lookup, "WRITE_TIMEOUT_MS", 5000)?;
        let ping_interval_secs: u64 = parse(&lookup, "PING_INTERVAL_SECS", 30)?;

        Ok(Config {
            bind_address: parse(&lookup, "BIND_ADDRESS", defaults.bind_address)?,
            port: parse(&lookup, "PORT", defaults.port)?,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            canvas_height,
            initial_paddle_y,
            side_policy: parse(&lookup, "SIDE_POLICY", defaults.side_policy)?,
            write_timeout: Duration::from_millis(write_timeout_ms),
            ping_interval: (ping_interval_secs > 0).then(|| Duration::from_secs(ping_interval_secs)),
            outbound_buffer,
            log_json: parse_flag(&lookup, "LOG_JSON", defaults.log_json)?,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}
