// config.rs - Startup settings: defaults, overridden from the environment
use crate::drive::{DEFAULT_ROTATION_STEP, DEFAULT_VELOCITY_STEP, DriveSteps};
use crate::link::DEFAULT_BAUD;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Steps(#[from] crate::drive::InvalidSteps),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// `None` means pick the first port that opens.
    pub serial_path: Option<String>,
    pub baud: u32,
    pub frame_path: Option<PathBuf>,
    pub frame_interval: Duration,
    pub steps: DriveSteps,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            serial_path: None,
            baud: DEFAULT_BAUD,
            frame_path: None,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            steps: DriveSteps::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from any variable lookup; unset variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = parse("TETHER_HOST", &lookup)? {
            config.host = host;
        }
        if let Some(port) = parse("TETHER_PORT", &lookup)? {
            config.port = port;
        }
        if let Some(baud) = parse("TETHER_BAUD", &lookup)? {
            config.baud = baud;
        }
        if let Some(ms) = parse::<u64, _>("TETHER_FRAME_INTERVAL_MS", &lookup)? {
            config.frame_interval = Duration::from_millis(ms);
        }
        config.serial_path = lookup("TETHER_SERIAL").filter(|s| !s.is_empty());
        config.frame_path = lookup("TETHER_FRAME_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let velocity = parse("TETHER_VELOCITY_STEP", &lookup)?.unwrap_or(DEFAULT_VELOCITY_STEP);
        let rotation = parse("TETHER_ROTATION_STEP", &lookup)?.unwrap_or(DEFAULT_ROTATION_STEP);
        config.steps = DriveSteps::new(velocity, rotation)?;

        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T, F>(var: &'static str, lookup: &F) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { var, value }),
        },
    }
}
