//! Server Configuration
//!
//! Command-line parsing for `ringkv-server`. Every setting has a default, so
//! running the binary with no arguments listens on `127.0.0.1:1234`.

use crate::{DEFAULT_BACKLOG, DEFAULT_HOST, DEFAULT_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tracing::Level;

/// Errors produced while parsing command-line arguments
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value:?}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the command line asked the server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Pending-connection queue length passed to `listen`
    pub backlog: u32,
    /// Minimum level logged unless `RUST_LOG` says otherwise
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST
                .parse()
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Parse configuration from the process arguments
    pub fn from_args() -> Result<CliAction, ConfigError> {
        Self::parse_args(std::env::args().skip(1))
    }

    /// Parse configuration from `args`, which must not include the program name.
    pub fn parse_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = parse_value(&arg, args.next())?,
                "--port" | "-p" => config.port = parse_value(&arg, args.next())?,
                "--backlog" | "-b" => config.backlog = parse_value(&arg, args.next())?,
                "--log-level" | "-l" => config.log_level = parse_value(&arg, args.next())?,
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// The address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        self.socket_addr().to_string()
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}
