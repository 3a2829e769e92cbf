use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port used when `PORT` is unset or empty
pub const DEFAULT_PORT: u16 = 3003;
/// Request body limit used when `MAX_BODY_SIZE` is unset or empty
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PORT {0:?}: expected an integer between 1 and 65535")]
    InvalidPort(String),
    #[error("invalid MAX_BODY_SIZE {0:?}: expected a number of bytes")]
    InvalidBodySize(String),
}

/// Configuration for the HTTP reflector
///
/// # Examples
///
/// ```rust
/// use reflectsrv::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig {
///     bind_addr: "127.0.0.1:8080".parse().unwrap(),
///     read_timeout: Duration::from_secs(10),
///     ..HttpConfig::default()
/// };
/// assert_eq!(config.max_body_size, 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Upper bound on the request line plus headers, in bytes
    pub max_header_size: usize,
    /// Upper bound on a decoded request body, in bytes
    pub max_body_size: usize,
    /// Read timeout for connections
    pub read_timeout: Duration,
    /// Write timeout for connections
    pub write_timeout: Duration,
    /// How long in-flight connections may run after shutdown starts
    pub shutdown_grace: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1024,
            max_header_size: 64 * 1024,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl HttpConfig {
    /// Builds the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// The listener always binds to every IPv4 interface.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_port(lookup("PORT").as_deref())?;
        let max_body_size = parse_body_size(lookup("MAX_BODY_SIZE").as_deref())?;

        Ok(Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            max_body_size,
            ..Self::default()
        })
    }
}

/// Parses a `PORT` value; unset or blank selects [`DEFAULT_PORT`]
pub fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_PORT);
    };
    match raw.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw.to_string())),
    }
}

fn parse_body_size(raw: Option<&str>) -> Result<usize, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_MAX_BODY_SIZE);
    };
    raw.parse::<usize>()
        .map_err(|_| ConfigError::InvalidBodySize(raw.to_string()))
}
