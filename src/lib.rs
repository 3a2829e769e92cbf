use crate::http::{ConfigError, HttpProtocolError};
use std::net::SocketAddr;
use thiserror::Error;

/// Error types for the reflectsrv library
#[derive(Error, Debug)]
pub enum ReflectError {
    /// Socket-level errors (accept, local address lookup)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP framing errors
    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] HttpProtocolError),
}

/// Result type for the reflectsrv library
pub type Result<T> = std::result::Result<T, ReflectError>;

pub mod common;
pub mod cors;
pub mod echo;
pub mod http;
pub mod security;

// Re-export main types for convenience
pub use common::{EchoServerTrait, RequestHandler};
pub use cors::{Cors, CorsPolicy};
pub use echo::{BodyType, EchoHandler, EchoResponse, InboundRequest};
pub use crate::http::{HttpConfig, HttpEchoServer, HttpResponse, ReflectServer};
