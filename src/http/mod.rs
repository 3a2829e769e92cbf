//! HTTP listener
//!
//! This module accepts HTTP/1.1 connections, frames requests into
//! [`crate::echo::InboundRequest`] values, runs them through a
//! [`crate::common::RequestHandler`] and writes the responses back.

pub mod config;
pub mod protocol;
pub mod response;
pub mod server;
pub mod target;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, HttpConfig};
pub use protocol::{HttpConnection, HttpProtocolError, ParsedRequest};
pub use response::HttpResponse;
pub use server::{HttpEchoServer, ReflectServer};
