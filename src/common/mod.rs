//! Common traits and helpers used across the reflectsrv library
//!
//! This module contains the seams between the listener, filters and
//! handlers, plus a helper to run a reflector in-process.

pub mod test_utils;
pub mod traits;

pub use test_utils::spawn_test_server;
pub use traits::{EchoServerTrait, RequestHandler};
