//! Request introspection
//!
//! Turns an [`InboundRequest`] into the JSON [`EchoResponse`] document:
//! the body is classified as text or base64 and multi-valued headers are
//! collapsed to their first value.

pub mod body;
pub mod handler;
pub mod headers;
pub mod request;

pub use body::{BodyType, classify_body};
pub use handler::{EchoHandler, EchoResponse};
pub use headers::{HeaderMultimap, flatten_headers};
pub use request::InboundRequest;
