//! Resource limits enforced by the listener

pub mod limits;

pub use limits::{
    ConnectionError, ConnectionGuard, ConnectionMetrics, ConnectionTracker, SizeError,
    SizeValidator,
};
