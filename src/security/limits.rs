use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Connection tracking and management
///
/// Cloning is cheap; clones share the same slots and counters.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    active_connections: AtomicUsize,
    total_connections: AtomicU64,
    connection_semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                active_connections: AtomicUsize::new(0),
                total_connections: AtomicU64::new(0),
                connection_semaphore: Arc::new(Semaphore::new(max_connections)),
                max_connections,
            }),
        }
    }

    /// Claims a connection slot without waiting
    pub fn try_acquire(&self) -> Result<ConnectionGuard, ConnectionError> {
        let permit = self
            .inner
            .connection_semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                tokio::sync::TryAcquireError::NoPermits => ConnectionError::LimitReached {
                    limit: self.inner.max_connections,
                },
                tokio::sync::TryAcquireError::Closed => ConnectionError::Closed,
            })?;

        let active = self.inner.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.inner.total_connections.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            active_connections = active,
            total_connections = total,
            "Connection acquired"
        );

        Ok(ConnectionGuard {
            _permit: permit,
            tracker: self.clone(),
            start_time: Instant::now(),
        })
    }

    /// Get current metrics
    pub fn metrics(&self) -> ConnectionMetrics {
        ConnectionMetrics {
            active_connections: self.inner.active_connections.load(Ordering::SeqCst),
            total_connections: self.inner.total_connections.load(Ordering::SeqCst),
            available_slots: self.inner.connection_semaphore.available_permits(),
            max_connections: self.inner.max_connections,
        }
    }
}

/// RAII guard for connection tracking
#[derive(Debug)]
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    tracker: ConnectionTracker,
    start_time: Instant,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self
            .tracker
            .inner
            .active_connections
            .fetch_sub(1, Ordering::SeqCst)
            - 1;
        let duration = self.start_time.elapsed();

        tracing::debug!(
            active_connections = active,
            connection_duration_ms = duration.as_millis(),
            "Connection released"
        );
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection limit of {limit} reached")]
    LimitReached { limit: usize },
    #[error("Connection tracker closed")]
    Closed,
}

/// Connection metrics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetrics {
    pub active_connections: usize,
    pub total_connections: u64,
    pub available_slots: usize,
    pub max_connections: usize,
}

/// Size validator for request bodies
#[derive(Debug, Clone, Copy)]
pub struct SizeValidator {
    max_size: usize,
}

impl SizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn validate_size(&self, size: u64) -> Result<(), SizeError> {
        if size > self.max_size as u64 {
            Err(SizeError::TooLarge {
                actual: size,
                max: self.max_size,
            })
        } else {
            Ok(())
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("Request too large: {actual} bytes, maximum allowed: {max} bytes")]
    TooLarge { actual: u64, max: usize },
}
