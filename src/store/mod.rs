//! Remote Store Adapter: the only exit of outcomes from the process. The
//! exporter depends only on the [`RemoteStoreAdapter`] trait; test doubles
//! implement the same interface.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::probe::ProbeOutcome;

/// Distinguishes transient connectivity failures (worth reconnecting and
/// retrying) from everything else (fatal). The exporter branches on this
/// distinction, never on a string.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network, TLS, DNS, timeout, or pool-exhaustion failure. The exporter
    /// reconnects and retries the same batch.
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else: constraint violation, malformed query, authentication
    /// rejection. The exporter treats this as fatal.
    #[error("store error: {0}")]
    Other(String),
}

/// Connection pool lifecycle, batched insert, reconnect. The four operations
/// the exporter's state machine drives.
#[async_trait]
pub trait RemoteStoreAdapter: Send + Sync {
    /// Idempotent; establishes a pool (minimum one connection), ensures the
    /// table exists, returns when ready.
    async fn connect(&mut self) -> Result<(), StoreError>;

    /// Releases all pooled connections. Safe to call when not connected.
    async fn disconnect(&mut self);

    /// Forcibly terminates the current pool and rebuilds it.
    async fn reconnect(&mut self) -> Result<(), StoreError>;

    /// Inserts every row of `batch`. Atomic from the caller's perspective:
    /// either all rows are durably written, or the call fails and the same
    /// batch may be retried unchanged.
    async fn create(&mut self, batch: &[ProbeOutcome]) -> Result<(), StoreError>;
}

#[cfg(test)]
pub mod test_double {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory adapter that fails connection-class on its first `n` calls
    /// to `create`, then succeeds. Grounds the exporter's reconnect-budget
    /// tests without a real database.
    pub struct FlakyAdapter {
        pub failures_remaining: AtomicUsize,
        pub connected: bool,
        pub written: Vec<ProbeOutcome>,
        pub connect_calls: usize,
        pub reconnect_calls: usize,
    }

    impl FlakyAdapter {
        pub fn new(failures: usize) -> Self {
            Self {
                failures_remaining: AtomicUsize::new(failures),
                connected: false,
                written: Vec::new(),
                connect_calls: 0,
                reconnect_calls: 0,
            }
        }
    }

    #[async_trait]
    impl RemoteStoreAdapter for FlakyAdapter {
        async fn connect(&mut self) -> Result<(), StoreError> {
            self.connected = true;
            self.connect_calls += 1;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        async fn reconnect(&mut self) -> Result<(), StoreError> {
            self.reconnect_calls += 1;
            self.connected = true;
            Ok(())
        }

        async fn create(&mut self, batch: &[ProbeOutcome]) -> Result<(), StoreError> {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Connection("simulated connection failure".into()));
            }
            self.written.extend_from_slice(batch);
            Ok(())
        }
    }

    /// Adapter whose `create` always returns a non-connection failure.
    pub struct AlwaysFatalAdapter;

    #[async_trait]
    impl RemoteStoreAdapter for AlwaysFatalAdapter {
        async fn connect(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn disconnect(&mut self) {}

        async fn reconnect(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn create(&mut self, _batch: &[ProbeOutcome]) -> Result<(), StoreError> {
            Err(StoreError::Other("constraint violation".into()))
        }
    }
}
