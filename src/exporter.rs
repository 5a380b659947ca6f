//! Exporter: drains the result channel, batches, writes via the
//! [`RemoteStoreAdapter`], and handles reconnection.
//!
//! State machine:
//! ```text
//! DISCONNECTED --connect success--> CONNECTED
//! CONNECTED    --conn err, attempts <= 15--> RECONNECTING
//! RECONNECTING --reconnect success--> CONNECTED
//! RECONNECTING --attempts > 15--> FATAL (engages killswitch)
//! CONNECTED    --non-conn err--> FATAL
//! CONNECTED    --shutdown, drained--> TERMINAL (disconnect)
//! ```

use std::time::Duration;

use crate::channel::{drain_available, Receiver};
use crate::killswitch::Killswitch;
use crate::logging::MonitorLogger;
use crate::probe::ProbeOutcome;
use crate::store::{RemoteStoreAdapter, StoreError};

const COMPONENT: &str = "exporter";

/// `MAX_RECONNECTION_ATTEMPTS` in the donor's original constants.
pub const MAX_RECONNECTION_ATTEMPTS: u32 = 15;

pub struct Exporter<A: RemoteStoreAdapter> {
    adapter: A,
    receiver: Receiver,
    killswitch: Killswitch,
    batch_size: usize,
    interval: Duration,
    logger: MonitorLogger,
}

impl<A: RemoteStoreAdapter> Exporter<A> {
    pub fn new(
        adapter: A,
        receiver: Receiver,
        killswitch: Killswitch,
        batch_size: usize,
        interval: Duration,
        logger: MonitorLogger,
    ) -> Self {
        Self {
            adapter,
            receiver,
            killswitch,
            batch_size,
            interval,
            logger,
        }
    }

    /// Runs the export loop to completion. Returns `true` on a clean
    /// shutdown, `false` if the exporter terminated fatally (non-connection
    /// adapter error, or the reconnect budget was exhausted).
    pub async fn run(mut self) -> bool {
        if let Err(e) = self.adapter.connect().await {
            self.logger.error(COMPONENT, &format!("failed to connect: {e}"));
            self.killswitch.engage();
            return false;
        }

        let mut buffer: Vec<ProbeOutcome> = Vec::new();
        let mut reconnect_attempts: u32 = 0;
        let mut clean = true;

        loop {
            if buffer.is_empty() {
                buffer = drain_available(&mut self.receiver, self.batch_size);
            }

            match self.adapter.create(&buffer).await {
                Ok(()) => {
                    if !buffer.is_empty() {
                        self.logger
                            .info(COMPONENT, &format!("exported {} records", buffer.len()));
                    }
                    buffer.clear();
                    reconnect_attempts = 0;
                }
                Err(StoreError::Connection(message)) => {
                    if reconnect_attempts >= MAX_RECONNECTION_ATTEMPTS {
                        self.logger
                            .error(COMPONENT, &format!("reconnection attempts exceeded: {message}"));
                        self.killswitch.engage();
                        clean = false;
                        break;
                    }
                    self.logger
                        .warning(COMPONENT, &format!("connection failed, reconnecting: {message}"));
                    reconnect_attempts += 1;
                    if let Err(e) = self.adapter.reconnect().await {
                        self.logger.warning(COMPONENT, &format!("reconnect failed: {e}"));
                    }
                    // buffer is retained for the next iteration
                }
                Err(StoreError::Other(message)) => {
                    self.logger
                        .error(COMPONENT, &format!("unrecoverable store error: {message}"));
                    self.killswitch.engage();
                    clean = false;
                    break;
                }
            }

            let channel_empty = buffer.is_empty() && self.receiver.is_empty();
            if self.killswitch.engaged() && channel_empty {
                break;
            }

            if !self.killswitch.engaged() {
                self.killswitch.sleep(self.interval).await;
            }
        }

        self.adapter.disconnect().await;
        self.logger.info(
            COMPONENT,
            &format!("stopped ({})", if clean { "clean" } else { "fatal" }),
        );
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Method;
    use crate::logging::Level;
    use crate::store::test_double::{AlwaysFatalAdapter, FlakyAdapter};
    use chrono::Utc;

    fn test_logger() -> MonitorLogger {
        MonitorLogger::new(Level::Debug, None).unwrap()
    }

    fn sample_outcome() -> ProbeOutcome {
        ProbeOutcome {
            url: "https://example.com".into(),
            method: Method::GET,
            request_timestamp: Utc::now(),
            response_timestamp: Utc::now(),
            status_code: Some(200),
            regex_check_required: false,
            regex: None,
            contains_regex: false,
            contains_exception: false,
            exception: None,
        }
    }

    #[tokio::test]
    async fn reconnect_then_success_preserves_batch() {
        let (tx, rx) = crate::channel::bounded(4);
        tx.send(sample_outcome()).await.unwrap();
        drop(tx);

        let killswitch = Killswitch::new();
        killswitch.engage();
        let adapter = FlakyAdapter::new(3);
        let exporter = Exporter::new(adapter, rx, killswitch, 10, Duration::from_millis(1), test_logger());
        let clean = exporter.run().await;
        assert!(clean);
    }

    #[tokio::test]
    async fn reconnect_exhaustion_is_fatal() {
        let (_tx, rx) = crate::channel::bounded(4);
        let killswitch = Killswitch::new();
        // never engaged externally; the exporter must engage it itself on
        // exhaustion. Force at least one batch attempt by sending nothing
        // and relying on the adapter always failing create().
        let adapter = FlakyAdapter::new(usize::MAX / 2);
        let exporter = Exporter::new(
            adapter,
            rx,
            killswitch.clone(),
            10,
            Duration::from_millis(1),
            test_logger(),
        );

        let handle = tokio::spawn(exporter.run());
        let clean = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("exporter should terminate after exhausting reconnect budget")
            .unwrap();
        assert!(!clean);
        assert!(killswitch.engaged());
    }

    #[tokio::test]
    async fn non_connection_failure_is_immediately_fatal() {
        let (_tx, rx) = crate::channel::bounded(4);
        let killswitch = Killswitch::new();
        let exporter = Exporter::new(
            AlwaysFatalAdapter,
            rx,
            killswitch.clone(),
            10,
            Duration::from_millis(1),
            test_logger(),
        );
        let clean = exporter.run().await;
        assert!(!clean);
        assert!(killswitch.engaged());
    }
}
