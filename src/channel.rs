//! Result Channel: a bounded, lossless, single-producer/single-consumer FIFO
//! of [`crate::probe::ProbeOutcome`]s between the agent and the exporter.
//! Capacity equals the number of service descriptors, so a stuck exporter
//! backpressures the agent instead of letting outcomes accumulate without
//! bound.

use tokio::sync::mpsc;

use crate::probe::ProbeOutcome;

pub type Sender = mpsc::Sender<ProbeOutcome>;
pub type Receiver = mpsc::Receiver<ProbeOutcome>;

/// Build a channel sized to `descriptor_count`. A size of zero is bumped to
/// one so a degenerate (empty, in practice unreachable per startup
/// validation) configuration never creates a zero-capacity channel.
pub fn bounded(descriptor_count: usize) -> (Sender, Receiver) {
    mpsc::channel(descriptor_count.max(1))
}

/// Drain up to `max` outcomes from `receiver` without waiting for more to
/// arrive. Returns an empty vector if nothing is immediately available.
pub fn drain_available(receiver: &mut Receiver, max: usize) -> Vec<ProbeOutcome> {
    let mut batch = Vec::with_capacity(max.min(64));
    while batch.len() < max {
        match receiver.try_recv() {
            Ok(outcome) => batch.push(outcome),
            Err(_) => break,
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Method;
    use chrono::Utc;

    fn sample_outcome(url: &str) -> ProbeOutcome {
        ProbeOutcome {
            url: url.to_string(),
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
    async fn drain_available_takes_up_to_max() {
        let (tx, mut rx) = bounded(5);
        for i in 0..3 {
            tx.send(sample_outcome(&format!("https://{i}"))).await.unwrap();
        }
        let batch = drain_available(&mut rx, 2);
        assert_eq!(batch.len(), 2);
        let rest = drain_available(&mut rx, 10);
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn drain_available_is_empty_when_channel_empty() {
        let (_tx, mut rx) = bounded(5);
        let batch = drain_available(&mut rx, 10);
        assert!(batch.is_empty());
    }

    #[test]
    fn zero_descriptors_still_yields_capacity_one() {
        let (tx, _rx) = bounded(0);
        assert_eq!(tx.capacity(), 1);
    }
}
