//! Agent: one logical scheduling loop per process. Pulls from the
//! scheduler, sleeps until due, probes, pushes the outcome onto the result
//! channel, and re-admits the descriptor. Single-threaded cooperative: one
//! in-flight probe at a time.

use crate::channel::Sender;
use crate::config::ServiceDescriptor;
use crate::killswitch::Killswitch;
use crate::logging::MonitorLogger;
use crate::probe::ProbeClient;
use crate::scheduler::PriorityScheduler;

const COMPONENT: &str = "agent";

/// The allowed scheduling drift before the agent logs a "behind schedule"
/// warning; `ALLOWED_TIME_ERROR_SECONDS` in the donor's original constants.
const ALLOWED_TIME_ERROR_SECONDS: f64 = 0.2;

pub struct Agent {
    scheduler: PriorityScheduler,
    sender: Sender,
    probe_client: ProbeClient,
    killswitch: Killswitch,
    logger: MonitorLogger,
}

impl Agent {
    pub fn new(
        scheduler: PriorityScheduler,
        sender: Sender,
        probe_client: ProbeClient,
        killswitch: Killswitch,
        logger: MonitorLogger,
    ) -> Self {
        Self {
            scheduler,
            sender,
            probe_client,
            killswitch,
            logger,
        }
    }

    /// Runs until the killswitch engages; never starts a new probe after
    /// engagement. An unexpected internal error engages the killswitch and
    /// returns, per the scheduler-corruption clause of the killswitch's
    /// contract.
    pub async fn run(mut self) {
        self.logger.info(
            COMPONENT,
            &format!("starting, {} services", self.scheduler.size()),
        );

        loop {
            if self.killswitch.engaged() {
                break;
            }

            let Some((mut descriptor, priority)) = self.scheduler.pop() else {
                self.logger
                    .error(COMPONENT, "scheduler is empty, engaging killswitch");
                self.killswitch.engage();
                break;
            };

            if priority > 0.0 {
                let wait = std::time::Duration::from_secs_f64(priority);
                if !self.killswitch.sleep(wait).await {
                    break;
                }
            }

            let outcome = match self
                .probe_client
                .probe(
                    descriptor.method,
                    &descriptor.url,
                    std::time::Duration::from_secs(descriptor.timeout.max(1) as u64),
                    descriptor.check_regex,
                    descriptor.regex.as_deref(),
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.logger
                        .error(COMPONENT, &format!("invalid probe input: {e}"));
                    self.killswitch.engage();
                    break;
                }
            };

            if let Some(last_checked_at) = descriptor.last_checked_at {
                let elapsed = (outcome.request_timestamp - last_checked_at).num_milliseconds() as f64 / 1000.0;
                if elapsed > descriptor.interval_sec as f64 + ALLOWED_TIME_ERROR_SECONDS {
                    self.logger.warning(
                        COMPONENT,
                        &format!(
                            "{} fell behind schedule: {:.3}s instead of {}s",
                            descriptor.url, elapsed, descriptor.interval_sec
                        ),
                    );
                }
            }
            descriptor.last_checked_at = Some(outcome.response_timestamp);

            tokio::select! {
                send_result = self.sender.send(outcome) => {
                    if send_result.is_err() {
                        // receiver dropped: exporter has exited, nothing left to do
                        self.killswitch.engage();
                        break;
                    }
                }
                _ = self.killswitch.wait_engaged() => {
                    break;
                }
            }

            self.scheduler.push(descriptor);
        }

        self.logger.info(COMPONENT, "stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Method;
    use crate::logging::Level;
    use wiremock::matchers::method as wm_method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_logger() -> MonitorLogger {
        MonitorLogger::new(Level::Debug, None).unwrap()
    }

    fn descriptor(url: &str, interval_sec: u32) -> ServiceDescriptor {
        ServiceDescriptor {
            url: url.to_string(),
            method: Method::GET,
            check_regex: false,
            regex: None,
            interval_sec,
            timeout: 5,
            last_checked_at: None,
        }
    }

    #[tokio::test]
    async fn agent_stops_promptly_after_killswitch_engages() {
        let server = MockServer::start().await;
        Mock::given(wm_method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let scheduler = PriorityScheduler::new(vec![descriptor(&server.uri(), 5)]);
        let (tx, mut rx) = crate::channel::bounded(1);
        let killswitch = Killswitch::new();
        let agent = Agent::new(scheduler, tx, ProbeClient::new(), killswitch.clone(), test_logger());

        let handle = tokio::spawn(agent.run());
        // let it run a probe or two, then cut it off
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        killswitch.engage();

        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("agent should stop promptly after killswitch engages")
            .unwrap();

        // drain whatever made it through; no assertion on count, only that
        // the loop terminated.
        let _ = crate::channel::drain_available(&mut rx, 100);
    }
}
