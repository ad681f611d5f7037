use std::time::Duration;

use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::RemoteApi;
use crate::error::BridgeError;

/// Readiness polling parameters.
///
/// Probes run at a fixed `interval` until the sandbox answers `init` with a
/// truthy value, `max_attempts` probes have been sent, or the deadline
/// passes, whichever comes first. The deadline defaults to
/// `max_attempts * interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HandshakeConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval", with = "millis")]
    pub interval: Duration,
    #[serde(default, with = "opt_millis")]
    pub deadline: Option<Duration>,
}

fn default_max_attempts() -> u32 {
    100
}
fn default_interval() -> Duration {
    Duration::from_millis(100)
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval: default_interval(),
            deadline: None,
        }
    }
}

impl HandshakeConfig {
    pub fn deadline(&self) -> Duration {
        self.deadline
            .unwrap_or_else(|| self.interval.saturating_mul(self.max_attempts))
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Poll `init` until the sandbox reports ready.
///
/// Returns the number of probes sent. A probe that errors (channel not yet
/// open, sandbox still loading) counts as "not ready". A probe that never
/// answers is cut off by the deadline.
pub async fn await_ready(api: &RemoteApi, config: &HandshakeConfig) -> Result<u32, BridgeError> {
    let started = Instant::now();
    let deadline = config.deadline();
    let mut attempts = 0u32;

    let probe = async {
        let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while attempts < config.max_attempts {
            ticker.tick().await;
            attempts += 1;
            match api.init().await {
                Ok(true) => return true,
                Ok(false) => tracing::trace!(attempt = attempts, "Sandbox not ready yet"),
                Err(e) => tracing::debug!(attempt = attempts, error = %e, "Readiness probe failed"),
            }
        }
        false
    };

    let ready = tokio::time::timeout(deadline, probe)
        .await
        .unwrap_or(false);
    let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if ready {
        tracing::debug!(attempts, waited_ms, "Sandbox ready");
        Ok(attempts)
    } else {
        tracing::warn!(attempts, waited_ms, "Sandbox handshake timed out");
        Err(BridgeError::HandshakeTimeout {
            attempts,
            waited_ms,
        })
    }
}
