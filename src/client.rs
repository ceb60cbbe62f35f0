use crate::config::RetryConfig;
use crate::error::ProtocolError;
use crate::protocol::DeviceProtocol;
use crate::types::{Color, Device, DeviceKey, DeviceState};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry policy for transient protocol failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    exponential: bool,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Fixed delay between attempts. `max_attempts` of zero is treated as one.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            exponential: false,
            max_delay: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Delay doubling after every failed attempt, capped at `max_delay`
    pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            exponential: true,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ProtocolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProtocolError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.delay_after(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation,
                        attempt,
                        self.max_attempts,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!("{} failed after {} attempts: {}", operation, attempt, e);
                    } else {
                        tracing::debug!("{} failed permanently: {}", operation, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let delay = Duration::from_millis(config.backoff_ms);
        if config.exponential {
            Self::exponential(
                config.max_attempts,
                delay,
                Duration::from_millis(config.max_backoff_ms),
            )
        } else {
            Self::fixed(config.max_attempts, delay)
        }
    }
}

/// Device protocol client that retries transient failures
///
/// Cheap to clone; clones share the underlying protocol.
#[derive(Clone)]
pub struct RetryingClient {
    protocol: Arc<dyn DeviceProtocol>,
    policy: RetryPolicy,
    discovery_timeout: Duration,
}

impl RetryingClient {
    pub fn new(protocol: Arc<dyn DeviceProtocol>, policy: RetryPolicy, discovery_timeout: Duration) -> Self {
        Self {
            protocol,
            policy,
            discovery_timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Discover devices on the local network
    pub async fn discover(&self) -> Result<BTreeMap<DeviceKey, Device>, ProtocolError> {
        let protocol = &self.protocol;
        let timeout = self.discovery_timeout;
        self.policy.run("discover", move || protocol.discover(timeout)).await
    }

    pub async fn query_state(&self, ip: &str) -> Result<DeviceState, ProtocolError> {
        let protocol = &self.protocol;
        self.policy.run("query_state", move || protocol.query_state(ip)).await
    }

    pub async fn turn_on(&self, ip: &str) -> Result<bool, ProtocolError> {
        let protocol = &self.protocol;
        self.policy.run("turn_on", move || protocol.turn_on(ip)).await
    }

    pub async fn turn_off(&self, ip: &str) -> Result<bool, ProtocolError> {
        let protocol = &self.protocol;
        self.policy.run("turn_off", move || protocol.turn_off(ip)).await
    }

    pub async fn set_color(&self, color: Color, ip: &str) -> Result<bool, ProtocolError> {
        let protocol = &self.protocol;
        self.policy
            .run("set_color", move || protocol.set_color(color, ip))
            .await
    }
}
