//! Relay configuration

use std::time::Duration;

/// Default delay between the last listener leaving and the pipeline being killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// Channel and registry configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a pipeline is kept alive after its last listener leaves
    pub grace_period: Duration,

    /// Evict channels that have been idle this long (None = never evict)
    pub idle_channel_timeout: Option<Duration>,

    /// How often the registry cleanup task runs
    pub cleanup_interval: Duration,

    /// Chunks buffered per listener before chunks are dropped for it
    pub listener_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            idle_channel_timeout: None,
            cleanup_interval: Duration::from_secs(60),
            listener_capacity: 64,
        }
    }
}

impl RelayConfig {
    /// Set the teardown grace period
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Enable eviction of channels idle for longer than `timeout`
    pub fn idle_channel_timeout(mut self, timeout: Duration) -> Self {
        self.idle_channel_timeout = Some(timeout);
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the per-listener buffer size (at least one chunk)
    pub fn listener_capacity(mut self, capacity: usize) -> Self {
        self.listener_capacity = capacity.max(1);
        self
    }
}
