//! Channel registry
//!
//! Process-wide map from endpoint to broadcast channel. Channels are created
//! on first reference and, unless an idle timeout is configured, kept for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::pipeline::Spawner;

use super::channel::BroadcastChannel;
use super::config::RelayConfig;
use super::key::EndpointKey;
use super::state::ChannelStats;

/// Central registry for all channels
///
/// Thread-safe via `RwLock`. Lookups of existing channels only take the read
/// lock; creation re-checks under the write lock so two racing callers always
/// end up with the same channel.
pub struct ChannelRegistry {
    /// Map of endpoint to channel
    channels: RwLock<HashMap<EndpointKey, BroadcastChannel>>,

    /// Pipeline factory shared by every channel
    spawner: Arc<dyn Spawner>,

    /// Configuration
    config: RelayConfig,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new(spawner: impl Spawner) -> Self {
        Self::with_config(spawner, RelayConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(spawner: impl Spawner, config: RelayConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            spawner: Arc::new(spawner),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the channel for an endpoint, creating it if needed
    pub async fn get_or_create(&self, key: &EndpointKey) -> BroadcastChannel {
        if let Some(channel) = self.channels.read().await.get(key) {
            return channel.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(*key)
            .or_insert_with(|| {
                tracing::info!(endpoint = %key, "Channel created");
                BroadcastChannel::new(*key, Arc::clone(&self.spawner), self.config.clone())
            })
            .clone()
    }

    /// Get an existing channel
    pub async fn get(&self, key: &EndpointKey) -> Option<BroadcastChannel> {
        self.channels.read().await.get(key).cloned()
    }

    /// Get channel statistics
    pub async fn get_channel_stats(&self, key: &EndpointKey) -> Option<ChannelStats> {
        self.channels.read().await.get(key).map(|c| c.stats())
    }

    /// Get total number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Run cleanup once
    ///
    /// Removes channels that have been idle, with no listeners and no handle
    /// held outside the registry, for longer than `idle_channel_timeout`.
    /// Does nothing when no timeout is configured.
    pub async fn cleanup(&self) {
        let Some(timeout) = self.config.idle_channel_timeout else {
            return;
        };

        let mut channels = self.channels.write().await;
        let now = Instant::now();

        channels.retain(|key, channel| {
            let evict = channel.is_evictable(timeout, now);
            if evict {
                tracing::info!(endpoint = %key, "Channel removed by cleanup");
            }
            !evict
        });
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }
}
