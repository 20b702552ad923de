//! Channel lifecycle state and statistics

/// Lifecycle state of a broadcast channel
///
/// ```text
/// IDLE --subscribe--> ACTIVE --last unsubscribe--> DRAINING --grace expires--> IDLE
///                       ^                              |
///                       +---------- subscribe ---------+
/// ```
///
/// A pipeline that exits on its own sends ACTIVE or DRAINING straight back to IDLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No pipeline running
    Idle,
    /// Pipeline running with at least one listener
    Active,
    /// Pipeline running without listeners, teardown timer armed
    Draining,
}

impl ChannelState {
    /// Whether a pipeline is alive in this state
    pub fn has_pipeline(&self) -> bool {
        !matches!(self, ChannelState::Idle)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Active => "active",
            ChannelState::Draining => "draining",
        };
        f.write_str(name)
    }
}

/// Statistics for a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// Current lifecycle state
    pub state: ChannelState,
    /// Number of registered listeners
    pub subscriber_count: usize,
    /// Pipelines started over the channel's lifetime
    pub spawn_count: u64,
    /// Pipelines disposed (teardown or exit) over the channel's lifetime
    pub dispose_count: u64,
    /// Chunks received from pipelines
    pub chunks_received: u64,
    /// Deliveries rejected by a listener's sink
    pub delivery_failures: u64,
}
