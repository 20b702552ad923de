//! Broadcast channel
//!
//! One channel per endpoint. It starts a pipeline when the first listener
//! subscribes, fans every chunk out to the listeners registered at that
//! moment, and tears the pipeline down once it has been without listeners
//! for the configured grace period.
//!
//! Every event (subscribe, unsubscribe, chunk, timer fire, pipeline exit) is
//! handled under the channel's mutex, so they are atomic with respect to each
//! other. Timers and pipeline pumps only hold weak references; they carry an
//! id (timer) or generation (pipeline) and become no-ops once stale.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::DeliveryError;
use crate::pipeline::{Pipeline, Spawner, Supervisor};

use super::config::RelayConfig;
use super::key::EndpointKey;
use super::sink::ChunkSink;
use super::state::{ChannelState, ChannelStats};

/// Fan-out channel for one endpoint
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct BroadcastChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    key: EndpointKey,
    config: RelayConfig,
    spawner: Arc<dyn Spawner>,
    shared: Mutex<Shared>,
}

struct Shared {
    subscribers: HashMap<u64, Box<dyn ChunkSink>>,
    next_subscriber_id: u64,
    lifecycle: Lifecycle,
    /// Bumped on every spawn; chunks and exits from older pipelines are ignored
    generation: u64,
    next_timer_id: u64,
    idle_since: Instant,
    spawn_count: u64,
    dispose_count: u64,
    chunks_received: u64,
    delivery_failures: u64,
}

enum Lifecycle {
    Idle,
    Active(Box<dyn Supervisor>),
    Draining {
        supervisor: Box<dyn Supervisor>,
        timer: TeardownTimer,
    },
}

impl Lifecycle {
    fn state(&self) -> ChannelState {
        match self {
            Lifecycle::Idle => ChannelState::Idle,
            Lifecycle::Active(_) => ChannelState::Active,
            Lifecycle::Draining { .. } => ChannelState::Draining,
        }
    }
}

/// Pending teardown. Only the timer whose id matches the draining state may
/// dispose the pipeline.
struct TeardownTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl TeardownTimer {
    fn cancel(self) {
        self.handle.abort();
    }
}

impl BroadcastChannel {
    /// Create an idle channel
    pub fn new(key: EndpointKey, spawner: Arc<dyn Spawner>, config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                key,
                config,
                spawner,
                shared: Mutex::new(Shared {
                    subscribers: HashMap::new(),
                    next_subscriber_id: 1,
                    lifecycle: Lifecycle::Idle,
                    generation: 0,
                    next_timer_id: 0,
                    idle_since: Instant::now(),
                    spawn_count: 0,
                    dispose_count: 0,
                    chunks_received: 0,
                    delivery_failures: 0,
                }),
            }),
        }
    }

    /// The endpoint this channel relays
    pub fn key(&self) -> EndpointKey {
        self.inner.key
    }

    /// Whether two handles refer to the same channel
    pub fn same_channel(&self, other: &BroadcastChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a listener
    ///
    /// Starts the pipeline if none is running and cancels a pending teardown.
    /// If the pipeline cannot be spawned the listener stays registered but
    /// receives nothing; the next subscribe retries the spawn.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<S: ChunkSink>(&self, sink: S) -> Subscription {
        let key = self.inner.key;
        let request_id = sink.correlation_id();

        let mut shared = self.inner.lock();
        let id = shared.next_subscriber_id;
        shared.next_subscriber_id += 1;
        shared.subscribers.insert(id, Box::new(sink));

        tracing::debug!(
            endpoint = %key,
            subscriber = id,
            request_id = ?request_id,
            subscribers = shared.subscribers.len(),
            "Subscriber added"
        );

        match mem::replace(&mut shared.lifecycle, Lifecycle::Idle) {
            Lifecycle::Idle => self.start_pipeline(&mut shared),
            Lifecycle::Active(supervisor) => shared.lifecycle = Lifecycle::Active(supervisor),
            Lifecycle::Draining { supervisor, timer } => {
                timer.cancel();
                shared.lifecycle = Lifecycle::Active(supervisor);
                tracing::info!(endpoint = %key, "Teardown cancelled, reusing running pipeline");
            }
        }

        Subscription {
            channel: Some(self.clone()),
            id,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.inner.lock().lifecycle.state()
    }

    /// Number of registered listeners
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Channel statistics
    pub fn stats(&self) -> ChannelStats {
        let shared = self.inner.lock();
        ChannelStats {
            state: shared.lifecycle.state(),
            subscriber_count: shared.subscribers.len(),
            spawn_count: shared.spawn_count,
            dispose_count: shared.dispose_count,
            chunks_received: shared.chunks_received,
            delivery_failures: shared.delivery_failures,
        }
    }

    /// Whether the registry may drop this channel: idle, no listeners, no
    /// handle held outside the registry, and idle for at least `timeout`.
    pub(crate) fn is_evictable(&self, timeout: Duration, now: Instant) -> bool {
        if Arc::strong_count(&self.inner) > 1 {
            return false;
        }
        let shared = self.inner.lock();
        matches!(shared.lifecycle, Lifecycle::Idle)
            && shared.subscribers.is_empty()
            && now.saturating_duration_since(shared.idle_since) >= timeout
    }

    fn start_pipeline(&self, shared: &mut Shared) {
        let key = self.inner.key;

        match self.inner.spawner.spawn(&key) {
            Ok(Pipeline { output, supervisor }) => {
                shared.generation += 1;
                shared.spawn_count += 1;
                let generation = shared.generation;

                tokio::spawn(pump(Arc::downgrade(&self.inner), generation, output));
                shared.lifecycle = Lifecycle::Active(supervisor);

                tracing::info!(
                    endpoint = %key,
                    generation = generation,
                    subscribers = shared.subscribers.len(),
                    "Pipeline started"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %key,
                    error = %e,
                    subscribers = shared.subscribers.len(),
                    "Failed to spawn pipeline"
                );
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        let key = self.inner.key;
        let mut shared = self.inner.lock();

        if shared.subscribers.remove(&id).is_none() {
            return;
        }

        tracing::debug!(
            endpoint = %key,
            subscriber = id,
            subscribers = shared.subscribers.len(),
            "Subscriber removed"
        );

        if !shared.subscribers.is_empty() {
            return;
        }

        match mem::replace(&mut shared.lifecycle, Lifecycle::Idle) {
            Lifecycle::Active(supervisor) => match self.arm_teardown(&mut shared) {
                Some(timer) => {
                    shared.lifecycle = Lifecycle::Draining { supervisor, timer };
                    tracing::info!(
                        endpoint = %key,
                        grace_period_ms = self.inner.config.grace_period.as_millis() as u64,
                        "Last subscriber left, teardown armed"
                    );
                }
                None => {
                    tracing::warn!(
                        endpoint = %key,
                        "No runtime for teardown timer, disposing pipeline immediately"
                    );
                    shared.dispose(supervisor);
                }
            },
            // Idle after a failed spawn or an exit; Draining cannot hold subscribers
            other => shared.lifecycle = other,
        }
    }

    fn arm_teardown(&self, shared: &mut Shared) -> Option<TeardownTimer> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;

        shared.next_timer_id += 1;
        let id = shared.next_timer_id;
        let channel = Arc::downgrade(&self.inner);
        let grace = self.inner.config.grace_period;

        let handle = runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = channel.upgrade() {
                inner.grace_expired(id);
            }
        });

        Some(TeardownTimer { id, handle })
    }
}

impl std::fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("key", &self.inner.key)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one chunk to every current subscriber. Returns false once the
    /// pipeline that produced it is no longer the channel's pipeline.
    fn fan_out(&self, generation: u64, chunk: &Bytes) -> bool {
        let mut shared = self.lock();

        if shared.generation != generation || matches!(shared.lifecycle, Lifecycle::Idle) {
            return false;
        }
        shared.chunks_received += 1;

        let mut failures = 0;
        for (id, sink) in &shared.subscribers {
            if let Err(e) = sink.deliver(chunk) {
                failures += 1;
                match e {
                    DeliveryError::Lagged => tracing::debug!(
                        endpoint = %self.key,
                        subscriber = *id,
                        request_id = ?sink.correlation_id(),
                        "Subscriber lagging, chunk dropped"
                    ),
                    e => tracing::warn!(
                        endpoint = %self.key,
                        subscriber = *id,
                        request_id = ?sink.correlation_id(),
                        error = %e,
                        "Cannot write chunk"
                    ),
                }
            }
        }
        shared.delivery_failures += failures;

        true
    }

    fn pipeline_exited(&self, generation: u64) {
        let mut shared = self.lock();

        if shared.generation != generation {
            return;
        }

        let supervisor = match mem::replace(&mut shared.lifecycle, Lifecycle::Idle) {
            Lifecycle::Idle => return,
            Lifecycle::Active(supervisor) => supervisor,
            Lifecycle::Draining { supervisor, timer } => {
                timer.cancel();
                supervisor
            }
        };
        shared.dispose(supervisor);

        tracing::warn!(
            endpoint = %self.key,
            generation = generation,
            subscribers = shared.subscribers.len(),
            "Pipeline exited"
        );

        for sink in shared.subscribers.values() {
            sink.finish();
        }
    }

    fn grace_expired(&self, timer_id: u64) {
        let mut shared = self.lock();

        match mem::replace(&mut shared.lifecycle, Lifecycle::Idle) {
            Lifecycle::Draining { supervisor, timer }
                if timer.id == timer_id && shared.subscribers.is_empty() =>
            {
                shared.dispose(supervisor);
                tracing::info!(endpoint = %self.key, "Grace period expired, pipeline disposed");
            }
            other => shared.lifecycle = other,
        }
    }
}

impl Shared {
    fn dispose(&mut self, supervisor: Box<dyn Supervisor>) {
        supervisor.dispose();
        self.dispose_count += 1;
        self.idle_since = Instant::now();
        self.lifecycle = Lifecycle::Idle;
    }
}

async fn pump(channel: Weak<ChannelInner>, generation: u64, mut output: mpsc::Receiver<Bytes>) {
    while let Some(chunk) = output.recv().await {
        let Some(inner) = channel.upgrade() else {
            return;
        };
        if !inner.fan_out(generation, &chunk) {
            return;
        }
    }

    if let Some(inner) = channel.upgrade() {
        inner.pipeline_exited(generation);
    }
}

/// One listener's registration with a channel
///
/// Dropping the subscription unsubscribes it, so a listener is always
/// deregistered even when its response ends abnormally.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    channel: Option<BroadcastChannel>,
    id: u64,
}

impl Subscription {
    /// Subscriber id, unique within the channel
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet
    pub fn is_active(&self) -> bool {
        self.channel.is_some()
    }

    /// Remove this listener from its channel. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
