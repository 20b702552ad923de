//! Listen requests
//!
//! A [`Listener`] is what a transport holds for the duration of one response.
//! It owns the channel subscription, so dropping it (normal end, client
//! disconnect or an error path) always deregisters the listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::relay::{ChannelRegistry, EndpointKey, Subscription};

use super::resolve::{parse_port, resolve};
use super::sink::ListenerSink;

/// Turns listen requests into channel subscriptions
pub struct Gateway {
    registry: Arc<ChannelRegistry>,
    next_request_id: AtomicU64,
}

impl Gateway {
    /// Create a gateway over a registry
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Get a reference to the channel registry
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Start listening to `host:port` on behalf of `peer`
    pub async fn listen(
        &self,
        host: &str,
        port: &str,
        peer: Option<SocketAddr>,
    ) -> Result<Listener, GatewayError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);

        let port = parse_port(port)?;
        let key = resolve(host, port).await.map_err(|e| {
            tracing::warn!(request_id = request_id, host = host, error = %e, "Resolve failed");
            e
        })?;

        let channel = self.registry.get_or_create(&key).await;
        let (sink, chunks) =
            ListenerSink::new(request_id, self.registry.config().listener_capacity);
        let subscription = channel.subscribe(sink);

        tracing::info!(
            request_id = request_id,
            peer = ?peer,
            host = host,
            endpoint = %key,
            "Response start"
        );

        Ok(Listener {
            request_id,
            key,
            host: host.to_string(),
            peer,
            chunks,
            subscription,
        })
    }
}

/// One listener attached to a channel
pub struct Listener {
    request_id: u64,
    key: EndpointKey,
    host: String,
    peer: Option<SocketAddr>,
    chunks: mpsc::Receiver<Bytes>,
    subscription: Subscription,
}

impl Listener {
    /// Correlation id used in log events for this request
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Resolved endpoint
    pub fn key(&self) -> EndpointKey {
        self.key
    }

    /// Next chunk, or `None` once the upstream pipeline has ended
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.chunks.recv().await
    }

    /// Poll for the next chunk
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.chunks.poll_recv(cx)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        tracing::info!(
            request_id = self.request_id,
            peer = ?self.peer,
            host = %self.host,
            endpoint = %self.key,
            "Response end"
        );
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("request_id", &self.request_id)
            .field("key", &self.key)
            .field("host", &self.host)
            .finish()
    }
}
