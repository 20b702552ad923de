//! Consumer sinks
//!
//! A sink is what a listener hands to [`BroadcastChannel::subscribe`]. The
//! channel calls it synchronously for every chunk, while holding the channel
//! lock, so implementations must not block and must not call back into the
//! channel.
//!
//! [`BroadcastChannel::subscribe`]: super::BroadcastChannel::subscribe

use bytes::Bytes;

use crate::error::DeliveryError;

/// Receiver of the chunks fanned out by a channel
pub trait ChunkSink: Send + Sync + 'static {
    /// Deliver one chunk. Errors are logged by the channel and do not
    /// affect other listeners or this listener's registration.
    fn deliver(&self, chunk: &Bytes) -> Result<(), DeliveryError>;

    /// Called when the upstream pipeline exited on its own
    fn finish(&self) {}

    /// Correlation id included in log events about this sink
    fn correlation_id(&self) -> Option<u64> {
        None
    }
}

/// Sink backed by a closure, see [`from_fn`]
pub struct FnSink<F> {
    f: F,
}

/// Build a sink from a closure
///
/// ```
/// use bytes::Bytes;
/// use jam_relay::relay::sink;
///
/// let sink = sink::from_fn(|chunk: &Bytes| {
///     println!("{} bytes", chunk.len());
///     Ok(())
/// });
/// # let _ = sink;
/// ```
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&Bytes) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    FnSink { f }
}

impl<F> ChunkSink for FnSink<F>
where
    F: Fn(&Bytes) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    fn deliver(&self, chunk: &Bytes) -> Result<(), DeliveryError> {
        (self.f)(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_from_fn() {
        let total = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&total);
        let sink = from_fn(move |chunk: &Bytes| {
            counter.fetch_add(chunk.len(), Ordering::Relaxed);
            Ok(())
        });

        sink.deliver(&Bytes::from_static(b"abc")).unwrap();
        sink.deliver(&Bytes::from_static(b"de")).unwrap();
        sink.finish();

        assert_eq!(total.load(Ordering::Relaxed), 5);
        assert_eq!(sink.correlation_id(), None);
    }
}
