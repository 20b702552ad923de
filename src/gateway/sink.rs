//! Bounded per-listener sink
//!
//! Each listener gets its own bounded queue between the channel and its
//! response writer. When the queue is full the newest chunk is dropped for
//! that listener only, so a slow client never stalls the others.

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::DeliveryError;
use crate::relay::ChunkSink;

/// Sink feeding one listener's response
pub struct ListenerSink {
    request_id: u64,
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
}

impl ListenerSink {
    /// Create a sink and the receiver its response reads from
    pub fn new(request_id: u64, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            request_id,
            tx: Mutex::new(Some(tx)),
        };
        (sink, rx)
    }
}

impl ChunkSink for ListenerSink {
    fn deliver(&self, chunk: &Bytes) -> Result<(), DeliveryError> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(DeliveryError::Closed)?;

        tx.try_send(chunk.clone()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn finish(&self) {
        // Dropping the sender ends the response once it has drained
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn correlation_id(&self) -> Option<u64> {
        Some(self.request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_and_lag() {
        let (sink, mut rx) = ListenerSink::new(7, 2);

        sink.deliver(&Bytes::from_static(b"a")).unwrap();
        sink.deliver(&Bytes::from_static(b"b")).unwrap();
        assert_eq!(
            sink.deliver(&Bytes::from_static(b"c")),
            Err(DeliveryError::Lagged)
        );

        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"b"));
        assert!(rx.try_recv().is_err());
        assert_eq!(sink.correlation_id(), Some(7));
    }

    #[test]
    fn test_closed_receiver() {
        let (sink, rx) = ListenerSink::new(1, 4);
        drop(rx);

        assert_eq!(
            sink.deliver(&Bytes::from_static(b"a")),
            Err(DeliveryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_finish_ends_stream() {
        let (sink, mut rx) = ListenerSink::new(1, 4);
        sink.deliver(&Bytes::from_static(b"last")).unwrap();
        sink.finish();

        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"last")));
        assert_eq!(rx.recv().await, None);
        assert_eq!(
            sink.deliver(&Bytes::from_static(b"late")),
            Err(DeliveryError::Closed)
        );
    }
}
