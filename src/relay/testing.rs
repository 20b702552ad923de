//! Test doubles shared by the relay and gateway tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{DeliveryError, SpawnError};
use crate::pipeline::{Pipeline, Spawner, Supervisor};

use super::key::EndpointKey;
use super::sink::ChunkSink;

/// Let spawned tasks (pumps, timers already due) run to completion
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
struct FakeState {
    spawns: u64,
    disposes: u64,
    fail_next: bool,
    outputs: Vec<Option<mpsc::Sender<Bytes>>>,
    keys: Vec<EndpointKey>,
}

/// Spawner whose pipelines are driven by the test
#[derive(Clone, Default)]
pub(crate) struct FakeSpawner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSpawner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawn_count(&self) -> u64 {
        self.state.lock().unwrap().spawns
    }

    pub(crate) fn dispose_count(&self) -> u64 {
        self.state.lock().unwrap().disposes
    }

    pub(crate) fn spawned_keys(&self) -> Vec<EndpointKey> {
        self.state.lock().unwrap().keys.clone()
    }

    pub(crate) fn fail_next_spawn(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Emit a chunk from the most recently spawned pipeline
    pub(crate) async fn push(&self, chunk: &'static [u8]) {
        let tx = self
            .state
            .lock()
            .unwrap()
            .outputs
            .last()
            .cloned()
            .flatten()
            .expect("no live pipeline");
        tx.send(Bytes::from_static(chunk)).await.unwrap();
    }

    /// Simulate the most recently spawned pipeline exiting on its own
    pub(crate) fn exit(&self) {
        if let Some(slot) = self.state.lock().unwrap().outputs.last_mut() {
            slot.take();
        }
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, key: &EndpointKey) -> Result<Pipeline, SpawnError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(SpawnError::Rejected("fake failure".into()));
        }

        let (tx, rx) = mpsc::channel(16);
        state.spawns += 1;
        state.keys.push(*key);
        state.outputs.push(Some(tx));

        Ok(Pipeline::new(
            rx,
            FakeSupervisor {
                state: Arc::clone(&self.state),
                index: state.outputs.len() - 1,
            },
        ))
    }
}

struct FakeSupervisor {
    state: Arc<Mutex<FakeState>>,
    index: usize,
}

impl Supervisor for FakeSupervisor {
    fn dispose(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.disposes += 1;
        state.outputs[self.index] = None;
    }
}

/// Sink that records what it receives
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    finished: Arc<AtomicBool>,
    fail: bool,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Recorder whose every delivery fails
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().unwrap().clone()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ChunkSink for Recorder {
    fn deliver(&self, chunk: &Bytes) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Other("write after end".into()));
        }
        self.chunks.lock().unwrap().push(chunk.clone());
        Ok(())
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}
