//! Spawner and supervisor traits
//!
//! The channel never talks to processes directly. It asks a [`Spawner`] for a
//! [`Pipeline`], drains the pipeline's output and eventually disposes its
//! [`Supervisor`]. [`CommandSpawner`](super::CommandSpawner) is the production
//! implementation.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SpawnError;
use crate::relay::EndpointKey;

/// Handle that terminates one running pipeline
pub trait Supervisor: Send + 'static {
    /// Terminate the pipeline and close its output. Consumes the supervisor,
    /// so it runs at most once.
    fn dispose(self: Box<Self>);
}

/// A freshly started pipeline
pub struct Pipeline {
    /// Output chunks, in production order. Closes when the pipeline stops.
    pub output: mpsc::Receiver<Bytes>,
    /// Termination handle
    pub supervisor: Box<dyn Supervisor>,
}

impl Pipeline {
    /// Bundle an output receiver with its supervisor
    pub fn new(output: mpsc::Receiver<Bytes>, supervisor: impl Supervisor) -> Self {
        Self {
            output,
            supervisor: Box::new(supervisor),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

/// Starts upstream pipelines for endpoints
///
/// `spawn` is called with the channel lock held and must not block. It is
/// always called from within a tokio runtime.
pub trait Spawner: Send + Sync + 'static {
    /// Start a pipeline for `key`
    fn spawn(&self, key: &EndpointKey) -> Result<Pipeline, SpawnError>;
}
