//! Per-endpoint broadcast channels
//!
//! The registry hands out one channel per endpoint. A channel starts the
//! endpoint's pipeline on demand and fans its output out to every listener.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ChannelRegistry>
//!                   ┌───────────────────────────┐
//!                   │ channels: HashMap<Key,    │
//!                   │   BroadcastChannel {      │
//!                   │     subscribers,          │
//!                   │     lifecycle: Idle |     │
//!                   │       Active(supervisor) |│
//!                   │       Draining(.., timer) │
//!                   │   }                       │
//!                   │ >                         │
//!                   └─────────────┬─────────────┘
//!                                 │
//!      capture | transcoder ──► pump task ──► fan_out()
//!                                 │
//!              ┌──────────────────┼──────────────────┐
//!              ▼                  ▼                  ▼
//!        [ChunkSink]        [ChunkSink]        [ChunkSink]
//!       HTTP response      HTTP response      HTTP response
//! ```
//!
//! # Zero-Copy Fan-out
//!
//! Chunks are `bytes::Bytes`, so every listener shares the allocation the
//! pipeline reader produced; delivering a chunk only bumps a reference count.

pub mod channel;
pub mod config;
pub mod key;
pub mod sink;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{BroadcastChannel, Subscription};
pub use config::RelayConfig;
pub use key::EndpointKey;
pub use sink::{ChunkSink, FnSink};
pub use state::{ChannelState, ChannelStats};
pub use store::ChannelRegistry;
