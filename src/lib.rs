//! # jam-relay
//!
//! On-demand relay for live audio. For every upstream endpoint the relay runs
//! at most one capture tool piped into a transcoder, and only while someone
//! is listening. The output is fanned out to any number of listeners.
//!
//! - [`relay`]: per-endpoint broadcast channels and the registry that owns them
//! - [`pipeline`]: spawning and supervising the capture | transcoder processes
//! - [`gateway`]: resolving listen requests into channel subscriptions
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use jam_relay::gateway::Gateway;
//! use jam_relay::pipeline::{CommandSpawner, PipelineConfig};
//! use jam_relay::relay::ChannelRegistry;
//!
//! # async fn example() -> jam_relay::Result<()> {
//! let spawner = CommandSpawner::new(PipelineConfig::from_env());
//! let gateway = Gateway::new(Arc::new(ChannelRegistry::new(spawner)));
//!
//! let mut listener = gateway.listen("localhost", "22124", None).await?;
//! while let Some(chunk) = listener.recv().await {
//!     println!("{} bytes of mp3", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod relay;

pub use error::{Error, Result};
pub use gateway::{Gateway, Listener};
pub use pipeline::{CommandSpawner, PipelineConfig};
pub use relay::{BroadcastChannel, ChannelRegistry, EndpointKey, RelayConfig, Subscription};
