//! Upstream pipelines
//!
//! This module provides:
//! - The [`Spawner`] / [`Supervisor`] seam the channels depend on
//! - [`CommandSpawner`], which runs the capture tool piped into a transcoder
//! - [`PipelineConfig`] describing both invocations

pub mod config;
pub mod process;
pub mod spawner;

pub use config::PipelineConfig;
pub use process::{CommandSpawner, ProcessSupervisor};
pub use spawner::{Pipeline, Spawner, Supervisor};
