//! Process-backed pipelines
//!
//! Each pipeline is two child processes: the capture tool, whose stdout is
//! wired directly into the transcoder's stdin, and the transcoder, whose
//! stdout is read by a background task and forwarded as chunks. Both children
//! are started with `kill_on_drop`, so a failure halfway through spawning
//! never leaves an orphan behind.

use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use crate::error::SpawnError;
use crate::relay::EndpointKey;

use super::config::PipelineConfig;
use super::spawner::{Pipeline, Spawner, Supervisor};

/// Spawns capture | transcoder process pairs
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    config: PipelineConfig,
}

impl CommandSpawner {
    /// Create a spawner with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Get the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Default for CommandSpawner {
    fn default() -> Self {
        Self::new(PipelineConfig::from_env())
    }
}

impl Spawner for CommandSpawner {
    fn spawn(&self, key: &EndpointKey) -> Result<Pipeline, SpawnError> {
        let config = &self.config;

        let mut capture = Command::new(&config.capture_program)
            .args(config.capture_args_for(key))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Capture {
                program: config.capture_program.clone(),
                source,
            })?;

        let pcm: Stdio = capture
            .stdout
            .take()
            .ok_or(SpawnError::Pipe("capture stdout"))?
            .try_into()
            .map_err(|_| SpawnError::Pipe("capture stdout"))?;

        let transcoder_stderr = if config.inherit_transcoder_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut transcoder = Command::new(&config.transcoder_program)
            .args(&config.transcoder_args)
            .stdin(pcm)
            .stdout(Stdio::piped())
            .stderr(transcoder_stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Transcoder {
                program: config.transcoder_program.clone(),
                source,
            })?;

        let stdout = transcoder
            .stdout
            .take()
            .ok_or(SpawnError::Pipe("transcoder stdout"))?;

        tracing::debug!(
            endpoint = %key,
            capture_pid = ?capture.id(),
            transcoder_pid = ?transcoder.id(),
            "Pipeline processes spawned"
        );

        let (tx, rx) = mpsc::channel(config.output_buffer);
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(run_pipeline(
            *key,
            [capture, transcoder],
            stdout,
            tx,
            kill_rx,
            config.read_chunk_size,
        ));

        Ok(Pipeline::new(
            rx,
            ProcessSupervisor {
                key: *key,
                kill: Some(kill_tx),
            },
        ))
    }
}

/// Supervisor for one capture | transcoder pair
///
/// Disposing (or dropping) it signals the reader task, which kills and reaps
/// both children and closes the output.
#[derive(Debug)]
pub struct ProcessSupervisor {
    key: EndpointKey,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessSupervisor {
    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            tracing::debug!(endpoint = %self.key, "Terminating pipeline");
            // Err means the reader task already finished on its own
            let _ = kill.send(());
        }
    }
}

impl Supervisor for ProcessSupervisor {
    fn dispose(mut self: Box<Self>) {
        self.terminate();
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn run_pipeline(
    key: EndpointKey,
    mut children: [Child; 2],
    mut stdout: ChildStdout,
    output: mpsc::Sender<Bytes>,
    mut kill: oneshot::Receiver<()>,
    chunk_size: usize,
) {
    let mut buf = BytesMut::with_capacity(chunk_size);

    let reason = loop {
        buf.reserve(chunk_size);

        tokio::select! {
            biased;

            _ = &mut kill => break "disposed",
            read = stdout.read_buf(&mut buf) => match read {
                Ok(0) => break "end of stream",
                Ok(n) => {
                    tracing::trace!(endpoint = %key, bytes = n, "Pipeline chunk");
                    if output.send(buf.split().freeze()).await.is_err() {
                        break "output closed";
                    }
                }
                Err(e) => {
                    tracing::warn!(endpoint = %key, error = %e, "Failed to read transcoder output");
                    break "read error";
                }
            },
        }
    };

    drop(stdout);
    drop(output);

    for (stage, child) in ["capture", "transcoder"].into_iter().zip(children.iter_mut()) {
        // Fails only if the child was already reaped
        let _ = child.start_kill();
        match child.wait().await {
            Ok(status) => tracing::debug!(endpoint = %key, stage, %status, "Pipeline stage exited"),
            Err(e) => tracing::warn!(endpoint = %key, stage, error = %e, "Failed to reap pipeline stage"),
        }
    }

    tracing::info!(endpoint = %key, reason, "Pipeline stopped");
}
