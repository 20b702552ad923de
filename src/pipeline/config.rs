//! Pipeline configuration
//!
//! Describes the capture tool and transcoder invocation. The capture tool
//! writes raw interleaved s16le PCM (48 kHz, stereo) which the transcoder
//! turns into an MP3 byte stream.

use std::env;

use crate::relay::EndpointKey;

/// Environment variable overriding the capture program
pub const CAPTURE_PROGRAM_ENV: &str = "JAM_LISTENER";

/// Capture program used when the environment does not name one
pub const DEFAULT_CAPTURE_PROGRAM: &str = "./target/debug/jam-listener";

/// PCM sample rate produced by the capture tool
pub const PCM_SAMPLE_RATE: u32 = 48_000;

/// PCM channel count produced by the capture tool
pub const PCM_CHANNELS: u8 = 2;

/// Pipeline configuration options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capture tool executable
    pub capture_program: String,

    /// Arguments passed before `--server <addr>:<port>`
    pub capture_args: Vec<String>,

    /// Transcoder executable
    pub transcoder_program: String,

    /// Transcoder arguments (reads PCM on stdin, writes on stdout)
    pub transcoder_args: Vec<String>,

    /// Bytes requested per read from the transcoder
    pub read_chunk_size: usize,

    /// Chunks buffered between the reader task and the channel
    pub output_buffer: usize,

    /// Pass transcoder diagnostics through to our stderr
    pub inherit_transcoder_stderr: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_program: DEFAULT_CAPTURE_PROGRAM.to_string(),
            capture_args: Vec::new(),
            transcoder_program: "ffmpeg".to_string(),
            transcoder_args: default_transcoder_args(),
            read_chunk_size: 16 * 1024,
            output_buffer: 64,
            inherit_transcoder_stderr: true,
        }
    }
}

fn default_transcoder_args() -> Vec<String> {
    let rate = PCM_SAMPLE_RATE.to_string();
    let channels = PCM_CHANNELS.to_string();
    [
        "-f", "s16le", "-ar", rate.as_str(), "-ac", channels.as_str(), "-i", "-", "-f", "mp3", "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl PipelineConfig {
    /// Default config with the capture program taken from `JAM_LISTENER`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(program) = env::var(CAPTURE_PROGRAM_ENV) {
            if !program.is_empty() {
                config.capture_program = program;
            }
        }
        config
    }

    /// Set the capture program and its leading arguments
    pub fn capture<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capture_program = program.into();
        self.capture_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the transcoder program and its arguments
    pub fn transcoder<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transcoder_program = program.into();
        self.transcoder_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the read chunk size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the output buffer size
    pub fn output_buffer(mut self, chunks: usize) -> Self {
        self.output_buffer = chunks.max(1);
        self
    }

    /// Discard transcoder stderr
    pub fn quiet_transcoder(mut self) -> Self {
        self.inherit_transcoder_stderr = false;
        self
    }

    /// Full capture argument list for an endpoint
    pub fn capture_args_for(&self, key: &EndpointKey) -> Vec<String> {
        let mut args = self.capture_args.clone();
        args.push("--server".to_string());
        args.push(key.to_string());
        args
    }
}
