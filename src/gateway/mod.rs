//! Request gateway
//!
//! Glue between a transport (the demo HTTP server) and the relay core:
//! validates and resolves the requested endpoint, obtains its channel and
//! registers a listener for the lifetime of one response.

pub mod listen;
pub mod resolve;
pub mod sink;

pub use listen::{Gateway, Listener};
pub use resolve::{parse_port, resolve};
pub use sink::ListenerSink;
