//! HTTP radio relay
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:8001
//!   cargo run --example relay_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Listening
//!
//!   ffplay http://localhost:8001/jam.example.com/22124/listen.mp3
//!   mpv    http://localhost:8001/10.0.0.5/22124/listen.mp3
//!
//! The capture tool is taken from `JAM_LISTENER` (default
//! `./target/debug/jam-listener`) and piped into `ffmpeg`. Static files are
//! served from `RELAY_PUBLIC_DIR` (default `demos/public`).
//!
//! ## Features
//!
//! - One upstream pipeline per resolved endpoint, shared by every listener
//! - Pipeline starts on the first listener and stops 5s after the last leaves
//! - Slow listeners drop chunks instead of holding back everyone else

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_stream::Stream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use jam_relay::error::GatewayError;
use jam_relay::{ChannelRegistry, CommandSpawner, Gateway, Listener, PipelineConfig, RelayConfig};

/// Response body that keeps the listener (and its subscription) alive
struct ListenBody {
    listener: Listener,
}

impl Stream for ListenBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.listener.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

async fn listen(
    State(gateway): State<Arc<Gateway>>,
    Path((host, port)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    match gateway.listen(&host, &port, Some(peer)).await {
        Ok(listener) => (
            [(header::CONTENT_TYPE, "audio/mp3")],
            Body::from_stream(ListenBody { listener }),
        )
            .into_response(),
        Err(e @ GatewayError::InvalidPort(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

fn parse_bind_addr(s: &str) -> Result<SocketAddr, String> {
    s.parse()
        .or_else(|_| format!("0.0.0.0:{}", s).parse())
        .map_err(|_| format!("Invalid bind address: {}", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Usage: relay_server [BIND_ADDR]");
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 8001)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jam_relay=info".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let pipeline = PipelineConfig::from_env();
    tracing::info!(
        capture = %pipeline.capture_program,
        transcoder = %pipeline.transcoder_program,
        "Pipeline configured"
    );

    let registry = Arc::new(ChannelRegistry::with_config(
        CommandSpawner::new(pipeline),
        RelayConfig::default(),
    ));
    let gateway = Arc::new(Gateway::new(Arc::clone(&registry)));

    let public_dir =
        std::env::var("RELAY_PUBLIC_DIR").unwrap_or_else(|_| "demos/public".to_string());

    let app = Router::new()
        .route("/:host/:port/listen.mp3", get(listen))
        .with_state(gateway)
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Listening");

    let cleanup = registry.spawn_cleanup_task();

    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    cleanup.abort();

    Ok(())
}
