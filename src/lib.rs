//! # netpeek
//!
//! Three small network flows behind one terminal front-end:
//!
//! - [`geo`] looks up the apparent public IP and its location;
//! - [`latency`] times sequential probes against a fixed endpoint;
//! - [`chat`] streams replies from a hosted LLM into a session transcript.
//!
//! The flows share nothing but configuration. The chat stream is decoded by
//! [`sse`] and folded into the pending assistant turn of a [`transcript`].

pub mod api;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod latency;
pub mod render;
pub mod sse;
pub mod transcript;

pub use chat::{reduce_stream, ChatClient, ChatSession, ExchangeState};
pub use config::Config;
pub use error::{NetpeekError, Result};
pub use geo::{fetch_geo, GeoRecord, GeoStatus};
pub use latency::{probe_average, probe_single, HttpProber, LatencyResult, LatencySample, ProbeStatus, Prober};
pub use transcript::{ChatTurn, Role, Transcript, TurnHandle};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install the stderr `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` for this crate when
/// `verbose` is on. Calling twice is harmless.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "warn,netpeek=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
