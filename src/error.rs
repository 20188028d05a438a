//! Crate-level error type shared by the geo, latency and chat flows.

use thiserror::Error;

/// Errors surfaced by netpeek's network flows.
///
/// Malformed stream lines are deliberately absent: the SSE reducer skips
/// them and only logs at `debug` level.
#[derive(Debug, Error)]
pub enum NetpeekError {
    /// The request could not be sent or the response body broke off.
    #[error("network error: {0}")]
    NetworkFailure(String),

    /// The server replied with a non-2xx status.
    #[error("API error: {status}")]
    HttpStatusFailure { status: u16 },

    /// The server replied, but the payload violated the API contract
    /// (e.g. `success: false` from the geo endpoint).
    #[error("{0}")]
    ApiSemanticFailure(String),

    /// A required secret is not present in the environment.
    #[error("{0} not set. Export it or pass via environment.")]
    ConfigurationMissing(String),

    /// The configuration file or a CLI override is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A chat submission arrived while another exchange was in flight.
    #[error("an exchange is already in flight")]
    ExchangeInFlight,
}

pub type Result<T> = std::result::Result<T, NetpeekError>;
