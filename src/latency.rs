//! Round-trip latency estimation by repeated, strictly sequential probes.

use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use serde::Serialize;

/// One probe's round-trip time in milliseconds, or `None` if it failed.
pub type LatencySample = Option<u64>;

pub const DEFAULT_PROBE_COUNT: usize = 5;
pub const DEFAULT_INTER_DELAY: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pending,
    Success,
    Error,
}

impl ProbeStatus {
    /// `Pending` may move to either terminal state; terminal states never move.
    pub fn can_transition_to(self, next: ProbeStatus) -> bool {
        matches!(
            (self, next),
            (ProbeStatus::Pending, ProbeStatus::Success) | (ProbeStatus::Pending, ProbeStatus::Error)
        )
    }
}

/// Outcome of one latency test. A fresh value is built per invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyResult {
    pub target: String,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    /// Number of successful samples, which may be fewer than probes sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<u64>>,
}

impl LatencyResult {
    pub fn pending(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: ProbeStatus::Pending,
            mean: None,
            min: None,
            max: None,
            sample_count: None,
            samples: None,
        }
    }

    /// Settle a pending result from the successful samples collected.
    pub fn settle(mut self, samples: Vec<u64>) -> Self {
        debug_assert!(self.status == ProbeStatus::Pending);
        if samples.is_empty() {
            self.status = ProbeStatus::Error;
            return self;
        }
        let n = samples.len() as u64;
        let sum: u64 = samples.iter().sum();
        self.status = ProbeStatus::Success;
        // round-half-up of sum / n in integer arithmetic
        self.mean = Some((sum * 2 + n) / (n * 2));
        self.min = samples.iter().copied().min();
        self.max = samples.iter().copied().max();
        self.sample_count = Some(samples.len());
        self.samples = Some(samples);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

/// Issues a single timed probe against `target`.
pub trait Prober {
    fn probe_once(&self, target: &str) -> impl Future<Output = LatencySample> + Send;
}

/// reqwest-backed prober. Every request bypasses HTTP caches.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .to_string()
}

impl Prober for HttpProber {
    async fn probe_once(&self, target: &str) -> LatencySample {
        let request = self
            .client
            .get(target)
            .query(&[("_", cache_buster())])
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache");

        let start = Instant::now();
        let result = request.send().await;
        let elapsed = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                tracing::debug!(target: "netpeek::latency", %target, elapsed_ms = elapsed, "probe ok");
                Some(elapsed)
            }
            Ok(resp) => {
                tracing::warn!(
                    target: "netpeek::latency",
                    %target,
                    status = resp.status().as_u16(),
                    "probe returned non-ok status"
                );
                None
            }
            Err(e) => {
                tracing::warn!(target: "netpeek::latency", %target, error = %e, "probe failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Averaging
// ---------------------------------------------------------------------------

/// Run `count` probes one after another, sleeping `inter_delay` between them
/// (not after the last), and reduce the successful samples.
///
/// `progress` is called after each probe with its 1-based index and sample.
/// A `count` of zero sends nothing and settles as `Error`.
pub async fn probe_average<P, F>(
    prober: &P,
    target: &str,
    count: usize,
    inter_delay: Duration,
    mut progress: F,
) -> LatencyResult
where
    P: Prober,
    F: FnMut(usize, LatencySample),
{
    let result = LatencyResult::pending(target);
    let mut samples = Vec::with_capacity(count);

    for i in 0..count {
        let sample = prober.probe_once(target).await;
        if let Some(ms) = sample {
            samples.push(ms);
        }
        progress(i + 1, sample);

        if i + 1 < count && !inter_delay.is_zero() {
            tokio::time::sleep(inter_delay).await;
        }
    }

    let result = result.settle(samples);
    tracing::info!(
        target: "netpeek::latency",
        %target,
        probes = count,
        succeeded = result.sample_count.unwrap_or(0),
        mean_ms = ?result.mean,
        "latency test finished"
    );
    result
}

/// Single-probe flow, modelled as a one-sample average.
pub async fn probe_single<P: Prober>(prober: &P, target: &str) -> LatencyResult {
    probe_average(prober, target, 1, Duration::ZERO, |_, _| {}).await
}
