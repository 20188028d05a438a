//! Streaming chat exchanges folded into a session transcript.
//!
//! ```text
//! Idle ──► Sending ──► Streaming ──► Completed
//!             │            │
//!             └────────────┴───────► Failed
//! ```
//!
//! At most one exchange is in flight per [`ChatSession`]. A submission made
//! while the session is `Sending` or `Streaming` is rejected with
//! [`NetpeekError::ExchangeInFlight`] and leaves the transcript untouched.

use std::fmt::Display;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tokio_stream::{Stream, StreamExt};

use crate::api::ChatRequest;
use crate::config::{read_secret, Config};
use crate::error::{NetpeekError, Result};
use crate::sse::{EventDecoder, SseLine};
use crate::transcript::{Transcript, TurnHandle};

// ---------------------------------------------------------------------------
// ExchangeState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    /// Request sent, no body bytes yet.
    Sending,
    /// At least one chunk processed.
    Streaming,
    Completed,
    Failed,
}

impl ExchangeState {
    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, Streaming)
                | (Sending, Completed)
                | (Sending, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, ExchangeState::Sending | ExchangeState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Completed | ExchangeState::Failed)
    }
}

impl std::fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExchangeState::Idle => "idle",
            ExchangeState::Sending => "sending",
            ExchangeState::Streaming => "streaming",
            ExchangeState::Completed => "completed",
            ExchangeState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// Transcript plus the state of its current (or last) exchange.
#[derive(Debug)]
pub struct ChatSession {
    transcript: Transcript,
    state: ExchangeState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            state: ExchangeState::Idle,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn accepts_input(&self) -> bool {
        !self.state.is_in_flight()
    }

    fn transition(&mut self, next: ExchangeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal exchange transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(target: "netpeek::chat", from = %self.state, to = %next, "exchange transition");
        self.state = next;
    }

    /// Start a new exchange: push the user turn and an empty assistant turn.
    pub fn begin(&mut self, prompt: impl Into<String>) -> Result<TurnHandle> {
        if self.state.is_in_flight() {
            tracing::warn!(target: "netpeek::chat", state = %self.state, "submission rejected");
            return Err(NetpeekError::ExchangeInFlight);
        }
        if self.state.is_terminal() {
            self.transition(ExchangeState::Idle);
        }
        self.transition(ExchangeState::Sending);
        Ok(self.transcript.begin_exchange(prompt))
    }

    /// Append one fragment to the pending turn, entering `Streaming` if needed.
    pub fn apply_fragment(&mut self, handle: &TurnHandle, fragment: &str) {
        self.mark_streaming();
        self.transcript.append(handle, fragment);
    }

    fn mark_streaming(&mut self) {
        if self.state == ExchangeState::Sending {
            self.transition(ExchangeState::Streaming);
        }
    }

    pub fn complete(&mut self, _handle: &TurnHandle) {
        self.transition(ExchangeState::Completed);
    }

    /// Overwrite the pending turn with `Error: <message>`, discarding any
    /// partial content.
    pub fn fail(&mut self, handle: &TurnHandle, error: &NetpeekError) {
        self.transcript.overwrite(handle, format!("Error: {error}"));
        self.transition(ExchangeState::Failed);
    }

    /// Drop all turns. Refused while an exchange is in flight.
    pub fn clear(&mut self) -> Result<()> {
        if self.state.is_in_flight() {
            return Err(NetpeekError::ExchangeInFlight);
        }
        self.transcript.clear();
        self.state = ExchangeState::Idle;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stream reduction
// ---------------------------------------------------------------------------

/// Fold an SSE byte stream into the turn behind `handle`.
///
/// Returns once the stream ends. A chunk error aborts with `NetworkFailure`;
/// the caller decides how to record it.
pub async fn reduce_stream<S, B, E, F>(
    stream: S,
    session: &mut ChatSession,
    handle: &TurnHandle,
    mut on_fragment: F,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str),
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = EventDecoder::new();
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| NetpeekError::NetworkFailure(e.to_string()))?;
        chunks += 1;
        session.mark_streaming();
        for event in decoder.feed(chunk.as_ref()) {
            apply_event(session, handle, event, &mut on_fragment);
        }
    }
    for event in decoder.finish() {
        apply_event(session, handle, event, &mut on_fragment);
    }

    tracing::debug!(target: "netpeek::chat", chunks, "stream ended");
    Ok(())
}

fn apply_event<F: FnMut(&str)>(
    session: &mut ChatSession,
    handle: &TurnHandle,
    event: SseLine,
    on_fragment: &mut F,
) {
    match event {
        SseLine::Fragment(text) if !text.is_empty() => {
            session.apply_fragment(handle, &text);
            on_fragment(&text);
        }
        SseLine::Done => {
            tracing::trace!(target: "netpeek::chat", "done marker received");
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Sends chat exchanges to the hosted LLM endpoint.
pub struct ChatClient {
    client: Client,
    url: String,
    pub model: String,
    pub temperature: f32,
    api_key_env: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            url: config.chat_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key_env: config.api_key_env.clone(),
        }
    }

    /// Run one exchange for `prompt`.
    ///
    /// On failure the pending assistant turn already reads `Error: ...` when
    /// this returns; the error is handed back for logging only. A rejected
    /// submission (`ExchangeInFlight`) touches nothing.
    pub async fn send<F: FnMut(&str)>(
        &self,
        session: &mut ChatSession,
        prompt: &str,
        on_fragment: F,
    ) -> Result<()> {
        let handle = session.begin(prompt)?;

        match self.stream_exchange(session, &handle, on_fragment).await {
            Ok(()) => {
                session.complete(&handle);
                tracing::info!(target: "netpeek::chat", model = %self.model, "exchange completed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "netpeek::chat", error = %e, "exchange failed");
                session.fail(&handle, &e);
                Err(e)
            }
        }
    }

    async fn stream_exchange<F: FnMut(&str)>(
        &self,
        session: &mut ChatSession,
        handle: &TurnHandle,
        on_fragment: F,
    ) -> Result<()> {
        let api_key = read_secret(&self.api_key_env)?;
        let request = ChatRequest::streaming(
            self.model.clone(),
            self.temperature,
            session.transcript().messages(Some(handle)),
        );

        tracing::debug!(
            target: "netpeek::chat",
            url = %self.url,
            history = request.messages.len(),
            "opening chat stream"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| NetpeekError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetpeekError::HttpStatusFailure {
                status: status.as_u16(),
            });
        }

        reduce_stream(response.bytes_stream(), session, handle, on_fragment).await
    }
}
