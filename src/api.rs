use serde::{Deserialize, Serialize};

use crate::transcript::Role;

// -- Chat request types -----------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
}

impl ChatRequest {
    /// Build a streaming request over the given history.
    pub fn streaming(model: impl Into<String>, temperature: f32, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature,
        }
    }
}

// -- Chat SSE types ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeltaMessage {
    #[serde(default)]
    pub content: Option<DeltaText>,
}

#[derive(Debug, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub message: Option<DeltaMessage>,
}

/// One decoded `data:` payload from the chat stream.
#[derive(Debug, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub delta: Option<StreamDelta>,
}

impl StreamEnvelope {
    /// Text at `delta.message.content.text`, if every step of the path exists.
    pub fn text(&self) -> Option<&str> {
        self.delta
            .as_ref()
            .and_then(|d| d.message.as_ref())
            .and_then(|m| m.content.as_ref())
            .and_then(|c| c.text.as_deref())
    }
}

// -- Geo lookup types -------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct GeoConnection {
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeoApiResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub connection: Option<GeoConnection>,
}
