use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PLACEHOLDER_SCENE: &str = "info-summary";
pub const DEFAULT_PROFILE: &str = "industrial-control";

/// One rendering request for the studio frontend. Everything the scene needs
/// travels in the payload token; the frontend has no other input channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub scene: String,
    pub profile: String,
    #[serde(default)]
    pub frame: u32,
    #[serde(default = "default_total_frames", rename = "totalFrames")]
    pub total_frames: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_total_frames() -> u32 {
    1
}

impl RenderRequest {
    pub fn new(scene: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            profile: profile.into(),
            frame: 0,
            total_frames: 1,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_frame(mut self, frame: u32, total_frames: u32) -> Self {
        self.frame = frame;
        self.total_frames = total_frames;
        self
    }
}

/// Serializes a request to JSON and wraps it in base64 so it can travel as a
/// single query parameter. Percent-encoding of the token itself happens when
/// the URL is assembled.
pub fn encode_payload(request: &RenderRequest) -> Result<String> {
    let text = serde_json::to_string(request).context("failed to serialize render request")?;
    Ok(BASE64_STANDARD.encode(text.as_bytes()))
}

/// Inverse of `encode_payload`, as the studio frontend applies it. An absent
/// or malformed token yields a deterministic placeholder request so a broken
/// invocation shows up on screen instead of failing silently.
pub fn decode_payload(token: Option<&str>) -> RenderRequest {
    let Some(encoded) = token else {
        return placeholder(
            "Visual Preview Missing Payload",
            "Pass a payload query parameter in the render URL".to_owned(),
        );
    };

    match try_decode(encoded) {
        Ok(request) => request,
        Err(error) => placeholder("Invalid payload", format!("{error:#}")),
    }
}

fn try_decode(encoded: &str) -> Result<RenderRequest> {
    let bytes = BASE64_STANDARD
        .decode(encoded)
        .context("payload token is not valid base64")?;
    let text = String::from_utf8(bytes).context("payload bytes are not UTF-8")?;
    serde_json::from_str(&text).context("payload JSON does not describe a render request")
}

fn placeholder(title: &str, detail: String) -> RenderRequest {
    RenderRequest::new(PLACEHOLDER_SCENE, DEFAULT_PROFILE)
        .with_field("title", Value::String(title.to_owned()))
        .with_field("bullets", Value::Array(vec![Value::String(detail)]))
}
