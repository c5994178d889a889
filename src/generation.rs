//! Text-generation provider abstraction and implementations.
//!
//! Defines the [`TextGenerator`] trait and concrete implementations:
//! - **[`DisabledGenerator`]**: returns errors; used when generation is not configured.
//! - **[`GeminiGenerator`]**: calls the Gemini `generateContent` REST endpoint.
//!
//! Use [`create_generator`] to instantiate the provider named in
//! `[generation].provider`.
//!
//! # Failure policy
//!
//! Calls are made once. Network errors, non-2xx statuses, timeouts, and
//! malformed responses are returned to the caller as [`GenerationError`];
//! nothing is retried or cached.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use crate::config::GenerationConfig;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// An image attached to a generation request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Decode base64 image data, sniffing the MIME type from magic bytes.
    pub fn from_base64(data: &str) -> Result<Self> {
        let payload = data
            .split_once(";base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(data);
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        let mime_type = sniff_image_mime(&bytes);
        Ok(Self::new(bytes, mime_type))
    }
}

fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// A service that turns a prompt (and optionally an image) into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
    ) -> Result<String, GenerationError>;
}

// ============ Disabled Provider ============

/// A no-op generator that always returns [`GenerationError::Disabled`].
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _image: Option<&ImageInput>,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

// ============ Gemini Provider ============

/// Generator backed by the Gemini `generateContent` API.
///
/// Requires the API key in the environment variable named by
/// `generation.api_key_env` (default `GEMINI_API_KEY`). Requests with an
/// image go to `vision_model` with the image inlined as base64.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    vision_model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        )
    }
}

/// Build the `generateContent` request body.
fn request_body(prompt: &str, image: Option<&ImageInput>) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "text": prompt })];
    if let Some(img) = image {
        parts.push(serde_json::json!({
            "inline_data": {
                "mime_type": img.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&img.bytes),
            }
        }));
    }
    serde_json::json!({ "contents": [{ "parts": parts }] })
}

/// Concatenate the text parts of the first candidate.
fn parse_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates");
            GenerationError::InvalidResponse(reason.to_string())
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImageInput>,
    ) -> Result<String, GenerationError> {
        let model = if image.is_some() {
            &self.vision_model
        } else {
            &self.model
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(model = %model, status = status.as_u16(), "generation request failed");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_response(&json)
    }
}

/// Create the [`TextGenerator`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"gemini"` | [`GeminiGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}
