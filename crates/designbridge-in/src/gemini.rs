//! Gemini text service client (blocking REST).

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use designbridge_core::config::GeminiConfig;
use designbridge_core::{DesignBridgeError, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Image context attached to a generation request
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePart {
    /// Stored service-side by an upload call
    Uploaded { uri: String, mime_type: String },
    /// Base64 bytes carried in the request body
    Inline { mime_type: String, data: String },
}

impl ImagePart {
    pub fn inline_from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(ImagePart::Inline {
            mime_type: mime_type_for(path).to_string(),
            data: BASE64.encode(bytes),
        })
    }

    fn to_json(&self) -> Value {
        match self {
            ImagePart::Uploaded { uri, mime_type } => json!({
                "file_data": { "mime_type": mime_type, "file_uri": uri }
            }),
            ImagePart::Inline { mime_type, data } => json!({
                "inline_data": { "mime_type": mime_type, "data": data }
            }),
        }
    }
}

/// MIME type from the file extension; unknown extensions are sent as JPEG.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// External text-understanding service.
pub trait TextService: Send + Sync {
    /// Store an image service-side so requests can reference it.
    fn upload_image(&self, path: &Path) -> Result<ImagePart>;

    /// Generate a text response for `prompt`, with optional image context.
    fn generate(&self, prompt: &str, image: Option<&ImagePart>) -> Result<String>;
}

pub struct GeminiClient {
    http: HttpClient,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DesignBridgeError::Transport(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }
}

impl TextService for GeminiClient {
    fn upload_image(&self, path: &Path) -> Result<ImagePart> {
        let api_key = self.config.api_key()?;
        let mime_type = mime_type_for(path);
        let bytes = std::fs::read(path)?;
        let url = format!(
            "{}/upload/v1beta/files?uploadType=media",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("upload: {}", e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Transport(format!(
                "upload returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("upload body: {}", e)))?;
        let file = &body["file"];
        let uri = file["uri"]
            .as_str()
            .ok_or_else(|| DesignBridgeError::MalformedResponse("upload response missing file.uri".into()))?;
        debug!(uri, "image uploaded");
        Ok(ImagePart::Uploaded {
            uri: uri.to_string(),
            mime_type: file["mimeType"].as_str().unwrap_or(mime_type).to_string(),
        })
    }

    fn generate(&self, prompt: &str, image: Option<&ImagePart>) -> Result<String> {
        let api_key = self.config.api_key()?;

        let mut parts = Vec::new();
        if let Some(image) = image {
            parts.push(image.to_json());
        }
        parts.push(json!({ "text": prompt }));
        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": self.config.temperature },
        });

        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("generateContent: {}", e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Transport(format!(
                "generateContent returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("generateContent body: {}", e)))?;
        extract_text(&body)
    }
}

/// Concatenate `candidates[0].content.parts[*].text`.
pub fn extract_text(body: &Value) -> Result<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| DesignBridgeError::MalformedResponse("response has no candidate parts".into()))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err(DesignBridgeError::MalformedResponse("response text is empty".into()));
    }
    Ok(text)
}
