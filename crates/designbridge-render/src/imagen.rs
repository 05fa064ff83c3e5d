//! Tier 1: hosted Imagen `predict` endpoint.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use designbridge_core::config::GeminiConfig;
use designbridge_core::{DesignBridgeError, Result, Strategy};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::tier::{save_as_png, RenderJob, TierOutput};

pub const BACKEND: &str = "imagen";

/// Hosted text-to-image service
pub trait ImageService: Send + Sync {
    fn model(&self) -> &str;

    /// Encoded image bytes for `prompt`.
    fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

pub struct ImagenClient {
    http: HttpClient,
    gemini: GeminiConfig,
    model: String,
}

impl ImagenClient {
    pub fn new(gemini: GeminiConfig, model: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(gemini.timeout_secs))
            .build()
            .map_err(|e| DesignBridgeError::Transport(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            gemini,
            model: model.into(),
        })
    }
}

impl ImageService for ImagenClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let api_key = self.gemini.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:predict",
            self.gemini.base_url.trim_end_matches('/'),
            self.model
        );
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("predict: {}", e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Transport(format!(
                "predict returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("predict body: {}", e)))?;
        decode_prediction(&body)
    }
}

/// Bytes of `predictions[0].bytesBase64Encoded`.
pub fn decode_prediction(body: &Value) -> Result<Vec<u8>> {
    let first = body["predictions"]
        .as_array()
        .and_then(|predictions| predictions.first())
        .ok_or_else(|| DesignBridgeError::MalformedResponse("Imagen returned no images".into()))?;
    let encoded = first["bytesBase64Encoded"].as_str().ok_or_else(|| {
        DesignBridgeError::MalformedResponse("Imagen response missing image bytes".into())
    })?;
    BASE64
        .decode(encoded)
        .map_err(|e| DesignBridgeError::MalformedResponse(format!("Imagen image bytes: {}", e)))
}

pub struct ImagenTier {
    service: Arc<dyn ImageService>,
}

impl ImagenTier {
    pub fn new(service: Arc<dyn ImageService>) -> Self {
        Self { service }
    }
}

impl Strategy<RenderJob, TierOutput> for ImagenTier {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn attempt(&self, job: &RenderJob) -> Result<TierOutput> {
        let bytes = self.service.generate_image(&job.prompt)?;
        save_as_png(&bytes, &job.out_path)?;
        Ok(TierOutput::default().with("model", self.service.model()))
    }
}
