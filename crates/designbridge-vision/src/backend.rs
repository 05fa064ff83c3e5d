//! Inference backends for depth estimation and semantic segmentation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use designbridge_core::{DesignBridgeError, ResourceCache, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Relative depth per pixel, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

/// Class id per pixel, row-major, plus the model's label table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<u16>,
    #[serde(default)]
    pub id2label: BTreeMap<u16, String>,
}

fn check_len(kind: &str, width: u32, height: u32, len: usize) -> Result<()> {
    let expected = width as usize * height as usize;
    if expected == 0 || len != expected {
        return Err(DesignBridgeError::MalformedResponse(format!(
            "{} map is {}x{} but carries {} values",
            kind, width, height, len
        )));
    }
    Ok(())
}

impl DepthMap {
    pub fn validate(&self) -> Result<()> {
        check_len("depth", self.width, self.height, self.values.len())
    }
}

impl LabelMap {
    pub fn validate(&self) -> Result<()> {
        check_len("label", self.width, self.height, self.labels.len())
    }
}

pub trait DepthEstimator: Send + Sync {
    fn estimate(&self, image: &[u8]) -> Result<DepthMap>;
}

pub trait Segmenter: Send + Sync {
    fn segment(&self, image: &[u8]) -> Result<LabelMap>;
}

/// Hands out model handles by identifier.
pub trait VisionBackend: Send + Sync {
    fn depth_estimator(&self, model: &str) -> Result<Arc<dyn DepthEstimator>>;

    fn segmenter(&self, model: &str) -> Result<Arc<dyn Segmenter>>;
}

/// One model served by the inference sidecar
pub struct SidecarModel {
    http: HttpClient,
    url: String,
}

impl SidecarModel {
    fn infer<T: DeserializeOwned>(&self, image: &[u8]) -> Result<T> {
        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("{}: {}", self.url, e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Inference(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("{}: {}", self.url, e)))
    }
}

impl DepthEstimator for SidecarModel {
    fn estimate(&self, image: &[u8]) -> Result<DepthMap> {
        let map: DepthMap = self.infer(image)?;
        map.validate()?;
        Ok(map)
    }
}

impl Segmenter for SidecarModel {
    fn segment(&self, image: &[u8]) -> Result<LabelMap> {
        let map: LabelMap = self.infer(image)?;
        map.validate()?;
        Ok(map)
    }
}

/// HTTP sidecar serving `/v1/depth` and `/v1/segmentation`.
///
/// Handles are created once per model id and shared across runs.
pub struct SidecarBackend {
    endpoint: String,
    timeout: Duration,
    depth_models: ResourceCache<SidecarModel>,
    segmentation_models: ResourceCache<SidecarModel>,
}

impl SidecarBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout,
            depth_models: ResourceCache::new(),
            segmentation_models: ResourceCache::new(),
        }
    }

    fn load(&self, task: &str, model: &str) -> Result<SidecarModel> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DesignBridgeError::Transport(format!("http client: {}", e)))?;
        Ok(SidecarModel {
            http,
            url: format!("{}/v1/{}?model={}", self.endpoint, task, model),
        })
    }
}

impl VisionBackend for SidecarBackend {
    fn depth_estimator(&self, model: &str) -> Result<Arc<dyn DepthEstimator>> {
        let handle = self
            .depth_models
            .get_or_try_init(model, || self.load("depth", model))?;
        Ok(handle)
    }

    fn segmenter(&self, model: &str) -> Result<Arc<dyn Segmenter>> {
        let handle = self
            .segmentation_models
            .get_or_try_init(model, || self.load("segmentation", model))?;
        Ok(handle)
    }
}
