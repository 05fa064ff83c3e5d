//! Shared input/output of the render tiers.

use std::path::{Path, PathBuf};

use designbridge_core::{DesignBridgeError, Result};
use image::ImageFormat;
use serde_json::{Map, Value};

/// What every tier needs to produce one image
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub prompt: String,
    /// Depth artifact, only when it exists on disk
    pub depth_image: Option<PathBuf>,
    pub out_path: PathBuf,
}

/// A tier's successful result; the image is already at `RenderJob::out_path`
#[derive(Debug, Clone, Default)]
pub struct TierOutput {
    pub params: Map<String, Value>,
}

impl TierOutput {
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Decode encoded image bytes of any supported format and store them as PNG.
pub fn save_as_png(bytes: &[u8], path: &Path) -> Result<()> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| DesignBridgeError::MalformedResponse(format!("undecodable image: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| DesignBridgeError::Io(std::io::Error::other(e.to_string())))
}
