//! PNG and JSON writers for vision artifacts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use designbridge_core::{DesignBridgeError, Result};
use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use serde::Serialize;

use crate::backend::{DepthMap, LabelMap};

pub const DEPTH_FILE: &str = "depth.png";
pub const SEGMENTATION_FILE: &str = "segmentation.png";
pub const SEGMENTATION_META_FILE: &str = "segmentation_meta.json";

const FLAT_RANGE: f32 = 1e-8;

fn image_error(e: image::ImageError) -> DesignBridgeError {
    DesignBridgeError::Io(std::io::Error::other(e.to_string()))
}

/// Min-max scale to 0..=255; a flat map becomes all zeros.
pub fn normalize_depth(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range < FLAT_RANGE {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - min) / range * 255.0) as u8)
        .collect()
}

pub fn write_depth_png(map: &DepthMap, path: &Path) -> Result<()> {
    map.validate()?;
    let pixels = normalize_depth(&map.values);
    let image = GrayImage::from_raw(map.width, map.height, pixels)
        .ok_or_else(|| DesignBridgeError::Inference("depth buffer size mismatch".into()))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(image_error)
}

/// 16-bit grayscale label map; pixel value = class id.
pub fn write_label_png(map: &LabelMap, path: &Path) -> Result<()> {
    map.validate()?;
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(map.width, map.height, map.labels.clone())
            .ok_or_else(|| DesignBridgeError::Inference("label buffer size mismatch".into()))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(image_error)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationMeta {
    pub model: String,
    /// Sorted ascending
    pub present_class_ids: Vec<u16>,
    /// Keyed by class id; ids missing from the model's table map to "unknown"
    pub present_labels: BTreeMap<u16, String>,
}

impl SegmentationMeta {
    pub fn from_labels(model: &str, map: &LabelMap) -> Self {
        let present: BTreeSet<u16> = map.labels.iter().copied().collect();
        let present_labels = present
            .iter()
            .map(|id| {
                let label = map
                    .id2label
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                (*id, label)
            })
            .collect();
        Self {
            model: model.to_string(),
            present_class_ids: present.into_iter().collect(),
            present_labels,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
