//! DesignBridge-Vision: depth and segmentation artifacts for a reference photo
//!
//! Artifacts land in `{artifact_root}/vision/{task_id}/`:
//! `depth.png` (8-bit), `segmentation.png` (16-bit label map) and
//! `segmentation_meta.json`.

pub mod artifacts;
pub mod backend;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use designbridge_core::config::VisionConfig;
use designbridge_core::{DesignBridgeError, Result, VisionFeatures};
use tracing::{info, warn};

pub use backend::{DepthEstimator, DepthMap, LabelMap, Segmenter, SidecarBackend, VisionBackend};

/// Paths of the artifacts one preprocessing run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionArtifacts {
    pub depth_path: Option<PathBuf>,
    pub segmentation_path: Option<PathBuf>,
    pub segmentation_meta_path: Option<PathBuf>,
}

impl VisionArtifacts {
    pub fn into_features(self) -> VisionFeatures {
        let as_string = |p: PathBuf| p.to_string_lossy().into_owned();
        VisionFeatures {
            depth: self.depth_path.map(as_string),
            segmentation: self.segmentation_path.map(as_string),
            segmentation_meta: self.segmentation_meta_path.map(as_string),
            ..VisionFeatures::empty()
        }
    }
}

pub struct VisionAdapter {
    backend: Arc<dyn VisionBackend>,
    config: VisionConfig,
}

impl VisionAdapter {
    pub fn new(backend: Arc<dyn VisionBackend>, config: VisionConfig) -> Self {
        Self { backend, config }
    }

    /// Adapter backed by the HTTP inference sidecar named in `config`.
    pub fn sidecar(config: VisionConfig) -> Self {
        let backend = SidecarBackend::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        Self::new(Arc::new(backend), config)
    }

    /// Run the enabled inferences and write their artifacts under `out_dir`.
    ///
    /// The image is read before `out_dir` is created, so an unreadable
    /// path leaves nothing on disk.
    pub fn preprocess(&self, image_path: &Path, out_dir: &Path) -> Result<VisionArtifacts> {
        let bytes = std::fs::read(image_path)?;
        image::guess_format(&bytes).map_err(|e| {
            DesignBridgeError::Inference(format!("{}: {}", image_path.display(), e))
        })?;
        std::fs::create_dir_all(out_dir)?;

        let mut result = VisionArtifacts::default();

        if self.config.enable_depth {
            let estimator = self.backend.depth_estimator(&self.config.depth_model)?;
            let map = estimator.estimate(&bytes)?;
            let path = out_dir.join(artifacts::DEPTH_FILE);
            artifacts::write_depth_png(&map, &path)?;
            result.depth_path = Some(path);
        }

        if self.config.enable_segmentation {
            let segmenter = self.backend.segmenter(&self.config.segmentation_model)?;
            let map = segmenter.segment(&bytes)?;
            let path = out_dir.join(artifacts::SEGMENTATION_FILE);
            artifacts::write_label_png(&map, &path)?;
            let meta_path = out_dir.join(artifacts::SEGMENTATION_META_FILE);
            artifacts::SegmentationMeta::from_labels(&self.config.segmentation_model, &map)
                .write(&meta_path)?;
            result.segmentation_path = Some(path);
            result.segmentation_meta_path = Some(meta_path);
        }

        Ok(result)
    }

    /// Stage-boundary entry point: never fails.
    ///
    /// No image means "design from an empty layout" and yields empty
    /// features without touching the disk; any error does the same.
    pub fn features(&self, image_path: Option<&str>, out_dir: &Path) -> VisionFeatures {
        let Some(image_path) = image_path.map(str::trim).filter(|p| !p.is_empty()) else {
            info!("no reference photo; skipping vision preprocessing");
            return VisionFeatures::empty();
        };

        match self.preprocess(Path::new(image_path), out_dir) {
            Ok(artifacts) => artifacts.into_features(),
            Err(e) => {
                warn!(error = %e, "vision preprocessing failed; continuing with empty features");
                VisionFeatures::empty()
            }
        }
    }
}
