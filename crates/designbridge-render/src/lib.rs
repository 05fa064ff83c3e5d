//! DesignBridge-Render: three-tier image generation
//!
//! `imagen` (hosted) → `sdxl` (local diffusion, depth-guided when a depth
//! artifact exists) → `placeholder`. Every failed tier leaves a
//! `{tier}_error` entry in `generation_params`; the placeholder tier always
//! runs last, so a file is written unless the output path itself is unusable.

pub mod diffusion;
pub mod imagen;
pub mod placeholder;
pub mod prompt;
pub mod tier;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use designbridge_core::config::Config;
use designbridge_core::{
    FallbackChain, RenderResult, Result, Strategy, StructuredRequirement, VisionFeatures,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub use diffusion::{A1111Server, Device, PipelineLoader, SdxlTier};
pub use imagen::{ImageService, ImagenClient, ImagenTier};
pub use placeholder::PlaceholderTier;
pub use tier::{RenderJob, TierOutput};

pub struct RenderChain {
    chain: FallbackChain<RenderJob, TierOutput>,
}

/// Collects generative tiers in order; `build` appends the placeholder.
#[derive(Default)]
pub struct RenderChainBuilder {
    tiers: Vec<Box<dyn Strategy<RenderJob, TierOutput>>>,
}

impl RenderChainBuilder {
    pub fn tier(mut self, tier: impl Strategy<RenderJob, TierOutput> + 'static) -> Self {
        self.tiers.push(Box::new(tier));
        self
    }

    pub fn build(self) -> RenderChain {
        let chain = self
            .tiers
            .into_iter()
            .fold(FallbackChain::new("render"), |chain, tier| chain.with(tier))
            .with(Box::new(PlaceholderTier));
        RenderChain { chain }
    }
}

impl RenderChain {
    pub fn builder() -> RenderChainBuilder {
        RenderChainBuilder::default()
    }

    /// Tiers as configured: Imagen always, SDXL unless disabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let imagen = ImagenClient::new(config.gemini.clone(), config.render.imagen_model.clone())?;
        let mut builder = Self::builder().tier(ImagenTier::new(Arc::new(imagen)));

        if config.render.enable_sdxl_fallback {
            let loader = A1111Server::new(&config.render)?;
            let device = Device::resolve(config.render.device);
            builder = builder.tier(SdxlTier::new(
                Arc::new(loader),
                config.render.clone(),
                device,
            ));
        }
        Ok(builder.build())
    }

    pub fn tiers(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Render one image to `out_path`. Never fails.
    ///
    /// `generation_params.backend` names the tier that wrote the file and is
    /// absent when even the placeholder could not be written.
    pub fn render(
        &self,
        requirement: Option<&StructuredRequirement>,
        vision: Option<&VisionFeatures>,
        out_path: &Path,
    ) -> RenderResult {
        let prompt = prompt::build_render_prompt(requirement);
        let depth = vision.and_then(|v| v.depth.as_deref());
        let job = RenderJob {
            prompt: prompt.clone(),
            depth_image: depth.map(PathBuf::from).filter(|p| p.exists()),
            out_path: out_path.to_path_buf(),
        };

        let outcome = self.chain.run(&job);

        let mut params = Map::new();
        params.insert("prompt_preview".into(), Value::from(prompt::prompt_preview(&prompt)));
        for failure in &outcome.failures {
            params.insert(format!("{}_error", failure.strategy), Value::from(failure.reason.clone()));
        }
        if let Some(output) = outcome.value {
            params.extend(output.params);
        }
        match outcome.winner {
            Some(backend) => {
                params.insert("backend".into(), Value::from(backend));
                info!(backend, path = %out_path.display(), "render finished");
            }
            None => warn!(path = %out_path.display(), "every render tier failed; no image written"),
        }

        RenderResult {
            generated_image_path: out_path.to_string_lossy().into_owned(),
            generation_params: params,
            controlnet_inputs: vision.and_then(controlnet_inputs),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Vision artifacts available for structure guidance, whichever tier ran.
fn controlnet_inputs(vision: &VisionFeatures) -> Option<BTreeMap<String, String>> {
    let mut inputs = BTreeMap::new();
    if let Some(depth) = &vision.depth {
        inputs.insert("depth".to_string(), depth.clone());
    }
    if let Some(segmentation) = &vision.segmentation {
        inputs.insert("segmentation".to_string(), segmentation.clone());
    }
    (!inputs.is_empty()).then_some(inputs)
}
