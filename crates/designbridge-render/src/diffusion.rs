//! Tier 2: local SDXL, optionally guided by the depth artifact.
//!
//! Pipelines are served by an AUTOMATIC1111-compatible server. Loading a
//! variant selects the configured checkpoint (and depth ControlNet) from the
//! models the server lists; the loaded handle is cached per process by model
//! id, so the lookup runs once.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use designbridge_core::config::{DeviceSetting, RenderConfig};
use designbridge_core::{DesignBridgeError, ResourceCache, Result, Strategy};
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::tier::{save_as_png, RenderJob, TierOutput};

pub const BACKEND: &str = "sdxl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    pub fn resolve(setting: DeviceSetting) -> Self {
        match setting {
            DeviceSetting::Cuda => Device::Cuda,
            DeviceSetting::Cpu => Device::Cpu,
            DeviceSetting::Auto if accelerator_present() => Device::Cuda,
            DeviceSetting::Auto => Device::Cpu,
        }
    }
}

fn accelerator_present() -> bool {
    if Path::new("/dev/nvidia0").exists() {
        return true;
    }
    std::env::var("NVIDIA_VISIBLE_DEVICES")
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && v != "void" && v != "none"
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineVariant {
    Base,
    DepthControl,
}

/// Structure guidance for one generation
#[derive(Debug, Clone)]
pub struct ControlImage {
    /// PNG bytes, already resized to the pipeline's square resolution
    pub png: Vec<u8>,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub struct DiffusionJob {
    pub prompt: String,
    pub steps: u32,
    pub control: Option<ControlImage>,
}

pub trait DiffusionPipeline: Send + Sync {
    /// Encoded image bytes.
    fn generate(&self, job: &DiffusionJob) -> Result<Vec<u8>>;

    /// Checkpoint actually loaded, when the backend reports one.
    fn checkpoint(&self) -> Option<&str> {
        None
    }

    /// Structure-guidance model actually loaded.
    fn controlnet_model(&self) -> Option<&str> {
        None
    }
}

pub trait PipelineLoader: Send + Sync {
    fn load(&self, variant: PipelineVariant) -> Result<Box<dyn DiffusionPipeline>>;
}

/// Resize the depth map to a `side`×`side` RGB guidance image.
pub fn prepare_control_image(path: &Path, side: u32) -> Result<Vec<u8>> {
    let depth = image::open(path)
        .map_err(|e| DesignBridgeError::Inference(format!("depth image {}: {}", path.display(), e)))?;
    let resized = depth.to_rgb8();
    let resized = image::imageops::resize(&resized, side, side, FilterType::Lanczos3);
    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DesignBridgeError::Inference(format!("encode guidance image: {}", e)))?;
    Ok(png)
}

pub struct SdxlTier {
    loader: Arc<dyn PipelineLoader>,
    pipelines: ResourceCache<Box<dyn DiffusionPipeline>>,
    config: RenderConfig,
    device: Device,
}

impl SdxlTier {
    pub fn new(loader: Arc<dyn PipelineLoader>, config: RenderConfig, device: Device) -> Self {
        Self {
            loader,
            pipelines: ResourceCache::new(),
            config,
            device,
        }
    }

    /// Configured step count, capped when running without an accelerator.
    pub fn steps(&self) -> u32 {
        match self.device {
            Device::Cpu => self.config.sdxl_steps.min(self.config.cpu_step_cap),
            Device::Cuda => self.config.sdxl_steps,
        }
    }

    fn cache_key(&self, variant: PipelineVariant) -> String {
        match variant {
            PipelineVariant::Base => self.config.sdxl_model.clone(),
            PipelineVariant::DepthControl => format!(
                "{}+{}",
                self.config.sdxl_model, self.config.controlnet_depth_model
            ),
        }
    }

    pub fn is_loaded(&self, variant: PipelineVariant) -> bool {
        self.pipelines.is_loaded(&self.cache_key(variant))
    }
}

impl Strategy<RenderJob, TierOutput> for SdxlTier {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn attempt(&self, job: &RenderJob) -> Result<TierOutput> {
        let guidance = match &job.depth_image {
            Some(path) if self.config.enable_controlnet => Some(path),
            _ => None,
        };
        let variant = if guidance.is_some() {
            PipelineVariant::DepthControl
        } else {
            PipelineVariant::Base
        };

        let control = match guidance {
            Some(path) => Some(ControlImage {
                png: prepare_control_image(path, self.config.control_resolution)?,
                scale: self.config.controlnet_conditioning_scale,
            }),
            None => None,
        };

        let pipeline = self
            .pipelines
            .get_or_try_init(&self.cache_key(variant), || self.loader.load(variant))?;

        let steps = self.steps();
        info!(?variant, steps, device = self.device.as_str(), "running local diffusion");
        let bytes = pipeline.generate(&DiffusionJob {
            prompt: job.prompt.clone(),
            steps,
            control,
        })?;
        save_as_png(&bytes, &job.out_path)?;

        let model = pipeline.checkpoint().unwrap_or(self.config.sdxl_model.as_str());
        let mut output = TierOutput::default()
            .with("model", model)
            .with("steps", steps)
            .with("device", self.device.as_str());
        if let Some(path) = guidance {
            output = output
                .with("controlnet", "depth")
                .with(
                    "controlnet_model",
                    pipeline
                        .controlnet_model()
                        .unwrap_or(self.config.controlnet_depth_model.as_str()),
                )
                .with("controlnet_scale", self.config.controlnet_conditioning_scale)
                .with("controlnet_image", path.to_string_lossy().into_owned());
        }
        Ok(output)
    }
}

// ============================================================================
// AUTOMATIC1111-compatible server
// ============================================================================

pub struct A1111Server {
    http: HttpClient,
    endpoint: String,
    resolution: u32,
    checkpoint: String,
    controlnet_model: String,
}

impl A1111Server {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DesignBridgeError::Transport(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            resolution: config.control_resolution,
            checkpoint: config.sdxl_model.clone(),
            controlnet_model: config.controlnet_depth_model.clone(),
        })
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Inference(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("{}: {}", url, e)))
    }
}

/// Lowercased alphanumerics of the last path segment, so
/// `stabilityai/SDXL-Base_1.0` and `sdxl_base_1.0` compare equal.
fn model_key(name: &str) -> String {
    name.rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Title of the server checkpoint matching `wanted`, by title, model name or
/// file name. Titles carry a trailing ` [hash]`, so a prefix match counts.
pub fn select_checkpoint(checkpoints: &Value, wanted: &str) -> Result<String> {
    let key = model_key(wanted);
    let entries = checkpoints.as_array().map(Vec::as_slice).unwrap_or_default();
    if entries.is_empty() {
        return Err(DesignBridgeError::Inference("no checkpoints available".into()));
    }
    entries
        .iter()
        .find(|entry| {
            let title = entry["title"].as_str().unwrap_or_default();
            let stem = entry["filename"]
                .as_str()
                .and_then(|f| Path::new(f).file_stem())
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            title == wanted
                || model_key(title.split(" [").next().unwrap_or(title)) == key
                || model_key(entry["model_name"].as_str().unwrap_or_default()) == key
                || model_key(stem) == key
        })
        .and_then(|entry| entry["title"].as_str().or(entry["model_name"].as_str()))
        .map(str::to_string)
        .ok_or_else(|| DesignBridgeError::Inference(format!("checkpoint {} not available", wanted)))
}

/// The ControlNet entry matching `wanted`, else the first depth model listed.
pub fn select_controlnet(models: &Value, wanted: &str) -> Result<String> {
    let key = model_key(wanted);
    let names: Vec<&str> = models["model_list"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    names
        .iter()
        .find(|name| model_key(name.split(" [").next().unwrap_or(**name)) == key)
        .or_else(|| {
            names
                .iter()
                .find(|name| name.to_ascii_lowercase().contains("depth"))
        })
        .map(|name| name.to_string())
        .ok_or_else(|| DesignBridgeError::Inference("no depth ControlNet model available".into()))
}

impl PipelineLoader for A1111Server {
    fn load(&self, variant: PipelineVariant) -> Result<Box<dyn DiffusionPipeline>> {
        let checkpoint = select_checkpoint(&self.get_json("/sdapi/v1/sd-models")?, &self.checkpoint)?;

        let controlnet_model = match variant {
            PipelineVariant::Base => None,
            PipelineVariant::DepthControl => Some(select_controlnet(
                &self.get_json("/controlnet/model_list")?,
                &self.controlnet_model,
            )?),
        };
        debug!(?variant, %checkpoint, ?controlnet_model, "diffusion pipeline ready");

        Ok(Box::new(A1111Pipeline {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            resolution: self.resolution,
            checkpoint,
            controlnet_model,
        }))
    }
}

struct A1111Pipeline {
    http: HttpClient,
    endpoint: String,
    resolution: u32,
    checkpoint: String,
    controlnet_model: Option<String>,
}

impl A1111Pipeline {
    fn payload(&self, job: &DiffusionJob) -> Value {
        let mut payload = json!({
            "prompt": job.prompt,
            "steps": job.steps,
            "width": self.resolution,
            "height": self.resolution,
            "batch_size": 1,
            "override_settings": { "sd_model_checkpoint": self.checkpoint },
        });
        if let (Some(control), Some(model)) = (&job.control, &self.controlnet_model) {
            payload["alwayson_scripts"] = json!({
                "controlnet": {
                    "args": [{
                        "input_image": BASE64.encode(&control.png),
                        "module": "none",
                        "model": model,
                        "weight": control.scale,
                    }]
                }
            });
        }
        payload
    }
}

impl DiffusionPipeline for A1111Pipeline {
    fn generate(&self, job: &DiffusionJob) -> Result<Vec<u8>> {
        let url = format!("{}/sdapi/v1/txt2img", self.endpoint);
        let response = self
            .http
            .post(&url)
            .json(&self.payload(job))
            .send()
            .map_err(|e| DesignBridgeError::Transport(format!("txt2img: {}", e)))?;
        if !response.status().is_success() {
            return Err(DesignBridgeError::Inference(format!(
                "txt2img returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("txt2img body: {}", e)))?;
        let encoded = body["images"][0]
            .as_str()
            .ok_or_else(|| DesignBridgeError::MalformedResponse("txt2img returned no images".into()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| DesignBridgeError::MalformedResponse(format!("txt2img image: {}", e)))
    }

    fn checkpoint(&self) -> Option<&str> {
        Some(&self.checkpoint)
    }

    fn controlnet_model(&self) -> Option<&str> {
        self.controlnet_model.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_device_wins() {
        assert_eq!(Device::resolve(DeviceSetting::Cpu), Device::Cpu);
        assert_eq!(Device::resolve(DeviceSetting::Cuda), Device::Cuda);
    }

    #[test]
    fn test_control_image_is_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.png");
        image::GrayImage::from_pixel(40, 30, image::Luma([90])).save(&path).unwrap();

        let png = prepare_control_image(&path, 64).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_payload_carries_controlnet_args() {
        let pipeline = A1111Pipeline {
            http: HttpClient::new(),
            endpoint: "http://127.0.0.1:7860".into(),
            resolution: 1024,
            checkpoint: "sd_xl_base_1.0.safetensors [31e35c80fc]".into(),
            controlnet_model: Some("diffusers_xl_depth_full".into()),
        };
        let job = DiffusionJob {
            prompt: "a room".into(),
            steps: 20,
            control: Some(ControlImage {
                png: vec![1, 2, 3],
                scale: 0.5,
            }),
        };
        let payload = pipeline.payload(&job);
        let args = &payload["alwayson_scripts"]["controlnet"]["args"][0];
        assert_eq!(args["model"], "diffusers_xl_depth_full");
        assert_eq!(args["module"], "none");
        assert_eq!(args["weight"], 0.5);
        assert_eq!(args["input_image"], "AQID");
        assert_eq!(payload["steps"], 20);
        assert_eq!(
            payload["override_settings"]["sd_model_checkpoint"],
            "sd_xl_base_1.0.safetensors [31e35c80fc]"
        );
        assert_eq!(pipeline.checkpoint(), Some("sd_xl_base_1.0.safetensors [31e35c80fc]"));
        assert_eq!(DiffusionPipeline::controlnet_model(&pipeline), Some("diffusers_xl_depth_full"));
    }

    #[test]
    fn test_base_payload_has_no_scripts() {
        let pipeline = A1111Pipeline {
            http: HttpClient::new(),
            endpoint: String::new(),
            resolution: 1024,
            checkpoint: "sd_xl_base_1.0".into(),
            controlnet_model: None,
        };
        let payload = pipeline.payload(&DiffusionJob {
            prompt: "a room".into(),
            steps: 30,
            control: None,
        });
        assert!(payload.get("alwayson_scripts").is_none());
    }

    #[test]
    fn test_checkpoint_is_selected_by_configured_model() {
        let checkpoints = json!([
            {"title": "v1-5-pruned.safetensors [6ce0161689]", "model_name": "v1-5-pruned", "filename": "/models/v1-5-pruned.safetensors"},
            {"title": "sd_xl_base_1.0.safetensors [31e35c80fc]", "model_name": "sd_xl_base_1.0", "filename": "/models/sd_xl_base_1.0.safetensors"},
        ]);
        assert_eq!(
            select_checkpoint(&checkpoints, "sd_xl_base_1.0").unwrap(),
            "sd_xl_base_1.0.safetensors [31e35c80fc]"
        );
        assert_eq!(
            select_checkpoint(&checkpoints, "v1-5-pruned.safetensors [6ce0161689]").unwrap(),
            "v1-5-pruned.safetensors [6ce0161689]"
        );
        let missing = select_checkpoint(&checkpoints, "stabilityai/stable-diffusion-xl-base-1.0").unwrap_err();
        assert!(missing.to_string().contains("stable-diffusion-xl-base-1.0"));
        assert!(select_checkpoint(&json!([]), "sd_xl_base_1.0").is_err());
    }

    #[test]
    fn test_controlnet_prefers_configured_model() {
        let models = json!({"model_list": [
            "diffusers_xl_canny_full [2b69fca4]",
            "diffusers_xl_depth_small [ab12cd34]",
            "controlnet-depth-sdxl-1.0 [9f8e7d6c]",
        ]});
        assert_eq!(
            select_controlnet(&models, "diffusers/controlnet-depth-sdxl-1.0").unwrap(),
            "controlnet-depth-sdxl-1.0 [9f8e7d6c]"
        );
        assert_eq!(
            select_controlnet(&models, "someone/other-depth").unwrap(),
            "diffusers_xl_depth_small [ab12cd34]"
        );
        assert!(select_controlnet(&json!({"model_list": ["canny"]}), "x/depth").is_err());
    }
}
