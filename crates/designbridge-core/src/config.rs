use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DesignBridgeError, Result};

/// Main configuration loaded from an optional YAML file and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub vision: VisionConfig,
    pub render: RenderConfig,
    /// Root of the task-keyed artifact tree
    pub artifacts_dir: PathBuf,
}

/// Hosted text/image service settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Absent key is not a load error; dependent stages fall back at call time
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DesignBridgeError::Config(
                    "GEMINI_API_KEY not set; set it in the config file or environment".to_string(),
                )
            })
    }
}

/// Local depth + segmentation preprocessing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisionConfig {
    pub enable_depth: bool,
    pub enable_segmentation: bool,
    pub depth_model: String,
    pub segmentation_model: String,
    /// Inference sidecar serving both models
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enable_depth: true,
            enable_segmentation: true,
            depth_model: "Intel/dpt-hybrid-midas".to_string(),
            segmentation_model: "openmmlab/upernet-convnext-small".to_string(),
            endpoint: "http://127.0.0.1:8600".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSetting {
    Auto,
    Cuda,
    Cpu,
}

impl std::str::FromStr for DeviceSetting {
    type Err = DesignBridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DeviceSetting::Auto),
            "cuda" | "gpu" => Ok(DeviceSetting::Cuda),
            "cpu" => Ok(DeviceSetting::Cpu),
            other => Err(DesignBridgeError::Config(format!("unknown device '{}'", other))),
        }
    }
}

/// Image generation chain
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Terminal handlers render when set
    pub enabled: bool,
    pub imagen_model: String,
    pub enable_sdxl_fallback: bool,
    pub sdxl_model: String,
    pub enable_controlnet: bool,
    pub controlnet_depth_model: String,
    pub controlnet_conditioning_scale: f32,
    pub sdxl_steps: u32,
    /// Step ceiling when no accelerator is present
    pub cpu_step_cap: u32,
    /// Side of the square the depth guidance image is resized to
    pub control_resolution: u32,
    pub device: DeviceSetting,
    /// AUTOMATIC1111-compatible diffusion server
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            imagen_model: "imagen-4.0-generate-001".to_string(),
            enable_sdxl_fallback: true,
            sdxl_model: "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
            enable_controlnet: true,
            controlnet_depth_model: "diffusers/controlnet-depth-sdxl-1.0".to_string(),
            controlnet_conditioning_scale: 0.5,
            sdxl_steps: 30,
            cpu_step_cap: 20,
            control_resolution: 1024,
            device: DeviceSetting::Auto,
            endpoint: "http://127.0.0.1:7860".to_string(),
            timeout_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration: YAML file (explicit path, else `DESIGNBRIDGE_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("DESIGNBRIDGE_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) if !path.exists() => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("no config file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DesignBridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DesignBridgeError::Config(format!("invalid config: {}", e)))
    }

    /// Environment wins over file values. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(dir) = lookup("DESIGNBRIDGE_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("DESIGNBRIDGE_DEVICE") {
            match device.parse() {
                Ok(device) => self.render.device = device,
                Err(e) => warn!(error = %e, "ignoring DESIGNBRIDGE_DEVICE"),
            }
        }
        if let Some(flag) = lookup("DESIGNBRIDGE_ENABLE_SDXL") {
            self.render.enable_sdxl_fallback = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        if let Some(endpoint) = lookup("DESIGNBRIDGE_VISION_ENDPOINT") {
            self.vision.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("DESIGNBRIDGE_DIFFUSION_ENDPOINT") {
            self.render.endpoint = endpoint;
        }
        if self.artifacts_dir.as_os_str().is_empty() {
            self.artifacts_dir = PathBuf::from("artifacts");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
gemini:
  model: gemini-2.0-flash
render:
  sdxl_steps: 40
  device: cpu
"#,
        )
        .unwrap();
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.temperature, 0.3);
        assert_eq!(config.render.sdxl_steps, 40);
        assert_eq!(config.render.device, DeviceSetting::Cpu);
        assert_eq!(config.render.cpu_step_cap, 20);
        assert!(config.vision.enable_depth);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::from_yaml("artifacts_dir: from_file\n").unwrap();
        config.apply_env_overrides(lookup(&[
            ("GEMINI_API_KEY", "k-123"),
            ("DESIGNBRIDGE_ARTIFACTS_DIR", "/tmp/out"),
            ("DESIGNBRIDGE_ENABLE_SDXL", "false"),
            ("DESIGNBRIDGE_DEVICE", "gpu"),
        ]));
        assert_eq!(config.gemini.api_key().unwrap(), "k-123");
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/out"));
        assert!(!config.render.enable_sdxl_fallback);
        assert_eq!(config.render.device, DeviceSetting::Cuda);
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup(&[]));
        let err = config.gemini.api_key().unwrap_err();
        assert!(matches!(err, DesignBridgeError::Config(_)));
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "vision:\n  enable_segmentation: false").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.vision.enable_segmentation);
        assert!(config.vision.enable_depth);
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        assert!(Config::from_yaml("render: [").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config.render.cpu_step_cap, 20);
        assert_eq!(config.gemini.temperature, 0.3);
    }

    #[test]
    fn test_unparsable_file_is_still_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "render: [").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, DesignBridgeError::Config(_)));
    }
}
