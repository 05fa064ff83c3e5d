//! Data Model: user input, Structured Requirement, vision features,
//! routing decision, task plan, render result, stage trace
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Scope values below this are local adjustments (`[0, 0.3)`).
pub const LOCAL_SCOPE_LIMIT: f64 = 0.3;
/// Scope values above this are full redesigns (`(0.7, 1]`).
pub const BROAD_SCOPE_LIMIT: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub text_prompt: String,
    /// 0.0 = smallest change, 1.0 = full redesign
    pub edit_scope: f64,
    /// Reference photo; absent means "design from an empty layout"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_image: Option<String>,
}

/// Placeholders some callers send instead of leaving the image empty
const NO_IMAGE_MARKERS: [&str; 2] = ["無", "none"];

impl UserInput {
    pub fn new(text_prompt: impl Into<String>, edit_scope: f64) -> Self {
        Self {
            text_prompt: text_prompt.into(),
            edit_scope,
            initial_image: None,
        }
    }

    pub fn with_image(mut self, path: impl Into<String>) -> Self {
        self.initial_image = Some(path.into());
        self
    }

    /// The reference photo path, ignoring blank values and the markers some
    /// callers send instead of leaving the field empty.
    pub fn image_path(&self) -> Option<&str> {
        self.initial_image
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && !NO_IMAGE_MARKERS.iter().any(|m| p.eq_ignore_ascii_case(m)))
    }
}

/// Which interval of the edit scope a value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeBand {
    /// `[0, 0.3)`
    Local,
    /// `[0.3, 0.7]`
    Moderate,
    /// `(0.7, 1]`
    Broad,
}

impl ScopeBand {
    pub fn of(scope_value: f64) -> Self {
        if scope_value < LOCAL_SCOPE_LIMIT {
            ScopeBand::Local
        } else if scope_value > BROAD_SCOPE_LIMIT {
            ScopeBand::Broad
        } else {
            ScopeBand::Moderate
        }
    }
}

// ========== Structured Requirement ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignGoal {
    NewDesign,
    Renovation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementMeta {
    pub room_type: String,
    pub design_goal: DesignGoal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_experience_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomSize {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Default for RoomSize {
    fn default() -> Self {
        Self {
            width: 5.0,
            height: 3.0,
            depth: 4.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_size: Option<RoomSize>,
    #[serde(default)]
    pub windows: Vec<Value>,
    #[serde(default)]
    pub doors: Vec<Value>,
}

fn default_style_strength() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreferences {
    pub primary_style: String,
    #[serde(default)]
    pub secondary_style: Option<String>,
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub material_preferences: Vec<String>,
    #[serde(default = "default_style_strength")]
    pub style_strength: f64,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutConstraints {
    #[serde(default)]
    pub must_keep: Vec<String>,
    #[serde(default)]
    pub must_add: Vec<String>,
    #[serde(default)]
    pub must_remove: Vec<String>,
    #[serde(default)]
    pub immutable_regions: Vec<Value>,
    #[serde(default)]
    pub functional_zones: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Inpaint,
    Layout,
    Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditScope {
    pub scope_value: f64,
    /// Empty when a service response omitted it; the interpreter derives it.
    #[serde(default)]
    pub allowed_operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub layout_rationality: f64,
    pub style_consistency: f64,
    pub novelty: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            layout_rationality: 0.4,
            style_consistency: 0.4,
            novelty: 0.2,
        }
    }
}

impl PriorityWeights {
    /// Weight names ordered from most to least important; ties keep declaration order.
    pub fn ranked(&self) -> Vec<&'static str> {
        let mut named = [
            ("layout_rationality", self.layout_rationality),
            ("style_consistency", self.style_consistency),
            ("novelty", self.novelty),
        ];
        named.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        named.iter().map(|(name, _)| *name).collect()
    }
}

/// Canonical output of the Requirement Interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRequirement {
    pub meta: RequirementMeta,
    #[serde(default)]
    pub space_info: SpaceInfo,
    pub style_preferences: StylePreferences,
    #[serde(default)]
    pub layout_constraints: LayoutConstraints,
    pub edit_scope: EditScope,
    #[serde(default)]
    pub priority_weights: PriorityWeights,
    #[serde(default)]
    pub hint_layout: bool,
    #[serde(default)]
    pub hint_style: bool,
    #[serde(default)]
    pub hint_adjuster: bool,
}

impl StructuredRequirement {
    pub fn scope_value(&self) -> f64 {
        self.edit_scope.scope_value
    }
}

// ========== Vision ==========

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_meta: Option<String>,
    #[serde(default)]
    pub geometry_constraints: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_objects: Option<Vec<Value>>,
}

impl VisionFeatures {
    /// Features for a run without a usable reference photo.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ========== Routing / Task plan ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    Layout,
    Style,
    DesignAdjuster,
    LayoutAndStyle,
}

impl RoutingDecision {
    pub const ALL: [RoutingDecision; 4] = [
        RoutingDecision::Layout,
        RoutingDecision::Style,
        RoutingDecision::DesignAdjuster,
        RoutingDecision::LayoutAndStyle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::Layout => "layout",
            RoutingDecision::Style => "style",
            RoutingDecision::DesignAdjuster => "design_adjuster",
            RoutingDecision::LayoutAndStyle => "layout_and_style",
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    LayoutAndStyle,
    StyleOnly,
    LayoutOnly,
    Inpaint,
}

/// Design Director output: which specialists handle the request and under which constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub assigned_agents: Vec<String>,
    pub generation_mode: GenerationMode,
    pub constraints_summary: Map<String, Value>,
    #[serde(default)]
    pub priority_order: Vec<String>,
}

// ========== Render ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub generated_image_path: String,
    pub generation_params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlnet_inputs: Option<BTreeMap<String, String>>,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl RenderResult {
    pub fn backend(&self) -> Option<&str> {
        self.generation_params.get("backend").and_then(Value::as_str)
    }
}

// ========== Run trace ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrace {
    pub id: String,
    pub in_hash: String,
    pub out_hash: String,
    pub deterministic: bool,
    pub latency_ms: u64,
}
