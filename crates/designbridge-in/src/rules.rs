//! Rule-based requirement derivation.
//!
//! Keyword tables are matched against the normalized prompt; the first
//! entry that matches wins. This path has no external dependency and is
//! the interpreter's last resort.

use designbridge_core::data_model::{
    DesignGoal, EditScope, LayoutConstraints, Operation, PriorityWeights, RequirementMeta,
    RoomSize, ScopeBand, SpaceInfo, StructuredRequirement, StylePreferences,
};
use lazy_static::lazy_static;

use crate::normalizer::normalize;

pub const DEFAULT_ROOM_TYPE: &str = "living_room";
pub const DEFAULT_STYLE: &str = "現代";

lazy_static! {
    /// (keyword, room type); either the keyword or the room type itself may appear
    static ref ROOM_TYPES: Vec<(&'static str, &'static str)> = vec![
        ("客廳", "living_room"),
        ("臥室", "bedroom"),
        ("書房", "study"),
        ("廚房", "kitchen"),
    ];

    static ref STYLES: Vec<&'static str> = vec![
        "北歐", "現代", "工業", "簡約", "minimal", "modern", "scandinavian",
    ];

    static ref LAYOUT_KEYWORDS: Vec<&'static str> = vec!["動線", "布局", "layout", "空間配置"];

    static ref STYLE_KEYWORDS: Vec<&'static str> = vec!["風格", "style", "色彩", "材質"];

    static ref ADJUSTER_KEYWORDS: Vec<&'static str> = vec!["局部", "微調", "單一"];
}

/// Routing hints detected in a prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    pub layout: bool,
    pub style: bool,
    pub adjuster: bool,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

pub fn derive_room_type(normalized: &str) -> &'static str {
    ROOM_TYPES
        .iter()
        .find(|(keyword, room)| normalized.contains(keyword) || normalized.contains(room))
        .map(|(_, room)| *room)
        .unwrap_or(DEFAULT_ROOM_TYPE)
}

pub fn derive_primary_style(normalized: &str) -> &'static str {
    STYLES
        .iter()
        .find(|style| normalized.contains(*style))
        .copied()
        .unwrap_or(DEFAULT_STYLE)
}

pub fn detect_hints(normalized: &str, scope_value: f64) -> Hints {
    Hints {
        layout: contains_any(normalized, &LAYOUT_KEYWORDS),
        style: contains_any(normalized, &STYLE_KEYWORDS),
        adjuster: contains_any(normalized, &ADJUSTER_KEYWORDS)
            || ScopeBand::of(scope_value) == ScopeBand::Local,
    }
}

/// Allowed operations by priority: scope band first, then hints.
///
/// Total over every scope value and hint combination; never empty.
pub fn derive_allowed_operations(scope_value: f64, hint_layout: bool, hint_style: bool) -> Vec<Operation> {
    match (ScopeBand::of(scope_value), hint_layout, hint_style) {
        (ScopeBand::Local, _, _) => vec![Operation::Inpaint],
        (ScopeBand::Broad, _, _) => vec![Operation::Layout, Operation::Style],
        (ScopeBand::Moderate, true, false) => vec![Operation::Layout],
        (ScopeBand::Moderate, false, true) => vec![Operation::Style],
        (ScopeBand::Moderate, _, _) => vec![Operation::Layout, Operation::Style],
    }
}

/// Build a complete requirement document from keywords alone.
///
/// Weights and room dimensions are always the static defaults.
pub fn rule_based_requirement(text_prompt: &str, scope_value: f64) -> StructuredRequirement {
    let text = normalize(text_prompt);
    let hints = detect_hints(&text, scope_value);

    StructuredRequirement {
        meta: RequirementMeta {
            room_type: derive_room_type(&text).to_string(),
            design_goal: DesignGoal::Renovation,
            user_experience_level: Some("general".to_string()),
        },
        space_info: SpaceInfo {
            estimated_size: Some(RoomSize::default()),
            windows: Vec::new(),
            doors: Vec::new(),
        },
        style_preferences: StylePreferences {
            primary_style: derive_primary_style(&text).to_string(),
            secondary_style: None,
            color_palette: Vec::new(),
            material_preferences: Vec::new(),
            style_strength: 0.7,
            reference_images: Vec::new(),
        },
        layout_constraints: LayoutConstraints::default(),
        edit_scope: EditScope {
            scope_value,
            allowed_operations: derive_allowed_operations(scope_value, hints.layout, hints.style),
        },
        priority_weights: PriorityWeights::default(),
        hint_layout: hints.layout,
        hint_style: hints.style,
        hint_adjuster: hints.adjuster,
    }
}
