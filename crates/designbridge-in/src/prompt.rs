//! Requirement analysis prompt.
//!
//! One Handlebars template, rendered with `text_prompt`, `edit_scope` and
//! `initial_image`. Strict mode is on so a missing variable is an error,
//! and HTML escaping is off because the output is sent as plain text.

use designbridge_core::{DesignBridgeError, Result};
use handlebars::Handlebars;
use serde_json::json;

const TEMPLATE_NAME: &str = "requirement_analyzer";

/// Value shown for `initial_image` when the user supplied none
pub const NO_IMAGE: &str = "none";

pub const REQUIREMENT_ANALYZER_TEMPLATE: &str = r##"You are an interior design requirements analyst. Convert the user's request into one complete structured Requirement JSON document.

## User input
Request: {{text_prompt}}
Edit scope: {{edit_scope}} (0.0 = smallest change, 1.0 = full redesign)
Reference photo: {{initial_image}}

## Document sections

1. meta
   - room_type: living_room, bedroom, kitchen, study, ...
   - design_goal: "new_design" (start from an empty layout) or "renovation" (rework an existing room)
   - user_experience_level: "professional" or "general" (default general)

2. space_info (leave empty or estimate when the user gives nothing)
   - estimated_size: {"width": float, "height": float, "depth": float} in metres
   - windows: [{"position": ..., "size": ...}]
   - doors: [{"position": ..., "size": ...}]

3. style_preferences
   - primary_style: e.g. 北歐, 現代, 工業, 簡約, 日式
   - secondary_style: optional mixed style
   - color_palette: e.g. ["white", "#F5F5DC", "灰色"]
   - material_preferences: e.g. ["wood", "marble", "金屬"]
   - style_strength: 0.0 to 1.0 (default 0.7)
   - reference_images: [] unless the user provided some

4. layout_constraints
   - must_keep, must_add, must_remove: furniture or features
   - immutable_regions: e.g. doors, windows, beams
   - functional_zones: e.g. [{"zone": "work_area", "priority": "high"}]

5. edit_scope
   - scope_value: {{edit_scope}}
   - allowed_operations, derived from scope_value:
     below 0.3 -> ["inpaint"]
     0.3 to 0.7 inclusive -> ["layout"] or ["style"]
     above 0.7 -> ["layout", "style"]

6. priority_weights
   - layout_rationality: default 0.4, up to 0.5-0.6 when circulation is stressed
   - style_consistency: default 0.4, higher when style is stressed
   - novelty: default 0.2, higher when the user asks for something new

7. routing hints
   - hint_layout: layout change? (動線, 布局, layout, 空間配置, furniture placement)
   - hint_style: style change? (風格, style, 色彩, 材質, atmosphere)
   - hint_adjuster: local touch-up only? (局部, 微調, single object, or edit scope below 0.3)

## Implicit needs
- "works from home" -> must_add a desk, add a work_area zone, raise layout_rationality
- "has pets" -> scratch-resistant and easy-clean materials
- "not enough storage" -> must_add cabinets and shelving
- "too dark" -> add a lighting_priority zone

## Output
Return only the JSON object, no prose and no Markdown. Example:

{
  "meta": {"room_type": "living_room", "design_goal": "renovation", "user_experience_level": "general"},
  "space_info": {"estimated_size": {"width": 5.0, "height": 3.0, "depth": 4.0}, "windows": [], "doors": []},
  "style_preferences": {"primary_style": "北歐", "secondary_style": null, "color_palette": ["white", "灰色"], "material_preferences": ["wood"], "style_strength": 0.7, "reference_images": []},
  "layout_constraints": {"must_keep": [], "must_add": [], "must_remove": [], "immutable_regions": [], "functional_zones": []},
  "edit_scope": {"scope_value": {{edit_scope}}, "allowed_operations": ["layout", "style"]},
  "priority_weights": {"layout_rationality": 0.4, "style_consistency": 0.4, "novelty": 0.2},
  "hint_layout": true,
  "hint_style": true,
  "hint_adjuster": false
}
"##;

/// Compiled prompt template
pub struct PromptTemplate {
    handlebars: Handlebars<'static>,
}

impl PromptTemplate {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(TEMPLATE_NAME, REQUIREMENT_ANALYZER_TEMPLATE)
            .map_err(|e| DesignBridgeError::Config(format!("prompt template: {}", e)))?;
        Ok(Self { handlebars })
    }

    pub fn render(&self, text_prompt: &str, edit_scope: f64, initial_image: Option<&str>) -> Result<String> {
        let data = json!({
            "text_prompt": text_prompt,
            "edit_scope": edit_scope,
            "initial_image": initial_image.unwrap_or(NO_IMAGE),
        });
        self.handlebars
            .render(TEMPLATE_NAME, &data)
            .map_err(|e| DesignBridgeError::Config(format!("prompt render: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_all_fields() {
        let template = PromptTemplate::new().unwrap();
        let prompt = template
            .render("客廳要 \"北歐\" 風格 & 收納", 0.6, Some("/tmp/room.jpg"))
            .unwrap();
        assert!(prompt.contains("Request: 客廳要 \"北歐\" 風格 & 收納"));
        assert!(prompt.contains("Edit scope: 0.6"));
        assert!(prompt.contains("\"scope_value\": 0.6,"));
        assert!(prompt.contains("Reference photo: /tmp/room.jpg"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_missing_image_placeholder() {
        let template = PromptTemplate::new().unwrap();
        let prompt = template.render("x", 0.2, None).unwrap();
        assert!(prompt.contains("Reference photo: none"));
    }

    #[test]
    fn test_json_example_survives_rendering() {
        let template = PromptTemplate::new().unwrap();
        let prompt = template.render("x", 0.5, None).unwrap();
        assert!(prompt.contains("{\"width\": 5.0, \"height\": 3.0, \"depth\": 4.0}"));
    }
}
