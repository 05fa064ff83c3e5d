//! English image prompt built from a requirement document.

use designbridge_core::StructuredRequirement;

const DEFAULT_ROOM: &str = "living_room";
const DEFAULT_STYLE: &str = "modern";
const DEFAULT_COLORS: &str = "neutral tones";
const MAX_COLORS: usize = 3;
const PREVIEW_CHARS: usize = 200;

pub fn build_render_prompt(requirement: Option<&StructuredRequirement>) -> String {
    let room = requirement
        .map(|r| r.meta.room_type.as_str())
        .unwrap_or(DEFAULT_ROOM)
        .replace('_', " ");
    let style = requirement
        .map(|r| r.style_preferences.primary_style.as_str())
        .unwrap_or(DEFAULT_STYLE);
    let colors = requirement
        .map(|r| &r.style_preferences.color_palette[..])
        .filter(|palette| !palette.is_empty())
        .map(|palette| {
            palette
                .iter()
                .take(MAX_COLORS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| DEFAULT_COLORS.to_string());

    format!(
        "Interior design visualization: a {} room, {} style, colors {}. Photorealistic, well-lit, high quality.",
        room, style, colors
    )
}

/// First 200 characters, for logging alongside the result.
pub fn prompt_preview(prompt: &str) -> String {
    prompt.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirement(room: &str, palette: &[&str]) -> StructuredRequirement {
        serde_json::from_value(json!({
            "meta": { "room_type": room, "design_goal": "renovation" },
            "style_preferences": { "primary_style": "北歐", "color_palette": palette },
            "edit_scope": { "scope_value": 0.5 }
        }))
        .unwrap()
    }

    #[test]
    fn test_prompt_uses_first_three_colors() {
        let req = requirement("living_room", &["white", "oak", "grey", "black"]);
        assert_eq!(
            build_render_prompt(Some(&req)),
            "Interior design visualization: a living room room, 北歐 style, colors white, oak, grey. Photorealistic, well-lit, high quality."
        );
    }

    #[test]
    fn test_empty_palette_is_neutral() {
        let req = requirement("bedroom", &[]);
        assert!(build_render_prompt(Some(&req)).contains("colors neutral tones."));
    }

    #[test]
    fn test_missing_requirement_uses_defaults() {
        let prompt = build_render_prompt(None);
        assert!(prompt.contains("a living room room, modern style"));
    }

    #[test]
    fn test_preview_counts_characters() {
        let long = "客".repeat(300);
        assert_eq!(prompt_preview(&long).chars().count(), 200);
        assert_eq!(prompt_preview("short"), "short");
    }
}
