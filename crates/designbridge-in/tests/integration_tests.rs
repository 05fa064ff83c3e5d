//! Interpreter behaviour on realistic prompts.
//!
//! The rule path is exercised directly; the service path uses an
//! in-process text service so no network is touched.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use designbridge_core::data_model::Operation;
use designbridge_core::{DesignBridgeError, Result, UserInput};
use designbridge_in::{ImagePart, RequirementInterpreter, TextService, SOURCE_RULES, SOURCE_SERVICE};

// =============================================================================
// Rule path
// =============================================================================

#[test]
fn test_circulation_complaint_is_a_layout_request() {
    let result = RequirementInterpreter::rules_only()
        .interpret(&UserInput::new("客廳動線不順暢，希望重新規劃布局", 0.6));
    let req = result.requirement;

    assert_eq!(result.source, SOURCE_RULES);
    assert_eq!(req.meta.room_type, "living_room");
    assert!(req.hint_layout);
    assert!(!req.hint_style);
    assert!(!req.hint_adjuster);
    assert_eq!(req.edit_scope.allowed_operations, vec![Operation::Layout]);
}

#[test]
fn test_small_scope_is_an_adjustment() {
    let req = RequirementInterpreter::rules_only()
        .interpret(&UserInput::new("只想調整沙發位置和顏色", 0.2))
        .requirement;

    assert!(req.hint_adjuster);
    assert_eq!(req.edit_scope.allowed_operations, vec![Operation::Inpaint]);
}

#[test]
fn test_empty_prompt_uses_defaults() {
    let req = RequirementInterpreter::rules_only()
        .interpret(&UserInput::new("", 0.6))
        .requirement;

    assert_eq!(req.meta.room_type, "living_room");
    assert_eq!(req.style_preferences.primary_style, "現代");
    assert!(!req.hint_layout && !req.hint_style && !req.hint_adjuster);
    assert_eq!(
        req.edit_scope.allowed_operations,
        vec![Operation::Layout, Operation::Style]
    );
}

#[test]
fn test_broad_scope_allows_everything() {
    let req = RequirementInterpreter::rules_only()
        .interpret(&UserInput::new("北歐風格的臥室", 0.9))
        .requirement;

    assert_eq!(req.meta.room_type, "bedroom");
    assert_eq!(req.style_preferences.primary_style, "北歐");
    assert!(req.hint_style);
    assert_eq!(
        req.edit_scope.allowed_operations,
        vec![Operation::Layout, Operation::Style]
    );
}

// =============================================================================
// Service path
// =============================================================================

#[derive(Default)]
struct Recording {
    fail_upload: bool,
    images: Mutex<Vec<Option<ImagePart>>>,
}

impl TextService for Recording {
    fn upload_image(&self, _path: &Path) -> Result<ImagePart> {
        if self.fail_upload {
            return Err(DesignBridgeError::Transport("upload disabled".into()));
        }
        Ok(ImagePart::Uploaded {
            uri: "files/abc".into(),
            mime_type: "image/png".into(),
        })
    }

    fn generate(&self, _prompt: &str, image: Option<&ImagePart>) -> Result<String> {
        self.images.lock().unwrap().push(image.cloned());
        Ok(r#"{
            "meta": {"room_type": "kitchen", "design_goal": "renovation"},
            "style_preferences": {"primary_style": "工業"},
            "edit_scope": {"scope_value": 0.8, "allowed_operations": ["layout", "style"]},
            "hint_layout": true,
            "hint_style": true
        }"#
        .to_string())
    }
}

fn photo() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
    file
}

#[test]
fn test_uploaded_photo_is_attached() {
    let file = photo();
    let service = Arc::new(Recording::default());
    let interpreter = RequirementInterpreter::new(service.clone()).unwrap();

    let input = UserInput::new("廚房工業風", 0.8).with_image(file.path().to_str().unwrap());
    let result = interpreter.interpret(&input);

    assert_eq!(result.source, SOURCE_SERVICE);
    assert_eq!(result.requirement.meta.room_type, "kitchen");
    let images = service.images.lock().unwrap();
    assert!(matches!(images[0], Some(ImagePart::Uploaded { .. })));
}

#[test]
fn test_failed_upload_inlines_the_photo() {
    let file = photo();
    let service = Arc::new(Recording {
        fail_upload: true,
        ..Recording::default()
    });
    let interpreter = RequirementInterpreter::new(service.clone()).unwrap();

    let input = UserInput::new("廚房", 0.8).with_image(file.path().to_str().unwrap());
    let result = interpreter.interpret(&input);

    assert_eq!(result.source, SOURCE_SERVICE);
    let images = service.images.lock().unwrap();
    match &images[0] {
        Some(ImagePart::Inline { mime_type, data }) => {
            assert_eq!(mime_type, "image/png");
            assert!(!data.is_empty());
        }
        other => panic!("expected inline image, got {:?}", other),
    }
}

#[test]
fn test_missing_photo_is_not_attached() {
    let service = Arc::new(Recording::default());
    let interpreter = RequirementInterpreter::new(service.clone()).unwrap();

    let input = UserInput::new("廚房", 0.8).with_image("/no/such/photo.png");
    interpreter.interpret(&input);

    assert_eq!(service.images.lock().unwrap()[0], None);
}
