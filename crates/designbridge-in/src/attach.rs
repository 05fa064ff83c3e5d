//! Reference photo attachment: service upload first, base64 inline second.

use std::path::Path;
use std::sync::Arc;

use designbridge_core::{FallbackChain, Result, Strategy, UserInput};

use crate::gemini::{ImagePart, TextService};

/// The reference photo, when it names an existing file.
pub fn usable_image(input: &UserInput) -> Option<&Path> {
    let path = Path::new(input.image_path()?);
    path.is_file().then_some(path)
}

struct Upload {
    service: Arc<dyn TextService>,
}

impl Strategy<Path, ImagePart> for Upload {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn attempt(&self, path: &Path) -> Result<ImagePart> {
        self.service.upload_image(path)
    }
}

struct Inline;

impl Strategy<Path, ImagePart> for Inline {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn attempt(&self, path: &Path) -> Result<ImagePart> {
        ImagePart::inline_from_file(path)
    }
}

pub fn attachment_chain(service: Arc<dyn TextService>) -> FallbackChain<Path, ImagePart> {
    FallbackChain::new("image_attachment")
        .with(Box::new(Upload { service }))
        .with(Box::new(Inline))
}
