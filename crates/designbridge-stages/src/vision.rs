use designbridge_core::{ExecutionContext, Stage, StateUpdate, WorkflowState};
use designbridge_vision::VisionAdapter;

use crate::{UNASSIGNED_TASK, VISION_PREPROCESSING};

/// Depth and segmentation artifacts for the reference photo, if one was given.
pub struct VisionStage {
    adapter: VisionAdapter,
}

impl VisionStage {
    pub fn new(adapter: VisionAdapter) -> Self {
        Self { adapter }
    }
}

impl Stage for VisionStage {
    fn id(&self) -> &'static str {
        VISION_PREPROCESSING
    }

    fn deterministic(&self) -> bool {
        false
    }

    fn run(&self, state: &WorkflowState, ctx: &ExecutionContext) -> StateUpdate {
        let task_id = state.task_id().unwrap_or(UNASSIGNED_TASK);
        let image = state.user_input.as_ref().and_then(|input| input.image_path());
        let features = self.adapter.features(image, &ctx.vision_dir(task_id));

        StateUpdate {
            vision_features: Some(features),
            ..StateUpdate::default()
        }
    }
}
