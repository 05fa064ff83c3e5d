//! Execution Context: per-run metadata shared by every stage
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Correlates the stage spans of one run and is echoed in its outcome
    pub trace_id: String,
    pub artifact_root: PathBuf,
}

impl ExecutionContext {
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            artifact_root: artifact_root.into(),
        }
    }

    /// `{artifact_root}/vision/{task_id}`
    pub fn vision_dir(&self, task_id: &str) -> PathBuf {
        self.artifact_root.join("vision").join(task_id)
    }

    /// `{artifact_root}/render/{task_id}.png`
    pub fn render_path(&self, task_id: &str) -> PathBuf {
        self.artifact_root
            .join("render")
            .join(format!("{}.png", task_id))
    }
}
