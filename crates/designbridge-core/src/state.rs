//! Shared workflow state and the partial updates stages return.
//!
//! Stages never mutate [`WorkflowState`] directly. Each one returns a
//! [`StateUpdate`] carrying only the fields it produced, and the runner folds
//! it in with [`WorkflowState::merge`]. The merge is shallow and key-wise:
//! fields absent from the update keep their prior value, `task_id` is set at
//! most once, and `intermediate_outputs` only ever gains keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::data_model::{
    RenderResult, RoutingDecision, StructuredRequirement, TaskPlan, UserInput, VisionFeatures,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<UserInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_requirement: Option<StructuredRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_features: Option<VisionFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_plan: Option<TaskPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingDecision>,
    #[serde(default)]
    pub intermediate_outputs: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_result: Option<RenderResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<String>,
}

/// Fields a stage changed. Everything left `None` is untouched by the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_requirement: Option<StructuredRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_features: Option<VisionFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_plan: Option<TaskPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingDecision>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intermediate_outputs: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_result: Option<RenderResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Record one handler output under `key`.
    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.intermediate_outputs.insert(key.into(), value);
        self
    }
}

impl WorkflowState {
    /// Initial state for a run: only the user input is present.
    pub fn from_input(input: UserInput) -> Self {
        Self {
            user_input: Some(input),
            ..Self::default()
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Fold a partial update into the accumulated state.
    pub fn merge(&mut self, update: StateUpdate) {
        let StateUpdate {
            task_id,
            iteration,
            structured_requirement,
            vision_features,
            task_plan,
            routing_decision,
            intermediate_outputs,
            render_result,
            generated_image,
        } = update;

        if let Some(id) = task_id {
            match &self.task_id {
                None => self.task_id = Some(id),
                Some(existing) if *existing != id => {
                    warn!(existing = %existing, ignored = %id, "task_id already set; keeping original");
                }
                Some(_) => {}
            }
        }
        if let Some(iteration) = iteration {
            self.iteration = iteration;
        }
        if structured_requirement.is_some() {
            self.structured_requirement = structured_requirement;
        }
        if vision_features.is_some() {
            self.vision_features = vision_features;
        }
        if task_plan.is_some() {
            self.task_plan = task_plan;
        }
        if routing_decision.is_some() {
            self.routing_decision = routing_decision;
        }
        for (key, value) in intermediate_outputs {
            if self.intermediate_outputs.contains_key(&key) {
                warn!(key = %key, "intermediate output already recorded; keeping first value");
                continue;
            }
            self.intermediate_outputs.insert(key, value);
        }
        if render_result.is_some() {
            self.render_result = render_result;
        }
        if generated_image.is_some() {
            self.generated_image = generated_image;
        }
    }
}
