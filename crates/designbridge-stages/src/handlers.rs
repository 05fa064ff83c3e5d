//! Terminal handlers. Layout and style algorithms are not implemented;
//! each handler records what it would work on and, when rendering is
//! enabled, produces an image through the render chain.

use std::sync::Arc;

use designbridge_core::{ExecutionContext, RoutingDecision, Stage, StateUpdate, WorkflowState};
use designbridge_render::RenderChain;
use serde_json::{json, Value};
use tracing::info;

use crate::UNASSIGNED_TASK;

pub const LAYOUT_HANDLER: &str = "layout_handler";
pub const STYLE_HANDLER: &str = "style_handler";
pub const ADJUSTER_HANDLER: &str = "adjuster_handler";
pub const LAYOUT_AND_STYLE_HANDLER: &str = "layout_and_style_handler";

pub const PLACEHOLDER_STATUS: &str = "placeholder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Layout,
    Style,
    Adjuster,
    LayoutAndStyle,
}

impl Handler {
    pub const ALL: [Handler; 4] = [
        Handler::Layout,
        Handler::Style,
        Handler::Adjuster,
        Handler::LayoutAndStyle,
    ];

    pub fn for_decision(decision: RoutingDecision) -> Self {
        match decision {
            RoutingDecision::Layout => Handler::Layout,
            RoutingDecision::Style => Handler::Style,
            RoutingDecision::DesignAdjuster => Handler::Adjuster,
            RoutingDecision::LayoutAndStyle => Handler::LayoutAndStyle,
        }
    }

    pub fn node_id(&self) -> &'static str {
        match self {
            Handler::Layout => LAYOUT_HANDLER,
            Handler::Style => STYLE_HANDLER,
            Handler::Adjuster => ADJUSTER_HANDLER,
            Handler::LayoutAndStyle => LAYOUT_AND_STYLE_HANDLER,
        }
    }

    pub fn focus(&self) -> &'static str {
        match self {
            Handler::Layout => "furniture layout and circulation",
            Handler::Style => "materials, colors and decor",
            Handler::Adjuster => "local inpainting edits",
            Handler::LayoutAndStyle => "joint layout and style redesign",
        }
    }
}

pub struct HandlerStage {
    handler: Handler,
    render: Option<Arc<RenderChain>>,
}

impl HandlerStage {
    pub fn new(handler: Handler, render: Option<Arc<RenderChain>>) -> Self {
        Self { handler, render }
    }

    fn output(&self, state: &WorkflowState) -> Value {
        let mode = state
            .task_plan
            .as_ref()
            .map(|plan| json!(plan.generation_mode))
            .unwrap_or(Value::Null);
        let allowed = state
            .structured_requirement
            .as_ref()
            .map(|r| json!(r.edit_scope.allowed_operations))
            .unwrap_or_else(|| json!([]));

        json!({
            "status": PLACEHOLDER_STATUS,
            "focus": self.handler.focus(),
            "generation_mode": mode,
            "allowed_operations": allowed,
        })
    }
}

impl Stage for HandlerStage {
    fn id(&self) -> &'static str {
        self.handler.node_id()
    }

    fn deterministic(&self) -> bool {
        self.render.is_none()
    }

    fn run(&self, state: &WorkflowState, ctx: &ExecutionContext) -> StateUpdate {
        let mut update = StateUpdate::new().with_output(self.handler.node_id(), self.output(state));

        if let Some(chain) = &self.render {
            let task_id = state.task_id().unwrap_or(UNASSIGNED_TASK);
            let result = chain.render(
                state.structured_requirement.as_ref(),
                state.vision_features.as_ref(),
                &ctx.render_path(task_id),
            );
            info!(
                handler = self.handler.node_id(),
                backend = result.backend().unwrap_or("-"),
                "handler rendered"
            );
            if result.backend().is_some() {
                update.generated_image = Some(result.generated_image_path.clone());
            }
            update.render_result = Some(result);
        }
        update
    }
}
