//! DesignBridge Stages: the workflow's nodes and how they are wired.
//!
//! # Workflow
//!
//! ```text
//! entry → requirement_interpretation → vision_preprocessing → routing
//!                                                               │
//!        ┌──────────────┬───────────────┬───────────────────────┤
//!        ↓              ↓               ↓                       ↓
//! layout_handler  style_handler  adjuster_handler  layout_and_style_handler
//!        └──────────────┴───────────────┴───────────────────────┴──→ exit
//! ```
//!
//! `routing` picks the handler from the routing decision;
//! `layout_and_style_handler` is the default target.
//!
//! # Example
//!
//! ```no_run
//! use designbridge_core::{Config, ExecutionContext, UserInput, WorkflowState};
//! use designbridge_stages::build_workflow;
//!
//! let config = Config::default();
//! let runner = build_workflow(&config).unwrap();
//! let ctx = ExecutionContext::new(&config.artifacts_dir);
//! let input = UserInput::new("客廳動線不順暢，希望重新規劃布局", 0.6);
//! let outcome = runner.invoke(WorkflowState::from_input(input), &ctx).unwrap();
//! println!("{:?}", outcome.state.routing_decision);
//! ```

pub mod handlers;
pub mod requirement;
pub mod routing;
pub mod vision;

use std::sync::Arc;

use designbridge_core::{
    Config, GraphBuilder, Result, RoutingDecision, WorkflowRunner, WorkflowState, ENTRY, EXIT,
};
use designbridge_in::{GeminiClient, RequirementInterpreter};
use designbridge_render::RenderChain;
use designbridge_vision::VisionAdapter;

pub use handlers::{
    Handler, HandlerStage, ADJUSTER_HANDLER, LAYOUT_AND_STYLE_HANDLER, LAYOUT_HANDLER,
    STYLE_HANDLER,
};
pub use requirement::RequirementStage;
pub use routing::{route, task_plan, RoutingStage};
pub use vision::VisionStage;

pub const REQUIREMENT_INTERPRETATION: &str = "requirement_interpretation";
pub const VISION_PREPROCESSING: &str = "vision_preprocessing";
pub const ROUTING: &str = "routing";

/// Artifact key used if a stage runs before a task id was assigned.
pub const UNASSIGNED_TASK: &str = "unassigned";

/// The collaborators the stages call into.
pub struct Components {
    pub interpreter: RequirementInterpreter,
    pub vision: VisionAdapter,
    /// `None` leaves handlers without rendering.
    pub render: Option<RenderChain>,
}

impl Components {
    /// Gemini interpreter, sidecar vision, and the configured render tiers.
    ///
    /// A missing API key is not an error here; the interpreter and the
    /// Imagen tier fall back when they are called.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = GeminiClient::new(config.gemini.clone())?;
        let render = if config.render.enabled {
            Some(RenderChain::from_config(config)?)
        } else {
            None
        };
        Ok(Self {
            interpreter: RequirementInterpreter::new(Arc::new(client))?,
            vision: VisionAdapter::sidecar(config.vision.clone()),
            render,
        })
    }
}

/// Routing key for the conditional edge out of `routing`.
fn routing_key(state: &WorkflowState) -> Option<String> {
    state.routing_decision.map(|d| d.as_str().to_string())
}

pub fn build_workflow(config: &Config) -> Result<WorkflowRunner> {
    build_workflow_with(Components::from_config(config)?)
}

pub fn build_workflow_with(components: Components) -> Result<WorkflowRunner> {
    let render = components.render.map(Arc::new);

    let mut builder = GraphBuilder::new()
        .add_node(Box::new(RequirementStage::new(components.interpreter)))
        .add_node(Box::new(VisionStage::new(components.vision)))
        .add_node(Box::new(RoutingStage));
    for handler in Handler::ALL {
        builder = builder
            .add_node(Box::new(HandlerStage::new(handler, render.clone())))
            .add_edge(handler.node_id(), EXIT);
    }

    let path_map = RoutingDecision::ALL
        .map(|decision| (decision.as_str(), Handler::for_decision(decision).node_id()));

    let graph = builder
        .add_edge(ENTRY, REQUIREMENT_INTERPRETATION)
        .add_edge(REQUIREMENT_INTERPRETATION, VISION_PREPROCESSING)
        .add_edge(VISION_PREPROCESSING, ROUTING)
        .add_conditional_edges(ROUTING, routing_key, path_map, LAYOUT_AND_STYLE_HANDLER)
        .compile()?;

    Ok(WorkflowRunner::new(graph))
}
