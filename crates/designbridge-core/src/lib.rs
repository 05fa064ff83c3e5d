//! DesignBridge Core: workflow state, stage contract, graph, runner
//!
//! Stages read an accumulated state and return partial updates; the runner
//! walks a compiled graph and owns every merge.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod resource;
pub mod runner;
pub mod stage;
pub mod state;

pub use config::{Config, DeviceSetting, GeminiConfig, RenderConfig, VisionConfig};
pub use context::ExecutionContext;
pub use data_model::{
    GenerationMode, Operation, PriorityWeights, RenderResult, RoutingDecision, ScopeBand,
    StageTrace, StructuredRequirement, TaskPlan, UserInput, VisionFeatures,
};
pub use error::{DesignBridgeError, Result};
pub use fallback::{ChainOutcome, FallbackChain, Failure, Strategy};
pub use graph::{GraphBuilder, Topology, WorkflowGraph, ENTRY, EXIT};
pub use resource::ResourceCache;
pub use runner::{RunOutcome, WorkflowRunner};
pub use stage::{FnStage, Stage};
pub use state::{StateUpdate, WorkflowState};

/// Engine version
pub const DESIGNBRIDGE_VERSION: &str = "0.1.0";
