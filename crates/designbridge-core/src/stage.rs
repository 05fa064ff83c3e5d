//! Stage Trait: single contract for every node in the workflow graph
use crate::context::ExecutionContext;
use crate::state::{StateUpdate, WorkflowState};

/// A state-transition function `(state) -> partial update`.
///
/// `run` is infallible: a stage absorbs every failure of its dependencies
/// and returns its defined fallback output instead.
pub trait Stage: Send + Sync {
    /// Node id in the graph (ex: "requirement_interpretation")
    fn id(&self) -> &'static str;

    /// Whether the same state always yields the same update (default: true)
    fn deterministic(&self) -> bool {
        true
    }

    fn run(&self, state: &WorkflowState, ctx: &ExecutionContext) -> StateUpdate;
}

/// Adapts a plain function into a [`Stage`].
pub struct FnStage<F> {
    id: &'static str,
    deterministic: bool,
    f: F,
}

impl<F> FnStage<F>
where
    F: Fn(&WorkflowState, &ExecutionContext) -> StateUpdate + Send + Sync,
{
    pub fn new(id: &'static str, f: F) -> Self {
        Self {
            id,
            deterministic: true,
            f,
        }
    }

    pub fn nondeterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&WorkflowState, &ExecutionContext) -> StateUpdate + Send + Sync,
{
    fn id(&self) -> &'static str {
        self.id
    }

    fn deterministic(&self) -> bool {
        self.deterministic
    }

    fn run(&self, state: &WorkflowState, ctx: &ExecutionContext) -> StateUpdate {
        (self.f)(state, ctx)
    }
}
