//! Workflow Runner: walks the graph from entry to exit, merging each stage's update
use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::context::ExecutionContext;
use crate::data_model::StageTrace;
use crate::error::{DesignBridgeError, Result};
use crate::graph::{WorkflowGraph, ENTRY, EXIT};
use crate::state::WorkflowState;

/// Final merged state plus what happened on the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The context's trace id
    pub trace_id: String,
    pub state: WorkflowState,
    pub trace: Vec<StageTrace>,
    /// Executed node ids in order, excluding entry and exit.
    pub path: Vec<String>,
}

pub struct WorkflowRunner {
    graph: WorkflowGraph,
}

impl WorkflowRunner {
    pub fn new(graph: WorkflowGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Run every stage on the selected path exactly once, strictly in sequence.
    ///
    /// Stage failures never surface here; the only errors are structural
    /// (a missing node or a node reached twice).
    pub fn invoke(&self, initial: WorkflowState, ctx: &ExecutionContext) -> Result<RunOutcome> {
        let mut state = initial;
        let mut trace = Vec::new();
        let mut path = Vec::new();
        let mut visited = HashSet::new();

        let mut current = self.graph.next(ENTRY, &state)?;
        while current != EXIT {
            if !visited.insert(current.clone()) {
                return Err(DesignBridgeError::Graph(format!(
                    "node '{}' reached twice in one run",
                    current
                )));
            }
            let stage = self.graph.stage(&current).ok_or_else(|| {
                DesignBridgeError::Graph(format!("unknown node '{}'", current))
            })?;

            let span = info_span!(
                "stage",
                trace_id = %ctx.trace_id,
                id = stage.id(),
                task_id = state.task_id().unwrap_or("-")
            );
            let _guard = span.enter();

            let start = Instant::now();
            let in_hash = hash_state(&state)?;
            info!("stage started");

            let update = stage.run(&state, ctx);
            state.merge(update);

            let out_hash = hash_state(&state)?;
            let latency_ms = start.elapsed().as_millis() as u64;
            info!(latency_ms, "stage finished");

            trace.push(StageTrace {
                id: stage.id().to_string(),
                in_hash,
                out_hash,
                deterministic: stage.deterministic(),
                latency_ms,
            });
            path.push(current.clone());

            current = self.graph.next(&current, &state)?;
        }

        Ok(RunOutcome {
            trace_id: ctx.trace_id.clone(),
            state,
            trace,
            path,
        })
    }
}

fn hash_state(state: &WorkflowState) -> Result<String> {
    let bytes = serde_json::to_vec(state)?;
    Ok(format!("blake3:{}", blake3::hash(&bytes)))
}
