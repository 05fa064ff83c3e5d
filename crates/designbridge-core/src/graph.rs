//! Workflow Graph: nodes, fixed edges and conditional fan-out
//!
//! ```text
//! GraphBuilder ─► compile() ─► WorkflowGraph ─┬─► WorkflowRunner::invoke
//!                   │                          └─► topology() / to_mermaid()
//!                   └─ validates: known targets, one transition per node, no cycles
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DesignBridgeError, Result};
use crate::stage::Stage;
use crate::state::WorkflowState;

/// Virtual source node; the run starts on its single successor.
pub const ENTRY: &str = "entry";
/// Virtual sink node; reaching it ends the run.
pub const EXIT: &str = "exit";

/// Picks a path key from the accumulated state. `None` selects the default target.
pub type RouteFn = Box<dyn Fn(&WorkflowState) -> Option<String> + Send + Sync>;

enum Transition {
    Fixed(String),
    Conditional {
        route: RouteFn,
        path_map: BTreeMap<String, String>,
        default: String,
    },
}

impl Transition {
    fn targets(&self) -> Vec<&str> {
        match self {
            Transition::Fixed(to) => vec![to.as_str()],
            Transition::Conditional {
                path_map, default, ..
            } => {
                let mut targets: Vec<&str> = path_map.values().map(String::as_str).collect();
                if !targets.contains(&default.as_str()) {
                    targets.push(default.as_str());
                }
                targets
            }
        }
    }
}

/// Accumulates nodes and edges; [`GraphBuilder::compile`] checks the structure.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Box<dyn Stage>>,
    transitions: Vec<(String, Transition)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, stage: Box<dyn Stage>) -> Self {
        self.nodes.push(stage);
        self
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.transitions
            .push((from.to_string(), Transition::Fixed(to.to_string())));
        self
    }

    /// Fan out from `from` to whichever node `path_map[route(state)]` names,
    /// falling back to `default` when the key is absent or unmapped.
    pub fn add_conditional_edges<F, I, K, V>(
        mut self,
        from: &str,
        route: F,
        path_map: I,
        default: &str,
    ) -> Self
    where
        F: Fn(&WorkflowState) -> Option<String> + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let path_map = path_map
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.transitions.push((
            from.to_string(),
            Transition::Conditional {
                route: Box::new(route),
                path_map,
                default: default.to_string(),
            },
        ));
        self
    }

    pub fn compile(self) -> Result<WorkflowGraph> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut nodes: HashMap<String, Box<dyn Stage>> = HashMap::new();
        for stage in self.nodes {
            let id = stage.id().to_string();
            if id == ENTRY || id == EXIT {
                return Err(graph_error(format!("'{}' is a reserved node id", id)));
            }
            if nodes.contains_key(&id) {
                return Err(graph_error(format!("duplicate node '{}'", id)));
            }
            order.push(id.clone());
            nodes.insert(id, stage);
        }

        let mut transitions: HashMap<String, Transition> = HashMap::new();
        for (from, transition) in self.transitions {
            if from == EXIT {
                return Err(graph_error("exit cannot have outgoing edges".to_string()));
            }
            if from != ENTRY && !nodes.contains_key(&from) {
                return Err(graph_error(format!("edge from unknown node '{}'", from)));
            }
            for target in transition.targets() {
                if target == ENTRY {
                    return Err(graph_error(format!("'{}' routes back to entry", from)));
                }
                if target != EXIT && !nodes.contains_key(target) {
                    return Err(graph_error(format!(
                        "edge from '{}' to unknown node '{}'",
                        from, target
                    )));
                }
            }
            if transitions.contains_key(&from) {
                return Err(graph_error(format!(
                    "node '{}' has more than one outgoing transition",
                    from
                )));
            }
            transitions.insert(from, transition);
        }

        if !transitions.contains_key(ENTRY) {
            return Err(graph_error("entry has no outgoing edge".to_string()));
        }
        for id in &order {
            if !transitions.contains_key(id) {
                return Err(graph_error(format!("node '{}' has no outgoing edge", id)));
            }
        }

        let graph = WorkflowGraph {
            order,
            nodes,
            transitions,
        };
        graph.check_acyclic()?;

        let reachable = graph.reachable();
        for id in &graph.order {
            if !reachable.contains(id.as_str()) {
                warn!(node = %id, "node is unreachable from entry");
            }
        }

        Ok(graph)
    }
}

fn graph_error(message: String) -> DesignBridgeError {
    DesignBridgeError::Graph(message)
}

/// A validated, immutable workflow graph.
pub struct WorkflowGraph {
    order: Vec<String>,
    nodes: HashMap<String, Box<dyn Stage>>,
    transitions: HashMap<String, Transition>,
}

impl WorkflowGraph {
    pub fn stage(&self, id: &str) -> Option<&dyn Stage> {
        self.nodes.get(id).map(|s| s.as_ref())
    }

    /// Node ids in insertion order, excluding entry and exit.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Resolve the node that follows `from` given the state after `from` ran.
    pub fn next(&self, from: &str, state: &WorkflowState) -> Result<String> {
        let transition = self
            .transitions
            .get(from)
            .ok_or_else(|| graph_error(format!("node '{}' has no outgoing edge", from)))?;

        Ok(match transition {
            Transition::Fixed(to) => to.clone(),
            Transition::Conditional {
                route,
                path_map,
                default,
            } => match route(state) {
                Some(key) => match path_map.get(&key) {
                    Some(target) => target.clone(),
                    None => {
                        warn!(node = %from, key = %key, target = %default, "unmapped route key; using default");
                        default.clone()
                    }
                },
                None => default.clone(),
            },
        })
    }

    fn successors(&self, id: &str) -> Vec<&str> {
        self.transitions
            .get(id)
            .map(Transition::targets)
            .unwrap_or_default()
    }

    fn reachable(&self) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut stack = vec![ENTRY];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.successors(id));
        }
        seen
    }

    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a WorkflowGraph,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(graph_error(format!("cycle through node '{}'", id)))
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            for next in graph.successors(id) {
                visit(graph, next, marks)?;
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        visit(self, ENTRY, &mut marks)?;
        for id in &self.order {
            visit(self, id, &mut marks)?;
        }
        Ok(())
    }

    /// Static node/edge listing, independent of any run.
    pub fn topology(&self) -> Topology {
        let mut nodes = Vec::with_capacity(self.order.len() + 2);
        nodes.push(ENTRY.to_string());
        nodes.extend(self.order.iter().cloned());
        nodes.push(EXIT.to_string());

        let mut edges = Vec::new();
        let sources = std::iter::once(ENTRY).chain(self.order.iter().map(String::as_str));
        for from in sources {
            match self.transitions.get(from) {
                Some(Transition::Fixed(to)) => edges.push(TopologyEdge {
                    from: from.to_string(),
                    to: to.clone(),
                    label: None,
                    conditional: false,
                }),
                Some(Transition::Conditional {
                    path_map, default, ..
                }) => {
                    for (key, to) in path_map {
                        edges.push(TopologyEdge {
                            from: from.to_string(),
                            to: to.clone(),
                            label: Some(key.clone()),
                            conditional: true,
                        });
                    }
                    if !path_map.values().any(|to| to == default) {
                        edges.push(TopologyEdge {
                            from: from.to_string(),
                            to: default.clone(),
                            label: Some("default".to_string()),
                            conditional: true,
                        });
                    }
                }
                None => {}
            }
        }

        Topology { nodes, edges }
    }

    pub fn to_mermaid(&self) -> String {
        self.topology().to_mermaid()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub conditional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<String>,
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    /// Mermaid flowchart source; conditional edges are dotted and labelled with their route key.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD;\n");
        for node in &self.nodes {
            let line = match node.as_str() {
                ENTRY => format!("\t{0}([{0}]):::first\n", node),
                EXIT => format!("\t{0}([{0}]):::last\n", node),
                _ => format!("\t{0}({0})\n", node),
            };
            out.push_str(&line);
        }
        for edge in &self.edges {
            let line = match (&edge.label, edge.conditional) {
                (Some(label), true) => format!("\t{} -. {} .-> {};\n", edge.from, label, edge.to),
                (_, true) => format!("\t{} -.-> {};\n", edge.from, edge.to),
                _ => format!("\t{} --> {};\n", edge.from, edge.to),
            };
            out.push_str(&line);
        }
        out.push_str("\tclassDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("\tclassDef first fill-opacity:0\n");
        out.push_str("\tclassDef last fill:#bfb6fc\n");
        out
    }
}
