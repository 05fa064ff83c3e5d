//! Design Director: pick the handler and summarise what it may do.

use designbridge_core::{
    ExecutionContext, GenerationMode, PriorityWeights, RoutingDecision, ScopeBand, Stage,
    StateUpdate, StructuredRequirement, TaskPlan, WorkflowState,
};
use designbridge_in::rules::derive_allowed_operations;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::ROUTING;

/// Scope assumed when no requirement reached the router.
const DEFAULT_SCOPE: f64 = 0.5;

/// First match wins:
/// adjuster hint or local scope, then both hints, layout, style, and
/// `layout_and_style` when nothing is set.
pub fn route(requirement: Option<&StructuredRequirement>) -> RoutingDecision {
    let (scope, layout, style, adjuster) = match requirement {
        Some(r) => (r.scope_value(), r.hint_layout, r.hint_style, r.hint_adjuster),
        None => (DEFAULT_SCOPE, false, false, false),
    };

    if adjuster || ScopeBand::of(scope) == ScopeBand::Local {
        return RoutingDecision::DesignAdjuster;
    }
    match (layout, style) {
        (true, true) => RoutingDecision::LayoutAndStyle,
        (true, false) => RoutingDecision::Layout,
        (false, true) => RoutingDecision::Style,
        (false, false) => RoutingDecision::LayoutAndStyle,
    }
}

pub fn generation_mode(decision: RoutingDecision) -> GenerationMode {
    match decision {
        RoutingDecision::Layout => GenerationMode::LayoutOnly,
        RoutingDecision::Style => GenerationMode::StyleOnly,
        RoutingDecision::DesignAdjuster => GenerationMode::Inpaint,
        RoutingDecision::LayoutAndStyle => GenerationMode::LayoutAndStyle,
    }
}

pub fn assigned_agents(decision: RoutingDecision) -> Vec<String> {
    let agents: &[&str] = match decision {
        RoutingDecision::Layout => &["layout"],
        RoutingDecision::Style => &["style"],
        RoutingDecision::DesignAdjuster => &["adjuster"],
        RoutingDecision::LayoutAndStyle => &["layout", "style"],
    };
    agents.iter().map(|a| a.to_string()).collect()
}

pub fn task_plan(decision: RoutingDecision, requirement: Option<&StructuredRequirement>) -> TaskPlan {
    let mut summary = Map::new();
    let weights = match requirement {
        Some(r) => {
            let constraints = &r.layout_constraints;
            summary.insert("must_keep".into(), json!(constraints.must_keep));
            summary.insert("must_add".into(), json!(constraints.must_add));
            summary.insert("must_remove".into(), json!(constraints.must_remove));
            summary.insert("allowed_operations".into(), json!(r.edit_scope.allowed_operations));
            summary.insert("scope_value".into(), Value::from(r.scope_value()));
            r.priority_weights
        }
        None => {
            for key in ["must_keep", "must_add", "must_remove"] {
                summary.insert(key.into(), json!([]));
            }
            let ops = derive_allowed_operations(DEFAULT_SCOPE, false, false);
            summary.insert("allowed_operations".into(), json!(ops));
            summary.insert("scope_value".into(), Value::from(DEFAULT_SCOPE));
            PriorityWeights::default()
        }
    };

    TaskPlan {
        assigned_agents: assigned_agents(decision),
        generation_mode: generation_mode(decision),
        constraints_summary: summary,
        priority_order: weights.ranked().into_iter().map(String::from).collect(),
    }
}

pub struct RoutingStage;

impl Stage for RoutingStage {
    fn id(&self) -> &'static str {
        ROUTING
    }

    fn run(&self, state: &WorkflowState, _ctx: &ExecutionContext) -> StateUpdate {
        let requirement = state.structured_requirement.as_ref();
        let decision = route(requirement);
        let plan = task_plan(decision, requirement);
        info!(decision = %decision, mode = ?plan.generation_mode, "routing decided");

        StateUpdate {
            routing_decision: Some(decision),
            task_plan: Some(plan),
            ..StateUpdate::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use designbridge_in::rules::rule_based_requirement;

    fn requirement(scope: f64, layout: bool, style: bool, adjuster: bool) -> StructuredRequirement {
        let mut r = rule_based_requirement("", scope);
        r.hint_layout = layout;
        r.hint_style = style;
        r.hint_adjuster = adjuster;
        r
    }

    #[test]
    fn test_evaluation_order() {
        let cases = [
            (0.5, true, true, true, RoutingDecision::DesignAdjuster),
            (0.1, false, false, false, RoutingDecision::DesignAdjuster),
            (0.5, true, true, false, RoutingDecision::LayoutAndStyle),
            (0.5, true, false, false, RoutingDecision::Layout),
            (0.5, false, true, false, RoutingDecision::Style),
            (0.9, false, false, false, RoutingDecision::LayoutAndStyle),
        ];
        for (scope, layout, style, adjuster, expected) in cases {
            let r = requirement(scope, layout, style, adjuster);
            assert_eq!(route(Some(&r)), expected, "scope={} hints={:?}", scope, (layout, style, adjuster));
        }
    }

    #[test]
    fn test_boundary_scope_is_not_local() {
        assert_eq!(route(Some(&requirement(0.3, true, false, false))), RoutingDecision::Layout);
        assert_eq!(
            route(Some(&requirement(0.2999, true, false, false))),
            RoutingDecision::DesignAdjuster
        );
    }

    #[test]
    fn test_missing_requirement_defaults_to_both() {
        assert_eq!(route(None), RoutingDecision::LayoutAndStyle);
        let plan = task_plan(RoutingDecision::LayoutAndStyle, None);
        assert_eq!(plan.constraints_summary["scope_value"], 0.5);
        assert_eq!(plan.constraints_summary["allowed_operations"], json!(["layout", "style"]));
        assert_eq!(plan.constraints_summary["must_keep"], json!([]));
    }

    #[test]
    fn test_task_plan_for_adjuster() {
        let mut r = requirement(0.2, false, false, true);
        r.layout_constraints.must_keep = vec!["sofa".into()];
        let plan = task_plan(RoutingDecision::DesignAdjuster, Some(&r));

        assert_eq!(plan.assigned_agents, vec!["adjuster"]);
        assert_eq!(plan.generation_mode, GenerationMode::Inpaint);
        assert_eq!(plan.constraints_summary["must_keep"], json!(["sofa"]));
        assert_eq!(plan.constraints_summary["allowed_operations"], json!(["inpaint"]));
        assert_eq!(
            plan.priority_order,
            vec!["layout_rationality", "style_consistency", "novelty"]
        );
    }

    #[test]
    fn test_agents_and_modes_cover_every_decision() {
        for decision in RoutingDecision::ALL {
            assert!(!assigned_agents(decision).is_empty());
        }
        assert_eq!(assigned_agents(RoutingDecision::LayoutAndStyle), vec!["layout", "style"]);
        assert_eq!(generation_mode(RoutingDecision::Style), GenerationMode::StyleOnly);
        assert_eq!(generation_mode(RoutingDecision::Layout), GenerationMode::LayoutOnly);
    }

    #[test]
    fn test_stage_writes_decision_and_plan() {
        let mut state = WorkflowState::default();
        state.structured_requirement = Some(requirement(0.6, true, false, false));
        let update = RoutingStage.run(&state, &ExecutionContext::new("artifacts"));
        assert_eq!(update.routing_decision, Some(RoutingDecision::Layout));
        assert_eq!(update.task_plan.unwrap().generation_mode, GenerationMode::LayoutOnly);
    }
}
