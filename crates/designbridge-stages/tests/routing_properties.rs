//! Property tests: routing is total and the scope bands dominate the hints.

use designbridge_core::{Operation, RoutingDecision, StructuredRequirement};
use designbridge_in::rules::{derive_allowed_operations, rule_based_requirement};
use designbridge_stages::{route, task_plan};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_requirement(scope: impl Strategy<Value = f64>) -> impl Strategy<Value = StructuredRequirement> {
    (scope, any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(scope, layout, style, adjuster)| {
            let mut requirement = rule_based_requirement("", scope);
            requirement.hint_layout = layout;
            requirement.hint_style = style;
            requirement.hint_adjuster = adjuster;
            requirement
        },
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn test_local_scope_always_routes_to_adjuster(requirement in arb_requirement(0.0f64..0.3)) {
        prop_assert_eq!(route(Some(&requirement)), RoutingDecision::DesignAdjuster);
    }

    #[test]
    fn test_no_hints_routes_to_layout_and_style(scope in 0.3f64..=1.0) {
        let mut requirement = rule_based_requirement("", scope);
        requirement.hint_layout = false;
        requirement.hint_style = false;
        requirement.hint_adjuster = false;
        prop_assert_eq!(route(Some(&requirement)), RoutingDecision::LayoutAndStyle);
    }

    #[test]
    fn test_routing_is_repeatable(requirement in arb_requirement(0.0f64..=1.0)) {
        let first = route(Some(&requirement));
        let cloned = requirement.clone();
        prop_assert_eq!(first, route(Some(&cloned)));
        prop_assert_eq!(first, route(Some(&requirement)));
    }

    #[test]
    fn test_allowed_operations_are_total_and_stable(
        scope in 0.0f64..=1.0,
        layout in any::<bool>(),
        style in any::<bool>(),
    ) {
        let ops = derive_allowed_operations(scope, layout, style);
        prop_assert!(!ops.is_empty());
        prop_assert_eq!(&ops, &derive_allowed_operations(scope, layout, style));
        if scope < 0.3 {
            prop_assert_eq!(ops, vec![Operation::Inpaint]);
        } else if scope > 0.7 {
            prop_assert_eq!(ops, vec![Operation::Layout, Operation::Style]);
        }
    }

    #[test]
    fn test_task_plan_matches_decision(requirement in arb_requirement(0.0f64..=1.0)) {
        let decision = route(Some(&requirement));
        let plan = task_plan(decision, Some(&requirement));
        prop_assert!(!plan.assigned_agents.is_empty());
        prop_assert_eq!(plan.priority_order.len(), 3);
        prop_assert_eq!(
            plan.constraints_summary["scope_value"].as_f64(),
            Some(requirement.scope_value())
        );
    }
}
