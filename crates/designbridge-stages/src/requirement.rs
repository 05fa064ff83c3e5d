use designbridge_core::{ExecutionContext, Stage, StateUpdate, UserInput, WorkflowState};
use designbridge_in::RequirementInterpreter;
use tracing::{info, warn};

use crate::REQUIREMENT_INTERPRETATION;

/// Assigns the task id and turns the user's request into a Structured Requirement.
pub struct RequirementStage {
    interpreter: RequirementInterpreter,
}

impl RequirementStage {
    pub fn new(interpreter: RequirementInterpreter) -> Self {
        Self { interpreter }
    }
}

impl Stage for RequirementStage {
    fn id(&self) -> &'static str {
        REQUIREMENT_INTERPRETATION
    }

    fn deterministic(&self) -> bool {
        false
    }

    fn run(&self, state: &WorkflowState, _ctx: &ExecutionContext) -> StateUpdate {
        let task_id = state
            .task_id()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let input = match &state.user_input {
            Some(input) => input.clone(),
            None => {
                warn!("no user input in state; interpreting an empty request");
                UserInput::new("", 0.5)
            }
        };

        let interpretation = self.interpreter.interpret(&input);
        info!(
            task_id = %task_id,
            source = interpretation.source,
            room_type = %interpretation.requirement.meta.room_type,
            scope = interpretation.requirement.scope_value(),
            fallbacks = interpretation.failures.len(),
            "requirement interpreted"
        );

        StateUpdate {
            task_id: Some(task_id),
            iteration: Some(state.iteration),
            structured_requirement: Some(interpretation.requirement),
            ..StateUpdate::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> RequirementStage {
        RequirementStage::new(RequirementInterpreter::rules_only())
    }

    #[test]
    fn test_assigns_task_id_when_absent() {
        let state = WorkflowState::from_input(UserInput::new("客廳", 0.5));
        let update = stage().run(&state, &ExecutionContext::new("artifacts"));
        let id = update.task_id.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(update.iteration, Some(0));
    }

    #[test]
    fn test_keeps_existing_task_id() {
        let mut state = WorkflowState::from_input(UserInput::new("客廳", 0.5));
        state.task_id = Some("task-42".into());
        state.iteration = 3;
        let update = stage().run(&state, &ExecutionContext::new("artifacts"));
        assert_eq!(update.task_id.as_deref(), Some("task-42"));
        assert_eq!(update.iteration, Some(3));
    }

    #[test]
    fn test_missing_input_still_yields_requirement() {
        let update = stage().run(&WorkflowState::default(), &ExecutionContext::new("artifacts"));
        let requirement = update.structured_requirement.unwrap();
        assert_eq!(requirement.meta.room_type, "living_room");
        assert_eq!(requirement.scope_value(), 0.5);
    }
}
