//! DesignBridge-IN: natural language to Structured Requirement
//!
//! The interpreter tries a hosted text service first and falls back to
//! keyword rules. It never fails: the rule path has no external dependency.
//!
//! # Example
//!
//! ```ignore
//! use designbridge_core::UserInput;
//! use designbridge_in::RequirementInterpreter;
//!
//! let interpreter = RequirementInterpreter::rules_only();
//! let result = interpreter.interpret(&UserInput::new("客廳動線不順暢", 0.6));
//! assert!(result.requirement.hint_layout);
//! ```

pub mod attach;
pub mod gemini;
pub mod normalizer;
pub mod prompt;
pub mod rules;

use std::sync::Arc;

use designbridge_core::{
    DesignBridgeError, Failure, FallbackChain, Result, Strategy, StructuredRequirement, UserInput,
};
use tracing::{debug, warn};

pub use gemini::{GeminiClient, ImagePart, TextService};
pub use prompt::PromptTemplate;

/// Which strategy produced the requirement
pub const SOURCE_SERVICE: &str = "service";
pub const SOURCE_RULES: &str = "rules";

/// Result of interpreting one request
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub requirement: StructuredRequirement,
    pub source: &'static str,
    /// Primary-path failures that led to the fallback
    pub failures: Vec<Failure>,
}

/// Primary path: prompt the text service and validate its JSON.
struct ServiceStrategy {
    service: Arc<dyn TextService>,
    template: PromptTemplate,
    attachment: FallbackChain<std::path::Path, ImagePart>,
}

impl Strategy<UserInput, StructuredRequirement> for ServiceStrategy {
    fn name(&self) -> &'static str {
        SOURCE_SERVICE
    }

    fn attempt(&self, input: &UserInput) -> Result<StructuredRequirement> {
        let image_path = attach::usable_image(input);
        let prompt = self.template.render(
            input.text_prompt.trim(),
            input.edit_scope,
            input.image_path(),
        )?;

        let image = match image_path {
            Some(path) => {
                let outcome = self.attachment.run(path);
                if !outcome.succeeded() {
                    return Err(DesignBridgeError::Transport(format!(
                        "image attachment failed: {}",
                        outcome.failure_summary()
                    )));
                }
                outcome.value
            }
            None => None,
        };

        let raw = self.service.generate(&prompt, image.as_ref())?;
        debug!(chars = raw.len(), "service response received");
        parse_requirement(&raw)
    }
}

/// Fallback path: keyword rules.
struct RuleStrategy;

impl Strategy<UserInput, StructuredRequirement> for RuleStrategy {
    fn name(&self) -> &'static str {
        SOURCE_RULES
    }

    fn attempt(&self, input: &UserInput) -> Result<StructuredRequirement> {
        Ok(rules::rule_based_requirement(&input.text_prompt, input.edit_scope))
    }
}

/// Parse and validate a service response into a requirement document.
///
/// One code fence is stripped first. `scope_value` outside [0, 1] is
/// rejected; empty `allowed_operations` are derived from scope and hints.
pub fn parse_requirement(raw: &str) -> Result<StructuredRequirement> {
    let text = normalizer::strip_code_fence(raw);
    let mut requirement: StructuredRequirement = serde_json::from_str(&text)?;

    let scope = requirement.edit_scope.scope_value;
    if !(0.0..=1.0).contains(&scope) {
        return Err(DesignBridgeError::MalformedResponse(format!(
            "scope_value {} outside [0, 1]",
            scope
        )));
    }
    if requirement.edit_scope.allowed_operations.is_empty() {
        requirement.edit_scope.allowed_operations = rules::derive_allowed_operations(
            scope,
            requirement.hint_layout,
            requirement.hint_style,
        );
    }
    Ok(requirement)
}

pub struct RequirementInterpreter {
    chain: FallbackChain<UserInput, StructuredRequirement>,
}

impl RequirementInterpreter {
    /// Service first, rules second.
    pub fn new(service: Arc<dyn TextService>) -> Result<Self> {
        let primary = ServiceStrategy {
            attachment: attach::attachment_chain(Arc::clone(&service)),
            service,
            template: PromptTemplate::new()?,
        };
        Ok(Self {
            chain: FallbackChain::new("requirement_interpreter")
                .with(Box::new(primary))
                .with(Box::new(RuleStrategy)),
        })
    }

    /// Keyword rules only; used when no text service is configured.
    pub fn rules_only() -> Self {
        Self {
            chain: FallbackChain::new("requirement_interpreter").with(Box::new(RuleStrategy)),
        }
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    pub fn interpret(&self, input: &UserInput) -> Interpretation {
        let input = clamp_scope(input);
        let outcome = self.chain.run(&input);
        match (outcome.value, outcome.winner) {
            (Some(requirement), Some(source)) => Interpretation {
                requirement,
                source,
                failures: outcome.failures,
            },
            _ => Interpretation {
                requirement: rules::rule_based_requirement(&input.text_prompt, input.edit_scope),
                source: SOURCE_RULES,
                failures: outcome.failures,
            },
        }
    }
}

fn clamp_scope(input: &UserInput) -> UserInput {
    let mut input = input.clone();
    let scope = input.edit_scope;
    let clamped = if scope.is_nan() { 0.5 } else { scope.clamp(0.0, 1.0) };
    if clamped != scope {
        warn!(given = scope, used = clamped, "edit_scope outside [0, 1]; clamped");
        input.edit_scope = clamped;
    }
    input
}
