//! Ordered fallback strategies: attempt, capture the failure reason, continue.
use tracing::{debug, warn};

use crate::error::Result;

/// One named way of producing `O` from `I`.
pub trait Strategy<I: ?Sized, O>: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, input: &I) -> Result<O>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub strategy: &'static str,
    pub reason: String,
}

#[derive(Debug)]
pub struct ChainOutcome<O> {
    pub value: Option<O>,
    /// Name of the strategy that produced `value`.
    pub winner: Option<&'static str>,
    /// Every strategy tried before the winner, in order.
    pub failures: Vec<Failure>,
}

impl<O> ChainOutcome<O> {
    pub fn succeeded(&self) -> bool {
        self.value.is_some()
    }

    /// Reasons joined into one line, for error messages.
    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.strategy, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct FallbackChain<I: ?Sized, O> {
    label: &'static str,
    strategies: Vec<Box<dyn Strategy<I, O>>>,
}

impl<I: ?Sized, O> FallbackChain<I, O> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            strategies: Vec::new(),
        }
    }

    pub fn with(mut self, strategy: Box<dyn Strategy<I, O>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try strategies in order until one succeeds.
    pub fn run(&self, input: &I) -> ChainOutcome<O> {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(input) {
                Ok(value) => {
                    debug!(chain = self.label, strategy = strategy.name(), "strategy succeeded");
                    return ChainOutcome {
                        value: Some(value),
                        winner: Some(strategy.name()),
                        failures,
                    };
                }
                Err(err) => {
                    warn!(
                        chain = self.label,
                        strategy = strategy.name(),
                        reason = %err,
                        "strategy failed; trying next"
                    );
                    failures.push(Failure {
                        strategy: strategy.name(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        ChainOutcome {
            value: None,
            winner: None,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DesignBridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: Option<u32>,
        calls: Arc<AtomicUsize>,
    }

    impl Strategy<str, u32> for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn attempt(&self, _input: &str) -> Result<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .ok_or_else(|| DesignBridgeError::Transport(format!("{} down", self.name)))
        }
    }

    fn fixed(name: &'static str, result: Option<u32>, calls: &Arc<AtomicUsize>) -> Box<Fixed> {
        Box::new(Fixed {
            name,
            result,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn test_first_success_wins_and_later_strategies_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::<str, u32>::new("test")
            .with(fixed("a", None, &calls))
            .with(fixed("b", Some(2), &calls))
            .with(fixed("c", Some(3), &calls));

        let outcome = chain.run("input");
        assert_eq!(outcome.value, Some(2));
        assert_eq!(outcome.winner, Some("b"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].strategy, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_all_failures_are_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::<str, u32>::new("test")
            .with(fixed("a", None, &calls))
            .with(fixed("b", None, &calls));

        let outcome = chain.run("input");
        assert!(!outcome.succeeded());
        assert_eq!(outcome.winner, None);
        assert_eq!(
            outcome.failure_summary(),
            "a: TRANSPORT/a down; b: TRANSPORT/b down"
        );
    }

    #[test]
    fn test_names_follow_insertion_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::<str, u32>::new("test")
            .with(fixed("imagen", None, &calls))
            .with(fixed("placeholder", Some(1), &calls));
        assert_eq!(chain.names(), vec!["imagen", "placeholder"]);
        assert_eq!(chain.len(), 2);
    }
}
