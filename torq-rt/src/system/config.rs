// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Default instruction budget per scheduling turn.
pub const DEFAULT_INSTRUCTION_BUDGET: usize = 10_000;

/// System-wide configuration with sensible defaults.
///
/// # Examples
///
/// ```rust
/// use torq_rt::system::{SystemConfig, DEFAULT_INSTRUCTION_BUDGET};
///
/// let config = SystemConfig::default();
/// assert_eq!(config.instruction_budget, DEFAULT_INSTRUCTION_BUDGET);
///
/// let config = SystemConfig::default().with_instruction_budget(100);
/// assert_eq!(config.instruction_budget, 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Instructions an actor may execute before it is preempted and
    /// re-enqueued behind a self-sent `Resume`.
    pub instruction_budget: usize,

    /// Default per-actor trace flag (overridable per actor at spawn).
    pub trace: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            instruction_budget: DEFAULT_INSTRUCTION_BUDGET,
            trace: false,
        }
    }
}

impl SystemConfig {
    /// Override the instruction budget.
    pub fn with_instruction_budget(mut self, budget: usize) -> Self {
        self.instruction_budget = budget;
        self
    }

    /// Override the default trace flag.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = SystemConfig::default();
        assert_eq!(config.instruction_budget, 10_000);
        assert!(!config.trace);
    }
}
