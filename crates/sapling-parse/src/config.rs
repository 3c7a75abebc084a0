use std::time::Instant;

use sapling_tree::ERROR_COST_PER_SKIPPED_TREE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParserConfig {
    pub budget: ParseBudget,
    pub recovery: RecoveryConfig,
}

impl ParserConfig {
    pub fn with_budget(self, budget: ParseBudget) -> Self {
        Self { budget, ..self }
    }

    pub fn with_recovery(self, recovery: RecoveryConfig) -> Self {
        Self { recovery, ..self }
    }
}

/// Limits on the work a single parse may do. Both are checked between
/// parse steps, so a parse may overrun its deadline by one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseBudget {
    /// Parse steps, counted over all stack versions.
    pub max_operations: Option<u64>,
    pub deadline: Option<Instant>,
}

impl ParseBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_operations(self, max_operations: u64) -> Self {
        Self { max_operations: Some(max_operations), ..self }
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self { deadline: Some(deadline), ..self }
    }

    pub(crate) fn is_exhausted(&self, operations: u64) -> bool {
        self.max_operations.is_some_and(|max| operations > max)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Thresholds that bound how many stack versions error recovery and
/// ambiguity may keep alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Versions kept after each condensation.
    pub max_version_count: usize,
    /// Extra versions a single reduction may create beyond the cap.
    pub max_version_count_overflow: usize,
    /// How deep below the error the recovery summary looks.
    pub max_summary_depth: u32,
    /// A version whose cost exceeds another's by more than this, scaled by
    /// the other's progress since its last error, is dropped.
    pub max_cost_difference: u32,
    /// Paths a single pop may follow through merged stack nodes.
    pub max_pop_paths: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_version_count: 6,
            max_version_count_overflow: 4,
            max_summary_depth: 16,
            max_cost_difference: 16 * ERROR_COST_PER_SKIPPED_TREE,
            max_pop_paths: 64,
        }
    }
}

impl RecoveryConfig {
    pub fn with_max_version_count(self, max_version_count: usize) -> Self {
        Self { max_version_count, ..self }
    }

    pub fn with_max_summary_depth(self, max_summary_depth: u32) -> Self {
        Self { max_summary_depth, ..self }
    }

    pub fn with_max_cost_difference(self, max_cost_difference: u32) -> Self {
        Self { max_cost_difference, ..self }
    }
}
