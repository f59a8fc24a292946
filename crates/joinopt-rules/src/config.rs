//! # Optimizer Configuration
//!
//! Tuning knobs for one optimization call. Every field has a default, so a
//! partial JSON document (or `{}`) deserializes into a usable configuration.

use serde::{Deserialize, Serialize};

/// Minimum score a semijoin must exceed to be chosen.
pub const SEMIJOIN_THRESHOLD_SCORE: f64 = 10.0;

/// Upper bound on semijoins accepted per optimization.
pub const MAX_SEMIJOIN_ITERATIONS: usize = 10;

/// Two costs closer than this are treated as a tie.
pub const COST_EPSILON: f64 = 1e-5;

/// Knobs for semijoin selection, join removal and join-order enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// A semijoin is accepted only when its score is strictly above this value.
    pub semijoin_threshold_score: f64,
    /// Safety bound on the greedy semijoin selection loop.
    pub max_semijoin_iterations: usize,
    /// Discover and choose semijoins before ordering the joins.
    pub enable_semijoins: bool,
    /// Replace joins to unreferenced, unique-keyed null-generating factors by null columns.
    pub remove_outer_joins: bool,
    /// Replace joins to dimensions fully covered by a chosen semijoin by fact-table columns.
    pub remove_dimension_joins: bool,
    /// Mark joins of a table with itself on a unique key for collapsing into one scan.
    pub remove_self_joins: bool,
    /// Absolute tolerance when comparing the costs of two alternative trees.
    pub cost_epsilon: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            semijoin_threshold_score: SEMIJOIN_THRESHOLD_SCORE,
            max_semijoin_iterations: MAX_SEMIJOIN_ITERATIONS,
            enable_semijoins: true,
            remove_outer_joins: true,
            remove_dimension_joins: true,
            remove_self_joins: true,
            cost_epsilon: COST_EPSILON,
        }
    }
}
