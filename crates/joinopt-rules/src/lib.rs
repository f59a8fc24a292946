//! # joinopt-rules: Semijoin Selection and Join Ordering
//!
//! This crate turns a flattened N-way join into ranked binary join trees. It runs
//! in phases over the [`JoinGraph`] built from a [`MultiJoin`]:
//!
//! 1. **Outer-join removal** (`join_removal`): null-generating factors nobody
//!    reads, joined on a unique key, are marked for removal.
//! 2. **Semijoin selection** (`semijoin`): fact factors are pre-filtered by
//!    semijoins against their dimensions when the score says it pays off.
//!    Dimensions fully covered by their semijoin are marked for removal.
//! 3. **Self-join detection** (`join_removal`): a table joined with itself on a
//!    unique key is marked, so the pair stays together.
//! 4. **Enumeration** (`join_order`): one greedy tree per admissible first
//!    factor, ranked by cumulative cost.
//!
//! Each removal phase is gated by its [`OptimizerConfig`] flag. The flagged
//! self-joins in a chosen plan are collapsed by [`self_join::remove_self_joins`];
//! [`best_plan`] does this for the cheapest candidate.

pub mod config;
pub mod join_order;
pub mod join_removal;
pub mod self_join;
pub mod semijoin;

use config::OptimizerConfig;
use joinopt_core::catalog::Catalog;
use joinopt_core::error::Result;
use joinopt_core::join_graph::{JoinGraph, MultiJoin};
use joinopt_core::metadata::Estimator;
use joinopt_core::plan::PlanRef;
use join_order::CandidateTree;
use semijoin::SemiJoinSelection;
use std::cmp::Ordering;
use tracing::debug;

/// Run every phase over `multi_join` and return the candidate trees, cheapest
/// first. Candidates without a cost estimate sort last; ties keep first-factor
/// order.
pub fn optimize_multi_join(
    multi_join: &MultiJoin,
    catalog: &dyn Catalog,
    config: &OptimizerConfig,
) -> Result<Vec<CandidateTree>> {
    let mut graph = JoinGraph::new(multi_join)?;
    let estimator = Estimator::new(catalog);

    if config.remove_outer_joins {
        join_removal::find_removable_outer_joins(&mut graph, &estimator);
    }

    let selection = if config.enable_semijoins {
        let selection = semijoin::discover_and_select_semijoins(&graph, &estimator, config);
        selection.apply_removals(&mut graph);
        selection
    } else {
        SemiJoinSelection::unchanged(&graph)
    };

    if config.remove_self_joins {
        join_removal::find_removable_self_joins(&mut graph, &estimator);
    }

    let mut candidates = join_order::enumerate_join_orders(&graph, &estimator, &selection, config);
    candidates.sort_by(|a, b| match (&a.cost, &b.cost) {
        (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    debug!(
        factors = graph.n_factors(),
        candidates = candidates.len(),
        best = ?candidates.first().map(|c| c.factor_tree_display()),
        "optimized multi-join"
    );
    Ok(candidates)
}

/// The cheapest candidate's plan with its removable self-joins collapsed, or
/// `None` if no ordering could be completed.
pub fn best_plan(multi_join: &MultiJoin, catalog: &dyn Catalog, config: &OptimizerConfig) -> Result<Option<PlanRef>> {
    let candidates = optimize_multi_join(multi_join, catalog, config)?;
    Ok(candidates.first().map(|best| self_join::remove_self_joins(&best.plan)))
}
