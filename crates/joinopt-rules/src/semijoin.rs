//! # Semijoin Selection
//!
//! Before joins are ordered, large "fact" factors can be pre-filtered by semijoins
//! against the "dimension" factors they join with, as long as the fact table has an
//! index the semijoin can probe. This module finds those opportunities and greedily
//! picks the profitable ones.
//!
//! ## Discovery
//!
//! A factor is a fact candidate when every column comes from one base table that
//! has at least one non-clustered index. A join filter seeds a semijoin when it is
//! `fact.col = dim.col` over exactly two factors. The filters against one dimension
//! are combined into a single condition over `fact ++ dim`, and the fact-side keys
//! are matched against the table's indexes: when only some of the keys are covered,
//! the uncovered key pairs are dropped. Null-generating dimensions are skipped,
//! since filtering the fact by them would lose rows the outer join must preserve.
//!
//! ## Selection
//!
//! Each round sorts the factors by the cumulative cost of their current fragment,
//! cheapest first, and scores every remaining dimension of the first fact that has
//! one above the threshold:
//!
//! ```text
//! savings = (1 - sqrt(selectivity)) * max(1, cost(fact))    doubled if dim keys unique
//! score   = savings / max(1, rows(dim))
//! ```
//!
//! The best dimension is accepted: the fact's fragment becomes
//! `semijoin(fact, dim)` over the fragments chosen so far, so semijoins chain. The
//! pair is then retired in both directions. Rounds repeat until nothing scores
//! above the threshold or the iteration cap is hit.
//!
//! ## Dimension Removal
//!
//! When an accepted semijoin's dimension keys are unique and the dimension
//! contributes nothing beyond those keys (no other projected or join-referenced
//! column), the join to the dimension is redundant: the semijoin already
//! guarantees a match, and the key values can be read from the fact table.
//! Such dimensions are recorded for the enumerator, which drops only the key
//! equalities the semijoin enforces and keeps every other predicate on them.

use crate::config::OptimizerConfig;
use joinopt_core::bitset::BitSet;
use joinopt_core::catalog::{find_semijoin_index, IndexDef};
use joinopt_core::expr::Expr;
use joinopt_core::join_graph::{DimensionRemoval, JoinGraph};
use joinopt_core::metadata::Estimator;
use joinopt_core::plan::{PlanNode, PlanRef};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// A usable semijoin of a fact factor by a dimension factor.
#[derive(Debug, Clone, PartialEq)]
pub struct SemiJoinCandidate {
    pub fact: usize,
    pub dim: usize,
    /// Fact columns, relative to the fact factor.
    pub fact_keys: Vec<usize>,
    /// Matching dimension columns, relative to the dimension factor.
    pub dim_keys: Vec<usize>,
    /// Fact-table index the semijoin probes.
    pub index: IndexDef,
    /// Equality conjuncts over `fact ++ dim` for the retained key pairs.
    pub condition: Expr,
}

/// Candidates keyed by fact factor, then by dimension factor.
pub type CandidateMap = BTreeMap<usize, BTreeMap<usize, SemiJoinCandidate>>;

/// Outcome of semijoin selection.
#[derive(Debug, Clone)]
pub struct SemiJoinSelection {
    chosen: Vec<PlanRef>,
    chosen_dimensions: Vec<Vec<usize>>,
    dimension_removals: BTreeMap<usize, DimensionRemoval>,
}

impl SemiJoinSelection {
    /// Every factor keeps its own fragment.
    pub fn unchanged(graph: &JoinGraph) -> Self {
        let n = graph.n_factors();
        Self {
            chosen: (0..n).map(|i| graph.factor(i).clone()).collect(),
            chosen_dimensions: vec![vec![]; n],
            dimension_removals: BTreeMap::new(),
        }
    }

    /// Fragment to use for factor `i`: the factor itself, or a chain of semijoins over it.
    pub fn chosen(&self, i: usize) -> &PlanRef {
        &self.chosen[i]
    }

    pub fn chosen_fragments(&self) -> &[PlanRef] {
        &self.chosen
    }

    /// Dimensions semijoined into fact `fact`, in acceptance order.
    pub fn chosen_dimensions(&self, fact: usize) -> &[usize] {
        &self.chosen_dimensions[fact]
    }

    /// Dimensions whose join can be replaced by reusing fact columns.
    pub fn dimension_removals(&self) -> &BTreeMap<usize, DimensionRemoval> {
        &self.dimension_removals
    }

    /// Record the dimension removals on `graph` for the enumerator.
    pub fn apply_removals(&self, graph: &mut JoinGraph) {
        for (&dim, removal) in &self.dimension_removals {
            graph.set_dimension_removal(dim, removal.clone());
        }
    }
}

/// Find semijoins to apply to the factors of `graph` and choose among them.
pub fn discover_and_select_semijoins(
    graph: &JoinGraph,
    estimator: &Estimator<'_>,
    config: &OptimizerConfig,
) -> SemiJoinSelection {
    let mut selection = SemiJoinSelection::unchanged(graph);
    let mut candidates = find_semijoin_candidates(graph, estimator);
    if candidates.is_empty() {
        return selection;
    }
    debug!(facts = candidates.len(), "found possible semijoins");

    for _ in 0..config.max_semijoin_iterations {
        if !choose_best_semijoin(graph, estimator, config, &mut candidates, &mut selection) {
            break;
        }
    }
    selection
}

/// All usable semijoins, at most one per (fact, dimension) pair.
pub fn find_semijoin_candidates(graph: &JoinGraph, estimator: &Estimator<'_>) -> CandidateMap {
    let mut candidates = CandidateMap::new();
    for fact in 0..graph.n_factors() {
        if graph.is_null_generating(fact) {
            continue;
        }
        let Some(table) = estimator.table_origin(graph.factor(fact)) else {
            continue;
        };
        let indexes: Vec<IndexDef> = estimator
            .catalog()
            .indexes(&table)
            .iter()
            .filter(|idx| !idx.clustered)
            .cloned()
            .collect();
        if indexes.is_empty() {
            continue;
        }

        let mut dim_filters: BTreeMap<usize, Vec<Expr>> = BTreeMap::new();
        for filter in graph.join_filters() {
            let Some(dim) = suitable_filter_dimension(graph, filter, fact) else {
                continue;
            };
            if graph.is_null_generating(dim) {
                continue;
            }
            dim_filters.entry(dim).or_default().push(filter.clone());
        }

        for (dim, filters) in dim_filters {
            if let Some(candidate) = find_semijoin_index_match(graph, estimator, &indexes, filters, fact, dim) {
                trace!(fact, dim, keys = ?candidate.fact_keys, index = %candidate.index.name, "possible semijoin");
                candidates.entry(fact).or_default().insert(dim, candidate);
            }
        }
    }
    candidates
}

/// The dimension factor of a `fact.col = dim.col` filter, if `filter` has that shape.
fn suitable_filter_dimension(graph: &JoinGraph, filter: &Expr, fact: usize) -> Option<usize> {
    filter.as_column_equality()?;
    let factors = graph.factors_ref_by_filter(filter).to_vec();
    match factors[..] {
        [a, b] if a == fact => Some(b),
        [a, b] if b == fact => Some(a),
        _ => None,
    }
}

fn find_semijoin_index_match(
    graph: &JoinGraph,
    estimator: &Estimator<'_>,
    indexes: &[IndexDef],
    filters: Vec<Expr>,
    fact: usize,
    dim: usize,
) -> Option<SemiJoinCandidate> {
    let n_fact = graph.n_fields_in_factor(fact);
    let condition = adjust_semijoin_condition(graph, &Expr::and_all(filters), fact, dim);
    let keys = condition.split_join_condition(n_fact);
    if !keys.is_equi() {
        return None;
    }

    let fact_plan = graph.factor(fact);
    let table_columns = keys
        .left_keys
        .iter()
        .map(|&k| estimator.column_origin(fact_plan, k).map(|(_, col)| col))
        .collect::<Option<Vec<_>>>()?;
    let index_match = find_semijoin_index(indexes, &table_columns)?;

    if index_match.key_order.len() == keys.left_keys.len() {
        return Some(SemiJoinCandidate {
            fact,
            dim,
            fact_keys: keys.left_keys,
            dim_keys: keys.right_keys,
            index: index_match.index,
            condition,
        });
    }

    let fact_keys: Vec<usize> = index_match.key_order.iter().map(|&p| keys.left_keys[p]).collect();
    let dim_keys: Vec<usize> = index_match.key_order.iter().map(|&p| keys.right_keys[p]).collect();
    let kept: BitSet = fact_keys.iter().copied().collect();
    let condition = Expr::and_all(
        condition
            .into_conjuncts()
            .into_iter()
            .filter(|c| match c.as_column_equality() {
                Some((a, b)) => kept.contains(a.min(b)),
                None => false,
            })
            .collect(),
    );
    Some(SemiJoinCandidate { fact, dim, fact_keys, dim_keys, index: index_match.index, condition })
}

/// Re-express `condition` over `fact ++ dim` instead of the concatenated multi-join row.
fn adjust_semijoin_condition(graph: &JoinGraph, condition: &Expr, fact: usize, dim: usize) -> Expr {
    let mut adjustments = vec![0isize; graph.total_fields()];
    let fact_start = graph.join_start(fact);
    let dim_start = graph.join_start(dim);
    for i in 0..graph.n_fields_in_factor(fact) {
        adjustments[fact_start + i] = -(fact_start as isize);
    }
    let dim_shift = graph.n_fields_in_factor(fact) as isize - dim_start as isize;
    for i in 0..graph.n_fields_in_factor(dim) {
        adjustments[dim_start + i] = dim_shift;
    }
    condition.shift_inputs(&adjustments)
}

/// One selection round. Returns whether a semijoin was accepted.
fn choose_best_semijoin(
    graph: &JoinGraph,
    estimator: &Estimator<'_>,
    config: &OptimizerConfig,
    candidates: &mut CandidateMap,
    selection: &mut SemiJoinSelection,
) -> bool {
    let costs: Vec<_> = selection.chosen.iter().map(|p| estimator.cumulative_cost(p)).collect();
    let mut sorted: Vec<usize> = (0..graph.n_factors()).collect();
    sorted.sort_by(|&a, &b| match (costs[a], costs[b]) {
        (Some(ca), Some(cb)) => ca.total.partial_cmp(&cb.total).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    for fact in sorted {
        let Some(dims) = candidates.get(&fact) else {
            continue;
        };
        let fact_plan = &selection.chosen[fact];
        let mut best: Option<(usize, f64)> = None;
        for (&dim, candidate) in dims {
            let score = compute_score(estimator, fact_plan, &selection.chosen[dim], candidate);
            trace!(fact, dim, score, "semijoin score");
            if score > config.semijoin_threshold_score && score > best.map_or(0.0, |(_, s)| s) {
                best = Some((dim, score));
            }
        }
        let Some((dim, score)) = best else {
            continue;
        };

        let candidate = dims[&dim].clone();
        let semijoin = PlanNode::semi_join(
            fact_plan.clone(),
            selection.chosen[dim].clone(),
            candidate.fact_keys.clone(),
            candidate.dim_keys.clone(),
        );
        debug!(fact, dim, score, keys = ?candidate.fact_keys, "chose semijoin");
        selection.chosen[fact] = semijoin;
        selection.chosen_dimensions[fact].push(dim);

        remove_candidate(candidates, fact, dim);
        remove_candidate(candidates, dim, fact);

        if config.remove_dimension_joins {
            record_dimension_removal(graph, estimator, selection, &candidate);
        }
        return true;
    }
    false
}

fn remove_candidate(candidates: &mut CandidateMap, fact: usize, dim: usize) {
    if let Some(dims) = candidates.get_mut(&fact) {
        dims.remove(&dim);
        if dims.is_empty() {
            candidates.remove(&fact);
        }
    }
}

/// Benefit of filtering `fact` by `dim` relative to the cost of reading `dim`.
/// Zero when the statistics needed are missing.
pub fn compute_score(estimator: &Estimator<'_>, fact: &PlanRef, dim: &PlanRef, candidate: &SemiJoinCandidate) -> f64 {
    let selectivity = estimator.semijoin_selectivity(fact, dim, &candidate.fact_keys, &candidate.dim_keys);
    let Some(fact_cost) = estimator.cumulative_cost(fact) else {
        return 0.0;
    };
    let mut savings = (1.0 - selectivity.sqrt()) * fact_cost.total.max(1.0);

    let dim_cols: BitSet = candidate.dim_keys.iter().copied().collect();
    if estimator.columns_unique(dim, &dim_cols) == Some(true) {
        savings *= 2.0;
    }

    let (Some(dim_rows), Some(_)) = (estimator.row_count(dim), estimator.cumulative_cost(dim)) else {
        return 0.0;
    };
    savings / dim_rows.max(1.0)
}

fn record_dimension_removal(
    graph: &JoinGraph,
    estimator: &Estimator<'_>,
    selection: &mut SemiJoinSelection,
    candidate: &SemiJoinCandidate,
) {
    let dim = candidate.dim;
    if selection.dimension_removals.contains_key(&dim) {
        return;
    }
    let dim_keys: BitSet = candidate.dim_keys.iter().copied().collect();
    if estimator.columns_unique(graph.factor(dim), &dim_keys) != Some(true) {
        return;
    }
    let projected = graph
        .projection_fields(dim)
        .cloned()
        .unwrap_or_else(|| BitSet::range(0, graph.n_fields_in_factor(dim)));
    if !projected.is_subset(&dim_keys) {
        return;
    }
    let referenced_elsewhere = graph
        .join_field_ref_counts(dim)
        .iter()
        .enumerate()
        .any(|(i, &count)| count > 0 && !dim_keys.contains(i));
    if referenced_elsewhere {
        return;
    }

    debug!(dim, fact = candidate.fact, "dimension join is removable");
    selection.dimension_removals.insert(
        dim,
        DimensionRemoval {
            fact_factor: candidate.fact,
            fact_keys: candidate.fact_keys.clone(),
            dim_keys: candidate.dim_keys.clone(),
        },
    );
}
