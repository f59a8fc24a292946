//! # Cardinality Estimation
//!
//! `Estimator` answers the relational metadata questions the join enumerator and
//! the semijoin selector ask about plan fragments:
//!
//! - `row_count`: estimated output rows.
//! - `selectivity`: fraction of a fragment's rows satisfying an extra predicate.
//! - `distinct_row_count` / `population_size`: distinct values of a column set,
//!   with and without a predicate applied.
//! - `columns_unique`: whether a column set is a key.
//! - `percentage_original_rows`: how much of the underlying base tables survives.
//! - `column_origin` / `table_origin`: which base columns a fragment passes through.
//!
//! Cost estimation lives in [`crate::cost`] as a second `impl Estimator` block.
//!
//! ## Unknown Values
//!
//! Every function that depends on catalog statistics returns `Option`; `None` means
//! "not enough information" and each caller decides its own fallback. Selectivity
//! never fails because it can always fall back to a guess.
//!
//! ## Memoization
//!
//! Row counts and cumulative costs are memoized per node id. Plan nodes are
//! immutable and ids are never reused, so an entry can never go stale. The tables
//! use `RefCell` because estimation is single-threaded and re-entrant: computing a
//! join's row count asks for its inputs' row counts through the same estimator.

use crate::bitset::BitSet;
use crate::catalog::Catalog;
use crate::cost::Cost;
use crate::expr::{Expr, JoinType, TableRef};
use crate::plan::{NodeId, PlanKind, PlanNode, PlanRef};
use crate::sarg::SargAnalysis;
use crate::stats::{guess_selectivity, num_distinct_vals, DEFAULT_FILTER_SELECTIVITY, SEMIJOIN_KEY_SELECTIVITY};
use std::cell::RefCell;
use std::collections::HashMap;

/// Metadata and cost estimator over a catalog.
pub struct Estimator<'a> {
    catalog: &'a dyn Catalog,
    pub(crate) row_counts: RefCell<HashMap<NodeId, Option<f64>>>,
    pub(crate) cumulative_costs: RefCell<HashMap<NodeId, Option<Cost>>>,
}

impl<'a> Estimator<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            row_counts: RefCell::new(HashMap::new()),
            cumulative_costs: RefCell::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &'a dyn Catalog {
        self.catalog
    }

    /// Estimated number of rows produced by `node`.
    pub fn row_count(&self, node: &PlanRef) -> Option<f64> {
        if let Some(cached) = self.row_counts.borrow().get(&node.id()) {
            return *cached;
        }
        let rows = self.compute_row_count(node);
        self.row_counts.borrow_mut().insert(node.id(), rows);
        rows
    }

    fn compute_row_count(&self, node: &PlanRef) -> Option<f64> {
        match node.kind() {
            PlanKind::Scan { table } => self.catalog.table_stats(table).map(|s| s.row_count),
            PlanKind::Filter { input, predicate } => {
                Some(self.row_count(input)? * self.selectivity(input, Some(predicate)))
            }
            PlanKind::Project { input, .. } => self.row_count(input),
            PlanKind::Join { left, right, join_type, condition, .. } => {
                self.join_row_count(left, right, *join_type, Some(condition))
            }
            PlanKind::SemiJoin { left, right, join_type, left_keys, right_keys, .. } => {
                if *join_type == JoinType::Anti {
                    let sel = self.semijoin_selectivity(right, left, right_keys, left_keys);
                    Some(self.row_count(right)? * (1.0 - sel))
                } else {
                    let sel = self.semijoin_selectivity(left, right, left_keys, right_keys);
                    Some(self.row_count(left)? * sel)
                }
            }
            PlanKind::Aggregate { input, group_by, .. } => {
                if group_by.is_empty() {
                    Some(1.0)
                } else {
                    self.distinct_row_count(input, &group_by.iter().copied().collect(), None)
                }
            }
            PlanKind::Union { inputs } => inputs.iter().map(|i| self.row_count(i)).sum(),
        }
    }

    /// Row count of `left JOIN right ON predicate`.
    ///
    /// The predicate is split into equi-join column pairs and a residual. With
    /// distinct counts for both key sets the classic `L * R / max(dL, dR)` applies.
    /// Without them, a side whose keys are unique is treated as a dimension and the
    /// other side's row count is returned. Otherwise the whole predicate is guessed.
    /// Outer joins never return fewer rows than their preserved side.
    pub fn join_row_count(
        &self,
        left: &PlanRef,
        right: &PlanRef,
        join_type: JoinType,
        predicate: Option<&Expr>,
    ) -> Option<f64> {
        let left_rows = self.row_count(left)?;
        let right_rows = self.row_count(right)?;
        let rows = match predicate {
            None => left_rows * right_rows,
            Some(pred) => {
                let keys = pred.split_join_condition(left.field_count());
                let residual = (!keys.residual.is_empty()).then(|| Expr::and_all(keys.residual.clone()));
                let residual_sel = guess_selectivity(residual.as_ref());
                if keys.is_equi() {
                    let left_set: BitSet = keys.left_keys.iter().copied().collect();
                    let right_set: BitSet = keys.right_keys.iter().copied().collect();
                    let left_distinct = self.distinct_row_count(left, &left_set, None);
                    let right_distinct = self.distinct_row_count(right, &right_set, None);
                    match (left_distinct, right_distinct) {
                        (Some(ld), Some(rd)) => left_rows * right_rows / ld.max(rd).max(1.0) * residual_sel,
                        _ if self.columns_unique(right, &right_set) == Some(true) => left_rows * residual_sel,
                        _ if self.columns_unique(left, &left_set) == Some(true) => right_rows * residual_sel,
                        _ => left_rows * right_rows * guess_selectivity(Some(pred)),
                    }
                } else {
                    left_rows * right_rows * guess_selectivity(Some(pred))
                }
            }
        };
        Some(match join_type {
            JoinType::Left => rows.max(left_rows),
            JoinType::Right => rows.max(right_rows),
            JoinType::Full => rows.max(left_rows).max(right_rows),
            _ => rows,
        })
    }

    /// Fraction of `node`'s rows that satisfy `predicate`.
    pub fn selectivity(&self, node: &PlanRef, predicate: Option<&Expr>) -> f64 {
        let Some(pred) = predicate.filter(|p| !p.is_always_true()) else {
            return 1.0;
        };
        match node.kind() {
            PlanKind::Scan { table } => self.scan_selectivity(node, table, Some(pred), false),
            PlanKind::Filter { input, predicate: applied } => {
                let remaining = minus_conjuncts(pred, applied);
                self.selectivity(input, remaining.as_ref())
            }
            PlanKind::Project { input, exprs } => match pred.substitute_inputs(exprs) {
                Some(pushed) => self.selectivity(input, Some(&pushed)),
                None => guess_selectivity(Some(pred)),
            },
            PlanKind::Join { left, right, join_type, condition, .. } => {
                let combined = Expr::and_all(vec![condition.clone(), pred.clone()]);
                match (
                    self.row_count(node),
                    self.join_row_count(left, right, *join_type, Some(&combined)),
                ) {
                    (Some(rows), Some(filtered)) if rows > 0.0 => (filtered / rows).clamp(0.0, 1.0),
                    _ => guess_selectivity(Some(pred)),
                }
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                self.selectivity(preserved, Some(pred))
            }
            PlanKind::Aggregate { input, group_by, .. } => {
                match pred.map_inputs(&|i| group_by.get(i).copied()) {
                    Some(pushed) => self.selectivity(input, Some(&pushed)),
                    None => guess_selectivity(Some(pred)),
                }
            }
            PlanKind::Union { inputs } => {
                let mut weighted = 0.0;
                let mut total = 0.0;
                for input in inputs {
                    let Some(rows) = self.row_count(input) else {
                        return guess_selectivity(Some(pred));
                    };
                    weighted += rows * self.selectivity(input, Some(pred));
                    total += rows;
                }
                if total > 0.0 {
                    weighted / total
                } else {
                    guess_selectivity(Some(pred))
                }
            }
        }
    }

    /// Selectivity of `predicate` on a table scan.
    ///
    /// Sargable conjuncts are answered from column statistics, residual ones are
    /// guessed unless `sargable_only`, and artificial markers always apply. The result
    /// is never below one row's worth of the table.
    pub(crate) fn scan_selectivity(
        &self,
        node: &PlanNode,
        table: &TableRef,
        predicate: Option<&Expr>,
        sargable_only: bool,
    ) -> f64 {
        let analysis = SargAnalysis::analyze(predicate);
        let stats = self.catalog.table_stats(table);
        let mut sel = analysis.artificial_selectivity;
        for (col, sarg) in &analysis.columns {
            let column_stats = stats.zip(node.fields().get(*col)).and_then(|(s, f)| s.column(&f.name));
            sel *= match column_stats {
                Some(cs) => cs.selectivity(sarg),
                None => DEFAULT_FILTER_SELECTIVITY,
            };
        }
        if !sargable_only {
            sel *= guess_selectivity(analysis.residual_predicate().as_ref());
        }
        if let Some(rows) = stats.map(|s| s.row_count).filter(|r| *r >= 1.0) {
            sel = sel.max(1.0 / rows);
        }
        sel.min(1.0)
    }

    /// Number of distinct values of the columns `keys` among rows satisfying `predicate`.
    pub fn distinct_row_count(&self, node: &PlanRef, keys: &BitSet, predicate: Option<&Expr>) -> Option<f64> {
        if keys.is_empty() {
            return Some(1.0);
        }
        match node.kind() {
            PlanKind::Scan { table } => {
                let stats = self.catalog.table_stats(table)?;
                let filtered_rows = stats.row_count * self.selectivity(node, predicate);
                if self.columns_unique(node, keys) == Some(true) {
                    return Some(filtered_rows);
                }
                let analysis = SargAnalysis::analyze(predicate);
                let mut distinct = 1.0;
                for col in keys.iter() {
                    let field = node.fields().get(col)?;
                    let column_stats = stats.column(&field.name)?;
                    distinct *= match analysis.columns.get(&col) {
                        Some(sarg) => column_stats.distinct_count_in(sarg),
                        None => column_stats.distinct_count,
                    };
                }
                distinct *= guess_selectivity(analysis.residual_predicate().as_ref());
                Some(distinct.min(filtered_rows))
            }
            PlanKind::Filter { input, predicate: applied } => {
                let combined = Expr::and_opt(predicate.cloned(), Some(applied.clone()));
                self.distinct_row_count(input, keys, combined.as_ref())
            }
            PlanKind::Project { input, exprs } => {
                let child_keys = project_keys(exprs, keys)?;
                let pushed = predicate.and_then(|p| p.substitute_inputs(exprs));
                let leftover = if pushed.is_none() { guess_selectivity(predicate) } else { 1.0 };
                let distinct = self.distinct_row_count(input, &child_keys, pushed.as_ref())?;
                Some(distinct * leftover)
            }
            PlanKind::Join { left, right, .. } => {
                let n_left = left.field_count();
                let (left_keys, right_keys) = split_keys(keys, n_left);
                let (left_pred, right_pred, residual) = split_predicate(predicate, n_left);
                let left_distinct = self.distinct_row_count(left, &left_keys, left_pred.as_ref())?;
                let right_distinct = self.distinct_row_count(right, &right_keys, right_pred.as_ref())?;
                let distinct = left_distinct * right_distinct * guess_selectivity(residual.as_ref());
                Some(num_distinct_vals(distinct, self.row_count(node)?))
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                self.distinct_row_count(preserved, keys, predicate)
            }
            PlanKind::Aggregate { input, group_by, .. } => {
                let child_keys = aggregate_keys(group_by, keys)?;
                let pushed = predicate.and_then(|p| p.map_inputs(&|i| group_by.get(i).copied()));
                let leftover = if pushed.is_none() { guess_selectivity(predicate) } else { 1.0 };
                Some(self.distinct_row_count(input, &child_keys, pushed.as_ref())? * leftover)
            }
            PlanKind::Union { inputs } => {
                let mut total = 0.0;
                for input in inputs {
                    total += self.distinct_row_count(input, keys, predicate)?;
                }
                Some(self.row_count(node).map_or(total, |rows| total.min(rows)))
            }
        }
    }

    /// Number of distinct values of `keys` with no predicate applied anywhere above
    /// the base tables.
    pub fn population_size(&self, node: &PlanRef, keys: &BitSet) -> Option<f64> {
        if keys.is_empty() {
            return Some(1.0);
        }
        match node.kind() {
            PlanKind::Scan { table } => {
                let stats = self.catalog.table_stats(table)?;
                if self.columns_unique(node, keys) == Some(true) {
                    return Some(stats.row_count);
                }
                let mut population = 1.0;
                for col in keys.iter() {
                    let field = node.fields().get(col)?;
                    population *= stats.column(&field.name)?.distinct_count;
                }
                Some(population.min(stats.row_count))
            }
            PlanKind::Filter { input, .. } => self.population_size(input, keys),
            PlanKind::Project { input, exprs } => self.population_size(input, &project_keys(exprs, keys)?),
            PlanKind::Join { left, right, .. } => {
                let (left_keys, right_keys) = split_keys(keys, left.field_count());
                let population = self.population_size(left, &left_keys)? * self.population_size(right, &right_keys)?;
                Some(num_distinct_vals(population, self.row_count(node)?))
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                self.population_size(preserved, keys)
            }
            PlanKind::Aggregate { input, group_by, .. } => {
                self.population_size(input, &aggregate_keys(group_by, keys)?)
            }
            PlanKind::Union { inputs } => {
                let mut total = 0.0;
                for input in inputs {
                    total += self.population_size(input, keys)?;
                }
                Some(self.row_count(node).map_or(total, |rows| total.min(rows)))
            }
        }
    }

    /// Whether `keys` contains a unique key of `node`. Null values in the key columns
    /// are disregarded, as equality joins filter them out.
    pub fn columns_unique(&self, node: &PlanRef, keys: &BitSet) -> Option<bool> {
        match node.kind() {
            PlanKind::Scan { table } => {
                self.catalog.table_columns(table)?;
                Some(
                    self.catalog
                        .unique_keys(table)
                        .iter()
                        .any(|key| !key.is_empty() && key.is_subset(keys)),
                )
            }
            PlanKind::Filter { input, .. } => self.columns_unique(input, keys),
            PlanKind::Project { input, exprs } => {
                let child_keys: BitSet = keys
                    .iter()
                    .filter_map(|k| match exprs.get(k) {
                        Some(Expr::InputRef { index, .. }) => Some(*index),
                        _ => None,
                    })
                    .collect();
                self.columns_unique(input, &child_keys)
            }
            PlanKind::Join { left, right, join_type, condition, .. } => {
                let n_left = left.field_count();
                let (left_keys, right_keys) = split_keys(keys, n_left);
                let join_keys = condition.split_join_condition(n_left);
                match (left_keys.is_empty(), right_keys.is_empty()) {
                    (true, true) => Some(false),
                    (false, false) => Some(
                        self.columns_unique(left, &left_keys)? && self.columns_unique(right, &right_keys)?,
                    ),
                    // only left columns: each left row must match at most one right row
                    (false, true) => {
                        if join_type.generates_nulls_on_left() {
                            return Some(false);
                        }
                        let right_join_keys: BitSet = join_keys.right_keys.iter().copied().collect();
                        Some(
                            !right_join_keys.is_empty()
                                && self.columns_unique(left, &left_keys)?
                                && self.columns_unique(right, &right_join_keys)?,
                        )
                    }
                    (true, false) => {
                        if join_type.generates_nulls_on_right() {
                            return Some(false);
                        }
                        let left_join_keys: BitSet = join_keys.left_keys.iter().copied().collect();
                        Some(
                            !left_join_keys.is_empty()
                                && self.columns_unique(right, &right_keys)?
                                && self.columns_unique(left, &left_join_keys)?,
                        )
                    }
                }
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                self.columns_unique(preserved, keys)
            }
            PlanKind::Aggregate { input, group_by, .. } => {
                if BitSet::range(0, group_by.len()).is_subset(keys) {
                    return Some(true);
                }
                let child_keys: BitSet = keys.iter().filter_map(|k| group_by.get(k).copied()).collect();
                self.columns_unique(input, &child_keys)
            }
            PlanKind::Union { .. } => Some(false),
        }
    }

    /// Share of the base tables' rows that survive to `node`'s output.
    pub fn percentage_original_rows(&self, node: &PlanRef) -> Option<f64> {
        let pct = match node.kind() {
            PlanKind::Scan { .. } => 1.0,
            PlanKind::Filter { input, predicate } => {
                self.percentage_original_rows(input)? * self.selectivity(input, Some(predicate))
            }
            PlanKind::Project { input, .. } | PlanKind::Aggregate { input, .. } => {
                self.percentage_original_rows(input)?
            }
            PlanKind::Join { left, right, .. } => {
                self.percentage_original_rows(left)? * self.percentage_original_rows(right)?
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                let input_rows = self.row_count(preserved)?;
                let ratio = if input_rows > 0.0 { self.row_count(node)? / input_rows } else { 1.0 };
                self.percentage_original_rows(preserved)? * ratio
            }
            PlanKind::Union { inputs } => {
                let mut weighted = 0.0;
                let mut total = 0.0;
                for input in inputs {
                    let rows = self.row_count(input)?;
                    weighted += rows * self.percentage_original_rows(input)?;
                    total += rows;
                }
                if total > 0.0 {
                    weighted / total
                } else {
                    1.0
                }
            }
        };
        Some(pct.clamp(0.0, 1.0))
    }

    /// Fraction of `fact` rows expected to survive a semijoin against `dim` on
    /// `fact_keys[i] = dim_keys[i]`.
    ///
    /// The ratio of the dimension's distinct key values to the fact keys' population
    /// (the dimension's population when the fact's is unknown). Falls back to the
    /// dimension's surviving share of base rows, then to 0.1 per key.
    pub fn semijoin_selectivity(
        &self,
        fact: &PlanRef,
        dim: &PlanRef,
        fact_keys: &[usize],
        dim_keys: &[usize],
    ) -> f64 {
        let fact_set: BitSet = fact_keys.iter().copied().collect();
        let dim_set: BitSet = dim_keys.iter().copied().collect();
        let population = self
            .population_size(fact, &fact_set)
            .or_else(|| self.population_size(dim, &dim_set));
        let dim_distinct = self.distinct_row_count(dim, &dim_set, None);
        let sel = match (dim_distinct, population) {
            (Some(distinct), Some(population)) => Some(distinct / population.max(1.0)),
            _ => self.percentage_original_rows(dim),
        };
        match sel {
            Some(s) => s.min(1.0),
            None => SEMIJOIN_KEY_SELECTIVITY.powi(dim_set.len() as i32),
        }
    }

    /// The base table column that column `col` of `node` is a plain copy of.
    pub fn column_origin(&self, node: &PlanRef, col: usize) -> Option<(TableRef, usize)> {
        match node.kind() {
            PlanKind::Scan { table } => (col < node.field_count()).then(|| (table.clone(), col)),
            PlanKind::Filter { input, .. } => self.column_origin(input, col),
            PlanKind::Project { input, exprs } => match exprs.get(col)? {
                Expr::InputRef { index, .. } => self.column_origin(input, *index),
                _ => None,
            },
            PlanKind::Join { left, right, .. } => {
                let n_left = left.field_count();
                if col < n_left {
                    self.column_origin(left, col)
                } else {
                    self.column_origin(right, col - n_left)
                }
            }
            PlanKind::SemiJoin { left, right, join_type, .. } => {
                let preserved = if *join_type == JoinType::Anti { right } else { left };
                self.column_origin(preserved, col)
            }
            PlanKind::Aggregate { input, group_by, .. } => self.column_origin(input, *group_by.get(col)?),
            PlanKind::Union { .. } => None,
        }
    }

    /// The single base table every column of `node` is read from, if there is one.
    pub fn table_origin(&self, node: &PlanRef) -> Option<TableRef> {
        let mut origin: Option<TableRef> = None;
        for col in 0..node.field_count() {
            let (table, _) = self.column_origin(node, col)?;
            match &origin {
                None => origin = Some(table),
                Some(t) if *t != table => return None,
                Some(_) => {}
            }
        }
        origin
    }
}

/// Conjuncts of `pred` that are not already among the conjuncts of `applied`.
fn minus_conjuncts(pred: &Expr, applied: &Expr) -> Option<Expr> {
    let applied = applied.conjuncts();
    let remaining: Vec<Expr> = pred
        .conjuncts()
        .into_iter()
        .filter(|c| !applied.contains(c))
        .cloned()
        .collect();
    (!remaining.is_empty()).then(|| Expr::and_all(remaining))
}

/// Split a key set over `left ++ right` into per-input key sets.
fn split_keys(keys: &BitSet, n_left: usize) -> (BitSet, BitSet) {
    let left = keys.iter().filter(|&k| k < n_left).collect();
    let right = keys.iter().filter(|&k| k >= n_left).map(|k| k - n_left).collect();
    (left, right)
}

/// Split a predicate over `left ++ right` into the conjuncts that reference only the
/// left input, only the right input (renumbered), and both.
fn split_predicate(predicate: Option<&Expr>, n_left: usize) -> (Option<Expr>, Option<Expr>, Option<Expr>) {
    let Some(predicate) = predicate else {
        return (None, None, None);
    };
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut both = Vec::new();
    for conjunct in predicate.conjuncts() {
        let refs = conjunct.input_refs();
        if refs.iter().all(|r| r < n_left) {
            left.push(conjunct.clone());
        } else if refs.iter().all(|r| r >= n_left) {
            match conjunct.map_inputs(&|i| i.checked_sub(n_left)) {
                Some(shifted) => right.push(shifted),
                None => both.push(conjunct.clone()),
            }
        } else {
            both.push(conjunct.clone());
        }
    }
    let wrap = |v: Vec<Expr>| (!v.is_empty()).then(|| Expr::and_all(v));
    (wrap(left), wrap(right), wrap(both))
}

/// Input columns feeding projected columns `keys`. Constant expressions need no
/// input column; `None` if a key is out of range.
fn project_keys(exprs: &[Expr], keys: &BitSet) -> Option<BitSet> {
    let mut child = BitSet::new();
    for k in keys.iter() {
        child.union_with(&exprs.get(k)?.input_refs());
    }
    Some(child)
}

/// Input columns behind aggregate output columns `keys`; `None` if a key is an
/// aggregate call rather than a group key.
fn aggregate_keys(group_by: &[usize], keys: &BitSet) -> Option<BitSet> {
    keys.iter().map(|k| group_by.get(k).copied()).collect()
}
