//! # Join Graph
//!
//! A `MultiJoin` is the flattened description of an N-way join handed to the
//! optimizer: the input fragments ("factors"), the conjunctive inner-join filter,
//! outer-join structure, which columns are needed above the join, and a filter
//! to apply after all joins. `JoinGraph` validates it and derives the tables the
//! semijoin selector and the join enumerator consult:
//!
//! - `join_start` / `n_fields_in_factor`: each factor's slice of the concatenated
//!   row, in declaration order.
//! - Filter masks: the factors and fields every join filter references.
//! - Outer-join metadata: null-generating factors, their outer-join conditions and
//!   the factors on the preserved side of each.
//! - Factor weights: how strongly two factors are connected by predicates.
//! - Join field reference counts: how often each column appears in join filters.
//!
//! ## Removal State
//!
//! The graph also records which factors the join-removal heuristics have found
//! removable (null-generating factors whose join can be replaced by a projection,
//! dimensions folded into a fact table through a unique-key semijoin, and
//! self-join pairs). Those passes run before enumeration and mutate the graph
//! through `&mut self`; enumeration only reads it.
//!
//! ## Column Numbering
//!
//! Every filter held by the graph is expressed over the concatenated row
//! `factor 0 ++ factor 1 ++ ... ++ factor N-1`. Trees built in a different factor
//! order remap references with [`Expr::shift_inputs`].

use crate::bitset::BitSet;
use crate::error::{OptimizeError, Result};
use crate::expr::{Expr, Field, JoinType};
use crate::plan::PlanRef;
use std::collections::HashMap;
use tracing::debug;

/// Flattened N-way join as produced by the plan-rewrite engine.
#[derive(Debug, Clone)]
pub struct MultiJoin {
    pub inputs: Vec<PlanRef>,
    /// Conjunction of the inner-join predicates over the concatenated row.
    pub join_filter: Expr,
    /// The multi-join is a two-way full outer join; the condition is `join_filter`.
    pub is_full_outer_join: bool,
    /// For a null-generating factor, the condition of the outer join that
    /// introduces it, over the concatenated row.
    pub outer_join_conditions: Vec<Option<Expr>>,
    /// `Left` marks a factor as the null-generating side of a left outer join.
    pub join_types: Vec<JoinType>,
    /// Columns of each factor referenced above the join; `None` means all of them.
    pub projection_fields: Vec<Option<BitSet>>,
    /// Filter applied above the joins, over the concatenated row.
    pub post_join_filter: Option<Expr>,
}

impl MultiJoin {
    /// Inner join of `inputs` on `join_filter`, with every column needed above.
    pub fn new(inputs: Vec<PlanRef>, join_filter: Expr) -> Self {
        let n = inputs.len();
        Self {
            inputs,
            join_filter,
            is_full_outer_join: false,
            outer_join_conditions: vec![None; n],
            join_types: vec![JoinType::Inner; n],
            projection_fields: vec![None; n],
            post_join_filter: None,
        }
    }

    /// Two-way full outer join.
    pub fn full_outer(left: PlanRef, right: PlanRef, condition: Expr) -> Self {
        let mut mj = Self::new(vec![left, right], condition);
        mj.is_full_outer_join = true;
        mj
    }

    /// Make `factor` the null-generating side of a left outer join on `condition`.
    pub fn with_outer_join(mut self, factor: usize, condition: Expr) -> Self {
        self.join_types[factor] = JoinType::Left;
        self.outer_join_conditions[factor] = Some(condition);
        self
    }

    /// Restrict the columns of `factor` that are used above the join.
    pub fn with_projection_fields(mut self, factor: usize, fields: BitSet) -> Self {
        self.projection_fields[factor] = Some(fields);
        self
    }

    pub fn with_post_join_filter(mut self, filter: Expr) -> Self {
        self.post_join_filter = Some(filter);
        self
    }

    /// Concatenated row type of all inputs.
    pub fn fields(&self) -> Vec<Field> {
        self.inputs.iter().flat_map(|i| i.fields().iter().cloned()).collect()
    }
}

/// A dimension whose join is replaced by reusing the fact table's semijoin keys.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRemoval {
    pub fact_factor: usize,
    /// Semijoin keys on the fact factor, relative to the factor.
    pub fact_keys: Vec<usize>,
    /// Matching keys on the dimension, relative to the dimension.
    pub dim_keys: Vec<usize>,
}

/// Validated join graph with derived per-factor and per-filter metadata.
#[derive(Debug, Clone)]
pub struct JoinGraph {
    multi_join: MultiJoin,
    fields: Vec<Field>,
    join_starts: Vec<usize>,
    n_fields: Vec<usize>,
    total_fields: usize,
    join_filters: Vec<Expr>,
    all_join_filters: Vec<Expr>,
    outer_join_factors: Vec<BitSet>,
    factors_ref_by_factor: Vec<BitSet>,
    factor_weights: Vec<Vec<u32>>,
    join_field_ref_counts: Vec<Vec<usize>>,
    removable_outer_join_factors: BitSet,
    dimension_removals: HashMap<usize, DimensionRemoval>,
    self_join_partners: HashMap<usize, usize>,
    self_join_left_factors: BitSet,
}

impl JoinGraph {
    pub fn new(multi_join: &MultiJoin) -> Result<Self> {
        let n = multi_join.inputs.len();
        if n == 0 {
            return Err(OptimizeError::NoFactors);
        }
        check_len("join_types", n, multi_join.join_types.len())?;
        check_len("outer_join_conditions", n, multi_join.outer_join_conditions.len())?;
        check_len("projection_fields", n, multi_join.projection_fields.len())?;
        if multi_join.is_full_outer_join && n != 2 {
            return Err(OptimizeError::FullOuterJoinFactorCount(n));
        }

        let mut join_starts = Vec::with_capacity(n);
        let mut n_fields = Vec::with_capacity(n);
        let mut total_fields = 0;
        for input in &multi_join.inputs {
            join_starts.push(total_fields);
            n_fields.push(input.field_count());
            total_fields += input.field_count();
        }

        let check_refs = |e: &Expr| -> Result<()> {
            match e.input_refs().iter().find(|&r| r >= total_fields) {
                Some(index) => Err(OptimizeError::InputRefOutOfRange { index, total_fields }),
                None => Ok(()),
            }
        };
        check_refs(&multi_join.join_filter)?;
        if let Some(f) = &multi_join.post_join_filter {
            check_refs(f)?;
        }
        for (i, cond) in multi_join.outer_join_conditions.iter().enumerate() {
            if let Some(cond) = cond {
                if !multi_join.join_types[i].is_outer() {
                    return Err(OptimizeError::OuterJoinConditionOnInnerFactor(i));
                }
                check_refs(cond)?;
            }
        }

        let join_filters = multi_join.join_filter.clone().into_conjuncts();
        let mut all_join_filters = join_filters.clone();
        for cond in multi_join.outer_join_conditions.iter().flatten() {
            all_join_filters.extend(cond.clone().into_conjuncts());
        }

        let mut graph = JoinGraph {
            fields: multi_join.fields(),
            multi_join: multi_join.clone(),
            join_starts,
            n_fields,
            total_fields,
            join_filters,
            all_join_filters,
            outer_join_factors: vec![BitSet::new(); n],
            factors_ref_by_factor: vec![BitSet::new(); n],
            factor_weights: vec![vec![0; n]; n],
            join_field_ref_counts: vec![],
            removable_outer_join_factors: BitSet::new(),
            dimension_removals: HashMap::new(),
            self_join_partners: HashMap::new(),
            self_join_left_factors: BitSet::new(),
        };

        for i in 0..n {
            if let Some(cond) = &multi_join.outer_join_conditions[i] {
                let mut factors = graph.factors_ref_by_filter(cond);
                factors.remove(i);
                graph.outer_join_factors[i] = factors;
            }
        }
        graph.join_field_ref_counts = graph.compute_join_field_ref_counts();
        graph.set_factor_weights();
        debug!(
            factors = n,
            join_filters = graph.join_filters.len(),
            total_fields,
            "built join graph"
        );
        Ok(graph)
    }

    fn compute_join_field_ref_counts(&self) -> Vec<Vec<usize>> {
        let mut counts = vec![0; self.total_fields];
        for filter in &self.all_join_filters {
            filter.count_input_refs(&mut counts);
        }
        (0..self.n_factors())
            .map(|f| counts[self.join_starts[f]..self.join_starts[f] + self.n_fields[f]].to_vec())
            .collect()
    }

    /// Weigh every pair of factors by the predicates connecting them: an equality
    /// with one factor on each side weighs 3, another such comparison 2, and any
    /// other comparison (a cartesian term or one spanning more than two factors) 1
    /// between each pair of its factors. Also records which factors each factor
    /// is connected to.
    fn set_factor_weights(&mut self) {
        let mut connections = Vec::new();
        let mut weights = Vec::new();
        for filter in &self.all_join_filters {
            let Expr::BinaryOp { op, left, .. } = filter else {
                continue;
            };
            if !op.is_comparison() {
                continue;
            }
            let factors = self.factors_ref_by_filter(filter);
            let refs = factors.to_vec();
            if refs.len() == 2 {
                let weight = if self.factors_ref_by_filter(left).len() == 1 {
                    if filter.is_equality() {
                        3
                    } else {
                        2
                    }
                } else {
                    1
                };
                weights.push((weight, refs[0], refs[1]));
            } else {
                for &a in &refs {
                    for &b in &refs {
                        if a != b {
                            weights.push((1, a, b));
                        }
                    }
                }
            }
            connections.push(factors);
        }

        for factors in connections {
            for f in factors.iter() {
                let mut others = factors.clone();
                others.remove(f);
                self.factors_ref_by_factor[f].union_with(&others);
            }
        }
        for (weight, a, b) in weights {
            self.set_factor_weight(weight, a, b);
        }
    }

    fn set_factor_weight(&mut self, weight: u32, a: usize, b: usize) {
        if self.factor_weights[a][b] < weight {
            self.factor_weights[a][b] = weight;
            self.factor_weights[b][a] = weight;
        }
    }

    pub fn multi_join(&self) -> &MultiJoin {
        &self.multi_join
    }

    pub fn n_factors(&self) -> usize {
        self.multi_join.inputs.len()
    }

    pub fn factor(&self, i: usize) -> &PlanRef {
        &self.multi_join.inputs[i]
    }

    pub fn join_start(&self, i: usize) -> usize {
        self.join_starts[i]
    }

    pub fn n_fields_in_factor(&self, i: usize) -> usize {
        self.n_fields[i]
    }

    pub fn total_fields(&self) -> usize {
        self.total_fields
    }

    /// Row type of the concatenated factors.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Conjuncts of the inner-join filter.
    pub fn join_filters(&self) -> &[Expr] {
        &self.join_filters
    }

    /// Inner-join conjuncts followed by the conjuncts of every outer-join condition.
    pub fn all_join_filters(&self) -> &[Expr] {
        &self.all_join_filters
    }

    pub fn is_full_outer_join(&self) -> bool {
        self.multi_join.is_full_outer_join
    }

    pub fn is_null_generating(&self, i: usize) -> bool {
        self.multi_join.join_types[i].is_outer()
    }

    pub fn outer_join_condition(&self, i: usize) -> Option<&Expr> {
        self.multi_join.outer_join_conditions[i].as_ref()
    }

    /// Factors on the preserved side of the outer join that makes `i`
    /// null-generating; empty for other factors.
    pub fn outer_join_factors(&self, i: usize) -> &BitSet {
        &self.outer_join_factors[i]
    }

    /// Factors `i` shares a comparison predicate with.
    pub fn factors_ref_by_factor(&self, i: usize) -> &BitSet {
        &self.factors_ref_by_factor[i]
    }

    pub fn factor_weight(&self, a: usize, b: usize) -> u32 {
        self.factor_weights[a][b]
    }

    pub fn projection_fields(&self, i: usize) -> Option<&BitSet> {
        self.multi_join.projection_fields[i].as_ref()
    }

    pub fn post_join_filter(&self) -> Option<&Expr> {
        self.multi_join.post_join_filter.as_ref()
    }

    /// Columns of the concatenated row referenced by `filter`.
    pub fn fields_ref_by_filter(&self, filter: &Expr) -> BitSet {
        filter.input_refs()
    }

    /// Factors owning the columns referenced by `filter`.
    pub fn factors_ref_by_filter(&self, filter: &Expr) -> BitSet {
        filter.input_refs().iter().map(|field| self.find_ref(field)).collect()
    }

    /// Factor owning column `field` of the concatenated row.
    ///
    /// Panics if `field` is beyond the last factor's columns.
    pub fn find_ref(&self, field: usize) -> usize {
        assert!(field < self.total_fields, "column ${field} outside the join's {} columns", self.total_fields);
        // last factor whose start is <= field, skipping zero-width factors
        self.join_starts.partition_point(|&start| start <= field) - 1
    }

    /// How often each column of factor `i` is referenced by join filters,
    /// outer-join conditions included.
    pub fn join_field_ref_counts(&self, i: usize) -> &[usize] {
        &self.join_field_ref_counts[i]
    }

    /// Decrement the reference count of column `field` of the concatenated row.
    pub fn decrement_join_field_ref_count(&mut self, field: usize) {
        let factor = self.find_ref(field);
        let count = &mut self.join_field_ref_counts[factor][field - self.join_starts[factor]];
        *count = count.saturating_sub(1);
    }

    pub fn is_removable_outer_join_factor(&self, i: usize) -> bool {
        self.removable_outer_join_factors.contains(i)
    }

    pub fn add_removable_outer_join_factor(&mut self, i: usize) {
        self.removable_outer_join_factors.insert(i);
    }

    /// The fact factor `dim` can be folded into, if its join is removable.
    pub fn join_removal_factor(&self, dim: usize) -> Option<usize> {
        self.dimension_removals.get(&dim).map(|r| r.fact_factor)
    }

    pub fn dimension_removal(&self, dim: usize) -> Option<&DimensionRemoval> {
        self.dimension_removals.get(&dim)
    }

    pub fn set_dimension_removal(&mut self, dim: usize, removal: DimensionRemoval) {
        self.dimension_removals.insert(dim, removal);
    }

    pub fn add_removable_self_join_pair(&mut self, left: usize, right: usize) {
        self.self_join_partners.insert(left, right);
        self.self_join_partners.insert(right, left);
        self.self_join_left_factors.insert(left);
    }

    /// The other half of the removable self-join `i` belongs to.
    pub fn other_self_join_factor(&self, i: usize) -> Option<usize> {
        self.self_join_partners.get(&i).copied()
    }

    pub fn is_left_factor_in_removable_self_join(&self, i: usize) -> bool {
        self.self_join_left_factors.contains(i)
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(OptimizeError::MismatchedFactorMetadata { what, expected, actual })
    }
}
