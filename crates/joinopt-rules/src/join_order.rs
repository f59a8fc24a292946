//! # Join-Order Enumeration
//!
//! Greedy, cost-guided construction of binary join trees for a [`JoinGraph`]. One
//! tree is built per admissible first factor; the caller ranks the results.
//!
//! ## Growing a Tree
//!
//! Starting from the first factor, factors are added one at a time:
//!
//! 1. If the factor just added is half of a removable self-join whose other half is
//!    still missing, that half comes next.
//! 2. Otherwise the next factor is the eligible one with the highest join weight
//!    against the factors already in the tree, ties broken by the larger distinct
//!    count of its join keys. A factor is not eligible while it is a removable
//!    dimension whose fact is missing, or a null-generating factor whose outer-join
//!    dependencies are missing.
//!
//! Each factor is tried in two positions: joined on top of the current tree, and
//! pushed down into the side of the top join that holds every factor it joins
//! with (recursively, so it can land deep in the tree). The cheaper tree wins; on a
//! cost tie, the push-down only wins when it carries narrower rows. Every join
//! built puts its smaller input on the right, turning `LEFT` into `RIGHT` when the
//! inputs are exchanged.
//!
//! ## Column Positions
//!
//! Predicates are kept in the multi-join's coordinates until they are attached to a
//! join, then renumbered to the join's row using the tree order of its factor tree.
//! Join conditions that move with a pushed-down factor are renumbered from the old
//! tree order to the new one.
//!
//! ## Join Removal
//!
//! A removable outer-join factor or dimension is never joined. Instead the current
//! tree is extended by a projection that appends the factor's columns.
//!
//! - For a removed outer join every appended column is a typed NULL, and the
//!   predicates between the factor and the tree are dropped with it.
//! - For a removed dimension the semijoin key columns are read from the fact
//!   columns they equal, and the rest are typed NULLs. Only the key equalities
//!   the semijoin enforces are dropped. Any other predicate on the dimension is
//!   applied above the projection and reads the replacement columns.
//!
//! ## Finishing
//!
//! Predicates still unplaced once every factor is in the tree are applied above
//! it. A final projection restores the multi-join's column order, and the
//! multi-join's post-join filter goes on top of that.

use crate::config::OptimizerConfig;
use crate::semijoin::SemiJoinSelection;
use joinopt_core::bitset::BitSet;
use joinopt_core::cost::Cost;
use joinopt_core::expr::{Expr, JoinType};
use joinopt_core::join_graph::{DimensionRemoval, JoinGraph};
use joinopt_core::join_tree::{FactorTreeArena, FactorTreeNode, JoinTree};
use joinopt_core::metadata::Estimator;
use joinopt_core::plan::{PlanKind, PlanNode, PlanRef};
use tracing::{debug, trace};

/// A complete join tree for one choice of first factor.
#[derive(Debug, Clone)]
pub struct CandidateTree {
    /// The joins under a projection restoring the multi-join's column order, plus
    /// the remaining and post-join filters.
    pub plan: PlanRef,
    /// The joins alone.
    pub tree: JoinTree,
    /// Storage for the factor tree of `tree`.
    pub arena: FactorTreeArena,
    pub first_factor: usize,
    /// Cumulative cost of `plan`; `None` when statistics are missing.
    pub cost: Option<Cost>,
}

impl CandidateTree {
    /// Factors in the left-to-right order of the join tree's leaves.
    pub fn tree_order(&self) -> Vec<usize> {
        self.tree.tree_order(&self.arena)
    }

    /// Nested-bracket rendering of the factor tree, e.g. `[[2, 0], 1]`.
    pub fn factor_tree_display(&self) -> String {
        self.arena.display(self.tree.factor_tree())
    }
}

/// Build one candidate tree per factor that may start an ordering.
///
/// Null-generating factors never start an ordering. A start that leaves some
/// factor with no admissible position contributes no candidate.
pub fn enumerate_join_orders(
    graph: &JoinGraph,
    estimator: &Estimator<'_>,
    selection: &SemiJoinSelection,
    config: &OptimizerConfig,
) -> Vec<CandidateTree> {
    let mut candidates = Vec::new();
    for first in 0..graph.n_factors() {
        if graph.is_null_generating(first) {
            continue;
        }
        let mut builder = OrderingBuilder::new(graph, estimator, selection, config);
        match builder.create_ordering(first) {
            Some((tree, unplaced)) => {
                let candidate = builder.finish(first, tree, unplaced);
                debug!(
                    first,
                    tree = %candidate.factor_tree_display(),
                    cost = ?candidate.cost,
                    "candidate join order"
                );
                candidates.push(candidate);
            }
            None => debug!(first, "no complete join order from this factor"),
        }
    }
    candidates
}

/// Total width of the rows flowing through the joins of `plan`.
fn row_width(plan: &PlanRef) -> usize {
    let mut width = plan.field_count();
    if let Some((left, right)) = plan.join_inputs() {
        width += row_width(left) + row_width(right);
    }
    width
}

/// State for growing the join trees of one candidate.
struct OrderingBuilder<'a, 'c> {
    graph: &'a JoinGraph,
    estimator: &'a Estimator<'c>,
    selection: &'a SemiJoinSelection,
    config: &'a OptimizerConfig,
    arena: FactorTreeArena,
}

impl<'a, 'c> OrderingBuilder<'a, 'c> {
    fn new(
        graph: &'a JoinGraph,
        estimator: &'a Estimator<'c>,
        selection: &'a SemiJoinSelection,
        config: &'a OptimizerConfig,
    ) -> Self {
        Self { graph, estimator, selection, config, arena: FactorTreeArena::new() }
    }

    /// Add every factor starting from `first`. Returns the tree and the join
    /// filters no join consumed.
    fn create_ordering(&mut self, first: usize) -> Option<(JoinTree, Vec<Expr>)> {
        let graph = self.graph;
        let mut filters = graph.join_filters().to_vec();
        let mut to_add = BitSet::range(0, graph.n_factors());
        let mut added = BitSet::new();
        let mut tree: Option<JoinTree> = None;
        let mut prev = first;

        while !to_add.is_empty() {
            let (next, self_join) = match &tree {
                None => (first, false),
                Some(current) => match graph.other_self_join_factor(prev).filter(|p| !added.contains(*p)) {
                    Some(partner) => (partner, true),
                    None => (self.best_next_factor(current, &to_add, &added, &filters)?, false),
                },
            };

            let mut needed = graph.factors_ref_by_factor(next).clone();
            if graph.is_null_generating(next) {
                needed.union_with(graph.outer_join_factors(next));
            }
            needed.intersect_with(&added);

            trace!(factor = next, self_join, needed = %needed, "adding factor");
            tree = Some(self.add_factor_to_tree(tree.as_ref(), next, &needed, &mut filters, self_join)?);
            to_add.remove(next);
            added.insert(next);
            prev = next;
        }
        tree.map(|t| (t, filters))
    }

    fn best_next_factor(
        &self,
        tree: &JoinTree,
        to_add: &BitSet,
        added: &BitSet,
        filters: &[Expr],
    ) -> Option<usize> {
        let graph = self.graph;
        let mut best: Option<usize> = None;
        let mut best_weight = 0;
        let mut best_cardinality: Option<f64> = None;

        for factor in to_add.iter() {
            if graph.join_removal_factor(factor).is_some_and(|fact| !added.contains(fact)) {
                continue;
            }
            if graph.is_null_generating(factor) && !graph.outer_join_factors(factor).is_subset(added) {
                continue;
            }

            let weight = added.iter().map(|prev| graph.factor_weight(prev, factor)).max().unwrap_or(0);
            let cardinality = if weight > 0 && weight >= best_weight {
                self.join_cardinality(tree, filters, factor)
            } else {
                None
            };

            let better = weight > best_weight
                || (weight == best_weight
                    && match (best_cardinality, cardinality) {
                        (None, _) => true,
                        (Some(b), Some(c)) => c > b,
                        (Some(_), None) => false,
                    });
            if best.is_none() || better {
                best = Some(factor);
                best_weight = weight;
                best_cardinality = cardinality;
            }
        }
        trace!(next = ?best, weight = best_weight, cardinality = ?best_cardinality, "best next factor");
        best
    }

    /// Distinct count of the columns `factor` would join on if added to `tree`.
    fn join_cardinality(&self, tree: &JoinTree, filters: &[Expr], factor: usize) -> Option<f64> {
        let graph = self.graph;
        let mut child_factors = tree.factors(&self.arena);
        child_factors.insert(factor);
        let start = graph.join_start(factor);
        let end = start + graph.n_fields_in_factor(factor);

        let outer = graph.outer_join_condition(factor).map(Expr::conjuncts).unwrap_or_default();
        let mut keys = BitSet::new();
        for filter in filters.iter().chain(outer) {
            if !graph.factors_ref_by_filter(filter).is_subset(&child_factors) {
                continue;
            }
            for field in graph.fields_ref_by_filter(filter).iter().filter(|f| (start..end).contains(f)) {
                keys.insert(field - start);
            }
        }
        if keys.is_empty() {
            return None;
        }
        self.estimator.distinct_row_count(self.selection.chosen(factor), &keys, None)
    }

    fn leaf(&mut self, factor: usize) -> JoinTree {
        JoinTree::leaf(&mut self.arena, self.selection.chosen(factor).clone(), factor)
    }

    fn is_leaf(&self, tree: &JoinTree) -> bool {
        matches!(self.arena.get(tree.factor_tree()), FactorTreeNode::Leaf(_))
    }

    /// The top join of `tree` has one half of a self-join as a leaf input and the
    /// other half on its opposite side.
    fn pairs_self_join(&self, tree: &JoinTree) -> bool {
        let FactorTreeNode::Node { left, right } = self.arena.get(tree.factor_tree()) else {
            return false;
        };
        [(left, right), (right, left)].into_iter().any(|(leaf, other)| match self.arena.get(leaf) {
            FactorTreeNode::Leaf(f) => {
                self.graph.other_self_join_factor(f).is_some_and(|p| self.arena.factors(other).contains(p))
            }
            FactorTreeNode::Node { .. } => false,
        })
    }

    fn is_join_tree(&self, tree: &JoinTree) -> bool {
        tree.plan().is_join() && matches!(self.arena.get(tree.factor_tree()), FactorTreeNode::Node { .. })
    }

    fn add_factor_to_tree(
        &mut self,
        tree: Option<&JoinTree>,
        factor: usize,
        needed: &BitSet,
        filters: &mut Vec<Expr>,
        self_join: bool,
    ) -> Option<JoinTree> {
        let graph = self.graph;
        if let Some(tree) = tree {
            if graph.is_removable_outer_join_factor(factor) {
                trace!(factor, "replacing outer join by null columns");
                let mut covered = tree.factors(&self.arena);
                covered.insert(factor);
                let joined_removed = |f: &Expr| {
                    let factors = graph.factors_ref_by_filter(f);
                    factors.contains(factor) && factors.is_subset(&covered)
                };
                return Some(self.create_replacement_join(tree, factor, &[], filters, joined_removed));
            }
            if let Some(removal) = graph.dimension_removal(factor) {
                if let Some(replaced) = self.create_replacement_semijoin(tree, factor, removal, filters) {
                    return Some(replaced);
                }
            }
        }
        let Some(tree) = tree else {
            return Some(self.leaf(factor));
        };

        let mut top_filters = filters.clone();
        let top = self.add_to_top(tree, factor, &mut top_filters, self_join);
        let mut push_filters = filters.clone();
        let push = self.push_down_factor(tree, factor, needed, &mut push_filters, self_join);

        let take_push = match (&top, &push) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(top), Some(push)) => {
                let top_cost = self.estimator.cumulative_cost(top.plan());
                let push_cost = self.estimator.cumulative_cost(push.plan());
                trace!(factor, top = ?top_cost, push_down = ?push_cost, "placement costs");
                match (push_cost, top_cost) {
                    (Some(p), Some(t)) if p.approx_eq(&t, self.config.cost_epsilon) => {
                        row_width(push.plan()) < row_width(top.plan())
                    }
                    (Some(p), Some(t)) => p.is_less_than(&t),
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }
        };
        if take_push {
            *filters = push_filters;
            push
        } else {
            *filters = top_filters;
            top
        }
    }

    fn add_to_top(
        &mut self,
        tree: &JoinTree,
        factor: usize,
        filters: &mut Vec<Expr>,
        self_join: bool,
    ) -> Option<JoinTree> {
        // the two halves of a self-join must stay direct siblings
        if self_join && self.is_join_tree(tree) {
            return None;
        }
        let graph = self.graph;
        let join_type = if graph.is_full_outer_join() {
            JoinType::Full
        } else if graph.is_null_generating(factor) {
            JoinType::Left
        } else {
            JoinType::Inner
        };

        let right = self.leaf(factor);
        let condition = if join_type == JoinType::Left {
            graph.outer_join_condition(factor).cloned().unwrap_or_else(Expr::true_literal)
        } else {
            self.add_filters(tree, None, &right, filters, false)
        };
        Some(self.create_join_subtree(tree.clone(), right, condition, join_type, filters, true, self_join))
    }

    fn push_down_factor(
        &mut self,
        tree: &JoinTree,
        factor: usize,
        needed: &BitSet,
        filters: &mut Vec<Expr>,
        self_join: bool,
    ) -> Option<JoinTree> {
        if !self.is_join_tree(tree) || tree.is_removable_self_join() || self.pairs_self_join(tree) {
            return None;
        }
        let PlanKind::Join { join_type, condition, .. } = tree.plan().kind() else {
            return None;
        };
        let join_type = *join_type;
        let mut left = tree.left(&self.arena);
        let mut right = tree.right(&self.arena);
        let left_factors = left.factors(&self.arena);
        let right_factors = right.factors(&self.arena);

        let push_left = if self_join {
            left_factors.contains(self.graph.other_self_join_factor(factor)?)
        } else if needed.is_subset(&left_factors) && !join_type.generates_nulls_on_left() {
            true
        } else if needed.is_subset(&right_factors) && !join_type.generates_nulls_on_right() {
            false
        } else {
            return None;
        };

        let orig_order = tree.tree_order(&self.arena);
        if push_left {
            left = self.add_factor_to_tree(Some(&left), factor, needed, filters, self_join)?;
        } else {
            right = self.add_factor_to_tree(Some(&right), factor, needed, filters, self_join)?;
        }

        let mut new_condition = self.adjust_filter(&left, &right, condition, factor, &orig_order);
        if !matches!(join_type, JoinType::Left | JoinType::Right) {
            let extra = self.add_filters(&left, None, &right, filters, true);
            new_condition = Expr::and_all(vec![new_condition, extra]);
        }
        Some(self.create_join_subtree(left, right, new_condition, join_type, filters, false, false))
    }

    /// Join `left` and `right`, smaller input on the right.
    ///
    /// With `full_adjust` the condition is in multi-join coordinates; otherwise it
    /// is already over `left ++ right`.
    #[allow(clippy::too_many_arguments)]
    fn create_join_subtree(
        &mut self,
        mut left: JoinTree,
        mut right: JoinTree,
        mut condition: Expr,
        mut join_type: JoinType,
        filters: &mut Vec<Expr>,
        full_adjust: bool,
        self_join: bool,
    ) -> JoinTree {
        if self.swap_inputs(&left, &right, self_join) {
            if !full_adjust {
                condition = swap_filter(&condition, left.plan().field_count(), right.plan().field_count());
            }
            join_type = join_type.swap();
            trace!(join_type = %join_type, "swapped join inputs");
            std::mem::swap(&mut left, &mut right);
        }

        let mut order = left.tree_order(&self.arena);
        order.extend(right.tree_order(&self.arena));
        if full_adjust {
            condition = self.shift_to_order(&condition, &order);
        }

        // only a join of two single factors can be collapsed into one scan
        let removable = self_join && self.is_leaf(&left) && self.is_leaf(&right);
        let join = PlanNode::join_with_flag(left.plan().clone(), right.plan().clone(), join_type, condition, removable);
        let plan = if matches!(join_type, JoinType::Left | JoinType::Right) {
            // inner predicates over the outer join's factors filter its result
            let extra = self.add_filters(&left, None, &right, filters, false);
            if extra.is_always_true() {
                join
            } else {
                PlanNode::filter(join, self.shift_to_order(&extra, &order))
            }
        } else {
            join
        };
        let node = self.arena.node(left.factor_tree(), right.factor_tree());
        JoinTree::new(plan, node, removable)
    }

    fn swap_inputs(&self, left: &JoinTree, right: &JoinTree, self_join: bool) -> bool {
        if self_join {
            // the left half of the pair belongs on the left
            return matches!(
                self.arena.get(right.factor_tree()),
                FactorTreeNode::Leaf(f) if self.graph.is_left_factor_in_removable_self_join(f)
            );
        }
        match (self.estimator.row_count(left.plan()), self.estimator.row_count(right.plan())) {
            (Some(l), Some(r)) => {
                l < r || ((l - r).abs() < self.config.cost_epsilon && row_width(left.plan()) < row_width(right.plan()))
            }
            _ => false,
        }
    }

    /// Remove the filters placeable over `left` (or only factor `left_factor` of it)
    /// and `right`, returning their conjunction.
    ///
    /// With `adjust`, the result is renumbered to `left ++ right`.
    fn add_filters(
        &self,
        left: &JoinTree,
        left_factor: Option<usize>,
        right: &JoinTree,
        filters: &mut Vec<Expr>,
        adjust: bool,
    ) -> Expr {
        let mut child_factors = right.factors(&self.arena);
        match left_factor {
            Some(f) => {
                child_factors.insert(f);
            }
            None => child_factors.union_with(&left.factors(&self.arena)),
        }

        let (placed, remaining): (Vec<Expr>, Vec<Expr>) = std::mem::take(filters)
            .into_iter()
            .partition(|f| self.graph.factors_ref_by_filter(f).is_subset(&child_factors));
        *filters = remaining;
        if placed.is_empty() {
            return Expr::true_literal();
        }

        let condition = Expr::and_all(placed);
        if adjust {
            let mut order = left.tree_order(&self.arena);
            order.extend(right.tree_order(&self.arena));
            self.shift_to_order(&condition, &order)
        } else {
            condition
        }
    }

    /// Renumber `expr` from multi-join coordinates to a row holding the factors
    /// of `order`, in that order.
    fn shift_to_order(&self, expr: &Expr, order: &[usize]) -> Expr {
        let graph = self.graph;
        let mut adjustments = vec![0isize; graph.total_fields()];
        let mut needed = false;
        let mut fields_before = 0;
        for &factor in order {
            let start = graph.join_start(factor);
            let n = graph.n_fields_in_factor(factor);
            let delta = fields_before as isize - start as isize;
            if delta != 0 {
                needed = true;
                adjustments[start..start + n].fill(delta);
            }
            fields_before += n;
        }
        if needed {
            expr.shift_inputs(&adjustments)
        } else {
            expr.clone()
        }
    }

    /// Renumber a join condition built over `orig_order` (which lacks `added`) to
    /// the order of `left ++ right`.
    fn adjust_filter(
        &self,
        left: &JoinTree,
        right: &JoinTree,
        condition: &Expr,
        added: usize,
        orig_order: &[usize],
    ) -> Expr {
        let graph = self.graph;
        let mut new_order = left.tree_order(&self.arena);
        new_order.extend(right.tree_order(&self.arena));
        let width = left.plan().field_count() + right.plan().field_count() - graph.n_fields_in_factor(added);

        let mut adjustments = vec![0isize; width];
        let mut needed = false;
        let mut fields_new = 0;
        for &factor in &new_order {
            let n = graph.n_fields_in_factor(factor);
            if factor != added {
                let fields_old: usize = orig_order
                    .iter()
                    .take_while(|&&f| f != factor)
                    .map(|&f| graph.n_fields_in_factor(f))
                    .sum();
                let delta = fields_new as isize - fields_old as isize;
                if delta != 0 {
                    needed = true;
                    adjustments[fields_old..fields_old + n].fill(delta);
                }
            }
            fields_new += n;
        }
        if needed {
            condition.shift_inputs(&adjustments)
        } else {
            condition.clone()
        }
    }

    /// Stand in for joining `dim` by reading its keys from the fact factor already
    /// in `tree`. `None` if the fact factor is not in `tree`.
    fn create_replacement_semijoin(
        &mut self,
        tree: &JoinTree,
        dim: usize,
        removal: &DimensionRemoval,
        filters: &mut Vec<Expr>,
    ) -> Option<JoinTree> {
        let graph = self.graph;
        let order = tree.tree_order(&self.arena);
        let fact_pos = order.iter().position(|&f| f == removal.fact_factor)?;
        let fact_offset: usize = order[..fact_pos].iter().map(|&f| graph.n_fields_in_factor(f)).sum();

        let mut replacement = vec![None; graph.n_fields_in_factor(dim)];
        let mut key_pairs = Vec::with_capacity(removal.fact_keys.len());
        let (fact_start, dim_start) = (graph.join_start(removal.fact_factor), graph.join_start(dim));
        for (&fact_key, &dim_key) in removal.fact_keys.iter().zip(&removal.dim_keys) {
            replacement[dim_key] = Some(fact_offset + fact_key);
            key_pairs.push((fact_start + fact_key, dim_start + dim_key));
        }
        // only the equalities the semijoin enforces go away with the join
        let enforced = |f: &Expr| {
            f.as_column_equality()
                .is_some_and(|(a, b)| key_pairs.contains(&(a, b)) || key_pairs.contains(&(b, a)))
        };
        trace!(dim, fact = removal.fact_factor, "replacing dimension join by fact keys");
        Some(self.create_replacement_join(tree, dim, &replacement, filters, enforced))
    }

    /// Append `factor`'s columns to `tree` without joining it: column `i` reads
    /// `replacement[i]` of the tree when given, and is NULL otherwise.
    ///
    /// Drops the predicates matched by `dropped` and filters the projection by any
    /// other predicate the tree now covers, which then reads the replacement
    /// columns.
    fn create_replacement_join(
        &mut self,
        tree: &JoinTree,
        factor: usize,
        replacement: &[Option<usize>],
        filters: &mut Vec<Expr>,
        dropped: impl Fn(&Expr) -> bool,
    ) -> JoinTree {
        let graph = self.graph;
        let current = tree.plan();
        let mut exprs: Vec<Expr> = (0..current.field_count()).map(|i| current.field_ref(i)).collect();
        let mut names: Vec<String> = current.fields().iter().map(|f| f.name.clone()).collect();
        for (i, field) in graph.factor(factor).fields().iter().enumerate() {
            let expr = match replacement.get(i).copied().flatten() {
                Some(source) => {
                    let input = current.field_ref(source);
                    if input.data_type() == field.data_type {
                        input
                    } else {
                        Expr::cast(input, field.data_type)
                    }
                }
                None => Expr::typed_null(field.data_type),
            };
            exprs.push(expr);
            names.push(field.name.clone());
        }
        let project = PlanNode::project_named(current.clone(), exprs, names);

        filters.retain(|f| !dropped(f));

        let new_leaf = self.leaf(factor);
        let extra = self.add_filters(tree, None, &new_leaf, filters, false);
        let plan = if extra.is_always_true() {
            project
        } else {
            let mut order = tree.tree_order(&self.arena);
            order.push(factor);
            PlanNode::filter(project, self.shift_to_order(&extra, &order))
        };
        let node = self.arena.node(tree.factor_tree(), new_leaf.factor_tree());
        JoinTree::new(plan, node, false)
    }

    /// Restore the multi-join column order above `tree`, then apply the unplaced
    /// filters and the post-join filter on top.
    fn finish(self, first: usize, tree: JoinTree, unplaced: Vec<Expr>) -> CandidateTree {
        let graph = self.graph;
        let mut starts = vec![0; graph.n_factors()];
        let mut position = 0;
        for factor in tree.tree_order(&self.arena) {
            starts[factor] = position;
            position += graph.n_fields_in_factor(factor);
        }

        let joins = tree.plan();
        let exprs: Vec<Expr> = (0..graph.n_factors())
            .flat_map(|f| (0..graph.n_fields_in_factor(f)).map(move |i| (f, i)))
            .map(|(f, i)| joins.field_ref(starts[f] + i))
            .collect();
        let names = graph.fields().iter().map(|f| f.name.clone()).collect();
        let mut plan = PlanNode::project_named(joins.clone(), exprs, names);
        if !unplaced.is_empty() {
            plan = PlanNode::filter(plan, Expr::and_all(unplaced));
        }
        if let Some(post) = graph.post_join_filter() {
            plan = PlanNode::filter(plan, post.clone());
        }

        let cost = self.estimator.cumulative_cost(&plan);
        CandidateTree { plan, tree, arena: self.arena, first_factor: first, cost }
    }
}

/// Renumber a condition over `left ++ right` to `right ++ left`.
fn swap_filter(condition: &Expr, n_left: usize, n_right: usize) -> Expr {
    let adjustments: Vec<isize> = (0..n_left)
        .map(|_| n_right as isize)
        .chain((0..n_right).map(|_| -(n_left as isize)))
        .collect();
    condition.shift_inputs(&adjustments)
}
