//! # Cost Model
//!
//! Costs are single numbers: a fragment's cumulative cost is its own work plus the
//! cumulative cost of its inputs. Lower is better.
//!
//! ## Per-Operator Rules
//!
//! ```text
//! scan       sqrt(rows * rows * sel)       sel = sargable and artificial selectivity
//!                                          of the filters pushed into the scan
//! join       cost(left) + cost(right) + rows(join) * 10^(min/max)
//!                                          min/max of the input row counts; exponent
//!                                          1 when the condition has no equi-join keys
//! semijoin   cost(kept side with the semijoin's selectivity pushed into it)
//!              + cost(other side) + rows(other side)
//! aggregate  3 * rows(out) + rows(in) + cost(in)
//! union      sum of the inputs' costs
//! ```
//!
//! Filters and projections have no cost of their own. A filter's predicate is pushed
//! into its input's estimate, so a filter directly above a scan lowers the scan
//! cost by the predicate's sargable share. A projection passes pushed predicates
//! through by substituting its expressions.
//!
//! ## Unknown Costs
//!
//! Every rule needs row counts, so a missing statistic anywhere below a node makes
//! that node's cost `None`. Callers rank unknown costs behind known ones.

use crate::expr::{Expr, JoinType};
use crate::metadata::Estimator;
use crate::plan::{PlanKind, PlanRef};
use serde::{Deserialize, Serialize};

/// Estimated cost of a plan fragment. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }

    /// Whether the two costs are within `epsilon` of each other.
    pub fn approx_eq(&self, other: &Cost, epsilon: f64) -> bool {
        (self.total - other.total).abs() < epsilon
    }

    pub fn is_less_than(&self, other: &Cost) -> bool {
        self.total < other.total
    }
}

impl std::ops::Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(self.total + rhs.total)
    }
}

/// Epsilon-based equality to handle floating-point imprecision in cost comparisons.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.total)
    }
}

/// Per-row penalty exponent base for joins.
const JOIN_COST_BASE: f64 = 10.0;

/// Aggregation cost per output row.
const AGGREGATE_OUTPUT_ROW_COST: f64 = 3.0;

impl Estimator<'_> {
    /// Total cost of evaluating `node` and all of its inputs.
    pub fn cumulative_cost(&self, node: &PlanRef) -> Option<Cost> {
        if let Some(cached) = self.cumulative_costs.borrow().get(&node.id()) {
            return *cached;
        }
        let cost = self.compute_cost(node, None);
        self.cumulative_costs.borrow_mut().insert(node.id(), cost);
        cost
    }

    /// Cumulative cost of `node` as if `filter` were applied on top of it and pushed
    /// as far down as the cost rules allow.
    pub fn cost_with_filters(&self, node: &PlanRef, filter: Option<&Expr>) -> Option<Cost> {
        match filter.filter(|f| !f.is_always_true()) {
            None => self.cumulative_cost(node),
            Some(f) => self.compute_cost(node, Some(f)),
        }
    }

    fn compute_cost(&self, node: &PlanRef, filter: Option<&Expr>) -> Option<Cost> {
        match node.kind() {
            PlanKind::Scan { table } => {
                let rows = self.row_count(node)?;
                let sel = self.scan_selectivity(node, table, filter, true);
                Some(Cost::new((rows * rows * sel).sqrt()))
            }
            PlanKind::Filter { input, predicate } => {
                let combined = Expr::and_opt(filter.cloned(), Some(predicate.clone()));
                self.cost_with_filters(input, combined.as_ref())
            }
            PlanKind::Project { input, exprs } => {
                let pushed = filter.and_then(|f| f.substitute_inputs(exprs));
                self.cost_with_filters(input, pushed.as_ref())
            }
            PlanKind::Join { left, right, condition, .. } => {
                let left_cost = self.cumulative_cost(left)?;
                let right_cost = self.cumulative_cost(right)?;
                let rows = self.row_count(node)?;
                let left_rows = self.row_count(left)?;
                let right_rows = self.row_count(right)?;
                let exponent = if condition.split_join_condition(left.field_count()).is_equi() {
                    let (min, max) = if left_rows < right_rows {
                        (left_rows, right_rows)
                    } else {
                        (right_rows, left_rows)
                    };
                    if max > 0.0 {
                        min / max
                    } else {
                        1.0
                    }
                } else {
                    1.0
                };
                Some(left_cost + right_cost + Cost::new(rows * JOIN_COST_BASE.powf(exponent)))
            }
            PlanKind::SemiJoin { left, right, join_type, left_keys, right_keys, .. } => {
                let (kept, other, kept_keys, other_keys) = if *join_type == JoinType::Anti {
                    (right, left, right_keys, left_keys)
                } else {
                    (left, right, left_keys, right_keys)
                };
                let mut sel = self.semijoin_selectivity(kept, other, kept_keys, other_keys);
                if *join_type == JoinType::Anti {
                    sel = 1.0 - sel;
                }
                let pushed = Expr::and_opt(filter.cloned(), Some(Expr::selectivity(sel)));
                let kept_cost = self.cost_with_filters(kept, pushed.as_ref())?;
                Some(kept_cost + self.cumulative_cost(other)? + Cost::new(self.row_count(other)?))
            }
            PlanKind::Aggregate { input, .. } => {
                let out_rows = self.row_count(node)?;
                let in_rows = self.row_count(input)?;
                Some(Cost::new(AGGREGATE_OUTPUT_ROW_COST * out_rows + in_rows) + self.cumulative_cost(input)?)
            }
            PlanKind::Union { inputs } => {
                let mut total = Cost::zero();
                for input in inputs {
                    total = total + self.cumulative_cost(input)?;
                }
                Some(total)
            }
        }
    }
}
