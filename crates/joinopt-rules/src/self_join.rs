//! # Self-Join Collapse
//!
//! The enumerator flags the join between the two halves of a removable self-join
//! (see [`find_removable_self_joins`](crate::join_removal::find_removable_self_joins)).
//! This pass replaces each flagged join by a single scan of the shared table.
//!
//! ## What It Does
//!
//! Both sides must be a scan of the same table, optionally filtered and then
//! projected. The join keys equate a unique column with itself, so every row
//! joins exactly with itself (rows with a NULL key join with nothing):
//!
//! ```text
//! Before: Join(Project(ls, Filter(lp, Scan t)), Project(rs, Filter(rp, Scan t)), $a = $b)
//! After:  Project(ls ++ rs, Filter(lp AND rp AND key IS NOT NULL, Scan t))
//! ```
//!
//! Conjuncts of the join condition that do not equate a column with itself are
//! kept in the filter. Nullable key columns get an `IS NOT NULL` test in place of
//! the equality. The output row is unchanged, so nothing above the join moves.
//!
//! Flagged joins whose sides are not of this shape are left in place.

use joinopt_core::expr::{Expr, TableRef};
use joinopt_core::plan::{PlanKind, PlanNode, PlanRef};
use std::sync::Arc;
use tracing::debug;

/// Collapse every flagged self-join in `plan` into a single scan.
pub fn remove_self_joins(plan: &PlanRef) -> PlanRef {
    match plan.kind() {
        PlanKind::Filter { input, predicate } => {
            let new_input = remove_self_joins(input);
            if Arc::ptr_eq(&new_input, input) {
                plan.clone()
            } else {
                PlanNode::filter(new_input, predicate.clone())
            }
        }
        PlanKind::Project { input, exprs } => {
            let new_input = remove_self_joins(input);
            if Arc::ptr_eq(&new_input, input) {
                plan.clone()
            } else {
                let names = plan.fields().iter().map(|f| f.name.clone()).collect();
                PlanNode::project_named(new_input, exprs.clone(), names)
            }
        }
        PlanKind::Join { left, right, join_type, condition, removable_self_join } => {
            let new_left = remove_self_joins(left);
            let new_right = remove_self_joins(right);
            if *removable_self_join {
                if let Some(collapsed) = collapse(plan, &new_left, &new_right, condition) {
                    return collapsed;
                }
            }
            if Arc::ptr_eq(&new_left, left) && Arc::ptr_eq(&new_right, right) {
                plan.clone()
            } else {
                PlanNode::join_with_flag(new_left, new_right, *join_type, condition.clone(), *removable_self_join)
            }
        }
        _ => plan.clone(),
    }
}

/// A side of a self-join: its columns as expressions over the table's scan.
struct ScanSide {
    table: TableRef,
    scan: PlanRef,
    filter: Option<Expr>,
    exprs: Vec<Expr>,
}

fn scan_side(plan: &PlanRef) -> Option<ScanSide> {
    let (exprs, below_project) = match plan.kind() {
        PlanKind::Project { input, exprs } => (Some(exprs.clone()), input),
        _ => (None, plan),
    };
    let (filter, scan) = match below_project.kind() {
        PlanKind::Filter { input, predicate } => (Some(predicate.clone()), input),
        _ => (None, below_project),
    };
    let PlanKind::Scan { table } = scan.kind() else {
        return None;
    };
    let exprs = exprs.unwrap_or_else(|| (0..scan.field_count()).map(|i| scan.field_ref(i)).collect());
    Some(ScanSide { table: table.clone(), scan: scan.clone(), filter, exprs })
}

fn collapse(join: &PlanRef, left: &PlanRef, right: &PlanRef, condition: &Expr) -> Option<PlanRef> {
    let left_side = scan_side(left)?;
    let right_side = scan_side(right)?;
    if left_side.table != right_side.table {
        return None;
    }
    let scan = left_side.scan;

    let mut exprs = left_side.exprs;
    exprs.extend(right_side.exprs);
    let over_scan = condition.substitute_inputs(&exprs)?;

    let mut predicates: Vec<Expr> = left_side.filter.into_iter().chain(right_side.filter).collect();
    for conjunct in over_scan.into_conjuncts() {
        match conjunct.as_column_equality() {
            Some((a, b)) if a == b => {
                if scan.fields()[a].nullable {
                    predicates.push(Expr::is_not_null(scan.field_ref(a)));
                }
            }
            _ => predicates.push(conjunct),
        }
    }

    let filtered = if predicates.is_empty() {
        scan
    } else {
        PlanNode::filter(scan, Expr::and_all(predicates))
    };
    let names = join.fields().iter().map(|f| f.name.clone()).collect();
    debug!(table = %left_side.table, "collapsed self-join into a single scan");
    Some(PlanNode::project_named(filtered, exprs, names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joinopt_core::expr::{BinaryOp, DataType, Field, JoinType, ScalarValue};

    fn col(i: usize) -> Expr {
        Expr::input_ref(i, DataType::Int64)
    }

    fn emp() -> PlanRef {
        PlanNode::scan(
            TableRef::new("hr", "emp"),
            vec![
                Field::new("id", DataType::Int64, true),
                Field::new("salary", DataType::Int64, false),
            ],
        )
    }

    #[test]
    fn test_flagged_self_join_becomes_one_scan() {
        let left = emp();
        let right = PlanNode::filter(
            emp(),
            Expr::binary(BinaryOp::Gt, col(1), Expr::literal(ScalarValue::Int64(100))),
        );
        let join = PlanNode::join_with_flag(left, right, JoinType::Inner, Expr::equals(col(0), col(2)), true);
        let top = PlanNode::project(join.clone(), vec![col(1), col(3)]);

        let rewritten = remove_self_joins(&top);
        let PlanKind::Project { input, exprs } = rewritten.kind() else {
            panic!("expected the top projection to survive");
        };
        assert_eq!(exprs, &vec![col(1), col(3)]);
        assert_eq!(input.fields(), join.fields());

        let PlanKind::Project { input: filtered, exprs: scan_exprs } = input.kind() else {
            panic!("expected a projection over the collapsed scan");
        };
        assert_eq!(scan_exprs, &vec![col(0), col(1), col(0), col(1)]);
        let PlanKind::Filter { input: scan, predicate } = filtered.kind() else {
            panic!("expected a filter over the scan");
        };
        assert!(matches!(scan.kind(), PlanKind::Scan { .. }));
        let conjuncts = predicate.conjuncts();
        assert_eq!(conjuncts.len(), 2);
        assert!(conjuncts.contains(&&Expr::is_not_null(col(0))));
    }

    #[test]
    fn test_unflagged_or_mismatched_joins_are_kept() {
        let plain = PlanNode::join(emp(), emp(), JoinType::Inner, Expr::equals(col(0), col(2)));
        assert!(Arc::ptr_eq(&remove_self_joins(&plain), &plain));

        let other = PlanNode::scan(TableRef::new("hr", "dept"), vec![Field::new("id", DataType::Int64, false)]);
        let mixed = PlanNode::join_with_flag(emp(), other, JoinType::Inner, Expr::equals(col(0), col(2)), true);
        assert!(remove_self_joins(&mixed).is_join());
    }
}
