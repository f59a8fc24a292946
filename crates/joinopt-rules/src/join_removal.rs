//! # Join Removal Detection
//!
//! Two kinds of joins can be dropped without changing the result. Both are
//! detected here and recorded on the [`JoinGraph`]; the enumerator and the
//! self-join collapse pass act on the marks.
//!
//! ## Outer Joins
//!
//! A null-generating factor can be removed when none of its columns is projected,
//! its only references are the equality keys of its own outer-join condition, and
//! those keys are unique. Each probe row then matches at most one row and nothing
//! reads the matched columns, so the join neither duplicates nor filters rows.
//! Removing a factor releases its references to other factors, which may in turn
//! make another null-generating factor removable, so detection repeats until no
//! factor changes.
//!
//! ## Self-Joins
//!
//! Two inner factors that read the same base table through plain scans, joined on
//! the same unique column on both sides, return each row paired with itself. Such
//! pairs are marked so the enumerator keeps them adjacent and flags their join for
//! [`remove_self_joins`](crate::self_join::remove_self_joins).

use joinopt_core::bitset::BitSet;
use joinopt_core::expr::{Expr, TableRef};
use joinopt_core::join_graph::JoinGraph;
use joinopt_core::metadata::Estimator;
use std::collections::BTreeMap;
use tracing::debug;

/// Mark every removable null-generating factor.
pub fn find_removable_outer_joins(graph: &mut JoinGraph, estimator: &Estimator<'_>) {
    let mut candidates: Vec<usize> = (0..graph.n_factors()).filter(|&i| graph.is_null_generating(i)).collect();

    while !candidates.is_empty() {
        let mut retry = BitSet::new();
        for factor in candidates {
            if graph.is_removable_outer_join_factor(factor) {
                continue;
            }
            let Some((keys, other_keys)) = outer_join_keys(graph, factor) else {
                continue;
            };
            if estimator.columns_unique(graph.factor(factor), &keys) != Some(true) {
                continue;
            }

            debug!(factor, keys = %keys, "outer join is removable");
            graph.add_removable_outer_join_factor(factor);
            for other in other_keys.iter() {
                let other_factor = graph.find_ref(other);
                graph.decrement_join_field_ref_count(other);
                if graph.is_null_generating(other_factor) {
                    retry.insert(other_factor);
                }
            }
        }
        candidates = retry.to_vec();
    }
}

/// Key columns of `factor` (relative) and the columns they equal on the other side
/// (absolute), if the factor is referenced by nothing but those keys.
fn outer_join_keys(graph: &JoinGraph, factor: usize) -> Option<(BitSet, BitSet)> {
    if !graph.projection_fields(factor).is_some_and(BitSet::is_empty) {
        return None;
    }
    let condition = graph.outer_join_condition(factor)?;
    let start = graph.join_start(factor);
    let end = start + graph.n_fields_in_factor(factor);
    let inside = |field: usize| (start..end).contains(&field);

    let mut keys = BitSet::new();
    let mut other_keys = BitSet::new();
    for conjunct in condition.conjuncts() {
        let Some((a, b)) = conjunct.as_column_equality() else {
            continue;
        };
        match (inside(a), inside(b)) {
            (true, false) => {
                keys.insert(a - start);
                other_keys.insert(b);
            }
            (false, true) => {
                keys.insert(b - start);
                other_keys.insert(a);
            }
            _ => {}
        }
    }
    if keys.is_empty() {
        return None;
    }

    let referenced_elsewhere = graph
        .join_field_ref_counts(factor)
        .iter()
        .enumerate()
        .any(|(i, &count)| count > 1 || (count == 1 && !keys.contains(i)));
    if referenced_elsewhere {
        return None;
    }
    Some((keys, other_keys))
}

/// Mark pairs of factors that join a table with itself on a unique key.
pub fn find_removable_self_joins(graph: &mut JoinGraph, estimator: &Estimator<'_>) {
    let simple = simple_factors(graph, estimator);

    // pair each factor with the first later factor over the same table
    let mut used_tables: Vec<&TableRef> = Vec::new();
    let mut pairs = Vec::new();
    for (i, (left, table)) in simple.iter().enumerate() {
        if used_tables.contains(&table) {
            continue;
        }
        if let Some((right, _)) = simple.iter().skip(i + 1).find(|(_, other)| *other == table) {
            pairs.push((*left, *right));
            used_tables.push(table);
        }
    }

    for (left, right) in pairs {
        let filters: Vec<Expr> = graph
            .join_filters()
            .iter()
            .filter(|f| {
                let factors = graph.factors_ref_by_filter(f);
                factors.len() == 2 && factors.contains(left) && factors.contains(right)
            })
            .cloned()
            .collect();
        if filters.is_empty() {
            continue;
        }
        if self_join_keys_unique(graph, estimator, left, right, Expr::and_all(filters)) {
            debug!(left, right, "self-join is removable");
            graph.add_removable_self_join_pair(left, right);
        }
    }
}

/// Inner factors whose columns all come unchanged from one base table, in factor order.
fn simple_factors(graph: &JoinGraph, estimator: &Estimator<'_>) -> BTreeMap<usize, TableRef> {
    if graph.is_full_outer_join() {
        return BTreeMap::new();
    }
    (0..graph.n_factors())
        .filter(|&i| !graph.is_null_generating(i) && graph.join_removal_factor(i).is_none())
        .filter_map(|i| estimator.table_origin(graph.factor(i)).map(|t| (i, t)))
        .collect()
}

fn self_join_keys_unique(graph: &JoinGraph, estimator: &Estimator<'_>, left: usize, right: usize, filter: Expr) -> bool {
    let left_plan = graph.factor(left);
    let right_plan = graph.factor(right);
    let n_left = graph.n_fields_in_factor(left);

    // renumber to left ++ right
    let mut adjustments = vec![0isize; graph.total_fields()];
    let left_start = graph.join_start(left);
    for slot in &mut adjustments[left_start..left_start + n_left] {
        *slot = -(left_start as isize);
    }
    let right_start = graph.join_start(right);
    for slot in &mut adjustments[right_start..right_start + graph.n_fields_in_factor(right)] {
        *slot = n_left as isize - right_start as isize;
    }
    let keys = filter.shift_inputs(&adjustments).split_join_condition(n_left);
    if !keys.is_equi() {
        return false;
    }

    let same_columns = keys.left_keys.iter().zip(&keys.right_keys).all(|(&l, &r)| {
        match (estimator.column_origin(left_plan, l), estimator.column_origin(right_plan, r)) {
            (Some((_, lcol)), Some((_, rcol))) => lcol == rcol,
            _ => false,
        }
    });
    same_columns && estimator.columns_unique(left_plan, &keys.left_keys.iter().copied().collect()) == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use joinopt_core::catalog::{IndexDef, InMemoryCatalog};
    use joinopt_core::expr::{DataType, Field, ScalarValue};
    use joinopt_core::join_graph::MultiJoin;
    use joinopt_core::plan::{PlanNode, PlanRef};
    use joinopt_core::stats::{ColumnStatistics, Statistics};

    fn col(i: usize) -> Expr {
        Expr::input_ref(i, DataType::Int64)
    }

    fn table(c: &mut InMemoryCatalog, name: &str, rows: f64, cols: &[&str]) -> PlanRef {
        let t = TableRef::new("app", name);
        let fields: Vec<Field> = cols.iter().map(|n| Field::new(*n, DataType::Int64, false)).collect();
        let mut stats = Statistics::new(rows, rows * 16.0);
        for n in cols {
            stats = stats.with_column(*n, ColumnStatistics::new(rows, 0.0));
        }
        c.add_table(&t, fields.clone(), stats);
        PlanNode::scan(t, fields)
    }

    /// orders(id, cust_id) LEFT JOIN customer(id, name) ON cust_id = customer.id
    fn orders_customer(c: &mut InMemoryCatalog) -> MultiJoin {
        let orders = table(c, "orders", 1000.0, &["id", "cust_id"]);
        let customer = table(c, "customer", 100.0, &["id", "name"]);
        c.add_unique_key(&TableRef::new("app", "customer"), &[0]);
        MultiJoin::new(vec![orders, customer], Expr::true_literal())
            .with_outer_join(1, Expr::equals(col(1), col(2)))
            .with_projection_fields(0, BitSet::of([0, 1]))
            .with_projection_fields(1, BitSet::new())
    }

    #[test]
    fn test_unreferenced_unique_outer_join_is_removed() {
        let mut c = InMemoryCatalog::new();
        let mj = orders_customer(&mut c);
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_outer_joins(&mut graph, &Estimator::new(&c));
        assert!(graph.is_removable_outer_join_factor(1));
        assert_eq!(graph.join_field_ref_counts(0), &[0, 0]);
    }

    #[test]
    fn test_projected_outer_join_is_kept() {
        let mut c = InMemoryCatalog::new();
        let mj = orders_customer(&mut c).with_projection_fields(1, BitSet::of([1]));
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_outer_joins(&mut graph, &Estimator::new(&c));
        assert!(!graph.is_removable_outer_join_factor(1));

        // unknown projection is treated as "everything is used"
        let mut c = InMemoryCatalog::new();
        let mut mj = orders_customer(&mut c);
        mj.projection_fields[1] = None;
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_outer_joins(&mut graph, &Estimator::new(&c));
        assert!(!graph.is_removable_outer_join_factor(1));
    }

    #[test]
    fn test_non_unique_outer_join_is_kept() {
        let mut c = InMemoryCatalog::new();
        let orders = table(&mut c, "orders", 1000.0, &["id", "cust_id"]);
        let visits = table(&mut c, "visits", 100.0, &["cust_id", "day"]);
        let mj = MultiJoin::new(vec![orders, visits], Expr::true_literal())
            .with_outer_join(1, Expr::equals(col(1), col(2)))
            .with_projection_fields(1, BitSet::new());
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_outer_joins(&mut graph, &Estimator::new(&c));
        assert!(!graph.is_removable_outer_join_factor(1));
    }

    #[test]
    fn test_removal_cascades_to_outer_join_it_referenced() {
        let mut c = InMemoryCatalog::new();
        // orders LEFT JOIN customer ON orders.cust_id = customer.id
        //        LEFT JOIN region ON customer.region_id = region.id
        let orders = table(&mut c, "orders", 1000.0, &["id", "cust_id"]);
        let customer = table(&mut c, "customer", 100.0, &["id", "region_id"]);
        let region = table(&mut c, "region", 10.0, &["id", "name"]);
        c.add_unique_key(&TableRef::new("app", "customer"), &[0]);
        c.add_unique_key(&TableRef::new("app", "region"), &[0]);
        let mj = MultiJoin::new(vec![orders, customer, region], Expr::true_literal())
            .with_outer_join(1, Expr::equals(col(1), col(2)))
            .with_outer_join(2, Expr::equals(col(3), col(4)))
            .with_projection_fields(0, BitSet::of([0]))
            .with_projection_fields(1, BitSet::new())
            .with_projection_fields(2, BitSet::new());
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_outer_joins(&mut graph, &Estimator::new(&c));
        assert!(graph.is_removable_outer_join_factor(2));
        assert!(graph.is_removable_outer_join_factor(1));
    }

    #[test]
    fn test_self_join_on_unique_key_is_marked() {
        let mut c = InMemoryCatalog::new();
        let emp = table(&mut c, "emp", 500.0, &["id", "dept", "salary"]);
        c.add_index(&TableRef::new("app", "emp"), IndexDef::new("emp_pk", vec![0]).unique());
        let high = PlanNode::filter(emp.clone(), Expr::binary(
            joinopt_core::expr::BinaryOp::Gt,
            col(2),
            Expr::literal(ScalarValue::Int64(1000)),
        ));
        let mj = MultiJoin::new(vec![emp, high], Expr::equals(col(0), col(3)));
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_self_joins(&mut graph, &Estimator::new(&c));
        assert_eq!(graph.other_self_join_factor(0), Some(1));
        assert_eq!(graph.other_self_join_factor(1), Some(0));
        assert!(graph.is_left_factor_in_removable_self_join(0));
        assert!(!graph.is_left_factor_in_removable_self_join(1));
    }

    #[test]
    fn test_self_join_on_different_columns_is_not_marked() {
        let mut c = InMemoryCatalog::new();
        let emp = table(&mut c, "emp", 500.0, &["id", "manager_id"]);
        let boss = table(&mut c, "emp", 500.0, &["id", "manager_id"]);
        c.add_unique_key(&TableRef::new("app", "emp"), &[0]);
        let mj = MultiJoin::new(vec![emp, boss], Expr::equals(col(1), col(2)));
        let mut graph = JoinGraph::new(&mj).unwrap();
        find_removable_self_joins(&mut graph, &Estimator::new(&c));
        assert_eq!(graph.other_self_join_factor(0), None);
    }
}
