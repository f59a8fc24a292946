//! Join graph and estimator over a small star schema.
//!
//! sales(prod_id, store_id) is the fact table; product(id) and store(id) are its
//! dimensions. These tests check the derived join-graph tables together with the
//! estimates the enumerator relies on when it prices partial trees.

use approx::assert_relative_eq;
use joinopt_core::bitset::BitSet;
use joinopt_core::catalog::InMemoryCatalog;
use joinopt_core::error::OptimizeError;
use joinopt_core::expr::{DataType, Expr, Field, JoinType, TableRef};
use joinopt_core::join_graph::{JoinGraph, MultiJoin};
use joinopt_core::metadata::Estimator;
use joinopt_core::plan::{PlanNode, PlanRef};
use joinopt_core::stats::{ColumnStatistics, Statistics};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn col(i: usize) -> Expr {
    Expr::input_ref(i, DataType::Int64)
}

fn add_table(catalog: &mut InMemoryCatalog, name: &str, rows: f64, cols: &[(&str, f64)]) -> PlanRef {
    let table = TableRef::new("dw", name);
    let fields: Vec<Field> = cols.iter().map(|(n, _)| Field::new(*n, DataType::Int64, false)).collect();
    let mut stats = Statistics::new(rows, rows * 8.0 * cols.len() as f64);
    for (n, ndv) in cols {
        stats = stats.with_column(*n, ColumnStatistics::new(*ndv, 0.0));
    }
    catalog.add_table(&table, fields.clone(), stats);
    PlanNode::scan(table, fields)
}

fn star(catalog: &mut InMemoryCatalog) -> (PlanRef, PlanRef, PlanRef) {
    let sales = add_table(catalog, "sales", 100_000.0, &[("prod_id", 1000.0), ("store_id", 50.0)]);
    let product = add_table(catalog, "product", 1000.0, &[("id", 1000.0)]);
    let store = add_table(catalog, "store", 50.0, &[("id", 50.0)]);
    (sales, product, store)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_star_join_graph() {
    let mut catalog = InMemoryCatalog::new();
    let (sales, product, store) = star(&mut catalog);
    // sales.prod_id = product.id AND sales.store_id = store.id
    let mj = MultiJoin::new(
        vec![sales, product, store],
        Expr::and_all(vec![Expr::equals(col(0), col(2)), Expr::equals(col(1), col(3))]),
    );
    let graph = JoinGraph::new(&mj).unwrap();

    assert_eq!(graph.n_factors(), 3);
    assert_eq!(graph.total_fields(), 4);
    assert_eq!((graph.join_start(2), graph.n_fields_in_factor(2)), (3, 1));
    assert_eq!(graph.find_ref(1), 0);
    assert_eq!(graph.find_ref(3), 2);

    assert_eq!(graph.factor_weight(0, 1), 3);
    assert_eq!(graph.factor_weight(0, 2), 3);
    assert_eq!(graph.factor_weight(1, 2), 0);
    assert_eq!(graph.factors_ref_by_factor(0), &BitSet::of([1, 2]));
    assert_eq!(graph.factors_ref_by_factor(1), &BitSet::of([0]));
    assert_eq!(graph.join_field_ref_counts(0), &[1, 1]);
}

#[test]
fn test_fact_dimension_join_estimates() {
    let mut catalog = InMemoryCatalog::new();
    let (sales, product, store) = star(&mut catalog);
    let est = Estimator::new(&catalog);

    // 100_000 * 1000 / max(1000, 1000)
    let sales_product = PlanNode::join(sales.clone(), product, JoinType::Inner, Expr::equals(col(0), col(2)));
    assert_relative_eq!(est.row_count(&sales_product).unwrap(), 100_000.0);

    // an outer join keeps at least its preserved side
    let left = est
        .join_row_count(&store, &sales, JoinType::Left, Some(&Expr::equals(col(0), col(2))))
        .unwrap();
    assert!(left >= 50.0);

    let cost = est.cumulative_cost(&sales_product).unwrap();
    assert!(cost.total > est.cumulative_cost(&sales).unwrap().total);
}

#[test]
fn test_malformed_multi_joins() {
    let mut catalog = InMemoryCatalog::new();
    let (sales, product, store) = star(&mut catalog);

    let mut three_way_full = MultiJoin::new(vec![sales.clone(), product.clone(), store], Expr::true_literal());
    three_way_full.is_full_outer_join = true;
    assert_eq!(JoinGraph::new(&three_way_full).unwrap_err(), OptimizeError::FullOuterJoinFactorCount(3));

    let out_of_range = MultiJoin::new(vec![sales, product], Expr::equals(col(0), col(7)));
    assert_eq!(
        JoinGraph::new(&out_of_range).unwrap_err(),
        OptimizeError::InputRefOutOfRange { index: 7, total_fields: 3 }
    );
}
