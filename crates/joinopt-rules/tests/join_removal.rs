//! End-to-end join removal tests.
//!
//! - An outer join to an unreferenced, unique-keyed table disappears and its
//!   columns become typed NULLs.
//! - A dimension whose semijoin covers everything the query needs from it is
//!   replaced by the fact table's key columns.
//! - A table joined with itself on its key ends up as one scan in `best_plan`.

mod common;

use common::*;
use joinopt_core::bitset::BitSet;
use joinopt_core::catalog::{IndexDef, InMemoryCatalog};
use joinopt_core::expr::{BinaryOp, DataType, Expr, TableRef};
use joinopt_core::join_graph::MultiJoin;
use joinopt_core::plan::{PlanKind, PlanNode};
use joinopt_rules::config::OptimizerConfig;
use joinopt_rules::{best_plan, optimize_multi_join};

// ---------------------------------------------------------------------------
// Outer joins
// ---------------------------------------------------------------------------

/// orders(id, cust_id) LEFT JOIN customer(id, name) ON orders.cust_id = customer.id,
/// with no customer column used above the join.
fn orders_customer(catalog: &mut InMemoryCatalog) -> MultiJoin {
    let orders = add_table(catalog, "orders", 1000.0, &[("id", 1000.0), ("cust_id", 100.0)]);
    let customer = add_table(catalog, "customer", 100.0, &[("id", 100.0), ("name", 100.0)]);
    catalog.add_unique_key(&TableRef::new("dw", "customer"), &[0]);
    MultiJoin::new(vec![orders, customer], Expr::true_literal())
        .with_outer_join(1, Expr::equals(col(1), col(2)))
        .with_projection_fields(0, BitSet::of([0, 1]))
        .with_projection_fields(1, BitSet::new())
}

#[test]
fn test_unused_outer_join_is_removed() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let mj = orders_customer(&mut catalog);
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 1);
    let plan = &candidates[0].plan;
    assert_eq!(scanned_tables(plan), vec!["orders"]);
    assert_eq!(count_nodes(plan, |k| matches!(k, PlanKind::Join { .. })), 0);
    assert_eq!(plan.fields().len(), 4);

    // the replacement projection pads customer's columns with NULLs
    let PlanKind::Project { exprs, .. } = candidates[0].tree.plan().kind() else {
        panic!("expected a replacement projection");
    };
    assert_eq!(exprs[2], Expr::typed_null(DataType::Int64));
    assert_eq!(exprs[3], Expr::typed_null(DataType::Int64));
    assert_eq!(candidates[0].tree_order(), vec![0, 1]);
}

#[test]
fn test_outer_join_kept_when_removal_disabled() {
    let mut catalog = InMemoryCatalog::new();
    let mj = orders_customer(&mut catalog);
    let config = OptimizerConfig { remove_outer_joins: false, ..Default::default() };
    let candidates = optimize_multi_join(&mj, &catalog, &config).unwrap();

    let mut tables = scanned_tables(&candidates[0].plan);
    tables.sort();
    assert_eq!(tables, vec!["customer", "orders"]);
    assert_eq!(count_nodes(&candidates[0].plan, |k| matches!(k, PlanKind::Join { .. })), 1);
}

// ---------------------------------------------------------------------------
// Dimension joins
// ---------------------------------------------------------------------------

#[test]
fn test_dimension_covered_by_semijoin_is_not_joined() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let sales = add_table(&mut catalog, "sales", 100_000.0, &[("prod_id", 1000.0), ("store_id", 50.0), ("amount", 500.0)]);
    let product = add_table(&mut catalog, "product", 1000.0, &[("id", 1000.0), ("category", 10.0)]);
    catalog.add_index(&TableRef::new("dw", "sales"), IndexDef::new("sales_prod", vec![0]));
    catalog.add_index(&TableRef::new("dw", "product"), IndexDef::new("product_pk", vec![0]).unique());
    let product = PlanNode::filter(product, Expr::equals(col(1), int(3)));
    // only product.id is needed above the join
    let mj = MultiJoin::new(vec![sales, product], Expr::equals(col(0), col(3)))
        .with_projection_fields(0, BitSet::of([0, 2]))
        .with_projection_fields(1, BitSet::of([0]));
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    let from_fact = candidates.iter().find(|c| c.first_factor == 0).expect("sales starts a candidate");
    let tree = from_fact.tree.plan();
    assert_eq!(count_nodes(tree, |k| matches!(k, PlanKind::Join { .. })), 0);
    assert_eq!(count_nodes(tree, |k| matches!(k, PlanKind::SemiJoin { .. })), 1);
    let PlanKind::Project { exprs, .. } = tree.kind() else {
        panic!("expected a replacement projection");
    };
    // product.id reads sales.prod_id; product.category is never read
    assert_eq!(exprs[3], col(0));
    assert_eq!(exprs[4], Expr::typed_null(DataType::Int64));

    // starting from the dimension, the fact is joined as usual
    let from_dim = candidates.iter().find(|c| c.first_factor == 1).expect("product starts a candidate");
    assert_eq!(count_nodes(from_dim.tree.plan(), |k| matches!(k, PlanKind::Join { .. })), 1);
}

/// sales(prod_id, store_id, amount) semijoined by product(id, category) on
/// prod_id, with only product.id used above the join and `extra` also joining
/// the two tables.
fn sales_product_with(catalog: &mut InMemoryCatalog, extra: Expr) -> MultiJoin {
    let sales = add_table(catalog, "sales", 100_000.0, &[("prod_id", 1000.0), ("store_id", 50.0), ("amount", 500.0)]);
    let product = add_table(catalog, "product", 1000.0, &[("id", 1000.0), ("category", 10.0)]);
    catalog.add_index(&TableRef::new("dw", "sales"), IndexDef::new("sales_prod", vec![0]));
    catalog.add_index(&TableRef::new("dw", "product"), IndexDef::new("product_pk", vec![0]).unique());
    let product = PlanNode::filter(product, Expr::equals(col(1), int(3)));
    MultiJoin::new(vec![sales, product], Expr::and_all(vec![Expr::equals(col(0), col(3)), extra]))
        .with_projection_fields(0, BitSet::of([0, 1, 2]))
        .with_projection_fields(1, BitSet::of([0]))
}

#[test]
fn test_removed_dimension_keeps_non_equi_predicate() {
    let mut catalog = InMemoryCatalog::new();
    let amount_above_id = Expr::binary(BinaryOp::Gt, col(2), col(3));
    let mj = sales_product_with(&mut catalog, amount_above_id.clone());
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    let from_fact = candidates.iter().find(|c| c.first_factor == 0).expect("sales starts a candidate");
    assert_eq!(count_nodes(from_fact.tree.plan(), |k| matches!(k, PlanKind::Join { .. })), 0);
    // the semijoin key equality goes away; the comparison reads the replacement column
    let placed = predicates(&from_fact.plan);
    assert!(placed.contains(&amount_above_id), "lost amount > id: {placed:?}");
    assert!(!placed.contains(&Expr::equals(col(0), col(3))));
}

#[test]
fn test_removed_dimension_keeps_equality_outside_semijoin() {
    let mut catalog = InMemoryCatalog::new();
    // the index only covers prod_id, so store_id = id is not part of the semijoin
    let store_is_id = Expr::equals(col(1), col(3));
    let mj = sales_product_with(&mut catalog, store_is_id.clone());
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    let from_fact = candidates.iter().find(|c| c.first_factor == 0).expect("sales starts a candidate");
    assert_eq!(count_nodes(from_fact.tree.plan(), |k| matches!(k, PlanKind::SemiJoin { .. })), 1);
    let placed = predicates(&from_fact.plan);
    assert!(placed.contains(&store_is_id), "lost store_id = id: {placed:?}");
    assert!(!placed.contains(&Expr::equals(col(0), col(3))));
}

// ---------------------------------------------------------------------------
// Self-joins
// ---------------------------------------------------------------------------

/// emp(id, dept, salary) joined with its high earners on id, and with dept(id, name).
fn emp_self_join(catalog: &mut InMemoryCatalog) -> MultiJoin {
    let emp = add_table(catalog, "emp", 500.0, &[("id", 500.0), ("dept", 20.0), ("salary", 100.0)]);
    let dept = add_table(catalog, "dept", 20.0, &[("id", 20.0), ("name", 20.0)]);
    catalog.add_unique_key(&TableRef::new("dw", "emp"), &[0]);
    let high = PlanNode::filter(emp.clone(), Expr::binary(BinaryOp::Gt, col(2), int(1000)));
    // emp.id = high.id AND emp.dept = dept.id
    MultiJoin::new(
        vec![emp, high, dept],
        Expr::and_all(vec![Expr::equals(col(0), col(3)), Expr::equals(col(1), col(6))]),
    )
}

#[test]
fn test_self_join_halves_stay_adjacent() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let mj = emp_self_join(&mut catalog);
    let config = OptimizerConfig { enable_semijoins: false, ..Default::default() };
    let candidates = optimize_multi_join(&mj, &catalog, &config).unwrap();

    assert_eq!(candidates.len(), 3);
    for candidate in &candidates {
        let flagged = count_nodes(&candidate.plan, |k| {
            matches!(k, PlanKind::Join { removable_self_join: true, .. })
        });
        assert_eq!(flagged, 1, "tree {}", candidate.factor_tree_display());
        let order = candidate.tree_order();
        let pos0 = order.iter().position(|&f| f == 0).unwrap();
        let pos1 = order.iter().position(|&f| f == 1).unwrap();
        assert_eq!(pos1, pos0 + 1, "emp must sit directly left of its copy in {order:?}");
    }
}

#[test]
fn test_best_plan_collapses_self_join() {
    let mut catalog = InMemoryCatalog::new();
    let mj = emp_self_join(&mut catalog);
    let config = OptimizerConfig { enable_semijoins: false, ..Default::default() };
    let plan = best_plan(&mj, &catalog, &config).unwrap().expect("a plan");

    let mut tables = scanned_tables(&plan);
    tables.sort();
    assert_eq!(tables, vec!["dept", "emp"]);
    assert_eq!(count_nodes(&plan, |k| matches!(k, PlanKind::Join { .. })), 1);
    assert_eq!(plan.fields(), mj.fields().as_slice());
}
