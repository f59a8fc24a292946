//! End-to-end join ordering tests over small chain, star and outer-join graphs.
//!
//! Each test builds a `MultiJoin` over scans registered in an in-memory catalog,
//! runs `optimize_multi_join` and checks structural properties of the candidates:
//!
//! - one candidate per admissible first factor, ranked by cost;
//! - every factor appears exactly once and every join predicate is placed;
//! - null-generating factors stay on the null-generating side of their outer join;
//! - the smaller input ends up on the right of each join;
//! - semijoins are chosen only when they pay off.

mod common;

use approx::assert_relative_eq;
use common::*;
use joinopt_core::bitset::BitSet;
use joinopt_core::catalog::{IndexDef, InMemoryCatalog};
use joinopt_core::error::OptimizeError;
use joinopt_core::expr::{Expr, JoinType, TableRef};
use joinopt_core::join_graph::MultiJoin;
use joinopt_core::plan::{PlanKind, PlanNode, PlanRef};
use joinopt_rules::config::OptimizerConfig;
use joinopt_rules::optimize_multi_join;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// a(x) 1000 rows, b(x, y) 10 rows, c(y) 100 rows; a.x = b.x AND b.y = c.y.
fn three_way(catalog: &mut InMemoryCatalog) -> MultiJoin {
    let a = add_table(catalog, "a", 1000.0, &[("x", 100.0)]);
    let b = add_table(catalog, "b", 10.0, &[("x", 10.0), ("y", 10.0)]);
    let c = add_table(catalog, "c", 100.0, &[("y", 50.0)]);
    MultiJoin::new(
        vec![a, b, c],
        Expr::and_all(vec![Expr::equals(col(0), col(1)), Expr::equals(col(2), col(3))]),
    )
}

/// Non-trivial conjuncts in the join conditions and filters of `plan`.
fn placed_predicates(plan: &PlanRef) -> usize {
    let mut n = 0;
    walk(plan, &mut |node| match node.kind() {
        PlanKind::Join { condition, .. } => {
            n += condition.conjuncts().iter().filter(|c| !c.is_always_true()).count();
        }
        PlanKind::Filter { predicate, .. } => n += predicate.conjuncts().len(),
        _ => {}
    });
    n
}

/// sales(prod_id, store_id, amount) with a secondary index on prod_id, and
/// product(id, category) keyed on id, filtered on its category.
fn sales_product(catalog: &mut InMemoryCatalog, sales_rows: f64) -> MultiJoin {
    let sales = add_table(catalog, "sales", sales_rows, &[("prod_id", 1000.0), ("store_id", 50.0), ("amount", 500.0)]);
    let product = add_table(catalog, "product", 1000.0, &[("id", 1000.0), ("category", 10.0)]);
    catalog.add_index(&TableRef::new("dw", "sales"), IndexDef::new("sales_prod", vec![0]));
    catalog.add_index(&TableRef::new("dw", "product"), IndexDef::new("product_pk", vec![0]).unique());
    let product = PlanNode::filter(product, Expr::equals(col(1), int(3)));
    MultiJoin::new(vec![sales, product], Expr::equals(col(0), col(3)))
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

#[test]
fn test_three_way_chain_yields_ranked_candidates() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let mj = three_way(&mut catalog);
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 3);
    let mut firsts: Vec<usize> = candidates.iter().map(|c| c.first_factor).collect();
    firsts.sort_unstable();
    assert_eq!(firsts, vec![0, 1, 2]);

    let costs: Vec<f64> = candidates.iter().map(|c| c.cost.expect("all tables have stats").total).collect();
    assert!(costs.windows(2).all(|w| w[0] <= w[1]), "candidates out of cost order: {costs:?}");

    for candidate in &candidates {
        let mut tables = scanned_tables(&candidate.plan);
        tables.sort();
        assert_eq!(tables, vec!["a", "b", "c"]);
        assert_eq!(placed_predicates(&candidate.plan), 2);
        assert_eq!(candidate.plan.fields(), mj.fields().as_slice());
    }
}

#[test]
fn test_hub_factor_joins_both_neighbours_directly() {
    let mut catalog = InMemoryCatalog::new();
    let mj = three_way(&mut catalog);
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    for candidate in &candidates {
        let tree = candidate.factor_tree_display();
        // a and c share no predicate, so they are never joined to each other
        assert!(!tree.contains("[0, 2]") && !tree.contains("[2, 0]"), "cartesian step in {tree}");
        walk(&candidate.plan, &mut |node| {
            if let PlanKind::Join { left, condition, .. } = node.kind() {
                let refs = condition.input_refs().to_vec();
                let n_left = left.field_count();
                assert!(
                    refs.iter().any(|&r| r < n_left) && refs.iter().any(|&r| r >= n_left),
                    "join condition {condition:?} does not connect its inputs in {tree}"
                );
            }
        });
    }

    let from_hub = candidates.iter().find(|c| c.first_factor == 1).expect("b starts a candidate");
    let placed = predicates(&from_hub.plan);
    assert_eq!(placed.len(), 2);
    assert!(placed.iter().all(|p| p.as_column_equality().is_some()));
}

#[test]
fn test_every_predicate_is_placed_exactly_once() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let a = add_table(&mut catalog, "a", 5000.0, &[("x", 500.0)]);
    let b = add_table(&mut catalog, "b", 200.0, &[("x", 200.0), ("y", 20.0)]);
    let c = add_table(&mut catalog, "c", 50.0, &[("y", 20.0), ("z", 10.0)]);
    let d = add_table(&mut catalog, "d", 10.0, &[("z", 10.0)]);
    // a.x = b.x AND b.y = c.y AND c.z = d.z AND b.y > 3
    let mj = MultiJoin::new(
        vec![a, b, c, d],
        Expr::and_all(vec![
            Expr::equals(col(0), col(1)),
            Expr::equals(col(2), col(3)),
            Expr::equals(col(4), col(5)),
            Expr::binary(joinopt_core::expr::BinaryOp::Gt, col(2), int(3)),
        ]),
    );
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 4);
    for candidate in &candidates {
        let mut tables = scanned_tables(&candidate.plan);
        tables.sort();
        assert_eq!(tables, vec!["a", "b", "c", "d"]);
        assert_eq!(count_nodes(&candidate.plan, |k| matches!(k, PlanKind::Join { .. })), 3);
        assert_eq!(placed_predicates(&candidate.plan), 4, "tree {}", candidate.factor_tree_display());
    }
}

#[test]
fn test_optimization_is_repeatable() {
    let mut catalog = InMemoryCatalog::new();
    let mj = three_way(&mut catalog);
    let first = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();
    let second = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(first.len(), second.len());
    for (x, y) in first.iter().zip(&second) {
        assert_eq!(x.factor_tree_display(), y.factor_tree_display());
        assert_relative_eq!(x.cost.unwrap().total, y.cost.unwrap().total);
    }
}

#[test]
fn test_single_factor_keeps_its_filter() {
    let mut catalog = InMemoryCatalog::new();
    let a = add_table(&mut catalog, "a", 100.0, &[("x", 10.0)]);
    let mj = MultiJoin::new(vec![a], Expr::equals(col(0), int(1)));
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 1);
    let PlanKind::Filter { predicate, input } = candidates[0].plan.kind() else {
        panic!("expected the single-factor predicate on top");
    };
    assert_eq!(predicate, &Expr::equals(col(0), int(1)));
    assert!(matches!(input.kind(), PlanKind::Project { .. }));
}

#[test]
fn test_post_join_filter_sits_above_the_projection() {
    let mut catalog = InMemoryCatalog::new();
    let post = Expr::binary(joinopt_core::expr::BinaryOp::Lt, col(0), col(3));
    let mj = three_way(&mut catalog).with_post_join_filter(post.clone());
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    for candidate in &candidates {
        let PlanKind::Filter { predicate, input } = candidate.plan.kind() else {
            panic!("expected the post-join filter at the root");
        };
        assert_eq!(predicate, &post);
        assert!(matches!(input.kind(), PlanKind::Project { .. }));
    }
}

#[test]
fn test_invalid_multi_join_is_rejected() {
    let catalog = InMemoryCatalog::new();
    let empty = MultiJoin::new(vec![], Expr::true_literal());
    assert_eq!(
        optimize_multi_join(&empty, &catalog, &OptimizerConfig::default()).unwrap_err(),
        OptimizeError::NoFactors
    );
}

// ---------------------------------------------------------------------------
// Outer joins and input order
// ---------------------------------------------------------------------------

#[test]
fn test_outer_join_keeps_null_generating_side() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let orders = add_table(&mut catalog, "orders", 1000.0, &[("id", 1000.0), ("cust_id", 100.0)]);
    let customer = add_table(&mut catalog, "customer", 100.0, &[("id", 100.0), ("name", 100.0)]);
    let lineitem = add_table(&mut catalog, "lineitem", 5000.0, &[("order_id", 1000.0), ("qty", 50.0)]);
    // orders JOIN lineitem ON orders.id = lineitem.order_id
    //        LEFT JOIN customer ON orders.cust_id = customer.id
    let mj = MultiJoin::new(vec![orders, customer.clone(), lineitem], Expr::equals(col(0), col(4)))
        .with_outer_join(1, Expr::equals(col(1), col(2)));
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 2);
    for candidate in &candidates {
        assert_ne!(candidate.first_factor, 1);
        let joins = joins_over(&candidate.plan, &customer);
        assert_eq!(joins.len(), 1);
        let (join_type, customer_on_left) = joins[0];
        let expected = if customer_on_left { JoinType::Right } else { JoinType::Left };
        assert_eq!(join_type, expected, "tree {}", candidate.factor_tree_display());
    }
}

#[test]
fn test_swapped_left_join_becomes_right_join() {
    let mut catalog = InMemoryCatalog::new();
    let small = add_table(&mut catalog, "small", 10.0, &[("x", 10.0)]);
    let big = add_table(&mut catalog, "big", 10_000.0, &[("x", 10.0)]);
    let mj = MultiJoin::new(vec![small.clone(), big.clone()], Expr::true_literal())
        .with_outer_join(1, Expr::equals(col(0), col(1)));
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 1);
    let PlanKind::Join { left, right, join_type, condition, .. } = candidates[0].tree.plan().kind() else {
        panic!("expected a join");
    };
    assert_eq!(left.id(), big.id());
    assert_eq!(right.id(), small.id());
    assert_eq!(*join_type, JoinType::Right);
    assert_eq!(condition, &Expr::equals(col(1), col(0)));
    assert_eq!(candidates[0].tree_order(), vec![1, 0]);
}

#[test]
fn test_full_outer_join_of_two_factors() {
    let mut catalog = InMemoryCatalog::new();
    let a = add_table(&mut catalog, "a", 100.0, &[("x", 100.0)]);
    let b = add_table(&mut catalog, "b", 100.0, &[("x", 100.0)]);
    let mj = MultiJoin::full_outer(a, b, Expr::equals(col(0), col(1)));
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 2);
    for candidate in &candidates {
        assert!(matches!(candidate.tree.plan().kind(), PlanKind::Join { join_type: JoinType::Full, .. }));
    }
}

// ---------------------------------------------------------------------------
// Semijoins
// ---------------------------------------------------------------------------

#[test]
fn test_selective_dimension_semijoins_the_fact_table() {
    init_tracing();
    let mut catalog = InMemoryCatalog::new();
    let mj = sales_product(&mut catalog, 100_000.0);
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();

    assert_eq!(candidates.len(), 2);
    for candidate in &candidates {
        assert_eq!(count_nodes(&candidate.plan, |k| matches!(k, PlanKind::SemiJoin { .. })), 1);
        // the dimension is still joined: all of its columns are used
        assert_eq!(count_nodes(candidate.tree.plan(), |k| matches!(k, PlanKind::Join { .. })), 1);
    }
}

#[test]
fn test_small_fact_table_gets_no_semijoin() {
    let mut catalog = InMemoryCatalog::new();
    let mj = sales_product(&mut catalog, 200.0);
    let candidates = optimize_multi_join(&mj, &catalog, &OptimizerConfig::default()).unwrap();
    for candidate in &candidates {
        assert_eq!(count_nodes(&candidate.plan, |k| matches!(k, PlanKind::SemiJoin { .. })), 0);
    }
}

#[test]
fn test_semijoins_disabled_from_json_config() {
    let mut catalog = InMemoryCatalog::new();
    let mj = sales_product(&mut catalog, 100_000.0)
        .with_projection_fields(1, BitSet::of([0]));
    let config: OptimizerConfig = serde_json::from_str(r#"{"enable_semijoins": false}"#).unwrap();
    let candidates = optimize_multi_join(&mj, &catalog, &config).unwrap();

    for candidate in &candidates {
        assert_eq!(count_nodes(&candidate.plan, |k| matches!(k, PlanKind::SemiJoin { .. })), 0);
        assert_eq!(count_nodes(&candidate.plan, |k| matches!(k, PlanKind::Join { .. })), 1);
    }
}
