//! Shared catalog and plan helpers for the end-to-end tests.

#![allow(dead_code)]

use joinopt_core::catalog::InMemoryCatalog;
use joinopt_core::expr::{DataType, Expr, Field, JoinType, ScalarValue, TableRef};
use joinopt_core::plan::{PlanKind, PlanNode, PlanRef};
use joinopt_core::stats::{ColumnStatistics, Statistics};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn col(i: usize) -> Expr {
    Expr::input_ref(i, DataType::Int64)
}

pub fn int(v: i64) -> Expr {
    Expr::literal(ScalarValue::Int64(v))
}

/// Register `schema.name` with Int64 columns `(name, ndv)` and return a scan of it.
pub fn add_table(catalog: &mut InMemoryCatalog, name: &str, rows: f64, cols: &[(&str, f64)]) -> PlanRef {
    let table = TableRef::new("dw", name);
    let fields: Vec<Field> = cols.iter().map(|(n, _)| Field::new(*n, DataType::Int64, false)).collect();
    let mut stats = Statistics::new(rows, rows * 8.0 * cols.len() as f64);
    for (n, ndv) in cols {
        stats = stats.with_column(*n, ColumnStatistics::new(*ndv, 0.0));
    }
    catalog.add_table(&table, fields.clone(), stats);
    PlanNode::scan(table, fields)
}

/// Visit `plan` and every node below it, parents first.
pub fn walk(plan: &PlanRef, visit: &mut dyn FnMut(&PlanRef)) {
    visit(plan);
    for input in plan.inputs() {
        walk(input, visit);
    }
}

pub fn count_nodes(plan: &PlanRef, pred: impl Fn(&PlanKind) -> bool) -> usize {
    let mut n = 0;
    walk(plan, &mut |node| {
        if pred(node.kind()) {
            n += 1;
        }
    });
    n
}

pub fn scanned_tables(plan: &PlanRef) -> Vec<String> {
    let mut tables = Vec::new();
    walk(plan, &mut |node| {
        if let PlanKind::Scan { table } = node.kind() {
            tables.push(table.name.clone());
        }
    });
    tables
}

/// Join types of the joins that have `input` as a direct child, with the side it is on.
pub fn joins_over(plan: &PlanRef, input: &PlanRef) -> Vec<(JoinType, bool)> {
    let mut found = Vec::new();
    walk(plan, &mut |node| {
        if let PlanKind::Join { left, right, join_type, .. } = node.kind() {
            if left.id() == input.id() {
                found.push((*join_type, true));
            } else if right.id() == input.id() {
                found.push((*join_type, false));
            }
        }
    });
    found
}

/// Non-trivial conjuncts of every join condition and filter in `plan`.
pub fn predicates(plan: &PlanRef) -> Vec<Expr> {
    let mut found = Vec::new();
    walk(plan, &mut |node| match node.kind() {
        PlanKind::Join { condition, .. } => {
            found.extend(condition.conjuncts().into_iter().filter(|c| !c.is_always_true()).cloned());
        }
        PlanKind::Filter { predicate, .. } => found.extend(predicate.conjuncts().into_iter().cloned()),
        _ => {}
    });
    found
}
