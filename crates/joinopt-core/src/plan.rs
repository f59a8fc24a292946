//! # Plan Fragments
//!
//! A plan fragment is an immutable tree of relational operators shared through
//! `Arc`. The join enumerator builds many alternative trees over the same leaves,
//! so sharing subtrees instead of copying them keeps each alternative cheap.
//!
//! ## Identity
//!
//! Every node gets a process-unique `id` at construction. Two nodes are equal only
//! if they are the same node, which is what the estimator keys its memo tables on:
//! a fragment's statistics never change once it is built.
//!
//! ## Row Types
//!
//! Each constructor derives the output row type from its inputs:
//!
//! - joins concatenate `left ++ right`, marking the null-generating side nullable;
//! - a semijoin outputs the side whose rows it preserves (left for `Semi`, right
//!   for `Anti`);
//! - aggregates output the group keys followed by one column per aggregate call.

use crate::expr::{AggExpr, DataType, Expr, Field, JoinType, TableRef};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type PlanRef = Arc<PlanNode>;

/// Process-unique identifier of a plan node.
pub type NodeId = usize;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

/// A node in a plan fragment.
#[derive(Debug)]
pub struct PlanNode {
    id: NodeId,
    kind: PlanKind,
    fields: Vec<Field>,
}

/// Operator kinds understood by the estimator and the join enumerator.
#[derive(Debug, Clone)]
pub enum PlanKind {
    /// Full scan of a base table. Always a leaf.
    Scan { table: TableRef },
    /// Discards rows for which `predicate` is not true.
    Filter { input: PlanRef, predicate: Expr },
    /// Computes one output column per expression.
    Project { input: PlanRef, exprs: Vec<Expr> },
    /// Binary join over `left ++ right`.
    Join {
        left: PlanRef,
        right: PlanRef,
        join_type: JoinType,
        condition: Expr,
        /// Set when the two sides read the same table on a unique key, so a later
        /// pass can collapse the join into a single scan.
        removable_self_join: bool,
    },
    /// Semijoin (`Semi`) or anti-semijoin (`Anti`). The condition is expressed over
    /// `left ++ right`; the keys are relative to each input.
    SemiJoin {
        left: PlanRef,
        right: PlanRef,
        join_type: JoinType,
        condition: Expr,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
    },
    /// Groups by input columns `group_by` and computes `aggregates` per group.
    Aggregate {
        input: PlanRef,
        group_by: Vec<usize>,
        aggregates: Vec<AggExpr>,
    },
    /// UNION ALL of inputs with identical row types.
    Union { inputs: Vec<PlanRef> },
}

impl PlanNode {
    fn build(kind: PlanKind, fields: Vec<Field>) -> PlanRef {
        Arc::new(PlanNode {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            fields,
        })
    }

    pub fn scan(table: TableRef, fields: Vec<Field>) -> PlanRef {
        Self::build(PlanKind::Scan { table }, fields)
    }

    pub fn filter(input: PlanRef, predicate: Expr) -> PlanRef {
        let fields = input.fields.clone();
        Self::build(PlanKind::Filter { input, predicate }, fields)
    }

    /// Projection with generated column names (`$f0`, `$f1`, ..) for computed columns;
    /// plain column references keep their input name.
    pub fn project(input: PlanRef, exprs: Vec<Expr>) -> PlanRef {
        let names = exprs
            .iter()
            .enumerate()
            .map(|(i, e)| match e {
                Expr::InputRef { index, .. } => input
                    .fields
                    .get(*index)
                    .map_or_else(|| format!("$f{i}"), |f| f.name.clone()),
                _ => format!("$f{i}"),
            })
            .collect();
        Self::project_named(input, exprs, names)
    }

    pub fn project_named(input: PlanRef, exprs: Vec<Expr>, names: Vec<String>) -> PlanRef {
        assert_eq!(exprs.len(), names.len(), "projection needs one name per expression");
        let fields = exprs
            .iter()
            .zip(names)
            .map(|(e, name)| Field::new(name, e.data_type(), e.nullable(&input.fields)))
            .collect();
        Self::build(PlanKind::Project { input, exprs }, fields)
    }

    pub fn join(left: PlanRef, right: PlanRef, join_type: JoinType, condition: Expr) -> PlanRef {
        Self::join_with_flag(left, right, join_type, condition, false)
    }

    pub fn join_with_flag(
        left: PlanRef,
        right: PlanRef,
        join_type: JoinType,
        condition: Expr,
        removable_self_join: bool,
    ) -> PlanRef {
        assert!(
            !matches!(join_type, JoinType::Semi | JoinType::Anti),
            "semijoins are built with PlanNode::semi_join"
        );
        let left_nullable = join_type.generates_nulls_on_left();
        let right_nullable = join_type.generates_nulls_on_right();
        let fields = left
            .fields
            .iter()
            .map(|f| if left_nullable { f.with_nullable(true) } else { f.clone() })
            .chain(
                right
                    .fields
                    .iter()
                    .map(|f| if right_nullable { f.with_nullable(true) } else { f.clone() }),
            )
            .collect();
        Self::build(
            PlanKind::Join { left, right, join_type, condition, removable_self_join },
            fields,
        )
    }

    /// Semijoin of `left` by `right` on `left.left_keys[i] = right.right_keys[i]`.
    pub fn semi_join(left: PlanRef, right: PlanRef, left_keys: Vec<usize>, right_keys: Vec<usize>) -> PlanRef {
        Self::semi_join_typed(left, right, JoinType::Semi, left_keys, right_keys)
    }

    pub fn semi_join_typed(
        left: PlanRef,
        right: PlanRef,
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
    ) -> PlanRef {
        assert!(matches!(join_type, JoinType::Semi | JoinType::Anti), "not a semijoin type: {join_type}");
        assert_eq!(left_keys.len(), right_keys.len(), "semijoin key lists differ in length");
        let n_left = left.fields.len();
        let condition = Expr::and_all(
            left_keys
                .iter()
                .zip(&right_keys)
                .map(|(&l, &r)| {
                    Expr::equals(
                        Expr::input_ref(l, left.fields[l].data_type),
                        Expr::input_ref(n_left + r, right.fields[r].data_type),
                    )
                })
                .collect(),
        );
        let fields = match join_type {
            JoinType::Anti => right.fields.clone(),
            _ => left.fields.clone(),
        };
        Self::build(
            PlanKind::SemiJoin { left, right, join_type, condition, left_keys, right_keys },
            fields,
        )
    }

    pub fn aggregate(input: PlanRef, group_by: Vec<usize>, aggregates: Vec<AggExpr>) -> PlanRef {
        let mut fields: Vec<Field> = group_by.iter().map(|&g| input.fields[g].clone()).collect();
        for (i, agg) in aggregates.iter().enumerate() {
            fields.push(Field::new(format!("$agg{i}"), agg.data_type(), true));
        }
        Self::build(PlanKind::Aggregate { input, group_by, aggregates }, fields)
    }

    pub fn union_all(inputs: Vec<PlanRef>) -> PlanRef {
        assert!(!inputs.is_empty(), "union needs at least one input");
        let fields = inputs[0]
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| f.with_nullable(inputs.iter().any(|p| p.fields.get(i).map_or(true, |g| g.nullable))))
            .collect();
        Self::build(PlanKind::Union { inputs }, fields)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Column `index` as an input reference of the right type.
    pub fn field_ref(&self, index: usize) -> Expr {
        Expr::input_ref(index, self.fields[index].data_type)
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.fields.iter().map(|f| f.data_type).collect()
    }

    pub fn inputs(&self) -> Vec<&PlanRef> {
        match &self.kind {
            PlanKind::Scan { .. } => vec![],
            PlanKind::Filter { input, .. }
            | PlanKind::Project { input, .. }
            | PlanKind::Aggregate { input, .. } => vec![input],
            PlanKind::Join { left, right, .. } | PlanKind::SemiJoin { left, right, .. } => vec![left, right],
            PlanKind::Union { inputs } => inputs.iter().collect(),
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self.kind, PlanKind::Join { .. })
    }

    /// Left and right inputs of a binary join.
    pub fn join_inputs(&self) -> Option<(&PlanRef, &PlanRef)> {
        match &self.kind {
            PlanKind::Join { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }

    /// Pretty-print the plan as an indented tree.
    pub fn display(&self, indent: usize) -> String {
        let mut out = String::new();
        self.write_tree(indent, &mut out);
        out
    }

    fn write_tree(&self, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        let line = match &self.kind {
            PlanKind::Scan { table } => format!("Scan({table})"),
            PlanKind::Filter { predicate, .. } => format!("Filter({predicate})"),
            PlanKind::Project { exprs, .. } => {
                let list: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                format!("Project({})", list.join(", "))
            }
            PlanKind::Join { join_type, condition, removable_self_join, .. } => {
                let flag = if *removable_self_join { ", self-join" } else { "" };
                format!("Join({join_type}, {condition}{flag})")
            }
            PlanKind::SemiJoin { join_type, condition, .. } => format!("SemiJoin({join_type}, {condition})"),
            PlanKind::Aggregate { group_by, aggregates, .. } => {
                format!("Aggregate(group={group_by:?}, aggs={})", aggregates.len())
            }
            PlanKind::Union { .. } => "Union(ALL)".to_string(),
        };
        out.push_str(&pad);
        out.push_str(&line);
        out.push('\n');
        for input in self.inputs() {
            input.write_tree(indent + 1, out);
        }
    }
}

impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlanNode {}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(0))
    }
}
