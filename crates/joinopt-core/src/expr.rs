//! # Scalar Expressions
//!
//! This module defines the scalar expression language used for join conditions,
//! filter predicates and projection lists.
//!
//! ## Positional Column References
//!
//! Columns are addressed positionally (`InputRef { index }`, printed as `$index`)
//! against the row type of the node the expression is attached to. For a join that row
//! type is the concatenation `left ++ right`, so reordering join inputs changes the
//! meaning of every reference, and the join enumerator spends most of its bookkeeping
//! on renumbering them:
//!
//! - `shift_inputs` applies a per-column offset table (`new = old + adjustments[old]`).
//! - `substitute_inputs` replaces each reference by an expression (pushing a filter
//!   through a projection).
//! - `map_inputs` renumbers through a partial mapping and fails if a column has no
//!   image (pushing a predicate through an aggregate or a join input).
//!
//! ## Artificial Selectivity
//!
//! `Expr::Selectivity` is a cost-only marker. It never reaches execution; the
//! estimator multiplies its value into the selectivity of the predicate it is
//! conjoined with. Semijoins use it to charge their filtering power to the fact
//! side's scan cost.

use crate::bitset::BitSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Reference to a table in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self { schema: schema.into(), name: name.into() }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// SQL data types known to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of an untyped `NULL` literal.
    Null,
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    Date,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INTEGER",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Utf8 => "VARCHAR",
            DataType::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// One column of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self { name: name.into(), data_type, nullable }
    }

    pub fn with_nullable(&self, nullable: bool) -> Self {
        Self { nullable, ..self.clone() }
    }
}

/// Scalar value for expressions.
///
/// Uses `OrderedFloat` for `f64` so that floating-point values can take part in
/// Eq/Hash comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    /// SQL NULL value.
    Null,
    /// Boolean true/false.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point, wrapped in OrderedFloat for Eq/Hash support.
    Float64(OrderedFloat<f64>),
    /// UTF-8 string.
    Utf8(String),
    /// Date as days since Unix epoch (1970-01-01).
    Date(i32),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Date(_) => DataType::Date,
        }
    }

    /// Numeric view used for histogram lookups; `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(v.0),
            ScalarValue::Date(v) => Some(f64::from(*v)),
            _ => None,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{}", v.0),
            ScalarValue::Utf8(v) => write!(f, "'{v}'"),
            ScalarValue::Date(v) => write!(f, "DATE({v})"),
        }
    }
}

/// Scalar expressions used in predicates, projections and join conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Positional reference to a column of the input row.
    InputRef { index: usize, data_type: DataType },
    /// Constant literal value.
    Literal(ScalarValue),
    /// Binary operation (e.g., `$0 + $1`, `$0 = $3`, `$2 > 100`).
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation (e.g., `NOT flag`, `-value`, `IS NULL`).
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Named function call (e.g., `UPPER($1)`).
    Function {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
    },
    /// Type conversion. `CAST(NULL AS t)` is how typed nulls are written.
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    /// Conjunction (AND) of multiple predicates, kept flat.
    And(Vec<Expr>),
    /// Disjunction (OR) of multiple predicates.
    Or(Vec<Expr>),
    /// Cost-only marker with a fixed selectivity in `[0, 1]`.
    Selectivity(OrderedFloat<f64>),
}

/// Equi-join keys pulled out of a join condition by [`Expr::split_join_condition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinKeys {
    /// Left-side column of each equality, relative to the left input.
    pub left_keys: Vec<usize>,
    /// Right-side column of each equality, relative to the right input.
    pub right_keys: Vec<usize>,
    /// Conjuncts that are not `left col = right col`.
    pub residual: Vec<Expr>,
}

impl JoinKeys {
    pub fn is_equi(&self) -> bool {
        !self.left_keys.is_empty()
    }
}

impl Expr {
    pub fn input_ref(index: usize, data_type: DataType) -> Expr {
        Expr::InputRef { index, data_type }
    }

    pub fn literal(value: ScalarValue) -> Expr {
        Expr::Literal(value)
    }

    pub fn true_literal() -> Expr {
        Expr::Literal(ScalarValue::Bool(true))
    }

    pub fn false_literal() -> Expr {
        Expr::Literal(ScalarValue::Bool(false))
    }

    /// `CAST(NULL AS data_type)`.
    pub fn typed_null(data_type: DataType) -> Expr {
        Expr::Cast {
            expr: Box::new(Expr::Literal(ScalarValue::Null)),
            data_type,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn equals(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::UnaryOp { op, operand: Box::new(operand) }
    }

    pub fn is_not_null(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::IsNotNull, operand)
    }

    pub fn cast(expr: Expr, data_type: DataType) -> Expr {
        Expr::Cast { expr: Box::new(expr), data_type }
    }

    pub fn selectivity(value: f64) -> Expr {
        Expr::Selectivity(OrderedFloat(value))
    }

    /// AND together `exprs`, flattening nested conjunctions and dropping TRUE terms.
    /// An empty input yields TRUE.
    pub fn and_all(exprs: Vec<Expr>) -> Expr {
        let mut terms = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::And(inner) => terms.extend(inner.into_iter().filter(|e| !e.is_always_true())),
                e if e.is_always_true() => {}
                e => terms.push(e),
            }
        }
        match terms.len() {
            0 => Expr::true_literal(),
            1 => terms.remove(0),
            _ => Expr::And(terms),
        }
    }

    /// AND of two optional predicates.
    pub fn and_opt(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
        match (left, right) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(l), Some(r)) => Some(Expr::and_all(vec![l, r])),
        }
    }

    pub fn is_always_true(&self) -> bool {
        match self {
            Expr::Literal(ScalarValue::Bool(true)) => true,
            Expr::And(terms) => terms.iter().all(Expr::is_always_true),
            _ => false,
        }
    }

    pub fn is_always_false(&self) -> bool {
        match self {
            Expr::Literal(ScalarValue::Bool(false)) => true,
            Expr::And(terms) => terms.iter().any(Expr::is_always_false),
            _ => false,
        }
    }

    /// True for `a op b` where `op` is `=`, `<>`, `<`, `<=`, `>` or `>=`.
    pub fn is_comparison(&self) -> bool {
        matches!(self, Expr::BinaryOp { op, .. } if op.is_comparison())
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Expr::BinaryOp { op: BinaryOp::Eq, .. })
    }

    /// If this is `$i = $j`, the two column indexes.
    pub fn as_column_equality(&self) -> Option<(usize, usize)> {
        match self {
            Expr::BinaryOp { op: BinaryOp::Eq, left, right } => match (left.as_ref(), right.as_ref()) {
                (Expr::InputRef { index: l, .. }, Expr::InputRef { index: r, .. }) => Some((*l, *r)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Flatten AND-chains: (A AND (B AND C)) → [A, B, C].
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(exprs) => exprs.iter().flat_map(|e| e.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Owned conjuncts, with always-true terms removed.
    pub fn into_conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::And(exprs) => exprs.into_iter().flat_map(Expr::into_conjuncts).collect(),
            e if e.is_always_true() => vec![],
            e => vec![e],
        }
    }

    /// Set of input columns referenced anywhere in the expression.
    pub fn input_refs(&self) -> BitSet {
        let mut refs = BitSet::new();
        self.visit_inputs(&mut |i| {
            refs.insert(i);
        });
        refs
    }

    /// Number of occurrences of each referenced column, accumulated into `counts`.
    pub fn count_input_refs(&self, counts: &mut [usize]) {
        self.visit_inputs(&mut |i| {
            if let Some(c) = counts.get_mut(i) {
                *c += 1;
            }
        });
    }

    fn visit_inputs(&self, f: &mut dyn FnMut(usize)) {
        match self {
            Expr::InputRef { index, .. } => f(*index),
            Expr::Literal(_) | Expr::Selectivity(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.visit_inputs(f);
                right.visit_inputs(f);
            }
            Expr::UnaryOp { operand, .. } => operand.visit_inputs(f),
            Expr::Cast { expr, .. } => expr.visit_inputs(f),
            Expr::Function { args, .. } | Expr::And(args) | Expr::Or(args) => {
                for a in args {
                    a.visit_inputs(f);
                }
            }
        }
    }

    /// Rebuild the expression, replacing each column reference by `f(index, type)`.
    /// Returns `None` as soon as `f` does.
    pub fn transform_inputs(&self, f: &mut dyn FnMut(usize, DataType) -> Option<Expr>) -> Option<Expr> {
        Some(match self {
            Expr::InputRef { index, data_type } => f(*index, *data_type)?,
            Expr::Literal(_) | Expr::Selectivity(_) => self.clone(),
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
                op: *op,
                left: Box::new(left.transform_inputs(f)?),
                right: Box::new(right.transform_inputs(f)?),
            },
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op: *op,
                operand: Box::new(operand.transform_inputs(f)?),
            },
            Expr::Function { name, args, return_type } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.transform_inputs(f)).collect::<Option<_>>()?,
                return_type: *return_type,
            },
            Expr::Cast { expr, data_type } => Expr::Cast {
                expr: Box::new(expr.transform_inputs(f)?),
                data_type: *data_type,
            },
            Expr::And(terms) => Expr::And(terms.iter().map(|a| a.transform_inputs(f)).collect::<Option<_>>()?),
            Expr::Or(terms) => Expr::Or(terms.iter().map(|a| a.transform_inputs(f)).collect::<Option<_>>()?),
        })
    }

    /// Renumber every column reference as `index + adjustments[index]`.
    ///
    /// Panics if a reference falls outside `adjustments`, since that means the
    /// expression was built against a different row type.
    pub fn shift_inputs(&self, adjustments: &[isize]) -> Expr {
        let shifted = self.transform_inputs(&mut |index, data_type| {
            let delta = *adjustments
                .get(index)
                .unwrap_or_else(|| panic!("column ${index} outside adjustment table of {}", adjustments.len()));
            let target = index as isize + delta;
            assert!(target >= 0, "column ${index} shifted to negative position {target}");
            Some(Expr::InputRef { index: target as usize, data_type })
        });
        shifted.unwrap_or_else(|| unreachable!("shift never rejects a column"))
    }

    /// Renumber columns through a partial mapping; `None` if some column has no image.
    pub fn map_inputs(&self, map: &dyn Fn(usize) -> Option<usize>) -> Option<Expr> {
        self.transform_inputs(&mut |index, data_type| {
            map(index).map(|index| Expr::InputRef { index, data_type })
        })
    }

    /// Replace `$i` by `exprs[i]`, e.g. to push a predicate below a projection.
    pub fn substitute_inputs(&self, exprs: &[Expr]) -> Option<Expr> {
        self.transform_inputs(&mut |index, _| exprs.get(index).cloned())
    }

    /// Split a join condition over `left ++ right` into equi-join key pairs and
    /// residual conjuncts. Right keys are relative to the right input.
    pub fn split_join_condition(&self, n_left_fields: usize) -> JoinKeys {
        let mut keys = JoinKeys::default();
        for conjunct in self.conjuncts() {
            if conjunct.is_always_true() {
                continue;
            }
            match conjunct.as_column_equality() {
                Some((a, b)) if a < n_left_fields && b >= n_left_fields => {
                    keys.left_keys.push(a);
                    keys.right_keys.push(b - n_left_fields);
                }
                Some((a, b)) if b < n_left_fields && a >= n_left_fields => {
                    keys.left_keys.push(b);
                    keys.right_keys.push(a - n_left_fields);
                }
                _ => keys.residual.push(conjunct.clone()),
            }
        }
        keys
    }

    /// Result type of the expression.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::InputRef { data_type, .. } => *data_type,
            Expr::Literal(v) => v.data_type(),
            Expr::BinaryOp { op, left, .. } => {
                if op.is_comparison() {
                    DataType::Boolean
                } else {
                    left.data_type()
                }
            }
            Expr::UnaryOp { op: UnaryOp::Neg, operand } => operand.data_type(),
            Expr::UnaryOp { .. } | Expr::And(_) | Expr::Or(_) | Expr::Selectivity(_) => DataType::Boolean,
            Expr::Function { return_type, .. } => *return_type,
            Expr::Cast { data_type, .. } => *data_type,
        }
    }

    /// Whether the expression can evaluate to NULL over rows of `input`.
    pub fn nullable(&self, input: &[Field]) -> bool {
        match self {
            Expr::InputRef { index, .. } => input.get(*index).map_or(true, |f| f.nullable),
            Expr::Literal(v) => matches!(v, ScalarValue::Null),
            Expr::UnaryOp { op: UnaryOp::IsNull | UnaryOp::IsNotNull, .. } | Expr::Selectivity(_) => false,
            Expr::UnaryOp { operand, .. } => operand.nullable(input),
            Expr::Cast { expr, .. } => expr.nullable(input),
            Expr::BinaryOp { left, right, .. } => left.nullable(input) || right.nullable(input),
            Expr::Function { args, .. } | Expr::And(args) | Expr::Or(args) => args.iter().any(|a| a.nullable(input)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::InputRef { index, .. } => write!(f, "${index}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::BinaryOp { op, left, right } => write!(f, "{left} {op} {right}"),
            Expr::UnaryOp { op: UnaryOp::Not, operand } => write!(f, "NOT ({operand})"),
            Expr::UnaryOp { op: UnaryOp::Neg, operand } => write!(f, "-{operand}"),
            Expr::UnaryOp { op: UnaryOp::IsNull, operand } => write!(f, "{operand} IS NULL"),
            Expr::UnaryOp { op: UnaryOp::IsNotNull, operand } => write!(f, "{operand} IS NOT NULL"),
            Expr::Function { name, args, .. } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expr::Cast { expr, data_type } => write!(f, "CAST({expr} AS {data_type})"),
            Expr::And(terms) | Expr::Or(terms) => {
                let sep = if matches!(self, Expr::And(_)) { " AND " } else { " OR " };
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    match t {
                        Expr::And(_) | Expr::Or(_) => write!(f, "({t})")?,
                        _ => write!(f, "{t}")?,
                    }
                }
                Ok(())
            }
            Expr::Selectivity(s) => write!(f, "SELECTIVITY({})", s.0),
        }
    }
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Equality comparison (`=`). Used heavily in join conditions and filters.
    Eq,
    /// Inequality comparison (`<>`).
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    /// The operator that gives the same result with its operands swapped.
    pub fn flip(&self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::LtEq => BinaryOp::GtEq,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::GtEq => BinaryOp::LtEq,
            other => *other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(s)
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// SQL join types.
///
/// Only `Inner` and `Full` are symmetric. Swapping the inputs of a `Left` join turns
/// it into a `Right` join and vice versa; semijoins are never swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Inner join: only matching rows from both sides.
    Inner,
    /// Left outer join: all rows from left, matching from right (or NULLs).
    Left,
    /// Right outer join: all rows from right, matching from left (or NULLs).
    Right,
    /// Full outer join: all rows from both sides, NULLs where no match.
    Full,
    /// Semi join: left rows that have at least one match on the right.
    Semi,
    /// Anti join: right rows that have no match on the left.
    Anti,
}

impl JoinType {
    pub fn is_outer(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Right | JoinType::Full)
    }

    /// The left input may be padded with NULLs.
    pub fn generates_nulls_on_left(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// The right input may be padded with NULLs.
    pub fn generates_nulls_on_right(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Join type after exchanging the two inputs.
    pub fn swap(&self) -> JoinType {
        match self {
            JoinType::Left => JoinType::Right,
            JoinType::Right => JoinType::Left,
            other => *other,
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Semi => "SEMI",
            JoinType::Anti => "ANTI",
        };
        f.write_str(s)
    }
}

/// Aggregate expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggExpr {
    pub func: AggFunc,
    pub arg: Expr,
    pub distinct: bool,
}

impl AggExpr {
    pub fn data_type(&self) -> DataType {
        match self.func {
            AggFunc::Count => DataType::Int64,
            AggFunc::Avg => DataType::Float64,
            AggFunc::Sum | AggFunc::Min | AggFunc::Max => self.arg.data_type(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}
