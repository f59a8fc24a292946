//! # Sargable Predicate Analysis
//!
//! A predicate conjunct is *sargable* ("search argument-able") when it restricts a
//! single base column against a constant: `col op literal` in either orientation,
//! `col IS NULL` or `col IS NOT NULL`. Those conjuncts can be answered from column
//! statistics (histograms, NDV, null fraction); everything else is *residual* and
//! has to be guessed.
//!
//! `SargAnalysis::analyze` partitions a predicate into per-column restrictions plus
//! the residual conjuncts. Artificial selectivity markers are kept apart so the
//! estimator can apply them to both the sargable and the residual share.

use crate::expr::{BinaryOp, Expr, ScalarValue, UnaryOp};
use std::collections::BTreeMap;

/// One restriction on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum SargTerm {
    Eq(ScalarValue),
    Lower { value: ScalarValue, inclusive: bool },
    Upper { value: ScalarValue, inclusive: bool },
    IsNull,
    IsNotNull,
}

/// All sargable restrictions on one column, implicitly ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSarg {
    pub terms: Vec<SargTerm>,
}

impl ColumnSarg {
    /// The equality value, if the column is pinned to a single value.
    pub fn point(&self) -> Option<&ScalarValue> {
        self.terms.iter().find_map(|t| match t {
            SargTerm::Eq(v) => Some(v),
            _ => None,
        })
    }

    /// True if the terms cannot all hold: two different equality values, or IS NULL
    /// next to a value restriction.
    pub fn is_contradiction(&self) -> bool {
        let mut points = self.terms.iter().filter_map(|t| match t {
            SargTerm::Eq(v) => Some(v),
            _ => None,
        });
        let conflicting_points = match points.next() {
            Some(first) => points.any(|v| v != first),
            None => false,
        };
        let null_and_value = self.has_is_null() && self.terms.iter().any(|t| !matches!(t, SargTerm::IsNull));
        conflicting_points || null_and_value
    }

    pub fn has_is_null(&self) -> bool {
        self.terms.iter().any(|t| matches!(t, SargTerm::IsNull))
    }

    /// True if the only restriction is IS NOT NULL.
    pub fn is_not_null_only(&self) -> bool {
        self.terms.iter().all(|t| matches!(t, SargTerm::IsNotNull))
    }

    /// Numeric lower and upper bounds, intersected across range terms.
    /// `None` on a side means unbounded; non-numeric bounds are ignored.
    pub fn numeric_range(&self) -> (Option<f64>, Option<f64>) {
        let mut lo: Option<f64> = None;
        let mut hi: Option<f64> = None;
        for term in &self.terms {
            match term {
                SargTerm::Lower { value, .. } => {
                    if let Some(v) = value.as_f64() {
                        lo = Some(lo.map_or(v, |l| l.max(v)));
                    }
                }
                SargTerm::Upper { value, .. } => {
                    if let Some(v) = value.as_f64() {
                        hi = Some(hi.map_or(v, |h| h.min(v)));
                    }
                }
                _ => {}
            }
        }
        (lo, hi)
    }

    pub fn has_range(&self) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t, SargTerm::Lower { .. } | SargTerm::Upper { .. }))
    }
}

/// A predicate split into per-column restrictions and everything else.
#[derive(Debug, Clone, Default)]
pub struct SargAnalysis {
    /// Restrictions keyed by column ordinal.
    pub columns: BTreeMap<usize, ColumnSarg>,
    /// Conjuncts that are not sargable.
    pub residual: Vec<Expr>,
    /// Product of all artificial selectivity markers.
    pub artificial_selectivity: f64,
}

impl SargAnalysis {
    pub fn analyze(predicate: Option<&Expr>) -> SargAnalysis {
        let mut analysis = SargAnalysis { artificial_selectivity: 1.0, ..Default::default() };
        let Some(predicate) = predicate else {
            return analysis;
        };
        for conjunct in predicate.conjuncts() {
            if conjunct.is_always_true() {
                continue;
            }
            if let Expr::Selectivity(s) = conjunct {
                analysis.artificial_selectivity *= s.0;
                continue;
            }
            match sarg_term(conjunct) {
                Some((column, term)) => analysis.columns.entry(column).or_default().terms.push(term),
                None => analysis.residual.push(conjunct.clone()),
            }
        }
        analysis
    }

    /// The residual conjuncts as one predicate, or `None` if there are none.
    pub fn residual_predicate(&self) -> Option<Expr> {
        if self.residual.is_empty() {
            None
        } else {
            Some(Expr::and_all(self.residual.clone()))
        }
    }
}

fn sarg_term(conjunct: &Expr) -> Option<(usize, SargTerm)> {
    match conjunct {
        Expr::UnaryOp { op: UnaryOp::IsNull, operand } => match operand.as_ref() {
            Expr::InputRef { index, .. } => Some((*index, SargTerm::IsNull)),
            _ => None,
        },
        Expr::UnaryOp { op: UnaryOp::IsNotNull, operand } => match operand.as_ref() {
            Expr::InputRef { index, .. } => Some((*index, SargTerm::IsNotNull)),
            _ => None,
        },
        Expr::BinaryOp { op, left, right } if op.is_comparison() && *op != BinaryOp::NotEq => {
            let (column, op, value) = match (left.as_ref(), right.as_ref()) {
                (Expr::InputRef { index, .. }, Expr::Literal(v)) => (*index, *op, v),
                (Expr::Literal(v), Expr::InputRef { index, .. }) => (*index, op.flip(), v),
                _ => return None,
            };
            if matches!(value, ScalarValue::Null) {
                return None;
            }
            let value = value.clone();
            let term = match op {
                BinaryOp::Eq => SargTerm::Eq(value),
                BinaryOp::Gt => SargTerm::Lower { value, inclusive: false },
                BinaryOp::GtEq => SargTerm::Lower { value, inclusive: true },
                BinaryOp::Lt => SargTerm::Upper { value, inclusive: false },
                BinaryOp::LtEq => SargTerm::Upper { value, inclusive: true },
                _ => return None,
            };
            Some((column, term))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::DataType;

    fn col(i: usize) -> Expr {
        Expr::input_ref(i, DataType::Int64)
    }

    fn lit(v: i64) -> Expr {
        Expr::literal(ScalarValue::Int64(v))
    }

    #[test]
    fn test_partition_sargable_and_residual() {
        let pred = Expr::and_all(vec![
            Expr::binary(BinaryOp::Gt, col(0), lit(10)),
            Expr::binary(BinaryOp::GtEq, lit(50), col(0)),
            Expr::equals(col(1), lit(3)),
            Expr::equals(col(1), col(2)),
            Expr::selectivity(0.5),
            Expr::is_not_null(col(2)),
        ]);
        let a = SargAnalysis::analyze(Some(&pred));
        assert_eq!(a.columns.len(), 3);
        assert_eq!(a.columns[&0].numeric_range(), (Some(10.0), Some(50.0)));
        assert_eq!(a.columns[&1].point(), Some(&ScalarValue::Int64(3)));
        assert!(a.columns[&2].is_not_null_only());
        assert_eq!(a.residual.len(), 1);
        assert_eq!(a.artificial_selectivity, 0.5);
    }

    #[test]
    fn test_contradiction() {
        let pred = Expr::and_all(vec![Expr::equals(col(0), lit(1)), Expr::equals(col(0), lit(2))]);
        let a = SargAnalysis::analyze(Some(&pred));
        assert!(a.columns[&0].is_contradiction());

        let pred = Expr::and_all(vec![
            Expr::unary(UnaryOp::IsNull, col(0)),
            Expr::binary(BinaryOp::Lt, col(0), lit(1)),
        ]);
        assert!(SargAnalysis::analyze(Some(&pred)).columns[&0].is_contradiction());
    }

    #[test]
    fn test_no_predicate() {
        let a = SargAnalysis::analyze(None);
        assert!(a.columns.is_empty());
        assert!(a.residual_predicate().is_none());
        assert_eq!(a.artificial_selectivity, 1.0);
    }
}
