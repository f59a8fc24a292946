//! # Statistics for Cost-Based Optimization
//!
//! This module defines the statistics structures stored in the catalog and the
//! selectivity formulas the estimator builds on.
//!
//! ## Statistics Hierarchy
//!
//! - **Table-level**: row count and total size in bytes.
//! - **Column-level**: number of distinct values (NDV), null fraction, min/max values,
//!   average row size, and optional histograms for range selectivity estimation.
//!
//! ## Selectivity Estimation
//!
//! Sargable restrictions (see [`crate::sarg`]) are answered per column:
//!
//! - **Equality**: with a histogram, the share of rows in the bucket holding the value
//!   divided by that bucket's distinct count; otherwise `(1 - null_fraction) / NDV`.
//! - **Range**: with a histogram, the overlapped share of every bucket (linear
//!   interpolation inside a bucket); otherwise interpolation between min and max, or
//!   a fixed 1/3 when the bounds are unknown.
//! - **No column statistics**: 0.1 (10%).
//!
//! Everything else is guessed per conjunct by [`guess_selectivity`].

use crate::expr::{BinaryOp, Expr, ScalarValue, UnaryOp};
use crate::sarg::{ColumnSarg, SargTerm};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Selectivity of a sargable restriction on a column without statistics.
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// Selectivity of a range restriction when neither histogram nor bounds are known.
pub const DEFAULT_RANGE_SELECTIVITY: f64 = 1.0 / 3.0;

/// Guessed selectivity of `x IS NOT NULL`.
pub const IS_NOT_NULL_SELECTIVITY: f64 = 0.9;

/// Guessed selectivity of an equality.
pub const EQUALS_SELECTIVITY: f64 = 0.15;

/// Guessed selectivity of any other comparison.
pub const COMPARISON_SELECTIVITY: f64 = 0.5;

/// Guessed selectivity of anything that is not a comparison.
pub const OTHER_SELECTIVITY: f64 = 0.25;

/// Selectivity of each key when a semijoin's dimension has no usable statistics.
pub const SEMIJOIN_KEY_SELECTIVITY: f64 = 0.1;

/// Statistics for a base table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.column_stats.get(name)
    }
}

/// Per-column statistics used for selectivity estimation and cost modeling.
///
/// These statistics are typically gathered by ANALYZE TABLE and stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV). Used for equality selectivity: sel = 1/NDV.
    pub distinct_count: f64,
    /// Fraction of rows that are NULL [0.0, 1.0].
    pub null_fraction: f64,
    /// Minimum value in the column (if known). Used for range selectivity.
    pub min_value: Option<ScalarValue>,
    /// Maximum value in the column (if known). Used for range selectivity.
    pub max_value: Option<ScalarValue>,
    /// Average size of a single value in bytes.
    pub avg_row_size: f64,
    /// Optional equi-depth histogram for more accurate range selectivity estimation.
    pub histogram: Option<Histogram>,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
            min_value: None,
            max_value: None,
            avg_row_size: 8.0,
            histogram: None,
        }
    }

    pub fn with_bounds(mut self, min: ScalarValue, max: ScalarValue) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_histogram(mut self, histogram: Histogram) -> Self {
        self.histogram = Some(histogram);
        self
    }

    /// Fraction of the table's rows satisfying every term in `sarg`.
    pub fn selectivity(&self, sarg: &ColumnSarg) -> f64 {
        if sarg.is_contradiction() {
            return 0.0;
        }
        if sarg.has_is_null() {
            return self.null_fraction.clamp(0.0, 1.0);
        }
        let non_null = (1.0 - self.null_fraction).clamp(0.0, 1.0);
        if let Some(point) = sarg.point() {
            if !self.range_admits(sarg, point) {
                return 0.0;
            }
            return match (&self.histogram, point.as_f64()) {
                (Some(h), Some(v)) => h.point_fraction(v) * non_null,
                _ => non_null / self.distinct_count.max(1.0),
            };
        }
        if sarg.has_range() {
            let (lo, hi) = sarg.numeric_range();
            if let Some(h) = &self.histogram {
                return h.range_fraction(lo, hi) * non_null;
            }
            return match self.interpolate(lo, hi) {
                Some(fraction) => fraction * non_null,
                None => DEFAULT_RANGE_SELECTIVITY,
            };
        }
        // IS NOT NULL only
        non_null
    }

    /// Distinct values of the column among rows satisfying `sarg`.
    pub fn distinct_count_in(&self, sarg: &ColumnSarg) -> f64 {
        if sarg.is_contradiction() {
            return 0.0;
        }
        if sarg.has_is_null() || sarg.point().is_some() {
            return 1.0;
        }
        if sarg.has_range() {
            let (lo, hi) = sarg.numeric_range();
            if let Some(h) = &self.histogram {
                return h.range_distinct(lo, hi).min(self.distinct_count);
            }
            let fraction = self.interpolate(lo, hi).unwrap_or(DEFAULT_RANGE_SELECTIVITY);
            return (self.distinct_count * fraction).max(1.0).min(self.distinct_count);
        }
        self.distinct_count
    }

    /// Whether `point` lies inside the range terms of `sarg`.
    fn range_admits(&self, sarg: &ColumnSarg, point: &ScalarValue) -> bool {
        let Some(v) = point.as_f64() else {
            return true;
        };
        sarg.terms.iter().all(|t| match t {
            SargTerm::Lower { value, inclusive } => value.as_f64().map_or(true, |l| if *inclusive { v >= l } else { v > l }),
            SargTerm::Upper { value, inclusive } => value.as_f64().map_or(true, |u| if *inclusive { v <= u } else { v < u }),
            _ => true,
        })
    }

    /// Share of `[min, max]` covered by `[lo, hi]`, if the column bounds are numeric.
    fn interpolate(&self, lo: Option<f64>, hi: Option<f64>) -> Option<f64> {
        let min = self.min_value.as_ref()?.as_f64()?;
        let max = self.max_value.as_ref()?.as_f64()?;
        if max <= min {
            return None;
        }
        let lo = lo.unwrap_or(min).max(min);
        let hi = hi.unwrap_or(max).min(max);
        Some(((hi - lo) / (max - min)).clamp(0.0, 1.0))
    }
}

/// Equi-depth histogram for range selectivity estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub buckets: Vec<HistogramBucket>,
}

/// A single bucket in an equi-depth histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Lower bound of the bucket range (inclusive).
    pub lower: f64,
    /// Upper bound of the bucket range (inclusive).
    pub upper: f64,
    /// Estimated number of rows in this bucket.
    pub count: f64,
    /// Estimated number of distinct values in this bucket.
    pub distinct: f64,
}

impl HistogramBucket {
    /// Fraction of the bucket's width inside `[lo, hi]`.
    fn overlap(&self, lo: Option<f64>, hi: Option<f64>) -> f64 {
        let lo = lo.unwrap_or(f64::NEG_INFINITY);
        let hi = hi.unwrap_or(f64::INFINITY);
        if hi < self.lower || lo > self.upper {
            return 0.0;
        }
        let width = self.upper - self.lower;
        if width <= 0.0 {
            return 1.0;
        }
        let covered = hi.min(self.upper) - lo.max(self.lower);
        (covered / width).clamp(0.0, 1.0)
    }
}

impl Histogram {
    pub fn total_count(&self) -> f64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Share of histogram rows equal to `value`.
    pub fn point_fraction(&self, value: f64) -> f64 {
        let total = self.total_count();
        if total <= 0.0 {
            return 0.0;
        }
        self.buckets
            .iter()
            .find(|b| value >= b.lower && value <= b.upper)
            .map_or(0.0, |b| b.count / total / b.distinct.max(1.0))
    }

    /// Share of histogram rows inside `[lo, hi]`; `None` bounds are open.
    pub fn range_fraction(&self, lo: Option<f64>, hi: Option<f64>) -> f64 {
        let total = self.total_count();
        if total <= 0.0 {
            return 0.0;
        }
        let rows: f64 = self.buckets.iter().map(|b| b.count * b.overlap(lo, hi)).sum();
        (rows / total).clamp(0.0, 1.0)
    }

    /// Distinct values inside `[lo, hi]`.
    pub fn range_distinct(&self, lo: Option<f64>, hi: Option<f64>) -> f64 {
        self.buckets.iter().map(|b| b.distinct * b.overlap(lo, hi)).sum()
    }
}

/// Guess the selectivity of a predicate without consulting statistics.
///
/// Each conjunct contributes independently: `IS NOT NULL` 0.9, equality 0.15, any
/// other comparison 0.5, anything else 0.25. Artificial selectivity markers
/// contribute their own value. No predicate means no filtering.
pub fn guess_selectivity(predicate: Option<&Expr>) -> f64 {
    guess(predicate, false)
}

/// Like [`guess_selectivity`] but only artificial selectivity markers count; every
/// other conjunct is taken to be accounted for elsewhere.
pub fn artificial_selectivity(predicate: Option<&Expr>) -> f64 {
    guess(predicate, true)
}

fn guess(predicate: Option<&Expr>, artificial_only: bool) -> f64 {
    let Some(predicate) = predicate else {
        return 1.0;
    };
    let mut sel = 1.0;
    for conjunct in predicate.conjuncts() {
        if conjunct.is_always_true() {
            continue;
        }
        sel *= match conjunct {
            Expr::Selectivity(s) => s.0,
            _ if artificial_only => 1.0,
            Expr::UnaryOp { op: UnaryOp::IsNotNull, .. } => IS_NOT_NULL_SELECTIVITY,
            Expr::BinaryOp { op: BinaryOp::Eq, .. } => EQUALS_SELECTIVITY,
            e if e.is_comparison() => COMPARISON_SELECTIVITY,
            _ => OTHER_SELECTIVITY,
        };
    }
    sel
}

/// Expected number of distinct values when `selected` rows are drawn from a domain
/// of `domain` distinct values: `(1 - e^(-selected/domain)) * domain`, clamped to
/// `[0, min(domain, selected)]`.
pub fn num_distinct_vals(domain: f64, selected: f64) -> f64 {
    if domain <= 0.0 || selected <= 0.0 {
        return 0.0;
    }
    let n = (1.0 - (-selected / domain).exp()) * domain;
    n.clamp(0.0, domain.min(selected))
}
