//! Errors raised while validating a multi-join before it is optimized.
//!
//! Missing statistics are not errors (estimator functions return `None`), and a
//! first-factor choice that cannot be completed simply yields no candidate tree.
//! Only input graphs the algorithms cannot represent are rejected here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OptimizeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    /// The multi-join has no inputs to order.
    #[error("multi-join has no factors")]
    NoFactors,
    /// A full outer join can only be ordered when it joins exactly two factors.
    #[error("full outer join over {0} factors is not supported; expected 2")]
    FullOuterJoinFactorCount(usize),
    /// A per-factor vector does not have one entry per input.
    #[error("{what} has {actual} entries but the multi-join has {expected} factors")]
    MismatchedFactorMetadata {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A predicate references a column outside the concatenated input row.
    #[error("column ${index} referenced but the join produces only {total_fields} columns")]
    InputRefOutOfRange { index: usize, total_fields: usize },
    /// An outer-join condition is attached to a factor that is not null-generating.
    #[error("factor {0} has an outer-join condition but is not null-generating")]
    OuterJoinConditionOnInnerFactor(usize),
}
