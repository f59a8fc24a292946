//! # joinopt-core: Join Graph and Estimation Core
//!
//! This crate holds the data model and the statistics machinery behind the
//! cost-based join optimizer in `joinopt-rules`: the relational plan fragments the
//! optimizer rearranges, the join graph describing an N-way join, and the estimator
//! that prices fragments from catalog statistics.
//!
//! ## Module Overview
//!
//! - **`expr`**: Scalar expressions, data types and join types, with the column
//!   renumbering helpers used when factors move around in a join tree.
//! - **`plan`**: Immutable, `Arc`-shared plan fragments (scan, filter, project, join,
//!   semijoin, aggregate, union).
//! - **`join_graph`**: The multi-join input and its derived tables: filter masks,
//!   factor weights, outer-join structure and join-removal state.
//! - **`join_tree`**: A plan fragment paired with the binary tree of factors it
//!   joins, with the arena the factor-tree nodes live in.
//! - **`metadata`**: The `Estimator`: row counts, selectivities, distinct counts,
//!   uniqueness and column origins.
//! - **`cost`**: Cumulative cost rules, implemented on the `Estimator`.
//! - **`sarg`**: Splitting predicates into per-column search arguments and residuals.
//! - **`stats`**: Table and column statistics with the default selectivity guesses.
//! - **`catalog`**: The `Catalog` trait for statistics and index metadata, and an
//!   in-memory implementation.
//! - **`bitset`**: Compressed bit sets for column and factor sets.
//! - **`error`**: Validation errors for malformed multi-joins.

pub mod bitset;
pub mod catalog;
pub mod cost;
pub mod error;
pub mod expr;
pub mod join_graph;
pub mod join_tree;
pub mod metadata;
pub mod plan;
pub mod sarg;
pub mod stats;
