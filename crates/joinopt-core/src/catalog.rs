//! # Catalog Interface
//!
//! The catalog provides the optimizer with metadata about base tables: column
//! definitions, table and column statistics, and the indexes defined on each table.
//! The estimator needs the statistics; semijoin discovery needs the indexes, because
//! a semijoin only pays off when the fact table can be probed through an index on
//! the semijoin keys.
//!
//! ## Trait Design
//!
//! `Catalog` sits behind a trait object (`dyn Catalog`) so that different metadata
//! backends can be plugged in. `InMemoryCatalog` is a HashMap-backed implementation
//! populated programmatically, used by tests and embedders without a metadata store.
//!
//! ## Key Lookups
//!
//! - `table_stats`: row count and per-column statistics. `None` if unknown.
//! - `table_columns`: the table's row type. `None` if the table is unknown.
//! - `indexes`: index definitions, keyed by column ordinal.
//! - `unique_keys`: column sets known to be unique. Defaults to the key columns of
//!   every unique index.

use crate::bitset::BitSet;
use crate::expr::{Field, TableRef};
use crate::plan::{PlanNode, PlanRef};
use crate::stats::Statistics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An index on a base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    /// Key columns in index order, as ordinals into the table's columns.
    pub columns: Vec<usize>,
    pub unique: bool,
    /// The clustered index stores the table itself and cannot serve a semijoin probe.
    pub clustered: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self { name: name.into(), columns, unique: false, clustered: false }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn clustered(mut self) -> Self {
        self.clustered = true;
        self
    }
}

/// An index usable for a semijoin, with the semijoin keys it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub index: IndexDef,
    /// Positions into the probed key list, in index column order. May cover only a
    /// prefix of the index and a subset of the keys.
    pub key_order: Vec<usize>,
}

/// Catalog provides schema, statistics and index information.
pub trait Catalog: Send + Sync {
    fn table_stats(&self, table: &TableRef) -> Option<&Statistics>;
    fn table_columns(&self, table: &TableRef) -> Option<&[Field]>;
    fn indexes(&self, table: &TableRef) -> &[IndexDef];

    fn unique_keys(&self, table: &TableRef) -> Vec<BitSet> {
        self.indexes(table)
            .iter()
            .filter(|idx| idx.unique)
            .map(|idx| idx.columns.iter().copied().collect())
            .collect()
    }

    /// Scan node over `table`, or `None` if the table is unknown.
    fn scan(&self, table: &TableRef) -> Option<PlanRef> {
        self.table_columns(table)
            .map(|cols| PlanNode::scan(table.clone(), cols.to_vec()))
    }
}

/// Pick the secondary index that covers the most of `keys` (table column ordinals).
///
/// An index matches as long as its leading columns are all drawn from `keys`; the
/// first index that covers every key wins outright. Returns `None` when no index
/// matches even its first column.
pub fn find_semijoin_index(indexes: &[IndexDef], keys: &[usize]) -> Option<IndexMatch> {
    let mut best: Option<IndexMatch> = None;
    for index in indexes.iter().filter(|idx| !idx.clustered) {
        let key_order = match_index_keys(index, keys);
        if key_order.len() > best.as_ref().map_or(0, |b| b.key_order.len()) {
            let complete = key_order.len() == keys.len();
            best = Some(IndexMatch { index: index.clone(), key_order });
            if complete {
                break;
            }
        }
    }
    best
}

/// Positions in `keys` matching the leading columns of `index`, in index order.
fn match_index_keys(index: &IndexDef, keys: &[usize]) -> Vec<usize> {
    let mut key_order = Vec::new();
    for idx_col in &index.columns {
        match keys.iter().position(|k| k == idx_col) {
            Some(pos) => key_order.push(pos),
            None => break,
        }
        if key_order.len() == keys.len() {
            break;
        }
    }
    key_order
}

/// In-memory catalog for testing and development.
///
/// Tables are keyed by their fully-qualified name (`schema.table`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    /// Table-level statistics keyed by "schema.table".
    pub table_stats: HashMap<String, Statistics>,
    /// Column definitions keyed by "schema.table".
    pub table_columns: HashMap<String, Vec<Field>>,
    /// Index definitions keyed by "schema.table".
    pub table_indexes: HashMap<String, Vec<IndexDef>>,
    /// Additional declared unique keys keyed by "schema.table".
    pub declared_keys: HashMap<String, Vec<BitSet>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: &TableRef, columns: Vec<Field>, stats: Statistics) {
        let key = table.to_string();
        self.table_columns.insert(key.clone(), columns);
        self.table_stats.insert(key, stats);
    }

    /// Register a table with columns but without statistics.
    pub fn add_table_without_stats(&mut self, table: &TableRef, columns: Vec<Field>) {
        self.table_columns.insert(table.to_string(), columns);
    }

    pub fn add_index(&mut self, table: &TableRef, index: IndexDef) {
        self.table_indexes.entry(table.to_string()).or_default().push(index);
    }

    pub fn add_unique_key(&mut self, table: &TableRef, columns: &[usize]) {
        self.declared_keys
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().copied().collect());
    }
}

impl Catalog for InMemoryCatalog {
    fn table_stats(&self, table: &TableRef) -> Option<&Statistics> {
        self.table_stats.get(&table.to_string())
    }

    fn table_columns(&self, table: &TableRef) -> Option<&[Field]> {
        self.table_columns.get(&table.to_string()).map(Vec::as_slice)
    }

    fn indexes(&self, table: &TableRef) -> &[IndexDef] {
        self.table_indexes
            .get(&table.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn unique_keys(&self, table: &TableRef) -> Vec<BitSet> {
        let mut keys: Vec<BitSet> = self
            .indexes(table)
            .iter()
            .filter(|idx| idx.unique)
            .map(|idx| idx.columns.iter().copied().collect())
            .collect();
        if let Some(declared) = self.declared_keys.get(&table.to_string()) {
            keys.extend(declared.iter().cloned());
        }
        keys
    }
}
