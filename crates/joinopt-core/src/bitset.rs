//! # Bit Sets
//!
//! Factor masks and field masks are sets of small non-negative integers that are
//! unioned, intersected and subset-tested constantly while join orders are built.
//! `BitSet` wraps a compressed `RoaringBitmap` behind a `usize` API so callers never
//! deal with the bitmap's `u32` domain directly.
//!
//! Iteration is always ascending, which gives "next set bit" scans for free.

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Growable set of column or factor ordinals.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitSet {
    bits: RoaringBitmap,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set `{lo, lo + 1, .., hi - 1}`.
    pub fn range(lo: usize, hi: usize) -> Self {
        let mut bits = RoaringBitmap::new();
        if hi > lo {
            bits.insert_range(to_u32(lo)..to_u32(hi));
        }
        Self { bits }
    }

    pub fn of<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for bit in iter {
            set.insert(bit);
        }
        set
    }

    /// Insert `bit`, returning `true` if it was not already present.
    pub fn insert(&mut self, bit: usize) -> bool {
        self.bits.insert(to_u32(bit))
    }

    pub fn remove(&mut self, bit: usize) -> bool {
        self.bits.remove(to_u32(bit))
    }

    pub fn contains(&self, bit: usize) -> bool {
        u32::try_from(bit).map_or(false, |b| self.bits.contains(b))
    }

    pub fn len(&self) -> usize {
        self.bits.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().map(|b| b as usize)
    }

    pub fn first(&self) -> Option<usize> {
        self.bits.min().map(|b| b as usize)
    }

    /// Smallest member that is `>= from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.iter().find(|&b| b >= from)
    }

    pub fn union(&self, other: &BitSet) -> BitSet {
        BitSet { bits: &self.bits | &other.bits }
    }

    pub fn intersection(&self, other: &BitSet) -> BitSet {
        BitSet { bits: &self.bits & &other.bits }
    }

    pub fn difference(&self, other: &BitSet) -> BitSet {
        BitSet { bits: &self.bits - &other.bits }
    }

    pub fn union_with(&mut self, other: &BitSet) {
        self.bits |= &other.bits;
    }

    pub fn intersect_with(&mut self, other: &BitSet) {
        self.bits &= &other.bits;
    }

    /// True if every member of `self` is also in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.bits.is_subset(&other.bits)
    }

    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

fn to_u32(bit: usize) -> u32 {
    u32::try_from(bit).unwrap_or_else(|_| panic!("bit index {bit} exceeds the u32 domain"))
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::of(iter)
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{bit}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
