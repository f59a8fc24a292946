//! # Join Trees
//!
//! A `JoinTree` pairs a plan fragment built by the enumerator with a binary tree of
//! factor ids mirroring its join structure. The factor tree is what tells the
//! enumerator where each factor's columns sit in the fragment's row: reading the
//! leaves left to right gives the *tree order*, and a factor's columns start after
//! the columns of every factor before it in that order.
//!
//! ## Arena
//!
//! Factor-tree nodes live in a `FactorTreeArena` and are addressed by
//! `FactorTreeId`. The arena is append-only: building a join allocates one new
//! node whose children are existing ids, so alternative trees explored during
//! enumeration share their common subtrees. One arena serves a whole candidate
//! ordering and is handed over with the finished tree.
//!
//! Replacement projections (join removal) extend the factor tree without adding
//! a join to the plan, so a fragment's plan shape can be shallower than its
//! factor tree.

use crate::bitset::BitSet;
use crate::plan::{PlanKind, PlanRef};

/// Index of a node in a [`FactorTreeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorTreeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorTreeNode {
    Leaf(usize),
    Node { left: FactorTreeId, right: FactorTreeId },
}

/// Append-only storage for factor-tree nodes.
#[derive(Debug, Clone, Default)]
pub struct FactorTreeArena {
    nodes: Vec<FactorTreeNode>,
}

impl FactorTreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(&mut self, factor: usize) -> FactorTreeId {
        self.push(FactorTreeNode::Leaf(factor))
    }

    pub fn node(&mut self, left: FactorTreeId, right: FactorTreeId) -> FactorTreeId {
        self.push(FactorTreeNode::Node { left, right })
    }

    fn push(&mut self, node: FactorTreeNode) -> FactorTreeId {
        self.nodes.push(node);
        FactorTreeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: FactorTreeId) -> FactorTreeNode {
        self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Factor ids below `id` in left-to-right leaf order.
    pub fn tree_order(&self, id: FactorTreeId) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            match self.get(next) {
                FactorTreeNode::Leaf(f) => order.push(f),
                FactorTreeNode::Node { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        order
    }

    pub fn factors(&self, id: FactorTreeId) -> BitSet {
        self.tree_order(id).into_iter().collect()
    }

    /// Nested-bracket rendering, e.g. `[[2, 0], 1]`.
    pub fn display(&self, id: FactorTreeId) -> String {
        match self.get(id) {
            FactorTreeNode::Leaf(f) => f.to_string(),
            FactorTreeNode::Node { left, right } => {
                format!("[{}, {}]", self.display(left), self.display(right))
            }
        }
    }
}

/// A plan fragment joining a subset of the factors, with its factor tree.
#[derive(Debug, Clone)]
pub struct JoinTree {
    plan: PlanRef,
    factor_tree: FactorTreeId,
    removable_self_join: bool,
}

impl JoinTree {
    /// Single factor `factor` read through `plan`.
    pub fn leaf(arena: &mut FactorTreeArena, plan: PlanRef, factor: usize) -> Self {
        Self { plan, factor_tree: arena.leaf(factor), removable_self_join: false }
    }

    pub fn new(plan: PlanRef, factor_tree: FactorTreeId, removable_self_join: bool) -> Self {
        Self { plan, factor_tree, removable_self_join }
    }

    pub fn plan(&self) -> &PlanRef {
        &self.plan
    }

    pub fn factor_tree(&self) -> FactorTreeId {
        self.factor_tree
    }

    pub fn tree_order(&self, arena: &FactorTreeArena) -> Vec<usize> {
        arena.tree_order(self.factor_tree)
    }

    pub fn factors(&self, arena: &FactorTreeArena) -> BitSet {
        arena.factors(self.factor_tree)
    }

    /// The top join pairs the two halves of a removable self-join.
    pub fn is_removable_self_join(&self) -> bool {
        self.removable_self_join
    }

    /// Left subtree of a join.
    ///
    /// Panics unless the plan is a join and the factor tree is an interior node.
    pub fn left(&self, arena: &FactorTreeArena) -> JoinTree {
        self.child(arena, true)
    }

    /// Right subtree of a join. Panics like [`JoinTree::left`].
    pub fn right(&self, arena: &FactorTreeArena) -> JoinTree {
        self.child(arena, false)
    }

    fn child(&self, arena: &FactorTreeArena, left: bool) -> JoinTree {
        let (PlanKind::Join { left: lp, right: rp, .. }, FactorTreeNode::Node { left: lt, right: rt }) =
            (self.plan.kind(), arena.get(self.factor_tree))
        else {
            panic!("join tree over factors {} has no children", arena.display(self.factor_tree));
        };
        let (plan, tree) = if left { (lp, lt) } else { (rp, rt) };
        let removable_self_join = matches!(plan.kind(), PlanKind::Join { removable_self_join: true, .. });
        JoinTree::new(plan.clone(), tree, removable_self_join)
    }
}
