//! Master-data views consumed by the ledger
//!
//! Master data itself lives elsewhere; these are the fields the ledger and
//! document services read from it.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Goods master fields used for validation and warnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsInfo {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub category_id: Option<i64>,
    pub safety_stock: Decimal,
    pub need_batch: bool,
    pub need_serial: bool,
}

/// Where a location sits in its warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub id: i64,
    pub warehouse_id: i64,
    pub area_id: i64,
}

/// One row of a flat parent/child list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: i64,
    pub parent_id: Option<i64>,
}

/// Tree built once from a flat list of (id, parent id) pairs.
///
/// Stored as an adjacency map; nodes reference each other only by id.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    children: BTreeMap<i64, Vec<i64>>,
    parents: BTreeMap<i64, i64>,
    roots: Vec<i64>,
}

impl Hierarchy {
    pub fn build(nodes: impl IntoIterator<Item = HierarchyNode>) -> Self {
        let mut hierarchy = Hierarchy::default();
        let mut known = BTreeSet::new();
        let nodes: Vec<_> = nodes.into_iter().collect();
        for node in &nodes {
            known.insert(node.id);
        }
        for node in nodes {
            match node.parent_id {
                // A dangling parent id makes the node a root
                Some(parent) if known.contains(&parent) && parent != node.id => {
                    hierarchy.children.entry(parent).or_default().push(node.id);
                    hierarchy.parents.insert(node.id, parent);
                }
                _ => hierarchy.roots.push(node.id),
            }
        }
        for list in hierarchy.children.values_mut() {
            list.sort_unstable();
        }
        hierarchy.roots.sort_unstable();
        hierarchy
    }

    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied()
    }

    /// `id` and everything below it, breadth first.
    ///
    /// Guards against cycles in malformed input.
    pub fn descendants(&self, id: i64) -> Vec<i64> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        out
    }

    /// Path from the root down to `id`
    pub fn ancestors(&self, id: i64) -> Vec<i64> {
        let mut path = vec![id];
        let mut seen = BTreeSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) {
                break;
            }
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, parent_id: Option<i64>) -> HierarchyNode {
        HierarchyNode { id, parent_id }
    }

    #[test]
    fn test_build_adjacency() {
        let tree = Hierarchy::build([
            node(1, None),
            node(2, Some(1)),
            node(3, Some(1)),
            node(4, Some(2)),
            node(5, Some(99)),
        ]);
        assert_eq!(tree.roots(), &[1, 5]);
        assert_eq!(tree.children(1), &[2, 3]);
        assert_eq!(tree.descendants(1), vec![1, 2, 3, 4]);
        assert_eq!(tree.ancestors(4), vec![1, 2, 4]);
        assert!(tree.children(4).is_empty());
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let tree = Hierarchy::build([node(1, Some(2)), node(2, Some(1))]);
        assert_eq!(tree.descendants(1), vec![1, 2]);
        assert_eq!(tree.ancestors(1), vec![2, 1]);
    }
}
