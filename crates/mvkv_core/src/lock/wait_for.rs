//! Wait-for graph and deadlock detection.

use crate::types::TransactionId;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Directed graph of blocked transactions.
///
/// An edge `a -> b` means `a` is waiting for a lock held by `b`. Only
/// transactions with at least one edge appear as nodes, so the graph stays
/// sized to the transactions currently involved in waits.
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    edges: BTreeMap<TransactionId, BTreeSet<TransactionId>>,
}

impl WaitForGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `waiter` is blocked on `holder`.
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        self.edges.entry(waiter).or_default().insert(holder);
    }

    /// Removes every edge leaving `waiter`.
    pub fn clear_waiter(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Removes every edge touching `txid`, in either direction.
    pub fn remove_transaction(&mut self, txid: TransactionId) {
        self.edges.remove(&txid);
        self.edges.retain(|_, holders| {
            holders.remove(&txid);
            !holders.is_empty()
        });
    }

    /// Returns the transactions `waiter` is blocked on.
    pub fn waits_for(&self, waiter: TransactionId) -> impl Iterator<Item = TransactionId> + '_ {
        self.edges.get(&waiter).into_iter().flatten().copied()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Returns true if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Checks whether any transaction waits on itself, transitively.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Finds a cycle, returned as the transactions along it.
    ///
    /// Depth-first search from every unvisited node, tracking the nodes on
    /// the current path. An edge back into the path closes a cycle. O(V+E).
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<TransactionId>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for &start in self.edges.keys() {
            if !visited.contains(&start) {
                if let Some(cycle) = self.visit(start, &mut visited, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(
        &self,
        node: TransactionId,
        visited: &mut HashSet<TransactionId>,
        path: &mut Vec<TransactionId>,
    ) -> Option<Vec<TransactionId>> {
        visited.insert(node);
        path.push(node);

        for next in self.waits_for(node) {
            if let Some(pos) = path.iter().position(|&t| t == next) {
                return Some(path[pos..].to_vec());
            }
            if !visited.contains(&next) {
                if let Some(cycle) = self.visit(next, visited, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        None
    }
}
