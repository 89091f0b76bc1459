//! Wait-for graph analysis
//!
//! Deadlock detection runs whenever a request has to wait: a depth-first
//! search from the requester looks for a path back to itself. Only cycles
//! through the requester matter; any other cycle would have been found when
//! its last edge was added.

use shared_types::TxnId;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Find a cycle that passes through `start`.
///
/// Returns the transactions on the cycle, beginning with `start`.
pub fn find_cycle(graph: &HashMap<TxnId, Vec<TxnId>>, start: TxnId) -> Option<Vec<TxnId>> {
    let mut path = vec![start];
    let mut visited = HashSet::from([start]);

    if search(graph, start, start, &mut path, &mut visited) {
        Some(path)
    } else {
        None
    }
}

fn search(
    graph: &HashMap<TxnId, Vec<TxnId>>,
    node: TxnId,
    start: TxnId,
    path: &mut Vec<TxnId>,
    visited: &mut HashSet<TxnId>,
) -> bool {
    let Some(edges) = graph.get(&node) else {
        return false;
    };

    for &next in edges {
        if next == start {
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if search(graph, next, start, path, visited) {
                return true;
            }
            path.pop();
        }
    }

    false
}

/// Pick the transaction to roll back.
///
/// The lightest participant loses (fewest locks held plus rows written, the
/// cheapest to undo); ties go against the youngest transaction.
pub fn choose_victim(cycle: &[TxnId], weight: impl Fn(TxnId) -> usize) -> Option<TxnId> {
    cycle
        .iter()
        .copied()
        .min_by_key(|txn| (weight(*txn), Reverse(*txn)))
}
