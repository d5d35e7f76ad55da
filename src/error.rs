use std::collections::TryReserveError;

/// Returned by the `try_` insertion methods when a new tree node cannot be
/// allocated.  The map is left unchanged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to allocate a tree node")]
pub struct AllocError {
    #[from]
    source: TryReserveError,
}

/// A broken structural invariant, as reported by
/// [`AvlMap::check`](crate::AvlMap::check).
///
/// Node positions are arena slot numbers; they are only useful for
/// correlating several reports about the same map.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("node {node} is not linked back to its parent")]
    Parent { node: usize },

    #[error("node {node} records height {stored} but its subtree is {actual} tall")]
    Height { node: usize, stored: i8, actual: i8 },

    #[error("node {node} has balance factor {balance}")]
    Balance { node: usize, balance: i8 },

    #[error("key at node {node} is not greater than its in-order predecessor")]
    Order { node: usize },

    #[error("map records {len} entries but {reachable} nodes are reachable")]
    Len { len: usize, reachable: usize },
}
