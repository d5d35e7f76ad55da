//! # An ordered map on an AVL tree with parent links
//!
//! [`AvlMap`] keeps its entries sorted by key in a height-balanced binary
//! search tree.  Every node records its parent, so the map offers
//! bidirectional [`Cursor`]s in the style of C++ iterators (`begin`, `end`,
//! `find`, `erase`) next to the usual Rust iterators and entry API.
//!
//! Nodes are stored in an arena owned by the map.  A [`Handle`] names one
//! entry and stays valid across rebalancing until that entry is erased.
//!
//! The tree's shape can be inspected read-only through [`NodeRef`], which is
//! enough to draw the tree or compute statistics about it.

mod avl;
pub use avl::{
    AvlMap, Cursor, CursorMut, Edge, Entry, Handle, IntoIter, Iter, IterMut,
    Keys, NodeRef, OccupiedEntry, VacantEntry, Values, ValuesMut,
};

mod error;
pub use error::{AllocError, CheckError};

#[cfg(feature = "serde")]
mod serde;
