use super::cursor::{first, last, predecessor, successor};
use super::node::{Arena, Handle, Idx};
use std::fmt::{Debug, Formatter};

/// How a node hangs off its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Root,
    Left,
    Right,
}

/// A read-only view of one tree node, for code that wants to draw or
/// otherwise inspect the shape of a map.
///
/// Obtained from [`AvlMap::root_node`](crate::AvlMap::root_node) or
/// [`Cursor::node`](crate::Cursor::node).  A `NodeRef` borrows the map, so
/// the tree cannot change while one is alive.
pub struct NodeRef<'a, K, V> {
    pub(crate) nodes: &'a Arena<K, V>,
    pub(crate) idx: Idx,
}

impl<'a, K, V> Clone for NodeRef<'a, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V> Copy for NodeRef<'a, K, V> {}

impl<'a, K, V> NodeRef<'a, K, V> {
    fn at(&self, idx: Option<Idx>) -> Option<Self> {
        idx.map(|idx| NodeRef {
            nodes: self.nodes,
            idx,
        })
    }

    pub fn key(&self) -> &'a K {
        &self.nodes[self.idx].key
    }

    pub fn value(&self) -> &'a V {
        &self.nodes[self.idx].val
    }

    /// Height of the subtree rooted here.  A leaf has height 0.
    pub fn height(&self) -> i8 {
        self.nodes[self.idx].height
    }

    /// Number of edges between this node and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut curr = self.idx;
        while let Some(p) = self.nodes[curr].parent {
            depth += 1;
            curr = p;
        }
        depth
    }

    pub fn edge(&self) -> Edge {
        match self.nodes[self.idx].parent {
            None => Edge::Root,
            Some(p) if self.nodes[p].left == Some(self.idx) => Edge::Left,
            Some(_) => Edge::Right,
        }
    }

    pub fn handle(&self) -> Handle {
        self.nodes.handle(self.idx)
    }

    pub fn parent(&self) -> Option<Self> {
        self.at(self.nodes[self.idx].parent)
    }

    pub fn left(&self) -> Option<Self> {
        self.at(self.nodes[self.idx].left)
    }

    pub fn right(&self) -> Option<Self> {
        self.at(self.nodes[self.idx].right)
    }

    /// The least node of this subtree.
    pub fn first(&self) -> Self {
        NodeRef {
            nodes: self.nodes,
            idx: first(self.nodes, self.idx),
        }
    }

    /// The greatest node of this subtree.
    pub fn last(&self) -> Self {
        NodeRef {
            nodes: self.nodes,
            idx: last(self.nodes, self.idx),
        }
    }

    /// In-order successor within the whole tree.
    pub fn next(&self) -> Option<Self> {
        self.at(successor(self.nodes, self.idx))
    }

    /// In-order predecessor within the whole tree.
    pub fn prev(&self) -> Option<Self> {
        self.at(predecessor(self.nodes, self.idx))
    }
}

impl<'a, K, V> PartialEq for NodeRef<'a, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && std::ptr::eq(self.nodes, other.nodes)
    }
}

impl<'a, K, V> Eq for NodeRef<'a, K, V> {}

impl<'a, K: Debug, V: Debug> Debug for NodeRef<'a, K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "(ht: {} {{{:?}: {:?}}} ",
            self.height(),
            self.key(),
            self.value()
        ))?;

        match self.left() {
            None => f.write_str(".")?,
            Some(lf) => lf.fmt(f)?,
        }

        f.write_str(" ")?;

        match self.right() {
            None => f.write_str(".")?,
            Some(rt) => rt.fmt(f)?,
        }

        f.write_str(")")
    }
}
