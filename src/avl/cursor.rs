use super::node::{Arena, Handle, Idx};
use super::view::NodeRef;
use super::AvlMap;
use std::fmt::{Debug, Formatter};

// Navigation over parent links.  None of these recurse, and each is
// O(height) in the worst case.

// leftmost descendant of i
pub(crate) fn first<K, V>(nodes: &Arena<K, V>, mut i: Idx) -> Idx {
    while let Some(lf) = nodes[i].left {
        i = lf;
    }
    i
}

// rightmost descendant of i
pub(crate) fn last<K, V>(nodes: &Arena<K, V>, mut i: Idx) -> Idx {
    while let Some(rt) = nodes[i].right {
        i = rt;
    }
    i
}

pub(crate) fn successor<K, V>(nodes: &Arena<K, V>, i: Idx) -> Option<Idx> {
    if let Some(rt) = nodes[i].right {
        return Some(first(nodes, rt));
    }

    // climb while we are a right child; the first left-child edge leads to
    // the successor
    let mut curr = i;
    while let Some(p) = nodes[curr].parent {
        if nodes[p].left == Some(curr) {
            return Some(p);
        }
        curr = p;
    }

    None
}

pub(crate) fn predecessor<K, V>(nodes: &Arena<K, V>, i: Idx) -> Option<Idx> {
    if let Some(lf) = nodes[i].left {
        return Some(last(nodes, lf));
    }

    let mut curr = i;
    while let Some(p) = nodes[curr].parent {
        if nodes[p].right == Some(curr) {
            return Some(p);
        }
        curr = p;
    }

    None
}

/// A read-only position in an [`AvlMap`]: either an entry or the end.
///
/// The end position sits "one past" the greatest key.  Stepping forward from
/// the greatest key reaches it, stepping forward from it stays there, and
/// stepping back from it lands on the greatest key.
pub struct Cursor<'a, K, V> {
    pub(crate) map: &'a AvlMap<K, V>,
    pub(crate) node: Option<Idx>,
}

impl<'a, K, V> Clone for Cursor<'a, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V> Copy for Cursor<'a, K, V> {}

impl<'a, K, V> Cursor<'a, K, V> {
    /// Is this the end position?
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    pub fn key(&self) -> Option<&'a K> {
        self.node.map(|i| &self.map.nodes[i].key)
    }

    pub fn value(&self) -> Option<&'a V> {
        self.node.map(|i| &self.map.nodes[i].val)
    }

    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        self.node.map(|i| {
            let n = &self.map.nodes[i];
            (&n.key, &n.val)
        })
    }

    /// A handle to the current entry, suitable for [`AvlMap::erase`].  The end
    /// position has none.
    pub fn handle(&self) -> Option<Handle> {
        self.node.map(|i| self.map.nodes.handle(i))
    }

    /// Diagnostic view of the current node.
    pub fn node(&self) -> Option<NodeRef<'a, K, V>> {
        self.node.map(|idx| NodeRef {
            nodes: &self.map.nodes,
            idx,
        })
    }

    pub fn move_next(&mut self) {
        if let Some(i) = self.node {
            self.node = successor(&self.map.nodes, i);
        }
    }

    pub fn move_prev(&mut self) {
        self.node = match self.node {
            Some(i) => predecessor(&self.map.nodes, i),
            None => self.map.root.map(|r| last(&self.map.nodes, r)),
        };
    }

    /// The entry after the current one, without moving.
    pub fn peek_next(&self) -> Option<(&'a K, &'a V)> {
        let mut c = *self;
        c.move_next();
        c.key_value()
    }

    /// The entry before the current one, without moving.
    pub fn peek_prev(&self) -> Option<(&'a K, &'a V)> {
        let mut c = *self;
        c.move_prev();
        c.key_value()
    }
}

impl<'a, K, V> PartialEq for Cursor<'a, K, V> {
    // Any two end positions are equal; otherwise both cursors must sit on
    // the same node of the same map.
    fn eq(&self, other: &Self) -> bool {
        match (self.node, other.node) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b && std::ptr::eq(self.map, other.map),
            _ => false,
        }
    }
}

impl<'a, K, V> Eq for Cursor<'a, K, V> {}

impl<'a, K: Debug, V: Debug> Debug for Cursor<'a, K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.key_value() {
            None => f.write_str("Cursor(END)"),
            Some((k, v)) => f.write_fmt(format_args!("Cursor({:?}: {:?})", k, v)),
        }
    }
}

/// A position in an [`AvlMap`] that can update values and remove entries.
///
/// Movement follows the same rules as [`Cursor`].
pub struct CursorMut<'a, K, V> {
    pub(crate) map: &'a mut AvlMap<K, V>,
    pub(crate) node: Option<Idx>,
}

impl<'a, K, V> CursorMut<'a, K, V> {
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    pub fn key(&self) -> Option<&K> {
        self.node.map(|i| &self.map.nodes[i].key)
    }

    pub fn value(&self) -> Option<&V> {
        self.node.map(|i| &self.map.nodes[i].val)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        match self.node {
            Some(i) => Some(&mut self.map.nodes[i].val),
            None => None,
        }
    }

    /// Gives up the cursor in exchange for a borrow of the current value that
    /// lives as long as the map borrow.
    pub fn into_value_mut(self) -> Option<&'a mut V> {
        let CursorMut { map, node } = self;
        match node {
            Some(i) => Some(&mut map.nodes[i].val),
            None => None,
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        self.node.map(|i| self.map.nodes.handle(i))
    }

    /// A read-only cursor at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            map: self.map,
            node: self.node,
        }
    }

    pub fn move_next(&mut self) {
        if let Some(i) = self.node {
            self.node = successor(&self.map.nodes, i);
        }
    }

    pub fn move_prev(&mut self) {
        self.node = match self.node {
            Some(i) => predecessor(&self.map.nodes, i),
            None => self.map.root.map(|r| last(&self.map.nodes, r)),
        };
    }

    /// Removes the current entry and moves to the entry that followed it.
    /// Does nothing at the end position.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let i = self.node?;
        // The successor is never the node physically unlinked (that is either
        // i itself or its predecessor), and when i has two children its slot
        // takes over the predecessor's entry, which still precedes the
        // successor.
        let next = successor(&self.map.nodes, i);
        let kv = self.map.erase_idx(i);
        self.node = next;
        Some(kv)
    }
}
