use crate::error::{AllocError, CheckError};
use std::borrow::Borrow;
use std::cmp::Ordering::{self, *};
use std::fmt::{Debug, Formatter};
use std::mem::replace;
use tracing::trace;

mod balance;
mod cursor;
mod iter;
mod node;
mod view;

pub use cursor::{Cursor, CursorMut};
pub use iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
pub use node::Handle;
pub use view::{Edge, NodeRef};

use balance::{rebal_after_insert, rebal_after_remove};
use cursor::{first, last};
use node::{Arena, Idx, Node};

#[cfg(test)]
macro_rules! chk_map {
    ( $x:expr ) => {{
        $x.chk();
    }};
}

#[cfg(not(test))]
macro_rules! chk_map {
    ( $x:expr ) => {{}};
}

/// A sorted map from keys to values, implemented as an AVL tree.
///
/// Every node keeps a link to its parent, so cursors and iterators step to
/// the next or previous entry without a work stack, in either direction.
/// Nodes live in an arena owned by the map; the parent links are plain slot
/// numbers and play no part in ownership.
///
/// Entries can be named by a [`Handle`].  Handles stay valid while the tree is
/// rebalanced around them and go stale once their entry is erased.
///
/// Lookup, insertion and removal are O(log n).  Clones are deep: each entry
/// of the source is re-inserted into a fresh map, so a clone may be shaped
/// differently from its source while holding exactly the same entries.
///
/// # Examples
/// ```
/// use avl_map::AvlMap;
///
/// let mut m = AvlMap::new();
/// m.insert(20, "b");
/// m.insert(10, "a");
/// *m.get_or_insert_default(30) = "c";
///
/// let keys: Vec<_> = m.keys().copied().collect();
/// assert_eq!(keys, [10, 20, 30]);
///
/// let h = m.find(&20).handle();
/// assert_eq!(m.erase(h), Some((20, "b")));
/// assert_eq!(m.len(), 2);
/// ```
pub struct AvlMap<K, V> {
    nodes: Arena<K, V>,
    root: Option<Idx>,
    len: usize,
}

enum Probe {
    Found(Idx),
    // `side` says which child of `parent` the key belongs in; `path` holds
    // the visited ancestors, root first.
    Vacant {
        parent: Option<Idx>,
        side: Ordering,
        path: Vec<Idx>,
    },
}

impl<K, V> AvlMap<K, V> {
    /// Creates a new, empty map.
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    /// let m: AvlMap<usize, usize> = AvlMap::new();
    /// assert!(m.is_empty());
    /// ```
    pub const fn new() -> Self {
        AvlMap {
            nodes: Arena::new(),
            root: None,
            len: 0,
        }
    }

    /// Drops all elements from the map.  Handles into the map go stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    /// Moves every entry into a new map and leaves self empty.
    ///
    /// No node is copied or dropped, and handles into self now refer to the
    /// returned map.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut a = AvlMap::from([(1, 'x'), (2, 'y')]);
    /// let b = a.take();
    /// assert!(a.is_empty());
    /// assert_eq!(b.len(), 2);
    /// ```
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Returns true if self contains no entries, false otherwise.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of entries in self.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Creates an iterator over the map entries, sorted by key.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let m = AvlMap::from([(0,1), (1,2), (2, 3)]);
    /// for (i, (k, v)) in m.iter().enumerate() {
    ///     assert_eq!(&i, k);
    ///     assert_eq!(&(i+1), v);
    /// }
    /// assert_eq!(m.iter().next_back(), Some((&2, &3)));
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            front: self.root.map(|r| first(&self.nodes, r)),
            back: self.root.map(|r| last(&self.nodes, r)),
            len: self.len,
        }
    }

    /// Returns an iterator of the map's entries, sorted by key, with a mutable
    /// reference to each value.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut m = AvlMap::from([(0,0), (1,1), (2,2)]);
    /// for (k, v) in m.iter_mut() {
    ///     *v += k;
    /// }
    /// assert_eq!(m.get(&0), Some(&0));
    /// assert_eq!(m.get(&1), Some(&2));
    /// assert_eq!(m.get(&2), Some(&4));
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.nodes, self.root)
    }

    /// Produces an iterator over the keys of the map, in sorted order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Produces an iterator over the values of the map, ordered by their
    /// associated keys.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator of mutable references to the map's values, ordered
    /// by their associated keys.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut m = AvlMap::from([(0,0), (1,1), (2,2)]);
    /// for v in m.values_mut() {
    ///     *v *= 17;
    /// };
    /// assert_eq!(m.get(&2), Some(&34));
    /// ```
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Applies f to each entry of the map in order of the keys.
    pub fn for_each<F: FnMut((&K, &V))>(&self, f: F) {
        self.iter().for_each(f);
    }

    /// Returns the key-value pair for the least key in the map
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let fmap = AvlMap::from([(2,0), (1,0)]);
    /// assert_eq!(fmap.first_key_value(), Some((&1, &0)));
    /// ```
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.begin().key_value()
    }

    /// Returns the key-value pair for the greatest key in the map
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let mut c = self.end();
        c.move_prev();
        c.key_value()
    }

    /// A cursor at the least key, or at the end if the map is empty.
    pub fn begin(&self) -> Cursor<'_, K, V> {
        Cursor {
            map: self,
            node: self.root.map(|r| first(&self.nodes, r)),
        }
    }

    /// The position one past the greatest key.
    pub fn end(&self) -> Cursor<'_, K, V> {
        Cursor {
            map: self,
            node: None,
        }
    }

    pub fn begin_mut(&mut self) -> CursorMut<'_, K, V> {
        let node = self.root.map(|r| first(&self.nodes, r));
        CursorMut { map: self, node }
    }

    pub fn end_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut {
            map: self,
            node: None,
        }
    }

    /// A cursor at the entry named by `h`, or at the end if `h` is stale.
    pub fn cursor(&self, h: Handle) -> Cursor<'_, K, V> {
        Cursor {
            map: self,
            node: self.nodes.resolve(h),
        }
    }

    /// A mutable cursor at the entry named by `h`, or at the end if `h` is
    /// stale.
    pub fn cursor_mut(&mut self, h: Handle) -> CursorMut<'_, K, V> {
        let node = self.nodes.resolve(h);
        CursorMut { map: self, node }
    }

    /// Read-only view of the root node, for inspecting the tree's shape.
    ///
    /// # Examples
    /// ```
    /// use avl_map::{AvlMap, Edge};
    ///
    /// let m: AvlMap<_, _> = (1..=3).map(|k| (k, ())).collect();
    /// let root = m.root_node().unwrap();
    /// assert_eq!(root.key(), &2);
    /// assert_eq!(root.height(), 1);
    /// assert_eq!(root.left().unwrap().edge(), Edge::Left);
    /// assert_eq!(root.right().unwrap().depth(), 1);
    /// ```
    pub fn root_node(&self) -> Option<NodeRef<'_, K, V>> {
        self.root.map(|idx| NodeRef {
            nodes: &self.nodes,
            idx,
        })
    }

    // Attaches a new leaf at a vacant position found by `probe` and
    // rebalances the path above it.
    fn attach(
        &mut self,
        parent: Option<Idx>,
        side: Ordering,
        path: Vec<Idx>,
        key: K,
        val: V,
    ) -> Idx {
        let i = self.nodes.alloc(Node::leaf(key, val, parent));
        match parent {
            None => self.root = Some(i),
            Some(p) if side == Less => self.nodes[p].left = Some(i),
            Some(p) => self.nodes[p].right = Some(i),
        }
        self.len += 1;

        rebal_after_insert(&mut self.nodes, &mut self.root, path);
        i
    }

    // Removes the entry stored at slot `target` and returns it.
    fn erase_idx(&mut self, target: Idx) -> (K, V) {
        // With two children, the in-order predecessor (rightmost node of the
        // left subtree) is unlinked instead and its entry moves into
        // `target`.  The predecessor has no right child.
        let victim = match (self.nodes[target].left, self.nodes[target].right) {
            (Some(lf), Some(_)) => last(&self.nodes, lf),
            _ => target,
        };
        trace!(node = target, unlinked = victim, "erase");

        let path = self.ancestors(victim);
        let old = self.unlink(victim);

        let entry = if victim == target {
            (old.key, old.val)
        } else {
            let n = &mut self.nodes[target];
            (replace(&mut n.key, old.key), replace(&mut n.val, old.val))
        };

        rebal_after_remove(&mut self.nodes, &mut self.root, &path);
        self.len -= 1;
        entry
    }

    // ancestors of i, nearest first
    fn ancestors(&self, i: Idx) -> Vec<Idx> {
        let mut path = Vec::new();
        let mut curr = self.nodes[i].parent;
        while let Some(p) = curr {
            path.push(p);
            curr = self.nodes[p].parent;
        }
        path
    }

    // prerequisite: i has at most one child
    fn unlink(&mut self, i: Idx) -> Node<K, V> {
        let n = &self.nodes[i];
        let child = n.left.or(n.right);
        let parent = n.parent;

        if let Some(c) = child {
            self.nodes[c].parent = parent;
        }

        match parent {
            None => self.root = child,
            Some(p) => {
                let p = &mut self.nodes[p];
                if p.left == Some(i) {
                    p.left = child;
                } else {
                    p.right = child;
                }
            }
        }

        self.nodes.release(i)
    }
}

impl<K: Ord, V> AvlMap<K, V> {
    // A descent visits at most height + 1 nodes.
    fn path_cap(&self) -> usize {
        (self.nodes.height(self.root) + 1) as usize
    }

    fn probe<Q>(&self, key: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.probe_into(key, Vec::with_capacity(self.path_cap()))
    }

    // Like `probe`, but the path is allocated fallibly.
    fn try_probe<Q>(&self, key: &Q) -> Result<Probe, AllocError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut path = Vec::new();
        path.try_reserve_exact(self.path_cap())?;
        Ok(self.probe_into(key, path))
    }

    // `path` must have room for a full descent; it is never grown.
    fn probe_into<Q>(&self, key: &Q, mut path: Vec<Idx>) -> Probe
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut side = Equal;
        let mut curr = self.root;
        while let Some(i) = curr {
            let n = &self.nodes[i];
            side = key.cmp(n.key.borrow());
            curr = match side {
                Less => n.left,
                Equal => return Probe::Found(i),
                Greater => n.right,
            };
            path.push(i);
        }

        Probe::Vacant {
            parent: path.last().copied(),
            side,
            path,
        }
    }

    fn find_idx<Q>(&self, key: &Q) -> Option<Idx>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut curr = self.root;
        while let Some(i) = curr {
            let n = &self.nodes[i];
            match key.cmp(n.key.borrow()) {
                Less => curr = n.left,
                Equal => return Some(i),
                Greater => curr = n.right,
            }
        }

        None
    }

    /// A cursor at the entry for `key`, or at the end if there is none.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let m = AvlMap::from([(1, 'a'), (2, 'b')]);
    /// assert_eq!(m.find(&1).value(), Some(&'a'));
    /// assert_eq!(m.find(&7), m.end());
    /// ```
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor {
            map: self,
            node: self.find_idx(key),
        }
    }

    /// A mutable cursor at the entry for `key`, or at the end if there is
    /// none.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.find_idx(key);
        CursorMut { map: self, node }
    }

    /// Tests if self contains an entry for the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_idx(key).is_some()
    }

    /// Returns a reference to the value associated with k.
    pub fn get<Q>(&self, k: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_idx(k).map(|i| &self.nodes[i].val)
    }

    pub fn get_key_value<Q>(&self, k: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(k).key_value()
    }

    /// Returns a mutable reference to the value associated with k.
    ///
    /// # Example
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut fmap = AvlMap::new();
    /// fmap.insert(1, 7);
    ///
    /// *fmap.get_mut(&1).unwrap() = 2;
    /// assert_eq!(fmap.get(&1), Some(&2));
    /// ```
    pub fn get_mut<Q>(&mut self, k: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let i = self.find_idx(k)?;
        Some(&mut self.nodes[i].val)
    }

    /// Inserts a key-value pair in the map.  If the key was present, its
    /// value is replaced and the old one returned.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut fmap = AvlMap::new();
    /// assert_eq!(fmap.insert(0, "a"), None);
    /// assert_eq!(fmap.insert(0, "b"), Some("a"));
    /// assert_eq!(fmap.get(&0), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, val: V) -> Option<V> {
        match self.probe(&key) {
            Probe::Found(i) => Some(replace(&mut self.nodes[i].val, val)),
            Probe::Vacant { parent, side, path } => {
                self.attach(parent, side, path, key, val);
                chk_map!(self);
                None
            }
        }
    }

    /// Like [`insert`](#method.insert), but reports a failure to allocate the
    /// new node instead of aborting.  On error the map is unchanged.
    pub fn try_insert(&mut self, key: K, val: V) -> Result<Option<V>, AllocError> {
        match self.try_probe(&key)? {
            Probe::Found(i) => Ok(Some(replace(&mut self.nodes[i].val, val))),
            Probe::Vacant { parent, side, path } => {
                self.nodes.try_reserve()?;
                self.attach(parent, side, path, key, val);
                chk_map!(self);
                Ok(None)
            }
        }
    }

    /// Returns the value for `key`, first inserting `V::default()` if the key
    /// is absent.  Unlike [`get_mut`](#method.get_mut), this never misses.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut counts: AvlMap<&str, i32> = AvlMap::new();
    /// for w in ["b", "a", "b"] {
    ///     *counts.get_or_insert_default(w) += 1;
    /// }
    /// assert_eq!(counts.len(), 2);
    /// assert_eq!(counts[&"b"], 2);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.entry(key).or_default()
    }

    /// Fallible form of [`get_or_insert_default`](#method.get_or_insert_default).
    pub fn try_get_or_insert_default(&mut self, key: K) -> Result<&mut V, AllocError>
    where
        V: Default,
    {
        let i = match self.try_probe(&key)? {
            Probe::Found(i) => i,
            Probe::Vacant { parent, side, path } => {
                self.nodes.try_reserve()?;
                self.attach(parent, side, path, key, V::default())
            }
        };
        Ok(&mut self.nodes[i].val)
    }

    /// Returns the value for `key`, first inserting `f()` if the key is absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &mut V {
        self.entry(key).or_insert_with(f)
    }

    /// Returns an Entry that simplifies some update operations.  The tree is
    /// searched once, whichever way the entry is then used.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        match self.probe(&key) {
            Probe::Found(idx) => Entry::Occupied(OccupiedEntry { map: self, idx }),
            Probe::Vacant { parent, side, path } => Entry::Vacant(VacantEntry {
                map: self,
                key,
                parent,
                side,
                path,
            }),
        }
    }

    /// Removes the entry named by `at`.  Stale handles and the end position
    /// (`None`) are ignored.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut m = AvlMap::from([(1, 'a'), (2, 'b')]);
    /// assert_eq!(m.erase(m.find(&3).handle()), None);
    /// assert_eq!(m.len(), 2);
    ///
    /// let h = m.find(&1).handle().unwrap();
    /// assert_eq!(m.erase(h), Some((1, 'a')));
    /// assert_eq!(m.erase(h), None);
    /// assert_eq!(m.len(), 1);
    /// ```
    pub fn erase(&mut self, at: impl Into<Option<Handle>>) -> Option<(K, V)> {
        let i = self.nodes.resolve(at.into()?)?;
        let kv = self.erase_idx(i);
        chk_map!(self);
        Some(kv)
    }

    /// Removes a key from a map and returns the unmapped value.
    ///
    /// # Examples
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut fmap = AvlMap::new();
    /// fmap.insert(1, 2);
    /// fmap.insert(2, 3);
    /// assert_eq!(fmap.remove(&2), Some(3));
    /// assert_eq!(fmap.remove(&2), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove_entry(key).map(|e| e.1)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let i = self.find_idx(key)?;
        let kv = self.erase_idx(i);
        chk_map!(self);
        Some(kv)
    }

    /// Verifies the structure of the tree: key order, AVL balance, recorded
    /// heights, parent links and the entry count.
    pub fn check(&self) -> Result<(), CheckError> {
        if let Some(r) = self.root {
            if self.nodes[r].parent.is_some() {
                return Err(CheckError::Parent { node: r });
            }
        }

        // in-order walk over the child links only
        let mut reachable = 0;
        let mut prev: Option<Idx> = None;
        let mut work = Vec::new();
        let mut curr = self.root;
        loop {
            while let Some(i) = curr {
                work.push(i);
                if work.len() > self.nodes.len() {
                    // a cycle
                    return Err(CheckError::Len {
                        len: self.len,
                        reachable: work.len(),
                    });
                }
                curr = self.nodes[i].left;
            }

            let Some(i) = work.pop() else {
                break;
            };

            reachable += 1;
            if reachable > self.nodes.len() {
                // a node was reached twice
                return Err(CheckError::Len {
                    len: self.len,
                    reachable,
                });
            }
            self.check_node(i)?;
            if let Some(p) = prev {
                if self.nodes[p].key >= self.nodes[i].key {
                    return Err(CheckError::Order { node: i });
                }
            }
            prev = Some(i);
            curr = self.nodes[i].right;
        }

        if reachable != self.len || self.nodes.len() != self.len {
            return Err(CheckError::Len {
                len: self.len,
                reachable,
            });
        }

        Ok(())
    }

    fn check_node(&self, i: Idx) -> Result<(), CheckError> {
        let n = &self.nodes[i];
        for c in [n.left, n.right].into_iter().flatten() {
            if self.nodes[c].parent != Some(i) {
                return Err(CheckError::Parent { node: c });
            }
        }

        let (lf_ht, rt_ht) = (self.nodes.height(n.left), self.nodes.height(n.right));
        let actual = lf_ht.max(rt_ht) + 1;
        if n.height != actual {
            return Err(CheckError::Height {
                node: i,
                stored: n.height,
                actual,
            });
        }

        let balance = lf_ht - rt_ht;
        if !(-1..=1).contains(&balance) {
            return Err(CheckError::Balance { node: i, balance });
        }

        Ok(())
    }

    #[cfg(test)]
    fn chk(&self) {
        if let Err(e) = self.check() {
            panic!("{e}");
        }
    }

    // Re-inserts every entry of src in pre-order.
    fn copy_from(&mut self, src: &Self)
    where
        K: Clone,
        V: Clone,
    {
        let mut work: Vec<Idx> = src.root.into_iter().collect();
        while let Some(i) = work.pop() {
            let n = &src.nodes[i];
            self.insert(n.key.clone(), n.val.clone());
            work.extend(n.right);
            work.extend(n.left);
        }
    }
}

impl<K: Clone + Ord, V: Clone> Clone for AvlMap<K, V> {
    fn clone(&self) -> Self {
        let mut m = AvlMap::new();
        m.copy_from(self);
        m
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.copy_from(source);
    }
}

impl<K: Debug, V: Debug> Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.root_node() {
            None => f.write_str("AvlMap(EMPTY)"),
            Some(n) => {
                // use NodeRef's Debug formatter
                f.write_fmt(format_args!("AvlMap(#{}, {:?})", self.len, n))
            }
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for AvlMap<K, V> {}

impl<K: PartialOrd, V: PartialOrd> PartialOrd for AvlMap<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord> Ord for AvlMap<K, V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K, V> std::hash::Hash for AvlMap<K, V>
where
    K: std::hash::Hash,
    V: std::hash::Hash,
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);
        self.for_each(|(k, v)| {
            k.hash(state);
            v.hash(state);
        });
    }
}

impl<K, Q, V> std::ops::Index<&Q> for AvlMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    type Output = V;

    fn index(&self, index: &Q) -> &Self::Output {
        match self.get(index) {
            Some(v) => v,
            None => panic!("Key not found in AvlMap"),
        }
    }
}

impl<K, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlMap<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for AvlMap<K, V> {
    fn from(vs: [(K, V); N]) -> Self {
        AvlMap::from_iter(vs)
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fmap = AvlMap::new();
        fmap.extend(iter);
        fmap
    }
}

impl<K, V> IntoIterator for AvlMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.nodes, self.root)
    }
}

impl<'a, K, V> IntoIterator for &'a AvlMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut AvlMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

pub struct OccupiedEntry<'a, K, V> {
    map: &'a mut AvlMap<K, V>,
    idx: Idx,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    pub fn get(&self) -> &V {
        &self.map.nodes[self.idx].val
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.map.nodes[self.idx].val
    }

    pub fn insert(&mut self, new_val: V) -> V {
        replace(self.get_mut(), new_val)
    }

    pub fn into_mut(self) -> &'a mut V {
        let OccupiedEntry { map, idx } = self;
        &mut map.nodes[idx].val
    }

    pub fn key(&self) -> &K {
        &self.map.nodes[self.idx].key
    }

    pub fn handle(&self) -> Handle {
        self.map.nodes.handle(self.idx)
    }

    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    pub fn remove_entry(self) -> (K, V) {
        self.map.erase_idx(self.idx)
    }
}

pub struct VacantEntry<'a, K, V> {
    map: &'a mut AvlMap<K, V>,
    key: K,
    parent: Option<Idx>,
    side: Ordering,
    path: Vec<Idx>,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    pub fn insert(self, val: V) -> &'a mut V {
        let VacantEntry {
            map,
            key,
            parent,
            side,
            path,
        } = self;
        let i = map.attach(parent, side, path, key, val);
        &mut map.nodes[i].val
    }

    pub fn into_key(self) -> K {
        self.key
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

pub enum Entry<'a, K, V> {
    Occupied(OccupiedEntry<'a, K, V>),
    Vacant(VacantEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    pub fn and_modify<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        if let Entry::Occupied(occ) = &mut self {
            f(occ.get_mut());
        }

        self
    }

    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(x) => x.key(),
            Entry::Vacant(x) => &x.key,
        }
    }

    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        match self {
            Entry::Occupied(x) => x.into_mut(),
            Entry::Vacant(x) => x.insert(V::default()),
        }
    }

    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(x) => x.into_mut(),
            Entry::Vacant(x) => x.insert(default),
        }
    }

    pub fn or_insert_with<F: FnOnce() -> V>(self, default: F) -> &'a mut V {
        match self {
            Entry::Occupied(x) => x.into_mut(),
            Entry::Vacant(x) => x.insert(default()),
        }
    }

    pub fn or_insert_with_key<F: FnOnce(&K) -> V>(self, default: F) -> &'a mut V {
        match self {
            Entry::Occupied(x) => x.into_mut(),
            Entry::Vacant(x) => {
                let v = default(&x.key);
                x.insert(v)
            }
        }
    }
}

#[cfg(test)]
mod test {
    extern crate quickcheck;
    use super::balance::{take_tally, Tally};
    use super::*;
    use quickcheck::quickcheck;

    fn bal_test(vs: Vec<(u8, u32)>) {
        let mut fmap = AvlMap::new();
        for &(k, v) in vs.iter() {
            fmap.insert(k, v);
            fmap.chk();
        }
    }

    fn rm_test(vs: Vec<(i8, u32)>) {
        let mut fmap = AvlMap::new();
        let mut btree = std::collections::BTreeMap::new();

        for &(k, v) in vs.iter() {
            match k {
                1..=i8::MAX => {
                    let k = k % 32;
                    assert_eq!(fmap.insert(k, v), btree.insert(k, v));
                }

                0 | i8::MIN => (),

                _ => {
                    let k = -k % 32;
                    let len = fmap.len();
                    let expect = btree.remove(&k);
                    assert_eq!(fmap.remove(&k), expect);
                    assert_eq!(fmap.len(), len - expect.is_some() as usize);
                }
            }

            assert!(fmap.iter().eq(btree.iter()));
            fmap.chk();
        }
    }

    // systematically try deleting each element of fmap
    fn chk_all_removes(fmap: AvlMap<u8, u8>) {
        for (k, v) in fmap.clone().iter() {
            let mut fmap2 = fmap.clone();
            assert_eq!(fmap2.remove(k), Some(*v));
            fmap2.chk();
            assert_eq!(fmap2.len(), fmap.len() - 1);
        }
    }

    fn shape(m: &AvlMap<i32, i32>) -> Vec<(i32, usize, i8)> {
        let mut res = Vec::new();
        let mut n = m.root_node().map(|r| r.first());
        while let Some(x) = n {
            res.push((*x.key(), x.depth(), x.height()));
            n = x.next();
        }
        res
    }

    #[test]
    fn three_ascending_inserts_rotate_left() {
        let mut m = AvlMap::new();
        m.insert(10, 0);
        m.insert(20, 0);
        m.insert(30, 0);

        let root = m.root_node().unwrap();
        assert_eq!(root.key(), &20);
        assert_eq!(root.edge(), Edge::Root);
        assert_eq!(root.left().unwrap().key(), &10);
        assert_eq!(root.right().unwrap().key(), &30);
        assert_eq!(shape(&m), vec![(10, 1, 0), (20, 0, 1), (30, 1, 0)]);
    }

    #[test]
    fn third_ascending_insert_rotates_once_at_the_root() {
        let mut m = AvlMap::new();
        m.insert(10, 0);
        m.insert(20, 0);
        take_tally();

        m.insert(30, 0);
        // 20 is examined and found balanced, then one left rotation at 10
        assert_eq!(
            take_tally(),
            Tally {
                visits: 2,
                rotations: 1
            }
        );
        assert_eq!(m.root_node().unwrap().key(), &20);
    }

    #[test]
    fn insertion_stops_after_the_first_rotation() {
        let mut m = AvlMap::new();
        let mut work = Vec::new();
        for k in 1..=7 {
            take_tally();
            m.insert(k, ());
            work.push(take_tally());
        }

        let rotations: Vec<_> = work.iter().map(|t| t.rotations).collect();
        let visits: Vec<_> = work.iter().map(|t| t.visits).collect();
        assert_eq!(rotations, [0, 0, 1, 0, 1, 1, 1]);
        // inserting 7 rotates at 5 and never looks at the root 4
        assert_eq!(visits, [0, 1, 2, 2, 2, 3, 2]);
        assert_eq!(m.root_node().unwrap().key(), &4);
    }

    #[test]
    fn removal_rebalances_at_every_level() {
        // level order of a tree where every node leans left:
        // 8(5(3(2(1),4),7(6)),11(10(9),12))
        let keys = [8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1];
        let mut m = AvlMap::new();
        take_tally();
        for k in keys {
            m.insert(k, ());
        }
        assert_eq!(take_tally().rotations, 0);
        assert_eq!(m.root_node().unwrap().height(), 4);

        // 11 rotates right, its subtree shrinks, so 8 must rotate too
        assert_eq!(m.remove(&12), Some(()));
        assert_eq!(
            take_tally(),
            Tally {
                visits: 2,
                rotations: 2
            }
        );

        let root = m.root_node().unwrap();
        assert_eq!(root.key(), &5);
        assert_eq!(root.right().unwrap().key(), &8);
        assert_eq!(root.right().unwrap().right().unwrap().key(), &10);
        m.chk();
    }

    #[test]
    fn descent_path_never_outgrows_its_reservation() {
        let mut m = AvlMap::new();
        for n in 0..200 {
            for k in [-1, n / 2, n] {
                match m.try_probe(&k).unwrap() {
                    Probe::Found(_) => (),
                    Probe::Vacant { path, .. } => assert!(path.len() <= m.path_cap()),
                }
            }
            assert_eq!(m.try_insert(n, n), Ok(None));
        }
        assert_eq!(m.try_insert(0, 7), Ok(Some(0)));
        m.chk();
    }

    #[test]
    fn erase_root_with_two_children() {
        let mut m: AvlMap<_, _> = [(10, 1), (20, 2), (30, 3)].into();
        let root_h = m.root_node().unwrap().handle();
        let pred_h = m.find(&10).handle().unwrap();

        assert_eq!(m.erase(m.find(&20).handle()), Some((20, 2)));
        assert_eq!(m.len(), 2);

        let root = m.root_node().unwrap();
        assert_eq!(root.key(), &10);
        assert_eq!(root.value(), &1);
        assert!(root.left().is_none());
        assert_eq!(root.right().unwrap().key(), &30);

        // the root slot survived and now holds the predecessor's entry
        assert_eq!(root.handle(), root_h);
        assert_eq!(m.cursor(root_h).key(), Some(&10));
        assert!(m.cursor(pred_h).is_end());
    }

    #[test]
    fn ascending_seven_is_perfect() {
        let m: AvlMap<_, _> = (1..=7).map(|k| (k, k)).collect();
        assert_eq!(m.root_node().unwrap().key(), &4);
        assert_eq!(
            shape(&m),
            vec![
                (1, 2, 0),
                (2, 1, 1),
                (3, 2, 0),
                (4, 0, 2),
                (5, 2, 0),
                (6, 1, 1),
                (7, 2, 0)
            ]
        );
    }

    #[test]
    fn get_or_insert_default_is_idempotent() {
        let mut m: AvlMap<u8, u32> = AvlMap::new();
        *m.get_or_insert_default(3) += 1;
        assert_eq!(m.len(), 1);
        for _ in 0..5 {
            *m.get_or_insert_default(3) += 1;
            assert_eq!(m.len(), 1);
        }
        assert_eq!(m.get(&3), Some(&6));

        for k in 0..64 {
            m.get_or_insert_default(k);
            m.chk();
        }
        assert_eq!(m.len(), 64);
        assert_eq!(m.try_get_or_insert_default(3), Ok(&mut 6));
    }

    #[test]
    fn handles_survive_rotations() {
        let mut m = AvlMap::new();
        m.insert(0, 'x');
        let h = m.find(&0).handle().unwrap();

        // force plenty of rotations around the node
        for k in 1..100 {
            m.insert(k, 'y');
            m.insert(-k, 'z');
        }
        assert_eq!(m.cursor(h).key_value(), Some((&0, &'x')));

        for k in 1..50 {
            m.remove(&k);
        }
        assert_eq!(m.cursor(h).key_value(), Some((&0, &'x')));

        assert_eq!(m.erase(h), Some((0, 'x')));
        let len = m.len();
        assert_eq!(m.erase(h), None);
        assert_eq!(m.erase(None::<Handle>), None);
        assert_eq!(m.len(), len);
        m.chk();
    }

    #[test]
    fn cursor_walks_both_ways() {
        let m: AvlMap<_, _> = (0..20).rev().map(|k| (k, k * 2)).collect();

        let mut c = m.begin();
        let mut fwd = Vec::new();
        while c != m.end() {
            fwd.push(*c.key().unwrap());
            c.move_next();
        }
        assert_eq!(fwd, (0..20).collect::<Vec<_>>());

        // stepping past the end stays there
        c.move_next();
        assert!(c.is_end());

        let mut bwd = Vec::new();
        c.move_prev();
        while !c.is_end() {
            bwd.push(*c.key().unwrap());
            c.move_prev();
        }
        assert_eq!(bwd, (0..20).rev().collect::<Vec<_>>());

        let c = m.find(&7);
        assert_eq!(c.peek_next(), Some((&8, &16)));
        assert_eq!(c.peek_prev(), Some((&6, &12)));
        assert_eq!(m.end().peek_prev(), Some((&19, &38)));
        assert_eq!(m.end().peek_next(), None);
    }

    #[test]
    fn end_cursors_compare_equal_across_maps() {
        let a: AvlMap<u8, u8> = AvlMap::new();
        let b = AvlMap::from([(1u8, 1u8)]);
        assert_eq!(a.begin(), a.end());
        assert_eq!(a.end(), b.end());
        assert_eq!(b.find(&2), a.end());
        assert_ne!(b.begin(), b.end());
    }

    #[test]
    fn remove_through_cursor() {
        let mut m: AvlMap<_, _> = (0..40).map(|k| (k, ())).collect();
        let mut c = m.begin_mut();
        while let Some(&k) = c.key() {
            if k % 2 == 0 {
                assert_eq!(c.remove_current(), Some((k, ())));
            } else {
                c.move_next();
            }
        }
        assert_eq!(c.remove_current(), None);

        m.chk();
        assert!(m.keys().copied().eq((0..40).filter(|k| k % 2 == 1)));
    }

    #[test]
    fn cursor_mut_updates_values() {
        let mut m = AvlMap::from([(1, 10), (2, 20)]);
        let mut c = m.find_mut(&2);
        *c.value_mut().unwrap() += 1;
        c.move_prev();
        assert_eq!(c.as_cursor().key(), Some(&1));
        *c.into_value_mut().unwrap() = 0;
        assert_eq!(m.get(&1), Some(&0));
        assert_eq!(m.get(&2), Some(&21));
        assert!(m.end_mut().value_mut().is_none());
    }

    #[test]
    fn entry_api() {
        let mut m: AvlMap<&str, u32> = AvlMap::new();
        m.entry("a").or_insert(1);
        m.entry("a").and_modify(|v| *v += 1).or_insert(7);
        *m.entry("b").or_insert_with_key(|k| k.len() as u32) += 10;
        assert_eq!(m.get("a"), Some(&2));
        assert_eq!(m.get("b"), Some(&11));

        match m.entry("a") {
            Entry::Occupied(o) => assert_eq!(o.remove_entry(), ("a", 2)),
            Entry::Vacant(_) => panic!("expected an occupied entry"),
        }
        assert_eq!(m.entry("z").key(), &"z");
        assert_eq!(m.len(), 1);
        m.chk();
    }

    #[test]
    fn clone_is_independent() {
        let mut src: AvlMap<_, _> = (0..32).map(|k| (k, k)).collect();
        let mut dup = src.clone();
        dup.chk();
        assert_eq!(src, dup);

        dup.insert(100, 0);
        *dup.get_mut(&3).unwrap() = 99;
        src.remove(&5);

        assert_eq!(src.get(&3), Some(&3));
        assert!(!src.contains_key(&100));
        assert_eq!(dup.get(&5), Some(&5));

        let mut other = AvlMap::from([(-1, -1)]);
        other.clone_from(&src);
        other.chk();
        assert_eq!(other, src);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut a: AvlMap<_, _> = (0..10).map(|k| (k, k)).collect();
        let h = a.find(&4).handle().unwrap();
        let b = a.take();

        assert!(a.is_empty());
        assert!(a.root_node().is_none());
        assert!(a.begin().is_end());
        assert_eq!(b.len(), 10);
        assert_eq!(b.cursor(h).key(), Some(&4));
        b.chk();
    }

    #[test]
    fn clear_and_reuse() {
        let mut m: AvlMap<_, _> = (0..10).map(|k| (k, k)).collect();
        let h = m.find(&9).handle().unwrap();
        m.clear();
        assert_eq!(m.len(), 0);
        assert!(m.cursor(h).is_end());

        m.extend((0..10).map(|k| (k, k + 1)));
        assert!(m.cursor(h).is_end());
        assert_eq!(m.get(&9), Some(&10));
        m.chk();
    }

    #[test]
    fn erase_everything_in_any_order() {
        let keys = [13, 2, 8, 21, 1, 34, 5, 3, 55, 0, 89];
        let mut m: AvlMap<_, _> = keys.iter().map(|&k| (k, ())).collect();
        for (n, k) in keys.iter().rev().enumerate() {
            assert!(m.remove(k).is_some());
            assert_eq!(m.len(), keys.len() - n - 1);
        }
        assert!(m.is_empty());
        assert!(m.root_node().is_none());
        m.chk();
    }

    #[test]
    fn iterators_are_double_ended() {
        let mut m: AvlMap<_, _> = (0..8).map(|x| (x, 0)).collect();

        for (i, (k, v)) in m.iter_mut().enumerate() {
            assert_eq!(i, *k);
            *v = i * 10;
        }
        m.chk();

        let mut it = m.iter();
        assert_eq!(it.next(), Some((&0, &0)));
        assert_eq!(it.next_back(), Some((&7, &70)));
        assert_eq!(it.len(), 6);
        assert_eq!(it.rev().map(|(k, _)| *k).collect::<Vec<_>>(), [6, 5, 4, 3, 2, 1]);

        assert!(m.values().rev().copied().eq((0..8).rev().map(|x| x * 10)));
        m.values_mut().for_each(|v| *v += 1);
        assert_eq!(m.last_key_value(), Some((&7, &71)));

        let owned: Vec<_> = m.into_iter().rev().take(2).collect();
        assert_eq!(owned, [(7, 71), (6, 61)]);
    }

    #[test]
    fn check_reports_damage() {
        let mut m: AvlMap<_, _> = (0..7).map(|k| (k, ())).collect();
        assert_eq!(m.check(), Ok(()));

        let r = m.root.unwrap();
        m.nodes[r].height = 9;
        assert_eq!(
            m.check(),
            Err(CheckError::Height {
                node: r,
                stored: 9,
                actual: 2
            })
        );
        m.nodes[r].height = 2;

        m.len += 1;
        assert!(matches!(m.check(), Err(CheckError::Len { .. })));
    }

    #[test]
    fn check_terminates_on_link_cycles() {
        let mut m: AvlMap<_, _> = (0..7).map(|k| (k, ())).collect();
        let six = m.find_idx(&6).unwrap();
        m.nodes[six].right = Some(six);
        assert!(m.check().is_err());

        let mut m: AvlMap<_, _> = (0..7).map(|k| (k, ())).collect();
        let (five, six) = (m.find_idx(&5).unwrap(), m.find_idx(&6).unwrap());
        m.nodes[six].right = Some(five);
        m.nodes[five].parent = Some(six);
        assert!(m.check().is_err());
    }

    #[test]
    fn bal_test_regr1() {
        bal_test(vec![(4, 0), (0, 0), (5, 0), (1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn bal_test_regr2() {
        bal_test(vec![(3, 0), (0, 0), (1, 0), (2, 0), (4, 0)]);
    }

    #[test]
    fn rm_test_regr1() {
        rm_test(vec![(101, 0), (100, 0), (1, 0), (-100, 0)]);
    }

    #[test]
    fn rm_test_regr2() {
        rm_test(vec![
            (31, 0),
            (14, 0),
            (1, 0),
            (15, 0),
            (32, 0),
            (16, 0),
            (17, 0),
            (-14, 0),
            (-31, 0),
        ]);
    }

    #[test]
    fn rm_each_test() {
        // build map in order to encourage skewing
        let fmap: AvlMap<_, _> = (0..32).map(|x| (x, x + 100)).collect();
        chk_all_removes(fmap);

        // build map in reverse order to encourage opposite skewing
        let fmap: AvlMap<_, _> = (0..32).rev().map(|x| (x, x + 100)).collect();
        chk_all_removes(fmap);
    }

    quickcheck! {
        fn qc_bal_test(vs: Vec<(u8, u32)>) -> () {
            bal_test(vs);
        }

        fn qc_rm_test(vs: Vec<(i8, u32)>) -> () {
            rm_test(vs);
        }

        fn qc_rm_test2(vs: Vec<(u8, u8)>) -> () {
            let fmap = vs.into_iter().collect();
            chk_all_removes(fmap);
        }

        fn qc_iter_rev(vs: Vec<(u8, u8)>) -> () {
            let fmap: AvlMap<_, _> = vs.into_iter().collect();
            let fwd: Vec<_> = fmap.iter().collect();
            let mut bwd: Vec<_> = fmap.iter().rev().collect();
            bwd.reverse();
            assert_eq!(fwd, bwd);
            assert!(fwd.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }
}
