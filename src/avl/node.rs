use slab::Slab;
use std::collections::TryReserveError;
use std::ops::{Index, IndexMut};

/// Position of a node in the arena.
pub(crate) type Idx = usize;

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) val: V,
    pub(crate) height: i8,
    // back-reference only; never used to free a node
    pub(crate) parent: Option<Idx>,
    pub(crate) left: Option<Idx>,
    pub(crate) right: Option<Idx>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn leaf(key: K, val: V, parent: Option<Idx>) -> Self {
        Node {
            key,
            val,
            height: 0,
            parent,
            left: None,
            right: None,
        }
    }
}

/// A stable reference to an entry of an [`AvlMap`](crate::AvlMap).
///
/// Handles survive rotations and the insertion or removal of other entries.
/// Once the entry itself is erased (or the map is cleared), the handle goes
/// stale and every operation given it behaves as if it named the end position.
/// A handle is only meaningful for the map that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) idx: Idx,
    pub(crate) gen: u32,
}

/// Tree nodes in a [`Slab`], plus one generation counter per slab key.  A
/// key's generation moves on whenever its node is released, which is what
/// makes stale handles detectable.
pub(crate) struct Arena<K, V> {
    slots: Slab<Node<K, V>>,
    gens: Vec<u32>,
}

impl<K, V> Arena<K, V> {
    pub(crate) const fn new() -> Self {
        Arena {
            slots: Slab::new(),
            gens: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Makes sure the next `alloc` will not need to allocate.
    pub(crate) fn try_reserve(&mut self) -> Result<(), TryReserveError> {
        if self.slots.len() == self.slots.capacity() {
            // Slab cannot grow fallibly; a trial allocation of the size it
            // would grow to stands in for it.
            let additional = self.slots.capacity().max(4);
            let mut trial: Vec<Node<K, V>> = Vec::new();
            trial.try_reserve_exact(self.slots.capacity() + additional)?;
            drop(trial);
            self.slots.reserve(additional);
        }

        if self.gens.len() == self.gens.capacity() {
            self.gens.try_reserve(1)?;
        }

        Ok(())
    }

    pub(crate) fn alloc(&mut self, node: Node<K, V>) -> Idx {
        let i = self.slots.insert(node);
        if i >= self.gens.len() {
            self.gens.push(0);
        }
        i
    }

    // prerequisite: slot i is occupied
    pub(crate) fn release(&mut self, i: Idx) -> Node<K, V> {
        let n = self.slots.remove(i);
        self.gens[i] = self.gens[i].wrapping_add(1);
        n
    }

    /// Drops every node while keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        for gen in self.gens.iter_mut() {
            *gen = gen.wrapping_add(1);
        }
    }

    pub(crate) fn handle(&self, i: Idx) -> Handle {
        Handle {
            idx: i,
            gen: self.gens[i],
        }
    }

    /// Maps a handle back to its slot if the entry it names is still alive.
    pub(crate) fn resolve(&self, h: Handle) -> Option<Idx> {
        match self.gens.get(h.idx) {
            Some(&gen) if gen == h.gen && self.slots.contains(h.idx) => Some(h.idx),
            _ => None,
        }
    }

    /// Hands out disjoint mutable borrows of every live node, indexed by slot.
    pub(crate) fn split_mut(&mut self) -> Vec<Option<&mut Node<K, V>>> {
        let mut out = Vec::new();
        out.resize_with(self.gens.len(), || None);
        for (i, n) in self.slots.iter_mut() {
            out[i] = Some(n);
        }
        out
    }

    pub(crate) fn height(&self, opt: Option<Idx>) -> i8 {
        opt.map_or(-1, |i| self[i].height)
    }
}

impl<K, V> Index<Idx> for Arena<K, V> {
    type Output = Node<K, V>;

    fn index(&self, i: Idx) -> &Self::Output {
        &self.slots[i]
    }
}

impl<K, V> IndexMut<Idx> for Arena<K, V> {
    fn index_mut(&mut self, i: Idx) -> &mut Self::Output {
        &mut self.slots[i]
    }
}
