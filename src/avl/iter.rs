use super::cursor::{predecessor, successor};
use super::node::{Arena, Idx};
use std::iter::FusedIterator;

/// In-order iterator over the entries of an [`AvlMap`](crate::AvlMap).
///
/// Walks the tree through parent links, so it needs no work stack.
pub struct Iter<'a, K, V> {
    pub(crate) nodes: &'a Arena<K, V>,
    pub(crate) front: Option<Idx>,
    pub(crate) back: Option<Idx>,
    pub(crate) len: usize,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        // len guards against the two ends crossing
        if self.len == 0 {
            return None;
        }

        let i = self.front?;
        self.len -= 1;
        self.front = successor(self.nodes, i);
        let n = &self.nodes[i];
        Some((&n.key, &n.val))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let i = self.back?;
        self.len -= 1;
        self.back = predecessor(self.nodes, i);
        let n = &self.nodes[i];
        Some((&n.key, &n.val))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {
    fn len(&self) -> usize {
        self.len
    }
}

impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// In-order iterator with mutable access to the values.
///
/// Arena slots are disjoint, so the borrows are split up front and handed
/// out in key order.
pub struct IterMut<'a, K, V> {
    pub(crate) entries: std::vec::IntoIter<(&'a K, &'a mut V)>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(nodes: &'a mut Arena<K, V>, root: Option<Idx>) -> Self {
        let order = in_order(nodes, root);
        let mut slots = nodes.split_mut();
        let entries = order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .map(|n| (&n.key, &mut n.val))
            .collect::<Vec<_>>();

        IterMut {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.entries.next_back()
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}

/// Owning in-order iterator, produced by `AvlMap::into_iter`.
pub struct IntoIter<K, V> {
    pub(crate) entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(mut nodes: Arena<K, V>, root: Option<Idx>) -> Self {
        let order = in_order(&nodes, root);
        let entries = order
            .into_iter()
            .map(|i| {
                let n = nodes.release(i);
                (n.key, n.val)
            })
            .collect::<Vec<_>>();

        IntoIter {
            entries: entries.into_iter(),
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.entries.next_back()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

// Slot indices in key order.
fn in_order<K, V>(nodes: &Arena<K, V>, root: Option<Idx>) -> Vec<Idx> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut curr = root.map(|r| super::cursor::first(nodes, r));
    while let Some(i) = curr {
        order.push(i);
        curr = successor(nodes, i);
    }
    order
}

macro_rules! projection {
    ($name:ident, $inner:ident, $item:ty, |$k:pat_param, $v:pat_param| $e:expr) => {
        pub struct $name<'a, K, V> {
            pub(crate) inner: $inner<'a, K, V>,
        }

        impl<'a, K, V> Iterator for $name<'a, K, V> {
            type Item = $item;

            fn next(&mut self) -> Option<Self::Item> {
                self.inner.next().map(|($k, $v)| $e)
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.inner.size_hint()
            }
        }

        impl<'a, K, V> DoubleEndedIterator for $name<'a, K, V> {
            fn next_back(&mut self) -> Option<Self::Item> {
                self.inner.next_back().map(|($k, $v)| $e)
            }
        }

        impl<'a, K, V> ExactSizeIterator for $name<'a, K, V> {
            fn len(&self) -> usize {
                self.inner.len()
            }
        }

        impl<'a, K, V> FusedIterator for $name<'a, K, V> {}
    };
}

projection!(Keys, Iter, &'a K, |k, _v| k);
projection!(Values, Iter, &'a V, |_k, v| v);
projection!(ValuesMut, IterMut, &'a mut V, |_k, v| v);
