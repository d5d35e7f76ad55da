use super::node::{Arena, Idx};
use tracing::trace;

// Height convention: an absent child has height -1 and a leaf has height 0.

/// Rebalancing work done on the current thread: ancestors examined by
/// `rebal` and single rotations performed.
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) visits: usize,
    pub(crate) rotations: usize,
}

#[cfg(test)]
thread_local! {
    static TALLY: std::cell::Cell<Tally> = std::cell::Cell::new(Tally::default());
}

/// Returns the work counted since the last call and resets the counts.
#[cfg(test)]
pub(crate) fn take_tally() -> Tally {
    TALLY.with(|t| t.take())
}

#[cfg(test)]
macro_rules! tally {
    ( $field:ident ) => {{
        TALLY.with(|t| {
            let mut x = t.get();
            x.$field += 1;
            t.set(x);
        })
    }};
}

#[cfg(not(test))]
macro_rules! tally {
    ( $field:ident ) => {{}};
}

pub(crate) fn update_height<K, V>(nodes: &mut Arena<K, V>, i: Idx) {
    let n = &nodes[i];
    let ht = nodes.height(n.left).max(nodes.height(n.right)) + 1;
    nodes[i].height = ht;
}

// Returns the "balance factor" of the node: left height minus right height.
pub(crate) fn bal<K, V>(nodes: &Arena<K, V>, i: Idx) -> i8 {
    let n = &nodes[i];
    nodes.height(n.left) - nodes.height(n.right)
}

// Points whatever referenced `old` (its parent's child link, or the root) at
// `new`, and gives `new` the parent `old` had.
fn replace_child<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut Option<Idx>,
    old: Idx,
    new: Idx,
) {
    let parent = nodes[old].parent;
    nodes[new].parent = parent;
    match parent {
        None => *root = Some(new),
        Some(p) => {
            let p = &mut nodes[p];
            if p.left == Some(old) {
                p.left = Some(new);
            } else {
                p.right = Some(new);
            }
        }
    }
}

pub(crate) fn rot_rt<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut Option<Idx>,
    a: Idx,
) -> Idx {
    // We want the following transformation:
    //    a(b(x, y), z)   =>   b(x, a(y, z))
    // x and z retain the same parents.
    let Some(b) = nodes[a].left else {
        panic!("rotate right requires a left child");
    };
    trace!(node = a, promoted = b, "rotate right");
    tally!(rotations);

    // move y from b to a
    let y = nodes[b].right;
    nodes[a].left = y;
    if let Some(y) = y {
        nodes[y].parent = Some(a);
    }

    // install b where a was, then hang a under it
    replace_child(nodes, root, a, b);
    nodes[b].right = Some(a);
    nodes[a].parent = Some(b);

    update_height(nodes, a);
    update_height(nodes, b);
    b
}

pub(crate) fn rot_lf<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut Option<Idx>,
    a: Idx,
) -> Idx {
    // We want the following transformation:
    //    a(x, b(y, z))   =>   b(a(x, y), z)
    // x and z retain the same parents.
    let Some(b) = nodes[a].right else {
        panic!("rotate left requires a right child");
    };
    trace!(node = a, promoted = b, "rotate left");
    tally!(rotations);

    // move y from b to a
    let y = nodes[b].left;
    nodes[a].right = y;
    if let Some(y) = y {
        nodes[y].parent = Some(a);
    }

    replace_child(nodes, root, a, b);
    nodes[b].left = Some(a);
    nodes[a].parent = Some(b);

    update_height(nodes, a);
    update_height(nodes, b);
    b
}

// Restores the balance at y, which must have up-to-date children heights.
// Returns true if a rotation was needed.
fn rebal<K, V>(nodes: &mut Arena<K, V>, root: &mut Option<Idx>, y: Idx) -> bool {
    tally!(visits);
    update_height(nodes, y);
    let b = bal(nodes, y);

    if b > 1 {
        let Some(lf) = nodes[y].left else {
            return false;
        };
        if nodes.height(nodes[lf].left) < nodes.height(nodes[lf].right) {
            rot_lf(nodes, root, lf);
        }
        rot_rt(nodes, root, y);
        true
    } else if b < -1 {
        let Some(rt) = nodes[y].right else {
            return false;
        };
        if nodes.height(nodes[rt].right) < nodes.height(nodes[rt].left) {
            rot_rt(nodes, root, rt);
        }
        rot_lf(nodes, root, y);
        true
    } else {
        false
    }
}

/// Rebalances after attaching a leaf.  `path` holds the leaf's ancestors,
/// root first.  A single (possibly double) rotation restores the height the
/// subtree had before the insertion, so nothing above it needs a look.
pub(crate) fn rebal_after_insert<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut Option<Idx>,
    mut path: Vec<Idx>,
) {
    while let Some(y) = path.pop() {
        if rebal(nodes, root, y) {
            break;
        }
    }
}

/// Rebalances after unlinking a node.  `path` holds the ancestors of the
/// unlinked node, nearest first.  Every ancestor is visited: a rotation after
/// a removal may leave its subtree shorter, which can unbalance the next one
/// up.
pub(crate) fn rebal_after_remove<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut Option<Idx>,
    path: &[Idx],
) {
    for &y in path {
        rebal(nodes, root, y);
    }
}
