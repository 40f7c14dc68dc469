// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::tree::{AllocatorTree, NodeId};

/// Resumable pre-order traversal over an [`AllocatorTree`].
///
/// The whole traversal state is the current node and its depth, so the walk
/// doubles as a lazy sequence a consumer can suspend and
/// [`resume`](Self::resume) one node at a time, and as the bulk driver a
/// sampler runs to exhaustion inside a lock-held, allocation-free loop.
pub struct PreOrder<'a, T: ?Sized> {
    tree: &'a T,
    next: Option<(NodeId, u32)>,
}

impl<'a, T: AllocatorTree + ?Sized> PreOrder<'a, T> {
    pub fn new(tree: &'a T) -> Self {
        let next = tree.root().map(|root| (root, 0));
        Self { tree, next }
    }

    /// Resume from a previously yielded position; that position is yielded
    /// again first.
    pub fn resume(tree: &'a T, node: NodeId, depth: u32) -> Self {
        Self {
            tree,
            next: Some((node, depth)),
        }
    }
}

impl<T: AllocatorTree + ?Sized> Iterator for PreOrder<'_, T> {
    type Item = (NodeId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = advance(self.tree, current.0, current.1);
        Some(current)
    }
}

/// One pre-order step: descend to the first child, else move to the next
/// sibling, else climb parent links until an ancestor with a next sibling is
/// found; above the root the walk is exhausted. Follows only the three link
/// fields; no recursion, no allocation.
fn advance<T: AllocatorTree + ?Sized>(
    tree: &T,
    mut node: NodeId,
    mut depth: u32,
) -> Option<(NodeId, u32)> {
    if let Some(child) = tree.first_child(node) {
        return Some((child, depth + 1));
    }
    loop {
        if let Some(sibling) = tree.next_sibling(node) {
            return Some((sibling, depth));
        }
        node = tree.parent(node)?;
        depth -= 1;
    }
}
