use alloc::sync::Arc;
use core::borrow::Borrow;
use core::ops::Range;

use smallvec::SmallVec;

use super::node::Node;
use super::path::TreePath;
use crate::KeySelector;

/// A bound on the keys a merge step may consume.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Limit<'k, K> {
    Including(&'k K),
    Excluding(&'k K),
}

impl<K: Ord> Limit<'_, K> {
    #[inline]
    pub(crate) fn matches(&self, key: &K) -> bool {
        match *self {
            Limit::Including(limit) => key <= limit,
            Limit::Excluding(limit) => key < limit,
        }
    }
}

/// A run of consecutive elements borrowed from a tree.
pub(crate) enum Part<'a, K, V> {
    Element(&'a (K, V)),
    Node(&'a Arc<Node<K, V>>),
    /// The elements of a node in the given slot range, with the children around them.
    NodeRange(&'a Node<K, V>, Range<usize>),
}

/// A read-only path that borrows the nodes of a tree for the lifetime `'a`.
pub(crate) struct StrongPath<'a, K, V> {
    count: usize,
    offset: usize,
    path: SmallVec<[&'a Arc<Node<K, V>>; 16]>,
    slots: SmallVec<[usize; 16]>,
    node: &'a Arc<Node<K, V>>,
    slot: Option<usize>,
}

impl<K, V> Clone for StrongPath<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            offset: self.offset,
            path: self.path.clone(),
            slots: self.slots.clone(),
            node: self.node,
            slot: self.slot,
        }
    }
}

impl<'a, K, V> StrongPath<'a, K, V> {
    fn new(root: &'a Arc<Node<K, V>>) -> Self {
        Self {
            count: root.len(),
            offset: root.len(),
            path: SmallVec::new(),
            slots: SmallVec::new(),
            node: root,
            slot: None,
        }
    }

    pub(crate) fn at_start(root: &'a Arc<Node<K, V>>) -> Self {
        Self::at_offset(root, 0)
    }

    /// Creates a path at the end of the tree without descending.
    pub(crate) fn at_end(root: &'a Arc<Node<K, V>>) -> Self {
        let mut path = Self::new(root);
        path.push_to_slots_at(root.elements.len(), root.len());
        path
    }

    pub(crate) fn at_offset(root: &'a Arc<Node<K, V>>, offset: usize) -> Self {
        assert!(offset <= root.len(), "`StrongPath::at_offset()` - `offset` > `count`!");
        let mut path = Self::new(root);
        path.descend_to_offset(offset);
        path
    }

    pub(crate) fn at_key<Q>(root: &'a Arc<Node<K, V>>, key: &Q, selector: KeySelector) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path = Self::new(root);
        path.descend_to_key(key, selector);
        path
    }

    /// Creates a path over `root` following the slots of `other`, which must be over the same tree.
    pub(crate) fn from_slots<P: TreePath<K, V>>(root: &'a Arc<Node<K, V>>, other: &P) -> Self {
        let mut path = Self::new(root);
        path.push_slots_from(other);
        path
    }

    /// The focused element.
    pub(crate) fn element(&self) -> &'a (K, V) {
        let node: &'a Arc<Node<K, V>> = self.node;
        &node.elements[self.current_slot()]
    }

    pub(crate) fn key(&self) -> &'a K {
        &self.element().0
    }

    /// The node currently on top of the path.
    pub(crate) fn node_handle(&self) -> &'a Arc<Node<K, V>> {
        self.node
    }

    // The separator just after the current node's subtree, if any.
    fn parent_key(&self) -> Option<&'a K> {
        let parent: &'a Arc<Node<K, V>> = *self.path.last()?;
        let slot = *self.slots.last()?;
        parent.elements.get(slot).map(|(key, _)| key)
    }

    /// Skips `n` elements of the current node along with the children after them.
    fn skip_forward(&mut self, n: usize) {
        let slot = self.current_slot();
        let node: &'a Arc<Node<K, V>> = self.node;
        if !node.is_leaf() {
            self.offset += node.children[slot + 1..=slot + n].iter().fold(0, |acc, child| acc + child.len());
        }
        self.offset += n;
        self.slot = Some(slot + n);
        if self.offset != self.count {
            self.ascend_to_key();
        }
    }

    /// Moves to the element following the current node's subtree, or to the end at the root.
    pub(crate) fn ascend_one_level(&mut self) {
        if self.path.is_empty() {
            self.offset = self.count;
            self.slot = Some(self.node.elements.len());
            return;
        }
        self.pop_from_slots();
        self.pop_from_path();
    }

    /// Pops past slots that point after the last element of their node.
    pub(crate) fn ascend_to_key(&mut self) {
        debug_assert!(!self.is_at_end());
        while self.slot == Some(self.node.elements.len()) {
            self.slot = None;
            self.pop_from_path();
        }
    }

    /// Consumes the longest run starting at the focused element that `limit` accepts and that can be
    /// borrowed as a whole, then moves past it.
    ///
    /// Whole subtrees are returned when the path sits at the start of one that lies entirely within
    /// `limit`, which lets merges link shared structure instead of copying element by element.
    pub(crate) fn next_part(&mut self, limit: &Limit<'_, K>) -> Part<'a, K, V>
    where
        K: Ord,
    {
        debug_assert!(!self.is_at_end() && limit.matches(self.key()));
        // Find the furthest ancestor whose leftmost subtree consists of matching elements only.
        let mut include_leftmost = false;
        if self.slot == Some(0) && self.node.is_leaf() {
            while self.slot == Some(0) && self.parent_key().is_some_and(|key| limit.matches(key)) {
                self.pop_from_slots();
                self.pop_from_path();
                include_leftmost = true;
            }
        }
        if !include_leftmost && !self.node.is_leaf() {
            let element = self.element();
            self.move_forward();
            return Part::Element(element);
        }

        let node: &'a Arc<Node<K, V>> = self.node;
        let start = self.current_slot();
        let mut end = start + 1;
        while end < node.elements.len() && limit.matches(&node.elements[end].0) {
            end += 1;
        }
        // Checking the subtree after the run costs a descent, but it may save a whole subtree of copying.
        let include_rightmost = node.is_leaf() || node.children[end].last().is_some_and(|(key, _)| limit.matches(key));
        if include_rightmost {
            self.skip_forward(end - start);
            return Part::NodeRange(node, start..end);
        }
        if end == start + 1 {
            return Part::Node(&node.children[start]);
        }
        self.skip_forward(end - start - 1);
        Part::NodeRange(node, start..end - 1)
    }
}

impl<'a, K, V> TreePath<K, V> for StrongPath<'a, K, V> {
    type NodeRef<'s>
        = &'s Node<K, V>
    where
        Self: 's;

    #[inline]
    fn count(&self) -> usize {
        self.count
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    #[inline]
    fn length(&self) -> usize {
        self.path.len() + 1
    }

    #[inline]
    fn node(&self) -> &Node<K, V> {
        self.node
    }

    #[inline]
    fn slot(&self) -> Option<usize> {
        self.slot
    }

    #[inline]
    fn set_slot(&mut self, slot: Option<usize>) {
        self.slot = slot;
    }

    fn pop_from_path(&mut self) {
        debug_assert!(self.slot.is_none());
        self.node = self.path.pop().expect("`StrongPath::pop_from_path()` - path is at the root!");
        self.slot = self.slots.pop();
    }

    fn push_to_path(&mut self) {
        let slot = self.current_slot();
        let parent: &'a Arc<Node<K, V>> = self.node;
        self.path.push(parent);
        self.slots.push(slot);
        self.node = &parent.children[slot];
        self.slot = None;
    }

    fn for_each_node(&self, ascending: bool, mut body: impl FnMut(&Node<K, V>, usize)) {
        let slot = self.current_slot();
        if ascending {
            body(self.node, slot);
            for (node, &slot) in self.path.iter().zip(&self.slots).rev() {
                body(node, slot);
            }
        } else {
            for (node, &slot) in self.path.iter().zip(&self.slots) {
                body(node, slot);
            }
            body(self.node, slot);
        }
    }

    fn for_each_slot(&self, ascending: bool, mut body: impl FnMut(usize)) {
        let slot = self.current_slot();
        if ascending {
            body(slot);
            self.slots.iter().rev().for_each(|&slot| body(slot));
        } else {
            self.slots.iter().for_each(|&slot| body(slot));
            body(slot);
        }
    }
}
