use alloc::sync::{Arc, Weak};
use core::borrow::Borrow;
use core::mem;

use smallvec::SmallVec;

use super::node::Node;
use super::path::TreePath;
use crate::KeySelector;

/// A path that does not keep the tree alive.
///
/// Every node access upgrades a weak reference, so a path into a tree that has since been mutated or
/// dropped fails loudly instead of reading stale nodes.
pub(crate) struct WeakPath<K, V> {
    root: Weak<Node<K, V>>,
    count: usize,
    offset: usize,
    path: SmallVec<[Weak<Node<K, V>>; 16]>,
    slots: SmallVec<[usize; 16]>,
    node: Weak<Node<K, V>>,
    slot: Option<usize>,
}

impl<K, V> Clone for WeakPath<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: Weak::clone(&self.root),
            count: self.count,
            offset: self.offset,
            path: self.path.clone(),
            slots: self.slots.clone(),
            node: Weak::clone(&self.node),
            slot: self.slot,
        }
    }
}

impl<K, V> WeakPath<K, V> {
    fn new(root: &Arc<Node<K, V>>) -> Self {
        Self {
            root: Arc::downgrade(root),
            count: root.len(),
            offset: root.len(),
            path: SmallVec::new(),
            slots: SmallVec::new(),
            node: Arc::downgrade(root),
            slot: None,
        }
    }

    pub(crate) fn at_start(root: &Arc<Node<K, V>>) -> Self {
        Self::at_offset(root, 0)
    }

    pub(crate) fn at_end(root: &Arc<Node<K, V>>) -> Self {
        let mut path = Self::new(root);
        path.push_to_slots_at(root.elements.len(), root.len());
        path
    }

    pub(crate) fn at_offset(root: &Arc<Node<K, V>>, offset: usize) -> Self {
        assert!(offset <= root.len(), "`WeakPath::at_offset()` - `offset` > `count`!");
        let mut path = Self::new(root);
        path.descend_to_offset(offset);
        path
    }

    pub(crate) fn at_key<Q>(root: &Arc<Node<K, V>>, key: &Q, selector: KeySelector) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path = Self::new(root);
        path.descend_to_key(key, selector);
        path
    }

    /// Panics unless this path was created over `root` and every node on it is still alive.
    pub(crate) fn expect_root(&self, root: &Arc<Node<K, V>>) {
        assert!(
            Weak::as_ptr(&self.root) == Arc::as_ptr(root),
            "`WeakPath::expect_root()` - index belongs to a different or mutated tree!"
        );
        assert!(
            self.node.strong_count() > 0 && self.path.iter().all(|node| node.strong_count() > 0),
            "`WeakPath::expect_root()` - index is invalid!"
        );
    }

    /// Returns true if both paths were created over the same root.
    pub(crate) fn same_root(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.root, &other.root)
    }

    /// Upgrades the root this path was created over.
    pub(crate) fn root(&self) -> Arc<Node<K, V>> {
        self.root.upgrade().expect("`WeakPath::root()` - index is invalid!")
    }
}

impl<K, V> TreePath<K, V> for WeakPath<K, V> {
    type NodeRef<'s>
        = Arc<Node<K, V>>
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

    fn node(&self) -> Arc<Node<K, V>> {
        self.node.upgrade().expect("`WeakPath::node()` - index is invalid!")
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
        self.node = self.path.pop().expect("`WeakPath::pop_from_path()` - path is at the root!");
        self.slot = self.slots.pop();
    }

    fn push_to_path(&mut self) {
        let slot = self.current_slot();
        let child = Arc::downgrade(&self.node().children[slot]);
        let parent = mem::replace(&mut self.node, child);
        self.path.push(parent);
        self.slots.push(slot);
        self.slot = None;
    }

    fn for_each_node(&self, ascending: bool, mut body: impl FnMut(&Node<K, V>, usize)) {
        let slot = self.current_slot();
        let upgrade = |node: &Weak<Node<K, V>>| node.upgrade().expect("`WeakPath::for_each_node()` - index is invalid!");
        if ascending {
            body(&self.node(), slot);
            for (node, &slot) in self.path.iter().zip(&self.slots).rev() {
                body(&upgrade(node), slot);
            }
        } else {
            for (node, &slot) in self.path.iter().zip(&self.slots) {
                body(&upgrade(node), slot);
            }
            body(&self.node(), slot);
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
