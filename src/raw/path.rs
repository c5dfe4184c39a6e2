use alloc::sync::Arc;
use core::borrow::Borrow;
use core::ops::Deref;

use super::node::Node;
use crate::KeySelector;

/// A zipper over a B-tree: the nodes and slots from the root down to a focused element, plus the
/// focused element's offset.
///
/// While the path is incomplete (`slot() == None`), `offset()` is the offset just past the subtree
/// of the current node. The three implementations only differ in how they hold on to nodes; all the
/// navigation lives in the provided methods.
pub(crate) trait TreePath<K, V> {
    type NodeRef<'s>: Deref<Target = Node<K, V>>
    where
        Self: 's;

    /// The number of elements in the tree.
    fn count(&self) -> usize;
    fn offset(&self) -> usize;
    fn set_offset(&mut self, offset: usize);
    /// The number of nodes on the path, including the current one.
    fn length(&self) -> usize;
    fn node(&self) -> Self::NodeRef<'_>;
    fn slot(&self) -> Option<usize>;
    fn set_slot(&mut self, slot: Option<usize>);

    /// Makes the parent of the current node current again. Requires an incomplete path.
    fn pop_from_path(&mut self);
    /// Descends into the child at the current slot.
    fn push_to_path(&mut self);

    /// Calls `body` with every node on the path and its slot, from the current node up when
    /// `ascending`, from the root down otherwise. Requires a complete path.
    fn for_each_node(&self, ascending: bool, body: impl FnMut(&Node<K, V>, usize));
    fn for_each_slot(&self, ascending: bool, body: impl FnMut(usize));

    #[inline]
    fn current_slot(&self) -> usize {
        self.slot().expect("`TreePath::current_slot()` - path is incomplete!")
    }

    fn is_at_start(&self) -> bool {
        self.offset() == 0
    }

    fn is_at_end(&self) -> bool {
        self.offset() == self.count()
    }

    /// Clears the slot of the current node, moving the offset just past its subtree.
    fn pop_from_slots(&mut self) {
        let slot = self.current_slot();
        let delta = {
            let node = self.node();
            node.len() - node.offset_of_slot(slot)
        };
        self.set_offset(self.offset() + delta);
        self.set_slot(None);
    }

    /// Focuses `slot` of the current node, given the slot's offset within the node's subtree.
    fn push_to_slots_at(&mut self, slot: usize, offset_of_slot: usize) {
        debug_assert!(self.slot().is_none());
        let len = self.node().len();
        self.set_offset(self.offset() - (len - offset_of_slot));
        self.set_slot(Some(slot));
    }

    fn push_to_slots(&mut self, slot: usize) {
        let offset_of_slot = self.node().offset_of_slot(slot);
        self.push_to_slots_at(slot, offset_of_slot);
    }

    /// Applies the slots of `other` from the root down. Both paths must be over the same tree.
    fn push_slots_from<P: TreePath<K, V>>(&mut self, other: &P) {
        other.for_each_slot(false, |slot| {
            if self.slot().is_some() {
                self.push_to_path();
            }
            self.push_to_slots(slot);
        });
    }

    /// Steps to the next element in O(1) amortized time.
    fn move_forward(&mut self) {
        assert!(self.offset() < self.count(), "`TreePath::move_forward()` - path is at the end!");
        self.set_offset(self.offset() + 1);
        let slot = self.current_slot();
        let (is_leaf, len) = {
            let node = self.node();
            (node.is_leaf(), node.elements.len())
        };
        if !is_leaf {
            self.set_slot(Some(slot + 1));
            self.push_to_path();
            while !self.node().is_leaf() {
                self.set_slot(Some(0));
                self.push_to_path();
            }
            self.set_slot(Some(0));
            return;
        }
        if slot + 1 < len || self.offset() == self.count() {
            self.set_slot(Some(slot + 1));
            return;
        }
        loop {
            self.set_slot(None);
            self.pop_from_path();
            if self.current_slot() != self.node().elements.len() {
                break;
            }
        }
    }

    /// Steps to the previous element in O(1) amortized time.
    fn move_backward(&mut self) {
        assert!(!self.is_at_start(), "`TreePath::move_backward()` - path is at the start!");
        self.set_offset(self.offset() - 1);
        let slot = self.current_slot();
        if !self.node().is_leaf() {
            self.push_to_path();
            while !self.node().is_leaf() {
                let last = self.node().children.len() - 1;
                self.set_slot(Some(last));
                self.push_to_path();
            }
            let last = self.node().elements.len() - 1;
            self.set_slot(Some(last));
            return;
        }
        if slot > 0 {
            self.set_slot(Some(slot - 1));
            return;
        }
        loop {
            self.set_slot(None);
            self.pop_from_path();
            if self.current_slot() != 0 {
                break;
            }
        }
        let slot = self.current_slot();
        self.set_slot(Some(slot - 1));
    }

    fn move_to_start(&mut self) {
        self.move_to_offset(0);
    }

    fn move_to_end(&mut self) {
        self.pop_from_slots();
        while self.count() > self.offset() {
            self.pop_from_path();
            self.pop_from_slots();
        }
        self.descend_to_offset(self.count());
    }

    /// Moves to `offset` in O(log d) time, where `d` is the distance travelled.
    fn move_to_offset(&mut self, offset: usize) {
        assert!(offset <= self.count(), "`TreePath::move_to_offset()` - `offset` > `count`!");
        if offset == self.count() {
            self.move_to_end();
            return;
        }
        // Pop to the first ancestor whose subtree contains the desired offset.
        self.pop_from_slots();
        while offset + self.node().len() < self.offset() || offset >= self.offset() {
            self.pop_from_path();
            self.pop_from_slots();
        }
        self.descend_to_offset(offset);
    }

    fn move_to_key<Q>(&mut self, key: &Q, selector: KeySelector)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.pop_from_slots();
        while self.length() > 1 && !self.node().contains(key, selector) {
            self.pop_from_path();
            self.pop_from_slots();
        }
        self.descend_to_key(key, selector);
    }

    /// Descends from the current node to `offset`, which must lie within its subtree.
    fn descend_to_offset(&mut self, offset: usize) {
        debug_assert!(self.slot().is_none());
        debug_assert!(offset + self.node().len() >= self.offset() && offset <= self.offset());
        loop {
            let found = {
                let node = self.node();
                let start = self.offset() - node.len();
                node.slot_at_offset(offset - start)
            };
            self.push_to_slots_at(found.index, found.offset);
            if found.matched {
                break;
            }
            self.push_to_path();
        }
        debug_assert_eq!(self.offset(), offset);
    }

    /// Descends from the current node to the element chosen by `key` and `selector`, or to the spot
    /// where such an element would be inserted.
    fn descend_to_key<Q>(&mut self, key: &Q, selector: KeySelector)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        debug_assert!(self.slot().is_none());
        if self.count() == 0 {
            self.push_to_slots(0);
            return;
        }
        let mut found: Option<(usize, usize)> = None;
        loop {
            let (matched, descend, is_leaf, len) = {
                let node = self.node();
                let (matched, descend) = node.slot_of(key, selector);
                (matched, descend, node.is_leaf(), node.elements.len())
            };
            if let Some(m) = matched {
                if is_leaf || selector == KeySelector::Any {
                    self.push_to_slots(m);
                    return;
                }
                found = Some((self.length(), m));
            }
            if is_leaf {
                if let Some((depth, slot)) = found {
                    for _ in depth..self.length() {
                        self.pop_from_path();
                        self.pop_from_slots();
                    }
                    self.push_to_slots(slot);
                } else if descend < len {
                    self.push_to_slots(descend);
                } else {
                    self.push_to_slots(descend - 1);
                    self.move_forward();
                }
                return;
            }
            self.push_to_slots(descend);
            self.push_to_path();
        }
    }

    /// Splits the tree around the focused element, returning everything before it, the element
    /// itself, and everything after it.
    fn split(&self) -> (Arc<Node<K, V>>, (K, V), Arc<Node<K, V>>)
    where
        K: Clone,
        V: Clone,
    {
        assert!(!self.is_at_end(), "`TreePath::split()` - path is at the end!");
        let mut parts: Option<(Arc<Node<K, V>>, (K, V), Arc<Node<K, V>>)> = None;
        self.for_each_node(true, |node, slot| {
            parts = Some(match parts.take() {
                None => {
                    let c = node.elements.len();
                    let left = Node::from_slot_range(node, 0..slot);
                    let right = Node::from_slot_range(node, slot + 1..c);
                    (left, node.elements[slot].clone(), right)
                }
                Some((mut left, separator, mut right)) => {
                    if slot >= 1 {
                        let l = Node::from_slot_range(node, 0..slot - 1);
                        left = Node::join(l, node.elements[slot - 1].clone(), left);
                    }
                    let c = node.elements.len();
                    if slot < c {
                        let r = Node::from_slot_range(node, slot + 1..c);
                        right = Node::join(right, node.elements[slot].clone(), r);
                    }
                    (left, separator, right)
                }
            });
        });
        parts.expect("`TreePath::split()` - path is empty!")
    }

    /// Returns a tree of everything before the focused element.
    fn prefix(&self) -> Arc<Node<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        assert!(!self.is_at_end(), "`TreePath::prefix()` - path is at the end!");
        let mut prefix: Option<Arc<Node<K, V>>> = None;
        self.for_each_node(true, |node, slot| {
            prefix = Some(match prefix.take() {
                None => Node::from_slot_range(node, 0..slot),
                Some(prefix) if slot >= 1 => {
                    let l = Node::from_slot_range(node, 0..slot - 1);
                    Node::join(l, node.elements[slot - 1].clone(), prefix)
                }
                Some(prefix) => prefix,
            });
        });
        prefix.expect("`TreePath::prefix()` - path is empty!")
    }

    /// Returns a tree of everything after the focused element.
    fn suffix(&self) -> Arc<Node<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        assert!(!self.is_at_end(), "`TreePath::suffix()` - path is at the end!");
        let mut suffix: Option<Arc<Node<K, V>>> = None;
        self.for_each_node(true, |node, slot| {
            let c = node.elements.len();
            suffix = Some(match suffix.take() {
                None => Node::from_slot_range(node, slot + 1..c),
                Some(suffix) if slot < c => {
                    let r = Node::from_slot_range(node, slot + 1..c);
                    Node::join(suffix, node.elements[slot].clone(), r)
                }
                Some(suffix) => suffix,
            });
        });
        suffix.expect("`TreePath::suffix()` - path is empty!")
    }

    /// Calls `f` with the focused element.
    fn with_element<R>(&self, f: impl FnOnce(&(K, V)) -> R) -> R {
        let slot = self.current_slot();
        let node = self.node();
        f(&node.elements[slot])
    }
}
