use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::mem;

use smallvec::SmallVec;
use tracing::trace;

use super::node::Node;
use super::path::TreePath;
use super::strong_path::StrongPath;
use super::weak_path::WeakPath;
use crate::KeySelector;

/// A path with exclusive ownership of the nodes it walks through, used for editing.
///
/// Every node on the path is detached from its parent while the path is inside it: the parent's slot
/// holds a shared empty placeholder (the "hole"), and the parent's count leaves out the detached
/// subtree. Editing the focused node therefore only has to fix that node's count; ancestors get their
/// counts back as the path ascends through them, or when the path is finished.
pub(crate) struct CursorPath<K, V> {
    count: usize,
    offset: usize,
    path: SmallVec<[Arc<Node<K, V>>; 16]>,
    slots: SmallVec<[usize; 16]>,
    node: Arc<Node<K, V>>,
    slot: Option<usize>,
    hole: Arc<Node<K, V>>,
}

impl<K: Clone, V: Clone> CursorPath<K, V> {
    fn new(root: Arc<Node<K, V>>) -> Self {
        let hole = Arc::new(Node::new(root.order()));
        Self {
            count: root.len(),
            offset: root.len(),
            path: SmallVec::new(),
            slots: SmallVec::new(),
            node: root,
            slot: None,
            hole,
        }
    }

    pub(crate) fn at_start(root: Arc<Node<K, V>>) -> Self {
        Self::at_offset(root, 0)
    }

    pub(crate) fn at_end(root: Arc<Node<K, V>>) -> Self {
        let mut path = Self::new(root);
        let (slot, len) = (path.node.elements.len(), path.node.len());
        path.push_to_slots_at(slot, len);
        path
    }

    pub(crate) fn at_offset(root: Arc<Node<K, V>>, offset: usize) -> Self {
        assert!(offset <= root.len(), "`CursorPath::at_offset()` - `offset` > `count`!");
        let mut path = Self::new(root);
        path.descend_to_offset(offset);
        path
    }

    pub(crate) fn at_key<Q>(root: Arc<Node<K, V>>, key: &Q, selector: KeySelector) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path = Self::new(root);
        path.descend_to_key(key, selector);
        path
    }

    /// Creates a path following the slots of `index`, which must have been created over `root`.
    pub(crate) fn from_slots(root: Arc<Node<K, V>>, index: &WeakPath<K, V>) -> Self {
        let mut path = Self::new(root);
        path.push_slots_from(index);
        path
    }

    pub(crate) fn order(&self) -> usize {
        self.hole.order()
    }

    fn empty(&self) -> Arc<Node<K, V>> {
        Arc::new(Node::new(self.order()))
    }

    /// Reattaches every node on the path and returns the repaired root, leaving an empty tree behind.
    pub(crate) fn finish(&mut self) -> Arc<Node<K, V>> {
        self.slot = None;
        while !self.path.is_empty() {
            self.pop_from_path();
            self.slot = None;
        }
        debug_assert_eq!(self.node.len(), self.count);
        let root = mem::replace(&mut self.node, Arc::clone(&self.hole));
        self.invalidate();
        root
    }

    /// Resets the path to an empty tree of the same order.
    fn invalidate(&mut self) {
        self.node = self.empty();
        self.path.clear();
        self.slots.clear();
        self.count = 0;
        self.offset = 0;
        self.slot = Some(0);
    }

    /// The focused element.
    pub(crate) fn element(&self) -> &(K, V) {
        assert!(!self.is_at_end(), "`Cursor::element()` - cursor is at the end!");
        &self.node.elements[self.current_slot()]
    }

    /// The focused element, made unique for editing.
    pub(crate) fn element_mut(&mut self) -> &mut (K, V) {
        assert!(!self.is_at_end(), "`Cursor::element_mut()` - cursor is at the end!");
        let slot = self.current_slot();
        &mut Arc::make_mut(&mut self.node).elements[slot]
    }

    /// Replaces the focused element, returning the old one.
    pub(crate) fn set_element(&mut self, element: (K, V)) -> (K, V) {
        mem::replace(self.element_mut(), element)
    }

    /// Replaces the value of the focused element, returning the old one.
    pub(crate) fn set_value(&mut self, value: V) -> V {
        mem::replace(&mut self.element_mut().1, value)
    }

    // Inserts `element` into the focused leaf slot and accounts for it.
    fn insert_into_leaf(&mut self, slot: usize, element: (K, V)) {
        let node = Arc::make_mut(&mut self.node);
        debug_assert!(node.is_leaf());
        node.elements.insert(slot, element);
        node.count += 1;
    }

    /// Splits every overfull node on the path, bottom up, keeping the focus on the same element.
    fn fixup_after_insert(&mut self) {
        if !self.node.is_too_large() {
            return;
        }
        let slot = self.current_slot();
        let node = mem::replace(&mut self.node, Arc::clone(&self.hole));
        self.path.push(node);
        self.slots.push(slot);

        let mut i = self.path.len() - 1;
        while self.path[i].is_too_large() {
            let slot = self.slots[i];
            let deepest = i == self.path.len() - 1;
            let left = Arc::make_mut(&mut self.path[i]);
            let splinter = left.split();
            let median = left.elements.len();
            let left_count = left.len();
            let right_count = splinter.node.len();
            let goes_right = slot > median;
            let is_separator = !goes_right && slot == median && deepest;
            if goes_right {
                self.slots[i] = slot - median - 1;
            }
            if i == 0 {
                let order = self.order();
                let depth = self.path[0].depth() + 1;
                let (root, root_slot) = if is_separator {
                    let left = self.path.remove(0);
                    self.slots.remove(0);
                    (Node::new_pair(left, splinter.separator, splinter.node), 0)
                } else if goes_right {
                    let left = mem::replace(&mut self.path[0], splinter.node);
                    let children = vec![left, Arc::clone(&self.hole)];
                    (Node::from_parts(order, depth, vec![splinter.separator], children, left_count + 1), 1)
                } else {
                    let children = vec![Arc::clone(&self.hole), splinter.node];
                    (Node::from_parts(order, depth, vec![splinter.separator], children, right_count + 1), 0)
                };
                trace!(depth, "cursor split the root");
                self.path.insert(0, Arc::new(root));
                self.slots.insert(0, root_slot);
                break;
            }

            let pslot = self.slots[i - 1];
            if is_separator {
                let left = self.path.remove(i);
                self.slots.remove(i);
                let parent = Arc::make_mut(&mut self.path[i - 1]);
                parent.elements.insert(pslot, splinter.separator);
                parent.children[pslot] = left;
                parent.children.insert(pslot + 1, splinter.node);
                parent.count += left_count + 1 + right_count;
            } else if goes_right {
                let left = mem::replace(&mut self.path[i], splinter.node);
                let parent = Arc::make_mut(&mut self.path[i - 1]);
                parent.elements.insert(pslot, splinter.separator);
                parent.children[pslot] = left;
                parent.children.insert(pslot + 1, Arc::clone(&self.hole));
                parent.count += left_count + 1;
                self.slots[i - 1] = pslot + 1;
            } else {
                let parent = Arc::make_mut(&mut self.path[i - 1]);
                parent.elements.insert(pslot, splinter.separator);
                parent.children.insert(pslot + 1, splinter.node);
                parent.count += 1 + right_count;
            }
            i -= 1;
        }

        self.node = self.path.pop().expect("`CursorPath::fixup_after_insert()` - path is empty!");
        self.slot = self.slots.pop();
    }

    /// Inserts `element` before the focused element and moves past it.
    pub(crate) fn insert(&mut self, element: (K, V)) {
        self.count += 1;
        if self.node.is_leaf() {
            let slot = self.current_slot();
            self.insert_into_leaf(slot, element);
        } else {
            self.move_backward();
            let slot = self.current_slot() + 1;
            self.insert_into_leaf(slot, element);
            self.slot = Some(slot);
            self.offset += 1;
        }
        self.fixup_after_insert();
        self.move_forward();
    }

    /// Inserts `element` after the focused element and focuses it.
    pub(crate) fn insert_after(&mut self, element: (K, V)) {
        assert!(!self.is_at_end(), "`Cursor::insert_after()` - cursor is at the end!");
        self.count += 1;
        if self.node.is_leaf() {
            let slot = self.current_slot() + 1;
            self.insert_into_leaf(slot, element);
            self.slot = Some(slot);
            self.offset += 1;
        } else {
            self.move_forward();
            debug_assert_eq!(self.slot, Some(0));
            self.insert_into_leaf(0, element);
        }
        self.fixup_after_insert();
    }

    /// Removes and returns the focused element; the element after it becomes focused.
    pub(crate) fn remove(&mut self) -> (K, V) {
        assert!(!self.is_at_end(), "`Cursor::remove()` - cursor is at the end!");
        if !self.node.is_leaf() {
            // Removing the leaf predecessor instead keeps the edit in a leaf.
            self.move_backward();
            let surrogate = self.remove();
            let removed = self.set_element(surrogate);
            self.move_forward();
            return removed;
        }
        let target = self.offset;
        let slot = self.current_slot();
        let node = Arc::make_mut(&mut self.node);
        let removed = node.elements.remove(slot);
        node.count -= 1;
        self.count -= 1;
        self.pop_from_slots();
        while self.length() > 1 && self.node.is_too_small() {
            self.pop_from_path();
            let slot = self.current_slot();
            self.pop_from_slots();
            Arc::make_mut(&mut self.node).fix_deficiency(slot);
        }
        while target != self.count && target == self.offset && self.length() > 1 {
            self.pop_from_path();
            self.pop_from_slots();
        }
        if self.length() == 1 && self.node.elements.is_empty() && self.node.children.len() == 1 {
            let root = Arc::make_mut(&mut self.node);
            let child = root.children.pop().expect("`CursorPath::remove()` - root has no child!");
            self.node = child;
            trace!(depth = self.node.depth(), "cursor collapsed the root");
        }
        self.descend_to_offset(target);
        removed
    }

    /// Inserts a whole tree before the focused element and moves past it.
    ///
    /// The tree's keys must fit between the elements around the cursor.
    pub(crate) fn insert_tree(&mut self, tree: Arc<Node<K, V>>) {
        assert_eq!(tree.order(), self.order(), "`Cursor::insert_tree()` - trees have different orders!");
        let c = tree.len();
        match c {
            0 => return,
            1 => {
                let mut tree = Arc::unwrap_or_clone(tree);
                let element = tree.elements.pop().expect("`CursorPath::insert_tree()` - tree is empty!");
                self.insert(element);
                return;
            }
            _ => {}
        }
        if self.count == 0 {
            *self = Self::at_end(tree);
            return;
        }
        let offset = self.offset;
        if offset == self.count {
            self.move_backward();
            let separator = self.remove();
            let joined = Node::join(self.finish(), separator, tree);
            *self = Self::at_end(joined);
        } else if offset == 0 {
            let separator = self.remove();
            let joined = Node::join(tree, separator, self.finish());
            *self = Self::at_offset(joined, c);
        } else {
            self.move_backward();
            let first = self.remove();
            let (prefix, second, suffix) = self.split();
            let joined = Node::join(Node::join(prefix, first, tree), second, suffix);
            *self = Self::at_offset(joined, offset + c);
        }
    }

    /// Removes `n` elements starting at the focused one.
    pub(crate) fn remove_n(&mut self, n: usize) {
        assert!(self.offset + n <= self.count, "`Cursor::remove_n()` - not enough elements after the cursor!");
        if n == 0 {
            return;
        }
        if n == 1 {
            self.remove();
            return;
        }
        if n == self.count {
            self.remove_all();
            return;
        }
        let offset = self.offset;
        if offset == 0 {
            self.move_to_offset(n - 1);
            *self = Self::at_start(self.suffix());
        } else if offset == self.count - n {
            *self = Self::at_end(self.prefix());
        } else {
            let left = self.prefix();
            self.move_to_offset(offset + n);
            let separator = self.element().clone();
            let right = self.suffix();
            *self = Self::at_offset(Node::join(left, separator, right), offset);
        }
    }

    pub(crate) fn remove_all(&mut self) {
        *self = Self::at_start(self.empty());
    }

    /// Removes every element before the cursor, and the focused element too when `inclusive`.
    pub(crate) fn remove_all_before(&mut self, inclusive: bool) {
        if self.is_at_end() {
            assert!(!inclusive, "`Cursor::remove_all_before()` - cursor is at the end!");
            self.remove_all();
            return;
        }
        if !inclusive {
            if self.is_at_start() {
                return;
            }
            self.move_backward();
        }
        *self = Self::at_start(self.suffix());
    }

    /// Removes every element after the cursor, and the focused element too when `inclusive`.
    pub(crate) fn remove_all_after(&mut self, inclusive: bool) {
        if self.is_at_end() {
            assert!(!inclusive, "`Cursor::remove_all_after()` - cursor is at the end!");
            return;
        }
        if !inclusive {
            self.move_forward();
            if self.is_at_end() {
                return;
            }
        }
        if self.is_at_start() {
            self.remove_all();
            return;
        }
        *self = Self::at_end(self.prefix());
    }

    /// Removes `n` elements starting at the focused one and returns them as a tree.
    pub(crate) fn extract(&mut self, n: usize) -> Arc<Node<K, V>> {
        assert!(self.offset + n <= self.count, "`Cursor::extract()` - not enough elements after the cursor!");
        if n == 0 {
            return self.empty();
        }
        if n == 1 {
            let element = self.remove();
            return Arc::new(Node::from_parts(self.order(), 0, vec![element], Vec::new(), 1));
        }
        if n == self.count {
            return self.finish();
        }
        let offset = self.offset;
        if offset == self.count - n {
            let (prefix, separator, suffix) = self.split();
            *self = Self::at_offset(prefix, offset);
            return Node::join(self.empty(), separator, suffix);
        }
        let (left, first, tail) = self.split();
        let (middle, second, right) = StrongPath::at_offset(&tail, n - 1).split();
        *self = Self::at_offset(Node::join(left, second, right), offset);
        Node::join(self.empty(), first, middle)
    }
}

impl<K: Clone, V: Clone> TreePath<K, V> for CursorPath<K, V> {
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
        &self.node
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
        let parent = self.path.pop().expect("`CursorPath::pop_from_path()` - path is at the root!");
        let slot = self.slots.pop().expect("`CursorPath::pop_from_path()` - slots are out of sync!");
        let child = mem::replace(&mut self.node, parent);
        let node = Arc::make_mut(&mut self.node);
        node.count += child.len();
        node.children[slot] = child;
        self.slot = Some(slot);
    }

    fn push_to_path(&mut self) {
        let slot = self.current_slot();
        let hole = Arc::clone(&self.hole);
        let parent = Arc::make_mut(&mut self.node);
        let child = mem::replace(&mut parent.children[slot], hole);
        parent.count -= child.len();
        let parent = mem::replace(&mut self.node, child);
        self.path.push(parent);
        self.slots.push(slot);
        self.slot = None;
    }

    fn for_each_node(&self, ascending: bool, mut body: impl FnMut(&Node<K, V>, usize)) {
        let slot = self.current_slot();
        if ascending {
            body(&self.node, slot);
            for (node, &slot) in self.path.iter().zip(&self.slots).rev() {
                body(node, slot);
            }
        } else {
            for (node, &slot) in self.path.iter().zip(&self.slots) {
                body(node, slot);
            }
            body(&self.node, slot);
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
