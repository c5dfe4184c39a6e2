use alloc::sync::Arc;
use core::borrow::Borrow;
use core::mem;

use tracing::trace;

use super::edit::{Edit, InsertAt, InsertByKey, RemoveAt, RemoveByKey, SetValueAt, Upsert};
use super::node::{Node, Splinter};
use super::path::TreePath;
use super::strong_path::StrongPath;
use crate::KeySelector;

/// The root holder behind `BTree`: one shared root node and the operations that edit it in place.
pub(crate) struct RawBTree<K, V> {
    root: Arc<Node<K, V>>,
}

impl<K, V> Clone for RawBTree<K, V> {
    fn clone(&self) -> Self {
        Self { root: Arc::clone(&self.root) }
    }
}

impl<K, V> RawBTree<K, V> {
    /// Creates an empty tree.
    pub(crate) fn new(order: usize) -> Self {
        Self { root: Arc::new(Node::new(order)) }
    }

    pub(crate) fn from_root(root: Arc<Node<K, V>>) -> Self {
        Self { root }
    }

    #[inline]
    pub(crate) fn root(&self) -> &Arc<Node<K, V>> {
        &self.root
    }

    pub(crate) fn into_root(self) -> Arc<Node<K, V>> {
        self.root
    }

    /// Moves the root out, leaving an empty tree of the same order behind.
    pub(crate) fn take_root(&mut self) -> Arc<Node<K, V>> {
        let empty = Arc::new(Node::new(self.order()));
        mem::replace(&mut self.root, empty)
    }

    #[inline]
    pub(crate) fn order(&self) -> usize {
        self.root.order()
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.root.depth()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.root.len()
    }

    pub(crate) fn clear(&mut self) {
        self.root = Arc::new(Node::new(self.order()));
    }

    pub(crate) fn first(&self) -> Option<&(K, V)> {
        self.root.first()
    }

    pub(crate) fn last(&self) -> Option<&(K, V)> {
        self.root.last()
    }

    /// Returns the element at `offset`, which must be less than `len`.
    pub(crate) fn element_at(&self, offset: usize) -> &(K, V) {
        assert!(offset < self.len(), "`BTree::element_at()` - `offset` >= `len`!");
        let mut node = &self.root;
        let mut offset = offset;
        loop {
            let slot = node.slot_at_offset(offset);
            if slot.matched {
                return &node.elements[slot.index];
            }
            let child = &node.children[slot.index];
            offset -= slot.offset - child.len();
            node = child;
        }
    }

    /// Returns the element chosen by `key` and `selector`.
    ///
    /// A match in an internal node is only final for `Any`; other selectors keep looking below it for a
    /// better one.
    pub(crate) fn element_of<Q>(&self, key: &Q, selector: KeySelector) -> Option<&(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut node = &self.root;
        let mut found = None;
        loop {
            let (matched, descend) = node.slot_of(key, selector);
            if let Some(m) = matched {
                if selector == KeySelector::Any || node.is_leaf() {
                    return Some(&node.elements[m]);
                }
                found = Some(&node.elements[m]);
            }
            if node.is_leaf() {
                return found;
            }
            node = &node.children[descend];
        }
    }

    /// Returns the offset of the element chosen by `key` and `selector`.
    pub(crate) fn offset_of<Q>(&self, key: &Q, selector: KeySelector) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key, selector).ok()
    }

    /// Returns `Ok` with the offset of the element chosen by `key` and `selector`, or `Err` with the
    /// offset at which an element with that key belongs when no element has an equal key.
    pub(crate) fn search<Q>(&self, key: &Q, selector: KeySelector) -> Result<usize, usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut node = &self.root;
        // The offset at which the current node's subtree starts.
        let mut start = 0;
        let mut found = None;
        loop {
            let (matched, descend) = node.slot_of(key, selector);
            if let Some(m) = matched {
                let offset = start + node.offset_of_slot(m);
                if selector == KeySelector::Any || node.is_leaf() {
                    return Ok(offset);
                }
                found = Some(offset);
            }
            if node.is_leaf() {
                // Without a match, every selector stops at the same slot of the leaf.
                return found.ok_or(start + descend);
            }
            let child = &node.children[descend];
            start += node.offset_of_slot(descend) - child.len();
            node = child;
        }
    }
}

impl<K: Clone, V: Clone> RawBTree<K, V> {
    fn edit(&mut self, editor: &mut impl Edit<K, V>) {
        Arc::make_mut(&mut self.root).edit(editor);
    }

    // Grows the tree by one level when an edit split the root.
    fn adopt(&mut self, splinter: Option<Splinter<K, V>>) {
        if let Some(splinter) = splinter {
            let left = self.take_root();
            self.root = Arc::new(Node::new_pair(left, splinter.separator, splinter.node));
            trace!(depth = self.root.depth(), "split the root");
        }
    }

    // Shrinks the tree by one level when an edit emptied an internal root.
    fn collapse(&mut self) {
        if self.root.elements.is_empty() && !self.root.is_leaf() {
            let child = Arc::clone(&self.root.children[0]);
            self.root = child;
            trace!(depth = self.root.depth(), "collapsed the root");
        }
    }

    /// Replaces the value at `offset`, returning the old one.
    pub(crate) fn set_value_at(&mut self, offset: usize, value: V) -> V {
        assert!(offset < self.len(), "`BTree::set_value_at()` - `offset` >= `len`!");
        let mut editor = SetValueAt::new(self.len() - offset, value);
        self.edit(&mut editor);
        editor.old.expect("`BTree::set_value_at()` - no element at `offset`!")
    }

    /// Inserts `element` at `offset`, ignoring key order.
    pub(crate) fn insert_at(&mut self, offset: usize, element: (K, V)) {
        assert!(offset <= self.len(), "`BTree::insert_at()` - `offset` > `len`!");
        let mut editor = InsertAt::new(self.len() - offset, element);
        self.edit(&mut editor);
        self.adopt(editor.splinter);
    }

    pub(crate) fn remove_at(&mut self, offset: usize) -> (K, V) {
        assert!(offset < self.len(), "`BTree::remove_at()` - `offset` >= `len`!");
        let mut editor = RemoveAt::new(self.len() - offset);
        self.edit(&mut editor);
        self.collapse();
        editor.removed.expect("`BTree::remove_at()` - no element at `offset`!")
    }

    /// Returns the first `n` elements.
    pub(crate) fn prefix(&self, n: usize) -> Self {
        if n >= self.len() {
            return self.clone();
        }
        Self::from_root(StrongPath::at_offset(&self.root, n).prefix())
    }

    /// Returns the last `n` elements.
    pub(crate) fn suffix(&self, n: usize) -> Self {
        if n >= self.len() {
            return self.clone();
        }
        if n == 0 {
            return Self::new(self.order());
        }
        Self::from_root(StrongPath::at_offset(&self.root, self.len() - n - 1).suffix())
    }

    /// Returns the elements at offsets `start..end`.
    pub(crate) fn subtree(&self, start: usize, end: usize) -> Self {
        assert!(start <= end && end <= self.len(), "`BTree::subtree_offsets()` - range out of bounds!");
        self.prefix(end).suffix(end - start)
    }
}

impl<K: Ord + Clone, V: Clone> RawBTree<K, V> {
    /// Inserts `element` before the elements with an equal key (`First`) or after them.
    pub(crate) fn insert(&mut self, element: (K, V), selector: KeySelector) {
        let mut editor = InsertByKey::new(element, selector);
        self.edit(&mut editor);
        self.adopt(editor.splinter);
    }

    /// Replaces the matching element with `element` and returns it, or inserts `element`.
    pub(crate) fn insert_or_replace(&mut self, element: (K, V), selector: KeySelector) -> Option<(K, V)> {
        let mut editor = Upsert::new(element, selector);
        self.edit(&mut editor);
        self.adopt(editor.splinter);
        editor.replaced
    }

    /// Returns the offset of the matching element, or inserts `element` and returns `None`.
    ///
    /// A match leaves the tree untouched. Without one, the element goes in at the offset the search
    /// stopped at.
    pub(crate) fn insert_or_find(&mut self, element: (K, V), selector: KeySelector) -> Option<usize> {
        match self.search(&element.0, remap_after(selector)) {
            Ok(offset) => Some(offset),
            Err(offset) => {
                self.insert_at(offset, element);
                None
            }
        }
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q, selector: KeySelector) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.element_of(key, remap_after(selector))?;
        let mut editor = RemoveByKey::new(key, selector);
        self.edit(&mut editor);
        self.collapse();
        editor.removed
    }
}

// Finding and removing by key treat `After` as `Last`.
fn remap_after(selector: KeySelector) -> KeySelector {
    if selector == KeySelector::After { KeySelector::Last } else { selector }
}
