use alloc::sync::Arc;
use core::borrow::Borrow;
use core::fmt;

use tracing::trace;

use super::{BTree, Index};
use crate::KeySelector;
use crate::raw::{Builder, CursorPath, Node, RawBTree, TreePath};

/// An editing session over the contents of a [`BTree`].
///
/// Checking out a cursor moves the tree's contents into it and leaves an empty tree of the same order
/// behind. The cursor owns the nodes on its path outright, so a run of nearby edits costs little more
/// than the navigation between them. [`Cursor::finish`] hands the edited contents back as a tree.
///
/// The contents are only returned by [`Cursor::finish`]. Dropping a cursor without finishing it drops
/// the contents with it, and the tree it was checked out from stays empty. The `with_cursor_*`
/// methods finish the cursor themselves.
///
/// # Examples
///
/// ```
/// use cow_btree::BTree;
///
/// let mut tree: BTree<_, _> = (0..10).map(|i| (i, i)).collect();
/// let mut cursor = tree.cursor_at_offset(3);
/// assert!(tree.is_empty());
///
/// cursor.remove_n(4);
/// cursor.insert((5, 50));
/// assert_eq!(cursor.key(), &7);
/// tree = cursor.finish();
///
/// let keys: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
/// assert_eq!(keys, [0, 1, 2, 5, 7, 8, 9]);
/// ```
#[must_use = "dropping a cursor without calling `finish` discards the tree's contents"]
pub struct Cursor<K, V> {
    path: CursorPath<K, V>,
}

impl<K: Clone, V: Clone> BTree<K, V> {
    fn check_out(&mut self, checkout: impl FnOnce(Arc<Node<K, V>>) -> CursorPath<K, V>) -> Cursor<K, V> {
        let root = self.raw.take_root();
        trace!(len = root.len(), "checked out a cursor");
        Cursor { path: checkout(root) }
    }

    /// Moves the contents of the tree into a cursor focused on the element at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset > len`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn cursor_at_offset(&mut self, offset: usize) -> Cursor<K, V> {
        assert!(offset <= self.len(), "`BTree::cursor_at_offset()` - `offset` > `len`!");
        self.check_out(|root| CursorPath::at_offset(root, offset))
    }

    /// Moves the contents of the tree into a cursor focused on the first element.
    pub fn cursor_at_start(&mut self) -> Cursor<K, V> {
        self.check_out(CursorPath::at_start)
    }

    /// Moves the contents of the tree into a cursor positioned just past the last element.
    pub fn cursor_at_end(&mut self) -> Cursor<K, V> {
        self.check_out(CursorPath::at_end)
    }

    /// Moves the contents of the tree into a cursor focused on the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree.
    pub fn cursor_at_index(&mut self, index: &Index<K, V>) -> Cursor<K, V> {
        index.path.expect_root(self.raw.root());
        self.check_out(|root| CursorPath::from_slots(root, &index.path))
    }

    /// Moves the contents of the tree into a cursor focused on the element chosen by `key` and
    /// `selector`, or on the spot where such an element would be.
    pub fn cursor_on_key<Q>(&mut self, key: &Q, selector: KeySelector) -> Cursor<K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.check_out(|root| CursorPath::at_key(root, key, selector))
    }

    fn with_cursor<R>(&mut self, mut cursor: Cursor<K, V>, body: impl FnOnce(&mut Cursor<K, V>) -> R) -> R {
        let result = body(&mut cursor);
        *self = cursor.finish();
        result
    }

    /// Runs `body` with a cursor at `offset` and stores the edited contents back.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let mut tree: BTree<_, _> = (0..5).map(|i| (i, i)).collect();
    /// let removed = tree.with_cursor_at_offset(1, |cursor| {
    ///     let removed = cursor.remove();
    ///     *cursor.value_mut() *= 10;
    ///     removed
    /// });
    /// assert_eq!(removed, (1, 1));
    /// assert_eq!(tree.element_at(1), (&2, &20));
    /// ```
    pub fn with_cursor_at_offset<R>(&mut self, offset: usize, body: impl FnOnce(&mut Cursor<K, V>) -> R) -> R {
        let cursor = self.cursor_at_offset(offset);
        self.with_cursor(cursor, body)
    }

    /// Runs `body` with a cursor at the first element, then stores the edited contents back.
    pub fn with_cursor_at_start<R>(&mut self, body: impl FnOnce(&mut Cursor<K, V>) -> R) -> R {
        let cursor = self.cursor_at_start();
        self.with_cursor(cursor, body)
    }

    /// Runs `body` with a cursor past the last element, then stores the edited contents back.
    pub fn with_cursor_at_end<R>(&mut self, body: impl FnOnce(&mut Cursor<K, V>) -> R) -> R {
        let cursor = self.cursor_at_end();
        self.with_cursor(cursor, body)
    }

    /// Runs `body` with a cursor at the element of `index`, then stores the edited contents back.
    pub fn with_cursor_at_index<R>(&mut self, index: &Index<K, V>, body: impl FnOnce(&mut Cursor<K, V>) -> R) -> R {
        let cursor = self.cursor_at_index(index);
        self.with_cursor(cursor, body)
    }

    /// Runs `body` with a cursor on the element chosen by `key` and `selector`, then stores the edited
    /// contents back.
    pub fn with_cursor_on_key<Q, R>(
        &mut self,
        key: &Q,
        selector: KeySelector,
        body: impl FnOnce(&mut Cursor<K, V>) -> R,
    ) -> R
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let cursor = self.cursor_on_key(key, selector);
        self.with_cursor(cursor, body)
    }
}

impl<K: Clone, V: Clone> Cursor<K, V> {
    /// Ends the session and returns the edited contents as a tree.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn finish(mut self) -> BTree<K, V> {
        let root = self.path.finish();
        trace!(len = root.len(), "finished a cursor");
        BTree::from_raw(RawBTree::from_root(root))
    }

    /// Returns the number of elements in the tree being edited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.path.count()
    }

    /// Returns true if the tree being edited holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.count() == 0
    }

    /// Returns the offset of the focused element, or `len` at the end.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.path.offset()
    }

    /// Returns true if the cursor is at offset 0.
    #[must_use]
    pub fn is_at_start(&self) -> bool {
        self.path.is_at_start()
    }

    /// Returns true if the cursor is past the last element.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.path.is_at_end()
    }

    /// Moves to the next element.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    ///
    /// # Complexity
    ///
    /// Amortized O(1)
    pub fn move_forward(&mut self) {
        self.path.move_forward();
    }

    /// Moves to the previous element.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the start.
    pub fn move_backward(&mut self) {
        self.path.move_backward();
    }

    /// Moves to the first element.
    pub fn move_to_start(&mut self) {
        self.path.move_to_start();
    }

    /// Moves past the last element.
    pub fn move_to_end(&mut self) {
        self.path.move_to_end();
    }

    /// Moves to `offset`, in time logarithmic in the distance travelled.
    ///
    /// # Panics
    ///
    /// Panics if `offset > len`.
    pub fn move_to_offset(&mut self, offset: usize) {
        assert!(offset <= self.len(), "`Cursor::move_to_offset()` - `offset` > `len`!");
        self.path.move_to_offset(offset);
    }

    /// Moves to the element chosen by `key` and `selector`, or to the spot where such an element would
    /// be.
    pub fn move_to_key<Q>(&mut self, key: &Q, selector: KeySelector)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.path.move_to_key(key, selector);
    }

    /// Returns the focused element.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    #[must_use]
    pub fn element(&self) -> (&K, &V) {
        let (k, v) = self.path.element();
        (k, v)
    }

    /// Returns the key of the focused element.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.path.element().0
    }

    /// Returns the value of the focused element.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.path.element().1
    }

    /// Returns the value of the focused element for editing in place.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.path.element_mut().1
    }

    /// Replaces the value of the focused element, returning the old one.
    pub fn set_value(&mut self, value: V) -> V {
        self.path.set_value(value)
    }

    /// Replaces the focused element, returning the old one.
    ///
    /// It is a logic error to change the key so that it no longer fits between its neighbours.
    pub fn set_element(&mut self, element: (K, V)) -> (K, V) {
        self.path.set_element(element)
    }

    /// Inserts `element` before the focused element and stays on the focused element.
    ///
    /// It is a logic error to insert an element whose key does not fit between its new neighbours.
    ///
    /// # Complexity
    ///
    /// Amortized O(1) on top of navigation.
    pub fn insert(&mut self, element: (K, V)) {
        self.path.insert(element);
    }

    /// Inserts `element` after the focused element and focuses the new element.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    pub fn insert_after(&mut self, element: (K, V)) {
        self.path.insert_after(element);
    }

    /// Inserts every element of `tree` before the focused element and stays on the focused element.
    ///
    /// # Panics
    ///
    /// Panics if `tree` has a different order.
    ///
    /// # Complexity
    ///
    /// O(log n + log m)
    pub fn insert_tree(&mut self, tree: BTree<K, V>) {
        self.path.insert_tree(tree.raw.into_root());
    }

    /// Removes and returns the focused element. The element after it becomes focused.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    pub fn remove(&mut self) -> (K, V) {
        self.path.remove()
    }

    /// Removes `n` elements starting at the focused one.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` elements follow the cursor.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_n(&mut self, n: usize) {
        self.path.remove_n(n);
    }

    /// Removes every element, leaving the cursor on an empty tree.
    pub fn remove_all(&mut self) {
        self.path.remove_all();
    }

    /// Removes every element before the focused one, and the focused element too when `inclusive`.
    ///
    /// # Panics
    ///
    /// Panics if `inclusive` and the cursor is at the end.
    pub fn remove_all_before(&mut self, inclusive: bool) {
        self.path.remove_all_before(inclusive);
    }

    /// Removes every element after the focused one, and the focused element too when `inclusive`.
    ///
    /// # Panics
    ///
    /// Panics if `inclusive` and the cursor is at the end.
    pub fn remove_all_after(&mut self, inclusive: bool) {
        self.path.remove_all_after(inclusive);
    }

    /// Removes `n` elements starting at the focused one and returns them as a tree of the same order.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` elements follow the cursor.
    pub fn extract(&mut self, n: usize) -> BTree<K, V> {
        BTree::from_raw(RawBTree::from_root(self.path.extract(n)))
    }
}

impl<K: Ord + Clone, V: Clone> Cursor<K, V> {
    /// Inserts a sorted run of elements before the focused element and stays on the focused element.
    ///
    /// The run is bulk-loaded into a tree first, then spliced in as a whole.
    ///
    /// # Panics
    ///
    /// Panics if the elements are not sorted by key.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let mut tree: BTree<_, _> = [(0, 'a'), (9, 'z')].into_iter().collect();
    /// let mut cursor = tree.cursor_at_offset(1);
    /// cursor.insert_sorted((1..9).map(|i| (i, '-')));
    /// let tree = cursor.finish();
    /// assert_eq!(tree.len(), 10);
    /// assert_eq!(tree.element_at(9), (&9, &'z'));
    /// ```
    pub fn insert_sorted(&mut self, elements: impl IntoIterator<Item = (K, V)>) {
        let mut builder = Builder::new(self.path.order());
        for element in elements {
            assert!(
                builder.last_key().is_none_or(|last| *last <= element.0),
                "`Cursor::insert_sorted()` - elements are not sorted!"
            );
            builder.append(element);
        }
        self.path.insert_tree(builder.finish());
    }
}

impl<K: fmt::Debug + Clone, V: fmt::Debug + Clone> fmt::Debug for Cursor<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Cursor");
        s.field("offset", &self.offset()).field("len", &self.len());
        if !self.is_at_end() {
            s.field("element", &self.element());
        }
        s.finish()
    }
}
