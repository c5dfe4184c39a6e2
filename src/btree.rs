//! The [`BTree`] type and the handles it hands out: iterators, indices and cursors.

use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;
use core::ops::{Bound, RangeBounds};

use crate::KeySelector;
use crate::raw::{Node, RawBTree, StrongPath, TreePath};

mod cursor;
mod index;
mod load;
mod merge;
mod subtree;

pub use cursor::Cursor;
pub use index::Index;
pub use load::LoadOptions;

/// Resolves `range` against `0..len`.
///
/// # Panics
///
/// Panics if the range is decreasing or reaches past `len`.
fn offset_range(range: impl RangeBounds<usize>, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end + 1,
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };
    assert!(start <= end && end <= len, "`BTree::offset_range()` - range out of bounds!");
    (start, end)
}

/// An ordered collection of key-value elements stored in a copy-on-write [B-tree].
///
/// Unlike `BTreeMap`, a `BTree` may hold any number of elements with equal keys. They keep the order
/// they were inserted in, and every operation that has to pick among them takes a [`KeySelector`].
/// Every element also has an *offset*, its position in key order, and the tree can be read and
/// edited by offset in logarithmic time.
///
/// Nodes are reference counted and shared between trees. Cloning a tree takes constant time; the
/// first edit of either copy afterwards copies only the nodes on the edited path. Operations that
/// combine two trees recognize the nodes they share and link or skip them as a whole, so comparing
/// or merging a tree with a lightly edited copy of itself is much faster than a full walk.
///
/// Editing methods need `K: Clone` and `V: Clone`, since a node that is still shared with another
/// tree has to be copied before it can be changed.
///
/// # Examples
///
/// ```
/// use cow_btree::{BTree, KeySelector};
///
/// let mut scores = BTree::new();
/// scores.insert(("carol", 92), KeySelector::Last);
/// scores.insert(("alice", 100), KeySelector::Last);
/// scores.insert(("bob", 85), KeySelector::Last);
/// scores.insert(("bob", 70), KeySelector::Last);
///
/// assert_eq!(scores.value_of("bob", KeySelector::First), Some(&85));
/// assert_eq!(scores.value_of("bob", KeySelector::Last), Some(&70));
/// assert_eq!(scores.element_at(0), (&"alice", &100));
///
/// // Copies share their nodes until one of them is edited.
/// let snapshot = scores.clone();
/// scores.remove("bob", KeySelector::Any);
/// assert_eq!(scores.len(), 3);
/// assert_eq!(snapshot.len(), 4);
/// ```
///
/// [B-tree]: https://en.wikipedia.org/wiki/B-tree
pub struct BTree<K, V> {
    raw: RawBTree<K, V>,
}

/// An iterator over the elements of a [`BTree`], in key order.
///
/// This `struct` is created by [`BTree::iter`] and its positional variants.
///
/// # Examples
///
/// ```
/// use cow_btree::BTree;
///
/// let tree: BTree<_, _> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
/// let mut iter = tree.iter();
/// assert_eq!(iter.next(), Some((&1, &"a")));
/// assert_eq!(iter.next_back(), Some((&3, &"c")));
/// assert_eq!(iter.len(), 1);
/// ```
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    front: StrongPath<'a, K, V>,
    back: StrongPath<'a, K, V>,
}

impl<K, V> BTree<K, V> {
    /// Makes a new, empty tree with the default order for its element type.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let tree: BTree<u64, u64> = BTree::new();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.order(), BTree::<u64, u64>::default_order());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_order(Self::default_order())
    }

    /// Makes a new, empty tree whose nodes have at most `order` children.
    ///
    /// # Panics
    ///
    /// Panics if `order` is less than 3.
    #[must_use]
    pub fn with_order(order: usize) -> Self {
        assert!(order >= 3, "`BTree::with_order()` - `order` < 3!");
        Self { raw: RawBTree::new(order) }
    }

    /// Returns the order that keeps the elements of a full node within 16 KiB, but no less than 8.
    #[must_use]
    pub fn default_order() -> usize {
        Node::<K, V>::default_order()
    }

    pub(crate) fn from_raw(raw: RawBTree<K, V>) -> Self {
        Self { raw }
    }

    /// Returns the maximum number of children of a node in this tree.
    #[must_use]
    pub fn order(&self) -> usize {
        self.raw.order()
    }

    /// Returns the number of levels below the root; zero when the root is a leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.raw.depth()
    }

    /// Returns the number of elements in the tree.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the tree holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Removes every element, keeping the order.
    ///
    /// Nodes still shared with other trees stay alive for them.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns an iterator over all elements in key order.
    ///
    /// # Complexity
    ///
    /// O(log n) to create, amortized O(1) per step in either direction.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { front: StrongPath::at_start(self.raw.root()), back: StrongPath::at_end(self.raw.root()) }
    }

    /// Returns an iterator over the elements from `offset` to the end.
    ///
    /// # Panics
    ///
    /// Panics if `offset > len`.
    pub fn iter_from_offset(&self, offset: usize) -> Iter<'_, K, V> {
        assert!(offset <= self.len(), "`BTree::iter_from_offset()` - `offset` > `len`!");
        Iter { front: StrongPath::at_offset(self.raw.root(), offset), back: StrongPath::at_end(self.raw.root()) }
    }

    /// Returns an iterator over the elements at the offsets in `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or reaches past `len`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let tree: BTree<_, _> = (0..10).map(|i| (i, i * i)).collect();
    /// let squares: Vec<_> = tree.iter_offsets(3..6).rev().map(|(_, v)| *v).collect();
    /// assert_eq!(squares, [25, 16, 9]);
    /// ```
    pub fn iter_offsets(&self, range: impl RangeBounds<usize>) -> Iter<'_, K, V> {
        let (start, end) = offset_range(range, self.len());
        Iter { front: StrongPath::at_offset(self.raw.root(), start), back: StrongPath::at_offset(self.raw.root(), end) }
    }

    /// Returns the first element, if any.
    #[must_use]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.raw.first().map(|(k, v)| (k, v))
    }

    /// Returns the last element, if any.
    #[must_use]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.raw.last().map(|(k, v)| (k, v))
    }

    /// Returns the element at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset >= len`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn element_at(&self, offset: usize) -> (&K, &V) {
        let (k, v) = self.raw.element_at(offset);
        (k, v)
    }

    /// Returns the value of the element chosen by `key` and `selector`.
    ///
    /// For [`KeySelector::After`] this is the value of the first element with a greater key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::{BTree, KeySelector};
    ///
    /// let tree: BTree<_, _> = [(1, 'a'), (2, 'b'), (2, 'c'), (3, 'd')].into_iter().collect();
    /// assert_eq!(tree.value_of(&2, KeySelector::First), Some(&'b'));
    /// assert_eq!(tree.value_of(&2, KeySelector::Last), Some(&'c'));
    /// assert_eq!(tree.value_of(&2, KeySelector::After), Some(&'d'));
    /// assert_eq!(tree.value_of(&3, KeySelector::After), None);
    /// ```
    pub fn value_of<Q>(&self, key: &Q, selector: KeySelector) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.element_of(key, selector).map(|(_, v)| v)
    }

    /// Returns true if some element has a key equal to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.element_of(key, KeySelector::Any).is_some()
    }

    /// Returns the offset of the element chosen by `key` and `selector`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn offset_of<Q>(&self, key: &Q, selector: KeySelector) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.offset_of(key, selector)
    }
}

impl<K: Clone, V: Clone> BTree<K, V> {
    /// Replaces the value at `offset`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `offset >= len`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn set_value_at(&mut self, offset: usize, value: V) -> V {
        self.raw.set_value_at(offset, value)
    }

    /// Inserts `element` at `offset`.
    ///
    /// It is a logic error to insert an element whose key does not fit between its new neighbours.
    ///
    /// # Panics
    ///
    /// Panics if `offset > len`.
    pub fn insert_at(&mut self, offset: usize, element: (K, V)) {
        self.raw.insert_at(offset, element);
    }

    /// Removes and returns the element at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset >= len`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_at(&mut self, offset: usize) -> (K, V) {
        self.raw.remove_at(offset)
    }

    /// Removes and returns the first element.
    ///
    /// # Panics
    ///
    /// Panics if the tree is empty.
    pub fn remove_first(&mut self) -> (K, V) {
        assert!(!self.is_empty(), "`BTree::remove_first()` - tree is empty!");
        self.raw.remove_at(0)
    }

    /// Removes and returns the last element.
    ///
    /// # Panics
    ///
    /// Panics if the tree is empty.
    pub fn remove_last(&mut self) -> (K, V) {
        assert!(!self.is_empty(), "`BTree::remove_last()` - tree is empty!");
        self.raw.remove_at(self.len() - 1)
    }

    /// Removes and returns the first element, or `None` if the tree is empty.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        (!self.is_empty()).then(|| self.raw.remove_at(0))
    }

    /// Removes and returns the last element, or `None` if the tree is empty.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        (!self.is_empty()).then(|| self.raw.remove_at(self.len() - 1))
    }

    /// Removes the first `n` elements.
    ///
    /// # Panics
    ///
    /// Panics if `n > len`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_first_n(&mut self, n: usize) {
        assert!(n <= self.len(), "`BTree::remove_first_n()` - `n` > `len`!");
        self.raw = self.raw.suffix(self.len() - n);
    }

    /// Removes the last `n` elements.
    ///
    /// # Panics
    ///
    /// Panics if `n > len`.
    pub fn remove_last_n(&mut self, n: usize) {
        assert!(n <= self.len(), "`BTree::remove_last_n()` - `n` > `len`!");
        self.raw = self.raw.prefix(self.len() - n);
    }
}

impl<K: Ord + Clone, V: Clone> BTree<K, V> {
    /// Inserts `element` in key order.
    ///
    /// With [`KeySelector::First`] the element goes before any elements with an equal key; with any
    /// other selector it goes after them.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn insert(&mut self, element: (K, V), selector: KeySelector) {
        self.raw.insert(element, selector);
    }

    /// Replaces the element chosen by its key and `selector` with `element`, returning the old one.
    /// Inserts `element` when no element has an equal key.
    ///
    /// [`KeySelector::After`] is treated as [`KeySelector::Last`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::{BTree, KeySelector};
    ///
    /// let mut tree: BTree<_, _> = [(1, 'a'), (1, 'b')].into_iter().collect();
    /// assert_eq!(tree.insert_or_replace((1, 'z'), KeySelector::After), Some((1, 'b')));
    /// assert_eq!(tree.insert_or_replace((2, 'c'), KeySelector::Any), None);
    /// assert_eq!(tree.iter().map(|(_, v)| *v).collect::<String>(), "azc");
    /// ```
    pub fn insert_or_replace(&mut self, element: (K, V), selector: KeySelector) -> Option<(K, V)> {
        self.raw.insert_or_replace(element, selector)
    }

    /// Returns the element chosen by the key of `element` and `selector`. Inserts `element` and returns
    /// `None` when no element has an equal key.
    ///
    /// [`KeySelector::After`] is treated as [`KeySelector::Last`].
    pub fn insert_or_find(&mut self, element: (K, V), selector: KeySelector) -> Option<(&K, &V)> {
        self.raw.insert_or_find(element, selector).map(|offset| self.element_at(offset))
    }

    /// Removes and returns the element chosen by `key` and `selector`.
    ///
    /// [`KeySelector::After`] is treated as [`KeySelector::Last`].
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove<Q>(&mut self, key: &Q, selector: KeySelector) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key, selector)
    }

    /// Returns an iterator starting at the element chosen by `key` and `selector`, or at the spot
    /// where such an element would be.
    pub fn iter_from_key<Q>(&self, key: &Q, selector: KeySelector) -> Iter<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        Iter { front: StrongPath::at_key(self.raw.root(), key, selector), back: StrongPath::at_end(self.raw.root()) }
    }
}

impl<K, V> Clone for BTree<K, V> {
    /// Returns a tree sharing every node with this one.
    ///
    /// # Complexity
    ///
    /// O(1)
    fn clone(&self) -> Self {
        Self { raw: self.raw.clone() }
    }
}

impl<K, V> Default for BTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for BTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.elements_equal(other)
    }
}

impl<K: Eq, V: Eq> Eq for BTree<K, V> {}

impl<'a, K, V> IntoIterator for &'a BTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Ord + Clone, V: Clone> Extend<(K, V)> for BTree<K, V> {
    /// Inserts every element after any elements with an equal key.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for element in iter {
            self.insert(element, KeySelector::Last);
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front.offset() == self.back.offset() {
            return None;
        }
        let (k, v) = self.front.element();
        self.front.move_forward();
        Some((k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front.offset() == self.back.offset() {
            return None;
        }
        self.back.move_backward();
        let (k, v) = self.back.element();
        Some((k, v))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.back.offset() - self.front.offset()
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self { front: self.front.clone(), back: self.back.clone() }
    }
}

impl<K, V> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("offset", &self.front.offset()).field("remaining", &self.len()).finish()
    }
}
