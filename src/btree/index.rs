use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;

use super::{BTree, Iter};
use crate::KeySelector;
use crate::raw::{StrongPath, TreePath, WeakPath};

/// A position in a [`BTree`] that does not keep the tree alive.
///
/// An index refers to the nodes of one version of a tree. It stays valid until that tree is edited,
/// and every method that takes an index panics when given one that belongs to another tree or to an
/// older version of this one. Indices of the same tree compare by offset.
///
/// # Examples
///
/// ```
/// use cow_btree::{BTree, KeySelector};
///
/// let tree: BTree<_, _> = (0..100).map(|i| (i, i * 2)).collect();
/// let index = tree.index_of_key(&40, KeySelector::Any).unwrap();
/// assert_eq!(tree.offset_of_index(&index), 40);
///
/// let next = tree.index_after(&index);
/// assert_eq!(tree.element_at_index(&next), (&41, &82));
/// assert!(index < next);
/// ```
pub struct Index<K, V> {
    pub(super) path: WeakPath<K, V>,
}

impl<K, V> Index<K, V> {
    fn offset(&self) -> usize {
        self.path.offset()
    }
}

impl<K, V> Clone for Index<K, V> {
    fn clone(&self) -> Self {
        Self { path: self.path.clone() }
    }
}

impl<K, V> fmt::Debug for Index<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index").field("offset", &self.offset()).finish()
    }
}

impl<K, V> PartialEq for Index<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K, V> Eq for Index<K, V> {}

impl<K, V> PartialOrd for Index<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, V> Ord for Index<K, V> {
    /// # Panics
    ///
    /// Panics if the indices belong to different trees.
    fn cmp(&self, other: &Self) -> Ordering {
        assert!(self.path.same_root(&other.path), "`Index::cmp()` - indices of different trees!");
        self.offset().cmp(&other.offset())
    }
}

impl<K, V> BTree<K, V> {
    /// Checks that `index` still belongs to this tree and returns a copy of its path.
    fn path_of(&self, index: &Index<K, V>) -> WeakPath<K, V> {
        index.path.expect_root(self.raw.root());
        index.path.clone()
    }

    /// Returns the index of the first element, or the end index if the tree is empty.
    pub fn start_index(&self) -> Index<K, V> {
        Index { path: WeakPath::at_start(self.raw.root()) }
    }

    /// Returns the index just past the last element.
    pub fn end_index(&self) -> Index<K, V> {
        Index { path: WeakPath::at_end(self.raw.root()) }
    }

    /// Returns the index of the element at `offset`, or the end index when `offset == len`.
    ///
    /// # Panics
    ///
    /// Panics if `offset > len`.
    pub fn index_at_offset(&self, offset: usize) -> Index<K, V> {
        assert!(offset <= self.len(), "`BTree::index_at_offset()` - `offset` > `len`!");
        Index { path: WeakPath::at_offset(self.raw.root(), offset) }
    }

    /// Returns the offset of the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree.
    ///
    /// # Complexity
    ///
    /// O(1)
    pub fn offset_of_index(&self, index: &Index<K, V>) -> usize {
        index.path.expect_root(self.raw.root());
        index.offset()
    }

    /// Returns the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree, or is the end index.
    pub fn element_at_index(&self, index: &Index<K, V>) -> (&K, &V) {
        let path = self.path_of(index);
        assert!(!path.is_at_end(), "`BTree::element_at_index()` - index is at the end!");
        let (k, v) = StrongPath::from_slots(self.raw.root(), &path).element();
        (k, v)
    }

    /// Returns the index following `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree, or is the end index.
    ///
    /// # Complexity
    ///
    /// Amortized O(1)
    pub fn index_after(&self, index: &Index<K, V>) -> Index<K, V> {
        let mut path = self.path_of(index);
        assert!(!path.is_at_end(), "`BTree::index_after()` - index is at the end!");
        path.move_forward();
        Index { path }
    }

    /// Returns the index preceding `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree, or is the start index.
    pub fn index_before(&self, index: &Index<K, V>) -> Index<K, V> {
        let mut path = self.path_of(index);
        assert!(!path.is_at_start(), "`BTree::index_before()` - index is at the start!");
        path.move_backward();
        Index { path }
    }

    /// Returns the index `n` positions away from `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree, or the result falls outside `0..=len`.
    pub fn index_offset_by(&self, index: &Index<K, V>, n: isize) -> Index<K, V> {
        let mut path = self.path_of(index);
        let offset = path
            .offset()
            .checked_add_signed(n)
            .filter(|&offset| offset <= self.len())
            .expect("`BTree::index_offset_by()` - offset out of bounds!");
        path.move_to_offset(offset);
        Index { path }
    }

    /// Returns the index `n` positions away from `index`, or `None` if getting there means moving
    /// past `limit`.
    ///
    /// A `limit` in the opposite direction of `n` has no effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let tree: BTree<_, _> = (0..10).map(|i| (i, ())).collect();
    /// let start = tree.start_index();
    /// let limit = tree.index_at_offset(5);
    /// assert_eq!(tree.index_offset_by_limited(&start, 5, &limit), Some(limit.clone()));
    /// assert_eq!(tree.index_offset_by_limited(&start, 6, &limit), None);
    /// assert!(tree.index_offset_by_limited(&limit, -5, &tree.end_index()).is_some());
    /// ```
    pub fn index_offset_by_limited(&self, index: &Index<K, V>, n: isize, limit: &Index<K, V>) -> Option<Index<K, V>> {
        let (start, limit) = (self.offset_of_index(index), self.offset_of_index(limit));
        let target = start.checked_add_signed(n)?;
        let passes = if n >= 0 { start <= limit && target > limit } else { limit <= start && target < limit };
        if passes {
            return None;
        }
        Some(self.index_offset_by(index, n))
    }

    /// Returns the number of positions from `start` to `end`, negative when `end` comes first.
    ///
    /// # Panics
    ///
    /// Panics if either index is not a valid index of this tree.
    #[allow(clippy::cast_possible_wrap)]
    pub fn distance(&self, start: &Index<K, V>, end: &Index<K, V>) -> isize {
        self.offset_of_index(end) as isize - self.offset_of_index(start) as isize
    }

    /// Returns an iterator over the elements from `index` to the end.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree.
    pub fn iter_from_index(&self, index: &Index<K, V>) -> Iter<'_, K, V> {
        index.path.expect_root(self.raw.root());
        Iter { front: StrongPath::from_slots(self.raw.root(), &index.path), back: StrongPath::at_end(self.raw.root()) }
    }
}

impl<K: Ord, V> BTree<K, V> {
    /// Returns the index of the element chosen by `key` and `selector`, or `None` if there is no such
    /// element.
    ///
    /// For [`KeySelector::After`] this is the index of the first element with a greater key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn index_of_key<Q>(&self, key: &Q, selector: KeySelector) -> Option<Index<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let path = WeakPath::at_key(self.raw.root(), key, selector);
        if path.is_at_end() {
            return None;
        }
        if selector != KeySelector::After {
            let matched = path.with_element(|(k, _)| {
                let k: &Q = k.borrow();
                k == key
            });
            if !matched {
                return None;
            }
        }
        Some(Index { path })
    }

    /// Returns the index at which an element with `key` would be inserted.
    ///
    /// [`KeySelector::First`] points before any elements with an equal key, [`KeySelector::Last`] and
    /// [`KeySelector::After`] point after them, and [`KeySelector::Any`] points at any of them.
    pub fn index_for_inserting<Q>(&self, key: &Q, selector: KeySelector) -> Index<K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let selector = if selector == KeySelector::Last { KeySelector::After } else { selector };
        Index { path: WeakPath::at_key(self.raw.root(), key, selector) }
    }
}

impl<K: Clone, V: Clone> BTree<K, V> {
    /// Removes and returns the element at `index`. Every index of the tree becomes invalid.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid index of this tree, or is the end index.
    pub fn remove_at_index(&mut self, index: Index<K, V>) -> (K, V) {
        let offset = self.offset_of_index(&index);
        assert!(offset < self.len(), "`BTree::remove_at_index()` - index is at the end!");
        drop(index);
        self.raw.remove_at(offset)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn tree() -> BTree<u32, char> {
        let mut tree = BTree::with_order(4);
        for (i, c) in (0u32..).zip("abcdefghij".chars()) {
            tree.insert((i / 2, c), KeySelector::Last);
        }
        tree
    }

    #[test]
    fn key_indices_pick_among_duplicates() {
        let tree = tree();
        let first = tree.index_of_key(&2, KeySelector::First).unwrap();
        let last = tree.index_of_key(&2, KeySelector::Last).unwrap();
        let after = tree.index_of_key(&2, KeySelector::After).unwrap();
        assert_eq!(tree.element_at_index(&first), (&2, &'e'));
        assert_eq!(tree.element_at_index(&last), (&2, &'f'));
        assert_eq!(tree.element_at_index(&after), (&3, &'g'));
        assert_eq!(tree.distance(&first, &after), 2);
        assert!(tree.index_of_key(&9, KeySelector::Any).is_none());
        assert!(tree.index_of_key(&4, KeySelector::After).is_none());
    }

    #[test]
    fn insertion_indices() {
        let tree = tree();
        assert_eq!(tree.offset_of_index(&tree.index_for_inserting(&2, KeySelector::First)), 4);
        assert_eq!(tree.offset_of_index(&tree.index_for_inserting(&2, KeySelector::Last)), 6);
        assert_eq!(tree.offset_of_index(&tree.index_for_inserting(&7, KeySelector::Any)), 10);
    }

    #[test]
    fn walking_indices_both_ways() {
        let tree = tree();
        let mut index = tree.start_index();
        let mut keys = Vec::new();
        while index != tree.end_index() {
            keys.push(*tree.element_at_index(&index).0);
            index = tree.index_after(&index);
        }
        assert_eq!(keys, [0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        let back = tree.index_offset_by(&index, -10);
        assert_eq!(back, tree.start_index());
        assert_eq!(tree.index_before(&tree.index_at_offset(3)), tree.index_at_offset(2));
        let values: Vec<char> = tree.iter_from_index(&tree.index_at_offset(7)).map(|(_, v)| *v).collect();
        assert_eq!(values, ['h', 'i', 'j']);
    }

    #[test]
    fn removing_by_index() {
        let mut tree = tree();
        let index = tree.index_of_key(&3, KeySelector::Last).unwrap();
        assert_eq!(tree.remove_at_index(index), (3, 'h'));
        assert_eq!(tree.len(), 9);
    }

    #[test]
    #[should_panic(expected = "`WeakPath::expect_root()` - index belongs to a different or mutated tree!")]
    fn edits_invalidate_indices() {
        let mut tree = tree();
        let index = tree.index_at_offset(3);
        tree.insert((9, 'z'), KeySelector::Any);
        let _ = tree.offset_of_index(&index);
    }

    #[test]
    #[should_panic(expected = "`Index::cmp()` - indices of different trees!")]
    fn indices_of_different_trees_do_not_compare() {
        let (a, b) = (tree(), tree());
        let _ = a.start_index() < b.start_index();
    }

    #[test]
    #[should_panic(expected = "`BTree::index_offset_by()` - offset out of bounds!")]
    fn offset_past_the_end_panics() {
        let tree = tree();
        let _ = tree.index_offset_by(&tree.start_index(), 11);
    }
}
