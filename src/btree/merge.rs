use core::borrow::Borrow;

use super::BTree;
use crate::MatchingStrategy;
use crate::raw::{self, RawBTree};

/// Set algebra over trees of the same order.
///
/// The merges walk both trees in key order and link whole subtrees into the result whenever a run of
/// one tree falls entirely between two keys of the other. Subtrees the two trees share by reference
/// are recognized and handled in one step. Merging a tree with a lightly edited copy of itself is
/// therefore far cheaper than a full walk.
///
/// Under [`MatchingStrategy::Grouping`], a key found in both trees contributes the elements of `self`.
///
/// # Panics
///
/// Every binary merge panics if the trees have different orders.
impl<K: Ord + Clone, V: Clone> BTree<K, V> {
    /// Returns a tree of the elements of both trees.
    ///
    /// Under [`MatchingStrategy::Counting`] every element is kept, with those of `self` coming first
    /// among equal keys.
    ///
    /// # Complexity
    ///
    /// O(n + m) in general; O(log(n + m)) when the trees' key ranges do not interleave.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::{BTree, MatchingStrategy};
    ///
    /// let a: BTree<_, _> = [(1, 'a'), (3, 'c'), (5, 'e')].into_iter().collect();
    /// let b: BTree<_, _> = [(2, 'b'), (3, 'x'), (4, 'd')].into_iter().collect();
    ///
    /// let grouped = a.union(&b, MatchingStrategy::Grouping);
    /// assert_eq!(grouped.iter().map(|(_, v)| *v).collect::<String>(), "abcde");
    ///
    /// let counted = a.union(&b, MatchingStrategy::Counting);
    /// assert_eq!(counted.iter().map(|(_, v)| *v).collect::<String>(), "abcxde");
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self, strategy: MatchingStrategy) -> Self {
        Self::from_raw(RawBTree::from_root(raw::union(self.raw.root(), other.raw.root(), strategy)))
    }

    /// Returns a tree of the elements of `self` that are not matched in `other`.
    ///
    /// Under [`MatchingStrategy::Counting`] each element of `other` cancels out one element of `self`
    /// with an equal key.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::{BTree, MatchingStrategy};
    ///
    /// let a: BTree<_, _> = [(1, ()), (2, ()), (2, ()), (3, ())].into_iter().collect();
    /// let b: BTree<_, _> = [(2, ())].into_iter().collect();
    /// assert_eq!(a.subtracting(&b, MatchingStrategy::Grouping).len(), 2);
    /// assert_eq!(a.subtracting(&b, MatchingStrategy::Counting).len(), 3);
    /// ```
    #[must_use]
    pub fn subtracting(&self, other: &Self, strategy: MatchingStrategy) -> Self {
        Self::from_raw(RawBTree::from_root(raw::subtracting(self.raw.root(), other.raw.root(), strategy)))
    }

    /// Returns a tree of the elements of either tree that are not matched in the other.
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self, strategy: MatchingStrategy) -> Self {
        Self::from_raw(RawBTree::from_root(raw::symmetric_difference(self.raw.root(), other.raw.root(), strategy)))
    }

    /// Returns a tree of the elements of `self` that are matched in `other`.
    ///
    /// Under [`MatchingStrategy::Counting`] a key keeps as many elements of `self` as it has in
    /// `other`, starting from the first.
    #[must_use]
    pub fn intersection(&self, other: &Self, strategy: MatchingStrategy) -> Self {
        Self::from_raw(RawBTree::from_root(raw::intersection(self.raw.root(), other.raw.root(), strategy)))
    }

    /// Returns a tree of the elements whose keys do not appear in `keys`.
    ///
    /// Under [`MatchingStrategy::Counting`] each key in `keys` removes at most one element.
    ///
    /// # Panics
    ///
    /// Panics if `keys` is not sorted.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::{BTree, MatchingStrategy};
    ///
    /// let tree: BTree<_, _> = (0..10).map(|i| (i, ())).collect();
    /// let odd = tree.subtracting_sorted_keys((0..10).step_by(2), MatchingStrategy::Grouping);
    /// assert_eq!(odd.iter().map(|(k, _)| *k).collect::<Vec<_>>(), [1, 3, 5, 7, 9]);
    /// ```
    #[must_use]
    pub fn subtracting_sorted_keys<I>(&self, keys: I, strategy: MatchingStrategy) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        Self::from_raw(RawBTree::from_root(raw::subtracting_sorted_keys(self.raw.root(), keys, strategy)))
    }

    /// Returns a tree of the elements whose keys appear in `keys`.
    ///
    /// Under [`MatchingStrategy::Counting`] each key in `keys` keeps at most one element.
    ///
    /// # Panics
    ///
    /// Panics if `keys` is not sorted.
    #[must_use]
    pub fn intersection_sorted_keys<I>(&self, keys: I, strategy: MatchingStrategy) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<K>,
    {
        Self::from_raw(RawBTree::from_root(raw::intersection_sorted_keys(self.raw.root(), keys, strategy)))
    }
}

impl<K, V> BTree<K, V> {
    /// Returns true if both trees hold the same elements in the same order, using `eq` to compare
    /// elements.
    ///
    /// Subtrees shared by both trees are skipped without looking at their elements.
    ///
    /// # Complexity
    ///
    /// O(n) in general; O(log n) when the trees differ in a single path.
    pub fn elements_equal_by(&self, other: &Self, mut eq: impl FnMut((&K, &V), (&K, &V)) -> bool) -> bool {
        raw::elements_equal_by(self.raw.root(), other.raw.root(), |(ak, av), (bk, bv)| eq((ak, av), (bk, bv)))
    }

    /// Returns true if both trees hold equal elements in the same order.
    pub fn elements_equal(&self, other: &Self) -> bool
    where
        K: PartialEq,
        V: PartialEq,
    {
        self.elements_equal_by(other, |a, b| a == b)
    }
}

impl<K: Ord, V> BTree<K, V> {
    /// Returns true if no key appears in both trees.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let evens: BTree<_, _> = (0..10).step_by(2).map(|i| (i, ())).collect();
    /// let odds: BTree<_, _> = (1..10).step_by(2).map(|i| (i, ())).collect();
    /// assert!(evens.is_disjoint(&odds));
    /// assert!(!evens.is_disjoint(&evens));
    /// ```
    pub fn is_disjoint(&self, other: &Self) -> bool {
        raw::is_disjoint(self.raw.root(), other.raw.root())
    }

    /// Returns true if every element of `self` is matched in `other`.
    ///
    /// Under [`MatchingStrategy::Grouping`] only the keys matter. Under
    /// [`MatchingStrategy::Counting`] each key must occur in `other` at least as often as in `self`.
    pub fn is_subset(&self, other: &Self, strategy: MatchingStrategy) -> bool {
        raw::is_subset(self.raw.root(), other.raw.root(), strategy)
    }

    /// Returns true if `self` is a subset of `other` and `other` holds something `self` does not.
    pub fn is_strict_subset(&self, other: &Self, strategy: MatchingStrategy) -> bool {
        raw::is_strict_subset(self.raw.root(), other.raw.root(), strategy)
    }

    /// Returns true if every element of `other` is matched in `self`.
    pub fn is_superset(&self, other: &Self, strategy: MatchingStrategy) -> bool {
        other.is_subset(self, strategy)
    }

    /// Returns true if `other` is a strict subset of `self`.
    pub fn is_strict_superset(&self, other: &Self, strategy: MatchingStrategy) -> bool {
        other.is_strict_subset(self, strategy)
    }
}
