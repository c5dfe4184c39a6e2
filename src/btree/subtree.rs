use core::borrow::Borrow;
use core::ops::RangeBounds;

use super::{BTree, Index, offset_range};
use crate::KeySelector;
use crate::raw::{StrongPath, TreePath};

// Subtrees share every node they do not cut through with the tree they come from, so each of these
// takes logarithmic time and leaves `self` untouched.
impl<K: Clone, V: Clone> BTree<K, V> {
    fn subtree(&self, start: usize, end: usize) -> Self {
        Self::from_raw(self.raw.subtree(start, end))
    }

    /// Returns a tree of the first `n` elements, or of every element if there are fewer.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let tree: BTree<_, _> = (0..100).map(|i| (i, i)).collect();
    /// assert_eq!(tree.prefix(10).last(), Some((&9, &9)));
    /// assert_eq!(tree.suffix(10).first(), Some((&90, &90)));
    /// assert_eq!(tree.prefix(1000).len(), 100);
    /// ```
    #[must_use]
    pub fn prefix(&self, n: usize) -> Self {
        Self::from_raw(self.raw.prefix(n))
    }

    /// Returns a tree of the last `n` elements, or of every element if there are fewer.
    #[must_use]
    pub fn suffix(&self, n: usize) -> Self {
        Self::from_raw(self.raw.suffix(n))
    }

    /// Returns a tree without the first `n` elements.
    #[must_use]
    pub fn drop_first(&self, n: usize) -> Self {
        Self::from_raw(self.raw.suffix(self.len().saturating_sub(n)))
    }

    /// Returns a tree without the last `n` elements.
    #[must_use]
    pub fn drop_last(&self, n: usize) -> Self {
        Self::from_raw(self.raw.prefix(self.len().saturating_sub(n)))
    }

    /// Returns a tree of the elements before `end`.
    ///
    /// # Panics
    ///
    /// Panics if `end` is not a valid index of this tree.
    #[must_use]
    pub fn prefix_up_to_index(&self, end: &Index<K, V>) -> Self {
        self.prefix(self.offset_of_index(end))
    }

    /// Returns a tree of the elements up to and including the one at `end`.
    ///
    /// # Panics
    ///
    /// Panics if `end` is not a valid index of this tree, or is the end index.
    #[must_use]
    pub fn prefix_through_index(&self, end: &Index<K, V>) -> Self {
        let offset = self.offset_of_index(end);
        assert!(offset < self.len(), "`BTree::prefix_through_index()` - index is at the end!");
        self.prefix(offset + 1)
    }

    /// Returns a tree of the elements from `start` on.
    ///
    /// # Panics
    ///
    /// Panics if `start` is not a valid index of this tree.
    #[must_use]
    pub fn suffix_from_index(&self, start: &Index<K, V>) -> Self {
        self.subtree(self.offset_of_index(start), self.len())
    }

    /// Returns a tree of the elements from `start` up to, but not including, `end`.
    ///
    /// # Panics
    ///
    /// Panics if either index is not a valid index of this tree, or `end` comes before `start`.
    #[must_use]
    pub fn subtree_indices(&self, start: &Index<K, V>, end: &Index<K, V>) -> Self {
        self.subtree(self.offset_of_index(start), self.offset_of_index(end))
    }

    /// Returns a tree of the elements at the offsets in `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or reaches past `len`.
    #[must_use]
    pub fn subtree_offsets(&self, range: impl RangeBounds<usize>) -> Self {
        let (start, end) = offset_range(range, self.len());
        self.subtree(start, end)
    }
}

impl<K: Ord + Clone, V: Clone> BTree<K, V> {
    // The offset of the first element whose key is not below `key`, or not above it with `After`.
    fn offset_for<Q>(&self, key: &Q, selector: KeySelector) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        StrongPath::at_key(self.raw.root(), key, selector).offset()
    }

    /// Returns a tree of the elements whose keys are less than `end`.
    #[must_use]
    pub fn prefix_up_to_key<Q>(&self, end: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.prefix(self.offset_for(end, KeySelector::First))
    }

    /// Returns a tree of the elements whose keys are less than or equal to `end`.
    #[must_use]
    pub fn prefix_through_key<Q>(&self, end: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.prefix(self.offset_for(end, KeySelector::After))
    }

    /// Returns a tree of the elements whose keys are greater than or equal to `start`.
    #[must_use]
    pub fn suffix_from_key<Q>(&self, start: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.subtree(self.offset_for(start, KeySelector::First), self.len())
    }

    /// Returns a tree of the elements with keys in `start..end`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cow_btree::BTree;
    ///
    /// let tree: BTree<_, _> = [(1, 'a'), (2, 'b'), (2, 'c'), (3, 'd'), (4, 'e')].into_iter().collect();
    /// let values = |tree: BTree<_, _>| tree.iter().map(|(_, v)| *v).collect::<String>();
    /// assert_eq!(values(tree.subtree_keys(&2, &4)), "bcd");
    /// assert_eq!(values(tree.subtree_keys_inclusive(&2, &4)), "bcde");
    /// ```
    #[must_use]
    pub fn subtree_keys<Q>(&self, start: &Q, end: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        assert!(start <= end, "`BTree::subtree_keys()` - `start` > `end`!");
        self.subtree(self.offset_for(start, KeySelector::First), self.offset_for(end, KeySelector::First))
    }

    /// Returns a tree of the elements with keys in `start..=end`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[must_use]
    pub fn subtree_keys_inclusive<Q>(&self, start: &Q, end: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        assert!(start <= end, "`BTree::subtree_keys_inclusive()` - `start` > `end`!");
        self.subtree(self.offset_for(start, KeySelector::First), self.offset_for(end, KeySelector::After))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    fn keys(tree: &BTree<u32, ()>) -> Vec<u32> {
        tree.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn index_bounds() {
        let tree: BTree<u32, ()> = (0..50).map(|i| (i, ())).collect();
        let (start, end) = (tree.index_at_offset(10), tree.index_at_offset(20));
        assert_eq!(keys(&tree.subtree_indices(&start, &end)), (10..20).collect::<Vec<_>>());
        assert_eq!(keys(&tree.prefix_up_to_index(&end)), (0..20).collect::<Vec<_>>());
        assert_eq!(keys(&tree.prefix_through_index(&end)), (0..21).collect::<Vec<_>>());
        assert_eq!(keys(&tree.suffix_from_index(&end)), (20..50).collect::<Vec<_>>());
    }

    #[test]
    fn dropping_more_than_len_empties() {
        let tree: BTree<u32, ()> = (0..5).map(|i| (i, ())).collect();
        assert!(tree.drop_first(9).is_empty());
        assert!(tree.drop_last(5).is_empty());
        assert_eq!(keys(&tree.drop_first(2)), [2, 3, 4]);
        assert_eq!(tree.drop_first(2).order(), tree.order());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn key_bounds_match_model(
            order in 3usize..8,
            mut input in proptest::collection::vec(0u32..60, 0..150),
            a in 0u32..60,
            b in 0u32..60,
        ) {
            input.sort_unstable();
            let mut tree: BTree<u32, ()> = BTree::with_order(order);
            tree.extend(input.iter().map(|&k| (k, ())));
            let (lo, hi) = (a.min(b), a.max(b));
            let filter = |pred: &dyn Fn(u32) -> bool| input.iter().copied().filter(|&k| pred(k)).collect::<Vec<_>>();

            let checks = [
                (tree.prefix_up_to_key(&hi), filter(&|k| k < hi)),
                (tree.prefix_through_key(&hi), filter(&|k| k <= hi)),
                (tree.suffix_from_key(&lo), filter(&|k| k >= lo)),
                (tree.subtree_keys(&lo, &hi), filter(&|k| lo <= k && k < hi)),
                (tree.subtree_keys_inclusive(&lo, &hi), filter(&|k| lo <= k && k <= hi)),
                (tree.subtree_offsets(lo as usize % (input.len() + 1)..), input[lo as usize % (input.len() + 1)..].to_vec()),
            ];
            for (subtree, expected) in checks {
                subtree.raw.root().validate_invariants();
                prop_assert_eq!(keys(&subtree), expected);
            }
        }
    }
}
