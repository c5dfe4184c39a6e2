use alloc::vec::Vec;

use tracing::debug;

use super::BTree;
use crate::raw::{Builder, RawBTree};

/// Options for bulk-loading a [`BTree`].
///
/// # Examples
///
/// ```
/// use cow_btree::{BTree, LoadOptions};
///
/// let options = LoadOptions::new().order(16).fill_factor(0.75).drop_duplicates(true);
/// let tree = BTree::from_sorted_iter_with([(1, 'a'), (1, 'b'), (2, 'c')], options);
/// assert_eq!(tree.order(), 16);
/// assert_eq!(tree.iter().collect::<Vec<_>>(), [(&1, &'b'), (&2, &'c')]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadOptions {
    order: Option<usize>,
    fill_factor: f64,
    drop_duplicates: bool,
}

impl LoadOptions {
    /// Returns the default options: the default order for the element type, completely filled nodes,
    /// and duplicate keys kept.
    #[must_use]
    pub const fn new() -> Self {
        Self { order: None, fill_factor: 1.0, drop_duplicates: false }
    }

    /// Sets the maximum number of children of a node.
    ///
    /// # Panics
    ///
    /// Panics if `order` is less than 3.
    #[must_use]
    pub fn order(mut self, order: usize) -> Self {
        assert!(order >= 3, "`LoadOptions::order()` - `order` < 3!");
        self.order = Some(order);
        self
    }

    /// Sets how full the loaded nodes are, as a fraction of their capacity. Lower fill factors leave
    /// room for later inserts.
    ///
    /// # Panics
    ///
    /// Panics if `fill_factor` is outside `0.5..=1.0`.
    #[must_use]
    pub fn fill_factor(mut self, fill_factor: f64) -> Self {
        assert!(
            (0.5..=1.0).contains(&fill_factor),
            "`LoadOptions::fill_factor()` - `fill_factor` is outside 0.5..=1.0!"
        );
        self.fill_factor = fill_factor;
        self
    }

    /// Sets whether a run of elements with equal keys is reduced to its last element.
    #[must_use]
    pub const fn drop_duplicates(mut self, drop_duplicates: bool) -> Self {
        self.drop_duplicates = drop_duplicates;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> BTree<K, V> {
    /// Builds a tree from elements sorted by key, with completely filled nodes.
    ///
    /// # Panics
    ///
    /// Panics if the elements are not sorted by key.
    ///
    /// # Complexity
    ///
    /// O(n)
    pub fn from_sorted_iter(elements: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::from_sorted_iter_with(elements, LoadOptions::new())
    }

    /// Builds a tree from elements sorted by key.
    ///
    /// # Panics
    ///
    /// Panics if the elements are not sorted by key.
    ///
    /// # Complexity
    ///
    /// O(n)
    pub fn from_sorted_iter_with(elements: impl IntoIterator<Item = (K, V)>, options: LoadOptions) -> Self {
        let order = options.order.unwrap_or_else(Self::default_order);
        let mut builder = Builder::with_fill_factor(order, options.fill_factor);
        // With `drop_duplicates`, the latest element of the current run waits here until the run ends.
        let mut pending: Option<(K, V)> = None;
        for element in elements {
            let last = pending.as_ref().map(|(key, _)| key).or(builder.last_key());
            assert!(
                last.is_none_or(|last| *last <= element.0),
                "`BTree::from_sorted_iter_with()` - elements are not sorted!"
            );
            if !options.drop_duplicates {
                builder.append(element);
                continue;
            }
            match pending.replace(element) {
                Some(previous) if pending.as_ref().is_some_and(|(key, _)| *key == previous.0) => {}
                Some(previous) => builder.append(previous),
                None => {}
            }
        }
        if let Some(last) = pending {
            builder.append(last);
        }
        let root = builder.finish();
        debug!(len = root.len(), depth = root.depth(), order, "bulk load finished");
        Self::from_raw(RawBTree::from_root(root))
    }

    /// Builds a tree from elements in any order.
    ///
    /// The elements are sorted by key first; elements with equal keys keep their relative order.
    ///
    /// # Complexity
    ///
    /// O(n log n)
    pub fn from_iter_with(elements: impl IntoIterator<Item = (K, V)>, options: LoadOptions) -> Self {
        let mut elements: Vec<(K, V)> = elements.into_iter().collect();
        elements.sort_by(|a, b| a.0.cmp(&b.0));
        Self::from_sorted_iter_with(elements, options)
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for BTree<K, V> {
    /// Builds a tree with the default options. Elements with equal keys keep their relative order.
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_iter_with(iter, LoadOptions::new())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::KeySelector;
    use proptest::prelude::*;

    #[test]
    fn fill_factor_shapes_the_tree() {
        let full = BTree::from_sorted_iter_with((0..1000u32).map(|i| (i, ())), LoadOptions::new().order(8));
        let half = BTree::from_sorted_iter_with((0..1000u32).map(|i| (i, ())), LoadOptions::new().order(8).fill_factor(0.5));
        full.raw.root().validate_invariants();
        half.raw.root().validate_invariants();
        assert!(half.depth() >= full.depth());
        assert_eq!(full, half);
    }

    #[test]
    fn dropping_duplicates_keeps_the_last_of_each_run() {
        let elements = [(1, 'a'), (2, 'b'), (2, 'c'), (2, 'd'), (3, 'e'), (3, 'f')];
        let tree = BTree::from_sorted_iter_with(elements, LoadOptions::new().drop_duplicates(true));
        assert_eq!(tree.iter().map(|(_, v)| *v).collect::<alloc::string::String>(), "adf");
    }

    #[test]
    fn unsorted_input_is_sorted_stably() {
        let tree: BTree<u32, char> = [(3, 'a'), (1, 'b'), (3, 'c'), (1, 'd')].into_iter().collect();
        assert_eq!(tree.value_of(&1, KeySelector::First), Some(&'b'));
        assert_eq!(tree.value_of(&3, KeySelector::Last), Some(&'c'));
    }

    #[test]
    #[should_panic(expected = "`BTree::from_sorted_iter_with()` - elements are not sorted!")]
    fn unsorted_input_panics() {
        let _ = BTree::from_sorted_iter([(2, ()), (1, ())]);
    }

    #[test]
    #[should_panic(expected = "`LoadOptions::fill_factor()` - `fill_factor` is outside 0.5..=1.0!")]
    fn fill_factor_out_of_range_panics() {
        let _ = LoadOptions::new().fill_factor(0.4);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn bulk_load_matches_one_by_one_inserts(
            order in 3usize..10,
            fill in 0.5f64..=1.0,
            mut keys in proptest::collection::vec(0u32..100, 0..300),
        ) {
            keys.sort_unstable();
            let loaded = BTree::from_sorted_iter_with(
                keys.iter().enumerate().map(|(i, &k)| (k, i)),
                LoadOptions::new().order(order).fill_factor(fill),
            );
            let mut inserted = BTree::with_order(order);
            for (i, &k) in keys.iter().enumerate() {
                inserted.insert((k, i), KeySelector::Last);
            }
            loaded.raw.root().validate_invariants();
            prop_assert_eq!(loaded, inserted);
        }
    }
}
