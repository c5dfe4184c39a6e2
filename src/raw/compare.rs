use alloc::sync::Arc;
use core::cmp::Ordering;

use super::node::Node;
use super::path::TreePath;
use super::strong_path::{Limit, StrongPath};
use crate::MatchingStrategy;

/// Walks two trees side by side to compare their contents.
///
/// Subtrees that both walks reach at the same slot of the same node are identical from there on, so
/// the walks jump over them together. Comparing a tree against a lightly edited copy of itself only
/// visits the nodes on the edited paths.
pub(crate) struct Comparator<'a, K, V> {
    a: StrongPath<'a, K, V>,
    b: StrongPath<'a, K, V>,
    /// The number of loop iterations spent so far.
    pub(crate) steps: usize,
}

impl<'a, K, V> Comparator<'a, K, V> {
    pub(crate) fn new(first: &'a Arc<Node<K, V>>, second: &'a Arc<Node<K, V>>) -> Self {
        Self { a: StrongPath::at_start(first), b: StrongPath::at_start(second), steps: 0 }
    }

    fn same_position(&self) -> bool {
        Arc::ptr_eq(self.a.node_handle(), self.b.node_handle()) && self.a.slot() == self.b.slot()
    }

    // Moves both walks past the subtree they share, returning the last element skipped.
    fn skip_shared(&mut self) -> &'a (K, V) {
        let mut last;
        loop {
            let node: &'a Arc<Node<K, V>> = self.a.node_handle();
            last = node.last().expect("`Comparator::skip_shared()` - empty node!");
            self.a.ascend_one_level();
            self.b.ascend_one_level();
            self.steps += 1;
            if self.a.is_at_end() || self.b.is_at_end() || !self.same_position() {
                break;
            }
        }
        if !self.a.is_at_end() {
            self.a.ascend_to_key();
        }
        if !self.b.is_at_end() {
            self.b.ascend_to_key();
        }
        last
    }

    /// Returns true if both trees hold equal elements in the same order.
    pub(crate) fn elements_equal_by(&mut self, mut eq: impl FnMut(&(K, V), &(K, V)) -> bool) -> bool {
        if self.a.count() != self.b.count() {
            return false;
        }
        // Both walks stay at the same offset, so they reach the end together.
        while !self.a.is_at_end() {
            self.steps += 1;
            if self.same_position() {
                self.skip_shared();
                continue;
            }
            if !eq(self.a.element(), self.b.element()) {
                return false;
            }
            self.a.move_forward();
            self.b.move_forward();
        }
        true
    }
}

impl<K: Ord, V> Comparator<'_, K, V> {
    /// Returns true if no key occurs in both trees.
    pub(crate) fn is_disjoint(&mut self) -> bool {
        while !self.a.is_at_end() && !self.b.is_at_end() {
            self.steps += 1;
            let (a, b) = (self.a.key(), self.b.key());
            match a.cmp(b) {
                Ordering::Less => {
                    self.a.next_part(&Limit::Excluding(b));
                }
                Ordering::Greater => {
                    self.b.next_part(&Limit::Excluding(a));
                }
                Ordering::Equal => return false,
            }
        }
        true
    }

    /// Returns true if every element of the first tree is matched in the second.
    pub(crate) fn is_subset(&mut self, strategy: MatchingStrategy) -> bool {
        if self.a.count() > self.b.count() && strategy == MatchingStrategy::Counting {
            return false;
        }
        while !self.a.is_at_end() {
            if self.b.is_at_end() {
                return false;
            }
            self.steps += 1;
            let (a, b) = (self.a.key(), self.b.key());
            match a.cmp(b) {
                Ordering::Less => return false,
                Ordering::Greater => {
                    self.b.next_part(&Limit::Excluding(a));
                }
                Ordering::Equal if self.same_position() => {
                    let (key, _) = self.skip_shared();
                    if strategy == MatchingStrategy::Grouping {
                        self.skip_key(key);
                    }
                }
                Ordering::Equal => match strategy {
                    MatchingStrategy::Grouping => self.skip_key(a),
                    MatchingStrategy::Counting => {
                        self.a.move_forward();
                        self.b.move_forward();
                    }
                },
            }
        }
        true
    }

    // Skips every element with keys up to `key` in both walks.
    fn skip_key(&mut self, key: &K) {
        let limit = Limit::Including(key);
        while !self.a.is_at_end() && limit.matches(self.a.key()) {
            self.a.next_part(&limit);
        }
        while !self.b.is_at_end() && limit.matches(self.b.key()) {
            self.b.next_part(&limit);
        }
    }
}

pub(crate) fn elements_equal_by<K, V>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    eq: impl FnMut(&(K, V), &(K, V)) -> bool,
) -> bool {
    Arc::ptr_eq(first, second) || Comparator::new(first, second).elements_equal_by(eq)
}

pub(crate) fn is_disjoint<K: Ord, V>(first: &Arc<Node<K, V>>, second: &Arc<Node<K, V>>) -> bool {
    if Arc::ptr_eq(first, second) {
        return first.len() == 0;
    }
    Comparator::new(first, second).is_disjoint()
}

pub(crate) fn is_subset<K: Ord, V>(first: &Arc<Node<K, V>>, second: &Arc<Node<K, V>>, strategy: MatchingStrategy) -> bool {
    Arc::ptr_eq(first, second) || Comparator::new(first, second).is_subset(strategy)
}

/// Returns true if the first tree is a subset of the second but the two are not equivalent.
pub(crate) fn is_strict_subset<K: Ord, V>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    strategy: MatchingStrategy,
) -> bool {
    if Arc::ptr_eq(first, second) || !is_subset(first, second, strategy) {
        return false;
    }
    match strategy {
        MatchingStrategy::Grouping => !is_subset(second, first, strategy),
        MatchingStrategy::Counting => first.len() < second.len(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::raw::Builder;
    use crate::raw::CursorPath;
    use crate::raw::node::tests::sequential;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    fn build(order: usize, keys: &[u32]) -> Arc<Node<u32, u32>> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        let mut builder = Builder::new(order);
        for key in keys {
            builder.append((key, 0));
        }
        builder.finish()
    }

    fn count(keys: &[u32], key: u32) -> usize {
        keys.iter().filter(|&&k| k == key).count()
    }

    fn model_subset(a: &[u32], b: &[u32], strategy: MatchingStrategy) -> bool {
        a.iter().all(|&k| match strategy {
            MatchingStrategy::Grouping => b.contains(&k),
            MatchingStrategy::Counting => count(a, k) <= count(b, k),
        })
    }

    #[test]
    fn equal_contents_with_different_shapes() {
        let a = sequential(4, 300);
        let b = sequential(7, 300);
        // Orders differ, so nothing is shared and every element gets compared.
        assert!(elements_equal_by(&a, &b, |x, y| x == y));
        let c = sequential(7, 299);
        assert!(!elements_equal_by(&a, &c, |x, y| x == y));
    }

    #[test]
    fn one_edit_compares_in_logarithmic_steps() {
        let a = sequential(4, 10_000);
        let mut cursor = CursorPath::at_offset(Arc::clone(&a), 6_789);
        cursor.set_value(0);
        let b = cursor.finish();

        let mut comparator = Comparator::new(&a, &b);
        assert!(!comparator.elements_equal_by(|x, y| x == y));
        assert!(comparator.steps < 400, "{} steps", comparator.steps);

        let mut comparator = Comparator::new(&a, &b);
        assert!(comparator.elements_equal_by(|x, y| x.0 == y.0));
        assert!(comparator.steps < 400, "{} steps", comparator.steps);

        let mut comparator = Comparator::new(&a, &b);
        assert!(comparator.is_subset(MatchingStrategy::Counting));
        assert!(comparator.steps < 400, "{} steps", comparator.steps);
    }

    #[test]
    fn strict_subsets() {
        let a = build(4, &[1, 2, 2, 3]);
        let b = build(4, &[1, 2, 3]);
        assert!(is_subset(&a, &b, MatchingStrategy::Grouping));
        assert!(!is_strict_subset(&a, &b, MatchingStrategy::Grouping));
        assert!(!is_subset(&a, &b, MatchingStrategy::Counting));
        assert!(is_strict_subset(&b, &a, MatchingStrategy::Counting));
        assert!(!is_strict_subset(&a, &a, MatchingStrategy::Counting));
    }

    #[test]
    fn disjoint_trees() {
        let a = build(4, &[1, 3, 5, 7]);
        let b = build(4, &[2, 4, 6, 8]);
        assert!(is_disjoint(&a, &b));
        assert!(!is_disjoint(&a, &build(4, &[0, 7])));
        assert!(!is_disjoint(&a, &a));
        let empty = build(4, &[]);
        assert!(is_disjoint(&empty, &empty));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn comparisons_match_model(
            order in 3usize..7,
            a in proptest::collection::vec(0u32..40, 0..80),
            b in proptest::collection::vec(0u32..40, 0..80),
        ) {
            let (ta, tb) = (build(order, &a), build(order, &b));
            let mut sa = a.clone();
            let mut sb = b.clone();
            sa.sort_unstable();
            sb.sort_unstable();
            prop_assert_eq!(elements_equal_by(&ta, &tb, |x, y| x == y), sa == sb);
            prop_assert_eq!(is_disjoint(&ta, &tb), !a.iter().any(|k| b.contains(k)));
            for strategy in [MatchingStrategy::Grouping, MatchingStrategy::Counting] {
                prop_assert_eq!(is_subset(&ta, &tb, strategy), model_subset(&a, &b, strategy));
                prop_assert_eq!(is_subset(&tb, &ta, strategy), model_subset(&b, &a, strategy));
            }
        }

        #[test]
        fn shared_structure_does_not_change_answers(order in 3usize..7, n in 1u32..500, removed in proptest::collection::vec(0u32..500, 0..6)) {
            let a = sequential(order, n);
            let mut cursor = CursorPath::at_start(Arc::clone(&a));
            for key in &removed {
                cursor.move_to_key(key, crate::KeySelector::First);
                if !cursor.is_at_end() && cursor.element().0 == *key {
                    cursor.remove();
                }
            }
            let b = cursor.finish();
            let (va, vb): (Vec<u32>, Vec<u32>) = (a.to_vec().into_iter().map(|(k, _)| k).collect(), b.to_vec().into_iter().map(|(k, _)| k).collect());
            prop_assert_eq!(elements_equal_by(&a, &b, |x, y| x == y), va == vb);
            for strategy in [MatchingStrategy::Grouping, MatchingStrategy::Counting] {
                prop_assert!(is_subset(&b, &a, strategy));
                prop_assert_eq!(is_subset(&a, &b, strategy), va == vb);
                prop_assert_eq!(is_strict_subset(&b, &a, strategy), va != vb);
            }
        }
    }
}
