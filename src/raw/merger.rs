use alloc::sync::Arc;
use core::borrow::Borrow;

use tracing::{debug, trace};

use super::builder::Builder;
use super::node::Node;
use super::path::TreePath;
use super::strong_path::{Limit, StrongPath};
use crate::MatchingStrategy;

/// Which way a limit taken from the other tree's current key goes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RelativeLimit {
    IncludingOtherKey,
    ExcludingOtherKey,
}

impl RelativeLimit {
    fn with<K>(self, key: &K) -> Limit<'_, K> {
        match self {
            RelativeLimit::IncludingOtherKey => Limit::Including(key),
            RelativeLimit::ExcludingOtherKey => Limit::Excluding(key),
        }
    }
}

// Copies parts from `path` into `builder` while `limit` accepts them. Returns true at the end.
fn copy_while<'a, K: Ord + Clone, V: Clone>(
    path: &mut StrongPath<'a, K, V>,
    builder: &mut Builder<K, V>,
    limit: &Limit<'_, K>,
) -> bool {
    while !path.is_at_end() && limit.matches(path.key()) {
        builder.append_part(path.next_part(limit));
    }
    path.is_at_end()
}

// Skips parts of `path` while `limit` accepts them. Returns true at the end.
fn skip_while<K: Ord, V>(path: &mut StrongPath<'_, K, V>, limit: &Limit<'_, K>) -> bool {
    while !path.is_at_end() && limit.matches(path.key()) {
        path.next_part(limit);
    }
    path.is_at_end()
}

// True if both paths sit on the same slot of the same node.
fn same_position<K, V>(a: &StrongPath<'_, K, V>, b: &StrongPath<'_, K, V>) -> bool {
    Arc::ptr_eq(a.node_handle(), b.node_handle()) && a.slot() == b.slot()
}

/// Walks two trees of the same order in key order, feeding a builder with the parts a set operation
/// keeps.
///
/// Whenever both walks reach the start of a node they share, the whole shared subtree is linked or
/// skipped at once instead of element by element.
struct Merger<'a, K, V> {
    a: StrongPath<'a, K, V>,
    b: StrongPath<'a, K, V>,
    builder: Builder<K, V>,
    done: bool,
}

impl<'a, K: Ord + Clone, V: Clone> Merger<'a, K, V> {
    fn new(first: &'a Arc<Node<K, V>>, second: &'a Arc<Node<K, V>>) -> Self {
        assert_eq!(first.order(), second.order(), "`Merger::new()` - trees have different orders!");
        Self {
            a: StrongPath::at_start(first),
            b: StrongPath::at_start(second),
            builder: Builder::new(first.order()),
            done: first.len() == 0 || second.len() == 0,
        }
    }

    fn finish(self) -> Arc<Node<K, V>> {
        self.builder.finish()
    }

    fn append_first(&mut self) {
        if !self.a.is_at_end() {
            self.builder.append(self.a.element().clone());
            self.builder.append_node(self.a.suffix());
            self.a.move_to_end();
            self.done = true;
        }
    }

    fn append_second(&mut self) {
        if !self.b.is_at_end() {
            self.builder.append(self.b.element().clone());
            self.builder.append_node(self.b.suffix());
            self.b.move_to_end();
            self.done = true;
        }
    }

    fn copy_from_first(&mut self, limit: RelativeLimit) {
        if !self.b.is_at_end() {
            let key = self.b.key();
            self.done |= copy_while(&mut self.a, &mut self.builder, &limit.with(key));
        }
    }

    fn copy_from_second(&mut self, limit: RelativeLimit) {
        if !self.a.is_at_end() {
            let key = self.a.key();
            self.done |= copy_while(&mut self.b, &mut self.builder, &limit.with(key));
        }
    }

    fn skip_from_first(&mut self, limit: RelativeLimit) {
        if !self.b.is_at_end() {
            let key = self.b.key();
            self.done |= skip_while(&mut self.a, &limit.with(key));
        }
    }

    fn skip_from_second(&mut self, limit: RelativeLimit) {
        if !self.a.is_at_end() {
            let key = self.a.key();
            self.done |= skip_while(&mut self.b, &limit.with(key));
        }
    }

    // True if both walks are at the first element of the same leaf.
    fn at_shared_leaf_start(&self) -> bool {
        same_position(&self.a, &self.b) && self.a.node().is_leaf() && self.a.slot() == Some(0)
    }

    // Ascends both walks past the largest subtree they share, starting from a shared leaf. Returns it.
    fn ascend_shared(&mut self) -> &'a Arc<Node<K, V>> {
        loop {
            let common = self.a.node_handle();
            self.a.ascend_one_level();
            self.b.ascend_one_level();
            if self.a.is_at_end()
                || self.b.is_at_end()
                || !same_position(&self.a, &self.b)
                || self.a.slot() != Some(0)
            {
                trace!(len = common.len(), depth = common.depth(), "merger reached a shared subtree");
                return common;
            }
        }
    }

    fn ascend_to_keys(&mut self) {
        if !self.a.is_at_end() {
            self.a.ascend_to_key();
        }
        if !self.b.is_at_end() {
            self.b.ascend_to_key();
        }
    }

    /// Copies runs of equal keys from the first tree and skips them in the second.
    fn copy_common_elements_from_first(&mut self) {
        while !self.done && self.a.key() == self.b.key() {
            if self.at_shared_leaf_start() {
                let common = self.ascend_shared();
                let (key, _) = common.last().expect("`Merger::copy_common_elements_from_first()` - empty node!");
                self.builder.append_node(Arc::clone(common));
                self.ascend_to_keys();
                let limit = Limit::Including(key);
                copy_while(&mut self.a, &mut self.builder, &limit);
                skip_while(&mut self.b, &limit);
            } else {
                // Matching elements must not be left behind in either tree, even at the end of the other.
                let limit = Limit::Including(self.a.key());
                copy_while(&mut self.a, &mut self.builder, &limit);
                skip_while(&mut self.b, &limit);
            }
            self.done = self.a.is_at_end() || self.b.is_at_end();
        }
    }

    /// Copies as many elements from the first tree as the second has with the same key.
    fn copy_matching_number_of_common_elements_from_first(&mut self) {
        while !self.done && self.a.key() == self.b.key() {
            if self.at_shared_leaf_start() {
                let common = self.ascend_shared();
                self.builder.append_node(Arc::clone(common));
                self.ascend_to_keys();
            } else {
                self.builder.append(self.a.element().clone());
                self.a.move_forward();
                self.b.move_forward();
            }
            self.done = self.a.is_at_end() || self.b.is_at_end();
        }
    }

    /// Skips runs of equal keys in both trees.
    fn skip_common_elements(&mut self) {
        while !self.done && self.a.key() == self.b.key() {
            if Arc::ptr_eq(self.a.node_handle(), self.b.node_handle()) {
                let mut key;
                loop {
                    key = &self.a.node_handle().last().expect("`Merger::skip_common_elements()` - empty node!").0;
                    debug_assert_eq!(self.a.slot(), self.b.slot());
                    self.a.ascend_one_level();
                    self.b.ascend_one_level();
                    self.done = self.a.is_at_end() || self.b.is_at_end();
                    if self.done || !Arc::ptr_eq(self.a.node_handle(), self.b.node_handle()) {
                        break;
                    }
                }
                self.ascend_to_keys();
                let limit = Limit::Including(key);
                skip_while(&mut self.a, &limit);
                skip_while(&mut self.b, &limit);
            } else {
                let limit = Limit::Including(self.a.key());
                skip_while(&mut self.a, &limit);
                skip_while(&mut self.b, &limit);
            }
            self.done = self.a.is_at_end() || self.b.is_at_end();
        }
    }

    /// Skips as many elements from both trees as they have in common for each key.
    fn skip_matching_number_of_common_elements(&mut self) {
        while !self.done && self.a.key() == self.b.key() {
            if same_position(&self.a, &self.b) && self.a.node().is_leaf() {
                loop {
                    self.a.ascend_one_level();
                    self.b.ascend_one_level();
                    self.done = self.a.is_at_end() || self.b.is_at_end();
                    if self.done || !same_position(&self.a, &self.b) {
                        break;
                    }
                }
                self.ascend_to_keys();
            } else {
                self.a.move_forward();
                self.b.move_forward();
                self.done = self.a.is_at_end() || self.b.is_at_end();
            }
        }
    }
}

/// Returns the elements of both trees.
///
/// Under grouping, a key present in both trees contributes the first tree's elements only. Under
/// counting, every element of both trees is kept and the first tree's elements with a key come
/// before the second tree's.
pub(crate) fn union<K: Ord + Clone, V: Clone>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    strategy: MatchingStrategy,
) -> Arc<Node<K, V>> {
    let mut m = Merger::new(first, second);
    match strategy {
        MatchingStrategy::Grouping => {
            while !m.done {
                m.copy_from_first(RelativeLimit::ExcludingOtherKey);
                m.copy_from_second(RelativeLimit::ExcludingOtherKey);
                m.copy_common_elements_from_first();
            }
        }
        MatchingStrategy::Counting => {
            while !m.done {
                m.copy_from_first(RelativeLimit::IncludingOtherKey);
                m.copy_from_second(RelativeLimit::ExcludingOtherKey);
            }
        }
    }
    m.append_first();
    m.append_second();
    let result = m.finish();
    debug!(len = result.len(), ?strategy, "union finished");
    result
}

/// Returns the elements of the first tree that are not matched in the second.
pub(crate) fn subtracting<K: Ord + Clone, V: Clone>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    strategy: MatchingStrategy,
) -> Arc<Node<K, V>> {
    let mut m = Merger::new(first, second);
    while !m.done {
        m.copy_from_first(RelativeLimit::ExcludingOtherKey);
        m.skip_from_second(RelativeLimit::ExcludingOtherKey);
        match strategy {
            MatchingStrategy::Grouping => m.skip_common_elements(),
            MatchingStrategy::Counting => m.skip_matching_number_of_common_elements(),
        }
    }
    m.append_first();
    let result = m.finish();
    debug!(len = result.len(), ?strategy, "subtraction finished");
    result
}

/// Returns the elements of either tree that are not matched in the other.
pub(crate) fn symmetric_difference<K: Ord + Clone, V: Clone>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    strategy: MatchingStrategy,
) -> Arc<Node<K, V>> {
    let mut m = Merger::new(first, second);
    while !m.done {
        m.copy_from_first(RelativeLimit::ExcludingOtherKey);
        m.copy_from_second(RelativeLimit::ExcludingOtherKey);
        match strategy {
            MatchingStrategy::Grouping => m.skip_common_elements(),
            MatchingStrategy::Counting => m.skip_matching_number_of_common_elements(),
        }
    }
    m.append_first();
    m.append_second();
    let result = m.finish();
    debug!(len = result.len(), ?strategy, "symmetric difference finished");
    result
}

/// Returns the elements of the first tree that are matched in the second.
pub(crate) fn intersection<K: Ord + Clone, V: Clone>(
    first: &Arc<Node<K, V>>,
    second: &Arc<Node<K, V>>,
    strategy: MatchingStrategy,
) -> Arc<Node<K, V>> {
    let mut m = Merger::new(first, second);
    while !m.done {
        m.skip_from_first(RelativeLimit::ExcludingOtherKey);
        m.skip_from_second(RelativeLimit::ExcludingOtherKey);
        match strategy {
            MatchingStrategy::Grouping => m.copy_common_elements_from_first(),
            MatchingStrategy::Counting => m.copy_matching_number_of_common_elements_from_first(),
        }
    }
    let result = m.finish();
    debug!(len = result.len(), ?strategy, "intersection finished");
    result
}

/// Returns the elements of `tree` whose keys are not in the sorted sequence `keys`.
///
/// Under counting, each key in `keys` removes at most one element.
pub(crate) fn subtracting_sorted_keys<K, V, I>(tree: &Arc<Node<K, V>>, keys: I, strategy: MatchingStrategy) -> Arc<Node<K, V>>
where
    K: Ord + Clone,
    V: Clone,
    I: IntoIterator,
    I::Item: Borrow<K>,
{
    if tree.len() == 0 {
        return Arc::clone(tree);
    }
    let mut builder = Builder::new(tree.order());
    let mut path = StrongPath::at_start(tree);
    let mut previous: Option<I::Item> = None;
    'keys: for item in keys {
        let key: &K = item.borrow();
        assert!(
            previous.as_ref().is_none_or(|p| Borrow::<K>::borrow(p) <= key),
            "`BTree::subtracting_sorted_keys()` - keys are not sorted!"
        );
        while path.key() < key {
            builder.append_part(path.next_part(&Limit::Excluding(key)));
            if path.is_at_end() {
                break 'keys;
            }
        }
        match strategy {
            MatchingStrategy::Grouping => {
                while path.key() == key {
                    path.next_part(&Limit::Including(key));
                    if path.is_at_end() {
                        break 'keys;
                    }
                }
            }
            MatchingStrategy::Counting => {
                if path.key() == key {
                    path.move_forward();
                    if path.is_at_end() {
                        break 'keys;
                    }
                }
            }
        }
        previous = Some(item);
    }
    if !path.is_at_end() {
        builder.append(path.element().clone());
        builder.append_node(path.suffix());
    }
    builder.finish()
}

/// Returns the elements of `tree` whose keys are in the sorted sequence `keys`.
///
/// Under counting, each key in `keys` keeps at most one element.
pub(crate) fn intersection_sorted_keys<K, V, I>(tree: &Arc<Node<K, V>>, keys: I, strategy: MatchingStrategy) -> Arc<Node<K, V>>
where
    K: Ord + Clone,
    V: Clone,
    I: IntoIterator,
    I::Item: Borrow<K>,
{
    if tree.len() == 0 {
        return Arc::clone(tree);
    }
    let mut builder = Builder::new(tree.order());
    let mut path = StrongPath::at_start(tree);
    let mut previous: Option<I::Item> = None;
    'keys: for item in keys {
        let key: &K = item.borrow();
        assert!(
            previous.as_ref().is_none_or(|p| Borrow::<K>::borrow(p) <= key),
            "`BTree::intersection_sorted_keys()` - keys are not sorted!"
        );
        while path.key() < key {
            path.next_part(&Limit::Excluding(key));
            if path.is_at_end() {
                break 'keys;
            }
        }
        match strategy {
            MatchingStrategy::Grouping => {
                while path.key() == key {
                    builder.append_part(path.next_part(&Limit::Including(key)));
                    if path.is_at_end() {
                        break 'keys;
                    }
                }
            }
            MatchingStrategy::Counting => {
                if path.key() == key {
                    builder.append(path.element().clone());
                    path.move_forward();
                    if path.is_at_end() {
                        break 'keys;
                    }
                }
            }
        }
        previous = Some(item);
    }
    builder.finish()
}
