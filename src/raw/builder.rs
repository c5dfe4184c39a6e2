use alloc::sync::Arc;
use alloc::vec::Vec;

use tracing::trace;

use super::cursor_path::CursorPath;
use super::node::Node;
use super::path::TreePath;
use super::strong_path::Part;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// The next element becomes a separator between the last sapling and the seedling.
    Separator,
    /// The next element goes into the seedling.
    Element,
}

/// Bulk-loads a tree from elements (and whole subtrees) appended in key order.
///
/// Completed subtrees ("saplings") are kept in a line of non-increasing depth, separated by single
/// elements. New elements fill a leaf ("seedling"); once it holds `keys_per_node` elements it joins
/// the line, which folds equally deep neighbours into deeper subtrees as it grows.
pub(crate) struct Builder<K, V> {
    order: usize,
    keys_per_node: usize,
    saplings: Vec<Arc<Node<K, V>>>,
    separators: Vec<(K, V)>,
    seedling: Node<K, V>,
    state: State,
}

impl<K: Ord + Clone, V: Clone> Builder<K, V> {
    /// Creates a builder that fills nodes completely.
    pub(crate) fn new(order: usize) -> Self {
        Self::with_keys_per_node(order, order - 1)
    }

    /// Creates a builder that fills nodes to `fill_factor` of their capacity.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub(crate) fn with_fill_factor(order: usize, fill_factor: f64) -> Self {
        assert!(
            (0.5..=1.0).contains(&fill_factor),
            "`Builder::with_fill_factor()` - `fill_factor` is outside 0.5..=1.0!"
        );
        let keys_per_node = (fill_factor * (order - 1) as f64 + 0.5) as usize;
        Self::with_keys_per_node(order, keys_per_node)
    }

    fn with_keys_per_node(order: usize, keys_per_node: usize) -> Self {
        let seedling = Node::new(order);
        debug_assert!(keys_per_node >= (order - 1) / 2 && keys_per_node < order);
        Self { order, keys_per_node, saplings: Vec::new(), separators: Vec::new(), seedling, state: State::Element }
    }

    /// The key of the last element appended so far.
    pub(crate) fn last_key(&self) -> Option<&K> {
        match self.state {
            State::Separator => self.saplings.last().and_then(|sapling| sapling.last()).map(|(key, _)| key),
            State::Element => self.seedling.elements.last().or(self.separators.last()).map(|(key, _)| key),
        }
    }

    fn accepts(&self, key: &K) -> bool {
        self.last_key().is_none_or(|last| last <= key)
    }

    /// Appends an element, which must not sort before anything appended earlier.
    pub(crate) fn append(&mut self, element: (K, V)) {
        debug_assert!(self.accepts(&element.0), "`Builder::append()` - elements out of order!");
        match self.state {
            State::Separator => {
                self.separators.push(element);
                self.state = State::Element;
            }
            State::Element => {
                self.seedling.elements.push(element);
                self.seedling.count += 1;
                if self.seedling.len() == self.keys_per_node {
                    self.close_seedling();
                    self.state = State::Separator;
                }
            }
        }
    }

    fn close_seedling(&mut self) {
        let seedling = core::mem::replace(&mut self.seedling, Node::new(self.order));
        self.append_sapling(Arc::new(seedling));
    }

    /// Appends every element of a tree of the same order, sharing its nodes where possible.
    pub(crate) fn append_node(&mut self, node: Arc<Node<K, V>>) {
        assert_eq!(node.order(), self.order, "`Builder::append_node()` - trees have different orders!");
        let Some((first, _)) = node.first() else {
            return;
        };
        debug_assert!(self.accepts(first), "`Builder::append_node()` - elements out of order!");

        if node.is_leaf() {
            if self.state == State::Separator {
                debug_assert!(self.seedling.elements.is_empty());
                let mut node = Arc::unwrap_or_clone(node);
                self.separators.push(node.elements.remove(0));
                node.count -= 1;
                self.state = State::Element;
                if node.elements.is_empty() {
                    return;
                }
                self.seedling = node;
            } else if let Some(separator) = self.seedling.elements.pop() {
                self.seedling.count -= 1;
                if let Some(splinter) = self.seedling.shift_slots(separator, node, self.keys_per_node) {
                    self.close_seedling();
                    self.separators.push(splinter.separator);
                    self.seedling = Arc::unwrap_or_clone(splinter.node);
                }
            } else {
                self.seedling = Arc::unwrap_or_clone(node);
            }
            if self.seedling.len() >= self.keys_per_node {
                self.close_seedling();
                self.state = State::Separator;
            }
            return;
        }

        if self.state == State::Element {
            if let Some(separator) = self.seedling.elements.pop() {
                self.seedling.count -= 1;
                self.close_seedling();
                self.separators.push(separator);
            }
        } else {
            // Borrow the last element of the previous sapling as the separator.
            let sapling = self.saplings.pop().expect("`Builder::append_node()` - no sapling to borrow from!");
            let mut cursor = CursorPath::at_end(sapling);
            cursor.move_backward();
            let separator = cursor.remove();
            self.saplings.push(cursor.finish());
            self.separators.push(separator);
        }
        debug_assert!(self.seedling.elements.is_empty());
        self.append_sapling(node);
        self.state = State::Separator;
    }

    /// Appends a run of elements borrowed from another tree.
    pub(crate) fn append_part(&mut self, part: Part<'_, K, V>) {
        match part {
            Part::Element(element) => self.append(element.clone()),
            Part::Node(node) => self.append_node(Arc::clone(node)),
            Part::NodeRange(node, range) => self.append_node(Node::from_slot_range(node, range)),
        }
    }

    fn append_sapling(&mut self, sapling: Arc<Node<K, V>>) {
        let mut sapling = sapling;
        while let Some(mut previous) = self.saplings.pop() {
            let separator = self.separators.pop().expect("`Builder::append_sapling()` - missing separator!");
            // Fold earlier saplings together until they are at least as deep as the new one.
            while previous.depth() < sapling.depth() {
                let Some(before) = self.saplings.pop() else {
                    self.saplings.push(Node::join(previous, separator, sapling));
                    return;
                };
                let between = self.separators.pop().expect("`Builder::append_sapling()` - missing separator!");
                previous = Node::join(before, between, previous);
            }
            let full_previous = previous.elements.len() >= self.keys_per_node;
            let full_sapling = sapling.elements.len() >= self.keys_per_node;
            if previous.depth() == sapling.depth() + 1 && !full_previous && full_sapling {
                // Graft the sapling under the previous one as its new last child.
                let node = Arc::make_mut(&mut previous);
                node.count += sapling.len() + 1;
                node.elements.push(separator);
                node.children.push(sapling);
                sapling = previous;
            } else if previous.depth() == sapling.depth() && full_previous && full_sapling {
                sapling = Arc::new(Node::new_pair(previous, separator, sapling));
            } else if previous.depth() > sapling.depth() || full_previous {
                self.saplings.push(previous);
                self.separators.push(separator);
                break;
            } else if let Some(splinter) = Arc::make_mut(&mut previous).shift_slots(separator, sapling, self.keys_per_node)
            {
                debug_assert_eq!(previous.elements.len(), self.keys_per_node);
                self.append_sapling(previous);
                self.separators.push(splinter.separator);
                sapling = splinter.node;
            } else {
                sapling = previous;
            }
        }
        self.saplings.push(sapling);
    }

    /// Joins the saplings and the seedling into a single tree.
    pub(crate) fn finish(self) -> Arc<Node<K, V>> {
        let Self { mut saplings, mut separators, seedling, .. } = self;
        let mut root = if separators.len() + 1 == saplings.len() {
            debug_assert!(seedling.elements.is_empty());
            saplings.pop().expect("`Builder::finish()` - no sapling to finish!")
        } else {
            Arc::new(seedling)
        };
        while let Some(sapling) = saplings.pop() {
            let separator = separators.pop().expect("`Builder::finish()` - missing separator!");
            root = Node::join(sapling, separator, root);
        }
        trace!(len = root.len(), depth = root.depth(), "builder finished");
        root
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::raw::node::tests::sequential;
    use crate::raw::strong_path::{Limit, StrongPath};
    use proptest::prelude::*;

    #[test]
    fn empty_builder_yields_empty_leaf() {
        let root = Builder::<u32, u32>::new(5).finish();
        root.validate_invariants();
        assert!(root.is_leaf());
        assert_eq!(root.len(), 0);
        assert_eq!(root.order(), 5);
    }

    #[test]
    fn full_nodes_when_fill_factor_is_one() {
        let root = sequential(5, 5 * 5 * 5 - 1);
        root.validate_invariants();
        assert_eq!(root.depth(), 2);
        assert_eq!(root.elements.len(), 4);
        assert!(root.children.iter().all(|child| child.elements.len() == 4));
    }

    #[test]
    fn fill_factor_leaves_headroom() {
        let mut builder = Builder::with_fill_factor(9, 0.5);
        for i in 0..1000u32 {
            builder.append((i, i));
        }
        let root = builder.finish();
        root.validate_invariants();
        let mut leaf = &root;
        while !leaf.is_leaf() {
            leaf = &leaf.children[0];
        }
        assert_eq!(leaf.elements.len(), 4);
    }

    #[test]
    #[should_panic(expected = "`fill_factor` is outside 0.5..=1.0")]
    fn fill_factor_out_of_range_panics() {
        let _ = Builder::<u32, u32>::with_fill_factor(9, 0.25);
    }

    #[test]
    fn appending_shared_nodes_reuses_them() {
        let source = sequential(4, 1000);
        let mut builder = Builder::new(4);
        let mut path = StrongPath::at_start(&source);
        while !path.is_at_end() {
            builder.append_part(path.next_part(&Limit::Excluding(&u32::MAX)));
        }
        let root = builder.finish();
        root.validate_invariants();
        assert_eq!(root.to_vec(), source.to_vec());
        assert!(root.children.iter().zip(&source.children).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(60))]

        #[test]
        fn bulk_load_matches_input(order in 3usize..10, n in 0u32..2000, fill in 0.5f64..=1.0) {
            let mut builder = Builder::with_fill_factor(order, fill);
            for i in 0..n {
                builder.append((i / 3, i));
            }
            let root = builder.finish();
            root.validate_invariants();
            prop_assert_eq!(root.len(), n as usize);
            prop_assert_eq!(root.to_vec(), (0..n).map(|i| (i / 3, i)).collect::<Vec<_>>());
        }

        #[test]
        fn mixed_elements_and_subtrees(order in 3usize..8, chunks in proptest::collection::vec(0u32..120, 1..12)) {
            let mut builder = Builder::new(order);
            let mut expected = Vec::new();
            let mut next = 0u32;
            for (i, len) in chunks.into_iter().enumerate() {
                if i % 2 == 0 {
                    for _ in 0..len {
                        builder.append((next, next));
                        expected.push((next, next));
                        next += 1;
                    }
                } else {
                    let mut sub = Builder::new(order);
                    for _ in 0..len {
                        sub.append((next, next));
                        expected.push((next, next));
                        next += 1;
                    }
                    builder.append_node(sub.finish());
                }
            }
            let root = builder.finish();
            root.validate_invariants();
            prop_assert_eq!(root.to_vec(), expected);
        }
    }
}
