use alloc::sync::Arc;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::mem;
use core::ops::Range;

use crate::KeySelector;

/// Target size in bytes of the elements of a fully loaded node.
///
/// Just below a power of two, so a full node's element vector is not reallocated right before it splits.
pub(crate) const NODE_SIZE: usize = 16383;

/// The smallest order accepted for a tree.
pub(crate) const MIN_ORDER: usize = 3;

/// A B-tree node holding up to `order - 1` elements and, when internal, one more child than elements.
///
/// Nodes are shared between trees through `Arc`. A node reachable from more than one owner is never
/// mutated in place; editing code goes through `Arc::make_mut`, which clones the node (but not its
/// children) when it is shared.
#[derive(Clone)]
pub(crate) struct Node<K, V> {
    pub(super) elements: Vec<(K, V)>,
    pub(super) children: Vec<Arc<Node<K, V>>>,
    // The number of elements in the subtree rooted at this node.
    pub(super) count: usize,
    order: usize,
    depth: usize,
}

/// The separator and right half produced by splitting an overfull node.
pub(crate) struct Splinter<K, V> {
    pub(super) separator: (K, V),
    pub(super) node: Arc<Node<K, V>>,
}

/// Result of locating an offset within a node's subtree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct OffsetSlot {
    /// The element slot (on a match) or child slot containing the offset.
    pub(crate) index: usize,
    /// True if the offset addresses an element of this node.
    pub(crate) matched: bool,
    /// The offset just past the subtree of `index`, or the offset of the matched element.
    pub(crate) offset: usize,
}

impl<K, V> Node<K, V> {
    /// Returns the order that keeps a full node around `NODE_SIZE` bytes.
    pub(crate) fn default_order() -> usize {
        (NODE_SIZE / mem::size_of::<(K, V)>().max(1)).max(8)
    }

    /// Creates an empty leaf.
    pub(crate) fn new(order: usize) -> Self {
        assert!(order >= MIN_ORDER, "`Node::new()` - `order` < `MIN_ORDER`!");
        Self { elements: Vec::new(), children: Vec::new(), count: 0, order, depth: 0 }
    }

    pub(super) fn from_parts(
        order: usize,
        depth: usize,
        elements: Vec<(K, V)>,
        children: Vec<Arc<Self>>,
        count: usize,
    ) -> Self {
        debug_assert!(children.is_empty() || elements.len() + 1 == children.len());
        Self { elements, children, count, order, depth }
    }

    /// Creates a node with a single separator between two subtrees of equal depth.
    pub(super) fn new_pair(left: Arc<Self>, separator: (K, V), right: Arc<Self>) -> Self {
        debug_assert_eq!(left.order, right.order);
        debug_assert_eq!(left.depth, right.depth);
        let count = left.count + 1 + right.count;
        Self {
            order: left.order,
            depth: left.depth + 1,
            elements: alloc::vec![separator],
            children: alloc::vec![left, right],
            count,
        }
    }

    #[inline]
    pub(crate) const fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the number of elements in this subtree.
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) const fn is_leaf(&self) -> bool {
        self.depth == 0
    }

    #[inline]
    pub(super) const fn max_keys(&self) -> usize {
        self.order - 1
    }

    #[inline]
    pub(super) const fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    pub(super) fn is_too_small(&self) -> bool {
        self.elements.len() < self.min_keys()
    }

    pub(super) fn is_too_large(&self) -> bool {
        self.elements.len() > self.max_keys()
    }

    pub(super) fn is_balanced(&self) -> bool {
        !self.is_too_small() && !self.is_too_large()
    }

    /// Returns the first element of this subtree.
    pub(crate) fn first(&self) -> Option<&(K, V)> {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.elements.first()
    }

    /// Returns the last element of this subtree.
    pub(crate) fn last(&self) -> Option<&(K, V)> {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.elements.last()
    }

    /// Binary searches this node for `key`.
    ///
    /// Returns the slot of a matching element according to `selector` (for `After`, the first element
    /// with a greater key) and the child slot the search continues in.
    pub(crate) fn slot_of<Q>(&self, key: &Q, selector: KeySelector) -> (Option<usize>, usize)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let elements = &self.elements;
        match selector {
            KeySelector::First | KeySelector::Any => {
                let start = elements.partition_point(|(k, _)| k.borrow().cmp(key).is_lt());
                let matched = start < elements.len() && elements[start].0.borrow().cmp(key).is_eq();
                (matched.then_some(start), start)
            }
            KeySelector::Last => {
                let end = elements.partition_point(|(k, _)| k.borrow().cmp(key).is_le());
                let matched = end > 0 && elements[end - 1].0.borrow().cmp(key).is_eq();
                (matched.then(|| end - 1), end)
            }
            KeySelector::After => {
                let start = elements.partition_point(|(k, _)| k.borrow().cmp(key).is_le());
                ((start < elements.len()).then_some(start), start)
            }
        }
    }

    /// Locates the element or child that holds `offset`, relative to the start of this subtree.
    pub(crate) fn slot_at_offset(&self, offset: usize) -> OffsetSlot {
        debug_assert!(offset <= self.count);
        if offset == self.count {
            return OffsetSlot { index: self.elements.len(), matched: self.is_leaf(), offset: self.count };
        }
        if self.is_leaf() {
            return OffsetSlot { index: offset, matched: true, offset };
        }
        let last = self.children.len() - 1;
        if offset <= self.count / 2 {
            let mut p = 0;
            for (i, child) in self.children[..last].iter().enumerate() {
                let end = p + child.count;
                if offset == end {
                    return OffsetSlot { index: i, matched: true, offset: end };
                }
                if offset < end {
                    return OffsetSlot { index: i, matched: false, offset: end };
                }
                p = end + 1;
            }
            debug_assert_eq!(self.count, p + self.children[last].count, "invalid B-tree");
            return OffsetSlot { index: last, matched: false, offset: self.count };
        }
        let mut p = self.count;
        for i in (1..=last).rev() {
            // The separator before child `i` sits at `p - (c + 1)`.
            let start = self.children[i].count + 1;
            if offset + start == p {
                return OffsetSlot { index: i - 1, matched: true, offset };
            }
            if offset + start > p {
                return OffsetSlot { index: i, matched: false, offset: p };
            }
            p -= start;
        }
        debug_assert_eq!(p, self.children[0].count, "invalid B-tree");
        OffsetSlot { index: 0, matched: false, offset: self.children[0].count }
    }

    /// Returns the offset of the element in `slot`, relative to the start of this subtree.
    pub(crate) fn offset_of_slot(&self, slot: usize) -> usize {
        let c = self.elements.len();
        debug_assert!(slot <= c);
        if self.is_leaf() {
            return slot;
        }
        if slot == c {
            return self.count;
        }
        if slot <= c / 2 {
            return self.children[..=slot].iter().fold(slot, |acc, child| acc + child.count);
        }
        self.count - self.children[slot + 1..].iter().fold(c - slot, |acc, child| acc + child.count)
    }

    /// Returns true if every element matching `key` under `selector` must lie within this subtree.
    pub(crate) fn contains<Q>(&self, key: &Q, selector: KeySelector) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (Some((first, _)), Some((last, _))) = (self.elements.first(), self.elements.last()) else {
            return false;
        };
        match key.cmp(first.borrow()) {
            core::cmp::Ordering::Less => return false,
            core::cmp::Ordering::Equal if selector == KeySelector::First => return false,
            _ => {}
        }
        match key.cmp(last.borrow()) {
            core::cmp::Ordering::Greater => false,
            core::cmp::Ordering::Equal => !matches!(selector, KeySelector::Last | KeySelector::After),
            core::cmp::Ordering::Less => true,
        }
    }

    /// Inserts a splinter's separator at `slot` and its node right after it.
    ///
    /// Counts are left alone: callers account for the splinter's elements themselves.
    pub(super) fn insert_splinter(&mut self, splinter: Splinter<K, V>, slot: usize) {
        self.elements.insert(slot, splinter.separator);
        self.children.insert(slot + 1, splinter.node);
    }

    /// Swaps everything but order and depth with `other`.
    pub(super) fn swap_contents(&mut self, other: &mut Self) {
        assert_eq!(self.depth, other.depth, "`Node::swap_contents()` - depths differ!");
        assert_eq!(self.order, other.order, "`Node::swap_contents()` - orders differ!");
        mem::swap(&mut self.elements, &mut other.elements);
        mem::swap(&mut self.children, &mut other.children);
        mem::swap(&mut self.count, &mut other.count);
    }

    /// Splits an overfull node at its median, keeping the left half.
    pub(super) fn split(&mut self) -> Splinter<K, V> {
        debug_assert!(self.is_too_large());
        self.split_at(self.elements.len() / 2)
    }

    /// Splits this node around the element at `median`, keeping everything before it.
    pub(super) fn split_at(&mut self, median: usize) -> Splinter<K, V> {
        let right_elements = self.elements.split_off(median + 1);
        let separator = self.elements.remove(median);
        let right_children = if self.is_leaf() { Vec::new() } else { self.children.split_off(median + 1) };
        let right_count = right_children.iter().fold(right_elements.len(), |acc, child| acc + child.count);
        self.count -= right_count + 1;
        let node = Self::from_parts(self.order, self.depth, right_elements, right_children, right_count);
        Splinter { separator, node: Arc::new(node) }
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Builds a node from the elements of `node` in `range` and the children around them.
    ///
    /// An empty range of an internal node yields the child at `range.start`, shared.
    pub(crate) fn from_slot_range(node: &Self, range: Range<usize>) -> Arc<Self> {
        if node.is_leaf() {
            let elements = node.elements[range].to_vec();
            let count = elements.len();
            return Arc::new(Self::from_parts(node.order, 0, elements, Vec::new(), count));
        }
        if range.is_empty() {
            return Arc::clone(&node.children[range.start]);
        }
        let elements = node.elements[range.clone()].to_vec();
        let children = node.children[range.start..=range.end].to_vec();
        let count = children.iter().fold(elements.len(), |acc, child| acc + child.count);
        Arc::new(Self::from_parts(node.order, node.depth, elements, children, count))
    }

    /// Restores the minimum size of the child at `slot` by borrowing from or merging with a sibling.
    pub(super) fn fix_deficiency(&mut self, slot: usize) {
        debug_assert!(!self.is_leaf() && self.children[slot].is_too_small());
        let min_keys = self.min_keys();
        if slot > 0 && self.children[slot - 1].elements.len() > min_keys {
            self.rotate_right(slot);
        } else if slot + 1 < self.children.len() && self.children[slot + 1].elements.len() > min_keys {
            self.rotate_left(slot);
        } else if slot > 0 {
            self.collapse(slot - 1);
        } else {
            self.collapse(slot);
        }
    }

    // Moves the last element of the left sibling up and the separator down into `slot`.
    fn rotate_right(&mut self, slot: usize) {
        let (before, after) = self.children.split_at_mut(slot);
        let left = Arc::make_mut(&mut before[slot - 1]);
        let right = Arc::make_mut(&mut after[0]);
        let up = left.elements.pop().expect("`Node::rotate_right()` - left sibling is empty!");
        let down = mem::replace(&mut self.elements[slot - 1], up);
        right.elements.insert(0, down);
        left.count -= 1;
        right.count += 1;
        if !right.is_leaf() {
            let grandchild = left.children.pop().expect("`Node::rotate_right()` - left sibling has no children!");
            left.count -= grandchild.count;
            right.count += grandchild.count;
            right.children.insert(0, grandchild);
        }
    }

    // Moves the first element of the right sibling up and the separator down into `slot`.
    fn rotate_left(&mut self, slot: usize) {
        let (before, after) = self.children.split_at_mut(slot + 1);
        let left = Arc::make_mut(&mut before[slot]);
        let right = Arc::make_mut(&mut after[0]);
        let up = right.elements.remove(0);
        let down = mem::replace(&mut self.elements[slot], up);
        left.elements.push(down);
        left.count += 1;
        right.count -= 1;
        if !left.is_leaf() {
            let grandchild = right.children.remove(0);
            right.count -= grandchild.count;
            left.count += grandchild.count;
            left.children.push(grandchild);
        }
    }

    // Merges the child after `slot` and the separator between them into the child at `slot`.
    fn collapse(&mut self, slot: usize) {
        let next = Arc::unwrap_or_clone(self.children.remove(slot + 1));
        let separator = self.elements.remove(slot);
        let node = Arc::make_mut(&mut self.children[slot]);
        node.elements.push(separator);
        node.elements.extend(next.elements);
        node.children.extend(next.children);
        node.count += 1 + next.count;
        debug_assert!(node.is_balanced());
    }

    /// Moves slots between this node and its right neighbour `node` (joined by `separator`) until this
    /// node holds `target` elements.
    ///
    /// Returns the new separator and right node, or `None` if `node` was melted into this one. When the
    /// right node is left without elements, its only child is returned in its place.
    pub(super) fn shift_slots(
        &mut self,
        separator: (K, V),
        node: Arc<Self>,
        target: usize,
    ) -> Option<Splinter<K, V>> {
        debug_assert_eq!(self.depth, node.depth);
        let lc = self.elements.len();
        let rc = node.elements.len();
        let forward = target > lc;
        let delta = target.abs_diff(lc);
        if delta == 0 {
            return Some(Splinter { separator, node });
        }
        if (forward && delta > rc) || (!forward && delta > lc) {
            let right = Arc::unwrap_or_clone(node);
            self.elements.push(separator);
            self.elements.extend(right.elements);
            self.children.extend(right.children);
            self.count += 1 + right.count;
            return None;
        }

        let mut node = node;
        let right = Arc::make_mut(&mut node);
        let separator = if forward {
            debug_assert!(lc + delta < self.order);
            let rsep = right.elements.remove(delta - 1);
            self.elements.push(separator);
            self.elements.extend(right.elements.drain(..delta - 1));
            self.count += delta;
            right.count -= delta;
            if !self.is_leaf() {
                let moved = right.children.drain(..delta).collect::<Vec<_>>();
                let dc = moved.iter().fold(0, |acc, child| acc + child.count);
                self.children.extend(moved);
                self.count += dc;
                right.count -= dc;
            }
            rsep
        } else {
            debug_assert!(rc + delta < right.order);
            let rsep = self.elements.remove(lc - delta);
            let tail = self.elements.split_off(lc - delta);
            right.elements.splice(0..0, tail.into_iter().chain(core::iter::once(separator)));
            right.count += delta;
            self.count -= delta;
            if !self.is_leaf() {
                let moved = self.children.split_off(lc + 1 - delta);
                let dc = moved.iter().fold(0, |acc, child| acc + child.count);
                right.children.splice(0..0, moved);
                right.count += dc;
                self.count -= dc;
            }
            rsep
        };
        if right.children.len() == 1 {
            let child = right.children.remove(0);
            return Some(Splinter { separator, node: child });
        }
        Some(Splinter { separator, node })
    }

    /// Joins two trees of the same order around `separator`, which must not sort before any key in
    /// `left` nor after any key in `right`.
    ///
    /// The shallower tree is grafted onto the matching edge of the deeper one, so the cost is
    /// proportional to the difference in depth.
    pub(crate) fn join(left: Arc<Self>, separator: (K, V), right: Arc<Self>) -> Arc<Self> {
        assert_eq!(left.order, right.order, "`Node::join()` - `left` and `right` have different orders!");
        let append = left.depth >= right.depth;
        let (mut stock, scion) = if append { (left, right) } else { (right, left) };
        let levels = stock.depth - scion.depth;
        match Arc::make_mut(&mut stock).graft(levels, append, separator, scion) {
            Some(splinter) => Arc::new(Self::new_pair(stock, splinter.separator, splinter.node)),
            None => stock,
        }
    }

    // Walks `levels` down the rightmost (or leftmost) edge and merges `scion` into the node found there.
    fn graft(&mut self, levels: usize, append: bool, separator: (K, V), scion: Arc<Self>) -> Option<Splinter<K, V>> {
        if levels == 0 {
            let mut scion = scion;
            if !append {
                self.swap_contents(Arc::make_mut(&mut scion));
            }
            let slots = self.elements.len() + 1 + scion.elements.len();
            let target = if slots < self.order { slots } else { slots / 2 };
            return self.shift_slots(separator, scion, target);
        }
        self.count += scion.count + 1;
        let slot = if append { self.children.len() - 1 } else { 0 };
        let splinter = Arc::make_mut(&mut self.children[slot]).graft(levels - 1, append, separator, scion)?;
        debug_assert!(splinter.node.is_balanced());
        let at = if append { self.elements.len() } else { 0 };
        self.insert_splinter(splinter, at);
        self.is_too_large().then(|| self.split())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::uninlined_format_args)]
pub(crate) mod tests {
    use super::*;
    use crate::raw::Builder;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    impl<K: Ord + core::fmt::Debug, V> Node<K, V> {
        /// Validates balance, depth, ordering and count invariants. Panics listing every violation.
        pub(crate) fn validate_invariants(&self) {
            let mut errors: Vec<String> = Vec::new();
            if !self.children.is_empty() && self.elements.is_empty() {
                errors.push(String::from("internal root has no elements"));
            }
            if self.is_too_large() {
                errors.push(format!("root has {} elements, max is {}", self.elements.len(), self.max_keys()));
            }
            self.validate_node(true, None, None, &mut errors);
            assert!(errors.is_empty(), "Tree invariant violations:\n{}", errors.join("\n"));
        }

        fn validate_node(&self, is_root: bool, lower: Option<&K>, upper: Option<&K>, errors: &mut Vec<String>) {
            if !is_root && !self.is_balanced() {
                errors.push(format!(
                    "node at depth {} has {} elements, expected {}..={}",
                    self.depth,
                    self.elements.len(),
                    self.min_keys(),
                    self.max_keys()
                ));
            }
            for pair in self.elements.windows(2) {
                if pair[0].0 > pair[1].0 {
                    errors.push(format!("elements out of order: {:?} > {:?}", pair[0].0, pair[1].0));
                }
            }
            for (key, _) in &self.elements {
                if lower.is_some_and(|lower| key < lower) || upper.is_some_and(|upper| key > upper) {
                    errors.push(format!("key {:?} outside of {:?}..={:?}", key, lower, upper));
                }
            }
            if self.is_leaf() {
                if !self.children.is_empty() {
                    errors.push(String::from("leaf has children"));
                }
                if self.count != self.elements.len() {
                    errors.push(format!("leaf count {} != {}", self.count, self.elements.len()));
                }
                return;
            }
            if self.children.len() != self.elements.len() + 1 {
                errors.push(format!("{} children for {} elements", self.children.len(), self.elements.len()));
                return;
            }
            let mut count = self.elements.len();
            for (i, child) in self.children.iter().enumerate() {
                if child.depth + 1 != self.depth {
                    errors.push(format!("child depth {} under depth {}", child.depth, self.depth));
                }
                if child.order != self.order {
                    errors.push(format!("child order {} under order {}", child.order, self.order));
                }
                let lower = if i == 0 { lower } else { Some(&self.elements[i - 1].0) };
                let upper = self.elements.get(i).map(|(k, _)| k).or(upper);
                child.validate_node(false, lower, upper, errors);
                count += child.count;
            }
            if self.count != count {
                errors.push(format!("internal count {} != {}", self.count, count));
            }
        }
    }

    impl<K: Clone, V: Clone> Node<K, V> {
        pub(crate) fn to_vec(&self) -> Vec<(K, V)> {
            let mut out = Vec::with_capacity(self.count);
            self.collect_into(&mut out);
            out
        }

        fn collect_into(&self, out: &mut Vec<(K, V)>) {
            if self.is_leaf() {
                out.extend(self.elements.iter().cloned());
                return;
            }
            for (child, element) in self.children.iter().zip(&self.elements) {
                child.collect_into(out);
                out.push(element.clone());
            }
            if let Some(child) = self.children.last() {
                child.collect_into(out);
            }
        }
    }

    /// Bulk-loads `0..n` mapped to `(i, i)` into a tree of the given order.
    pub(crate) fn sequential(order: usize, n: u32) -> Arc<Node<u32, u32>> {
        let mut builder = Builder::new(order);
        for i in 0..n {
            builder.append((i, i));
        }
        builder.finish()
    }

    fn leaf(order: usize, keys: &[u32]) -> Node<u32, u32> {
        let elements = keys.iter().map(|&k| (k, k)).collect::<Vec<_>>();
        let count = elements.len();
        Node::from_parts(order, 0, elements, Vec::new(), count)
    }

    static_assertions::assert_impl_all!(Node<u32, u32>: Send, Sync, Clone);

    #[test]
    fn default_order_tracks_element_size() {
        assert_eq!(Node::<u64, u64>::default_order(), 16383 / 16);
        assert_eq!(Node::<[u8; 4096], ()>::default_order(), 8);
        assert_eq!(Node::<(), ()>::default_order(), 16383);
    }

    #[test]
    #[should_panic(expected = "`Node::new()` - `order` < `MIN_ORDER`!")]
    fn order_below_minimum_panics() {
        let _ = Node::<u32, u32>::new(2);
    }

    #[test]
    fn slot_of_honors_selectors() {
        let node = leaf(8, &[1, 3, 3, 3, 5]);
        assert_eq!(node.slot_of(&3, KeySelector::First), (Some(1), 1));
        assert_eq!(node.slot_of(&3, KeySelector::Any), (Some(1), 1));
        assert_eq!(node.slot_of(&3, KeySelector::Last), (Some(3), 4));
        assert_eq!(node.slot_of(&3, KeySelector::After), (Some(4), 4));
        assert_eq!(node.slot_of(&4, KeySelector::First), (None, 4));
        assert_eq!(node.slot_of(&4, KeySelector::Last), (None, 4));
        assert_eq!(node.slot_of(&5, KeySelector::After), (None, 5));
        assert_eq!(node.slot_of(&0, KeySelector::Last), (None, 0));
    }

    #[test]
    fn contains_rejects_edges_by_selector() {
        let node = leaf(8, &[2, 4, 6]);
        assert!(!node.contains(&1, KeySelector::Any));
        assert!(!node.contains(&2, KeySelector::First));
        assert!(node.contains(&2, KeySelector::Last));
        assert!(node.contains(&4, KeySelector::After));
        assert!(!node.contains(&6, KeySelector::After));
        assert!(!node.contains(&6, KeySelector::Last));
        assert!(node.contains(&6, KeySelector::First));
        assert!(!node.contains(&7, KeySelector::Any));
        assert!(!Node::<u32, u32>::new(8).contains(&1, KeySelector::Any));
    }

    #[test]
    fn split_keeps_left_half() {
        let mut node = leaf(4, &[1, 2, 3, 4, 5]);
        let splinter = node.split();
        assert_eq!(splinter.separator, (3, 3));
        assert_eq!(node.to_vec(), [(1, 1), (2, 2)]);
        assert_eq!(splinter.node.to_vec(), [(4, 4), (5, 5)]);
        assert_eq!(node.count, 2);
        assert_eq!(splinter.node.count, 2);
    }

    #[test]
    fn rotations_and_collapse_fix_deficiency() {
        let tree = sequential(5, 40);
        let mut root = Arc::unwrap_or_clone(tree);
        let before = root.to_vec();
        // Starve the first child, then ask the parent to repair it.
        let mut node = &mut root;
        while !node.children[0].is_leaf() {
            node = Arc::make_mut(&mut node.children[0]);
        }
        let child = Arc::make_mut(&mut node.children[0]);
        let removed = child.elements.drain(..).collect::<Vec<_>>();
        child.count = 0;
        node.count -= removed.len();
        node.fix_deficiency(0);
        let after = root.to_vec();
        assert_eq!(after.len() + removed.len(), before.len());
        assert_eq!(&before[removed.len()..], &after[..]);
    }

    #[test]
    fn join_handles_empty_sides() {
        let empty = Arc::new(Node::<u32, u32>::new(5));
        let right = sequential(5, 30);
        let joined = Node::join(Arc::clone(&empty), (0, 0), Arc::clone(&right));
        joined.validate_invariants();
        assert_eq!(joined.len(), 31);
        assert_eq!(joined.first(), Some(&(0, 0)));

        let joined = Node::join(Arc::clone(&empty), (7, 7), empty);
        joined.validate_invariants();
        assert_eq!(joined.to_vec(), [(7, 7)]);
    }

    #[test]
    fn join_does_not_touch_shared_input() {
        let left = sequential(4, 50);
        let snapshot = left.to_vec();
        let right = Arc::new(leaf(4, &[100]));
        let joined = Node::join(Arc::clone(&left), (99, 99), right);
        joined.validate_invariants();
        assert_eq!(left.to_vec(), snapshot);
        assert_eq!(joined.len(), 52);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn offsets_round_trip_through_slots(order in 3usize..9, n in 0u32..300) {
            let root = sequential(order, n);
            root.validate_invariants();
            prop_assert_eq!(root.len(), n as usize);
            for slot in 0..=root.elements.len() {
                let offset = root.offset_of_slot(slot);
                if slot < root.elements.len() {
                    let found = root.slot_at_offset(offset);
                    prop_assert!(found.matched);
                    prop_assert_eq!(found.index, slot);
                    prop_assert_eq!(root.elements[slot].0 as usize, offset);
                } else {
                    prop_assert_eq!(offset, root.len());
                }
            }
            for offset in 0..root.len() {
                let found = root.slot_at_offset(offset);
                if !found.matched {
                    let child = &root.children[found.index];
                    prop_assert!(offset < found.offset && offset >= found.offset - child.len());
                }
            }
        }

        #[test]
        fn join_concatenates(order in 3usize..9, n in 0u32..400, m in 0u32..400) {
            let left = sequential(order, n);
            let right = {
                let mut builder = Builder::new(order);
                for i in 0..m {
                    builder.append((n + 1 + i, n + 1 + i));
                }
                builder.finish()
            };
            let joined = Node::join(left, (n, n), right);
            joined.validate_invariants();
            let expected = (0..=n + m).map(|i| (i, i)).collect::<Vec<_>>();
            prop_assert_eq!(joined.to_vec(), expected);
        }

        #[test]
        fn from_slot_range_counts(order in 3usize..9, n in 1u32..300, a in 0usize..16, b in 0usize..16) {
            let root = sequential(order, n);
            let len = root.elements.len();
            let (start, end) = (a.min(b).min(len), a.max(b).min(len));
            let part = Node::from_slot_range(&root, start..end);
            prop_assert_eq!(part.to_vec().len(), part.len());
            if !root.is_leaf() && start == end {
                prop_assert!(Arc::ptr_eq(&part, &root.children[start]));
            }
        }
    }
}
