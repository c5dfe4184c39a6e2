use alloc::sync::Arc;
use core::borrow::Borrow;
use core::mem;

use super::node::{Node, Splinter};
use crate::KeySelector;

/// A single-pass edit of a tree: a descent from the root to some node, followed by an ascent back up
/// along the same path.
///
/// Every node handed to an editor has been made unique, so editors can change it in place.
pub(crate) trait Edit<K, V> {
    /// Looks at `node` on the way down. Returns the child slot to continue in, or `None` to turn around.
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize>;

    /// Looks at `node` on the way back up, after the child at `slot` has been edited.
    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize);
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Runs `editor` over this subtree.
    pub(super) fn edit(&mut self, editor: &mut impl Edit<K, V>) {
        let Some(slot) = editor.descend(self) else {
            return;
        };
        Arc::make_mut(&mut self.children[slot]).edit(editor);
        editor.ascend(self, slot);
    }

    fn insert_element(&mut self, slot: usize, element: (K, V)) -> Option<Splinter<K, V>> {
        debug_assert!(self.is_leaf());
        self.elements.insert(slot, element);
        self.count += 1;
        self.is_too_large().then(|| self.split())
    }

    fn remove_element(&mut self, slot: usize) -> (K, V) {
        debug_assert!(self.is_leaf());
        self.count -= 1;
        self.elements.remove(slot)
    }
}

// Accounts for one inserted element below `node` and absorbs a splinter coming up from `slot`.
fn ascend_from_insert<K: Clone, V: Clone>(node: &mut Node<K, V>, slot: usize, splinter: &mut Option<Splinter<K, V>>) {
    node.count += 1;
    if let Some(s) = splinter.take() {
        node.insert_splinter(s, slot);
        *splinter = node.is_too_large().then(|| node.split());
    }
}

// Accounts for one removed element below `node`; the removed neighbour takes the place of a pending match.
fn ascend_from_remove<K: Clone, V: Clone>(
    node: &mut Node<K, V>,
    slot: usize,
    matched: &mut Option<(usize, usize)>,
    removed: &mut Option<(K, V)>,
) {
    node.count -= 1;
    if let Some((depth, m)) = *matched {
        if node.depth() == depth {
            let surrogate = removed.take().expect("`ascend_from_remove()` - nothing was removed!");
            *removed = Some(mem::replace(&mut node.elements[m], surrogate));
            *matched = None;
        }
    }
    if node.children[slot].is_too_small() {
        node.fix_deficiency(slot);
    }
}

/// Replaces the value at an offset, given as the distance `pos` from the end of the tree.
pub(crate) struct SetValueAt<V> {
    pos: usize,
    value: Option<V>,
    pub(crate) old: Option<V>,
}

impl<V> SetValueAt<V> {
    pub(crate) fn new(pos: usize, value: V) -> Self {
        Self { pos, value: Some(value), old: None }
    }
}

impl<K: Clone, V: Clone> Edit<K, V> for SetValueAt<V> {
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let slot = node.slot_at_offset(node.len() - self.pos);
        if !slot.matched {
            self.pos -= node.len() - slot.offset;
            return Some(slot.index);
        }
        let value = self.value.take().expect("`SetValueAt::descend()` - value already used!");
        self.old = Some(mem::replace(&mut node.elements[slot.index].1, value));
        None
    }

    fn ascend(&mut self, _node: &mut Node<K, V>, _slot: usize) {}
}

/// Inserts an element at an offset, given as the distance `pos` from the end of the tree.
pub(crate) struct InsertAt<K, V> {
    pos: usize,
    element: Option<(K, V)>,
    pub(crate) splinter: Option<Splinter<K, V>>,
}

impl<K, V> InsertAt<K, V> {
    pub(crate) fn new(pos: usize, element: (K, V)) -> Self {
        Self { pos, element: Some(element), splinter: None }
    }
}

impl<K: Clone, V: Clone> Edit<K, V> for InsertAt<K, V> {
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let slot = node.slot_at_offset(node.len() - self.pos);
        if !slot.matched {
            self.pos -= node.len() - slot.offset;
            return Some(slot.index);
        }
        let element = self.element.take().expect("`InsertAt::descend()` - element already used!");
        if node.is_leaf() {
            self.splinter = node.insert_element(slot.index, element);
            return None;
        }
        // The new element takes the place of the one at the offset, which moves to the start of the
        // next subtree.
        self.element = Some(mem::replace(&mut node.elements[slot.index], element));
        self.pos = node.children[slot.index + 1].len();
        Some(slot.index + 1)
    }

    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize) {
        ascend_from_insert(node, slot, &mut self.splinter);
    }
}

/// Inserts an element before (`First`) or after (anything else) the elements with an equal key.
pub(crate) struct InsertByKey<K, V> {
    element: Option<(K, V)>,
    selector: KeySelector,
    pub(crate) splinter: Option<Splinter<K, V>>,
}

impl<K, V> InsertByKey<K, V> {
    pub(crate) fn new(element: (K, V), selector: KeySelector) -> Self {
        let selector = if selector == KeySelector::First { KeySelector::First } else { KeySelector::After };
        Self { element: Some(element), selector, splinter: None }
    }
}

impl<K: Ord + Clone, V: Clone> Edit<K, V> for InsertByKey<K, V> {
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let key = &self.element.as_ref().expect("`InsertByKey::descend()` - element already used!").0;
        let (_, descend) = node.slot_of(key, self.selector);
        if !node.is_leaf() {
            return Some(descend);
        }
        let element = self.element.take().expect("`InsertByKey::descend()` - element already used!");
        self.splinter = node.insert_element(descend, element);
        None
    }

    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize) {
        ascend_from_insert(node, slot, &mut self.splinter);
    }
}

/// Replaces the element chosen by a key and selector, or inserts the element when there is no match.
///
/// `After` is treated as `Last`. With `Any`, the search stops at the first match it meets.
pub(crate) struct Upsert<K, V> {
    element: Option<(K, V)>,
    selector: KeySelector,
    // Depth and slot of the deepest internal match seen on the way down.
    matched: Option<(usize, usize)>,
    pub(crate) replaced: Option<(K, V)>,
    pub(crate) splinter: Option<Splinter<K, V>>,
}

impl<K, V> Upsert<K, V> {
    pub(crate) fn new(element: (K, V), selector: KeySelector) -> Self {
        let selector = if selector == KeySelector::After { KeySelector::Last } else { selector };
        Self { element: Some(element), selector, matched: None, replaced: None, splinter: None }
    }

    fn replace(&mut self, node: &mut Node<K, V>, slot: usize) {
        let element = self.element.take().expect("`Upsert::replace()` - element already used!");
        self.replaced = Some(mem::replace(&mut node.elements[slot], element));
    }
}

impl<K: Ord + Clone, V: Clone> Edit<K, V> for Upsert<K, V> {
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let key = &self.element.as_ref().expect("`Upsert::descend()` - element already used!").0;
        let (matched, descend) = node.slot_of(key, self.selector);
        if node.is_leaf() {
            if let Some(m) = matched {
                self.replace(node, m);
                self.matched = None;
            } else if self.matched.is_none() {
                let element = self.element.take().expect("`Upsert::descend()` - element already used!");
                self.splinter = node.insert_element(descend, element);
            }
            return None;
        }
        if let Some(m) = matched {
            if self.selector == KeySelector::Any {
                self.replace(node, m);
                return None;
            }
            self.matched = Some((node.depth(), m));
        }
        Some(descend)
    }

    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize) {
        if let Some((depth, m)) = self.matched {
            if node.depth() == depth {
                self.replace(node, m);
                self.matched = None;
            }
        } else if self.replaced.is_none() {
            ascend_from_insert(node, slot, &mut self.splinter);
        }
    }
}

/// Removes the element at an offset, given as the distance `pos` from the end of the tree.
pub(crate) struct RemoveAt<K, V> {
    pos: usize,
    matched: Option<(usize, usize)>,
    pub(crate) removed: Option<(K, V)>,
}

impl<K, V> RemoveAt<K, V> {
    pub(crate) fn new(pos: usize) -> Self {
        Self { pos, matched: None, removed: None }
    }
}

impl<K: Clone, V: Clone> Edit<K, V> for RemoveAt<K, V> {
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let slot = node.slot_at_offset(node.len() - self.pos);
        if !slot.matched {
            debug_assert!(!node.is_leaf());
            self.pos -= node.len() - slot.offset;
            return Some(slot.index);
        }
        if node.is_leaf() {
            self.removed = Some(node.remove_element(slot.index));
            return None;
        }
        // Remove the successor from its leaf instead; it replaces the match on the way up.
        self.matched = Some((node.depth(), slot.index));
        self.pos = node.children[slot.index + 1].len();
        Some(slot.index + 1)
    }

    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize) {
        ascend_from_remove(node, slot, &mut self.matched, &mut self.removed);
    }
}

/// Removes the element chosen by a key and selector. `After` is treated as `Last`.
pub(crate) struct RemoveByKey<'q, Q: ?Sized, K, V> {
    key: &'q Q,
    selector: KeySelector,
    matched: Option<(usize, usize)>,
    pub(crate) removed: Option<(K, V)>,
}

impl<'q, Q: ?Sized, K, V> RemoveByKey<'q, Q, K, V> {
    pub(crate) fn new(key: &'q Q, selector: KeySelector) -> Self {
        let selector = if selector == KeySelector::After { KeySelector::Last } else { selector };
        Self { key, selector, matched: None, removed: None }
    }
}

impl<Q, K, V> Edit<K, V> for RemoveByKey<'_, Q, K, V>
where
    K: Borrow<Q> + Clone,
    V: Clone,
    Q: ?Sized + Ord,
{
    fn descend(&mut self, node: &mut Node<K, V>) -> Option<usize> {
        let (matched, descend) = node.slot_of(self.key, self.selector);
        if node.is_leaf() {
            if let Some(m) = matched {
                self.removed = Some(node.remove_element(m));
                self.matched = None;
            } else if self.matched.is_some() {
                // The match is in an ancestor; take its neighbour from this leaf.
                let slot = if descend == node.elements.len() { descend - 1 } else { descend };
                self.removed = Some(node.remove_element(slot));
            }
            return None;
        }
        if let Some(m) = matched {
            self.matched = Some((node.depth(), m));
        }
        Some(descend)
    }

    fn ascend(&mut self, node: &mut Node<K, V>, slot: usize) {
        if self.removed.is_some() {
            ascend_from_remove(node, slot, &mut self.matched, &mut self.removed);
        }
    }
}
