use pretty_assertions::assert_eq;
use proptest::prelude::*;

use cow_btree::{BTree, Cursor, KeySelector};

static_assertions::assert_impl_all!(Cursor<u32, u32>: Send, Sync);

fn keys(tree: &BTree<u32, u32>) -> Vec<u32> {
    tree.iter().map(|(k, _)| *k).collect()
}

fn sequential(order: usize, n: u32) -> BTree<u32, u32> {
    let mut tree = BTree::with_order(order);
    tree.extend((0..n).map(|i| (i, i)));
    tree
}

// ─── Checkout ────────────────────────────────────────────────────────────────

#[test]
fn tree_is_empty_while_a_cursor_is_out() {
    let mut tree = sequential(5, 1_000);
    let snapshot = tree.clone();

    let mut cursor = tree.cursor_on_key(&500, KeySelector::First);
    assert!(tree.is_empty());
    assert_eq!(tree.iter().next(), None);
    assert_eq!(tree.order(), 5);

    cursor.remove_n(100);
    cursor.insert((550, 0));
    assert!(tree.is_empty());

    tree = cursor.finish();
    assert_eq!(tree.len(), 901);
    assert_eq!(snapshot.len(), 1_000);
    assert_eq!(tree.value_of(&550, KeySelector::Any), Some(&0));
    assert!(!tree.contains_key(&599));
    assert_eq!(tree.offset_of(&600, KeySelector::Any), Some(501));
}

#[test]
fn cursors_walk_both_ways() {
    let mut tree = sequential(3, 100);
    tree.with_cursor_at_end(|cursor| {
        assert!(cursor.is_at_end());
        let mut seen = Vec::new();
        while !cursor.is_at_start() {
            cursor.move_backward();
            seen.push(*cursor.key());
        }
        assert_eq!(seen, (0..100).rev().collect::<Vec<_>>());
        cursor.move_to_key(&42, KeySelector::After);
        assert_eq!(cursor.element(), (&43, &43));
        cursor.move_to_offset(10);
        assert_eq!(cursor.value(), &10);
        cursor.move_to_end();
        assert_eq!(cursor.offset(), 100);
        cursor.move_to_start();
        assert_eq!(cursor.offset(), 0);
    });
    assert_eq!(keys(&tree), (0..100).collect::<Vec<_>>());
}

#[test]
fn in_place_updates() {
    let mut tree = sequential(4, 50);
    tree.with_cursor_at_start(|cursor| {
        while !cursor.is_at_end() {
            *cursor.value_mut() *= 2;
            cursor.move_forward();
        }
    });
    assert_eq!(tree.element_at(49), (&49, &98));

    let old = tree.with_cursor_at_offset(3, |cursor| cursor.set_element((3, 0)));
    assert_eq!(old, (3, 6));
    let index = tree.index_of_key(&7, KeySelector::Any).unwrap();
    let old = tree.with_cursor_at_index(&index, |cursor| cursor.set_value(1));
    assert_eq!(old, 14);
    assert_eq!(tree.value_of(&7, KeySelector::Any), Some(&1));
}

// ─── Bulk edits ──────────────────────────────────────────────────────────────

#[test]
fn removing_around_the_cursor() {
    let mut before_exclusive = sequential(4, 100);
    before_exclusive.with_cursor_at_offset(30, |cursor| cursor.remove_all_before(false));
    assert_eq!(keys(&before_exclusive), (30..100).collect::<Vec<_>>());

    let mut before_inclusive = sequential(4, 100);
    before_inclusive.with_cursor_at_offset(30, |cursor| cursor.remove_all_before(true));
    assert_eq!(keys(&before_inclusive), (31..100).collect::<Vec<_>>());

    let mut after_exclusive = sequential(4, 100);
    after_exclusive.with_cursor_at_offset(30, |cursor| cursor.remove_all_after(false));
    assert_eq!(keys(&after_exclusive), (0..31).collect::<Vec<_>>());

    let mut after_inclusive = sequential(4, 100);
    after_inclusive.with_cursor_at_offset(30, |cursor| cursor.remove_all_after(true));
    assert_eq!(keys(&after_inclusive), (0..30).collect::<Vec<_>>());

    let mut all = sequential(4, 100);
    all.with_cursor_at_offset(30, Cursor::remove_all);
    assert!(all.is_empty());
}

#[test]
fn extracted_runs_can_be_spliced_back() {
    let mut tree = sequential(5, 500);
    let mut cursor = tree.cursor_at_offset(100);
    let run = cursor.extract(250);
    assert_eq!(run.len(), 250);
    assert_eq!(run.first(), Some((&100, &100)));
    assert_eq!(run.last(), Some((&349, &349)));
    assert_eq!(cursor.len(), 250);
    assert_eq!(cursor.key(), &350);

    cursor.insert_tree(run);
    assert_eq!(cursor.key(), &350);
    tree = cursor.finish();
    assert_eq!(tree, sequential(5, 500));
}

#[test]
fn sorted_runs_are_spliced_in() {
    let mut tree: BTree<u32, u32> = BTree::with_order(4);
    tree.extend([(0, 0), (1_000, 0)]);
    tree.with_cursor_at_offset(1, |cursor| {
        cursor.insert_sorted((1..1_000).map(|i| (i, i)));
        assert_eq!(cursor.key(), &1_000);
        cursor.insert_after((1_001, 0));
        assert_eq!(cursor.key(), &1_001);
    });
    assert_eq!(keys(&tree), (0..=1_001).collect::<Vec<_>>());
}

#[test]
#[should_panic(expected = "`Cursor::insert_tree()` - trees have different orders!")]
fn splicing_a_tree_of_another_order_panics() {
    let mut tree = sequential(4, 10);
    tree.with_cursor_at_start(|cursor| cursor.insert_tree(sequential(5, 10)));
}

#[test]
#[should_panic(expected = "`Cursor::remove()` - cursor is at the end!")]
fn removing_at_the_end_panics() {
    let mut tree = sequential(4, 10);
    tree.with_cursor_at_end(|cursor| cursor.remove());
}

// ─── Randomized ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Splitting a tree around any element and splicing the parts back together restores it.
    #[test]
    fn split_and_join_restore_the_tree(order in 3usize..9, n in 1u32..600, at in any::<prop::sample::Index>()) {
        let tree = sequential(order, n);
        let i = at.index(n as usize);
        let (separator, suffix) = (tree.element_at(i), tree.suffix(n as usize - i - 1));
        let mut joined = tree.prefix(i);
        joined.with_cursor_at_end(|cursor| {
            cursor.insert((*separator.0, *separator.1));
            cursor.insert_tree(suffix);
        });
        prop_assert!(joined.depth() <= tree.depth() + 1);
        prop_assert_eq!(joined, tree);
    }

    /// Edits through a cursor never show up in clones taken before the checkout.
    #[test]
    fn cursor_edits_are_isolated(order in 3usize..9, n in 1u32..600, removals in proptest::collection::vec(0u32..600, 0..30)) {
        let mut tree = sequential(order, n);
        let snapshot = tree.clone();
        tree.with_cursor_at_start(|cursor| {
            for key in &removals {
                cursor.move_to_key(key, KeySelector::First);
                if !cursor.is_at_end() && cursor.key() == key {
                    cursor.remove();
                }
            }
        });
        prop_assert_eq!(keys(&snapshot), (0..n).collect::<Vec<_>>());
        let expected: Vec<u32> = (0..n).filter(|k| !removals.contains(k)).collect();
        prop_assert_eq!(keys(&tree), expected);
    }
}
