/// Chooses which element an operation acts on when a tree holds several
/// elements with equal keys.
///
/// # Examples
///
/// ```
/// use cow_btree::{BTree, KeySelector};
///
/// let tree: BTree<i32, char> = [(1, 'a'), (2, 'b'), (2, 'c'), (3, 'd')].into_iter().collect();
///
/// assert_eq!(tree.value_of(&2, KeySelector::First), Some(&'b'));
/// assert_eq!(tree.value_of(&2, KeySelector::Last), Some(&'c'));
/// assert_eq!(tree.value_of(&2, KeySelector::After), Some(&'d'));
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum KeySelector {
    /// The first element with a matching key.
    First,
    /// The last element with a matching key.
    Last,
    /// The first element whose key is strictly greater than the given key.
    After,
    /// Any element with a matching key; lookups may stop at the first one they meet.
    #[default]
    Any,
}

/// How set-algebra operations treat elements with duplicate keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MatchingStrategy {
    /// A key present in both trees matches every element with that key, regardless of multiplicity.
    Grouping,
    /// Elements with equal keys are matched one-to-one, so multiplicities are counted.
    Counting,
}
