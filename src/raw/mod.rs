mod builder;
mod compare;
mod cursor_path;
mod edit;
mod merger;
mod node;
mod path;
mod raw_btree;
mod strong_path;
mod weak_path;

pub(crate) use builder::Builder;
pub(crate) use compare::{elements_equal_by, is_disjoint, is_strict_subset, is_subset};
pub(crate) use cursor_path::CursorPath;
pub(crate) use merger::{
    intersection, intersection_sorted_keys, subtracting, subtracting_sorted_keys, symmetric_difference, union,
};
pub(crate) use node::Node;
pub(crate) use path::TreePath;
pub(crate) use raw_btree::RawBTree;
pub(crate) use strong_path::StrongPath;
pub(crate) use weak_path::WeakPath;
