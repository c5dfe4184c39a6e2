//! Copy-on-write B-trees for Rust.
//!
//! This crate provides [`BTree`], an ordered collection of key-value elements whose nodes are
//! reference counted and shared between copies. Cloning a tree is O(1); editing a copy duplicates
//! only the nodes on the edited path, so snapshots are cheap and independent.
//!
//! On top of the usual ordered-map operations, a `BTree` offers:
//!
//! - **Duplicate keys** - every operation that can observe them takes a [`KeySelector`]
//! - **Positional access** - O(log n) lookup, insertion and removal by offset
//! - **Cursors** - a [`Cursor`] takes over the tree's contents for fast batches of nearby edits
//! - **Indices** - an [`Index`] marks a position without keeping the tree alive
//! - **Subtrees** - O(log n) prefixes, suffixes and ranges that share nodes with their source
//! - **Set algebra** - unions, intersections and differences that link whole subtrees into the
//!   result and skip subtrees shared by both inputs, under a choice of [`MatchingStrategy`]
//! - **Bulk loading** - O(n) construction from sorted input, configured by [`LoadOptions`]
//!
//! # Example
//!
//! ```
//! use cow_btree::{BTree, KeySelector, MatchingStrategy};
//!
//! let mut inventory = BTree::new();
//! inventory.insert(("apple", 3), KeySelector::Last);
//! inventory.insert(("pear", 5), KeySelector::Last);
//! inventory.insert(("apple", 7), KeySelector::Last);
//!
//! // Duplicate keys are kept in insertion order.
//! assert_eq!(inventory.value_of("apple", KeySelector::First), Some(&3));
//! assert_eq!(inventory.value_of("apple", KeySelector::Last), Some(&7));
//!
//! // A snapshot shares all of its nodes until one side is edited.
//! let snapshot = inventory.clone();
//! inventory.remove("pear", KeySelector::Any);
//! assert_eq!(snapshot.len(), 3);
//! assert!(inventory.is_strict_subset(&snapshot, MatchingStrategy::Counting));
//!
//! // Positional access.
//! assert_eq!(snapshot.element_at(2), (&"pear", &5));
//! assert_eq!(snapshot.offset_of("pear", KeySelector::Any), Some(2));
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Thread-safe sharing** - nodes live behind `Arc`, so trees sharing nodes can move between threads
//! - **Structured logging** - structural events are reported through `tracing`; no subscriber is
//!   installed by the library
//!
//! # Implementation
//!
//! Elements live in every node, not just the leaves, and every node caches the number of elements in
//! its subtree. Navigation goes through paths: a read path borrowing the tree, an index path holding
//! weak references, and a cursor path that owns the nodes it edits.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod raw;
mod selector;

pub mod btree;

pub use btree::{BTree, Cursor, Index, Iter, LoadOptions};
pub use selector::{KeySelector, MatchingStrategy};
