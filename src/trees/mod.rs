//! Tree structures backing the engine.
//!
//! - [`OrderedTree`]: keyed binary search tree holding each group's live events
//! - [`ConsumptionTree`]: per-subscriber, per-group archive whose leaves form a
//!   timestamp-ordered list read through a [`Cursor`]
//!
//! Both keep their nodes in an index arena; parent, child and list links are
//! plain indices.

mod consumption;
mod ordered;

pub use consumption::{ConsumptionTree, Cursor, Leaves, Position};
pub use ordered::{Iter, OrderedTree};
