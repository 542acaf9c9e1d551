//! Subscriber directory.
//!
//! Subscribers are bucketed by a [`UniversalHash`](crate::hashing::UniversalHash)
//! of their id into a fixed number of chains, each kept in ascending id order
//! so enumeration is deterministic for a given set of hash parameters.
//!
//! Every [`Subscriber`] owns one [`GroupSlot`] per group: either
//! `NotInterested`, or an archive (consumption tree plus cursor) that prunes
//! append to and consumes read from.

mod subscriber;
mod table;

pub use subscriber::{Consumed, GroupArchive, GroupSlot, Subscriber};
pub use table::SubscriberDirectory;
