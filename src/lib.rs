//! # Backlog
//!
//! Retention-and-consumption index for grouped events: published events are
//! held per interest group until pruned, then copied into the archive of
//! every subscriber interested in that group, where each subscriber reads
//! them incrementally through a cursor.
//!
//! ## Core Concepts
//!
//! - **Groups**: a fixed set of topic channels, each with a live event store
//!   and an ordered subscriber list
//! - **Subscriber directory**: universal-hash chained table of subscribers
//! - **Prune**: moves live events past a timestamp into subscriber archives
//! - **Consume**: returns what a subscriber has not read yet, per group
//!
//! ## Example
//!
//! ```ignore
//! use backlog::{EngineConfig, RetentionEngine, GroupId};
//!
//! let mut engine = RetentionEngine::new(EngineConfig::new(4, 101, 1_000_003))?;
//!
//! engine.publish(1, 5, &[0])?;
//! engine.publish(2, 6, &[0])?;
//! engine.subscribe(0, 100, &[0])?;
//! engine.prune(2)?;
//!
//! let report = engine.consume(100)?;
//! assert_eq!(report.delivered(GroupId(0)).unwrap().len(), 2);
//! ```

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod groups;
pub mod hashing;
pub mod reports;
pub mod trees;
pub mod types;

// Re-exports
pub use config::{EngineConfig, HashParams};
pub use directory::{Consumed, GroupArchive, GroupSlot, Subscriber, SubscriberDirectory};
pub use engine::{RetentionEngine, SharedEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use groups::Group;
pub use hashing::UniversalHash;
pub use reports::{
    ArchiveListing, ConsumeReport, ConsumedGroup, DropReason, EngineReport, EngineSnapshot,
    GroupListing, GroupMembers, GroupSnapshot, PruneReport, PrunedGroup, PublishReport,
    ReportBus, ReportKind, SubscribeReport, SubscriberArchive, SubscriberSnapshot,
    UnsubscribeReport, WatchConfig, WatchFilter, WatchHandle, WatchId,
};
pub use trees::{ConsumptionTree, Cursor, OrderedTree, Position};
pub use types::*;
