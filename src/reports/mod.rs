//! Structured operation reports.
//!
//! Every engine operation returns a report describing what it changed: the
//! affected groups, event ids in a defined order, subscriber ids and, for
//! consumption, the per-group delta and new cursor. Rendering them is left to
//! whoever receives them.
//!
//! Reports are also fanned out on a [`ReportBus`]:
//! - Filtering by operation kind and group
//! - Bounded buffers with slow-watcher dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = engine.report_bus().watch(WatchConfig {
//!     filter: WatchFilter::kinds(vec![ReportKind::Consume]),
//!     ..Default::default()
//! });
//!
//! engine.consume(100)?;
//!
//! match handle.recv() {
//!     Ok(EngineReport::Consumed(report)) => println!("{:?}", report.groups),
//!     Ok(EngineReport::Dropped { reason }) => println!("dropped: {:?}", reason),
//!     _ => {}
//! }
//! ```

mod bus;
mod types;

pub use bus::ReportBus;
pub use types::{
    ArchiveListing, ConsumeReport, ConsumedGroup, DropReason, EngineReport, EngineSnapshot,
    GroupListing, GroupMembers, GroupSnapshot, PruneReport, PrunedGroup, PublishReport,
    ReportKind, SubscribeReport, SubscriberArchive, SubscriberSnapshot, UnsubscribeReport,
    WatchConfig, WatchFilter, WatchHandle, WatchId,
};
