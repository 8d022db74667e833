//! flowtab - bounded multi-index storage for OpenFlow-style flow entries.
//!
//! Two cores: a Robin Hood open-addressing hash multimap ([`Hmap`]) and a
//! fixed-capacity flow table ([`FlowTable`]) layered over three of them
//! (by id, by priority, by exact match) plus an all-entries list and a free
//! list. Queries select strict / non-strict / overlap / cookie-only
//! candidates; a cooperative iteration task walks the pool in chunks under a
//! host scheduler's yield oracle.
//!
//! The crate owns no protocol parsing: flow-mod messages, match semantics
//! and action walking come in through the traits in [`types`].

pub mod entry;
pub mod hash;
pub mod hmap;
pub mod query;
pub mod table;
pub mod task;
pub mod types;

pub use entry::FlowEntry;
pub use hmap::{Cursor, Hmap, HmapStats, DEFAULT_MAX_LOAD_FACTOR};
pub use query::{FlowQuery, QueryMode};
pub use table::{AllIter, FlowTable};
pub use task::{IterTask, TickResult, YieldOracle};
pub use types::{
    Effects, Error, FlowId, FlowMod, FlowState, MatchKey, PortNo, QueuedRequest, RemovedReason,
    Result, TableStatus,
};
