//! Shared types and the capability seams to the protocol object model.
//!
//! The table core never parses OpenFlow wire objects. Everything it needs
//! from a flow-mod message comes through the [`FlowMod`] / [`MatchKey`] /
//! [`Effects`] traits, implemented by the protocol layer that embeds the
//! table.

use serde::Serialize;
use smallvec::SmallVec;

/// Unique 64-bit flow identifier, assigned by the controller layer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FlowId(pub u64);

impl FlowId {
    /// Reserved free-slot marker; never a valid flow id.
    pub const INVALID: FlowId = FlowId(u64::MAX);
}

/// OpenFlow port number.
pub type PortNo = u32;

/// Opaque handle to a request parked on an entry until its flow settles.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct QueuedRequest(pub u64);

/// Lifecycle state of an entry slot.
///
/// `Free -> New -> DeleteMarked -> Free`, with a direct `New -> Free` edge
/// when a flow is deleted without a prior mark.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FlowState {
    #[default]
    Free,
    New,
    DeleteMarked,
}

impl FlowState {
    /// True for every state on the deleting side of the lifecycle.
    pub fn is_deleted(self) -> bool {
        matches!(self, FlowState::DeleteMarked)
    }

    /// True for states that occupy a slot (on the all-list, in the indexes).
    pub fn is_live(self) -> bool {
        matches!(self, FlowState::New | FlowState::DeleteMarked)
    }
}

/// Why an entry left, or is leaving, the table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Pool exhaustion: no free entry slot.
    #[error("out of table resources")]
    Resource,
    /// A flow with the same id is already present.
    #[error("flow id already exists")]
    Exists,
    /// No entry under the given id or query.
    #[error("flow not found")]
    NotFound,
    /// The protocol message was internally inconsistent (e.g. no match key).
    #[error("invalid flow state")]
    Unknown,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Live and cumulative table counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct TableStatus {
    pub current_count: usize,
    pub pending_deletes: usize,
    pub adds: u64,
    pub deletes: u64,
    pub hard_expirations: u64,
    pub idle_expirations: u64,
    pub updates: u64,
    pub table_full_errors: u64,
    pub forwarding_errors: u64,
}

/// Exact-match key of a flow.
///
/// Hashing and strict equality go over `as_bytes`, so implementors must hand
/// back fully-initialized bytes: zero the backing structure before populating
/// it, or padding garbage becomes part of the key.
pub trait MatchKey: Clone {
    fn as_bytes(&self) -> &[u8];

    /// Does `self` match a narrower-or-equal packet set than `other`?
    fn more_specific_than(&self, other: &Self) -> bool;

    /// Could any single packet match both keys?
    fn overlaps(&self, other: &Self) -> bool;
}

/// Owned action (v1.0) or instruction (v1.1+) payload of a flow entry.
pub trait Effects {
    /// Ports this flow can forward to, distilled from its actions or from
    /// its write/apply-actions instructions.
    fn output_ports(&self) -> SmallVec<[PortNo; 4]>;
}

/// The slice of a flow-add / flow-modify message the table consumes.
///
/// `Clone` is the deep copy the table keeps for the entry's lifetime; the
/// original message stays with the caller.
pub trait FlowMod: Clone {
    type Match: MatchKey;
    type Effects: Effects;

    /// Extract the match key. `None` marks a message the table must reject
    /// as [`Error::Unknown`].
    fn match_key(&self) -> Option<Self::Match>;

    fn priority(&self) -> u16;
    fn cookie(&self) -> u64;
    fn flags(&self) -> u16;
    fn idle_timeout(&self) -> u16;
    fn hard_timeout(&self) -> u16;
    fn table_id(&self) -> u8;

    /// Build the owned effects payload for the entry.
    fn effects(&self) -> Self::Effects;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(!FlowState::Free.is_live());
        assert!(!FlowState::Free.is_deleted());
        assert!(FlowState::New.is_live());
        assert!(!FlowState::New.is_deleted());
        assert!(FlowState::DeleteMarked.is_live());
        assert!(FlowState::DeleteMarked.is_deleted());
    }

    #[test]
    fn invalid_id_is_reserved() {
        assert_ne!(FlowId(0), FlowId::INVALID);
        assert_eq!(FlowId::INVALID, FlowId(u64::MAX));
    }
}
