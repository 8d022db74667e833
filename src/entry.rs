//! A single flow-entry slot of the table pool.
//!
//! Slots are preallocated and recycled: a free slot sits on the free list, a
//! live slot sits on the all-entries list and in the three indexes. The
//! intrusive `links` field serves whichever list the slot is currently on; a
//! slot is never on both.

use crate::types::{Effects, FlowId, FlowMod, FlowState, PortNo, QueuedRequest, RemovedReason};
use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// Sentinel for an unlinked intrusive pointer.
pub(crate) const NIL: u32 = u32::MAX;

/// Intrusive list node: slot indices instead of pointers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Links {
    pub prev: u32,
    pub next: u32,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            prev: NIL,
            next: NIL,
        }
    }
}

pub struct FlowEntry<M: FlowMod> {
    pub(crate) id: FlowId,
    pub(crate) state: FlowState,
    pub(crate) match_key: Option<M::Match>,
    pub(crate) priority: u16,
    pub(crate) cookie: u64,
    pub(crate) flags: u16,
    pub(crate) idle_timeout: u16,
    pub(crate) hard_timeout: u16,
    pub(crate) table_id: u8,
    /// Deep copy of the message that created the flow.
    pub(crate) flow_mod: Option<M>,
    pub(crate) effects: Option<M::Effects>,
    pub(crate) output_ports: SmallVec<[PortNo; 4]>,
    pub(crate) queued_reqs: SmallVec<[QueuedRequest; 2]>,
    pub(crate) packets: u64,
    pub(crate) bytes: u64,
    pub(crate) insert_time: Instant,
    pub(crate) last_counter_change: Instant,
    pub(crate) removed_reason: Option<RemovedReason>,
    pub(crate) links: Links,
}

impl<M: FlowMod> std::fmt::Debug for FlowEntry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEntry")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("cookie", &self.cookie)
            .field("packets", &self.packets)
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl<M: FlowMod> FlowEntry<M> {
    pub(crate) fn vacant(now: Instant) -> Self {
        Self {
            id: FlowId::INVALID,
            state: FlowState::Free,
            match_key: None,
            priority: 0,
            cookie: 0,
            flags: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            table_id: 0,
            flow_mod: None,
            effects: None,
            output_ports: SmallVec::new(),
            queued_reqs: SmallVec::new(),
            packets: 0,
            bytes: 0,
            insert_time: now,
            last_counter_change: now,
            removed_reason: None,
            links: Links::default(),
        }
    }

    /// Populate a freshly popped slot from a flow-add message.
    pub(crate) fn occupy(&mut self, id: FlowId, fm: &M, match_key: M::Match, now: Instant) {
        let effects = fm.effects();
        self.id = id;
        self.state = FlowState::New;
        self.priority = fm.priority();
        self.cookie = fm.cookie();
        self.flags = fm.flags();
        self.idle_timeout = fm.idle_timeout();
        self.hard_timeout = fm.hard_timeout();
        self.table_id = fm.table_id();
        self.output_ports = effects.output_ports();
        self.match_key = Some(match_key);
        self.flow_mod = Some(fm.clone());
        self.effects = Some(effects);
        self.queued_reqs.clear();
        self.packets = 0;
        self.bytes = 0;
        self.insert_time = now;
        self.last_counter_change = now;
        self.removed_reason = None;
    }

    /// Drop owned resources and return the slot to its free shape.
    pub(crate) fn vacate(&mut self) {
        self.id = FlowId::INVALID;
        self.state = FlowState::Free;
        self.match_key = None;
        self.flow_mod = None;
        self.effects = None;
        self.output_ports.clear();
        self.queued_reqs.clear();
        self.removed_reason = None;
    }

    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// `None` only for a free slot.
    pub fn match_key(&self) -> Option<&M::Match> {
        self.match_key.as_ref()
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    pub fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    pub fn flow_mod(&self) -> Option<&M> {
        self.flow_mod.as_ref()
    }

    pub fn effects(&self) -> Option<&M::Effects> {
        self.effects.as_ref()
    }

    pub fn output_ports(&self) -> &[PortNo] {
        &self.output_ports
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn insert_time(&self) -> Instant {
        self.insert_time
    }

    pub fn last_counter_change(&self) -> Instant {
        self.last_counter_change
    }

    pub fn removed_reason(&self) -> Option<RemovedReason> {
        self.removed_reason
    }

    /// Which timeout, if any, has lapsed at `now`. Hard timeouts run from
    /// insertion, idle timeouts from the last counter change; zero disables
    /// either clock.
    pub fn expired(&self, now: Instant) -> Option<RemovedReason> {
        if self.hard_timeout > 0
            && now.duration_since(self.insert_time) >= Duration::from_secs(self.hard_timeout as u64)
        {
            return Some(RemovedReason::HardTimeout);
        }
        if self.idle_timeout > 0
            && now.duration_since(self.last_counter_change)
                >= Duration::from_secs(self.idle_timeout as u64)
        {
            return Some(RemovedReason::IdleTimeout);
        }
        None
    }
}
