//! Bounded flow-entry pool with three hash indexes and two intrusive lists.
//!
//! Slots are allocated once at construction. A slot is either on the free
//! list or live: on the all-entries list (insertion order, newest at the
//! tail) and in the id, priority and match indexes under its current
//! attribute values. The id index is unique; priority and match are
//! multimaps.
//!
//! The table is single-owner: no internal locking, and entry references
//! handed out are valid until the next mutating call.

use crate::entry::{FlowEntry, Links, NIL};
use crate::hash;
use crate::hmap::{Cursor, Hmap};
use crate::types::{
    Error, FlowId, FlowMod, MatchKey, QueuedRequest, RemovedReason, Result, TableStatus,
};
use smallvec::SmallVec;
use std::time::Instant;

pub struct FlowTable<M: FlowMod> {
    pub(crate) pool: Vec<FlowEntry<M>>,
    free_head: u32,
    all_head: u32,
    all_tail: u32,
    pub(crate) by_id: Hmap,
    pub(crate) by_priority: Hmap,
    pub(crate) by_match: Hmap,
    status: TableStatus,
}

#[inline]
pub(crate) fn match_hash<K: MatchKey>(key: &K) -> u32 {
    hash::murmur3_32(key.as_bytes(), 0)
}

impl<M: FlowMod> FlowTable<M> {
    /// Build a table with room for `max_entries` flows.
    pub fn new(max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(Error::Resource);
        }
        let now = Instant::now();
        let mut pool: Vec<FlowEntry<M>> = (0..max_entries)
            .map(|_| FlowEntry::vacant(now))
            .collect();
        // Thread the free list so slots pop in index order.
        for (i, entry) in pool.iter_mut().enumerate() {
            entry.links.next = if i + 1 < max_entries {
                (i + 1) as u32
            } else {
                NIL
            };
        }
        tracing::debug!(max_entries, "flow table created");
        Ok(Self {
            pool,
            free_head: 0,
            all_head: NIL,
            all_tail: NIL,
            by_id: Hmap::new(),
            by_priority: Hmap::new(),
            by_match: Hmap::new(),
            status: TableStatus::default(),
        })
    }

    /// Total slot count.
    pub fn capacity(&self) -> usize {
        self.pool.len()
    }

    /// Live entry count.
    pub fn len(&self) -> usize {
        self.status.current_count
    }

    pub fn is_empty(&self) -> bool {
        self.status.current_count == 0
    }

    pub fn status(&self) -> &TableStatus {
        &self.status
    }

    /// Length of the free list, by walking it.
    pub fn free_len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.free_head;
        while cur != NIL {
            n += 1;
            cur = self.pool[cur as usize].links.next;
        }
        n
    }

    #[inline]
    pub(crate) fn slot(&self, idx: usize) -> &FlowEntry<M> {
        &self.pool[idx]
    }

    // ── intrusive lists ──────────────────────────────────────────────────

    fn pop_free(&mut self) -> Option<u32> {
        let slot = self.free_head;
        if slot == NIL {
            return None;
        }
        self.free_head = self.pool[slot as usize].links.next;
        self.pool[slot as usize].links = Links::default();
        Some(slot)
    }

    fn push_free(&mut self, slot: u32) {
        self.pool[slot as usize].links = Links {
            prev: NIL,
            next: self.free_head,
        };
        self.free_head = slot;
    }

    fn link_all_tail(&mut self, slot: u32) {
        let tail = self.all_tail;
        self.pool[slot as usize].links = Links {
            prev: tail,
            next: NIL,
        };
        match tail {
            NIL => self.all_head = slot,
            t => self.pool[t as usize].links.next = slot,
        }
        self.all_tail = slot;
    }

    fn unlink_all(&mut self, slot: u32) {
        let Links { prev, next } = self.pool[slot as usize].links;
        match prev {
            NIL => self.all_head = next,
            p => self.pool[p as usize].links.next = next,
        }
        match next {
            NIL => self.all_tail = prev,
            n => self.pool[n as usize].links.prev = prev,
        }
        self.pool[slot as usize].links = Links::default();
    }

    // ── id resolution ────────────────────────────────────────────────────

    pub(crate) fn find_slot(&self, id: FlowId) -> Option<u32> {
        let pool = &self.pool;
        let mut cur = Cursor::default();
        self.by_id
            .lookup(hash::hash_u64(id.0), &mut cur, |slot| {
                pool[slot as usize].id == id
            })
    }

    /// Look a flow up by id.
    pub fn lookup(&self, id: FlowId) -> Option<&FlowEntry<M>> {
        self.find_slot(id).map(|slot| &self.pool[slot as usize])
    }

    // ── mutating operations ──────────────────────────────────────────────

    /// Admit a new flow. The message is deep-copied; the returned reference
    /// is valid until the next mutating call.
    pub fn add(&mut self, id: FlowId, fm: &M) -> Result<&FlowEntry<M>> {
        if id == FlowId::INVALID {
            return Err(Error::Unknown);
        }
        if self.find_slot(id).is_some() {
            return Err(Error::Exists);
        }
        let Some(slot) = self.pop_free() else {
            self.status.table_full_errors += 1;
            return Err(Error::Resource);
        };
        let Some(key) = fm.match_key() else {
            // Hand the claimed slot back before surfacing the error.
            self.push_free(slot);
            return Err(Error::Unknown);
        };

        self.pool[slot as usize].occupy(id, fm, key, Instant::now());
        self.link_all_tail(slot);

        let (pri_hash, mat_hash) = {
            let e = &self.pool[slot as usize];
            let mh = e.match_key.as_ref().map(match_hash);
            (hash::hash_u16(e.priority), mh)
        };
        self.by_id.insert(hash::hash_u64(id.0), slot);
        self.by_priority.insert(pri_hash, slot);
        if let Some(mh) = mat_hash {
            self.by_match.insert(mh, slot);
        }

        self.status.adds += 1;
        self.status.current_count += 1;
        tracing::debug!(id = id.0, slot, "flow added");
        Ok(&self.pool[slot as usize])
    }

    /// Remove a flow and recycle its slot.
    pub fn delete(&mut self, id: FlowId) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        self.delete_slot(slot);
        Ok(())
    }

    fn delete_slot(&mut self, slot: u32) {
        let (id, pri_hash, mat_hash, was_marked) = {
            let e = &self.pool[slot as usize];
            (
                e.id,
                hash::hash_u16(e.priority),
                e.match_key.as_ref().map(match_hash),
                e.state.is_deleted(),
            )
        };
        self.by_id.remove(hash::hash_u64(id.0), slot);
        self.by_priority.remove(pri_hash, slot);
        if let Some(mh) = mat_hash {
            self.by_match.remove(mh, slot);
        }
        self.unlink_all(slot);
        if was_marked {
            self.status.pending_deletes -= 1;
        }
        self.pool[slot as usize].vacate();
        self.push_free(slot);
        self.status.current_count -= 1;
        self.status.deletes += 1;
        tracing::debug!(id = id.0, slot, "flow deleted");
    }

    /// Replace a flow's effects and derived output ports. Index membership
    /// is untouched: no key changes.
    pub fn modify_effects(&mut self, id: FlowId, fm: &M) -> Result<()> {
        use crate::types::Effects as _;
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        let e = &mut self.pool[slot as usize];
        let effects = fm.effects();
        e.output_ports = effects.output_ports();
        e.effects = Some(effects);
        self.status.updates += 1;
        Ok(())
    }

    /// Update the masked bits of a flow's cookie; unmasked bits keep their
    /// value.
    pub fn modify_cookie(&mut self, id: FlowId, cookie: u64, mask: u64) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        let e = &mut self.pool[slot as usize];
        e.cookie = (e.cookie & !mask) | (cookie & mask);
        Ok(())
    }

    /// Read out and zero a flow's packet/byte counters.
    pub fn clear_counters(&mut self, id: FlowId) -> Result<(u64, u64)> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        let e = &mut self.pool[slot as usize];
        let out = (e.packets, e.bytes);
        e.packets = 0;
        e.bytes = 0;
        Ok(out)
    }

    /// Fold datapath counter deltas into a flow. A non-zero delta refreshes
    /// the idle-timeout clock.
    pub fn note_counters(
        &mut self,
        id: FlowId,
        packets: u64,
        bytes: u64,
        now: Instant,
    ) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        let e = &mut self.pool[slot as usize];
        if packets > 0 || bytes > 0 {
            e.last_counter_change = now;
        }
        e.packets += packets;
        e.bytes += bytes;
        Ok(())
    }

    /// Flag a flow for deletion. A second mark is a no-op; the first one
    /// records the reason and counts the expiration if that is what it was.
    pub fn mark_deleted(&mut self, id: FlowId, reason: RemovedReason) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        self.mark_slot_deleted(slot, reason);
        Ok(())
    }

    fn mark_slot_deleted(&mut self, slot: u32, reason: RemovedReason) {
        let e = &mut self.pool[slot as usize];
        if e.state.is_deleted() {
            return;
        }
        e.state = crate::types::FlowState::DeleteMarked;
        e.removed_reason = Some(reason);
        self.status.pending_deletes += 1;
        match reason {
            RemovedReason::HardTimeout => self.status.hard_expirations += 1,
            RemovedReason::IdleTimeout => self.status.idle_expirations += 1,
            RemovedReason::Delete => {}
        }
    }

    /// Sweep the all-list and mark every flow whose timeout has lapsed at
    /// `now`. Returns the ids that were marked this pass.
    pub fn expire(&mut self, now: Instant) -> Vec<FlowId> {
        let mut marked = Vec::new();
        let mut cur = self.all_head;
        while cur != NIL {
            let next = self.pool[cur as usize].links.next;
            let e = &self.pool[cur as usize];
            if !e.state.is_deleted() {
                if let Some(reason) = e.expired(now) {
                    let id = e.id;
                    self.mark_slot_deleted(cur, reason);
                    marked.push(id);
                }
            }
            cur = next;
        }
        if !marked.is_empty() {
            tracing::debug!(count = marked.len(), "flows expired");
        }
        marked
    }

    /// Park a deferred request on a flow.
    pub fn queue_request(&mut self, id: FlowId, req: QueuedRequest) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        self.pool[slot as usize].queued_reqs.push(req);
        Ok(())
    }

    /// Take every request parked on a flow.
    pub fn take_queued(&mut self, id: FlowId) -> Result<SmallVec<[QueuedRequest; 2]>> {
        let slot = self.find_slot(id).ok_or(Error::NotFound)?;
        Ok(std::mem::take(&mut self.pool[slot as usize].queued_reqs))
    }

    /// Count a datapath forwarding failure against the table.
    pub fn note_forwarding_error(&mut self) {
        self.status.forwarding_errors += 1;
    }

    /// Iterate live entries in insertion order.
    pub fn iter(&self) -> AllIter<'_, M> {
        AllIter {
            table: self,
            cur: self.all_head,
        }
    }
}

/// All-entries list traversal, insertion order.
pub struct AllIter<'t, M: FlowMod> {
    table: &'t FlowTable<M>,
    cur: u32,
}

impl<'t, M: FlowMod> Iterator for AllIter<'t, M> {
    type Item = &'t FlowEntry<M>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let e = &self.table.pool[self.cur as usize];
        self.cur = e.links.next;
        Some(e)
    }
}
