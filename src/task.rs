//! Cooperative chunked iteration over the whole entry pool.
//!
//! A walk visits every slot by index, skipping free and delete-marked
//! entries, and checks the host scheduler's yield oracle between slots so a
//! big table cannot starve the event loop. No snapshot is taken: the task
//! borrows the table only for the duration of a tick, so flows added at
//! not-yet-visited indices may be observed and deleted flows are skipped.

use crate::entry::FlowEntry;
use crate::query::FlowQuery;
use crate::table::FlowTable;
use crate::types::{FlowMod, FlowState};

/// The host scheduler's yield oracle.
pub trait YieldOracle {
    /// Has this tick used up its slice of the event loop?
    fn should_yield(&mut self) -> bool;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickResult {
    /// The walk is mid-table; schedule another tick.
    Continue,
    /// The walk delivered its end-of-stream callback; drop the task.
    Finished,
}

/// State of one walk. Built by [`FlowTable::iter_task`]; the host registers
/// it at `priority` and calls [`IterTask::tick`] until [`TickResult::Finished`].
pub struct IterTask<M: FlowMod> {
    query: Option<FlowQuery<M>>,
    idx: usize,
    priority: i32,
}

impl<M: FlowMod> FlowTable<M> {
    /// Start a chunked walk over the pool, optionally filtered by `query`.
    pub fn iter_task(&self, query: Option<FlowQuery<M>>, priority: i32) -> IterTask<M> {
        IterTask {
            query,
            idx: 0,
            priority,
        }
    }
}

impl<M: FlowMod> IterTask<M> {
    /// Scheduling priority the host registered the task under.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Visit slots until the walk completes or the oracle asks to yield.
    ///
    /// Each surviving entry is handed to `callback` as `Some`; the walk ends
    /// with a single `None` sentinel and `Finished`.
    pub fn tick(
        &mut self,
        table: &FlowTable<M>,
        oracle: &mut impl YieldOracle,
        mut callback: impl FnMut(Option<&FlowEntry<M>>),
    ) -> TickResult {
        loop {
            if self.idx == table.capacity() {
                callback(None);
                return TickResult::Finished;
            }
            let entry = table.slot(self.idx);
            self.idx += 1;
            if entry.state() != FlowState::Free && !entry.state().is_deleted() {
                match &self.query {
                    Some(query) if !query.matches(entry) => {}
                    _ => callback(Some(entry)),
                }
            }
            if oracle.should_yield() {
                return TickResult::Continue;
            }
        }
    }
}
