//! Flow queries: strict / non-strict / overlap / cookie-only selection.
//!
//! A query picks its candidate source by mode (the match index for strict
//! queries, the priority index when a priority filter is present, the
//! all-entries list otherwise), then funnels every candidate through the
//! meta-match predicate.

use crate::entry::FlowEntry;
use crate::hmap::Cursor;
use crate::table::{match_hash, FlowTable};
use crate::types::{Error, FlowMod, MatchKey, PortNo, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueryMode {
    /// Byte-exact match, via the match index.
    Strict,
    /// Entries whose match is at least as specific as the query's.
    NonStrict,
    /// Entries whose match overlaps the query's.
    Overlap,
    /// Cookie/priority/table filters only; the match key is ignored.
    CookieOnly,
}

/// A meta-match record: match key plus the optional secondary filters.
#[derive(Clone)]
pub struct FlowQuery<M: FlowMod> {
    pub mode: QueryMode,
    pub match_key: M::Match,
    /// `Some` demands exact priority equality and routes candidate
    /// selection through the priority index for non-strict modes.
    pub priority: Option<u16>,
    /// Masked cookie filter; inactive while `cookie_mask` is zero.
    pub cookie: u64,
    pub cookie_mask: u64,
    /// `None` is the any-table wildcard.
    pub table_id: Option<u8>,
    /// `None` is the any-port wildcard.
    pub out_port: Option<PortNo>,
}

impl<M: FlowMod> FlowQuery<M> {
    pub fn new(mode: QueryMode, match_key: M::Match) -> Self {
        Self {
            mode,
            match_key,
            priority: None,
            cookie: 0,
            cookie_mask: 0,
            table_id: None,
            out_port: None,
        }
    }

    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn cookie(mut self, cookie: u64, mask: u64) -> Self {
        self.cookie = cookie;
        self.cookie_mask = mask;
        self
    }

    pub fn table(mut self, table_id: u8) -> Self {
        self.table_id = Some(table_id);
        self
    }

    pub fn out_port(mut self, port: PortNo) -> Self {
        self.out_port = Some(port);
        self
    }

    /// The meta-match predicate.
    pub fn matches(&self, entry: &FlowEntry<M>) -> bool {
        if entry.state().is_deleted() {
            return false;
        }
        if self.cookie_mask != 0
            && (self.cookie & self.cookie_mask) != (entry.cookie() & self.cookie_mask)
        {
            return false;
        }
        if let Some(table_id) = self.table_id {
            if table_id != entry.table_id() {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if priority != entry.priority() {
                return false;
            }
        }
        let Some(entry_match) = entry.match_key() else {
            return false;
        };
        match self.mode {
            QueryMode::NonStrict => {
                if !entry_match.more_specific_than(&self.match_key) {
                    return false;
                }
            }
            QueryMode::Strict => {
                if entry_match.as_bytes() != self.match_key.as_bytes() {
                    return false;
                }
            }
            QueryMode::Overlap => {
                if !entry_match.overlaps(&self.match_key) {
                    return false;
                }
            }
            QueryMode::CookieOnly => {}
        }
        // The port filter only narrows real match queries.
        if matches!(self.mode, QueryMode::Strict | QueryMode::NonStrict) {
            if let Some(port) = self.out_port {
                if !entry.output_ports().contains(&port) {
                    return false;
                }
            }
        }
        true
    }
}

impl<M: FlowMod> FlowTable<M> {
    /// Feed candidates to `visit` until it asks to stop.
    fn scan_candidates<'a>(
        &'a self,
        query: &FlowQuery<M>,
        mut visit: impl FnMut(&'a FlowEntry<M>) -> bool,
    ) {
        match (query.mode, query.priority) {
            (QueryMode::Strict, _) => {
                let hash = match_hash(&query.match_key);
                let pool = &self.pool;
                let mut cur = Cursor::default();
                while let Some(slot) = self.by_match.lookup(hash, &mut cur, |slot| {
                    pool[slot as usize]
                        .match_key()
                        .is_some_and(|m| m.as_bytes() == query.match_key.as_bytes())
                }) {
                    if !visit(&self.pool[slot as usize]) {
                        return;
                    }
                }
            }
            (_, Some(priority)) => {
                let pool = &self.pool;
                let mut cur = Cursor::default();
                while let Some(slot) =
                    self.by_priority
                        .lookup(crate::hash::hash_u16(priority), &mut cur, |slot| {
                            pool[slot as usize].priority() == priority
                        })
                {
                    if !visit(&self.pool[slot as usize]) {
                        return;
                    }
                }
            }
            _ => {
                for entry in self.iter() {
                    if !visit(entry) {
                        return;
                    }
                }
            }
        }
    }

    /// First entry satisfying `query`, or [`Error::NotFound`].
    pub fn first_match(&self, query: &FlowQuery<M>) -> Result<&FlowEntry<M>> {
        let mut found = None;
        self.scan_candidates(query, |entry| {
            if query.matches(entry) {
                found = Some(entry);
                return false;
            }
            true
        });
        found.ok_or(Error::NotFound)
    }

    /// Every entry satisfying `query`. Result order is unspecified.
    pub fn query_all(&self, query: &FlowQuery<M>) -> Vec<&FlowEntry<M>> {
        let mut hits = Vec::new();
        self.scan_candidates(query, |entry| {
            if query.matches(entry) {
                hits.push(entry);
            }
            true
        });
        hits
    }
}
