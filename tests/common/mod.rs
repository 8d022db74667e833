//! Shared protocol fixture: a toy flow-mod whose match key is a 64-bit
//! value with a per-bit mask. Wildcarding bits makes non-strict and overlap
//! queries meaningful without dragging in a real OpenFlow object model.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use flowtab::{Effects, FlowMod, MatchKey, PortNo};
use smallvec::SmallVec;

/// value (8 bytes LE) followed by mask (8 bytes LE); a zero mask bit
/// wildcards that bit of the value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TestMatch {
    bytes: [u8; 16],
}

impl TestMatch {
    pub fn exact(value: u64) -> Self {
        Self::masked(value, u64::MAX)
    }

    pub fn masked(value: u64, mask: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&(value & mask).to_le_bytes());
        bytes[8..].copy_from_slice(&mask.to_le_bytes());
        Self { bytes }
    }

    fn value(&self) -> u64 {
        u64::from_le_bytes(self.bytes[..8].try_into().unwrap())
    }

    fn mask(&self) -> u64 {
        u64::from_le_bytes(self.bytes[8..].try_into().unwrap())
    }
}

impl MatchKey for TestMatch {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn more_specific_than(&self, other: &Self) -> bool {
        // Every bit the query pins must be pinned to the same value here.
        (self.mask() & other.mask()) == other.mask()
            && (self.value() & other.mask()) == (other.value() & other.mask())
    }

    fn overlaps(&self, other: &Self) -> bool {
        let common = self.mask() & other.mask();
        (self.value() & common) == (other.value() & common)
    }
}

pub struct TestEffects {
    ports: Vec<PortNo>,
}

impl Effects for TestEffects {
    fn output_ports(&self) -> SmallVec<[PortNo; 4]> {
        self.ports.iter().copied().collect()
    }
}

#[derive(Clone, Debug)]
pub struct TestFlow {
    pub match_key: Option<TestMatch>,
    pub priority: u16,
    pub cookie: u64,
    pub flags: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub table_id: u8,
    pub ports: Vec<PortNo>,
}

impl TestFlow {
    pub fn new(value: u64) -> Self {
        Self {
            match_key: Some(TestMatch::exact(value)),
            priority: 100,
            cookie: 0,
            flags: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            table_id: 0,
            ports: vec![1],
        }
    }

    pub fn masked(value: u64, mask: u64) -> Self {
        let mut f = Self::new(0);
        f.match_key = Some(TestMatch::masked(value, mask));
        f
    }

    /// A malformed message the table must reject.
    pub fn without_match() -> Self {
        let mut f = Self::new(0);
        f.match_key = None;
        f
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cookie(mut self, cookie: u64) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn with_table(mut self, table_id: u8) -> Self {
        self.table_id = table_id;
        self
    }

    pub fn with_ports(mut self, ports: &[PortNo]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn with_timeouts(mut self, idle: u16, hard: u16) -> Self {
        self.idle_timeout = idle;
        self.hard_timeout = hard;
        self
    }
}

impl FlowMod for TestFlow {
    type Match = TestMatch;
    type Effects = TestEffects;

    fn match_key(&self) -> Option<TestMatch> {
        self.match_key.clone()
    }

    fn priority(&self) -> u16 {
        self.priority
    }

    fn cookie(&self) -> u64 {
        self.cookie
    }

    fn flags(&self) -> u16 {
        self.flags
    }

    fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    fn table_id(&self) -> u8 {
        self.table_id
    }

    fn effects(&self) -> TestEffects {
        TestEffects {
            ports: self.ports.clone(),
        }
    }
}
