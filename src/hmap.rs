//! Robin Hood open-addressing hash multimap over opaque item handles.
//!
//! The table maps a 32-bit hash to `u32` item handles and keeps several live
//! entries per hash (multimap). Key bytes are never copied into the table:
//! equality is resolved through a caller-supplied predicate over the item
//! handle, so the same table type serves the id, priority and match indexes
//! of a flow table alike.
//!
//! # Bucket encoding
//! ```text
//! hashes[i] == 0          → never used (FREE)
//! hashes[i] & 0x8000_0000 → tombstone; low 31 bits retain the original hash
//! anything else           → occupied
//! ```
//! User hashes are sanitized to 31 bits (zero remaps to one) so a stored hash
//! can never collide with either sentinel.
//!
//! # Deletion
//! Removal tombstones the bucket instead of backward-shifting. Tombstones keep
//! their hash so probe distances stay computable, which lets an insert reuse a
//! tombstone without breaking the Robin Hood ordering of any live chain, and
//! lets the resumable multimap cursor stay a bare probe distance.

use serde::Serialize;

const FREE: u32 = 0;
const TOMBSTONE: u32 = 0x8000_0000;
const INITIAL_CAPACITY: usize = 8;

/// Load factor selected by `0.0`.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.8;

/// Resumable multimap lookup state: the next probe distance to try.
///
/// Start a fresh scan with `Cursor::default()`; every hit advances the cursor
/// past itself so the next [`Hmap::lookup`] call yields the next entry under
/// the same key.
#[derive(Clone, Copy, Default, Debug)]
pub struct Cursor(u32);

/// Probe-distance distribution of the live entries.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct HmapStats {
    pub count: usize,
    pub capacity: usize,
    pub mean_probe: f64,
    pub variance_probe: f64,
}

pub struct Hmap {
    hashes: Vec<u32>,
    items: Vec<u32>,
    count: usize,
    grow_at: usize,
    max_load_factor: f32,
}

impl Default for Hmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Hmap {
    pub fn new() -> Self {
        Self::with_load_factor(DEFAULT_MAX_LOAD_FACTOR)
    }

    /// `max_load_factor == 0.0` selects [`DEFAULT_MAX_LOAD_FACTOR`]. Values
    /// are clamped to `(0, 1]`; past 1.0 a full table would probe forever.
    pub fn with_load_factor(max_load_factor: f32) -> Self {
        let lf = if max_load_factor <= 0.0 {
            DEFAULT_MAX_LOAD_FACTOR
        } else {
            max_load_factor.min(1.0)
        };
        Self {
            hashes: vec![FREE; INITIAL_CAPACITY],
            items: vec![0; INITIAL_CAPACITY],
            count: 0,
            grow_at: (INITIAL_CAPACITY as f32 * lf) as usize,
            max_load_factor: lf,
        }
    }

    /// Live entry count (tombstones excluded).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bucket count. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.hashes.len()
    }

    #[inline]
    fn mask(&self) -> u32 {
        (self.hashes.len() - 1) as u32
    }

    /// Clamp a user hash to 31 bits, remapping zero so no live entry can
    /// collide with the never-used sentinel.
    #[inline]
    fn sanitize(raw: u32) -> u32 {
        let h = raw & !TOMBSTONE;
        if h == FREE {
            1
        } else {
            h
        }
    }

    #[inline]
    fn is_tombstone(stored: u32) -> bool {
        stored & TOMBSTONE != 0
    }

    /// Slots between `stored`'s ideal bucket and `idx`, wrapping.
    #[inline]
    fn probe_distance(&self, idx: u32, stored: u32) -> u32 {
        let ideal = (stored & !TOMBSTONE) & self.mask();
        idx.wrapping_sub(ideal) & self.mask()
    }

    /// Insert `item` under `raw_hash`. Multiple items may share a hash; the
    /// caller's equality predicate disambiguates at lookup time.
    pub fn insert(&mut self, raw_hash: u32, item: u32) {
        if self.count >= self.grow_at {
            self.grow();
        }
        self.place(Self::sanitize(raw_hash), item);
        self.count += 1;
    }

    /// Robin Hood placement of an already-sanitized pair.
    fn place(&mut self, mut hash: u32, mut item: u32) {
        let mask = self.mask();
        let mut d: u32 = 0;
        loop {
            let idx = (hash.wrapping_add(d) & mask) as usize;
            let stored = self.hashes[idx];
            if stored == FREE {
                self.hashes[idx] = hash;
                self.items[idx] = item;
                return;
            }
            let bd = self.probe_distance(idx as u32, stored);
            if Self::is_tombstone(stored) {
                // Reuse a tombstone only once we have probed strictly past its
                // retained distance; earlier reuse could shadow a live chain.
                if d > bd {
                    self.hashes[idx] = hash;
                    self.items[idx] = item;
                    return;
                }
            } else if d > bd {
                // Rob the closer-to-home occupant; it continues the search
                // from one past its own slot.
                std::mem::swap(&mut self.hashes[idx], &mut hash);
                std::mem::swap(&mut self.items[idx], &mut item);
                d = bd;
            }
            d += 1;
        }
    }

    /// Find the next item stored under `raw_hash` for which `eq` holds,
    /// resuming from `cur`.
    ///
    /// A live occupant closer to its home than our current probe distance
    /// proves the chain is exhausted (Robin Hood short-circuit). Tombstones
    /// never short-circuit: a later live entry may still belong to the chain.
    pub fn lookup(
        &self,
        raw_hash: u32,
        cur: &mut Cursor,
        mut eq: impl FnMut(u32) -> bool,
    ) -> Option<u32> {
        let hash = Self::sanitize(raw_hash);
        let mask = self.mask();
        let size = self.hashes.len() as u32;
        let mut d = cur.0;
        while d < size {
            let idx = (hash.wrapping_add(d) & mask) as usize;
            let stored = self.hashes[idx];
            if stored == FREE {
                return None;
            }
            if stored == hash && eq(self.items[idx]) {
                cur.0 = d + 1;
                return Some(self.items[idx]);
            }
            if !Self::is_tombstone(stored) && self.probe_distance(idx as u32, stored) < d {
                return None;
            }
            d += 1;
        }
        None
    }

    /// Tombstone the bucket holding exactly this `(raw_hash, item)` pair.
    ///
    /// The pair must have been inserted and not yet removed; removing an
    /// absent pair is a caller bug and panics.
    pub fn remove(&mut self, raw_hash: u32, item: u32) {
        let hash = Self::sanitize(raw_hash);
        let mask = self.mask();
        let size = self.hashes.len() as u32;
        let mut d = 0;
        while d < size {
            let idx = (hash.wrapping_add(d) & mask) as usize;
            let stored = self.hashes[idx];
            if stored == hash && self.items[idx] == item {
                // Keep the hash bits so probe distances through this bucket
                // stay computable.
                self.hashes[idx] = stored | TOMBSTONE;
                self.count -= 1;
                return;
            }
            if stored == FREE
                || (!Self::is_tombstone(stored) && self.probe_distance(idx as u32, stored) < d)
            {
                break;
            }
            d += 1;
        }
        panic!("hmap: remove of item {item} not present under hash {raw_hash:#010x}");
    }

    /// Double the bucket arrays and re-seat every live entry. Stored hashes
    /// are reused verbatim; tombstones are dropped on the floor. Growth is
    /// one-way.
    fn grow(&mut self) {
        let new_cap = self.hashes.len() * 2;
        let old_hashes = std::mem::replace(&mut self.hashes, vec![FREE; new_cap]);
        let old_items = std::mem::replace(&mut self.items, vec![0; new_cap]);
        self.grow_at = (new_cap as f32 * self.max_load_factor) as usize;
        for (stored, item) in old_hashes.into_iter().zip(old_items) {
            if stored != FREE && !Self::is_tombstone(stored) {
                self.place(stored, item);
            }
        }
    }

    /// Iterate live item handles in bucket order.
    pub fn items(&self) -> impl Iterator<Item = u32> + '_ {
        self.hashes
            .iter()
            .zip(&self.items)
            .filter_map(|(&stored, &item)| {
                (stored != FREE && !Self::is_tombstone(stored)).then_some(item)
            })
    }

    /// Probe-distance moments over the live slots, emitted to the tracing
    /// sink. The empty table reports zeroed moments.
    pub fn stats(&self) -> HmapStats {
        let mut n = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for (idx, &stored) in self.hashes.iter().enumerate() {
            if stored == FREE || Self::is_tombstone(stored) {
                continue;
            }
            let d = self.probe_distance(idx as u32, stored) as f64;
            n += 1;
            sum += d;
            sum_sq += d * d;
        }
        let (mean_probe, variance_probe) = if n == 0 {
            (0.0, 0.0)
        } else {
            let mean = sum / n as f64;
            (mean, sum_sq / n as f64 - mean * mean)
        };
        let stats = HmapStats {
            count: n,
            capacity: self.hashes.len(),
            mean_probe,
            variance_probe,
        };
        tracing::debug!(
            count = stats.count,
            capacity = stats.capacity,
            mean_probe = stats.mean_probe,
            variance_probe = stats.variance_probe,
            "hmap probe stats"
        );
        stats
    }
}
