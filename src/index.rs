//! The key → position engine.
//!
//! [`KeyIndex`] relates unique `i32` keys to dense, reusable positions.
//! The first key added gets position 0, the next gets 1, and so on;
//! removing a key leaves a hole that the next add fills before the
//! position space is extended. No two live keys ever share a position,
//! which makes positions directly usable as indices into parallel
//! [`ChunkedArray`] value storage.
//!
//! Internally a bucket table maps a mixed hash of the key to a small
//! sorted run of positions, and an indirect binary search (comparing the
//! keys those positions refer to) resolves the exact slot. Memory
//! overhead is roughly two `i32`s per live entry: one for the key itself
//! and one bucket cell locating it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use smallvec::SmallVec;

use crate::chunked::ChunkedArray;
use crate::cursor::{Keys, PositionCursor, Positions};
use crate::error::{Error, Result};

/// A bucket longer than this triggers a table split.
pub(crate) const IDEAL_BUCKET_SIZE: usize = 64;
/// Bucket counts are powers of two, never below this.
pub(crate) const MIN_BUCKET_COUNT: usize = 16;

/// Hard cap on ever-allocated positions.
const MAX_ENTRIES: usize = i32::MAX as usize;

/// Written into the key array when a position is tombstoned, so deletes
/// are visible in the raw key storage. Not a reserved key value: liveness
/// is decided by the bucket table, never by this marker.
const KEY_SENTINEL: i32 = -1;

/// Inline capacity 8 covers buckets before their first heap spill and the
/// common shallow tombstone stack.
type Bucket = SmallVec<[u32; 8]>;

// =============================================================================
// Hash mixing
// =============================================================================

/// Nibble-folding mix: after the three folds, every output nibble is the
/// XOR of itself and all nibbles above it, so the low bits that select a
/// bucket depend on all 32 bits of the key. Plain low-bit masking would
/// cluster sequential keys into neighboring buckets.
///
/// The mix is bit-stable under table growth: widening the mask by two
/// bits refines each bucket into exactly four, which is what makes
/// [`BucketTable::split`] a pure redistribution.
#[inline]
pub(crate) fn mix(key: i32) -> u32 {
    let h = key as u32;
    let h = h ^ (h >> 16);
    let h = h ^ (h >> 8);
    h ^ (h >> 4)
}

#[inline]
fn spread(v: i32) -> i32 {
    // rotate by the value itself; order-independent when XOR-folded
    (v as u32).rotate_left(v as u32) as i32
}

#[inline]
fn stored_key(keys: &ChunkedArray<i32>, pos: u32) -> i32 {
    // positions in the table were always written, so the row exists
    keys.get_ref(pos as usize).copied().unwrap_or(KEY_SENTINEL)
}

// =============================================================================
// Bucket table
// =============================================================================

/// An array of variable-length sorted buckets holding positions into the
/// key array. Bucket count is a power of two and only ever grows.
struct BucketTable {
    buckets: Vec<Bucket>,
    mask: u32,
}

impl BucketTable {
    fn with_capacity(capacity: usize) -> Self {
        let count = (capacity / IDEAL_BUCKET_SIZE)
            .next_power_of_two()
            .max(MIN_BUCKET_COUNT);
        Self {
            buckets: vec![Bucket::new(); count],
            mask: (count - 1) as u32,
        }
    }

    #[inline]
    fn bucket_id(&self, key: i32) -> usize {
        (self.mask & mix(key)) as usize
    }

    /// Indirect binary search: bucket entries are positions, ordered by
    /// the key each position refers to. `Ok` is the matching slot, `Err`
    /// the insertion point.
    fn locate(
        &self,
        bucket: usize,
        key: i32,
        keys: &ChunkedArray<i32>,
    ) -> std::result::Result<usize, usize> {
        self.buckets[bucket].binary_search_by(|&pos| stored_key(keys, pos).cmp(&key))
    }

    /// Insert `pos` at `slot`, keeping the bucket sorted. Returns true
    /// when the bucket has outgrown the ideal size and the table should
    /// split.
    fn insert(&mut self, bucket: usize, slot: usize, pos: u32) -> bool {
        let entries = &mut self.buckets[bucket];
        entries.insert(slot, pos);
        entries.len() > IDEAL_BUCKET_SIZE
    }

    fn remove(&mut self, bucket: usize, slot: usize) -> u32 {
        self.buckets[bucket].remove(slot)
    }

    /// Quadruple the bucket count, resolving two more bits of the mixed
    /// hash. Each source bucket scatters into exactly four disjoint
    /// destinations with relative order preserved, so no searching or
    /// sorting happens here: one O(n) redistribution pass.
    fn split(&mut self, keys: &ChunkedArray<i32>) {
        let old = mem::take(&mut self.buckets);
        let count = old.len() * 4;
        let mask = (count - 1) as u32;
        let mut buckets = vec![Bucket::new(); count];
        for bucket in old {
            for pos in bucket {
                let id = (mask & mix(stored_key(keys, pos))) as usize;
                buckets[id].push(pos);
            }
        }
        tracing::debug!(buckets = count, "bucket table split");
        self.buckets = buckets;
        self.mask = mask;
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn allocated(&self) -> usize {
        self.buckets.iter().map(|b| b.capacity()).sum()
    }

    fn longest(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).max().unwrap_or(0)
    }
}

// =============================================================================
// KeyIndex
// =============================================================================

/// Memory-dense map from arbitrary `i32` keys to compact positions.
///
/// Guarantees:
/// 1. positions start at 0;
/// 2. absent deletions, each new key gets a position one larger than the
///    previous add;
/// 3. removing a key leaves a hole in the position sequence;
/// 4. a later add reuses the most recently freed hole before extending
///    the position space;
/// 5. no two live keys ever share a position.
///
/// Key values are unrestricted (`i32::MIN..=i32::MAX`); the entry count
/// is capped at `i32::MAX`. Iteration order is arbitrary: neither key
/// order nor insertion order.
///
/// ```rust
/// use intdex::KeyIndex;
///
/// let mut idx = KeyIndex::new();
/// assert_eq!(idx.add(42).unwrap(), -1);      // new key, position 0
/// assert_eq!(idx.add(42).unwrap(), 0);       // existing key
/// assert_eq!(idx.position(42), Some(0));
/// assert_eq!(idx.remove(42), Some(0));
/// assert_eq!(idx.add(7).unwrap(), -1);       // hole at 0 reused
/// ```
pub struct KeyIndex {
    table: BucketTable,
    keys: ChunkedArray<i32>,
    /// Count of ever-allocated positions; live count is this minus the
    /// tombstone count.
    size: usize,
    /// Tombstoned positions, reused LIFO.
    deleted: SmallVec<[u32; 8]>,
    /// Bumped on every structural mutation; cursors validate against it.
    generation: u64,
}

impl KeyIndex {
    /// Create an index with the minimum bucket table.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an index budgeting the bucket table for `capacity` entries
    /// (one bucket per 64 expected keys, at least 16 buckets).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: BucketTable::with_capacity(capacity.min(MAX_ENTRIES)),
            keys: ChunkedArray::with_capacity(capacity.min(MAX_ENTRIES)),
            size: 0,
            deleted: SmallVec::new(),
            generation: 0,
        }
    }

    /// Number of live key → position mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.size - self.deleted.len()
    }

    /// True if there are no live mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `key` is mapped to a position.
    pub fn contains_key(&self, key: i32) -> bool {
        self.position(key).is_some()
    }

    /// True if `position` is currently assigned to a live key.
    pub fn contains_position(&self, position: u32) -> bool {
        (position as usize) < self.size && !self.deleted.contains(&position)
    }

    /// Include `key` in the index.
    ///
    /// For an already-mapped key, returns its position (non-negative).
    /// For a new key, assigns a position `p` and returns the encoded form
    /// `-(p) - 1` (always negative), so callers can tell "existed" from
    /// "created" without a second lookup. Fails only with
    /// [`Error::CapacityExceeded`].
    pub fn add(&mut self, key: i32) -> Result<i32> {
        let bucket = self.table.bucket_id(key);
        match self.table.locate(bucket, key, &self.keys) {
            Ok(slot) => Ok(self.table.buckets[bucket][slot] as i32),
            Err(slot) => {
                let pos = self.allocate(key)?;
                // only key-structure changes invalidate cursors
                self.generation += 1;
                if self.table.insert(bucket, slot, pos) {
                    self.table.split(&self.keys);
                }
                Ok(-(pos as i32) - 1)
            }
        }
    }

    /// The position mapped to `key`, if any. Pure lookup: no allocation,
    /// no generation bump.
    pub fn position(&self, key: i32) -> Option<u32> {
        let bucket = self.table.bucket_id(key);
        self.table
            .locate(bucket, key, &self.keys)
            .ok()
            .map(|slot| self.table.buckets[bucket][slot])
    }

    /// The key mapped to `position`, or `missing` when the position is
    /// not live. Use [`contains_position`](Self::contains_position) to
    /// disambiguate a stored `missing` value.
    pub fn key_at(&self, position: u32, missing: i32) -> i32 {
        if self.contains_position(position) {
            stored_key(&self.keys, position)
        } else {
            missing
        }
    }

    /// Remove `key`, returning the position it held. The position becomes
    /// the first candidate for reuse by a later [`add`](Self::add).
    pub fn remove(&mut self, key: i32) -> Option<u32> {
        let bucket = self.table.bucket_id(key);
        let slot = self.table.locate(bucket, key, &self.keys).ok()?;
        self.generation += 1;
        let pos = self.table.remove(bucket, slot);
        self.deleted.push(pos);
        // cannot fail: pos was in range when allocated
        let wiped = self.keys.set(pos as usize, KEY_SENTINEL);
        debug_assert!(wiped.is_ok());
        Some(pos)
    }

    /// Drop all mappings. Bucket storage is retained for reuse.
    pub fn clear(&mut self) {
        if self.size == 0 {
            return;
        }
        self.generation += 1;
        self.table.clear();
        self.keys.clear();
        self.size = 0;
        self.deleted.clear();
        tracing::debug!("index cleared");
    }

    /// A detached, splittable cursor over all live positions, stamped
    /// with the current generation. See [`PositionCursor`].
    pub fn cursor(&self) -> PositionCursor {
        PositionCursor::new(self.generation, self.len(), 0, self.table.buckets.len())
    }

    /// Iterate over live positions in bucket order.
    pub fn positions(&self) -> Positions<'_> {
        Positions::new(self)
    }

    /// Iterate over live keys, aligned positionally with
    /// [`positions`](Self::positions) as long as no mutation happens
    /// between the two calls.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    /// Eagerly collect all live positions.
    pub fn positions_vec(&self) -> Vec<u32> {
        self.positions().collect()
    }

    /// Eagerly collect all live keys, aligned with
    /// [`positions_vec`](Self::positions_vec) absent intervening mutation.
    pub fn keys_vec(&self) -> Vec<i32> {
        self.keys().collect()
    }

    /// Order-independent hash of the live key set: XOR-fold of each key
    /// rotated by itself. Two indexes holding the same keys hash equal
    /// regardless of insertion history.
    pub fn key_hash(&self) -> i32 {
        self.keys().fold(0, |acc, k| acc ^ spread(k))
    }

    /// Order-independent hash of the live position set, in the same form
    /// as [`key_hash`](Self::key_hash).
    pub fn position_hash(&self) -> i32 {
        self.positions().fold(0, |acc, p| acc ^ spread(p as i32))
    }

    /// One-line diagnostic summary of occupancy and allocated space.
    pub fn report(&self) -> String {
        format!(
            "KeyIndex size {} (used {}, deleted {}) buckets {} hashspace {} longest {} keyspace {}",
            self.len(),
            self.size,
            self.deleted.len(),
            self.table.buckets.len(),
            self.table.allocated(),
            self.table.longest(),
            self.keys.allocated(),
        )
    }

    fn allocate(&mut self, key: i32) -> Result<u32> {
        if let Some(pos) = self.deleted.pop() {
            self.keys.set(pos as usize, key)?;
            return Ok(pos);
        }
        if self.size == MAX_ENTRIES {
            return Err(Error::CapacityExceeded);
        }
        let pos = self.size as u32;
        self.keys.set(self.size, key)?;
        self.size += 1;
        Ok(pos)
    }

    // -------------------------------------------------------------------------
    // Crate-internal accessors for cursors and tests
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.table.buckets.len()
    }

    #[inline]
    pub(crate) fn bucket_len(&self, bucket: usize) -> usize {
        self.table.buckets[bucket].len()
    }

    #[inline]
    pub(crate) fn bucket_entry(&self, bucket: usize, slot: usize) -> u32 {
        self.table.buckets[bucket][slot]
    }

    #[inline]
    pub(crate) fn raw_key(&self, position: u32) -> i32 {
        stored_key(&self.keys, position)
    }

    #[cfg(test)]
    pub(crate) fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    #[cfg(test)]
    pub(crate) fn sum_bucket_lens(&self) -> usize {
        self.table.buckets.iter().map(|b| b.len()).sum()
    }
}

impl Default for KeyIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: two indexes are equal when they hold the exact
/// same key → position mappings, regardless of how they got there.
impl PartialEq for KeyIndex {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        self.positions()
            .all(|pos| other.position(self.raw_key(pos)) == Some(pos))
    }
}

impl Eq for KeyIndex {}

impl Hash for KeyIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.key_hash().rotate_left(13) ^ self.position_hash());
    }
}

impl fmt::Debug for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}
