//! Sparse, auto-growing array storage.
//!
//! [`ChunkedArray`] is logically an infinite array of `T`, physically a
//! two-level row/column matrix. Rows have a fixed width (256) and are
//! allocated lazily on first write, so the only structure that ever grows
//! is the outer row sequence. This keeps growth cheap and incremental:
//! - No large-block reallocation: rows never resize, only the (small)
//!   outer sequence does.
//! - Unused regions stay unallocated: reads of never-written positions
//!   return `T::default()` without allocating.
//! - Worst case for `set(i32::MAX as usize, v)` is one 256-slot row plus
//!   an outer sequence of row slots, not a 2^31-slot block.
//!
//! Positions assigned by [`KeyIndex`](crate::KeyIndex) are dense and start
//! at zero, which makes this the natural backing store for key values and
//! for any value array a map wrapper pairs with the index.

use std::mem;

use crate::error::{Error, Result};

/// Row width as a shift: rows hold `1 << ROW_SHIFT` slots.
pub const ROW_SHIFT: usize = 8;
/// Number of slots in one row.
pub const ROW_EXTENT: usize = 1 << ROW_SHIFT;
/// Mask extracting the column from an index.
pub const ROW_MASK: usize = ROW_EXTENT - 1;

/// Largest addressable index. The crate-wide entry cap is `i32::MAX`
/// entries, so indices fit in an `i32` even though the API takes `usize`.
pub const MAX_INDEX: usize = i32::MAX as usize;

const MAX_ROWS: usize = (MAX_INDEX >> ROW_SHIFT) + 1;

#[inline]
fn row_of(index: usize) -> usize {
    index >> ROW_SHIFT
}

#[inline]
fn col_of(index: usize) -> usize {
    index & ROW_MASK
}

/// Number of rows required to contain `size` values.
#[inline]
pub(crate) fn rows_for(size: usize) -> usize {
    if size == 0 {
        0
    } else {
        1 + ((size - 1) >> ROW_SHIFT)
    }
}

/// Next length for a growing sequence: ~25% larger, saturating at `max`.
///
/// Fails with [`Error::CapacityExceeded`] when saturation makes no
/// progress, which is the only way growth can be refused.
pub(crate) fn grow_len(from: usize, max: usize) -> Result<usize> {
    if from == 0 {
        return Ok(8.min(max));
    }
    let next = (from + (from >> 2) + 1).min(max);
    if next <= from {
        return Err(Error::CapacityExceeded);
    }
    Ok(next)
}

/// A sparse, dynamically growable array of `T` addressed by non-negative
/// position.
///
/// There is no notion of "size", only a *bound*: the largest index ever
/// written (`None` while empty). Reads anywhere in `0..=MAX_INDEX` are
/// valid and return `T::default()` for never-written positions.
///
/// ```rust
/// use intdex::ChunkedArray;
///
/// let mut a: ChunkedArray<i32> = ChunkedArray::new();
/// assert_eq!(a.get(100_000).unwrap(), 0);  // sparse read, no allocation
/// assert_eq!(a.set(3, 7).unwrap(), 0);     // returns the previous value
/// assert_eq!(a.get(3).unwrap(), 7);
/// assert_eq!(a.bound(), Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct ChunkedArray<T> {
    rows: Vec<Option<Box<[T]>>>,
    bound: Option<usize>,
}

impl<T: Clone + Default> ChunkedArray<T> {
    /// Create an empty array with no rows allocated.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            bound: None,
        }
    }

    /// Create an empty array budgeting row slots for `capacity` values.
    ///
    /// Only the outer row sequence is reserved; rows themselves are still
    /// allocated lazily.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = rows_for(capacity.min(MAX_INDEX + 1)).max(1);
        Self {
            rows: vec![None; slots],
            bound: None,
        }
    }

    /// The largest index ever written, or `None` if nothing was written.
    #[inline]
    pub fn bound(&self) -> Option<usize> {
        self.bound
    }

    /// Number of addressable values below the bound (`bound + 1`).
    #[inline]
    pub fn len(&self) -> usize {
        self.bound.map_or(0, |b| b + 1)
    }

    /// True if nothing has been written since creation or [`clear`](Self::clear).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bound.is_none()
    }

    /// True if the bound has reached [`MAX_INDEX`]; [`push`](Self::push)
    /// will refuse further values.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.bound == Some(MAX_INDEX)
    }

    /// Read the value at `index`, cloning it out.
    ///
    /// Never allocates: never-written positions read as `T::default()`.
    /// Fails with [`Error::InvalidIndex`] beyond [`MAX_INDEX`].
    pub fn get(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        Ok(self
            .row(index)
            .map(|line| line[col_of(index)].clone())
            .unwrap_or_default())
    }

    /// Borrow the value at `index`, or `None` when the position was never
    /// written (its row is unallocated) or the index is out of range.
    ///
    /// Unlike [`get`](Self::get) this cannot hand out a default for a
    /// missing slot, since there is no stored value to borrow.
    pub fn get_ref(&self, index: usize) -> Option<&T> {
        if index > MAX_INDEX {
            return None;
        }
        self.row(index).map(|line| &line[col_of(index)])
    }

    /// Store `value` at `index`, returning the previous value there.
    ///
    /// Allocates the row holding `index` if needed, growing the outer row
    /// sequence by the 25%+1 rule.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        self.check_index(index)?;
        self.touch(index);
        let line = self.ensure_row(row_of(index))?;
        Ok(mem::replace(&mut line[col_of(index)], value))
    }

    /// Read-modify-write at `index` without a separate get+set round trip.
    pub fn apply(&mut self, index: usize, op: impl FnOnce(T) -> T) -> Result<()> {
        self.post_apply(index, op).map(|_| ())
    }

    /// Apply `op` at `index` and return the value as it was *before*.
    pub fn post_apply(&mut self, index: usize, op: impl FnOnce(T) -> T) -> Result<T> {
        self.check_index(index)?;
        self.touch(index);
        let line = self.ensure_row(row_of(index))?;
        let slot = &mut line[col_of(index)];
        let old = slot.clone();
        *slot = op(slot.clone());
        Ok(old)
    }

    /// Apply `op` at `index` and return the value as it is *after*.
    pub fn pre_apply(&mut self, index: usize, op: impl FnOnce(T) -> T) -> Result<T> {
        self.check_index(index)?;
        self.touch(index);
        let line = self.ensure_row(row_of(index))?;
        let slot = &mut line[col_of(index)];
        *slot = op(slot.clone());
        Ok(slot.clone())
    }

    /// Append `value` one past the current bound, returning its index.
    pub fn push(&mut self, value: T) -> Result<usize> {
        let index = match self.bound {
            None => 0,
            Some(MAX_INDEX) => return Err(Error::CapacityExceeded),
            Some(b) => b + 1,
        };
        self.set(index, value)?;
        Ok(index)
    }

    /// Remove and return the value at the bound, resetting that slot to
    /// `T::default()`. Returns `None` on an empty array.
    pub fn pop(&mut self) -> Option<T> {
        let b = self.bound?;
        let old = match self.row_mut(b) {
            Some(line) => mem::take(&mut line[col_of(b)]),
            None => T::default(),
        };
        self.bound = b.checked_sub(1);
        Some(old)
    }

    /// Logically empty the array: reset the bound and drop all rows. The
    /// outer row sequence keeps its length for reuse.
    pub fn clear(&mut self) {
        self.bound = None;
        for row in &mut self.rows {
            *row = None;
        }
    }

    /// Iterate, in index order, over all values up to the bound.
    /// Never-written positions yield `T::default()`.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |index| {
            self.row(index)
                .map(|line| line[col_of(index)].clone())
                .unwrap_or_default()
        })
    }

    #[inline]
    fn check_index(&self, index: usize) -> Result<()> {
        if index > MAX_INDEX {
            return Err(Error::InvalidIndex { index });
        }
        Ok(())
    }

    #[inline]
    fn touch(&mut self, index: usize) {
        if self.bound.map_or(true, |b| index > b) {
            self.bound = Some(index);
        }
    }

    #[inline]
    fn row(&self, index: usize) -> Option<&[T]> {
        self.rows.get(row_of(index)).and_then(|r| r.as_deref())
    }

    #[inline]
    fn row_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.rows.get_mut(row_of(index)).and_then(|r| r.as_deref_mut())
    }

    fn ensure_row(&mut self, row: usize) -> Result<&mut [T]> {
        if row >= self.rows.len() {
            let target = grow_len(self.rows.len(), MAX_ROWS)?.max(row + 1);
            self.rows.resize(target, None);
        }
        let line = self.rows[row]
            .get_or_insert_with(|| vec![T::default(); ROW_EXTENT].into_boxed_slice());
        Ok(line)
    }
}

impl<T> ChunkedArray<T> {
    /// Number of value slots backed by allocated rows.
    pub fn allocated(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count() * ROW_EXTENT
    }
}

impl<T: Clone + Default> Default for ChunkedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Logical equality: equal bounds and equal values, with unallocated rows
/// reading as rows of defaults on either side.
impl<T: Clone + Default + PartialEq> PartialEq for ChunkedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.bound != other.bound {
            return false;
        }
        let limit = self.bound.map_or(0, |b| row_of(b) + 1);
        (0..limit).all(|r| {
            let a = self.rows.get(r).and_then(|x| x.as_deref());
            let b = other.rows.get(r).and_then(|x| x.as_deref());
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                (Some(x), None) | (None, Some(x)) => {
                    x.iter().all(|v| *v == T::default())
                }
                (None, None) => true,
            }
        })
    }
}

impl<T: Clone + Default + Eq> Eq for ChunkedArray<T> {}
