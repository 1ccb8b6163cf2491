//! Generation-stamped traversal over live positions.
//!
//! A [`PositionCursor`] is a detached value: a bucket range, an
//! intra-bucket offset, and the generation captured at creation. It does
//! not borrow the index; instead every advance takes `&KeyIndex` and
//! re-validates the stamp, failing fast with
//! [`Error::ConcurrentModification`] if any structural mutation happened
//! in between. That makes cursors `Send`, cheap to hand to other tasks,
//! and honest about staleness.
//!
//! Cursors split: [`PositionCursor::try_split`] carves off a contiguous
//! high range of buckets into an independent cursor, so a pool of workers
//! can consume one index in parallel, work-stealing style. Traversal
//! order is bucket order then intra-bucket order — never key order, never
//! insertion order.
//!
//! For plain single-threaded iteration, [`Positions`] and [`Keys`] wrap a
//! cursor behind a shared borrow of the index; the borrow rules then make
//! interleaved mutation unrepresentable.

use crate::error::{Error, Result};
use crate::index::KeyIndex;

/// Splitting stops once the remaining work estimate drops below this.
const MIN_SPLIT_SIZE: usize = 8;

/// A splittable, fail-fast cursor over the live positions of a
/// [`KeyIndex`].
///
/// ```rust
/// use intdex::KeyIndex;
///
/// let mut idx = KeyIndex::new();
/// idx.add(10).unwrap();
///
/// let mut cur = idx.cursor();
/// assert_eq!(cur.next(&idx).unwrap(), Some(0));
/// assert_eq!(cur.next(&idx).unwrap(), None);
///
/// let mut stale = idx.cursor();
/// idx.add(11).unwrap();
/// assert!(stale.next(&idx).is_err()); // created before the mutation
/// ```
#[derive(Debug, Clone)]
pub struct PositionCursor {
    generation: u64,
    /// Exact count of positions this cursor has yet to yield.
    expected: usize,
    bucket: usize,
    last_bucket: usize,
    slot: usize,
}

impl PositionCursor {
    pub(crate) fn new(generation: u64, expected: usize, from: usize, limit: usize) -> Self {
        Self {
            generation,
            expected,
            bucket: from,
            last_bucket: limit,
            slot: 0,
        }
    }

    /// Exact number of positions remaining in this cursor's range, kept
    /// current across [`next`](Self::next) and
    /// [`try_split`](Self::try_split).
    #[inline]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Advance to the next live position, or `Ok(None)` when exhausted.
    ///
    /// Fails with [`Error::ConcurrentModification`] if the index was
    /// structurally mutated after this cursor (or its root) was created;
    /// the cursor is unusable afterwards.
    pub fn next(&mut self, index: &KeyIndex) -> Result<Option<u32>> {
        self.check(index)?;
        while self.bucket < self.last_bucket && self.slot >= index.bucket_len(self.bucket) {
            self.bucket += 1;
            self.slot = 0;
        }
        if self.bucket >= self.last_bucket {
            return Ok(None);
        }
        let pos = index.bucket_entry(self.bucket, self.slot);
        self.slot += 1;
        self.expected -= 1;
        Ok(Some(pos))
    }

    /// Carve off roughly the later half of the remaining buckets into an
    /// independent cursor.
    ///
    /// Returns `Ok(None)` when the remaining estimate past the current
    /// bucket is too small to be worth splitting. The two cursors cover
    /// disjoint bucket ranges; together they yield exactly the positions
    /// this cursor would have. Re-validates the generation stamp.
    pub fn try_split(&mut self, index: &KeyIndex) -> Result<Option<PositionCursor>> {
        self.check(index)?;
        let tail: usize = (self.bucket + 1..self.last_bucket)
            .map(|b| index.bucket_len(b))
            .sum();
        let half = tail / 2;
        if half < MIN_SPLIT_SIZE {
            return Ok(None);
        }
        let mut sum = 0;
        for i in (self.bucket + 1..self.last_bucket).rev() {
            sum += index.bucket_len(i);
            if sum > half {
                let handed = PositionCursor::new(self.generation, sum, i, self.last_bucket);
                self.last_bucket = i;
                self.expected -= sum;
                return Ok(Some(handed));
            }
        }
        Ok(None)
    }

    /// Drain the cursor, applying `f` to every remaining position.
    pub fn for_each(mut self, index: &KeyIndex, mut f: impl FnMut(u32)) -> Result<()> {
        while let Some(pos) = self.next(index)? {
            f(pos);
        }
        Ok(())
    }

    #[inline]
    fn check(&self, index: &KeyIndex) -> Result<()> {
        if index.generation() != self.generation {
            return Err(Error::ConcurrentModification);
        }
        Ok(())
    }
}

/// Borrowed iterator over live positions, in bucket order.
///
/// The shared borrow freezes the index for the iterator's lifetime, so
/// the generation stamp cannot mismatch here.
pub struct Positions<'a> {
    index: &'a KeyIndex,
    cursor: PositionCursor,
}

impl<'a> Positions<'a> {
    pub(crate) fn new(index: &'a KeyIndex) -> Self {
        Self {
            index,
            cursor: index.cursor(),
        }
    }
}

impl Iterator for Positions<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.cursor.next(self.index).ok().flatten()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.cursor.expected();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Positions<'_> {}
impl std::iter::FusedIterator for Positions<'_> {}

/// Borrowed iterator over live keys, positionally aligned with
/// [`Positions`] as long as the index is not mutated between the two
/// constructions.
pub struct Keys<'a> {
    inner: Positions<'a>,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(index: &'a KeyIndex) -> Self {
        Self {
            inner: Positions::new(index),
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        let pos = self.inner.next()?;
        Some(self.inner.index.raw_key(pos))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Keys<'_> {}
impl std::iter::FusedIterator for Keys<'_> {}
