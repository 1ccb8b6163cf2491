//! Typed-value maps built on the key → position engine.
//!
//! These wrappers pair a [`KeyIndex`] with [`ChunkedArray`] value storage:
//! the index hands out dense positions and the value array is addressed by
//! them, so per-entry overhead stays at the index's two `i32`s plus the
//! value itself.
//!
//! - [`IntIntMap`]: `i32 → i32` with a caller-chosen "missing" sentinel,
//!   about 12 bytes per entry.
//! - [`IntMap<V>`]: `i32 → V` for arbitrary cloneable values.
//!
//! Value writes never bump the index generation: only key-structure
//! mutations (insert of a new key, remove, clear) invalidate cursors.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::chunked::ChunkedArray;
use crate::cursor::Keys;
use crate::error::Result;
use crate::index::KeyIndex;

#[inline]
fn decode(raw: i32) -> usize {
    // add() returns the position directly for existing keys, -(pos)-1 for new
    if raw >= 0 {
        raw as usize
    } else {
        (-raw - 1) as usize
    }
}

// =============================================================================
// IntIntMap
// =============================================================================

/// A memory-dense `i32 → i32` map.
///
/// Each instance carries a `missing` value chosen at construction,
/// returned by [`get`](Self::get), [`put`](Self::put) and
/// [`remove`](Self::remove) when the key is not mapped. Storing `missing`
/// itself as a value is legal; use [`contains_key`](Self::contains_key)
/// to disambiguate.
///
/// ```rust
/// use intdex::IntIntMap;
///
/// let mut m = IntIntMap::new(-1);
/// assert_eq!(m.put(10, 100).unwrap(), -1); // no previous value
/// assert_eq!(m.put(10, 200).unwrap(), 100);
/// assert_eq!(m.get(10), 200);
/// assert_eq!(m.remove(10), 200);
/// assert_eq!(m.get(10), -1);
/// ```
pub struct IntIntMap {
    index: KeyIndex,
    values: ChunkedArray<i32>,
    missing: i32,
}

impl IntIntMap {
    /// Create a map with a default capacity budget (128 entries).
    pub fn new(missing: i32) -> Self {
        Self::with_capacity(missing, 128)
    }

    /// Create a map returning `missing` for absent keys, budgeting for
    /// `capacity` entries.
    pub fn with_capacity(missing: i32, capacity: usize) -> Self {
        Self {
            index: KeyIndex::with_capacity(capacity),
            values: ChunkedArray::with_capacity(capacity),
            missing,
        }
    }

    /// The sentinel returned for keys that are not mapped.
    #[inline]
    pub fn missing(&self) -> i32 {
        self.missing
    }

    /// Number of live mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if there are no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// True if `key` is mapped.
    pub fn contains_key(&self, key: i32) -> bool {
        self.index.contains_key(key)
    }

    /// Map `key` to `value`, returning the previous value or the missing
    /// sentinel. Fails only on capacity exhaustion.
    pub fn put(&mut self, key: i32, value: i32) -> Result<i32> {
        let raw = self.index.add(key)?;
        let old = self.values.set(decode(raw), value)?;
        Ok(if raw >= 0 { old } else { self.missing })
    }

    /// The value mapped to `key`, or the missing sentinel.
    pub fn get(&self, key: i32) -> i32 {
        match self.index.position(key) {
            Some(pos) => self.values.get(pos as usize).unwrap_or(self.missing),
            None => self.missing,
        }
    }

    /// Remove `key`, returning its value or the missing sentinel.
    pub fn remove(&mut self, key: i32) -> i32 {
        match self.index.remove(key) {
            // reset the slot so a recycled position starts clean
            Some(pos) => self.values.set(pos as usize, 0).unwrap_or(self.missing),
            None => self.missing,
        }
    }

    /// Drop all mappings, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.index.clear();
        self.values.clear();
    }

    /// Iterate over the keys, in arbitrary order.
    pub fn keys(&self) -> Keys<'_> {
        self.index.keys()
    }

    /// Iterate over the values, positionally aligned with
    /// [`keys`](Self::keys) absent intervening mutation.
    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.index
            .positions()
            .map(move |pos| self.values.get(pos as usize).unwrap_or(self.missing))
    }

    /// Iterate over `(key, value)` pairs, in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.index.positions().map(move |pos| {
            (
                self.index.raw_key(pos),
                self.values.get(pos as usize).unwrap_or(self.missing),
            )
        })
    }

    /// Eagerly collect the keys.
    pub fn keys_vec(&self) -> Vec<i32> {
        self.keys().collect()
    }

    /// Eagerly collect the values, aligned with
    /// [`keys_vec`](Self::keys_vec) absent intervening mutation.
    pub fn values_vec(&self) -> Vec<i32> {
        self.values().collect()
    }

    /// Apply `op` to every `(key, value)` pair and store the result back
    /// as the new value.
    ///
    /// ```rust
    /// # use intdex::IntIntMap;
    /// let mut m = IntIntMap::new(0);
    /// m.put(2, 10).unwrap();
    /// m.put(3, 10).unwrap();
    /// m.update_values(|k, v| k * v).unwrap();
    /// assert_eq!(m.get(2), 20);
    /// assert_eq!(m.get(3), 30);
    /// ```
    pub fn update_values(&mut self, mut op: impl FnMut(i32, i32) -> i32) -> Result<()> {
        for pos in self.index.positions() {
            let key = self.index.raw_key(pos);
            let old = self.values.get(pos as usize)?;
            self.values.set(pos as usize, op(key, old))?;
        }
        Ok(())
    }

    /// One-line diagnostic summary.
    pub fn report(&self) -> String {
        format!(
            "IntIntMap missing {} valspace {} | {}",
            self.missing,
            self.values.allocated(),
            self.index.report(),
        )
    }
}

/// Structural equality over `(key, value)` pairs, independent of
/// insertion history and of the two maps' missing sentinels.
impl PartialEq for IntIntMap {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        self.entries().all(|(k, v)| match other.index.position(k) {
            Some(pos) => other.values.get(pos as usize).ok() == Some(v),
            None => false,
        })
    }
}

impl Eq for IntIntMap {}

impl Hash for IntIntMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let folded = self
            .entries()
            .fold(0i32, |acc, (k, v)| acc ^ (k.rotate_left(13) ^ v));
        state.write_i32(folded);
    }
}

impl fmt::Debug for IntIntMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

impl fmt::Display for IntIntMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

// =============================================================================
// IntMap<V>
// =============================================================================

/// A memory-dense `i32 → V` map for cloneable values.
///
/// Values are held in a [`ChunkedArray`] of `Option<V>` addressed by the
/// positions the index assigns, so the map inherits the index's dense
/// position recycling.
///
/// ```rust
/// use intdex::IntMap;
///
/// let mut m: IntMap<String> = IntMap::new();
/// assert_eq!(m.put(1, "one".to_string()).unwrap(), None);
/// assert_eq!(m.get(1).map(String::as_str), Some("one"));
/// assert_eq!(m.remove(1).as_deref(), Some("one"));
/// assert_eq!(m.get(1), None);
/// ```
pub struct IntMap<V> {
    index: KeyIndex,
    values: ChunkedArray<Option<V>>,
}

impl<V: Clone> IntMap<V> {
    /// Create an empty map with the minimum capacity budget.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty map budgeting for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: KeyIndex::with_capacity(capacity),
            values: ChunkedArray::with_capacity(capacity),
        }
    }

    /// Number of live mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if there are no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// True if `key` is mapped.
    pub fn contains_key(&self, key: i32) -> bool {
        self.index.contains_key(key)
    }

    /// Map `key` to `value`, returning the previous value if the key was
    /// already mapped. Fails only on capacity exhaustion.
    pub fn put(&mut self, key: i32, value: V) -> Result<Option<V>> {
        let raw = self.index.add(key)?;
        let old = self.values.set(decode(raw), Some(value))?;
        Ok(if raw >= 0 { old } else { None })
    }

    /// Borrow the value mapped to `key`.
    pub fn get(&self, key: i32) -> Option<&V> {
        let pos = self.index.position(key)?;
        self.values.get_ref(pos as usize)?.as_ref()
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: i32) -> Option<V> {
        let pos = self.index.remove(key)?;
        // take the value out so the slot is clean for reuse
        self.values.set(pos as usize, None).unwrap_or(None)
    }

    /// Drop all mappings, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.index.clear();
        self.values.clear();
    }

    /// Iterate over the keys, in arbitrary order.
    pub fn keys(&self) -> Keys<'_> {
        self.index.keys()
    }

    /// Iterate over the values, positionally aligned with
    /// [`keys`](Self::keys) absent intervening mutation.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.index
            .positions()
            .filter_map(move |pos| self.values.get_ref(pos as usize)?.as_ref())
    }

    /// Iterate over `(key, &value)` pairs, in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (i32, &V)> + '_ {
        self.index.positions().filter_map(move |pos| {
            let value = self.values.get_ref(pos as usize)?.as_ref()?;
            Some((self.index.raw_key(pos), value))
        })
    }

    /// One-line diagnostic summary.
    pub fn report(&self) -> String {
        format!(
            "IntMap valspace {} | {}",
            self.values.allocated(),
            self.index.report(),
        )
    }
}

impl<V: Clone> Default for IntMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality over `(key, value)` pairs, independent of
/// insertion history.
impl<V: Clone + PartialEq> PartialEq for IntMap<V> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        self.entries()
            .all(|(k, v)| other.get(k).map_or(false, |w| *w == *v))
    }
}

impl<V: Clone + Eq> Eq for IntMap<V> {}

impl<V> fmt::Debug for IntMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntMap valspace {} | {}",
            self.values.allocated(),
            self.index.report(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_int_basic() {
        let mut m = IntIntMap::new(-1);
        assert!(m.is_empty());
        assert_eq!(m.missing(), -1);
        assert_eq!(m.get(1), -1);

        assert_eq!(m.put(1, 10).unwrap(), -1);
        assert_eq!(m.put(2, 20).unwrap(), -1);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(1), 10);
        assert_eq!(m.get(2), 20);

        assert_eq!(m.put(1, 11).unwrap(), 10);
        assert_eq!(m.get(1), 11);
        assert!(m.contains_key(1));
        assert!(!m.contains_key(3));
    }

    #[test]
    fn int_int_remove_and_reuse() {
        let mut m = IntIntMap::new(0);
        m.put(1, 100).unwrap();
        m.put(2, 200).unwrap();
        assert_eq!(m.remove(1), 100);
        assert_eq!(m.remove(1), 0);
        assert_eq!(m.len(), 1);

        // position 0 is recycled for the next new key; the old value
        // must not bleed through
        assert_eq!(m.put(3, 300).unwrap(), 0);
        assert_eq!(m.get(3), 300);
        assert_eq!(m.get(1), 0);
    }

    #[test]
    fn int_int_missing_value_storable() {
        let mut m = IntIntMap::new(-1);
        m.put(5, -1).unwrap();
        assert_eq!(m.get(5), -1);
        assert!(m.contains_key(5));
        assert_eq!(m.remove(5), -1);
        assert!(!m.contains_key(5));
    }

    #[test]
    fn int_int_boundary_keys() {
        let mut m = IntIntMap::new(0);
        m.put(i32::MIN, 1).unwrap();
        m.put(i32::MAX, 2).unwrap();
        m.put(0, 3).unwrap();
        assert_eq!(m.get(i32::MIN), 1);
        assert_eq!(m.get(i32::MAX), 2);
        assert_eq!(m.get(0), 3);
    }

    #[test]
    fn int_int_iteration_aligned() {
        let mut m = IntIntMap::new(0);
        for k in 0..100 {
            m.put(k, k * 2).unwrap();
        }
        let keys = m.keys_vec();
        let values = m.values_vec();
        assert_eq!(keys.len(), 100);
        for (k, v) in keys.iter().zip(&values) {
            assert_eq!(*v, k * 2);
        }
        for (k, v) in m.entries() {
            assert_eq!(v, k * 2);
        }
    }

    #[test]
    fn int_int_update_values() {
        let mut m = IntIntMap::new(0);
        m.put(2, 10).unwrap();
        m.put(5, 10).unwrap();
        m.update_values(|k, v| k * v).unwrap();
        assert_eq!(m.get(2), 20);
        assert_eq!(m.get(5), 50);
    }

    #[test]
    fn int_int_equality_reflexive_and_order_independent() {
        let mut a = IntIntMap::new(-1);
        let mut b = IntIntMap::new(0); // different sentinel, same content

        assert_eq!(a, a);
        assert_eq!(a, b);

        a.put(1, 10).unwrap();
        a.put(2, 20).unwrap();
        b.put(2, 20).unwrap();
        b.put(1, 10).unwrap();
        assert_eq!(a, a);
        assert_eq!(a, b);

        b.put(2, 99).unwrap();
        assert_ne!(a, b);
        b.put(2, 20).unwrap();
        assert_eq!(a, b);

        b.remove(1);
        assert_ne!(a, b);
    }

    #[test]
    fn int_int_clear() {
        let mut m = IntIntMap::new(-1);
        m.put(1, 10).unwrap();
        m.put(2, 20).unwrap();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.get(1), -1);
        m.put(7, 70).unwrap();
        assert_eq!(m.get(7), 70);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn generic_map_basic() {
        let mut m: IntMap<String> = IntMap::new();
        assert_eq!(m.put(1, "one".into()).unwrap(), None);
        assert_eq!(m.put(2, "two".into()).unwrap(), None);
        assert_eq!(
            m.put(1, "uno".into()).unwrap(),
            Some("one".to_string())
        );
        assert_eq!(m.get(1).map(String::as_str), Some("uno"));
        assert_eq!(m.get(3), None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn generic_map_remove_takes_value() {
        let mut m: IntMap<Vec<u8>> = IntMap::new();
        m.put(1, vec![1, 2, 3]).unwrap();
        assert_eq!(m.remove(1), Some(vec![1, 2, 3]));
        assert_eq!(m.remove(1), None);
        assert!(m.is_empty());

        // the recycled position must not resurrect the old value
        m.put(9, vec![9]).unwrap();
        assert_eq!(m.get(9), Some(&vec![9u8]));
        assert_eq!(m.get(1), None);
    }

    #[test]
    fn generic_map_iteration() {
        let mut m: IntMap<String> = IntMap::new();
        for k in 0..50 {
            m.put(k, format!("v{k}")).unwrap();
        }
        assert_eq!(m.values().count(), 50);
        for (k, v) in m.entries() {
            assert_eq!(v, &format!("v{k}"));
        }
        let mut keys = m.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(keys, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn generic_map_equality() {
        let mut a: IntMap<String> = IntMap::new();
        let mut b: IntMap<String> = IntMap::new();
        a.put(1, "x".into()).unwrap();
        b.put(1, "x".into()).unwrap();
        assert_eq!(a, a);
        assert_eq!(a, b);
        b.put(1, "y".into()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reports_render() {
        let mut m = IntIntMap::new(-1);
        m.put(1, 2).unwrap();
        assert!(m.report().contains("IntIntMap"));
        assert!(format!("{m}").contains("size 1"));

        let mut g: IntMap<u8> = IntMap::new();
        g.put(1, 2).unwrap();
        assert!(g.report().contains("IntMap"));
    }
}
