//! # intdex
//!
//! Memory-dense indexing of arbitrary `i32` keys onto compact, reusable
//! array positions.
//!
//! The core [`KeyIndex`] assigns each distinct key a dense position
//! (0, 1, 2, ...) at a cost of roughly two `i32`s per entry: the key
//! itself in a [`ChunkedArray`] and one bucket cell locating it. Removed
//! positions are recycled before the position space grows, so positions
//! stay dense and directly usable as indices into parallel value storage.
//! [`IntIntMap`] and [`IntMap`] build exactly that pairing.
//!
//! Traversal goes through splittable, fail-fast cursors
//! ([`PositionCursor`]) or borrowed iterators ([`Positions`], [`Keys`]).
//!
//! ## Example
//!
//! ```rust
//! use intdex::{IntIntMap, KeyIndex};
//!
//! let mut idx = KeyIndex::new();
//! assert_eq!(idx.add(1_000_000).unwrap(), -1); // new key, position 0
//! assert_eq!(idx.add(-5).unwrap(), -2);        // new key, position 1
//! assert_eq!(idx.position(1_000_000), Some(0));
//!
//! let mut ages = IntIntMap::new(-1);
//! ages.put(1_000_000, 41).unwrap();
//! assert_eq!(ages.get(1_000_000), 41);
//! assert_eq!(ages.get(7), -1);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod chunked;
mod cursor;
mod error;
mod index;
mod maps;

pub use chunked::{ChunkedArray, MAX_INDEX};
pub use cursor::{Keys, PositionCursor, Positions};
pub use error::{Error, Result};
pub use index::KeyIndex;
pub use maps::{IntIntMap, IntMap};

#[cfg(test)]
mod proptests;
