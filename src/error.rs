//! Error taxonomy for the index and array layers.
//!
//! Absent keys are never errors: lookups and removals report absence
//! through `Option` or a caller-chosen sentinel. The variants here cover
//! contract violations and genuine resource exhaustion, raised directly
//! to the immediate caller with no internal retry.

/// Errors raised by [`ChunkedArray`](crate::ChunkedArray),
/// [`KeyIndex`](crate::KeyIndex) and [`PositionCursor`](crate::PositionCursor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An index outside the addressable range `0..=i32::MAX` was passed
    /// to the array layer.
    #[error("index {index} is outside the addressable range")]
    InvalidIndex {
        /// The offending index.
        index: usize,
    },

    /// Growth would exceed the maximum representable count of
    /// `i32::MAX` entries. Fatal to the operation; the caller decides
    /// whether to shed load or fail.
    #[error("capacity exceeded: cannot hold more than i32::MAX entries")]
    CapacityExceeded,

    /// A cursor observed a generation mismatch: the index was mutated
    /// after the cursor was created. The cursor is unusable afterwards.
    #[error("index was modified after the cursor was created")]
    ConcurrentModification,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
