//! Debug assertion macros for the epoch and cell invariants.
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! on the record path in release builds.

/// Assert that an epoch index is one of the two slot indices.
macro_rules! debug_assert_epoch {
    ($e:expr) => {
        debug_assert!($e < 2, "epoch index {} outside {{0, 1}}", $e)
    };
}

/// Assert that histogram thresholds are strictly ascending.
macro_rules! debug_assert_ascending_edges {
    ($edges:expr) => {
        debug_assert!(
            $edges.windows(2).all(|w| w[0] < w[1]),
            "histogram thresholds not strictly ascending: {:?}",
            $edges
        )
    };
}

/// Assert that the populated reservoir prefix never exceeds its capacity.
macro_rules! debug_assert_reservoir_fill {
    ($len:expr, $cap:expr) => {
        debug_assert!(
            $len <= $cap,
            "reservoir fill {} exceeds capacity {}",
            $len,
            $cap
        )
    };
}

/// Assert that a key buffer restore point is inside the current contents.
macro_rules! debug_assert_key_pos {
    ($pos:expr, $len:expr) => {
        debug_assert!(
            $pos <= $len,
            "key restore point {} past current length {}",
            $pos,
            $len
        )
    };
}

pub(crate) use debug_assert_ascending_edges;
pub(crate) use debug_assert_epoch;
pub(crate) use debug_assert_key_pos;
pub(crate) use debug_assert_reservoir_fill;
