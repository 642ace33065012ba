//! Error types for registry and read-path operations.

use crate::cell::Kind;
use thiserror::Error;

/// Errors surfaced by structural operations (registration, naming, config).
///
/// The record path never returns an error once a handle exists; everything
/// that can go wrong is reported at registration or lookup time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A metric with this name is already registered.
    #[error("metric `{0}` already exists")]
    AlreadyExists(String),

    /// The name is registered under a different metric type.
    #[error("metric `{name}` is a {actual}, not a {requested}")]
    KindMismatch {
        /// The colliding metric name.
        name: String,
        /// The type already registered under the name.
        actual: Kind,
        /// The type the caller asked for.
        requested: Kind,
    },

    /// Names, prefixes and hosts must be non-empty.
    #[error("metric name is empty")]
    EmptyName,

    /// Name exceeds the 255-byte limit.
    #[error("name is {len} bytes, limit is {max}")]
    NameTooLong {
        /// Actual byte length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Name contains a character outside `[A-Za-z0-9_.-]`.
    #[error("name `{0}` contains invalid characters (allowed: [A-Za-z0-9_.-])")]
    InvalidName(String),

    /// A fully-built key would exceed the fixed key capacity.
    #[error("key overflows the {max}-byte key buffer")]
    KeyTooLong {
        /// Maximum allowed.
        max: usize,
    },

    /// Histogram construction needs 2..=9 strictly ascending thresholds.
    #[error("histogram thresholds must be 2..=9 strictly ascending values, got {0}")]
    InvalidBuckets(usize),

    /// Quantile targets live in the open interval (0, 1).
    #[error("quantile target {0} is outside (0, 1)")]
    InvalidQuantile(f64),

    /// Quantile adjustment steps must be positive.
    #[error("quantile adjustment step {0} must be > 0")]
    InvalidAdjustment(f64),
}

/// Errors surfaced by the read path to the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The retired slot is locked by a straggling recorder; retry next sweep.
    #[error("slot is busy, retry next sweep")]
    Busy,
}

impl ReadError {
    /// Returns `true` if the read should simply be retried on the next sweep.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}
