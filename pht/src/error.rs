//! Error type shared by construction, persistence and table access.

use displaydoc::Display;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures reported by the table lifecycle.
///
/// The variants are kinds rather than call sites: every operation that can fail documents which
/// kinds it produces.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum Error {
    /// invalid argument: {0}
    InvalidArgument(&'static str),

    /// key {0} occurs more than once in the key set
    DuplicateKey(u32),

    /// corrupt table file: {0}
    CorruptFormat(&'static str),

    /// truncated table file: {needed} bytes required, {found} present
    TruncatedFile {
        /// Number of bytes the declared layout requires.
        needed: u64,
        /// Number of bytes actually present.
        found: u64,
    },

    /// unsupported table file: {0}
    UnsupportedVersion(&'static str),

    /// no perfect hash found after {attempts} attempts and {resizes} resizes
    ConstructionFailed {
        /// Attempts started across all workers.
        attempts: u64,
        /// Number of times the graph was grown.
        resizes: u32,
    },

    /// construction was cancelled
    Cancelled,

    /// {operation} is not supported by {algorithm}
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Name of the table's algorithm.
        algorithm: &'static str,
    },

    /// table structure size mismatch: recorded {recorded} bytes, expected {expected}
    StructuralSizeMismatch {
        /// Size stored in the table.
        recorded: u32,
        /// Size of the structure this build expects.
        expected: u32,
    },

    /// algorithm {0} is not implemented
    NotImplemented(u32),

    /// allocator could not provide {0} bytes
    OutOfMemory(usize),

    /// i/o error: {0}
    Io(#[from] std::io::Error),
}
