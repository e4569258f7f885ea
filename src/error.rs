//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`], which is a
//! thin alias over [`std::result::Result`] with [`Error`] as the failure
//! type. Variants track the outcomes named by the storage engine's
//! components (disk manager, buffer pool, catalog) rather than collapsing
//! everything into one opaque "failed" case.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure (short read, permissions, disk full, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A page, schema or metadata magic number did not match what was
    /// expected, meaning the bytes are corrupt or from an incompatible file.
    #[error("invalid magic number while reading {what}")]
    InvalidMagic {
        /// Name of the structure whose magic check failed.
        what: &'static str,
    },

    /// The on-disk file could not be opened at `path`.
    #[error("failed to open database file at {path:?}: {source}")]
    OpenFailed {
        /// Path that could not be opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No free frame was available in the buffer pool and none could be
    /// evicted because every frame was pinned.
    #[error("buffer pool exhausted: all frames pinned")]
    BufferPoolExhausted,

    /// A requested page id has no backing frame or disk extent.
    #[error("page {0} not allocated")]
    PageNotAllocated(i32),

    /// `CREATE TABLE` for a name that already exists.
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    /// Lookup for a table that does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// `CREATE INDEX` for a (table, name) pair that already exists.
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    /// Lookup for an index that does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// A column name referenced by an index or query does not exist in the
    /// table's schema.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// `GetValue`/`Remove` on a B+ tree key that is not present.
    #[error("key not found")]
    KeyNotFound,

    /// `Insert` on a B+ tree key that already exists.
    #[error("duplicate key")]
    DuplicateKey,

    /// A tuple was too large to ever fit on an empty page.
    #[error("tuple of {size} bytes exceeds page capacity of {capacity} bytes")]
    TupleTooLarge {
        /// Serialized tuple size.
        size: usize,
        /// Usable page capacity.
        capacity: usize,
    },

    /// A slotted page or B+ tree page was read in a state inconsistent with
    /// its own header (bad slot count, bad size count, etc).
    #[error("corrupt page: {0}")]
    Corrupt(String),
}
