//! Error types for the Plan B codec layer
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Probing for a lookup entry that does not exist is not an error; probe APIs
//! return `Ok(None)`. A read path that *expects* an entry and cannot find it
//! raises [`Error::LookupMissing`], which indicates a corrupt store.

use thiserror::Error;

/// Result type alias for Plan B operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Plan B codec layer
#[derive(Debug, Error)]
pub enum Error {
    /// An encoded key would exceed the engine's key-size ceiling
    #[error("Key too long: {actual} bytes exceeds maximum of {max}")]
    KeyTooLong {
        /// Encoded length that was attempted
        actual: usize,
        /// Configured ceiling
        max: usize,
    },

    /// A read expected a lookup entry that is not present (data corruption)
    #[error("Lookup entry missing from '{table}' for id {id:02x?}")]
    LookupMissing {
        /// Lookup table name
        table: String,
        /// Encoded surrogate id that failed to resolve
        id: Vec<u8>,
    },

    /// Every unique id available for one hash value is in use
    #[error("Hash collision space exhausted in '{table}' for hash {hash:#x}")]
    HashCollisionExhausted {
        /// Lookup table name
        table: String,
        /// The hash whose bucket is full
        hash: u64,
    },

    /// The sequential id space for the configured width is used up
    #[error("Sequential id space exhausted in '{table}' ({width} byte ids)")]
    UidExhausted {
        /// Lookup table name
        table: String,
        /// Configured id width in bytes
        width: usize,
    },

    /// Incrementing a reference count would overflow
    #[error("Reference count overflow")]
    RefCountOverflow,

    /// Decrementing a reference count that is already zero
    #[error("Reference count underflow")]
    RefCountUnderflow,

    /// Stored bytes could not be decoded
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A value of the wrong type was supplied for the configured key type
    #[error("Unexpected type: expected {expected}, got {actual}")]
    UnexpectedType {
        /// Type the serde was configured for
        expected: String,
        /// Type that was supplied
        actual: String,
    },

    /// Session start is after its end
    #[error("Invalid session: start {start} is after end {end}")]
    InvalidSession {
        /// Session start (RFC 3339)
        start: String,
        /// Session end (RFC 3339)
        end: String,
    },

    /// The same tag name appears twice in one key prefix
    #[error("Duplicate tag name: {0}")]
    DuplicateTag(String),

    /// Settings failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// True for errors that indicate the stored bytes cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::LookupMissing { .. })
    }
}
