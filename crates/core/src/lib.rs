//! Core types for Plan B
//!
//! This crate defines the foundational types used throughout the system:
//! - Val / ValType: typed scalar values and their one-byte type ids
//! - KeyPrefix / Tag: the subject of a stored record
//! - Session: a subject bounded by a start and end instant
//! - Settings: key schema and store configuration
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod session;
pub mod settings;
pub mod val;

pub use error::{Error, Result};
pub use session::{KeyPrefix, Session, Tag};
pub use settings::{
    HashLength, KeySchema, KeyType, SessionSettings, TemporalPrecision, DEFAULT_MAX_KEY_LENGTH,
};
pub use val::{Val, ValType};
