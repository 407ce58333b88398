//! Store and key schema settings
//!
//! Settings documents are deserialized with `#[serde(default)]` so any field
//! may be omitted. Call [`SessionSettings::validate`] before building a store:
//! thresholds that would let a key outgrow the engine's ceiling are rejected
//! up front rather than failing on some later write.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum key length of the underlying engine (LMDB default)
pub const DEFAULT_MAX_KEY_LENGTH: usize = 511;

/// How the subject of a key is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Fixed-width boolean
    Boolean,
    /// Fixed-width 8-bit integer
    Byte,
    /// Fixed-width 16-bit integer
    Short,
    /// Fixed-width 32-bit integer
    Int,
    /// Fixed-width 64-bit integer
    Long,
    /// Fixed-width 32-bit float
    Float,
    /// Fixed-width 64-bit float
    Double,
    /// Fixed-width date
    Date,
    /// UTF-8 string bounded by the key ceiling
    String,
    /// Always interned via the sequential lookup table
    UidLookup,
    /// Always interned via the hash lookup table
    HashLookup,
    /// Direct, sequential or hash lookup chosen by encoded size
    Variable,
    /// A set of named tags
    Tags,
}

/// Number of hash bytes written into hash lookup ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashLength {
    /// 4 byte hash
    Integer,
    /// 8 byte hash
    Long,
}

impl HashLength {
    /// Width in bytes
    pub fn width(self) -> usize {
        match self {
            HashLength::Integer => 4,
            HashLength::Long => 8,
        }
    }
}

/// Resolution of the start/end times written into keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPrecision {
    /// Seconds plus nanoseconds
    Nanosecond,
    /// Epoch milliseconds
    Millisecond,
    /// Epoch seconds
    Second,
    /// Epoch minutes
    Minute,
    /// Epoch hours
    Hour,
    /// Epoch days
    Day,
}

impl TemporalPrecision {
    /// Encoded width of one instant
    pub fn width(self) -> usize {
        match self {
            TemporalPrecision::Nanosecond => 12,
            TemporalPrecision::Millisecond | TemporalPrecision::Second => 8,
            TemporalPrecision::Minute | TemporalPrecision::Hour | TemporalPrecision::Day => 4,
        }
    }
}

/// How keys are built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySchema {
    /// Subject encoding
    pub key_type: KeyType,
    /// Hash width for hash lookups
    pub hash_length: HashLength,
    /// Time suffix resolution
    pub temporal_precision: TemporalPrecision,
    /// Sequential id width in bytes (1..=4)
    pub uid_width: usize,
    /// Largest direct encoding stored inline by the variable key type
    pub uid_lookup_threshold: usize,
    /// Largest direct encoding interned sequentially by the variable key type
    pub hash_lookup_threshold: usize,
}

impl Default for KeySchema {
    fn default() -> Self {
        KeySchema {
            key_type: KeyType::Variable,
            hash_length: HashLength::Long,
            temporal_precision: TemporalPrecision::Millisecond,
            uid_width: 4,
            uid_lookup_threshold: 32,
            hash_lookup_threshold: 256,
        }
    }
}

impl KeySchema {
    /// Schema with the given key type and default everything else
    pub fn with_key_type(key_type: KeyType) -> Self {
        KeySchema {
            key_type,
            ..KeySchema::default()
        }
    }

    /// Width of the start/end suffix
    pub fn time_suffix_width(&self) -> usize {
        self.temporal_precision.width() * 2
    }
}

/// Settings for a session store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Key layout
    pub key_schema: KeySchema,
    /// Ceiling enforced by the engine on encoded keys
    pub max_key_length: usize,
    /// Replace the stored value when a key is written twice
    pub overwrite: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            key_schema: KeySchema::default(),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            overwrite: true,
        }
    }
}

impl SessionSettings {
    /// Settings with the given key type and defaults otherwise
    pub fn with_key_type(key_type: KeyType) -> Self {
        SessionSettings {
            key_schema: KeySchema::with_key_type(key_type),
            ..SessionSettings::default()
        }
    }

    /// Check that every key the schema can produce fits the ceiling
    pub fn validate(&self) -> Result<()> {
        let schema = &self.key_schema;
        if !(1..=4).contains(&schema.uid_width) {
            return Err(Error::InvalidConfig(format!(
                "uid_width must be between 1 and 4, got {}",
                schema.uid_width
            )));
        }
        if schema.uid_lookup_threshold >= schema.hash_lookup_threshold {
            return Err(Error::InvalidConfig(format!(
                "uid_lookup_threshold ({}) must be below hash_lookup_threshold ({})",
                schema.uid_lookup_threshold, schema.hash_lookup_threshold
            )));
        }
        let suffix = schema.time_suffix_width();
        let direct_key = 1 + schema.uid_lookup_threshold + suffix;
        if direct_key > self.max_key_length {
            return Err(Error::InvalidConfig(format!(
                "direct keys of up to {direct_key} bytes exceed max_key_length {}",
                self.max_key_length
            )));
        }
        if schema.hash_lookup_threshold > self.max_key_length {
            return Err(Error::InvalidConfig(format!(
                "hash_lookup_threshold ({}) exceeds max_key_length {}",
                schema.hash_lookup_threshold, self.max_key_length
            )));
        }
        let id_key = schema.hash_length.width() + 2 + suffix;
        if id_key > self.max_key_length {
            return Err(Error::InvalidConfig(format!(
                "lookup keys of {id_key} bytes exceed max_key_length {}",
                self.max_key_length
            )));
        }
        Ok(())
    }
}
