//! Typed scalar values
//!
//! `Val` is the unit of data a store key is built from. Equality and hashing
//! are defined on the logical value; floating point values compare by bit
//! pattern so `Val` can be used as a map key.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

use crate::error::{Error, Result};

/// One-byte type id used by the tagged encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValType {
    /// `true` / `false`
    Boolean = 1,
    /// Signed 8-bit integer
    Byte = 2,
    /// Signed 16-bit integer
    Short = 3,
    /// Signed 32-bit integer
    Int = 4,
    /// Signed 64-bit integer
    Long = 5,
    /// 32-bit float
    Float = 6,
    /// 64-bit float
    Double = 7,
    /// Instant with millisecond precision
    Date = 8,
    /// UTF-8 string
    String = 9,
}

impl ValType {
    /// All types in id order
    pub const ALL: [ValType; 9] = [
        ValType::Boolean,
        ValType::Byte,
        ValType::Short,
        ValType::Int,
        ValType::Long,
        ValType::Float,
        ValType::Double,
        ValType::Date,
        ValType::String,
    ];

    /// The byte written for this type
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Resolve a stored type id
    pub fn from_id(id: u8) -> Result<ValType> {
        match id {
            1 => Ok(ValType::Boolean),
            2 => Ok(ValType::Byte),
            3 => Ok(ValType::Short),
            4 => Ok(ValType::Int),
            5 => Ok(ValType::Long),
            6 => Ok(ValType::Float),
            7 => Ok(ValType::Double),
            8 => Ok(ValType::Date),
            9 => Ok(ValType::String),
            other => Err(Error::corruption(format!("unknown value type id {other}"))),
        }
    }

    /// Encoded width in bytes, or `None` for variable width types
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ValType::Boolean | ValType::Byte => Some(1),
            ValType::Short => Some(2),
            ValType::Int | ValType::Float => Some(4),
            ValType::Long | ValType::Double | ValType::Date => Some(8),
            ValType::String => None,
        }
    }

    /// Lower case name used in messages
    pub fn name(self) -> &'static str {
        match self {
            ValType::Boolean => "boolean",
            ValType::Byte => "byte",
            ValType::Short => "short",
            ValType::Int => "int",
            ValType::Long => "long",
            ValType::Float => "float",
            ValType::Double => "double",
            ValType::Date => "date",
            ValType::String => "string",
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed, immutable value
#[derive(Debug, Clone)]
pub enum Val {
    /// Boolean value
    Boolean(bool),
    /// Signed 8-bit integer
    Byte(i8),
    /// Signed 16-bit integer
    Short(i16),
    /// Signed 32-bit integer
    Int(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Instant at millisecond precision
    ///
    /// Build through [`Val::date`] or `From<DateTime<Utc>>`, which drop the
    /// sub-millisecond part the encoding cannot hold.
    Date(DateTime<Utc>),
    /// UTF-8 string
    String(String),
}

impl Val {
    /// The type of this value
    pub fn val_type(&self) -> ValType {
        match self {
            Val::Boolean(_) => ValType::Boolean,
            Val::Byte(_) => ValType::Byte,
            Val::Short(_) => ValType::Short,
            Val::Int(_) => ValType::Int,
            Val::Long(_) => ValType::Long,
            Val::Float(_) => ValType::Float,
            Val::Double(_) => ValType::Double,
            Val::Date(_) => ValType::Date,
            Val::String(_) => ValType::String,
        }
    }

    /// Build a date, truncated to millisecond precision
    pub fn date(time: DateTime<Utc>) -> Val {
        Val::Date(time.trunc_subsecs(3))
    }

    /// Build a date from epoch milliseconds
    ///
    /// Out of range values clamp to the chrono limits.
    pub fn date_from_millis(millis: i64) -> Val {
        let dt = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(if millis < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Val::Date(dt)
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Boolean(a), Val::Boolean(b)) => a == b,
            (Val::Byte(a), Val::Byte(b)) => a == b,
            (Val::Short(a), Val::Short(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Long(a), Val::Long(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a.to_bits() == b.to_bits(),
            (Val::Double(a), Val::Double(b)) => a.to_bits() == b.to_bits(),
            (Val::Date(a), Val::Date(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Val {}

impl Hash for Val {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val_type().id().hash(state);
        match self {
            Val::Boolean(v) => v.hash(state),
            Val::Byte(v) => v.hash(state),
            Val::Short(v) => v.hash(state),
            Val::Int(v) => v.hash(state),
            Val::Long(v) => v.hash(state),
            Val::Float(v) => v.to_bits().hash(state),
            Val::Double(v) => v.to_bits().hash(state),
            Val::Date(v) => v.hash(state),
            Val::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Boolean(v) => write!(f, "{v}"),
            Val::Byte(v) => write!(f, "{v}"),
            Val::Short(v) => write!(f, "{v}"),
            Val::Int(v) => write!(f, "{v}"),
            Val::Long(v) => write!(f, "{v}"),
            Val::Float(v) => write!(f, "{v}"),
            Val::Double(v) => write!(f, "{v}"),
            Val::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Val::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Boolean(v)
    }
}

impl From<i8> for Val {
    fn from(v: i8) -> Self {
        Val::Byte(v)
    }
}

impl From<i16> for Val {
    fn from(v: i16) -> Self {
        Val::Short(v)
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self {
        Val::Int(v)
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Val::Long(v)
    }
}

impl From<f32> for Val {
    fn from(v: f32) -> Self {
        Val::Float(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Double(v)
    }
}

impl From<DateTime<Utc>> for Val {
    fn from(v: DateTime<Utc>) -> Self {
        Val::date(v)
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::String(v.to_string())
    }
}

impl From<String> for Val {
    fn from(v: String) -> Self {
        Val::String(v)
    }
}
