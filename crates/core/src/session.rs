//! Key prefixes and sessions
//!
//! A `KeyPrefix` is the subject of a stored record: either a single value or
//! a set of named tags. Tag sets are normalized by sorting on tag name so two
//! prefixes built from the same tags in a different order are equal and
//! encode to the same bytes.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::val::Val;

/// A named value inside a tag-set key prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag name
    pub name: String,
    /// Tag value
    pub value: Val,
}

impl Tag {
    /// Create a tag
    pub fn new(name: impl Into<String>, value: impl Into<Val>) -> Self {
        Tag {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The subject portion of a stored key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    /// A single value
    Val(Val),
    /// Tags sorted by name; names are unique
    Tags(Vec<Tag>),
}

impl KeyPrefix {
    /// A single-value prefix
    pub fn val(val: impl Into<Val>) -> Self {
        KeyPrefix::Val(val.into())
    }

    /// A tag-set prefix, normalized by tag name
    ///
    /// Returns `DuplicateTag` if a name appears more than once.
    pub fn tags(tags: impl IntoIterator<Item = Tag>) -> Result<Self> {
        let mut tags: Vec<Tag> = tags.into_iter().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in tags.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::DuplicateTag(pair[0].name.clone()));
            }
        }
        Ok(KeyPrefix::Tags(tags))
    }

    /// The single value, if this is not a tag set
    pub fn as_val(&self) -> Option<&Val> {
        match self {
            KeyPrefix::Val(v) => Some(v),
            KeyPrefix::Tags(_) => None,
        }
    }

    /// The sorted tags, if this is a tag set
    pub fn as_tags(&self) -> Option<&[Tag]> {
        match self {
            KeyPrefix::Val(_) => None,
            KeyPrefix::Tags(tags) => Some(tags),
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPrefix::Val(v) => write!(f, "{v}"),
            KeyPrefix::Tags(tags) => {
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", tag.name, tag.value)?;
                }
                Ok(())
            }
        }
    }
}

/// A time-bounded fact about a subject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    prefix: KeyPrefix,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Session {
    /// Create a session, rejecting `start > end`
    pub fn new(prefix: KeyPrefix, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidSession {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Session { prefix, start, end })
    }

    /// Build a session from decoded parts without re-validating the range
    ///
    /// Decoders use this: ordering was checked when the session was written.
    pub fn from_parts(prefix: KeyPrefix, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Session { prefix, start, end }
    }

    /// The subject
    #[inline]
    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    /// Session start
    #[inline]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Session end
    #[inline]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// True if `time` lies within `[start, end]`
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start <= time && time <= self.end
    }

    /// Consume into parts
    pub fn into_parts(self) -> (KeyPrefix, DateTime<Utc>, DateTime<Utc>) {
        (self.prefix, self.start, self.end)
    }
}
