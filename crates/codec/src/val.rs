//! Value codec
//!
//! Three layouts are used depending on what surrounds the value:
//!
//! ```text
//! direct:     [value]                   region length implies string length
//! tagged:     [type id][value]          self-describing, region bounded
//! delimited:  [type id][len u16]?[value] length only for strings, embeddable
//! ```
//!
//! Fixed-width types always write their native width big-endian with no
//! length. Strings are raw UTF-8; the length is either implied by the end of
//! the region or written as a u16 prefix in the delimited layout.

use planb_core::{Error, Result, Val, ValType};

use crate::bytes::ByteReader;

/// Append the direct encoding of `val`
pub fn write_direct(buf: &mut Vec<u8>, val: &Val) {
    match val {
        Val::Boolean(v) => buf.push(u8::from(*v)),
        Val::Byte(v) => buf.push(*v as u8),
        Val::Short(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Val::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Val::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Val::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Val::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Val::Date(v) => buf.extend_from_slice(&v.timestamp_millis().to_be_bytes()),
        Val::String(v) => buf.extend_from_slice(v.as_bytes()),
    }
}

/// Decode a value of type `val_type` that occupies all of `bytes`
pub fn read_direct(val_type: ValType, bytes: &[u8]) -> Result<Val> {
    let mut reader = ByteReader::new(bytes);
    let val = match val_type {
        ValType::String => Val::String(utf8(bytes)?),
        _ => read_fixed(val_type, &mut reader)?,
    };
    if val_type != ValType::String {
        reader.finish()?;
    }
    Ok(val)
}

/// Decode one fixed-width value from `reader`
pub fn read_fixed(val_type: ValType, reader: &mut ByteReader<'_>) -> Result<Val> {
    Ok(match val_type {
        ValType::Boolean => match reader.u8()? {
            0 => Val::Boolean(false),
            1 => Val::Boolean(true),
            other => {
                return Err(Error::corruption(format!("invalid boolean byte {other}")));
            }
        },
        ValType::Byte => Val::Byte(reader.i8()?),
        ValType::Short => Val::Short(reader.i16()?),
        ValType::Int => Val::Int(reader.i32()?),
        ValType::Long => Val::Long(reader.i64()?),
        ValType::Float => Val::Float(reader.f32()?),
        ValType::Double => Val::Double(reader.f64()?),
        ValType::Date => Val::date_from_millis(reader.i64()?),
        ValType::String => {
            return Err(Error::corruption("string is not a fixed width type"));
        }
    })
}

/// Append `[type id][direct encoding]`
pub fn write_tagged(buf: &mut Vec<u8>, val: &Val) {
    buf.push(val.val_type().id());
    write_direct(buf, val);
}

/// Decode a tagged value occupying all of `bytes`
pub fn read_tagged(bytes: &[u8]) -> Result<Val> {
    let mut reader = ByteReader::new(bytes);
    let val_type = ValType::from_id(reader.u8()?)?;
    read_direct(val_type, reader.rest())
}

/// Length of the tagged encoding of `val`
pub fn tagged_len(val: &Val) -> usize {
    1 + match val {
        Val::String(s) => s.len(),
        other => other.val_type().fixed_width().unwrap_or(0),
    }
}

/// Encode `val` in the tagged layout
pub fn encode(val: &Val) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tagged_len(val));
    write_tagged(&mut buf, val);
    buf
}

/// Decode bytes produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<Val> {
    read_tagged(bytes)
}

/// Append a u16 length-prefixed UTF-8 string
pub fn write_delimited_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| Error::KeyTooLong {
        actual: s.len(),
        max: u16::MAX as usize,
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Read a string written by [`write_delimited_str`]
pub fn read_delimited_str<'a>(reader: &mut ByteReader<'a>) -> Result<&'a str> {
    let len = reader.u16()? as usize;
    let bytes = reader.take(len)?;
    std::str::from_utf8(bytes).map_err(|e| Error::corruption(format!("invalid UTF-8: {e}")))
}

/// Append `val` so it can be followed by further data
pub fn write_delimited(buf: &mut Vec<u8>, val: &Val) -> Result<()> {
    buf.push(val.val_type().id());
    match val {
        Val::String(s) => write_delimited_str(buf, s),
        other => {
            write_direct(buf, other);
            Ok(())
        }
    }
}

/// Read one value written by [`write_delimited`]
pub fn read_delimited(reader: &mut ByteReader<'_>) -> Result<Val> {
    let val_type = ValType::from_id(reader.u8()?)?;
    match val_type {
        ValType::String => Ok(Val::String(read_delimited_str(reader)?.to_string())),
        fixed => read_fixed(fixed, reader),
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::corruption(format!("invalid UTF-8: {e}")))
}
