//! Low level byte helpers shared by every codec
//!
//! Reads go through [`ByteReader`], which owns its own position over a
//! borrowed slice. Decoding never advances a position belonging to the
//! caller, so decoding the same bytes twice always yields the same result.

use std::io;

use byteorder::{BigEndian, ReadBytesExt};

use planb_core::{Error, Result};

fn truncated(_: io::Error) -> Error {
    Error::corruption("truncated buffer")
}

/// Cursor over a borrowed byte slice
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    rest: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { rest: bytes }
    }

    /// Bytes not yet consumed
    #[inline]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// The unconsumed bytes
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        self.rest
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(Error::corruption(format!(
                "truncated buffer: need {n} bytes, have {}",
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    /// Fail if any bytes remain
    pub fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(Error::corruption(format!(
                "{} unexpected trailing bytes",
                self.rest.len()
            )))
        }
    }

    /// Read one byte
    pub fn u8(&mut self) -> Result<u8> {
        self.rest.read_u8().map_err(truncated)
    }

    /// Read a signed byte
    pub fn i8(&mut self) -> Result<i8> {
        self.rest.read_i8().map_err(truncated)
    }

    /// Read a big-endian u16
    pub fn u16(&mut self) -> Result<u16> {
        self.rest.read_u16::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian i16
    pub fn i16(&mut self) -> Result<i16> {
        self.rest.read_i16::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian u32
    pub fn u32(&mut self) -> Result<u32> {
        self.rest.read_u32::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian i32
    pub fn i32(&mut self) -> Result<i32> {
        self.rest.read_i32::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian u64
    pub fn u64(&mut self) -> Result<u64> {
        self.rest.read_u64::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian i64
    pub fn i64(&mut self) -> Result<i64> {
        self.rest.read_i64::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian f32
    pub fn f32(&mut self) -> Result<f32> {
        self.rest.read_f32::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian f64
    pub fn f64(&mut self) -> Result<f64> {
        self.rest.read_f64::<BigEndian>().map_err(truncated)
    }

    /// Read a big-endian unsigned integer of `width` bytes
    pub fn uint(&mut self, width: usize) -> Result<u64> {
        self.rest.read_uint::<BigEndian>(width).map_err(truncated)
    }

    /// Read an i64 written by [`write_sortable_i64`]
    pub fn sortable_i64(&mut self) -> Result<i64> {
        Ok((self.u64()? ^ SIGN_BIT_64) as i64)
    }

    /// Read an i32 written by [`write_sortable_i32`]
    pub fn sortable_i32(&mut self) -> Result<i32> {
        Ok((self.u32()? ^ SIGN_BIT_32) as i32)
    }
}

const SIGN_BIT_64: u64 = 1 << 63;
const SIGN_BIT_32: u32 = 1 << 31;

/// Write an i64 so that byte order matches numeric order
pub fn write_sortable_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&((v as u64) ^ SIGN_BIT_64).to_be_bytes());
}

/// Write an i32 so that byte order matches numeric order
pub fn write_sortable_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&((v as u32) ^ SIGN_BIT_32).to_be_bytes());
}

/// Fixed-width big-endian unsigned integers of 1 to 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsignedBytes {
    width: usize,
}

impl UnsignedBytes {
    /// Integers of `width` bytes
    pub fn new(width: usize) -> Result<Self> {
        if !(1..=8).contains(&width) {
            return Err(Error::InvalidConfig(format!(
                "unsigned width must be 1..=8, got {width}"
            )));
        }
        Ok(UnsignedBytes { width })
    }

    /// Encoded width
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Largest representable value
    pub fn max_value(&self) -> u64 {
        if self.width == 8 {
            u64::MAX
        } else {
            (1u64 << (self.width * 8)) - 1
        }
    }

    /// Append `value` in exactly `width` bytes
    pub fn write(&self, buf: &mut Vec<u8>, value: u64) -> Result<()> {
        if value > self.max_value() {
            return Err(Error::corruption(format!(
                "{value} does not fit in {} bytes",
                self.width
            )));
        }
        let be = value.to_be_bytes();
        buf.extend_from_slice(&be[8 - self.width..]);
        Ok(())
    }

    /// Decode exactly `width` bytes
    pub fn read(&self, bytes: &[u8]) -> Result<u64> {
        let mut reader = ByteReader::new(bytes);
        let value = reader.uint(self.width)?;
        reader.finish()?;
        Ok(value)
    }
}
