//! Primitive reads and writes shared by every codec.
//!
//! All multi-byte reads take an explicit [`Endian`]; there is no global byte
//! order. Reads never grow or copy the backing buffer, and any read past the
//! end fails with [`FormatError::TruncatedInput`].

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use chrono::{DateTime, FixedOffset};

use crate::error::{tag_name, FormatError, Result};

/// Byte order of a single read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Seconds east of UTC used for Kontakt timestamps. Kontakt writes local
/// (Berlin) time without any zone information, so it is always read as UTC+1.
const TIMESTAMP_OFFSET_SECONDS: i32 = 3600;

/// A forward cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(FormatError::TruncatedInput {
                offset: pos,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.bytes(count).map(|_| ())
    }

    /// Returns the next `count` bytes and advances past them.
    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(FormatError::TruncatedInput {
                offset: self.pos,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Returns everything from the cursor to the end of the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        slice
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self, endian: Endian) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        })
    }

    pub fn i16(&mut self, endian: Endian) -> Result<i16> {
        Ok(self.u16(endian)? as i16)
    }

    pub fn u32(&mut self, endian: Endian) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        })
    }

    pub fn i32(&mut self, endian: Endian) -> Result<i32> {
        Ok(self.u32(endian)? as i32)
    }

    pub fn u64(&mut self, endian: Endian) -> Result<u64> {
        let b = self.bytes(8)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        })
    }

    pub fn f32(&mut self, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.u32(endian)?))
    }

    pub fn f64(&mut self, endian: Endian) -> Result<f64> {
        Ok(f64::from_bits(self.u64(endian)?))
    }

    /// Checks that the next bytes equal `expected` and consumes them.
    pub fn expect_tag(&mut self, expected: &[u8]) -> Result<()> {
        let start = self.pos;
        let found = self.bytes(expected.len())?;
        if found != expected {
            self.pos = start;
            return Err(FormatError::UnexpectedTag {
                expected: tag_name(expected),
                found: tag_name(found),
            });
        }
        Ok(())
    }

    /// Reads a fixed-width ASCII field, cut at the first NUL.
    pub fn ascii(&mut self, length: usize) -> Result<String> {
        Ok(ascii_until_nul(self.bytes(length)?))
    }

    /// Reads a NUL-terminated ASCII string of at most `max_length` bytes
    /// (terminator excluded). Stops without a terminator at `max_length`.
    pub fn null_terminated_ascii(&mut self, max_length: usize) -> Result<String> {
        let mut text = Vec::new();
        loop {
            if text.len() == max_length {
                break;
            }
            let b = self.u8()?;
            if b == 0 {
                break;
            }
            text.push(b);
        }
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// Reads a u32 character count followed by that many UTF-16LE code units.
    pub fn utf16_with_length(&mut self) -> Result<String> {
        let chars = self.u32(Endian::Little)? as usize;
        self.utf16(chars)
    }

    /// Reads `chars` UTF-16LE code units, cut at the first NUL.
    pub fn utf16(&mut self, chars: usize) -> Result<String> {
        let needed = chars.checked_mul(2).ok_or(FormatError::TruncatedInput {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let raw = self.bytes(needed)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .take_while(|&u| u != 0)
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// Reads a u32 count of seconds since 1970 and places it at UTC+1.
    pub fn timestamp(&mut self, endian: Endian) -> Result<DateTime<FixedOffset>> {
        let seconds = self.u32(endian)?;
        Ok(timestamp_from_seconds(seconds))
    }
}

pub fn timestamp_from_seconds(seconds: u32) -> DateTime<FixedOffset> {
    let utc = DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default();
    match FixedOffset::east_opt(TIMESTAMP_OFFSET_SECONDS) {
        Some(offset) => utc.with_timezone(&offset),
        None => utc.fixed_offset(),
    }
}

pub fn ascii_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// --- Writers ---

pub fn write_u16(out: &mut Vec<u8>, value: u16, endian: Endian) -> Result<()> {
    match endian {
        Endian::Little => out.write_u16::<LittleEndian>(value)?,
        Endian::Big => out.write_u16::<BigEndian>(value)?,
    }
    Ok(())
}

pub fn write_u32(out: &mut Vec<u8>, value: u32, endian: Endian) -> Result<()> {
    match endian {
        Endian::Little => out.write_u32::<LittleEndian>(value)?,
        Endian::Big => out.write_u32::<BigEndian>(value)?,
    }
    Ok(())
}

pub fn write_u64(out: &mut Vec<u8>, value: u64, endian: Endian) -> Result<()> {
    match endian {
        Endian::Little => out.write_u64::<LittleEndian>(value)?,
        Endian::Big => out.write_u64::<BigEndian>(value)?,
    }
    Ok(())
}

pub fn write_f32(out: &mut Vec<u8>, value: f32, endian: Endian) -> Result<()> {
    write_u32(out, value.to_bits(), endian)
}

pub fn write_f64(out: &mut Vec<u8>, value: f64, endian: Endian) -> Result<()> {
    write_u64(out, value.to_bits(), endian)
}

/// Writes `text` into a fixed field of `length` bytes, truncating and
/// zero-padding as needed.
pub fn write_ascii_fixed(out: &mut Vec<u8>, text: &str, length: usize) {
    let bytes = text.as_bytes();
    let used = bytes.len().min(length);
    out.extend_from_slice(&bytes[..used]);
    out.resize(out.len() + (length - used), 0);
}

pub fn write_null_terminated_ascii(out: &mut Vec<u8>, text: &str) {
    out.extend(text.bytes().filter(|&b| b != 0));
    out.push(0);
}

pub fn write_utf16_with_length(out: &mut Vec<u8>, text: &str) -> Result<()> {
    let units: Vec<u16> = text.encode_utf16().collect();
    out.write_u32::<LittleEndian>(units.len() as u32)?;
    for unit in units {
        out.write_u16::<LittleEndian>(unit)?;
    }
    Ok(())
}
