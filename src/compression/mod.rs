//! ZLIB, FastLZ and CRC32 helpers used to unwrap compressed preset bodies.

pub mod fastlz;

use std::io::{Read, Write};

use crc32fast::Hasher;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{FormatError, Result};
use crate::notify::Notifier;

/// Compression level used by Kontakt when writing ZLIB bodies.
pub const ZLIB_LEVEL: u32 = 1;

/// Inflates a ZLIB stream. Some writers put one extra byte in front of the
/// two byte ZLIB header; such streams are accepted as well.
pub fn inflate_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let start = if is_zlib_header(data) {
        0
    } else if data.len() > 1 && is_zlib_header(&data[1..]) {
        1
    } else {
        return Err(FormatError::Compression("missing ZLIB header".to_string()));
    };

    let mut decoder = ZlibDecoder::new(&data[start..]);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FormatError::Compression(format!("ZLIB stream is corrupt: {e}")))?;
    Ok(out)
}

pub fn deflate_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(ZLIB_LEVEL));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn is_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && cmf >> 4 <= 7 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Checks `data` against an embedded checksum. A mismatch is reported as a
/// warning and never fails: some producers write wrong checksums.
pub fn verify_crc32(data: &[u8], expected: u32, what: &str, notifier: &dyn Notifier) -> bool {
    let actual = crc32(data);
    if actual != expected {
        notifier.warn(&format!(
            "{what}: checksum mismatch (stored 0x{expected:08X}, computed 0x{actual:08X})"
        ));
        return false;
    }
    true
}
