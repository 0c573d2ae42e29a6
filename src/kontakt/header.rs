use chrono::{DateTime, FixedOffset};

use crate::error::{FormatError, Result};
use crate::stream::{timestamp_from_seconds, write_u16, write_u32, ByteReader, Endian};

const LE: Endian = Endian::Little;

pub const MAGIC: [u8; 4] = [0x12, 0x90, 0xA8, 0x7F];
pub const HEADER_LENGTH: usize = 42;

pub const VERSION_KONTAKT_2: u16 = 0x0100;
pub const VERSION_KONTAKT_42: u16 = 0x0110;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    Multi,
    Instrument,
    Bank,
    Program,
    Group,
    Snapshot,
}

impl PatchType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Multi),
            1 => Some(Self::Instrument),
            2 => Some(Self::Bank),
            3 => Some(Self::Program),
            4 => Some(Self::Group),
            5 => Some(Self::Snapshot),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Multi => "nkm",
            Self::Instrument => "nki",
            Self::Bank => "nkb",
            Self::Program => "nkp",
            Self::Group => "nkg",
            Self::Snapshot => "nkz",
        }
    }
}

/// How the body following the header is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Kontakt 2: ZLIB compressed XML.
    ZlibXml,
    /// Kontakt 4.2 and later: FastLZ compressed preset chunk tree.
    FastLzPresetChunks,
}

/// The 42 byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KontaktHeader {
    /// Length of the compressed body.
    pub body_length: u32,
    pub header_version: u16,
    pub patch_type: u16,
    /// Patch, second minor, minor and major version of the writing application.
    pub app_version: [u8; 4],
    pub library_id: u32,
    /// Seconds since 1970.
    pub timestamp: u32,
    pub reserved: u32,
    pub zones: u16,
    pub groups: u16,
    pub instruments: u16,
    /// CRC32 of the compressed body (4.2 and later).
    pub checksum: u32,
    pub decompressed_length: u32,
}

impl Default for KontaktHeader {
    fn default() -> Self {
        Self {
            body_length: 0,
            header_version: VERSION_KONTAKT_42,
            patch_type: 1,
            app_version: [0, 0, 2, 4],
            library_id: 0,
            timestamp: 0,
            reserved: 0,
            zones: 0,
            groups: 0,
            instruments: 1,
            checksum: 0,
            decompressed_length: 0,
        }
    }
}

impl KontaktHeader {
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.expect_tag(&MAGIC)?;
        Ok(Self {
            body_length: reader.u32(LE)?,
            header_version: reader.u16(LE)?,
            patch_type: reader.u16(LE)?,
            app_version: reader.array()?,
            library_id: reader.u32(LE)?,
            timestamp: reader.u32(LE)?,
            reserved: reader.u32(LE)?,
            zones: reader.u16(LE)?,
            groups: reader.u16(LE)?,
            instruments: reader.u16(LE)?,
            checksum: reader.u32(LE)?,
            decompressed_length: reader.u32(LE)?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&MAGIC);
        write_u32(out, self.body_length, LE)?;
        write_u16(out, self.header_version, LE)?;
        write_u16(out, self.patch_type, LE)?;
        out.extend_from_slice(&self.app_version);
        write_u32(out, self.library_id, LE)?;
        write_u32(out, self.timestamp, LE)?;
        write_u32(out, self.reserved, LE)?;
        write_u16(out, self.zones, LE)?;
        write_u16(out, self.groups, LE)?;
        write_u16(out, self.instruments, LE)?;
        write_u32(out, self.checksum, LE)?;
        write_u32(out, self.decompressed_length, LE)
    }

    pub fn body_encoding(&self) -> Result<BodyEncoding> {
        match self.header_version {
            v if v < VERSION_KONTAKT_2 => Err(FormatError::InvalidData(format!(
                "unknown Kontakt header version 0x{v:04X}"
            ))),
            v if v < VERSION_KONTAKT_42 => Ok(BodyEncoding::ZlibXml),
            _ => Ok(BodyEncoding::FastLzPresetChunks),
        }
    }

    pub fn patch_type(&self) -> Option<PatchType> {
        PatchType::from_u16(self.patch_type)
    }

    /// Application version as `major.minor.minor2.patch`.
    pub fn app_version_string(&self) -> String {
        let [patch, minor2, minor, major] = self.app_version;
        format!("{major}.{minor}.{minor2}.{patch}")
    }

    pub fn creation_time(&self) -> DateTime<FixedOffset> {
        timestamp_from_seconds(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = KontaktHeader {
            body_length: 0x1234,
            zones: 12,
            groups: 3,
            checksum: 0xDEAD_BEEF,
            decompressed_length: 0x5678,
            ..KontaktHeader::default()
        };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        assert_eq!(out.len(), HEADER_LENGTH);
        assert_eq!(&out[..4], &MAGIC);
        assert_eq!(&out[0x1C..0x1E], &12u16.to_le_bytes());
        assert_eq!(&out[0x22..0x26], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&out[0x26..0x2A], &0x5678u32.to_le_bytes());

        let mut reader = ByteReader::new(&out);
        assert_eq!(KontaktHeader::read(&mut reader).unwrap(), header);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_body_encoding_by_version() {
        let mut header = KontaktHeader { header_version: 0x0100, ..KontaktHeader::default() };
        assert_eq!(header.body_encoding().unwrap(), BodyEncoding::ZlibXml);
        header.header_version = 0x0110;
        assert_eq!(header.body_encoding().unwrap(), BodyEncoding::FastLzPresetChunks);
        header.header_version = 0x00FF;
        assert!(header.body_encoding().is_err());
    }

    #[test]
    fn test_bad_magic() {
        let data = [0u8; HEADER_LENGTH];
        let mut reader = ByteReader::new(&data);
        assert!(matches!(
            KontaktHeader::read(&mut reader),
            Err(FormatError::UnexpectedTag { .. })
        ));
    }

    #[test]
    fn test_app_version_and_type() {
        let header = KontaktHeader::default();
        assert_eq!(header.app_version_string(), "4.2.0.0");
        assert_eq!(header.patch_type().map(PatchType::extension), Some("nki"));
    }
}
