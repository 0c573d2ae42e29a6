//! Yamaha YSFC containers (Montage/MODX libraries and user files).
//!
//! Big endian. A 64 byte header is followed by a catalog of `(id, offset)`
//! pairs and the chunks it points to. Entry list chunks (`E***`) describe
//! the items of a kind; the matching data list chunk (`D***`) holds their
//! payloads in the same order.

pub mod category;

use log::debug;
use thiserror::Error;

use crate::error::{tag_name, FormatError, Result};
use crate::notify::Notifier;
use crate::stream::{write_ascii_fixed, write_null_terminated_ascii, write_u32, ByteReader, Endian};

pub use category::{main_category, performance_category, performance_sub_category};

const BE: Endian = Endian::Big;

pub const MAGIC: &[u8] = b"YAMAHA-YSFC";
const FIELD_LENGTH: usize = 16;
const RESERVED_LENGTH: usize = 28;
const HEADER_LENGTH: usize = 2 * FIELD_LENGTH + 4 + RESERVED_LENGTH;
const CATALOG_ENTRY_LENGTH: usize = 8;

const ENTRY_TAG: &[u8; 4] = b"Entr";
const DATA_TAG: &[u8; 4] = b"Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Performance,
    Waveform,
    Arpeggio,
    MotionSequence,
    Curve,
    LiveSet,
    Microtuning,
}

impl ChunkKind {
    pub const ALL: [ChunkKind; 7] = [
        Self::Performance,
        Self::Waveform,
        Self::Arpeggio,
        Self::MotionSequence,
        Self::Curve,
        Self::LiveSet,
        Self::Microtuning,
    ];

    pub fn code(self) -> &'static [u8; 3] {
        match self {
            Self::Performance => b"PFM",
            Self::Waveform => b"WFM",
            Self::Arpeggio => b"ARP",
            Self::MotionSequence => b"MSQ",
            Self::Curve => b"CRV",
            Self::LiveSet => b"LST",
            Self::Microtuning => b"MTN",
        }
    }

    pub fn entry_list_id(self) -> [u8; 4] {
        let [a, b, c] = *self.code();
        [b'E', a, b, c]
    }

    pub fn data_list_id(self) -> [u8; 4] {
        let [a, b, c] = *self.code();
        [b'D', a, b, c]
    }

    fn from_id(id: &[u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| &id[1..] == kind.code())
    }
}

/// One item description of an entry list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YsfcEntry {
    pub data_length: u32,
    pub data_offset: u32,
    /// Kind specific: the category mask for performances, the waveform
    /// number for waveforms, ...
    pub specific_value: u32,
    pub flags: u8,
    pub title: String,
    pub filename: String,
    /// Kind specific trailing bytes, kept as read.
    pub rest: Vec<u8>,
}

impl YsfcEntry {
    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        r.expect_tag(ENTRY_TAG)?;
        let length = r.u32(BE)? as usize;
        let mut body = ByteReader::new(r.bytes(length)?);
        let data_length = body.u32(BE)?;
        let data_offset = body.u32(BE)?;
        let specific_value = body.u32(BE)?;
        let flags = body.u8()?;
        let title = body.null_terminated_ascii(length)?;
        let filename = body.null_terminated_ascii(length)?;
        Ok(Self {
            data_length,
            data_offset,
            specific_value,
            flags,
            title,
            filename,
            rest: body.rest().to_vec(),
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        write_u32(&mut body, self.data_length, BE)?;
        write_u32(&mut body, self.data_offset, BE)?;
        write_u32(&mut body, self.specific_value, BE)?;
        body.push(self.flags);
        write_null_terminated_ascii(&mut body, &self.title);
        write_null_terminated_ascii(&mut body, &self.filename);
        body.extend_from_slice(&self.rest);

        out.extend_from_slice(ENTRY_TAG);
        write_u32(out, body.len() as u32, BE)?;
        out.extend_from_slice(&body);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YsfcChunkBody {
    Entries(Vec<YsfcEntry>),
    Data(Vec<Vec<u8>>),
    Opaque(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YsfcChunk {
    pub id: [u8; 4],
    pub body: YsfcChunkBody,
}

impl YsfcChunk {
    pub fn id_name(&self) -> String {
        tag_name(&self.id)
    }

    pub fn entries(&self) -> &[YsfcEntry] {
        match &self.body {
            YsfcChunkBody::Entries(entries) => entries,
            _ => &[],
        }
    }

    pub fn data(&self) -> &[Vec<u8>] {
        match &self.body {
            YsfcChunkBody::Data(items) => items,
            _ => &[],
        }
    }

    fn parse(id: [u8; 4], payload: &[u8]) -> Result<Self> {
        let kind = ChunkKind::from_id(&id);
        let body = match (id[0], kind) {
            (b'E', Some(_)) => {
                let mut r = ByteReader::new(payload);
                let count = r.u32(BE)? as usize;
                let entries = (0..count)
                    .map(|_| YsfcEntry::read(&mut r))
                    .collect::<Result<Vec<_>>>()?;
                YsfcChunkBody::Entries(entries)
            }
            (b'D', Some(_)) => {
                let mut r = ByteReader::new(payload);
                let count = r.u32(BE)? as usize;
                let mut items = Vec::with_capacity(count.min(r.remaining() / 8));
                for _ in 0..count {
                    r.expect_tag(DATA_TAG)?;
                    let length = r.u32(BE)? as usize;
                    items.push(r.bytes(length)?.to_vec());
                }
                YsfcChunkBody::Data(items)
            }
            _ => YsfcChunkBody::Opaque(payload.to_vec()),
        };
        Ok(Self { id, body })
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match &self.body {
            YsfcChunkBody::Entries(entries) => {
                write_u32(&mut out, entries.len() as u32, BE)?;
                for entry in entries {
                    entry.write(&mut out)?;
                }
            }
            YsfcChunkBody::Data(items) => {
                write_u32(&mut out, items.len() as u32, BE)?;
                for item in items {
                    out.extend_from_slice(DATA_TAG);
                    write_u32(&mut out, item.len() as u32, BE)?;
                    out.extend_from_slice(item);
                }
            }
            YsfcChunkBody::Opaque(data) => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

/// Entry and data list lengths of a kind disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Broken {kind:?} pairing: {entries} entries but {data} data items")]
pub struct BrokenPairing {
    pub kind: ChunkKind,
    pub entries: usize,
    pub data: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YsfcFile {
    /// Format version, e.g. `4.0.5`.
    pub version: String,
    pub chunks: Vec<YsfcChunk>,
}

impl YsfcFile {
    pub fn read(data: &[u8], notifier: &dyn Notifier) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let magic = r.bytes(FIELD_LENGTH)?;
        if !magic.starts_with(MAGIC) {
            return Err(FormatError::UnexpectedTag {
                expected: tag_name(MAGIC),
                found: tag_name(&magic[..MAGIC.len()]),
            });
        }
        let version = r.ascii(FIELD_LENGTH)?;
        let catalog_size = r.u32(BE)? as usize;
        r.skip(RESERVED_LENGTH)?;
        if catalog_size % CATALOG_ENTRY_LENGTH != 0 {
            return Err(FormatError::InvalidData(format!(
                "YSFC catalog size {catalog_size} is not a multiple of {CATALOG_ENTRY_LENGTH}"
            )));
        }

        let mut catalog = Vec::with_capacity(catalog_size / CATALOG_ENTRY_LENGTH);
        for _ in 0..catalog_size / CATALOG_ENTRY_LENGTH {
            catalog.push((r.array::<4>()?, r.u32(BE)? as usize));
        }

        let mut chunks = Vec::with_capacity(catalog.len());
        for (id, offset) in catalog {
            r.seek(offset)?;
            r.expect_tag(&id)?;
            let length = r.u32(BE)? as usize;
            let chunk = YsfcChunk::parse(id, r.bytes(length)?)?;
            if matches!(chunk.body, YsfcChunkBody::Opaque(_)) {
                notifier.unknown_tag("YSFC", &chunk.id_name());
            }
            chunks.push(chunk);
        }
        debug!("Read YSFC {version} with {} chunks", chunks.len());
        Ok(Self { version, chunks })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        let payloads = self
            .chunks
            .iter()
            .map(YsfcChunk::payload)
            .collect::<Result<Vec<_>>>()?;
        let catalog_size = self.chunks.len() * CATALOG_ENTRY_LENGTH;

        let mut out = Vec::new();
        write_ascii_fixed(&mut out, "YAMAHA-YSFC", FIELD_LENGTH);
        write_ascii_fixed(&mut out, &self.version, FIELD_LENGTH);
        write_u32(&mut out, catalog_size as u32, BE)?;
        out.resize(HEADER_LENGTH, 0xFF);

        let mut offset = HEADER_LENGTH + catalog_size;
        for (chunk, payload) in self.chunks.iter().zip(&payloads) {
            out.extend_from_slice(&chunk.id);
            write_u32(&mut out, offset as u32, BE)?;
            offset += 8 + payload.len();
        }
        for (chunk, payload) in self.chunks.iter().zip(&payloads) {
            out.extend_from_slice(&chunk.id);
            write_u32(&mut out, payload.len() as u32, BE)?;
            out.extend_from_slice(payload);
        }
        Ok(out)
    }

    pub fn chunk(&self, id: [u8; 4]) -> Option<&YsfcChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    pub fn entry_list_chunks(&self) -> impl Iterator<Item = &YsfcChunk> {
        self.chunks.iter().filter(|c| matches!(c.body, YsfcChunkBody::Entries(_)))
    }

    pub fn data_arrays(&self) -> impl Iterator<Item = &YsfcChunk> {
        self.chunks.iter().filter(|c| matches!(c.body, YsfcChunkBody::Data(_)))
    }

    /// Pairs the entries of a kind with their data items. Unequal lengths
    /// are reported and returned as an error; the rest of the file stays
    /// usable.
    pub fn paired(
        &self,
        kind: ChunkKind,
        notifier: &dyn Notifier,
    ) -> std::result::Result<Vec<(&YsfcEntry, &[u8])>, BrokenPairing> {
        let entries = self.chunk(kind.entry_list_id()).map(YsfcChunk::entries).unwrap_or(&[]);
        let data = self.chunk(kind.data_list_id()).map(YsfcChunk::data).unwrap_or(&[]);
        if entries.len() != data.len() {
            let broken = BrokenPairing {
                kind,
                entries: entries.len(),
                data: data.len(),
            };
            notifier.warn(&broken.to_string());
            return Err(broken);
        }
        Ok(entries.iter().zip(data.iter().map(Vec::as_slice)).collect())
    }
}
