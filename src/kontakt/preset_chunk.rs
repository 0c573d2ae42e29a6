//! The preset chunk tree used by Kontakt 4.2 and later bodies.
//!
//! Every node is `u16 id | u32 length | u8 structured`. A structured node
//! continues with `u16 version | u16 child count` and three size-prefixed
//! regions (private data, public data, children); an unstructured node
//! carries only public data.

use std::fmt;

use log::debug;

use crate::error::{FormatError, Result};
use crate::notify::Notifier;
use crate::stream::{write_u16, write_u32, ByteReader, Endian};

const LE: Endian = Endian::Little;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkId {
    Bank,
    Program,
    Zone,
    VoiceGroup,
    GroupList,
    ZoneList,
    LoopArray,
    ParameterArray8,
    FilenameList,
    InsertBus,
    SaveSettings,
    FilenameListEx,
    QuickBrowseData,
}

static CHUNK_IDS: [(u16, ChunkId, &str); 13] = [
    (0x03, ChunkId::Bank, "Bank"),
    (0x28, ChunkId::Program, "Program"),
    (0x2C, ChunkId::Zone, "Zone"),
    (0x32, ChunkId::VoiceGroup, "VoiceGroup"),
    (0x33, ChunkId::GroupList, "GroupList"),
    (0x34, ChunkId::ZoneList, "ZoneList"),
    (0x39, ChunkId::LoopArray, "LoopArray"),
    (0x3A, ChunkId::ParameterArray8, "ParameterArray8"),
    (0x3D, ChunkId::FilenameList, "FilenameList"),
    (0x45, ChunkId::InsertBus, "InsertBus"),
    (0x47, ChunkId::SaveSettings, "SaveSettings"),
    (0x4B, ChunkId::FilenameListEx, "FilenameListEx"),
    (0x4E, ChunkId::QuickBrowseData, "QuickBrowseData"),
];

impl ChunkId {
    pub fn from_code(code: u16) -> Option<Self> {
        CHUNK_IDS.iter().find(|(c, _, _)| *c == code).map(|(_, id, _)| *id)
    }

    pub fn code(self) -> u16 {
        CHUNK_IDS
            .iter()
            .find(|(_, id, _)| *id == self)
            .map(|(code, _, _)| *code)
            .unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        CHUNK_IDS
            .iter()
            .find(|(_, id, _)| *id == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetChunk {
    pub id: ChunkId,
    pub version: u16,
    pub structured: bool,
    pub private_data: Vec<u8>,
    pub public_data: Vec<u8>,
    pub children: Vec<PresetChunk>,
}

impl PresetChunk {
    pub fn structured(id: ChunkId, version: u16, public_data: Vec<u8>, children: Vec<PresetChunk>) -> Self {
        Self {
            id,
            version,
            structured: true,
            private_data: Vec::new(),
            public_data,
            children,
        }
    }

    pub fn unstructured(id: ChunkId, public_data: Vec<u8>) -> Self {
        Self {
            id,
            version: 0,
            structured: false,
            private_data: Vec::new(),
            public_data,
            children: Vec::new(),
        }
    }

    /// Parses consecutive chunks until `data` is exhausted.
    pub fn parse_all(data: &[u8], notifier: &dyn Notifier) -> Result<Vec<PresetChunk>> {
        let mut reader = ByteReader::new(data);
        let mut chunks = Vec::new();
        while !reader.is_at_end() {
            chunks.push(Self::parse(&mut reader, notifier)?);
        }
        Ok(chunks)
    }

    /// Parses one chunk. An unknown id aborts: nothing after an unrecognised
    /// header can be trusted.
    pub fn parse(reader: &mut ByteReader<'_>, notifier: &dyn Notifier) -> Result<PresetChunk> {
        let code = reader.u16(LE)?;
        let Some(id) = ChunkId::from_code(code) else {
            let found = format!("0x{code:02X}");
            notifier.unknown_tag("preset", &found);
            return Err(FormatError::UnexpectedTag {
                expected: "preset chunk id".to_string(),
                found,
            });
        };
        let length = reader.u32(LE)? as usize;
        if length > reader.remaining() {
            return Err(FormatError::ChunkSizeMismatch {
                tag: id.to_string(),
                declared: length as u64,
                actual: reader.remaining() as u64,
            });
        }
        let mut body = ByteReader::new(reader.bytes(length)?);

        let structured = body.u8()? != 0;
        if !structured {
            return Ok(Self::unstructured(id, body.rest().to_vec()));
        }

        let version = body.u16(LE)?;
        let child_count = body.u16(LE)?;
        let private_data = region(&mut body, id, length)?.to_vec();
        let public_data = region(&mut body, id, length)?.to_vec();
        let children_data = region(&mut body, id, length)?;
        if !body.is_at_end() {
            return Err(FormatError::ChunkSizeMismatch {
                tag: id.to_string(),
                declared: length as u64,
                actual: body.position() as u64,
            });
        }

        let children = Self::parse_all(children_data, notifier)?;
        if children.len() != usize::from(child_count) {
            notifier.warn(&format!(
                "{id} declares {child_count} children but contains {}",
                children.len()
            ));
        }
        debug!("{id} v0x{version:02X}: {} public bytes, {} children", public_data.len(), children.len());

        Ok(Self {
            id,
            version,
            structured,
            private_data,
            public_data,
            children,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.id.code(), LE)?;
        let length_pos = out.len();
        out.extend_from_slice(&[0; 4]);
        let start = out.len();

        out.push(u8::from(self.structured));
        if self.structured {
            write_u16(out, self.version, LE)?;
            let child_count = u16::try_from(self.children.len()).map_err(|_| {
                FormatError::InvalidParameterValue("child count".to_string(), self.children.len() as i32)
            })?;
            write_u16(out, child_count, LE)?;
            write_u32(out, self.private_data.len() as u32, LE)?;
            out.extend_from_slice(&self.private_data);
            write_u32(out, self.public_data.len() as u32, LE)?;
            out.extend_from_slice(&self.public_data);

            let mut children = Vec::new();
            for child in &self.children {
                child.write(&mut children)?;
            }
            write_u32(out, children.len() as u32, LE)?;
            out.extend_from_slice(&children);
        } else {
            out.extend_from_slice(&self.public_data);
        }

        let length = (out.len() - start) as u32;
        out[length_pos..length_pos + 4].copy_from_slice(&length.to_le_bytes());
        Ok(())
    }

    pub fn write_all(chunks: &[PresetChunk]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in chunks {
            chunk.write(&mut out)?;
        }
        Ok(out)
    }

    pub fn child(&self, id: ChunkId) -> Option<&PresetChunk> {
        self.children.iter().find(|c| c.id == id)
    }

    pub fn children_of(&self, id: ChunkId) -> impl Iterator<Item = &PresetChunk> {
        self.children.iter().filter(move |c| c.id == id)
    }

    /// Depth-first search including `self`.
    pub fn find(&self, id: ChunkId) -> Option<&PresetChunk> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Finds the first chunk with `id` anywhere in a forest.
pub fn find_in(chunks: &[PresetChunk], id: ChunkId) -> Option<&PresetChunk> {
    chunks.iter().find_map(|c| c.find(id))
}

fn region<'a>(body: &mut ByteReader<'a>, id: ChunkId, length: usize) -> Result<&'a [u8]> {
    let size = body.u32(LE)? as usize;
    if size > body.remaining() {
        return Err(FormatError::ChunkSizeMismatch {
            tag: id.to_string(),
            declared: length as u64,
            actual: (body.position() + size) as u64,
        });
    }
    body.bytes(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingNotifier;

    fn tree() -> PresetChunk {
        PresetChunk::structured(
            ChunkId::Program,
            0x80,
            vec![1, 2, 3],
            vec![
                PresetChunk::structured(
                    ChunkId::ZoneList,
                    0,
                    Vec::new(),
                    vec![PresetChunk::structured(ChunkId::Zone, 0x9A, vec![9; 10], Vec::new())],
                ),
                PresetChunk::unstructured(ChunkId::ParameterArray8, vec![7, 7]),
            ],
        )
    }

    #[test]
    fn test_tree_round_trip() {
        let bytes = PresetChunk::write_all(&[tree()]).unwrap();
        let notifier = CollectingNotifier::new();
        let parsed = PresetChunk::parse_all(&bytes, &notifier).unwrap();
        assert_eq!(parsed, vec![tree()]);
        assert_eq!(PresetChunk::write_all(&parsed).unwrap(), bytes);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_unstructured_layout() {
        let mut out = Vec::new();
        PresetChunk::unstructured(ChunkId::ParameterArray8, vec![0xAB, 0xCD]).write(&mut out).unwrap();
        assert_eq!(out, vec![0x3A, 0x00, 3, 0, 0, 0, 0, 0xAB, 0xCD]);
    }

    #[test]
    fn test_find_descends() {
        let root = tree();
        assert_eq!(root.find(ChunkId::Zone).unwrap().version, 0x9A);
        assert!(root.find(ChunkId::Bank).is_none());
        assert_eq!(root.children_of(ChunkId::ZoneList).count(), 1);
    }

    #[test]
    fn test_unknown_id_aborts() {
        let mut bytes = PresetChunk::write_all(&[tree()]).unwrap();
        bytes[0] = 0x99;
        let notifier = CollectingNotifier::new();
        assert!(matches!(
            PresetChunk::parse_all(&bytes, &notifier),
            Err(FormatError::UnexpectedTag { .. })
        ));
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn test_region_larger_than_chunk_fails() {
        let mut bytes = Vec::new();
        PresetChunk::structured(ChunkId::Zone, 1, vec![1, 2, 3, 4], Vec::new())
            .write(&mut bytes)
            .unwrap();
        // public size field sits after id, length, flag, version, count, private size
        let public_size = 2 + 4 + 1 + 2 + 2 + 4;
        bytes[public_size..public_size + 4].copy_from_slice(&40u32.to_le_bytes());
        let notifier = CollectingNotifier::new();
        assert!(matches!(
            PresetChunk::parse_all(&bytes, &notifier),
            Err(FormatError::ChunkSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_leftover_bytes_in_chunk_fail() {
        let mut bytes = Vec::new();
        PresetChunk::structured(ChunkId::Zone, 1, vec![1, 2], Vec::new())
            .write(&mut bytes)
            .unwrap();
        bytes.push(0);
        let length = (bytes.len() - 6) as u32;
        bytes[2..6].copy_from_slice(&length.to_le_bytes());
        let notifier = CollectingNotifier::new();
        assert!(matches!(
            PresetChunk::parse_all(&bytes, &notifier),
            Err(FormatError::ChunkSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_chunk_longer_than_input_fails() {
        let mut bytes = PresetChunk::write_all(&[tree()]).unwrap();
        bytes.truncate(bytes.len() - 1);
        let notifier = CollectingNotifier::new();
        assert!(matches!(
            PresetChunk::parse_all(&bytes, &notifier),
            Err(FormatError::ChunkSizeMismatch { .. })
        ));
    }
}
