//! Generic tag + length chunk container (RIFF style).
//!
//! A chunk is a 4-byte tag, a 4-byte length and a payload. Tags registered as
//! containers hold a sequence of child chunks (optionally preceded by a
//! 4-byte form type, as `RIFF` and `LIST` do); everything else is kept as an
//! opaque leaf so files round-trip byte for byte.

use std::fmt;

use log::debug;

use crate::error::{tag_name, FormatError, Result};
use crate::stream::{write_u32, ByteReader, Endian};

/// A four character chunk code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: FourCc = FourCc(*b"RIFF");
    pub const LIST: FourCc = FourCc(*b"LIST");

    pub const fn new(tag: &[u8; 4]) -> Self {
        FourCc(*tag)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&tag_name(&self.0))
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    Leaf(Vec<u8>),
    List {
        form: Option<FourCc>,
        children: Vec<RawChunk>,
    },
}

/// A chunk as found in the file. `declared_size` is the length field read
/// from disk; writers always recompute it from the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub tag: FourCc,
    pub declared_size: u32,
    pub body: ChunkBody,
}

impl RawChunk {
    pub fn leaf(tag: FourCc, payload: Vec<u8>) -> Self {
        Self {
            tag,
            declared_size: payload.len() as u32,
            body: ChunkBody::Leaf(payload),
        }
    }

    pub fn list(tag: FourCc, form: Option<FourCc>, children: Vec<RawChunk>) -> Self {
        let mut chunk = Self {
            tag,
            declared_size: 0,
            body: ChunkBody::List { form, children },
        };
        chunk.declared_size = chunk.body_size() as u32;
        chunk
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, ChunkBody::List { .. })
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            ChunkBody::Leaf(data) => Some(data),
            ChunkBody::List { .. } => None,
        }
    }

    pub fn form(&self) -> Option<FourCc> {
        match &self.body {
            ChunkBody::List { form, .. } => *form,
            ChunkBody::Leaf(_) => None,
        }
    }

    pub fn children(&self) -> &[RawChunk] {
        match &self.body {
            ChunkBody::List { children, .. } => children,
            ChunkBody::Leaf(_) => &[],
        }
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: FourCc) -> Option<&RawChunk> {
        self.children().iter().find(|c| c.tag == tag)
    }

    /// First direct `LIST` child with the given form type.
    pub fn find_list(&self, form: FourCc) -> Option<&RawChunk> {
        self.children()
            .iter()
            .find(|c| c.tag == FourCc::LIST && c.form() == Some(form))
    }

    /// Serialized body length, without header and trailing pad byte.
    pub fn body_size(&self) -> usize {
        match &self.body {
            ChunkBody::Leaf(data) => data.len(),
            ChunkBody::List { form, children } => {
                let form_len = if form.is_some() { 4 } else { 0 };
                form_len
                    + children
                        .iter()
                        .map(|c| {
                            let size = c.body_size();
                            8 + size + size % 2
                        })
                        .sum::<usize>()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContainerTag {
    tag: FourCc,
    has_form: bool,
}

/// Parses chunk trees. Which tags are containers is configured per format.
#[derive(Debug, Clone)]
pub struct RiffParser {
    endian: Endian,
    containers: Vec<ContainerTag>,
    zero_size_root_extends: bool,
    strict: bool,
}

impl Default for RiffParser {
    fn default() -> Self {
        Self::new(Endian::Little)
    }
}

impl RiffParser {
    /// A parser knowing `RIFF` and `LIST` as containers with form types.
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            containers: vec![
                ContainerTag { tag: FourCc::RIFF, has_form: true },
                ContainerTag { tag: FourCc::LIST, has_form: true },
            ],
            zero_size_root_extends: false,
            strict: true,
        }
    }

    /// Registers an additional container tag.
    pub fn with_container(mut self, tag: FourCc, has_form: bool) -> Self {
        self.containers.push(ContainerTag { tag, has_form });
        self
    }

    /// Treats a root length of zero as "until the end of the buffer".
    pub fn with_zero_size_root(mut self, extends: bool) -> Self {
        self.zero_size_root_extends = extends;
        self
    }

    /// When not strict, a root length larger than the buffer is clamped.
    pub fn with_strict_sizes(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn container(&self, tag: FourCc) -> Option<ContainerTag> {
        self.containers.iter().copied().find(|c| c.tag == tag)
    }

    /// Parses the root chunk at the start of `data`.
    pub fn parse(&self, data: &[u8]) -> Result<RawChunk> {
        let mut reader = ByteReader::new(data);
        let tag = FourCc(reader.array()?);
        let declared = reader.u32(self.endian)?;
        let available = reader.remaining();

        let length = if declared == 0 && self.zero_size_root_extends {
            available
        } else if declared as usize > available {
            if self.strict {
                return Err(FormatError::TruncatedInput {
                    offset: 8,
                    needed: declared as usize,
                    available,
                });
            }
            debug!("Root chunk '{tag}' declares {declared} bytes, clamping to {available}");
            available
        } else {
            declared as usize
        };

        let body = reader.bytes(length)?;
        let root = self.parse_body(tag, declared, body)?;
        let trailing = reader.remaining();
        if trailing > (length % 2) {
            debug!("Ignoring {trailing} trailing bytes after root chunk '{tag}'");
        }
        Ok(root)
    }

    fn parse_body(&self, tag: FourCc, declared: u32, body: &[u8]) -> Result<RawChunk> {
        let Some(container) = self.container(tag) else {
            return Ok(RawChunk {
                tag,
                declared_size: declared,
                body: ChunkBody::Leaf(body.to_vec()),
            });
        };

        let mut reader = ByteReader::new(body);
        let form = if container.has_form {
            Some(FourCc(reader.array()?))
        } else {
            None
        };
        let children = self.parse_children(tag, &mut reader)?;
        Ok(RawChunk {
            tag,
            declared_size: declared,
            body: ChunkBody::List { form, children },
        })
    }

    fn parse_children(&self, parent: FourCc, reader: &mut ByteReader<'_>) -> Result<Vec<RawChunk>> {
        let mut children = Vec::new();
        while !reader.is_at_end() {
            if reader.remaining() < 8 {
                return Err(FormatError::ChunkSizeMismatch {
                    tag: parent.to_string(),
                    declared: reader.len() as u64,
                    actual: reader.position() as u64,
                });
            }
            let tag = FourCc(reader.array()?);
            let size = reader.u32(self.endian)?;
            if size as usize > reader.remaining() {
                return Err(FormatError::ChunkSizeMismatch {
                    tag: tag.to_string(),
                    declared: u64::from(size),
                    actual: reader.remaining() as u64,
                });
            }
            let body = reader.bytes(size as usize)?;
            children.push(self.parse_body(tag, size, body)?);
            if size % 2 == 1 && !reader.is_at_end() {
                reader.skip(1)?;
            }
        }
        Ok(children)
    }
}

/// Serializes chunk trees; the exact inverse of [`RiffParser`].
#[derive(Debug, Clone, Copy)]
pub struct RiffWriter {
    endian: Endian,
}

impl Default for RiffWriter {
    fn default() -> Self {
        Self::new(Endian::Little)
    }
}

impl RiffWriter {
    pub fn new(endian: Endian) -> Self {
        Self { endian }
    }

    pub fn write(&self, chunk: &RawChunk) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(chunk.body_size() + 9);
        self.write_into(&mut out, chunk)?;
        Ok(out)
    }

    fn write_into(&self, out: &mut Vec<u8>, chunk: &RawChunk) -> Result<()> {
        out.extend_from_slice(chunk.tag.as_bytes());
        let size_pos = out.len();
        out.extend_from_slice(&[0; 4]);
        let start = out.len();
        match &chunk.body {
            ChunkBody::Leaf(data) => out.extend_from_slice(data),
            ChunkBody::List { form, children } => {
                if let Some(form) = form {
                    out.extend_from_slice(form.as_bytes());
                }
                for child in children {
                    self.write_into(out, child)?;
                }
            }
        }
        let size = out.len() - start;
        let mut size_bytes = Vec::with_capacity(4);
        write_u32(&mut size_bytes, size as u32, self.endian)?;
        out[size_pos..size_pos + 4].copy_from_slice(&size_bytes);
        if size % 2 == 1 {
            out.push(0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> RawChunk {
        RawChunk::list(
            FourCc::RIFF,
            Some(FourCc::new(b"TEST")),
            vec![
                RawChunk::leaf(FourCc::new(b"odd "), vec![1, 2, 3]),
                RawChunk::list(
                    FourCc::LIST,
                    Some(FourCc::new(b"INFO")),
                    vec![RawChunk::leaf(FourCc::new(b"INAM"), b"Piano\0".to_vec())],
                ),
                RawChunk::leaf(FourCc::new(b"xtra"), vec![9; 4]),
            ],
        )
    }

    #[test]
    fn test_write_then_parse_preserves_unknown_chunks() {
        let bytes = RiffWriter::default().write(&sample_tree()).unwrap();
        // odd leaf is padded: 12 + (8+3+1) + (8+4+8+6) + (8+4)
        assert_eq!(bytes.len(), 12 + 12 + 26 + 12);
        assert_eq!(&bytes[20..24], &[1, 2, 3, 0]);

        let parsed = RiffParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed, sample_tree());
        assert_eq!(RiffWriter::default().write(&parsed).unwrap(), bytes);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let bytes = RiffWriter::default().write(&sample_tree()).unwrap();
        let parser = RiffParser::default();
        assert_eq!(parser.parse(&bytes).unwrap(), parser.parse(&bytes).unwrap());
    }

    #[test]
    fn test_child_overrunning_parent_fails() {
        let mut bytes = RiffWriter::default().write(&sample_tree()).unwrap();
        // grow the first child's length past the parent's end
        bytes[16..20].copy_from_slice(&200u32.to_le_bytes());
        let err = RiffParser::default().parse(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::ChunkSizeMismatch { declared: 200, .. }));
    }

    #[test]
    fn test_leftover_bytes_in_parent_fail() {
        let tree = RawChunk::list(
            FourCc::RIFF,
            Some(FourCc::new(b"TEST")),
            vec![RawChunk::leaf(FourCc::new(b"data"), vec![0; 4])],
        );
        let mut bytes = RiffWriter::default().write(&tree).unwrap();
        bytes.extend_from_slice(&[0xAA; 4]);
        let declared = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&declared.to_le_bytes());
        let err = RiffParser::default().parse(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::ChunkSizeMismatch { .. }));
    }

    #[test]
    fn test_root_larger_than_buffer() {
        let mut bytes = RiffWriter::default().write(&sample_tree()).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            RiffParser::default().parse(&bytes),
            Err(FormatError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_zero_size_root_extends_to_end() {
        let mut bytes = RiffWriter::default().write(&sample_tree()).unwrap();
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        let parser = RiffParser::default().with_zero_size_root(true);
        let parsed = parser.parse(&bytes).unwrap();
        assert_eq!(parsed.children().len(), 3);
        assert_eq!(parsed.declared_size, 0);
    }

    #[test]
    fn test_custom_container_without_form() {
        let tree = RawChunk::list(
            FourCc::RIFF,
            Some(FourCc::new(b"APRG")),
            vec![RawChunk::list(
                FourCc::new(b"kgrp"),
                None,
                vec![RawChunk::leaf(FourCc::new(b"kloc"), vec![0; 16])],
            )],
        );
        let bytes = RiffWriter::default().write(&tree).unwrap();
        let parser = RiffParser::default().with_container(FourCc::new(b"kgrp"), false);
        let parsed = parser.parse(&bytes).unwrap();
        let kgrp = parsed.find(FourCc::new(b"kgrp")).unwrap();
        assert!(kgrp.is_container());
        assert_eq!(kgrp.children()[0].payload().unwrap().len(), 16);

        // without registration the group stays an opaque leaf
        let opaque = RiffParser::default().parse(&bytes).unwrap();
        assert!(!opaque.find(FourCc::new(b"kgrp")).unwrap().is_container());
    }

    #[test]
    fn test_big_endian_lengths() {
        let tree = RawChunk::list(
            FourCc::new(b"FORM"),
            Some(FourCc::new(b"AIFF")),
            vec![RawChunk::leaf(FourCc::new(b"COMM"), vec![0; 18])],
        );
        let writer = RiffWriter::new(Endian::Big);
        let bytes = writer.write(&tree).unwrap();
        assert_eq!(&bytes[4..8], &30u32.to_be_bytes());
        let parser = RiffParser::new(Endian::Big).with_container(FourCc::new(b"FORM"), true);
        assert_eq!(parser.parse(&bytes).unwrap(), tree);
    }
}
