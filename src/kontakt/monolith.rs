//! Monolith files: one Kontakt instrument plus all of its samples.
//!
//! A monolith starts with a dictionary naming the embedded instrument and a
//! samples sub-dictionary. The sub-dictionary names the samples but no usable
//! offsets for them are known, so sample records are located by scanning
//! backwards from the end of the file for the NCW header signature and
//! stopping once one match per named sample has been found. This is a
//! heuristic: a signature inside unrelated data would be picked up as well.

use log::debug;

use crate::error::{FormatError, Result};
use crate::stream::{write_u16, write_u32, write_u64, write_utf16_with_length, ByteReader, Endian};

const LE: Endian = Endian::Little;

pub const DICTIONARY_MAGIC: [u8; 4] = [0x5E, 0x70, 0xAC, 0x54];
pub const NCW_SIGNATURE: [u8; 4] = [0x01, 0xA8, 0x9E, 0xD6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    End,
    Dictionary,
    Sample,
    Nki,
}

impl ReferenceType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::End),
            1 => Some(Self::Dictionary),
            2 => Some(Self::Sample),
            3 => Some(Self::Nki),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::End => 0,
            Self::Dictionary => 1,
            Self::Sample => 2,
            Self::Nki => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryItem {
    pub kind: ReferenceType,
    /// Absolute offset in the monolith file.
    pub offset: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub version: u16,
    pub items: Vec<DictionaryItem>,
}

impl Dictionary {
    /// Reads the dictionary starting at `offset` of the whole file.
    pub fn read(data: &[u8], offset: usize) -> Result<Self> {
        let mut r = ByteReader::new(data);
        r.seek(offset)?;
        r.expect_tag(&DICTIONARY_MAGIC)?;
        let version = r.u16(LE)?;
        let count = r.u32(LE)? as usize;
        let mut items = Vec::with_capacity(count.min(r.remaining() / 16));
        for _ in 0..count {
            let raw_kind = r.u32(LE)?;
            let kind = ReferenceType::from_u32(raw_kind).ok_or_else(|| {
                FormatError::InvalidData(format!("unknown dictionary reference type {raw_kind}"))
            })?;
            let offset = r.u64(LE)?;
            let name = r.utf16_with_length()?;
            items.push(DictionaryItem { kind, offset, name });
        }
        Ok(Self { version, items })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&DICTIONARY_MAGIC);
        write_u16(out, self.version, LE)?;
        write_u32(out, self.items.len() as u32, LE)?;
        for item in &self.items {
            write_u32(out, item.kind.to_u32(), LE)?;
            write_u64(out, item.offset, LE)?;
            write_utf16_with_length(out, &item.name)?;
        }
        Ok(())
    }

    pub fn first(&self, kind: ReferenceType) -> Option<&DictionaryItem> {
        self.items.iter().find(|item| item.kind == kind)
    }

    pub fn items_of(&self, kind: ReferenceType) -> impl Iterator<Item = &DictionaryItem> {
        self.items.iter().filter(move |item| item.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSample {
    pub name: String,
    /// Offset of the NCW header in the monolith file.
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monolith {
    pub dictionary: Dictionary,
    pub samples_dictionary: Option<Dictionary>,
    /// Offset of the embedded Kontakt file.
    pub nki_offset: usize,
    pub samples: Vec<EmbeddedSample>,
}

impl Monolith {
    pub fn is_monolith(data: &[u8]) -> bool {
        data.starts_with(&DICTIONARY_MAGIC)
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        let dictionary = Dictionary::read(data, 0)?;
        let nki = dictionary.first(ReferenceType::Nki).ok_or_else(|| {
            FormatError::InvalidData("monolith dictionary has no instrument entry".to_string())
        })?;
        let nki_offset = checked_offset(nki.offset, data.len())?;

        let samples_dictionary = match dictionary.first(ReferenceType::Dictionary) {
            Some(item) => Some(Dictionary::read(data, checked_offset(item.offset, data.len())?)?),
            None => None,
        };
        let names: Vec<String> = samples_dictionary
            .iter()
            .flat_map(|d| d.items_of(ReferenceType::Sample))
            .map(|item| item.name.clone())
            .collect();
        let samples = locate_samples(data, &names)?;
        debug!("Monolith holds {} samples, instrument at 0x{nki_offset:X}", samples.len());

        Ok(Self {
            dictionary,
            samples_dictionary,
            nki_offset,
            samples,
        })
    }

    /// The embedded Kontakt file, up to the first sample record behind it.
    pub fn nki_bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let end = self
            .samples
            .iter()
            .map(|s| s.offset)
            .filter(|&offset| offset > self.nki_offset)
            .min()
            .unwrap_or(data.len());
        &data[self.nki_offset.min(end)..end]
    }

    pub fn sample_bytes<'a>(&self, data: &'a [u8], index: usize) -> Option<&'a [u8]> {
        let sample = self.samples.get(index)?;
        data.get(sample.offset..sample.offset + sample.length)
    }
}

fn checked_offset(offset: u64, len: usize) -> Result<usize> {
    match usize::try_from(offset) {
        Ok(offset) if offset < len => Ok(offset),
        _ => Err(FormatError::TruncatedInput {
            offset: len,
            needed: usize::try_from(offset).unwrap_or(usize::MAX),
            available: len,
        }),
    }
}

/// Scans backwards for one NCW signature per name. Samples are assigned in
/// file order; each extends to the next signature or the end of the file.
fn locate_samples(data: &[u8], names: &[String]) -> Result<Vec<EmbeddedSample>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut offsets = Vec::with_capacity(names.len());
    let mut end = data.len();
    while offsets.len() < names.len() {
        let Some(pos) = data[..end]
            .windows(NCW_SIGNATURE.len())
            .rposition(|window| window == NCW_SIGNATURE)
        else {
            break;
        };
        offsets.push(pos);
        end = pos;
    }
    if offsets.len() < names.len() {
        return Err(FormatError::SampleCountMismatch {
            expected: names.len(),
            found: offsets.len(),
        });
    }

    offsets.reverse();
    let mut samples = Vec::with_capacity(names.len());
    for (i, (name, &offset)) in names.iter().zip(&offsets).enumerate() {
        let next = offsets.get(i + 1).copied().unwrap_or(data.len());
        samples.push(EmbeddedSample {
            name: name.clone(),
            offset,
            length: next - offset,
        });
    }
    Ok(samples)
}
