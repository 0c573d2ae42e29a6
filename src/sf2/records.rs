//! Fixed-size `pdta` records.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite};

use crate::error::{FormatError, Result};
use crate::riff::{FourCc, RawChunk};
use crate::stream::ascii_until_nul;

pub const NAME_LENGTH: usize = 20;

pub fn name_from(field: &[u8; NAME_LENGTH]) -> String {
    ascii_until_nul(field)
}

pub fn name_field(text: &str) -> [u8; NAME_LENGTH] {
    let mut field = [0u8; NAME_LENGTH];
    let bytes = text.as_bytes();
    let len = bytes.len().min(NAME_LENGTH);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresetHeader {
    pub name: [u8; NAME_LENGTH],
    pub preset: u16,
    pub bank: u16,
    pub bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bag {
    pub generator_index: u16,
    pub modulator_index: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModulatorRecord {
    pub source: u16,
    pub destination: u16,
    pub amount: i16,
    pub amount_source: u16,
    pub transform: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorRecord {
    pub operator: u16,
    pub amount: i16,
}

impl GeneratorRecord {
    pub fn new(operator: u16, amount: i16) -> Self {
        Self { operator, amount }
    }

    pub fn range(operator: u16, low: u8, high: u8) -> Self {
        Self::new(operator, i16::from_le_bytes([low, high]))
    }

    /// Low and high byte of a range amount.
    pub fn as_range(&self) -> (u8, u8) {
        let [low, high] = self.amount.to_le_bytes();
        (low, high)
    }

    pub fn as_index(&self) -> usize {
        usize::from(self.amount as u16)
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentHeader {
    pub name: [u8; NAME_LENGTH],
    pub bag_index: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleHeader {
    pub name: [u8; NAME_LENGTH],
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_link: u16,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn name(&self) -> String {
        name_from(&self.name)
    }

    pub fn frames(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// A record type stored as an array in one `pdta` sub-chunk.
pub trait Record: Sized {
    const SIZE: usize;

    fn read_one(cursor: &mut Cursor<&[u8]>) -> BinResult<Self>;

    fn write_one(&self, cursor: &mut Cursor<Vec<u8>>) -> BinResult<()>;
}

macro_rules! impl_record {
    ($($ty:ty => $size:expr),* $(,)?) => {
        $(
            impl Record for $ty {
                const SIZE: usize = $size;

                fn read_one(cursor: &mut Cursor<&[u8]>) -> BinResult<Self> {
                    <$ty as BinRead>::read(cursor)
                }

                fn write_one(&self, cursor: &mut Cursor<Vec<u8>>) -> BinResult<()> {
                    BinWrite::write(self, cursor)
                }
            }
        )*
    };
}

impl_record! {
    PresetHeader => 38,
    Bag => 4,
    ModulatorRecord => 10,
    GeneratorRecord => 4,
    InstrumentHeader => 22,
    SampleHeader => 46,
}

pub fn read_records<T: Record>(pdta: &RawChunk, tag: FourCc) -> Result<Vec<T>> {
    let chunk = pdta
        .find(tag)
        .ok_or_else(|| FormatError::InvalidData(format!("missing '{tag}' chunk")))?;
    let data = chunk
        .payload()
        .ok_or_else(|| FormatError::InvalidData(format!("'{tag}' is a container")))?;
    if data.len() % T::SIZE != 0 {
        return Err(FormatError::ChunkSizeMismatch {
            tag: tag.to_string(),
            declared: data.len() as u64,
            actual: (data.len() - data.len() % T::SIZE) as u64,
        });
    }
    let mut cursor = Cursor::new(data);
    (0..data.len() / T::SIZE)
        .map(|_| T::read_one(&mut cursor).map_err(FormatError::from))
        .collect()
}

pub fn records_chunk<T: Record>(tag: FourCc, records: &[T]) -> Result<RawChunk> {
    let mut cursor = Cursor::new(Vec::with_capacity(records.len() * T::SIZE));
    for record in records {
        record.write_one(&mut cursor)?;
    }
    Ok(RawChunk::leaf(tag, cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdta_with(tag: FourCc, payload: Vec<u8>) -> RawChunk {
        RawChunk::list(FourCc::LIST, Some(FourCc::new(b"pdta")), vec![RawChunk::leaf(tag, payload)])
    }

    #[test]
    fn test_record_sizes() {
        let tag = FourCc::new(b"shdr");
        let chunk = records_chunk(tag, &[SampleHeader::default()]).unwrap();
        assert_eq!(chunk.payload().unwrap().len(), SampleHeader::SIZE);
        let chunk = records_chunk(tag, &[PresetHeader::default()]).unwrap();
        assert_eq!(chunk.payload().unwrap().len(), PresetHeader::SIZE);
        let chunk = records_chunk(tag, &[InstrumentHeader::default()]).unwrap();
        assert_eq!(chunk.payload().unwrap().len(), InstrumentHeader::SIZE);
        let chunk = records_chunk(tag, &[ModulatorRecord::default()]).unwrap();
        assert_eq!(chunk.payload().unwrap().len(), ModulatorRecord::SIZE);
    }

    #[test]
    fn test_generator_layout() {
        let tag = FourCc::new(b"igen");
        let chunk = records_chunk(tag, &[GeneratorRecord::range(43, 36, 72)]).unwrap();
        assert_eq!(chunk.payload().unwrap(), &[43, 0, 36, 72]);

        let records: Vec<GeneratorRecord> = read_records(&pdta_with(tag, vec![53, 0, 2, 0]), tag).unwrap();
        assert_eq!(records[0].operator, 53);
        assert_eq!(records[0].as_index(), 2);
    }

    #[test]
    fn test_partial_record_fails() {
        let tag = FourCc::new(b"pbag");
        let result: Result<Vec<Bag>> = read_records(&pdta_with(tag, vec![0; 6]), tag);
        assert!(matches!(
            result,
            Err(FormatError::ChunkSizeMismatch { declared: 6, actual: 4, .. })
        ));
    }

    #[test]
    fn test_names() {
        let field = name_field("A very long sample name indeed");
        assert_eq!(name_from(&field), "A very long sample n");
        assert_eq!(name_from(&name_field("Kick")), "Kick");
    }
}
