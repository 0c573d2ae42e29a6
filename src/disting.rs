//! Expert Sleepers Disting EX presets (`.dexpreset`).
//!
//! A fixed 824 byte little-endian record.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use log::debug;

use crate::error::{FormatError, Result};
use crate::stream::ascii_until_nul;

pub const MAGIC: &[u8; 8] = b"DEXBPRST";
pub const PRESET_LENGTH: usize = 824;
pub const PARAMETER_COUNT: usize = 80;
const FOLDER_LENGTH: usize = 64;

#[binrw]
#[brw(little, magic = b"DEXBPRST")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistingPreset {
    pub version: i32,
    pub reserved: [u8; 500],
    pub preset_version: i32,
    pub name: [u8; 16],
    pub dual_mode: [u8; 32],
    pub algorithm: i32,
    /// Values above 32767 are stored as their two's complement.
    pub parameters: [i16; PARAMETER_COUNT],
    pub sample_folder: [u8; FOLDER_LENGTH],
    pub trailer: [u8; 32],
}

fn fill_field<const N: usize>(field: &mut [u8; N], text: &str) {
    *field = [0; N];
    let len = text.len().min(N);
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
}

impl DistingPreset {
    pub fn new(name: &str, algorithm: i32) -> Self {
        let mut preset = Self {
            version: 1,
            reserved: [0; 500],
            preset_version: 0,
            name: [0; 16],
            dual_mode: [0; 32],
            algorithm,
            parameters: [0; PARAMETER_COUNT],
            sample_folder: [0; FOLDER_LENGTH],
            trailer: [0; 32],
        };
        preset.set_name(name);
        preset
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PRESET_LENGTH {
            return Err(FormatError::TruncatedInput {
                offset: 0,
                needed: PRESET_LENGTH,
                available: bytes.len(),
            });
        }
        let preset = Self::read_le(&mut Cursor::new(bytes))?;
        debug!("Read Disting EX preset '{}' using algorithm {}", preset.name(), preset.algorithm);
        Ok(preset)
    }

    /// Serializes the preset. Every byte after the first NUL of the sample
    /// folder is written as `0xFF`.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut preset = self.clone();
        if let Some(nul) = preset.sample_folder.iter().position(|&b| b == 0) {
            preset.sample_folder[nul + 1..].fill(0xFF);
        }
        let mut cursor = Cursor::new(Vec::with_capacity(PRESET_LENGTH));
        preset.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn name(&self) -> String {
        ascii_until_nul(&self.name)
    }

    pub fn set_name(&mut self, name: &str) {
        fill_field(&mut self.name, name);
    }

    pub fn sample_folder(&self) -> String {
        ascii_until_nul(&self.sample_folder)
    }

    pub fn set_sample_folder(&mut self, folder: &str) {
        fill_field(&mut self.sample_folder, folder);
    }

    /// Parameter value as an unsigned 16 bit number.
    pub fn parameter(&self, index: usize) -> Option<u16> {
        self.parameters.get(index).map(|&v| v as u16)
    }

    pub fn signed_parameter(&self, index: usize) -> Option<i16> {
        self.parameters.get(index).copied()
    }

    pub fn set_parameter(&mut self, index: usize, value: u16) -> Result<()> {
        let slot = self
            .parameters
            .get_mut(index)
            .ok_or_else(|| FormatError::InvalidParameterValue("parameter index".to_string(), index as i32))?;
        *slot = value as i16;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut preset = DistingPreset::new("Strings", 3);
        preset.set_sample_folder("Strings");
        preset.set_parameter(0, 40000).unwrap();
        preset.set_parameter(79, 12).unwrap();
        let bytes = preset.write().unwrap();
        assert_eq!(bytes.len(), PRESET_LENGTH);
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(&bytes[8..12], &1i32.to_le_bytes());
        // name after magic, version, reserved block and preset version
        assert_eq!(&bytes[516..523], b"Strings");
        assert_eq!(&bytes[564..568], &3i32.to_le_bytes());
        assert_eq!(&bytes[568..570], &40000u16.to_le_bytes());
        assert_eq!(&bytes[728..735], b"Strings");
        assert_eq!(bytes[735], 0);
        assert!(bytes[736..792].iter().all(|&b| b == 0xFF));
        assert!(bytes[792..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_back() {
        let mut preset = DistingPreset::new("Keys", 7);
        preset.set_sample_folder("Keys/Rhodes");
        preset.set_parameter(5, 65535).unwrap();
        let read = DistingPreset::read(&preset.write().unwrap()).unwrap();
        assert_eq!(read.name(), "Keys");
        assert_eq!(read.algorithm, 7);
        assert_eq!(read.sample_folder(), "Keys/Rhodes");
        assert_eq!(read.parameter(5), Some(65535));
        assert_eq!(read.signed_parameter(5), Some(-1));
        assert_eq!(read.parameter(80), None);
        // written again the sanitized folder is stable
        assert_eq!(read.write().unwrap(), preset.write().unwrap());
    }

    #[test]
    fn test_folder_without_terminator_is_kept() {
        let mut preset = DistingPreset::new("Full", 0);
        preset.sample_folder = [b'a'; FOLDER_LENGTH];
        let bytes = preset.write().unwrap();
        assert!(bytes[728..792].iter().all(|&b| b == b'a'));
    }

    #[test]
    fn test_bad_input() {
        let mut bytes = DistingPreset::new("x", 0).write().unwrap();
        assert!(matches!(
            DistingPreset::read(&bytes[..PRESET_LENGTH - 1]),
            Err(FormatError::TruncatedInput { needed: PRESET_LENGTH, .. })
        ));
        bytes[0] = b'X';
        assert!(matches!(DistingPreset::read(&bytes), Err(FormatError::UnexpectedTag { .. })));
        assert!(DistingPreset::new("x", 0).set_parameter(80, 1).is_err());
    }
}
