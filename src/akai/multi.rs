use crate::akai::ChunkCodec;
use crate::error::{FormatError, Result};
use crate::riff::FourCc;
use crate::stream::ByteReader;

const PART_NAME_LENGTH: usize = 32;

/// `part` chunk of a multi: one program slot. Read only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkmPart {
    pub program_name: String,
    /// 0-based; channels above 15 address the second MIDI port.
    pub midi_channel: u8,
    /// -50 (left) ..= 50 (right)
    pub pan: i8,
    pub low_key: u8,
    pub high_key: u8,
    /// 0..=100
    pub volume: u8,
}

impl AkmPart {
    pub fn panorama(&self) -> f64 {
        f64::from(self.pan) / 50.0
    }
}

impl ChunkCodec for AkmPart {
    const TAG: FourCc = FourCc::new(b"part");
    const LENGTH: usize = 0x2C;

    fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        reader.skip(2)?;
        let program_name = reader.ascii(PART_NAME_LENGTH)?;
        let midi_channel = reader.u8()?;
        let pan = reader.i8()?;
        let low_key = reader.u8()?;
        let high_key = reader.u8()?;
        let volume = reader.u8()?;
        // fine tune, transpose, mute and output routing
        reader.skip(5)?;

        if !(-50..=50).contains(&pan) {
            return Err(FormatError::InvalidParameterValue("pan".to_string(), i32::from(pan)));
        }
        if volume > 100 {
            return Err(FormatError::InvalidParameterValue(
                "volume".to_string(),
                i32::from(volume),
            ));
        }
        if low_key > 127 || high_key > 127 || low_key > high_key {
            return Err(FormatError::InvalidKeyRange(low_key, high_key));
        }

        Ok(Self {
            program_name,
            midi_channel,
            pan,
            low_key,
            high_key,
            volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::RawChunk;

    fn part_payload(name: &str, channel: u8, pan: i8, low: u8, high: u8, volume: u8) -> Vec<u8> {
        let mut data = vec![0u8; 0x2C];
        data[2..2 + name.len()].copy_from_slice(name.as_bytes());
        data[0x22] = channel;
        data[0x23] = pan as u8;
        data[0x24] = low;
        data[0x25] = high;
        data[0x26] = volume;
        data
    }

    #[test]
    fn test_parse_part() {
        let chunk = RawChunk::leaf(AkmPart::TAG, part_payload("STRINGS", 5, -16, 36, 72, 80));
        let part = AkmPart::read(&chunk).unwrap();
        assert_eq!(part.program_name, "STRINGS");
        assert_eq!(part.midi_channel, 5);
        assert_eq!(part.pan, -16);
        assert_eq!(part.low_key, 36);
        assert_eq!(part.high_key, 72);
        assert_eq!(part.volume, 80);
        assert!((part.panorama() + 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_parse_part_ignores_routing_bytes() {
        let plain = part_payload("BASS", 1, 0, 24, 48, 100);
        let mut routed = plain.clone();
        routed[0x27..0x2C].copy_from_slice(&[0xF6, 0x0C, 1, 0x03, 0x00]);
        let plain = AkmPart::read(&RawChunk::leaf(AkmPart::TAG, plain)).unwrap();
        let routed = AkmPart::read(&RawChunk::leaf(AkmPart::TAG, routed)).unwrap();
        assert_eq!(plain, routed);
    }

    #[test]
    fn test_parse_part_out_of_range_values() {
        let chunk = RawChunk::leaf(AkmPart::TAG, part_payload("A", 0, 60, 0, 127, 80));
        assert!(matches!(
            AkmPart::read(&chunk),
            Err(FormatError::InvalidParameterValue(ref name, 60)) if name == "pan"
        ));
        let chunk = RawChunk::leaf(AkmPart::TAG, part_payload("A", 0, 0, 0, 127, 101));
        assert!(matches!(
            AkmPart::read(&chunk),
            Err(FormatError::InvalidParameterValue(ref name, 101)) if name == "volume"
        ));
    }

    #[test]
    fn test_parse_part_too_short() {
        let chunk = RawChunk::leaf(AkmPart::TAG, vec![0; 0x2B]);
        assert!(matches!(AkmPart::read(&chunk), Err(FormatError::ChunkTooShort { .. })));
    }
}
