use crate::error::{FormatError, Result};
use crate::kontakt::preset_chunk::{ChunkId, PresetChunk};
use crate::stream::{write_f32, write_f64, write_u16, write_u32, write_utf16_with_length, ByteReader, Endian};

const LE: Endian = Endian::Little;

/// Highest Program chunk version with a known layout.
pub const MAX_PROGRAM_VERSION: u16 = 0xAF;

const NULL_PLACEHOLDER: &str = "(null)";

static ICONS: [&str; 29] = [
    "Organ",
    "Cello",
    "Drum Kit",
    "Bell",
    "Trumpet",
    "Guitar",
    "Piano",
    "Marimba",
    "Record Player",
    "E-Piano",
    "Drum Pads",
    "Bass Guitar",
    "Electric Guitar",
    "Wave",
    "Asian Symbol",
    "Flute",
    "Speaker",
    "Score",
    "Conga",
    "Pipe Organ",
    "FX",
    "Computer",
    "Violin",
    "Surround",
    "Synthesizer",
    "Microphone",
    "Oboe",
    "Saxophone",
    "New",
];

pub fn icon_name(icon: u32) -> Option<&'static str> {
    ICONS.get(icon as usize).copied()
}

pub fn icon_index(name: &str) -> Option<u32> {
    ICONS.iter().position(|&icon| icon.eq_ignore_ascii_case(name)).map(|i| i as u32)
}

/// Instrument level settings from a Program chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    /// Informational only.
    pub total_sample_size: f64,
    pub midi_transpose: i8,
    /// Linear factor, 1.0 is 0 dB.
    pub volume: f32,
    pub pan: f32,
    pub tune: f32,
    pub velocity_key_clipping: [u8; 4],
    pub default_key_switch: i16,
    pub dfd_preload_size: u32,
    pub library_id: u32,
    pub fingerprint: u32,
    pub loading_flags: u32,
    pub group_solo: bool,
    pub icon: u32,
    pub credits: String,
    pub author: Option<String>,
    pub url: Option<String>,
    /// Raw category codes; no lookup table is known for them.
    pub categories: [u16; 3],
}

impl Default for Program {
    fn default() -> Self {
        Self {
            name: String::new(),
            total_sample_size: 0.0,
            midi_transpose: 0,
            volume: 1.0,
            pan: 0.0,
            tune: 1.0,
            velocity_key_clipping: [0, 127, 0, 127],
            default_key_switch: -1,
            dfd_preload_size: 0,
            library_id: 0,
            fingerprint: 0,
            loading_flags: 0,
            group_solo: false,
            icon: 0x1C,
            credits: String::new(),
            author: None,
            url: None,
            categories: [0; 3],
        }
    }
}

impl Program {
    /// Decodes a Program chunk. Versions above [`MAX_PROGRAM_VERSION`] are
    /// rejected before any field is read.
    pub fn from_chunk(chunk: &PresetChunk) -> Result<Self> {
        if chunk.id != ChunkId::Program {
            return Err(FormatError::UnexpectedTag {
                expected: ChunkId::Program.to_string(),
                found: chunk.id.to_string(),
            });
        }
        if chunk.version > MAX_PROGRAM_VERSION {
            return Err(FormatError::UnsupportedVersion {
                what: "Kontakt program",
                found: u32::from(chunk.version),
                max: u32::from(MAX_PROGRAM_VERSION),
            });
        }
        let mut program = Self::decode(&chunk.public_data)?;
        program.normalize_placeholders();
        Ok(program)
    }

    /// Decodes the public data as stored, placeholders included.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let name = r.utf16_with_length()?;
        let total_sample_size = r.f64(LE)?;
        let midi_transpose = r.i8()?;
        let volume = r.f32(LE)?;
        let pan = r.f32(LE)?;
        let tune = r.f32(LE)?;
        let velocity_key_clipping = r.array()?;
        let default_key_switch = r.i16(LE)?;
        let dfd_preload_size = r.u32(LE)?;
        let library_id = r.u32(LE)?;
        let fingerprint = r.u32(LE)?;
        let loading_flags = r.u32(LE)?;
        let group_solo = r.u8()? != 0;
        let icon = r.u32(LE)?;
        let credits = r.utf16_with_length()?;
        let author = r.utf16_with_length()?;
        let url = r.utf16_with_length()?;
        let categories = [r.u16(LE)?, r.u16(LE)?, r.u16(LE)?];

        Ok(Self {
            name,
            total_sample_size,
            midi_transpose,
            volume,
            pan,
            tune,
            velocity_key_clipping,
            default_key_switch,
            dfd_preload_size,
            library_id,
            fingerprint,
            loading_flags,
            group_solo,
            icon,
            credits,
            author: Some(author),
            url: Some(url),
            categories,
        })
    }

    /// Blank texts and the `(null)` placeholder become `None`.
    pub fn normalize_placeholders(&mut self) {
        for field in [&mut self.author, &mut self.url] {
            if field
                .as_deref()
                .is_some_and(|text| text.trim().is_empty() || text == NULL_PLACEHOLDER)
            {
                *field = None;
            }
        }
    }

    pub fn icon_name(&self) -> Option<&'static str> {
        icon_name(self.icon)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_utf16_with_length(&mut out, &self.name)?;
        write_f64(&mut out, self.total_sample_size, LE)?;
        out.push(self.midi_transpose as u8);
        write_f32(&mut out, self.volume, LE)?;
        write_f32(&mut out, self.pan, LE)?;
        write_f32(&mut out, self.tune, LE)?;
        out.extend_from_slice(&self.velocity_key_clipping);
        write_u16(&mut out, self.default_key_switch as u16, LE)?;
        write_u32(&mut out, self.dfd_preload_size, LE)?;
        write_u32(&mut out, self.library_id, LE)?;
        write_u32(&mut out, self.fingerprint, LE)?;
        write_u32(&mut out, self.loading_flags, LE)?;
        out.push(u8::from(self.group_solo));
        write_u32(&mut out, self.icon, LE)?;
        write_utf16_with_length(&mut out, &self.credits)?;
        write_utf16_with_length(&mut out, self.author.as_deref().unwrap_or(""))?;
        write_utf16_with_length(&mut out, self.url.as_deref().unwrap_or(""))?;
        for category in self.categories {
            write_u16(&mut out, category, LE)?;
        }
        Ok(out)
    }

    pub fn to_chunk(&self, version: u16, children: Vec<PresetChunk>) -> Result<PresetChunk> {
        Ok(PresetChunk::structured(ChunkId::Program, version, self.encode()?, children))
    }
}

/// A group of zones (VoiceGroup chunk).
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceGroup {
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    /// Linear pitch factor.
    pub tune: f32,
    pub key_tracking: bool,
    pub reverse: bool,
    pub release_trigger: bool,
    /// -1 means omni.
    pub midi_channel: i16,
}

impl Default for VoiceGroup {
    fn default() -> Self {
        Self {
            name: String::new(),
            volume: 1.0,
            pan: 0.0,
            tune: 1.0,
            key_tracking: true,
            reverse: false,
            release_trigger: false,
            midi_channel: -1,
        }
    }
}

impl VoiceGroup {
    pub fn from_chunk(chunk: &PresetChunk) -> Result<Self> {
        if chunk.id != ChunkId::VoiceGroup {
            return Err(FormatError::UnexpectedTag {
                expected: ChunkId::VoiceGroup.to_string(),
                found: chunk.id.to_string(),
            });
        }
        Self::decode(&chunk.public_data)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            name: r.utf16_with_length()?,
            volume: r.f32(LE)?,
            pan: r.f32(LE)?,
            tune: r.f32(LE)?,
            key_tracking: r.u8()? != 0,
            reverse: r.u8()? != 0,
            release_trigger: r.u8()? != 0,
            midi_channel: r.i16(LE)?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_utf16_with_length(&mut out, &self.name)?;
        write_f32(&mut out, self.volume, LE)?;
        write_f32(&mut out, self.pan, LE)?;
        write_f32(&mut out, self.tune, LE)?;
        out.push(u8::from(self.key_tracking));
        out.push(u8::from(self.reverse));
        out.push(u8::from(self.release_trigger));
        write_u16(&mut out, self.midi_channel as u16, LE)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        Program {
            name: "Grand Piano".to_string(),
            volume: 0.5,
            pan: -0.25,
            tune: 1.0,
            icon: 6,
            author: Some("Someone".to_string()),
            url: Some(NULL_PLACEHOLDER.to_string()),
            categories: [3, 0, 7],
            ..Program::default()
        }
    }

    #[test]
    fn test_program_encode_decode() {
        let program = sample_program();
        let bytes = program.encode().unwrap();
        let decoded = Program::decode(&bytes).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.icon_name(), Some("Piano"));
    }

    #[test]
    fn test_null_url_is_normalised() {
        let chunk = sample_program().to_chunk(0xA5, Vec::new()).unwrap();
        let program = Program::from_chunk(&chunk).unwrap();
        assert_eq!(program.url, None);
        assert_eq!(program.author.as_deref(), Some("Someone"));

        let mut blank = sample_program();
        blank.author = Some("  ".to_string());
        blank.normalize_placeholders();
        assert_eq!(blank.author, None);
    }

    #[test]
    fn test_version_above_maximum_is_rejected() {
        // public data is garbage: the gate must fire before decoding it
        let chunk = PresetChunk::structured(ChunkId::Program, 0xB0, vec![0xFF; 3], Vec::new());
        assert!(matches!(
            Program::from_chunk(&chunk),
            Err(FormatError::UnsupportedVersion { found: 0xB0, max: 0xAF, .. })
        ));
    }

    #[test]
    fn test_truncated_program_fails() {
        let mut bytes = sample_program().encode().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(Program::decode(&bytes), Err(FormatError::TruncatedInput { .. })));
    }

    #[test]
    fn test_icon_table() {
        assert_eq!(icon_name(0), Some("Organ"));
        assert_eq!(icon_name(28), Some("New"));
        assert_eq!(icon_name(29), None);
        assert_eq!(icon_index("piano"), Some(6));
    }

    #[test]
    fn test_voice_group_round_trip() {
        let group = VoiceGroup {
            name: "Release".to_string(),
            release_trigger: true,
            midi_channel: 3,
            ..VoiceGroup::default()
        };
        let chunk = PresetChunk::structured(ChunkId::VoiceGroup, 0x60, group.encode().unwrap(), Vec::new());
        assert_eq!(VoiceGroup::from_chunk(&chunk).unwrap(), group);
    }
}
