use crate::error::{FormatError, Result};
use crate::kontakt::preset_chunk::{ChunkId, PresetChunk};
use crate::model::{LoopKind, SampleLoop};
use crate::stream::{write_f32, write_u16, write_u32, write_utf16_with_length, ByteReader, Endian};

const LE: Endian = Endian::Little;

/// One loop of a zone's LoopArray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLoop {
    /// 0 is off; 1/2 loop until end, 3/4 until release (even modes alternate).
    pub mode: i32,
    pub start: i32,
    pub length: i32,
    /// Repetitions, 0 is infinite.
    pub count: i32,
    pub alternating: bool,
    pub tuning: f32,
    pub crossfade: i32,
}

impl ZoneLoop {
    const ENCODED_LENGTH: usize = 25;

    pub fn is_enabled(&self) -> bool {
        self.mode != 0 && self.length > 0
    }

    pub fn to_sample_loop(&self) -> SampleLoop {
        let kind = if self.alternating || self.mode == 2 || self.mode == 4 {
            LoopKind::Alternating
        } else {
            LoopKind::Forwards
        };
        let start = self.start.max(0) as u32;
        SampleLoop {
            kind,
            start,
            end: start + self.length.max(0) as u32,
            crossfade: self.crossfade.max(0) as u32,
        }
    }

    fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            mode: r.i32(LE)?,
            start: r.i32(LE)?,
            length: r.i32(LE)?,
            count: r.i32(LE)?,
            alternating: r.u8()? != 0,
            tuning: r.f32(LE)?,
            crossfade: r.i32(LE)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.mode as u32, LE)?;
        write_u32(out, self.start as u32, LE)?;
        write_u32(out, self.length as u32, LE)?;
        write_u32(out, self.count as u32, LE)?;
        out.push(u8::from(self.alternating));
        write_f32(out, self.tuning, LE)?;
        write_u32(out, self.crossfade as u32, LE)
    }
}

pub fn decode_loops(data: &[u8]) -> Result<Vec<ZoneLoop>> {
    let mut r = ByteReader::new(data);
    let count = r.u32(LE)? as usize;
    let needed = count.saturating_mul(ZoneLoop::ENCODED_LENGTH);
    if needed > r.remaining() {
        return Err(FormatError::TruncatedInput {
            offset: r.position(),
            needed,
            available: r.remaining(),
        });
    }
    (0..count).map(|_| ZoneLoop::decode(&mut r)).collect()
}

pub fn encode_loops(loops: &[ZoneLoop]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + loops.len() * ZoneLoop::ENCODED_LENGTH);
    write_u32(&mut out, loops.len() as u32, LE)?;
    for l in loops {
        l.encode(&mut out)?;
    }
    Ok(out)
}

/// A sample mapping (Zone chunk).
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub sample_start: i32,
    /// Frames cut from the end: the stop position is `num_frames - sample_end`.
    pub sample_end: i32,
    pub sample_start_mod_range: i32,
    pub low_velocity: u16,
    pub high_velocity: u16,
    pub low_key: u16,
    pub high_key: u16,
    pub fade_low_velocity: u16,
    pub fade_high_velocity: u16,
    pub fade_low_key: u16,
    pub fade_high_key: u16,
    pub root_key: u16,
    pub volume: f32,
    pub pan: f32,
    pub tune: f32,
    pub group_index: i32,
    pub filename_id: i32,
    pub sample_rate: u32,
    pub num_frames: u32,
    pub loops: Vec<ZoneLoop>,
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            sample_start: 0,
            sample_end: 0,
            sample_start_mod_range: 0,
            low_velocity: 1,
            high_velocity: 127,
            low_key: 0,
            high_key: 127,
            fade_low_velocity: 0,
            fade_high_velocity: 0,
            fade_low_key: 0,
            fade_high_key: 0,
            root_key: 60,
            volume: 1.0,
            pan: 0.0,
            tune: 1.0,
            group_index: 0,
            filename_id: 0,
            sample_rate: 44100,
            num_frames: 0,
            loops: Vec::new(),
        }
    }
}

impl Zone {
    pub fn from_chunk(chunk: &PresetChunk) -> Result<Self> {
        if chunk.id != ChunkId::Zone {
            return Err(FormatError::UnexpectedTag {
                expected: ChunkId::Zone.to_string(),
                found: chunk.id.to_string(),
            });
        }
        let mut zone = Self::decode(&chunk.public_data)?;
        if let Some(loops) = chunk.child(ChunkId::LoopArray) {
            zone.loops = decode_loops(&loops.public_data)?;
        }
        Ok(zone)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            sample_start: r.i32(LE)?,
            sample_end: r.i32(LE)?,
            sample_start_mod_range: r.i32(LE)?,
            low_velocity: r.u16(LE)?,
            high_velocity: r.u16(LE)?,
            low_key: r.u16(LE)?,
            high_key: r.u16(LE)?,
            fade_low_velocity: r.u16(LE)?,
            fade_high_velocity: r.u16(LE)?,
            fade_low_key: r.u16(LE)?,
            fade_high_key: r.u16(LE)?,
            root_key: r.u16(LE)?,
            volume: r.f32(LE)?,
            pan: r.f32(LE)?,
            tune: r.f32(LE)?,
            group_index: r.i32(LE)?,
            filename_id: r.i32(LE)?,
            sample_rate: r.u32(LE)?,
            num_frames: r.u32(LE)?,
            loops: Vec::new(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_u32(&mut out, self.sample_start as u32, LE)?;
        write_u32(&mut out, self.sample_end as u32, LE)?;
        write_u32(&mut out, self.sample_start_mod_range as u32, LE)?;
        for value in [
            self.low_velocity,
            self.high_velocity,
            self.low_key,
            self.high_key,
            self.fade_low_velocity,
            self.fade_high_velocity,
            self.fade_low_key,
            self.fade_high_key,
            self.root_key,
        ] {
            write_u16(&mut out, value, LE)?;
        }
        write_f32(&mut out, self.volume, LE)?;
        write_f32(&mut out, self.pan, LE)?;
        write_f32(&mut out, self.tune, LE)?;
        write_u32(&mut out, self.group_index as u32, LE)?;
        write_u32(&mut out, self.filename_id as u32, LE)?;
        write_u32(&mut out, self.sample_rate, LE)?;
        write_u32(&mut out, self.num_frames, LE)?;
        Ok(out)
    }

    pub fn to_chunk(&self, version: u16) -> Result<PresetChunk> {
        let children = if self.loops.is_empty() {
            Vec::new()
        } else {
            vec![PresetChunk::unstructured(ChunkId::LoopArray, encode_loops(&self.loops)?)]
        };
        Ok(PresetChunk::structured(ChunkId::Zone, version, self.encode()?, children))
    }

    /// Last played frame, if the frame count is known.
    pub fn stop(&self) -> Option<u32> {
        if self.num_frames == 0 {
            return None;
        }
        Some(self.num_frames.saturating_sub(self.sample_end.max(0) as u32))
    }
}

const SEGMENT_PARENT: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub kind: u8,
    pub text: String,
}

/// The file table zones reference by `filename_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameList {
    /// Present for the extended variant only.
    pub version: Option<u32>,
    pub entries: Vec<Vec<PathSegment>>,
}

impl FilenameList {
    pub fn from_chunk(chunk: &PresetChunk) -> Result<Self> {
        let mut r = ByteReader::new(&chunk.public_data);
        let version = match chunk.id {
            ChunkId::FilenameList => None,
            ChunkId::FilenameListEx => Some(r.u32(LE)?),
            other => {
                return Err(FormatError::UnexpectedTag {
                    expected: ChunkId::FilenameList.to_string(),
                    found: other.to_string(),
                });
            }
        };
        let count = r.u32(LE)? as usize;
        let mut entries = Vec::with_capacity(count.min(r.remaining() / 4));
        for _ in 0..count {
            let segments = r.u32(LE)? as usize;
            let mut entry = Vec::with_capacity(segments.min(r.remaining() / 5));
            for _ in 0..segments {
                let kind = r.u8()?;
                let text = r.utf16_with_length()?;
                entry.push(PathSegment { kind, text });
            }
            entries.push(entry);
        }
        Ok(Self { version, entries })
    }

    pub fn to_chunk(&self, version: u16) -> Result<PresetChunk> {
        let mut out = Vec::new();
        if let Some(list_version) = self.version {
            write_u32(&mut out, list_version, LE)?;
        }
        write_u32(&mut out, self.entries.len() as u32, LE)?;
        for entry in &self.entries {
            write_u32(&mut out, entry.len() as u32, LE)?;
            for segment in entry {
                out.push(segment.kind);
                write_utf16_with_length(&mut out, &segment.text)?;
            }
        }
        let id = if self.version.is_some() {
            ChunkId::FilenameListEx
        } else {
            ChunkId::FilenameList
        };
        Ok(PresetChunk::structured(id, version, out, Vec::new()))
    }

    /// Entries rendered as relative paths.
    pub fn paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| {
                entry
                    .iter()
                    .map(|segment| {
                        if segment.kind == SEGMENT_PARENT {
                            ".."
                        } else {
                            segment.text.as_str()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_round_trip_with_loops() {
        let zone = Zone {
            sample_end: 100,
            low_key: 36,
            high_key: 48,
            root_key: 40,
            num_frames: 44100,
            filename_id: 2,
            loops: vec![ZoneLoop {
                mode: 3,
                start: 1000,
                length: 500,
                count: 0,
                alternating: false,
                tuning: 0.0,
                crossfade: 64,
            }],
            ..Zone::default()
        };
        let chunk = zone.to_chunk(0x9A).unwrap();
        assert_eq!(chunk.children.len(), 1);
        let decoded = Zone::from_chunk(&chunk).unwrap();
        assert_eq!(decoded, zone);
        assert_eq!(decoded.stop(), Some(44000));

        let sample_loop = decoded.loops[0].to_sample_loop();
        assert_eq!((sample_loop.start, sample_loop.end), (1000, 1500));
        assert_eq!(sample_loop.kind, LoopKind::Forwards);
    }

    #[test]
    fn test_zone_without_frame_count_has_no_stop() {
        assert_eq!(Zone::default().stop(), None);
    }

    #[test]
    fn test_loop_count_beyond_data_fails() {
        let mut data = encode_loops(&[]).unwrap();
        data[0] = 3;
        assert!(matches!(decode_loops(&data), Err(FormatError::TruncatedInput { .. })));
    }

    #[test]
    fn test_filename_list_paths() {
        let list = FilenameList {
            version: None,
            entries: vec![
                vec![
                    PathSegment { kind: SEGMENT_PARENT, text: String::new() },
                    PathSegment { kind: 1, text: "Samples".to_string() },
                    PathSegment { kind: 3, text: "Piano C3.ncw".to_string() },
                ],
                vec![PathSegment { kind: 3, text: "Kick.wav".to_string() }],
            ],
        };
        assert_eq!(list.paths(), vec!["../Samples/Piano C3.ncw", "Kick.wav"]);
        let chunk = list.to_chunk(0).unwrap();
        assert_eq!(chunk.id, ChunkId::FilenameList);
        assert_eq!(FilenameList::from_chunk(&chunk).unwrap(), list);
    }

    #[test]
    fn test_extended_filename_list_has_version_prefix() {
        let list = FilenameList {
            version: Some(2),
            entries: vec![vec![PathSegment { kind: 3, text: "a.wav".to_string() }]],
        };
        let chunk = list.to_chunk(0).unwrap();
        assert_eq!(chunk.id, ChunkId::FilenameListEx);
        assert_eq!(&chunk.public_data[..4], &2u32.to_le_bytes());
        assert_eq!(FilenameList::from_chunk(&chunk).unwrap(), list);
    }
}
