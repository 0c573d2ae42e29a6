//! The multisample model the codecs populate on read and consume on write.
//!
//! This is the thin interface to the surrounding converter: plain data plus
//! the [`SampleDataProvider`] hook that fills in facts only the referenced
//! audio files know (sample rate, frame count, embedded loops).

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultisampleSource {
    pub name: String,
    pub metadata: Metadata,
    pub groups: Vec<Group>,
}

impl MultisampleSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn zones(&self) -> impl Iterator<Item = &SampleZone> {
        self.groups.iter().flat_map(|group| group.zones.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub creator: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub creation_time: Option<chrono::DateTime<chrono::FixedOffset>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerType {
    #[default]
    Attack,
    Release,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub trigger: TriggerType,
    pub zones: Vec<SampleZone>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleZone {
    pub name: String,
    /// Path of the referenced audio file as stored in the source format.
    pub sample_path: Option<String>,
    pub key_low: u8,
    pub key_high: u8,
    pub key_root: Option<u8>,
    pub velocity_low: u8,
    pub velocity_high: u8,
    pub note_crossfade_low: u8,
    pub note_crossfade_high: u8,
    pub velocity_crossfade_low: u8,
    pub velocity_crossfade_high: u8,
    pub start: u32,
    pub stop: Option<u32>,
    /// Gain in dB.
    pub gain: f64,
    /// Panorama in -1.0 (left) to 1.0 (right).
    pub panorama: f64,
    /// Tuning in semitones.
    pub tune: f64,
    pub key_tracking: f64,
    pub reversed: bool,
    pub loops: Vec<SampleLoop>,
    pub amplitude_envelope: Option<Envelope>,
    pub filter: Option<Filter>,
    pub sample_info: Option<SampleInfo>,
}

impl Default for SampleZone {
    fn default() -> Self {
        Self {
            name: String::new(),
            sample_path: None,
            key_low: 0,
            key_high: 127,
            key_root: None,
            velocity_low: 1,
            velocity_high: 127,
            note_crossfade_low: 0,
            note_crossfade_high: 0,
            velocity_crossfade_low: 0,
            velocity_crossfade_high: 0,
            start: 0,
            stop: None,
            gain: 0.0,
            panorama: 0.0,
            tune: 0.0,
            key_tracking: 1.0,
            reversed: false,
            loops: Vec::new(),
            amplitude_envelope: None,
            filter: None,
            sample_info: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopKind {
    #[default]
    Forwards,
    Alternating,
    Backwards,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleLoop {
    pub kind: LoopKind,
    pub start: u32,
    pub end: u32,
    /// Crossfade length in frames.
    pub crossfade: u32,
}

/// Envelope times in seconds, sustain in 0.0..=1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Envelope {
    pub delay: f64,
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterKind {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    BandReject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    pub poles: u8,
    pub cutoff_hz: f64,
    /// Resonance in 0.0..=1.0.
    pub resonance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_rate: u32,
    pub frames: u32,
    pub channels: u16,
}

/// Fills in data only the referenced audio file knows.
pub trait SampleDataProvider {
    /// Adds sample rate and length (and optionally the root key and loops
    /// stored in the audio file) to a zone.
    fn add_zone_data(&self, zone: &mut SampleZone, add_root_key: bool, add_loops: bool) -> Result<()>;

    /// Adds file-level metadata such as the creation time.
    fn add_metadata(&self, _metadata: &mut Metadata) -> Result<()> {
        Ok(())
    }
}

/// Provider for callers that have no access to the audio files.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSampleData;

impl SampleDataProvider for NoSampleData {
    fn add_zone_data(&self, _zone: &mut SampleZone, _add_root_key: bool, _add_loops: bool) -> Result<()> {
        Ok(())
    }
}

/// Converts a linear amplitude factor to dB, clamping silence to -96 dB.
pub fn linear_to_db(value: f64) -> f64 {
    if value <= 0.0 {
        return -96.0;
    }
    (20.0 * value.log10()).max(-96.0)
}

/// Converts dB to a linear amplitude factor.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert_eq!(linear_to_db(1.0), 0.0);
        assert_eq!(linear_to_db(0.0), -96.0);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_zones_iterates_all_groups() {
        let mut source = MultisampleSource::new("Test");
        let mut a = Group::new("a");
        a.zones.push(SampleZone::default());
        let mut b = Group::new("b");
        b.zones.push(SampleZone::default());
        b.zones.push(SampleZone::default());
        source.groups = vec![a, b];
        assert_eq!(source.zones().count(), 3);
    }
}
