use crate::akai::{ChunkCodec, ChunkEncode};
use crate::error::{FormatError, Result};
use crate::notify::Notifier;
use crate::riff::{FourCc, RawChunk};
use crate::stream::ascii_until_nul;

pub const KGRP: FourCc = FourCc::new(b"kgrp");

/// `kloc` chunk: keygroup location and tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpKeyLocation {
    pub low_note: u8,
    pub high_note: u8,
    pub semitone: i8,
    pub fine: i8,
    pub override_fx: u8,
    pub fx_send: u8,
    pub pitch_mod_1: i8,
    pub pitch_mod_2: i8,
    pub amp_mod: i8,
    pub zone_crossfade: u8,
    pub mute_group: u8,
}

impl Default for AkpKeyLocation {
    fn default() -> Self {
        Self {
            low_note: 21,
            high_note: 127,
            semitone: 0,
            fine: 0,
            override_fx: 0,
            fx_send: 0,
            pitch_mod_1: 100,
            pitch_mod_2: 0,
            amp_mod: 0,
            zone_crossfade: 0,
            mute_group: 0,
        }
    }
}

impl ChunkCodec for AkpKeyLocation {
    const TAG: FourCc = FourCc::new(b"kloc");
    const LENGTH: usize = 16;

    fn decode(data: &[u8]) -> Result<Self> {
        let (low_note, high_note) = (data[4], data[5]);
        if low_note > 127 || high_note > 127 || low_note > high_note {
            return Err(FormatError::InvalidKeyRange(low_note, high_note));
        }
        Ok(Self {
            low_note,
            high_note,
            semitone: data[6] as i8,
            fine: data[7] as i8,
            override_fx: data[8],
            fx_send: data[9],
            pitch_mod_1: data[10] as i8,
            pitch_mod_2: data[11] as i8,
            amp_mod: data[12] as i8,
            zone_crossfade: data[13],
            mute_group: data[14],
        })
    }
}

impl ChunkEncode for AkpKeyLocation {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&[
            self.low_note,
            self.high_note,
            self.semitone as u8,
            self.fine as u8,
            self.override_fx,
            self.fx_send,
            self.pitch_mod_1 as u8,
            self.pitch_mod_2 as u8,
            self.amp_mod as u8,
            self.zone_crossfade,
            self.mute_group,
            0,
        ]);
    }
}

/// `env ` chunk. Values are 0..=100 unless noted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AkpEnvelope {
    pub attack: u8,
    pub decay: u8,
    pub release: u8,
    pub sustain: u8,
    pub velocity_attack: i8,
    pub keyscale: i8,
    pub on_velocity_release: i8,
    pub off_velocity_release: i8,
}

impl AkpEnvelope {
    /// Attack, decay and release values map exponentially onto 1 ms .. 10 s.
    pub fn seconds(value: u8) -> f64 {
        if value == 0 {
            return 0.0;
        }
        0.001 * (f64::from(value.min(100)) / 100.0 * 4.0 * std::f64::consts::LN_10).exp()
    }

    pub fn from_seconds(seconds: f64) -> u8 {
        if seconds <= 0.001 {
            return 0;
        }
        let value = (seconds / 0.001).ln() / (4.0 * std::f64::consts::LN_10) * 100.0;
        value.round().clamp(0.0, 100.0) as u8
    }
}

impl ChunkCodec for AkpEnvelope {
    const TAG: FourCc = FourCc::new(b"env ");
    const LENGTH: usize = 18;

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            attack: data[1],
            decay: data[3],
            release: data[4],
            sustain: data[7],
            velocity_attack: data[10] as i8,
            keyscale: data[12] as i8,
            on_velocity_release: data[14] as i8,
            off_velocity_release: data[15] as i8,
        })
    }
}

impl ChunkEncode for AkpEnvelope {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut data = [0u8; Self::LENGTH];
        data[1] = self.attack;
        data[3] = self.decay;
        data[4] = self.release;
        data[7] = self.sustain;
        data[10] = self.velocity_attack as u8;
        data[12] = self.keyscale as u8;
        data[14] = self.on_velocity_release as u8;
        data[15] = self.off_velocity_release as u8;
        out.extend_from_slice(&data);
    }
}

/// `filt` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AkpFilter {
    pub mode: u8,
    /// 0..=100
    pub cutoff: u8,
    /// 0..=12
    pub resonance: u8,
    pub key_track: i8,
    pub mod_input_1: i8,
    pub mod_input_2: i8,
    pub mod_input_3: i8,
    pub headroom: u8,
}

impl AkpFilter {
    /// Cutoff in Hz, 20 Hz at 0 up to 20 kHz at 100.
    pub fn cutoff_hz(&self) -> f64 {
        20.0 * 1000f64.powf(f64::from(self.cutoff.min(100)) / 100.0)
    }

    pub fn cutoff_from_hz(hz: f64) -> u8 {
        if hz <= 20.0 {
            return 0;
        }
        ((hz / 20.0).log10() / 3.0 * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

impl ChunkCodec for AkpFilter {
    const TAG: FourCc = FourCc::new(b"filt");
    const LENGTH: usize = 10;

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            mode: data[1],
            cutoff: data[2],
            resonance: data[3],
            key_track: data[4] as i8,
            mod_input_1: data[5] as i8,
            mod_input_2: data[6] as i8,
            mod_input_3: data[7] as i8,
            headroom: data[8],
        })
    }
}

impl ChunkEncode for AkpFilter {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            0,
            self.mode,
            self.cutoff,
            self.resonance,
            self.key_track as u8,
            self.mod_input_1 as u8,
            self.mod_input_2 as u8,
            self.mod_input_3 as u8,
            self.headroom,
            0,
        ]);
    }
}

const SAMPLE_NAME_LENGTH: usize = 20;

/// `zone` chunk: one sample layer of a keygroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkpZone {
    pub sample_name: String,
    pub low_velocity: u8,
    pub high_velocity: u8,
    pub fine: i8,
    pub semitone: i8,
    pub filter: i8,
    /// -50 (left) ..= 50 (right)
    pub pan: i8,
    pub playback: u8,
    pub output: u8,
    pub level: i8,
    pub key_track: u8,
    pub velocity_to_start: i16,
}

impl Default for AkpZone {
    fn default() -> Self {
        Self {
            sample_name: String::new(),
            low_velocity: 0,
            high_velocity: 127,
            fine: 0,
            semitone: 0,
            filter: 0,
            pan: 0,
            playback: 0,
            output: 0,
            level: 0,
            key_track: 1,
            velocity_to_start: 0,
        }
    }
}

impl AkpZone {
    pub fn is_empty(&self) -> bool {
        self.sample_name.is_empty()
    }
}

impl ChunkCodec for AkpZone {
    const TAG: FourCc = FourCc::new(b"zone");
    const LENGTH: usize = 46;

    fn decode(data: &[u8]) -> Result<Self> {
        let name_len = usize::from(data[1]).min(SAMPLE_NAME_LENGTH);
        let sample_name = ascii_until_nul(&data[2..2 + name_len]);
        let (low_velocity, high_velocity) = (data[34], data[35]);
        if low_velocity > 127 || high_velocity > 127 || low_velocity > high_velocity {
            return Err(FormatError::InvalidVelocityRange(low_velocity, high_velocity));
        }
        Ok(Self {
            sample_name,
            low_velocity,
            high_velocity,
            fine: data[36] as i8,
            semitone: data[37] as i8,
            filter: data[38] as i8,
            pan: data[39] as i8,
            playback: data[40],
            output: data[41],
            level: data[42] as i8,
            key_track: data[43],
            velocity_to_start: i16::from_le_bytes([data[44], data[45]]),
        })
    }
}

impl ChunkEncode for AkpZone {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut data = [0u8; Self::LENGTH];
        let name: Vec<u8> = self
            .sample_name
            .bytes()
            .filter(u8::is_ascii)
            .take(SAMPLE_NAME_LENGTH)
            .collect();
        data[1] = name.len() as u8;
        data[2..2 + name.len()].copy_from_slice(&name);
        data[34] = self.low_velocity;
        data[35] = self.high_velocity;
        data[36] = self.fine as u8;
        data[37] = self.semitone as u8;
        data[38] = self.filter as u8;
        data[39] = self.pan as u8;
        data[40] = self.playback;
        data[41] = self.output;
        data[42] = self.level as u8;
        data[43] = self.key_track;
        data[44..46].copy_from_slice(&self.velocity_to_start.to_le_bytes());
        out.extend_from_slice(&data);
    }
}

pub const MAX_ZONES: usize = 4;

/// A `kgrp` container and its decoded children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AkpKeygroup {
    pub location: AkpKeyLocation,
    /// Amplitude, filter and auxiliary envelope, in file order.
    pub envelopes: Vec<AkpEnvelope>,
    pub filter: Option<AkpFilter>,
    pub zones: Vec<AkpZone>,
}

impl AkpKeygroup {
    pub fn amp_envelope(&self) -> Option<&AkpEnvelope> {
        self.envelopes.first()
    }

    pub fn filter_envelope(&self) -> Option<&AkpEnvelope> {
        self.envelopes.get(1)
    }

    pub fn aux_envelope(&self) -> Option<&AkpEnvelope> {
        self.envelopes.get(2)
    }

    /// Zones referencing a sample.
    pub fn active_zones(&self) -> impl Iterator<Item = &AkpZone> {
        self.zones.iter().filter(|zone| !zone.is_empty())
    }

    pub fn read(chunk: &RawChunk, notifier: &dyn Notifier) -> Result<Self> {
        if chunk.tag != KGRP {
            return Err(FormatError::UnexpectedTag {
                expected: KGRP.to_string(),
                found: chunk.tag.to_string(),
            });
        }
        let mut keygroup = AkpKeygroup::default();
        for child in chunk.children() {
            match KEYGROUP_CHUNKS.iter().find(|(tag, _)| *tag == child.tag) {
                Some((_, decode)) => decode(child, &mut keygroup)?,
                None => notifier.unknown_tag("keygroup", &child.tag.to_string()),
            }
        }
        if keygroup.zones.len() > MAX_ZONES {
            notifier.warn(&format!(
                "Keygroup has {} zones, only the first {MAX_ZONES} are used",
                keygroup.zones.len()
            ));
            keygroup.zones.truncate(MAX_ZONES);
        }
        Ok(keygroup)
    }

    pub fn to_chunk(&self) -> RawChunk {
        let mut children = vec![self.location.to_chunk()];
        for envelope in self.envelopes.iter().take(3) {
            children.push(envelope.to_chunk());
        }
        if let Some(filter) = &self.filter {
            children.push(filter.to_chunk());
        }
        for zone in self.zones.iter().take(MAX_ZONES) {
            children.push(zone.to_chunk());
        }
        RawChunk::list(KGRP, None, children)
    }
}

type KeygroupDecoder = fn(&RawChunk, &mut AkpKeygroup) -> Result<()>;

static KEYGROUP_CHUNKS: [(FourCc, KeygroupDecoder); 4] = [
    (AkpKeyLocation::TAG, decode_location),
    (AkpEnvelope::TAG, decode_envelope),
    (AkpFilter::TAG, decode_filter),
    (AkpZone::TAG, decode_zone),
];

fn decode_location(chunk: &RawChunk, keygroup: &mut AkpKeygroup) -> Result<()> {
    keygroup.location = AkpKeyLocation::read(chunk)?;
    Ok(())
}

fn decode_envelope(chunk: &RawChunk, keygroup: &mut AkpKeygroup) -> Result<()> {
    keygroup.envelopes.push(AkpEnvelope::read(chunk)?);
    Ok(())
}

fn decode_filter(chunk: &RawChunk, keygroup: &mut AkpKeygroup) -> Result<()> {
    keygroup.filter = Some(AkpFilter::read(chunk)?);
    Ok(())
}

fn decode_zone(chunk: &RawChunk, keygroup: &mut AkpKeygroup) -> Result<()> {
    keygroup.zones.push(AkpZone::read(chunk)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingNotifier;

    fn zone_payload(name: &str, low: u8, high: u8) -> Vec<u8> {
        let mut data = vec![0u8; 46];
        data[1] = name.len() as u8;
        data[2..2 + name.len()].copy_from_slice(name.as_bytes());
        data[34] = low;
        data[35] = high;
        data[39] = (-25i8) as u8;
        data[44..46].copy_from_slice(&(-300i16).to_le_bytes());
        data
    }

    #[test]
    fn test_parse_zone() {
        let chunk = RawChunk::leaf(AkpZone::TAG, zone_payload("PIANO C3", 10, 100));
        let zone = AkpZone::read(&chunk).unwrap();
        assert_eq!(zone.sample_name, "PIANO C3");
        assert_eq!(zone.low_velocity, 10);
        assert_eq!(zone.high_velocity, 100);
        assert_eq!(zone.pan, -25);
        assert_eq!(zone.velocity_to_start, -300);
        assert_eq!(zone.to_chunk(), chunk);
    }

    #[test]
    fn test_parse_zone_invalid_velocity_range() {
        let chunk = RawChunk::leaf(AkpZone::TAG, zone_payload("X", 100, 10));
        assert!(matches!(
            AkpZone::read(&chunk),
            Err(FormatError::InvalidVelocityRange(100, 10))
        ));
    }

    #[test]
    fn test_parse_key_location_invalid_range() {
        let mut data = vec![0u8; 16];
        data[4] = 72;
        data[5] = 36;
        assert!(matches!(
            AkpKeyLocation::read(&RawChunk::leaf(AkpKeyLocation::TAG, data)),
            Err(FormatError::InvalidKeyRange(72, 36))
        ));
    }

    #[test]
    fn test_envelope_time_mapping() {
        assert_eq!(AkpEnvelope::seconds(0), 0.0);
        assert!((AkpEnvelope::seconds(100) - 10.0).abs() < 1e-9);
        assert!((AkpEnvelope::seconds(50) - 0.1).abs() < 1e-9);
        assert_eq!(AkpEnvelope::from_seconds(0.1), 50);
        assert_eq!(AkpEnvelope::from_seconds(0.0), 0);
    }

    #[test]
    fn test_filter_cutoff_mapping() {
        let filter = AkpFilter { cutoff: 100, ..AkpFilter::default() };
        assert!((filter.cutoff_hz() - 20000.0).abs() < 1e-6);
        assert_eq!(AkpFilter::cutoff_from_hz(20000.0), 100);
        assert_eq!(AkpFilter::cutoff_from_hz(10.0), 0);
    }

    #[test]
    fn test_keygroup_dispatch_and_unknown_children() {
        let mut kloc = vec![0u8; 16];
        kloc[4] = 36;
        kloc[5] = 48;
        let chunk = RawChunk::list(
            KGRP,
            None,
            vec![
                RawChunk::leaf(AkpKeyLocation::TAG, kloc),
                RawChunk::leaf(AkpEnvelope::TAG, vec![0; 18]),
                RawChunk::leaf(AkpEnvelope::TAG, vec![0; 18]),
                RawChunk::leaf(AkpEnvelope::TAG, vec![0; 18]),
                RawChunk::leaf(AkpFilter::TAG, vec![0; 10]),
                RawChunk::leaf(FourCc::new(b"junk"), vec![1, 2]),
                RawChunk::leaf(AkpZone::TAG, zone_payload("A", 0, 127)),
                RawChunk::leaf(AkpZone::TAG, zone_payload("", 0, 127)),
            ],
        );
        let notifier = CollectingNotifier::new();
        let keygroup = AkpKeygroup::read(&chunk, &notifier).unwrap();
        assert_eq!(keygroup.location.low_note, 36);
        assert_eq!(keygroup.location.high_note, 48);
        assert_eq!(keygroup.envelopes.len(), 3);
        assert!(keygroup.filter.is_some());
        assert_eq!(keygroup.zones.len(), 2);
        assert_eq!(keygroup.active_zones().count(), 1);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn test_keygroup_child_too_short_fails() {
        let chunk = RawChunk::list(
            KGRP,
            None,
            vec![RawChunk::leaf(AkpFilter::TAG, vec![0; 9])],
        );
        let notifier = CollectingNotifier::new();
        assert!(matches!(
            AkpKeygroup::read(&chunk, &notifier),
            Err(FormatError::ChunkTooShort { length: 9, minimum: 10, .. })
        ));
    }
}
