//! Akai S5000/S6000 program (`.akp`) and multi (`.akm`) files.
//!
//! Both are RIFF files with fixed-layout chunks. Each chunk type is a small
//! struct implementing [`ChunkCodec`] (and [`ChunkEncode`] when the format
//! may be written back). Program files store 0 in the RIFF length field; the
//! root then extends to the end of the file.

pub mod keygroup;
pub mod modulation;
pub mod multi;
pub mod program;

use std::path::Path;

use log::debug;

use crate::config::DecodeOptions;
use crate::error::{FormatError, Result};
use crate::model::{
    Envelope, Filter, FilterKind, Group, MultisampleSource, SampleDataProvider, SampleZone,
};
use crate::notify::{LogNotifier, Notifier};
use crate::riff::{FourCc, RawChunk, RiffParser, RiffWriter};

pub use keygroup::{AkpEnvelope, AkpFilter, AkpKeyLocation, AkpKeygroup, AkpZone, KGRP};
pub use modulation::{AkpLfo, AkpModulations, ModulationSlot};
pub use multi::AkmPart;
pub use program::{AkpOutput, AkpProgram, AkpTune};

pub const APRG: FourCc = FourCc::new(b"APRG");
pub const AMLT: FourCc = FourCc::new(b"AMLT");

/// A fixed-layout chunk that can be decoded from its payload.
pub trait ChunkCodec: Sized {
    const TAG: FourCc;
    /// Minimum payload length.
    const LENGTH: usize;

    /// Decodes a payload that is at least [`Self::LENGTH`] bytes long.
    fn decode(data: &[u8]) -> Result<Self>;

    fn read(chunk: &RawChunk) -> Result<Self> {
        if chunk.tag != Self::TAG {
            return Err(FormatError::UnexpectedTag {
                expected: Self::TAG.to_string(),
                found: chunk.tag.to_string(),
            });
        }
        let Some(data) = chunk.payload() else {
            return Err(FormatError::InvalidData(format!(
                "chunk '{}' is a container, expected a leaf",
                chunk.tag
            )));
        };
        if data.len() < Self::LENGTH {
            return Err(FormatError::ChunkTooShort {
                tag: Self::TAG.to_string(),
                length: data.len(),
                minimum: Self::LENGTH,
            });
        }
        Self::decode(data)
    }
}

/// A chunk that can be written back.
pub trait ChunkEncode: ChunkCodec {
    /// Appends exactly [`ChunkCodec::LENGTH`] bytes.
    fn encode(&self, out: &mut Vec<u8>);

    fn to_chunk(&self) -> RawChunk {
        let mut data = Vec::with_capacity(Self::LENGTH);
        self.encode(&mut data);
        RawChunk::leaf(Self::TAG, data)
    }
}

fn parse_root(bytes: &[u8], form: FourCc, options: &DecodeOptions) -> Result<RawChunk> {
    let root = RiffParser::default()
        .with_container(KGRP, false)
        .with_zero_size_root(true)
        .with_strict_sizes(options.strict_riff_sizes)
        .parse(bytes)?;
    if root.tag != FourCc::RIFF {
        return Err(FormatError::UnexpectedTag {
            expected: FourCc::RIFF.to_string(),
            found: root.tag.to_string(),
        });
    }
    match root.form() {
        Some(found) if found == form => Ok(root),
        found => Err(FormatError::UnexpectedTag {
            expected: form.to_string(),
            found: found.map(|f| f.to_string()).unwrap_or_default(),
        }),
    }
}

/// A decoded Akai program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AkpFile {
    pub program: AkpProgram,
    pub output: AkpOutput,
    pub tune: AkpTune,
    pub lfos: Vec<AkpLfo>,
    pub modulations: Option<AkpModulations>,
    pub keygroups: Vec<AkpKeygroup>,
    /// Chunks with unknown tags and their index among the top-level chunks,
    /// written back unchanged at that index.
    pub unknown: Vec<(usize, RawChunk)>,
}

type ProgramDecoder = fn(&RawChunk, &mut AkpFile, &dyn Notifier) -> Result<()>;

static PROGRAM_CHUNKS: [(FourCc, ProgramDecoder); 6] = [
    (AkpProgram::TAG, decode_program),
    (AkpOutput::TAG, decode_output),
    (AkpTune::TAG, decode_tune),
    (AkpLfo::TAG, decode_lfo),
    (AkpModulations::TAG, decode_modulations),
    (KGRP, decode_keygroup),
];

fn decode_program(chunk: &RawChunk, file: &mut AkpFile, _: &dyn Notifier) -> Result<()> {
    file.program = AkpProgram::read(chunk)?;
    Ok(())
}

fn decode_output(chunk: &RawChunk, file: &mut AkpFile, _: &dyn Notifier) -> Result<()> {
    file.output = AkpOutput::read(chunk)?;
    Ok(())
}

fn decode_tune(chunk: &RawChunk, file: &mut AkpFile, _: &dyn Notifier) -> Result<()> {
    file.tune = AkpTune::read(chunk)?;
    Ok(())
}

fn decode_lfo(chunk: &RawChunk, file: &mut AkpFile, _: &dyn Notifier) -> Result<()> {
    file.lfos.push(AkpLfo::read(chunk)?);
    Ok(())
}

fn decode_modulations(chunk: &RawChunk, file: &mut AkpFile, _: &dyn Notifier) -> Result<()> {
    file.modulations = Some(AkpModulations::read(chunk)?);
    Ok(())
}

fn decode_keygroup(chunk: &RawChunk, file: &mut AkpFile, notifier: &dyn Notifier) -> Result<()> {
    file.keygroups.push(AkpKeygroup::read(chunk, notifier)?);
    Ok(())
}

impl AkpFile {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        Self::read_with(bytes, &DecodeOptions::default(), &LogNotifier::new())
    }

    pub fn read_with(bytes: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<Self> {
        let root = parse_root(bytes, APRG, options)?;
        let mut file = AkpFile::default();
        for (index, chunk) in root.children().iter().enumerate() {
            match PROGRAM_CHUNKS.iter().find(|(tag, _)| *tag == chunk.tag) {
                Some((_, decode)) => decode(chunk, &mut file, notifier)?,
                None => {
                    notifier.unknown_tag("program", &chunk.tag.to_string());
                    file.unknown.push((index, chunk.clone()));
                }
            }
        }

        let declared = usize::from(file.program.number_of_keygroups);
        if declared != file.keygroups.len() {
            notifier.warn(&format!(
                "Program declares {declared} keygroups but contains {}",
                file.keygroups.len()
            ));
        }
        debug!(
            "Read Akai program with {} keygroups and {} LFOs",
            file.keygroups.len(),
            file.lfos.len()
        );
        Ok(file)
    }

    /// Serializes the program. Modulation routing is not written; the `mods`
    /// chunk is emitted zero-filled.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut program = self.program;
        program.number_of_keygroups = u8::try_from(self.keygroups.len()).map_err(|_| {
            FormatError::InvalidParameterValue("keygroups".to_string(), self.keygroups.len() as i32)
        })?;

        let mut children = vec![
            program.to_chunk(),
            self.output.to_chunk(),
            self.tune.to_chunk(),
        ];
        let default_lfos = [AkpLfo::default(), AkpLfo::default()];
        let lfos = if self.lfos.is_empty() { &default_lfos[..] } else { &self.lfos[..] };
        children.extend(lfos.iter().map(|lfo| lfo.to_chunk()));
        children.push(RawChunk::leaf(
            AkpModulations::TAG,
            vec![0; AkpModulations::LENGTH],
        ));
        children.extend(self.keygroups.iter().map(AkpKeygroup::to_chunk));
        for (index, chunk) in &self.unknown {
            children.insert((*index).min(children.len()), chunk.clone());
        }

        RiffWriter::default().write(&RawChunk::list(FourCc::RIFF, Some(APRG), children))
    }

    /// Builds the multisample model, one group per keygroup.
    pub fn to_multisample(&self, name: &str, provider: &dyn SampleDataProvider) -> Result<MultisampleSource> {
        let mut source = MultisampleSource::new(name);
        provider.add_metadata(&mut source.metadata)?;
        let base_gain = self.output.loudness_db();
        let base_tune = self.tune.semitones();

        for (index, keygroup) in self.keygroups.iter().enumerate() {
            let mut group = Group::new(format!("Keygroup {}", index + 1));
            let location = &keygroup.location;
            let keygroup_tune =
                base_tune + f64::from(location.semitone) + f64::from(location.fine) / 100.0;

            for zone in keygroup.active_zones() {
                let mut sample_zone = SampleZone {
                    name: zone.sample_name.clone(),
                    sample_path: Some(format!("{}.wav", zone.sample_name)),
                    key_low: location.low_note,
                    key_high: location.high_note,
                    velocity_low: zone.low_velocity,
                    velocity_high: zone.high_velocity,
                    gain: base_gain + f64::from(zone.level) * 0.12,
                    panorama: f64::from(zone.pan.clamp(-50, 50)) / 50.0,
                    tune: keygroup_tune + f64::from(zone.semitone) + f64::from(zone.fine) / 100.0,
                    key_tracking: if zone.key_track == 0 { 0.0 } else { 1.0 },
                    amplitude_envelope: keygroup.amp_envelope().map(to_envelope),
                    filter: keygroup.filter.as_ref().and_then(to_filter),
                    ..SampleZone::default()
                };
                // no loop (3) and one shot (4) ignore loops in the sample
                let add_loops = !matches!(zone.playback, 3 | 4);
                provider.add_zone_data(&mut sample_zone, true, add_loops)?;
                group.zones.push(sample_zone);
            }

            if !group.zones.is_empty() {
                source.groups.push(group);
            }
        }
        Ok(source)
    }

    /// Builds a program with one single-zone keygroup per sample zone.
    pub fn from_multisample(source: &MultisampleSource) -> Self {
        let output = AkpOutput::default();
        let keygroups = source
            .zones()
            .map(|zone| from_sample_zone(zone, output.loudness_db()))
            .collect::<Vec<_>>();
        Self {
            program: AkpProgram {
                number_of_keygroups: keygroups.len().min(usize::from(u8::MAX)) as u8,
                ..AkpProgram::default()
            },
            output,
            tune: AkpTune::default(),
            lfos: vec![AkpLfo::default(), AkpLfo::default()],
            modulations: None,
            keygroups,
            unknown: Vec::new(),
        }
    }
}

fn to_envelope(envelope: &AkpEnvelope) -> Envelope {
    Envelope {
        attack: AkpEnvelope::seconds(envelope.attack),
        decay: AkpEnvelope::seconds(envelope.decay),
        release: AkpEnvelope::seconds(envelope.release),
        sustain: f64::from(envelope.sustain.min(100)) / 100.0,
        ..Envelope::default()
    }
}

fn to_filter(filter: &AkpFilter) -> Option<Filter> {
    let (kind, poles) = match filter.mode {
        0 | 2 => (FilterKind::LowPass, 2),
        1 => (FilterKind::LowPass, 4),
        3 | 5 => (FilterKind::BandPass, 2),
        4 => (FilterKind::BandPass, 4),
        6 | 8 => (FilterKind::HighPass, 1),
        7 => (FilterKind::HighPass, 2),
        12..=16 => (FilterKind::BandReject, 2),
        _ => return None,
    };
    // a fully open low pass is no filter at all
    if kind == FilterKind::LowPass && filter.cutoff >= 100 && filter.resonance == 0 {
        return None;
    }
    Some(Filter {
        kind,
        poles,
        cutoff_hz: filter.cutoff_hz(),
        resonance: f64::from(filter.resonance.min(12)) / 12.0,
    })
}

fn from_filter(filter: Option<&Filter>) -> AkpFilter {
    let Some(filter) = filter else {
        return AkpFilter { cutoff: 100, ..AkpFilter::default() };
    };
    let mode = match (filter.kind, filter.poles) {
        (FilterKind::LowPass, poles) if poles > 2 => 1,
        (FilterKind::LowPass, _) => 0,
        (FilterKind::BandPass, poles) if poles > 2 => 4,
        (FilterKind::BandPass, _) => 3,
        (FilterKind::HighPass, poles) if poles < 2 => 6,
        (FilterKind::HighPass, _) => 7,
        (FilterKind::BandReject, _) => 12,
    };
    AkpFilter {
        mode,
        cutoff: AkpFilter::cutoff_from_hz(filter.cutoff_hz),
        resonance: (filter.resonance.clamp(0.0, 1.0) * 12.0).round() as u8,
        ..AkpFilter::default()
    }
}

fn from_sample_zone(zone: &SampleZone, loudness_db: f64) -> AkpKeygroup {
    let semitone = zone.tune.round();
    let fine = ((zone.tune - semitone) * 100.0).round();
    let sample_name = zone
        .sample_path
        .as_deref()
        .and_then(|path| Path::new(path).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| zone.name.clone());

    let amp = match &zone.amplitude_envelope {
        Some(envelope) => AkpEnvelope {
            attack: AkpEnvelope::from_seconds(envelope.attack),
            decay: AkpEnvelope::from_seconds(envelope.decay),
            release: AkpEnvelope::from_seconds(envelope.release),
            sustain: (envelope.sustain.clamp(0.0, 1.0) * 100.0).round() as u8,
            ..AkpEnvelope::default()
        },
        None => AkpEnvelope { sustain: 100, ..AkpEnvelope::default() },
    };

    AkpKeygroup {
        location: AkpKeyLocation {
            low_note: zone.key_low.min(127),
            high_note: zone.key_high.min(127).max(zone.key_low.min(127)),
            ..AkpKeyLocation::default()
        },
        envelopes: vec![amp, AkpEnvelope::default(), AkpEnvelope::default()],
        filter: Some(from_filter(zone.filter.as_ref())),
        zones: vec![AkpZone {
            sample_name,
            low_velocity: zone.velocity_low.min(127),
            high_velocity: zone.velocity_high.min(127).max(zone.velocity_low.min(127)),
            fine: fine.clamp(-50.0, 50.0) as i8,
            semitone: semitone.clamp(-36.0, 36.0) as i8,
            pan: (zone.panorama * 50.0).round().clamp(-50.0, 50.0) as i8,
            playback: if zone.loops.is_empty() { 0 } else { 2 },
            level: ((zone.gain - loudness_db) / 0.12).round().clamp(-100.0, 100.0) as i8,
            key_track: u8::from(zone.key_tracking > 0.0),
            ..AkpZone::default()
        }],
    }
}

/// A decoded Akai multi.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AkmFile {
    pub parts: Vec<AkmPart>,
}

impl AkmFile {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        Self::read_with(bytes, &DecodeOptions::default(), &LogNotifier::new())
    }

    pub fn read_with(bytes: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<Self> {
        let root = parse_root(bytes, AMLT, options)?;
        let mut parts = Vec::new();
        for chunk in root.children() {
            if chunk.tag == AkmPart::TAG {
                parts.push(AkmPart::read(chunk)?);
            } else {
                notifier.unknown_tag("multi", &chunk.tag.to_string());
            }
        }
        Ok(Self { parts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoSampleData;
    use crate::notify::CollectingNotifier;

    fn riff(form: FourCc, children: Vec<RawChunk>) -> Vec<u8> {
        RiffWriter::default()
            .write(&RawChunk::list(FourCc::RIFF, Some(form), children))
            .unwrap()
    }

    fn kgrp(low: u8, high: u8, sample: &str) -> RawChunk {
        let mut kloc = vec![0u8; 16];
        kloc[4] = low;
        kloc[5] = high;
        let mut zone = vec![0u8; 46];
        zone[1] = sample.len() as u8;
        zone[2..2 + sample.len()].copy_from_slice(sample.as_bytes());
        zone[34] = 1;
        zone[35] = 127;
        zone[37] = 2;
        zone[39] = 25;
        let mut env = vec![0u8; 18];
        env[1] = 50;
        env[7] = 100;
        RawChunk::list(
            KGRP,
            None,
            vec![
                RawChunk::leaf(AkpKeyLocation::TAG, kloc),
                RawChunk::leaf(AkpEnvelope::TAG, env),
                RawChunk::leaf(AkpZone::TAG, zone),
                RawChunk::leaf(AkpZone::TAG, vec![0; 46]),
            ],
        )
    }

    fn program_bytes(mods_length: usize) -> Vec<u8> {
        riff(
            APRG,
            vec![
                RawChunk::leaf(AkpProgram::TAG, vec![1, 0, 2, 0, 0, 0]),
                RawChunk::leaf(AkpOutput::TAG, vec![0, 85, 0, 0, 0, 0, 0, 25]),
                RawChunk::leaf(AkpTune::TAG, vec![0; 22]),
                RawChunk::leaf(AkpModulations::TAG, vec![0; mods_length]),
                kgrp(0, 59, "LOW"),
                kgrp(60, 127, "HIGH"),
            ],
        )
    }

    #[test]
    fn test_parse_program_file() {
        let file = AkpFile::read(&program_bytes(38)).unwrap();
        assert_eq!(file.keygroups.len(), 2);
        assert_eq!(file.keygroups[1].location.low_note, 60);
        assert_eq!(file.output.loudness, 85);
        assert!(file.modulations.is_some());
    }

    #[test]
    fn test_short_mods_chunk_fails_the_file() {
        assert!(matches!(
            AkpFile::read(&program_bytes(37)),
            Err(FormatError::ChunkTooShort { length: 37, minimum: 38, .. })
        ));
    }

    #[test]
    fn test_zero_root_size_is_accepted() {
        let mut bytes = program_bytes(38);
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        let file = AkpFile::read(&bytes).unwrap();
        assert_eq!(file.keygroups.len(), 2);
    }

    #[test]
    fn test_wrong_form_type_fails() {
        let bytes = riff(FourCc::new(b"WAVE"), vec![]);
        assert!(matches!(
            AkpFile::read(&bytes),
            Err(FormatError::UnexpectedTag { .. })
        ));
    }

    #[test]
    fn test_unknown_chunks_survive_write() {
        let mut bytes = program_bytes(38);
        let mut tree = RiffParser::default()
            .with_container(KGRP, false)
            .parse(&bytes)
            .unwrap();
        if let crate::riff::ChunkBody::List { children, .. } = &mut tree.body {
            children.insert(1, RawChunk::leaf(FourCc::new(b"xtra"), vec![1, 2, 3]));
            children.push(RawChunk::leaf(FourCc::new(b"tail"), vec![4]));
        }
        bytes = RiffWriter::default().write(&tree).unwrap();

        let notifier = CollectingNotifier::new();
        let file = AkpFile::read_with(&bytes, &DecodeOptions::default(), &notifier).unwrap();
        let positions: Vec<usize> = file.unknown.iter().map(|(index, _)| *index).collect();
        assert_eq!(positions, vec![1, 7]);
        assert_eq!(notifier.messages().len(), 2);

        let written_bytes = file.write().unwrap();
        let written = AkpFile::read(&written_bytes).unwrap();
        let tags: Vec<FourCc> = RiffParser::default()
            .with_container(KGRP, false)
            .parse(&written_bytes)
            .unwrap()
            .children()
            .iter()
            .map(|c| c.tag)
            .collect();
        assert_eq!(tags[1], FourCc::new(b"xtra"));
        assert_eq!(tags[7], FourCc::new(b"tail"));
        assert_eq!(written.unknown, file.unknown);
        assert_eq!(written.keygroups, file.keygroups);
        assert_eq!(written.program, file.program);
    }

    #[test]
    fn test_to_multisample() {
        let file = AkpFile::read(&program_bytes(38)).unwrap();
        let source = file.to_multisample("Piano", &NoSampleData).unwrap();
        assert_eq!(source.name, "Piano");
        assert_eq!(source.groups.len(), 2);
        // the empty second zone of each keygroup is skipped
        assert_eq!(source.zones().count(), 2);

        let low = &source.groups[0].zones[0];
        assert_eq!(low.sample_path.as_deref(), Some("LOW.wav"));
        assert_eq!((low.key_low, low.key_high), (0, 59));
        assert!((low.tune - 2.0).abs() < 1e-9);
        assert!((low.panorama - 0.5).abs() < 1e-9);
        assert!((low.gain - file.output.loudness_db()).abs() < 1e-9);
        let envelope = low.amplitude_envelope.unwrap();
        assert!((envelope.attack - 0.1).abs() < 1e-9);
        assert!((envelope.sustain - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_multisample_round_trip() {
        let mut source = MultisampleSource::new("Keys");
        let mut group = Group::new("All");
        group.zones.push(SampleZone {
            name: "C3".to_string(),
            sample_path: Some("samples/C3.wav".to_string()),
            key_low: 48,
            key_high: 59,
            tune: -1.25,
            panorama: -0.5,
            gain: -3.9,
            ..SampleZone::default()
        });
        source.groups.push(group);

        let file = AkpFile::from_multisample(&source);
        let bytes = file.write().unwrap();
        let read = AkpFile::read(&bytes).unwrap();
        assert_eq!(read.program.number_of_keygroups, 1);
        let zone = &read.keygroups[0].zones[0];
        assert_eq!(zone.sample_name, "C3");
        assert_eq!(zone.semitone, -1);
        assert_eq!(zone.fine, -25);
        assert_eq!(zone.pan, -25);
        assert_eq!(zone.level, 0);

        let back = read.to_multisample("Keys", &NoSampleData).unwrap();
        let back_zone = back.zones().next().unwrap();
        assert_eq!((back_zone.key_low, back_zone.key_high), (48, 59));
        assert!((back_zone.tune + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_multi_file() {
        let mut part = vec![0u8; 0x2C];
        part[2..9].copy_from_slice(b"STRINGS");
        part[0x22] = 5;
        part[0x23] = (-16i8) as u8;
        part[0x24] = 36;
        part[0x25] = 72;
        part[0x26] = 80;
        let bytes = riff(
            AMLT,
            vec![
                RawChunk::leaf(FourCc::new(b"mlti"), vec![0; 4]),
                RawChunk::leaf(AkmPart::TAG, part),
            ],
        );
        let notifier = CollectingNotifier::new();
        let multi = AkmFile::read_with(&bytes, &DecodeOptions::default(), &notifier).unwrap();
        assert_eq!(multi.parts.len(), 1);
        let part = &multi.parts[0];
        assert_eq!(part.midi_channel, 5);
        assert_eq!(part.pan, -16);
        assert_eq!((part.low_key, part.high_key), (36, 72));
        assert_eq!(part.volume, 80);
        assert_eq!(notifier.messages().len(), 1);
    }
}
