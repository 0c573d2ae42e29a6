use std::ops::Range;

use crate::model::{Envelope, Filter, FilterKind, LoopKind, SampleInfo, SampleLoop, SampleZone};

use super::generator::*;
use super::records::{GeneratorRecord, ModulatorRecord, SampleHeader};

/// Sample offsets are split into a fine and a coarse part of 32768 frames.
const COARSE_OFFSET_FRAMES: i64 = 32768;

/// One preset or instrument bag. The generators stay in the generator list
/// shared by all zones of the same level; a zone only knows its slice of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sf2Zone {
    pub first_generator: usize,
    pub number_of_generators: usize,
    /// Sample of an instrument zone, mirrors its `sampleID` generator.
    pub sample: Option<usize>,
    /// Instrument of a preset zone, mirrors its `instrument` generator.
    pub instrument: Option<usize>,
    pub modulators: Vec<ModulatorRecord>,
}

impl Sf2Zone {
    /// Appends `generators` to the shared list and returns the zone covering
    /// them.
    pub fn append(pool: &mut Vec<GeneratorRecord>, generators: &[GeneratorRecord]) -> Self {
        let first_generator = pool.len();
        pool.extend_from_slice(generators);
        let link = |id: u16| find(generators, id).map(GeneratorRecord::as_index);
        Self {
            first_generator,
            number_of_generators: generators.len(),
            sample: link(SAMPLE_ID),
            instrument: link(INSTRUMENT),
            modulators: Vec::new(),
        }
    }

    pub fn generator_range(&self) -> Range<usize> {
        self.first_generator..self.first_generator + self.number_of_generators
    }

    /// The zone's slice of the shared list, empty if the range is out of
    /// bounds.
    pub fn generators<'a>(&self, pool: &'a [GeneratorRecord]) -> &'a [GeneratorRecord] {
        pool.get(self.generator_range()).unwrap_or(&[])
    }
}

pub fn find(generators: &[GeneratorRecord], id: u16) -> Option<&GeneratorRecord> {
    generators.iter().find(|g| g.operator == id)
}

pub fn amount(generators: &[GeneratorRecord], id: u16) -> Option<i16> {
    find(generators, id).map(|g| g.amount)
}

/// Splits zones into the optional global zone and the linked zones. Only the
/// first zone may be global; it is the one without a link.
pub fn split_global<'a>(
    zones: &'a [Sf2Zone],
    link: impl Fn(&Sf2Zone) -> Option<usize>,
) -> (Option<&'a Sf2Zone>, Vec<&'a Sf2Zone>) {
    let global = zones.first().filter(|z| link(z).is_none());
    let linked = zones.iter().filter(|z| link(z).is_some()).collect();
    (global, linked)
}

/// The four zones that contribute to one played sample: instrument values
/// (local over global over default) plus preset offsets (local over global).
#[derive(Debug, Clone, Copy)]
pub struct GeneratorStack<'a> {
    pub preset_global: Option<&'a [GeneratorRecord]>,
    pub preset: &'a [GeneratorRecord],
    pub instrument_global: Option<&'a [GeneratorRecord]>,
    pub instrument: &'a [GeneratorRecord],
}

impl GeneratorStack<'_> {
    fn instrument_value(&self, id: u16) -> i64 {
        let value = amount(self.instrument, id)
            .or_else(|| self.instrument_global.and_then(|g| amount(g, id)))
            .unwrap_or_else(|| default_value(id));
        i64::from(value)
    }

    fn preset_offset(&self, id: u16) -> i64 {
        let value = amount(self.preset, id)
            .or_else(|| self.preset_global.and_then(|g| amount(g, id)))
            .unwrap_or(0);
        i64::from(value)
    }

    pub fn value(&self, id: u16) -> i64 {
        if is_only_instrument(id) {
            self.instrument_value(id)
        } else {
            self.instrument_value(id) + self.preset_offset(id)
        }
    }

    /// Intersection of the instrument and preset ranges. `None` if they do
    /// not overlap.
    pub fn range(&self, id: u16) -> Option<(u8, u8)> {
        let pick = |local: &[GeneratorRecord], global: Option<&[GeneratorRecord]>| {
            find(local, id)
                .or_else(|| global.and_then(|g| find(g, id)))
                .map_or((0, 127), GeneratorRecord::as_range)
        };
        let (inst_low, inst_high) = pick(self.instrument, self.instrument_global);
        let (preset_low, preset_high) = pick(self.preset, self.preset_global);
        let low = inst_low.max(preset_low);
        let high = inst_high.min(preset_high);
        (low <= high).then_some((low, high))
    }

    fn offset(&self, fine: u16, coarse: u16) -> i64 {
        self.value(fine) + COARSE_OFFSET_FRAMES * self.value(coarse)
    }

    /// Builds the model zone, `None` if the key or velocity ranges of
    /// preset and instrument do not overlap.
    pub fn to_sample_zone(&self, sample: &SampleHeader) -> Option<SampleZone> {
        let (key_low, key_high) = self.range(KEY_RANGE)?;
        let (velocity_low, velocity_high) = self.range(VEL_RANGE)?;
        let root = self.value(OVERRIDING_ROOT_KEY);
        let key_root = if (0..=127).contains(&root) { root as u8 } else { sample.original_pitch };

        let frames = i64::from(sample.frames());
        let start = self.offset(START_ADDRS_OFFSET, START_ADDRS_COARSE_OFFSET).clamp(0, frames);
        let stop = (frames + self.offset(END_ADDRS_OFFSET, END_ADDRS_COARSE_OFFSET)).clamp(start, frames);

        let mut loops = Vec::new();
        if matches!(self.value(SAMPLE_MODES) & 3, 1 | 3) {
            let base = i64::from(sample.start);
            let loop_start = i64::from(sample.loop_start) - base
                + self.offset(STARTLOOP_ADDRS_OFFSET, STARTLOOP_ADDRS_COARSE_OFFSET);
            let loop_end = i64::from(sample.loop_end) - base
                + self.offset(ENDLOOP_ADDRS_OFFSET, ENDLOOP_ADDRS_COARSE_OFFSET);
            loops.push(SampleLoop {
                kind: LoopKind::Forwards,
                start: loop_start.clamp(0, frames) as u32,
                end: loop_end.clamp(0, frames) as u32,
                crossfade: 0,
            });
        }

        let cutoff = self.value(INITIAL_FILTER_FC);
        let filter = (cutoff < i64::from(default_value(INITIAL_FILTER_FC))).then(|| Filter {
            kind: FilterKind::LowPass,
            poles: 2,
            cutoff_hz: absolute_cents_to_hz(cutoff),
            resonance: (self.value(INITIAL_FILTER_Q) as f64 / 960.0).clamp(0.0, 1.0),
        });

        Some(SampleZone {
            name: sample.name(),
            sample_path: Some(sample.name()),
            key_low,
            key_high,
            key_root: Some(key_root),
            velocity_low,
            velocity_high,
            start: start as u32,
            stop: Some(stop as u32),
            gain: -(self.value(INITIAL_ATTENUATION) as f64) / 10.0,
            panorama: (self.value(PAN) as f64 / 500.0).clamp(-1.0, 1.0),
            tune: self.value(COARSE_TUNE) as f64
                + (self.value(FINE_TUNE) + i64::from(sample.pitch_correction)) as f64 / 100.0,
            key_tracking: self.value(SCALE_TUNING) as f64 / 100.0,
            loops,
            amplitude_envelope: Some(Envelope {
                delay: timecents_to_seconds(self.value(DELAY_VOL_ENV)),
                attack: timecents_to_seconds(self.value(ATTACK_VOL_ENV)),
                hold: timecents_to_seconds(self.value(HOLD_VOL_ENV)),
                decay: timecents_to_seconds(self.value(DECAY_VOL_ENV)),
                sustain: 10f64.powf(-(self.value(SUSTAIN_VOL_ENV).clamp(0, 1440) as f64) / 200.0),
                release: timecents_to_seconds(self.value(RELEASE_VOL_ENV)),
            }),
            filter,
            sample_info: Some(SampleInfo {
                sample_rate: sample.sample_rate,
                frames: sample.frames(),
                channels: 1,
            }),
            ..SampleZone::default()
        })
    }
}

pub fn timecents_to_seconds(timecents: i64) -> f64 {
    2f64.powf(timecents as f64 / 1200.0)
}

pub fn absolute_cents_to_hz(cents: i64) -> f64 {
    8.176 * 2f64.powf(cents as f64 / 1200.0)
}
