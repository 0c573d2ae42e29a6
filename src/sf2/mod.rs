//! SoundFont 2 (`.sf2`) files.
//!
//! The `INFO` and `sdta` lists are kept as opaque chunks. The `pdta` hydra is
//! decoded into presets and instruments whose zones are index ranges into
//! one generator list per level, kept on [`Sf2File`]. Zones keep a copy of
//! their modulators. The writer rebuilds the bag indices from the ranges.

pub mod generator;
pub mod records;
pub mod zone;

use log::debug;

use crate::config::DecodeOptions;
use crate::error::{FormatError, Result};
use crate::model::{Group, MultisampleSource, SampleDataProvider};
use crate::notify::{LogNotifier, Notifier};
use crate::riff::{FourCc, RawChunk, RiffParser, RiffWriter};

use generator::{generator_name, is_only_instrument};
use records::{
    name_field, name_from, read_records, records_chunk, Bag, GeneratorRecord, InstrumentHeader,
    ModulatorRecord, PresetHeader, SampleHeader,
};

pub use zone::{split_global, GeneratorStack, Sf2Zone};

pub const SFBK: FourCc = FourCc::new(b"sfbk");
const INFO: FourCc = FourCc::new(b"INFO");
const SDTA: FourCc = FourCc::new(b"sdta");
const PDTA: FourCc = FourCc::new(b"pdta");
const PHDR: FourCc = FourCc::new(b"phdr");
const PBAG: FourCc = FourCc::new(b"pbag");
const PMOD: FourCc = FourCc::new(b"pmod");
const PGEN: FourCc = FourCc::new(b"pgen");
const INST: FourCc = FourCc::new(b"inst");
const IBAG: FourCc = FourCc::new(b"ibag");
const IMOD: FourCc = FourCc::new(b"imod");
const IGEN: FourCc = FourCc::new(b"igen");
const SHDR: FourCc = FourCc::new(b"shdr");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sf2Preset {
    pub name: String,
    pub preset: u16,
    pub bank: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub zones: Vec<Sf2Zone>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sf2Instrument {
    pub name: String,
    pub zones: Vec<Sf2Zone>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sf2File {
    pub info: RawChunk,
    pub sample_data: RawChunk,
    pub presets: Vec<Sf2Preset>,
    pub instruments: Vec<Sf2Instrument>,
    /// Sample headers without the terminal record.
    pub samples: Vec<SampleHeader>,
    /// Generators of all preset zones, in bag order, without the terminal
    /// record.
    pub preset_generators: Vec<GeneratorRecord>,
    /// Generators of all instrument zones, same layout.
    pub instrument_generators: Vec<GeneratorRecord>,
}

/// Zones grouped per header, and the generator list their ranges point into.
struct Level {
    zones: Vec<Vec<Sf2Zone>>,
    generators: Vec<GeneratorRecord>,
}

/// Groups the bags between consecutive header indices into zones. Generators
/// rejected by `keep` are left out of the rebuilt list.
fn collect_zones(
    bag_indices: &[u16],
    bags: &[Bag],
    generators: &[GeneratorRecord],
    modulators: &[ModulatorRecord],
    what: &'static str,
    mut keep: impl FnMut(usize, &GeneratorRecord) -> bool,
) -> Result<Level> {
    let mut pool = Vec::with_capacity(generators.len());
    let mut zones = Vec::with_capacity(bag_indices.len().saturating_sub(1));
    for (header, pair) in bag_indices.windows(2).enumerate() {
        let (start, end) = (usize::from(pair[0]), usize::from(pair[1]));
        // the last bag is the terminal record
        if start > end || end >= bags.len() {
            return Err(FormatError::UnresolvedReference {
                what,
                index: end,
                available: bags.len(),
            });
        }
        let mut header_zones = Vec::with_capacity(end - start);
        for i in start..end {
            let (bag, next) = (bags[i], bags[i + 1]);
            let records = slice_range(generators, bag.generator_index, next.generator_index, "generator")?;
            let kept: Vec<GeneratorRecord> = records.iter().copied().filter(|g| keep(header, g)).collect();
            let mut zone = Sf2Zone::append(&mut pool, &kept);
            zone.modulators = slice_range(modulators, bag.modulator_index, next.modulator_index, "modulator")?.to_vec();
            header_zones.push(zone);
        }
        zones.push(header_zones);
    }
    Ok(Level { zones, generators: pool })
}

fn slice_range<'a, T>(items: &'a [T], start: u16, end: u16, what: &'static str) -> Result<&'a [T]> {
    let (start, end) = (usize::from(start), usize::from(end));
    if start > end || end > items.len() {
        return Err(FormatError::UnresolvedReference {
            what,
            index: end,
            available: items.len(),
        });
    }
    Ok(&items[start..end])
}

fn check_links(links: impl Iterator<Item = Option<usize>>, available: usize, what: &'static str) -> Result<()> {
    match links.flatten().find(|&index| index >= available) {
        Some(index) => Err(FormatError::UnresolvedReference { what, index, available }),
        None => Ok(()),
    }
}

/// Flattened hydra arrays of a list of presets or instruments, terminal
/// records included.
struct Hydra {
    bag_starts: Vec<u16>,
    bags: Vec<Bag>,
    generators: Vec<GeneratorRecord>,
    modulators: Vec<ModulatorRecord>,
}

fn index_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| FormatError::InvalidData(format!("too many {what} for SF2 indices")))
}

fn flatten<'a>(items: impl Iterator<Item = &'a [Sf2Zone]>, pool: &[GeneratorRecord]) -> Result<Hydra> {
    let mut hydra = Hydra {
        bag_starts: Vec::new(),
        bags: Vec::new(),
        generators: Vec::new(),
        modulators: Vec::new(),
    };
    for zones in items {
        hydra.bag_starts.push(index_u16(hydra.bags.len(), "zones")?);
        for zone in zones {
            let generators = pool.get(zone.generator_range()).ok_or(FormatError::UnresolvedReference {
                what: "generator",
                index: zone.generator_range().end,
                available: pool.len(),
            })?;
            hydra.bags.push(Bag {
                generator_index: index_u16(hydra.generators.len(), "generators")?,
                modulator_index: index_u16(hydra.modulators.len(), "modulators")?,
            });
            hydra.generators.extend_from_slice(generators);
            hydra.modulators.extend_from_slice(&zone.modulators);
        }
    }
    hydra.bag_starts.push(index_u16(hydra.bags.len(), "zones")?);
    hydra.bags.push(Bag {
        generator_index: index_u16(hydra.generators.len(), "generators")?,
        modulator_index: index_u16(hydra.modulators.len(), "modulators")?,
    });
    hydra.generators.push(GeneratorRecord::default());
    hydra.modulators.push(ModulatorRecord::default());
    Ok(hydra)
}

impl Sf2File {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        Self::read_with(bytes, &DecodeOptions::default(), &LogNotifier::new())
    }

    pub fn read_with(bytes: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<Self> {
        let root = RiffParser::default()
            .with_strict_sizes(options.strict_riff_sizes)
            .parse(bytes)?;
        if root.tag != FourCc::RIFF || root.form() != Some(SFBK) {
            return Err(FormatError::UnexpectedTag {
                expected: SFBK.to_string(),
                found: root.form().unwrap_or(root.tag).to_string(),
            });
        }
        for chunk in root.children() {
            if !matches!(chunk.form(), Some(form) if [INFO, SDTA, PDTA].contains(&form)) {
                notifier.unknown_tag("sfbk", &chunk.tag.to_string());
            }
        }
        let list = |form: FourCc| {
            root.find_list(form)
                .ok_or_else(|| FormatError::InvalidData(format!("missing '{form}' list")))
        };
        let info = list(INFO)?.clone();
        let sample_data = list(SDTA)?.clone();
        let pdta = list(PDTA)?;

        let mut samples: Vec<SampleHeader> = read_records(pdta, SHDR)?;
        let instrument_headers: Vec<InstrumentHeader> = read_records(pdta, INST)?;
        let preset_headers: Vec<PresetHeader> = read_records(pdta, PHDR)?;
        if samples.is_empty() || instrument_headers.is_empty() || preset_headers.is_empty() {
            return Err(FormatError::InvalidData("missing SF2 terminal record".to_string()));
        }
        samples.pop();

        let indices: Vec<u16> = instrument_headers.iter().map(|h| h.bag_index).collect();
        let bags: Vec<Bag> = read_records(pdta, IBAG)?;
        let generators: Vec<GeneratorRecord> = read_records(pdta, IGEN)?;
        let modulators: Vec<ModulatorRecord> = read_records(pdta, IMOD)?;
        let level = collect_zones(&indices, &bags, &generators, &modulators, "instrument bag", |_, _| true)?;
        let instrument_generators = level.generators;
        let instruments: Vec<Sf2Instrument> = instrument_headers
            .iter()
            .zip(level.zones)
            .map(|(header, zones)| Sf2Instrument { name: name_from(&header.name), zones })
            .collect();
        check_links(
            instruments.iter().flat_map(|i| &i.zones).map(|z| z.sample),
            samples.len(),
            "sample",
        )?;

        let indices: Vec<u16> = preset_headers.iter().map(|h| h.bag_index).collect();
        let bags: Vec<Bag> = read_records(pdta, PBAG)?;
        let generators: Vec<GeneratorRecord> = read_records(pdta, PGEN)?;
        let modulators: Vec<ModulatorRecord> = read_records(pdta, PMOD)?;
        let level = collect_zones(&indices, &bags, &generators, &modulators, "preset bag", |header, g| {
            let keep = !is_only_instrument(g.operator);
            if !keep {
                notifier.warn(&format!(
                    "Ignoring instrument-only generator '{}' in preset '{}'",
                    generator_name(g.operator).unwrap_or("unknown"),
                    name_from(&preset_headers[header].name)
                ));
            }
            keep
        })?;
        let preset_generators = level.generators;
        let presets: Vec<Sf2Preset> = preset_headers
            .iter()
            .zip(level.zones)
            .map(|(header, zones)| Sf2Preset {
                name: name_from(&header.name),
                preset: header.preset,
                bank: header.bank,
                library: header.library,
                genre: header.genre,
                morphology: header.morphology,
                zones,
            })
            .collect();
        check_links(
            presets.iter().flat_map(|p| &p.zones).map(|z| z.instrument),
            instruments.len(),
            "instrument",
        )?;

        debug!(
            "Read SF2 with {} presets, {} instruments and {} samples",
            presets.len(),
            instruments.len(),
            samples.len()
        );
        Ok(Self {
            info,
            sample_data,
            presets,
            instruments,
            samples,
            preset_generators,
            instrument_generators,
        })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        let preset_hydra = flatten(self.presets.iter().map(|p| p.zones.as_slice()), &self.preset_generators)?;
        let mut preset_headers: Vec<PresetHeader> = self
            .presets
            .iter()
            .zip(&preset_hydra.bag_starts)
            .map(|(preset, &bag_index)| PresetHeader {
                name: name_field(&preset.name),
                preset: preset.preset,
                bank: preset.bank,
                bag_index,
                library: preset.library,
                genre: preset.genre,
                morphology: preset.morphology,
            })
            .collect();
        preset_headers.push(PresetHeader {
            name: name_field("EOP"),
            bag_index: preset_hydra.bag_starts.last().copied().unwrap_or_default(),
            ..PresetHeader::default()
        });

        let instrument_hydra = flatten(self.instruments.iter().map(|i| i.zones.as_slice()), &self.instrument_generators)?;
        let mut instrument_headers: Vec<InstrumentHeader> = self
            .instruments
            .iter()
            .zip(&instrument_hydra.bag_starts)
            .map(|(instrument, &bag_index)| InstrumentHeader {
                name: name_field(&instrument.name),
                bag_index,
            })
            .collect();
        instrument_headers.push(InstrumentHeader {
            name: name_field("EOI"),
            bag_index: instrument_hydra.bag_starts.last().copied().unwrap_or_default(),
        });

        let mut samples = self.samples.clone();
        samples.push(SampleHeader {
            name: name_field("EOS"),
            ..SampleHeader::default()
        });

        let pdta = RawChunk::list(
            FourCc::LIST,
            Some(PDTA),
            vec![
                records_chunk(PHDR, &preset_headers)?,
                records_chunk(PBAG, &preset_hydra.bags)?,
                records_chunk(PMOD, &preset_hydra.modulators)?,
                records_chunk(PGEN, &preset_hydra.generators)?,
                records_chunk(INST, &instrument_headers)?,
                records_chunk(IBAG, &instrument_hydra.bags)?,
                records_chunk(IMOD, &instrument_hydra.modulators)?,
                records_chunk(IGEN, &instrument_hydra.generators)?,
                records_chunk(SHDR, &samples)?,
            ],
        );
        let root = RawChunk::list(
            FourCc::RIFF,
            Some(SFBK),
            vec![self.info.clone(), self.sample_data.clone(), pdta],
        );
        RiffWriter::default().write(&root)
    }

    /// Maps one preset to the model: one group per instrument zone of the
    /// preset, one model zone per sample zone of that instrument.
    pub fn to_multisample(
        &self,
        preset_index: usize,
        provider: &dyn SampleDataProvider,
    ) -> Result<MultisampleSource> {
        let preset = self.presets.get(preset_index).ok_or(FormatError::UnresolvedReference {
            what: "preset",
            index: preset_index,
            available: self.presets.len(),
        })?;
        let mut source = MultisampleSource::new(preset.name.clone());

        let (preset_global, preset_zones) = split_global(&preset.zones, |z| z.instrument);
        let preset_global = preset_global.map(|z| z.generators(&self.preset_generators));
        for preset_zone in preset_zones {
            let index = preset_zone.instrument.unwrap_or_default();
            let instrument = self.instruments.get(index).ok_or(FormatError::UnresolvedReference {
                what: "instrument",
                index,
                available: self.instruments.len(),
            })?;
            let mut group = Group::new(instrument.name.clone());
            let (instrument_global, instrument_zones) = split_global(&instrument.zones, |z| z.sample);
            let instrument_global = instrument_global.map(|z| z.generators(&self.instrument_generators));
            for instrument_zone in instrument_zones {
                let index = instrument_zone.sample.unwrap_or_default();
                let sample = self.samples.get(index).ok_or(FormatError::UnresolvedReference {
                    what: "sample",
                    index,
                    available: self.samples.len(),
                })?;
                let stack = GeneratorStack {
                    preset_global,
                    preset: preset_zone.generators(&self.preset_generators),
                    instrument_global,
                    instrument: instrument_zone.generators(&self.instrument_generators),
                };
                let Some(mut zone) = stack.to_sample_zone(sample) else {
                    debug!("Skipping zone of '{}' outside the preset ranges", instrument.name);
                    continue;
                };
                provider.add_zone_data(&mut zone, false, false)?;
                group.zones.push(zone);
            }
            source.groups.push(group);
        }
        provider.add_metadata(&mut source.metadata)?;
        Ok(source)
    }
}
