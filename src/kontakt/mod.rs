//! Kontakt instrument files (`.nki`, `.nkm`, ...).
//!
//! Reading follows the header version:
//!
//! * Kontakt 2: header, ZLIB compressed XML body, optional soundinfo. See
//!   [`xml`] for the elements mapped to the model.
//! * Kontakt 4.2: header, CRC32 check of the compressed body (a mismatch is
//!   only reported), FastLZ compressed preset chunk tree, optional soundinfo.
//!
//! Monoliths wrap either variant in a dictionary; see [`monolith`].

pub mod header;
pub mod monolith;
pub mod preset_chunk;
pub mod program;
pub mod soundinfo;
pub mod xml;
pub mod zone;

use log::{debug, warn};

use crate::compression::{crc32, deflate_zlib, fastlz, inflate_zlib, verify_crc32};
use crate::config::DecodeOptions;
use crate::error::{FormatError, Result};
use crate::model::{
    linear_to_db, Group, MultisampleSource, SampleDataProvider, SampleInfo, SampleZone, TriggerType,
};
use crate::notify::{LogNotifier, Notifier};
use crate::stream::ByteReader;

use header::{HEADER_LENGTH, VERSION_KONTAKT_2, VERSION_KONTAKT_42};

pub use header::{BodyEncoding, KontaktHeader, PatchType};
pub use monolith::{Dictionary, DictionaryItem, Monolith, ReferenceType};
pub use preset_chunk::{ChunkId, PresetChunk};
pub use program::{Program, VoiceGroup};
pub use soundinfo::SoundInfo;
pub use zone::{FilenameList, Zone, ZoneLoop};

/// How zone, group and program tuning combine. Both variants reproduce
/// what the respective Kontakt versions store and must not be unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneFormula {
    /// Kontakt 2 XML: all three values are linear pitch factors.
    K2Tag,
    /// Preset chunk trees: only the zone value is a linear factor.
    PresetChunk,
}

impl TuneFormula {
    /// Combined tuning in semitones.
    pub fn combine(self, zone: f64, group: f64, program: f64) -> f64 {
        match self {
            TuneFormula::K2Tag => 0.12 * (zone * group * program).log2(),
            TuneFormula::PresetChunk => {
                let semitones = 12.0 * (zone.log2() + group + program);
                (semitones * 100_000.0).round() / 100_000.0
            }
        }
    }
}

/// Program, groups, zones and sample paths of either body variant. Zones
/// index `groups` and `paths`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub program: Program,
    pub groups: Vec<VoiceGroup>,
    pub zones: Vec<Zone>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KontaktBody {
    Xml(String),
    PresetChunks(Vec<PresetChunk>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KontaktFile {
    pub header: KontaktHeader,
    pub body: KontaktBody,
    pub sound_info: Option<SoundInfo>,
    pub monolith: Option<Monolith>,
}

impl KontaktFile {
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with(data, &DecodeOptions::default(), &LogNotifier::new())
    }

    pub fn read_with(data: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<Self> {
        if Monolith::is_monolith(data) {
            let monolith = Monolith::read(data)?;
            let mut file = Self::read_instrument(monolith.nki_bytes(data), options, notifier)?;
            file.monolith = Some(monolith);
            return Ok(file);
        }
        Self::read_instrument(data, options, notifier)
    }

    fn read_instrument(data: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = KontaktHeader::read(&mut reader)?;
        let encoding = header.body_encoding()?;
        let compressed = reader.bytes(header.body_length as usize)?;

        let body = match encoding {
            BodyEncoding::ZlibXml => {
                let xml = inflate_zlib(compressed)?;
                KontaktBody::Xml(String::from_utf8(xml).map_err(|e| {
                    FormatError::InvalidData(format!("Kontakt XML is not UTF-8: {e}"))
                })?)
            }
            BodyEncoding::FastLzPresetChunks => {
                if options.verify_checksums {
                    verify_crc32(compressed, header.checksum, "Kontakt preset body", notifier);
                }
                let tree = fastlz::decompress(compressed, header.decompressed_length as usize)?;
                KontaktBody::PresetChunks(PresetChunk::parse_all(&tree, notifier)?)
            }
        };

        let sound_info = SoundInfo::read(reader.rest())?;
        debug!(
            "Read Kontakt file (header 0x{:04X}, {:?}, soundinfo: {})",
            header.header_version,
            encoding,
            sound_info.is_some()
        );
        Ok(Self {
            header,
            body,
            sound_info,
            monolith: None,
        })
    }

    /// Writes a Kontakt 2 file with a ZLIB (level 1) compressed XML body.
    pub fn write_xml(xml: &str, header: &KontaktHeader) -> Result<Vec<u8>> {
        let compressed = deflate_zlib(xml.as_bytes())?;
        let header = KontaktHeader {
            body_length: compressed.len() as u32,
            header_version: VERSION_KONTAKT_2,
            checksum: 0,
            decompressed_length: xml.len() as u32,
            ..*header
        };
        let mut out = Vec::with_capacity(HEADER_LENGTH + compressed.len());
        header.write(&mut out)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Writes a Kontakt 4.2 file with a FastLZ compressed preset chunk tree
    /// and its CRC32.
    pub fn write_preset(chunks: &[PresetChunk], header: &KontaktHeader) -> Result<Vec<u8>> {
        let tree = PresetChunk::write_all(chunks)?;
        let compressed = fastlz::compress(&tree);
        let header = KontaktHeader {
            body_length: compressed.len() as u32,
            header_version: header.header_version.max(VERSION_KONTAKT_42),
            checksum: crc32(&compressed),
            decompressed_length: tree.len() as u32,
            ..*header
        };
        let mut out = Vec::with_capacity(HEADER_LENGTH + compressed.len());
        header.write(&mut out)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Writes the file back, soundinfo included. Monolith wrappers are not
    /// written; only the embedded instrument is.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut out = match &self.body {
            KontaktBody::Xml(xml) => Self::write_xml(xml, &self.header)?,
            KontaktBody::PresetChunks(chunks) => Self::write_preset(chunks, &self.header)?,
        };
        if let Some(info) = &self.sound_info {
            info.write(&mut out)?;
        }
        Ok(out)
    }

    pub fn tune_formula(&self) -> TuneFormula {
        match self.body {
            KontaktBody::Xml(_) => TuneFormula::K2Tag,
            KontaktBody::PresetChunks(_) => TuneFormula::PresetChunk,
        }
    }

    /// Decoded instrument settings of a preset chunk body.
    pub fn program(&self) -> Result<Program> {
        Program::from_chunk(self.program_chunk()?)
    }

    fn program_chunk(&self) -> Result<&PresetChunk> {
        let KontaktBody::PresetChunks(chunks) = &self.body else {
            return Err(FormatError::InvalidData(
                "Kontakt 2 XML bodies carry no preset chunks".to_string(),
            ));
        };
        preset_chunk::find_in(chunks, ChunkId::Program).ok_or_else(|| FormatError::UnexpectedTag {
            expected: ChunkId::Program.to_string(),
            found: chunks.first().map(|c| c.id.to_string()).unwrap_or_default(),
        })
    }

    fn preset_instrument(&self) -> Result<Instrument> {
        let program_chunk = self.program_chunk()?;
        let program = Program::from_chunk(program_chunk)?;
        let groups = program_chunk
            .find(ChunkId::GroupList)
            .map(|list| {
                list.children_of(ChunkId::VoiceGroup)
                    .map(VoiceGroup::from_chunk)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let zones = program_chunk
            .find(ChunkId::ZoneList)
            .map(|list| {
                list.children_of(ChunkId::Zone)
                    .map(Zone::from_chunk)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let paths = program_chunk
            .find(ChunkId::FilenameListEx)
            .or_else(|| program_chunk.find(ChunkId::FilenameList))
            .map(FilenameList::from_chunk)
            .transpose()?
            .map(|list| list.paths())
            .unwrap_or_default();
        Ok(Instrument {
            program,
            groups,
            zones,
            paths,
        })
    }

    /// Program, groups and zones of the body, whichever variant it is.
    pub fn instrument(&self) -> Result<Instrument> {
        match &self.body {
            KontaktBody::Xml(xml) => xml::parse_instrument(xml),
            KontaktBody::PresetChunks(_) => self.preset_instrument(),
        }
    }

    /// Builds the multisample model. Zones whose group index is negative or
    /// past the group list go to one extra group with default settings.
    pub fn to_multisample(&self, name: &str, provider: &dyn SampleDataProvider) -> Result<MultisampleSource> {
        let Instrument {
            program,
            groups: voice_groups,
            zones,
            paths,
        } = self.instrument()?;
        let formula = self.tune_formula();

        let mut source = MultisampleSource::new(if program.name.is_empty() { name } else { program.name.as_str() });
        source.metadata.creator = program.author.clone();
        source.metadata.url = program.url.clone();
        if matches!(self.body, KontaktBody::PresetChunks(_)) {
            source.metadata.category = program.icon_name().map(str::to_string);
        }
        source.metadata.creation_time = Some(self.header.creation_time());
        if let Some(info) = &self.sound_info {
            source.metadata.description = info.element("description");
            if source.metadata.creator.is_none() {
                source.metadata.creator = info.element("author");
            }
        }
        provider.add_metadata(&mut source.metadata)?;

        let default_group = VoiceGroup::default();
        let mut groups: Vec<Group> = voice_groups
            .iter()
            .enumerate()
            .map(|(i, vg)| Group {
                name: if vg.name.is_empty() { format!("Group {}", i + 1) } else { vg.name.clone() },
                trigger: if vg.release_trigger { TriggerType::Release } else { TriggerType::Attack },
                zones: Vec::new(),
            })
            .collect();
        let mut fallback = None;

        for zone in &zones {
            let file_index = usize::try_from(zone.filename_id).unwrap_or(usize::MAX);
            let Some(path) = paths.get(file_index) else {
                return Err(FormatError::UnresolvedReference {
                    what: "file",
                    index: file_index,
                    available: paths.len(),
                });
            };
            let (slot, voice_group) = match usize::try_from(zone.group_index)
                .ok()
                .filter(|&i| i < voice_groups.len())
            {
                Some(i) => (i, &voice_groups[i]),
                None => {
                    if !voice_groups.is_empty() {
                        warn!("Zone '{path}' has no group {}, using defaults", zone.group_index);
                    }
                    let slot = *fallback.get_or_insert_with(|| {
                        groups.push(Group::new(format!("Group {}", groups.len() + 1)));
                        groups.len() - 1
                    });
                    (slot, &default_group)
                }
            };
            let mut sample_zone = to_sample_zone(zone, voice_group, &program, path, formula);
            provider.add_zone_data(&mut sample_zone, false, false)?;
            groups[slot].zones.push(sample_zone);
        }

        source.groups = groups.into_iter().filter(|g| !g.zones.is_empty()).collect();
        Ok(source)
    }
}

fn to_key(value: u16) -> u8 {
    value.min(127) as u8
}

fn to_sample_zone(zone: &Zone, group: &VoiceGroup, program: &Program, path: &str, formula: TuneFormula) -> SampleZone {
    let name = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.').map(|(stem, _)| stem).or(Some(file)))
        .unwrap_or(path)
        .to_string();
    SampleZone {
        name,
        sample_path: Some(path.to_string()),
        key_low: to_key(zone.low_key),
        key_high: to_key(zone.high_key),
        key_root: Some(to_key(zone.root_key)),
        velocity_low: to_key(zone.low_velocity),
        velocity_high: to_key(zone.high_velocity),
        note_crossfade_low: to_key(zone.fade_low_key),
        note_crossfade_high: to_key(zone.fade_high_key),
        velocity_crossfade_low: to_key(zone.fade_low_velocity),
        velocity_crossfade_high: to_key(zone.fade_high_velocity),
        start: zone.sample_start.max(0) as u32,
        stop: zone.stop(),
        gain: linear_to_db(f64::from(program.volume)) + linear_to_db(f64::from(zone.volume)),
        panorama: (f64::from(program.pan) + f64::from(zone.pan)).clamp(-1.0, 1.0),
        tune: match formula {
            TuneFormula::K2Tag => formula.combine(
                f64::from(zone.tune),
                f64::from(group.tune),
                f64::from(program.tune),
            ),
            TuneFormula::PresetChunk => formula.combine(
                f64::from(zone.tune),
                f64::from(group.tune.max(f32::MIN_POSITIVE).log2()),
                f64::from(program.tune.max(f32::MIN_POSITIVE).log2()),
            ),
        },
        key_tracking: if group.key_tracking { 1.0 } else { 0.0 },
        reversed: group.reverse,
        loops: zone
            .loops
            .iter()
            .filter(|l| l.is_enabled())
            .map(ZoneLoop::to_sample_loop)
            .collect(),
        sample_info: (zone.num_frames > 0).then_some(SampleInfo {
            sample_rate: zone.sample_rate,
            frames: zone.num_frames,
            channels: 0,
        }),
        ..SampleZone::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoSampleData;
    use crate::notify::CollectingNotifier;
    use crate::kontakt::zone::PathSegment;

    fn preset_tree_with(group: VoiceGroup, zones: Vec<Zone>) -> Vec<PresetChunk> {
        let program = Program {
            name: "Strings".to_string(),
            volume: 0.5,
            pan: 0.5,
            author: Some("Tester".to_string()),
            url: Some("(null)".to_string()),
            ..Program::default()
        };
        let files = FilenameList {
            version: Some(1),
            entries: vec![vec![
                PathSegment { kind: 1, text: "Samples".to_string() },
                PathSegment { kind: 3, text: "Violin C2.wav".to_string() },
            ]],
        };
        let zones = zones.iter().map(|z| z.to_chunk(0x9A)).collect::<Result<Vec<_>>>().unwrap();
        vec![
            program
                .to_chunk(
                    0xA5,
                    vec![
                        PresetChunk::structured(
                            ChunkId::GroupList,
                            0,
                            Vec::new(),
                            vec![PresetChunk::structured(ChunkId::VoiceGroup, 0x60, group.encode().unwrap(), Vec::new())],
                        ),
                        PresetChunk::structured(ChunkId::ZoneList, 0, Vec::new(), zones),
                        files.to_chunk(0).unwrap(),
                    ],
                )
                .unwrap(),
        ]
    }

    fn preset_tree(filename_id: i32) -> Vec<PresetChunk> {
        let group = VoiceGroup { name: "Sustain".to_string(), ..VoiceGroup::default() };
        let zone = Zone {
            low_key: 36,
            high_key: 59,
            root_key: 48,
            volume: 0.5,
            pan: 0.75,
            tune: 2.0,
            filename_id,
            num_frames: 1000,
            sample_end: 10,
            ..Zone::default()
        };
        preset_tree_with(group, vec![zone])
    }

    #[test]
    fn test_tune_formulas_differ() {
        assert_eq!(TuneFormula::K2Tag.combine(1.0, 1.0, 1.0), 0.0);
        assert!((TuneFormula::K2Tag.combine(2.0, 1.0, 1.0) - 0.12).abs() < 1e-12);
        assert_eq!(TuneFormula::PresetChunk.combine(2.0, 0.0, 0.0), 12.0);
        assert_eq!(TuneFormula::PresetChunk.combine(1.5, 0.0, 0.0), 7.01955);
        assert_eq!(TuneFormula::PresetChunk.combine(1.0, 0.5, 0.25), 9.0);
    }

    #[test]
    fn test_preset_round_trip_and_model() {
        let bytes = KontaktFile::write_preset(&preset_tree(0), &KontaktHeader::default()).unwrap();
        let notifier = CollectingNotifier::new();
        let file = KontaktFile::read_with(&bytes, &DecodeOptions::default(), &notifier).unwrap();
        assert!(notifier.messages().is_empty());
        assert_eq!(file.body, KontaktBody::PresetChunks(preset_tree(0)));
        assert_eq!(file.tune_formula(), TuneFormula::PresetChunk);
        assert_eq!(file.write().unwrap(), bytes);

        let source = file.to_multisample("fallback", &NoSampleData).unwrap();
        assert_eq!(source.name, "Strings");
        assert_eq!(source.metadata.creator.as_deref(), Some("Tester"));
        assert_eq!(source.metadata.url, None);
        assert_eq!(source.groups.len(), 1);
        assert_eq!(source.groups[0].name, "Sustain");

        let zone = &source.groups[0].zones[0];
        assert_eq!(zone.name, "Violin C2");
        assert_eq!(zone.sample_path.as_deref(), Some("Samples/Violin C2.wav"));
        assert_eq!((zone.key_low, zone.key_high, zone.key_root), (36, 59, Some(48)));
        assert_eq!(zone.stop, Some(990));
        assert!((zone.gain + 12.0412).abs() < 1e-3);
        assert_eq!(zone.panorama, 1.0);
        assert_eq!(zone.tune, 12.0);
    }

    #[test]
    fn test_bad_filename_reference() {
        let bytes = KontaktFile::write_preset(&preset_tree(4), &KontaktHeader::default()).unwrap();
        let file = KontaktFile::read(&bytes).unwrap();
        assert!(matches!(
            file.to_multisample("x", &NoSampleData),
            Err(FormatError::UnresolvedReference { what: "file", index: 4, available: 1 })
        ));
    }

    #[test]
    fn test_checksum_mismatch_is_reported_not_fatal() {
        let mut bytes = KontaktFile::write_preset(&preset_tree(0), &KontaktHeader::default()).unwrap();
        bytes[0x22] ^= 0xFF;
        let notifier = CollectingNotifier::new();
        let file = KontaktFile::read_with(&bytes, &DecodeOptions::default(), &notifier).unwrap();
        assert!(matches!(file.body, KontaktBody::PresetChunks(_)));
        assert_eq!(notifier.messages().len(), 1);

        let quiet = CollectingNotifier::new();
        let options = DecodeOptions { verify_checksums: false, ..DecodeOptions::default() };
        KontaktFile::read_with(&bytes, &options, &quiet).unwrap();
        assert!(quiet.messages().is_empty());
    }

    #[test]
    fn test_program_version_gate() {
        let mut tree = preset_tree(0);
        tree[0].version = 0xB0;
        let bytes = KontaktFile::write_preset(&tree, &KontaktHeader::default()).unwrap();
        let file = KontaktFile::read(&bytes).unwrap();
        assert!(matches!(
            file.program(),
            Err(FormatError::UnsupportedVersion { found: 0xB0, .. })
        ));
    }

    #[test]
    fn test_kontakt2_xml_with_soundinfo() {
        let xml = "<K2_Container><K2_Program name=\"Pad\"/></K2_Container>";
        let mut bytes = KontaktFile::write_xml(xml, &KontaktHeader::default()).unwrap();
        assert_eq!(&bytes[8..10], &0x0100u16.to_le_bytes());
        let info = SoundInfo {
            version: 1,
            xml: "<soundinfo><author>Someone</author></soundinfo>".to_string(),
        };
        info.write(&mut bytes).unwrap();

        let file = KontaktFile::read(&bytes).unwrap();
        assert_eq!(file.body, KontaktBody::Xml(xml.to_string()));
        assert_eq!(file.tune_formula(), TuneFormula::K2Tag);
        assert_eq!(file.sound_info, Some(info));
        assert!(file.program().is_err());
        assert_eq!(file.write().unwrap(), bytes);
    }

    #[test]
    fn test_truncated_body_fails() {
        let bytes = KontaktFile::write_preset(&preset_tree(0), &KontaktHeader::default()).unwrap();
        assert!(matches!(
            KontaktFile::read(&bytes[..bytes.len() - 3]),
            Err(FormatError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_monolith_wraps_instrument() {
        let nki = KontaktFile::write_preset(&preset_tree(0), &KontaktHeader::default()).unwrap();
        let placeholder = Dictionary {
            version: 1,
            items: vec![DictionaryItem { kind: ReferenceType::Nki, offset: 0, name: "Strings.nki".to_string() }],
        };
        let mut sized = Vec::new();
        placeholder.write(&mut sized).unwrap();

        let mut data = Vec::new();
        Dictionary {
            version: 1,
            items: vec![DictionaryItem {
                kind: ReferenceType::Nki,
                offset: sized.len() as u64,
                name: "Strings.nki".to_string(),
            }],
        }
        .write(&mut data)
        .unwrap();
        data.extend_from_slice(&nki);

        let file = KontaktFile::read(&data).unwrap();
        assert!(file.monolith.is_some());
        assert_eq!(file.program().unwrap().name, "Strings");
    }

    #[test]
    fn test_unknown_group_index_uses_fallback_group() {
        // group tune 2.0 adds an octave to zones that resolve the group
        let group = VoiceGroup { name: "Sustain".to_string(), tune: 2.0, ..VoiceGroup::default() };
        let zones = vec![
            Zone { group_index: 0, low_key: 10, ..Zone::default() },
            Zone { group_index: -1, low_key: 20, ..Zone::default() },
            Zone { group_index: 7, low_key: 30, ..Zone::default() },
        ];
        let bytes = KontaktFile::write_preset(&preset_tree_with(group, zones), &KontaktHeader::default()).unwrap();
        let source = KontaktFile::read(&bytes).unwrap().to_multisample("x", &NoSampleData).unwrap();

        assert_eq!(source.groups.len(), 2);
        assert_eq!(source.groups[0].name, "Sustain");
        assert_eq!(source.groups[0].zones.len(), 1);
        assert_eq!(source.groups[0].zones[0].tune, 12.0);

        let fallback = &source.groups[1];
        assert_eq!(fallback.name, "Group 2");
        let keys: Vec<u8> = fallback.zones.iter().map(|z| z.key_low).collect();
        assert_eq!(keys, vec![20, 30]);
        assert!(fallback.zones.iter().all(|z| z.tune == 0.0));
    }

    #[test]
    fn test_kontakt2_xml_to_multisample() {
        let xml = r#"<K2_Container><K2_Program name="Pad" volume="0.5">
            <K2_Group name="Layer" tune="1.0">
              <K2_Zone lowKey="40" highKey="52" rootKey="45" lowVelocity="1" tune="2.0"><Sample file="Samples/Pad A2.wav"/></K2_Zone>
            </K2_Group>
            <K2_Zone tune="1.0" file="Samples/Pad A3.wav"/>
            </K2_Program></K2_Container>"#;
        let bytes = KontaktFile::write_xml(xml, &KontaktHeader::default()).unwrap();
        let file = KontaktFile::read(&bytes).unwrap();
        assert_eq!(file.tune_formula(), TuneFormula::K2Tag);

        let source = file.to_multisample("fallback", &NoSampleData).unwrap();
        assert_eq!(source.name, "Pad");
        assert_eq!(source.metadata.category, None);
        assert_eq!(source.groups.len(), 2);
        assert_eq!(source.groups[0].name, "Layer");

        let zone = &source.groups[0].zones[0];
        assert_eq!(zone.name, "Pad A2");
        assert_eq!(zone.sample_path.as_deref(), Some("Samples/Pad A2.wav"));
        assert_eq!((zone.key_low, zone.key_high, zone.key_root), (40, 52, Some(45)));
        assert!((zone.tune - 0.12).abs() < 1e-12);
        assert!((zone.gain + 6.0206).abs() < 1e-3);

        let ungrouped = &source.groups[1].zones[0];
        assert_eq!(ungrouped.sample_path.as_deref(), Some("Samples/Pad A3.wav"));
        assert_eq!(ungrouped.tune, 0.0);
    }
}
