//! Kontakt 2 XML bodies.
//!
//! Only the elements the model needs are read: `K2_Program`, `K2_Group`,
//! `K2_Zone` and the `Sample` element inside a zone. Everything is taken from
//! attributes. A zone belongs to the group named by its `groupIdx` attribute,
//! else to the `K2_Group` it is nested in; zones with neither keep group
//! index -1. Tune, volume and pan values are linear factors as stored.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{FormatError, Result};

use super::program::{Program, VoiceGroup};
use super::zone::Zone;
use super::Instrument;

const PROGRAM: &[u8] = b"K2_Program";
const GROUP: &[u8] = b"K2_Group";
const ZONE: &[u8] = b"K2_Zone";
const SAMPLE: &[u8] = b"Sample";

fn xml_error(e: impl std::fmt::Display) -> FormatError {
    FormatError::InvalidData(format!("Kontakt XML: {e}"))
}

/// Unescaped attributes of one start tag.
struct Attributes(Vec<(String, String)>);

impl Attributes {
    fn read(element: &BytesStart<'_>) -> Result<Self> {
        element
            .attributes()
            .map(|attribute| {
                let attribute = attribute.map_err(xml_error)?;
                let value = attribute.unescape_value().map_err(xml_error)?;
                Ok((
                    String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                    value.into_owned(),
                ))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.text(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| xml_error(format!("bad value '{value}' for '{key}'"))),
        }
    }
}

fn read_program(attributes: &Attributes) -> Result<Program> {
    let defaults = Program::default();
    Ok(Program {
        name: attributes.text("name").unwrap_or_default().to_string(),
        volume: attributes.number("volume", defaults.volume)?,
        pan: attributes.number("pan", defaults.pan)?,
        tune: attributes.number("tune", defaults.tune)?,
        ..defaults
    })
}

fn read_group(attributes: &Attributes) -> Result<VoiceGroup> {
    let defaults = VoiceGroup::default();
    Ok(VoiceGroup {
        name: attributes.text("name").unwrap_or_default().to_string(),
        volume: attributes.number("volume", defaults.volume)?,
        pan: attributes.number("pan", defaults.pan)?,
        tune: attributes.number("tune", defaults.tune)?,
        ..defaults
    })
}

fn read_zone(attributes: &Attributes, enclosing_group: Option<usize>) -> Result<Zone> {
    let defaults = Zone::default();
    let group_index = match enclosing_group {
        Some(index) => i32::try_from(index).unwrap_or(-1),
        None => -1,
    };
    Ok(Zone {
        low_key: attributes.number("lowKey", defaults.low_key)?,
        high_key: attributes.number("highKey", defaults.high_key)?,
        root_key: attributes.number("rootKey", defaults.root_key)?,
        low_velocity: attributes.number("lowVelocity", defaults.low_velocity)?,
        high_velocity: attributes.number("highVelocity", defaults.high_velocity)?,
        sample_start: attributes.number("sampleStart", defaults.sample_start)?,
        volume: attributes.number("volume", defaults.volume)?,
        pan: attributes.number("pan", defaults.pan)?,
        tune: attributes.number("tune", defaults.tune)?,
        group_index: attributes.number("groupIdx", group_index)?,
        filename_id: -1,
        ..defaults
    })
}

/// Index of `path` in the shared table, added if new.
fn intern(paths: &mut Vec<String>, path: &str) -> i32 {
    let index = match paths.iter().position(|p| p == path) {
        Some(index) => index,
        None => {
            paths.push(path.to_string());
            paths.len() - 1
        }
    };
    i32::try_from(index).unwrap_or(-1)
}

pub fn parse_instrument(xml: &str) -> Result<Instrument> {
    let mut reader = Reader::from_str(xml);
    let mut program = None;
    let mut groups = Vec::new();
    let mut zones: Vec<Zone> = Vec::new();
    let mut paths = Vec::new();
    let mut open_group = None;
    let mut open_zone = None;

    loop {
        let (element, has_children) = match reader.read_event().map_err(xml_error)? {
            Event::Start(element) => (element, true),
            Event::Empty(element) => (element, false),
            Event::End(element) => {
                match element.name().as_ref() {
                    GROUP => open_group = None,
                    ZONE => open_zone = None,
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        match element.name().as_ref() {
            PROGRAM if program.is_none() => {
                program = Some(read_program(&Attributes::read(&element)?)?);
            }
            GROUP => {
                groups.push(read_group(&Attributes::read(&element)?)?);
                if has_children {
                    open_group = Some(groups.len() - 1);
                }
            }
            ZONE => {
                let attributes = Attributes::read(&element)?;
                let mut zone = read_zone(&attributes, open_group)?;
                if let Some(file) = attributes.text("file") {
                    zone.filename_id = intern(&mut paths, file);
                }
                zones.push(zone);
                if has_children {
                    open_zone = Some(zones.len() - 1);
                }
            }
            SAMPLE => {
                let attributes = Attributes::read(&element)?;
                if let (Some(index), Some(file)) = (open_zone, attributes.text("file")) {
                    zones[index].filename_id = intern(&mut paths, file);
                }
            }
            _ => {}
        }
    }

    let program = program.ok_or_else(|| xml_error("no K2_Program element"))?;
    Ok(Instrument {
        program,
        groups,
        zones,
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<K2_Container>
  <K2_Program name="Keys &amp; Pads" volume="0.5" tune="1.0">
    <K2_Group name="Soft" tune="2.0">
      <K2_Zone lowKey="36" highKey="59" rootKey="48" tune="2.0">
        <Sample file="Samples/Soft C2.wav"/>
      </K2_Zone>
    </K2_Group>
    <K2_Group name="Hard"/>
    <K2_Zone groupIdx="1" lowVelocity="100" file="Samples/Hard C2.wav"/>
    <K2_Zone file="Samples/Soft C2.wav"/>
  </K2_Program>
</K2_Container>"#;

    #[test]
    fn test_parse_instrument() {
        let instrument = parse_instrument(XML).unwrap();
        assert_eq!(instrument.program.name, "Keys & Pads");
        assert_eq!(instrument.program.volume, 0.5);
        assert_eq!(instrument.groups.len(), 2);
        assert_eq!(instrument.groups[0].name, "Soft");
        assert_eq!(instrument.groups[0].tune, 2.0);
        assert_eq!(instrument.groups[1].tune, 1.0);
        assert_eq!(instrument.paths, vec!["Samples/Soft C2.wav", "Samples/Hard C2.wav"]);

        let zones = &instrument.zones;
        assert_eq!(zones.len(), 3);
        assert_eq!((zones[0].low_key, zones[0].high_key, zones[0].root_key), (36, 59, 48));
        assert_eq!((zones[0].group_index, zones[0].filename_id), (0, 0));
        assert_eq!(zones[0].tune, 2.0);
        assert_eq!((zones[1].group_index, zones[1].filename_id), (1, 1));
        assert_eq!(zones[1].low_velocity, 100);
        // outside any group
        assert_eq!((zones[2].group_index, zones[2].filename_id), (-1, 0));
    }

    #[test]
    fn test_missing_program_fails() {
        assert!(matches!(
            parse_instrument("<K2_Container/>"),
            Err(FormatError::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_number_fails() {
        let xml = r#"<K2_Program name="x"><K2_Zone lowKey="low"/></K2_Program>"#;
        assert!(matches!(parse_instrument(xml), Err(FormatError::InvalidData(_))));
    }
}
