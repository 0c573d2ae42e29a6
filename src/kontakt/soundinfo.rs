use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{FormatError, Result};
use crate::stream::{write_u32, ByteReader, Endian};

/// Library metadata appended after the compressed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundInfo {
    pub version: u32,
    pub xml: String,
}

impl SoundInfo {
    /// Reads the trailing block. Fewer than 8 bytes means there is none.
    pub fn read(trailer: &[u8]) -> Result<Option<Self>> {
        if trailer.len() < 8 {
            return Ok(None);
        }
        let mut r = ByteReader::new(trailer);
        let version = r.u32(Endian::Little)?;
        let length = r.u32(Endian::Little)? as usize;
        let xml = String::from_utf8(r.bytes(length)?.to_vec())
            .map_err(|e| FormatError::InvalidData(format!("soundinfo is not UTF-8: {e}")))?;
        Ok(Some(Self { version, xml }))
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.version, Endian::Little)?;
        write_u32(out, self.xml.len() as u32, Endian::Little)?;
        out.extend_from_slice(self.xml.as_bytes());
        Ok(())
    }

    /// Text of the first `<name>` element with entities and CDATA
    /// sections decoded. Attributes on the element are ignored; malformed XML
    /// yields `None`.
    pub fn element(&self, name: &str) -> Option<String> {
        let mut reader = Reader::from_str(&self.xml);
        let mut inside = false;
        let mut text = String::new();
        loop {
            match reader.read_event().ok()? {
                Event::Start(e) if !inside && e.name().as_ref() == name.as_bytes() => inside = true,
                Event::Text(t) if inside => text.push_str(&t.unescape().ok()?),
                Event::CData(c) if inside => text.push_str(&String::from_utf8_lossy(&c)),
                Event::End(e) if inside && e.name().as_ref() == name.as_bytes() => break,
                Event::Eof => return None,
                _ => {}
            }
        }
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<soundinfo version=\"400\"><properties><name>Felt Piano</name>\
        <author lang=\"en\">Tom &amp; Jerry &lt;3</author><url></url>\
        <description><![CDATA[Soft <felt> piano]]></description></properties></soundinfo>";

    #[test]
    fn test_read_and_extract_elements() {
        let mut bytes = Vec::new();
        SoundInfo { version: 1, xml: XML.to_string() }.write(&mut bytes).unwrap();
        let info = SoundInfo::read(&bytes).unwrap().unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.element("name").as_deref(), Some("Felt Piano"));
        assert_eq!(info.element("author").as_deref(), Some("Tom & Jerry <3"));
        assert_eq!(info.element("description").as_deref(), Some("Soft <felt> piano"));
        assert_eq!(info.element("url"), None);
        assert_eq!(info.element("missing"), None);

        let broken = SoundInfo { version: 1, xml: "<name>Open".to_string() };
        assert_eq!(broken.element("name"), None);
    }

    #[test]
    fn test_short_trailer_is_no_soundinfo() {
        assert_eq!(SoundInfo::read(&[0; 7]).unwrap(), None);
        assert_eq!(SoundInfo::read(&[]).unwrap(), None);
    }

    #[test]
    fn test_declared_length_past_end_fails() {
        let mut bytes = Vec::new();
        SoundInfo { version: 1, xml: "<a/>".to_string() }.write(&mut bytes).unwrap();
        bytes.pop();
        assert!(matches!(SoundInfo::read(&bytes), Err(FormatError::TruncatedInput { .. })));
    }
}
