//! Format detection and one-call decoding.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::akai::{AkmFile, AkpFile};
use crate::config::DecodeOptions;
use crate::disting::{self, DistingPreset};
use crate::error::{FormatError, Result};
use crate::kontakt::{self, KontaktFile, Monolith};
use crate::model::{MultisampleSource, SampleDataProvider};
use crate::notify::Notifier;
use crate::sf2::Sf2File;
use crate::ysfc::{self, YsfcFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    AkaiProgram,
    AkaiMulti,
    SoundFont2,
    Kontakt,
    KontaktMonolith,
    Ysfc,
    Disting,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::AkaiProgram => "Akai program",
            FormatKind::AkaiMulti => "Akai multi",
            FormatKind::SoundFont2 => "SoundFont 2",
            FormatKind::Kontakt => "Kontakt instrument",
            FormatKind::KontaktMonolith => "Kontakt monolith",
            FormatKind::Ysfc => "Yamaha YSFC",
            FormatKind::Disting => "Disting EX preset",
        };
        f.write_str(name)
    }
}

/// Identifies a file by its leading magic bytes.
pub fn detect(bytes: &[u8]) -> Option<FormatKind> {
    if bytes.starts_with(b"RIFF") {
        return match bytes.get(8..12)? {
            b"APRG" => Some(FormatKind::AkaiProgram),
            b"AMLT" => Some(FormatKind::AkaiMulti),
            b"sfbk" => Some(FormatKind::SoundFont2),
            _ => None,
        };
    }
    if bytes.starts_with(&kontakt::header::MAGIC) {
        Some(FormatKind::Kontakt)
    } else if Monolith::is_monolith(bytes) {
        Some(FormatKind::KontaktMonolith)
    } else if bytes.starts_with(ysfc::MAGIC) {
        Some(FormatKind::Ysfc)
    } else if bytes.starts_with(disting::MAGIC) {
        Some(FormatKind::Disting)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFile {
    AkaiProgram(AkpFile),
    AkaiMulti(AkmFile),
    SoundFont2(Sf2File),
    Kontakt(KontaktFile),
    Ysfc(YsfcFile),
    Disting(DistingPreset),
}

impl DecodedFile {
    pub fn kind(&self) -> FormatKind {
        match self {
            DecodedFile::AkaiProgram(_) => FormatKind::AkaiProgram,
            DecodedFile::AkaiMulti(_) => FormatKind::AkaiMulti,
            DecodedFile::SoundFont2(_) => FormatKind::SoundFont2,
            DecodedFile::Kontakt(file) if file.monolith.is_some() => FormatKind::KontaktMonolith,
            DecodedFile::Kontakt(_) => FormatKind::Kontakt,
            DecodedFile::Ysfc(_) => FormatKind::Ysfc,
            DecodedFile::Disting(_) => FormatKind::Disting,
        }
    }

    /// One line description for reports.
    pub fn summary(&self) -> String {
        match self {
            DecodedFile::AkaiProgram(file) => format!("{} keygroups", file.keygroups.len()),
            DecodedFile::AkaiMulti(file) => format!("{} parts", file.parts.len()),
            DecodedFile::SoundFont2(file) => format!(
                "{} presets, {} instruments, {} samples",
                file.presets.len(),
                file.instruments.len(),
                file.samples.len()
            ),
            DecodedFile::Kontakt(file) => match &file.monolith {
                Some(monolith) => format!(
                    "header 0x{:04X}, {} embedded samples",
                    file.header.header_version,
                    monolith.samples.len()
                ),
                None => format!("header 0x{:04X}", file.header.header_version),
            },
            DecodedFile::Ysfc(file) => format!("version {}, {} chunks", file.version, file.chunks.len()),
            DecodedFile::Disting(preset) => {
                format!("'{}', algorithm {}", preset.name(), preset.algorithm)
            }
        }
    }

    /// Maps sample-based formats to the multisample model. `None` for
    /// formats without zones.
    pub fn to_multisample(
        &self,
        name: &str,
        provider: &dyn SampleDataProvider,
    ) -> Result<Option<MultisampleSource>> {
        match self {
            DecodedFile::AkaiProgram(file) => file.to_multisample(name, provider).map(Some),
            DecodedFile::SoundFont2(file) if !file.presets.is_empty() => {
                file.to_multisample(0, provider).map(Some)
            }
            DecodedFile::Kontakt(file) => file.to_multisample(name, provider).map(Some),
            _ => Ok(None),
        }
    }
}

pub fn decode(bytes: &[u8], options: &DecodeOptions, notifier: &dyn Notifier) -> Result<DecodedFile> {
    let kind = detect(bytes).ok_or(FormatError::UnknownFormat)?;
    debug!("Detected {kind}");
    let file = match kind {
        FormatKind::AkaiProgram => DecodedFile::AkaiProgram(AkpFile::read_with(bytes, options, notifier)?),
        FormatKind::AkaiMulti => DecodedFile::AkaiMulti(AkmFile::read_with(bytes, options, notifier)?),
        FormatKind::SoundFont2 => DecodedFile::SoundFont2(Sf2File::read_with(bytes, options, notifier)?),
        FormatKind::Kontakt | FormatKind::KontaktMonolith => {
            DecodedFile::Kontakt(KontaktFile::read_with(bytes, options, notifier)?)
        }
        FormatKind::Ysfc => DecodedFile::Ysfc(YsfcFile::read(bytes, notifier)?),
        FormatKind::Disting => DecodedFile::Disting(DistingPreset::read(bytes)?),
    };
    Ok(file)
}

/// Reads the whole file and decodes it. The file handle is released before
/// decoding starts.
pub fn decode_path(path: &Path, options: &DecodeOptions, notifier: &dyn Notifier) -> Result<DecodedFile> {
    let bytes = fs::read(path)?;
    decode(&bytes, options, notifier)
}

/// Decodes every regular file of a directory, in name order. A failing file
/// does not stop the others.
pub fn decode_directory(
    dir: &Path,
    options: &DecodeOptions,
    notifier: &dyn Notifier,
) -> Result<Vec<(PathBuf, Result<DecodedFile>)>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    info!("Decoding {} files in {}", paths.len(), dir.display());

    Ok(paths
        .into_iter()
        .map(|path| {
            let result = decode_path(&path, options, notifier);
            (path, result)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingNotifier;
    use crate::riff::{FourCc, RawChunk, RiffWriter};

    fn riff(form: &[u8; 4]) -> Vec<u8> {
        RiffWriter::default()
            .write(&RawChunk::list(FourCc::RIFF, Some(FourCc::new(form)), Vec::new()))
            .unwrap()
    }

    #[test]
    fn test_detect_by_magic() {
        assert_eq!(detect(&riff(b"APRG")), Some(FormatKind::AkaiProgram));
        assert_eq!(detect(&riff(b"AMLT")), Some(FormatKind::AkaiMulti));
        assert_eq!(detect(&riff(b"sfbk")), Some(FormatKind::SoundFont2));
        assert_eq!(detect(&riff(b"WAVE")), None);
        assert_eq!(detect(&[0x12, 0x90, 0xA8, 0x7F, 0, 0]), Some(FormatKind::Kontakt));
        assert_eq!(detect(&[0x5E, 0x70, 0xAC, 0x54, 1]), Some(FormatKind::KontaktMonolith));
        assert_eq!(detect(b"YAMAHA-YSFC\0\0\0\0\0"), Some(FormatKind::Ysfc));
        assert_eq!(detect(b"DEXBPRST"), Some(FormatKind::Disting));
        assert_eq!(detect(b"RIFF"), None);
        assert_eq!(detect(b""), None);
    }

    #[test]
    fn test_decode_dispatches() {
        let notifier = CollectingNotifier::new();
        let options = DecodeOptions::default();

        let bytes = DistingPreset::new("Pads", 3).write().unwrap();
        let decoded = decode(&bytes, &options, &notifier).unwrap();
        assert_eq!(decoded.kind(), FormatKind::Disting);
        assert_eq!(decoded.summary(), "'Pads', algorithm 3");
        assert!(decoded.to_multisample("Pads", &crate::model::NoSampleData).unwrap().is_none());

        let decoded = decode(&riff(b"AMLT"), &options, &notifier).unwrap();
        assert_eq!(decoded, DecodedFile::AkaiMulti(AkmFile::default()));

        assert!(matches!(
            decode(b"not a sampler file", &options, &notifier),
            Err(FormatError::UnknownFormat)
        ));
    }
}
