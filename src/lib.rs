//! Chunk-level codecs for sampler instrument formats.
//!
//! Each format module decodes a file from bytes into typed chunk structures,
//! maps it to the [`model`] and, where supported, writes it back:
//!
//! * [`akai`]: Akai S5000/S6000 programs and multis (RIFF)
//! * [`kontakt`]: Kontakt 2 and 4.2 instruments and monoliths
//! * [`ysfc`]: Yamaha Montage/MODX libraries
//! * [`sf2`]: SoundFont 2
//! * [`disting`]: Expert Sleepers Disting EX presets
//!
//! [`detect::decode`] picks the codec from the leading magic bytes.

pub mod akai;
pub mod compression;
pub mod config;
pub mod detect;
pub mod disting;
pub mod error;
pub mod kontakt;
pub mod model;
pub mod notify;
pub mod riff;
pub mod sf2;
pub mod stream;
pub mod ysfc;

pub use config::DecodeOptions;
pub use detect::{decode, decode_directory, decode_path, detect, DecodedFile, FormatKind};
pub use error::{FormatError, Result};
pub use model::{MultisampleSource, NoSampleData, SampleDataProvider};
pub use notify::{CollectingNotifier, LogNotifier, Notifier};
