use crate::akai::{ChunkCodec, ChunkEncode};
use crate::error::Result;
use crate::riff::FourCc;

/// `lfo ` chunk. Programs carry two; sync applies to LFO 1 and retrigger to
/// LFO 2, both stored in the same byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpLfo {
    pub waveform: u8,
    pub rate: u8,
    pub delay: u8,
    pub depth: u8,
    pub sync_or_retrigger: u8,
    pub modwheel: u8,
    pub aftertouch: u8,
    pub rate_mod: i8,
    pub delay_mod: i8,
    pub depth_mod: i8,
}

impl Default for AkpLfo {
    fn default() -> Self {
        Self {
            waveform: 1,
            rate: 43,
            delay: 0,
            depth: 0,
            sync_or_retrigger: 0,
            modwheel: 15,
            aftertouch: 0,
            rate_mod: 0,
            delay_mod: 0,
            depth_mod: 0,
        }
    }
}

const LFO_WAVEFORMS: [&str; 9] = [
    "Sine", "Triangle", "Square", "Square+", "Square-", "Saw Bi", "Saw Up", "Saw Down", "Random",
];

impl AkpLfo {
    pub fn waveform_name(&self) -> &'static str {
        LFO_WAVEFORMS.get(usize::from(self.waveform)).copied().unwrap_or("Unknown")
    }
}

impl ChunkCodec for AkpLfo {
    const TAG: FourCc = FourCc::new(b"lfo ");
    const LENGTH: usize = 12;

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            waveform: data[1],
            rate: data[2],
            delay: data[3],
            depth: data[4],
            sync_or_retrigger: data[5],
            modwheel: data[7],
            aftertouch: data[8],
            rate_mod: data[9] as i8,
            delay_mod: data[10] as i8,
            depth_mod: data[11] as i8,
        })
    }
}

impl ChunkEncode for AkpLfo {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            0,
            self.waveform,
            self.rate,
            self.delay,
            self.depth,
            self.sync_or_retrigger,
            0,
            self.modwheel,
            self.aftertouch,
            self.rate_mod as u8,
            self.delay_mod as u8,
            self.depth_mod as u8,
        ]);
    }
}

/// Offset of the first `mods` payload byte in the documented file layout.
pub const MODS_BASE_OFFSET: usize = 0x78;

/// Destinations of the 18 modulation slots, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationSlot {
    AmpMod1,
    AmpMod2,
    PanMod1,
    PanMod2,
    PanMod3,
    Lfo1Rate,
    Lfo1Delay,
    Lfo1Depth,
    Lfo2Rate,
    Lfo2Delay,
    Lfo2Depth,
    PitchMod1,
    PitchMod2,
    AmpMod,
    FilterInput1,
    FilterInput2,
    FilterInput3,
    Reserved,
}

impl ModulationSlot {
    pub const ALL: [ModulationSlot; 18] = [
        Self::AmpMod1,
        Self::AmpMod2,
        Self::PanMod1,
        Self::PanMod2,
        Self::PanMod3,
        Self::Lfo1Rate,
        Self::Lfo1Delay,
        Self::Lfo1Depth,
        Self::Lfo2Rate,
        Self::Lfo2Delay,
        Self::Lfo2Depth,
        Self::PitchMod1,
        Self::PitchMod2,
        Self::AmpMod,
        Self::FilterInput1,
        Self::FilterInput2,
        Self::FilterInput3,
        Self::Reserved,
    ];

    /// Documented offset of the slot's source byte.
    pub fn source_offset(self) -> usize {
        let index = Self::ALL.iter().position(|&s| s == self).unwrap_or(0);
        MODS_BASE_OFFSET + 3 + 2 * index
    }
}

const MODULATION_SOURCES: [&str; 15] = [
    "No Source",
    "Modwheel",
    "Bend",
    "Aftertouch",
    "External",
    "Velocity",
    "Keyboard",
    "LFO 1",
    "LFO 2",
    "Amp Env",
    "Filter Env",
    "Aux Env",
    "dModwheel",
    "dBend",
    "dExternal",
];

pub fn modulation_source_name(source: u8) -> &'static str {
    MODULATION_SOURCES.get(usize::from(source)).copied().unwrap_or("Unknown")
}

/// `mods` chunk: program modulation routing.
///
/// Read only. Values are addressed by their documented absolute offsets
/// (`0x78` is the first payload byte); the legacy writer never emitted this
/// chunk's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpModulations {
    data: [u8; Self::LENGTH],
}

impl AkpModulations {
    /// Byte at a documented offset, as 0..=255.
    pub fn unsigned_value(&self, offset: usize) -> Option<u8> {
        offset
            .checked_sub(MODS_BASE_OFFSET)
            .and_then(|index| self.data.get(index))
            .copied()
    }

    pub fn source(&self, slot: ModulationSlot) -> u8 {
        self.unsigned_value(slot.source_offset()).unwrap_or(0)
    }

    /// Slots that have a source assigned.
    pub fn assignments(&self) -> impl Iterator<Item = (ModulationSlot, u8)> + '_ {
        ModulationSlot::ALL
            .iter()
            .map(|&slot| (slot, self.source(slot)))
            .filter(|&(slot, source)| source != 0 && slot != ModulationSlot::Reserved)
    }
}

impl ChunkCodec for AkpModulations {
    const TAG: FourCc = FourCc::new(b"mods");
    const LENGTH: usize = 38;

    fn decode(data: &[u8]) -> Result<Self> {
        let mut copy = [0u8; Self::LENGTH];
        copy.copy_from_slice(&data[..Self::LENGTH]);
        Ok(Self { data: copy })
    }
}
