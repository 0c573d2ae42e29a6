use crate::akai::{ChunkCodec, ChunkEncode};
use crate::error::Result;
use crate::riff::FourCc;

/// `prg ` chunk: program header. All six bytes are modelled so the chunk
/// round-trips unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpProgram {
    pub header: u8,
    /// MIDI program number, 0 = off, 1..=128.
    pub program_number: u8,
    pub number_of_keygroups: u8,
    pub reserved: [u8; 3],
}

impl Default for AkpProgram {
    fn default() -> Self {
        Self {
            header: 1,
            program_number: 0,
            number_of_keygroups: 0,
            reserved: [0; 3],
        }
    }
}

impl ChunkCodec for AkpProgram {
    const TAG: FourCc = FourCc::new(b"prg ");
    const LENGTH: usize = 6;

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            header: data[0],
            program_number: data[1],
            number_of_keygroups: data[2],
            reserved: [data[3], data[4], data[5]],
        })
    }
}

impl ChunkEncode for AkpProgram {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.header, self.program_number, self.number_of_keygroups]);
        out.extend_from_slice(&self.reserved);
    }
}

/// `out ` chunk: program output section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpOutput {
    /// 0..=100, 85 is the factory default.
    pub loudness: u8,
    pub amp_mod_1: u8,
    pub amp_mod_2: u8,
    pub pan_mod_1: u8,
    pub pan_mod_2: u8,
    pub pan_mod_3: u8,
    pub velocity_sensitivity: i8,
}

impl Default for AkpOutput {
    fn default() -> Self {
        Self {
            loudness: 85,
            amp_mod_1: 0,
            amp_mod_2: 0,
            pan_mod_1: 0,
            pan_mod_2: 0,
            pan_mod_3: 0,
            velocity_sensitivity: 25,
        }
    }
}

impl AkpOutput {
    /// Loudness in dB: 0 maps to -60 dB, 100 to +6 dB.
    pub fn loudness_db(&self) -> f64 {
        f64::from(self.loudness) / 100.0 * 66.0 - 60.0
    }
}

impl ChunkCodec for AkpOutput {
    const TAG: FourCc = FourCc::new(b"out ");
    const LENGTH: usize = 8;

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            loudness: data[1],
            amp_mod_1: data[2],
            amp_mod_2: data[3],
            pan_mod_1: data[4],
            pan_mod_2: data[5],
            pan_mod_3: data[6],
            velocity_sensitivity: data[7] as i8,
        })
    }
}

impl ChunkEncode for AkpOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            0,
            self.loudness,
            self.amp_mod_1,
            self.amp_mod_2,
            self.pan_mod_1,
            self.pan_mod_2,
            self.pan_mod_3,
            self.velocity_sensitivity as u8,
        ]);
    }
}

/// `tune` chunk: program tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkpTune {
    pub semitone: i8,
    pub fine: i8,
    /// Per-note detune, C to B.
    pub detune: [i8; 12],
    pub pitchbend_up: u8,
    pub pitchbend_down: u8,
    pub bend_mode: u8,
    pub aftertouch: i8,
}

impl Default for AkpTune {
    fn default() -> Self {
        Self {
            semitone: 0,
            fine: 0,
            detune: [0; 12],
            pitchbend_up: 2,
            pitchbend_down: 2,
            bend_mode: 0,
            aftertouch: 0,
        }
    }
}

impl AkpTune {
    pub fn semitones(&self) -> f64 {
        f64::from(self.semitone) + f64::from(self.fine) / 100.0
    }
}

impl ChunkCodec for AkpTune {
    const TAG: FourCc = FourCc::new(b"tune");
    const LENGTH: usize = 22;

    fn decode(data: &[u8]) -> Result<Self> {
        let mut detune = [0i8; 12];
        for (slot, &b) in detune.iter_mut().zip(&data[3..15]) {
            *slot = b as i8;
        }
        Ok(Self {
            semitone: data[1] as i8,
            fine: data[2] as i8,
            detune,
            pitchbend_up: data[15],
            pitchbend_down: data[16],
            bend_mode: data[17],
            aftertouch: data[18] as i8,
        })
    }
}

impl ChunkEncode for AkpTune {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0, self.semitone as u8, self.fine as u8]);
        out.extend(self.detune.iter().map(|&d| d as u8));
        out.extend_from_slice(&[
            self.pitchbend_up,
            self.pitchbend_down,
            self.bend_mode,
            self.aftertouch as u8,
        ]);
        out.extend_from_slice(&[0; 3]);
    }
}
