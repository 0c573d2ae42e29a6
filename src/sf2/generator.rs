//! The SoundFont 2.01 generator table.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorInfo {
    pub name: &'static str,
    pub default: i16,
}

const fn generator(name: &'static str, default: i16) -> GeneratorInfo {
    GeneratorInfo { name, default }
}

pub const START_ADDRS_OFFSET: u16 = 0;
pub const END_ADDRS_OFFSET: u16 = 1;
pub const STARTLOOP_ADDRS_OFFSET: u16 = 2;
pub const ENDLOOP_ADDRS_OFFSET: u16 = 3;
pub const START_ADDRS_COARSE_OFFSET: u16 = 4;
pub const INITIAL_FILTER_FC: u16 = 8;
pub const INITIAL_FILTER_Q: u16 = 9;
pub const END_ADDRS_COARSE_OFFSET: u16 = 12;
pub const PAN: u16 = 17;
pub const DELAY_VOL_ENV: u16 = 33;
pub const ATTACK_VOL_ENV: u16 = 34;
pub const HOLD_VOL_ENV: u16 = 35;
pub const DECAY_VOL_ENV: u16 = 36;
pub const SUSTAIN_VOL_ENV: u16 = 37;
pub const RELEASE_VOL_ENV: u16 = 38;
pub const INSTRUMENT: u16 = 41;
pub const KEY_RANGE: u16 = 43;
pub const VEL_RANGE: u16 = 44;
pub const STARTLOOP_ADDRS_COARSE_OFFSET: u16 = 45;
pub const INITIAL_ATTENUATION: u16 = 48;
pub const ENDLOOP_ADDRS_COARSE_OFFSET: u16 = 50;
pub const COARSE_TUNE: u16 = 51;
pub const FINE_TUNE: u16 = 52;
pub const SAMPLE_ID: u16 = 53;
pub const SAMPLE_MODES: u16 = 54;
pub const SCALE_TUNING: u16 = 56;
pub const OVERRIDING_ROOT_KEY: u16 = 58;

/// Low byte 0, high byte 127.
const FULL_RANGE: i16 = 0x7F00;

pub static GENERATORS: [GeneratorInfo; 61] = [
    generator("startAddrsOffset", 0),
    generator("endAddrsOffset", 0),
    generator("startloopAddrsOffset", 0),
    generator("endloopAddrsOffset", 0),
    generator("startAddrsCoarseOffset", 0),
    generator("modLfoToPitch", 0),
    generator("vibLfoToPitch", 0),
    generator("modEnvToPitch", 0),
    generator("initialFilterFc", 13500),
    generator("initialFilterQ", 0),
    generator("modLfoToFilterFc", 0),
    generator("modEnvToFilterFc", 0),
    generator("endAddrsCoarseOffset", 0),
    generator("modLfoToVolume", 0),
    generator("unused1", 0),
    generator("chorusEffectsSend", 0),
    generator("reverbEffectsSend", 0),
    generator("pan", 0),
    generator("unused2", 0),
    generator("unused3", 0),
    generator("unused4", 0),
    generator("delayModLFO", -12000),
    generator("freqModLFO", 0),
    generator("delayVibLFO", -12000),
    generator("freqVibLFO", 0),
    generator("delayModEnv", -12000),
    generator("attackModEnv", -12000),
    generator("holdModEnv", -12000),
    generator("decayModEnv", -12000),
    generator("sustainModEnv", 0),
    generator("releaseModEnv", -12000),
    generator("keynumToModEnvHold", 0),
    generator("keynumToModEnvDecay", 0),
    generator("delayVolEnv", -12000),
    generator("attackVolEnv", -12000),
    generator("holdVolEnv", -12000),
    generator("decayVolEnv", -12000),
    generator("sustainVolEnv", 0),
    generator("releaseVolEnv", -12000),
    generator("keynumToVolEnvHold", 0),
    generator("keynumToVolEnvDecay", 0),
    generator("instrument", 0),
    generator("reserved1", 0),
    generator("keyRange", FULL_RANGE),
    generator("velRange", FULL_RANGE),
    generator("startloopAddrsCoarseOffset", 0),
    generator("keynum", -1),
    generator("velocity", -1),
    generator("initialAttenuation", 0),
    generator("reserved2", 0),
    generator("endloopAddrsCoarseOffset", 0),
    generator("coarseTune", 0),
    generator("fineTune", 0),
    generator("sampleID", 0),
    generator("sampleModes", 0),
    generator("reserved3", 0),
    generator("scaleTuning", 100),
    generator("exclusiveClass", 0),
    generator("overridingRootKey", -1),
    generator("unused5", 0),
    generator("endOper", 0),
];

pub fn generator_name(id: u16) -> Option<&'static str> {
    GENERATORS.get(usize::from(id)).map(|g| g.name)
}

pub fn default_value(id: u16) -> i16 {
    GENERATORS.get(usize::from(id)).map_or(0, |g| g.default)
}

/// Generators that are only valid at instrument level: sample offsets,
/// key/velocity overrides, sample reference and modes, exclusive class and
/// root key.
pub fn is_only_instrument(id: u16) -> bool {
    matches!(id, 0..=4 | 12 | 45 | 46 | 47 | 50 | 53 | 54 | 57 | 58)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_only_generators() {
        assert!(is_only_instrument(SAMPLE_ID));
        assert!(!is_only_instrument(PAN));
        assert!(is_only_instrument(OVERRIDING_ROOT_KEY));
        assert!(!is_only_instrument(INSTRUMENT));
        assert!(!is_only_instrument(KEY_RANGE));
    }

    #[test]
    fn test_table_defaults() {
        assert_eq!(generator_name(INITIAL_FILTER_FC), Some("initialFilterFc"));
        assert_eq!(default_value(INITIAL_FILTER_FC), 13500);
        assert_eq!(default_value(RELEASE_VOL_ENV), -12000);
        assert_eq!(default_value(KEY_RANGE).to_le_bytes(), [0, 127]);
        assert_eq!(default_value(SCALE_TUNING), 100);
        assert_eq!(default_value(OVERRIDING_ROOT_KEY), -1);
        assert_eq!(generator_name(60), Some("endOper"));
        assert_eq!(generator_name(61), None);
        assert_eq!(default_value(61), 0);
    }
}
