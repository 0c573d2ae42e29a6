//! Yamaha performance categories.

pub const NO_ASSIGN: &str = "No Assign";

static MAIN_CATEGORIES: [&str; 16] = [
    "Piano",
    "Keyboard",
    "Organ",
    "Guitar",
    "Bass",
    "Strings",
    "Brass",
    "Woodwind",
    "Syn Lead",
    "Pad/Choir",
    "Syn Comp",
    "Chromatic Perc",
    "Drum/Perc",
    "Sound FX",
    "Musical FX",
    "Ethnic",
];

static SUB_CATEGORIES: [&[&str]; 16] = [
    &["Acoustic", "Layer", "Modern", "Vintage", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["E.Piano", "FM Piano", "Clavi", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Tone Wheel", "Combo", "Pipe", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Acoustic", "Electric Clean", "Electric Dist", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Acoustic", "Electric", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Solo", "Ensemble", "Pizzicato", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Solo", "Ensemble", "Orchestra", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Saxophone", "Flute", "Woodwind", "Reed/Pipe", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Analog", "Digital", "Hip Hop", "Dance", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Analog", "Warm", "Bright", "Choir", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Analog", "Digital", "Fade", "Hook", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Mallet", "Bell", "Synth Bell", "Pitched Drum", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Drums", "Perc", "Synth", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Moving", "Ambient", "Nature", "Sci-Fi", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Moving", "Ambient", "Sweep", "Hit", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
    &["Bowed", "Plucked", "Struck", "Blown", "Rock/Pop", "R&B/HipHop", "Electronic", "Jazz/World"],
];

pub fn main_category(index: usize) -> &'static str {
    MAIN_CATEGORIES.get(index).copied().unwrap_or(NO_ASSIGN)
}

/// Performances store their main categories as a bit mask; the lowest set
/// bit names the category.
pub fn performance_category(mask: u32) -> &'static str {
    if mask == 0 {
        return NO_ASSIGN;
    }
    main_category(mask.trailing_zeros() as usize)
}

pub fn performance_sub_category(main: usize, sub: usize) -> &'static str {
    SUB_CATEGORIES
        .get(main)
        .and_then(|subs| subs.get(sub))
        .copied()
        .unwrap_or(NO_ASSIGN)
}

/// Index of a main category by name, ignoring case.
pub fn main_category_index(name: &str) -> Option<usize> {
    MAIN_CATEGORIES.iter().position(|c| c.eq_ignore_ascii_case(name))
}
