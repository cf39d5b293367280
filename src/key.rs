//! Keys and scale degrees — diatonic qualities and roman-numeral labels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chord::{ChordSpec, TriadQuality};
use crate::pitch::{Pitch, PitchClass, pitch_class_name, pitch_in_octave};

/// Scale mode of a key. `Minor` is the natural minor (aeolian) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    /// Parse "major" / "minor" (case-insensitive). Anything else is major.
    pub fn from_name(name: &str) -> Mode {
        if name.trim().eq_ignore_ascii_case("minor") {
            Mode::Minor
        } else {
            Mode::Major
        }
    }
}

pub const MAJOR_DEGREE_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
pub const MINOR_NATURAL_DEGREE_SEMITONES: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_TRIADS: [TriadQuality; 7] = [
    TriadQuality::Maj,
    TriadQuality::Min,
    TriadQuality::Min,
    TriadQuality::Maj,
    TriadQuality::Maj,
    TriadQuality::Min,
    TriadQuality::Dim,
];

const MINOR_TRIADS: [TriadQuality; 7] = [
    TriadQuality::Min,
    TriadQuality::Dim,
    TriadQuality::Maj,
    TriadQuality::Min,
    TriadQuality::Min,
    TriadQuality::Maj,
    TriadQuality::Maj,
];

const ROMAN_NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Semitone offsets of the seven scale degrees above the tonic.
pub fn scale_degree_semitones(mode: Mode) -> &'static [i32; 7] {
    match mode {
        Mode::Major => &MAJOR_DEGREE_SEMITONES,
        Mode::Minor => &MINOR_NATURAL_DEGREE_SEMITONES,
    }
}

/// Triad quality built on a 0-based scale degree (taken mod 7).
pub fn diatonic_triad_quality(degree: usize, mode: Mode) -> TriadQuality {
    match mode {
        Mode::Major => MAJOR_TRIADS[degree % 7],
        Mode::Minor => MINOR_TRIADS[degree % 7],
    }
}

/// Pitch class of the root of a scale degree.
pub fn degree_root_pitch_class(key_root: PitchClass, mode: Mode, degree: usize) -> PitchClass {
    let offset = scale_degree_semitones(mode)[degree % 7];
    (key_root as i32 + offset).rem_euclid(12) as PitchClass
}

/// Roman numeral for a scale degree.
///
/// An explicit `quality` always wins over the diatonic default for the degree.
/// Minor is lower case, diminished is lower case with "°", augmented gets a
/// trailing "+", and major or suspended triads stay upper case.
pub fn roman_numeral(degree: usize, mode: Mode, quality: Option<TriadQuality>) -> String {
    let numeral = ROMAN_NUMERALS[degree % 7];
    match quality.unwrap_or_else(|| diatonic_triad_quality(degree, mode)) {
        TriadQuality::Min => numeral.to_lowercase(),
        TriadQuality::Dim => format!("{}°", numeral.to_lowercase()),
        TriadQuality::Aug => format!("{numeral}+"),
        TriadQuality::Maj | TriadQuality::Sus2 | TriadQuality::Sus4 => numeral.to_string(),
    }
}

/// A tonal center: tonic pitch class plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Key {
    pub root: PitchClass,
    pub mode: Mode,
}

impl Key {
    pub fn new(root: PitchClass, mode: Mode) -> Self {
        Key {
            root: root % 12,
            mode,
        }
    }

    pub fn major(root: PitchClass) -> Self {
        Key::new(root, Mode::Major)
    }

    pub fn minor(root: PitchClass) -> Self {
        Key::new(root, Mode::Minor)
    }

    pub fn degree_root(&self, degree: usize) -> PitchClass {
        degree_root_pitch_class(self.root, self.mode, degree)
    }

    pub fn triad_quality(&self, degree: usize) -> TriadQuality {
        diatonic_triad_quality(degree, self.mode)
    }

    pub fn roman(&self, degree: usize, quality: Option<TriadQuality>) -> String {
        roman_numeral(degree, self.mode, quality)
    }

    /// Root-position diatonic triad on a degree.
    pub fn triad(&self, degree: usize, octave: i32) -> ChordSpec {
        ChordSpec::triad(self.degree_root(degree), octave, self.triad_quality(degree))
    }

    /// The seven scale pitches ascending from the tonic in `octave`.
    pub fn scale_notes(&self, octave: i32) -> Vec<Pitch> {
        let tonic = pitch_in_octave(self.root, octave);
        scale_degree_semitones(self.mode)
            .iter()
            .map(|semi| tonic.saturating_add(*semi))
            .collect()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {mode}", pitch_class_name(self.root))
    }
}
