//! Chord construction — interval sets, tensions, alterations and inversions.
//!
//! A [`ChordSpec`] is built by accumulating semitone intervals above the
//! root: the base triad, an optional seventh, an added sixth, upper tensions
//! and altered tensions. The interval set is deduplicated and sorted before it
//! is placed on the root pitch, then the requested inversion is applied.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pitch::{Pitch, PitchClass, pitch_in_octave};

// ── Chord Components ────────────────────────────────────────

/// Triad quality the chord is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriadQuality {
    #[default]
    Maj,
    Min,
    Dim,
    Aug,
    Sus2,
    Sus4,
}

impl TriadQuality {
    /// Semitone intervals of the triad above its root.
    pub fn intervals(self) -> [i32; 3] {
        match self {
            TriadQuality::Maj => [0, 4, 7],
            TriadQuality::Min => [0, 3, 7],
            TriadQuality::Dim => [0, 3, 6],
            TriadQuality::Aug => [0, 4, 8],
            TriadQuality::Sus2 => [0, 2, 7],
            TriadQuality::Sus4 => [0, 5, 7],
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            TriadQuality::Maj => "maj",
            TriadQuality::Min => "min",
            TriadQuality::Dim => "dim",
            TriadQuality::Aug => "aug",
            TriadQuality::Sus2 => "sus2",
            TriadQuality::Sus4 => "sus4",
        }
    }
}

/// Seventh added on top of the triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Seventh {
    #[default]
    #[serde(rename = "none")]
    None,
    /// Minor seventh (+10).
    #[serde(rename = "b7")]
    Flat7,
    /// Major seventh (+11).
    #[serde(rename = "maj7")]
    Major7,
    /// Diminished seventh (+9).
    #[serde(rename = "dim7")]
    Diminished7,
    /// Half-diminished: replaces the whole chord with {0, 3, 6, 10}.
    #[serde(rename = "half-dim")]
    HalfDiminished,
}

impl Seventh {
    pub fn key(self) -> &'static str {
        match self {
            Seventh::None => "none",
            Seventh::Flat7 => "b7",
            Seventh::Major7 => "maj7",
            Seventh::Diminished7 => "dim7",
            Seventh::HalfDiminished => "half-dim",
        }
    }
}

/// Natural upper tension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Extension {
    #[serde(rename = "9")]
    Ninth,
    #[serde(rename = "11")]
    Eleventh,
    #[serde(rename = "13")]
    Thirteenth,
}

impl Extension {
    pub fn semitones(self) -> i32 {
        match self {
            Extension::Ninth => 14,
            Extension::Eleventh => 17,
            Extension::Thirteenth => 21,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Extension::Ninth => "9",
            Extension::Eleventh => "11",
            Extension::Thirteenth => "13",
        }
    }
}

/// Altered upper tension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Alteration {
    #[serde(rename = "b9")]
    FlatNine,
    #[serde(rename = "#9")]
    SharpNine,
    #[serde(rename = "#11")]
    SharpEleven,
    #[serde(rename = "b13")]
    FlatThirteen,
}

impl Alteration {
    pub fn semitones(self) -> i32 {
        match self {
            Alteration::FlatNine => 13,
            Alteration::SharpNine => 15,
            Alteration::SharpEleven => 18,
            Alteration::FlatThirteen => 20,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Alteration::FlatNine => "b9",
            Alteration::SharpNine => "#9",
            Alteration::SharpEleven => "#11",
            Alteration::FlatThirteen => "b13",
        }
    }
}

/// Error returned when a chord component key is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown chord key '{}'", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for TriadQuality {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maj" => Ok(TriadQuality::Maj),
            "min" => Ok(TriadQuality::Min),
            "dim" => Ok(TriadQuality::Dim),
            "aug" => Ok(TriadQuality::Aug),
            "sus2" => Ok(TriadQuality::Sus2),
            "sus4" => Ok(TriadQuality::Sus4),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

impl FromStr for Seventh {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Seventh::None),
            "b7" => Ok(Seventh::Flat7),
            "maj7" => Ok(Seventh::Major7),
            "dim7" => Ok(Seventh::Diminished7),
            "half-dim" => Ok(Seventh::HalfDiminished),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

impl FromStr for Extension {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "9" => Ok(Extension::Ninth),
            "11" => Ok(Extension::Eleventh),
            "13" => Ok(Extension::Thirteenth),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

impl FromStr for Alteration {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b9" => Ok(Alteration::FlatNine),
            "#9" => Ok(Alteration::SharpNine),
            "#11" => Ok(Alteration::SharpEleven),
            "b13" => Ok(Alteration::FlatThirteen),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

// ── Chord Spec ──────────────────────────────────────────────

/// Full description of a chord voicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChordSpec {
    /// Root pitch class; taken mod 12.
    pub root: PitchClass,
    /// Octave of the root (4 puts a C root on middle C).
    pub octave: i32,
    pub base_quality: TriadQuality,
    pub seventh: Seventh,
    pub add6: bool,
    pub extensions: BTreeSet<Extension>,
    pub alterations: BTreeSet<Alteration>,
    /// Number of inversions; clamped to the voicing size.
    pub inversion: usize,
}

impl Default for ChordSpec {
    fn default() -> Self {
        ChordSpec {
            root: 0,
            octave: 4,
            base_quality: TriadQuality::Maj,
            seventh: Seventh::None,
            add6: false,
            extensions: BTreeSet::new(),
            alterations: BTreeSet::new(),
            inversion: 0,
        }
    }
}

impl ChordSpec {
    /// Plain triad in root position.
    pub fn triad(root: PitchClass, octave: i32, quality: TriadQuality) -> Self {
        ChordSpec {
            root,
            octave,
            base_quality: quality,
            ..ChordSpec::default()
        }
    }

    pub fn with_seventh(mut self, seventh: Seventh) -> Self {
        self.seventh = seventh;
        self
    }

    pub fn with_add6(mut self) -> Self {
        self.add6 = true;
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.insert(extension);
        self
    }

    pub fn with_alteration(mut self, alteration: Alteration) -> Self {
        self.alterations.insert(alteration);
        self
    }

    pub fn with_inversion(mut self, inversion: usize) -> Self {
        self.inversion = inversion;
        self
    }

    /// Pitch of the chord root: `(octave + 1) * 12 + root mod 12`, saturating.
    pub fn root_pitch(&self) -> Pitch {
        pitch_in_octave(self.root, self.octave)
    }

    /// Sorted, duplicate-free semitone intervals above the root.
    pub fn intervals(&self) -> Vec<i32> {
        let mut intervals: Vec<i32> = self.base_quality.intervals().to_vec();

        match self.seventh {
            Seventh::None => {}
            Seventh::Major7 => intervals.push(11),
            Seventh::Flat7 => intervals.push(10),
            Seventh::Diminished7 => intervals.push(9),
            // Overrides the base quality entirely.
            Seventh::HalfDiminished => intervals = vec![0, 3, 6, 10],
        }

        if self.add6 {
            intervals.push(9);
        }

        intervals.extend(self.extensions.iter().map(|e| e.semitones()));
        intervals.extend(self.alterations.iter().map(|a| a.semitones()));

        intervals.sort_unstable();
        intervals.dedup();
        intervals
    }

    /// Parse a chord request from JSON using the lenient key rules of
    /// [`ChordRequest`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let request: ChordRequest = serde_json::from_str(json)?;
        Ok(request.into())
    }
}

/// Build the ordered pitches of a chord, inversion applied.
pub fn build_chord_notes(spec: &ChordSpec) -> Vec<Pitch> {
    let root = spec.root_pitch();
    let mut notes: Vec<Pitch> = spec
        .intervals()
        .into_iter()
        .map(|i| root.saturating_add(i))
        .collect();
    // Saturation at the top of the range can collapse tones.
    notes.dedup();
    apply_inversion(&notes, spec.inversion)
}

/// Move the lowest pitch up an octave, `inversion` times.
///
/// `inversion` is clamped to `len - 1`, so asking for more inversions than the
/// voicing has notes yields the last distinct inversion.
pub fn apply_inversion(pitches: &[Pitch], inversion: usize) -> Vec<Pitch> {
    let mut notes = pitches.to_vec();
    let count = inversion.min(notes.len().saturating_sub(1));
    notes.rotate_left(count);
    let len = notes.len();
    for p in &mut notes[len - count..] {
        *p = p.saturating_add(12);
    }
    notes
}

// ── Lenient Requests ────────────────────────────────────────

/// String-keyed chord description as it arrives from a UI or JSON.
///
/// Unknown base qualities fall back to `maj`, unknown sevenths to `none`, and
/// unknown extension or alteration keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChordRequest {
    pub root: Option<i32>,
    pub octave: Option<i32>,
    pub base_quality: Option<String>,
    pub seventh: Option<String>,
    pub add6: bool,
    pub extensions: Vec<String>,
    pub alterations: Vec<String>,
    pub inversion: Option<i64>,
}

impl From<ChordRequest> for ChordSpec {
    fn from(req: ChordRequest) -> Self {
        let defaults = ChordSpec::default();
        ChordSpec {
            root: req
                .root
                .map_or(defaults.root, |r| r.rem_euclid(12) as PitchClass),
            octave: req.octave.unwrap_or(defaults.octave),
            base_quality: req
                .base_quality
                .and_then(|q| q.parse().ok())
                .unwrap_or_default(),
            seventh: req
                .seventh
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            add6: req.add6,
            extensions: req.extensions.iter().filter_map(|k| k.parse().ok()).collect(),
            alterations: req
                .alterations
                .iter()
                .filter_map(|k| k.parse().ok())
                .collect(),
            inversion: req
                .inversion
                .map_or(0, |i| usize::try_from(i.max(0)).unwrap_or(usize::MAX)),
        }
    }
}

// ── Named Presets ───────────────────────────────────────────

/// A named chord shape selectable by a short key such as `"m7"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub intervals: &'static [i32],
}

pub static CHORD_PRESETS: [ChordPreset; 14] = [
    ChordPreset { key: "maj", name: "Major", intervals: &[0, 4, 7] },
    ChordPreset { key: "min", name: "Minor", intervals: &[0, 3, 7] },
    ChordPreset { key: "dim", name: "Diminished", intervals: &[0, 3, 6] },
    ChordPreset { key: "aug", name: "Augmented", intervals: &[0, 4, 8] },
    ChordPreset { key: "sus2", name: "Sus2", intervals: &[0, 2, 7] },
    ChordPreset { key: "sus4", name: "Sus4", intervals: &[0, 5, 7] },
    ChordPreset { key: "maj6", name: "Major 6", intervals: &[0, 4, 7, 9] },
    ChordPreset { key: "m6", name: "Minor 6", intervals: &[0, 3, 7, 9] },
    ChordPreset { key: "7", name: "Dominant 7", intervals: &[0, 4, 7, 10] },
    ChordPreset { key: "maj7", name: "Major 7", intervals: &[0, 4, 7, 11] },
    ChordPreset { key: "m7", name: "Minor 7", intervals: &[0, 3, 7, 10] },
    ChordPreset { key: "mMaj7", name: "Minor Major 7", intervals: &[0, 3, 7, 11] },
    ChordPreset { key: "dim7", name: "Diminished 7", intervals: &[0, 3, 6, 9] },
    ChordPreset { key: "m7b5", name: "Half-diminished (m7b5)", intervals: &[0, 3, 6, 10] },
];

/// Look up a preset by key.
pub fn chord_preset(key: &str) -> Option<&'static ChordPreset> {
    CHORD_PRESETS.iter().find(|p| p.key == key)
}

/// Semitone offset of a tension key, natural or altered.
fn tension_semitones(key: &str) -> Option<i32> {
    key.parse::<Extension>()
        .map(Extension::semitones)
        .or_else(|_| key.parse::<Alteration>().map(Alteration::semitones))
        .ok()
}

/// Pitches of a preset chord plus tension keys ("9", "b13", ...).
///
/// An unknown preset key yields an empty chord; unknown tension keys are
/// ignored.
pub fn preset_chord_notes(
    root: PitchClass,
    octave: i32,
    key: &str,
    extensions: &[&str],
) -> Vec<Pitch> {
    let Some(preset) = chord_preset(key) else {
        return Vec::new();
    };

    let root_pitch = pitch_in_octave(root, octave);
    let mut notes: Vec<Pitch> = preset
        .intervals
        .iter()
        .copied()
        .chain(extensions.iter().filter_map(|k| tension_semitones(k)))
        .map(|semi| root_pitch.saturating_add(semi))
        .collect();
    notes.sort_unstable();
    notes.dedup();
    notes
}
