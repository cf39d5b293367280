//! Pitch math — conversions between pitch numbers, frequencies and note names.
//!
//! Pitches are 12-tone equal temperament note numbers where 69 is A4 (440 Hz)
//! and 60 is middle C (C4). No range is enforced: negative pitches and octaves
//! below -1 are representable.

/// Integer note number (69 = A4 = 440 Hz).
pub type Pitch = i32;

/// Pitch modulo 12, always in `0..12`.
pub type PitchClass = u8;

/// Frequency of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// Pitch number of A4.
pub const A4_PITCH: Pitch = 69;

/// Canonical pitch-class names. Sharps are preferred for output.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch classes that sit on the black keys of a piano keyboard.
const ACCIDENTAL_CLASSES: [PitchClass; 5] = [1, 3, 6, 8, 10];

/// Clamp `value` into `[lo, hi]`. NaN collapses to `lo`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.max(lo).min(hi)
}

/// Frequency in Hz: `440 * 2^((pitch - 69) / 12)`.
pub fn frequency_of(pitch: Pitch) -> f64 {
    A4_FREQUENCY * (2.0_f64).powf((pitch as f64 - A4_PITCH as f64) / 12.0)
}

/// Pitch class of any pitch, including negative ones.
pub fn pitch_class(pitch: Pitch) -> PitchClass {
    pitch.rem_euclid(12) as PitchClass
}

/// Octave number such that pitch 60 is in octave 4.
pub fn octave_of(pitch: Pitch) -> i32 {
    pitch.div_euclid(12) - 1
}

/// Pitch of class `pc` in `octave`: `(octave + 1) * 12 + pc mod 12`.
///
/// Saturates at the ends of the `Pitch` range instead of overflowing.
pub fn pitch_in_octave(pc: PitchClass, octave: i32) -> Pitch {
    octave
        .saturating_add(1)
        .saturating_mul(12)
        .saturating_add((pc % 12) as Pitch)
}

/// Canonical name of a pitch class (taken mod 12).
pub fn pitch_class_name(pc: PitchClass) -> &'static str {
    NOTE_NAMES[(pc % 12) as usize]
}

/// Note name with octave, e.g. 60 → "C4", 61 → "C#4", -12 → "C-2".
pub fn name_of(pitch: Pitch) -> String {
    format!("{}{}", pitch_class_name(pitch_class(pitch)), octave_of(pitch))
}

/// True for black-key pitch classes (C#, D#, F#, G#, A#).
pub fn is_accidental(pitch: Pitch) -> bool {
    ACCIDENTAL_CLASSES.contains(&pitch_class(pitch))
}

/// Semitone offset of a natural note letter within its octave.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parse an optionally negative run of ASCII digits. Rejects `+`, blanks and
/// anything that would overflow an `i32`.
fn parse_signed(text: &str) -> Option<i32> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse a note name ("C4", "F#3", "Db-1", "a4") or a bare integer ("60")
/// into a pitch number.
///
/// The accidental is applied to the letter's semitone and the result wrapped
/// into `0..12` before the octave is added, so "Cb4" is B4 (71) and "B#4" is
/// C4 (60). Anything else returns `None`.
pub fn parse_name(text: &str) -> Option<Pitch> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(pitch) = parse_signed(text) {
        return Some(pitch);
    }

    let mut chars = text.chars();
    let mut semitone = letter_semitone(chars.next()?)?;
    let mut rest = chars.as_str();

    if let Some(tail) = rest.strip_prefix('#') {
        semitone += 1;
        rest = tail;
    } else if let Some(tail) = rest.strip_prefix('b') {
        semitone -= 1;
        rest = tail;
    }

    let octave = parse_signed(rest)?;
    let semitone = semitone.rem_euclid(12);

    octave.checked_add(1)?.checked_mul(12)?.checked_add(semitone)
}
