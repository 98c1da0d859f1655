//! Pitch-to-frequency mapping with a runtime-adjustable interval ratio.

/*
Temperament
===========

Every playable pitch is an integer index on a keyboard, anchored to a fixed
reference pitch with a fixed reference frequency (A4 = 440 Hz, index 69,
MIDI-style). The frequency of any other pitch is derived by repeated
multiplication with the INTERVAL RATIO:

    frequency(p) = 440.0 × ratio^(p − 69)

With ratio = 2^(1/12) ≈ 1.059463 this is ordinary twelve-tone equal
temperament. The ratio is user-adjustable at runtime within [0.001, 3.000],
which stretches or shrinks the whole keyboard around A4 — values below 1.0
invert the keyboard (higher index, lower pitch).

Octave derivation
-----------------

The visible keyboard size follows from the ratio: walk outward from the
reference frequency, multiplying upward and dividing downward, counting how
many steps stay inside the audible band [20 Hz, 20 kHz]. Every seven counted
steps make one octave (legacy behavior, kept as observed — seven is the
diatonic scale length, not the chromatic one):

    octave_count = max(1, counted_steps / 7)

Ratios at or near 1.0 would walk forever (each step stays at the reference
frequency), so both walks are capped at MAX_SPAN_NOTES steps. A fresh
Temperament reports 7 octaves until the ratio is first changed; the count is
cached and recomputed only on ratio changes, never in the audio-rate path.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer index of a playable pitch, analogous to a MIDI note number.
///
/// Signed and wider than MIDI's 0–127: derived keyboards can extend past
/// the MIDI range when the ratio shrinks the step size.
pub type PitchId = i32;

/// The twelve-tone equal temperament ratio, 2^(1/12).
pub const STANDARD_RATIO: f64 = 1.059463094359295;

/// Lowest pitch shown on the derived keyboard (A0).
pub const KEYBOARD_ANCHOR: PitchId = 21;

const REFERENCE_FREQUENCY_HZ: f64 = 440.0;
const REFERENCE_PITCH: PitchId = 69;

const RATIO_MIN: f64 = 0.001;
const RATIO_MAX: f64 = 3.000;

const AUDIBLE_LOW_HZ: f64 = 20.0;
const AUDIBLE_HIGH_HZ: f64 = 20_000.0;

/// Counted steps per octave in the legacy derivation.
const NOTES_PER_OCTAVE_COUNT: u32 = 7;

/// Per-direction cap on the octave-derivation walk. Keeps the walk finite
/// for ratios at or near 1.0, where a step barely moves the frequency.
const MAX_SPAN_NOTES: u32 = 512;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One entry of the derived keyboard, as shown to the UI collaborator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PitchInfo {
    pub pitch: PitchId,
    pub name: String,
    pub frequency_hz: f64,
    pub black_key: bool,
}

/// Maps pitch indices to frequencies under the current interval ratio.
#[derive(Debug, Clone, Copy)]
pub struct Temperament {
    interval_ratio: f64,
    octave_count: u32,
}

impl Temperament {
    /// Standard equal temperament, reporting the legacy 7-octave keyboard
    /// until the ratio is first changed.
    pub fn new() -> Self {
        Self {
            interval_ratio: STANDARD_RATIO,
            octave_count: 7,
        }
    }

    /// Temperament with the given ratio (clamped) and a derived octave count.
    pub fn with_ratio(ratio: f64) -> Self {
        let mut t = Self::new();
        t.set_interval_ratio(ratio);
        t
    }

    /// Set the interval ratio, silently clamping into [0.001, 3.000], and
    /// recompute the cached octave count.
    pub fn set_interval_ratio(&mut self, ratio: f64) {
        self.interval_ratio = ratio.clamp(RATIO_MIN, RATIO_MAX);
        self.octave_count = derive_octave_count(self.interval_ratio);
    }

    pub fn interval_ratio(&self) -> f64 {
        self.interval_ratio
    }

    /// Cached octave count. Recomputed only by `set_interval_ratio`.
    pub fn octave_count(&self) -> u32 {
        self.octave_count
    }

    /// Frequency of a pitch index under the current ratio.
    ///
    /// Pure and unfiltered: extreme indices yield frequencies far outside
    /// the audible band, and the caller decides what is displayable.
    #[inline]
    pub fn frequency_of(&self, pitch: PitchId) -> f64 {
        REFERENCE_FREQUENCY_HZ * self.interval_ratio.powi(pitch - REFERENCE_PITCH)
    }

    /// The derived keyboard: `octave_count() × 12` pitches upward from A0.
    ///
    /// Regenerated on every call so a ratio change is always reflected.
    pub fn all_pitches(&self) -> Vec<PitchInfo> {
        let span = self.octave_count as i32 * 12;
        (KEYBOARD_ANCHOR..KEYBOARD_ANCHOR + span)
            .map(|pitch| PitchInfo {
                pitch,
                name: name_of(pitch),
                frequency_hz: self.frequency_of(pitch),
                black_key: is_black_key(pitch),
            })
            .collect()
    }
}

impl Default for Temperament {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_octave_count(ratio: f64) -> u32 {
    let audible = AUDIBLE_LOW_HZ..=AUDIBLE_HIGH_HZ;
    let mut counted = 0u32;

    // Upward from the reference, multiplying by the ratio. The reference
    // itself counts as the first step.
    let mut frequency = REFERENCE_FREQUENCY_HZ;
    while audible.contains(&frequency) && counted < MAX_SPAN_NOTES {
        counted += 1;
        frequency *= ratio;
    }

    // Downward from just below the reference, dividing.
    let mut below = 0u32;
    let mut frequency = REFERENCE_FREQUENCY_HZ / ratio;
    while audible.contains(&frequency) && below < MAX_SPAN_NOTES {
        below += 1;
        frequency /= ratio;
    }

    ((counted + below) / NOTES_PER_OCTAVE_COUNT).max(1)
}

/// Note name for a pitch index: letter, accidental, octave ("C4", "A#0").
pub fn name_of(pitch: PitchId) -> String {
    let letter = NOTE_NAMES[pitch.rem_euclid(12) as usize];
    let octave = pitch.div_euclid(12) - 1;
    format!("{letter}{octave}")
}

/// Pitch index for a note letter (with optional accidental) and octave.
/// `pitch_of("C", 4)` == 60, `pitch_of("A", 4)` == 69.
pub fn pitch_of(name: &str, octave: i32) -> Option<PitchId> {
    let offset = match name.to_ascii_uppercase().as_str() {
        "C" => 0,
        "C#" | "DB" => 1,
        "D" => 2,
        "D#" | "EB" => 3,
        "E" => 4,
        "F" => 5,
        "F#" | "GB" => 6,
        "G" => 7,
        "G#" | "AB" => 8,
        "A" => 9,
        "A#" | "BB" => 10,
        "B" => 11,
        _ => return None,
    };
    Some((octave + 1) * 12 + offset)
}

/// True for the five raised keys of each octave (C#, D#, F#, G#, A#).
pub fn is_black_key(pitch: PitchId) -> bool {
    matches!(pitch.rem_euclid(12), 1 | 3 | 6 | 8 | 10)
}
