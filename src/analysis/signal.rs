// Signal primitives - amplitude and musical pitch conversions
//
// Pure, stateless helpers shared by the estimators and the presentation
// layer. Pitch conversions use 12-tone equal temperament with A4 = 440 Hz.

/// Reference pitch for note and semitone conversions
pub const A4_HZ: f64 = 440.0;

/// MIDI note number of A4
const A4_MIDI: f64 = 69.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Root-mean-square amplitude of a frame
///
/// Returns 0 for an empty frame.
pub fn root_mean_square(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_squares / frame.len() as f64).sqrt()
}

/// Convert a frequency to its nearest note name, e.g. `440.0` -> `"A4"`
pub fn frequency_to_note_name(hz: f64) -> String {
    let note_number = (12.0 * (hz / A4_HZ).log2() + A4_MIDI).round() as i64;
    let name = NOTE_NAMES[note_number.rem_euclid(12) as usize];
    let octave = note_number.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Signed semitone distance from A4
pub fn frequency_to_semitones(hz: f64) -> f64 {
    12.0 * (hz / A4_HZ).log2()
}

/// Typical speaking pitch ranges used for practice targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceRange {
    Male,
    Female,
    Androgynous,
}

impl VoiceRange {
    pub fn all() -> [VoiceRange; 3] {
        [VoiceRange::Male, VoiceRange::Female, VoiceRange::Androgynous]
    }

    /// (min, max) in Hz
    pub fn bounds(self) -> (f64, f64) {
        match self {
            VoiceRange::Male => (85.0, 180.0),
            VoiceRange::Female => (165.0, 255.0),
            VoiceRange::Androgynous => (145.0, 200.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoiceRange::Male => "male",
            VoiceRange::Female => "female",
            VoiceRange::Androgynous => "androgynous",
        }
    }

    pub fn contains(self, hz: f64) -> bool {
        let (min, max) = self.bounds();
        hz >= min && hz <= max
    }
}
