//! Frequency → equal-tempered note conversion (A4 = 440 Hz).

use std::fmt;

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The nearest note to a frequency, with the deviation in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// MIDI note number (69 = A4).
    pub midi: u8,
    /// Deviation from the note, `-50.0 ..= 50.0` for in-range input.
    pub cents: f32,
}

impl Note {
    /// Nearest note to `frequency`, or `None` for non-positive input.
    pub fn from_frequency(frequency: f32) -> Option<Self> {
        if frequency.is_nan() || frequency <= 0.0 {
            return None;
        }
        let exact = 69.0 + 12.0 * (frequency / 440.0).log2();
        let midi = exact.round().clamp(0.0, 127.0) as u8;
        let cents = 1200.0 * (frequency / Self::frequency_of(midi)).log2();
        Some(Self { midi, cents })
    }

    /// Frequency of MIDI note `midi` in Hz.
    pub fn frequency_of(midi: u8) -> f32 {
        440.0 * 2.0f32.powf((midi as f32 - 69.0) / 12.0)
    }

    /// Note name without octave, e.g. `"C#"`.
    pub fn name(&self) -> &'static str {
        NAMES[(self.midi % 12) as usize]
    }

    /// Octave in scientific pitch notation (middle C = C4).
    pub fn octave(&self) -> i32 {
        (self.midi / 12) as i32 - 1
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {:+.0}¢", self.name(), self.octave(), self.cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn a440_is_a4() {
        let note = Note::from_frequency(440.0).unwrap();
        assert_eq!(note.midi, 69);
        assert_eq!(note.name(), "A");
        assert_eq!(note.octave(), 4);
        assert_abs_diff_eq!(note.cents, 0.0, epsilon = 0.01);
    }

    #[test]
    fn middle_c_and_sharps() {
        assert_eq!(Note::from_frequency(261.63).unwrap().to_string(), "C4 +0¢");
        let c_sharp = Note::from_frequency(277.18).unwrap();
        assert_eq!(c_sharp.name(), "C#");
        assert_eq!(c_sharp.octave(), 4);
    }

    #[test]
    fn cents_offset_sign() {
        // 10 cents sharp of A4
        let sharp = Note::from_frequency(440.0 * 2.0f32.powf(10.0 / 1200.0)).unwrap();
        assert_eq!(sharp.midi, 69);
        assert_abs_diff_eq!(sharp.cents, 10.0, epsilon = 0.05);

        let flat = Note::from_frequency(440.0 * 2.0f32.powf(-30.0 / 1200.0)).unwrap();
        assert_eq!(flat.midi, 69);
        assert_abs_diff_eq!(flat.cents, -30.0, epsilon = 0.05);
    }

    #[test]
    fn non_positive_frequency_has_no_note() {
        assert!(Note::from_frequency(0.0).is_none());
        assert!(Note::from_frequency(-5.0).is_none());
        assert!(Note::from_frequency(f32::NAN).is_none());
    }

    #[test]
    fn frequency_of_round_trips_a4() {
        assert_abs_diff_eq!(Note::frequency_of(69), 440.0, epsilon = 1e-3);
        assert_abs_diff_eq!(Note::frequency_of(81), 880.0, epsilon = 1e-2);
    }
}
