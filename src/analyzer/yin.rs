//! Built-in sliding-window pitch tracker based on YIN
//! (de Cheveigné & Kawahara, 2002).
//!
//! Each channel gets its own [`YinTracker`].  Incoming blocks slide a window
//! of `window` samples forward; once the window is full every
//! [`analyze`](PitchAnalyzer::analyze) call re-estimates the pitch over it:
//!
//! 1. difference function d(τ) = Σ(x[j] - x[j+τ])²
//! 2. cumulative mean normalized difference d'(τ)
//! 3. first local minimum of d'(τ) below the threshold
//! 4. parabolic interpolation around that minimum
//!
//! The `threshold` argument of [`AnalyzerFactory::create`] is read as the
//! aperiodicity threshold in hundredths, so the default `20` means `0.20`.
//! Amplitude is the RMS of the window.  A window that is silent or has no
//! clear period leaves the previous frequency in place, which is what a tuner
//! display wants between notes.

use super::{AnalyzerFactory, PitchAnalyzer, PitchReading, SampleWindow};

/// Lowest frequency the tracker looks for (Hz).
const MIN_FREQUENCY: f32 = 50.0;
/// Highest frequency the tracker looks for (Hz).
const MAX_FREQUENCY: f32 = 2_000.0;
/// RMS below which a window counts as silence.
const SILENCE_RMS: f32 = 1e-4;
/// Global-minimum fallback is accepted only below this aperiodicity.
const FALLBACK_APERIODICITY: f32 = 0.5;

// ---------------------------------------------------------------------------
// YinFactory
// ---------------------------------------------------------------------------

/// Creates a [`YinTracker`] for every channel the tap discovers.
#[derive(Debug, Clone, Copy, Default)]
pub struct YinFactory;

impl AnalyzerFactory for YinFactory {
    fn create(&self, sample_rate: u32, window: u32, threshold: u32) -> Box<dyn PitchAnalyzer> {
        Box::new(YinTracker::new(sample_rate, window, threshold))
    }
}

// ---------------------------------------------------------------------------
// YinTracker
// ---------------------------------------------------------------------------

/// Per-channel YIN pitch tracker over a sliding window.
pub struct YinTracker {
    sample_rate: f32,
    threshold: f32,
    min_period: usize,
    max_period: usize,
    window: SampleWindow<f32>,

    // Pre-allocated buffers
    frame: Vec<f32>,
    difference: Vec<f32>,
    cumulative_mean: Vec<f32>,

    reading: PitchReading,
}

impl YinTracker {
    pub fn new(sample_rate: u32, window: u32, threshold: u32) -> Self {
        let window = (window as usize).max(2);
        let sample_rate = sample_rate.max(1) as f32;

        let min_period = ((sample_rate / MAX_FREQUENCY).ceil() as usize).max(2);
        // Need at least two periods inside the window.
        let max_period = ((sample_rate / MIN_FREQUENCY) as usize).min(window / 2);

        Self {
            sample_rate,
            threshold: (threshold as f32 / 100.0).clamp(0.01, 0.5),
            min_period,
            max_period,
            window: SampleWindow::new(window),
            frame: Vec::with_capacity(window),
            difference: vec![0.0; max_period + 1],
            cumulative_mean: vec![0.0; max_period + 1],
            reading: PitchReading::default(),
        }
    }

    /// Aperiodicity threshold actually in use (`0.01 ..= 0.5`).
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Estimate the period of `self.frame`, or `None` when it is aperiodic.
    fn detect(&mut self) -> Option<f32> {
        if self.max_period <= self.min_period + 1 {
            return None;
        }
        let max_period = self.max_period;
        let span = self.frame.len() - max_period;

        self.difference[0] = 0.0;
        for tau in 1..=max_period {
            let mut sum = 0.0f32;
            for j in 0..span {
                let delta = self.frame[j] - self.frame[j + tau];
                sum += delta * delta;
            }
            self.difference[tau] = sum;
        }

        self.cumulative_mean[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..=max_period {
            running_sum += self.difference[tau];
            self.cumulative_mean[tau] = if running_sum > 1e-10 {
                self.difference[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        let tau = self.best_period()?;
        let refined = self.parabolic_interpolation(tau);
        Some(self.sample_rate / refined)
    }

    /// First local minimum below the threshold; prevents octave errors.
    fn best_period(&self) -> Option<usize> {
        let (min_period, max_period) = (self.min_period, self.max_period);

        let mut tau = min_period;
        while tau < max_period {
            if self.cumulative_mean[tau] < self.threshold {
                while tau + 1 < max_period
                    && self.cumulative_mean[tau + 1] < self.cumulative_mean[tau]
                {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }

        let (best_tau, best_val) = (min_period..=max_period)
            .map(|tau| (tau, self.cumulative_mean[tau]))
            .fold((min_period, f32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });

        (best_val < FALLBACK_APERIODICITY).then_some(best_tau)
    }

    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        if tau < 1 || tau >= self.max_period {
            return tau as f32;
        }

        let s0 = self.cumulative_mean[tau - 1];
        let s1 = self.cumulative_mean[tau];
        let s2 = self.cumulative_mean[tau + 1];

        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator.abs() > 1e-10 {
            tau as f32 + (s2 - s0) / denominator
        } else {
            tau as f32
        }
    }
}

impl PitchAnalyzer for YinTracker {
    fn analyze(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        self.window.push_slice(samples);
        self.window.copy_ordered(&mut self.frame);

        self.reading.amplitude = rms(&self.frame);
        if !self.window.is_full() || self.reading.amplitude < SILENCE_RMS {
            return;
        }

        if let Some(frequency) = self.detect() {
            self.reading.frequency = frequency;
        }
    }

    fn read(&self) -> PitchReading {
        self.reading
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::analyzer::{DEFAULT_THRESHOLD, DEFAULT_WINDOW};

    fn sine(sample_rate: u32, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    fn tracker(sample_rate: u32) -> YinTracker {
        YinTracker::new(sample_rate, DEFAULT_WINDOW, DEFAULT_THRESHOLD)
    }

    #[test]
    fn detects_a440() {
        let mut yin = tracker(44_100);
        yin.analyze(&sine(44_100, 440.0, 4_096));

        let reading = yin.read();
        assert_relative_eq!(reading.frequency, 440.0, max_relative = 0.01);
        assert_relative_eq!(reading.amplitude, std::f32::consts::FRAC_1_SQRT_2, epsilon = 0.01);
    }

    #[test]
    fn detects_various_frequencies() {
        for &freq in &[100.0_f32, 220.0, 880.0, 1_000.0] {
            let mut yin = tracker(48_000);
            yin.analyze(&sine(48_000, freq, 4_096));
            let got = yin.read().frequency;
            assert!(
                ((got - freq) / freq).abs() < 0.02,
                "expected {freq} Hz, got {got} Hz"
            );
        }
    }

    #[test]
    fn waits_for_a_full_window() {
        let mut yin = tracker(44_100);
        let signal = sine(44_100, 440.0, 4_096);

        yin.analyze(&signal[..2_048]);
        assert_eq!(yin.read().frequency, 0.0);
        assert!(yin.read().amplitude > 0.0);

        yin.analyze(&signal[2_048..]);
        assert_relative_eq!(yin.read().frequency, 440.0, max_relative = 0.01);
    }

    #[test]
    fn silence_reads_zero() {
        let mut yin = tracker(44_100);
        yin.analyze(&vec![0.0; 4_096]);
        assert_eq!(yin.read(), PitchReading::default());
    }

    #[test]
    fn silence_after_note_keeps_last_frequency() {
        let mut yin = tracker(44_100);
        yin.analyze(&sine(44_100, 440.0, 4_096));
        yin.analyze(&vec![0.0; 4_096]);

        let reading = yin.read();
        assert_eq!(reading.amplitude, 0.0);
        assert_relative_eq!(reading.frequency, 440.0, max_relative = 0.01);
    }

    #[test]
    fn threshold_is_read_in_hundredths() {
        assert_relative_eq!(tracker(44_100).threshold(), 0.2);
        assert_relative_eq!(YinTracker::new(44_100, 4_096, 1_000).threshold(), 0.5);
    }

    #[test]
    fn tiny_window_never_detects() {
        let mut yin = YinTracker::new(44_100, 16, DEFAULT_THRESHOLD);
        yin.analyze(&sine(44_100, 440.0, 64));
        assert_eq!(yin.read().frequency, 0.0);
    }

    #[test]
    fn factory_builds_trackers() {
        let mut analyzer = YinFactory.create(44_100, DEFAULT_WINDOW, DEFAULT_THRESHOLD);
        analyzer.analyze(&sine(44_100, 220.0, 4_096));
        assert_relative_eq!(analyzer.read().frequency, 220.0, max_relative = 0.01);
    }
}
