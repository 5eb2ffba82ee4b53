//! Per-channel analyzers and the result arrays handed to the handler.
//!
//! [`TrackerPool`] is indexed by channel number and only ever grows: a
//! buffer with more channels than seen so far appends trackers, a buffer
//! with fewer leaves the extra trackers alone.  [`ResultBuffer`] mirrors the
//! pool with one pitch and one amplitude slot per channel.

use std::sync::Arc;

use crate::analyzer::{AnalyzerFactory, PitchAnalyzer, PitchReading};

// ---------------------------------------------------------------------------
// ChannelTracker
// ---------------------------------------------------------------------------

/// One channel's analyzer and its latest reading.
pub struct ChannelTracker {
    analyzer: Box<dyn PitchAnalyzer>,
    last: PitchReading,
}

impl ChannelTracker {
    /// Amplitude from the latest analyzed block.
    pub fn last_amplitude(&self) -> f32 {
        self.last.amplitude
    }

    /// Frequency from the latest analyzed block.
    pub fn last_frequency(&self) -> f32 {
        self.last.frequency
    }
}

// ---------------------------------------------------------------------------
// TrackerPool
// ---------------------------------------------------------------------------

/// Growable arena of channel trackers.
///
/// Every analyzer is created through the pool's factory with the sample rate
/// of the buffer that revealed its channel and the pool's fixed
/// `window`/`threshold`.  [`teardown`](Self::teardown) drops them all once.
pub struct TrackerPool {
    factory: Arc<dyn AnalyzerFactory>,
    window: u32,
    threshold: u32,
    trackers: Vec<ChannelTracker>,
}

impl TrackerPool {
    pub fn new(factory: Arc<dyn AnalyzerFactory>, window: u32, threshold: u32) -> Self {
        Self {
            factory,
            window,
            threshold,
            trackers: Vec::new(),
        }
    }

    /// Append trackers until there is one per channel.
    ///
    /// Existing trackers are never replaced or reordered.
    pub fn ensure_channels(&mut self, channel_count: usize, sample_rate: u32) {
        while self.trackers.len() < channel_count {
            log::debug!(
                "tracker pool: creating analyzer for channel {} ({} Hz)",
                self.trackers.len(),
                sample_rate
            );
            let analyzer = self
                .factory
                .create(sample_rate, self.window, self.threshold);
            self.trackers.push(ChannelTracker {
                analyzer,
                last: PitchReading::default(),
            });
        }
    }

    /// Feed `samples` to the tracker of `channel` and read it back.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= len()`; call
    /// [`ensure_channels`](Self::ensure_channels) first.
    pub fn analyze(&mut self, channel: usize, samples: &[f32]) -> PitchReading {
        let tracker = &mut self.trackers[channel];
        tracker.analyzer.analyze(samples);
        tracker.last = tracker.analyzer.read();
        tracker.last
    }

    /// Tracker of `channel`, if that channel has been seen.
    pub fn get(&self, channel: usize) -> Option<&ChannelTracker> {
        self.trackers.get(channel)
    }

    /// Number of channels with an analyzer.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Returns `true` before the first buffer and after teardown.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Drop every analyzer and empty the pool.  Repeated calls are no-ops.
    pub fn teardown(&mut self) {
        if !self.trackers.is_empty() {
            log::debug!("tracker pool: destroying {} analyzers", self.trackers.len());
            self.trackers.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// ResultBuffer
// ---------------------------------------------------------------------------

/// Per-channel pitch and amplitude, updated in place by every analysis pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBuffer {
    pub pitch: Vec<f32>,
    pub amplitude: Vec<f32>,
}

impl ResultBuffer {
    /// Grow both arrays with zeros to at least `len` entries.  Never shrinks.
    pub fn ensure_len(&mut self, len: usize) {
        if self.pitch.len() < len {
            self.pitch.resize(len, 0.0);
        }
        if self.amplitude.len() < len {
            self.amplitude.resize(len, 0.0);
        }
    }

    /// Store `reading` in slot `channel`.
    pub fn record(&mut self, channel: usize, reading: PitchReading) {
        self.pitch[channel] = reading.frequency;
        self.amplitude[channel] = reading.amplitude;
    }

    /// Zero every pitch; amplitudes keep their last value.
    pub fn reset_pitch(&mut self) {
        self.pitch.iter_mut().for_each(|p| *p = 0.0);
    }

    /// Number of channels reported.
    pub fn len(&self) -> usize {
        self.pitch.len()
    }

    /// Returns `true` until the first buffer is analyzed.
    pub fn is_empty(&self) -> bool {
        self.pitch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
