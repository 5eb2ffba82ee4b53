//! Per-channel pitch/amplitude analyzers.
//!
//! # Architecture
//!
//! ```text
//! AnalyzerFactory::create(sample_rate, window, threshold)
//!        │
//!        ▼
//! Box<dyn PitchAnalyzer>   (one per channel, owned by the TrackerPool)
//!        │  analyze(samples)
//!        ▼
//!   read() → PitchReading { amplitude, frequency }
//! ```
//!
//! Dropping the box destroys the analyzer.  The tap never looks inside an
//! analyzer; any implementation behind these two traits can be plugged in.
//! [`YinFactory`] is the built-in one.

pub mod note;
pub mod window;
pub mod yin;

pub use note::Note;
pub use window::SampleWindow;
pub use yin::{YinFactory, YinTracker};

/// Analysis window handed to every analyzer the tap creates.
pub const DEFAULT_WINDOW: u32 = 4_096;

/// Analyzer threshold handed to every analyzer the tap creates.
pub const DEFAULT_THRESHOLD: u32 = 20;

// ---------------------------------------------------------------------------
// PitchReading
// ---------------------------------------------------------------------------

/// Latest estimate read back from an analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchReading {
    /// Signal level (implementation-defined scale, `0.0` for silence).
    pub amplitude: f32,
    /// Fundamental frequency in Hz (`0.0` until a pitch has been found).
    pub frequency: f32,
}

// ---------------------------------------------------------------------------
// PitchAnalyzer / AnalyzerFactory
// ---------------------------------------------------------------------------

/// One channel's analyzer.
///
/// Implementations keep whatever history they need between calls; the tap
/// calls [`analyze`](Self::analyze) once per buffer and immediately reads the
/// result back.
pub trait PitchAnalyzer: Send {
    /// Feed the next block of samples for this channel.
    fn analyze(&mut self, samples: &[f32]);

    /// Current amplitude and frequency estimate.
    fn read(&self) -> PitchReading;
}

/// Creates analyzers for newly discovered channels.
///
/// Object-safe and `Send + Sync` so the tap can hold it behind an
/// `Arc<dyn AnalyzerFactory>`.
pub trait AnalyzerFactory: Send + Sync {
    fn create(&self, sample_rate: u32, window: u32, threshold: u32) -> Box<dyn PitchAnalyzer>;
}

// Compile-time assertion: Box<dyn AnalyzerFactory> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AnalyzerFactory>, _: Box<dyn PitchAnalyzer>) {}
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use self::testing::{CountingFactory, FactoryStats};
