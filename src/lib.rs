//! Real-time pitch tracking tap for audio graph nodes.
//!
//! A [`PitchTap`] sits on one bus of a [`TapNode`], analyzes every buffer
//! that flows through it with one [`PitchAnalyzer`] per channel, and reports
//! per-channel pitch and amplitude to a handler on a dedicated consumer
//! thread.  The render thread only ever truncates a buffer and queues it.
//!
//! - [`tap`]: controller, tracker pool, render → consumer dispatcher
//! - [`analyzer`]: analyzer traits and the built-in YIN tracker
//! - [`audio`]: PCM blocks and the cpal microphone node
//! - [`config`]: TOML settings

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod tap;

pub use analyzer::{AnalyzerFactory, PitchAnalyzer, PitchReading};
pub use audio::AudioBuffer;
pub use tap::{PitchTap, TapNode, TapState};
