//! Audio blocks and the microphone node.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → FrameAccumulator → AudioBuffer (buffer_size frames)
//!           → TapBlock (installed by PitchTap)
//! ```

pub mod buffer;
pub mod capture;

pub use buffer::AudioBuffer;
pub use capture::{CaptureError, FrameAccumulator, MicrophoneNode, MICROPHONE_BUS};
