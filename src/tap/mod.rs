//! Non-destructive pitch tracking tap on an audio graph node.
//!
//! # Architecture
//!
//! ```text
//! TapNode (render thread)
//!        │  TapBlock: truncate to buffer_size
//!        ▼
//! DispatchHandle::submit ──FIFO──▶ Dispatcher thread
//!                                        │  lock
//!                                        ▼
//!                                  PitchTap state == Started?
//!                                        │
//!                                        ├─ TrackerPool::ensure_channels
//!                                        ├─ TrackerPool::analyze (per channel) → ResultBuffer
//!                                        └─ ResultHandler(pitch, amplitude)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pitch_tap::audio::MicrophoneNode;
//! use pitch_tap::tap::PitchTap;
//!
//! let mic = Arc::new(MicrophoneNode::new().unwrap());
//! let tap = PitchTap::new(&mic, 4_096, |pitch, amplitude| {
//!     for (ch, (p, a)) in pitch.iter().zip(amplitude).enumerate() {
//!         println!("ch{ch}: {p:.1} Hz @ {a:.3}");
//!     }
//! })
//! .unwrap();
//! tap.start();
//! ```

pub mod controller;
pub mod dispatch;
pub mod node;
pub mod pool;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{PitchTap, PitchTapBuilder, ResultHandler};
pub use dispatch::{BackpressurePolicy, DispatchError, DispatchHandle, Dispatcher, Unit};
pub use node::{TapBlock, TapNode};
pub use pool::{ChannelTracker, ResultBuffer, TrackerPool};
pub use state::{TapConfig, TapState, DEFAULT_BUFFER_SIZE};
