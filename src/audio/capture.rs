//! Microphone as a tappable node, via `cpal`.
//!
//! [`MicrophoneNode`] exposes the default input device as a [`TapNode`] with
//! a single bus (0).  Installing a tap starts a dedicated stream thread that
//! owns the `cpal::Stream` (which is not `Send` on every platform); removing
//! the tap stops and joins that thread.
//!
//! Device callbacks arrive in whatever block size the driver picks, so a
//! [`FrameAccumulator`] collects them into `buffer_size`-frame
//! [`AudioBuffer`]s before handing them to the tap block, like a graph tap
//! would.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use thiserror::Error;

use super::AudioBuffer;
use crate::tap::{TapBlock, TapNode};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query the input device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("input device {0:?} is no longer available")]
    DeviceGone(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// FrameAccumulator
// ---------------------------------------------------------------------------

/// Collects interleaved device blocks into fixed-size de-interleaved buffers.
pub struct FrameAccumulator {
    channels: Vec<Vec<f32>>,
    frames: usize,
    sample_rate: u32,
    block: TapBlock,
}

impl FrameAccumulator {
    pub fn new(channel_count: usize, frames: usize, sample_rate: u32, block: TapBlock) -> Self {
        let frames = frames.max(1);
        Self {
            channels: vec![Vec::with_capacity(frames); channel_count.max(1)],
            frames,
            sample_rate,
            block,
        }
    }

    /// Append one interleaved device block, emitting every full buffer.
    /// A trailing partial frame is ignored.
    pub fn push_interleaved(&mut self, data: &[f32]) {
        let channel_count = self.channels.len();
        for frame in data.chunks_exact(channel_count) {
            for (ch, &sample) in self.channels.iter_mut().zip(frame) {
                ch.push(sample);
            }
            if self.channels[0].len() == self.frames {
                self.emit();
            }
        }
    }

    fn emit(&mut self) {
        let frames = self.frames;
        let full = self
            .channels
            .iter_mut()
            .map(|ch| std::mem::replace(ch, Vec::with_capacity(frames)))
            .collect();
        (self.block)(AudioBuffer::new(full, self.sample_rate));
    }
}

// ---------------------------------------------------------------------------
// MicrophoneNode
// ---------------------------------------------------------------------------

/// The only bus a microphone has.
pub const MICROPHONE_BUS: usize = 0;

struct StreamWorker {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Default input device wrapped as a [`TapNode`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pitch_tap::audio::MicrophoneNode;
///
/// let mic = Arc::new(MicrophoneNode::new().unwrap());
/// println!("{} @ {} Hz, {} ch", mic.device_name(), mic.sample_rate(), mic.channels());
/// ```
pub struct MicrophoneNode {
    device_name: String,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    worker: Mutex<Option<StreamWorker>>,
}

impl MicrophoneNode {
    /// Use the system default input device with its preferred configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or a device query error from cpal.
    pub fn new() -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let device_name = device.name()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device_name,
            config,
            sample_rate,
            channels,
            worker: Mutex::new(None),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Build and play the stream on the current thread, then park until
    /// `stop` fires or its sender is dropped.
    fn run_stream(
        device_name: &str,
        config: &cpal::StreamConfig,
        mut accumulator: FrameAccumulator,
        stop: mpsc::Receiver<()>,
    ) -> Result<(), CaptureError> {
        let device = find_input_device(device_name)
            .ok_or_else(|| CaptureError::DeviceGone(device_name.to_owned()))?;

        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                accumulator.push_interleaved(data);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;
        stream.play()?;

        let _ = stop.recv();
        Ok(())
    }
}

fn find_input_device(name: &str) -> Option<cpal::Device> {
    cpal::default_host()
        .input_devices()
        .ok()?
        .find(|device| device.name().is_ok_and(|n| n == name))
}

impl TapNode for MicrophoneNode {
    /// The device is still present on the default host.
    fn is_attached(&self) -> bool {
        find_input_device(&self.device_name).is_some()
    }

    fn install_tap(&self, bus: usize, buffer_size: u32, block: TapBlock) {
        if bus != MICROPHONE_BUS {
            log::warn!("microphone: no bus {bus}; only bus {MICROPHONE_BUS} exists");
            return;
        }
        self.remove_tap(bus);

        let accumulator = FrameAccumulator::new(
            self.channels as usize,
            buffer_size as usize,
            self.sample_rate,
            block,
        );
        let device_name = self.device_name.clone();
        let config = self.config.clone();
        let (stop_tx, stop_rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("mic-tap-stream".into())
            .spawn(move || {
                if let Err(e) = Self::run_stream(&device_name, &config, accumulator, stop_rx) {
                    log::error!("microphone: {e}");
                }
            });

        match spawned {
            Ok(thread) => {
                log::info!(
                    "microphone: tap started ({}, {} Hz, {} ch, {} frames)",
                    self.device_name,
                    self.sample_rate,
                    self.channels,
                    buffer_size
                );
                *self.worker.lock() = Some(StreamWorker {
                    stop: stop_tx,
                    thread,
                });
            }
            Err(e) => log::error!("microphone: failed to spawn stream thread: {e}"),
        }
    }

    fn remove_tap(&self, bus: usize) {
        if bus != MICROPHONE_BUS {
            return;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            if worker.thread.join().is_err() {
                log::error!("microphone: stream thread panicked");
            }
            log::info!("microphone: tap stopped");
        }
    }
}

impl Drop for MicrophoneNode {
    fn drop(&mut self) {
        self.remove_tap(MICROPHONE_BUS);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn collecting(channels: usize, frames: usize) -> (FrameAccumulator, Arc<Mutex<Vec<AudioBuffer>>>) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let out_clone = Arc::clone(&out);
        let acc = FrameAccumulator::new(
            channels,
            frames,
            48_000,
            Box::new(move |buf| out_clone.lock().push(buf)),
        );
        (acc, out)
    }

    #[test]
    fn microphone_node_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MicrophoneNode>();
    }

    #[test]
    fn accumulates_small_blocks_into_full_buffers() {
        let (mut acc, out) = collecting(2, 4);

        acc.push_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert!(out.lock().is_empty());

        acc.push_interleaved(&[4.0, -4.0, 5.0, -5.0]);
        let out = out.lock();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].channel(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out[0].channel(1), &[-1.0, -2.0, -3.0, -4.0]);
        assert_eq!(out[0].sample_rate(), 48_000);
    }

    #[test]
    fn large_block_emits_several_buffers() {
        let (mut acc, out) = collecting(1, 3);
        acc.push_interleaved(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let out = out.lock();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].channel(0), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn partial_frames_are_ignored() {
        let (mut acc, out) = collecting(2, 1);
        acc.push_interleaved(&[0.5, 0.25, 0.125]);
        assert_eq!(out.lock().len(), 1);
    }
}
