//! The pitch tap controller.
//!
//! [`PitchTap`] owns the observation point on one bus of a [`TapNode`]:
//! `start()` installs it, `stop()` removes it, and every buffer the node
//! delivers in between is analyzed per channel and reported to the
//! [`ResultHandler`].
//!
//! # Threads
//!
//! ```text
//! render thread     TapBlock: truncate buffer ─▶ DispatchHandle::submit   (no lock)
//!                                                      │ FIFO
//! consumer thread   lock ─▶ still Started? ─▶ TrackerPool grow + analyze ─▶ handler ─▶ unlock
//!
//! caller threads    start / stop / dispose / set_bus / set_input          (same lock)
//! ```
//!
//! A `stop()` racing with queued buffers is settled on the consumer thread:
//! each unit re-checks the state under the lock and discards its buffer if
//! the tap was stopped (or stopped and restarted) after the buffer was
//! queued.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::dispatch::{BackpressurePolicy, DispatchError, DispatchHandle, Dispatcher};
use super::node::{TapBlock, TapNode};
use super::pool::{ResultBuffer, TrackerPool};
use super::state::{TapConfig, TapState, DEFAULT_BUFFER_SIZE};
use crate::analyzer::{AnalyzerFactory, YinFactory, DEFAULT_THRESHOLD, DEFAULT_WINDOW};
use crate::audio::AudioBuffer;

/// Receives `(pitch, amplitude)`, one entry per channel, after every
/// analyzed buffer.
///
/// Runs on the consumer thread while the tap's lock is held, so it must not
/// call back into the same [`PitchTap`].
///
/// Not every rendered buffer reaches the handler.  A buffer still queued when
/// the tap is stopped is discarded, and so is one queued before a restart
/// (`stop()` then `start()`, `set_bus` or `set_input`), even if the tap is
/// started again by the time it would run.
pub type ResultHandler = Box<dyn FnMut(&[f32], &[f32]) + Send>;

// ---------------------------------------------------------------------------
// Inner (everything behind the lock)
// ---------------------------------------------------------------------------

struct Inner {
    state: TapState,
    /// A physical tap is believed to be installed on the node.
    installed: bool,
    /// Bumped on every start; buffers from an older session are discarded.
    session: u64,
    config: TapConfig,
    input: Option<Weak<dyn TapNode>>,
    pool: TrackerPool,
    results: ResultBuffer,
    handler: ResultHandler,
}

impl Inner {
    /// The tapped node, if it still exists and is part of a running graph.
    fn attached_node(&self) -> Option<Arc<dyn TapNode>> {
        match self.input.as_ref().and_then(Weak::upgrade) {
            Some(node) if node.is_attached() => Some(node),
            Some(_) => {
                log::warn!("pitch tap: the tapped node isn't attached to a running graph");
                None
            }
            None => {
                log::warn!("pitch tap: no input node (disposed or dropped)");
                None
            }
        }
    }

    fn start(&mut self, shared: &Weak<Shared>, dispatch: &DispatchHandle) {
        if self.state.is_started() {
            return;
        }
        self.state = TapState::Started;
        self.session = self.session.wrapping_add(1);

        let Some(node) = self.attached_node() else {
            return;
        };

        let TapConfig { buffer_size, bus } = self.config;

        // One tap per bus: clear whatever may still sit on this slot.
        node.remove_tap(bus);
        node.install_tap(
            bus,
            buffer_size,
            tap_block(shared.clone(), dispatch.clone(), self.session, buffer_size),
        );
        self.installed = true;
        log::debug!("pitch tap: installed on bus {bus} ({buffer_size} frames)");
    }

    fn stop(&mut self) {
        if let Some(node) = self.attached_node() {
            node.remove_tap(self.config.bus);
            self.installed = false;
            log::debug!("pitch tap: removed from bus {}", self.config.bus);
        }
        self.state = TapState::Stopped;
        self.results.reset_pitch();
    }

    fn analyze(&mut self, buffer: &AudioBuffer) {
        self.pool
            .ensure_channels(buffer.channel_count(), buffer.sample_rate());
        self.results.ensure_len(self.pool.len());

        for (channel, samples) in buffer.channels().enumerate() {
            let reading = self.pool.analyze(channel, samples);
            self.results.record(channel, reading);
        }

        (self.handler)(&self.results.pitch, &self.results.amplitude);
    }
}

struct Shared {
    inner: Mutex<Inner>,
}

impl Shared {
    /// Consumer-thread side of one buffer.
    fn process(&self, session: u64, buffer: AudioBuffer) {
        let mut inner = self.inner.lock();
        if !inner.state.is_started() || inner.session != session {
            return;
        }
        inner.analyze(&buffer);
    }
}

/// The block installed on the node.  Runs on the render thread.
fn tap_block(
    shared: Weak<Shared>,
    dispatch: DispatchHandle,
    session: u64,
    buffer_size: u32,
) -> TapBlock {
    Box::new(move |mut buffer: AudioBuffer| {
        buffer.truncate(buffer_size as usize);
        let shared = shared.clone();
        dispatch.submit(Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.process(session, buffer);
            }
        }));
    })
}

// ---------------------------------------------------------------------------
// PitchTap
// ---------------------------------------------------------------------------

/// Pitch tracking tap on one node.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pitch_tap::audio::MicrophoneNode;
/// use pitch_tap::tap::PitchTap;
///
/// let mic = Arc::new(MicrophoneNode::new().unwrap());
/// let tap = PitchTap::new(&mic, 4_096, |pitch, amplitude| {
///     println!("pitch {pitch:?} amplitude {amplitude:?}");
/// })
/// .unwrap();
///
/// tap.start();
/// // ...
/// tap.dispose();
/// ```
///
/// All methods take `&self`; a `PitchTap` can be shared across threads.
/// Dropping it disposes the tap and destroys every analyzer.
pub struct PitchTap {
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
    buffer_size: u32,
}

impl PitchTap {
    /// Tap `input` with the built-in analyzer and a private consumer thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the consumer thread cannot start.
    pub fn new<N, F>(input: &Arc<N>, buffer_size: u32, handler: F) -> Result<Self, DispatchError>
    where
        N: TapNode + 'static,
        F: FnMut(&[f32], &[f32]) + Send + 'static,
    {
        Self::builder(input).buffer_size(buffer_size).build(handler)
    }

    /// Start configuring a tap on `input`.
    pub fn builder<N: TapNode + 'static>(input: &Arc<N>) -> PitchTapBuilder {
        let input: Weak<N> = Arc::downgrade(input);
        let input: Weak<dyn TapNode> = input;
        PitchTapBuilder {
            input,
            config: TapConfig::default(),
            window: DEFAULT_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            factory: Arc::new(YinFactory),
            dispatcher: None,
            policy: BackpressurePolicy::default(),
        }
    }

    /// Install the tap.  No-op when already started.
    ///
    /// When the node is not attached to a running graph this logs a warning
    /// and leaves the tap `Started` without a physical tap; check
    /// [`is_installed`](Self::is_installed).
    pub fn start(&self) {
        let weak = Arc::downgrade(&self.shared);
        self.shared
            .inner
            .lock()
            .start(&weak, &self.dispatcher.handle());
    }

    /// Remove the tap and zero every pitch value.  Amplitudes are kept.
    pub fn stop(&self) {
        self.shared.inner.lock().stop();
    }

    /// Stop if started and let go of the input node.  Idempotent.
    pub fn dispose(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_started() {
            inner.stop();
        }
        inner.input = None;
    }

    /// Move the tap to `bus`, re-installing it if started.
    pub fn set_bus(&self, bus: usize) {
        let weak = Arc::downgrade(&self.shared);
        let mut inner = self.shared.inner.lock();
        if inner.state.is_started() {
            inner.stop();
            inner.config.bus = bus;
            inner.start(&weak, &self.dispatcher.handle());
        } else {
            inner.config.bus = bus;
        }
    }

    /// Tap a different node, re-installing if started.  Same node → no-op.
    pub fn set_input<N: TapNode + 'static>(&self, input: &Arc<N>) {
        let input: Weak<N> = Arc::downgrade(input);
        let input: Weak<dyn TapNode> = input;
        let weak = Arc::downgrade(&self.shared);
        let mut inner = self.shared.inner.lock();

        if inner
            .input
            .as_ref()
            .is_some_and(|current| Weak::ptr_eq(current, &input))
        {
            return;
        }

        let was_started = inner.state.is_started();
        if was_started {
            inner.stop();
        }
        inner.input = Some(input);
        if was_started {
            inner.start(&weak, &self.dispatcher.handle());
        }
    }

    /// Current state of the tap.
    pub fn state(&self) -> TapState {
        self.shared.inner.lock().state
    }

    /// Returns `true` between `start()` and `stop()`.
    pub fn is_started(&self) -> bool {
        self.state().is_started()
    }

    /// Whether a physical tap is currently installed on the node.
    pub fn is_installed(&self) -> bool {
        self.shared.inner.lock().installed
    }

    /// Bus of the node the tap sits on.
    pub fn bus(&self) -> usize {
        self.shared.inner.lock().config.bus
    }

    /// Frames per analyzed buffer, fixed at construction.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Number of channel analyzers created so far.
    pub fn tracker_count(&self) -> usize {
        self.shared.inner.lock().pool.len()
    }

    /// Snapshot of the per-channel pitch array.
    pub fn pitch(&self) -> Vec<f32> {
        self.shared.inner.lock().results.pitch.clone()
    }

    /// Snapshot of the per-channel amplitude array.
    pub fn amplitude(&self) -> Vec<f32> {
        self.shared.inner.lock().results.amplitude.clone()
    }

    /// The consumer thread this tap hands buffers to.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Block until every buffer queued so far has been processed.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }
}

impl Drop for PitchTap {
    fn drop(&mut self) {
        self.dispose();
        self.shared.inner.lock().pool.teardown();
    }
}

// ---------------------------------------------------------------------------
// PitchTapBuilder
// ---------------------------------------------------------------------------

/// Options for a [`PitchTap`].  Created by [`PitchTap::builder`].
pub struct PitchTapBuilder {
    input: Weak<dyn TapNode>,
    config: TapConfig,
    window: u32,
    threshold: u32,
    factory: Arc<dyn AnalyzerFactory>,
    dispatcher: Option<Dispatcher>,
    policy: BackpressurePolicy,
}

impl PitchTapBuilder {
    /// Frames per analyzed buffer (default 4096).  Fixed for the tap's
    /// lifetime.
    pub fn buffer_size(mut self, buffer_size: u32) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    pub fn bus(mut self, bus: usize) -> Self {
        self.config.bus = bus;
        self
    }

    /// Use a custom analyzer instead of the built-in YIN tracker.
    pub fn analyzer(mut self, factory: Arc<dyn AnalyzerFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Window and threshold passed to every analyzer the tap creates.
    pub fn analyzer_params(mut self, window: u32, threshold: u32) -> Self {
        self.window = window;
        self.threshold = threshold;
        self
    }

    /// Share an existing consumer thread instead of spawning one.
    pub fn dispatcher(mut self, dispatcher: &Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher.clone());
        self
    }

    /// Backpressure for the private consumer thread.  Ignored together with
    /// [`dispatcher`](Self::dispatcher).
    pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if a private consumer thread is
    /// needed and cannot start.
    pub fn build<F>(self, handler: F) -> Result<PitchTap, DispatchError>
    where
        F: FnMut(&[f32], &[f32]) + Send + 'static,
    {
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Dispatcher::spawn(self.policy)?,
        };
        let buffer_size = if self.config.buffer_size == 0 {
            log::warn!("pitch tap: buffer size 0 requested, using {DEFAULT_BUFFER_SIZE}");
            DEFAULT_BUFFER_SIZE
        } else {
            self.config.buffer_size
        };

        let inner = Inner {
            state: TapState::Stopped,
            installed: false,
            session: 0,
            config: TapConfig {
                buffer_size,
                bus: self.config.bus,
            },
            input: Some(self.input),
            pool: TrackerPool::new(self.factory, self.window, self.threshold),
            results: ResultBuffer::default(),
            handler: Box::new(handler),
        };

        Ok(PitchTap {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
            }),
            dispatcher,
            buffer_size,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
