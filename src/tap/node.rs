//! The node capability a tap is installed on.
//!
//! A [`TapNode`] is any graph node that can deliver the buffers flowing
//! through one of its buses to an observer without altering them.  The tap
//! only ever holds a `Weak` reference to its node.

use crate::audio::AudioBuffer;

/// Observer block called on the render thread for every buffer.
///
/// It must return quickly: the tap's block only truncates the buffer and
/// queues it for the consumer thread.
pub type TapBlock = Box<dyn FnMut(AudioBuffer) + Send>;

/// A graph node that supports one observation tap per bus.
///
/// # Contract
///
/// - `install_tap` on a bus that already carries a tap replaces it; callers
///   still remove first so they never rely on that.
/// - `remove_tap` on a bus without a tap is a no-op.
/// - Both are only meaningful while [`is_attached`](Self::is_attached) is
///   `true`.
pub trait TapNode: Send + Sync {
    /// Whether the node is part of a running processing graph.
    fn is_attached(&self) -> bool;

    /// Start delivering `buffer_size`-frame buffers from `bus` to `block`.
    fn install_tap(&self, bus: usize, buffer_size: u32, block: TapBlock);

    /// Stop delivering buffers from `bus` and drop its block.
    fn remove_tap(&self, bus: usize);
}

// Compile-time assertion: Box<dyn TapNode> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TapNode>) {}
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use self::testing::{MockNode, NodeEvent};

#[cfg(test)]
mod testing {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::{TapBlock, TapNode};
    use crate::audio::AudioBuffer;

    /// A physical operation performed on a [`MockNode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum NodeEvent {
        Install { bus: usize, buffer_size: u32 },
        Remove { bus: usize },
    }

    /// In-memory node: records every install/remove and lets the test play
    /// the render thread with [`render`](Self::render).
    pub struct MockNode {
        attached: Mutex<bool>,
        events: Mutex<Vec<NodeEvent>>,
        taps: Mutex<HashMap<usize, TapBlock>>,
    }

    impl MockNode {
        pub fn attached() -> Self {
            Self {
                attached: Mutex::new(true),
                events: Mutex::new(Vec::new()),
                taps: Mutex::new(HashMap::new()),
            }
        }

        pub fn detached() -> Self {
            let node = Self::attached();
            node.set_attached(false);
            node
        }

        pub fn set_attached(&self, attached: bool) {
            *self.attached.lock() = attached;
        }

        pub fn events(&self) -> Vec<NodeEvent> {
            self.events.lock().clone()
        }

        pub fn installs(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, NodeEvent::Install { .. }))
                .count()
        }

        pub fn has_tap(&self, bus: usize) -> bool {
            self.taps.lock().contains_key(&bus)
        }

        /// Deliver `buffer` to the tap on `bus`, as the render thread would.
        /// Returns `false` when no tap is installed there.
        pub fn render(&self, bus: usize, buffer: AudioBuffer) -> bool {
            match self.taps.lock().get_mut(&bus) {
                Some(block) => {
                    block(buffer);
                    true
                }
                None => false,
            }
        }
    }

    impl TapNode for MockNode {
        fn is_attached(&self) -> bool {
            *self.attached.lock()
        }

        fn install_tap(&self, bus: usize, buffer_size: u32, block: TapBlock) {
            self.events
                .lock()
                .push(NodeEvent::Install { bus, buffer_size });
            self.taps.lock().insert(bus, block);
        }

        fn remove_tap(&self, bus: usize) {
            self.events.lock().push(NodeEvent::Remove { bus });
            self.taps.lock().remove(&bus);
        }
    }
}
