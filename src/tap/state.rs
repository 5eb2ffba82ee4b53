//! Tap state machine and the per-tap configuration.
//!
//! [`TapState`] is the single flag the controller, the consumer thread and
//! caller threads agree on.  [`TapConfig`] is the slot the tap occupies on its
//! node.

// ---------------------------------------------------------------------------
// TapState
// ---------------------------------------------------------------------------

/// States of a pitch tap.
///
/// ```text
/// Stopped ──start()──▶ Started
/// Started ──stop() / dispose()──▶ Stopped
/// Started ──set_bus() / set_input()──▶ Started   (stop + start, one critical section)
/// ```
///
/// `Started` only records intent: when the node is detached at `start()` the
/// tap is `Started` without a physical tap (see `PitchTap::is_installed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapState {
    /// No tap is wanted; buffers that still arrive are discarded.
    #[default]
    Stopped,
    /// The tap is wanted and buffers are analyzed.
    Started,
}

impl TapState {
    /// Returns `true` for [`TapState::Started`].
    pub fn is_started(&self) -> bool {
        matches!(self, TapState::Started)
    }

    /// A short human-readable label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            TapState::Stopped => "Stopped",
            TapState::Started => "Started",
        }
    }
}

// ---------------------------------------------------------------------------
// TapConfig
// ---------------------------------------------------------------------------

/// Frames per analyzed buffer unless the caller asks otherwise.
pub const DEFAULT_BUFFER_SIZE: u32 = 4_096;

/// Where and how large the tap is.
///
/// `buffer_size` never changes after construction.  `bus` may change, which
/// re-installs a started tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapConfig {
    pub buffer_size: u32,
    pub bus: usize,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            bus: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_stopped() {
        assert_eq!(TapState::default(), TapState::Stopped);
        assert!(!TapState::Stopped.is_started());
        assert!(TapState::Started.is_started());
    }

    #[test]
    fn labels() {
        assert_eq!(TapState::Stopped.label(), "Stopped");
        assert_eq!(TapState::Started.label(), "Started");
    }

    #[test]
    fn default_config() {
        let cfg = TapConfig::default();
        assert_eq!(cfg.buffer_size, 4_096);
        assert_eq!(cfg.bus, 0);
    }
}
