//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Every section is
//! `#[serde(default)]`, so a hand-written file only needs the keys it
//! changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::analyzer::{DEFAULT_THRESHOLD, DEFAULT_WINDOW};
use crate::tap::{BackpressurePolicy, DEFAULT_BUFFER_SIZE};

// ---------------------------------------------------------------------------
// TapSettings
// ---------------------------------------------------------------------------

/// Where the tap sits and how large its buffers are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapSettings {
    /// Frames per analyzed buffer.
    pub buffer_size: u32,
    /// Bus of the tapped node.
    pub bus: usize,
}

impl Default for TapSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            bus: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalyzerSettings
// ---------------------------------------------------------------------------

/// Parameters handed to every per-channel analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Analysis window in samples.
    pub window: u32,
    /// Analyzer threshold (the built-in tracker reads it in hundredths).
    pub threshold: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchSettings
// ---------------------------------------------------------------------------

/// Consumer-thread queue settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Maximum queued buffers before new ones are dropped.  `None` (the
    /// default) never drops.
    pub max_pending: Option<usize>,
}

impl DispatchSettings {
    pub fn policy(&self) -> BackpressurePolicy {
        BackpressurePolicy::from_max_pending(self.max_pending)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pitch_tap::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tap: TapSettings,
    pub analyzer: AnalyzerSettings,
    pub dispatch: DispatchSettings,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
