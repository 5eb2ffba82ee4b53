//! Configuration for the pitch tap.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per subsystem,
//! `AppPaths` for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AnalyzerSettings, AppConfig, DispatchSettings, TapSettings};
