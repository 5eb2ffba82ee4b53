//! `pitch-tap`: live tuner on the default microphone.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Open the default input device as a [`MicrophoneNode`].
//! 4. Build a [`PitchTap`] from the config and start it.
//! 5. Print the detected note per channel until Enter is pressed.
//! 6. Dispose the tap.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pitch_tap::{
    analyzer::{Note, YinFactory},
    audio::{MicrophoneNode, MICROPHONE_BUS},
    config::AppConfig,
    tap::PitchTap,
};

/// Minimum time between two printed lines.
const PRINT_INTERVAL: Duration = Duration::from_millis(250);

/// Amplitude below which a channel is shown as silent.
const SILENT_AMPLITUDE: f32 = 0.01;

fn format_channels(pitch: &[f32], amplitude: &[f32]) -> String {
    pitch
        .iter()
        .zip(amplitude)
        .enumerate()
        .map(|(ch, (&freq, &amp))| match Note::from_frequency(freq) {
            Some(note) if amp >= SILENT_AMPLITUDE => {
                format!("ch{ch}: {note} ({freq:.1} Hz, amp {amp:.3})")
            }
            _ => format!("ch{ch}: --"),
        })
        .collect::<Vec<_>>()
        .join("  |  ")
}

/// The microphone only has an input bus; any other bus would never deliver.
fn check_bus(bus: usize) -> anyhow::Result<()> {
    if bus != MICROPHONE_BUS {
        anyhow::bail!("tap.bus = {bus}, but the microphone only has bus {MICROPHONE_BUS}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("pitch-tap starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Microphone
    let mic = Arc::new(MicrophoneNode::new()?);
    log::info!(
        "Input device: {} ({} Hz, {} ch)",
        mic.device_name(),
        mic.sample_rate(),
        mic.channels()
    );

    // 4. Tap
    check_bus(config.tap.bus)?;
    let mut last_print: Option<Instant> = None;
    let tap = PitchTap::builder(&mic)
        .buffer_size(config.tap.buffer_size)
        .bus(config.tap.bus)
        .analyzer(Arc::new(YinFactory))
        .analyzer_params(config.analyzer.window, config.analyzer.threshold)
        .backpressure(config.dispatch.policy())
        .build(move |pitch, amplitude| {
            if last_print.is_some_and(|t| t.elapsed() < PRINT_INTERVAL) {
                return;
            }
            last_print = Some(Instant::now());
            println!("{}", format_channels(pitch, amplitude));
        })?;

    tap.start();
    if !tap.is_installed() {
        anyhow::bail!("the microphone is not available; no tap was installed");
    }
    log::info!(
        "Tap {} on bus {} ({} frames)",
        tap.state().label(),
        tap.bus(),
        tap.buffer_size()
    );

    // 5. Run until Enter
    println!("Listening, press Enter to stop.");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    // 6. Teardown
    tap.dispose();
    if tap.dispatcher().dropped() > 0 {
        log::warn!("{} buffers were dropped by backpressure", tap.dispatcher().dropped());
    }
    log::info!("pitch-tap stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_and_unvoiced_channels_show_dashes() {
        assert_eq!(format_channels(&[0.0, 440.0], &[0.5, 0.0]), "ch0: --  |  ch1: --");
    }

    #[test]
    fn only_the_microphone_bus_is_accepted() {
        assert!(check_bus(MICROPHONE_BUS).is_ok());
        let err = check_bus(1).unwrap_err();
        assert!(err.to_string().contains("tap.bus = 1"));
    }

    #[test]
    fn voiced_channel_shows_note() {
        let line = format_channels(&[440.0], &[0.5]);
        assert_eq!(line, "ch0: A4 +0¢ (440.0 Hz, amp 0.500)");
    }
}
