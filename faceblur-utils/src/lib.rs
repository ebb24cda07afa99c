//! Common helpers shared across the faceblur crates.

/// Application configuration and settings management.
pub mod config;
/// Test fixture loading and path resolution.
pub mod fixtures;
/// Image decoding, encoding, resizing, and tensor layout conversion.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use log::LevelFilter;

pub use config::{
    AppSettings, CompositingSettings, DetectionSettings, InputDimensions, ObscureStyle,
    ResizeQuality, TelemetrySettings,
};
pub use fixtures::{fixture_path, fixtures_dir, load_fixture_bytes, load_fixture_json};
pub use image_utils::{decode_image, encode_png, resize_image, rgb_to_normalized_chw};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Install an `env_logger` backend for binaries and test harnesses embedding the crates.
///
/// `RUST_LOG` overrides `default_filter`. Timing records on [`telemetry::TELEMETRY_TARGET`] are
/// always let through so [`TelemetrySettings`] alone decides whether they appear. Returns `false`
/// when a logger was already installed.
pub fn init_logging(default_filter: LevelFilter) -> bool {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    )
    .filter(Some(telemetry::TELEMETRY_TARGET), LevelFilter::Trace)
    .is_test(cfg!(test))
    .try_init()
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_installs_once() {
        init_logging(LevelFilter::Warn);
        assert!(!init_logging(LevelFilter::Debug));
        assert!(log::log_enabled!(target: telemetry::TELEMETRY_TARGET, log::Level::Trace));
    }
}
