//! Configuration for the ptzcam console.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ptzcam_core::{ControllerOptions, DispatcherConfig, TransportConfig, ViscaLimits};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PtzcamConfig {
    /// Startup camera selection.
    pub camera: CameraConfig,
    /// Live-view controls.
    pub controls: ControlsConfig,
    /// Command pacing and transport timing.
    pub dispatch: DispatchConfig,
    /// VISCA coordinate profile.
    pub visca: ViscaConfig,
    /// Where endpoints and presets are kept.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Startup camera selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CameraConfig {
    /// Endpoint id or name to activate on startup. Empty = stay idle.
    pub endpoint: String,
    /// Whether the video source is assumed connected at startup.
    pub video_connected: bool,
}

/// Live-view controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Horizontal field of view at zoom 0, in degrees.
    pub fov_degrees: f64,
    /// Scale applied to click-to-move vectors.
    pub click_sensitivity: f64,
    /// Zoom change per wheel notch.
    pub scroll_sensitivity: f64,
}

/// Command pacing and transport timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between accepted commands of one kind.
    pub min_command_interval_ms: u64,
    /// Deadline for one camera request.
    pub request_timeout_ms: u64,
    /// Extra attempts after a timeout or send failure. At most one.
    pub retries: u32,
    /// Drive time for Panasonic relative moves.
    pub nudge_ms: u64,
}

/// VISCA coordinate profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViscaConfig {
    /// Limits profile: "wide" or "sony-evi".
    pub limits: String,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `endpoints.json`, `presets.json` and
    /// `profiles.json`.
    pub data_dir: PathBuf,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ControlsConfig {
    fn default() -> Self {
        let dispatch = DispatcherConfig::default();
        Self {
            fov_degrees: dispatch.fov_degrees,
            click_sensitivity: dispatch.click_sensitivity,
            scroll_sensitivity: dispatch.scroll_sensitivity,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            min_command_interval_ms: ptzcam_core::MIN_COMMAND_INTERVAL.as_millis() as u64,
            request_timeout_ms: transport.request_timeout.as_millis() as u64,
            retries: transport.retries,
            nudge_ms: transport.nudge.as_millis() as u64,
        }
    }
}

impl Default for ViscaConfig {
    fn default() -> Self {
        Self {
            limits: "wide".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("ptzcam-data"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl PtzcamConfig {
    /// Read `path`. A missing or unparsable file leaves the console on
    /// built-in settings rather than refusing to start.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::info!(
                    "config {} not read ({e}); starting with built-in settings",
                    path.display()
                );
                return Self::default();
            }
        };
        match toml::from_str(&contents) {
            Ok(config) => {
                tracing::debug!("config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("config {} ignored: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write the built-in settings to `path` as a starting TOML file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let rendered = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, rendered)
    }

    /// Dispatcher settings, clamped to usable ranges.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let defaults = DispatcherConfig::default();
        DispatcherConfig {
            min_command_interval: Duration::from_millis(self.dispatch.min_command_interval_ms.min(5_000)),
            fov_degrees: finite_or(self.controls.fov_degrees, defaults.fov_degrees).clamp(1.0, 179.0),
            click_sensitivity: finite_or(self.controls.click_sensitivity, defaults.click_sensitivity)
                .clamp(0.0, 1.0),
            scroll_sensitivity: finite_or(self.controls.scroll_sensitivity, defaults.scroll_sensitivity)
                .clamp(0.0, 1.0),
        }
    }

    /// Controller settings. An unknown VISCA profile falls back to "wide".
    pub fn to_controller_options(&self) -> ControllerOptions {
        let visca_limits = ViscaLimits::by_name(&self.visca.limits).unwrap_or_else(|| {
            tracing::warn!("unknown visca limits '{}'; using wide", self.visca.limits);
            ViscaLimits::WIDE
        });
        ControllerOptions {
            transport: TransportConfig {
                request_timeout: Duration::from_millis(self.dispatch.request_timeout_ms.clamp(50, 30_000)),
                retries: self.dispatch.retries.min(1),
                nudge: Duration::from_millis(self.dispatch.nudge_ms.clamp(10, 2_000)),
            },
            visca_limits,
            ..ControllerOptions::default()
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

// ── Tests ────────────────────────────────────────────────────────
