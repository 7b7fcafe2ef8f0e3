//! Endpoint and preset records shared by the dispatcher, the stores
//! and the geometry layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::{NormalizedPosition, clamp_pan_tilt, clamp_zoom};
use crate::error::PtzError;

/// VISCA-over-IP listens on UDP 52381.
pub const VISCA_DEFAULT_PORT: u16 = 52381;
/// Panasonic AW CGI is served on HTTP 80.
pub const PANASONIC_DEFAULT_PORT: u16 = 80;
/// BirdDog REST API is served on HTTP 8080.
pub const BIRDDOG_DEFAULT_PORT: u16 = 8080;

/// Preset names are cut to this many characters.
pub const MAX_PRESET_NAME_CHARS: usize = 100;

// ── Protocol ─────────────────────────────────────────────────────

/// Supported PTZ control protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Ndi,
    Visca,
    PanasonicAw,
    BirdDogRest,
    Simulated,
}

impl Protocol {
    /// The port a new endpoint of this protocol should default to.
    pub const fn default_port(self) -> Option<u16> {
        match self {
            Protocol::Visca => Some(VISCA_DEFAULT_PORT),
            Protocol::PanasonicAw => Some(PANASONIC_DEFAULT_PORT),
            Protocol::BirdDogRest => Some(BIRDDOG_DEFAULT_PORT),
            Protocol::Ndi | Protocol::Simulated => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ndi => write!(f, "NDI"),
            Protocol::Visca => write!(f, "VISCA"),
            Protocol::PanasonicAw => write!(f, "Panasonic AW"),
            Protocol::BirdDogRest => write!(f, "BirdDog"),
            Protocol::Simulated => write!(f, "Simulated"),
        }
    }
}

// ── ProtocolConfig ───────────────────────────────────────────────

/// Protocol-specific connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum ProtocolConfig {
    Ndi,
    Visca {
        host: String,
        port: u16,
    },
    PanasonicAw {
        host: String,
        port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    BirdDogRest {
        host: String,
        port: u16,
    },
    #[default]
    Simulated,
}

impl ProtocolConfig {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolConfig::Ndi => Protocol::Ndi,
            ProtocolConfig::Visca { .. } => Protocol::Visca,
            ProtocolConfig::PanasonicAw { .. } => Protocol::PanasonicAw,
            ProtocolConfig::BirdDogRest { .. } => Protocol::BirdDogRest,
            ProtocolConfig::Simulated => Protocol::Simulated,
        }
    }

    /// `host:port` for network protocols.
    pub fn address(&self) -> Option<String> {
        match self {
            ProtocolConfig::Visca { host, port }
            | ProtocolConfig::PanasonicAw { host, port, .. }
            | ProtocolConfig::BirdDogRest { host, port } => Some(format!("{host}:{port}")),
            ProtocolConfig::Ndi | ProtocolConfig::Simulated => None,
        }
    }

    /// Reject configurations that can never reach a camera.
    pub fn validate(&self) -> Result<(), PtzError> {
        match self {
            ProtocolConfig::Visca { host, port }
            | ProtocolConfig::PanasonicAw { host, port, .. }
            | ProtocolConfig::BirdDogRest { host, port } => {
                validate_host(host)?;
                if *port == 0 {
                    return Err(PtzError::InvalidConfig("port must be non-zero".into()));
                }
                Ok(())
            }
            ProtocolConfig::Ndi | ProtocolConfig::Simulated => Ok(()),
        }
    }
}

/// Accept a bare hostname or IP literal; reject anything URL-shaped.
pub fn validate_host(host: &str) -> Result<(), PtzError> {
    if host.is_empty() {
        return Err(PtzError::InvalidConfig("host is empty".into()));
    }
    if host.len() > 253 {
        return Err(PtzError::InvalidConfig("host is too long".into()));
    }
    if host.contains("://") {
        return Err(PtzError::InvalidConfig(format!(
            "host must not include a scheme: {host}"
        )));
    }
    if let Some(bad) = host
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | '\\'))
    {
        return Err(PtzError::InvalidConfig(format!(
            "host contains {bad:?}: {host}"
        )));
    }
    Ok(())
}

// ── CameraEndpoint ───────────────────────────────────────────────

/// A configured camera reachable through one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEndpoint {
    pub id: String,
    pub name: String,
    pub protocol: Protocol,
    pub config: ProtocolConfig,
}

impl CameraEndpoint {
    /// New endpoint with a fresh id; `protocol` follows `config`.
    pub fn new(name: impl Into<String>, config: ProtocolConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            protocol: config.protocol(),
            config,
        }
    }

    pub fn validate(&self) -> Result<(), PtzError> {
        if self.protocol != self.config.protocol() {
            return Err(PtzError::InvalidConfig(format!(
                "endpoint '{}' declares {} but is configured for {}",
                self.name,
                self.protocol,
                self.config.protocol()
            )));
        }
        self.config.validate()
    }
}

// ── Preset ───────────────────────────────────────────────────────

/// A named, saved normalized position plus its overlay colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
    pub color: String,
}

impl Preset {
    /// Build a preset from a position. The name is trimmed and capped;
    /// an empty name is rejected.
    pub fn new(
        name: &str,
        position: NormalizedPosition,
        color: impl Into<String>,
    ) -> Result<Self, PtzError> {
        let name = clean_name(name)?;
        let position = position.clamped();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            pan: position.pan,
            tilt: position.tilt,
            zoom: position.zoom,
            color: color.into(),
        })
    }

    pub fn position(&self) -> NormalizedPosition {
        NormalizedPosition {
            pan: self.pan,
            tilt: self.tilt,
            zoom: self.zoom,
        }
        .clamped()
    }

    /// Check an externally edited preset before it is stored.
    pub fn sanitized(mut self) -> Result<Self, PtzError> {
        if !self.pan.is_finite() || !self.tilt.is_finite() || !self.zoom.is_finite() {
            return Err(PtzError::InvalidInput(
                "preset values must be finite numbers".into(),
            ));
        }
        self.name = clean_name(&self.name)?;
        self.pan = clamp_pan_tilt(self.pan).unwrap_or_default();
        self.tilt = clamp_pan_tilt(self.tilt).unwrap_or_default();
        self.zoom = clamp_zoom(self.zoom).unwrap_or_default();
        Ok(self)
    }
}

// ── PresetProfile ────────────────────────────────────────────────

/// A named snapshot of the preset list, the field of view it was laid out
/// with and, optionally, the endpoint it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetProfile {
    pub id: String,
    pub name: String,
    pub camera_fov_degrees: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl PresetProfile {
    pub fn new(
        name: &str,
        camera_fov_degrees: f64,
        endpoint_id: Option<String>,
        presets: Vec<Preset>,
    ) -> Result<Self, PtzError> {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            camera_fov_degrees,
            endpoint_id,
            presets,
        }
        .sanitized()
    }

    /// Clamp the FOV into 1..=179 degrees and sanitize every preset.
    pub fn sanitized(mut self) -> Result<Self, PtzError> {
        if !self.camera_fov_degrees.is_finite() {
            return Err(PtzError::InvalidInput("profile fov must be finite".into()));
        }
        self.name = clean_name(&self.name)?;
        self.camera_fov_degrees = self.camera_fov_degrees.clamp(1.0, 179.0);
        self.presets = self
            .presets
            .into_iter()
            .map(Preset::sanitized)
            .collect::<Result<_, _>>()?;
        Ok(self)
    }
}

fn clean_name(name: &str) -> Result<String, PtzError> {
    let name: String = name.trim().chars().take(MAX_PRESET_NAME_CHARS).collect();
    if name.is_empty() {
        return Err(PtzError::InvalidInput("name cannot be empty".into()));
    }
    Ok(name)
}
