//! # ptzcam-core
//!
//! PTZ camera command and coordinate subsystem.
//!
//! This crate contains:
//! - **Coordinates**: `NormalizedPosition`, `LinearMap` and clamping rules
//! - **Codecs**: pure VISCA-over-IP, Panasonic AW and BirdDog REST encoders
//! - **Transports**: one client per protocol, plus NDI and a simulator
//! - **Controller**: the `PtzControl` trait and the `Controller` sum type
//! - **Dispatch**: `Dispatcher`, the owner of the active camera, with
//!   per-kind throttling and a command actor per endpoint
//! - **Geometry**: preset overlays and click/scroll mapping
//! - **Store**: endpoint, preset and profile persistence
//! - **Error**: `PtzError`, a `thiserror`-based error type

pub mod codec;
pub mod controller;
pub mod coords;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod store;
pub mod transport;
pub mod types;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{PtzCodec, ViscaLimits};
pub use controller::{Capabilities, Controller, ControllerOptions, PtzControl};
pub use coords::{LinearMap, NormalizedPosition};
pub use dispatch::{
    CommandKind, Connector, Dispatch, Dispatcher, DispatcherConfig, MIN_COMMAND_INTERVAL,
    controller_connector,
};
pub use error::PtzError;
pub use geometry::{MoveVector, OverlayRect, PresetOverlay};
pub use store::{
    EndpointStore, JsonFileStore, MemoryStore, PresetStore, ProfileStore, RecordStore,
};
pub use transport::{NdiPtzLink, PositionReport, TransportConfig};
pub use types::{CameraEndpoint, Preset, PresetProfile, Protocol, ProtocolConfig};
pub use video::VideoSignal;
