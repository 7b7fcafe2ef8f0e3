//! Protocol-independent PTZ control.
//!
//! [`PtzControl`] is the one interface the dispatcher drives. [`Controller`]
//! is the concrete sum of every supported protocol, built from a
//! [`CameraEndpoint`].

use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;

use crate::codec::{BirdDogCodec, ViscaLimits};
use crate::coords::NormalizedPosition;
use crate::error::PtzError;
use crate::transport::{
    BirdDogClient, NdiClient, NdiPtzLink, PanasonicClient, PositionReport, SimulatedCamera,
    TransportConfig, ViscaClient,
};
use crate::types::{CameraEndpoint, Preset, Protocol, ProtocolConfig};

// ── Capabilities ─────────────────────────────────────────────────

bitflags! {
    /// What a protocol can do natively. Informational only: unsupported
    /// operations are already no-ops.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const ABSOLUTE       = 1 << 0;
        const RELATIVE       = 1 << 1;
        const ZOOM           = 1 << 2;
        const CONTINUOUS     = 1 << 3;
        const NATIVE_PRESETS = 1 << 4;
        const POSITION_QUERY = 1 << 5;
        const FOCUS          = 1 << 6;
        const AUTOFOCUS      = 1 << 7;
    }
}

impl Capabilities {
    pub fn for_protocol(protocol: Protocol) -> Self {
        let motion = Self::ABSOLUTE | Self::RELATIVE | Self::ZOOM | Self::NATIVE_PRESETS;
        match protocol {
            Protocol::Visca | Protocol::Simulated => Self::all(),
            Protocol::PanasonicAw => motion | Self::CONTINUOUS | Self::POSITION_QUERY,
            Protocol::BirdDogRest => motion | Self::POSITION_QUERY,
            Protocol::Ndi => motion | Self::CONTINUOUS | Self::FOCUS | Self::AUTOFOCUS,
        }
    }
}

// ── PtzControl ───────────────────────────────────────────────────

/// Uniform camera control.
///
/// Implementations serialize their own I/O; callers need no locking.
#[async_trait]
pub trait PtzControl: Send + Sync {
    async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<(), PtzError>;

    async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError>;

    async fn zoom(&self, level: f64) -> Result<(), PtzError>;

    /// Drive at signed speeds in `[-1, 1]` until [`stop`](Self::stop).
    async fn continuous_move(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError>;

    async fn stop(&self) -> Result<(), PtzError>;

    /// Go to an application preset's stored position.
    async fn recall_preset(&self, preset: &Preset) -> Result<(), PtzError> {
        self.move_absolute(preset.position()).await
    }

    async fn home(&self) -> Result<(), PtzError> {
        self.move_absolute(NormalizedPosition::HOME).await
    }

    async fn get_position(&self) -> Result<PositionReport, PtzError>;

    /// Positive speeds focus far, negative near, zero stops.
    async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError>;

    async fn set_autofocus(&self, enabled: bool) -> Result<(), PtzError>;

    /// One-push autofocus.
    async fn autofocus_trigger(&self) -> Result<(), PtzError>;

    async fn recall_native_preset(&self, index: u8) -> Result<(), PtzError>;

    async fn store_native_preset(&self, index: u8) -> Result<(), PtzError>;

    async fn test_connection(&self) -> Result<(), PtzError>;

    /// Close the underlying connection. Called once, before the
    /// controller is dropped.
    async fn shutdown(&self) {}

    fn capabilities(&self) -> Capabilities;
}

// ── Controller ───────────────────────────────────────────────────

/// Settings that shape every controller built from an endpoint.
#[derive(Clone, Default)]
pub struct ControllerOptions {
    pub transport: TransportConfig,
    pub visca_limits: ViscaLimits,
    pub birddog: BirdDogCodec,
    /// Receiver link for NDI endpoints, supplied by the video layer.
    pub ndi_link: Option<Arc<dyn NdiPtzLink>>,
}

impl std::fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("transport", &self.transport)
            .field("visca_limits", &self.visca_limits)
            .field("birddog", &self.birddog)
            .field("ndi_link", &self.ndi_link.is_some())
            .finish()
    }
}

/// Every supported camera protocol.
pub enum Controller {
    Visca(ViscaClient),
    Panasonic(PanasonicClient),
    BirdDog(BirdDogClient),
    Ndi(NdiClient),
    Simulated(SimulatedCamera),
}

impl Controller {
    /// Build the client for `endpoint`. Configuration is validated here;
    /// no I/O happens until the first command.
    pub fn from_endpoint(
        endpoint: &CameraEndpoint,
        options: &ControllerOptions,
    ) -> Result<Self, PtzError> {
        endpoint.validate()?;
        let transport = options.transport;
        Ok(match &endpoint.config {
            ProtocolConfig::Visca { host, port } => Controller::Visca(ViscaClient::connect(
                host,
                *port,
                options.visca_limits,
                transport,
            )?),
            ProtocolConfig::PanasonicAw {
                host,
                port,
                username,
                password,
            } => {
                let credentials = username.clone().map(|u| (u, password.clone()));
                Controller::Panasonic(PanasonicClient::connect(
                    host,
                    *port,
                    credentials,
                    transport,
                )?)
            }
            ProtocolConfig::BirdDogRest { host, port } => Controller::BirdDog(
                BirdDogClient::connect(host, *port, options.birddog, transport)?,
            ),
            ProtocolConfig::Ndi => Controller::Ndi(NdiClient::new(options.ndi_link.clone())),
            ProtocolConfig::Simulated => Controller::Simulated(SimulatedCamera::new()),
        })
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Controller::Visca(_) => Protocol::Visca,
            Controller::Panasonic(_) => Protocol::PanasonicAw,
            Controller::BirdDog(_) => Protocol::BirdDogRest,
            Controller::Ndi(_) => Protocol::Ndi,
            Controller::Simulated(_) => Protocol::Simulated,
        }
    }
}

/// Forward a call to whichever client is inside.
macro_rules! delegate {
    ($self:ident, $c:ident => $call:expr) => {
        match $self {
            Controller::Visca($c) => $call,
            Controller::Panasonic($c) => $call,
            Controller::BirdDog($c) => $call,
            Controller::Ndi($c) => $call,
            Controller::Simulated($c) => $call,
        }
    };
}

#[async_trait]
impl PtzControl for Controller {
    async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<(), PtzError> {
        delegate!(self, c => c.move_relative(pan_delta, tilt_delta).await)
    }

    async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError> {
        delegate!(self, c => c.move_absolute(pos).await)
    }

    async fn zoom(&self, level: f64) -> Result<(), PtzError> {
        delegate!(self, c => c.zoom(level).await)
    }

    async fn continuous_move(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError> {
        delegate!(self, c => c.continuous_move(pan_speed, tilt_speed).await)
    }

    async fn stop(&self) -> Result<(), PtzError> {
        delegate!(self, c => c.stop().await)
    }

    async fn home(&self) -> Result<(), PtzError> {
        delegate!(self, c => c.home().await)
    }

    async fn get_position(&self) -> Result<PositionReport, PtzError> {
        delegate!(self, c => c.get_position().await)
    }

    async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError> {
        delegate!(self, c => c.focus_continuous(speed).await)
    }

    async fn set_autofocus(&self, enabled: bool) -> Result<(), PtzError> {
        delegate!(self, c => c.set_autofocus(enabled).await)
    }

    async fn autofocus_trigger(&self) -> Result<(), PtzError> {
        delegate!(self, c => c.autofocus_trigger().await)
    }

    async fn recall_native_preset(&self, index: u8) -> Result<(), PtzError> {
        delegate!(self, c => c.recall_native_preset(index).await)
    }

    async fn store_native_preset(&self, index: u8) -> Result<(), PtzError> {
        delegate!(self, c => c.store_native_preset(index).await)
    }

    async fn test_connection(&self) -> Result<(), PtzError> {
        match self {
            Controller::Simulated(_) => Ok(()),
            Controller::Visca(c) => c.test_connection().await,
            Controller::Panasonic(c) => c.test_connection().await,
            Controller::BirdDog(c) => c.test_connection().await,
            Controller::Ndi(c) => c.test_connection().await,
        }
    }

    async fn shutdown(&self) {
        match self {
            Controller::Simulated(_) => {}
            Controller::Visca(c) => c.shutdown().await,
            Controller::Panasonic(c) => c.shutdown().await,
            Controller::BirdDog(c) => c.shutdown().await,
            Controller::Ndi(c) => c.shutdown().await,
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::for_protocol(self.protocol())
    }
}
