//! The dispatcher: single owner of the active camera and of the current
//! position.
//!
//! ```text
//!            activate(A)                activate(B)
//!   Idle ─────────────────► Bound(A) ─────────────────► Bound(B)
//!    ▲                         │   A's actor drained,
//!    │   deactivate /          │   A shut down, then B built
//!    └── delete active ────────┘
//! ```
//!
//! Every bound endpoint gets one command actor task that owns its
//! controller, so wire writes never interleave. Motion commands are
//! fire-and-forget into the actor's queue; recall, position queries and
//! connection tests wait for the actor's answer. The binding lock is only
//! held long enough to reach the queue, never across a camera round trip,
//! so a slow query cannot hold up `stop`. The dispatcher applies each
//! accepted motion to its own position immediately, and a fresh position
//! reply from the camera replaces that value outright.
//!
//! Preset profiles are named snapshots of the preset list plus the field
//! of view; loading one swaps both in and rebinds its endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::controller::{Capabilities, Controller, ControllerOptions, PtzControl};
use crate::coords::NormalizedPosition;
use crate::error::PtzError;
use crate::geometry::{self, PresetOverlay};
use crate::store::{EndpointStore, MemoryStore, PresetStore, ProfileStore, RecordStore};
use crate::transport::PositionReport;
use crate::types::{CameraEndpoint, Preset, PresetProfile, ProtocolConfig};
use crate::video::VideoSignal;

/// Minimum spacing between accepted commands of one kind.
pub const MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(100);

/// Queue depth of a command actor.
const COMMAND_QUEUE: usize = 64;

// ── DispatcherConfig ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub min_command_interval: Duration,
    /// Horizontal field of view at zoom 0, in degrees.
    pub fov_degrees: f64,
    /// Scale applied to click-to-move vectors.
    pub click_sensitivity: f64,
    /// Zoom change per wheel notch.
    pub scroll_sensitivity: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_command_interval: MIN_COMMAND_INTERVAL,
            fov_degrees: 60.0,
            click_sensitivity: 0.1,
            scroll_sensitivity: 0.05,
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────

/// What happened to a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Queued for the active camera.
    Sent,
    /// No camera is bound; only the local position moved.
    Local,
    /// Dropped: too soon after the last accepted command of its kind, or
    /// the camera's queue is full.
    Throttled,
    /// Dropped: no video to aim at, or nothing to do.
    Ignored,
}

// ── Throttle ─────────────────────────────────────────────────────

/// Throttled command families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Relative,
    Absolute,
    Zoom,
    Continuous,
    Focus,
    Home,
}

/// Last accepted instant per command kind.
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last_accepted: HashMap<CommandKind, Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: HashMap::new(),
        }
    }

    /// Accept and stamp, or refuse without touching the stamp.
    fn try_accept(&mut self, kind: CommandKind, now: Instant) -> bool {
        if let Some(last) = self.last_accepted.get(&kind)
            && now.duration_since(*last) < self.interval
        {
            return false;
        }
        self.last_accepted.insert(kind, now);
        true
    }
}

// ── Command actor ────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, PtzError>>;

enum Command {
    MoveRelative { pan_delta: f64, tilt_delta: f64 },
    MoveAbsolute(NormalizedPosition),
    Zoom(f64),
    Continuous { pan_speed: f64, tilt_speed: f64 },
    Stop,
    Home,
    Focus(f64),
    Autofocus(bool),
    AutofocusTrigger,
    RecallPreset(Preset, Reply<()>),
    StoreNativePreset(u8, Reply<()>),
    GetPosition(Reply<PositionReport>),
    TestConnection(Reply<()>),
}

/// Run commands one at a time until the queue closes, then shut the
/// controller down.
async fn run_actor(
    name: String,
    controller: Arc<dyn PtzControl>,
    mut rx: mpsc::Receiver<Command>,
) {
    debug!("{name}: command actor started");
    while let Some(command) = rx.recv().await {
        execute(&name, controller.as_ref(), command).await;
    }
    controller.shutdown().await;
    debug!("{name}: command actor stopped");
}

async fn execute(name: &str, c: &dyn PtzControl, command: Command) {
    match command {
        Command::MoveRelative {
            pan_delta,
            tilt_delta,
        } => swallow(name, "relative move", c.move_relative(pan_delta, tilt_delta).await),
        Command::MoveAbsolute(pos) => swallow(name, "absolute move", c.move_absolute(pos).await),
        Command::Zoom(level) => swallow(name, "zoom", c.zoom(level).await),
        Command::Continuous {
            pan_speed,
            tilt_speed,
        } => swallow(name, "drive", c.continuous_move(pan_speed, tilt_speed).await),
        Command::Stop => swallow(name, "stop", c.stop().await),
        Command::Home => swallow(name, "home", c.home().await),
        Command::Focus(speed) => swallow(name, "focus", c.focus_continuous(speed).await),
        Command::Autofocus(on) => swallow(name, "autofocus", c.set_autofocus(on).await),
        Command::AutofocusTrigger => {
            swallow(name, "one-push autofocus", c.autofocus_trigger().await)
        }
        Command::RecallPreset(preset, reply) => {
            let _ = reply.send(c.recall_preset(&preset).await);
        }
        Command::StoreNativePreset(index, reply) => {
            let _ = reply.send(c.store_native_preset(index).await);
        }
        Command::GetPosition(reply) => {
            let _ = reply.send(c.get_position().await);
        }
        Command::TestConnection(reply) => {
            let _ = reply.send(c.test_connection().await);
        }
    }
}

fn swallow(name: &str, what: &str, result: Result<(), PtzError>) {
    if let Err(e) = result {
        warn!("{name}: {what} failed: {e}");
    }
}

// ── Binding ──────────────────────────────────────────────────────

/// Builds the controller for an endpoint. Must not perform I/O.
pub type Connector =
    Arc<dyn Fn(&CameraEndpoint) -> Result<Arc<dyn PtzControl>, PtzError> + Send + Sync>;

/// Connector producing the built-in [`Controller`] for every protocol.
pub fn controller_connector(options: ControllerOptions) -> Connector {
    Arc::new(
        move |endpoint: &CameraEndpoint| -> Result<Arc<dyn PtzControl>, PtzError> {
            let controller = Controller::from_endpoint(endpoint, &options)?;
            Ok(Arc::new(controller))
        },
    )
}

struct Bound {
    endpoint: CameraEndpoint,
    capabilities: Capabilities,
    tx: mpsc::Sender<Command>,
    actor: JoinHandle<()>,
}

impl Bound {
    fn spawn(endpoint: CameraEndpoint, controller: Arc<dyn PtzControl>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let capabilities = controller.capabilities();
        let actor = tokio::spawn(run_actor(endpoint.name.clone(), controller, rx));
        Self {
            endpoint,
            capabilities,
            tx,
            actor,
        }
    }

    /// Close the queue, let queued commands finish and wait for the
    /// controller to shut down.
    async fn teardown(self) {
        let Self {
            endpoint, tx, actor, ..
        } = self;
        drop(tx);
        if let Err(e) = actor.await {
            warn!("{}: command actor ended abnormally: {e}", endpoint.name);
        }
    }
}

/// Queue a command that wants an answer and wait for it.
async fn request<T>(
    tx: &mpsc::Sender<Command>,
    command: impl FnOnce(Reply<T>) -> Command,
) -> Result<T, PtzError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(command(reply_tx)).await?;
    reply_rx.await?
}

enum Binding {
    Idle,
    Bound(Bound),
}

// ── Dispatcher ───────────────────────────────────────────────────

/// Routes operator commands to the active camera.
pub struct Dispatcher {
    config: DispatcherConfig,
    connector: Connector,
    endpoints: Arc<dyn EndpointStore>,
    presets: Arc<dyn PresetStore>,
    profiles: Arc<dyn ProfileStore>,
    video: VideoSignal,
    position: watch::Sender<NormalizedPosition>,
    fov: watch::Sender<f64>,
    throttle: Mutex<Throttle>,
    binding: Mutex<Binding>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        endpoints: Arc<dyn EndpointStore>,
        presets: Arc<dyn PresetStore>,
        video: VideoSignal,
    ) -> Self {
        let (position, _) = watch::channel(NormalizedPosition::HOME);
        let (fov, _) = watch::channel(config.fov_degrees);
        Self {
            throttle: Mutex::new(Throttle::new(config.min_command_interval)),
            config,
            connector: controller_connector(ControllerOptions::default()),
            endpoints,
            presets,
            profiles: Arc::new(MemoryStore::<PresetProfile>::new()),
            video,
            position,
            fov,
            binding: Mutex::new(Binding::Idle),
        }
    }

    /// Replace how controllers are built for activated endpoints.
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_controller_options(self, options: ControllerOptions) -> Self {
        self.with_connector(controller_connector(options))
    }

    /// Keep profiles somewhere other than memory.
    pub fn with_profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn video(&self) -> &VideoSignal {
        &self.video
    }

    /// The dispatcher's current position.
    pub fn position(&self) -> NormalizedPosition {
        *self.position.borrow()
    }

    /// Observe position changes. Receivers can only read.
    pub fn subscribe_position(&self) -> watch::Receiver<NormalizedPosition> {
        self.position.subscribe()
    }

    /// Horizontal field of view used for overlays. Starts at the
    /// configured value and follows the last loaded profile.
    pub fn fov_degrees(&self) -> f64 {
        *self.fov.borrow()
    }

    // ── Endpoint binding ─────────────────────────────────────────

    pub async fn active_endpoint(&self) -> Option<CameraEndpoint> {
        match &*self.binding.lock().await {
            Binding::Idle => None,
            Binding::Bound(bound) => Some(bound.endpoint.clone()),
        }
    }

    pub async fn capabilities(&self) -> Option<Capabilities> {
        match &*self.binding.lock().await {
            Binding::Idle => None,
            Binding::Bound(bound) => Some(bound.capabilities),
        }
    }

    /// Bind the stored endpoint `id`, replacing any active one.
    pub async fn activate_endpoint(&self, id: &str) -> Result<CameraEndpoint, PtzError> {
        let endpoint = self.endpoints.get(id).await?;
        self.rebind(Some(endpoint.clone())).await?;
        Ok(endpoint)
    }

    pub async fn deactivate(&self) {
        // Unbinding cannot fail: only binding validates and connects.
        let _ = self.rebind(None).await;
    }

    /// The old actor is drained and its controller shut down before the
    /// next controller is built. A configuration error leaves the
    /// current binding untouched; a connector error leaves the
    /// dispatcher idle.
    async fn rebind(&self, next: Option<CameraEndpoint>) -> Result<(), PtzError> {
        if let Some(endpoint) = &next {
            endpoint.validate()?;
        }
        let mut binding = self.binding.lock().await;
        if let Binding::Bound(old) = std::mem::replace(&mut *binding, Binding::Idle) {
            info!("unbinding {} ({})", old.endpoint.name, old.endpoint.protocol);
            old.teardown().await;
        }
        if let Some(endpoint) = next {
            let controller = (self.connector)(&endpoint).inspect_err(|e| {
                warn!("cannot bind {}: {e}", endpoint.name);
            })?;
            info!("bound {} ({})", endpoint.name, endpoint.protocol);
            *binding = Binding::Bound(Bound::spawn(endpoint, controller));
        }
        Ok(())
    }

    // ── Endpoint store ───────────────────────────────────────────

    pub async fn endpoints(&self) -> Result<Vec<CameraEndpoint>, PtzError> {
        self.endpoints.load_all().await
    }

    pub async fn create_endpoint(
        &self,
        name: &str,
        config: ProtocolConfig,
    ) -> Result<CameraEndpoint, PtzError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PtzError::InvalidInput("endpoint name cannot be empty".into()));
        }
        let endpoint = CameraEndpoint::new(name, config);
        endpoint.validate()?;
        self.endpoints.save(endpoint.clone()).await?;
        Ok(endpoint)
    }

    /// Replace a stored endpoint. If it is the active one, it is rebound
    /// with the new settings.
    pub async fn update_endpoint(
        &self,
        endpoint: CameraEndpoint,
    ) -> Result<CameraEndpoint, PtzError> {
        endpoint.validate()?;
        self.endpoints.get(&endpoint.id).await?;
        self.endpoints.save(endpoint.clone()).await?;
        if self.is_active(&endpoint.id).await {
            self.rebind(Some(endpoint.clone())).await?;
        }
        Ok(endpoint)
    }

    /// Delete a stored endpoint, unbinding it first if it is active.
    pub async fn delete_endpoint(&self, id: &str) -> Result<(), PtzError> {
        self.endpoints.get(id).await?;
        if self.is_active(id).await {
            self.deactivate().await;
        }
        self.endpoints.delete(id).await
    }

    async fn is_active(&self, id: &str) -> bool {
        matches!(&*self.binding.lock().await, Binding::Bound(b) if b.endpoint.id == id)
    }

    // ── Motion ───────────────────────────────────────────────────

    /// Throttle, hand the command to the actor, then update the local
    /// position. `kind: None` is never throttled.
    async fn motion(
        &self,
        kind: Option<CommandKind>,
        command: Command,
        apply: impl FnOnce(NormalizedPosition) -> NormalizedPosition,
    ) -> Result<Dispatch, PtzError> {
        if let Some(kind) = kind
            && !self.throttle.lock().await.try_accept(kind, Instant::now())
        {
            trace!(?kind, "command throttled");
            return Ok(Dispatch::Throttled);
        }
        let dispatch = self.send(command).await?;
        if dispatch != Dispatch::Throttled {
            self.position.send_modify(|pos| *pos = apply(*pos));
        }
        Ok(dispatch)
    }

    /// Enqueue without waiting. A full queue drops the command.
    async fn send(&self, command: Command) -> Result<Dispatch, PtzError> {
        match &*self.binding.lock().await {
            Binding::Idle => Ok(Dispatch::Local),
            Binding::Bound(bound) => match bound.tx.try_send(command) {
                Ok(()) => Ok(Dispatch::Sent),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("{}: command queue full; dropping command", bound.endpoint.name);
                    Ok(Dispatch::Throttled)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(PtzError::ChannelClosed),
            },
        }
    }

    /// The active endpoint and a handle on its queue, taken without
    /// keeping the binding locked.
    async fn bound_sender(&self) -> Option<(CameraEndpoint, mpsc::Sender<Command>)> {
        match &*self.binding.lock().await {
            Binding::Idle => None,
            Binding::Bound(bound) => Some((bound.endpoint.clone(), bound.tx.clone())),
        }
    }

    pub async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<Dispatch, PtzError> {
        finite("move deltas", &[pan_delta, tilt_delta])?;
        self.motion(
            Some(CommandKind::Relative),
            Command::MoveRelative {
                pan_delta,
                tilt_delta,
            },
            |pos| pos.offset(pan_delta, tilt_delta),
        )
        .await
    }

    pub async fn move_absolute(&self, pan: f64, tilt: f64, zoom: f64) -> Result<Dispatch, PtzError> {
        finite("position", &[pan, tilt, zoom])?;
        let target = NormalizedPosition::new(pan, tilt, zoom)
            .ok_or_else(|| PtzError::InvalidInput("position is NaN".into()))?;
        self.motion(
            Some(CommandKind::Absolute),
            Command::MoveAbsolute(target),
            |_| target,
        )
        .await
    }

    pub async fn zoom(&self, level: f64) -> Result<Dispatch, PtzError> {
        finite("zoom level", &[level])?;
        self.motion(Some(CommandKind::Zoom), Command::Zoom(level), |pos| {
            pos.with_zoom(level)
        })
        .await
    }

    /// Drive at signed speeds until [`stop`](Self::stop). The position is
    /// unknown while driving and is left alone.
    pub async fn continuous_move(
        &self,
        pan_speed: f64,
        tilt_speed: f64,
    ) -> Result<Dispatch, PtzError> {
        finite("drive speeds", &[pan_speed, tilt_speed])?;
        let pan_speed = pan_speed.clamp(-1.0, 1.0);
        let tilt_speed = tilt_speed.clamp(-1.0, 1.0);
        self.motion(
            Some(CommandKind::Continuous),
            Command::Continuous {
                pan_speed,
                tilt_speed,
            },
            |pos| pos,
        )
        .await
    }

    /// Never throttled.
    pub async fn stop(&self) -> Result<Dispatch, PtzError> {
        self.motion(None, Command::Stop, |pos| pos).await
    }

    /// Throttled on its own kind, so it never competes with moves.
    pub async fn home(&self) -> Result<Dispatch, PtzError> {
        self.motion(Some(CommandKind::Home), Command::Home, |_| {
            NormalizedPosition::HOME
        })
        .await
    }

    pub async fn focus(&self, speed: f64) -> Result<Dispatch, PtzError> {
        finite("focus speed", &[speed])?;
        self.motion(
            Some(CommandKind::Focus),
            Command::Focus(speed.clamp(-1.0, 1.0)),
            |pos| pos,
        )
        .await
    }

    /// Halt a focus drive. Never throttled.
    pub async fn focus_stop(&self) -> Result<Dispatch, PtzError> {
        self.motion(None, Command::Focus(0.0), |pos| pos).await
    }

    pub async fn set_autofocus(&self, enabled: bool) -> Result<Dispatch, PtzError> {
        self.send(Command::Autofocus(enabled)).await
    }

    /// One-push autofocus.
    pub async fn autofocus_trigger(&self) -> Result<Dispatch, PtzError> {
        self.send(Command::AutofocusTrigger).await
    }

    // ── Awaited operations ───────────────────────────────────────

    /// Go to a stored preset. Never throttled; camera errors are returned.
    pub async fn recall_preset(&self, id: &str) -> Result<Dispatch, PtzError> {
        let preset = self.presets.get(id).await?;
        let target = preset.position();
        let dispatch = match self.bound_sender().await {
            None => Dispatch::Local,
            Some((endpoint, tx)) => {
                let name = preset.name.clone();
                request(&tx, |reply| Command::RecallPreset(preset, reply)).await?;
                info!("recalled preset '{name}' on {}: {target}", endpoint.name);
                Dispatch::Sent
            }
        };
        self.position.send_replace(target);
        Ok(dispatch)
    }

    /// Save the camera's current framing in its own preset slot.
    pub async fn store_native_preset(&self, index: u8) -> Result<Dispatch, PtzError> {
        match self.bound_sender().await {
            None => Ok(Dispatch::Local),
            Some((_, tx)) => {
                request(&tx, |reply| Command::StoreNativePreset(index, reply)).await?;
                Ok(Dispatch::Sent)
            }
        }
    }

    /// Ask the camera where it is. A fresh answer replaces the local
    /// position; otherwise the local position stands.
    pub async fn get_position(&self) -> Result<NormalizedPosition, PtzError> {
        let report = match self.bound_sender().await {
            None => None,
            Some((_, tx)) => Some(request(&tx, Command::GetPosition).await?),
        };
        match report {
            Some(report) if report.fresh => {
                let pos = report.position.clamped();
                self.position.send_replace(pos);
                Ok(pos)
            }
            _ => Ok(self.position()),
        }
    }

    /// Check that a camera answers with `config`. The active camera is
    /// tested through its own connection; any other configuration gets a
    /// short-lived controller.
    pub async fn test_connection(&self, config: &ProtocolConfig) -> Result<String, PtzError> {
        config.validate()?;
        let protocol = config.protocol();
        if let Some((endpoint, tx)) = self.bound_sender().await
            && endpoint.config == *config
        {
            request(&tx, Command::TestConnection).await?;
            return Ok(format!("{protocol} connection successful"));
        }
        let scratch = CameraEndpoint::new("connection test", config.clone());
        let controller = (self.connector)(&scratch)?;
        let result = controller.test_connection().await;
        controller.shutdown().await;
        result?;
        Ok(format!("{protocol} connection successful"))
    }

    // ── Presets ──────────────────────────────────────────────────

    pub async fn presets(&self) -> Result<Vec<Preset>, PtzError> {
        self.presets.load_all().await
    }

    /// Save the current position as a new preset.
    pub async fn capture_preset(&self, name: &str, color: &str) -> Result<Preset, PtzError> {
        let preset = Preset::new(name, self.position(), color)?;
        self.presets.save(preset.clone()).await?;
        info!("captured preset '{}' at {}", preset.name, preset.position());
        Ok(preset)
    }

    pub async fn update_preset(&self, preset: Preset) -> Result<Preset, PtzError> {
        let preset = preset.sanitized()?;
        self.presets.get(&preset.id).await?;
        self.presets.save(preset.clone()).await?;
        Ok(preset)
    }

    pub async fn delete_preset(&self, id: &str) -> Result<(), PtzError> {
        self.presets.delete(id).await
    }

    // ── Profiles ─────────────────────────────────────────────────

    pub async fn profiles(&self) -> Result<Vec<PresetProfile>, PtzError> {
        self.profiles.load_all().await
    }

    /// Snapshot the presets, the field of view and the active endpoint
    /// under `name`. A profile with the same name (ignoring case) is
    /// overwritten in place.
    pub async fn save_profile(&self, name: &str) -> Result<PresetProfile, PtzError> {
        let presets = self.presets.load_all().await?;
        let endpoint_id = self.active_endpoint().await.map(|ep| ep.id);
        let mut profile = PresetProfile::new(name, self.fov_degrees(), endpoint_id, presets)?;
        if let Some(existing) = self
            .profiles
            .load_all()
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(&profile.name))
        {
            profile.id = existing.id;
        }
        self.profiles.save(profile.clone()).await?;
        info!(
            "saved profile '{}' with {} preset(s)",
            profile.name,
            profile.presets.len()
        );
        Ok(profile)
    }

    /// Replace the preset list and field of view with the profile's, then
    /// bind its endpoint. A profile whose endpoint has since been deleted
    /// still loads and leaves the binding alone.
    pub async fn load_profile(&self, id: &str) -> Result<PresetProfile, PtzError> {
        let profile = self.profiles.get(id).await?;
        for preset in self.presets.load_all().await? {
            self.presets.delete(&preset.id).await?;
        }
        for preset in &profile.presets {
            self.presets.save(preset.clone()).await?;
        }
        self.fov.send_replace(profile.camera_fov_degrees);

        if let Some(endpoint_id) = &profile.endpoint_id
            && !self.is_active(endpoint_id).await
        {
            match self.activate_endpoint(endpoint_id).await {
                Ok(_) => {}
                Err(PtzError::NotFound { .. }) => {
                    warn!("profile '{}' names a missing endpoint {endpoint_id}", profile.name);
                }
                Err(e) => return Err(e),
            }
        }
        info!("loaded profile '{}'", profile.name);
        Ok(profile)
    }

    pub async fn delete_profile(&self, id: &str) -> Result<(), PtzError> {
        self.profiles.delete(id).await
    }

    /// Create a "Default" profile from the current state when none exist.
    pub async fn ensure_default_profile(&self) -> Result<Option<PresetProfile>, PtzError> {
        if !self.profiles.load_all().await?.is_empty() {
            return Ok(None);
        }
        self.save_profile("Default").await.map(Some)
    }

    // ── Live view ────────────────────────────────────────────────

    /// Re-centre the view on a clicked point. Ignored without video.
    pub async fn click_move(
        &self,
        click_x: f64,
        click_y: f64,
        viewport_w: f64,
        viewport_h: f64,
    ) -> Result<Dispatch, PtzError> {
        if !self.video.is_connected() {
            return Ok(Dispatch::Ignored);
        }
        let vector = geometry::click_to_vector(
            click_x,
            click_y,
            viewport_w,
            viewport_h,
            self.config.click_sensitivity,
            self.position().zoom,
        );
        if vector.is_zero() {
            return Ok(Dispatch::Ignored);
        }
        self.move_relative(vector.pan_delta, vector.tilt_delta).await
    }

    pub async fn scroll_zoom(&self, wheel_steps: f64) -> Result<Dispatch, PtzError> {
        finite("wheel steps", &[wheel_steps])?;
        let level = geometry::scroll_to_zoom(
            self.position().zoom,
            wheel_steps,
            self.config.scroll_sensitivity,
        );
        self.zoom(level).await
    }

    /// Overlay rectangles for every preset, or none without video.
    pub async fn overlays(
        &self,
        viewport_w: f64,
        viewport_h: f64,
    ) -> Result<Vec<PresetOverlay>, PtzError> {
        if !self.video.is_connected() {
            return Ok(Vec::new());
        }
        let presets = self.presets.load_all().await?;
        Ok(geometry::project_all(
            &presets,
            self.position(),
            self.fov_degrees(),
            viewport_w,
            viewport_h,
        ))
    }

    /// Unbind the active endpoint, waiting for its queue to drain.
    pub async fn shutdown(&self) {
        self.deactivate().await;
    }
}

fn finite(what: &str, values: &[f64]) -> Result<(), PtzError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PtzError::InvalidInput(format!("{what} must be finite")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::store::MemoryStore;

    type Log = Arc<StdMutex<Vec<String>>>;

    /// Records every call; answers position queries with `reply`, after
    /// `lag` if set.
    struct FakeCamera {
        name: String,
        log: Log,
        reply: Option<NormalizedPosition>,
        failing: bool,
        lag: Option<Duration>,
    }

    impl FakeCamera {
        fn record(&self, call: impl Into<String>) -> Result<(), PtzError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{} {}", self.name, call.into()));
            if self.failing {
                Err(PtzError::Unreachable(self.name.clone()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PtzControl for FakeCamera {
        async fn move_relative(&self, p: f64, t: f64) -> Result<(), PtzError> {
            self.record(format!("rel {p} {t}"))
        }
        async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError> {
            self.record(format!("abs {} {} {}", pos.pan, pos.tilt, pos.zoom))
        }
        async fn zoom(&self, level: f64) -> Result<(), PtzError> {
            self.record(format!("zoom {level}"))
        }
        async fn continuous_move(&self, p: f64, t: f64) -> Result<(), PtzError> {
            self.record(format!("drive {p} {t}"))
        }
        async fn stop(&self) -> Result<(), PtzError> {
            self.record("stop")
        }
        async fn get_position(&self) -> Result<PositionReport, PtzError> {
            self.record("query")?;
            if let Some(lag) = self.lag {
                tokio::time::sleep(lag).await;
            }
            Ok(match self.reply {
                Some(pos) => PositionReport::fresh(pos),
                None => PositionReport::cached(NormalizedPosition::HOME),
            })
        }
        async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError> {
            self.record(format!("focus {speed}"))
        }
        async fn set_autofocus(&self, on: bool) -> Result<(), PtzError> {
            self.record(format!("af {on}"))
        }
        async fn autofocus_trigger(&self) -> Result<(), PtzError> {
            self.record("af push")
        }
        async fn recall_native_preset(&self, i: u8) -> Result<(), PtzError> {
            self.record(format!("recall {i}"))
        }
        async fn store_native_preset(&self, i: u8) -> Result<(), PtzError> {
            self.record(format!("store {i}"))
        }
        async fn test_connection(&self) -> Result<(), PtzError> {
            self.record("test")
        }
        async fn shutdown(&self) {
            let _ = self.record("shutdown");
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::all()
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        log: Log,
        video: VideoSignal,
    }

    impl Harness {
        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    /// Endpoints named "fail" get a camera whose commands all error;
    /// endpoints named "fresh" answer queries with a fixed position;
    /// endpoints named "slow" take four seconds to answer a query.
    fn harness() -> Harness {
        let log: Log = Arc::default();
        let video = VideoSignal::new(true);
        let connector_log = log.clone();
        let connector: Connector = Arc::new(
            move |ep: &CameraEndpoint| -> Result<Arc<dyn PtzControl>, PtzError> {
                connector_log
                    .lock()
                    .unwrap()
                    .push(format!("{} connect", ep.name));
                Ok(Arc::new(FakeCamera {
                    name: ep.name.clone(),
                    log: connector_log.clone(),
                    reply: (ep.name == "fresh").then_some(NormalizedPosition {
                        pan: -0.25,
                        tilt: 0.5,
                        zoom: 0.1,
                    }),
                    failing: ep.name == "fail",
                    lag: (ep.name == "slow").then_some(Duration::from_secs(4)),
                }))
            },
        );
        let dispatcher = Dispatcher::new(
            DispatcherConfig::default(),
            Arc::new(MemoryStore::<CameraEndpoint>::new()),
            Arc::new(MemoryStore::<Preset>::new()),
            video.clone(),
        )
        .with_connector(connector);
        Harness {
            dispatcher,
            log,
            video,
        }
    }

    async fn bind(h: &Harness, name: &str) -> CameraEndpoint {
        let ep = h
            .dispatcher
            .create_endpoint(name, ProtocolConfig::Simulated)
            .await
            .unwrap();
        h.dispatcher.activate_endpoint(&ep.id).await.unwrap();
        ep
    }

    #[tokio::test(start_paused = true)]
    async fn second_move_inside_interval_is_dropped() {
        let h = harness();
        let d = &h.dispatcher;
        assert_eq!(d.move_relative(0.1, 0.0).await.unwrap(), Dispatch::Local);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(d.move_relative(0.1, 0.0).await.unwrap(), Dispatch::Throttled);
        assert!((d.position().pan - 0.1).abs() < 1e-12);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(d.move_relative(0.1, 0.0).await.unwrap(), Dispatch::Local);
        assert!((d.position().pan - 0.2).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_is_per_kind() {
        let h = harness();
        let d = &h.dispatcher;
        assert_eq!(d.move_relative(0.1, 0.1).await.unwrap(), Dispatch::Local);
        assert_eq!(d.zoom(0.5).await.unwrap(), Dispatch::Local);
        assert_eq!(d.move_absolute(0.0, 0.0, 0.2).await.unwrap(), Dispatch::Local);
        assert_eq!(d.zoom(0.6).await.unwrap(), Dispatch::Throttled);
        assert_eq!(d.position().zoom, 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_recall_are_never_throttled() {
        let h = harness();
        bind(&h, "cam").await;
        let d = &h.dispatcher;
        let preset = d.capture_preset("Wide", "#00ff00").await.unwrap();

        assert_eq!(d.move_relative(0.5, 0.5).await.unwrap(), Dispatch::Sent);
        for _ in 0..3 {
            assert_eq!(d.stop().await.unwrap(), Dispatch::Sent);
            assert_eq!(d.recall_preset(&preset.id).await.unwrap(), Dispatch::Sent);
        }
        assert_eq!(d.position(), NormalizedPosition::HOME);
        let calls = h.calls();
        assert_eq!(calls.iter().filter(|c| c.ends_with("stop")).count(), 3);
        assert_eq!(calls.iter().filter(|c| c.contains("abs 0 0 0")).count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn home_is_throttled_on_its_own_kind() {
        let h = harness();
        let d = &h.dispatcher;
        assert_eq!(d.move_relative(0.4, 0.4).await.unwrap(), Dispatch::Local);
        assert_eq!(d.home().await.unwrap(), Dispatch::Local);
        assert_eq!(d.position(), NormalizedPosition::HOME);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(d.move_relative(0.3, 0.0).await.unwrap(), Dispatch::Local);
        assert_eq!(d.home().await.unwrap(), Dispatch::Local);
        assert_eq!(d.home().await.unwrap(), Dispatch::Throttled);
        assert_eq!(d.position(), NormalizedPosition::HOME);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_does_not_hold_up_stop() {
        let h = harness();
        bind(&h, "slow").await;
        let d = &h.dispatcher;
        let deadline = Duration::from_millis(500);
        let (query, stop, nudge) = tokio::join!(
            d.get_position(),
            tokio::time::timeout(deadline, d.stop()),
            tokio::time::timeout(deadline, d.move_relative(0.1, 0.0)),
        );
        assert_eq!(stop.expect("stop waited on the query").unwrap(), Dispatch::Sent);
        assert_eq!(nudge.expect("move waited on the query").unwrap(), Dispatch::Sent);
        assert_ok!(query);

        let calls = h.calls();
        let query_at = calls.iter().position(|c| c == "slow query").unwrap();
        let stop_at = calls.iter().position(|c| c == "slow stop").unwrap();
        assert!(query_at < stop_at);
    }

    #[tokio::test]
    async fn fresh_reply_overwrites_optimistic_position() {
        let h = harness();
        bind(&h, "fresh").await;
        let d = &h.dispatcher;
        d.move_relative(0.8, -0.3).await.unwrap();
        assert_eq!(d.position().pan, 0.8);

        let pos = d.get_position().await.unwrap();
        let expected = NormalizedPosition {
            pan: -0.25,
            tilt: 0.5,
            zoom: 0.1,
        };
        assert_eq!(pos, expected);
        assert_eq!(d.position(), expected);
        assert_eq!(*d.subscribe_position().borrow(), expected);
    }

    #[tokio::test]
    async fn cached_reply_keeps_local_position() {
        let h = harness();
        bind(&h, "stale").await;
        let d = &h.dispatcher;
        d.move_absolute(0.4, 0.4, 0.4).await.unwrap();
        let pos = d.get_position().await.unwrap();
        assert_eq!(pos, NormalizedPosition::new(0.4, 0.4, 0.4).unwrap());
    }

    #[tokio::test]
    async fn motion_errors_are_swallowed_but_queries_fail() {
        let h = harness();
        bind(&h, "fail").await;
        let d = &h.dispatcher;
        assert_eq!(d.move_relative(0.2, 0.0).await.unwrap(), Dispatch::Sent);
        assert_eq!(d.position().pan, 0.2);
        assert_err!(d.get_position().await);
        let preset = d.capture_preset("P", "#fff").await.unwrap();
        assert!(matches!(
            d.recall_preset(&preset.id).await,
            Err(PtzError::Unreachable(_))
        ));
        assert_err!(d.test_connection(&ProtocolConfig::Simulated).await);
    }

    #[tokio::test]
    async fn switching_tears_down_before_connecting() {
        let h = harness();
        let d = &h.dispatcher;
        bind(&h, "A").await;
        d.move_relative(0.1, 0.0).await.unwrap();
        let b = bind(&h, "B").await;
        d.stop().await.unwrap();
        d.get_position().await.unwrap();

        let calls = h.calls();
        let a_shutdown = calls.iter().position(|c| c == "A shutdown").unwrap();
        let b_connect = calls.iter().position(|c| c == "B connect").unwrap();
        assert!(a_shutdown < b_connect);
        assert!(
            calls[a_shutdown + 1..]
                .iter()
                .all(|c| !c.starts_with("A "))
        );
        assert!(calls.contains(&"B stop".to_string()));
        assert_eq!(d.active_endpoint().await.unwrap().id, b.id);
    }

    #[tokio::test]
    async fn deleting_active_endpoint_goes_idle() {
        let h = harness();
        let d = &h.dispatcher;
        let ep = bind(&h, "cam").await;
        assert!(d.capabilities().await.is_some());
        d.delete_endpoint(&ep.id).await.unwrap();
        assert!(d.active_endpoint().await.is_none());
        assert!(h.calls().contains(&"cam shutdown".to_string()));
        assert_eq!(d.stop().await.unwrap(), Dispatch::Local);
        assert!(matches!(
            d.activate_endpoint(&ep.id).await,
            Err(PtzError::NotFound { kind: "endpoint", .. })
        ));
    }

    #[tokio::test]
    async fn invalid_update_keeps_binding() {
        let h = harness();
        let d = &h.dispatcher;
        let mut ep = bind(&h, "cam").await;
        ep.config = ProtocolConfig::Visca {
            host: "http://bad".into(),
            port: 52381,
        };
        ep.protocol = ep.config.protocol();
        assert!(matches!(
            d.update_endpoint(ep.clone()).await,
            Err(PtzError::InvalidConfig(_))
        ));
        assert_eq!(d.active_endpoint().await.unwrap().name, "cam");
    }

    #[tokio::test]
    async fn nan_input_is_rejected() {
        let h = harness();
        let d = &h.dispatcher;
        assert!(matches!(
            d.move_relative(f64::NAN, 0.0).await,
            Err(PtzError::InvalidInput(_))
        ));
        assert_err!(d.zoom(f64::INFINITY).await);
        assert_eq!(d.position(), NormalizedPosition::HOME);
    }

    #[tokio::test]
    async fn click_and_overlays_need_video() {
        let h = harness();
        let d = &h.dispatcher;
        d.capture_preset("Centre", "#ff0000").await.unwrap();

        h.video.set_connected(false);
        assert_eq!(
            d.click_move(800.0, 0.0, 800.0, 600.0).await.unwrap(),
            Dispatch::Ignored
        );
        assert!(d.overlays(800.0, 600.0).await.unwrap().is_empty());

        h.video.set_connected(true);
        assert_eq!(
            d.click_move(400.0, 300.0, 800.0, 600.0).await.unwrap(),
            Dispatch::Ignored
        );
        assert_eq!(
            d.click_move(800.0, 0.0, 800.0, 600.0).await.unwrap(),
            Dispatch::Local
        );
        let pos = d.position();
        assert!((pos.pan - 0.1).abs() < 1e-12);
        assert!((pos.tilt - 0.1).abs() < 1e-12);

        let overlays = d.overlays(800.0, 600.0).await.unwrap();
        assert_eq!(overlays.len(), 1);
        assert!(overlays[0].rect.visible);
    }

    #[tokio::test]
    async fn scroll_zoom_steps_from_current_level() {
        let h = harness();
        let d = &h.dispatcher;
        d.scroll_zoom(4.0).await.unwrap();
        assert!((d.position().zoom - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn preset_lifecycle() {
        let h = harness();
        let d = &h.dispatcher;
        d.move_absolute(0.3, -0.2, 0.5).await.unwrap();
        let mut preset = d.capture_preset("  Pulpit  ", "#123456").await.unwrap();
        assert_eq!(preset.name, "Pulpit");
        assert_eq!(preset.position(), d.position());

        preset.pan = 4.0;
        let updated = d.update_preset(preset.clone()).await.unwrap();
        assert_eq!(updated.pan, 1.0);

        d.home().await.unwrap();
        assert_eq!(d.recall_preset(&preset.id).await.unwrap(), Dispatch::Local);
        assert_eq!(d.position().pan, 1.0);

        assert_ok!(d.delete_preset(&preset.id).await);
        assert!(d.presets().await.unwrap().is_empty());
        assert_err!(d.recall_preset(&preset.id).await);
    }

    #[tokio::test]
    async fn test_connection_reuses_active_camera() {
        let h = harness();
        let d = &h.dispatcher;
        bind(&h, "cam").await;
        let message = d.test_connection(&ProtocolConfig::Simulated).await.unwrap();
        assert_eq!(message, "Simulated connection successful");
        let calls = h.calls();
        assert!(calls.contains(&"cam test".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("connection test")));
    }

    #[tokio::test]
    async fn test_connection_on_other_config_uses_throwaway_controller() {
        let h = harness();
        let d = &h.dispatcher;
        d.test_connection(&ProtocolConfig::Simulated).await.unwrap();
        let calls = h.calls();
        assert_eq!(
            calls,
            vec![
                "connection test connect",
                "connection test test",
                "connection test shutdown"
            ]
        );
        assert!(matches!(
            d.test_connection(&ProtocolConfig::Visca {
                host: String::new(),
                port: 52381
            })
            .await,
            Err(PtzError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn native_preset_and_autofocus_reach_camera() {
        let h = harness();
        let d = &h.dispatcher;
        assert_eq!(d.store_native_preset(3).await.unwrap(), Dispatch::Local);
        bind(&h, "cam").await;
        assert_eq!(d.store_native_preset(3).await.unwrap(), Dispatch::Sent);
        d.set_autofocus(true).await.unwrap();
        d.autofocus_trigger().await.unwrap();
        d.focus(0.5).await.unwrap();
        assert_eq!(d.focus(0.25).await.unwrap(), Dispatch::Throttled);
        assert_eq!(d.focus_stop().await.unwrap(), Dispatch::Sent);
        d.continuous_move(2.0, -0.5).await.unwrap();
        d.get_position().await.unwrap();
        let calls = h.calls();
        assert!(calls.contains(&"cam store 3".to_string()));
        assert!(calls.contains(&"cam af true".to_string()));
        assert!(calls.contains(&"cam af push".to_string()));
        assert!(calls.contains(&"cam focus 0.5".to_string()));
        assert!(calls.contains(&"cam focus 0".to_string()));
        assert!(!calls.contains(&"cam focus 0.25".to_string()));
        assert!(calls.contains(&"cam drive 1 -0.5".to_string()));
    }

    #[tokio::test]
    async fn profiles_swap_presets_and_endpoint() {
        let h = harness();
        let d = &h.dispatcher;
        let stage = bind(&h, "stage").await;
        d.capture_preset("Pulpit", "#ffffff").await.unwrap();
        let sunday = d.save_profile("Sunday").await.unwrap();
        assert_eq!(sunday.endpoint_id.as_deref(), Some(stage.id.as_str()));
        assert_eq!(sunday.camera_fov_degrees, 60.0);

        bind(&h, "lobby").await;
        let pulpit = d.presets().await.unwrap().remove(0);
        d.delete_preset(&pulpit.id).await.unwrap();
        d.capture_preset("Door", "#000000").await.unwrap();
        d.save_profile("Lobby").await.unwrap();

        let loaded = d.load_profile(&sunday.id).await.unwrap();
        assert_eq!(loaded.name, "Sunday");
        let names: Vec<String> = d.presets().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Pulpit"]);
        assert_eq!(d.active_endpoint().await.unwrap().id, stage.id);
        assert!(h.calls().contains(&"lobby shutdown".to_string()));
    }

    #[tokio::test]
    async fn profile_names_are_unique_and_default_is_created_once() {
        let h = harness();
        let d = &h.dispatcher;
        let created = d.ensure_default_profile().await.unwrap().unwrap();
        assert_eq!(created.name, "Default");
        assert_eq!(created.endpoint_id, None);
        assert!(d.ensure_default_profile().await.unwrap().is_none());

        d.capture_preset("Wide", "#ffffff").await.unwrap();
        let again = d.save_profile("default").await.unwrap();
        assert_eq!(again.id, created.id);
        let profiles = d.profiles().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].presets.len(), 1);

        d.delete_profile(&created.id).await.unwrap();
        assert!(matches!(
            d.load_profile(&created.id).await,
            Err(PtzError::NotFound { kind: "profile", .. })
        ));
        assert_err!(d.save_profile("   ").await);
    }

    #[tokio::test]
    async fn loaded_profile_sets_fov_even_if_its_endpoint_is_gone() {
        let centre = Preset::new("Centre", NormalizedPosition::HOME, "#ff0000").unwrap();
        let narrow =
            PresetProfile::new("Narrow", 30.0, Some("deleted-endpoint".into()), vec![centre])
                .unwrap();
        let Harness { dispatcher, .. } = harness();
        let d = dispatcher
            .with_profile_store(Arc::new(MemoryStore::with_records(vec![narrow.clone()])));
        assert_eq!(d.fov_degrees(), 60.0);

        d.load_profile(&narrow.id).await.unwrap();
        assert_eq!(d.fov_degrees(), 30.0);
        assert!(d.active_endpoint().await.is_none());
        assert_eq!(d.overlays(800.0, 600.0).await.unwrap()[0].name, "Centre");
    }

    #[tokio::test]
    async fn builtin_connector_drives_simulator() {
        let dispatcher = Dispatcher::new(
            DispatcherConfig::default(),
            Arc::new(MemoryStore::<CameraEndpoint>::new()),
            Arc::new(MemoryStore::<Preset>::new()),
            VideoSignal::default(),
        );
        let ep = dispatcher
            .create_endpoint("sim", ProtocolConfig::Simulated)
            .await
            .unwrap();
        dispatcher.activate_endpoint(&ep.id).await.unwrap();
        dispatcher.move_absolute(0.5, 0.5, 0.5).await.unwrap();
        let pos = dispatcher.get_position().await.unwrap();
        assert_eq!(pos, NormalizedPosition::new(0.5, 0.5, 0.5).unwrap());
        dispatcher.shutdown().await;
        assert!(dispatcher.active_endpoint().await.is_none());
    }
}
