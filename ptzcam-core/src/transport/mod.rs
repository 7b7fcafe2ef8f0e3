//! Transport clients: one connection per camera.
//!
//! [`CodecClient`] pairs a pure [`PtzCodec`] with a [`Link`] that moves
//! frames over the wire. The client owns the request lock, the timeout and
//! retry policy, and the last-known position cache, so every network
//! protocol gets the same behaviour:
//!
//! - at most one request in flight per connection;
//! - each frame gets `request_timeout`, and one more attempt after a
//!   `Timeout` or `Unreachable`;
//! - a capability the codec cannot encode is a successful no-op;
//! - a position query that times out or cannot be decoded falls back to
//!   the cached value with `fresh: false`.

pub mod birddog;
pub mod http;
pub mod ndi;
pub mod panasonic;
pub mod simulated;
pub mod visca;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::codec::PtzCodec;
use crate::coords::NormalizedPosition;
use crate::error::PtzError;

pub use birddog::BirdDogClient;
pub use ndi::{NdiClient, NdiPtzLink};
pub use panasonic::PanasonicClient;
pub use simulated::SimulatedCamera;
pub use visca::ViscaClient;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

// ── TransportConfig ──────────────────────────────────────────────

/// Timing shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for a single request/reply exchange.
    pub request_timeout: Duration,
    /// Extra attempts after a retryable failure.
    pub retries: u32,
    /// Drive time for relative moves emulated with drive + stop.
    pub nudge: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retries: 1,
            nudge: crate::codec::panasonic::DEFAULT_NUDGE,
        }
    }
}

// ── PositionReport ───────────────────────────────────────────────

/// Answer to a position query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub position: NormalizedPosition,
    /// `true` when the camera answered this query; `false` for the
    /// last-known value.
    pub fresh: bool,
}

impl PositionReport {
    pub fn fresh(position: NormalizedPosition) -> Self {
        Self {
            position,
            fresh: true,
        }
    }

    pub fn cached(position: NormalizedPosition) -> Self {
        Self {
            position,
            fresh: false,
        }
    }
}

// ── Link ─────────────────────────────────────────────────────────

/// One wire connection to a camera.
///
/// Links are only driven under [`CodecClient`]'s lock, so they may keep
/// plain mutable state (sockets, sequence counters).
#[async_trait]
pub trait Link: Send {
    type Frame: Send + Sync;
    type Reply: Send;

    /// Send one frame and wait for its reply. `Ok(None)` means the frame
    /// was accepted and carries no data back.
    async fn exchange(
        &mut self,
        frame: &Self::Frame,
        timeout: Duration,
    ) -> Result<Option<Self::Reply>, PtzError>;

    /// Release the connection. The next exchange may reconnect.
    async fn close(&mut self) {}
}

// ── CodecClient ──────────────────────────────────────────────────

/// A [`PtzCodec`] driven over a [`Link`].
pub struct CodecClient<C, L> {
    name: String,
    codec: C,
    link: Mutex<L>,
    last_known: watch::Sender<NormalizedPosition>,
    config: TransportConfig,
}

impl<C, L> CodecClient<C, L>
where
    L: Link,
    C: PtzCodec<Frame = L::Frame, Reply = L::Reply> + Send + Sync,
{
    pub fn new(name: impl Into<String>, codec: C, link: L, config: TransportConfig) -> Self {
        let (last_known, _) = watch::channel(NormalizedPosition::HOME);
        Self {
            name: name.into(),
            codec,
            link: Mutex::new(link),
            last_known,
            config,
        }
    }

    /// Human-readable label used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Best-known position without touching the network.
    pub fn last_known(&self) -> NormalizedPosition {
        *self.last_known.borrow()
    }

    async fn exchange_with_retry(
        &self,
        link: &mut L,
        frame: &L::Frame,
    ) -> Result<Option<L::Reply>, PtzError> {
        let mut attempt = 0;
        loop {
            match link.exchange(frame, self.config.request_timeout).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!("{}: {e}; retrying ({attempt}/{})", self.name, self.config.retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send `frames` in order under the connection lock and collect the
    /// replies that carried data.
    async fn run(&self, what: &str, frames: Vec<L::Frame>) -> Result<Vec<L::Reply>, PtzError> {
        if frames.is_empty() {
            debug!("{}: {what} not supported; ignoring", self.name);
            return Ok(Vec::new());
        }
        let mut link = self.link.lock().await;
        let mut replies = Vec::with_capacity(frames.len());
        for frame in &frames {
            if let Some(reply) = self.exchange_with_retry(&mut link, frame).await? {
                replies.push(reply);
            }
        }
        Ok(replies)
    }

    fn remember(&self, update: impl FnOnce(NormalizedPosition) -> NormalizedPosition) {
        self.last_known.send_modify(|pos| *pos = update(*pos).clamped());
    }

    pub async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<(), PtzError> {
        let frames = self.codec.encode_move_relative(pan_delta, tilt_delta);
        self.run("relative move", frames).await?;
        self.remember(|p| p.offset(pan_delta, tilt_delta));
        Ok(())
    }

    pub async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError> {
        let frames = self.codec.encode_move_absolute(pos);
        self.run("absolute move", frames).await?;
        self.remember(|_| pos);
        Ok(())
    }

    pub async fn zoom(&self, level: f64) -> Result<(), PtzError> {
        let frames = self.codec.encode_zoom(level);
        self.run("zoom", frames).await?;
        self.remember(|p| p.with_zoom(level));
        Ok(())
    }

    pub async fn continuous_move(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError> {
        let frames = self.codec.encode_continuous(pan_speed, tilt_speed);
        self.run("continuous move", frames).await.map(drop)
    }

    pub async fn stop(&self) -> Result<(), PtzError> {
        let frames = self.codec.encode_stop();
        self.run("stop", frames).await.map(drop)
    }

    pub async fn home(&self) -> Result<(), PtzError> {
        let frames = self.codec.encode_home();
        self.run("home", frames).await?;
        self.remember(|_| NormalizedPosition::HOME);
        Ok(())
    }

    pub async fn recall_native_preset(&self, index: u8) -> Result<(), PtzError> {
        let frames = self.codec.encode_recall(index);
        self.run("preset recall", frames).await.map(drop)
    }

    pub async fn store_native_preset(&self, index: u8) -> Result<(), PtzError> {
        let frames = self.codec.encode_store(index);
        self.run("preset store", frames).await.map(drop)
    }

    pub async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError> {
        let frames = self.codec.encode_focus(speed);
        self.run("focus", frames).await.map(drop)
    }

    pub async fn set_autofocus(&self, enabled: bool) -> Result<(), PtzError> {
        let frames = self.codec.encode_autofocus(enabled);
        self.run("autofocus", frames).await.map(drop)
    }

    pub async fn autofocus_trigger(&self) -> Result<(), PtzError> {
        let frames = self.codec.encode_autofocus_trigger();
        self.run("one-push autofocus", frames).await.map(drop)
    }

    /// Query the camera. `Unreachable` propagates; a timeout or an
    /// undecodable reply yields the cached value.
    pub async fn get_position(&self) -> Result<PositionReport, PtzError> {
        let frames = self.codec.encode_position_inquiry();
        if frames.is_empty() {
            return Ok(PositionReport::cached(self.last_known()));
        }
        let replies = match self.run("position query", frames).await {
            Ok(replies) => replies,
            Err(e @ (PtzError::Timeout(_) | PtzError::Malformed(_))) => {
                warn!("{}: position query failed ({e}); using last known", self.name);
                return Ok(PositionReport::cached(self.last_known()));
            }
            Err(e) => return Err(e),
        };
        match self.codec.decode_position_reply(&replies) {
            Some(pos) => {
                self.remember(|_| pos);
                Ok(PositionReport::fresh(pos))
            }
            None => {
                warn!("{}: malformed position reply; using last known", self.name);
                Ok(PositionReport::cached(self.last_known()))
            }
        }
    }

    /// Round-trip one connection test to the camera. Errors propagate unchanged.
    pub async fn test_connection(&self) -> Result<(), PtzError> {
        let frames = self.codec.encode_connection_test();
        self.run("connection test", frames).await.map(drop)
    }

    /// Close the connection, waiting for any in-flight request to finish.
    pub async fn shutdown(&self) {
        let mut link = self.link.lock().await;
        link.close().await;
        debug!("{}: connection closed", self.name);
    }
}

// ── Tests ────────────────────────────────────────────────────────
