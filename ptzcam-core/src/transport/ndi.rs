//! NDI-native PTZ control over an injected link.
//!
//! NDI carries PTZ commands inside the video receiver connection, already
//! in normalized units. The SDK binding lives outside this crate and is
//! attached through [`NdiPtzLink`]; without one every command reports
//! `Unreachable`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use crate::coords::NormalizedPosition;
use crate::error::PtzError;
use crate::transport::PositionReport;

/// PTZ calls exposed by an NDI receiver. Values are normalized:
/// pan/tilt and speeds in `[-1, 1]`, zoom in `[0, 1]`.
#[async_trait]
pub trait NdiPtzLink: Send + Sync {
    async fn pan_tilt(&self, pan: f64, tilt: f64) -> Result<(), PtzError>;
    async fn pan_tilt_speed(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError>;
    async fn zoom(&self, level: f64) -> Result<(), PtzError>;
    async fn recall_preset(&self, index: u8) -> Result<(), PtzError>;
    async fn store_preset(&self, index: u8) -> Result<(), PtzError>;
    async fn focus_speed(&self, speed: f64) -> Result<(), PtzError>;
    async fn auto_focus(&self, enabled: bool) -> Result<(), PtzError>;
}

/// NDI camera. The receiver does not report position, so queries answer
/// from the last commanded position.
pub struct NdiClient {
    link: Mutex<Option<Arc<dyn NdiPtzLink>>>,
    last_known: watch::Sender<NormalizedPosition>,
}

impl NdiClient {
    pub fn new(link: Option<Arc<dyn NdiPtzLink>>) -> Self {
        let (last_known, _) = watch::channel(NormalizedPosition::HOME);
        Self {
            link: Mutex::new(link),
            last_known,
        }
    }

    async fn with_link<F, Fut>(&self, op: F) -> Result<(), PtzError>
    where
        F: FnOnce(Arc<dyn NdiPtzLink>) -> Fut,
        Fut: std::future::Future<Output = Result<(), PtzError>>,
    {
        let guard = self.link.lock().await;
        let link = guard
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| PtzError::Unreachable("no NDI receiver attached".into()))?;
        op(link).await
    }

    fn last_known(&self) -> NormalizedPosition {
        *self.last_known.borrow()
    }

    fn remember(&self, pos: NormalizedPosition) {
        self.last_known.send_replace(pos.clamped());
    }

    /// NDI has no relative command; move absolutely from the last known
    /// position.
    pub async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<(), PtzError> {
        let target = self.last_known().offset(pan_delta, tilt_delta);
        self.with_link(|l| async move { l.pan_tilt(target.pan, target.tilt).await })
            .await?;
        self.remember(target);
        Ok(())
    }

    pub async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError> {
        let pos = pos.clamped();
        self.with_link(|l| async move {
            l.pan_tilt(pos.pan, pos.tilt).await?;
            l.zoom(pos.zoom).await
        })
        .await?;
        self.remember(pos);
        Ok(())
    }

    pub async fn zoom(&self, level: f64) -> Result<(), PtzError> {
        let target = self.last_known().with_zoom(level);
        self.with_link(|l| async move { l.zoom(target.zoom).await })
            .await?;
        self.remember(target);
        Ok(())
    }

    pub async fn continuous_move(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.pan_tilt_speed(pan_speed, tilt_speed).await })
            .await
    }

    pub async fn stop(&self) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.pan_tilt_speed(0.0, 0.0).await })
            .await
    }

    pub async fn home(&self) -> Result<(), PtzError> {
        self.move_absolute(NormalizedPosition::HOME).await
    }

    pub async fn recall_native_preset(&self, index: u8) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.recall_preset(index).await })
            .await
    }

    pub async fn store_native_preset(&self, index: u8) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.store_preset(index).await })
            .await
    }

    pub async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.focus_speed(speed).await })
            .await
    }

    pub async fn set_autofocus(&self, enabled: bool) -> Result<(), PtzError> {
        self.with_link(|l| async move { l.auto_focus(enabled).await })
            .await
    }

    /// NDI has no one-shot focus; the link is checked and nothing is sent.
    pub async fn autofocus_trigger(&self) -> Result<(), PtzError> {
        self.with_link(|_| async { Ok(()) }).await
    }

    pub async fn get_position(&self) -> Result<PositionReport, PtzError> {
        if self.link.lock().await.is_none() {
            return Err(PtzError::Unreachable("no NDI receiver attached".into()));
        }
        Ok(PositionReport::cached(self.last_known()))
    }

    pub async fn test_connection(&self) -> Result<(), PtzError> {
        self.with_link(|_| async { Ok(()) }).await
    }

    /// Detach the receiver link.
    pub async fn shutdown(&self) {
        self.link.lock().await.take();
    }
}
