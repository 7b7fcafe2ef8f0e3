//! In-memory camera for demos and tests.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::coords::NormalizedPosition;
use crate::error::PtzError;
use crate::transport::PositionReport;

#[derive(Debug, Default)]
struct SimState {
    position: NormalizedPosition,
    presets: HashMap<u8, NormalizedPosition>,
    drive: (f64, f64),
    focus_speed: f64,
    autofocus: bool,
    focus_triggers: u32,
}

/// A camera that always answers and moves instantly.
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    state: Mutex<SimState>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Result<(), PtzError> {
        let mut state = self.state.lock().await;
        state.position = state.position.offset(pan_delta, tilt_delta);
        Ok(())
    }

    pub async fn move_absolute(&self, pos: NormalizedPosition) -> Result<(), PtzError> {
        self.state.lock().await.position = pos.clamped();
        Ok(())
    }

    pub async fn zoom(&self, level: f64) -> Result<(), PtzError> {
        let mut state = self.state.lock().await;
        state.position = state.position.with_zoom(level);
        Ok(())
    }

    pub async fn continuous_move(&self, pan_speed: f64, tilt_speed: f64) -> Result<(), PtzError> {
        self.state.lock().await.drive = (pan_speed, tilt_speed);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), PtzError> {
        self.state.lock().await.drive = (0.0, 0.0);
        Ok(())
    }

    pub async fn home(&self) -> Result<(), PtzError> {
        self.move_absolute(NormalizedPosition::HOME).await
    }

    pub async fn store_native_preset(&self, index: u8) -> Result<(), PtzError> {
        let mut state = self.state.lock().await;
        let snapshot = state.position;
        state.presets.insert(index, snapshot);
        Ok(())
    }

    /// An empty slot is accepted and leaves the position where it is,
    /// the way a real head ignores a recall of an unset preset.
    pub async fn recall_native_preset(&self, index: u8) -> Result<(), PtzError> {
        let mut state = self.state.lock().await;
        if let Some(stored) = state.presets.get(&index).copied() {
            state.position = stored;
        }
        Ok(())
    }

    pub async fn focus_continuous(&self, speed: f64) -> Result<(), PtzError> {
        self.state.lock().await.focus_speed = speed;
        Ok(())
    }

    pub async fn set_autofocus(&self, enabled: bool) -> Result<(), PtzError> {
        self.state.lock().await.autofocus = enabled;
        Ok(())
    }

    pub async fn autofocus_trigger(&self) -> Result<(), PtzError> {
        self.state.lock().await.focus_triggers += 1;
        Ok(())
    }

    pub async fn get_position(&self) -> Result<PositionReport, PtzError> {
        Ok(PositionReport::fresh(self.state.lock().await.position))
    }

    /// Current drive speeds set by `continuous_move`.
    pub async fn drive(&self) -> (f64, f64) {
        self.state.lock().await.drive
    }

    pub async fn focus_speed(&self) -> f64 {
        self.state.lock().await.focus_speed
    }

    pub async fn autofocus(&self) -> bool {
        self.state.lock().await.autofocus
    }

    /// How many one-push focus requests arrived.
    pub async fn focus_triggers(&self) -> u32 {
        self.state.lock().await.focus_triggers
    }
}
