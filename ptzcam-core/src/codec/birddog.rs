//! BirdDog REST API bodies.

use serde_json::{Value, json};

use crate::codec::PtzCodec;
use crate::coords::{LinearMap, NormalizedPosition};

/// One HTTP request against the camera's REST API.
#[derive(Debug, Clone, PartialEq)]
pub enum BirdDogRequest {
    Get { path: &'static str },
    Post { path: &'static str, body: Value },
}

impl BirdDogRequest {
    pub fn path(&self) -> &'static str {
        match self {
            BirdDogRequest::Get { path } | BirdDogRequest::Post { path, .. } => path,
        }
    }
}

/// Per-axis mapping between normalized values and the camera's floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BirdDogCodec {
    pub pan: LinearMap,
    pub tilt: LinearMap,
    pub zoom: LinearMap,
}

impl Default for BirdDogCodec {
    fn default() -> Self {
        Self {
            pan: LinearMap::pan_tilt(-1.0, 1.0),
            tilt: LinearMap::pan_tilt(-1.0, 1.0),
            zoom: LinearMap::zoom(0.0, 1.0),
        }
    }
}

impl BirdDogCodec {
    fn scale_delta(map: &LinearMap, delta: f64) -> f64 {
        if delta.is_nan() {
            return 0.0;
        }
        let ratio = (map.native_max - map.native_min) / (map.normalized_max - map.normalized_min);
        delta.clamp(-2.0, 2.0) * ratio
    }

    fn ptz(body: Value) -> BirdDogRequest {
        BirdDogRequest::Post { path: "ptz", body }
    }
}

impl PtzCodec for BirdDogCodec {
    type Frame = BirdDogRequest;
    type Reply = Value;

    fn encode_move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Vec<BirdDogRequest> {
        vec![Self::ptz(json!({
            "pan": Self::scale_delta(&self.pan, pan_delta),
            "tilt": Self::scale_delta(&self.tilt, tilt_delta),
            "mode": "relative",
        }))]
    }

    fn encode_move_absolute(&self, pos: NormalizedPosition) -> Vec<BirdDogRequest> {
        vec![Self::ptz(json!({
            "pan": self.pan.to_native(pos.pan),
            "tilt": self.tilt.to_native(pos.tilt),
            "zoom": self.zoom.to_native(pos.zoom),
            "mode": "absolute",
        }))]
    }

    fn encode_zoom(&self, level: f64) -> Vec<BirdDogRequest> {
        vec![Self::ptz(json!({
            "zoom": self.zoom.to_native(level),
            "mode": "absolute",
        }))]
    }

    fn encode_continuous(&self, _pan_speed: f64, _tilt_speed: f64) -> Vec<BirdDogRequest> {
        Vec::new()
    }

    fn encode_stop(&self) -> Vec<BirdDogRequest> {
        Vec::new()
    }

    fn encode_recall(&self, preset_index: u8) -> Vec<BirdDogRequest> {
        vec![BirdDogRequest::Post {
            path: "recall",
            body: json!({ "preset": preset_index }),
        }]
    }

    fn encode_store(&self, preset_index: u8) -> Vec<BirdDogRequest> {
        vec![BirdDogRequest::Post {
            path: "store",
            body: json!({ "preset": preset_index }),
        }]
    }

    fn encode_position_inquiry(&self) -> Vec<BirdDogRequest> {
        vec![BirdDogRequest::Get {
            path: "ptz/position",
        }]
    }

    fn encode_connection_test(&self) -> Vec<BirdDogRequest> {
        vec![BirdDogRequest::Get { path: "about" }]
    }

    fn decode_position_reply(&self, replies: &[Value]) -> Option<NormalizedPosition> {
        let [reply] = replies else {
            return None;
        };
        let pan = reply.get("pan")?.as_f64()?;
        let tilt = reply.get("tilt")?.as_f64()?;
        let zoom = reply.get("zoom")?.as_f64()?;
        NormalizedPosition::new(
            self.pan.from_native(pan),
            self.tilt.from_native(tilt),
            self.zoom.from_native(zoom),
        )
    }
}
