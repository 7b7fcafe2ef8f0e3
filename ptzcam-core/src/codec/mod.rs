//! Pure per-protocol encoders and reply decoders.
//!
//! Codecs never perform I/O. A transport asks its codec for the frames a
//! command needs, sends them in order, and hands any replies back to the
//! codec for decoding.

pub mod birddog;
pub mod panasonic;
pub mod visca;

use crate::coords::NormalizedPosition;

pub use birddog::{BirdDogCodec, BirdDogRequest};
pub use panasonic::PanasonicCodec;
pub use visca::{ViscaCodec, ViscaIpCodec, ViscaLimits, ViscaMessage};

/// Translation between normalized commands and one wire format.
///
/// Every `encode_*` returns the frames to send in order. An empty `Vec`
/// means the protocol has no such capability; transports treat that as a
/// successful no-op.
pub trait PtzCodec {
    /// One request on the wire.
    type Frame;
    /// One reply from the device.
    type Reply;

    fn encode_move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Vec<Self::Frame>;

    fn encode_move_absolute(&self, pos: NormalizedPosition) -> Vec<Self::Frame>;

    fn encode_zoom(&self, level: f64) -> Vec<Self::Frame>;

    /// Drive at a signed speed in `[-1, 1]` per axis until stopped.
    fn encode_continuous(&self, pan_speed: f64, tilt_speed: f64) -> Vec<Self::Frame>;

    fn encode_stop(&self) -> Vec<Self::Frame>;

    fn encode_home(&self) -> Vec<Self::Frame> {
        self.encode_move_absolute(NormalizedPosition::HOME)
    }

    /// Recall a preset stored in the camera's own memory.
    fn encode_recall(&self, preset_index: u8) -> Vec<Self::Frame>;

    /// Store the current position into the camera's own memory.
    fn encode_store(&self, preset_index: u8) -> Vec<Self::Frame>;

    fn encode_focus(&self, _speed: f64) -> Vec<Self::Frame> {
        Vec::new()
    }

    fn encode_autofocus(&self, _enabled: bool) -> Vec<Self::Frame> {
        Vec::new()
    }

    /// Focus once on the current scene, then hold.
    fn encode_autofocus_trigger(&self) -> Vec<Self::Frame> {
        Vec::new()
    }

    /// Frames whose replies, in order, make up one position report.
    fn encode_position_inquiry(&self) -> Vec<Self::Frame>;

    /// Frames for a connection test.
    fn encode_connection_test(&self) -> Vec<Self::Frame> {
        self.encode_position_inquiry()
    }

    /// Decode the replies to [`encode_position_inquiry`](Self::encode_position_inquiry).
    /// Anything short or malformed yields `None`.
    fn decode_position_reply(&self, replies: &[Self::Reply]) -> Option<NormalizedPosition>;
}
