//! VISCA-over-IP encoding for Sony and compatible PTZ cameras.
//!
//! ## Wire format
//!
//! Each UDP datagram is an 8-byte header followed by one VISCA message:
//!
//! ```text
//! payload_type:    u16 BE   0x0100 command, 0x0110 inquiry, 0x0111 reply
//! payload_length:  u16 BE
//! sequence:        u32 BE
//! payload:         81 .. FF
//! ```
//!
//! Positions travel as 4-nibble fields (`0p 0p 0p 0p`), one nibble per
//! byte, most significant first. Pan and tilt are signed 16-bit values,
//! zoom is unsigned.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::PtzCodec;
use crate::coords::{LinearMap, NormalizedPosition};
use crate::error::PtzError;

/// Bytes in the VISCA-over-IP header.
pub const HEADER_SIZE: usize = 8;

/// Largest VISCA message a camera may send (the protocol limit is 16 bytes;
/// extra headroom for vendor extensions).
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Maximum pan drive speed (`0x18`).
pub const MAX_PAN_SPEED: u8 = 0x18;
/// Maximum tilt drive speed (`0x17`).
pub const MAX_TILT_SPEED: u8 = 0x17;
/// Focus drive speeds run `0..=7`.
pub const MAX_FOCUS_SPEED: u8 = 0x07;

const TERMINATOR: u8 = 0xFF;

// ── PayloadType ──────────────────────────────────────────────────

/// The `payload_type` field of the VISCA-over-IP header.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    Command = 0x0100,
    Inquiry = 0x0110,
    Reply = 0x0111,
    ControlCommand = 0x0200,
    ControlReply = 0x0201,
}

impl PayloadType {
    /// Commands are `8x 01 ..`, inquiries `8x 09 ..`.
    pub fn for_payload(payload: &[u8]) -> Self {
        match payload.get(1) {
            Some(0x09) => PayloadType::Inquiry,
            _ => PayloadType::Command,
        }
    }
}

impl TryFrom<u16> for PayloadType {
    type Error = PtzError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0100 => Ok(PayloadType::Command),
            0x0110 => Ok(PayloadType::Inquiry),
            0x0111 => Ok(PayloadType::Reply),
            0x0200 => Ok(PayloadType::ControlCommand),
            0x0201 => Ok(PayloadType::ControlReply),
            other => Err(PtzError::Malformed(format!(
                "unknown VISCA payload type {other:#06x}"
            ))),
        }
    }
}

// ── ViscaMessage ─────────────────────────────────────────────────

/// One VISCA-over-IP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaMessage {
    pub payload_type: PayloadType,
    pub sequence: u32,
    pub payload: Bytes,
}

impl ViscaMessage {
    /// Wrap a VISCA payload, inferring command vs. inquiry.
    pub fn new(sequence: u32, payload: Bytes) -> Self {
        Self {
            payload_type: PayloadType::for_payload(&payload),
            sequence,
            payload,
        }
    }

    /// Serialize header + payload.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE + self.payload.len());
        dst.put_u16(self.payload_type as u16);
        dst.put_u16(self.payload.len() as u16);
        dst.put_u32(self.sequence);
        dst.put_slice(&self.payload);
    }

    /// Parse one datagram.
    pub fn decode(mut datagram: &[u8]) -> Result<Self, PtzError> {
        if datagram.len() < HEADER_SIZE {
            return Err(PtzError::Malformed(format!(
                "VISCA datagram too short: {} < {HEADER_SIZE}",
                datagram.len()
            )));
        }
        let payload_type = PayloadType::try_from(datagram.get_u16())?;
        let length = datagram.get_u16() as usize;
        let sequence = datagram.get_u32();
        if length != datagram.len() || length > MAX_PAYLOAD_SIZE {
            return Err(PtzError::Malformed(format!(
                "VISCA payload length {length} does not match datagram ({} bytes)",
                datagram.len()
            )));
        }
        Ok(Self {
            payload_type,
            sequence,
            payload: Bytes::copy_from_slice(datagram),
        })
    }
}

// ── ViscaIpCodec ─────────────────────────────────────────────────

/// Datagram codec for use with `tokio_util::udp::UdpFramed`.
///
/// Every call to `decode` consumes the whole buffer: one datagram is one
/// message. Malformed datagrams surface as `PtzError::Malformed` with the
/// buffer already drained, so the stream moves on to the next datagram.
#[derive(Debug, Default)]
pub struct ViscaIpCodec;

impl tokio_util::codec::Decoder for ViscaIpCodec {
    type Item = ViscaMessage;
    type Error = PtzError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        ViscaMessage::decode(&datagram).map(Some)
    }
}

impl tokio_util::codec::Encoder<ViscaMessage> for ViscaIpCodec {
    type Error = PtzError;

    fn encode(&mut self, item: ViscaMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

// ── Reply classification ─────────────────────────────────────────

/// What a camera said back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// `y0 4z FF`: command accepted into socket `z`.
    Ack,
    /// `y0 5z FF`: command finished.
    Completion,
    /// `y0 50 .. FF` with data: inquiry answer.
    InquiryData,
    /// `y0 6z ee FF`: camera rejected the message.
    Error(u8),
}

/// Classify a reply payload. Returns `None` for anything unrecognisable.
pub fn classify_reply(payload: &[u8]) -> Option<ReplyKind> {
    let (&first, rest) = payload.split_first()?;
    if first & 0x8F != 0x80 || first < 0x90 || payload.last() != Some(&TERMINATOR) {
        return None;
    }
    let &kind = rest.first()?;
    match (kind & 0xF0, payload.len()) {
        (0x40, 3) => Some(ReplyKind::Ack),
        (0x50, 3) => Some(ReplyKind::Completion),
        (0x50, n) if n > 3 => Some(ReplyKind::InquiryData),
        (0x60, 4) => Some(ReplyKind::Error(payload[2])),
        _ => None,
    }
}

// ── Nibble helpers ───────────────────────────────────────────────

fn put_nibbles(buf: &mut BytesMut, value: u16) {
    buf.put_u8(((value >> 12) & 0x0F) as u8);
    buf.put_u8(((value >> 8) & 0x0F) as u8);
    buf.put_u8(((value >> 4) & 0x0F) as u8);
    buf.put_u8((value & 0x0F) as u8);
}

/// Read a 4-nibble field. Any byte with a high nibble set is invalid.
fn read_nibbles(bytes: &[u8]) -> Option<u16> {
    if bytes.len() != 4 || bytes.iter().any(|b| b & 0xF0 != 0) {
        return None;
    }
    Some(bytes.iter().fold(0u16, |acc, &b| (acc << 4) | b as u16))
}

fn saturate_i16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

fn saturate_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

// ── Payload builders ─────────────────────────────────────────────

/// `81 01 06 02 VV WW 0p0p0p0p 0t0t0t0t FF`
pub fn pan_tilt_absolute(pan_speed: u8, tilt_speed: u8, pan: i16, tilt: i16) -> Bytes {
    let mut buf = BytesMut::with_capacity(15);
    buf.put_slice(&[0x81, 0x01, 0x06, 0x02, pan_speed, tilt_speed]);
    put_nibbles(&mut buf, pan as u16);
    put_nibbles(&mut buf, tilt as u16);
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// `81 01 06 03 VV WW 0p0p0p0p 0t0t0t0t FF`
pub fn pan_tilt_relative(pan_speed: u8, tilt_speed: u8, pan: i16, tilt: i16) -> Bytes {
    let mut buf = BytesMut::with_capacity(15);
    buf.put_slice(&[0x81, 0x01, 0x06, 0x03, pan_speed, tilt_speed]);
    put_nibbles(&mut buf, pan as u16);
    put_nibbles(&mut buf, tilt as u16);
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// `81 01 06 01 VV WW pp tt FF`: pan dir 01 left / 02 right / 03 stop,
/// tilt dir 01 up / 02 down / 03 stop.
pub fn pan_tilt_drive(pan_speed: u8, tilt_speed: u8, pan_dir: u8, tilt_dir: u8) -> Bytes {
    Bytes::copy_from_slice(&[
        0x81, 0x01, 0x06, 0x01, pan_speed, tilt_speed, pan_dir, tilt_dir, TERMINATOR,
    ])
}

pub fn pan_tilt_stop() -> Bytes {
    pan_tilt_drive(0x00, 0x00, 0x03, 0x03)
}

/// `81 01 04 47 0z0z0z0z FF`
pub fn zoom_direct(position: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(9);
    buf.put_slice(&[0x81, 0x01, 0x04, 0x47]);
    put_nibbles(&mut buf, position);
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// `81 01 04 3F 02 pp FF`
pub fn preset_recall(preset: u8) -> Bytes {
    Bytes::copy_from_slice(&[0x81, 0x01, 0x04, 0x3F, 0x02, preset, TERMINATOR])
}

/// `81 01 04 3F 01 pp FF`
pub fn preset_store(preset: u8) -> Bytes {
    Bytes::copy_from_slice(&[0x81, 0x01, 0x04, 0x3F, 0x01, preset, TERMINATOR])
}

/// `81 01 04 08 2p FF` far, `3p` near, `00` stop.
pub fn focus_drive(speed: f64) -> Bytes {
    let magnitude = (speed.abs() * MAX_FOCUS_SPEED as f64).round() as u8;
    let magnitude = magnitude.min(MAX_FOCUS_SPEED);
    let code = if speed.is_nan() || magnitude == 0 {
        0x00
    } else if speed > 0.0 {
        0x20 | magnitude
    } else {
        0x30 | magnitude
    };
    Bytes::copy_from_slice(&[0x81, 0x01, 0x04, 0x08, code, TERMINATOR])
}

/// `81 01 04 38 02 FF` auto, `03` manual.
pub fn autofocus(enabled: bool) -> Bytes {
    let mode = if enabled { 0x02 } else { 0x03 };
    Bytes::copy_from_slice(&[0x81, 0x01, 0x04, 0x38, mode, TERMINATOR])
}

/// `81 01 04 18 01 FF`
pub fn one_push_autofocus() -> Bytes {
    Bytes::from_static(&[0x81, 0x01, 0x04, 0x18, 0x01, TERMINATOR])
}

pub fn pan_tilt_position_inquiry() -> Bytes {
    Bytes::from_static(&[0x81, 0x09, 0x06, 0x12, TERMINATOR])
}

pub fn zoom_position_inquiry() -> Bytes {
    Bytes::from_static(&[0x81, 0x09, 0x04, 0x47, TERMINATOR])
}

// ── Reply decoders ───────────────────────────────────────────────

/// Decode `y0 50 0p0p0p0p 0t0t0t0t FF` into raw signed pan/tilt.
pub fn decode_pan_tilt_reply(payload: &[u8]) -> Option<(i16, i16)> {
    if payload.len() != 11 || classify_reply(payload)? != ReplyKind::InquiryData {
        return None;
    }
    let pan = read_nibbles(&payload[2..6])? as i16;
    let tilt = read_nibbles(&payload[6..10])? as i16;
    Some((pan, tilt))
}

/// Decode `y0 50 0z0z0z0z FF` into the raw zoom position.
pub fn decode_zoom_reply(payload: &[u8]) -> Option<u16> {
    if payload.len() != 7 || classify_reply(payload)? != ReplyKind::InquiryData {
        return None;
    }
    read_nibbles(&payload[2..6])
}

// ── ViscaLimits ──────────────────────────────────────────────────

/// Native extrema used to map normalized positions onto VISCA fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViscaLimits {
    pub pan: LinearMap,
    pub tilt: LinearMap,
    pub zoom: LinearMap,
}

impl ViscaLimits {
    /// Symmetric ±0x4000 pan/tilt and 0..0x4000 zoom: 1/16384 resolution
    /// on every axis.
    pub const WIDE: Self = Self {
        pan: LinearMap::pan_tilt(-16384.0, 16384.0),
        tilt: LinearMap::pan_tilt(-16384.0, 16384.0),
        zoom: LinearMap::zoom(0.0, 16384.0),
    };

    /// Sony EVI-H100 class: pan 0xFC90..0x0370, tilt 0xFE70..0x0120.
    pub const SONY_EVI: Self = Self {
        pan: LinearMap::pan_tilt(-880.0, 880.0),
        tilt: LinearMap::pan_tilt(-400.0, 288.0),
        zoom: LinearMap::zoom(0.0, 16384.0),
    };

    /// Look a named profile up (`"wide"`, `"sony-evi"`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "wide" => Some(Self::WIDE),
            "sony-evi" | "sony_evi" => Some(Self::SONY_EVI),
            _ => None,
        }
    }

    fn span(map: &LinearMap) -> f64 {
        map.native_max - map.native_min
    }
}

impl Default for ViscaLimits {
    fn default() -> Self {
        Self::WIDE
    }
}

// ── ViscaCodec ───────────────────────────────────────────────────

/// Pure VISCA encoder/decoder over normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViscaCodec {
    pub limits: ViscaLimits,
    /// Pan/tilt speed used for absolute and relative position moves.
    pub move_speed: (u8, u8),
}

impl Default for ViscaCodec {
    fn default() -> Self {
        Self {
            limits: ViscaLimits::default(),
            move_speed: (0x0C, 0x0C),
        }
    }
}

impl ViscaCodec {
    pub fn new(limits: ViscaLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn encode_pan(&self, pan: f64) -> i16 {
        saturate_i16(self.limits.pan.to_native_rounded(pan))
    }

    pub fn encode_tilt(&self, tilt: f64) -> i16 {
        saturate_i16(self.limits.tilt.to_native_rounded(tilt))
    }

    pub fn encode_zoom_value(&self, zoom: f64) -> u16 {
        saturate_u16(self.limits.zoom.to_native_rounded(zoom))
    }

    /// Scale a normalized delta (`-2..=2`, a full traverse) to native units.
    fn delta_units(map: &LinearMap, delta: f64) -> i16 {
        if delta.is_nan() {
            return 0;
        }
        let half_span = ViscaLimits::span(map) / 2.0;
        saturate_i16((delta.clamp(-2.0, 2.0) * half_span).round() as i64)
    }

    fn drive_speed(speed: f64, max: u8) -> u8 {
        ((speed.abs() * max as f64).ceil() as u8).clamp(1, max)
    }

    /// Build a VISCA-over-IP inquiry reply for a position. Fake cameras and
    /// tests use it; real cameras send the same bytes.
    pub fn pan_tilt_reply(&self, pos: NormalizedPosition) -> Bytes {
        let mut buf = BytesMut::with_capacity(11);
        buf.put_slice(&[0x90, 0x50]);
        put_nibbles(&mut buf, self.encode_pan(pos.pan) as u16);
        put_nibbles(&mut buf, self.encode_tilt(pos.tilt) as u16);
        buf.put_u8(TERMINATOR);
        buf.freeze()
    }

    pub fn zoom_reply(&self, zoom: f64) -> Bytes {
        let mut buf = BytesMut::with_capacity(7);
        buf.put_slice(&[0x90, 0x50]);
        put_nibbles(&mut buf, self.encode_zoom_value(zoom));
        buf.put_u8(TERMINATOR);
        buf.freeze()
    }
}

impl PtzCodec for ViscaCodec {
    type Frame = Bytes;
    type Reply = Bytes;

    fn encode_move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Vec<Bytes> {
        let pan = Self::delta_units(&self.limits.pan, pan_delta);
        let tilt = Self::delta_units(&self.limits.tilt, tilt_delta);
        if pan == 0 && tilt == 0 {
            return Vec::new();
        }
        let (ps, ts) = self.move_speed;
        vec![pan_tilt_relative(ps, ts, pan, tilt)]
    }

    fn encode_move_absolute(&self, pos: NormalizedPosition) -> Vec<Bytes> {
        let (ps, ts) = self.move_speed;
        vec![
            pan_tilt_absolute(ps, ts, self.encode_pan(pos.pan), self.encode_tilt(pos.tilt)),
            zoom_direct(self.encode_zoom_value(pos.zoom)),
        ]
    }

    fn encode_zoom(&self, level: f64) -> Vec<Bytes> {
        vec![zoom_direct(self.encode_zoom_value(level))]
    }

    fn encode_continuous(&self, pan_speed: f64, tilt_speed: f64) -> Vec<Bytes> {
        const DEADBAND: f64 = 0.01;
        let pan_dir = match pan_speed {
            s if s < -DEADBAND => 0x01,
            s if s > DEADBAND => 0x02,
            _ => 0x03,
        };
        let tilt_dir = match tilt_speed {
            s if s > DEADBAND => 0x01,
            s if s < -DEADBAND => 0x02,
            _ => 0x03,
        };
        if pan_dir == 0x03 && tilt_dir == 0x03 {
            return self.encode_stop();
        }
        vec![pan_tilt_drive(
            Self::drive_speed(pan_speed, MAX_PAN_SPEED),
            Self::drive_speed(tilt_speed, MAX_TILT_SPEED),
            pan_dir,
            tilt_dir,
        )]
    }

    fn encode_stop(&self) -> Vec<Bytes> {
        vec![pan_tilt_stop()]
    }

    fn encode_recall(&self, preset_index: u8) -> Vec<Bytes> {
        vec![preset_recall(preset_index)]
    }

    fn encode_store(&self, preset_index: u8) -> Vec<Bytes> {
        vec![preset_store(preset_index)]
    }

    fn encode_focus(&self, speed: f64) -> Vec<Bytes> {
        vec![focus_drive(speed)]
    }

    fn encode_autofocus(&self, enabled: bool) -> Vec<Bytes> {
        vec![autofocus(enabled)]
    }

    fn encode_autofocus_trigger(&self) -> Vec<Bytes> {
        vec![one_push_autofocus()]
    }

    fn encode_position_inquiry(&self) -> Vec<Bytes> {
        vec![pan_tilt_position_inquiry(), zoom_position_inquiry()]
    }

    fn decode_position_reply(&self, replies: &[Bytes]) -> Option<NormalizedPosition> {
        let [pan_tilt, zoom] = replies else {
            return None;
        };
        let (pan, tilt) = decode_pan_tilt_reply(pan_tilt)?;
        let zoom = decode_zoom_reply(zoom)?;
        NormalizedPosition::new(
            self.limits.pan.from_native(pan as f64),
            self.limits.tilt.from_native(tilt as f64),
            self.limits.zoom.from_native(zoom as f64),
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn header_layout() {
        let msg = ViscaMessage::new(0x01020304, preset_recall(3));
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        assert_eq!(
            &buf[..HEADER_SIZE],
            &[0x01, 0x00, 0x00, 0x07, 0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(&buf[HEADER_SIZE..], &[0x81, 0x01, 0x04, 0x3F, 0x02, 0x03, 0xFF]);
    }

    #[test]
    fn inquiry_payload_type_is_inferred() {
        let msg = ViscaMessage::new(1, pan_tilt_position_inquiry());
        assert_eq!(msg.payload_type, PayloadType::Inquiry);
        let msg = ViscaMessage::new(1, pan_tilt_stop());
        assert_eq!(msg.payload_type, PayloadType::Command);
    }

    #[test]
    fn codec_decodes_whole_datagram() {
        let mut codec = ViscaIpCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(
                ViscaMessage {
                    payload_type: PayloadType::Reply,
                    sequence: 9,
                    payload: Bytes::from_static(&[0x90, 0x41, 0xFF]),
                },
                &mut buf,
            )
            .unwrap();
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.sequence, 9);
        assert_eq!(classify_reply(&msg.payload), Some(ReplyKind::Ack));
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn codec_drains_malformed_datagram() {
        let mut codec = ViscaIpCodec;
        let mut buf = BytesMut::from(&[0x01, 0x11, 0x00][..]);
        assert!(matches!(codec.decode(&mut buf), Err(PtzError::Malformed(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let datagram = [0x01, 0x11, 0x00, 0x09, 0, 0, 0, 1, 0x90, 0x41, 0xFF];
        assert!(ViscaMessage::decode(&datagram).is_err());
    }

    #[test]
    fn absolute_move_nibbles() {
        let payload = pan_tilt_absolute(0x0C, 0x0C, -880, 288);
        // -880 = 0xFC90, 288 = 0x0120
        assert_eq!(
            &payload[..],
            &[
                0x81, 0x01, 0x06, 0x02, 0x0C, 0x0C, 0x0F, 0x0C, 0x09, 0x00, 0x00, 0x01, 0x02,
                0x00, 0xFF
            ]
        );
    }

    #[test]
    fn zoom_direct_nibbles() {
        assert_eq!(
            &zoom_direct(0x4000)[..],
            &[0x81, 0x01, 0x04, 0x47, 0x04, 0x00, 0x00, 0x00, 0xFF]
        );
    }

    #[test]
    fn continuous_directions() {
        let codec = ViscaCodec::default();
        let frames = codec.encode_continuous(-1.0, 0.5);
        assert_eq!(
            &frames[0][..],
            &[0x81, 0x01, 0x06, 0x01, MAX_PAN_SPEED, 0x0C, 0x01, 0x01, 0xFF]
        );
        let frames = codec.encode_continuous(0.0, 0.0);
        assert_eq!(frames, vec![pan_tilt_stop()]);
    }

    #[test]
    fn relative_move_scales_by_half_span() {
        let codec = ViscaCodec::new(ViscaLimits::SONY_EVI);
        let frames = codec.encode_move_relative(0.5, -0.25);
        let payload = &frames[0];
        assert_eq!(&payload[..4], &[0x81, 0x01, 0x06, 0x03]);
        // pan: 0.5 * 880 = 440 = 0x01B8; tilt: -0.25 * 344 = -86 = 0xFFAA
        assert_eq!(&payload[6..10], &[0x00, 0x01, 0x0B, 0x08]);
        assert_eq!(&payload[10..14], &[0x0F, 0x0F, 0x0A, 0x0A]);
    }

    #[test]
    fn zero_relative_move_is_a_no_op() {
        let codec = ViscaCodec::default();
        assert!(codec.encode_move_relative(0.0, 0.0).is_empty());
    }

    #[test]
    fn focus_codes() {
        assert_eq!(focus_drive(1.0)[4], 0x27);
        assert_eq!(focus_drive(-0.5)[4], 0x34);
        assert_eq!(focus_drive(0.0)[4], 0x00);
        assert_eq!(autofocus(true)[4], 0x02);
        assert_eq!(autofocus(false)[4], 0x03);
        assert_eq!(
            ViscaCodec::default().encode_autofocus_trigger(),
            vec![Bytes::from_static(&[0x81, 0x01, 0x04, 0x18, 0x01, 0xFF])]
        );
    }

    #[test]
    fn reply_classification() {
        assert_eq!(classify_reply(&[0x90, 0x41, 0xFF]), Some(ReplyKind::Ack));
        assert_eq!(classify_reply(&[0x90, 0x51, 0xFF]), Some(ReplyKind::Completion));
        assert_eq!(
            classify_reply(&[0x90, 0x60, 0x02, 0xFF]),
            Some(ReplyKind::Error(0x02))
        );
        assert_eq!(classify_reply(&[0x90, 0x50, 0x01, 0x02, 0x03, 0x04, 0xFF]), Some(ReplyKind::InquiryData));
        assert_eq!(classify_reply(&[0x81, 0x41, 0xFF]), None);
        assert_eq!(classify_reply(&[0x90, 0x41]), None);
    }

    #[test]
    fn position_round_trip_within_resolution() {
        let codec = ViscaCodec::default();
        let pos = NormalizedPosition::new(0.37, -0.52, 0.61).unwrap();
        let replies = [codec.pan_tilt_reply(pos), codec.zoom_reply(pos.zoom)];
        let back = codec.decode_position_reply(&replies).unwrap();
        let tol = 1.0 / 16384.0;
        assert!((back.pan - 0.37).abs() <= tol, "pan {}", back.pan);
        assert!((back.tilt + 0.52).abs() <= tol, "tilt {}", back.tilt);
        assert!((back.zoom - 0.61).abs() <= tol, "zoom {}", back.zoom);
    }

    #[test]
    fn negative_pan_decodes_as_signed() {
        let payload = [0x90, 0x50, 0x0F, 0x0C, 0x09, 0x00, 0x00, 0x01, 0x02, 0x00, 0xFF];
        assert_eq!(decode_pan_tilt_reply(&payload), Some((-880, 288)));
    }

    #[test]
    fn malformed_replies_decode_to_none() {
        let codec = ViscaCodec::default();
        let zoom = codec.zoom_reply(0.5);
        // short
        let short = Bytes::from_static(&[0x90, 0x50, 0x00, 0xFF]);
        assert!(codec.decode_position_reply(&[short, zoom.clone()]).is_none());
        // nibble byte with a high bit set
        let bad = Bytes::from_static(&[
            0x90, 0x50, 0x1F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF,
        ]);
        assert!(codec.decode_position_reply(&[bad, zoom.clone()]).is_none());
        // missing zoom reply
        let pt = codec.pan_tilt_reply(NormalizedPosition::HOME);
        assert!(codec.decode_position_reply(&[pt]).is_none());
    }

    #[test]
    fn limits_by_name() {
        assert_eq!(ViscaLimits::by_name("Sony-EVI"), Some(ViscaLimits::SONY_EVI));
        assert_eq!(ViscaLimits::by_name("wide"), Some(ViscaLimits::WIDE));
        assert!(ViscaLimits::by_name("other").is_none());
    }
}
