//! Panasonic AW-series CGI commands.
//!
//! Commands are sent as `GET /cgi-bin/aw_ptz?cmd=%23<CMD>&res=1`; the
//! camera answers with a short ASCII body. Positions are upper-case hex:
//!
//! ```text
//! pan/tilt  0x0001 .. 0xFFFF  (centre 0x8000)
//! zoom      0x555  .. 0xFFF
//! speed     01 .. 99 decimal  (50 = stop)
//! ```

use std::time::Duration;

use crate::codec::PtzCodec;
use crate::coords::{LinearMap, NormalizedPosition};

/// Pause between a nudge's drive and its stop.
pub const DEFAULT_NUDGE: Duration = Duration::from_millis(200);

/// Drive speed that means "stand still".
pub const STOP_SPEED: u8 = 50;

/// Pan/tilt speed byte appended to `APS` absolute moves.
const ABSOLUTE_MOVE_SPEED: &str = "30";

const PAN_TILT_MAP: LinearMap = LinearMap::pan_tilt(1.0, 65535.0);
const ZOOM_MAP: LinearMap = LinearMap::zoom(1365.0, 4095.0);

/// One step of a Panasonic command sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwFrame {
    /// A command without the leading `#`.
    Command(String),
    /// Hold the current drive before the next command.
    Wait(Duration),
}

impl AwFrame {
    fn cmd(s: impl Into<String>) -> Self {
        AwFrame::Command(s.into())
    }
}

// ── Value encoding ───────────────────────────────────────────────

pub fn pan_tilt_hex(normalized: f64) -> String {
    format!("{:04X}", PAN_TILT_MAP.to_native_rounded(normalized))
}

pub fn zoom_hex(normalized: f64) -> String {
    format!("{:03X}", ZOOM_MAP.to_native_rounded(normalized))
}

/// Signed speed in `[-1, 1]` → `01..=99`, with `50` inside the deadband.
pub fn speed_code(speed: f64) -> u8 {
    if speed.is_nan() || speed.abs() < 0.01 {
        return STOP_SPEED;
    }
    let magnitude = speed.abs().min(1.0) * 48.0;
    let code = if speed > 0.0 {
        51.0 + magnitude
    } else {
        49.0 - magnitude
    };
    code.round().clamp(1.0, 99.0) as u8
}

fn parse_hex_field(body: &str, prefix: &str, digits: usize) -> Option<Vec<u16>> {
    let rest = body.trim().strip_prefix(prefix)?;
    if rest.len() < digits || !rest.is_ascii() {
        return None;
    }
    let fields = rest.len().min(digits * 2) / digits;
    (0..fields)
        .map(|i| u16::from_str_radix(&rest[i * digits..(i + 1) * digits], 16).ok())
        .collect()
}

/// Parse `aPC<pan 4 hex><tilt 4 hex>`.
pub fn parse_pan_tilt_reply(body: &str) -> Option<(u16, u16)> {
    match parse_hex_field(body, "aPC", 4)?.as_slice() {
        [pan, tilt] => Some((*pan, *tilt)),
        _ => None,
    }
}

/// Parse `gz<zoom 3 hex>`.
pub fn parse_zoom_reply(body: &str) -> Option<u16> {
    parse_hex_field(body, "gz", 3)?.first().copied()
}

// ── PanasonicCodec ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanasonicCodec {
    /// How long a relative move drives before stopping.
    pub nudge: Duration,
}

impl Default for PanasonicCodec {
    fn default() -> Self {
        Self {
            nudge: DEFAULT_NUDGE,
        }
    }
}

impl PanasonicCodec {
    pub fn new(nudge: Duration) -> Self {
        Self { nudge }
    }
}

impl PtzCodec for PanasonicCodec {
    type Frame = AwFrame;
    type Reply = String;

    /// The AW protocol has no relative position command, so a relative move
    /// is a short drive proportional to the delta followed by a stop.
    fn encode_move_relative(&self, pan_delta: f64, tilt_delta: f64) -> Vec<AwFrame> {
        let pan = speed_code(pan_delta);
        let tilt = speed_code(tilt_delta);
        if pan == STOP_SPEED && tilt == STOP_SPEED {
            return Vec::new();
        }
        vec![
            AwFrame::cmd(format!("P{pan:02}")),
            AwFrame::cmd(format!("T{tilt:02}")),
            AwFrame::Wait(self.nudge),
            AwFrame::cmd(format!("PTS{STOP_SPEED}{STOP_SPEED}")),
        ]
    }

    fn encode_move_absolute(&self, pos: NormalizedPosition) -> Vec<AwFrame> {
        vec![
            AwFrame::cmd(format!(
                "APS{}{}{ABSOLUTE_MOVE_SPEED}",
                pan_tilt_hex(pos.pan),
                pan_tilt_hex(pos.tilt)
            )),
            AwFrame::cmd(format!("Z{}", zoom_hex(pos.zoom))),
        ]
    }

    fn encode_zoom(&self, level: f64) -> Vec<AwFrame> {
        vec![AwFrame::cmd(format!("Z{}", zoom_hex(level)))]
    }

    fn encode_continuous(&self, pan_speed: f64, tilt_speed: f64) -> Vec<AwFrame> {
        vec![AwFrame::cmd(format!(
            "PTS{:02}{:02}",
            speed_code(pan_speed),
            speed_code(tilt_speed)
        ))]
    }

    fn encode_stop(&self) -> Vec<AwFrame> {
        vec![AwFrame::cmd(format!("PTS{STOP_SPEED}{STOP_SPEED}"))]
    }

    fn encode_recall(&self, preset_index: u8) -> Vec<AwFrame> {
        vec![AwFrame::cmd(format!("R{preset_index:02}"))]
    }

    fn encode_store(&self, preset_index: u8) -> Vec<AwFrame> {
        vec![AwFrame::cmd(format!("M{preset_index:02}"))]
    }

    fn encode_position_inquiry(&self) -> Vec<AwFrame> {
        vec![AwFrame::cmd("APC"), AwFrame::cmd("GZ")]
    }

    fn decode_position_reply(&self, replies: &[String]) -> Option<NormalizedPosition> {
        let [pan_tilt, zoom] = replies else {
            return None;
        };
        let (pan, tilt) = parse_pan_tilt_reply(pan_tilt)?;
        let zoom = parse_zoom_reply(zoom)?;
        NormalizedPosition::new(
            PAN_TILT_MAP.from_native(pan as f64),
            PAN_TILT_MAP.from_native(tilt as f64),
            ZOOM_MAP.from_native(zoom as f64),
        )
    }
}
