//! Normalized PTZ coordinate space.
//!
//! Every protocol's motion space is mapped onto one coordinate system:
//!
//! ```text
//! pan   -1.0 (full left)  ..  1.0 (full right)
//! tilt  -1.0 (full down)  ..  1.0 (full up)
//! zoom   0.0 (wide)       ..  1.0 (tele)
//! ```
//!
//! Values are clamped after every mutation and NaN never enters a
//! [`NormalizedPosition`].

use serde::{Deserialize, Serialize};

/// Lower and upper bound for pan and tilt.
pub const PAN_TILT_MIN: f64 = -1.0;
pub const PAN_TILT_MAX: f64 = 1.0;

/// Lower and upper bound for zoom.
pub const ZOOM_MIN: f64 = 0.0;
pub const ZOOM_MAX: f64 = 1.0;

/// Clamp a pan or tilt value into `[-1, 1]`. Returns `None` for NaN.
pub fn clamp_pan_tilt(value: f64) -> Option<f64> {
    (!value.is_nan()).then(|| value.clamp(PAN_TILT_MIN, PAN_TILT_MAX))
}

/// Clamp a zoom value into `[0, 1]`. Returns `None` for NaN.
pub fn clamp_zoom(value: f64) -> Option<f64> {
    (!value.is_nan()).then(|| value.clamp(ZOOM_MIN, ZOOM_MAX))
}

// ── NormalizedPosition ───────────────────────────────────────────

/// A pan/tilt/zoom triple in the protocol-independent coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPosition {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl NormalizedPosition {
    /// Centre of the motion range, fully zoomed out.
    pub const HOME: Self = Self {
        pan: 0.0,
        tilt: 0.0,
        zoom: 0.0,
    };

    /// Build a clamped position. Returns `None` if any axis is NaN.
    pub fn new(pan: f64, tilt: f64, zoom: f64) -> Option<Self> {
        Some(Self {
            pan: clamp_pan_tilt(pan)?,
            tilt: clamp_pan_tilt(tilt)?,
            zoom: clamp_zoom(zoom)?,
        })
    }

    /// Re-clamp a value that may have been built field by field
    /// (e.g. deserialized). NaN axes fall back to [`HOME`](Self::HOME).
    pub fn clamped(self) -> Self {
        Self {
            pan: clamp_pan_tilt(self.pan).unwrap_or(Self::HOME.pan),
            tilt: clamp_pan_tilt(self.tilt).unwrap_or(Self::HOME.tilt),
            zoom: clamp_zoom(self.zoom).unwrap_or(Self::HOME.zoom),
        }
    }

    /// Apply a pan/tilt delta and clamp. A NaN delta leaves its axis alone.
    pub fn offset(self, pan_delta: f64, tilt_delta: f64) -> Self {
        Self {
            pan: clamp_pan_tilt(self.pan + pan_delta).unwrap_or(self.pan),
            tilt: clamp_pan_tilt(self.tilt + tilt_delta).unwrap_or(self.tilt),
            zoom: self.zoom,
        }
    }

    /// Replace the zoom level, clamped. NaN keeps the current zoom.
    pub fn with_zoom(self, zoom: f64) -> Self {
        Self {
            zoom: clamp_zoom(zoom).unwrap_or(self.zoom),
            ..self
        }
    }

    /// True when every axis is finite and inside its range.
    pub fn is_valid(&self) -> bool {
        (PAN_TILT_MIN..=PAN_TILT_MAX).contains(&self.pan)
            && (PAN_TILT_MIN..=PAN_TILT_MAX).contains(&self.tilt)
            && (ZOOM_MIN..=ZOOM_MAX).contains(&self.zoom)
    }
}

impl std::fmt::Display for NormalizedPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pan={:+.4} tilt={:+.4} zoom={:.4}",
            self.pan, self.tilt, self.zoom
        )
    }
}

// ── LinearMap ────────────────────────────────────────────────────

/// Linear conversion between one normalized axis and a protocol's
/// native numeric range.
///
/// `to_native` clamps its input first, so every conversion is total.
/// Integer protocols use [`to_native_rounded`](Self::to_native_rounded)
/// (round-to-nearest); the inverse is exact within half a native unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearMap {
    pub normalized_min: f64,
    pub normalized_max: f64,
    pub native_min: f64,
    pub native_max: f64,
}

impl LinearMap {
    /// Map `[-1, 1]` onto `[native_min, native_max]`.
    pub const fn pan_tilt(native_min: f64, native_max: f64) -> Self {
        Self {
            normalized_min: PAN_TILT_MIN,
            normalized_max: PAN_TILT_MAX,
            native_min,
            native_max,
        }
    }

    /// Map `[0, 1]` onto `[native_min, native_max]`.
    pub const fn zoom(native_min: f64, native_max: f64) -> Self {
        Self {
            normalized_min: ZOOM_MIN,
            normalized_max: ZOOM_MAX,
            native_min,
            native_max,
        }
    }

    /// Normalized → native. NaN maps to the native value of `0.0`.
    pub fn to_native(&self, normalized: f64) -> f64 {
        let n = if normalized.is_nan() { 0.0 } else { normalized };
        let n = n.clamp(self.normalized_min, self.normalized_max);
        let t = (n - self.normalized_min) / (self.normalized_max - self.normalized_min);
        self.native_min + t * (self.native_max - self.native_min)
    }

    /// Normalized → native integer, rounded to nearest.
    pub fn to_native_rounded(&self, normalized: f64) -> i64 {
        self.to_native(normalized).round() as i64
    }

    /// Native → normalized, clamped into the normalized range.
    pub fn from_native(&self, native: f64) -> f64 {
        let t = (native - self.native_min) / (self.native_max - self.native_min);
        let n = self.normalized_min + t * (self.normalized_max - self.normalized_min);
        if n.is_nan() {
            return 0.0_f64.clamp(self.normalized_min, self.normalized_max);
        }
        n.clamp(self.normalized_min, self.normalized_max)
    }

    /// Size of one native unit in normalized space.
    pub fn resolution(&self) -> f64 {
        (self.normalized_max - self.normalized_min) / (self.native_max - self.native_min).abs()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_values_are_unchanged() {
        for p in [-1.0, -0.5, 0.0, 0.37, 1.0] {
            assert_eq!(clamp_pan_tilt(p), Some(p));
        }
        for z in [0.0, 0.25, 1.0] {
            assert_eq!(clamp_zoom(z), Some(z));
        }
    }

    #[test]
    fn out_of_range_values_take_nearer_bound() {
        assert_eq!(clamp_pan_tilt(1.7), Some(1.0));
        assert_eq!(clamp_pan_tilt(-3.0), Some(-1.0));
        assert_eq!(clamp_zoom(-0.1), Some(0.0));
        assert_eq!(clamp_zoom(f64::INFINITY), Some(1.0));
    }

    #[test]
    fn clamping_is_idempotent() {
        for v in [-5.0, -1.0, -0.3, 0.0, 0.9, 1.0, 42.0] {
            let once = clamp_pan_tilt(v).unwrap();
            assert_eq!(clamp_pan_tilt(once), Some(once));
            let once = clamp_zoom(v).unwrap();
            assert_eq!(clamp_zoom(once), Some(once));
        }
    }

    #[test]
    fn nan_is_rejected() {
        assert!(clamp_pan_tilt(f64::NAN).is_none());
        assert!(NormalizedPosition::new(0.0, f64::NAN, 0.0).is_none());
    }

    #[test]
    fn offset_clamps_and_ignores_nan_axis() {
        let pos = NormalizedPosition::new(0.9, -0.9, 0.4).unwrap();
        let moved = pos.offset(0.5, f64::NAN);
        assert_eq!(moved.pan, 1.0);
        assert_eq!(moved.tilt, -0.9);
        assert_eq!(moved.zoom, 0.4);
    }

    #[test]
    fn clamped_repairs_deserialized_values() {
        let raw = NormalizedPosition {
            pan: 4.0,
            tilt: f64::NAN,
            zoom: -2.0,
        };
        let fixed = raw.clamped();
        assert_eq!(fixed, NormalizedPosition::new(1.0, 0.0, 0.0).unwrap());
        assert!(fixed.is_valid());
    }

    #[test]
    fn linear_map_round_trip_within_half_unit() {
        let map = LinearMap::pan_tilt(-880.0, 880.0);
        for n in [-1.0, -0.52, 0.0, 0.37, 1.0] {
            let native = map.to_native_rounded(n);
            let back = map.from_native(native as f64);
            assert!((back - n).abs() <= map.resolution() / 2.0 + 1e-12);
        }
    }

    #[test]
    fn linear_map_asymmetric_range() {
        let map = LinearMap::pan_tilt(-400.0, 288.0);
        assert_eq!(map.to_native(-1.0), -400.0);
        assert_eq!(map.to_native(1.0), 288.0);
        assert_eq!(map.to_native(0.0), -56.0);
        assert_eq!(map.from_native(-56.0), 0.0);
    }

    #[test]
    fn linear_map_nan_is_total() {
        let map = LinearMap::zoom(0.0, 16384.0);
        assert_eq!(map.to_native(f64::NAN), 0.0);
        assert_eq!(map.to_native(2.0), 16384.0);
    }
}
