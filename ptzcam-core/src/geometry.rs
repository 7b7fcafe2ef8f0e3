//! Overlay projection and click/scroll mapping.
//!
//! ## Projection model
//!
//! The live view covers a horizontal field of view that narrows linearly
//! with zoom:
//!
//! ```text
//! fov(zoom) = fov_degrees * (1 - zoom * 0.9)
//! ```
//!
//! A preset is drawn as the rectangle its own field of view would cover,
//! placed at its angular offset from the current position. Offsets are
//! divided by `scale = current_fov / fov_degrees`, so rectangles drift
//! apart and grow as the live view zooms in. Tilt is flipped so that a
//! higher preset renders above the centre.
//!
//! The rectangle keeps the preset's square angular footprint: its height
//! ratio is its width ratio divided by the viewport aspect, and it is
//! vertically anchored on the square's centre. A preset identical to the
//! current position in an 800×600 view therefore projects to
//! `{x: 0, y: 0, w: 800, h: 450}`.

use serde::Serialize;

use crate::coords::{NormalizedPosition, clamp_zoom};
use crate::types::Preset;

/// Share of the field of view that remains at full zoom is `1 - ZOOM_FOV_NARROWING`.
pub const ZOOM_FOV_NARROWING: f64 = 0.9;

/// How much stronger zoom damps click moves at full zoom (`1 + 4 = 5×`).
pub const CLICK_ZOOM_DAMPING: f64 = 4.0;

/// Horizontal field of view at a zoom level.
pub fn fov_at(fov_degrees: f64, zoom: f64) -> f64 {
    let zoom = clamp_zoom(zoom).unwrap_or(0.0);
    fov_degrees * (1.0 - zoom * ZOOM_FOV_NARROWING)
}

// ── OverlayRect ──────────────────────────────────────────────────

/// A preset's rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub visible: bool,
}

impl OverlayRect {
    pub const HIDDEN: Self = Self {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
        visible: false,
    };

    /// Partial overlap with `[0, vw] × [0, vh]` counts.
    fn intersects(&self, vw: f64, vh: f64) -> bool {
        self.x < vw && self.x + self.w > 0.0 && self.y < vh && self.y + self.h > 0.0
    }
}

/// A projected preset, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetOverlay {
    pub preset_id: String,
    pub name: String,
    pub color: String,
    pub rect: OverlayRect,
}

// ── Projection ───────────────────────────────────────────────────

/// Project one preset into a `viewport_w × viewport_h` view.
///
/// Degenerate inputs (non-positive or non-finite FOV or viewport) yield
/// [`OverlayRect::HIDDEN`].
pub fn project(
    preset: &Preset,
    current: NormalizedPosition,
    fov_degrees: f64,
    viewport_w: f64,
    viewport_h: f64,
) -> OverlayRect {
    let sane = |v: f64| v.is_finite() && v > 0.0;
    if !sane(fov_degrees) || !sane(viewport_w) || !sane(viewport_h) {
        return OverlayRect::HIDDEN;
    }
    let current = current.clamped();
    let target = preset.position();

    let current_fov = fov_at(fov_degrees, current.zoom);
    let preset_fov = fov_at(fov_degrees, target.zoom);
    let scale = current_fov / fov_degrees;

    let dx = (target.pan - current.pan) / scale;
    let dy = -(target.tilt - current.tilt) / scale;

    let aspect = viewport_w / viewport_h;
    let w_ratio = preset_fov / current_fov;
    let h_ratio = w_ratio / aspect;

    let w = viewport_w * w_ratio;
    let h = viewport_h * h_ratio;
    let x = viewport_w * (0.5 + dx / 2.0) - w / 2.0;
    let y = viewport_h * (0.5 + dy / 2.0) - viewport_h * w_ratio / 2.0;

    let mut rect = OverlayRect {
        x,
        y,
        w,
        h,
        visible: false,
    };
    rect.visible = rect.intersects(viewport_w, viewport_h);
    rect
}

/// Project every preset, in the order given.
pub fn project_all(
    presets: &[Preset],
    current: NormalizedPosition,
    fov_degrees: f64,
    viewport_w: f64,
    viewport_h: f64,
) -> Vec<PresetOverlay> {
    presets
        .iter()
        .map(|p| PresetOverlay {
            preset_id: p.id.clone(),
            name: p.name.clone(),
            color: p.color.clone(),
            rect: project(p, current, fov_degrees, viewport_w, viewport_h),
        })
        .collect()
}

// ── Input mapping ────────────────────────────────────────────────

/// Pan/tilt delta produced by a click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveVector {
    pub pan_delta: f64,
    pub tilt_delta: f64,
}

impl MoveVector {
    pub const ZERO: Self = Self {
        pan_delta: 0.0,
        tilt_delta: 0.0,
    };

    pub fn is_zero(&self) -> bool {
        self.pan_delta == 0.0 && self.tilt_delta == 0.0
    }
}

/// Map a click to a relative move that re-centres the clicked point.
///
/// The click is normalized to `[-1, 1]` about the viewport centre (up is
/// positive) and scaled by `sensitivity / (1 + zoom * 4)`, so the same
/// pixel offset moves less at high zoom.
pub fn click_to_vector(
    click_x: f64,
    click_y: f64,
    viewport_w: f64,
    viewport_h: f64,
    sensitivity: f64,
    current_zoom: f64,
) -> MoveVector {
    let inputs = [click_x, click_y, viewport_w, viewport_h, sensitivity, current_zoom];
    if inputs.iter().any(|v| !v.is_finite()) || viewport_w <= 0.0 || viewport_h <= 0.0 {
        return MoveVector::ZERO;
    }
    let half_w = viewport_w / 2.0;
    let half_h = viewport_h / 2.0;
    let nx = (click_x - half_w) / half_w;
    let ny = -(click_y - half_h) / half_h;

    let zoom = clamp_zoom(current_zoom).unwrap_or(0.0);
    let factor = sensitivity / (1.0 + zoom * CLICK_ZOOM_DAMPING);
    MoveVector {
        pan_delta: nx * factor,
        tilt_delta: ny * factor,
    }
}

/// Zoom level after `wheel_steps` notches (positive zooms in).
pub fn scroll_to_zoom(current_zoom: f64, wheel_steps: f64, sensitivity: f64) -> f64 {
    let current = clamp_zoom(current_zoom).unwrap_or(0.0);
    clamp_zoom(current + wheel_steps * sensitivity).unwrap_or(current)
}
