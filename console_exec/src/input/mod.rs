//! # Input normaliser
//!
//! Converts raw pointer geometry into normalised control inputs: a heading
//! angle in degrees ((-180, 180], 0 = away from the operator) plus a
//! magnitude in [0, 1] for the joystick widget, and a 0..100 throttle level
//! for the throttle widget.
//!
//! Raw samples arrive as a single [`PointerSample`] capability, extracted
//! once at the event boundary. The normaliser never branches on which device
//! (mouse, touch, pointer) produced a sample.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use comms_if::cmd::SpeedScale;
use util::maths::{clamp, lin_map, wrap_180};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A raw pointer position, in the same coordinate frame as the widget
/// geometry (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
}

/// Geometry of the joystick widget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StickGeometry {
    pub centre_x: f64,
    pub centre_y: f64,

    /// Physical radius of the stick's throw
    pub radius: f64,
}

/// Geometry of the throttle widget's bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottleGeometry {
    /// Vertical position of the top edge
    pub top: f64,

    /// Height of the box, top maps to 100 and top + height to 0
    pub height: f64,
}

/// A normalised joystick input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickInput {
    /// Heading in degrees, (-180, 180], 0 = away from the operator
    pub angle_deg: f64,

    /// Fraction of maximum throw, always in [0, 1]
    pub magnitude: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Normalise a pointer sample against the joystick geometry.
///
/// The offset from the widget centre is clamped to the physical radius
/// before the angle and magnitude are computed, so an input dragged outside
/// the widget never implies a throw beyond 100%.
///
/// Pointer coordinates have y pointing down and `atan2` zero pointing to
/// screen right, so the raw angle is rotated by 90 degrees to place 0 at
/// "up" and wrapped into (-180, 180].
pub fn normalise_stick(geom: &StickGeometry, sample: &PointerSample) -> StickInput {
    let dx = sample.x - geom.centre_x;
    let dy = sample.y - geom.centre_y;

    let dist = dx.hypot(dy);

    let magnitude = if geom.radius > 0.0 {
        clamp(dist / geom.radius, 0.0, 1.0)
    } else {
        0.0
    };

    // A sample exactly at the centre has no direction, report forward
    let angle_deg = if dist == 0.0 {
        0.0
    } else {
        wrap_180(dy.atan2(dx).to_degrees() + 90.0)
    };

    StickInput {
        angle_deg,
        magnitude,
    }
}

/// The defined idle input produced when the operator releases the stick.
///
/// An explicit recentre is emitted rather than holding the last angle, so
/// the vehicle can tell "released" apart from a stale stream.
pub fn idle_stick() -> StickInput {
    StickInput {
        angle_deg: 0.0,
        magnitude: 0.0,
    }
}

/// Normalise a vertical pointer position against the throttle geometry.
///
/// Linear map from the widget's bounding box to 0..100, bottom = 0 and
/// top = 100. Positions outside the box clamp to the nearest boundary.
pub fn normalise_throttle(geom: &ThrottleGeometry, y: f64) -> u8 {
    let bottom = geom.top + geom.height;
    let raw = lin_map((bottom, geom.top), (0.0, 100.0), y);

    clamp(raw, 0.0, 100.0).round() as u8
}

/// Scale a raw 0..100 throttle reading by the active speed scale.
///
/// With no scale selected the effective throttle is 0.
pub fn scaled_throttle(raw: u8, scale: Option<SpeedScale>) -> u8 {
    let factor = scale.map_or(0.0, |s| s.factor());
    (raw as f64 * factor).round() as u8
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
