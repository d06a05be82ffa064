//! Ground shadow projection for flat-roofed, vertically extruded buildings.
//!
//! A shadow is modelled as the footprint translated by `height / tan(altitude)`
//! along the solar azimuth, with `dx = L·sin(az)` and `dy = L·cos(az)`. This ignores the shape distortion a true
//! projective shadow would show and assumes flat ground.
//!
//! Units: footprint coordinates and building height must share one planar
//! linear unit (e.g. metres in a projected CRS). Nothing here reprojects.

use crate::solar::SolarPosition;
use geo::{Polygon, Translate};

/// Altitudes in (0, MIN_ALTITUDE_DEG) are clamped up to this value, so the
/// longest shadow is `height / tan(0.01°)`, roughly 5729.6 × height.
pub const MIN_ALTITUDE_DEG: f64 = 0.01;

/// A building: footprint polygon plus height in the footprint's units.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub height: f64,
    pub footprint: Polygon<f64>,
}

impl Building {
    pub fn new(height: f64, footprint: Polygon<f64>) -> Self {
        Self { height, footprint }
    }

    /// Shadow of this building for the given sun, if any.
    pub fn shadow(&self, sun: &SolarPosition) -> Option<Polygon<f64>> {
        project(&self.footprint, sun, self.height)
    }
}

/// Ground offset `(dx, dy)` of the shadow of an object `height` tall under a
/// sun at `altitude_deg`, `azimuth_deg` (clockwise from north).
///
/// Returns None when the sun is at or below the horizon, when the height is
/// not a positive finite number, or when the offset overflows to a
/// non-finite value.
pub fn shadow_offset(altitude_deg: f64, azimuth_deg: f64, height: f64) -> Option<(f64, f64)> {
    if !(altitude_deg > 0.0 && height > 0.0 && height.is_finite()) {
        return None;
    }
    let altitude = altitude_deg.max(MIN_ALTITUDE_DEG);
    let length = height / altitude.to_radians().tan();
    let azimuth = azimuth_deg.to_radians();
    let (dx, dy) = (length * azimuth.sin(), length * azimuth.cos());
    if !(length.is_finite() && dx.is_finite() && dy.is_finite()) {
        return None;
    }
    Some((dx, dy))
}

/// Project a footprint onto the ground for the given sun position.
pub fn project(footprint: &Polygon<f64>, sun: &SolarPosition, height: f64) -> Option<Polygon<f64>> {
    let (dx, dy) = shadow_offset(sun.altitude, sun.azimuth, height)?;
    Some(footprint.translate(dx, dy))
}
