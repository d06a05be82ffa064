//! Shadow-ratio aggregation: the fraction of a road lying in building shadow.
//!
//! One query resolves the sun once, projects every building, unions the
//! shadows, and clips the road against that union. Overlapping shadows are
//! counted once. Nothing is cached between queries.

use crate::error::{Result, ShadowError};
use crate::shadow::Building;
use crate::solar::{self, SolarPosition};
use chrono::{DateTime, TimeZone};
use geo::{BooleanOps, Intersects, LineString, MultiLineString, MultiPolygon};
use serde::{Deserialize, Serialize};

/// Qualitative shade bucket for a percentage of shaded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadeLevel {
    Shaded,
    Partial,
    Sunny,
}

impl std::fmt::Display for ShadeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShadeLevel::Shaded => write!(f, "Shaded"),
            ShadeLevel::Partial => write!(f, "Partial"),
            ShadeLevel::Sunny => write!(f, "Sunny"),
        }
    }
}

/// Percent thresholds separating the shade levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadeThresholds {
    /// Minimum percent for [`ShadeLevel::Shaded`].
    pub shaded: f64,
    /// Minimum percent for [`ShadeLevel::Partial`].
    pub partial: f64,
}

impl Default for ShadeThresholds {
    fn default() -> Self {
        Self { shaded: 70.0, partial: 40.0 }
    }
}

impl ShadeThresholds {
    pub fn classify(&self, percent: f64) -> ShadeLevel {
        if percent >= self.shaded {
            ShadeLevel::Shaded
        } else if percent >= self.partial {
            ShadeLevel::Partial
        } else {
            ShadeLevel::Sunny
        }
    }
}

/// Shade summary for a single road.
#[derive(Debug, Clone, Serialize)]
pub struct ShadeReport {
    pub ratio: f64,
    pub percent: f64,
    pub level: ShadeLevel,
    pub solar: SolarPosition,
}

/// Shade of one segment within a route.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentShade {
    pub index: usize,
    pub length: f64,
    pub ratio: f64,
}

/// Length-weighted shade over a sequence of road segments.
#[derive(Debug, Clone, Serialize)]
pub struct RouteShade {
    pub segments: Vec<SegmentShade>,
    pub total_length: f64,
    pub shaded_length: f64,
    pub ratio: f64,
    pub percent: f64,
    pub level: ShadeLevel,
    pub solar: SolarPosition,
}

/// Planar length of a polyline: sum of its vertex-to-vertex distances.
pub fn road_length(road: &LineString<f64>) -> f64 {
    road.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

fn checked_length(road: &LineString<f64>) -> Result<f64> {
    let length = road_length(road);
    if length > 0.0 && length.is_finite() {
        Ok(length)
    } else {
        Err(ShadowError::DegenerateSegment)
    }
}

/// Union of all building shadows for `sun`, or None if nothing casts one.
pub fn shadow_region(buildings: &[Building], sun: &SolarPosition) -> Option<MultiPolygon<f64>> {
    if !sun.is_up() {
        return None;
    }
    buildings
        .iter()
        .filter_map(|building| building.shadow(sun))
        .map(|polygon| MultiPolygon::new(vec![polygon]))
        .reduce(|a, b| a.union(&b))
}

/// Length of `road` inside `region`.
fn covered_length(region: &MultiPolygon<f64>, road: &LineString<f64>) -> f64 {
    if !region.intersects(road) {
        return 0.0;
    }
    let road = MultiLineString::new(vec![road.clone()]);
    region.clip(&road, false).iter().map(road_length).sum()
}

fn ratio_in_region(region: Option<&MultiPolygon<f64>>, road: &LineString<f64>, length: f64) -> f64 {
    match region {
        Some(region) => (covered_length(region, road) / length).clamp(0.0, 1.0),
        None => 0.0,
    }
}

fn ratio_with_length(
    road: &LineString<f64>,
    length: f64,
    buildings: &[Building],
    sun: &SolarPosition,
) -> f64 {
    let region = shadow_region(buildings, sun);
    ratio_in_region(region.as_ref(), road, length)
}

/// Shadow ratio of `road` for an already-resolved sun position.
pub fn shadow_ratio_for_position(
    road: &LineString<f64>,
    buildings: &[Building],
    sun: &SolarPosition,
) -> Result<f64> {
    let length = checked_length(road)?;
    Ok(ratio_with_length(road, length, buildings, sun))
}

/// Fraction in [0, 1] of `road` lying in the shadows of `buildings` at
/// `timestamp`, for an observer at (`lat`, `lon`).
///
/// Road and footprints must share the planar unit in which building heights
/// are given. The road is checked before the sun is resolved.
pub fn compute_shadow_ratio<Z: TimeZone>(
    road: &LineString<f64>,
    buildings: &[Building],
    timestamp: &DateTime<Z>,
    lat: f64,
    lon: f64,
) -> Result<f64> {
    let length = checked_length(road)?;
    let sun = solar::resolve(lat, lon, timestamp)?;
    Ok(ratio_with_length(road, length, buildings, &sun))
}

/// Ratio plus percentage, shade level and the sun that produced them.
pub fn shade_report<Z: TimeZone>(
    road: &LineString<f64>,
    buildings: &[Building],
    timestamp: &DateTime<Z>,
    lat: f64,
    lon: f64,
    thresholds: &ShadeThresholds,
) -> Result<ShadeReport> {
    let length = checked_length(road)?;
    let sun = solar::resolve(lat, lon, timestamp)?;
    let ratio = ratio_with_length(road, length, buildings, &sun);
    let percent = ratio * 100.0;
    Ok(ShadeReport { ratio, percent, level: thresholds.classify(percent), solar: sun })
}

/// Lengths of every route segment; an empty route or any zero-length
/// segment is degenerate.
fn segment_lengths(segments: &[LineString<f64>]) -> Result<Vec<f64>> {
    if segments.is_empty() {
        return Err(ShadowError::DegenerateSegment);
    }
    segments.iter().map(checked_length).collect()
}

fn route_shade_with_lengths(
    segments: &[LineString<f64>],
    lengths: Vec<f64>,
    buildings: &[Building],
    sun: &SolarPosition,
    thresholds: &ShadeThresholds,
) -> RouteShade {
    let region = shadow_region(buildings, sun);
    let shades: Vec<SegmentShade> = segments
        .iter()
        .zip(&lengths)
        .enumerate()
        .map(|(index, (road, &length))| SegmentShade {
            index,
            length,
            ratio: ratio_in_region(region.as_ref(), road, length),
        })
        .collect();

    let total_length: f64 = lengths.iter().sum();
    let shaded_length: f64 = shades.iter().map(|s| s.ratio * s.length).sum();
    let ratio = (shaded_length / total_length).clamp(0.0, 1.0);
    let percent = ratio * 100.0;

    RouteShade {
        segments: shades,
        total_length,
        shaded_length,
        ratio,
        percent,
        level: thresholds.classify(percent),
        solar: *sun,
    }
}

/// Route shade for an already-resolved sun position.
///
/// Fails with [`ShadowError::DegenerateSegment`] if the route is empty or any
/// segment has zero length.
pub fn route_shade_for_position(
    segments: &[LineString<f64>],
    buildings: &[Building],
    sun: &SolarPosition,
    thresholds: &ShadeThresholds,
) -> Result<RouteShade> {
    let lengths = segment_lengths(segments)?;
    Ok(route_shade_with_lengths(segments, lengths, buildings, sun, thresholds))
}

/// Shade of a whole route: every segment against one sun position, combined
/// weighted by segment length. Segments are checked before the sun is
/// resolved.
pub fn compute_route_shade<Z: TimeZone>(
    segments: &[LineString<f64>],
    buildings: &[Building],
    timestamp: &DateTime<Z>,
    lat: f64,
    lon: f64,
    thresholds: &ShadeThresholds,
) -> Result<RouteShade> {
    let lengths = segment_lengths(segments)?;
    let sun = solar::resolve(lat, lon, timestamp)?;
    Ok(route_shade_with_lengths(segments, lengths, buildings, &sun, thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, Utc};
    use geo::{line_string, polygon, Polygon};

    /// Sun at 45°, azimuth 0: footprints shift `height` units along +y.
    fn north_sun() -> SolarPosition {
        SolarPosition::new(45.0, 0.0)
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    /// 100-unit road along y = 15.
    fn road() -> LineString<f64> {
        line_string![(x: 0.0, y: 15.0), (x: 100.0, y: 15.0)]
    }

    /// Footprint spanning x0..x1, 10 tall: shadow covers y = 10..20.
    fn block(x0: f64, x1: f64) -> Building {
        Building::new(10.0, rect(x0, 0.0, x1, 10.0))
    }

    #[test]
    fn test_full_coverage() {
        let ratio = shadow_ratio_for_position(&road(), &[block(-10.0, 110.0)], &north_sun()).unwrap();
        assert_abs_diff_eq!(ratio, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_road_outside_shadow() {
        let far = Building::new(10.0, rect(0.0, -500.0, 100.0, -490.0));
        let ratio = shadow_ratio_for_position(&road(), &[far], &north_sun()).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_partial_coverage() {
        let ratio = shadow_ratio_for_position(&road(), &[block(20.0, 50.0)], &north_sun()).unwrap();
        assert_abs_diff_eq!(ratio, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_polyline_road() {
        // 50 units east then 50 units north; only the first leg is shaded.
        let road = line_string![(x: 0.0, y: 15.0), (x: 50.0, y: 15.0), (x: 50.0, y: 65.0)];
        let shade = Building::new(10.0, rect(-10.0, 0.0, 40.0, 10.0));
        let ratio = shadow_ratio_for_position(&road, &[shade], &north_sun()).unwrap();
        assert_abs_diff_eq!(road_length(&road), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ratio, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_no_buildings_is_zero() {
        let ratio = shadow_ratio_for_position(&road(), &[], &north_sun()).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_sun_below_horizon_is_zero() {
        let night = SolarPosition::new(-12.0, 10.0);
        let ratio = shadow_ratio_for_position(&road(), &[block(-10.0, 110.0)], &night).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_overlapping_shadows_counted_once() {
        let alone = shadow_ratio_for_position(&road(), &[block(20.0, 60.0)], &north_sun()).unwrap();
        let twice = shadow_ratio_for_position(&road(), &[block(20.0, 60.0), block(20.0, 60.0)], &north_sun())
            .unwrap();
        let overlapping =
            shadow_ratio_for_position(&road(), &[block(20.0, 60.0), block(40.0, 70.0)], &north_sun()).unwrap();
        assert_abs_diff_eq!(alone, 0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(twice, alone, epsilon = 1e-9);
        assert_abs_diff_eq!(overlapping, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_adding_buildings_never_decreases() {
        let candidates = [block(5.0, 15.0), block(10.0, 30.0), block(60.0, 80.0), block(70.0, 95.0)];
        let mut previous = 0.0;
        for n in 0..=candidates.len() {
            let ratio = shadow_ratio_for_position(&road(), &candidates[..n], &north_sun()).unwrap();
            assert!(ratio + 1e-9 >= previous, "ratio dropped from {} to {}", previous, ratio);
            assert!((0.0..=1.0).contains(&ratio));
            previous = ratio;
        }
    }

    #[test]
    fn test_degenerate_buildings_cast_nothing() {
        let flat = Building::new(0.0, rect(-10.0, 0.0, 110.0, 10.0));
        let sunk = Building::new(-4.0, rect(-10.0, 0.0, 110.0, 10.0));
        let ratio = shadow_ratio_for_position(&road(), &[flat, sunk], &north_sun()).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_zero_length_road_fails() {
        let point_road = line_string![(x: 3.0, y: 3.0), (x: 3.0, y: 3.0)];
        let err = shadow_ratio_for_position(&point_road, &[block(0.0, 10.0)], &north_sun()).unwrap_err();
        assert_eq!(err, ShadowError::DegenerateSegment);

        let empty: LineString<f64> = LineString::new(vec![]);
        assert_eq!(
            shadow_ratio_for_position(&empty, &[], &north_sun()).unwrap_err(),
            ShadowError::DegenerateSegment
        );
    }

    #[test]
    fn test_compute_with_real_sun() {
        // Vancouver, solstice, close to solar noon: sun ~64° high at azimuth ~180,
        // so the footprint shifts 10 / tan(~64°) ≈ 4.8 along -y, covering y = -4.8..5.2.
        let t = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap().and_hms_opt(20, 15, 0).unwrap().and_utc();
        let buildings = [block(-10.0, 110.0)];
        let sun = solar::resolve(49.2827, -123.1207, &t).unwrap();
        let ratio = compute_shadow_ratio(&road(), &buildings, &t, 49.2827, -123.1207).unwrap();
        assert!(sun.altitude > 60.0);
        assert_eq!(ratio, 0.0);

        let near = line_string![(x: 0.0, y: -2.0), (x: 100.0, y: -2.0)];
        let ratio = compute_shadow_ratio(&near, &buildings, &t, 49.2827, -123.1207).unwrap();
        assert!(ratio > 0.8 && ratio <= 1.0);
    }

    #[test]
    fn test_azimuth_180_shifts_shadow_south() {
        // Same block, sun at azimuth 180: shadow covers y = -10..0.
        let sun = SolarPosition::new(45.0, 180.0);
        let south = line_string![(x: 0.0, y: -5.0), (x: 100.0, y: -5.0)];
        let covered = shadow_ratio_for_position(&south, &[block(-10.0, 110.0)], &sun).unwrap();
        let missed = shadow_ratio_for_position(&road(), &[block(-10.0, 110.0)], &sun).unwrap();
        assert_abs_diff_eq!(covered, 1.0, epsilon = 1e-9);
        assert_eq!(missed, 0.0);
    }

    #[test]
    fn test_huge_building_does_not_break_union() {
        // Near-horizon sun and an enormous height overflow the shadow length;
        // such shadows are dropped instead of poisoning the union.
        let sun = SolarPosition::new(0.005, 0.0);
        let giants = [
            Building::new(1e306, rect(0.0, 0.0, 10.0, 10.0)),
            Building::new(1e306, rect(20.0, 0.0, 30.0, 10.0)),
        ];
        let ratio = shadow_ratio_for_position(&road(), &giants, &sun).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let t = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap().and_hms_opt(23, 0, 0).unwrap().and_utc();
        let buildings = [block(0.0, 40.0), block(30.0, 90.0)];
        let a = compute_shadow_ratio(&road(), &buildings, &t, 49.28, -123.12).unwrap();
        let b = compute_shadow_ratio(&road(), &buildings, &t, 49.28, -123.12).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compute_at_night_is_zero() {
        let t = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap().and_hms_opt(8, 0, 0).unwrap().and_utc();
        let ratio = compute_shadow_ratio(&road(), &[block(-10.0, 110.0)], &t, 49.28, -123.12).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_compute_errors() {
        let t = Utc::now();
        assert!(matches!(
            compute_shadow_ratio(&road(), &[], &t, 95.0, 0.0),
            Err(ShadowError::InvalidLocation { .. })
        ));
        let point_road = line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)];
        assert_eq!(
            compute_shadow_ratio(&point_road, &[], &t, 49.0, -123.0).unwrap_err(),
            ShadowError::DegenerateSegment
        );
        // A degenerate road is reported ahead of a bad location.
        assert_eq!(
            compute_shadow_ratio(&point_road, &[], &t, 95.0, 0.0).unwrap_err(),
            ShadowError::DegenerateSegment
        );
        assert_eq!(
            shade_report(&point_road, &[], &t, 95.0, 0.0, &ShadeThresholds::default()).unwrap_err(),
            ShadowError::DegenerateSegment
        );
    }

    #[test]
    fn test_route_checks_segments_before_location() {
        let t = Utc::now();
        let segments = vec![road(), line_string![(x: 2.0, y: 2.0), (x: 2.0, y: 2.0)]];
        let thresholds = ShadeThresholds::default();
        assert_eq!(
            compute_route_shade(&segments, &[], &t, 95.0, 0.0, &thresholds).unwrap_err(),
            ShadowError::DegenerateSegment
        );
        assert_eq!(
            compute_route_shade(&[], &[], &t, 95.0, 0.0, &thresholds).unwrap_err(),
            ShadowError::DegenerateSegment
        );
        assert!(matches!(
            compute_route_shade(&[road()], &[], &t, 95.0, 0.0, &thresholds),
            Err(ShadowError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn test_thresholds_classify() {
        let t = ShadeThresholds::default();
        assert_eq!(t.classify(85.0), ShadeLevel::Shaded);
        assert_eq!(t.classify(70.0), ShadeLevel::Shaded);
        assert_eq!(t.classify(40.0), ShadeLevel::Partial);
        assert_eq!(t.classify(39.9), ShadeLevel::Sunny);
    }

    #[test]
    fn test_route_is_length_weighted() {
        let segments = vec![
            line_string![(x: 0.0, y: 15.0), (x: 100.0, y: 15.0)],
            line_string![(x: 0.0, y: 15.0), (x: 0.0, y: 315.0)],
        ];
        // First segment fully shaded, the second only where it crosses y = 10..20.
        let route = route_shade_for_position(
            &segments,
            &[block(-10.0, 110.0)],
            &north_sun(),
            &ShadeThresholds::default(),
        )
        .unwrap();
        assert_eq!(route.segments.len(), 2);
        assert_abs_diff_eq!(route.segments[0].ratio, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(route.segments[1].ratio, 5.0 / 300.0, epsilon = 1e-9);
        assert_abs_diff_eq!(route.total_length, 400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(route.shaded_length, 105.0, epsilon = 1e-9);
        assert_abs_diff_eq!(route.percent, 26.25, epsilon = 1e-9);
        assert_eq!(route.level, ShadeLevel::Sunny);
    }

    #[test]
    fn test_route_rejects_empty_and_degenerate() {
        let thresholds = ShadeThresholds::default();
        assert_eq!(
            route_shade_for_position(&[], &[], &north_sun(), &thresholds).unwrap_err(),
            ShadowError::DegenerateSegment
        );
        let segments = vec![road(), line_string![(x: 2.0, y: 2.0), (x: 2.0, y: 2.0)]];
        assert_eq!(
            route_shade_for_position(&segments, &[], &north_sun(), &thresholds).unwrap_err(),
            ShadowError::DegenerateSegment
        );
    }

    #[test]
    fn test_shade_report_levels() {
        let t = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap().and_hms_opt(8, 0, 0).unwrap().and_utc();
        let report = shade_report(&road(), &[], &t, 49.28, -123.12, &ShadeThresholds::default()).unwrap();
        assert_eq!(report.ratio, 0.0);
        assert_eq!(report.level, ShadeLevel::Sunny);
        assert!(report.solar.altitude < 0.0);
    }
}
