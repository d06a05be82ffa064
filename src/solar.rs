//! Solar position resolver based on the NOAA low-precision ephemeris.
//!
//! Computes the geometric altitude and azimuth of the sun for any instant,
//! latitude, and longitude. No refraction correction is applied.
//! Accuracy: ~0.01° for dates within ±50 years of J2000.
//!
//! Azimuth convention: degrees clockwise from true north (0 = N, 90 = E,
//! 180 = S, 270 = W). [`crate::shadow::project`] takes it as the shadow direction.

use crate::error::{Result, ShadowError};
use chrono::{
    DateTime, Datelike, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;
use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Naive timestamp layouts accepted when an IANA zone is supplied.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Solar position at a specific instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarPosition {
    /// Degrees above the horizon, negative below.
    pub altitude: f64,
    /// Degrees clockwise from true north, in [0, 360).
    pub azimuth: f64,
    pub declination: f64,
    /// Minutes.
    pub equation_of_time: f64,
}

impl SolarPosition {
    /// A position with only altitude and azimuth set. Mostly useful in tests.
    pub fn new(altitude: f64, azimuth: f64) -> Self {
        Self { altitude, azimuth: normalize_degrees(azimuth), declination: 0.0, equation_of_time: 0.0 }
    }

    /// True when the sun is strictly above the horizon.
    pub fn is_up(&self) -> bool {
        self.altitude > 0.0
    }
}

/// Convert a NaiveDateTime (assumed UTC) to Julian Date.
pub fn julian_date(dt: &NaiveDateTime) -> f64 {
    let y = dt.year() as f64;
    let m = dt.month() as f64;
    let d = dt.day() as f64;
    let h = fractional_hour(dt);

    let (y2, m2) = if m <= 2.0 {
        (y - 1.0, m + 12.0)
    } else {
        (y, m)
    };

    let a = (y2 / 100.0_f64).floor();
    let b = 2.0 - a + (a / 4.0_f64).floor();

    (365.25_f64 * (y2 + 4716.0)).floor()
        + (30.6001_f64 * (m2 + 1.0)).floor()
        + d
        + h / 24.0
        + b
        - 1524.5
}

fn fractional_hour(dt: &NaiveDateTime) -> f64 {
    dt.hour() as f64
        + dt.minute() as f64 / 60.0
        + (dt.second() as f64 + dt.nanosecond() as f64 * 1e-9) / 3600.0
}

fn julian_century(jd: f64) -> f64 {
    (jd - 2451545.0) / 36525.0
}

pub(crate) fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

fn sun_mean_longitude(t: f64) -> f64 {
    normalize_degrees(280.46646 + t * (36000.76983 + t * 0.0003032))
}

fn sun_mean_anomaly(t: f64) -> f64 {
    normalize_degrees(357.52911 + t * (35999.05029 - t * 0.0001537))
}

fn earth_eccentricity(t: f64) -> f64 {
    0.016708634 - t * (0.000042037 + t * 0.0000001267)
}

fn sun_equation_of_center(t: f64) -> f64 {
    let m = sun_mean_anomaly(t) * DEG;
    m.sin() * (1.914602 - t * (0.004817 + t * 0.000014))
        + (2.0 * m).sin() * (0.019993 - t * 0.000101)
        + (3.0 * m).sin() * 0.000289
}

fn sun_apparent_longitude(t: f64) -> f64 {
    let omega = 125.04 - 1934.136 * t;
    sun_mean_longitude(t) + sun_equation_of_center(t) - 0.00569 - 0.00478 * (omega * DEG).sin()
}

fn mean_obliquity(t: f64) -> f64 {
    23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0
}

fn obliquity_corrected(t: f64) -> f64 {
    let omega = 125.04 - 1934.136 * t;
    mean_obliquity(t) + 0.00256 * (omega * DEG).cos()
}

fn solar_declination(t: f64) -> f64 {
    let e = obliquity_corrected(t) * DEG;
    let lambda = sun_apparent_longitude(t) * DEG;
    (e.sin() * lambda.sin()).asin() / DEG
}

fn equation_of_time(t: f64) -> f64 {
    let e = obliquity_corrected(t) * DEG;
    let l0 = sun_mean_longitude(t) * DEG;
    let ecc = earth_eccentricity(t);
    let m = sun_mean_anomaly(t) * DEG;

    let y = (e / 2.0).tan().powi(2);

    let eq = y * (2.0 * l0).sin() - 2.0 * ecc * m.sin()
        + 4.0 * ecc * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * ecc * ecc * (2.0 * m).sin();

    4.0 * eq / DEG
}

/// Reject coordinates outside the valid geographic ranges.
pub fn validate_location(lat: f64, lon: f64) -> Result<()> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(ShadowError::InvalidLocation { lat, lon })
    }
}

/// Solar position for a UTC instant. Coordinates are not validated.
pub fn solar_position(dt: &NaiveDateTime, lat: f64, lon: f64) -> SolarPosition {
    let t = julian_century(julian_date(dt));

    let decl = solar_declination(t);
    let eqt = equation_of_time(t);

    let solar_time = fractional_hour(dt) * 60.0 + eqt + 4.0 * lon;
    let hour_angle = solar_time / 4.0 - 180.0;

    let lat_r = lat * DEG;
    let decl_r = decl * DEG;
    let ha_r = hour_angle * DEG;

    let sin_alt = lat_r.sin() * decl_r.sin() + lat_r.cos() * decl_r.cos() * ha_r.cos();
    let altitude = sin_alt.clamp(-1.0, 1.0).asin() / DEG;

    // Measured westward from south, then rotated to north-based.
    let from_south = ha_r.sin().atan2(ha_r.cos() * lat_r.sin() - decl_r.tan() * lat_r.cos());
    let azimuth = normalize_degrees(from_south / DEG + 180.0);

    SolarPosition { altitude, azimuth, declination: decl, equation_of_time: eqt }
}

/// Resolve the sun's position for an observer at (`lat`, `lon`) at `timestamp`.
pub fn resolve<Z: TimeZone>(lat: f64, lon: f64, timestamp: &DateTime<Z>) -> Result<SolarPosition> {
    validate_location(lat, lon)?;
    let utc = timestamp.with_timezone(&Utc).naive_utc();
    Ok(solar_position(&utc, lat, lon))
}

/// Parse a timestamp into an absolute instant.
///
/// RFC 3339 text carries its own offset and ignores `tz`. Naive text is
/// localized into the IANA zone `tz`; without one there is no instant and the
/// call fails. Ambiguous local times (DST fall-back) take the earlier instant.
pub fn parse_timestamp(text: &str, tz: Option<&str>) -> Result<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| ShadowError::InvalidTimestamp(format!("cannot parse '{}'", text)))?;

    let tz_name = tz.ok_or_else(|| {
        ShadowError::InvalidTimestamp(format!("'{}' has no UTC offset and no timezone was given", text))
    })?;
    let zone: Tz = tz_name
        .parse()
        .map_err(|_| ShadowError::InvalidTimestamp(format!("unknown timezone '{}'", tz_name)))?;

    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.fixed_offset()),
        LocalResult::None => Err(ShadowError::InvalidTimestamp(format!(
            "'{}' does not exist in {}",
            text, tz_name
        ))),
    }
}
