//! Error types for the shadow pipeline.

use std::fmt;

/// Errors raised by a shadow query. Any of these aborts the whole query.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowError {
    /// Latitude outside -90..90, longitude outside -180..180, or non-finite.
    InvalidLocation { lat: f64, lon: f64 },
    /// The timestamp does not identify an absolute instant.
    InvalidTimestamp(String),
    /// The road segment has zero length, so no ratio exists.
    DegenerateSegment,
}

impl fmt::Display for ShadowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocation { lat, lon } => write!(
                f,
                "Invalid location ({}, {}). Lat: -90..90, Lon: -180..180",
                lat, lon
            ),
            Self::InvalidTimestamp(msg) => write!(f, "Invalid timestamp: {}", msg),
            Self::DegenerateSegment => write!(f, "Road segment has zero length"),
        }
    }
}

impl std::error::Error for ShadowError {}

pub type Result<T> = std::result::Result<T, ShadowError>;
