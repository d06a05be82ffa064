//! ShadePath — how much of a road lies in building shadow at a given instant.
//!
//! The pipeline resolves the sun's position ([`solar`]), projects each
//! building's footprint along the solar azimuth ([`shadow`]), unions the
//! shadows and measures how much of the road they cover ([`ratio`]).

pub mod config;
pub mod error;
pub mod ratio;
pub mod scene;
pub mod server;
pub mod shadow;
pub mod solar;

pub use error::ShadowError;
pub use ratio::{compute_route_shade, compute_shadow_ratio, RouteShade, ShadeLevel, ShadeThresholds};
pub use shadow::{project, Building};
pub use solar::{resolve, SolarPosition};
