use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ShadowError;
use crate::ratio::{self, RouteShade, ShadeReport};
use crate::scene::{BuildingRecord, RoadRecord, SceneError};
use crate::shadow::Building;
use crate::solar::{self, SolarPosition};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<ShadowError> for ApiError {
    fn from(e: ShadowError) -> Self {
        ApiError(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl From<SceneError> for ApiError {
    fn from(e: SceneError) -> Self {
        ApiError(StatusCode::BAD_REQUEST, e.to_string())
    }
}

fn log_request(line: String, start: Instant) {
    eprintln!("[{}] {} ({:.1}ms)",
        Utc::now().format("%H:%M:%S"),
        line,
        start.elapsed().as_secs_f64() * 1000.0,
    );
}

// ─── GET /api/sun ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SunQuery {
    pub lat: f64,
    pub lon: f64,
    pub time: String,
    pub tz: Option<String>,
}

pub async fn sun_position(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SunQuery>,
) -> Result<Json<SolarPosition>, ApiError> {
    let start = Instant::now();

    let tz = params.tz.as_deref().or(state.config.timezone.as_deref());
    let timestamp = solar::parse_timestamp(&params.time, tz)?;
    let position = solar::resolve(params.lat, params.lon, &timestamp)?;

    log_request(format!("GET /api/sun lat={} lon={} time={} -> alt {:.2}°",
        params.lat, params.lon, timestamp.to_rfc3339(), position.altitude), start);

    Ok(Json(position))
}

// ─── POST /api/ratio ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RatioRequest {
    pub lat: f64,
    pub lon: f64,
    pub time: String,
    #[serde(default)]
    pub tz: Option<String>,
    pub road: Vec<[f64; 2]>,
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
}

pub async fn shadow_ratio(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RatioRequest>,
) -> Result<Json<ShadeReport>, ApiError> {
    let start = Instant::now();

    let tz = body.tz.as_deref().or(state.config.timezone.as_deref());
    let timestamp = solar::parse_timestamp(&body.time, tz)?;
    let road = RoadRecord { name: None, coords: body.road }.to_line_string()?;
    let buildings = to_buildings(&body.buildings)?;

    let report = ratio::shade_report(&road, &buildings, &timestamp, body.lat, body.lon, &state.config.shade)?;

    log_request(format!("POST /api/ratio buildings={} -> {:.1}% {}",
        buildings.len(), report.percent, report.level), start);

    Ok(Json(report))
}

// ─── POST /api/route ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RouteRequest {
    pub lat: f64,
    pub lon: f64,
    pub time: String,
    #[serde(default)]
    pub tz: Option<String>,
    pub segments: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
}

pub async fn route_shade(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouteRequest>,
) -> Result<Json<RouteShade>, ApiError> {
    let start = Instant::now();

    let tz = body.tz.as_deref().or(state.config.timezone.as_deref());
    let timestamp = solar::parse_timestamp(&body.time, tz)?;
    let segments = body.segments
        .into_iter()
        .enumerate()
        .map(|(i, coords)| {
            RoadRecord { name: None, coords }
                .to_line_string()
                .map_err(|e| ApiError(StatusCode::BAD_REQUEST, format!("segment #{}: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let buildings = to_buildings(&body.buildings)?;

    let shade = ratio::compute_route_shade(
        &segments, &buildings, &timestamp, body.lat, body.lon, &state.config.shade,
    )?;

    log_request(format!("POST /api/route segments={} buildings={} -> {:.1}% {}",
        segments.len(), buildings.len(), shade.percent, shade.level), start);

    Ok(Json(shade))
}

// ─── Helpers ─────────────────────────────────────────────────────

fn to_buildings(records: &[BuildingRecord]) -> Result<Vec<Building>, ApiError> {
    records
        .iter()
        .map(|r| r.to_building().map_err(ApiError::from))
        .collect()
}
