//! Scene files: buildings and roads in a planar coordinate system, as JSON.
//!
//! ```json
//! {
//!   "buildings": [ { "height": 12.5, "footprint": [[0, 0], [10, 0], [10, 8], [0, 8]] } ],
//!   "roads": [ { "name": "Main St", "coords": [[-5, 12], [40, 12]] } ]
//! }
//! ```

use crate::shadow::Building;
use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Scene loading errors.
#[derive(Debug)]
pub enum SceneError {
    Io(String),
    Parse(String),
    InvalidGeometry(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Cannot read scene: {}", msg),
            Self::Parse(msg) => write!(f, "Invalid scene JSON: {}", msg),
            Self::InvalidGeometry(msg) => write!(f, "Invalid geometry: {}", msg),
        }
    }
}

impl std::error::Error for SceneError {}

/// A building record as it appears in a scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub height: f64,
    pub footprint: Vec<[f64; 2]>,
}

/// A named road polyline as it appears in a scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub coords: Vec<[f64; 2]>,
}

/// Buildings and roads for one area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
    #[serde(default)]
    pub roads: Vec<RoadRecord>,
}

impl Scene {
    pub fn from_json(data: &str) -> Result<Self, SceneError> {
        serde_json::from_str(data).map_err(|e| SceneError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let data = fs::read_to_string(path).map_err(|e| SceneError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&data)
    }

    /// Convert all building records, failing on the first malformed footprint.
    pub fn buildings(&self) -> Result<Vec<Building>, SceneError> {
        self.buildings
            .iter()
            .enumerate()
            .map(|(i, record)| record.to_building().map_err(|e| prefix(e, &format!("building #{}", i))))
            .collect()
    }

    /// Convert all road records, failing on the first malformed polyline.
    pub fn roads(&self) -> Result<Vec<LineString<f64>>, SceneError> {
        self.roads
            .iter()
            .enumerate()
            .map(|(i, record)| record.to_line_string().map_err(|e| prefix(e, &record.label(i))))
            .collect()
    }
}

fn prefix(err: SceneError, what: &str) -> SceneError {
    match err {
        SceneError::InvalidGeometry(msg) => SceneError::InvalidGeometry(format!("{}: {}", what, msg)),
        other => other,
    }
}

fn to_coords(points: &[[f64; 2]]) -> Result<Vec<Coord<f64>>, SceneError> {
    points
        .iter()
        .map(|&[x, y]| {
            if x.is_finite() && y.is_finite() {
                Ok(Coord { x, y })
            } else {
                Err(SceneError::InvalidGeometry(format!("non-finite coordinate ({}, {})", x, y)))
            }
        })
        .collect()
}

impl BuildingRecord {
    /// Build the footprint polygon. The ring is closed automatically; the
    /// height is passed through untouched, so non-positive heights survive
    /// here and simply cast no shadow later.
    pub fn to_building(&self) -> Result<Building, SceneError> {
        let mut ring = to_coords(&self.footprint)?;
        ring.dedup();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(SceneError::InvalidGeometry(format!(
                "footprint needs at least 3 distinct vertices, got {}",
                ring.len()
            )));
        }
        Ok(Building::new(self.height, Polygon::new(LineString::new(ring), vec![])))
    }
}

impl RoadRecord {
    pub fn to_line_string(&self) -> Result<LineString<f64>, SceneError> {
        if self.coords.len() < 2 {
            return Err(SceneError::InvalidGeometry(format!(
                "road needs at least 2 points, got {}",
                self.coords.len()
            )));
        }
        Ok(LineString::new(to_coords(&self.coords)?))
    }

    /// Display label: the road's name, or its position in the scene.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("road #{}", index))
    }
}
