use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use geojson::GeoJson;

/// A geographic point as the planning backend speaks it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, alias = "ele", skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerType {
    Astar,
    HybridAstar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NdviSource {
    Disabled,
    Synthetic,
    Sentinel2,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilSource {
    Disabled,
    Synthetic,
    Soilgrids,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilProperty {
    Clay,
    Sand,
    Silt,
    Moisture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Geojson,
    Gpx,
}

/// Named planning options forwarded verbatim to the planning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub planner_type: PlannerType,
    pub max_slope_degrees: f64,
    pub slope_weight: f64,
    pub elevation_weight: f64,
    pub use_osm_roads: bool,
    pub ndvi_source: NdviSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndvi_date_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndvi_date_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndvi_cloud_cover_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gee_project_id: Option<String>,
    pub soil_source: SoilSource,
    #[serde(default)]
    pub soil_properties: Vec<SoilProperty>,
    pub soil_consider_moisture: bool,
    pub enable_multi_path: bool,
    pub max_alternative_paths: u8,
    pub max_waypoints: u32,
    #[serde(default)]
    pub output_formats: Vec<OutputFormat>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            preset: None,
            planner_type: PlannerType::Astar,
            max_slope_degrees: 70.0,
            slope_weight: 2.0,
            elevation_weight: 1.1,
            use_osm_roads: true,
            ndvi_source: NdviSource::Sentinel2,
            ndvi_date_start: Some("2024-01-01".into()),
            ndvi_date_end: Some("2024-12-31".into()),
            ndvi_cloud_cover_max: Some(30.0),
            gee_project_id: None,
            soil_source: SoilSource::Synthetic,
            soil_properties: vec![SoilProperty::Clay, SoilProperty::Sand, SoilProperty::Silt],
            soil_consider_moisture: true,
            enable_multi_path: false,
            max_alternative_paths: 5,
            max_waypoints: 1000,
            output_formats: vec![OutputFormat::Geojson, OutputFormat::Gpx],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub start: LatLon,
    pub goal: LatLon,
    #[serde(flatten)]
    pub options: PlanOptions,
}

/// Statistics the backend computed for one path. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ascent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_descent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain_score: Option<f64>,
    /// Share of the path per terrain class, in percent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terrain_composition: BTreeMap<String, f64>,
    /// Scores and counters the viewer does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlternativePath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_geojson: Option<GeoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_path: Option<Vec<LatLon>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<PathStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_geojson: Option<GeoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_path: Option<Vec<LatLon>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<PathStatistics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_paths: Vec<AlternativePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation_time_seconds: Option<f64>,
}
