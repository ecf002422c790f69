//! Building planning requests and interpreting what the backend answers.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use shared::{
    LatLon, NdviSource, PathStatistics, PlanOptions, PlanRequest, PlanResponse, SoilSource,
};
use thiserror::Error;

use crate::error::{Result, ViewerError};

/// Named bundles of planning options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    #[default]
    PreferRoads,
    AvoidForest,
    ShortestPath,
    EasyTerrain,
    Custom,
    MultiPath,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::PreferRoads,
        Preset::AvoidForest,
        Preset::ShortestPath,
        Preset::EasyTerrain,
        Preset::Custom,
        Preset::MultiPath,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Preset::PreferRoads => "prefer_roads",
            Preset::AvoidForest => "avoid_forest",
            Preset::ShortestPath => "shortest_path",
            Preset::EasyTerrain => "easy_terrain",
            Preset::Custom => "custom",
            Preset::MultiPath => "multi_path",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::PreferRoads => "Prefer roads",
            Preset::AvoidForest => "Avoid forest",
            Preset::ShortestPath => "Shortest path",
            Preset::EasyTerrain => "Easy terrain",
            Preset::Custom => "Custom",
            Preset::MultiPath => "Multiple paths",
        }
    }

    /// Overlays this preset on `options`. Fields a preset does not mention keep
    /// the caller's values.
    pub fn apply(self, options: &mut PlanOptions) {
        options.preset = match self {
            Preset::MultiPath => None,
            other => Some(other.key().to_string()),
        };
        match self {
            Preset::PreferRoads | Preset::AvoidForest | Preset::Custom => {
                options.use_osm_roads = true;
                options.slope_weight = 2.0;
                options.max_slope_degrees = 70.0;
                with_sentinel_ndvi(options);
            }
            Preset::ShortestPath => {
                options.use_osm_roads = false;
                options.slope_weight = 1.0;
                options.max_slope_degrees = 90.0;
                options.ndvi_source = NdviSource::Disabled;
                options.soil_source = SoilSource::Disabled;
            }
            Preset::EasyTerrain => {
                options.use_osm_roads = true;
                options.slope_weight = 3.0;
                options.max_slope_degrees = 30.0;
                with_sentinel_ndvi(options);
            }
            Preset::MultiPath => {
                options.use_osm_roads = true;
                options.slope_weight = 2.0;
                options.elevation_weight = 1.1;
                options.max_slope_degrees = 70.0;
                with_sentinel_ndvi(options);
                options.enable_multi_path = true;
                options.max_alternative_paths = 5;
            }
        }
    }
}

fn with_sentinel_ndvi(options: &mut PlanOptions) {
    let defaults = PlanOptions::default();
    options.ndvi_source = NdviSource::Sentinel2;
    options.ndvi_date_start = defaults.ndvi_date_start;
    options.ndvi_date_end = defaults.ndvi_date_end;
    options.ndvi_cloud_cover_max = defaults.ndvi_cloud_cover_max;
    options.soil_source = SoilSource::Synthetic;
    options.soil_consider_moisture = true;
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown planning preset `{0}`")]
pub struct ParsePresetError(String);

impl FromStr for Preset {
    type Err = ParsePresetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.key() == s)
            .ok_or_else(|| ParsePresetError(s.to_string()))
    }
}

pub fn build_plan_request(
    start: LatLon,
    goal: LatLon,
    preset: Preset,
    mut options: PlanOptions,
) -> PlanRequest {
    preset.apply(&mut options);
    if options.ndvi_source == NdviSource::Sentinel2 && options.gee_project_id.is_none() {
        tracing::warn!("sentinel2 NDVI requested without an Earth Engine project id");
    }
    PlanRequest {
        start,
        goal,
        options,
    }
}

/// Accepts a response only when it reports success and carries a best path.
pub fn interpret_response(response: PlanResponse) -> Result<PlanResponse> {
    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| "path planning failed".to_string());
        return Err(ViewerError::PlanningRequestFailed(message));
    }
    if response.path_geojson.is_none()
        && response.gps_path.is_none()
        && response.coordinates.is_none()
    {
        return Err(ViewerError::PlanningRequestFailed(
            response
                .message
                .unwrap_or_else(|| "planning response has no path".to_string()),
        ));
    }
    Ok(response)
}

/// Message for a non-success HTTP answer. `body` is the decoded JSON body, or
/// `None` when it could not be decoded.
pub fn error_message_from_body(status: u16, body: Option<&Value>) -> String {
    let fallback = || format!("HTTP error! status: {status}");
    let Some(body) = body else {
        return fallback();
    };
    match body.get("detail") {
        Some(Value::String(detail)) => return detail.clone(),
        Some(Value::Array(errors)) => {
            return errors
                .iter()
                .map(validation_error_line)
                .collect::<Vec<_>>()
                .join(", ");
        }
        Some(Value::Null) | None => {}
        Some(other) => return other.to_string(),
    }
    match body.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        _ => fallback(),
    }
}

fn validation_error_line(error: &Value) -> String {
    let location = error
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|part| match part {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    let message = error.get("msg").and_then(Value::as_str).unwrap_or_default();
    format!("{location}: {message}")
}

/// `avoid_steep` -> `AVOID STEEP`; a missing strategy reads `UNKNOWN`.
pub fn format_strategy(strategy: Option<&str>) -> String {
    match strategy {
        Some(strategy) if !strategy.is_empty() => strategy.replace('_', " ").to_uppercase(),
        _ => "UNKNOWN".to_string(),
    }
}

/// Badge color for a rank: gold, silver, bronze, then grey.
pub fn rank_color(rank: u32) -> &'static str {
    match rank {
        1 => "#ffd700",
        2 => "#c0c0c0",
        3 => "#cd7f32",
        _ => "#888888",
    }
}

/// Readable name of a terrain class; unknown classes pass through.
pub fn terrain_label(kind: &str) -> &str {
    match kind {
        "ROAD" => "Road",
        "GRASSLAND" => "Grassland",
        "FOREST_LIGHT" => "Light forest",
        "FOREST_DENSE" => "Dense forest",
        "MOUNTAIN" => "Mountain",
        "SEA" => "Sea",
        "RIVER" => "River",
        "MARSH" => "Marsh",
        other => other,
    }
}

/// The `limit` largest terrain shares of a path, largest first.
pub fn dominant_terrain(statistics: &PathStatistics, limit: usize) -> Vec<(String, f64)> {
    let mut shares: Vec<(String, f64)> = statistics
        .terrain_composition
        .iter()
        .map(|(kind, share)| (terrain_label(kind).to_string(), *share))
        .collect();
    shares.sort_by(|a, b| b.1.total_cmp(&a.1));
    shares.truncate(limit);
    shares
}

/// Readable lines for the `terrain_info` block of a plan response. Missing
/// sections are skipped.
pub fn describe_terrain(info: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let text = |key: &str| info.get(key).and_then(Value::as_str).unwrap_or("unknown");

    if info.get("has_ndvi").and_then(Value::as_bool) == Some(true) {
        let mut line = format!("NDVI source: {}", text("ndvi_source"));
        if let Some(stats) = info.get("ndvi_stats") {
            let number = |key: &str| stats.get(key).and_then(Value::as_f64);
            if let (Some(mean), Some(min), Some(max)) =
                (number("mean"), number("min"), number("max"))
            {
                line.push_str(&format!(", mean {mean:.3}, range [{min:.3}, {max:.3}]"));
            }
        }
        lines.push(line);
    }

    if info.get("has_soil").and_then(Value::as_bool) == Some(true) {
        let mut line = format!("Soil source: {}", text("soil_source"));
        if let Some(properties) = info.get("soil_properties").and_then(Value::as_array) {
            let names: Vec<&str> = properties.iter().filter_map(Value::as_str).collect();
            if !names.is_empty() {
                line.push_str(&format!(", properties {}", names.join(", ")));
            }
        }
        if let Some(count) = info.get("soil_types_count").and_then(Value::as_u64) {
            line.push_str(&format!(", {count} soil types"));
            if let Some(dominant) = info.get("dominant_soil_percentage").and_then(Value::as_f64) {
                line.push_str(&format!(" (dominant {dominant:.1}%)"));
            }
        }
        lines.push(line);
    }

    if let Some(roads) = info.get("has_osm_roads").and_then(Value::as_bool) {
        lines.push(if roads {
            "OpenStreetMap roads available".to_string()
        } else {
            "No OpenStreetMap road data".to_string()
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presets_round_trip_through_their_keys() {
        for preset in Preset::ALL {
            assert_eq!(preset.key().parse::<Preset>(), Ok(preset));
        }
        assert!("fastest".parse::<Preset>().is_err());
    }

    #[test]
    fn shortest_path_disables_terrain_data() {
        let request = build_plan_request(
            LatLon::new(13.7, 100.5),
            LatLon::new(13.8, 100.6),
            Preset::ShortestPath,
            PlanOptions::default(),
        );
        assert_eq!(request.options.preset.as_deref(), Some("shortest_path"));
        assert!(!request.options.use_osm_roads);
        assert_eq!(request.options.max_slope_degrees, 90.0);
        assert_eq!(request.options.ndvi_source, NdviSource::Disabled);
        assert_eq!(request.options.soil_source, SoilSource::Disabled);
    }

    #[test]
    fn multi_path_sends_no_preset_name() {
        let request = build_plan_request(
            LatLon::new(0.0, 0.0),
            LatLon::new(1.0, 1.0),
            Preset::MultiPath,
            PlanOptions::default(),
        );
        assert!(request.options.preset.is_none());
        assert!(request.options.enable_multi_path);
        assert_eq!(request.options.max_alternative_paths, 5);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["enable_multi_path"], json!(true));
        assert_eq!(body["start"]["lat"], json!(0.0));
        assert!(body.get("preset").is_none());
    }

    #[test]
    fn custom_preset_keeps_caller_fields() {
        let options = PlanOptions {
            max_waypoints: 250,
            gee_project_id: Some("my-project".into()),
            ..PlanOptions::default()
        };
        let request = build_plan_request(
            LatLon::new(0.0, 0.0),
            LatLon::new(1.0, 1.0),
            Preset::Custom,
            options,
        );
        assert_eq!(request.options.max_waypoints, 250);
        assert_eq!(request.options.gee_project_id.as_deref(), Some("my-project"));
    }

    #[test]
    fn unsuccessful_response_surfaces_its_message() {
        let response = PlanResponse {
            success: false,
            message: Some("no route".into()),
            ..Default::default()
        };
        assert_eq!(
            interpret_response(response),
            Err(ViewerError::PlanningRequestFailed("no route".into()))
        );
    }

    #[test]
    fn successful_response_without_path_is_rejected() {
        let response = PlanResponse {
            success: true,
            ..Default::default()
        };
        assert!(matches!(
            interpret_response(response),
            Err(ViewerError::PlanningRequestFailed(_))
        ));
    }

    #[test]
    fn dominant_terrain_lists_largest_shares_first() {
        let statistics: PathStatistics = serde_json::from_value(json!({
            "overall_score": 81.5,
            "safety_score": 72.0,
            "terrain_composition": {"ROAD": 12.5, "FOREST_DENSE": 60.0, "MARSH": 4.0, "CAVE": 23.5}
        }))
        .unwrap();

        assert_eq!(statistics.safety_score, Some(72.0));
        assert!(statistics.extra.is_empty());
        assert_eq!(
            dominant_terrain(&statistics, 3),
            vec![
                ("Dense forest".to_string(), 60.0),
                ("CAVE".to_string(), 23.5),
                ("Road".to_string(), 12.5),
            ]
        );
    }

    #[test]
    fn terrain_info_is_summarized_per_source() {
        let info = json!({
            "has_ndvi": true,
            "ndvi_source": "sentinel2",
            "ndvi_stats": {"mean": 0.4213, "min": -0.1, "max": 0.87},
            "has_soil": true,
            "soil_source": "synthetic",
            "soil_properties": ["clay", "sand"],
            "soil_types_count": 4,
            "dominant_soil_percentage": 55.3,
            "has_osm_roads": false
        });
        assert_eq!(
            describe_terrain(&info),
            vec![
                "NDVI source: sentinel2, mean 0.421, range [-0.100, 0.870]",
                "Soil source: synthetic, properties clay, sand, 4 soil types (dominant 55.3%)",
                "No OpenStreetMap road data",
            ]
        );
        assert!(describe_terrain(&json!({"has_ndvi": false})).is_empty());
    }

    #[test]
    fn validation_details_are_joined() {
        let body = json!({
            "detail": [
                {"loc": ["body", "start", "lat"], "msg": "field required"},
                {"loc": ["body", "max_slope_degrees"], "msg": "must be positive"}
            ]
        });
        assert_eq!(
            error_message_from_body(422, Some(&body)),
            "body.start.lat: field required, body.max_slope_degrees: must be positive"
        );
    }

    #[test]
    fn error_body_fallbacks() {
        assert_eq!(
            error_message_from_body(500, Some(&json!({"detail": "planner crashed"}))),
            "planner crashed"
        );
        assert_eq!(
            error_message_from_body(500, Some(&json!({"detail": {"code": 7}}))),
            r#"{"code":7}"#
        );
        assert_eq!(
            error_message_from_body(503, Some(&json!({"message": "overloaded"}))),
            "overloaded"
        );
        assert_eq!(error_message_from_body(404, None), "HTTP error! status: 404");
        assert_eq!(
            error_message_from_body(400, Some(&json!({}))),
            "HTTP error! status: 400"
        );
    }

    #[test]
    fn strategy_names_are_humanized() {
        assert_eq!(format_strategy(Some("avoid_steep")), "AVOID STEEP");
        assert_eq!(format_strategy(None), "UNKNOWN");
        assert_eq!(rank_color(2), "#c0c0c0");
        assert_eq!(rank_color(9), "#888888");
    }
}
