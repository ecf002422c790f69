use std::sync::Arc;

use geojson::{GeoJson, Geometry, LineStringType, Value};
use serde::{Deserialize, Serialize};
use shared::{AlternativePath, LatLon, PlanResponse};

use crate::error::{Result, ViewerError};
use crate::geo::{RouteBounds, path_distance_km};

/// One route sample. Elevation is in meters and defaults to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            elevation: 0.0,
        }
    }

    pub fn with_elevation(lon: f64, lat: f64, elevation: f64) -> Self {
        Self {
            lon,
            lat,
            elevation,
        }
    }

    pub fn lon_lat(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

impl From<LatLon> for Coordinate {
    fn from(point: LatLon) -> Self {
        Coordinate::with_elevation(point.lon, point.lat, point.elevation.unwrap_or(0.0))
    }
}

/// Ordered, non-empty travel sequence. Index 0 is the start, the last index the goal.
///
/// Clones share the underlying samples, so the playback engine can hold the
/// active route without copying it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    points: Arc<[Coordinate]>,
}

impl RouteGeometry {
    pub fn new(points: Vec<Coordinate>) -> Result<Self> {
        if points.is_empty() {
            return Err(ViewerError::MalformedGeometry(
                "route has no coordinates".into(),
            ));
        }
        Ok(Self {
            points: points.into(),
        })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: a geometry cannot be built without points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<Coordinate> {
        self.points.get(index).copied()
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.last_index()]
    }

    /// The sample after `index`, `None` at the goal.
    pub fn successor(&self, index: usize) -> Option<Coordinate> {
        index.checked_add(1).and_then(|next| self.get(next))
    }

    /// Samples `0..=index`, clamped to the route.
    pub fn prefix(&self, index: usize) -> &[Coordinate] {
        let end = index.min(self.last_index()) + 1;
        &self.points[..end]
    }

    pub fn elevations(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|c| c.elevation)
    }

    pub fn distance_km(&self) -> f64 {
        path_distance_km(&self.points)
    }

    pub fn bounds(&self) -> RouteBounds {
        self.points[1..]
            .iter()
            .fold(RouteBounds::around(self.first()), |bounds, c| bounds.extended(*c))
    }
}

/// A route payload in one of the shapes the planning backend or a file loader
/// hands over. The shape is decided once here and never re-sniffed later.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePayload {
    GeoJson(GeoJson),
    Points(Vec<LatLon>),
    Coordinates(Vec<Vec<f64>>),
}

impl RoutePayload {
    /// Picks the first present shape: GeoJSON, then a point list, then raw coordinates.
    pub fn from_fields(
        geojson: Option<GeoJson>,
        points: Option<Vec<LatLon>>,
        coordinates: Option<Vec<Vec<f64>>>,
    ) -> Result<Self> {
        if let Some(geojson) = geojson {
            return Ok(RoutePayload::GeoJson(geojson));
        }
        if let Some(points) = points {
            return Ok(RoutePayload::Points(points));
        }
        if let Some(coordinates) = coordinates {
            return Ok(RoutePayload::Coordinates(coordinates));
        }
        Err(ViewerError::MalformedGeometry(
            "no GeoJSON feature, point list or coordinate list found".into(),
        ))
    }

    pub fn from_plan(response: &PlanResponse) -> Result<Self> {
        Self::from_fields(
            response.path_geojson.clone(),
            response.gps_path.clone(),
            response.coordinates.clone(),
        )
    }

    pub fn from_alternative(path: &AlternativePath) -> Result<Self> {
        Self::from_fields(
            path.path_geojson.clone(),
            path.gps_path.clone(),
            path.coordinates.clone(),
        )
    }
}

/// Turns a payload into a route geometry without simplifying or reprojecting it.
pub fn normalize(payload: RoutePayload) -> Result<RouteGeometry> {
    let points = match payload {
        RoutePayload::GeoJson(geojson) => {
            let line = first_line_string(&geojson).ok_or_else(|| {
                ViewerError::MalformedGeometry("GeoJSON holds no LineString".into())
            })?;
            line.iter()
                .map(|position| position_to_coordinate(position))
                .collect::<Result<Vec<_>>>()?
        }
        RoutePayload::Points(points) => points
            .into_iter()
            .map(|point| {
                if point.lat.is_finite() && point.lon.is_finite() {
                    Ok(Coordinate::from(point))
                } else {
                    Err(ViewerError::MalformedGeometry(format!(
                        "non-finite point {:?}",
                        point
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?,
        RoutePayload::Coordinates(positions) => positions
            .iter()
            .map(|position| position_to_coordinate(position))
            .collect::<Result<Vec<_>>>()?,
    };
    RouteGeometry::new(points)
}

fn first_line_string(geojson: &GeoJson) -> Option<&LineStringType> {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .find_map(|feature| feature.geometry.as_ref().and_then(line_string)),
        GeoJson::Feature(feature) => feature.geometry.as_ref().and_then(line_string),
        GeoJson::Geometry(geometry) => line_string(geometry),
    }
}

fn line_string(geometry: &Geometry) -> Option<&LineStringType> {
    match &geometry.value {
        Value::LineString(line) => Some(line),
        _ => None,
    }
}

fn position_to_coordinate(position: &[f64]) -> Result<Coordinate> {
    match position {
        [lon, lat] if lon.is_finite() && lat.is_finite() => Ok(Coordinate::new(*lon, *lat)),
        [lon, lat, elevation, ..] if lon.is_finite() && lat.is_finite() => Ok(
            Coordinate::with_elevation(*lon, *lat, if elevation.is_finite() { *elevation } else { 0.0 }),
        ),
        other => Err(ViewerError::MalformedGeometry(format!(
            "invalid position {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn geojson(value: serde_json::Value) -> GeoJson {
        value.to_string().parse().expect("valid GeoJSON")
    }

    #[test]
    fn empty_geometry_is_rejected() {
        assert!(matches!(
            RouteGeometry::new(Vec::new()),
            Err(ViewerError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn feature_collection_line_string_keeps_elevation() {
        let payload = RoutePayload::GeoJson(geojson(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [9.0, 9.0]}},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "LineString",
                    "coordinates": [[100.5, 13.7, 12.0], [100.6, 13.8]]
                }}
            ]
        })));
        let geometry = normalize(payload).unwrap();
        assert_eq!(geometry.len(), 2);
        assert_eq!(geometry.first(), Coordinate::with_elevation(100.5, 13.7, 12.0));
        assert_eq!(geometry.last(), Coordinate::new(100.6, 13.8));
    }

    #[test]
    fn geojson_without_line_string_is_malformed() {
        let payload = RoutePayload::GeoJson(geojson(json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        })));
        assert!(matches!(
            normalize(payload),
            Err(ViewerError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn point_list_swaps_into_lon_lat_order() {
        let payload = RoutePayload::Points(vec![
            LatLon::new(13.7, 100.5),
            LatLon {
                lat: 13.8,
                lon: 100.6,
                elevation: Some(40.0),
            },
        ]);
        let geometry = normalize(payload).unwrap();
        assert_eq!(geometry.points()[0], Coordinate::new(100.5, 13.7));
        assert_eq!(geometry.points()[1].elevation, 40.0);
    }

    #[test]
    fn short_positions_are_malformed() {
        let payload = RoutePayload::Coordinates(vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(normalize(payload).is_err());
    }

    #[test]
    fn empty_coordinate_list_is_malformed() {
        assert!(matches!(
            normalize(RoutePayload::Coordinates(Vec::new())),
            Err(ViewerError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn payload_priority_prefers_geojson() {
        let line = geojson(json!({"type": "LineString", "coordinates": [[0.0, 0.0]]}));
        let payload = RoutePayload::from_fields(
            Some(line.clone()),
            Some(vec![LatLon::new(1.0, 1.0)]),
            None,
        )
        .unwrap();
        assert_eq!(payload, RoutePayload::GeoJson(line));

        let payload =
            RoutePayload::from_fields(None, None, Some(vec![vec![5.0, 6.0]])).unwrap();
        assert!(matches!(payload, RoutePayload::Coordinates(_)));

        assert!(RoutePayload::from_fields(None, None, None).is_err());
    }

    #[test]
    fn successor_and_prefix_respect_the_goal() {
        let geometry = RouteGeometry::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(0.0, 2.0),
        ])
        .unwrap();
        assert_eq!(geometry.successor(1), Some(Coordinate::new(0.0, 2.0)));
        assert_eq!(geometry.successor(2), None);
        assert_eq!(geometry.prefix(1).len(), 2);
        assert_eq!(geometry.prefix(99).len(), 3);
    }
}
