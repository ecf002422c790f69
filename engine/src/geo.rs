use serde::{Deserialize, Serialize};

use crate::geometry::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn path_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Forward azimuth from `from` to `to`, in degrees within `[0, 360)`.
pub fn bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if bearing >= 360.0 { 0.0 } else { bearing }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationStats {
    pub min: f64,
    pub max: f64,
    pub gain: f64,
    pub loss: f64,
}

/// Min/max plus cumulative positive and negative deltas between consecutive samples.
pub fn elevation_stats(elevations: impl IntoIterator<Item = f64>) -> Option<ElevationStats> {
    let mut iter = elevations.into_iter();
    let first = iter.next()?;
    let mut stats = ElevationStats {
        min: first,
        max: first,
        gain: 0.0,
        loss: 0.0,
    };
    let mut previous = first;
    for elevation in iter {
        let diff = elevation - previous;
        if diff > 0.0 {
            stats.gain += diff;
        } else {
            stats.loss += -diff;
        }
        stats.min = stats.min.min(elevation);
        stats.max = stats.max.max(elevation);
        previous = elevation;
    }
    Some(stats)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

/// Degrees/minutes/seconds rendering, e.g. `13° 45' 23.40" N`.
pub fn to_dms(decimal: f64, axis: Axis) -> String {
    let absolute = decimal.abs();
    let degrees = absolute.floor();
    let minutes_float = (absolute - degrees) * 60.0;
    let minutes = minutes_float.floor();
    let seconds = (minutes_float - minutes) * 60.0;
    let hemisphere = match (axis, decimal >= 0.0) {
        (Axis::Latitude, true) => 'N',
        (Axis::Latitude, false) => 'S',
        (Axis::Longitude, true) => 'E',
        (Axis::Longitude, false) => 'W',
    };
    format!("{degrees:.0}° {minutes:.0}' {seconds:.2}\" {hemisphere}")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RouteBounds {
    pub fn around(point: Coordinate) -> Self {
        Self {
            min_lat: point.lat,
            max_lat: point.lat,
            min_lon: point.lon,
            max_lon: point.lon,
        }
    }

    pub fn extended(self, point: Coordinate) -> Self {
        Self {
            min_lat: self.min_lat.min(point.lat),
            max_lat: self.max_lat.max(point.lat),
            min_lon: self.min_lon.min(point.lon),
            max_lon: self.max_lon.max(point.lon),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}
