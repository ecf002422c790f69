use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use thiserror::Error;

use crate::error::ViewerError;
use crate::geometry::{Coordinate, RouteGeometry};

#[derive(Debug, Error)]
pub enum RouteIoError {
    #[error("failed to read or build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Geometry(#[from] ViewerError),
    #[error("GPX output is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Reads every track point of every track and segment, in file order. Files
/// without tracks fall back to their route points.
pub fn geometry_from_gpx<R: Read>(reader: R) -> Result<RouteGeometry, RouteIoError> {
    let document = gpx::read(reader)?;
    let mut points: Vec<Coordinate> = document
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(to_coordinate)
        .collect();
    if points.is_empty() {
        points = document
            .routes
            .iter()
            .flat_map(|route| &route.points)
            .map(to_coordinate)
            .collect();
    }
    tracing::debug!("parsed {} GPX points", points.len());
    Ok(RouteGeometry::new(points)?)
}

pub fn geometry_from_gpx_str(text: &str) -> Result<RouteGeometry, RouteIoError> {
    geometry_from_gpx(text.as_bytes())
}

pub fn geometry_from_gpx_path(path: impl AsRef<Path>) -> Result<RouteGeometry, RouteIoError> {
    let file = File::open(path.as_ref())?;
    geometry_from_gpx(BufReader::new(file))
}

fn to_coordinate(waypoint: &Waypoint) -> Coordinate {
    let point = waypoint.point();
    Coordinate::with_elevation(point.x(), point.y(), waypoint.elevation.unwrap_or(0.0))
}

/// Serializes a route as a single-track GPX 1.1 document.
pub fn encode_route_as_gpx(geometry: &RouteGeometry, name: &str) -> Result<String, RouteIoError> {
    let mut document = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("route-viewer".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.to_string()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment
        .points
        .extend(geometry.points().iter().map(to_waypoint));
    track.segments.push(segment);
    document.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&document, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Data URL a browser can offer as a download.
pub fn gpx_data_url(geometry: &RouteGeometry, name: &str) -> Result<String, RouteIoError> {
    let document = encode_route_as_gpx(geometry, name)?;
    Ok(format!(
        "data:application/gpx+xml;base64,{}",
        BASE64.encode(document)
    ))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    let mut waypoint = Waypoint::new(Point::new(coord.lon, coord.lat));
    waypoint.elevation = Some(coord.elevation);
    waypoint
}
