//! Headless map surface: keeps just enough state to answer `has_layer` and
//! logs every draw call through `tracing`.

use std::collections::{BTreeMap, BTreeSet};

use engine::geo::RouteBounds;
use engine::geometry::Coordinate;
use engine::surface::{
    CameraMove, FitOptions, LineLayer, MapSurface, MarkerHandle, MarkerSpec, PaintProperty,
};

#[derive(Debug, Default)]
pub struct TracingSurface {
    sources: BTreeMap<String, usize>,
    layers: BTreeSet<String>,
    markers: BTreeSet<MarkerHandle>,
    next_marker: u32,
    camera_moves: usize,
}

impl TracingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(String::as_str)
    }

    /// Point count last pushed to `source_id`.
    pub fn source_len(&self, source_id: &str) -> Option<usize> {
        self.sources.get(source_id).copied()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn camera_moves(&self) -> usize {
        self.camera_moves
    }
}

impl MapSurface for TracingSurface {
    fn add_line_source(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        tracing::debug!("add source {source_id} ({} points)", coordinates.len());
        self.sources.insert(source_id.to_string(), coordinates.len());
    }

    fn set_source_data(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        tracing::trace!("update source {source_id} ({} points)", coordinates.len());
        self.sources.insert(source_id.to_string(), coordinates.len());
    }

    fn remove_source(&mut self, source_id: &str) {
        tracing::debug!("remove source {source_id}");
        self.sources.remove(source_id);
    }

    fn add_line_layer(&mut self, layer: &LineLayer, before: Option<&str>) {
        tracing::debug!(
            "add layer {} color={} width={} opacity={} before={:?}",
            layer.id,
            layer.paint.color,
            layer.paint.width,
            layer.paint.opacity,
            before
        );
        self.layers.insert(layer.id.clone());
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &PaintProperty) {
        tracing::debug!("paint {layer_id} {property:?}");
    }

    fn remove_layer(&mut self, layer_id: &str) {
        tracing::debug!("remove layer {layer_id}");
        self.layers.remove(layer_id);
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.contains(layer_id)
    }

    fn ease_to(&mut self, camera: &CameraMove) {
        tracing::trace!(
            "camera -> {:.5},{:.5} pitch={} zoom={} bearing={:?}",
            camera.center.lat,
            camera.center.lon,
            camera.pitch,
            camera.zoom,
            camera.bearing
        );
        self.camera_moves += 1;
    }

    fn fit_bounds(&mut self, bounds: &RouteBounds, options: &FitOptions) {
        tracing::info!(
            "fit to lat {:.5}..{:.5} lon {:.5}..{:.5} (padding {})",
            bounds.min_lat,
            bounds.max_lat,
            bounds.min_lon,
            bounds.max_lon,
            options.padding_px
        );
    }

    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle {
        self.next_marker += 1;
        let handle = MarkerHandle(self.next_marker);
        tracing::trace!(
            "marker {} at {:.5},{:.5}",
            handle.0,
            marker.position.lat,
            marker.position.lon
        );
        self.markers.insert(handle);
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        self.markers.remove(&marker);
    }

    fn terrain_elevation(&self, _at: Coordinate) -> Option<f64> {
        None
    }
}
