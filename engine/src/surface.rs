//! The map surface the engine draws on.
//!
//! Every visual effect of the engine goes through [`MapSurface`]. The browser
//! build implements it on top of Mapbox GL JS, the headless player logs the
//! calls, and [`RecordingSurface`] keeps an inspectable copy of the layer stack
//! for tests.

use std::collections::BTreeMap;

use crate::geo::RouteBounds;
use crate::geometry::Coordinate;

#[derive(Debug, Clone, PartialEq)]
pub struct LinePaint {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub blur: Option<f64>,
}

/// A line layer bound to a geometry source. Joins and caps are always round.
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayer {
    pub id: String,
    pub source: String,
    pub paint: LinePaint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintProperty {
    Color(String),
    Width(f64),
    Opacity(f64),
}

impl PaintProperty {
    /// Style-spec name of the property.
    pub fn name(&self) -> &'static str {
        match self {
            PaintProperty::Color(_) => "line-color",
            PaintProperty::Width(_) => "line-width",
            PaintProperty::Opacity(_) => "line-opacity",
        }
    }

    fn apply(&self, paint: &mut LinePaint) {
        match self {
            PaintProperty::Color(color) => paint.color = color.clone(),
            PaintProperty::Width(width) => paint.width = *width,
            PaintProperty::Opacity(opacity) => paint.opacity = *opacity,
        }
    }
}

/// Animated camera move. A `None` bearing leaves the current bearing alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMove {
    pub center: Coordinate,
    pub bearing: Option<f64>,
    pub pitch: f64,
    pub zoom: f64,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding_px: f64,
    pub pitch: f64,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: Coordinate,
    pub color: String,
    pub popup_html: Option<String>,
}

/// Opaque handle of a marker living on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerHandle(pub u32);

pub trait MapSurface {
    fn add_line_source(&mut self, source_id: &str, coordinates: &[Coordinate]);
    /// Replaces the data of an existing source in place.
    fn set_source_data(&mut self, source_id: &str, coordinates: &[Coordinate]);
    fn remove_source(&mut self, source_id: &str);
    /// Adds `layer` on top of the stack, or directly beneath `before` when given.
    fn add_line_layer(&mut self, layer: &LineLayer, before: Option<&str>);
    fn set_paint_property(&mut self, layer_id: &str, property: &PaintProperty);
    fn remove_layer(&mut self, layer_id: &str);
    fn has_layer(&self, layer_id: &str) -> bool;
    /// Fire-and-forget: the move animates on its own.
    fn ease_to(&mut self, camera: &CameraMove);
    fn fit_bounds(&mut self, bounds: &RouteBounds, options: &FitOptions);
    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, marker: MarkerHandle);
    fn terrain_elevation(&self, at: Coordinate) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddSource(String),
    SetSourceData { source: String, points: usize },
    RemoveSource(String),
    AddLayer { id: String, before: Option<String> },
    SetPaint { layer: String, property: PaintProperty },
    RemoveLayer(String),
    EaseTo(CameraMove),
    FitBounds(RouteBounds),
    AddMarker(MarkerHandle),
    RemoveMarker(MarkerHandle),
}

/// In-memory surface that records every call and mirrors the resulting state.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<SurfaceCall>,
    layers: Vec<LineLayer>,
    sources: BTreeMap<String, Vec<Coordinate>>,
    markers: BTreeMap<MarkerHandle, MarkerSpec>,
    next_marker: u32,
    terrain_height: Option<f64>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `terrain_elevation` answer `height` everywhere.
    pub fn with_terrain_height(mut self, height: f64) -> Self {
        self.terrain_height = Some(height);
        self
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Layer ids bottom to top.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.id.as_str()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&LineLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn layer_count(&self, id: &str) -> usize {
        self.layers.iter().filter(|layer| layer.id == id).count()
    }

    pub fn source(&self, id: &str) -> Option<&[Coordinate]> {
        self.sources.get(id).map(Vec::as_slice)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerHandle, &MarkerSpec)> {
        self.markers.iter()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn camera_moves(&self) -> Vec<CameraMove> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::EaseTo(camera) => Some(*camera),
                _ => None,
            })
            .collect()
    }
}

impl MapSurface for RecordingSurface {
    fn add_line_source(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        self.calls.push(SurfaceCall::AddSource(source_id.to_string()));
        self.sources
            .insert(source_id.to_string(), coordinates.to_vec());
    }

    fn set_source_data(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        self.calls.push(SurfaceCall::SetSourceData {
            source: source_id.to_string(),
            points: coordinates.len(),
        });
        if let Some(data) = self.sources.get_mut(source_id) {
            *data = coordinates.to_vec();
        }
    }

    fn remove_source(&mut self, source_id: &str) {
        self.calls.push(SurfaceCall::RemoveSource(source_id.to_string()));
        self.sources.remove(source_id);
    }

    fn add_line_layer(&mut self, layer: &LineLayer, before: Option<&str>) {
        self.calls.push(SurfaceCall::AddLayer {
            id: layer.id.clone(),
            before: before.map(str::to_string),
        });
        let position = before
            .and_then(|before| self.layers.iter().position(|l| l.id == before))
            .unwrap_or(self.layers.len());
        self.layers.insert(position, layer.clone());
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &PaintProperty) {
        self.calls.push(SurfaceCall::SetPaint {
            layer: layer_id.to_string(),
            property: property.clone(),
        });
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) {
            property.apply(&mut layer.paint);
        }
    }

    fn remove_layer(&mut self, layer_id: &str) {
        self.calls.push(SurfaceCall::RemoveLayer(layer_id.to_string()));
        self.layers.retain(|layer| layer.id != layer_id);
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.iter().any(|layer| layer.id == layer_id)
    }

    fn ease_to(&mut self, camera: &CameraMove) {
        self.calls.push(SurfaceCall::EaseTo(*camera));
    }

    fn fit_bounds(&mut self, bounds: &RouteBounds, _options: &FitOptions) {
        self.calls.push(SurfaceCall::FitBounds(*bounds));
    }

    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle(self.next_marker);
        self.next_marker += 1;
        self.calls.push(SurfaceCall::AddMarker(handle));
        self.markers.insert(handle, marker.clone());
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        self.calls.push(SurfaceCall::RemoveMarker(marker));
        self.markers.remove(&marker);
    }

    fn terrain_elevation(&self, _at: Coordinate) -> Option<f64> {
        self.terrain_height
    }
}
