//! `MapSurface` on top of Mapbox GL JS.
//!
//! The JS side lives in `mapbox_map.js` and owns the map instance; every call
//! crosses the boundary as plain JSON-shaped values. Calls issued before the
//! style has loaded are replayed by the JS side in order, so layer presence is
//! answered from the ids requested here rather than from the live map.

use std::collections::BTreeSet;

use engine::geo::RouteBounds;
use engine::geometry::Coordinate;
use engine::surface::{
    CameraMove, FitOptions, LineLayer, MapSurface, MarkerHandle, MarkerSpec, PaintProperty,
};
use seed::prelude::web_sys;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::{JsValue, wasm_bindgen};

#[wasm_bindgen(module = "/mapbox_map.js")]
extern "C" {
    #[wasm_bindgen(js_name = initMap)]
    pub fn init_map();
    #[wasm_bindgen(js_name = addLineSource)]
    fn add_line_source_js(id: &str, coordinates: JsValue);
    #[wasm_bindgen(js_name = setSourceData)]
    fn set_source_data_js(id: &str, coordinates: JsValue);
    #[wasm_bindgen(js_name = removeSource)]
    fn remove_source_js(id: &str);
    #[wasm_bindgen(js_name = addLineLayer)]
    fn add_line_layer_js(layer: JsValue, before: Option<String>);
    #[wasm_bindgen(js_name = setPaintProperty)]
    fn set_paint_property_js(layer_id: &str, name: &str, value: JsValue);
    #[wasm_bindgen(js_name = removeLayer)]
    fn remove_layer_js(id: &str);
    #[wasm_bindgen(js_name = easeTo)]
    fn ease_to_js(camera: JsValue);
    #[wasm_bindgen(js_name = fitBounds)]
    fn fit_bounds_js(bounds: JsValue, options: JsValue);
    #[wasm_bindgen(js_name = addMarker)]
    fn add_marker_js(marker: JsValue) -> u32;
    #[wasm_bindgen(js_name = removeMarker)]
    fn remove_marker_js(handle: u32);
    #[wasm_bindgen(js_name = queryTerrainElevation)]
    fn query_terrain_elevation_js(lon: f64, lat: f64) -> Option<f64>;
    #[wasm_bindgen(js_name = updateSelectionMarkers)]
    fn update_selection_markers_js(start: JsValue, goal: JsValue);
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsLineLayer<'a> {
    id: &'a str,
    source: &'a str,
    color: &'a str,
    width: f64,
    opacity: f64,
    blur: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsCamera {
    center: [f64; 2],
    bearing: Option<f64>,
    pitch: f64,
    zoom: f64,
    duration: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsFitOptions {
    padding: f64,
    pitch: f64,
    duration: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsMarker<'a> {
    lng_lat: [f64; 2],
    color: &'a str,
    popup_html: Option<&'a str>,
}

fn positions(coordinates: &[Coordinate]) -> Vec<[f64; 3]> {
    coordinates
        .iter()
        .map(|c| [c.lon, c.lat, c.elevation])
        .collect()
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    to_value(value).unwrap_or_else(|err| {
        web_sys::console::error_1(
            &format!("[frontend] failed to serialize map payload: {err}").into(),
        );
        JsValue::NULL
    })
}

/// Handle to the single Mapbox map the page hosts.
#[derive(Debug, Default)]
pub struct BrowserMap {
    layers: BTreeSet<String>,
}

impl BrowserMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn track_layer(&mut self, layer_id: &str, present: bool) {
        if present {
            self.layers.insert(layer_id.to_string());
        } else {
            self.layers.remove(layer_id);
        }
    }

    /// Start/goal pins are UI chrome, not part of the route layer stack.
    pub fn show_selection(&self, start: Option<Coordinate>, goal: Option<Coordinate>) {
        let pin = |point: Option<Coordinate>| {
            point
                .map(|c| to_js(&[c.lon, c.lat]))
                .unwrap_or(JsValue::NULL)
        };
        update_selection_markers_js(pin(start), pin(goal));
    }
}

impl MapSurface for BrowserMap {
    fn add_line_source(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        add_line_source_js(source_id, to_js(&positions(coordinates)));
    }

    fn set_source_data(&mut self, source_id: &str, coordinates: &[Coordinate]) {
        set_source_data_js(source_id, to_js(&positions(coordinates)));
    }

    fn remove_source(&mut self, source_id: &str) {
        remove_source_js(source_id);
    }

    fn add_line_layer(&mut self, layer: &LineLayer, before: Option<&str>) {
        let js_layer = JsLineLayer {
            id: &layer.id,
            source: &layer.source,
            color: &layer.paint.color,
            width: layer.paint.width,
            opacity: layer.paint.opacity,
            blur: layer.paint.blur,
        };
        self.track_layer(&layer.id, true);
        add_line_layer_js(to_js(&js_layer), before.map(str::to_string));
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &PaintProperty) {
        let value = match property {
            PaintProperty::Color(color) => JsValue::from_str(color),
            PaintProperty::Width(width) => JsValue::from_f64(*width),
            PaintProperty::Opacity(opacity) => JsValue::from_f64(*opacity),
        };
        set_paint_property_js(layer_id, property.name(), value);
    }

    fn remove_layer(&mut self, layer_id: &str) {
        self.track_layer(layer_id, false);
        remove_layer_js(layer_id);
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.contains(layer_id)
    }

    fn ease_to(&mut self, camera: &CameraMove) {
        ease_to_js(to_js(&JsCamera {
            center: camera.center.lon_lat(),
            bearing: camera.bearing,
            pitch: camera.pitch,
            zoom: camera.zoom,
            duration: camera.duration_ms,
        }));
    }

    fn fit_bounds(&mut self, bounds: &RouteBounds, options: &FitOptions) {
        let corners = [
            [bounds.min_lon, bounds.min_lat],
            [bounds.max_lon, bounds.max_lat],
        ];
        fit_bounds_js(
            to_js(&corners),
            to_js(&JsFitOptions {
                padding: options.padding_px,
                pitch: options.pitch,
                duration: options.duration_ms,
            }),
        );
    }

    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle {
        MarkerHandle(add_marker_js(to_js(&JsMarker {
            lng_lat: marker.position.lon_lat(),
            color: &marker.color,
            popup_html: marker.popup_html.as_deref(),
        })))
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        remove_marker_js(marker.0);
    }

    fn terrain_elevation(&self, at: Coordinate) -> Option<f64> {
        query_terrain_elevation_js(at.lon, at.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_keep_lon_lat_elevation_order() {
        let coords = [Coordinate::with_elevation(100.5, 13.7, 4.0)];
        assert_eq!(positions(&coords), vec![[100.5, 13.7, 4.0]]);
    }

    #[test]
    fn requested_layers_count_as_present_before_the_map_draws_them() {
        let mut map = BrowserMap::new();
        assert!(!map.has_layer("route-best"));

        map.track_layer("route-best", true);
        assert!(map.has_layer("route-best"));

        map.track_layer("route-best", false);
        assert!(!map.has_layer("route-best"));
    }
}
