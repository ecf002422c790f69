use crate::geometry::{Coordinate, RouteGeometry};
use crate::path_id::PathId;
use crate::render::Stroke;
use crate::surface::{LineLayer, LinePaint, MapSurface, MarkerHandle, MarkerSpec};

pub const TRAIL_ID: &str = "passed-route";
pub const TRAIL_COLOR: &str = "#00ff00";
pub const MARKER_COLOR: &str = "#00ff00";

/// Owns the single playback marker and the single traveled-trail overlay.
#[derive(Debug, Default)]
pub struct MarkerAndTrailPresenter {
    marker: Option<MarkerHandle>,
    trail_len: Option<usize>,
}

impl MarkerAndTrailPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_marker_to(
        &mut self,
        surface: &mut dyn MapSurface,
        coordinate: Coordinate,
        index: usize,
        total: usize,
    ) {
        if let Some(previous) = self.marker.take() {
            surface.remove_marker(previous);
        }
        let marker = MarkerSpec {
            position: coordinate,
            color: MARKER_COLOR.to_string(),
            popup_html: Some(marker_popup(coordinate, index, total)),
        };
        self.marker = Some(surface.add_marker(&marker));
    }

    /// Trail covers samples `0..=index`. The layer is created once and only its
    /// data is swapped afterwards.
    pub fn extend_trail_to(
        &mut self,
        surface: &mut dyn MapSurface,
        geometry: &RouteGeometry,
        index: usize,
    ) {
        let prefix = geometry.prefix(index);
        if self.trail_len.is_some() {
            surface.set_source_data(TRAIL_ID, prefix);
        } else {
            surface.add_line_source(TRAIL_ID, prefix);
            let best_line = Stroke::Main.layer_id(PathId::Best);
            let before = surface
                .has_layer(&best_line)
                .then_some(best_line.as_str());
            let layer = LineLayer {
                id: TRAIL_ID.to_string(),
                source: TRAIL_ID.to_string(),
                paint: LinePaint {
                    color: TRAIL_COLOR.to_string(),
                    width: 5.0,
                    opacity: 0.8,
                    blur: None,
                },
            };
            surface.add_line_layer(&layer, before);
        }
        self.trail_len = Some(prefix.len());
    }

    pub fn remove_marker(&mut self, surface: &mut dyn MapSurface) {
        if let Some(marker) = self.marker.take() {
            surface.remove_marker(marker);
        }
    }

    pub fn remove_trail(&mut self, surface: &mut dyn MapSurface) {
        if self.trail_len.take().is_some() {
            surface.remove_layer(TRAIL_ID);
            surface.remove_source(TRAIL_ID);
        }
    }

    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        self.remove_marker(surface);
        self.remove_trail(surface);
    }

    pub fn has_marker(&self) -> bool {
        self.marker.is_some()
    }

    /// Number of samples the trail currently draws.
    pub fn trail_len(&self) -> Option<usize> {
        self.trail_len
    }
}

fn marker_popup(coordinate: Coordinate, index: usize, total: usize) -> String {
    format!(
        "<strong>Point {}/{}</strong><br>Elevation: {:.1} m<br>Lat: {:.5}, Lon: {:.5}",
        index + 1,
        total,
        coordinate.elevation,
        coordinate.lat,
        coordinate.lon
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderAdapter;
    use crate::surface::{RecordingSurface, SurfaceCall};

    fn line() -> RouteGeometry {
        RouteGeometry::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::with_elevation(0.0, 2.0, 12.5),
        ])
        .unwrap()
    }

    #[test]
    fn only_one_marker_lives_at_a_time() {
        let mut surface = RecordingSurface::new();
        let mut presenter = MarkerAndTrailPresenter::new();
        let geometry = line();

        presenter.move_marker_to(&mut surface, geometry.first(), 0, 3);
        presenter.move_marker_to(&mut surface, geometry.last(), 2, 3);

        assert_eq!(surface.marker_count(), 1);
        let (_, marker) = surface.markers().next().unwrap();
        assert_eq!(marker.position, Coordinate::with_elevation(0.0, 2.0, 12.5));
        let popup = marker.popup_html.as_deref().unwrap();
        assert!(popup.contains("Point 3/3"));
        assert!(popup.contains("12.5 m"));
        assert!(popup.contains("Lat: 2.00000, Lon: 0.00000"));
    }

    #[test]
    fn trail_is_created_once_then_updated_in_place() {
        let mut surface = RecordingSurface::new();
        let mut presenter = MarkerAndTrailPresenter::new();
        let geometry = line();

        presenter.extend_trail_to(&mut surface, &geometry, 0);
        presenter.extend_trail_to(&mut surface, &geometry, 2);

        assert_eq!(surface.layer_count(TRAIL_ID), 1);
        assert_eq!(surface.source(TRAIL_ID).map(<[_]>::len), Some(3));
        assert_eq!(presenter.trail_len(), Some(3));
        let adds = surface
            .calls()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::AddLayer { id, .. } if id == TRAIL_ID))
            .count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn trail_sits_beneath_the_best_line() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        let mut presenter = MarkerAndTrailPresenter::new();
        let geometry = line();
        adapter.show(&mut surface, PathId::Best, &geometry, 0, true);

        presenter.extend_trail_to(&mut surface, &geometry, 1);

        assert_eq!(
            surface.layer_ids(),
            vec![
                "route-shadow-best",
                "route-outline-best",
                TRAIL_ID,
                "route-best"
            ]
        );
    }

    #[test]
    fn clear_removes_marker_and_trail() {
        let mut surface = RecordingSurface::new();
        let mut presenter = MarkerAndTrailPresenter::new();
        let geometry = line();
        presenter.move_marker_to(&mut surface, geometry.first(), 0, 3);
        presenter.extend_trail_to(&mut surface, &geometry, 0);

        presenter.clear(&mut surface);
        presenter.clear(&mut surface);

        assert_eq!(surface.marker_count(), 0);
        assert!(!surface.has_layer(TRAIL_ID));
        assert_eq!(surface.source_count(), 0);
        assert!(!presenter.has_marker());
    }
}
