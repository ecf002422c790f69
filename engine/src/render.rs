use std::collections::BTreeMap;

use crate::geometry::RouteGeometry;
use crate::path_id::PathId;
use crate::surface::{LineLayer, LinePaint, MapSurface, PaintProperty};

pub const PALETTE: [&str; 8] = [
    "#2196f3", "#ff9800", "#4caf50", "#f44336", "#9c27b0", "#00bcd4", "#ff5722", "#607d8b",
];

pub fn palette_color(color_index: usize) -> &'static str {
    PALETTE[color_index % PALETTE.len()]
}

/// Geometry source shared by the three strokes of a path.
pub fn source_id(id: PathId) -> String {
    format!("route-{id}")
}

/// The three strokes drawn for every path, listed bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Shadow,
    Outline,
    Main,
}

impl Stroke {
    pub const DRAW_ORDER: [Stroke; 3] = [Stroke::Shadow, Stroke::Outline, Stroke::Main];

    pub fn layer_id(self, id: PathId) -> String {
        match self {
            Stroke::Shadow => format!("route-shadow-{id}"),
            Stroke::Outline => format!("route-outline-{id}"),
            Stroke::Main => format!("route-{id}"),
        }
    }

    /// Opacity the stroke shows at while its path is visible.
    pub fn base_opacity(self) -> f64 {
        match self {
            Stroke::Shadow => 0.15,
            Stroke::Outline => 0.9,
            Stroke::Main => 1.0,
        }
    }

    pub fn width(self, selected: bool) -> f64 {
        match (self, selected) {
            (Stroke::Shadow, _) => 10.0,
            (Stroke::Outline, true) => 8.0,
            (Stroke::Outline, false) => 6.0,
            (Stroke::Main, true) => 6.0,
            (Stroke::Main, false) => 4.0,
        }
    }

    fn paint(self, color_index: usize, selected: bool, visible: bool) -> LinePaint {
        let (color, blur) = match self {
            Stroke::Shadow => ("#000000", Some(4.0)),
            Stroke::Outline => ("#ffffff", None),
            Stroke::Main => (palette_color(color_index), None),
        };
        LinePaint {
            color: color.to_string(),
            width: self.width(selected),
            opacity: self.opacity(visible),
            blur,
        }
    }

    fn opacity(self, visible: bool) -> f64 {
        if visible { self.base_opacity() } else { 0.0 }
    }
}

/// Disposable visuals of one path on the surface.
#[derive(Debug)]
struct PathVisual {
    id: PathId,
    selected: bool,
    visible: bool,
}

impl PathVisual {
    fn create(
        surface: &mut dyn MapSurface,
        id: PathId,
        geometry: &RouteGeometry,
        color_index: usize,
        selected: bool,
    ) -> Self {
        let source = source_id(id);
        surface.add_line_source(&source, geometry.points());
        for stroke in Stroke::DRAW_ORDER {
            let layer = LineLayer {
                id: stroke.layer_id(id),
                source: source.clone(),
                paint: stroke.paint(color_index, selected, true),
            };
            surface.add_line_layer(&layer, None);
        }
        Self {
            id,
            selected,
            visible: true,
        }
    }

    fn dispose(self, surface: &mut dyn MapSurface) {
        for stroke in Stroke::DRAW_ORDER.iter().rev() {
            surface.remove_layer(&stroke.layer_id(self.id));
        }
        surface.remove_source(&source_id(self.id));
    }

    fn apply_selected(&mut self, surface: &mut dyn MapSurface, selected: bool) {
        for stroke in [Stroke::Outline, Stroke::Main] {
            surface.set_paint_property(
                &stroke.layer_id(self.id),
                &PaintProperty::Width(stroke.width(selected)),
            );
        }
        self.selected = selected;
    }

    fn apply_visible(&mut self, surface: &mut dyn MapSurface, visible: bool) {
        for stroke in Stroke::DRAW_ORDER {
            surface.set_paint_property(
                &stroke.layer_id(self.id),
                &PaintProperty::Opacity(stroke.opacity(visible)),
            );
        }
        self.visible = visible;
    }
}

/// Materializes paths as shadow/outline/main stroke triples on the map.
///
/// Holds one visual per path id. Replacing a path always disposes the old
/// visual before the new one is created.
#[derive(Debug, Default)]
pub struct RenderAdapter {
    visuals: BTreeMap<PathId, PathVisual>,
}

impl RenderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &mut self,
        surface: &mut dyn MapSurface,
        id: PathId,
        geometry: &RouteGeometry,
        color_index: usize,
        is_selected: bool,
    ) {
        if let Some(previous) = self.visuals.remove(&id) {
            tracing::debug!("replacing visuals of path {id}");
            previous.dispose(surface);
        }
        let visual = PathVisual::create(surface, id, geometry, color_index, is_selected);
        self.visuals.insert(id, visual);
    }

    /// Scales every stroke's own base opacity by 0 or 1. Returns `false` for an
    /// id without visuals.
    pub fn set_visible(&mut self, surface: &mut dyn MapSurface, id: PathId, visible: bool) -> bool {
        match self.visuals.get_mut(&id) {
            Some(visual) => {
                visual.apply_visible(surface, visible);
                true
            }
            None => false,
        }
    }

    /// Promotes `id` to the selected widths and demotes every other path.
    /// Opacity is left untouched, so a hidden path stays hidden.
    pub fn highlight(&mut self, surface: &mut dyn MapSurface, id: PathId) {
        for (path_id, visual) in self.visuals.iter_mut() {
            visual.apply_selected(surface, *path_id == id);
        }
    }

    pub fn remove(&mut self, surface: &mut dyn MapSurface, id: PathId) -> bool {
        match self.visuals.remove(&id) {
            Some(visual) => {
                visual.dispose(surface);
                true
            }
            None => false,
        }
    }

    pub fn remove_all(&mut self, surface: &mut dyn MapSurface) {
        for (_, visual) in std::mem::take(&mut self.visuals) {
            visual.dispose(surface);
        }
    }

    pub fn contains(&self, id: PathId) -> bool {
        self.visuals.contains_key(&id)
    }

    pub fn is_selected(&self, id: PathId) -> Option<bool> {
        self.visuals.get(&id).map(|visual| visual.selected)
    }

    pub fn is_visible(&self, id: PathId) -> Option<bool> {
        self.visuals.get(&id).map(|visual| visual.visible)
    }

    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;
    use crate::surface::RecordingSurface;

    fn line() -> RouteGeometry {
        RouteGeometry::new(vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)]).unwrap()
    }

    fn alt(index: usize) -> PathId {
        PathId::alternative(index).unwrap()
    }

    #[test]
    fn strokes_stack_shadow_outline_main() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        adapter.show(&mut surface, PathId::Best, &line(), 0, false);

        assert_eq!(
            surface.layer_ids(),
            vec!["route-shadow-best", "route-outline-best", "route-best"]
        );
        assert_eq!(surface.source("route-best").map(<[_]>::len), Some(2));
        let main = surface.layer("route-best").unwrap();
        assert_eq!(main.paint.color, "#2196f3");
        assert_eq!(main.paint.width, 4.0);
        assert_eq!(surface.layer("route-outline-best").unwrap().paint.width, 6.0);
        assert_eq!(surface.layer("route-shadow-best").unwrap().paint.blur, Some(4.0));
    }

    #[test]
    fn showing_twice_keeps_a_single_triple() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        adapter.show(&mut surface, alt(1), &line(), 2, false);
        adapter.show(&mut surface, alt(1), &line(), 2, true);

        for stroke in Stroke::DRAW_ORDER {
            assert_eq!(surface.layer_count(&stroke.layer_id(alt(1))), 1);
        }
        assert_eq!(surface.source_count(), 1);
        assert_eq!(adapter.is_selected(alt(1)), Some(true));
    }

    #[test]
    fn visibility_restores_each_base_opacity() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        adapter.show(&mut surface, PathId::Best, &line(), 0, false);

        assert!(adapter.set_visible(&mut surface, PathId::Best, false));
        for stroke in Stroke::DRAW_ORDER {
            let layer = surface.layer(&stroke.layer_id(PathId::Best)).unwrap();
            assert_eq!(layer.paint.opacity, 0.0);
        }

        assert!(adapter.set_visible(&mut surface, PathId::Best, true));
        let opacity = |id: &str| surface.layer(id).unwrap().paint.opacity;
        assert_eq!(opacity("route-shadow-best"), 0.15);
        assert_eq!(opacity("route-outline-best"), 0.9);
        assert_eq!(opacity("route-best"), 1.0);

        assert!(!adapter.set_visible(&mut surface, alt(4), true));
    }

    #[test]
    fn highlight_is_idempotent_and_leaves_opacity_alone() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        adapter.show(&mut surface, PathId::Best, &line(), 0, true);
        adapter.show(&mut surface, alt(0), &line(), 1, false);
        adapter.set_visible(&mut surface, alt(0), false);

        adapter.highlight(&mut surface, alt(0));
        adapter.highlight(&mut surface, alt(0));

        assert_eq!(surface.layer("route-alt_0").unwrap().paint.width, 6.0);
        assert_eq!(surface.layer("route-outline-alt_0").unwrap().paint.width, 8.0);
        assert_eq!(surface.layer("route-alt_0").unwrap().paint.opacity, 0.0);
        assert_eq!(surface.layer("route-best").unwrap().paint.width, 4.0);
        assert_eq!(surface.layer("route-outline-best").unwrap().paint.width, 6.0);
    }

    #[test]
    fn remove_all_disposes_layers_and_sources() {
        let mut surface = RecordingSurface::new();
        let mut adapter = RenderAdapter::new();
        adapter.show(&mut surface, PathId::Best, &line(), 0, false);
        adapter.show(&mut surface, alt(0), &line(), 1, false);

        adapter.remove_all(&mut surface);

        assert!(adapter.is_empty());
        assert!(surface.layer_ids().is_empty());
        assert_eq!(surface.source_count(), 0);
    }

    #[test]
    fn palette_wraps_around() {
        assert_eq!(palette_color(8), palette_color(0));
        assert_eq!(palette_color(1), "#ff9800");
    }
}
