use std::collections::{BTreeMap, BTreeSet};

use shared::PathStatistics;

use crate::geo::RouteBounds;
use crate::geometry::RouteGeometry;
use crate::path_id::PathId;
use crate::render::{RenderAdapter, palette_color};
use crate::surface::MapSurface;

#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub id: PathId,
    pub geometry: RouteGeometry,
    pub color_index: usize,
    pub visible: bool,
    pub rank: Option<u32>,
    pub label: Option<String>,
    /// Numbers the planning backend computed for this path, if any.
    pub statistics: Option<PathStatistics>,
}

impl PathEntry {
    pub fn new(id: PathId, geometry: RouteGeometry) -> Self {
        Self {
            id,
            geometry,
            color_index: id.default_color_index(),
            visible: true,
            rank: None,
            label: None,
            statistics: None,
        }
    }

    pub fn with_rank(mut self, rank: Option<u32>) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_statistics(mut self, statistics: Option<PathStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn color(&self) -> &'static str {
        palette_color(self.color_index)
    }
}

/// The routes currently on the map, keyed by id. Owns the render adapter so a
/// path's visuals never outlive its registration.
#[derive(Debug, Default)]
pub struct PathRegistry {
    entries: BTreeMap<PathId, PathEntry>,
    adapter: RenderAdapter,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `entry`. An existing entry with the same id has its visuals torn
    /// down before the new ones are drawn, and its color slot is reassigned
    /// from the id.
    pub fn register(&mut self, surface: &mut dyn MapSurface, mut entry: PathEntry, selected: bool) {
        let id = entry.id;
        entry.color_index = id.default_color_index();
        entry.visible = true;
        if self.entries.remove(&id).is_some() {
            tracing::debug!("path {id} re-registered");
        }
        self.adapter
            .show(surface, id, &entry.geometry, entry.color_index, selected);
        tracing::debug!(
            "registered path {id} with {} points, color {}",
            entry.geometry.len(),
            entry.color()
        );
        self.entries.insert(id, entry);
    }

    /// Returns `false` and changes nothing when `id` is not registered.
    pub fn set_visibility(&mut self, surface: &mut dyn MapSurface, id: PathId, visible: bool) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            tracing::debug!("visibility change for unknown path {id} ignored");
            return false;
        };
        entry.visible = visible;
        self.adapter.set_visible(surface, id, visible);
        true
    }

    pub fn remove(&mut self, surface: &mut dyn MapSurface, id: PathId) -> Option<PathEntry> {
        let entry = self.entries.remove(&id)?;
        self.adapter.remove(surface, id);
        Some(entry)
    }

    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        self.adapter.remove_all(surface);
        self.entries.clear();
    }

    pub fn list_visible(&self) -> BTreeSet<PathId> {
        self.entries
            .values()
            .filter(|entry| entry.visible)
            .map(|entry| entry.id)
            .collect()
    }

    pub fn get(&self, id: PathId) -> Option<&PathEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: PathId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entries in display order: best first, then alternatives.
    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<PathId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounding box over every registered geometry.
    pub fn bounds(&self) -> Option<RouteBounds> {
        self.entries
            .values()
            .map(|entry| entry.geometry.bounds())
            .reduce(RouteBounds::union)
    }

    pub fn adapter(&self) -> &RenderAdapter {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut RenderAdapter {
        &mut self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;
    use crate::render::Stroke;
    use crate::surface::RecordingSurface;

    fn geometry(points: &[(f64, f64)]) -> RouteGeometry {
        RouteGeometry::new(
            points
                .iter()
                .map(|&(lon, lat)| Coordinate::new(lon, lat))
                .collect(),
        )
        .unwrap()
    }

    fn alt(index: usize) -> PathId {
        PathId::alternative(index).unwrap()
    }

    #[test]
    fn re_registering_replaces_entry_and_visuals() {
        let mut surface = RecordingSurface::new();
        let mut registry = PathRegistry::new();
        registry.register(
            &mut surface,
            PathEntry::new(alt(2), geometry(&[(0.0, 0.0), (1.0, 1.0)])),
            false,
        );
        registry.set_visibility(&mut surface, alt(2), false);
        let mut replacement = PathEntry::new(alt(2), geometry(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]));
        replacement.color_index = 7;
        registry.register(&mut surface, replacement, false);

        assert_eq!(registry.len(), 1);
        let entry = registry.get(alt(2)).unwrap();
        assert_eq!(entry.geometry.len(), 3);
        assert_eq!(entry.color_index, 3);
        assert!(entry.visible);
        for stroke in Stroke::DRAW_ORDER {
            assert_eq!(surface.layer_count(&stroke.layer_id(alt(2))), 1);
        }
        assert_eq!(surface.source("route-alt_2").map(<[_]>::len), Some(3));
    }

    #[test]
    fn unknown_visibility_change_is_a_no_op() {
        let mut surface = RecordingSurface::new();
        let mut registry = PathRegistry::new();
        assert!(!registry.set_visibility(&mut surface, PathId::Best, false));
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn list_visible_tracks_toggles() {
        let mut surface = RecordingSurface::new();
        let mut registry = PathRegistry::new();
        registry.register(&mut surface, PathEntry::new(PathId::Best, geometry(&[(0.0, 0.0)])), true);
        registry.register(&mut surface, PathEntry::new(alt(0), geometry(&[(1.0, 0.0)])), false);

        registry.set_visibility(&mut surface, alt(0), false);

        assert_eq!(registry.list_visible(), BTreeSet::from([PathId::Best]));
    }

    #[test]
    fn clear_tears_everything_down() {
        let mut surface = RecordingSurface::new();
        let mut registry = PathRegistry::new();
        registry.register(&mut surface, PathEntry::new(PathId::Best, geometry(&[(0.0, 0.0)])), true);
        registry.register(&mut surface, PathEntry::new(alt(0), geometry(&[(1.0, 0.0)])), false);

        registry.clear(&mut surface);

        assert!(registry.is_empty());
        assert!(registry.adapter().is_empty());
        assert!(surface.layer_ids().is_empty());
    }

    #[test]
    fn bounds_cover_all_paths() {
        let mut surface = RecordingSurface::new();
        let mut registry = PathRegistry::new();
        assert!(registry.bounds().is_none());
        registry.register(&mut surface, PathEntry::new(PathId::Best, geometry(&[(0.0, 0.0), (1.0, 1.0)])), true);
        registry.register(&mut surface, PathEntry::new(alt(0), geometry(&[(-2.0, 0.5)])), false);

        let bounds = registry.bounds().unwrap();
        assert_eq!(bounds.min_lon, -2.0);
        assert_eq!(bounds.max_lat, 1.0);
    }
}
