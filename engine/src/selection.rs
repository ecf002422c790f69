use serde::{Deserialize, Serialize};
use shared::PathStatistics;

use crate::error::{Result, ViewerError};
use crate::geo::elevation_stats;
use crate::geometry::RouteGeometry;
use crate::path_id::PathId;
use crate::registry::PathRegistry;
use crate::surface::MapSurface;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_distance_km: f64,
    pub waypoint_count: usize,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub max_slope_deg: Option<f64>,
    pub overall_score: Option<f64>,
}

impl Statistics {
    pub fn from_geometry(geometry: &RouteGeometry) -> Self {
        let elevation = elevation_stats(geometry.elevations());
        Self {
            total_distance_km: geometry.distance_km(),
            waypoint_count: geometry.len(),
            elevation_gain_m: elevation.map_or(0.0, |stats| stats.gain),
            elevation_loss_m: elevation.map_or(0.0, |stats| stats.loss),
            max_slope_deg: None,
            overall_score: None,
        }
    }

    /// Backend numbers win field by field; local values only fill the gaps.
    pub fn merged_with(self, backend: &PathStatistics) -> Self {
        Self {
            total_distance_km: backend.total_distance_km.unwrap_or(self.total_distance_km),
            waypoint_count: backend.waypoints.unwrap_or(self.waypoint_count),
            elevation_gain_m: backend.total_ascent.unwrap_or(self.elevation_gain_m),
            elevation_loss_m: backend.total_descent.unwrap_or(self.elevation_loss_m),
            max_slope_deg: backend.max_slope.or(self.max_slope_deg),
            overall_score: backend.overall_score.or(self.overall_score),
        }
    }
}

/// Tracks the single active path and its statistics.
#[derive(Debug, Default)]
pub struct SelectionController {
    active: Option<PathId>,
    statistics: Option<Statistics>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(
        &mut self,
        registry: &mut PathRegistry,
        surface: &mut dyn MapSurface,
        id: PathId,
    ) -> Result<Statistics> {
        let Some(entry) = registry.get(id) else {
            return Err(ViewerError::UnknownPath(id));
        };
        let local = Statistics::from_geometry(&entry.geometry);
        let statistics = match &entry.statistics {
            Some(backend) => local.merged_with(backend),
            None => local,
        };

        registry.adapter_mut().highlight(surface, id);
        self.active = Some(id);
        self.statistics = Some(statistics.clone());
        tracing::debug!(
            "selected path {id}: {:.2} km, {} waypoints",
            statistics.total_distance_km,
            statistics.waypoint_count
        );
        Ok(statistics)
    }

    pub fn active(&self) -> Option<PathId> {
        self.active
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.statistics = None;
    }
}
