//! The facade presentation layers talk to.
//!
//! [`RouteViewer`] owns the map surface together with the registry, the
//! selection and the playback engine, and is the one place that keeps them
//! consistent: clearing the routes drops the selection and unbinds playback,
//! changing the active path rebinds playback, and a failed plan leaves the
//! map exactly as it was.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::PlanResponse;

use crate::error::{Result, ViewerError};
use crate::geo::{Axis, to_dms};
use crate::geometry::{Coordinate, RouteGeometry, RoutePayload, normalize};
use crate::gpx_io::{RouteIoError, gpx_data_url};
use crate::path_id::PathId;
use crate::planning::{format_strategy, interpret_response};
use crate::playback::{
    CameraMode, PlaybackConfig, PlaybackEngine, PlaybackState, TickScheduler, TickToken,
};
use crate::registry::{PathEntry, PathRegistry};
use crate::selection::{SelectionController, Statistics};
use crate::surface::{FitOptions, MapSurface, MarkerHandle, MarkerSpec};

/// Camera framing used after a plan or a track load.
pub const FIT_ROUTES: FitOptions = FitOptions {
    padding_px: 80.0,
    pitch: 60.0,
    duration_ms: 2000.0,
};

const TRACK_START_COLOR: &str = "#00ff00";
const TRACK_END_COLOR: &str = "#ff0000";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackControl {
    Play,
    Pause,
    Reset,
    SetSpeed(f64),
    SetCameraMode(CameraMode),
    SetTrailEnabled(bool),
}

/// What the map knows about a clicked location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointInfo {
    pub coordinate: Coordinate,
    pub terrain_elevation: Option<f64>,
    pub latitude_dms: String,
    pub longitude_dms: String,
}

pub struct RouteViewer<S: MapSurface> {
    surface: S,
    registry: PathRegistry,
    selection: SelectionController,
    playback: PlaybackEngine,
    planning: bool,
    last_error: Option<String>,
    terrain_info: Option<Value>,
    computation_time_seconds: Option<f64>,
    /// Start and end pins of a loaded track.
    track_pins: Vec<MarkerHandle>,
}

impl<S: MapSurface> RouteViewer<S> {
    pub fn new(surface: S) -> Self {
        Self::with_config(surface, PlaybackConfig::default())
    }

    pub fn with_config(surface: S, config: PlaybackConfig) -> Self {
        Self {
            surface,
            registry: PathRegistry::new(),
            selection: SelectionController::new(),
            playback: PlaybackEngine::new(config),
            planning: false,
            last_error: None,
            terrain_info: None,
            computation_time_seconds: None,
            track_pins: Vec::new(),
        }
    }

    /// Registers (or replaces) a path. Replacing the active path refreshes its
    /// statistics and rebinds playback to the new geometry.
    pub fn register_path(&mut self, entry: PathEntry) -> Result<()> {
        let id = entry.id;
        let is_active = self.selection.active() == Some(id);
        self.registry.register(&mut self.surface, entry, is_active);
        if is_active {
            self.selection
                .select(&mut self.registry, &mut self.surface, id)?;
            self.rebind_playback(id);
        }
        Ok(())
    }

    /// Normalizes `payload` and registers it under `id`. A malformed payload
    /// leaves the registry untouched.
    pub fn register_payload(&mut self, id: PathId, payload: RoutePayload) -> Result<()> {
        let geometry = normalize(payload).inspect_err(|err| {
            tracing::warn!("path {id} not registered: {err}");
        })?;
        self.register_path(PathEntry::new(id, geometry))
    }

    pub fn remove_path(&mut self, id: PathId) -> Option<PathEntry> {
        if self.selection.active() == Some(id) {
            self.selection.clear();
            self.playback.unbind(&mut self.surface);
        }
        self.registry.remove(&mut self.surface, id)
    }

    pub fn clear_routes(&mut self) {
        self.playback.unbind(&mut self.surface);
        self.selection.clear();
        self.registry.clear(&mut self.surface);
        for pin in self.track_pins.drain(..) {
            self.surface.remove_marker(pin);
        }
        self.terrain_info = None;
        self.computation_time_seconds = None;
    }

    /// Unknown ids are logged and ignored.
    pub fn on_path_toggle(&mut self, id: PathId, visible: bool) -> bool {
        self.registry.set_visibility(&mut self.surface, id, visible)
    }

    /// Hides everything when every path is visible, otherwise shows everything.
    pub fn toggle_all(&mut self) -> Vec<(PathId, bool)> {
        let all_visible = self.registry.list_visible().len() == self.registry.len();
        let visible = !all_visible;
        self.registry
            .ids()
            .into_iter()
            .map(|id| {
                self.registry.set_visibility(&mut self.surface, id, visible);
                (id, visible)
            })
            .collect()
    }

    pub fn on_path_select(&mut self, id: PathId) -> Result<Statistics> {
        let previous = self.selection.active();
        let statistics = self
            .selection
            .select(&mut self.registry, &mut self.surface, id)?;
        if previous != Some(id) {
            self.rebind_playback(id);
        }
        Ok(statistics)
    }

    pub fn on_playback_control(
        &mut self,
        control: PlaybackControl,
        scheduler: &mut dyn TickScheduler,
    ) -> Result<()> {
        match control {
            PlaybackControl::Play => self.playback.play(scheduler)?,
            PlaybackControl::Pause => self.playback.pause(),
            PlaybackControl::Reset => self.playback.reset(&mut self.surface),
            PlaybackControl::SetSpeed(multiplier) => {
                self.playback.set_speed(multiplier);
            }
            PlaybackControl::SetCameraMode(mode) => self.playback.set_camera_mode(mode),
            PlaybackControl::SetTrailEnabled(enabled) => {
                self.playback.set_trail_enabled(&mut self.surface, enabled)
            }
        }
        Ok(())
    }

    pub fn handle_tick(&mut self, token: TickToken, scheduler: &mut dyn TickScheduler) -> bool {
        self.playback.handle_tick(token, &mut self.surface, scheduler)
    }

    pub fn begin_plan(&mut self) {
        self.planning = true;
        self.last_error = None;
    }

    /// Applies the outcome of a planning request. On failure the message is
    /// kept as the dismissible error and the current routes stay on the map.
    /// On success the routes are replaced and the best path is selected;
    /// returns how many paths were registered.
    pub fn finish_plan(&mut self, result: Result<PlanResponse>) -> Result<usize> {
        self.planning = false;
        match result.and_then(|response| self.apply_plan(response)) {
            Ok(count) => Ok(count),
            Err(err) => {
                self.report_error(&err);
                Err(err)
            }
        }
    }

    fn apply_plan(&mut self, response: PlanResponse) -> Result<usize> {
        let response = interpret_response(response)?;
        let best = RoutePayload::from_plan(&response).and_then(normalize)?;

        self.clear_routes();
        self.register_path(
            PathEntry::new(PathId::Best, best)
                .with_rank(Some(1))
                .with_label("Best path")
                .with_statistics(response.statistics.clone()),
        )?;

        for (index, alternative) in response.alternative_paths.iter().enumerate() {
            let Some(id) = PathId::alternative(index) else {
                tracing::warn!(
                    "dropping {} alternatives beyond the supported maximum",
                    response.alternative_paths.len() - index
                );
                break;
            };
            let geometry = match RoutePayload::from_alternative(alternative).and_then(normalize) {
                Ok(geometry) => geometry,
                Err(err) => {
                    tracing::warn!("skipping alternative {id}: {err}");
                    continue;
                }
            };
            self.register_path(
                PathEntry::new(id, geometry)
                    .with_rank(alternative.rank)
                    .with_label(format_strategy(alternative.strategy.as_deref()))
                    .with_statistics(alternative.statistics.clone()),
            )?;
        }

        self.on_path_select(PathId::Best)?;
        self.terrain_info = response.terrain_info;
        self.computation_time_seconds = response.computation_time_seconds;
        self.fit_to_routes();
        tracing::info!(
            "plan applied: {} paths in {:.2}s",
            self.registry.len(),
            self.computation_time_seconds.unwrap_or_default()
        );
        Ok(self.registry.len())
    }

    /// Replaces every route with a single loaded track, pins its start and
    /// end, and selects it.
    pub fn load_track(&mut self, name: &str, geometry: RouteGeometry) -> Result<Statistics> {
        self.clear_routes();
        self.last_error = None;
        tracing::info!("loaded track `{name}` with {} points", geometry.len());
        let (first, last) = (geometry.first(), geometry.last());
        self.register_path(PathEntry::new(PathId::Best, geometry).with_label(name))?;
        self.pin_track_end(first, TRACK_START_COLOR, "Start");
        self.pin_track_end(last, TRACK_END_COLOR, "Finish");
        let statistics = self.on_path_select(PathId::Best)?;
        self.fit_to_routes();
        Ok(statistics)
    }

    pub fn fit_to_routes(&mut self) {
        if let Some(bounds) = self.registry.bounds() {
            self.surface.fit_bounds(&bounds, &FIT_ROUTES);
        }
    }

    /// Surfaces `err` as the dismissible error message.
    pub fn report_error(&mut self, err: &dyn std::fmt::Display) {
        tracing::warn!("{err}");
        self.last_error = Some(err.to_string());
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn inspect_point(&self, at: Coordinate) -> PointInfo {
        PointInfo {
            coordinate: at,
            terrain_elevation: self.surface.terrain_elevation(at),
            latitude_dms: to_dms(at.lat, Axis::Latitude),
            longitude_dms: to_dms(at.lon, Axis::Longitude),
        }
    }

    /// GPX download link for the active path, if one is selected.
    pub fn active_gpx_data_url(&self) -> std::result::Result<Option<String>, RouteIoError> {
        let Some(entry) = self.active_path().and_then(|id| self.registry.get(id)) else {
            return Ok(None);
        };
        let name = entry.label.clone().unwrap_or_else(|| entry.id.to_string());
        gpx_data_url(&entry.geometry, &name).map(Some)
    }

    fn pin_track_end(&mut self, position: Coordinate, color: &str, title: &str) {
        let pin = self.surface.add_marker(&MarkerSpec {
            position,
            color: color.to_string(),
            popup_html: Some(format!("<strong>{title}</strong>")),
        });
        self.track_pins.push(pin);
    }

    fn rebind_playback(&mut self, id: PathId) {
        match self.registry.get(id) {
            Some(entry) => self
                .playback
                .bind(&mut self.surface, entry.geometry.clone()),
            None => self.playback.unbind(&mut self.surface),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn active_path(&self) -> Option<PathId> {
        self.selection.active()
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.selection.statistics()
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_planning(&self) -> bool {
        self.planning
    }

    pub fn terrain_info(&self) -> Option<&Value> {
        self.terrain_info.as_ref()
    }

    pub fn computation_time_seconds(&self) -> Option<f64> {
        self.computation_time_seconds
    }
}
