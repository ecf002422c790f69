//! Headless host for the route viewer: plans or loads a route, then plays it
//! back on a logging map surface driven by tokio timers.

pub mod planner;
pub mod scheduler;
pub mod surface;

use std::path::Path;

use engine::gpx_io::{RouteIoError, encode_route_as_gpx, geometry_from_gpx_path};
use engine::playback::{PlaybackConfig, PlaybackStatus, TickToken};
use engine::{PlaybackControl, RouteViewer, Statistics, ViewerError};
use shared::PlanRequest;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::planner::HttpPlanner;
use crate::scheduler::TokioScheduler;
use crate::surface::TracingSurface;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    #[error(transparent)]
    RouteIo(#[from] RouteIoError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

pub struct Player {
    viewer: RouteViewer<TracingSurface>,
    scheduler: TokioScheduler,
    ticks: UnboundedReceiver<TickToken>,
}

impl Player {
    pub fn new(config: PlaybackConfig) -> Self {
        let (scheduler, ticks) = TokioScheduler::channel();
        Self {
            viewer: RouteViewer::with_config(TracingSurface::new(), config),
            scheduler,
            ticks,
        }
    }

    pub fn viewer(&self) -> &RouteViewer<TracingSurface> {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut RouteViewer<TracingSurface> {
        &mut self.viewer
    }

    /// Loads a GPX track as the only route, named after the file stem.
    pub fn load_gpx(&mut self, path: impl AsRef<Path>) -> Result<Statistics, PlayerError> {
        let path = path.as_ref();
        let geometry = geometry_from_gpx_path(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        Ok(self.viewer.load_track(&name, geometry)?)
    }

    /// Runs one planning round trip. Returns the number of registered paths.
    pub async fn plan(
        &mut self,
        planner: &HttpPlanner,
        request: &PlanRequest,
    ) -> Result<usize, PlayerError> {
        self.viewer.begin_plan();
        let result = planner
            .plan(request)
            .await
            .map_err(|err| ViewerError::PlanningRequestFailed(err.to_string()));
        Ok(self.viewer.finish_plan(result)?)
    }

    pub fn control(&mut self, control: PlaybackControl) -> Result<(), PlayerError> {
        Ok(self
            .viewer
            .on_playback_control(control, &mut self.scheduler)?)
    }

    /// Plays the active path until the marker reaches the goal or playback
    /// is paused. Returns how many ticks were rendered.
    pub async fn play_to_end(&mut self) -> Result<usize, PlayerError> {
        self.control(PlaybackControl::Play)?;
        let mut rendered = 0;
        while self.viewer.playback().status() == PlaybackStatus::Playing {
            let Some(token) = self.ticks.recv().await else {
                break;
            };
            if self.viewer.handle_tick(token, &mut self.scheduler) {
                rendered += 1;
            }
        }
        let state = self.viewer.playback_state();
        tracing::info!(
            "playback {:?} at point {}/{}",
            state.status,
            state.current_index + 1,
            state.total_points
        );
        Ok(rendered)
    }

    /// Writes the active path as GPX. Returns `false` when nothing is selected.
    pub fn export_active(&self, path: impl AsRef<Path>) -> Result<bool, PlayerError> {
        let path = path.as_ref();
        let Some(entry) = self
            .viewer
            .active_path()
            .and_then(|id| self.viewer.registry().get(id))
        else {
            return Ok(false);
        };
        let name = entry.label.clone().unwrap_or_else(|| entry.id.to_string());
        let document = encode_route_as_gpx(&entry.geometry, &name)?;
        std::fs::write(path, document).map_err(|source| PlayerError::Write {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("exported {} to {}", entry.id, path.display());
        Ok(true)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}
