//! Playback simulation: a marker travels the active route one sample per tick.
//!
//! The engine never sleeps or spawns anything itself. Each tick is handed to a
//! [`TickScheduler`] owned by the host, tagged with a [`TickToken`]; the host
//! calls [`PlaybackEngine::handle_tick`] when the delay elapses. Dropping the
//! returned [`TickHandle`] cancels the tick, and the token check discards a
//! tick that was already in flight when it got cancelled.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, ViewerError};
use crate::geo::bearing_deg;
use crate::geometry::RouteGeometry;
use crate::presenter::MarkerAndTrailPresenter;
use crate::surface::{CameraMove, MapSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickToken(pub u64);

/// Keeps a scheduled tick alive. Dropping it cancels the tick.
pub struct TickHandle {
    _guard: Box<dyn Any>,
}

impl TickHandle {
    pub fn new(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TickHandle")
    }
}

pub trait TickScheduler {
    fn schedule(&mut self, delay: Duration, token: TickToken) -> TickHandle;
}

#[derive(Debug, Clone)]
pub struct ScheduledTick {
    pub token: TickToken,
    pub delay: Duration,
    cancelled: Rc<Cell<bool>>,
}

impl ScheduledTick {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

struct CancelOnDrop(Rc<Cell<bool>>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

/// Scheduler that only records requests; tests fire them by hand.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    scheduled: Vec<ScheduledTick>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> &[ScheduledTick] {
        &self.scheduled
    }

    /// Ticks that were scheduled and not cancelled since.
    pub fn live(&self) -> Vec<TickToken> {
        self.scheduled
            .iter()
            .filter(|tick| !tick.is_cancelled())
            .map(|tick| tick.token)
            .collect()
    }

    pub fn last(&self) -> Option<&ScheduledTick> {
        self.scheduled.last()
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, token: TickToken) -> TickHandle {
        let cancelled = Rc::new(Cell::new(false));
        self.scheduled.push(ScheduledTick {
            token,
            delay,
            cancelled: Rc::clone(&cancelled),
        });
        TickHandle::new(CancelOnDrop(cancelled))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Idle,
    Ready,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    #[default]
    Follow,
    Bird,
    Free,
}

impl CameraMode {
    pub const ALL: [CameraMode; 3] = [CameraMode::Follow, CameraMode::Bird, CameraMode::Free];

    pub fn as_str(self) -> &'static str {
        match self {
            CameraMode::Follow => "follow",
            CameraMode::Bird => "bird",
            CameraMode::Free => "free",
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown camera mode `{0}` (expected follow, bird or free)")]
pub struct ParseCameraModeError(String);

impl FromStr for CameraMode {
    type Err = ParseCameraModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CameraMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ParseCameraModeError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Inter-tick delay at speed 1.0.
    pub base_delay_ms: f64,
    /// Camera ease duration at speed 1.0.
    pub base_camera_duration_ms: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 50.0,
            base_camera_duration_ms: 50.0,
        }
    }
}

/// Snapshot of the playback engine for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub current_index: usize,
    pub total_points: usize,
    pub speed_multiplier: f64,
    pub camera_mode: CameraMode,
    pub trail_enabled: bool,
}

#[derive(Debug)]
struct PendingTick {
    token: TickToken,
    _handle: TickHandle,
}

#[derive(Debug)]
pub struct PlaybackEngine {
    config: PlaybackConfig,
    status: PlaybackStatus,
    geometry: Option<RouteGeometry>,
    current_index: usize,
    speed: f64,
    camera_mode: CameraMode,
    trail_enabled: bool,
    presenter: MarkerAndTrailPresenter,
    pending: Option<PendingTick>,
    next_token: u64,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}

impl PlaybackEngine {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            status: PlaybackStatus::Idle,
            geometry: None,
            current_index: 0,
            speed: 1.0,
            camera_mode: CameraMode::default(),
            trail_enabled: true,
            presenter: MarkerAndTrailPresenter::new(),
            pending: None,
            next_token: 0,
        }
    }

    pub fn bind(&mut self, surface: &mut dyn MapSurface, geometry: RouteGeometry) {
        self.cancel_pending();
        self.presenter.clear(surface);
        tracing::debug!("playback bound to a route of {} points", geometry.len());
        self.geometry = Some(geometry);
        self.current_index = 0;
        self.status = PlaybackStatus::Ready;
    }

    pub fn unbind(&mut self, surface: &mut dyn MapSurface) {
        self.cancel_pending();
        self.presenter.clear(surface);
        if self.geometry.take().is_some() {
            tracing::debug!("playback unbound");
        }
        self.current_index = 0;
        self.status = PlaybackStatus::Idle;
    }

    pub fn play(&mut self, scheduler: &mut dyn TickScheduler) -> Result<()> {
        match self.status {
            PlaybackStatus::Idle => return Err(ViewerError::NoActiveRoute),
            PlaybackStatus::Playing => return Ok(()),
            PlaybackStatus::Finished => {
                tracing::debug!("replaying from the start");
                self.current_index = 0;
            }
            PlaybackStatus::Ready | PlaybackStatus::Paused => {}
        }
        self.status = PlaybackStatus::Playing;
        self.schedule_next(scheduler);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.cancel_pending();
            self.status = PlaybackStatus::Paused;
            tracing::debug!("playback paused at index {}", self.current_index);
        }
    }

    pub fn reset(&mut self, surface: &mut dyn MapSurface) {
        self.cancel_pending();
        self.presenter.clear(surface);
        self.current_index = 0;
        if self.status != PlaybackStatus::Idle {
            self.status = PlaybackStatus::Ready;
        }
    }

    /// Fires the tick identified by `token`. Returns `false` when the token is
    /// not the one currently pending, in which case nothing happens.
    pub fn handle_tick(
        &mut self,
        token: TickToken,
        surface: &mut dyn MapSurface,
        scheduler: &mut dyn TickScheduler,
    ) -> bool {
        if self.pending_token() != Some(token) {
            tracing::debug!("ignoring stale tick {}", token.0);
            return false;
        }
        self.tick(surface, scheduler);
        true
    }

    /// Advances one sample. Issues marker, trail and camera updates in that
    /// order and schedules the next tick unless the goal was reached.
    pub fn tick(&mut self, surface: &mut dyn MapSurface, scheduler: &mut dyn TickScheduler) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let Some(geometry) = self.geometry.clone() else {
            return;
        };
        self.cancel_pending();

        let next = self.current_index + 1;
        if next > geometry.last_index() {
            self.finish();
            return;
        }
        self.current_index = next;
        self.present(surface, &geometry);

        if next == geometry.last_index() {
            self.finish();
        } else {
            self.schedule_next(scheduler);
        }
    }

    /// Rejects non-positive and non-finite multipliers, leaving the speed as is.
    pub fn set_speed(&mut self, multiplier: f64) -> bool {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            tracing::warn!("rejected playback speed {multiplier}");
            return false;
        }
        self.speed = multiplier;
        true
    }

    pub fn set_camera_mode(&mut self, mode: CameraMode) {
        self.camera_mode = mode;
    }

    pub fn set_trail_enabled(&mut self, surface: &mut dyn MapSurface, enabled: bool) {
        self.trail_enabled = enabled;
        if !enabled {
            self.presenter.remove_trail(surface);
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            is_playing: self.status == PlaybackStatus::Playing,
            current_index: self.current_index,
            total_points: self.geometry.as_ref().map_or(0, RouteGeometry::len),
            speed_multiplier: self.speed,
            camera_mode: self.camera_mode,
            trail_enabled: self.trail_enabled,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn geometry(&self) -> Option<&RouteGeometry> {
        self.geometry.as_ref()
    }

    pub fn presenter(&self) -> &MarkerAndTrailPresenter {
        &self.presenter
    }

    pub fn pending_token(&self) -> Option<TickToken> {
        self.pending.as_ref().map(|pending| pending.token)
    }

    pub fn config(&self) -> PlaybackConfig {
        self.config
    }

    fn present(&mut self, surface: &mut dyn MapSurface, geometry: &RouteGeometry) {
        let index = self.current_index;
        let Some(position) = geometry.get(index) else {
            return;
        };
        self.presenter
            .move_marker_to(surface, position, index, geometry.len());
        if self.trail_enabled {
            self.presenter.extend_trail_to(surface, geometry, index);
        }

        let duration_ms = self.config.base_camera_duration_ms / self.speed;
        let camera = match self.camera_mode {
            CameraMode::Follow => Some(CameraMove {
                center: position,
                bearing: geometry
                    .successor(index)
                    .map(|next| bearing_deg(position, next)),
                pitch: 70.0,
                zoom: 16.0,
                duration_ms,
            }),
            CameraMode::Bird => Some(CameraMove {
                center: position,
                bearing: None,
                pitch: 45.0,
                zoom: 15.0,
                duration_ms,
            }),
            CameraMode::Free => None,
        };
        if let Some(camera) = camera {
            surface.ease_to(&camera);
        }
    }

    fn schedule_next(&mut self, scheduler: &mut dyn TickScheduler) {
        self.cancel_pending();
        let token = TickToken(self.next_token);
        self.next_token += 1;
        let delay = Duration::from_secs_f64(self.config.base_delay_ms / self.speed / 1000.0);
        let handle = scheduler.schedule(delay, token);
        self.pending = Some(PendingTick {
            token,
            _handle: handle,
        });
    }

    fn cancel_pending(&mut self) {
        self.pending = None;
    }

    fn finish(&mut self) {
        self.cancel_pending();
        self.status = PlaybackStatus::Finished;
        tracing::debug!("playback finished at index {}", self.current_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;
    use crate::presenter::TRAIL_ID;
    use crate::surface::{RecordingSurface, SurfaceCall};

    fn column(len: usize) -> RouteGeometry {
        RouteGeometry::new(
            (0..len)
                .map(|lat| Coordinate::new(0.0, lat as f64))
                .collect(),
        )
        .unwrap()
    }

    fn playing(len: usize) -> (PlaybackEngine, RecordingSurface, ManualScheduler) {
        let mut engine = PlaybackEngine::default();
        let mut surface = RecordingSurface::new();
        let mut scheduler = ManualScheduler::new();
        engine.bind(&mut surface, column(len));
        engine.play(&mut scheduler).unwrap();
        (engine, surface, scheduler)
    }

    #[test]
    fn play_without_route_fails() {
        let mut engine = PlaybackEngine::default();
        let mut scheduler = ManualScheduler::new();
        assert_eq!(engine.play(&mut scheduler), Err(ViewerError::NoActiveRoute));
        assert!(scheduler.scheduled().is_empty());
        assert!(!engine.state().is_playing);
    }

    #[test]
    fn three_ticks_on_three_points_finish_at_the_goal() {
        let (mut engine, mut surface, mut scheduler) = playing(3);

        for _ in 0..3 {
            engine.tick(&mut surface, &mut scheduler);
        }

        assert_eq!(engine.status(), PlaybackStatus::Finished);
        assert_eq!(engine.current_index(), 2);
        let (_, marker) = surface.markers().next().unwrap();
        assert_eq!(marker.position, Coordinate::new(0.0, 2.0));
        assert_eq!(surface.source(TRAIL_ID).map(<[_]>::len), Some(3));
        assert!(engine.pending_token().is_none());
    }

    #[test]
    fn len_minus_one_ticks_reach_finished_and_further_ticks_are_no_ops() {
        let (mut engine, mut surface, mut scheduler) = playing(6);

        for _ in 0..5 {
            engine.tick(&mut surface, &mut scheduler);
        }
        assert_eq!(engine.status(), PlaybackStatus::Finished);
        assert_eq!(engine.current_index(), 5);

        let calls_before = surface.calls().len();
        engine.tick(&mut surface, &mut scheduler);
        assert_eq!(surface.calls().len(), calls_before);
        assert_eq!(engine.current_index(), 5);
    }

    #[test]
    fn single_point_route_finishes_on_first_tick() {
        let (mut engine, mut surface, mut scheduler) = playing(1);
        engine.tick(&mut surface, &mut scheduler);
        assert_eq!(engine.status(), PlaybackStatus::Finished);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn tick_issues_marker_then_trail_then_camera() {
        let (mut engine, mut surface, mut scheduler) = playing(4);
        surface.take_calls();

        engine.tick(&mut surface, &mut scheduler);

        let calls = surface.take_calls();
        let marker = calls
            .iter()
            .position(|call| matches!(call, SurfaceCall::AddMarker(_)))
            .unwrap();
        let trail = calls
            .iter()
            .position(|call| matches!(call, SurfaceCall::AddSource(id) if id == TRAIL_ID))
            .unwrap();
        let camera = calls
            .iter()
            .position(|call| matches!(call, SurfaceCall::EaseTo(_)))
            .unwrap();
        assert!(marker < trail && trail < camera);
    }

    #[test]
    fn pause_cancels_the_pending_tick_and_stale_tokens_are_ignored() {
        let (mut engine, mut surface, mut scheduler) = playing(5);
        let token = engine.pending_token().unwrap();

        engine.pause();

        assert!(scheduler.scheduled()[0].is_cancelled());
        assert!(scheduler.live().is_empty());
        assert!(!engine.handle_tick(token, &mut surface, &mut scheduler));
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn handle_tick_chains_until_the_goal() {
        let (mut engine, mut surface, mut scheduler) = playing(4);

        while let Some(token) = engine.pending_token() {
            assert!(engine.handle_tick(token, &mut surface, &mut scheduler));
        }

        assert_eq!(engine.status(), PlaybackStatus::Finished);
        assert_eq!(engine.current_index(), 3);
        assert_eq!(scheduler.scheduled().len(), 3);
        assert!(scheduler.live().is_empty());
    }

    #[test]
    fn resume_after_pause_continues_from_the_same_index() {
        let (mut engine, mut surface, mut scheduler) = playing(5);
        engine.tick(&mut surface, &mut scheduler);
        engine.pause();

        engine.play(&mut scheduler).unwrap();
        engine.tick(&mut surface, &mut scheduler);

        assert_eq!(engine.current_index(), 2);
        assert_eq!(engine.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn reset_from_any_state_rewinds_and_clears_visuals() {
        let (mut engine, mut surface, mut scheduler) = playing(4);
        engine.tick(&mut surface, &mut scheduler);
        engine.tick(&mut surface, &mut scheduler);

        engine.reset(&mut surface);

        let state = engine.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.status, PlaybackStatus::Ready);
        assert_eq!(surface.marker_count(), 0);
        assert!(!surface.has_layer(TRAIL_ID));
        assert!(scheduler.live().is_empty());

        let mut idle = PlaybackEngine::default();
        idle.reset(&mut surface);
        assert_eq!(idle.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn reset_after_pause_or_finish_rewinds_and_clears_visuals() {
        let (mut paused, mut surface, mut scheduler) = playing(4);
        paused.tick(&mut surface, &mut scheduler);
        paused.tick(&mut surface, &mut scheduler);
        paused.pause();
        assert_eq!(paused.status(), PlaybackStatus::Paused);
        assert_eq!(surface.marker_count(), 1);
        assert!(surface.has_layer(TRAIL_ID));

        paused.reset(&mut surface);

        let state = paused.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.status, PlaybackStatus::Ready);
        assert!(scheduler.live().is_empty());
        assert_eq!(surface.marker_count(), 0);
        assert!(!surface.has_layer(TRAIL_ID));

        let (mut finished, mut surface, mut scheduler) = playing(3);
        finished.tick(&mut surface, &mut scheduler);
        finished.tick(&mut surface, &mut scheduler);
        assert_eq!(finished.status(), PlaybackStatus::Finished);
        assert!(surface.has_layer(TRAIL_ID));

        finished.reset(&mut surface);

        let state = finished.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.status, PlaybackStatus::Ready);
        assert!(scheduler.live().is_empty());
        assert_eq!(surface.marker_count(), 0);
        assert!(!surface.has_layer(TRAIL_ID));
    }

    #[test]
    fn play_from_finished_replays_from_the_start() {
        let (mut engine, mut surface, mut scheduler) = playing(2);
        engine.tick(&mut surface, &mut scheduler);
        assert_eq!(engine.status(), PlaybackStatus::Finished);

        engine.play(&mut scheduler).unwrap();

        assert_eq!(engine.status(), PlaybackStatus::Playing);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn bind_cancels_playback_of_the_previous_route() {
        let (mut engine, mut surface, mut scheduler) = playing(5);
        engine.tick(&mut surface, &mut scheduler);

        engine.bind(&mut surface, column(2));

        assert_eq!(engine.status(), PlaybackStatus::Ready);
        assert_eq!(engine.current_index(), 0);
        assert!(scheduler.live().is_empty());
        assert_eq!(surface.marker_count(), 0);
    }

    #[test]
    fn speed_scales_delay_and_camera_duration() {
        let (mut engine, mut surface, mut scheduler) = playing(5);
        assert_eq!(scheduler.last().unwrap().delay, Duration::from_millis(50));

        assert!(engine.set_speed(2.0));
        engine.tick(&mut surface, &mut scheduler);

        assert_eq!(scheduler.last().unwrap().delay, Duration::from_secs_f64(0.025));
        assert_eq!(surface.camera_moves()[0].duration_ms, 25.0);
    }

    #[test]
    fn invalid_speeds_are_rejected() {
        let mut engine = PlaybackEngine::default();
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(!engine.set_speed(speed));
        }
        assert_eq!(engine.state().speed_multiplier, 1.0);
    }

    #[test]
    fn camera_modes() {
        let (mut engine, mut surface, mut scheduler) = playing(3);
        engine.tick(&mut surface, &mut scheduler);
        let follow = surface.camera_moves()[0];
        assert_eq!((follow.pitch, follow.zoom), (70.0, 16.0));
        assert!(follow.bearing.unwrap().abs() < 1e-9);

        engine.set_camera_mode(CameraMode::Bird);
        engine.reset(&mut surface);
        engine.play(&mut scheduler).unwrap();
        surface.take_calls();
        engine.tick(&mut surface, &mut scheduler);
        let bird = surface.camera_moves()[0];
        assert_eq!((bird.pitch, bird.zoom, bird.bearing), (45.0, 15.0, None));

        engine.set_camera_mode(CameraMode::Free);
        surface.take_calls();
        engine.tick(&mut surface, &mut scheduler);
        assert!(surface.camera_moves().is_empty());
    }

    #[test]
    fn follow_camera_holds_bearing_at_the_goal() {
        let (mut engine, mut surface, mut scheduler) = playing(2);
        engine.tick(&mut surface, &mut scheduler);
        let camera = surface.camera_moves()[0];
        assert_eq!(camera.center, Coordinate::new(0.0, 1.0));
        assert_eq!(camera.bearing, None);
    }

    #[test]
    fn disabling_the_trail_removes_it() {
        let (mut engine, mut surface, mut scheduler) = playing(4);
        engine.tick(&mut surface, &mut scheduler);
        assert!(surface.has_layer(TRAIL_ID));

        engine.set_trail_enabled(&mut surface, false);
        engine.tick(&mut surface, &mut scheduler);

        assert!(!surface.has_layer(TRAIL_ID));
        assert_eq!(surface.marker_count(), 1);
        assert!(!engine.state().trail_enabled);
    }

    #[test]
    fn camera_mode_parses_from_text() {
        assert_eq!("bird".parse::<CameraMode>(), Ok(CameraMode::Bird));
        assert!("orbit".parse::<CameraMode>().is_err());
        assert_eq!(CameraMode::Free.to_string(), "free");
    }
}
